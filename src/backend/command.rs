// Command resources
//
// One pool on the graphics+present family, one primary buffer per
// swapchain image.

use ash::vk;

use super::device::LogicalDevice;
use super::driver::Driver;
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct CommandResources {
    pub pool: vk::CommandPool,
    pub buffers: Vec<vk::CommandBuffer>,
    device: vk::Device,
}

pub fn create_command_resources<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    buffer_count: u32,
) -> Result<CommandResources> {
    let failed = |code: vk::Result| BootstrapError::resource(Stage::CommandResources, code);

    // Buffers are re-recorded every frame by whoever consumes them
    let pool = driver
        .create_command_pool(
            device.handle,
            device.queue_family_index,
            vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        )
        .map_err(failed)?;

    let buffers = match driver.allocate_command_buffers(
        device.handle,
        pool,
        vk::CommandBufferLevel::PRIMARY,
        buffer_count,
    ) {
        Ok(buffers) => buffers,
        Err(code) => {
            driver.destroy_command_pool(device.handle, pool);
            return Err(failed(code));
        }
    };

    log::info!(
        "Command pool created on family {} with {} primary buffers",
        device.queue_family_index,
        buffers.len()
    );

    Ok(CommandResources {
        pool,
        buffers,
        device: device.handle,
    })
}

impl CommandResources {
    /// Replace the buffer batch with `count` fresh primary buffers.
    /// On failure the old buffers are already gone and `buffers` is empty.
    pub fn reallocate<D: Driver>(&mut self, driver: &mut D, count: u32) -> Result<()> {
        self.free_buffers(driver);
        self.buffers = driver
            .allocate_command_buffers(self.device, self.pool, vk::CommandBufferLevel::PRIMARY, count)
            .map_err(|code| BootstrapError::resource(Stage::CommandResources, code))?;
        log::debug!("Reallocated {} command buffers", self.buffers.len());
        Ok(())
    }

    fn free_buffers<D: Driver>(&mut self, driver: &mut D) {
        if !self.buffers.is_empty() {
            driver.free_command_buffers(self.device, self.pool, &self.buffers);
            self.buffers.clear();
        }
    }

    pub fn destroy<D: Driver>(mut self, driver: &mut D) {
        self.free_buffers(driver);
        driver.destroy_command_pool(self.device, self.pool);
    }
}
