// Synchronization primitives
//
// Presentation-ordering semaphores. Provisioned here, consumed by whatever
// render loop drives this context: image_available is signaled by acquire,
// rendering_done is waited on by present.

use ash::vk;

use super::device::LogicalDevice;
use super::driver::Driver;
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct FrameSemaphores {
    pub image_available: vk::Semaphore,
    pub rendering_done: vk::Semaphore,
    device: vk::Device,
}

impl FrameSemaphores {
    pub fn new<D: Driver>(driver: &mut D, device: &LogicalDevice) -> Result<Self> {
        let failed = |code: vk::Result| BootstrapError::resource(Stage::CommandResources, code);

        let image_available = driver.create_semaphore(device.handle).map_err(failed)?;
        let rendering_done = match driver.create_semaphore(device.handle) {
            Ok(semaphore) => semaphore,
            Err(code) => {
                driver.destroy_semaphore(device.handle, image_available);
                return Err(failed(code));
            }
        };

        Ok(Self {
            image_available,
            rendering_done,
            device: device.handle,
        })
    }

    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_semaphore(self.device, self.rendering_done);
        driver.destroy_semaphore(self.device, self.image_available);
    }
}
