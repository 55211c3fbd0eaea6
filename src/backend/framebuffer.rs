// Framebuffers - one per swapchain slot, each wrapping that slot's view

use ash::vk;

use super::create_batch;
use super::device::LogicalDevice;
use super::driver::Driver;
use super::render_pass::RenderPass;
use super::swapchain::ImageViews;
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct Framebuffers {
    pub handles: Vec<vk::Framebuffer>,
    device: vk::Device,
}

pub fn create_framebuffers<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    render_pass: &RenderPass,
    views: &ImageViews,
    extent: vk::Extent2D,
) -> Result<Framebuffers> {
    let handles = create_batch(
        driver,
        &views.handles,
        |driver, &view| driver.create_framebuffer(device.handle, render_pass.handle, view, extent),
        |driver, framebuffer| driver.destroy_framebuffer(device.handle, framebuffer),
    )
    .map_err(|code| BootstrapError::resource(Stage::Framebuffers, code))?;

    log::debug!(
        "Created {} framebuffers at {}x{}",
        handles.len(),
        extent.width,
        extent.height
    );

    Ok(Framebuffers {
        handles,
        device: device.handle,
    })
}

impl Framebuffers {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        for framebuffer in self.handles.into_iter().rev() {
            driver.destroy_framebuffer(self.device, framebuffer);
        }
    }
}
