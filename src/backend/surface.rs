// Surface binding
//
// Binds the instance to the platform window. Capability queries on the
// physical device need this surface, so it comes before device selection.

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

use super::driver::Driver;
use super::instance::Instance;
use crate::error::{BootstrapError, Result, Stage};
use crate::window::WindowSource;

/// Drawable surface, owned by the instance
#[derive(Debug)]
pub struct Surface {
    pub handle: vk::SurfaceKHR,
    instance: vk::Instance,
}

pub fn bind_surface<D: Driver, W: WindowSource + ?Sized>(
    driver: &mut D,
    instance: &Instance,
    window: &W,
) -> Result<Surface> {
    let handle = driver
        .create_surface(instance.handle, window.raw_display_handle(), window.raw_window_handle())
        .map_err(|code| BootstrapError::init(Stage::Surface, code))?;

    log::info!("Surface bound to window");

    Ok(Surface {
        handle,
        instance: instance.handle,
    })
}

impl Surface {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_surface(self.instance, self.handle);
    }
}
