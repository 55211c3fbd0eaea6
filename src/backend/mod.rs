// Backend module - Vulkan setup stages
//
// Design: one owner struct per stage, each created by a free function that
// borrows the owners of earlier stages. Every Vulkan call goes through the
// `Driver` trait so the whole pipeline runs against `MockDriver` in tests.

pub mod ash_driver;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod driver;
pub mod framebuffer;
pub mod instance;
pub mod mock;
pub mod render_pass;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use ash_driver::AshDriver;
pub use device::{LogicalDevice, PhysicalDevice, SelectionPolicy};
pub use driver::Driver;
pub use instance::Instance;
pub use mock::MockDriver;
pub use surface::Surface;
pub use swapchain::{ImageViews, Swapchain};

use ash::prelude::VkResult;

/// Create one object per item. If any creation fails, the objects made so
/// far are destroyed in reverse order before the error is returned.
pub(crate) fn create_batch<D, I, T: Copy>(
    driver: &mut D,
    items: &[I],
    mut create: impl FnMut(&mut D, &I) -> VkResult<T>,
    mut destroy: impl FnMut(&mut D, T),
) -> VkResult<Vec<T>> {
    let mut created = Vec::with_capacity(items.len());
    for item in items {
        match create(driver, item) {
            Ok(object) => created.push(object),
            Err(code) => {
                for object in created.into_iter().rev() {
                    destroy(driver, object);
                }
                return Err(code);
            }
        }
    }
    Ok(created)
}
