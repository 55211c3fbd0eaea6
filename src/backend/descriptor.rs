// Descriptor pool
//
// Fixed capacity taken from `[descriptors]` in the config. The pool never
// grows: allocating more sets than `max_sets` is an error for the caller.

use ash::vk;

use super::device::LogicalDevice;
use super::driver::Driver;
use crate::config::DescriptorConfig;
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct DescriptorResources {
    pub pool: vk::DescriptorPool,
    pub max_sets: u32,
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
    device: vk::Device,
}

/// Non-empty pool sizes for the configured capacity
pub fn pool_sizes(config: &DescriptorConfig) -> Vec<vk::DescriptorPoolSize> {
    [
        (vk::DescriptorType::UNIFORM_BUFFER, config.uniform_buffers),
        (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, config.combined_image_samplers),
    ]
    .into_iter()
    .filter(|&(_, count)| count > 0)
    .map(|(ty, descriptor_count)| vk::DescriptorPoolSize { ty, descriptor_count })
    .collect()
}

pub fn create_descriptor_pool<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    config: &DescriptorConfig,
) -> Result<DescriptorResources> {
    let sizes = pool_sizes(config);
    if config.max_sets == 0 || sizes.is_empty() {
        return Err(BootstrapError::resource(
            Stage::DescriptorResources,
            format!(
                "descriptor pool needs at least one set and one descriptor (max_sets={}, sizes={:?})",
                config.max_sets, sizes
            ),
        ));
    }

    let pool = driver
        .create_descriptor_pool(device.handle, config.max_sets, &sizes)
        .map_err(|code| BootstrapError::resource(Stage::DescriptorResources, code))?;

    log::info!(
        "Descriptor pool created: max_sets={}, {} uniform buffer(s), {} combined image sampler(s)",
        config.max_sets,
        config.uniform_buffers,
        config.combined_image_samplers
    );

    Ok(DescriptorResources {
        pool,
        max_sets: config.max_sets,
        pool_sizes: sizes,
        device: device.handle,
    })
}

impl DescriptorResources {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_descriptor_pool(self.device, self.pool);
    }
}
