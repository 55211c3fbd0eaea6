// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Physical device enumeration and capability queries against the surface
// - Physical device selection (prefer discrete GPU)
// - Logical device + queue creation on a verified graphics+present family

use ash::extensions::khr;
use ash::vk;

use super::driver::{DeviceDesc, Driver};
use super::instance::Instance;
use super::surface::Surface;
use crate::config::DeviceConfig;
use crate::error::{BootstrapError, Result, Stage};

/// How to choose among enumerated GPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Take the first device the driver lists
    FirstEnumerated,
    /// Require graphics+present, then prefer discrete > integrated > virtual > other
    Ranked,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
    /// Can present to the bound surface
    pub present: bool,
}

impl QueueFamily {
    pub fn supports_graphics(&self) -> bool {
        self.properties.queue_flags.contains(vk::QueueFlags::GRAPHICS)
    }

    pub fn supports_graphics_and_present(&self) -> bool {
        self.supports_graphics() && self.present
    }
}

/// Non-owned GPU descriptor with everything queried about it
#[derive(Debug, Clone)]
pub struct PhysicalDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub features: vk::PhysicalDeviceFeatures,
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: Vec<QueueFamily>,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl PhysicalDevice {
    /// Indices of families that can present to the surface
    pub fn present_family_indices(&self) -> Vec<u32> {
        self.queue_families
            .iter()
            .filter(|family| family.present)
            .map(|family| family.index)
            .collect()
    }

    /// First family that does both graphics and presentation
    pub fn graphics_present_family(&self) -> Option<u32> {
        self.queue_families
            .iter()
            .find(|family| family.supports_graphics_and_present())
            .map(|family| family.index)
    }

    fn rank(&self) -> u32 {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 10,
            _ => 1,
        }
    }
}

pub fn select_physical_device<D: Driver>(
    driver: &D,
    instance: &Instance,
    surface: &Surface,
    policy: SelectionPolicy,
) -> Result<PhysicalDevice> {
    let devices = driver
        .enumerate_physical_devices(instance.handle)
        .map_err(|code| BootstrapError::init(Stage::PhysicalDevice, code))?;

    if devices.is_empty() {
        return Err(BootstrapError::NoDevice {
            stage: Stage::PhysicalDevice,
        });
    }
    log::info!("Found {} physical device(s)", devices.len());

    let selected = match policy {
        SelectionPolicy::FirstEnumerated => {
            let device = query_physical_device(driver, devices[0], surface)?;
            if device.graphics_present_family().is_none() {
                return Err(BootstrapError::surface_unsupported(
                    Stage::PhysicalDevice,
                    format!("no queue family on {} can draw and present to the surface", device.name),
                ));
            }
            device
        }
        SelectionPolicy::Ranked => {
            let mut best: Option<PhysicalDevice> = None;
            let mut last_error = None;
            for handle in devices {
                let candidate = match query_physical_device(driver, handle, surface) {
                    Ok(candidate) => candidate,
                    Err(e) => {
                        log::warn!("Skipping physical device {:?}: {}", handle, e);
                        last_error = Some(e);
                        continue;
                    }
                };
                if candidate.graphics_present_family().is_none() {
                    log::debug!("Skipping {}: no graphics+present queue family", candidate.name);
                    continue;
                }
                if best.as_ref().map_or(true, |b| candidate.rank() > b.rank()) {
                    best = Some(candidate);
                }
            }
            match (best, last_error) {
                (Some(best), _) => best,
                (None, Some(e)) => return Err(e),
                (None, None) => {
                    return Err(BootstrapError::surface_unsupported(
                        Stage::PhysicalDevice,
                        "no device has a queue family that can draw and present to the surface",
                    ))
                }
            }
        }
    };

    let version = selected.properties.api_version;
    log::info!("Selected GPU: {}", selected.name);
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(version),
        vk::api_version_minor(version),
        vk::api_version_patch(version)
    );

    Ok(selected)
}

fn query_physical_device<D: Driver>(
    driver: &D,
    handle: vk::PhysicalDevice,
    surface: &Surface,
) -> Result<PhysicalDevice> {
    let query_failed = |code: vk::Result| BootstrapError::init(Stage::PhysicalDevice, code);
    let surface_failed = |code: vk::Result| BootstrapError::SurfaceUnsupported {
        stage: Stage::PhysicalDevice,
        cause: code.into(),
    };

    let features = driver.physical_device_features(handle).map_err(query_failed)?;
    let properties = driver.physical_device_properties(handle).map_err(query_failed)?;
    let memory_properties = driver.physical_device_memory_properties(handle).map_err(query_failed)?;

    let queue_families = driver
        .queue_family_properties(handle)
        .map_err(query_failed)?
        .into_iter()
        .enumerate()
        .map(|(index, properties)| {
            let index = index as u32;
            let present = driver
                .surface_support(handle, index, surface.handle)
                .map_err(surface_failed)?;
            Ok(QueueFamily {
                index,
                properties,
                present,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let surface_capabilities = driver
        .surface_capabilities(handle, surface.handle)
        .map_err(surface_failed)?;
    let surface_formats = driver.surface_formats(handle, surface.handle).map_err(surface_failed)?;
    let present_modes = driver
        .surface_present_modes(handle, surface.handle)
        .map_err(surface_failed)?;

    let device = PhysicalDevice {
        handle,
        name: device_name(&properties),
        features,
        properties,
        memory_properties,
        queue_families,
        surface_capabilities,
        surface_formats,
        present_modes,
    };

    log::debug!(
        "{} ({:?}): {} queue families, {} surface formats, present modes {:?}, {} memory heaps",
        device.name,
        device.properties.device_type,
        device.queue_families.len(),
        device.surface_formats.len(),
        device.present_modes,
        device.memory_properties.memory_heap_count
    );

    Ok(device)
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    let bytes: Vec<u8> = properties
        .device_name
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Opened device with its single graphics+present queue
#[derive(Debug)]
pub struct LogicalDevice {
    pub handle: vk::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
}

pub fn create_logical_device<D: Driver>(
    driver: &mut D,
    physical: &PhysicalDevice,
    queue_family_index: u32,
    config: &DeviceConfig,
) -> Result<LogicalDevice> {
    let family = physical
        .queue_families
        .iter()
        .find(|family| family.index == queue_family_index);
    match family {
        Some(family) if family.supports_graphics_and_present() => {}
        Some(_) => {
            return Err(BootstrapError::surface_unsupported(
                Stage::LogicalDevice,
                format!(
                    "queue family {} cannot draw and present (present-capable: {:?})",
                    queue_family_index,
                    physical.present_family_indices()
                ),
            ))
        }
        None => {
            return Err(BootstrapError::surface_unsupported(
                Stage::LogicalDevice,
                format!(
                    "queue family {} does not exist on {}",
                    queue_family_index, physical.name
                ),
            ))
        }
    }

    let desc = DeviceDesc {
        queue_family_index,
        queue_priorities: vec![1.0],
        extensions: vec![khr::Swapchain::name()],
        features: config.features(),
    };

    let handle = driver
        .create_device(physical.handle, &desc)
        .map_err(BootstrapError::device)?;

    let queue = match driver.device_queue(handle, queue_family_index, 0) {
        Ok(queue) => queue,
        Err(code) => {
            driver.destroy_device(handle);
            return Err(BootstrapError::device(code));
        }
    };

    log::info!(
        "Logical device created on queue family {} of {}",
        queue_family_index,
        physical.name
    );

    Ok(LogicalDevice {
        handle,
        queue,
        queue_family_index,
    })
}

impl LogicalDevice {
    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle<D: Driver>(&self, driver: &mut D) -> ash::prelude::VkResult<()> {
        driver.device_wait_idle(self.handle)
    }

    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_device(self.handle);
    }
}
