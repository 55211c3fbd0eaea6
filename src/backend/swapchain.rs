// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Every requested parameter is checked against what the surface reports;
// nothing is silently substituted. Recreation passes the live swapchain as
// `old_swapchain` and leaves destroying it to the caller. The driver retires
// the old swapchain as soon as it is passed, even if creation then fails.

use ash::vk;

use super::create_batch;
use super::device::{LogicalDevice, PhysicalDevice};
use super::driver::{Driver, SwapchainDesc};
use super::surface::Surface;
use crate::config::SwapchainConfig;
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    device: vk::Device,
}

impl Swapchain {
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Images are owned by the swapchain and go with it
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_swapchain(self.device, self.handle);
    }
}

pub fn create_swapchain<D: Driver>(
    driver: &mut D,
    surface: &Surface,
    physical: &PhysicalDevice,
    device: &LogicalDevice,
    config: &SwapchainConfig,
    window_extent: vk::Extent2D,
    old: Option<&Swapchain>,
) -> Result<Swapchain> {
    let mut desc = describe_swapchain(driver, surface, physical, config, window_extent)?;
    desc.old_swapchain = old.map_or(vk::SwapchainKHR::null(), |old| old.handle);
    create_swapchain_from(driver, device, &desc)
}

/// Validate the request against the surface and build the create info.
/// Nothing here retires an existing swapchain.
pub fn describe_swapchain<D: Driver>(
    driver: &D,
    surface: &Surface,
    physical: &PhysicalDevice,
    config: &SwapchainConfig,
    window_extent: vk::Extent2D,
) -> Result<SwapchainDesc> {
    if is_degenerate(window_extent) {
        return Err(BootstrapError::swapchain(format!(
            "degenerate extent {}x{}",
            window_extent.width, window_extent.height
        )));
    }

    let requested_format = config.surface_format()?;
    let requested_mode = config.present_mode()?;

    // Capabilities change with the window; query fresh on every (re)creation
    let caps = driver
        .surface_capabilities(physical.handle, surface.handle)
        .map_err(BootstrapError::swapchain)?;

    let extent = choose_extent(&caps, window_extent);
    if is_degenerate(extent) {
        return Err(BootstrapError::swapchain(format!(
            "surface reports degenerate extent {}x{}",
            extent.width, extent.height
        )));
    }

    let surface_format = choose_surface_format(&physical.surface_formats, requested_format)?;
    let present_mode = choose_present_mode(&physical.present_modes, requested_mode)?;
    let image_count = choose_image_count(&caps, config.image_count);

    Ok(SwapchainDesc {
        surface: surface.handle,
        min_image_count: image_count,
        surface_format,
        extent,
        present_mode,
        pre_transform: caps.current_transform,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        old_swapchain: vk::SwapchainKHR::null(),
    })
}

/// Create the swapchain and fetch its images. A non-null `old_swapchain` in
/// `desc` is retired by the driver whether or not this succeeds.
pub fn create_swapchain_from<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    desc: &SwapchainDesc,
) -> Result<Swapchain> {
    log::info!(
        "Creating swapchain: {}x{}, {} images, {:?}/{:?}, {:?}",
        desc.extent.width,
        desc.extent.height,
        desc.min_image_count,
        desc.surface_format.format,
        desc.surface_format.color_space,
        desc.present_mode
    );

    let handle = driver
        .create_swapchain(device.handle, desc)
        .map_err(BootstrapError::swapchain)?;

    let images = match driver.swapchain_images(device.handle, handle) {
        Ok(images) => images,
        Err(code) => {
            driver.destroy_swapchain(device.handle, handle);
            return Err(BootstrapError::swapchain(code));
        }
    };

    log::info!("Created swapchain with {} images", images.len());

    Ok(Swapchain {
        handle,
        images,
        surface_format: desc.surface_format,
        extent: desc.extent,
        present_mode: desc.present_mode,
        device: device.handle,
    })
}

fn is_degenerate(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}

/// Surface-dictated extent when there is one, otherwise the window size clamped to the allowed range
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: window
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: window
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Clamp to `[min_image_count, max_image_count]`; a max of 0 means no upper bound
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR, requested: u32) -> u32 {
    let mut count = requested.max(caps.min_image_count);
    if caps.max_image_count > 0 && count > caps.max_image_count {
        count = caps.max_image_count;
    }
    count
}

/// The requested pair must be listed. A lone UNDEFINED entry means the surface takes anything.
pub fn choose_surface_format(
    supported: &[vk::SurfaceFormatKHR],
    requested: vk::SurfaceFormatKHR,
) -> Result<vk::SurfaceFormatKHR> {
    if let [only] = supported {
        if only.format == vk::Format::UNDEFINED {
            return Ok(requested);
        }
    }
    supported
        .iter()
        .copied()
        .find(|f| f.format == requested.format && f.color_space == requested.color_space)
        .ok_or_else(|| {
            BootstrapError::swapchain(format!(
                "surface format {:?}/{:?} not supported (supported: {:?})",
                requested.format, requested.color_space, supported
            ))
        })
}

pub fn choose_present_mode(
    supported: &[vk::PresentModeKHR],
    requested: vk::PresentModeKHR,
) -> Result<vk::PresentModeKHR> {
    if supported.contains(&requested) {
        Ok(requested)
    } else {
        Err(BootstrapError::swapchain(format!(
            "present mode {:?} not supported (supported: {:?})",
            requested, supported
        )))
    }
}

/// One color view per swapchain image
#[derive(Debug)]
pub struct ImageViews {
    pub handles: Vec<vk::ImageView>,
    device: vk::Device,
}

pub fn create_image_views<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    swapchain: &Swapchain,
) -> Result<ImageViews> {
    let format = swapchain.format();
    let handles = create_batch(
        driver,
        &swapchain.images,
        |driver, &image| driver.create_image_view(device.handle, image, format),
        |driver, view| driver.destroy_image_view(device.handle, view),
    )
    .map_err(|code| BootstrapError::resource(Stage::ImageViews, code))?;

    log::debug!("Created {} image views", handles.len());

    Ok(ImageViews {
        handles,
        device: device.handle,
    })
}

impl ImageViews {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        for view in self.handles.into_iter().rev() {
            driver.destroy_image_view(self.device, view);
        }
    }
}
