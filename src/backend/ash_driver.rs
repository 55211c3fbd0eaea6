// Vulkan driver - real GPU interface
//
// Responsibilities:
// - Load the Vulkan library and own the ash function tables
// - Keep the instance/device loaders alive between calls
// - Route validation layer output into the log facade
//
// The pipeline only ever sees raw handles; the loaders live here.

use anyhow::Context;
use ash::extensions::{ext::DebugUtils, khr};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr};

use super::driver::{DeviceDesc, Driver, InstanceDesc, RenderPassDesc, SwapchainDesc};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Vulkan driver backed by the system loader
pub struct AshDriver {
    entry: Entry,
    instance: Option<ash::Instance>,
    surface_loader: Option<khr::Surface>,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
    device: Option<ash::Device>,
    swapchain_loader: Option<khr::Swapchain>,
}

impl AshDriver {
    /// Load the Vulkan library
    pub fn load() -> anyhow::Result<Self> {
        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        Ok(Self {
            entry,
            instance: None,
            surface_loader: None,
            debug_utils: None,
            device: None,
            swapchain_loader: None,
        })
    }

    fn instance(&self, handle: vk::Instance) -> VkResult<&ash::Instance> {
        match &self.instance {
            Some(instance) if instance.handle() == handle => Ok(instance),
            _ => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    fn any_instance(&self) -> VkResult<&ash::Instance> {
        self.instance.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn surface_loader(&self) -> VkResult<&khr::Surface> {
        self.surface_loader.as_ref().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self, handle: vk::Device) -> VkResult<&ash::Device> {
        match &self.device {
            Some(device) if device.handle() == handle => Ok(device),
            _ => Err(vk::Result::ERROR_DEVICE_LOST),
        }
    }

    fn swapchain_loader(&self) -> VkResult<&khr::Swapchain> {
        self.swapchain_loader.as_ref().ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> VkResult<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    /// Run `destroy` against the device if `handle` is the live one
    fn with_device(&self, handle: vk::Device, what: &str, destroy: impl FnOnce(&ash::Device)) {
        match self.device(handle) {
            Ok(device) => destroy(device),
            Err(_) => log::warn!("Skipping {} destroy: device {:?} is not live", what, handle),
        }
    }
}

impl Driver for AshDriver {
    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        if self.instance.is_some() {
            // One instance per process
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&desc.application_name)
            .application_version(desc.application_version)
            .engine_name(&desc.engine_name)
            .engine_version(desc.engine_version)
            .api_version(desc.api_version);

        let extensions: Vec<*const c_char> = desc.extensions.iter().map(|ext| ext.as_ptr()).collect();
        let layers: Vec<*const c_char> = desc.layers.iter().map(|layer| layer.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { self.entry.create_instance(&create_info, None) }?;

        let wants_messenger = desc.layers.iter().any(|layer| layer.as_c_str() == VALIDATION_LAYER)
            && desc.extensions.contains(&DebugUtils::name());
        if wants_messenger {
            match Self::setup_debug_messenger(&self.entry, &instance) {
                Ok(debug_utils) => self.debug_utils = Some(debug_utils),
                Err(e) => log::warn!("Debug messenger unavailable: {}", e),
            }
        }

        let handle = instance.handle();
        self.surface_loader = Some(khr::Surface::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        if self.instance(instance).is_err() {
            log::warn!("Skipping instance destroy: {:?} is not live", instance);
            return;
        }
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.surface_loader = None;
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let ash_instance = self.instance(instance)?;
        unsafe { ash_window::create_surface(&self.entry, ash_instance, display, window, None) }
    }

    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR) {
        if self.instance(instance).is_err() {
            log::warn!("Skipping surface destroy: instance {:?} is not live", instance);
            return;
        }
        if let Ok(loader) = self.surface_loader() {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance(instance)?.enumerate_physical_devices() }
    }

    fn physical_device_features(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceFeatures> {
        Ok(unsafe { self.any_instance()?.get_physical_device_features(physical) })
    }

    fn physical_device_properties(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties> {
        Ok(unsafe { self.any_instance()?.get_physical_device_properties(physical) })
    }

    fn physical_device_memory_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        Ok(unsafe { self.any_instance()?.get_physical_device_memory_properties(physical) })
    }

    fn queue_family_properties(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe { self.any_instance()?.get_physical_device_queue_family_properties(physical) })
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe { self.surface_loader()?.get_physical_device_surface_capabilities(physical, surface) }
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe { self.surface_loader()?.get_physical_device_surface_formats(physical, surface) }
    }

    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe { self.surface_loader()?.get_physical_device_surface_present_modes(physical, surface) }
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.surface_loader()?
                .get_physical_device_surface_support(physical, queue_family_index, surface)
        }
    }

    fn create_device(&mut self, physical: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device> {
        if self.device.is_some() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let instance = self.any_instance()?;

        let queue_create_info = vk::DeviceQueueCreateInfo::builder()
            .queue_family_index(desc.queue_family_index)
            .queue_priorities(&desc.queue_priorities)
            .build();

        let extensions: Vec<*const c_char> = desc.extensions.iter().map(|ext| ext.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(std::slice::from_ref(&queue_create_info))
            .enabled_extension_names(&extensions)
            .enabled_features(&desc.features);

        let device = unsafe { instance.create_device(physical, &create_info, None) }?;
        let swapchain_loader = khr::Swapchain::new(instance, &device);

        let handle = device.handle();
        self.swapchain_loader = Some(swapchain_loader);
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, device: vk::Device, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        Ok(unsafe { self.device(device)?.get_device_queue(queue_family_index, queue_index) })
    }

    fn device_wait_idle(&mut self, device: vk::Device) -> VkResult<()> {
        unsafe { self.device(device)?.device_wait_idle() }
    }

    fn destroy_device(&mut self, device: vk::Device) {
        if self.device(device).is_err() {
            log::warn!("Skipping device destroy: {:?} is not live", device);
            return;
        }
        self.swapchain_loader = None;
        if let Some(device) = self.device.take() {
            unsafe { device.destroy_device(None) };
        }
    }

    fn create_swapchain(&mut self, device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        self.device(device)?;

        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(desc.surface)
            .min_image_count(desc.min_image_count)
            .image_format(desc.surface_format.format)
            .image_color_space(desc.surface_format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(desc.image_usage)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true)
            .old_swapchain(desc.old_swapchain);

        unsafe { self.swapchain_loader()?.create_swapchain(&create_info, None) }
    }

    fn swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        self.device(device)?;
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        if self.device(device).is_err() {
            log::warn!("Skipping swapchain destroy: device {:?} is not live", device);
            return;
        }
        if let Ok(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn create_image_view(
        &mut self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe { self.device(device)?.create_image_view(&create_info, None) }
    }

    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView) {
        self.with_device(device, "image view", |d| unsafe { d.destroy_image_view(view, None) });
    }

    fn create_render_pass(&mut self, device: vk::Device, desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        let attachments = [desc.color_attachment];
        let color_references = [desc.color_reference];
        let subpasses = [vk::SubpassDescription::builder()
            .pipeline_bind_point(desc.bind_point)
            .color_attachments(&color_references)
            .build()];
        let dependencies = [desc.dependency];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe { self.device(device)?.create_render_pass(&create_info, None) }
    }

    fn destroy_render_pass(&mut self, device: vk::Device, render_pass: vk::RenderPass) {
        self.with_device(device, "render pass", |d| unsafe { d.destroy_render_pass(render_pass, None) });
    }

    fn create_framebuffer(
        &mut self,
        device: vk::Device,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        let attachments = [attachment];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe { self.device(device)?.create_framebuffer(&create_info, None) }
    }

    fn destroy_framebuffer(&mut self, device: vk::Device, framebuffer: vk::Framebuffer) {
        self.with_device(device, "framebuffer", |d| unsafe { d.destroy_framebuffer(framebuffer, None) });
    }

    fn create_command_pool(
        &mut self,
        device: vk::Device,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family_index)
            .flags(flags);

        unsafe { self.device(device)?.create_command_pool(&create_info, None) }
    }

    fn allocate_command_buffers(
        &mut self,
        device: vk::Device,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(count);

        unsafe { self.device(device)?.allocate_command_buffers(&alloc_info) }
    }

    fn free_command_buffers(&mut self, device: vk::Device, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        self.with_device(device, "command buffer", |d| unsafe { d.free_command_buffers(pool, buffers) });
    }

    fn destroy_command_pool(&mut self, device: vk::Device, pool: vk::CommandPool) {
        self.with_device(device, "command pool", |d| unsafe { d.destroy_command_pool(pool, None) });
    }

    fn create_descriptor_pool(
        &mut self,
        device: vk::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        unsafe { self.device(device)?.create_descriptor_pool(&create_info, None) }
    }

    fn destroy_descriptor_pool(&mut self, device: vk::Device, pool: vk::DescriptorPool) {
        self.with_device(device, "descriptor pool", |d| unsafe { d.destroy_descriptor_pool(pool, None) });
    }

    fn create_semaphore(&mut self, device: vk::Device) -> VkResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe { self.device(device)?.create_semaphore(&create_info, None) }
    }

    fn destroy_semaphore(&mut self, device: vk::Device, semaphore: vk::Semaphore) {
        self.with_device(device, "semaphore", |d| unsafe { d.destroy_semaphore(semaphore, None) });
    }

    fn create_shader_module(&mut self, device: vk::Device, code: &[u32]) -> VkResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe { self.device(device)?.create_shader_module(&create_info, None) }
    }

    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule) {
        self.with_device(device, "shader module", |d| unsafe { d.destroy_shader_module(module, None) });
    }
}

impl Drop for AshDriver {
    fn drop(&mut self) {
        // RenderContext tears everything down first; anything left here was leaked by the caller
        if self.device.is_some() || self.instance.is_some() {
            log::warn!("AshDriver dropped with live Vulkan objects");
        }
        unsafe {
            self.swapchain_loader = None;
            if let Some(device) = self.device.take() {
                let _ = device.device_wait_idle();
                device.destroy_device(None);
            }
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.surface_loader = None;
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
