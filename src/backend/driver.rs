// Driver seam
//
// Every Vulkan entry point the setup pipeline touches, expressed as a trait.
// AshDriver forwards to the real loader; MockDriver runs without a GPU and
// checks that handles are created and destroyed in dependency order.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{CStr, CString};

/// Parameters for instance creation
#[derive(Debug, Clone)]
pub struct InstanceDesc {
    pub application_name: CString,
    pub application_version: u32,
    pub engine_name: CString,
    pub engine_version: u32,
    pub api_version: u32,
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<CString>,
}

/// Parameters for logical device creation
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub queue_family_index: u32,
    pub queue_priorities: Vec<f32>,
    pub extensions: Vec<&'static CStr>,
    pub features: vk::PhysicalDeviceFeatures,
}

/// Parameters for swapchain creation
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub surface_format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub image_usage: vk::ImageUsageFlags,
    pub old_swapchain: vk::SwapchainKHR,
}

/// Single-subpass render pass layout
#[derive(Debug, Clone, Copy)]
pub struct RenderPassDesc {
    pub color_attachment: vk::AttachmentDescription,
    pub color_reference: vk::AttachmentReference,
    pub bind_point: vk::PipelineBindPoint,
    pub dependency: vk::SubpassDependency,
}

pub trait Driver {
    // Instance level

    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance>;
    fn destroy_instance(&mut self, instance: vk::Instance);

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR);

    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn physical_device_features(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceFeatures>;
    fn physical_device_properties(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties>;
    fn physical_device_memory_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties>;
    fn queue_family_properties(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>>;

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;
    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;

    // Device level

    fn create_device(&mut self, physical: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device>;
    fn device_queue(&self, device: vk::Device, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue>;
    fn device_wait_idle(&mut self, device: vk::Device) -> VkResult<()>;
    fn destroy_device(&mut self, device: vk::Device);

    fn create_swapchain(&mut self, device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR>;
    fn swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;
    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR);

    fn create_image_view(
        &mut self,
        device: vk::Device,
        image: vk::Image,
        format: vk::Format,
    ) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&mut self, device: vk::Device, view: vk::ImageView);

    fn create_render_pass(&mut self, device: vk::Device, desc: &RenderPassDesc) -> VkResult<vk::RenderPass>;
    fn destroy_render_pass(&mut self, device: vk::Device, render_pass: vk::RenderPass);

    fn create_framebuffer(
        &mut self,
        device: vk::Device,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer>;
    fn destroy_framebuffer(&mut self, device: vk::Device, framebuffer: vk::Framebuffer);

    fn create_command_pool(
        &mut self,
        device: vk::Device,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool>;
    fn allocate_command_buffers(
        &mut self,
        device: vk::Device,
        pool: vk::CommandPool,
        level: vk::CommandBufferLevel,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn free_command_buffers(&mut self, device: vk::Device, pool: vk::CommandPool, buffers: &[vk::CommandBuffer]);
    fn destroy_command_pool(&mut self, device: vk::Device, pool: vk::CommandPool);

    fn create_descriptor_pool(
        &mut self,
        device: vk::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&mut self, device: vk::Device, pool: vk::DescriptorPool);

    fn create_semaphore(&mut self, device: vk::Device) -> VkResult<vk::Semaphore>;
    fn destroy_semaphore(&mut self, device: vk::Device, semaphore: vk::Semaphore);

    fn create_shader_module(&mut self, device: vk::Device, code: &[u32]) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&mut self, device: vk::Device, module: vk::ShaderModule);
}
