// Mock driver - no GPU required
//
// Hands out unique handles and remembers what every handle depends on.
// Destroying something that is still referenced, destroying twice, or
// using a dead handle is recorded as a violation instead of crashing, so
// tests can assert on lifecycle ordering.

use ash::extensions::khr;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::collections::{HashMap, HashSet};
use std::ffi::CStr;

use super::driver::{DeviceDesc, Driver, InstanceDesc, RenderPassDesc, SwapchainDesc};

const SPIRV_MAGIC: u32 = 0x0723_0203;
const PHYSICAL_DEVICE_BASE: u64 = 0x0100_0000;
const QUEUE_BASE: u64 = 1 << 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Instance,
    Surface,
    Device,
    Swapchain,
    Image,
    ImageView,
    RenderPass,
    Framebuffer,
    CommandPool,
    CommandBuffer,
    DescriptorPool,
    Semaphore,
    ShaderModule,
}

/// Fallible entry points, for the call log and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    CreateInstance,
    CreateSurface,
    CreateDevice,
    CreateSwapchain,
    CreateImageView,
    CreateRenderPass,
    CreateFramebuffer,
    CreateCommandPool,
    AllocateCommandBuffers,
    CreateDescriptorPool,
    CreateSemaphore,
    CreateShaderModule,
    DeviceWaitIdle,
}

/// Entry in the ordered log of calls and destructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    Call(MockCall),
    Destroyed(HandleKind),
}

#[derive(Debug, Clone)]
pub struct MockQueueFamily {
    pub flags: vk::QueueFlags,
    pub queue_count: u32,
    /// Whether this family can present to any surface created by the mock
    pub present: bool,
}

impl MockQueueFamily {
    pub fn graphics_present() -> Self {
        Self {
            flags: vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            queue_count: 1,
            present: true,
        }
    }

    pub fn compute_only() -> Self {
        Self {
            flags: vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            queue_count: 1,
            present: false,
        }
    }
}

/// A fake GPU as seen through a surface
#[derive(Debug, Clone)]
pub struct MockGpu {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub queue_families: Vec<MockQueueFamily>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub features: vk::PhysicalDeviceFeatures,
    pub extensions: Vec<&'static CStr>,
    /// Returned by the properties query, for a device that cannot be inspected
    pub query_error: Option<vk::Result>,
}

impl Default for MockGpu {
    /// One graphics+present family, BGRA8 UNORM / sRGB, FIFO, 3..=8 images
    fn default() -> Self {
        Self {
            name: "Mock GPU".to_string(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: vec![MockQueueFamily::graphics_present()],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 3,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D {
                    width: 16384,
                    height: 16384,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_DST,
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
            features: vk::PhysicalDeviceFeatures {
                sampler_anisotropy: vk::TRUE,
                fill_mode_non_solid: vk::TRUE,
                ..Default::default()
            },
            extensions: vec![khr::Swapchain::name()],
            query_error: None,
        }
    }
}

impl MockGpu {
    pub fn named(name: &str, device_type: vk::PhysicalDeviceType) -> Self {
        Self {
            name: name.to_string(),
            device_type,
            ..Default::default()
        }
    }
}

#[derive(Debug)]
struct Tracked {
    kind: HandleKind,
    parents: Vec<u64>,
}

#[derive(Debug, Clone, Copy)]
struct Failure {
    successes_left: usize,
    code: vk::Result,
}

pub struct MockDriver {
    gpus: Vec<MockGpu>,
    next_handle: u64,
    live: HashMap<u64, Tracked>,
    destroyed: HashSet<u64>,
    violations: Vec<String>,
    calls: Vec<MockCall>,
    timeline: Vec<MockEvent>,
    failures: HashMap<MockCall, Failure>,
    instance_desc: Option<InstanceDesc>,
    device_gpus: HashMap<u64, usize>,
    device_descs: HashMap<u64, DeviceDesc>,
    active_swapchains: HashMap<u64, u64>,
    retired_swapchains: HashSet<u64>,
    swapchain_descs: HashMap<u64, SwapchainDesc>,
    render_pass_descs: HashMap<u64, RenderPassDesc>,
    descriptor_pools: HashMap<u64, (u32, Vec<(vk::DescriptorType, u32)>)>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new(vec![MockGpu::default()])
    }
}

impl MockDriver {
    pub fn new(gpus: Vec<MockGpu>) -> Self {
        Self {
            gpus,
            next_handle: 0x1000,
            live: HashMap::new(),
            destroyed: HashSet::new(),
            violations: Vec::new(),
            calls: Vec::new(),
            timeline: Vec::new(),
            failures: HashMap::new(),
            instance_desc: None,
            device_gpus: HashMap::new(),
            device_descs: HashMap::new(),
            active_swapchains: HashMap::new(),
            retired_swapchains: HashSet::new(),
            swapchain_descs: HashMap::new(),
            render_pass_descs: HashMap::new(),
            descriptor_pools: HashMap::new(),
        }
    }

    /// Let `call` succeed `successes` more times, then fail once with `code`
    pub fn fail_after(&mut self, call: MockCall, successes: usize, code: vk::Result) {
        self.failures.insert(
            call,
            Failure {
                successes_left: successes,
                code,
            },
        );
    }

    pub fn fail_next(&mut self, call: MockCall, code: vk::Result) {
        self.fail_after(call, 0, code);
    }

    /// Change what a GPU reports, e.g. new surface capabilities before a resize
    pub fn gpu_mut(&mut self, index: usize) -> Option<&mut MockGpu> {
        self.gpus.get_mut(index)
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    pub fn calls(&self) -> &[MockCall] {
        &self.calls
    }

    /// Calls and destructions in the order they happened
    pub fn timeline(&self) -> &[MockEvent] {
        &self.timeline
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.calls.iter().filter(|&&c| c == call).count()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_of(&self, kind: HandleKind) -> usize {
        self.live.values().filter(|t| t.kind == kind).count()
    }

    pub fn is_live<H: Handle>(&self, handle: H) -> bool {
        self.live.contains_key(&handle.as_raw())
    }

    /// Passed as `old_swapchain` at least once; it can no longer present
    pub fn is_retired(&self, swapchain: vk::SwapchainKHR) -> bool {
        self.retired_swapchains.contains(&swapchain.as_raw())
    }

    pub fn instance_desc(&self) -> Option<&InstanceDesc> {
        self.instance_desc.as_ref()
    }

    pub fn device_desc(&self, device: vk::Device) -> Option<&DeviceDesc> {
        self.device_descs.get(&device.as_raw())
    }

    pub fn swapchain_desc(&self, swapchain: vk::SwapchainKHR) -> Option<&SwapchainDesc> {
        self.swapchain_descs.get(&swapchain.as_raw())
    }

    pub fn render_pass_desc(&self, render_pass: vk::RenderPass) -> Option<&RenderPassDesc> {
        self.render_pass_descs.get(&render_pass.as_raw())
    }

    /// `(max_sets, [(type, count)])` the pool was created with
    pub fn descriptor_pool_layout(&self, pool: vk::DescriptorPool) -> Option<&(u32, Vec<(vk::DescriptorType, u32)>)> {
        self.descriptor_pools.get(&pool.as_raw())
    }

    fn record(&mut self, call: MockCall) -> VkResult<()> {
        self.calls.push(call);
        self.timeline.push(MockEvent::Call(call));
        match self.failures.get_mut(&call) {
            Some(failure) if failure.successes_left == 0 => {
                let code = failure.code;
                self.failures.remove(&call);
                Err(code)
            }
            Some(failure) => {
                failure.successes_left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn mint(&mut self, kind: HandleKind, parents: Vec<u64>) -> u64 {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.live.insert(raw, Tracked { kind, parents });
        raw
    }

    fn live_kind(&self, raw: u64, kind: HandleKind) -> bool {
        matches!(self.live.get(&raw), Some(t) if t.kind == kind)
    }

    fn require(&mut self, raw: u64, kind: HandleKind, user: &str) -> VkResult<()> {
        if self.live_kind(raw, kind) {
            return Ok(());
        }
        self.violations
            .push(format!("{} used {:?} {:#x} which is not live", user, kind, raw));
        Err(vk::Result::ERROR_DEVICE_LOST)
    }

    fn live_instance(&self) -> Option<u64> {
        self.live
            .iter()
            .find(|(_, t)| t.kind == HandleKind::Instance)
            .map(|(raw, _)| *raw)
    }

    fn gpu(&self, physical: vk::PhysicalDevice) -> VkResult<&MockGpu> {
        physical
            .as_raw()
            .checked_sub(PHYSICAL_DEVICE_BASE)
            .and_then(|index| self.gpus.get(index as usize))
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn gpu_index(&self, physical: vk::PhysicalDevice) -> VkResult<usize> {
        self.gpu(physical)?;
        Ok((physical.as_raw() - PHYSICAL_DEVICE_BASE) as usize)
    }

    fn device_gpu(&self, device: vk::Device) -> VkResult<&MockGpu> {
        self.device_gpus
            .get(&device.as_raw())
            .and_then(|&index| self.gpus.get(index))
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    /// Destroy `raw`, implicitly freeing children of kind `owned`
    fn release(&mut self, raw: u64, kind: HandleKind, owned: Option<HandleKind>) {
        if !self.live_kind(raw, kind) {
            let what = if self.destroyed.contains(&raw) {
                "double destroy"
            } else {
                "destroy of unknown handle"
            };
            self.violations.push(format!("{}: {:?} {:#x}", what, kind, raw));
            return;
        }

        let owned_children: Vec<u64> = match owned {
            Some(owned_kind) => self
                .live
                .iter()
                .filter(|(_, t)| t.kind == owned_kind && t.parents.contains(&raw))
                .map(|(child, _)| *child)
                .collect(),
            None => Vec::new(),
        };
        for child in &owned_children {
            self.live.remove(child);
            self.destroyed.insert(*child);
        }

        let mut dependents: Vec<(u64, HandleKind)> = self
            .live
            .iter()
            .filter(|(_, t)| {
                t.parents
                    .iter()
                    .any(|parent| *parent == raw || owned_children.contains(parent))
            })
            .map(|(handle, t)| (*handle, t.kind))
            .collect();
        dependents.sort_unstable_by_key(|(handle, _)| *handle);
        for (handle, dependent_kind) in dependents {
            self.violations.push(format!(
                "{:?} {:#x} destroyed while {:?} {:#x} still depends on it",
                kind, raw, dependent_kind, handle
            ));
        }

        self.live.remove(&raw);
        self.destroyed.insert(raw);
        self.timeline.push(MockEvent::Destroyed(kind));
    }
}

impl Driver for MockDriver {
    fn create_instance(&mut self, desc: &InstanceDesc) -> VkResult<vk::Instance> {
        self.record(MockCall::CreateInstance)?;
        if self.live_instance().is_some() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        self.instance_desc = Some(desc.clone());
        Ok(vk::Instance::from_raw(self.mint(HandleKind::Instance, Vec::new())))
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.release(instance.as_raw(), HandleKind::Instance, None);
    }

    fn create_surface(
        &mut self,
        instance: vk::Instance,
        _display: RawDisplayHandle,
        _window: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.record(MockCall::CreateSurface)?;
        self.require(instance.as_raw(), HandleKind::Instance, "create_surface")?;
        let raw = self.mint(HandleKind::Surface, vec![instance.as_raw()]);
        Ok(vk::SurfaceKHR::from_raw(raw))
    }

    fn destroy_surface(&mut self, instance: vk::Instance, surface: vk::SurfaceKHR) {
        if self.require(instance.as_raw(), HandleKind::Instance, "destroy_surface").is_ok() {
            self.release(surface.as_raw(), HandleKind::Surface, None);
        }
    }

    fn enumerate_physical_devices(&self, instance: vk::Instance) -> VkResult<Vec<vk::PhysicalDevice>> {
        if !self.live_kind(instance.as_raw(), HandleKind::Instance) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        Ok((0..self.gpus.len() as u64)
            .map(|index| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + index))
            .collect())
    }

    fn physical_device_features(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceFeatures> {
        Ok(self.gpu(physical)?.features)
    }

    fn physical_device_properties(&self, physical: vk::PhysicalDevice) -> VkResult<vk::PhysicalDeviceProperties> {
        let gpu = self.gpu(physical)?;
        if let Some(code) = gpu.query_error {
            return Err(code);
        }
        let mut properties = vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_3,
            device_type: gpu.device_type,
            ..Default::default()
        };
        let capacity = properties.device_name.len() - 1;
        for (dst, src) in properties.device_name.iter_mut().zip(gpu.name.bytes().take(capacity)) {
            *dst = src as std::ffi::c_char;
        }
        Ok(properties)
    }

    fn physical_device_memory_properties(
        &self,
        physical: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        self.gpu(physical)?;
        let mut memory = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: 1,
            memory_heap_count: 1,
            ..Default::default()
        };
        memory.memory_types[0] = vk::MemoryType {
            property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            heap_index: 0,
        };
        memory.memory_heaps[0] = vk::MemoryHeap {
            size: 256 << 20,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        Ok(memory)
    }

    fn queue_family_properties(&self, physical: vk::PhysicalDevice) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .gpu(physical)?
            .queue_families
            .iter()
            .map(|family| vk::QueueFamilyProperties {
                queue_flags: family.flags,
                queue_count: family.queue_count,
                ..Default::default()
            })
            .collect())
    }

    fn surface_capabilities(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        if !self.live_kind(surface.as_raw(), HandleKind::Surface) {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(self.gpu(physical)?.capabilities)
    }

    fn surface_formats(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        if !self.live_kind(surface.as_raw(), HandleKind::Surface) {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(self.gpu(physical)?.formats.clone())
    }

    fn surface_present_modes(
        &self,
        physical: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        if !self.live_kind(surface.as_raw(), HandleKind::Surface) {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(self.gpu(physical)?.present_modes.clone())
    }

    fn surface_support(
        &self,
        physical: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        if !self.live_kind(surface.as_raw(), HandleKind::Surface) {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        }
        Ok(self
            .gpu(physical)?
            .queue_families
            .get(queue_family_index as usize)
            .map_or(false, |family| family.present))
    }

    fn create_device(&mut self, physical: vk::PhysicalDevice, desc: &DeviceDesc) -> VkResult<vk::Device> {
        self.record(MockCall::CreateDevice)?;
        let instance = self.live_instance().ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        let gpu_index = self.gpu_index(physical)?;
        let gpu = &self.gpus[gpu_index];

        let family = gpu
            .queue_families
            .get(desc.queue_family_index as usize)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        if desc.queue_priorities.is_empty() || desc.queue_priorities.len() as u32 > family.queue_count {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if desc.features.sampler_anisotropy == vk::TRUE && gpu.features.sampler_anisotropy != vk::TRUE {
            return Err(vk::Result::ERROR_FEATURE_NOT_PRESENT);
        }
        if desc.features.fill_mode_non_solid == vk::TRUE && gpu.features.fill_mode_non_solid != vk::TRUE {
            return Err(vk::Result::ERROR_FEATURE_NOT_PRESENT);
        }
        if !desc.extensions.iter().all(|ext| gpu.extensions.contains(ext)) {
            return Err(vk::Result::ERROR_EXTENSION_NOT_PRESENT);
        }

        let raw = self.mint(HandleKind::Device, vec![instance]);
        self.device_gpus.insert(raw, gpu_index);
        self.device_descs.insert(raw, desc.clone());
        Ok(vk::Device::from_raw(raw))
    }

    fn device_queue(&self, device: vk::Device, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        if !self.live_kind(device.as_raw(), HandleKind::Device) {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        let family = self
            .device_gpu(device)?
            .queue_families
            .get(queue_family_index as usize)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        if queue_index >= family.queue_count {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let raw = QUEUE_BASE
            | (device.as_raw() << 16)
            | (u64::from(queue_family_index) << 8)
            | u64::from(queue_index);
        Ok(vk::Queue::from_raw(raw))
    }

    fn device_wait_idle(&mut self, device: vk::Device) -> VkResult<()> {
        self.record(MockCall::DeviceWaitIdle)?;
        self.require(device.as_raw(), HandleKind::Device, "device_wait_idle")
    }

    fn destroy_device(&mut self, device: vk::Device) {
        self.release(device.as_raw(), HandleKind::Device, None);
    }

    fn create_swapchain(&mut self, device: vk::Device, desc: &SwapchainDesc) -> VkResult<vk::SwapchainKHR> {
        // Retirement happens on the call itself, before any outcome is known
        let old = desc.old_swapchain.as_raw();
        if old != 0 {
            if !self.retired_swapchains.insert(old) {
                self.violations
                    .push(format!("create_swapchain passed retired swapchain {:#x} as old", old));
            }
            self.active_swapchains.retain(|_, active| *active != old);
        }

        self.record(MockCall::CreateSwapchain)?;
        self.require(device.as_raw(), HandleKind::Device, "create_swapchain")?;
        self.require(desc.surface.as_raw(), HandleKind::Surface, "create_swapchain")?;

        let gpu = self.device_gpu(device)?;
        let caps = gpu.capabilities;
        if desc.extent.width == 0 || desc.extent.height == 0 {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if desc.min_image_count < caps.min_image_count
            || (caps.max_image_count > 0 && desc.min_image_count > caps.max_image_count)
        {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let format_supported = gpu.formats.iter().any(|f| {
            f.format == desc.surface_format.format && f.color_space == desc.surface_format.color_space
        });
        if !format_supported {
            return Err(vk::Result::ERROR_FORMAT_NOT_SUPPORTED);
        }
        if !gpu.present_modes.contains(&desc.present_mode) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        // A surface holds one non-retired swapchain; replacing it requires passing it as old
        let surface = desc.surface.as_raw();
        if self.active_swapchains.contains_key(&surface) {
            return Err(vk::Result::ERROR_NATIVE_WINDOW_IN_USE_KHR);
        }

        let raw = self.mint(HandleKind::Swapchain, vec![device.as_raw(), surface]);
        for _ in 0..desc.min_image_count {
            self.mint(HandleKind::Image, vec![raw]);
        }
        self.active_swapchains.insert(surface, raw);
        self.swapchain_descs.insert(raw, *desc);
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, device: vk::Device, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        if !self.live_kind(device.as_raw(), HandleKind::Device)
            || !self.live_kind(swapchain.as_raw(), HandleKind::Swapchain)
        {
            return Err(vk::Result::ERROR_DEVICE_LOST);
        }
        let mut images: Vec<u64> = self
            .live
            .iter()
            .filter(|(_, t)| t.kind == HandleKind::Image && t.parents.contains(&swapchain.as_raw()))
            .map(|(raw, _)| *raw)
            .collect();
        images.sort_unstable();
        Ok(images.into_iter().map(vk::Image::from_raw).collect())
    }

    fn destroy_swapchain(&mut self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        if self.require(device.as_raw(), HandleKind::Device, "destroy_swapchain").is_err() {
            return;
        }
        let raw = swapchain.as_raw();
        self.active_swapchains.retain(|_, active| *active != raw);
        self.release(raw, HandleKind::Swapchain, Some(HandleKind::Image));
    }

    fn create_image_view(
        &mut self,
        device: vk::Device,
        image: vk::Image,
        _format: vk::Format,
    ) -> VkResult<vk::ImageView> {
        self.record(MockCall::CreateImageView)?;
        self.require(device.as_raw(), HandleKind::Device, "create_image_view")?;
        self.require(image.as_raw(), HandleKind::Image, "create_image_view")?;
        let raw = self.mint(HandleKind::ImageView, vec![device.as_raw(), image.as_raw()]);
        Ok(vk::ImageView::from_raw(raw))
    }

    fn destroy_image_view(&mut self, _device: vk::Device, view: vk::ImageView) {
        self.release(view.as_raw(), HandleKind::ImageView, None);
    }

    fn create_render_pass(&mut self, device: vk::Device, desc: &RenderPassDesc) -> VkResult<vk::RenderPass> {
        self.record(MockCall::CreateRenderPass)?;
        self.require(device.as_raw(), HandleKind::Device, "create_render_pass")?;
        let raw = self.mint(HandleKind::RenderPass, vec![device.as_raw()]);
        self.render_pass_descs.insert(raw, *desc);
        Ok(vk::RenderPass::from_raw(raw))
    }

    fn destroy_render_pass(&mut self, _device: vk::Device, render_pass: vk::RenderPass) {
        self.release(render_pass.as_raw(), HandleKind::RenderPass, None);
    }

    fn create_framebuffer(
        &mut self,
        device: vk::Device,
        render_pass: vk::RenderPass,
        attachment: vk::ImageView,
        extent: vk::Extent2D,
    ) -> VkResult<vk::Framebuffer> {
        self.record(MockCall::CreateFramebuffer)?;
        self.require(device.as_raw(), HandleKind::Device, "create_framebuffer")?;
        self.require(render_pass.as_raw(), HandleKind::RenderPass, "create_framebuffer")?;
        self.require(attachment.as_raw(), HandleKind::ImageView, "create_framebuffer")?;
        if extent.width == 0 || extent.height == 0 {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let raw = self.mint(
            HandleKind::Framebuffer,
            vec![device.as_raw(), render_pass.as_raw(), attachment.as_raw()],
        );
        Ok(vk::Framebuffer::from_raw(raw))
    }

    fn destroy_framebuffer(&mut self, _device: vk::Device, framebuffer: vk::Framebuffer) {
        self.release(framebuffer.as_raw(), HandleKind::Framebuffer, None);
    }

    fn create_command_pool(
        &mut self,
        device: vk::Device,
        queue_family_index: u32,
        _flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<vk::CommandPool> {
        self.record(MockCall::CreateCommandPool)?;
        self.require(device.as_raw(), HandleKind::Device, "create_command_pool")?;
        if self.device_gpu(device)?.queue_families.len() <= queue_family_index as usize {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let raw = self.mint(HandleKind::CommandPool, vec![device.as_raw()]);
        Ok(vk::CommandPool::from_raw(raw))
    }

    fn allocate_command_buffers(
        &mut self,
        device: vk::Device,
        pool: vk::CommandPool,
        _level: vk::CommandBufferLevel,
        count: u32,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.record(MockCall::AllocateCommandBuffers)?;
        self.require(device.as_raw(), HandleKind::Device, "allocate_command_buffers")?;
        self.require(pool.as_raw(), HandleKind::CommandPool, "allocate_command_buffers")?;
        Ok((0..count)
            .map(|_| vk::CommandBuffer::from_raw(self.mint(HandleKind::CommandBuffer, vec![pool.as_raw()])))
            .collect())
    }

    fn free_command_buffers(&mut self, _device: vk::Device, _pool: vk::CommandPool, buffers: &[vk::CommandBuffer]) {
        for buffer in buffers {
            self.release(buffer.as_raw(), HandleKind::CommandBuffer, None);
        }
    }

    fn destroy_command_pool(&mut self, _device: vk::Device, pool: vk::CommandPool) {
        self.release(pool.as_raw(), HandleKind::CommandPool, Some(HandleKind::CommandBuffer));
    }

    fn create_descriptor_pool(
        &mut self,
        device: vk::Device,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VkResult<vk::DescriptorPool> {
        self.record(MockCall::CreateDescriptorPool)?;
        self.require(device.as_raw(), HandleKind::Device, "create_descriptor_pool")?;
        if max_sets == 0 || pool_sizes.iter().any(|size| size.descriptor_count == 0) {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let raw = self.mint(HandleKind::DescriptorPool, vec![device.as_raw()]);
        let sizes = pool_sizes.iter().map(|size| (size.ty, size.descriptor_count)).collect();
        self.descriptor_pools.insert(raw, (max_sets, sizes));
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn destroy_descriptor_pool(&mut self, _device: vk::Device, pool: vk::DescriptorPool) {
        self.release(pool.as_raw(), HandleKind::DescriptorPool, None);
    }

    fn create_semaphore(&mut self, device: vk::Device) -> VkResult<vk::Semaphore> {
        self.record(MockCall::CreateSemaphore)?;
        self.require(device.as_raw(), HandleKind::Device, "create_semaphore")?;
        Ok(vk::Semaphore::from_raw(self.mint(HandleKind::Semaphore, vec![device.as_raw()])))
    }

    fn destroy_semaphore(&mut self, _device: vk::Device, semaphore: vk::Semaphore) {
        self.release(semaphore.as_raw(), HandleKind::Semaphore, None);
    }

    fn create_shader_module(&mut self, device: vk::Device, code: &[u32]) -> VkResult<vk::ShaderModule> {
        self.record(MockCall::CreateShaderModule)?;
        self.require(device.as_raw(), HandleKind::Device, "create_shader_module")?;
        if code.first() != Some(&SPIRV_MAGIC) {
            return Err(vk::Result::ERROR_INVALID_SHADER_NV);
        }
        Ok(vk::ShaderModule::from_raw(self.mint(HandleKind::ShaderModule, vec![device.as_raw()])))
    }

    fn destroy_shader_module(&mut self, _device: vk::Device, module: vk::ShaderModule) {
        self.release(module.as_raw(), HandleKind::ShaderModule, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raw_window_handle::{XlibDisplayHandle, XlibWindowHandle};

    fn headless() -> (RawDisplayHandle, RawWindowHandle) {
        (
            RawDisplayHandle::Xlib(XlibDisplayHandle::empty()),
            RawWindowHandle::Xlib(XlibWindowHandle::empty()),
        )
    }

    fn instance_desc() -> InstanceDesc {
        InstanceDesc {
            application_name: c"test".to_owned(),
            application_version: 0,
            engine_name: c"test".to_owned(),
            engine_version: 0,
            api_version: vk::API_VERSION_1_0,
            extensions: Vec::new(),
            layers: Vec::new(),
        }
    }

    #[test]
    fn destroying_parent_before_child_is_a_violation() {
        let mut driver = MockDriver::default();
        let (display, window) = headless();
        let instance = driver.create_instance(&instance_desc()).unwrap();
        let surface = driver.create_surface(instance, display, window).unwrap();

        driver.destroy_instance(instance);
        assert_eq!(driver.violations().len(), 1);
        assert!(driver.violations()[0].contains("Surface"));
        assert!(driver.is_live(surface));
    }

    #[test]
    fn double_destroy_is_a_violation() {
        let mut driver = MockDriver::default();
        let instance = driver.create_instance(&instance_desc()).unwrap();
        driver.destroy_instance(instance);
        driver.destroy_instance(instance);
        assert_eq!(driver.violations().len(), 1);
        assert!(driver.violations()[0].starts_with("double destroy: Instance"));
    }

    #[test]
    fn injected_failure_fires_once() {
        let mut driver = MockDriver::default();
        driver.fail_next(MockCall::CreateInstance, vk::Result::ERROR_INCOMPATIBLE_DRIVER);

        assert_eq!(
            driver.create_instance(&instance_desc()),
            Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER)
        );
        assert!(driver.create_instance(&instance_desc()).is_ok());
        assert_eq!(driver.call_count(MockCall::CreateInstance), 2);
    }

    #[test]
    fn physical_device_name_round_trips_through_properties() {
        let mut driver = MockDriver::new(vec![MockGpu::named("Fake RTX", vk::PhysicalDeviceType::DISCRETE_GPU)]);
        let instance = driver.create_instance(&instance_desc()).unwrap();
        let physical = driver.enumerate_physical_devices(instance).unwrap()[0];
        let properties = driver.physical_device_properties(physical).unwrap();
        let name: String = properties
            .device_name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8 as char)
            .collect();
        assert_eq!(name, "Fake RTX");
    }
}
