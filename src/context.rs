// Render context - owns every setup stage and drives them in order
//
// Creation:  instance -> surface -> physical device -> logical device ->
//            swapchain -> image views -> render pass -> framebuffers ->
//            command pool/buffers + semaphores -> descriptor pool
// Teardown:  the exact reverse, after the device is idle.

use ash::vk;
use std::path::Path;

use crate::backend::command::{create_command_resources, CommandResources};
use crate::backend::descriptor::{create_descriptor_pool, DescriptorResources};
use crate::backend::device::{create_logical_device, select_physical_device, LogicalDevice, PhysicalDevice};
use crate::backend::driver::Driver;
use crate::backend::framebuffer::{create_framebuffers, Framebuffers};
use crate::backend::instance::{create_instance, Instance};
use crate::backend::render_pass::{create_render_pass, RenderPass};
use crate::backend::shader::{self, ShaderModule};
use crate::backend::surface::{bind_surface, Surface};
use crate::backend::swapchain::{
    create_image_views, create_swapchain, create_swapchain_from, describe_swapchain, ImageViews, Swapchain,
};
use crate::backend::sync::FrameSemaphores;
use crate::config::Config;
use crate::error::{BootstrapError, Result, Stage};
use crate::window::WindowSource;

/// Where the setup pipeline currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    InstanceReady,
    SurfaceReady,
    DeviceSelected,
    DeviceReady,
    SwapchainReady,
    ViewsReady,
    RenderPassReady,
    FramebuffersReady,
    CommandResourcesReady,
    DescriptorResourcesReady,
    /// Terminal until `teardown`
    Failed {
        stage: Stage,
        code: Option<vk::Result>,
    },
}

impl PipelineState {
    pub fn is_ready(&self) -> bool {
        *self == PipelineState::DescriptorResourcesReady
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineState::Failed { .. })
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    log::debug!("Pipeline state: {:?} -> {:?}", state, next);
    *state = next;
}

pub struct RenderContext<D: Driver> {
    driver: D,
    config: Config,
    state: PipelineState,

    instance: Option<Instance>,
    surface: Option<Surface>,
    physical: Option<PhysicalDevice>,
    device: Option<LogicalDevice>,
    swapchain: Option<Swapchain>,
    image_views: Option<ImageViews>,
    render_pass: Option<RenderPass>,
    framebuffers: Option<Framebuffers>,
    commands: Option<CommandResources>,
    semaphores: Option<FrameSemaphores>,
    descriptors: Option<DescriptorResources>,
    shader_modules: Vec<ShaderModule>,
    /// The live swapchain was handed to the driver as `old_swapchain` by a
    /// failed resize and can no longer acquire images
    swapchain_retired: bool,
}

impl<D: Driver> RenderContext<D> {
    pub fn new(driver: D, config: Config) -> Self {
        Self {
            driver,
            config,
            state: PipelineState::Uninitialized,
            instance: None,
            surface: None,
            physical: None,
            device: None,
            swapchain: None,
            image_views: None,
            render_pass: None,
            framebuffers: None,
            commands: None,
            semaphores: None,
            descriptors: None,
            shader_modules: Vec::new(),
            swapchain_retired: false,
        }
    }

    /// Run every stage against `window`. On failure the state becomes
    /// `Failed` and whatever was already built stays until `teardown`.
    pub fn initialize<W: WindowSource + ?Sized>(&mut self, window: &W) -> Result<()> {
        if self.state != PipelineState::Uninitialized {
            return Err(BootstrapError::init(
                Stage::Instance,
                format!("context is {:?}; tear it down before initializing again", self.state),
            ));
        }

        match self.build(window) {
            Ok(()) => {
                log::info!(
                    "Render context ready: {} swapchain images",
                    self.image_count()
                );
                Ok(())
            }
            Err(e) => {
                log::error!("Render context initialization failed: {}", e);
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn build<W: WindowSource + ?Sized>(&mut self, window: &W) -> Result<()> {
        let extensions = window
            .required_extensions()
            .map_err(|code| BootstrapError::init(Stage::Instance, code))?;

        let instance = self.instance.insert(create_instance(
            &mut self.driver,
            &self.config.application,
            &self.config.debug,
            extensions,
        )?);
        transition(&mut self.state, PipelineState::InstanceReady);

        let surface = self.surface.insert(bind_surface(&mut self.driver, instance, window)?);
        transition(&mut self.state, PipelineState::SurfaceReady);

        let physical = self.physical.insert(select_physical_device(
            &self.driver,
            instance,
            surface,
            self.config.device.selection_policy(),
        )?);
        transition(&mut self.state, PipelineState::DeviceSelected);

        let family = physical.graphics_present_family().ok_or_else(|| {
            BootstrapError::surface_unsupported(
                Stage::LogicalDevice,
                "selected device has no graphics+present queue family",
            )
        })?;
        let device = self.device.insert(create_logical_device(
            &mut self.driver,
            physical,
            family,
            &self.config.device,
        )?);
        transition(&mut self.state, PipelineState::DeviceReady);

        let swapchain = self.swapchain.insert(create_swapchain(
            &mut self.driver,
            surface,
            physical,
            device,
            &self.config.swapchain,
            window.inner_extent(),
            None,
        )?);
        transition(&mut self.state, PipelineState::SwapchainReady);

        let views = self
            .image_views
            .insert(create_image_views(&mut self.driver, device, swapchain)?);
        transition(&mut self.state, PipelineState::ViewsReady);

        let render_pass = self
            .render_pass
            .insert(create_render_pass(&mut self.driver, device, swapchain.format())?);
        transition(&mut self.state, PipelineState::RenderPassReady);

        self.framebuffers = Some(create_framebuffers(
            &mut self.driver,
            device,
            render_pass,
            views,
            swapchain.extent,
        )?);
        transition(&mut self.state, PipelineState::FramebuffersReady);

        self.commands = Some(create_command_resources(
            &mut self.driver,
            device,
            swapchain.image_count(),
        )?);
        self.semaphores = Some(FrameSemaphores::new(&mut self.driver, device)?);
        transition(&mut self.state, PipelineState::CommandResourcesReady);

        self.descriptors = Some(create_descriptor_pool(
            &mut self.driver,
            device,
            &self.config.descriptors,
        )?);
        transition(&mut self.state, PipelineState::DescriptorResourcesReady);

        Ok(())
    }

    fn fail(&mut self, error: &BootstrapError) {
        transition(
            &mut self.state,
            PipelineState::Failed {
                stage: error.stage(),
                code: error.code(),
            },
        );
    }

    /// Destroy everything in reverse creation order and return to
    /// `Uninitialized`. Safe to call in any state, any number of times.
    pub fn teardown(&mut self) {
        if let Some(device) = &self.device {
            if let Err(e) = device.wait_idle(&mut self.driver) {
                log::warn!("Device wait idle failed during teardown: {:?}", e);
            }
        }

        if !self.shader_modules.is_empty() {
            log::warn!(
                "Destroying {} shader module(s) still owned by the context",
                self.shader_modules.len()
            );
        }
        while let Some(module) = self.shader_modules.pop() {
            module.destroy(&mut self.driver);
        }

        if let Some(descriptors) = self.descriptors.take() {
            descriptors.destroy(&mut self.driver);
        }
        if let Some(semaphores) = self.semaphores.take() {
            semaphores.destroy(&mut self.driver);
        }
        if let Some(commands) = self.commands.take() {
            commands.destroy(&mut self.driver);
        }
        if let Some(framebuffers) = self.framebuffers.take() {
            framebuffers.destroy(&mut self.driver);
        }
        if let Some(render_pass) = self.render_pass.take() {
            render_pass.destroy(&mut self.driver);
        }
        if let Some(views) = self.image_views.take() {
            views.destroy(&mut self.driver);
        }
        if let Some(swapchain) = self.swapchain.take() {
            swapchain.destroy(&mut self.driver);
        }
        if let Some(device) = self.device.take() {
            device.destroy(&mut self.driver);
        }
        self.physical = None;
        if let Some(surface) = self.surface.take() {
            surface.destroy(&mut self.driver);
        }
        if let Some(instance) = self.instance.take() {
            instance.destroy(&mut self.driver);
            log::info!("Render context torn down");
        }

        self.swapchain_retired = false;
        self.state = PipelineState::Uninitialized;
    }

    /// Recreate the swapchain for a new window size.
    ///
    /// A degenerate extent is rejected before touching the driver. If the new
    /// swapchain cannot be created the old one and everything built on it is
    /// left in place, but once the driver has seen it as `old_swapchain` it is
    /// retired: `needs_resize` turns true and the caller must resize again
    /// before presenting. Failures after the old swapchain is destroyed leave
    /// the context `Failed`.
    pub fn resize(&mut self, extent: vk::Extent2D) -> Result<()> {
        if extent.width == 0 || extent.height == 0 {
            return Err(BootstrapError::swapchain(format!(
                "degenerate extent {}x{}",
                extent.width, extent.height
            )));
        }
        if !self.state.is_ready() {
            return Err(BootstrapError::swapchain(format!(
                "cannot resize while {:?}",
                self.state
            )));
        }

        let (Some(surface), Some(physical), Some(device), Some(old)) =
            (&self.surface, &self.physical, &self.device, &self.swapchain)
        else {
            return Err(BootstrapError::swapchain("context is missing swapchain prerequisites"));
        };

        // Nothing may still reference the views and framebuffers about to go
        device.wait_idle(&mut self.driver).map_err(BootstrapError::swapchain)?;

        log::info!("Resizing swapchain to {}x{}", extent.width, extent.height);
        let mut desc = describe_swapchain(&self.driver, surface, physical, &self.config.swapchain, extent)?;
        // A retired swapchain may not be passed as old a second time
        if !self.swapchain_retired {
            desc.old_swapchain = old.handle;
        }
        let new = match create_swapchain_from(&mut self.driver, device, &desc) {
            Ok(new) => new,
            Err(e) => {
                self.swapchain_retired = true;
                log::warn!("Swapchain recreation failed, retry resize before presenting: {}", e);
                return Err(e);
            }
        };
        self.swapchain_retired = false;

        if let Some(framebuffers) = self.framebuffers.take() {
            framebuffers.destroy(&mut self.driver);
        }
        if let Some(views) = self.image_views.take() {
            views.destroy(&mut self.driver);
        }
        if let Some(old) = self.swapchain.replace(new) {
            old.destroy(&mut self.driver);
        }

        self.rebuild_swapchain_resources().map_err(|e| {
            log::error!("Swapchain resources could not be rebuilt: {}", e);
            self.fail(&e);
            e
        })
    }

    fn rebuild_swapchain_resources(&mut self) -> Result<()> {
        let (Some(device), Some(swapchain)) = (&self.device, &self.swapchain) else {
            return Err(BootstrapError::swapchain("context is missing its swapchain"));
        };

        let views = self
            .image_views
            .insert(create_image_views(&mut self.driver, device, swapchain)?);

        // The format is fixed by config, so the render pass outlives every resize
        let Some(render_pass) = &self.render_pass else {
            return Err(BootstrapError::resource(Stage::RenderPass, "render pass missing"));
        };

        self.framebuffers = Some(create_framebuffers(
            &mut self.driver,
            device,
            render_pass,
            views,
            swapchain.extent,
        )?);

        if let Some(commands) = self.commands.as_mut() {
            if commands.buffers.len() != swapchain.images.len() {
                commands.reallocate(&mut self.driver, swapchain.image_count())?;
            }
        }

        Ok(())
    }

    /// Compile SPIR-V bytes on the live device. The context owns the module
    /// until `destroy_shader_module` or teardown.
    pub fn create_shader_module(&mut self, bytes: &[u8]) -> Result<vk::ShaderModule> {
        let Some(device) = &self.device else {
            return Err(BootstrapError::resource(Stage::ShaderModule, "no logical device"));
        };
        let module = shader::create_shader_module(&mut self.driver, device, bytes)?;
        let handle = module.handle;
        self.shader_modules.push(module);
        Ok(handle)
    }

    pub fn load_shader_module<P: AsRef<Path>>(&mut self, path: P) -> Result<vk::ShaderModule> {
        let bytes = shader::load_shader_bytes(path)?;
        self.create_shader_module(&bytes)
    }

    /// Returns false if the module is not owned by this context
    pub fn destroy_shader_module(&mut self, module: vk::ShaderModule) -> bool {
        match self.shader_modules.iter().position(|m| m.handle == module) {
            Some(index) => {
                self.shader_modules.remove(index).destroy(&mut self.driver);
                true
            }
            None => {
                log::warn!("Shader module {:?} is not owned by this context", module);
                false
            }
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// A failed resize left the swapchain retired; resize again before presenting
    pub fn needs_resize(&self) -> bool {
        self.swapchain_retired
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct driver access, e.g. for failure injection on a mock
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    pub fn physical_device(&self) -> Option<&PhysicalDevice> {
        self.physical.as_ref()
    }

    pub fn device(&self) -> Option<&LogicalDevice> {
        self.device.as_ref()
    }

    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    pub fn image_count(&self) -> u32 {
        self.swapchain.as_ref().map_or(0, Swapchain::image_count)
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        self.image_views.as_ref().map_or(&[], |views| views.handles.as_slice())
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass.as_ref().map(|rp| rp.handle)
    }

    pub fn framebuffers(&self) -> &[vk::Framebuffer] {
        self.framebuffers.as_ref().map_or(&[], |fb| fb.handles.as_slice())
    }

    pub fn command_pool(&self) -> Option<vk::CommandPool> {
        self.commands.as_ref().map(|c| c.pool)
    }

    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        self.commands.as_ref().map_or(&[], |c| c.buffers.as_slice())
    }

    pub fn semaphores(&self) -> Option<&FrameSemaphores> {
        self.semaphores.as_ref()
    }

    pub fn descriptor_pool(&self) -> Option<&DescriptorResources> {
        self.descriptors.as_ref()
    }
}

impl<D: Driver> Drop for RenderContext<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
