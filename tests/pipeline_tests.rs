// End-to-end setup pipeline scenarios against the mock driver

use ash::vk;
use std::collections::HashSet;

use vk_bootstrap_core::backend::device::{create_logical_device, select_physical_device, SelectionPolicy};
use vk_bootstrap_core::backend::instance::create_instance;
use vk_bootstrap_core::backend::mock::{HandleKind, MockCall, MockDriver, MockEvent, MockGpu, MockQueueFamily};
use vk_bootstrap_core::backend::shader::SPIRV_MAGIC;
use vk_bootstrap_core::backend::surface::bind_surface;
use vk_bootstrap_core::config::DeviceConfig;
use vk_bootstrap_core::{BootstrapError, Config, HeadlessWindow, PipelineState, RenderContext, Stage};

fn window() -> HeadlessWindow {
    HeadlessWindow::new(1280, 720)
}

fn extent(width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D { width, height }
}

fn context_with(driver: MockDriver) -> RenderContext<MockDriver> {
    RenderContext::new(driver, Config::default())
}

fn ready_context() -> RenderContext<MockDriver> {
    let mut ctx = context_with(MockDriver::default());
    ctx.initialize(&window()).unwrap();
    ctx
}

fn assert_symmetric(ctx: &RenderContext<MockDriver>) {
    let count = ctx.image_count() as usize;
    assert_eq!(ctx.image_views().len(), count);
    assert_eq!(ctx.framebuffers().len(), count);
    assert_eq!(ctx.command_buffers().len(), count);
}

fn assert_clean_teardown(ctx: &mut RenderContext<MockDriver>) {
    ctx.teardown();
    assert_eq!(ctx.state(), PipelineState::Uninitialized);
    assert!(ctx.driver().violations().is_empty(), "{:#?}", ctx.driver().violations());
    assert_eq!(ctx.driver().live_count(), 0);
}

fn spirv(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

#[test]
fn end_to_end_reaches_descriptor_resources_ready() {
    let mut ctx = ready_context();

    assert_eq!(ctx.state(), PipelineState::DescriptorResourcesReady);
    assert_eq!(ctx.image_count(), 3);
    assert_eq!(ctx.image_views().len(), 3);
    assert_eq!(ctx.framebuffers().len(), 3);
    assert_eq!(ctx.command_buffers().len(), 3);

    let driver = ctx.driver();
    assert_eq!(driver.live_count_of(HandleKind::Instance), 1);
    assert_eq!(driver.live_count_of(HandleKind::Surface), 1);
    assert_eq!(driver.live_count_of(HandleKind::Device), 1);
    assert_eq!(driver.live_count_of(HandleKind::Swapchain), 1);
    assert_eq!(driver.live_count_of(HandleKind::RenderPass), 1);
    assert_eq!(driver.live_count_of(HandleKind::CommandPool), 1);
    assert_eq!(driver.live_count_of(HandleKind::DescriptorPool), 1);
    assert_eq!(driver.live_count_of(HandleKind::Semaphore), 2);
    assert!(driver.violations().is_empty());

    let swapchain = ctx.swapchain().unwrap();
    let desc = driver.swapchain_desc(swapchain.handle).unwrap();
    assert_eq!(desc.min_image_count, 3);
    assert_eq!(desc.surface_format.format, vk::Format::B8G8R8A8_UNORM);
    assert_eq!(desc.surface_format.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    assert_eq!(desc.present_mode, vk::PresentModeKHR::FIFO);
    assert_eq!(desc.image_usage, vk::ImageUsageFlags::COLOR_ATTACHMENT);
    assert_eq!(desc.extent, extent(1280, 720));
    assert_eq!(desc.old_swapchain, vk::SwapchainKHR::null());

    let pool = ctx.descriptor_pool().unwrap().pool;
    let (max_sets, sizes) = driver.descriptor_pool_layout(pool).unwrap();
    assert_eq!(*max_sets, 1);
    assert_eq!(
        sizes,
        &vec![
            (vk::DescriptorType::UNIFORM_BUFFER, 1),
            (vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1)
        ]
    );

    assert_clean_teardown(&mut ctx);
}

#[test]
fn image_count_is_clamped_and_symmetric() {
    for (requested, min, max, expected) in [(3, 3, 8, 3), (5, 3, 8, 5), (12, 3, 8, 8), (1, 2, 8, 2), (6, 2, 0, 6)] {
        let mut gpu = MockGpu::default();
        gpu.capabilities.min_image_count = min;
        gpu.capabilities.max_image_count = max;
        let mut config = Config::default();
        config.swapchain.image_count = requested;

        let mut ctx = RenderContext::new(MockDriver::new(vec![gpu]), config);
        ctx.initialize(&window()).unwrap();

        assert_eq!(ctx.image_count(), expected, "requested {} in [{}, {}]", requested, min, max);
        assert!(ctx.image_count() >= min);
        assert!(max == 0 || ctx.image_count() <= max);
        assert_symmetric(&ctx);
        assert_clean_teardown(&mut ctx);
    }
}

#[test]
fn teardown_is_idempotent() {
    let mut ctx = ready_context();
    assert_clean_teardown(&mut ctx);
    assert_clean_teardown(&mut ctx);

    assert!(ctx.instance().is_none());
    assert!(ctx.device().is_none());
    assert!(ctx.image_views().is_empty());
    assert_eq!(ctx.image_count(), 0);
}

#[test]
fn teardown_destroys_in_reverse_creation_order() {
    let mut ctx = ready_context();
    ctx.teardown();

    // The mock flags any parent destroyed before its children
    assert!(ctx.driver().violations().is_empty());

    let calls = ctx.driver().calls();
    let position = |call: MockCall| calls.iter().position(|&c| c == call).unwrap();
    assert!(position(MockCall::CreateInstance) < position(MockCall::CreateSurface));
    assert!(position(MockCall::CreateSurface) < position(MockCall::CreateDevice));
    assert!(position(MockCall::CreateDevice) < position(MockCall::CreateSwapchain));
    assert!(position(MockCall::CreateSwapchain) < position(MockCall::CreateImageView));
    assert!(position(MockCall::CreateImageView) < position(MockCall::CreateRenderPass));
    assert!(position(MockCall::CreateRenderPass) < position(MockCall::CreateFramebuffer));
    assert!(position(MockCall::CreateFramebuffer) < position(MockCall::CreateCommandPool));
    assert!(position(MockCall::CreateCommandPool) < position(MockCall::CreateDescriptorPool));
}

#[test]
fn context_can_initialize_again_after_teardown() {
    let mut ctx = ready_context();
    ctx.teardown();

    ctx.initialize(&window()).unwrap();
    assert!(ctx.state().is_ready());
    assert_symmetric(&ctx);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn resize_keeps_core_handles_and_replaces_views() {
    let mut ctx = ready_context();

    let instance = ctx.instance().unwrap().handle;
    let surface = ctx.surface().unwrap().handle;
    let device = ctx.device().unwrap().handle;
    let render_pass = ctx.render_pass().unwrap();
    let command_buffers = ctx.command_buffers().to_vec();
    let old_swapchain = ctx.swapchain().unwrap().handle;
    let old_views: HashSet<_> = ctx.image_views().iter().copied().collect();
    let old_framebuffers: HashSet<_> = ctx.framebuffers().iter().copied().collect();

    ctx.resize(extent(1920, 1080)).unwrap();

    assert!(ctx.state().is_ready());
    assert_eq!(ctx.instance().unwrap().handle, instance);
    assert_eq!(ctx.surface().unwrap().handle, surface);
    assert_eq!(ctx.device().unwrap().handle, device);
    assert_eq!(ctx.render_pass().unwrap(), render_pass);
    assert_eq!(ctx.command_buffers(), command_buffers.as_slice());

    let new_swapchain = ctx.swapchain().unwrap().handle;
    assert_ne!(new_swapchain, old_swapchain);
    assert_eq!(ctx.swapchain().unwrap().extent, extent(1920, 1080));

    let desc = ctx.driver().swapchain_desc(new_swapchain).unwrap();
    assert_eq!(desc.old_swapchain, old_swapchain);
    assert!(!ctx.driver().is_live(old_swapchain));

    assert!(ctx.image_views().iter().all(|view| !old_views.contains(view)));
    assert!(ctx.framebuffers().iter().all(|fb| !old_framebuffers.contains(fb)));
    assert!(old_views.iter().all(|&view| !ctx.driver().is_live(view)));
    assert_symmetric(&ctx);

    assert_eq!(ctx.driver().call_count(MockCall::CreateInstance), 1);
    assert_eq!(ctx.driver().call_count(MockCall::CreateSurface), 1);
    assert_eq!(ctx.driver().call_count(MockCall::CreateDevice), 1);
    assert_eq!(ctx.driver().call_count(MockCall::CreateRenderPass), 1);

    assert_clean_teardown(&mut ctx);
}

#[test]
fn resize_reallocates_command_buffers_when_image_count_changes() {
    let mut ctx = ready_context();
    assert_eq!(ctx.image_count(), 3);

    if let Some(gpu) = ctx.driver_mut().gpu_mut(0) {
        gpu.capabilities.min_image_count = 4;
    }
    ctx.resize(extent(800, 600)).unwrap();

    assert_eq!(ctx.image_count(), 4);
    assert_symmetric(&ctx);
    assert_eq!(ctx.driver().call_count(MockCall::AllocateCommandBuffers), 2);
    assert_eq!(ctx.driver().live_count_of(HandleKind::CommandBuffer), 4);

    assert_clean_teardown(&mut ctx);
}

#[test]
fn degenerate_resize_allocates_nothing() {
    let mut ctx = ready_context();
    let calls_before = ctx.driver().calls().len();
    let live_before = ctx.driver().live_count();
    let swapchain = ctx.swapchain().unwrap().handle;

    for degenerate in [extent(0, 0), extent(0, 600), extent(800, 0)] {
        let err = ctx.resize(degenerate).unwrap_err();
        assert!(matches!(err, BootstrapError::SwapchainCreation { .. }));
    }

    assert_eq!(ctx.driver().calls().len(), calls_before);
    assert_eq!(ctx.driver().live_count(), live_before);
    assert_eq!(ctx.swapchain().unwrap().handle, swapchain);
    assert!(ctx.state().is_ready());

    assert_clean_teardown(&mut ctx);
}

#[test]
fn degenerate_window_fails_swapchain_stage() {
    let mut ctx = context_with(MockDriver::default());

    let err = ctx.initialize(&HeadlessWindow::new(0, 0)).unwrap_err();
    assert!(matches!(err, BootstrapError::SwapchainCreation { .. }));
    assert_eq!(
        ctx.state(),
        PipelineState::Failed {
            stage: Stage::Swapchain,
            code: None
        }
    );
    assert_eq!(ctx.driver().call_count(MockCall::CreateSwapchain), 0);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn failed_swapchain_recreation_keeps_the_old_one() {
    let mut ctx = ready_context();
    let swapchain = ctx.swapchain().unwrap().handle;
    let views = ctx.image_views().to_vec();

    ctx.driver_mut()
        .fail_next(MockCall::CreateSwapchain, vk::Result::ERROR_SURFACE_LOST_KHR);
    let err = ctx.resize(extent(640, 480)).unwrap_err();

    assert_eq!(err.code(), Some(vk::Result::ERROR_SURFACE_LOST_KHR));
    assert!(ctx.state().is_ready());
    assert_eq!(ctx.swapchain().unwrap().handle, swapchain);
    assert_eq!(ctx.image_views(), views.as_slice());
    assert!(ctx.driver().is_live(swapchain));

    // The driver retired it on the failed call; only another resize recovers
    assert!(ctx.driver().is_retired(swapchain));
    assert!(ctx.needs_resize());

    ctx.resize(extent(640, 480)).unwrap();
    assert!(!ctx.needs_resize());
    assert!(!ctx.driver().is_live(swapchain));
    let replacement = ctx.swapchain().unwrap().handle;
    assert_eq!(
        ctx.driver().swapchain_desc(replacement).unwrap().old_swapchain,
        vk::SwapchainKHR::null()
    );
    assert_symmetric(&ctx);

    assert_clean_teardown(&mut ctx);
}

#[test]
fn rejected_resize_request_does_not_retire_the_swapchain() {
    let mut ctx = ready_context();
    let swapchain = ctx.swapchain().unwrap().handle;

    // The surface now reports a zero-sized extent; nothing reaches swapchain creation
    ctx.driver_mut().gpu_mut(0).unwrap().capabilities.current_extent = extent(0, 0);
    let err = ctx.resize(extent(640, 480)).unwrap_err();

    assert!(matches!(err, BootstrapError::SwapchainCreation { .. }));
    assert_eq!(ctx.driver().call_count(MockCall::CreateSwapchain), 1);
    assert!(!ctx.driver().is_retired(swapchain));
    assert!(!ctx.needs_resize());
    assert!(ctx.state().is_ready());

    assert_clean_teardown(&mut ctx);
}

#[test]
fn unknown_swapchain_names_fail_before_the_driver() {
    for (format, present_mode) in [("r5g6b5_unorm", "fifo"), ("b8g8r8a8_unorm", "mailbox_please")] {
        let mut config = Config::default();
        config.swapchain.format = format.to_string();
        config.swapchain.present_mode = present_mode.to_string();

        let mut ctx = RenderContext::new(MockDriver::default(), config);
        let err = ctx.initialize(&window()).unwrap_err();

        assert!(matches!(err, BootstrapError::SwapchainCreation { .. }), "{}", err);
        assert!(matches!(
            ctx.state(),
            PipelineState::Failed {
                stage: Stage::Swapchain,
                ..
            }
        ));
        assert_eq!(ctx.driver().call_count(MockCall::CreateSwapchain), 0);
        assert!(ctx.swapchain().is_none());
        assert_clean_teardown(&mut ctx);
    }
}

/// Positions of the first wait-idle and the first destruction
fn wait_and_first_destroy(events: &[MockEvent]) -> (Option<usize>, Option<usize>) {
    let wait = events
        .iter()
        .position(|e| *e == MockEvent::Call(MockCall::DeviceWaitIdle));
    let destroy = events.iter().position(|e| matches!(e, MockEvent::Destroyed(_)));
    (wait, destroy)
}

#[test]
fn device_is_drained_before_anything_is_destroyed() {
    let mut ctx = ready_context();

    let start = ctx.driver().timeline().len();
    ctx.resize(extent(1024, 768)).unwrap();
    let (wait, destroy) = wait_and_first_destroy(&ctx.driver().timeline()[start..]);
    assert!(wait.is_some(), "resize never waited for the device");
    assert!(wait < destroy, "resize destroyed before waiting");
    assert_eq!(
        ctx.driver().timeline()[start + destroy.unwrap()],
        MockEvent::Destroyed(HandleKind::Framebuffer)
    );

    let start = ctx.driver().timeline().len();
    ctx.teardown();
    let (wait, destroy) = wait_and_first_destroy(&ctx.driver().timeline()[start..]);
    assert!(wait.is_some(), "teardown never waited for the device");
    assert!(wait < destroy, "teardown destroyed before waiting");
    assert_eq!(ctx.driver().call_count(MockCall::DeviceWaitIdle), 2);
    assert!(ctx.driver().violations().is_empty());
}

#[test]
fn failure_after_retiring_old_swapchain_is_terminal() {
    let mut ctx = ready_context();
    ctx.driver_mut()
        .fail_after(MockCall::CreateImageView, 1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);

    let err = ctx.resize(extent(640, 480)).unwrap_err();
    assert_eq!(err.stage(), Stage::ImageViews);
    assert_eq!(
        ctx.state(),
        PipelineState::Failed {
            stage: Stage::ImageViews,
            code: Some(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        }
    );
    assert_eq!(ctx.driver().live_count_of(HandleKind::ImageView), 0);

    // Further resizes wait for a teardown
    assert!(ctx.resize(extent(640, 480)).is_err());
    assert_clean_teardown(&mut ctx);
}

#[test]
fn missing_surface_format_is_not_substituted() {
    let gpu = MockGpu {
        formats: vec![vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }],
        ..MockGpu::default()
    };
    let mut ctx = context_with(MockDriver::new(vec![gpu]));

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(err, BootstrapError::SwapchainCreation { .. }));
    assert_eq!(ctx.driver().call_count(MockCall::CreateSwapchain), 0);
    assert!(ctx.state().is_failed());
    assert_clean_teardown(&mut ctx);
}

#[test]
fn missing_present_mode_fails() {
    let gpu = MockGpu {
        present_modes: vec![vk::PresentModeKHR::MAILBOX],
        ..MockGpu::default()
    };
    let mut ctx = context_with(MockDriver::new(vec![gpu]));

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(err, BootstrapError::SwapchainCreation { .. }));
    assert_clean_teardown(&mut ctx);
}

#[test]
fn queue_family_comes_from_present_support() {
    let gpu = MockGpu {
        queue_families: vec![MockQueueFamily::compute_only(), MockQueueFamily::graphics_present()],
        ..MockGpu::default()
    };
    let mut ctx = context_with(MockDriver::new(vec![gpu]));
    ctx.initialize(&window()).unwrap();

    let device = ctx.device().unwrap();
    assert_eq!(device.queue_family_index, 1);
    assert_eq!(ctx.driver().device_desc(device.handle).unwrap().queue_family_index, 1);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn index_zero_without_present_support_fails_fast() {
    let gpu = MockGpu {
        queue_families: vec![MockQueueFamily::compute_only(), MockQueueFamily::graphics_present()],
        ..MockGpu::default()
    };
    let mut driver = MockDriver::new(vec![gpu]);
    let instance = create_instance(
        &mut driver,
        &Config::default().application,
        &Config::default().debug,
        Vec::new(),
    )
    .unwrap();
    let surface = bind_surface(&mut driver, &instance, &window()).unwrap();
    let physical = select_physical_device(&driver, &instance, &surface, SelectionPolicy::FirstEnumerated).unwrap();

    assert_eq!(physical.present_family_indices(), vec![1]);
    let err = create_logical_device(&mut driver, &physical, 0, &DeviceConfig::default()).unwrap_err();
    assert!(matches!(err, BootstrapError::SurfaceUnsupported { .. }));
    assert_eq!(driver.call_count(MockCall::CreateDevice), 0);

    surface.destroy(&mut driver);
    instance.destroy(&mut driver);
    assert!(driver.violations().is_empty());
}

#[test]
fn no_physical_device() {
    let mut ctx = context_with(MockDriver::new(Vec::new()));

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(err, BootstrapError::NoDevice { .. }));
    assert_eq!(
        ctx.state(),
        PipelineState::Failed {
            stage: Stage::PhysicalDevice,
            code: None
        }
    );
    assert_clean_teardown(&mut ctx);
}

#[test]
fn no_presentable_queue_family() {
    let gpu = MockGpu {
        queue_families: vec![MockQueueFamily::compute_only()],
        ..MockGpu::default()
    };
    let mut ctx = context_with(MockDriver::new(vec![gpu]));

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(err, BootstrapError::SurfaceUnsupported { .. }));
    assert_clean_teardown(&mut ctx);
}

#[test]
fn ranked_selection_prefers_discrete_gpu() {
    let driver = MockDriver::new(vec![
        MockGpu::named("iGPU", vk::PhysicalDeviceType::INTEGRATED_GPU),
        MockGpu::named("dGPU", vk::PhysicalDeviceType::DISCRETE_GPU),
    ]);
    let mut ctx = context_with(driver);
    ctx.initialize(&window()).unwrap();
    assert_eq!(ctx.physical_device().unwrap().name, "dGPU");
    assert_clean_teardown(&mut ctx);

    let mut config = Config::default();
    config.device.selection = "first".to_string();
    let driver = MockDriver::new(vec![
        MockGpu::named("iGPU", vk::PhysicalDeviceType::INTEGRATED_GPU),
        MockGpu::named("dGPU", vk::PhysicalDeviceType::DISCRETE_GPU),
    ]);
    let mut ctx = RenderContext::new(driver, config);
    ctx.initialize(&window()).unwrap();
    assert_eq!(ctx.physical_device().unwrap().name, "iGPU");
    assert_clean_teardown(&mut ctx);
}

#[test]
fn partial_image_view_failure_leaks_nothing() {
    let mut driver = MockDriver::default();
    driver.fail_after(MockCall::CreateImageView, 2, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
    let mut ctx = context_with(driver);

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(err, BootstrapError::ResourceCreation { stage: Stage::ImageViews, .. }));
    assert_eq!(ctx.driver().call_count(MockCall::CreateImageView), 3);
    // The two views made before the failure are already gone
    assert_eq!(ctx.driver().live_count_of(HandleKind::ImageView), 0);
    assert!(ctx.swapchain().is_some());

    assert_clean_teardown(&mut ctx);
}

#[test]
fn partial_framebuffer_failure_leaks_nothing() {
    let mut driver = MockDriver::default();
    driver.fail_after(MockCall::CreateFramebuffer, 1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
    let mut ctx = context_with(driver);

    let err = ctx.initialize(&window()).unwrap_err();
    assert_eq!(err.stage(), Stage::Framebuffers);
    assert_eq!(ctx.driver().live_count_of(HandleKind::Framebuffer), 0);
    assert_eq!(ctx.image_views().len(), 3);

    assert_clean_teardown(&mut ctx);
}

#[test]
fn every_stage_failure_tears_down_cleanly() {
    let cases = [
        (MockCall::CreateInstance, Stage::Instance),
        (MockCall::CreateSurface, Stage::Surface),
        (MockCall::CreateDevice, Stage::LogicalDevice),
        (MockCall::CreateSwapchain, Stage::Swapchain),
        (MockCall::CreateImageView, Stage::ImageViews),
        (MockCall::CreateRenderPass, Stage::RenderPass),
        (MockCall::CreateFramebuffer, Stage::Framebuffers),
        (MockCall::CreateCommandPool, Stage::CommandResources),
        (MockCall::AllocateCommandBuffers, Stage::CommandResources),
        (MockCall::CreateSemaphore, Stage::CommandResources),
        (MockCall::CreateDescriptorPool, Stage::DescriptorResources),
    ];

    for (call, stage) in cases {
        let mut driver = MockDriver::default();
        driver.fail_next(call, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        let mut ctx = context_with(driver);

        let err = ctx.initialize(&window()).unwrap_err();
        assert_eq!(err.stage(), stage, "{:?}", call);
        assert_eq!(err.code(), Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert_eq!(
            ctx.state(),
            PipelineState::Failed {
                stage,
                code: Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            }
        );

        assert_clean_teardown(&mut ctx);
    }
}

#[test]
fn second_semaphore_failure_releases_the_first() {
    let mut driver = MockDriver::default();
    driver.fail_after(MockCall::CreateSemaphore, 1, vk::Result::ERROR_OUT_OF_HOST_MEMORY);
    let mut ctx = context_with(driver);

    assert!(ctx.initialize(&window()).is_err());
    assert_eq!(ctx.driver().live_count_of(HandleKind::Semaphore), 0);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn empty_descriptor_pool_is_rejected() {
    let mut config = Config::default();
    config.descriptors.max_sets = 0;
    let mut ctx = RenderContext::new(MockDriver::default(), config);

    let err = ctx.initialize(&window()).unwrap_err();
    assert!(matches!(
        err,
        BootstrapError::ResourceCreation {
            stage: Stage::DescriptorResources,
            ..
        }
    ));
    assert_eq!(ctx.driver().call_count(MockCall::CreateDescriptorPool), 0);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn descriptor_pool_follows_config() {
    let mut config = Config::default();
    config.descriptors.max_sets = 4;
    config.descriptors.uniform_buffers = 8;
    config.descriptors.combined_image_samplers = 0;
    let mut ctx = RenderContext::new(MockDriver::default(), config);
    ctx.initialize(&window()).unwrap();

    let pool = ctx.descriptor_pool().unwrap().pool;
    let (max_sets, sizes) = ctx.driver().descriptor_pool_layout(pool).unwrap();
    assert_eq!(*max_sets, 4);
    assert_eq!(sizes, &vec![(vk::DescriptorType::UNIFORM_BUFFER, 8)]);
    assert_clean_teardown(&mut ctx);
}

#[test]
fn shader_modules_validate_bytecode() {
    let mut ctx = ready_context();

    let module = ctx
        .create_shader_module(&spirv(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0]))
        .unwrap();
    assert!(ctx.driver().is_live(module));

    let malformed = [vec![0u8; 0], vec![0x03, 0x02, 0x23, 0x07, 0x00], spirv(&[0x0203_0723, 0])];
    for bytes in malformed {
        let err = ctx.create_shader_module(&bytes).unwrap_err();
        assert!(matches!(err, BootstrapError::ShaderCompile { .. }), "{:?}", bytes);
    }
    assert_eq!(ctx.driver().call_count(MockCall::CreateShaderModule), 1);

    ctx.driver_mut()
        .fail_next(MockCall::CreateShaderModule, vk::Result::ERROR_INVALID_SHADER_NV);
    let err = ctx.create_shader_module(&spirv(&[SPIRV_MAGIC, 0])).unwrap_err();
    assert!(matches!(err, BootstrapError::ShaderCompile { .. }));

    ctx.driver_mut()
        .fail_next(MockCall::CreateShaderModule, vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
    let err = ctx.create_shader_module(&spirv(&[SPIRV_MAGIC, 0])).unwrap_err();
    assert!(matches!(err, BootstrapError::ResourceCreation { .. }));

    assert!(ctx.destroy_shader_module(module));
    assert_clean_teardown(&mut ctx);
}

#[test]
fn shader_module_loads_from_disk() {
    let path = std::env::temp_dir().join(format!("vk-bootstrap-core-{}.spv", std::process::id()));
    std::fs::write(&path, spirv(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0])).unwrap();

    let mut ctx = ready_context();
    let module = ctx.load_shader_module(&path).unwrap();
    assert!(ctx.driver().is_live(module));
    std::fs::remove_file(&path).unwrap();

    assert_clean_teardown(&mut ctx);
}
