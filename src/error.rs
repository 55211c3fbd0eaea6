// Bootstrap errors
//
// One variant per failure category of the setup pipeline. Every variant
// carries the stage that failed and the underlying cause, so the caller
// can log it and tear down what was already committed.

use ash::vk;
use std::fmt;
use thiserror::Error;

/// Setup stage, in creation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    Instance,
    Surface,
    PhysicalDevice,
    LogicalDevice,
    Swapchain,
    ImageViews,
    RenderPass,
    Framebuffers,
    CommandResources,
    DescriptorResources,
    ShaderModule,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Instance => "instance",
            Stage::Surface => "surface",
            Stage::PhysicalDevice => "physical device",
            Stage::LogicalDevice => "logical device",
            Stage::Swapchain => "swapchain",
            Stage::ImageViews => "image views",
            Stage::RenderPass => "render pass",
            Stage::Framebuffers => "framebuffers",
            Stage::CommandResources => "command resources",
            Stage::DescriptorResources => "descriptor resources",
            Stage::ShaderModule => "shader module",
        };
        f.write_str(name)
    }
}

/// What went wrong underneath a stage failure
#[derive(Debug, Error)]
pub enum Cause {
    #[error("driver returned {0}")]
    Driver(#[from] vk::Result),
    #[error("{0}")]
    Unsupported(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("[{stage}] instance initialization failed: {cause}")]
    Init { stage: Stage, cause: Cause },

    #[error("[{stage}] no Vulkan physical device available")]
    NoDevice { stage: Stage },

    #[error("[{stage}] surface presentation unsupported: {cause}")]
    SurfaceUnsupported { stage: Stage, cause: Cause },

    #[error("[{stage}] logical device creation failed: {cause}")]
    DeviceCreation { stage: Stage, cause: Cause },

    #[error("[{stage}] swapchain creation failed: {cause}")]
    SwapchainCreation { stage: Stage, cause: Cause },

    #[error("[{stage}] resource creation failed: {cause}")]
    ResourceCreation { stage: Stage, cause: Cause },

    #[error("[{stage}] invalid shader bytecode: {cause}")]
    ShaderCompile { stage: Stage, cause: Cause },
}

impl BootstrapError {
    pub fn stage(&self) -> Stage {
        match self {
            BootstrapError::Init { stage, .. }
            | BootstrapError::NoDevice { stage }
            | BootstrapError::SurfaceUnsupported { stage, .. }
            | BootstrapError::DeviceCreation { stage, .. }
            | BootstrapError::SwapchainCreation { stage, .. }
            | BootstrapError::ResourceCreation { stage, .. }
            | BootstrapError::ShaderCompile { stage, .. } => *stage,
        }
    }

    /// Driver result code behind this error, if the driver produced one
    pub fn code(&self) -> Option<vk::Result> {
        let cause = match self {
            BootstrapError::NoDevice { .. } => return None,
            BootstrapError::Init { cause, .. }
            | BootstrapError::SurfaceUnsupported { cause, .. }
            | BootstrapError::DeviceCreation { cause, .. }
            | BootstrapError::SwapchainCreation { cause, .. }
            | BootstrapError::ResourceCreation { cause, .. }
            | BootstrapError::ShaderCompile { cause, .. } => cause,
        };
        match cause {
            Cause::Driver(code) => Some(*code),
            _ => None,
        }
    }

    pub(crate) fn init(stage: Stage, cause: impl Into<Cause>) -> Self {
        BootstrapError::Init { stage, cause: cause.into() }
    }

    pub(crate) fn surface_unsupported(stage: Stage, reason: impl Into<String>) -> Self {
        BootstrapError::SurfaceUnsupported {
            stage,
            cause: Cause::Unsupported(reason.into()),
        }
    }

    pub(crate) fn device(cause: impl Into<Cause>) -> Self {
        BootstrapError::DeviceCreation {
            stage: Stage::LogicalDevice,
            cause: cause.into(),
        }
    }

    pub(crate) fn swapchain(cause: impl Into<Cause>) -> Self {
        BootstrapError::SwapchainCreation {
            stage: Stage::Swapchain,
            cause: cause.into(),
        }
    }

    pub(crate) fn resource(stage: Stage, cause: impl Into<Cause>) -> Self {
        BootstrapError::ResourceCreation { stage, cause: cause.into() }
    }
}

/// Reason text for precondition failures
impl From<String> for Cause {
    fn from(reason: String) -> Self {
        Cause::Unsupported(reason)
    }
}

impl From<&str> for Cause {
    fn from(reason: &str) -> Self {
        Cause::Unsupported(reason.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
