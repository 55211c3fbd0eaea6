//! Vulkan setup pipeline: instance, surface, device selection, logical
//! device, swapchain, image views, render pass, framebuffers, command and
//! descriptor pools, torn down in strict reverse order.
//!
//! Every driver call goes through [`backend::Driver`], so the whole pipeline
//! runs against [`backend::MockDriver`] without a GPU.

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod window;

pub use config::Config;
pub use context::{PipelineState, RenderContext};
pub use error::{BootstrapError, Cause, Result, Stage};
pub use window::{HeadlessWindow, WindowSource};
