// Windowing collaborator
//
// The pipeline needs three things from the platform window: the raw
// handles for surface creation, the instance extensions those handles
// require, and the current drawable size.

use ash::prelude::VkResult;
use ash::vk;
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle, XlibDisplayHandle,
    XlibWindowHandle,
};
use std::ffi::CStr;

pub trait WindowSource: HasRawWindowHandle + HasRawDisplayHandle {
    /// Drawable size in pixels
    fn inner_extent(&self) -> vk::Extent2D;

    /// Instance extensions needed to create a surface for this window.
    /// Only meaningful once the window exists.
    fn required_extensions(&self) -> VkResult<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())?;
        // ash-window hands back pointers into static extension name constants
        Ok(names.iter().map(|&name| unsafe { CStr::from_ptr(name) }).collect())
    }
}

impl WindowSource for winit::window::Window {
    fn inner_extent(&self) -> vk::Extent2D {
        let size = self.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}

/// Window stand-in with no platform behind it. Only useful with drivers
/// that never dereference the raw handles, such as `MockDriver`.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessWindow {
    pub extent: vk::Extent2D,
}

impl HeadlessWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
        }
    }
}

unsafe impl HasRawWindowHandle for HeadlessWindow {
    fn raw_window_handle(&self) -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::empty())
    }
}

unsafe impl HasRawDisplayHandle for HeadlessWindow {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Xlib(XlibDisplayHandle::empty())
    }
}

impl WindowSource for HeadlessWindow {
    fn inner_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn required_extensions(&self) -> VkResult<Vec<&'static CStr>> {
        Ok(vec![ash::extensions::khr::Surface::name()])
    }
}
