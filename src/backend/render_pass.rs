// Render pass for basic color attachment rendering
//
// One presentable color attachment, one graphics subpass, one dependency
// from outside the pass. Independent of the swapchain image count; only a
// format change would require a new one.

use ash::vk;

use super::device::LogicalDevice;
use super::driver::{Driver, RenderPassDesc};
use crate::error::{BootstrapError, Result, Stage};

#[derive(Debug)]
pub struct RenderPass {
    pub handle: vk::RenderPass,
    device: vk::Device,
}

pub fn color_pass_desc(format: vk::Format) -> RenderPassDesc {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::builder()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
        .build();

    let color_reference = vk::AttachmentReference::builder()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        .build();

    // Wait for the presentation engine to release the image before writing color
    let dependency = vk::SubpassDependency::builder()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
        .build();

    RenderPassDesc {
        color_attachment,
        color_reference,
        bind_point: vk::PipelineBindPoint::GRAPHICS,
        dependency,
    }
}

pub fn create_render_pass<D: Driver>(
    driver: &mut D,
    device: &LogicalDevice,
    format: vk::Format,
) -> Result<RenderPass> {
    let handle = driver
        .create_render_pass(device.handle, &color_pass_desc(format))
        .map_err(|code| BootstrapError::resource(Stage::RenderPass, code))?;

    log::info!("Render pass created for {:?}", format);

    Ok(RenderPass {
        handle,
        device: device.handle,
    })
}

impl RenderPass {
    pub fn destroy<D: Driver>(self, driver: &mut D) {
        driver.destroy_render_pass(self.device, self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_is_cleared_stored_and_presentable() {
        let desc = color_pass_desc(vk::Format::B8G8R8A8_UNORM);
        let color = desc.color_attachment;
        assert_eq!(color.format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(desc.color_reference.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(desc.bind_point, vk::PipelineBindPoint::GRAPHICS);
    }

    #[test]
    fn external_dependency_guards_color_output() {
        let dep = color_pass_desc(vk::Format::B8G8R8A8_UNORM).dependency;
        assert_eq!(dep.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dep.dst_subpass, 0);
        assert_eq!(dep.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dep.dst_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert!(dep
            .dst_access_mask
            .contains(vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE));
    }
}
