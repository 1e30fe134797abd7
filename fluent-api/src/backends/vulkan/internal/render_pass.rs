use super::conversions::resource_state_to_image_layout;
use crate::{FluentAttachmentKey, FluentRenderPassKey, FluentResult};
use ash::version::DeviceV1_0;
use ash::vk;

/// Contents are stored, and the attachment stays in its state across the pass. The caller has
/// already barriered the image into that state, so the layout is the same on entry and exit
/// whatever the load op.
pub fn attachment_description(attachment: &FluentAttachmentKey) -> vk::AttachmentDescription {
    let layout = resource_state_to_image_layout(attachment.state);

    let stencil_load_op = if attachment.format.has_stencil_aspect() {
        attachment.load_op.into()
    } else {
        vk::AttachmentLoadOp::DONT_CARE
    };

    let stencil_store_op = if attachment.format.has_stencil_aspect() {
        vk::AttachmentStoreOp::STORE
    } else {
        vk::AttachmentStoreOp::DONT_CARE
    };

    vk::AttachmentDescription::builder()
        .format(attachment.format.into())
        .samples(attachment.sample_count.into())
        .load_op(attachment.load_op.into())
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(stencil_load_op)
        .stencil_store_op(stencil_store_op)
        .initial_layout(layout)
        .final_layout(layout)
        .build()
}

/// One subpass using every attachment. Color attachments come first, in order, then the depth
/// attachment if there is one.
pub fn create_render_pass(
    device: &ash::Device,
    key: &FluentRenderPassKey,
) -> FluentResult<vk::RenderPass> {
    let mut attachments = Vec::with_capacity(key.attachment_count());
    let mut color_attachment_refs = Vec::with_capacity(key.color_attachments.len());
    for color_attachment in &key.color_attachments {
        color_attachment_refs.push(
            vk::AttachmentReference::builder()
                .attachment(attachments.len() as u32)
                .layout(resource_state_to_image_layout(color_attachment.state))
                .build(),
        );
        attachments.push(attachment_description(color_attachment));
    }

    let depth_attachment_ref = key.depth_attachment.as_ref().map(|depth_attachment| {
        let attachment_ref = vk::AttachmentReference::builder()
            .attachment(attachments.len() as u32)
            .layout(resource_state_to_image_layout(depth_attachment.state))
            .build();
        attachments.push(attachment_description(depth_attachment));
        attachment_ref
    });

    let mut subpass_description = vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachment_refs);

    if let Some(depth_attachment_ref) = depth_attachment_ref.as_ref() {
        subpass_description = subpass_description.depth_stencil_attachment(depth_attachment_ref);
    }

    let subpass_descriptions = [subpass_description.build()];
    let create_info = vk::RenderPassCreateInfo::builder()
        .attachments(&attachments)
        .subpasses(&subpass_descriptions);

    log::trace!("Creating render pass for {:?}", key);
    let render_pass = unsafe { device.create_render_pass(&*create_info, None)? };
    Ok(render_pass)
}

pub fn create_framebuffer(
    device: &ash::Device,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    width: u32,
    height: u32,
) -> FluentResult<vk::Framebuffer> {
    let create_info = vk::FramebufferCreateInfo::builder()
        .render_pass(render_pass)
        .attachments(image_views)
        .width(width)
        .height(height)
        .layers(1);

    let framebuffer = unsafe { device.create_framebuffer(&*create_info, None)? };
    Ok(framebuffer)
}
