use super::device::{HeadlessDeviceState, HeadlessImage};
use crate::backends::slab_lookup::{lookup, lookup_mut};
use super::texels;
use crate::*;

#[derive(Clone, Debug)]
pub(super) struct HeadlessAttachment {
    pub(super) image: FluentImageHandle,
    pub(super) load_op: FluentLoadOp,
    pub(super) clear_value: FluentClearValue,
    pub(super) state: FluentResourceState,
}

/// Commands that do something when executed. Binding and dynamic state commands are only validated
/// while recording.
#[derive(Clone, Debug)]
pub(super) enum HeadlessCommand {
    BeginRenderPass {
        width: u32,
        height: u32,
        attachments: Vec<HeadlessAttachment>,
    },
    ImageBarrier {
        image: FluentImageHandle,
        old_state: FluentResourceState,
        new_state: FluentResourceState,
    },
    CopyBuffer {
        src_buffer: FluentBufferHandle,
        src_offset: u64,
        dst_buffer: FluentBufferHandle,
        dst_offset: u64,
        size: u64,
    },
    CopyBufferToImage {
        src_buffer: FluentBufferHandle,
        dst_image: FluentImageHandle,
        copy: FluentBufferImageCopy,
    },
    ClearColorImage {
        image: FluentImageHandle,
        color: [f32; 4],
    },
    GenerateMipmaps {
        image: FluentImageHandle,
        state: FluentResourceState,
    },
    Draw,
    Dispatch,
}

fn verify_layout(
    image: &HeadlessImage,
    expected: FluentImageLayout,
    operation: &str,
) -> FluentResult<()> {
    if image.layout != expected {
        Err(format!(
            "{} expects an image in layout {:?}, but it is in {:?}",
            operation, expected, image.layout
        ))?;
    }

    Ok(())
}

fn verify_transfer_dst(
    image: &HeadlessImage,
    operation: &str,
) -> FluentResult<()> {
    if image.layout == FluentImageLayout::General {
        return Ok(());
    }

    verify_layout(image, FluentImageLayout::TransferDstOptimal, operation)
}

impl HeadlessDeviceState {
    pub(super) fn execute(
        &mut self,
        command: &HeadlessCommand,
    ) -> FluentResult<()> {
        match command {
            HeadlessCommand::BeginRenderPass {
                width,
                height,
                attachments,
            } => self.execute_begin_render_pass(*width, *height, attachments),
            HeadlessCommand::ImageBarrier {
                image,
                old_state,
                new_state,
            } => {
                let image = lookup_mut(&mut self.images, image.key(), "image")?;
                let old_layout = determine_image_layout(*old_state);
                // Transitions from undefined discard the contents, any current layout is fine
                if old_layout != FluentImageLayout::Undefined {
                    verify_layout(image, old_layout, "image barrier")?;
                }

                image.layout = determine_image_layout(*new_state);
                Ok(())
            }
            HeadlessCommand::CopyBuffer {
                src_buffer,
                src_offset,
                dst_buffer,
                dst_offset,
                size,
            } => {
                let src_range = *src_offset as usize..(*src_offset + *size) as usize;
                let dst_range = *dst_offset as usize..(*dst_offset + *size) as usize;
                if src_buffer == dst_buffer {
                    let buffer = lookup_mut(&mut self.buffers, src_buffer.key(), "buffer")?;
                    buffer.data.copy_within(src_range, dst_range.start);
                } else {
                    let bytes =
                        lookup(&self.buffers, src_buffer.key(), "buffer")?.data[src_range].to_vec();
                    let dst = lookup_mut(&mut self.buffers, dst_buffer.key(), "buffer")?;
                    dst.data[dst_range].copy_from_slice(&bytes);
                }

                Ok(())
            }
            HeadlessCommand::CopyBufferToImage {
                src_buffer,
                dst_image,
                copy,
            } => self.execute_copy_buffer_to_image(*src_buffer, *dst_image, copy),
            HeadlessCommand::ClearColorImage { image, color } => {
                let image = lookup_mut(&mut self.images, image.key(), "image")?;
                verify_transfer_dst(image, "clear_color_image")?;
                let texel = texels::encode_color(image.info.format, *color)?;
                for subresource in &mut image.subresources {
                    for chunk in subresource.chunks_exact_mut(texel.len()) {
                        chunk.copy_from_slice(&texel);
                    }
                }

                Ok(())
            }
            HeadlessCommand::GenerateMipmaps { image, state } => {
                let image = lookup_mut(&mut self.images, image.key(), "image")?;
                verify_layout(image, determine_image_layout(*state), "generate_mipmaps")?;
                let format = image.info.format;
                for layer in 0..image.info.layer_count {
                    for mip_level in 1..image.info.mip_levels {
                        let (src_width, src_height) = image.extent(mip_level - 1);
                        let src = &image.subresources[image.subresource_index(layer, mip_level - 1)];
                        let dst = texels::downsample(format, src, src_width, src_height);
                        let dst_index = image.subresource_index(layer, mip_level);
                        image.subresources[dst_index] = dst;
                    }
                }

                Ok(())
            }
            HeadlessCommand::Draw => {
                self.stats.draws += 1;
                Ok(())
            }
            HeadlessCommand::Dispatch => {
                self.stats.dispatches += 1;
                Ok(())
            }
        }
    }

    fn execute_begin_render_pass(
        &mut self,
        width: u32,
        height: u32,
        attachments: &[HeadlessAttachment],
    ) -> FluentResult<()> {
        for attachment in attachments {
            let image = lookup_mut(&mut self.images, attachment.image.key(), "image")?;
            let layout = determine_image_layout(attachment.state);

            // Cleared and discarded attachments start from undefined contents, any layout will do
            if attachment.load_op == FluentLoadOp::Load {
                verify_layout(image, layout, "render pass attachment")?;
            }
            image.layout = layout;

            if attachment.load_op != FluentLoadOp::Clear {
                continue;
            }

            let texel = if image.info.format.is_depth_or_stencil() {
                texels::encode_depth_stencil(
                    image.info.format,
                    attachment.clear_value.depth,
                    attachment.clear_value.stencil,
                )?
            } else {
                texels::encode_color(image.info.format, attachment.clear_value.color)?
            };

            // Only the render area of the first mip and layer is attached
            let image_width = image.info.width;
            let row_texels = width.min(image_width) as usize;
            let rows = height.min(image.info.height) as usize;
            let subresource = &mut image.subresources[0];
            for row in 0..rows {
                let row_start = row * image_width as usize * texel.len();
                let row_bytes = &mut subresource[row_start..row_start + row_texels * texel.len()];
                for chunk in row_bytes.chunks_exact_mut(texel.len()) {
                    chunk.copy_from_slice(&texel);
                }
            }
        }

        Ok(())
    }

    fn execute_copy_buffer_to_image(
        &mut self,
        src_buffer: FluentBufferHandle,
        dst_image: FluentImageHandle,
        copy: &FluentBufferImageCopy,
    ) -> FluentResult<()> {
        let src = lookup(&self.buffers, src_buffer.key(), "buffer")?;
        let image = lookup_mut(&mut self.images, dst_image.key(), "image")?;
        verify_transfer_dst(image, "copy_buffer_to_image")?;

        let texel_size = image.info.format.block_size_in_bytes() as usize;
        let (mip_width, mip_height) = image.extent(copy.mip_level);
        let width = if copy.width == 0 { mip_width } else { copy.width };
        let height = if copy.height == 0 { mip_height } else { copy.height };
        if width > mip_width || height > mip_height {
            Err(format!(
                "copy of {}x{} texels does not fit mip level {} ({}x{})",
                width, height, copy.mip_level, mip_width, mip_height
            ))?;
        }

        let src_row_size = width as usize * texel_size;
        let src_start = copy.buffer_offset as usize;
        let src_end = src_start + src_row_size * height as usize;
        if src_end > src.data.len() {
            Err(format!(
                "copy reads bytes {}..{} from a buffer of {} bytes",
                src_start,
                src_end,
                src.data.len()
            ))?;
        }

        let dst_row_size = mip_width as usize * texel_size;
        let index = image.subresource_index(copy.array_layer, copy.mip_level);
        let dst = &mut image.subresources[index];
        for row in 0..height as usize {
            let src_row = src_start + row * src_row_size;
            let dst_row = row * dst_row_size;
            dst[dst_row..dst_row + src_row_size]
                .copy_from_slice(&src.data[src_row..src_row + src_row_size]);
        }

        Ok(())
    }
}
