use super::{WgpuBackend, WgpuTexture};
use crate::backend::BackendError;
use crate::pipeline::{compute_padded_bytes_per_row, create_readback_buffer, create_render_texture};

fn copy_padded_readback_rows(
    data: &[u8],
    height: u32,
    unpadded_bytes_per_row: u32,
    padded_bytes_per_row: u32,
    output: &mut Vec<u8>,
) {
    let output_size = (unpadded_bytes_per_row * height) as usize;
    output.resize(output_size, 0);

    if padded_bytes_per_row == unpadded_bytes_per_row {
        output.copy_from_slice(&data[..output_size]);
        return;
    }

    for row in 0..height {
        let padded_offset = (row * padded_bytes_per_row) as usize;
        let unpadded_offset = (row * unpadded_bytes_per_row) as usize;
        let row_data = &data[padded_offset..padded_offset + unpadded_bytes_per_row as usize];
        output[unpadded_offset..unpadded_offset + unpadded_bytes_per_row as usize]
            .copy_from_slice(row_data);
    }
}

impl WgpuBackend {
    /// Upload tightly packed RGBA8 pixels as a texture usable as blur input.
    pub fn create_texture_from_rgba(
        &self,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<WgpuTexture, BackendError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(BackendError::TargetUnavailable {
                width,
                height,
                reason: format!("expected {expected} bytes of RGBA8, got {}", pixels.len()),
            });
        }

        let texture = create_render_texture(&self.device, width, height, "blur_input");
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(WgpuTexture::new(texture, width, height))
    }

    /// Read a texture back as tightly packed RGBA8. Blocks until the GPU is
    /// done. Returns `None` if mapping the readback buffer failed.
    pub fn read_texture_rgba(&self, texture: &WgpuTexture) -> Option<Vec<u8>> {
        let (width, height) = texture.size();
        let (unpadded_bytes_per_row, padded_bytes_per_row) = compute_padded_bytes_per_row(width, 4);
        let buffer = create_readback_buffer(
            &self.device,
            Some("blur_readback_buffer"),
            u64::from(padded_bytes_per_row) * u64::from(height),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("blur_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: texture.texture(),
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            if sender.send(result).is_err() {
                log::warn!("Failed to send map_async result from callback");
            }
        });

        let _ = self.device.poll(wgpu::MaintainBase::Wait);

        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                log::warn!("Failed to map readback buffer: {:?}", error);
                return None;
            }
            Err(error) => {
                log::warn!("Failed to receive mapped buffer result: {}", error);
                return None;
            }
        }

        let mut pixels = Vec::new();
        {
            let mapped_range = buffer_slice.get_mapped_range();
            copy_padded_readback_rows(
                &mapped_range,
                height,
                unpadded_bytes_per_row,
                padded_bytes_per_row,
                &mut pixels,
            );
        }
        buffer.unmap();
        Some(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::copy_padded_readback_rows;

    #[test]
    fn copy_padded_readback_rows_handles_unpadded_data() {
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut output = Vec::new();
        copy_padded_readback_rows(&data, 2, 4, 4, &mut output);
        assert_eq!(output, data);
    }

    #[test]
    fn copy_padded_readback_rows_strips_padding() {
        let data = [1u8, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0];
        let mut output = Vec::new();
        copy_padded_readback_rows(&data, 2, 4, 6, &mut output);
        assert_eq!(output, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
