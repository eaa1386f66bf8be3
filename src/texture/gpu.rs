use std::sync::Arc;

use futures::{channel::oneshot, future::LocalBoxFuture, FutureExt as _};

use super::{PixelBuffer, PixelSource};
use crate::{
    align_to_256,
    error::{ExportError, Result},
};

/// A gpu resident texture whose pixels are copied back to host memory on demand.
///
/// The texture must have been created with `COPY_SRC` usage.
pub struct GpuTexture {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    texture: wgpu::Texture,
}

fn bytes_per_pixel(format: wgpu::TextureFormat) -> Option<u32> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => Some(4),
        wgpu::TextureFormat::Rgba32Float => Some(16),
        _ => None,
    }
}

impl GpuTexture {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, texture: wgpu::Texture) -> Self {
        Self {
            device,
            queue,
            texture,
        }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    async fn read(&self) -> Result<PixelBuffer> {
        let format = self.texture.format();
        let Some(bytes_per_pixel) = bytes_per_pixel(format) else {
            return Err(ExportError::Gpu(format!("can't read back {:?}", format)));
        };
        let width = self.texture.width();
        let height = self.texture.height();
        let row_size = (width * bytes_per_pixel) as usize;
        let padded_row_size = align_to_256(row_size);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("texture readback"),
            size: (padded_row_size * height as usize) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("texture readback"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_size as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| ExportError::Gpu(e.to_string()))?;
        rx.await
            .map_err(|_| ExportError::Gpu("map callback dropped".to_string()))?
            .map_err(|e| ExportError::Gpu(e.to_string()))?;

        // Strip the row padding
        let mut bytes = Vec::with_capacity(row_size * height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in 0..height as usize {
                let start = row * padded_row_size;
                bytes.extend_from_slice(&mapped[start..start + row_size]);
            }
        }
        buffer.unmap();

        Ok(match format {
            wgpu::TextureFormat::Rgba32Float => {
                PixelBuffer::F32(bytemuck::allocation::pod_collect_to_vec(&bytes))
            }
            _ => PixelBuffer::U8(bytes),
        })
    }
}

impl PixelSource for GpuTexture {
    fn read_pixels(&self) -> LocalBoxFuture<'_, Result<PixelBuffer>> {
        self.read().boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readable_formats() {
        assert_eq!(bytes_per_pixel(wgpu::TextureFormat::Rgba8UnormSrgb), Some(4));
        assert_eq!(bytes_per_pixel(wgpu::TextureFormat::Rgba32Float), Some(16));
        assert_eq!(bytes_per_pixel(wgpu::TextureFormat::Bc2RgbaUnorm), None);
        // half floats have no conversion to the exported formats
        assert_eq!(bytes_per_pixel(wgpu::TextureFormat::Rgba16Float), None);
    }

    #[test]
    fn reads_back_uploaded_pixels() {
        let instance = wgpu::Instance::default();
        let Ok(adapter) = pollster::block_on(instance.request_adapter(&Default::default())) else {
            // no adapter on this machine
            return;
        };
        let (device, queue) =
            pollster::block_on(adapter.request_device(&Default::default())).unwrap();

        let size = wgpu::Extent3d {
            width: 3,
            height: 2,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("readback test"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::COPY_SRC | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texels: Vec<u8> = (0..3 * 2 * 4).map(|i| i as u8 * 10).collect();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(3 * 4),
                rows_per_image: Some(2),
            },
            size,
        );

        let gpu = GpuTexture::new(Arc::new(device), Arc::new(queue), texture);
        let PixelBuffer::U8(read) = pollster::block_on(gpu.read_pixels()).unwrap() else {
            panic!("expected 8 bit pixels");
        };
        assert_eq!(read, texels);
    }
}
