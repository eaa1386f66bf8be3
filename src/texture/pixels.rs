use glam::Vec4;
use image::{imageops::FilterType, ImageBuffer, Rgba};

use super::{PixelBuffer, SourceTexture};
use crate::error::{ExportError, Result};

/// Normalized RGBA float pixels plus the bits of texture state the converters need.
#[derive(Debug, Clone, PartialEq)]
pub struct TexelImage {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub data: Vec<f32>,
}

impl TexelImage {
    pub fn new(width: u32, height: u32, has_alpha: bool, data: Vec<f32>) -> Result<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(ExportError::PixelRead(format!(
                "expected {}x{} rgba texels, got {} samples",
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            has_alpha,
            data,
        })
    }

    /// Fully opaque white, used in place of a missing texture.
    pub fn white(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            has_alpha: false,
            data: vec![1.0; width as usize * height as usize * 4],
        }
    }

    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn texel(&self, i: usize) -> Vec4 {
        Vec4::from_slice(&self.data[i * 4..i * 4 + 4])
    }

    pub fn resized(&self, width: u32, height: u32) -> Self {
        if width == self.width && height == self.height {
            return self.clone();
        }
        // length is checked on construction
        let Some(source) =
            ImageBuffer::<Rgba<f32>, Vec<f32>>::from_raw(self.width, self.height, self.data.clone())
        else {
            return Self::white(width, height);
        };
        let resized = image::imageops::resize(&source, width, height, FilterType::Triangle);
        Self {
            width,
            height,
            has_alpha: self.has_alpha,
            data: resized.into_raw(),
        }
    }
}

/// Normalizes 8 bit samples into [0, 1]; float samples pass through untouched.
pub fn to_float32(pixels: PixelBuffer) -> Result<Vec<f32>> {
    match pixels {
        PixelBuffer::U8(data) => Ok(data.into_iter().map(|v| v as f32 / 255.0).collect()),
        PixelBuffer::F32(data) => Ok(data),
        PixelBuffer::U16(_) => Err(ExportError::UnsupportedPixelFormat),
    }
}

pub async fn read_texels(texture: &SourceTexture) -> Result<TexelImage> {
    let pixels = texture.read_pixels().await?;
    let data = to_float32(pixels)?;
    TexelImage::new(texture.width, texture.height, texture.has_alpha, data)
}

/// Reads both textures and scales the narrower one up to the wider one's size.
///
/// A missing texture is replaced by an opaque white image of the other's size. Equal
/// widths are left alone.
pub async fn resize_to_common_dimensions(
    first: Option<&SourceTexture>,
    second: Option<&SourceTexture>,
) -> Result<(TexelImage, TexelImage)> {
    let first_width = first.map_or(0, |t| t.width);
    let second_width = second.map_or(0, |t| t.width);

    match (first, second) {
        (None, None) => Err(ExportError::MissingTextures),
        (Some(first), Some(second)) => {
            let a = read_texels(first).await?;
            let b = read_texels(second).await?;
            if first_width < second_width {
                Ok((a.resized(b.width, b.height), b))
            } else if first_width > second_width {
                let b = b.resized(a.width, a.height);
                Ok((a, b))
            } else {
                Ok((a, b))
            }
        }
        (Some(first), None) => {
            let a = read_texels(first).await?;
            let b = TexelImage::white(a.width, a.height);
            Ok((a, b))
        }
        (None, Some(second)) => {
            let b = read_texels(second).await?;
            let a = TexelImage::white(b.width, b.height);
            Ok((a, b))
        }
    }
}
