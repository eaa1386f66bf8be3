use std::io::Cursor;

use base64::{prelude::BASE64_STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};

use super::PixelBuffer;
use crate::error::{ExportError, Result};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageMimeType {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
}

impl ImageMimeType {
    pub fn from_mime_str(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(ImageMimeType::Png),
            "image/jpeg" => Some(ImageMimeType::Jpeg),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMimeType::Png => "image/png",
            ImageMimeType::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageMimeType::Png => ".png",
            ImageMimeType::Jpeg => ".jpeg",
        }
    }
}

/// An encoded image payload ready to be written next to the glTF or embedded into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: ImageMimeType,
    pub data: Vec<u8>,
}

impl EncodedImage {
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type.as_str(),
            BASE64_STANDARD.encode(&self.data)
        )
    }
}

fn to_rgba8(pixels: &PixelBuffer) -> Result<Vec<u8>> {
    match pixels {
        PixelBuffer::U8(data) => Ok(data.clone()),
        PixelBuffer::F32(data) => Ok(data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()),
        PixelBuffer::U16(_) => Err(ExportError::UnsupportedPixelFormat),
    }
}

/// Encodes an RGBA buffer as PNG or JPEG. JPEG drops the alpha channel.
pub fn encode_pixels(
    pixels: &PixelBuffer,
    width: u32,
    height: u32,
    mime_type: ImageMimeType,
    jpeg_quality: u8,
) -> Result<EncodedImage> {
    let rgba = to_rgba8(pixels)?;
    let Some(img) = RgbaImage::from_raw(width, height, rgba) else {
        return Err(ExportError::PixelRead(format!(
            "buffer of {} samples does not fit {}x{}",
            pixels.len(),
            width,
            height
        )));
    };

    let mut data = Vec::new();
    match mime_type {
        ImageMimeType::Png => {
            DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut data), ImageFormat::Png)?;
        }
        ImageMimeType::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img).to_rgb8();
            let encoder = JpegEncoder::new_with_quality(&mut data, jpeg_quality);
            rgb.write_with_encoder(encoder)?;
        }
    }

    Ok(EncodedImage { mime_type, data })
}
