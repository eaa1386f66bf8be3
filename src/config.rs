use serde::{Deserialize, Serialize};

use crate::texture::encode::ImageMimeType;

/// Knobs for a single export pass.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ExportOptions {
    /// Encoding for exported images unless a texture carries its own mime type.
    pub mime_type: ImageMimeType,
    /// Without texture coordinates no texture is attached to any material.
    pub has_texture_coords: bool,
    /// Write images as base64 data uris instead of file names.
    pub embed_images: bool,
    pub jpeg_quality: u8,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            mime_type: ImageMimeType::Png,
            has_texture_coords: true,
            embed_images: false,
            jpeg_quality: 90,
        }
    }
}
