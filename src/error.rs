//! Error types for material export.

pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors that abort the export of a single material (or the whole library load).
///
/// Anything recoverable (an odd wrap mode, an unsupported blending mode, a texture
/// whose pixels cannot be read) is logged instead and never shows up here.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported material configuration: {0}")]
    UnsupportedMaterial(String),

    #[error("diffuse and specular glossiness textures are both missing")]
    MissingTextures,

    #[error("failed to read pixels from texture {0}")]
    PixelRead(String),

    #[error("unsupported pixel format")]
    UnsupportedPixelFormat,

    #[error("unknown texture: {0}")]
    UnknownTexture(String),

    #[error("gpu readback failed: {0}")]
    Gpu(String),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
