pub mod color;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod file_formats;
pub mod material;
pub mod texture;

pub use config::ExportOptions;
pub use error::{ExportError, Result};
pub use export::{ExportOutput, MaterialExporter};
pub use material::SourceMaterial;
pub use texture::{SourceTexture, TextureId, TextureLibrary};

pub fn align_to_256(n: usize) -> usize {
    (n + 255) & !255
}
