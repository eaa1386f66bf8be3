//! On-disk description of a material library: export options, texture files and
//! materials referencing those textures by name.

use std::path::Path;

use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::{
    config::ExportOptions,
    error::{ExportError, Result},
    material::SourceMaterial,
    texture::{AddressMode, RawTexture, SamplingMode, SourceTexture, TextureLibrary},
};

fn default_level() -> f32 {
    1.0
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TextureEntry {
    pub name: String,
    /// Relative to the library file.
    pub path: String,
    #[serde(default)]
    pub wrap_u: AddressMode,
    #[serde(default)]
    pub wrap_v: AddressMode,
    #[serde(default)]
    pub sampling_mode: Option<SamplingMode>,
    #[serde(default)]
    pub coordinates_index: u32,
    #[serde(default = "default_level")]
    pub level: f32,
}

impl TextureEntry {
    pub fn load(&self, base_dir: &Path) -> Result<SourceTexture> {
        let path = base_dir.join(&self.path);
        let img = image::open(&path)?;
        let mime_type = match ImageFormat::from_path(&path) {
            Ok(ImageFormat::Png) => Some("image/png"),
            Ok(ImageFormat::Jpeg) => Some("image/jpeg"),
            _ => None,
        };

        let mut texture = SourceTexture::new(
            &self.name,
            img.width(),
            img.height(),
            RawTexture::from_image(&img),
        )
        .with_wrap(self.wrap_u, self.wrap_v)
        .with_coordinates_index(self.coordinates_index)
        .with_level(self.level)
        .with_alpha(img.color().has_alpha());
        if let Some(mode) = self.sampling_mode {
            texture = texture.with_sampling_mode(mode);
        }
        if let Some(mime_type) = mime_type {
            texture = texture.with_mime_type(mime_type);
        }
        Ok(texture)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct LibraryFile {
    #[serde(default)]
    pub options: ExportOptions,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub materials: Vec<SourceMaterial<String>>,
}

impl LibraryFile {
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Loads every texture and binds the materials' texture names to library ids.
    pub fn into_libraries(
        self,
        base_dir: &Path,
    ) -> Result<(ExportOptions, TextureLibrary, Vec<SourceMaterial>)> {
        let mut library = TextureLibrary::new();
        for entry in &self.textures {
            let texture = entry.load(base_dir)?;
            log::debug!("loaded texture {} ({}x{})", entry.name, texture.width, texture.height);
            library.insert(texture);
        }

        let materials = self
            .materials
            .into_iter()
            .map(|material| {
                material.try_map_textures(|name| {
                    library
                        .find_by_name(&name)
                        .ok_or(ExportError::UnknownTexture(name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((self.options, library, materials))
    }
}
