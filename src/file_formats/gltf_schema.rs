//! The subset of the glTF 2.0 schema produced by the material exporter.
//!
//! Every optional field is skipped when unset so records stay minimal, matching how
//! glTF treats omitted values as their defaults.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[repr(u32)]
pub enum MagFilter {
    Nearest = 9728,
    Linear = 9729,
}

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[repr(u32)]
pub enum MinFilter {
    Nearest = 9728,
    Linear = 9729,
    NearestMipmapNearest = 9984,
    LinearMipmapNearest = 9985,
    NearestMipmapLinear = 9986,
    LinearMipmapLinear = 9987,
}

#[derive(Serialize_repr, Deserialize_repr, Debug, Clone, Copy, Hash, PartialEq, Eq)]
#[repr(u32)]
pub enum WrapMode {
    ClampToEdge = 33071,
    MirroredRepeat = 33648,
    Repeat = 10497,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Hash, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<MagFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<MinFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<WrapMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<WrapMode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureInfo {
    pub index: u32,
    #[serde(rename = "texCoord", skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NormalTextureInfo {
    pub index: u32,
    #[serde(rename = "texCoord", skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OcclusionTextureInfo {
    pub index: u32,
    #[serde(rename = "texCoord", skip_serializing_if = "Option::is_none")]
    pub tex_coord: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PbrMetallicRoughness {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_factor: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roughness_factor: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_color_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metallic_roughness_texture: Option<TextureInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<PbrMetallicRoughness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<NormalTextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<OcclusionTextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<TextureInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f32; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<AlphaMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_sided: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Material {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Copy carrying only the scalar parts, all texture references dropped.
    pub fn without_textures(&self) -> Self {
        Self {
            name: self.name.clone(),
            pbr_metallic_roughness: self.pbr_metallic_roughness.as_ref().map(|pbr| {
                PbrMetallicRoughness {
                    base_color_factor: pbr.base_color_factor,
                    metallic_factor: pbr.metallic_factor,
                    roughness_factor: pbr.roughness_factor,
                    ..Default::default()
                }
            }),
            emissive_factor: self.emissive_factor,
            alpha_mode: self.alpha_mode,
            alpha_cutoff: self.alpha_cutoff,
            double_sided: self.double_sided,
            ..Default::default()
        }
    }

    pub fn has_textures(&self) -> bool {
        if self.emissive_texture.is_some()
            || self.normal_texture.is_some()
            || self.occlusion_texture.is_some()
        {
            return true;
        }
        self.pbr_metallic_roughness.as_ref().is_some_and(|pbr| {
            pbr.base_color_texture.is_some() || pbr.metallic_roughness_texture.is_some()
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<u32>,
    pub source: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}
