//! Source materials as they exist in the scene, before conversion to glTF.
//!
//! Materials are generic over how they reference textures: [`TextureId`] once they are
//! bound to a [`crate::TextureLibrary`], texture names when read from a library file.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::texture::TextureId;

/// How the renderer combines the material with what is already in the framebuffer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlphaBlendMode {
    Disable,
    Add,
    #[default]
    Combine,
    Subtract,
    Multiply,
    Maximized,
    OneOne,
    PremultipliedPorterDuff,
}

/// Explicit transparency override; when unset it is derived from alpha and textures.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransparencyMode {
    Opaque,
    AlphaTest,
    AlphaBlend,
    AlphaTestAndBlend,
}

/// State shared by every material kind.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MaterialBase {
    pub name: String,
    pub alpha: f32,
    pub alpha_cutoff: f32,
    pub alpha_blend_mode: AlphaBlendMode,
    pub transparency_mode: Option<TransparencyMode>,
    pub back_face_culling: bool,
    pub two_sided_lighting: bool,
}

impl Default for MaterialBase {
    fn default() -> Self {
        Self {
            name: String::new(),
            alpha: 1.0,
            alpha_cutoff: 0.4,
            alpha_blend_mode: AlphaBlendMode::Combine,
            transparency_mode: None,
            back_face_culling: true,
            two_sided_lighting: false,
        }
    }
}

impl MaterialBase {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Legacy blinn-phong material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StandardMaterial<T = TextureId> {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub diffuse_color: Vec3,
    pub emissive_color: Vec3,
    pub specular_power: f32,
    pub diffuse_texture: Option<T>,
    pub bump_texture: Option<T>,
    pub emissive_texture: Option<T>,
    pub ambient_texture: Option<T>,
    pub opacity_texture: Option<T>,
}

impl<T> Default for StandardMaterial<T> {
    fn default() -> Self {
        Self {
            base: MaterialBase::default(),
            diffuse_color: Vec3::ONE,
            emissive_color: Vec3::ZERO,
            specular_power: 64.0,
            diffuse_texture: None,
            bump_texture: None,
            emissive_texture: None,
            ambient_texture: None,
            opacity_texture: None,
        }
    }
}

/// Metallic-roughness workflow, close to the glTF model already.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PbrMetallicRoughnessMaterial<T = TextureId> {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub base_color: Vec3,
    pub metallic: Option<f32>,
    pub roughness: Option<f32>,
    pub emissive_color: Vec3,
    pub double_sided: bool,
    pub base_texture: Option<T>,
    pub metallic_roughness_texture: Option<T>,
    pub normal_texture: Option<T>,
    pub occlusion_texture: Option<T>,
    pub occlusion_strength: Option<f32>,
    pub emissive_texture: Option<T>,
}

impl<T> Default for PbrMetallicRoughnessMaterial<T> {
    fn default() -> Self {
        Self {
            base: MaterialBase::default(),
            base_color: Vec3::ONE,
            metallic: None,
            roughness: None,
            emissive_color: Vec3::ZERO,
            double_sided: false,
            base_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
            occlusion_texture: None,
            occlusion_strength: None,
            emissive_texture: None,
        }
    }
}

/// Specular-glossiness workflow. Needs the metallic-roughness solver to export.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PbrSpecularGlossinessMaterial<T = TextureId> {
    #[serde(flatten)]
    pub base: MaterialBase,
    pub albedo_color: Vec3,
    pub reflectivity_color: Vec3,
    /// Glossiness.
    pub micro_surface: f32,
    pub emissive_color: Vec3,
    pub albedo_texture: Option<T>,
    /// Specular in rgb, glossiness in alpha when the flag below is set.
    pub reflectivity_texture: Option<T>,
    pub use_micro_surface_from_reflectivity_map_alpha: bool,
    pub bump_texture: Option<T>,
    pub ambient_texture: Option<T>,
    pub ambient_texture_strength: f32,
    pub emissive_texture: Option<T>,
}

impl<T> Default for PbrSpecularGlossinessMaterial<T> {
    fn default() -> Self {
        Self {
            base: MaterialBase::default(),
            albedo_color: Vec3::ONE,
            reflectivity_color: Vec3::ONE,
            micro_surface: 1.0,
            emissive_color: Vec3::ZERO,
            albedo_texture: None,
            reflectivity_texture: None,
            use_micro_surface_from_reflectivity_map_alpha: false,
            bump_texture: None,
            ambient_texture: None,
            ambient_texture_strength: 1.0,
            emissive_texture: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceMaterial<T = TextureId> {
    Standard(StandardMaterial<T>),
    PbrMetallicRoughness(PbrMetallicRoughnessMaterial<T>),
    PbrSpecularGlossiness(PbrSpecularGlossinessMaterial<T>),
}

fn map_slot<T, U, E>(slot: Option<T>, f: &mut impl FnMut(T) -> Result<U, E>) -> Result<Option<U>, E> {
    slot.map(f).transpose()
}

impl<T> SourceMaterial<T> {
    pub fn base(&self) -> &MaterialBase {
        match self {
            SourceMaterial::Standard(m) => &m.base,
            SourceMaterial::PbrMetallicRoughness(m) => &m.base,
            SourceMaterial::PbrSpecularGlossiness(m) => &m.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    /// Rebinds every texture reference, failing on the first one `f` rejects.
    pub fn try_map_textures<U, E>(
        self,
        mut f: impl FnMut(T) -> Result<U, E>,
    ) -> Result<SourceMaterial<U>, E> {
        let f = &mut f;
        Ok(match self {
            SourceMaterial::Standard(m) => SourceMaterial::Standard(StandardMaterial {
                base: m.base,
                diffuse_color: m.diffuse_color,
                emissive_color: m.emissive_color,
                specular_power: m.specular_power,
                diffuse_texture: map_slot(m.diffuse_texture, f)?,
                bump_texture: map_slot(m.bump_texture, f)?,
                emissive_texture: map_slot(m.emissive_texture, f)?,
                ambient_texture: map_slot(m.ambient_texture, f)?,
                opacity_texture: map_slot(m.opacity_texture, f)?,
            }),
            SourceMaterial::PbrMetallicRoughness(m) => {
                SourceMaterial::PbrMetallicRoughness(PbrMetallicRoughnessMaterial {
                    base: m.base,
                    base_color: m.base_color,
                    metallic: m.metallic,
                    roughness: m.roughness,
                    emissive_color: m.emissive_color,
                    double_sided: m.double_sided,
                    base_texture: map_slot(m.base_texture, f)?,
                    metallic_roughness_texture: map_slot(m.metallic_roughness_texture, f)?,
                    normal_texture: map_slot(m.normal_texture, f)?,
                    occlusion_texture: map_slot(m.occlusion_texture, f)?,
                    occlusion_strength: m.occlusion_strength,
                    emissive_texture: map_slot(m.emissive_texture, f)?,
                })
            }
            SourceMaterial::PbrSpecularGlossiness(m) => {
                SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
                    base: m.base,
                    albedo_color: m.albedo_color,
                    reflectivity_color: m.reflectivity_color,
                    micro_surface: m.micro_surface,
                    emissive_color: m.emissive_color,
                    albedo_texture: map_slot(m.albedo_texture, f)?,
                    reflectivity_texture: map_slot(m.reflectivity_texture, f)?,
                    use_micro_surface_from_reflectivity_map_alpha: m
                        .use_micro_surface_from_reflectivity_map_alpha,
                    bump_texture: map_slot(m.bump_texture, f)?,
                    ambient_texture: map_slot(m.ambient_texture, f)?,
                    ambient_texture_strength: m.ambient_texture_strength,
                    emissive_texture: map_slot(m.emissive_texture, f)?,
                })
            }
        })
    }

    /// Translucent legacy material whose blend equation glTF can't express.
    pub fn has_unsupported_blending(&self) -> bool {
        match self {
            SourceMaterial::Standard(m) => {
                (m.base.alpha < 1.0 || m.opacity_texture.is_some())
                    && m.base.alpha_blend_mode != AlphaBlendMode::Combine
            }
            _ => false,
        }
    }

    pub fn needs_alpha_blending(&self) -> bool {
        let base = self.base();
        // glTF blending is only the plain "combine" equation
        if let SourceMaterial::Standard(_) = self {
            if base.alpha_blend_mode != AlphaBlendMode::Combine {
                return false;
            }
        }
        if let Some(mode) = base.transparency_mode {
            return matches!(
                mode,
                TransparencyMode::AlphaBlend | TransparencyMode::AlphaTestAndBlend
            );
        }
        match self {
            SourceMaterial::Standard(m) => base.alpha < 1.0 || m.opacity_texture.is_some(),
            SourceMaterial::PbrMetallicRoughness(_) | SourceMaterial::PbrSpecularGlossiness(_) => {
                base.alpha < 1.0 && base.alpha_blend_mode != AlphaBlendMode::Disable
            }
        }
    }

    pub fn needs_alpha_testing(&self) -> bool {
        matches!(
            self.base().transparency_mode,
            Some(TransparencyMode::AlphaTest | TransparencyMode::AlphaTestAndBlend)
        )
    }
}
