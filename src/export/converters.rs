//! Per material kind conversion into glTF metallic-roughness materials.

use futures::future::try_join_all;
use glam::Vec3;

use super::{registry::sampler_for, MaterialExporter};
use crate::{
    color::{fuzzy_equals, solve_roughness_from_specular_power, to_linear, EPSILON},
    convert::{
        convert_specular_glossiness, convert_specular_glossiness_textures, MetallicRoughness,
        SpecularGlossiness,
    },
    error::{ExportError, Result},
    file_formats::gltf_schema::{
        AlphaMode, Material, NormalTextureInfo, OcclusionTextureInfo, PbrMetallicRoughness,
        TextureInfo,
    },
    material::{
        AlphaBlendMode, MaterialBase, PbrMetallicRoughnessMaterial, PbrSpecularGlossinessMaterial,
        SourceMaterial, StandardMaterial,
    },
    texture::TextureId,
};

const HOOK_CONTEXT: &str = "exportMaterial";

/// Where an exported texture ends up on the material.
#[derive(Debug, Clone, Copy)]
enum Slot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion { strength: Option<f32> },
    Emissive,
}

pub(super) async fn convert_material(
    exporter: &MaterialExporter<'_>,
    source: &SourceMaterial,
) -> Result<Material> {
    let mut material = match source {
        SourceMaterial::Standard(m) => convert_standard(exporter, m).await?,
        SourceMaterial::PbrMetallicRoughness(m) => {
            convert_pbr_metallic_roughness(exporter, m).await?
        }
        SourceMaterial::PbrSpecularGlossiness(m) => {
            convert_pbr_specular_glossiness(exporter, m).await?
        }
    };
    set_alpha_mode(&mut material, source);
    finish_material(exporter, material, source).await
}

fn set_alpha_mode(material: &mut Material, source: &SourceMaterial) {
    if source.has_unsupported_blending() {
        return;
    }
    if source.needs_alpha_blending() {
        material.alpha_mode = Some(AlphaMode::Blend);
    } else if source.needs_alpha_testing() {
        material.alpha_mode = Some(AlphaMode::Mask);
        material.alpha_cutoff = Some(source.base().alpha_cutoff);
    }
}

fn set_double_sided(material: &mut Material, base: &MaterialBase, double_sided: bool) {
    if !base.back_face_culling {
        if !base.two_sided_lighting {
            log::warn!(
                "{}: back-face culling disabled without two-sided lighting is not supported in glTF",
                base.name
            );
        }
        material.double_sided = Some(true);
    } else if double_sided {
        material.double_sided = Some(true);
    }
}

fn set_emissive_color(material: &mut Material, emissive: Vec3) {
    if !fuzzy_equals(emissive, Vec3::ZERO, EPSILON) {
        material.emissive_factor = Some(emissive.to_array());
    }
}

/// Exports every slot's texture concurrently and attaches the ones that made it.
async fn attach_textures(
    exporter: &MaterialExporter<'_>,
    material: &mut Material,
    slots: Vec<(Slot, Option<TextureId>)>,
) -> Result<()> {
    if !exporter.options().has_texture_coords {
        return Ok(());
    }

    let mime_type = exporter.options().mime_type;
    let tasks = slots
        .into_iter()
        .filter_map(|(slot, id)| id.map(|id| (slot, id)))
        .map(|(slot, id)| async move {
            let info = exporter.export_texture(id, mime_type).await?;
            Ok::<_, ExportError>((slot, id, info))
        });
    let exported = try_join_all(tasks).await?;

    for (slot, id, info) in exported {
        let Some(info) = info else {
            continue;
        };
        apply_slot(exporter, material, slot, id, info);
    }
    Ok(())
}

fn apply_slot(
    exporter: &MaterialExporter<'_>,
    material: &mut Material,
    slot: Slot,
    id: TextureId,
    info: TextureInfo,
) {
    match slot {
        Slot::BaseColor => {
            material
                .pbr_metallic_roughness
                .get_or_insert_with(Default::default)
                .base_color_texture = Some(info);
        }
        Slot::MetallicRoughness => {
            material
                .pbr_metallic_roughness
                .get_or_insert_with(Default::default)
                .metallic_roughness_texture = Some(info);
        }
        Slot::Normal => {
            let level = exporter.textures().get(id).map_or(1.0, |t| t.level);
            material.normal_texture = Some(NormalTextureInfo {
                index: info.index,
                tex_coord: info.tex_coord,
                scale: (level != 1.0).then_some(level),
            });
        }
        Slot::Occlusion { strength } => {
            material.occlusion_texture = Some(OcclusionTextureInfo {
                index: info.index,
                tex_coord: info.tex_coord,
                strength,
            });
        }
        Slot::Emissive => material.emissive_texture = Some(info),
    }
}

async fn convert_standard(
    exporter: &MaterialExporter<'_>,
    source: &StandardMaterial,
) -> Result<Material> {
    let base = &source.base;
    let mut material = Material::named(&base.name);

    let diffuse = to_linear(source.diffuse_color) * 0.5;
    material.pbr_metallic_roughness = Some(PbrMetallicRoughness {
        base_color_factor: Some(diffuse.extend(base.alpha).to_array()),
        metallic_factor: Some(0.0),
        roughness_factor: Some(solve_roughness_from_specular_power(source.specular_power)),
        ..Default::default()
    });
    set_double_sided(&mut material, base, false);

    if exporter.options().has_texture_coords && source.emissive_texture.is_some() {
        material.emissive_factor = Some([1.0, 1.0, 1.0]);
    }

    if (base.alpha < 1.0 || source.opacity_texture.is_some())
        && base.alpha_blend_mode != AlphaBlendMode::Combine
    {
        log::warn!(
            "{}: glTF 2.0 does not support alpha blend mode {:?}",
            base.name,
            base.alpha_blend_mode
        );
    }
    set_emissive_color(&mut material, source.emissive_color);

    attach_textures(
        exporter,
        &mut material,
        vec![
            (Slot::BaseColor, source.diffuse_texture),
            (Slot::Normal, source.bump_texture),
            (Slot::Emissive, source.emissive_texture),
            (Slot::Occlusion { strength: Some(1.0) }, source.ambient_texture),
        ],
    )
    .await?;

    Ok(material)
}

async fn convert_pbr_metallic_roughness(
    exporter: &MaterialExporter<'_>,
    source: &PbrMetallicRoughnessMaterial,
) -> Result<Material> {
    let base = &source.base;
    let mut material = Material::named(&base.name);

    let white_and_opaque =
        fuzzy_equals(source.base_color, Vec3::ONE, EPSILON) && base.alpha == 1.0;
    material.pbr_metallic_roughness = Some(PbrMetallicRoughness {
        base_color_factor: (!white_and_opaque).then(|| source.base_color.extend(base.alpha).to_array()),
        metallic_factor: source.metallic.filter(|m| *m != 1.0),
        roughness_factor: source.roughness.filter(|r| *r != 1.0),
        ..Default::default()
    });
    set_double_sided(&mut material, base, source.double_sided);
    set_emissive_color(&mut material, source.emissive_color);

    attach_textures(
        exporter,
        &mut material,
        vec![
            (Slot::BaseColor, source.base_texture),
            (Slot::MetallicRoughness, source.metallic_roughness_texture),
            (Slot::Normal, source.normal_texture),
            (
                Slot::Occlusion {
                    strength: source.occlusion_strength,
                },
                source.occlusion_texture,
            ),
            (Slot::Emissive, source.emissive_texture),
        ],
    )
    .await?;

    Ok(material)
}

async fn convert_pbr_specular_glossiness(
    exporter: &MaterialExporter<'_>,
    source: &PbrSpecularGlossinessMaterial,
) -> Result<Material> {
    let base = &source.base;
    if source.reflectivity_texture.is_some() && !source.use_micro_surface_from_reflectivity_map_alpha {
        return Err(ExportError::UnsupportedMaterial(format!(
            "{}: glossiness values not stored in the reflectivity texture alpha are not supported",
            base.name
        )));
    }

    let mut material = Material::named(&base.name);
    let mut pbr = PbrMetallicRoughness::default();
    let factors = SpecularGlossiness {
        diffuse: source.albedo_color,
        specular: source.reflectivity_color,
        glossiness: source.micro_surface,
    };

    let has_textures = source.albedo_texture.is_some() || source.reflectivity_texture.is_some();
    let metallic_roughness = if has_textures && exporter.options().has_texture_coords {
        convert_texture_pair(exporter, source, &factors, &mut pbr).await?
    } else {
        convert_specular_glossiness(&factors)
    };

    let white_and_opaque =
        fuzzy_equals(metallic_roughness.base_color, Vec3::ONE, EPSILON) && base.alpha == 1.0;
    if !white_and_opaque {
        pbr.base_color_factor = Some(metallic_roughness.base_color.extend(base.alpha).to_array());
    }
    pbr.metallic_factor = Some(metallic_roughness.metallic).filter(|m| *m != 1.0);
    pbr.roughness_factor = Some(metallic_roughness.roughness).filter(|r| *r != 1.0);
    material.pbr_metallic_roughness = Some(pbr);

    set_double_sided(&mut material, base, false);
    set_emissive_color(&mut material, source.emissive_color);

    attach_textures(
        exporter,
        &mut material,
        vec![
            (Slot::Normal, source.bump_texture),
            (
                Slot::Occlusion {
                    strength: (source.ambient_texture_strength != 0.0)
                        .then_some(source.ambient_texture_strength),
                },
                source.ambient_texture,
            ),
            (Slot::Emissive, source.emissive_texture),
        ],
    )
    .await?;

    Ok(material)
}

/// Converts the albedo / reflectivity pair and registers the generated textures.
async fn convert_texture_pair(
    exporter: &MaterialExporter<'_>,
    source: &PbrSpecularGlossinessMaterial,
    factors: &SpecularGlossiness,
    pbr: &mut PbrMetallicRoughness,
) -> Result<MetallicRoughness> {
    let albedo = source
        .albedo_texture
        .map(|id| exporter.source_texture(id))
        .transpose()?;
    let reflectivity = source
        .reflectivity_texture
        .map(|id| exporter.source_texture(id))
        .transpose()?;

    let options = exporter.options();
    let converted = convert_specular_glossiness_textures(
        albedo,
        reflectivity,
        factors,
        options.mime_type,
        options.jpeg_quality,
    )
    .await?;

    let mut state = exporter.state().lock().await;
    let sampler = albedo.map(sampler_for);
    if let Some(image) = converted.base_color_image {
        let sampler = sampler.map(|s| state.sampler_index(s));
        let name = format!("baseColorTexture_{}", state.textures.len());
        let tex_coord = albedo.map_or(0, |t| t.coordinates_index);
        pbr.base_color_texture =
            Some(state.add_texture(&name, image, sampler, tex_coord, options.embed_images));
    }
    if let Some(image) = converted.metallic_roughness_image {
        let sampler = sampler.map(|s| state.sampler_index(s));
        let name = format!("metallicRoughnessTexture_{}", state.textures.len());
        let tex_coord = reflectivity.map_or(0, |t| t.coordinates_index);
        pbr.metallic_roughness_texture =
            Some(state.add_texture(&name, image, sampler, tex_coord, options.embed_images));
    }

    Ok(converted.factors)
}

/// Runs the extension hooks once the material's own textures are exported.
async fn finish_material(
    exporter: &MaterialExporter<'_>,
    mut material: Material,
    source: &SourceMaterial,
) -> Result<Material> {
    let additional: Vec<TextureId> = exporter
        .extensions()
        .iter()
        .flat_map(|ext| {
            ext.post_export_material_additional_textures(HOOK_CONTEXT, &material, source)
        })
        .collect();

    let mime_type = exporter.options().mime_type;
    try_join_all(
        additional
            .into_iter()
            .map(|id| exporter.export_texture(id, mime_type)),
    )
    .await?;

    for ext in exporter.extensions() {
        ext.post_export_material(HOOK_CONTEXT, exporter, &mut material, source)
            .await?;
    }
    Ok(material)
}
