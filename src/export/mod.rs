//! Export session: converts source materials and collects the glTF output arrays.

use std::collections::BTreeMap;

use futures::{future::join_all, lock::Mutex};
use serde::Serialize;

use crate::{
    config::ExportOptions,
    error::{ExportError, Result},
    file_formats::gltf_schema::{Image, Material, Sampler, Texture, TextureInfo},
    material::SourceMaterial,
    texture::{
        encode::{encode_pixels, EncodedImage, ImageMimeType},
        SourceTexture, TextureId, TextureLibrary,
    },
};

mod converters;
pub mod extension;
pub mod registry;

pub use extension::ExporterExtension;
use registry::{sanitize_texture_name, ExportState};

const TEXTURE_HOOK_CONTEXT: &str = "exporter";
const LINK_HOOK_CONTEXT: &str = "linkTextureInfo";

/// Everything an export pass produced.
#[derive(Serialize, Debug, Default)]
pub struct ExportOutput {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub materials: Vec<Material>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub textures: Vec<Texture>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<Image>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub samplers: Vec<Sampler>,
    /// Payload of every image, keyed by file name.
    #[serde(skip)]
    pub image_data: BTreeMap<String, EncodedImage>,
}

/// Converts materials that reference textures from one [`TextureLibrary`].
///
/// Materials can be exported concurrently from a single thread; the output arrays are
/// behind one lock so texture dedup and image naming stay consistent.
pub struct MaterialExporter<'a> {
    textures: &'a TextureLibrary,
    options: ExportOptions,
    extensions: Vec<Box<dyn ExporterExtension + 'a>>,
    state: Mutex<ExportState>,
}

impl<'a> MaterialExporter<'a> {
    pub fn new(textures: &'a TextureLibrary, options: ExportOptions) -> Self {
        Self {
            textures,
            options,
            extensions: Vec::new(),
            state: Mutex::new(ExportState::new()),
        }
    }

    pub fn with_extension(mut self, extension: impl ExporterExtension + 'a) -> Self {
        log::debug!("registered exporter extension {}", extension.name());
        self.extensions.push(Box::new(extension));
        self
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn textures(&self) -> &'a TextureLibrary {
        self.textures
    }

    pub(crate) fn extensions(&self) -> &[Box<dyn ExporterExtension + 'a>] {
        &self.extensions
    }

    pub(crate) fn state(&self) -> &Mutex<ExportState> {
        &self.state
    }

    pub(crate) fn source_texture(&self, id: TextureId) -> Result<&'a SourceTexture> {
        self.textures
            .get(id)
            .ok_or_else(|| ExportError::UnknownTexture(format!("{:?}", id)))
    }

    /// Exports a texture once and returns its info; later calls return the cached info.
    ///
    /// Extensions may substitute the texture first. `Ok(None)` means the pixels could not
    /// be read or encoded and the texture was left out.
    pub async fn export_texture(
        &self,
        id: TextureId,
        mime_type: ImageMimeType,
    ) -> Result<Option<TextureInfo>> {
        for extension in &self.extensions {
            if let Some(replacement) = extension
                .pre_export_texture(TEXTURE_HOOK_CONTEXT, id, mime_type)
                .await?
            {
                log::debug!("{} replaced texture {:?}", extension.name(), id);
                return self.export_texture_info(replacement, mime_type).await;
            }
        }
        self.export_texture_info(id, mime_type).await
    }

    async fn export_texture_info(
        &self,
        id: TextureId,
        mime_type: ImageMimeType,
    ) -> Result<Option<TextureInfo>> {
        if let Some(info) = self.texture_info(id).await {
            return Ok(Some(info));
        }

        let texture = self.source_texture(id)?;
        let pixels = match texture.read_pixels().await {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!("{}: skipping texture, {}", texture.name, e);
                return Ok(None);
            }
        };

        // A texture that knows its own encoding keeps it
        let mime_type = texture
            .mime_type
            .as_deref()
            .and_then(ImageMimeType::from_mime_str)
            .unwrap_or(mime_type);
        let image = match encode_pixels(
            &pixels,
            texture.width,
            texture.height,
            mime_type,
            self.options.jpeg_quality,
        ) {
            Ok(image) => image,
            Err(e) => {
                log::warn!("{}: skipping texture, {}", texture.name, e);
                return Ok(None);
            }
        };

        let sampler = registry::sampler_for(texture);
        let info = {
            let mut state = self.state.lock().await;
            // another material may have exported it while we were encoding
            if let Some(info) = state.texture_map.get(&id) {
                return Ok(Some(*info));
            }
            let sampler = state.sampler_index(sampler);
            let info = state.add_texture(
                &sanitize_texture_name(&texture.name),
                image,
                Some(sampler),
                texture.coordinates_index,
                self.options.embed_images,
            );
            state.texture_map.insert(id, info);
            info
        };

        for extension in &self.extensions {
            extension.post_export_texture(LINK_HOOK_CONTEXT, &info, texture);
        }
        Ok(Some(info))
    }

    /// Info of an already exported texture, without exporting it.
    pub async fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        self.state.lock().await.texture_map.get(&id).copied()
    }

    /// Converts one material and appends it, returning its index in the materials array.
    ///
    /// Textures are registered as they are exported, so a material that fails after
    /// that point (for instance in an extension hook) leaves its textures and images in
    /// the output. Other materials may already reference them.
    pub async fn export_material(&self, source: &SourceMaterial) -> Result<usize> {
        let material = converters::convert_material(self, source).await?;
        let mut state = self.state.lock().await;
        state.materials.push(material);
        Ok(state.materials.len() - 1)
    }

    /// Converts all materials concurrently. Results come back in input order and
    /// successful materials are appended in that order too; a failed material does not
    /// stop the others.
    pub async fn export_materials(&self, sources: &[SourceMaterial]) -> Vec<Result<usize>> {
        let converted = join_all(
            sources
                .iter()
                .map(|source| converters::convert_material(self, source)),
        )
        .await;

        let mut state = self.state.lock().await;
        converted
            .into_iter()
            .map(|result| {
                let material = result?;
                state.materials.push(material);
                Ok(state.materials.len() - 1)
            })
            .collect()
    }

    pub fn strip_textures_from_material(&self, material: &Material) -> Material {
        material.without_textures()
    }

    pub fn has_textures_present(&self, material: &Material) -> bool {
        material.has_textures()
    }

    pub fn finish(self) -> ExportOutput {
        let state = self.state.into_inner();
        log::info!(
            "exported {} materials, {} textures, {} images, {} samplers",
            state.materials.len(),
            state.textures.len(),
            state.images.len(),
            state.samplers.len()
        );
        ExportOutput {
            materials: state.materials,
            textures: state.textures,
            images: state.images,
            samplers: state.samplers,
            image_data: state.image_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::{self, FutureExt as _, LocalBoxFuture};
    use glam::Vec3;

    use super::*;
    use crate::{
        file_formats::gltf_schema::AlphaMode,
        material::{
            MaterialBase, PbrMetallicRoughnessMaterial, PbrSpecularGlossinessMaterial,
            StandardMaterial,
        },
        texture::{AddressMode, UnavailablePixels},
    };

    fn solid(name: &str, value: u8) -> SourceTexture {
        SourceTexture::from_rgba8(name, 2, 2, vec![value; 16])
    }

    fn standard(name: &str) -> StandardMaterial {
        StandardMaterial {
            base: MaterialBase::named(name),
            ..Default::default()
        }
    }

    #[test]
    fn same_texture_is_exported_once() {
        let mut library = TextureLibrary::new();
        let id = library.insert(solid("wood", 100));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());

        let first = pollster::block_on(exporter.export_texture(id, ImageMimeType::Png)).unwrap();
        let second = pollster::block_on(exporter.export_texture(id, ImageMimeType::Png)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.map(|i| i.index), Some(0));
        assert_eq!(pollster::block_on(exporter.texture_info(id)), first);

        let output = exporter.finish();
        assert_eq!(output.textures.len(), 1);
        assert_eq!(output.images.len(), 1);
        assert_eq!(output.images[0].uri.as_deref(), Some("wood.png"));
        assert!(output.image_data.contains_key("wood.png"));
    }

    #[test]
    fn matching_samplers_are_shared() {
        let mut library = TextureLibrary::new();
        let a = library.insert(solid("a", 1));
        let b = library.insert(solid("b", 2));
        let c = library.insert(solid("c", 3).with_wrap(AddressMode::Clamp, AddressMode::Clamp));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());

        for id in [a, b, c] {
            pollster::block_on(exporter.export_texture(id, ImageMimeType::Png)).unwrap();
        }
        let output = exporter.finish();
        assert_eq!(output.samplers.len(), 2);
        assert_eq!(output.textures[0].sampler, output.textures[1].sampler);
        assert_ne!(output.textures[0].sampler, output.textures[2].sampler);
    }

    #[test]
    fn texture_mime_type_is_preserved() {
        let mut library = TextureLibrary::new();
        let id = library.insert(solid("photo", 80).with_mime_type("image/jpeg"));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        pollster::block_on(exporter.export_texture(id, ImageMimeType::Png)).unwrap();

        let output = exporter.finish();
        assert_eq!(output.images[0].uri.as_deref(), Some("photo.jpeg"));
        assert_eq!(output.image_data["photo.jpeg"].mime_type, ImageMimeType::Jpeg);
    }

    #[test]
    fn opaque_standard_material_has_no_alpha_mode() {
        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            diffuse_color: Vec3::ONE,
            specular_power: 0.0,
            ..standard("plastic")
        });

        let index = pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let material = &output.materials[index];
        assert_eq!(material.alpha_mode, None);
        assert_eq!(material.double_sided, None);

        let pbr = material.pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.metallic_factor, Some(0.0));
        assert_eq!(pbr.roughness_factor, Some(1.0));
        assert_eq!(pbr.base_color_factor, Some([0.5, 0.5, 0.5, 1.0]));
    }

    #[test]
    fn translucent_standard_material_blends() {
        let mut library = TextureLibrary::new();
        let diffuse = library.insert(solid("diffuse", 200));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            base: MaterialBase {
                alpha: 0.5,
                back_face_culling: false,
                ..MaterialBase::named("glass")
            },
            diffuse_texture: Some(diffuse),
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let material = &output.materials[0];
        assert_eq!(material.alpha_mode, Some(AlphaMode::Blend));
        assert_eq!(material.double_sided, Some(true));
        let pbr = material.pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_texture.map(|t| t.index), Some(0));
        assert_eq!(pbr.base_color_factor.map(|f| f[3]), Some(0.5));
    }

    #[test]
    fn unsupported_blend_mode_overrides_transparency_mode() {
        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            base: MaterialBase {
                alpha: 0.5,
                alpha_blend_mode: crate::material::AlphaBlendMode::Add,
                transparency_mode: Some(crate::material::TransparencyMode::AlphaBlend),
                ..MaterialBase::named("additive")
            },
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        assert_eq!(output.materials[0].alpha_mode, None);
        assert_eq!(output.materials[0].alpha_cutoff, None);
    }

    #[test]
    fn standard_textures_fill_every_slot() {
        let mut library = TextureLibrary::new();
        let bump = library.insert(solid("bump", 128).with_level(0.5).with_coordinates_index(1));
        let emissive = library.insert(solid("glow", 255));
        let ambient = library.insert(solid("ao", 90));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            bump_texture: Some(bump),
            emissive_texture: Some(emissive),
            ambient_texture: Some(ambient),
            ..standard("lamp")
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let material = &output.materials[0];

        let normal = material.normal_texture.unwrap();
        assert_eq!(normal.scale, Some(0.5));
        assert_eq!(normal.tex_coord, Some(1));
        assert!(material.emissive_texture.is_some());
        assert_eq!(material.emissive_factor, Some([1.0, 1.0, 1.0]));
        assert_eq!(material.occlusion_texture.and_then(|o| o.strength), Some(1.0));
        assert_eq!(output.textures.len(), 3);
    }

    #[test]
    fn pbr_defaults_are_omitted() {
        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrMetallicRoughness(PbrMetallicRoughnessMaterial {
            base: MaterialBase::named("metal"),
            metallic: Some(1.0),
            roughness: Some(1.0),
            emissive_color: Vec3::ZERO,
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let json = serde_json::to_value(&output.materials[0]).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "name": "metal", "pbrMetallicRoughness": {} })
        );
    }

    #[test]
    fn pbr_factors_are_kept() {
        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrMetallicRoughness(PbrMetallicRoughnessMaterial {
            base: MaterialBase {
                alpha: 0.8,
                ..MaterialBase::named("painted")
            },
            metallic: Some(0.2),
            roughness: None,
            emissive_color: Vec3::new(0.0, 1.0, 0.0),
            double_sided: true,
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let material = &output.materials[0];
        let pbr = material.pbr_metallic_roughness.as_ref().unwrap();
        // white but translucent, so the alpha has to survive
        assert_eq!(pbr.base_color_factor, Some([1.0, 1.0, 1.0, 0.8]));
        assert_eq!(pbr.metallic_factor, Some(0.2));
        assert_eq!(pbr.roughness_factor, None);
        assert_eq!(material.emissive_factor, Some([0.0, 1.0, 0.0]));
        assert_eq!(material.double_sided, Some(true));
        assert_eq!(material.alpha_mode, Some(AlphaMode::Blend));
    }

    #[test]
    fn reflectivity_without_glossiness_is_rejected() {
        let mut library = TextureLibrary::new();
        let reflectivity = library.insert(solid("reflectivity", 20));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
            base: MaterialBase::named("chrome"),
            reflectivity_texture: Some(reflectivity),
            use_micro_surface_from_reflectivity_map_alpha: false,
            ..Default::default()
        });

        let result = pollster::block_on(exporter.export_material(&source));
        assert!(matches!(result, Err(ExportError::UnsupportedMaterial(_))));
        let output = exporter.finish();
        assert!(output.materials.is_empty());
        assert!(output.textures.is_empty());
    }

    #[test]
    fn specular_glossiness_factors_are_converted() {
        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
            base: MaterialBase::named("matte"),
            albedo_color: Vec3::ONE,
            reflectivity_color: Vec3::ZERO,
            micro_surface: 0.25,
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let pbr = output.materials[0].pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_factor, None);
        assert_eq!(pbr.metallic_factor, Some(0.0));
        assert_eq!(pbr.roughness_factor, Some(0.75));
    }

    #[test]
    fn specular_glossiness_textures_are_generated() {
        let mut library = TextureLibrary::new();
        let albedo = library.insert(
            SourceTexture::from_rgba8("albedo", 2, 1, vec![255, 255, 255, 255, 64, 128, 32, 255])
                .with_wrap(AddressMode::Mirror, AddressMode::Mirror),
        );
        let reflectivity = library.insert(SourceTexture::from_rgba8(
            "reflectivity",
            2,
            1,
            vec![0, 0, 0, 255, 0, 0, 0, 255],
        ));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
            base: MaterialBase::named("painted"),
            albedo_texture: Some(albedo),
            reflectivity_texture: Some(reflectivity),
            use_micro_surface_from_reflectivity_map_alpha: true,
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let pbr = output.materials[0].pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_texture.map(|t| t.index), Some(0));
        assert_eq!(pbr.metallic_roughness_texture.map(|t| t.index), Some(1));
        assert_eq!(pbr.base_color_factor, None);
        assert_eq!(pbr.metallic_factor, Some(0.0));
        assert_eq!(pbr.roughness_factor, Some(0.0));

        assert_eq!(output.textures[0].name.as_deref(), Some("baseColorTexture_0"));
        assert_eq!(output.textures[1].name.as_deref(), Some("metallicRoughnessTexture_1"));
        // both generated textures share the albedo's sampler
        assert_eq!(output.samplers.len(), 1);
        assert_eq!(output.textures[0].sampler, Some(0));
        assert_eq!(output.textures[1].sampler, Some(0));
    }

    #[test]
    fn uniform_specular_glossiness_adds_no_sampler() {
        let mut library = TextureLibrary::new();
        let albedo = library.insert(
            SourceTexture::from_rgba8("albedo", 2, 1, vec![128; 8])
                .with_wrap(AddressMode::Clamp, AddressMode::Clamp),
        );
        let reflectivity = library.insert(SourceTexture::from_rgba8(
            "reflectivity",
            2,
            1,
            vec![255, 255, 255, 128, 255, 255, 255, 128],
        ));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
            base: MaterialBase::named("flat"),
            albedo_texture: Some(albedo),
            reflectivity_texture: Some(reflectivity),
            use_micro_surface_from_reflectivity_map_alpha: true,
            ..Default::default()
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let pbr = output.materials[0].pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_texture, None);
        assert_eq!(pbr.metallic_roughness_texture, None);
        assert!(output.textures.is_empty());
        assert!(output.samplers.is_empty());
    }

    #[test]
    fn unreadable_texture_drops_the_channel() {
        let mut library = TextureLibrary::new();
        let gone = library.insert(SourceTexture::new("gone", 4, 4, UnavailablePixels));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            diffuse_texture: Some(gone),
            ..standard("lost")
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        let pbr = output.materials[0].pbr_metallic_roughness.as_ref().unwrap();
        assert_eq!(pbr.base_color_texture, None);
        assert!(output.textures.is_empty());
    }

    #[test]
    fn missing_texture_coordinates_skip_textures() {
        let mut library = TextureLibrary::new();
        let diffuse = library.insert(solid("diffuse", 10));
        let options = ExportOptions {
            has_texture_coords: false,
            ..Default::default()
        };
        let exporter = MaterialExporter::new(&library, options);
        let source = SourceMaterial::Standard(StandardMaterial {
            diffuse_texture: Some(diffuse),
            ..standard("untextured")
        });

        pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();
        assert!(!has_any_texture(&output));
    }

    fn has_any_texture(output: &ExportOutput) -> bool {
        !output.textures.is_empty() || output.materials.iter().any(Material::has_textures)
    }

    #[test]
    fn batch_results_keep_input_order() {
        let mut library = TextureLibrary::new();
        let reflectivity = library.insert(solid("reflectivity", 20));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let sources = vec![
            SourceMaterial::Standard(standard("first")),
            SourceMaterial::PbrSpecularGlossiness(PbrSpecularGlossinessMaterial {
                base: MaterialBase::named("broken"),
                reflectivity_texture: Some(reflectivity),
                ..Default::default()
            }),
            SourceMaterial::Standard(standard("second")),
        ];

        let results = pollster::block_on(exporter.export_materials(&sources));
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().ok(), Some(&0));
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().ok(), Some(&1));

        let output = exporter.finish();
        let names: Vec<_> = output.materials.iter().filter_map(|m| m.name.as_deref()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn shared_texture_across_materials_is_exported_once() {
        let mut library = TextureLibrary::new();
        let shared = library.insert(solid("shared", 77));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let sources = vec![
            SourceMaterial::Standard(StandardMaterial {
                diffuse_texture: Some(shared),
                ..standard("a")
            }),
            SourceMaterial::PbrMetallicRoughness(PbrMetallicRoughnessMaterial {
                base: MaterialBase::named("b"),
                base_texture: Some(shared),
                ..Default::default()
            }),
        ];

        let results = pollster::block_on(exporter.export_materials(&sources));
        assert!(results.iter().all(|r| r.is_ok()));
        let output = exporter.finish();
        assert_eq!(output.textures.len(), 1);
        assert_eq!(output.images.len(), 1);
    }

    #[test]
    fn strip_textures_keeps_factors() {
        let mut library = TextureLibrary::new();
        let diffuse = library.insert(solid("diffuse", 10));
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let source = SourceMaterial::Standard(StandardMaterial {
            diffuse_texture: Some(diffuse),
            ..standard("textured")
        });
        let index = pollster::block_on(exporter.export_material(&source)).unwrap();
        let output = exporter.finish();

        let library = TextureLibrary::new();
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let material = &output.materials[index];
        assert!(exporter.has_textures_present(material));
        let stripped = exporter.strip_textures_from_material(material);
        assert!(!exporter.has_textures_present(&stripped));
        assert_eq!(
            stripped.pbr_metallic_roughness.and_then(|p| p.metallic_factor),
            Some(0.0)
        );
    }

    struct LinkedTexture {
        extra: TextureId,
    }

    impl ExporterExtension for LinkedTexture {
        fn name(&self) -> &str {
            "EXT_linked_texture"
        }

        fn post_export_material_additional_textures(
            &self,
            _context: &str,
            _material: &Material,
            _source: &SourceMaterial,
        ) -> Vec<TextureId> {
            vec![self.extra]
        }

        fn post_export_material<'a>(
            &'a self,
            _context: &'a str,
            exporter: &'a MaterialExporter<'_>,
            material: &'a mut Material,
            _source: &'a SourceMaterial,
        ) -> LocalBoxFuture<'a, Result<()>> {
            async move {
                let info = exporter.texture_info(self.extra).await;
                let mut extensions = serde_json::Map::new();
                extensions.insert(
                    self.name().to_string(),
                    serde_json::json!({ "texture": info.map(|i| i.index) }),
                );
                material.extensions = Some(extensions);
                Ok(())
            }
            .boxed_local()
        }
    }

    #[test]
    fn extensions_run_after_additional_textures() {
        let mut library = TextureLibrary::new();
        let extra = library.insert(solid("sheen", 40));
        let exporter = MaterialExporter::new(&library, ExportOptions::default())
            .with_extension(LinkedTexture { extra });

        pollster::block_on(exporter.export_material(&SourceMaterial::Standard(standard("cloth"))))
            .unwrap();
        let output = exporter.finish();
        assert_eq!(output.textures.len(), 1);
        let extensions = output.materials[0].extensions.as_ref().unwrap();
        assert_eq!(extensions["EXT_linked_texture"], serde_json::json!({ "texture": 0 }));
    }

    struct Substitute {
        from: TextureId,
        to: TextureId,
    }

    impl ExporterExtension for Substitute {
        fn name(&self) -> &str {
            "substitute"
        }

        fn pre_export_texture<'a>(
            &'a self,
            _context: &'a str,
            texture: TextureId,
            _mime_type: ImageMimeType,
        ) -> LocalBoxFuture<'a, Result<Option<TextureId>>> {
            let replacement = (texture == self.from).then_some(self.to);
            future::ready(Ok(replacement)).boxed_local()
        }
    }

    #[test]
    fn pre_export_hook_substitutes_textures() {
        let mut library = TextureLibrary::new();
        let original = library.insert(solid("original", 1));
        let replacement = library.insert(solid("replacement", 2));
        let exporter = MaterialExporter::new(&library, ExportOptions::default()).with_extension(
            Substitute {
                from: original,
                to: replacement,
            },
        );

        pollster::block_on(exporter.export_texture(original, ImageMimeType::Png)).unwrap();
        assert!(pollster::block_on(exporter.texture_info(replacement)).is_some());
        assert!(pollster::block_on(exporter.texture_info(original)).is_none());
        let output = exporter.finish();
        assert_eq!(output.textures[0].name.as_deref(), Some("replacement"));
    }

    struct Rejecting;

    impl ExporterExtension for Rejecting {
        fn name(&self) -> &str {
            "rejecting"
        }

        fn post_export_material<'a>(
            &'a self,
            _context: &'a str,
            _exporter: &'a MaterialExporter<'_>,
            material: &'a mut Material,
            _source: &'a SourceMaterial,
        ) -> LocalBoxFuture<'a, Result<()>> {
            let error = ExportError::UnsupportedMaterial(material.name.clone().unwrap_or_default());
            future::ready(Err(error)).boxed_local()
        }
    }

    #[test]
    fn failed_material_keeps_its_textures() {
        let mut library = TextureLibrary::new();
        let diffuse = library.insert(solid("diffuse", 90));
        let exporter =
            MaterialExporter::new(&library, ExportOptions::default()).with_extension(Rejecting);
        let source = SourceMaterial::Standard(StandardMaterial {
            diffuse_texture: Some(diffuse),
            ..standard("rejected")
        });

        let result = pollster::block_on(exporter.export_material(&source));
        assert!(matches!(result, Err(ExportError::UnsupportedMaterial(_))));
        let output = exporter.finish();
        assert!(output.materials.is_empty());
        assert_eq!(output.textures.len(), 1);
        assert_eq!(output.images.len(), 1);
    }

    #[test]
    fn output_is_valid_gltf() {
        let mut library = TextureLibrary::new();
        let diffuse = library.insert(
            solid("textures/diffuse.png", 120).with_wrap(AddressMode::Clamp, AddressMode::Mirror),
        );
        let exporter = MaterialExporter::new(&library, ExportOptions::default());
        let sources = vec![
            SourceMaterial::Standard(StandardMaterial {
                diffuse_texture: Some(diffuse),
                ..standard("a")
            }),
            SourceMaterial::PbrMetallicRoughness(PbrMetallicRoughnessMaterial {
                base: MaterialBase {
                    alpha: 0.3,
                    ..MaterialBase::named("b")
                },
                metallic: Some(0.5),
                ..Default::default()
            }),
        ];
        pollster::block_on(exporter.export_materials(&sources));
        let output = exporter.finish();

        let mut json = serde_json::to_value(&output).unwrap();
        json["asset"] = serde_json::json!({ "version": "2.0" });
        let root: gltf::json::Root = serde_json::from_value(json).unwrap();
        assert_eq!(root.materials.len(), 2);
        assert_eq!(root.textures.len(), 1);
        assert_eq!(root.images[0].uri.as_deref(), Some("textures_diffuse.png.png"));
        assert_eq!(root.materials[1].pbr_metallic_roughness.metallic_factor.0, 0.5);
    }
}
