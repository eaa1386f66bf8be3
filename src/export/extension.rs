use futures::future::{self, FutureExt as _, LocalBoxFuture};

use super::MaterialExporter;
use crate::{
    error::Result,
    file_formats::gltf_schema::{Material, TextureInfo},
    material::SourceMaterial,
    texture::{encode::ImageMimeType, SourceTexture, TextureId},
};

/// Hooks into the material export, called in registration order.
///
/// `context` names the exporter stage that is calling, e.g. `"exporter"` for texture
/// substitution and `"exportMaterial"` for the material hooks.
pub trait ExporterExtension {
    fn name(&self) -> &str;

    /// Offers a replacement for a texture before it is exported. The first extension
    /// that returns a texture wins.
    fn pre_export_texture<'a>(
        &'a self,
        _context: &'a str,
        _texture: TextureId,
        _mime_type: ImageMimeType,
    ) -> LocalBoxFuture<'a, Result<Option<TextureId>>> {
        future::ready(Ok(None)).boxed_local()
    }

    /// Called once per texture, right after it was added to the output.
    fn post_export_texture(&self, _context: &str, _info: &TextureInfo, _texture: &SourceTexture) {}

    /// Extra textures to export once a material's own textures are done.
    fn post_export_material_additional_textures(
        &self,
        _context: &str,
        _material: &Material,
        _source: &SourceMaterial,
    ) -> Vec<TextureId> {
        Vec::new()
    }

    /// Last chance to edit the material. Every texture it references is exported by now
    /// and can be looked up with [`MaterialExporter::texture_info`].
    fn post_export_material<'a>(
        &'a self,
        _context: &'a str,
        _exporter: &'a MaterialExporter<'_>,
        _material: &'a mut Material,
        _source: &'a SourceMaterial,
    ) -> LocalBoxFuture<'a, Result<()>> {
        future::ready(Ok(())).boxed_local()
    }
}
