//! Specular-glossiness to metallic-roughness conversion, for factors and for texture pairs.

use std::borrow::Cow;

use glam::{Vec3, Vec4};

use crate::{
    color::{
        fuzzy_equals, max_component, perceived_brightness, to_gamma, to_linear,
        DIELECTRIC_SPECULAR, EPSILON,
    },
    error::Result,
    texture::{
        encode::{encode_pixels, EncodedImage, ImageMimeType},
        pixels::{resize_to_common_dimensions, TexelImage},
        PixelBuffer, SourceTexture,
    },
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecularGlossiness {
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub glossiness: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetallicRoughness {
    pub base_color: Vec3,
    pub metallic: f32,
    pub roughness: f32,
}

/// Solves `k·m² + b·m + c = 0` for the metalness that reproduces the given brightnesses.
pub fn solve_metallic(diffuse: f32, specular: f32, one_minus_specular_strength: f32) -> f32 {
    if specular < DIELECTRIC_SPECULAR {
        return 0.0;
    }

    let a = DIELECTRIC_SPECULAR;
    let b = diffuse * one_minus_specular_strength / (1.0 - DIELECTRIC_SPECULAR) + specular
        - 2.0 * DIELECTRIC_SPECULAR;
    let c = DIELECTRIC_SPECULAR - specular;
    let d = b * b - 4.0 * a * c;
    ((-b + d.sqrt()) / (2.0 * a)).clamp(0.0, 1.0)
}

/// Inputs are expected in linear space.
pub fn convert_specular_glossiness(input: &SpecularGlossiness) -> MetallicRoughness {
    let diffuse_brightness = perceived_brightness(input.diffuse);
    let specular_brightness = perceived_brightness(input.specular);
    let one_minus_specular_strength = 1.0 - max_component(input.specular);
    let metallic = solve_metallic(
        diffuse_brightness,
        specular_brightness,
        one_minus_specular_strength,
    );

    let from_diffuse = input.diffuse
        * (one_minus_specular_strength
            / (1.0 - DIELECTRIC_SPECULAR)
            / (1.0 - metallic).max(EPSILON));
    let from_specular = (input.specular - Vec3::splat(DIELECTRIC_SPECULAR * (1.0 - metallic)))
        / metallic.max(EPSILON);
    let base_color = from_diffuse
        .lerp(from_specular, metallic * metallic)
        .clamp(Vec3::ZERO, Vec3::ONE);

    MetallicRoughness {
        base_color,
        metallic,
        roughness: 1.0 - input.glossiness,
    }
}

/// Result of converting a texture pair on the cpu. A buffer is `None` when every texel
/// came out white, in which case the factor alone describes the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct MetallicRoughnessTexels {
    pub width: u32,
    pub height: u32,
    pub factors: MetallicRoughness,
    pub base_color: Option<Vec<u8>>,
    pub metallic_roughness: Option<Vec<u8>>,
}

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn divisor(max: f32) -> f32 {
    if max > EPSILON {
        max
    } else {
        1.0
    }
}

/// Runs the solver on every texel and normalizes the results by their maxima.
///
/// `factors` are multiplied into each texel first. The returned factors are the per
/// channel maxima, so factor times texture reproduces the converted values.
pub fn convert_texels(
    diffuse: &TexelImage,
    specular_glossiness: &TexelImage,
    factors: &SpecularGlossiness,
) -> MetallicRoughnessTexels {
    let specular_glossiness = if (specular_glossiness.width, specular_glossiness.height)
        == (diffuse.width, diffuse.height)
    {
        Cow::Borrowed(specular_glossiness)
    } else {
        Cow::Owned(specular_glossiness.resized(diffuse.width, diffuse.height))
    };

    let texel_count = diffuse.texel_count();
    let mut base_colors = Vec::with_capacity(texel_count);
    let mut metallic_roughness = Vec::with_capacity(texel_count);
    let mut max_base_color = Vec3::ZERO;
    let mut max_metallic = 0.0f32;
    let mut max_roughness = 0.0f32;

    for i in 0..texel_count {
        let diffuse_texel = diffuse.texel(i);
        let specular_texel = specular_glossiness.texel(i);

        let converted = convert_specular_glossiness(&SpecularGlossiness {
            diffuse: to_linear(diffuse_texel.truncate()) * factors.diffuse,
            specular: to_linear(specular_texel.truncate()) * factors.specular,
            glossiness: specular_texel.w * factors.glossiness,
        });

        max_base_color = max_base_color.max(converted.base_color);
        max_metallic = max_metallic.max(converted.metallic);
        max_roughness = max_roughness.max(converted.roughness);

        let alpha = if diffuse.has_alpha { diffuse_texel.w } else { 1.0 };
        base_colors.push(converted.base_color.extend(alpha));
        metallic_roughness.push(Vec4::new(0.0, converted.roughness, converted.metallic, 1.0));
    }

    let base_color_divisor = Vec3::new(
        divisor(max_base_color.x),
        divisor(max_base_color.y),
        divisor(max_base_color.z),
    );
    let roughness_divisor = divisor(max_roughness);
    let metallic_divisor = divisor(max_metallic);

    let mut write_base_color = false;
    let mut write_metallic_roughness = false;

    for (base_color, mr) in base_colors.iter_mut().zip(metallic_roughness.iter_mut()) {
        let gamma = to_gamma(base_color.truncate() / base_color_divisor);
        *base_color = gamma.extend(base_color.w);
        if !fuzzy_equals(gamma, Vec3::ONE, EPSILON) {
            write_base_color = true;
        }

        mr.y /= roughness_divisor;
        mr.z /= metallic_divisor;
        if !fuzzy_equals(Vec3::new(1.0, mr.y, mr.z), Vec3::ONE, EPSILON) {
            write_metallic_roughness = true;
        }
    }

    let to_bytes = |texels: &[Vec4]| -> Vec<u8> {
        texels
            .iter()
            .flat_map(|t| t.to_array())
            .map(quantize)
            .collect()
    };

    MetallicRoughnessTexels {
        width: diffuse.width,
        height: diffuse.height,
        factors: MetallicRoughness {
            base_color: max_base_color,
            metallic: max_metallic,
            roughness: max_roughness,
        },
        base_color: write_base_color.then(|| to_bytes(&base_colors)),
        metallic_roughness: write_metallic_roughness.then(|| to_bytes(&metallic_roughness)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedTextures {
    pub factors: MetallicRoughness,
    pub base_color_image: Option<EncodedImage>,
    pub metallic_roughness_image: Option<EncodedImage>,
}

/// Converts a diffuse / specular-glossiness texture pair into encoded base color and
/// metallic-roughness images. Either texture may be missing, not both.
pub async fn convert_specular_glossiness_textures(
    diffuse: Option<&SourceTexture>,
    specular_glossiness: Option<&SourceTexture>,
    factors: &SpecularGlossiness,
    mime_type: ImageMimeType,
    jpeg_quality: u8,
) -> Result<ConvertedTextures> {
    let (diffuse, specular_glossiness) =
        resize_to_common_dimensions(diffuse, specular_glossiness).await?;

    let texels = convert_texels(&diffuse, &specular_glossiness, factors);
    let encode = |data: Vec<u8>| {
        encode_pixels(
            &PixelBuffer::U8(data),
            texels.width,
            texels.height,
            mime_type,
            jpeg_quality,
        )
    };

    let base_color_image = texels.base_color.clone().map(encode).transpose()?;
    let metallic_roughness_image = texels.metallic_roughness.clone().map(encode).transpose()?;
    log::debug!(
        "converted {}x{} specular glossiness pair, base color texture: {}, metallic roughness texture: {}",
        texels.width,
        texels.height,
        base_color_image.is_some(),
        metallic_roughness_image.is_some()
    );

    Ok(ConvertedTextures {
        factors: texels.factors,
        base_color_image,
        metallic_roughness_image,
    })
}
