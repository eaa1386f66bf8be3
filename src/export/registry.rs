//! Output arrays of an export pass plus the lookups that keep them free of duplicates.

use std::collections::{BTreeMap, HashMap};

use rand::Rng as _;

use crate::{
    file_formats::gltf_schema::{Image, Material, MagFilter, MinFilter, Sampler, Texture, TextureInfo, WrapMode},
    texture::{encode::EncodedImage, AddressMode, SamplingMode, SourceTexture, TextureId},
};

#[derive(Default)]
pub struct ExportState {
    pub texture_map: HashMap<TextureId, TextureInfo>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    /// Encoded payload per image file name.
    pub image_data: BTreeMap<String, EncodedImage>,
    sampler_cache: HashMap<Sampler, u32>,
    image_files: HashMap<String, u32>,
}

impl ExportState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of an identical sampler if one was added before, otherwise of a new one.
    pub fn sampler_index(&mut self, sampler: Sampler) -> u32 {
        let samplers = &mut self.samplers;
        *self.sampler_cache.entry(sampler).or_insert_with(|| {
            samplers.push(sampler);
            (samplers.len() - 1) as u32
        })
    }

    /// Stores the payload under `{base_name}{ext}` and returns its image index.
    ///
    /// A name taken by different bytes gets a random suffix. A name taken by the same
    /// bytes reuses the existing image.
    pub fn add_image(&mut self, base_name: &str, image: EncodedImage, embed: bool) -> u32 {
        let extension = image.mime_type.extension();
        let mut file_name = format!("{}{}", base_name, extension);

        if let Some(existing) = self.image_data.get(&file_name) {
            if *existing == image {
                if let Some(&index) = self.image_files.get(&file_name) {
                    return index;
                }
            }
            let mut rng = rand::rng();
            while self.image_data.contains_key(&file_name) {
                file_name = format!("{}_{:08x}{}", base_name, rng.random::<u32>(), extension);
            }
            log::debug!("image name {}{} is taken, using {}", base_name, extension, file_name);
        }

        let (uri, mime_type) = if embed {
            (image.to_data_uri(), Some(image.mime_type.as_str().to_string()))
        } else {
            (file_name.clone(), None)
        };
        self.images.push(Image {
            name: Some(base_name.to_string()),
            uri: Some(uri),
            mime_type,
        });
        let index = (self.images.len() - 1) as u32;
        self.image_files.insert(file_name.clone(), index);
        self.image_data.insert(file_name, image);
        index
    }

    /// Adds the image and a texture referencing it.
    pub fn add_texture(
        &mut self,
        name: &str,
        image: EncodedImage,
        sampler: Option<u32>,
        tex_coord: u32,
        embed: bool,
    ) -> TextureInfo {
        let source = self.add_image(name, image, embed);
        self.textures.push(Texture {
            name: Some(name.to_string()),
            sampler,
            source,
        });
        TextureInfo {
            index: (self.textures.len() - 1) as u32,
            tex_coord: (tex_coord != 0).then_some(tex_coord),
        }
    }
}

pub fn wrap_mode(mode: AddressMode) -> WrapMode {
    match mode {
        AddressMode::Wrap => WrapMode::Repeat,
        AddressMode::Clamp => WrapMode::ClampToEdge,
        AddressMode::Mirror => WrapMode::MirroredRepeat,
        AddressMode::Border => {
            log::error!("unsupported texture wrap mode {:?}, using repeat", mode);
            WrapMode::Repeat
        }
    }
}

pub fn filters(mode: SamplingMode) -> (MagFilter, MinFilter) {
    match mode {
        SamplingMode::LinearLinear => (MagFilter::Linear, MinFilter::Linear),
        SamplingMode::LinearNearest => (MagFilter::Linear, MinFilter::Nearest),
        SamplingMode::NearestLinear => (MagFilter::Nearest, MinFilter::Linear),
        SamplingMode::NearestLinearMipLinear => (MagFilter::Nearest, MinFilter::LinearMipmapLinear),
        SamplingMode::NearestNearest => (MagFilter::Nearest, MinFilter::Nearest),
        SamplingMode::NearestLinearMipNearest => {
            (MagFilter::Nearest, MinFilter::LinearMipmapNearest)
        }
        SamplingMode::LinearNearestMipNearest => {
            (MagFilter::Linear, MinFilter::NearestMipmapNearest)
        }
        SamplingMode::LinearNearestMipLinear => (MagFilter::Linear, MinFilter::NearestMipmapLinear),
        SamplingMode::NearestNearestMipLinear => {
            (MagFilter::Nearest, MinFilter::NearestMipmapLinear)
        }
        SamplingMode::LinearLinearMipLinear => (MagFilter::Linear, MinFilter::LinearMipmapLinear),
        SamplingMode::LinearLinearMipNearest => (MagFilter::Linear, MinFilter::LinearMipmapNearest),
        SamplingMode::NearestNearestMipNearest => {
            (MagFilter::Nearest, MinFilter::NearestMipmapNearest)
        }
    }
}

pub fn sampler_for(texture: &SourceTexture) -> Sampler {
    let wrap_s = wrap_mode(texture.wrap_u);
    let wrap_t = wrap_mode(texture.wrap_v);
    let mut sampler = if wrap_s == WrapMode::Repeat && wrap_t == WrapMode::Repeat {
        // repeat is the glTF default
        Sampler::default()
    } else {
        Sampler {
            wrap_s: Some(wrap_s),
            wrap_t: Some(wrap_t),
            ..Default::default()
        }
    };
    if let Some(mode) = texture.sampling_mode {
        let (mag, min) = filters(mode);
        sampler.mag_filter = Some(mag);
        sampler.min_filter = Some(min);
    }
    sampler
}

/// Replaces path separators so a texture name can be used as a file name.
pub fn sanitize_texture_name(name: &str) -> String {
    name.replace("./", "_")
        .replace(".\\", "_")
        .replace('/', "_")
        .replace('\\', "_")
}
