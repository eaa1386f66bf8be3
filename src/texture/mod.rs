use futures::future::{self, FutureExt as _, LocalBoxFuture};
use generational_arena::{Arena, Index};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

pub mod encode;
pub mod gpu;
pub mod pixels;

/// Stable identity of a texture inside a [`TextureLibrary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(Index);

/// Raw samples as they come back from a pixel read, always RGBA interleaved.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    F32(Vec<f32>),
    /// Half floats or 16 bit unorm, not convertible.
    U16(Vec<u16>),
}

impl PixelBuffer {
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(data) => data.len(),
            PixelBuffer::F32(data) => data.len(),
            PixelBuffer::U16(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Anything that can hand back the pixels of a texture, possibly after waiting on the gpu.
pub trait PixelSource {
    fn read_pixels(&self) -> LocalBoxFuture<'_, Result<PixelBuffer>>;
}

/// Pixels already resident in host memory.
pub struct RawTexture {
    pixels: PixelBuffer,
}

impl RawTexture {
    pub fn new(pixels: PixelBuffer) -> Self {
        Self { pixels }
    }

    pub fn from_image(img: &image::DynamicImage) -> Self {
        let pixels = match img {
            image::DynamicImage::ImageRgb32F(_) | image::DynamicImage::ImageRgba32F(_) => {
                PixelBuffer::F32(img.to_rgba32f().into_raw())
            }
            _ => PixelBuffer::U8(img.to_rgba8().into_raw()),
        };
        Self { pixels }
    }
}

impl PixelSource for RawTexture {
    fn read_pixels(&self) -> LocalBoxFuture<'_, Result<PixelBuffer>> {
        future::ready(Ok(self.pixels.clone())).boxed_local()
    }
}

/// A source that never produces pixels, e.g. a render target that was already released.
pub struct UnavailablePixels;

impl PixelSource for UnavailablePixels {
    fn read_pixels(&self) -> LocalBoxFuture<'_, Result<PixelBuffer>> {
        future::ready(Err(ExportError::PixelRead("pixels unavailable".to_string()))).boxed_local()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    Clamp,
    #[default]
    Wrap,
    Mirror,
    Border,
}

/// Sampling modes named mag_min[_mip].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    NearestNearestMipLinear,
    LinearLinearMipNearest,
    LinearLinearMipLinear,
    NearestNearestMipNearest,
    NearestLinearMipNearest,
    NearestLinearMipLinear,
    NearestLinear,
    NearestNearest,
    LinearNearestMipNearest,
    LinearNearestMipLinear,
    LinearLinear,
    LinearNearest,
}

pub struct SourceTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub wrap_u: AddressMode,
    pub wrap_v: AddressMode,
    pub sampling_mode: Option<SamplingMode>,
    /// UV channel the texture samples from.
    pub coordinates_index: u32,
    /// Strength, used as the normal map scale.
    pub level: f32,
    pub has_alpha: bool,
    pub mime_type: Option<String>,
    pixels: Box<dyn PixelSource>,
}

impl SourceTexture {
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        pixels: impl PixelSource + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            wrap_u: AddressMode::Wrap,
            wrap_v: AddressMode::Wrap,
            sampling_mode: None,
            coordinates_index: 0,
            level: 1.0,
            has_alpha: false,
            mime_type: None,
            pixels: Box::new(pixels),
        }
    }

    pub fn from_rgba8(name: impl Into<String>, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(name, width, height, RawTexture::new(PixelBuffer::U8(data)))
    }

    pub fn with_wrap(mut self, wrap_u: AddressMode, wrap_v: AddressMode) -> Self {
        self.wrap_u = wrap_u;
        self.wrap_v = wrap_v;
        self
    }

    pub fn with_sampling_mode(mut self, sampling_mode: SamplingMode) -> Self {
        self.sampling_mode = Some(sampling_mode);
        self
    }

    pub fn with_coordinates_index(mut self, coordinates_index: u32) -> Self {
        self.coordinates_index = coordinates_index;
        self
    }

    pub fn with_level(mut self, level: f32) -> Self {
        self.level = level;
        self
    }

    pub fn with_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn read_pixels(&self) -> LocalBoxFuture<'_, Result<PixelBuffer>> {
        self.pixels.read_pixels()
    }
}

impl std::fmt::Debug for SourceTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceTexture")
            .field("name", &self.name)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Owns every source texture that materials may reference.
#[derive(Default)]
pub struct TextureLibrary {
    entries: Arena<SourceTexture>,
}

impl TextureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, texture: SourceTexture) -> TextureId {
        TextureId(self.entries.insert(texture))
    }

    pub fn get(&self, id: TextureId) -> Option<&SourceTexture> {
        self.entries.get(id.0)
    }

    pub fn find_by_name(&self, name: &str) -> Option<TextureId> {
        self.entries
            .iter()
            .find(|(_, texture)| texture.name == name)
            .map(|(idx, _)| TextureId(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
