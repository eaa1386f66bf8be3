pub mod metallic_roughness;

pub use metallic_roughness::{
    convert_specular_glossiness, convert_specular_glossiness_textures, solve_metallic,
    ConvertedTextures, MetallicRoughness, SpecularGlossiness,
};
