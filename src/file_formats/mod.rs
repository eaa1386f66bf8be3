pub mod gltf_schema;
pub mod library;
