use std::{env, fs, path::Path};

use gltf_material_export::{file_formats::library::LibraryFile, MaterialExporter};

fn export(library_path: &Path, out_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let base_dir = library_path.parent().unwrap_or(Path::new("."));
    let (options, textures, materials) = LibraryFile::load(library_path)?.into_libraries(base_dir)?;
    log::info!(
        "exporting {} materials, {} textures from {}",
        materials.len(),
        textures.len(),
        library_path.display()
    );

    let exporter = MaterialExporter::new(&textures, options);
    let results = pollster::block_on(exporter.export_materials(&materials));
    for (material, result) in materials.iter().zip(&results) {
        if let Err(e) = result {
            log::error!("{}: {}", material.name(), e);
        }
    }
    let output = exporter.finish();

    fs::create_dir_all(out_dir)?;
    let json = serde_json::to_string_pretty(&output)?;
    fs::write(out_dir.join("materials.gltf.json"), json)?;
    if !options.embed_images {
        for (file_name, image) in &output.image_data {
            fs::write(out_dir.join(file_name), &image.data)?;
        }
    }

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        return Err(format!("{} of {} materials failed to export", failed, materials.len()).into());
    }
    Ok(())
}

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let library_path = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("assets/materials.json");
    let out_dir = args.get(2).map(String::as_str).unwrap_or("export");

    export(Path::new(library_path), Path::new(out_dir))
}
