//! Print the audio filter graph a manifest would produce.

use std::path::PathBuf;

use scenecast_export_engine::build_audio_graph;

use super::export::ExportManifest;

pub fn run(manifest_path: PathBuf) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
        anyhow::anyhow!("Failed to read manifest {}: {e}", manifest_path.display())
    })?;
    let manifest: ExportManifest = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse manifest: {e}"))?;

    let settings = &manifest.settings;
    let segment = settings.segment_settings(&settings.name);
    let graph = build_audio_graph(&segment.sounds, segment.sample_rate)?;

    if graph.is_empty() {
        println!("No sounds: video-only output, no audio filter graph.");
        return Ok(());
    }

    println!("Inputs:");
    for (index, input) in graph.inputs.iter().enumerate() {
        match input.seek {
            Some(seek) => println!("  [{}] {} (seek {seek:.3}s)", index + 1, input.path.display()),
            None => println!("  [{}] {}", index + 1, input.path.display()),
        }
    }

    println!("Filter graph:");
    if let Some(filter) = graph.filter_complex() {
        for chain in filter.split(';') {
            println!("  {chain}");
        }
    }

    Ok(())
}
