//! Run an export from a manifest.

use std::io::Write;
use std::path::PathBuf;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

use scenecast_common::{AppConfig, ScenecastError};
use scenecast_export_engine::ExportOrchestrator;
use scenecast_export_model::{ExportSettings, RenderResult, SceneDescriptor};

/// On-disk export description: run settings plus the ordered scene cues
/// the frame stream follows.
#[derive(Debug, Deserialize)]
pub struct ExportManifest {
    pub settings: ExportSettings,

    /// Scene boundaries in frame order. Empty means one scene named
    /// after the run starting at frame 0.
    #[serde(default)]
    pub scenes: Vec<SceneDescriptor>,
}

pub async fn run(manifest_path: PathBuf, frames: Option<PathBuf>) -> anyhow::Result<()> {
    if !manifest_path.exists() {
        return Err(ScenecastError::FileNotFound {
            path: manifest_path,
        }
        .into());
    }

    let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
        anyhow::anyhow!("Failed to read manifest {}: {e}", manifest_path.display())
    })?;
    let manifest: ExportManifest = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse manifest: {e}"))?;

    let config = AppConfig::load();
    if !scenecast_export_engine::is_encoder_available(&config.encoder) {
        return Err(ScenecastError::unsupported(format!(
            "No usable encoder found (expected '{}' on PATH, or set encoder.binary in the config)",
            config.encoder.binary.display()
        ))
        .into());
    }

    println!("Exporting manifest: {}", manifest_path.display());
    println!("  Output dir: {}", manifest.settings.dest_dir.display());
    println!(
        "  Resolution: {}x{} @ {}fps, {} frames",
        manifest.settings.width,
        manifest.settings.height,
        manifest.settings.fps,
        manifest.settings.duration_frames
    );

    match frames {
        Some(path) => {
            if !path.exists() {
                return Err(ScenecastError::FileNotFound { path }.into());
            }
            let file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to open frame stream {}: {e}", path.display()))?;
            drive(manifest, config, BufReader::new(file)).await
        }
        None => drive(manifest, config, BufReader::new(tokio::io::stdin())).await,
    }
}

/// Pump frames from the reader through the orchestrator, reporting scene
/// cues at their frame boundaries.
async fn drive<R>(
    manifest: ExportManifest,
    config: AppConfig,
    mut reader: BufReader<R>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
{
    let settings = manifest.settings;
    let frame_bytes = settings.frame_bytes();
    let total_frames = settings.duration_frames;
    let run_name = settings.name.clone();

    let mut scenes = manifest.scenes;
    if scenes.is_empty() {
        scenes.push(SceneDescriptor {
            name: run_name,
            first_frame: 0,
        });
    }
    scenes.sort_by_key(|s| s.first_frame);

    let mut orchestrator = ExportOrchestrator::new(settings, config.encoder)?;

    let mut buffer = vec![0u8; frame_bytes];
    let mut next_scene = 0usize;
    for frame_index in 0..total_frames {
        while next_scene < scenes.len() && scenes[next_scene].first_frame <= frame_index {
            orchestrator.report_scene(&scenes[next_scene]).await?;
            next_scene += 1;
        }

        match reader.read_exact(&mut buffer).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // The producer died mid-stream; discard the partial output.
                tracing::warn!(frame = frame_index, "Frame stream ended early, aborting");
                orchestrator.end(RenderResult::Aborted).await?;
                return Err(anyhow::anyhow!(
                    "frame stream ended after {frame_index} of {total_frames} frames"
                ));
            }
            Err(e) => {
                orchestrator.end(RenderResult::Aborted).await?;
                return Err(anyhow::anyhow!("failed reading frame {frame_index}: {e}"));
            }
        }

        orchestrator.handle_frame(&buffer).await?;

        if frame_index % 30 == 0 || frame_index + 1 == total_frames {
            let stdout = std::io::stdout();
            print_progress(&mut stdout.lock(), frame_index + 1, total_frames).ok();
        }
    }

    orchestrator.end(RenderResult::Success).await?;
    println!("\nExport complete.");
    Ok(())
}

/// Rewrite the progress line in place, flushed so it shows up while the
/// export is still running.
fn print_progress<W: Write>(out: &mut W, current: u64, total: u64) -> std::io::Result<()> {
    write!(out, "\r  Progress: {current}/{total} frames  ")?;
    out.flush()
}
