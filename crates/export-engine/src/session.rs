//! One encoding session per timeline segment.
//!
//! A [`SegmentSession`] owns exactly one ffmpeg child process, its stdin
//! frame sink, and its completion. Raw RGBA frames arrive over stdin;
//! audio sources are separate file inputs wired through the filter graph
//! built at construction. Frame delivery is awaited against the pipe, so
//! the encoder's consumption rate backpressures the frame producer.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use scenecast_common::{EncoderConfig, ScenecastError, ScenecastResult};
use scenecast_export_model::{ExportSettings, RenderResult};

use crate::filter::{build_audio_graph, AudioGraph};

/// Check that the configured encoder binary is runnable.
pub fn is_encoder_available(encoder: &EncoderConfig) -> bool {
    std::process::Command::new(&encoder.binary)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// An encoding session bound to one segment of the export timeline.
pub struct SegmentSession {
    scene: String,
    binary: PathBuf,
    args: Vec<String>,
    output_path: PathBuf,
    dest_dir: PathBuf,
    frame_bytes: usize,
    frames_delivered: u64,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
}

impl SegmentSession {
    /// Configure a session for one segment. Validates settings, builds
    /// the audio graph and the full encoder argument list. No process is
    /// started yet.
    ///
    /// `settings` must already be segment-scoped: sounds filtered to this
    /// scene and re-baselined against its first frame.
    pub fn new(
        scene: &str,
        settings: &ExportSettings,
        encoder: &EncoderConfig,
    ) -> ScenecastResult<Self> {
        settings.validate()?;

        let graph = build_audio_graph(&settings.sounds, settings.sample_rate)?;
        let extension = if settings.high_quality { "mkv" } else { "mp4" };
        let output_path = settings.dest_dir.join(format!("{scene}.{extension}"));
        let args = build_encoder_args(settings, &graph, &output_path);

        Ok(Self {
            scene: scene.to_string(),
            binary: encoder.binary.clone(),
            args,
            output_path,
            dest_dir: settings.dest_dir.clone(),
            frame_bytes: settings.frame_bytes(),
            frames_delivered: 0,
            child: None,
            stdin: None,
            stderr_task: None,
        })
    }

    /// Segment name this session encodes.
    pub fn scene(&self) -> &str {
        &self.scene
    }

    /// Destination file of this session.
    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    /// Encoder arguments this session will launch with.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Frames accepted by the sink so far.
    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    /// OS process id of the running encoder, if started and not reaped.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    /// Launch the encoder process. Ensures the destination directory
    /// exists and attaches the diagnostic-output listener. Non-blocking.
    pub async fn start(&mut self) -> ScenecastResult<()> {
        if self.child.is_some() {
            return Err(ScenecastError::session(format!(
                "segment '{}' already started",
                self.scene
            )));
        }

        tokio::fs::create_dir_all(&self.dest_dir).await?;

        tracing::debug!(scene = %self.scene, args = ?self.args, "Launching encoder");
        // The session exclusively owns this process; if the session is
        // dropped on an error path without end(), the encoder must not
        // outlive it.
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ScenecastError::session(format!(
                    "failed to start encoder '{}': {e}",
                    self.binary.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ScenecastError::session("failed to open encoder stdin"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ScenecastError::session("failed to capture encoder stderr"))?;

        // Drain stderr concurrently so the encoder never blocks on a full
        // pipe; keep the text for error reporting on a failed exit.
        let scene = self.scene.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = String::new();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(scene = %scene, "encoder: {line}");
                collected.push_str(&line);
                collected.push('\n');
            }
            collected
        });

        tracing::info!(
            scene = %self.scene,
            pid = child.id(),
            output = %self.output_path.display(),
            "Encoder process started"
        );

        self.child = Some(child);
        self.stdin = Some(stdin);
        self.stderr_task = Some(stderr_task);
        Ok(())
    }

    /// Push one raw frame into the sink. Resolves only once the encoder
    /// has accepted the buffer, so callers must await before supplying
    /// the next frame.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> ScenecastResult<()> {
        if frame.len() != self.frame_bytes {
            return Err(ScenecastError::session(format!(
                "frame size mismatch: got {} bytes, expected {}",
                frame.len(),
                self.frame_bytes
            )));
        }

        let stdin = self.stdin.as_mut().ok_or_else(|| {
            ScenecastError::session(format!("segment '{}' has no active sink", self.scene))
        })?;

        stdin.write_all(frame).await.map_err(|e| {
            ScenecastError::encoder(&self.scene, format!("failed to write frame: {e}"))
        })?;

        self.frames_delivered += 1;
        Ok(())
    }

    /// Signal end-of-stream and wait for the session to complete.
    ///
    /// On [`RenderResult::Aborted`], the encoder is killed with a
    /// non-catchable signal and every error from the remaining await is
    /// discarded; the kill is the expected outcome, and the suppression
    /// is unconditional by design. Any other result closes the sink,
    /// waits for the encoder, and surfaces a failed exit to the caller.
    pub async fn end(&mut self, result: RenderResult) -> ScenecastResult<()> {
        // End-of-sequence sentinel: closing stdin.
        drop(self.stdin.take());

        let mut child = self.child.take().ok_or_else(|| {
            ScenecastError::session(format!("segment '{}' was never started", self.scene))
        })?;

        if result == RenderResult::Aborted {
            let _ = child.start_kill();
            let _ = child.wait().await;
            if let Some(task) = self.stderr_task.take() {
                task.abort();
            }
            tracing::info!(
                scene = %self.scene,
                frames = self.frames_delivered,
                "Segment aborted, encoder terminated"
            );
            return Ok(());
        }

        let status = child.wait().await?;
        let stderr_output = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(ScenecastError::encoder(
                &self.scene,
                format!("encoder exited with status {status}: {}", stderr_output.trim()),
            ));
        }

        tracing::info!(
            scene = %self.scene,
            frames = self.frames_delivered,
            output = %self.output_path.display(),
            "Segment complete"
        );
        Ok(())
    }
}

/// Assemble the full encoder argument list for one segment.
fn build_encoder_args(
    settings: &ExportSettings,
    graph: &AudioGraph,
    output_path: &std::path::Path,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    // Raw video over stdin.
    args.push("-f".to_string());
    args.push("rawvideo".to_string());
    args.push("-pix_fmt".to_string());
    args.push("rgba".to_string());
    args.push("-s".to_string());
    args.push(format!("{}x{}", settings.width, settings.height));
    args.push("-r".to_string());
    args.push(settings.fps.to_string());
    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    // One input per sound, pre-seeked when the graph asks for it.
    for input in &graph.inputs {
        if let Some(seek) = input.seek {
            args.push("-ss".to_string());
            args.push(format!("{seek:.6}"));
        }
        args.push("-i".to_string());
        args.push(input.path.display().to_string());
    }

    if let Some(filter) = graph.filter_complex() {
        args.push("-filter_complex".to_string());
        args.push(filter);
        args.push("-map".to_string());
        args.push("0:v".to_string());
        args.push("-map".to_string());
        args.push(format!("[{}]", graph.output_label().unwrap_or_default()));
    }

    args.push("-t".to_string());
    args.push(format!("{:.6}", settings.duration_secs()));
    args.push("-c:v".to_string());
    args.push("libx264".to_string());
    args.push("-r".to_string());
    args.push(settings.fps.to_string());
    args.push("-s".to_string());
    args.push(format!("{}x{}", settings.width, settings.height));

    if settings.high_quality {
        // Full-resolution chroma; 4:2:0 subsampling would defeat the
        // near-lossless setting.
        args.push("-pix_fmt".to_string());
        args.push("yuv444p".to_string());
        args.push("-preset".to_string());
        args.push("slower".to_string());
        args.push("-crf".to_string());
        args.push("1".to_string());
        if !graph.is_empty() {
            args.push("-c:a".to_string());
            args.push("flac".to_string());
        }
    } else {
        args.push("-pix_fmt".to_string());
        args.push("yuv420p".to_string());
        if !graph.is_empty() {
            args.push("-c:a".to_string());
            args.push("aac".to_string());
            args.push("-b:a".to_string());
            args.push("192k".to_string());
        }
        if settings.fast_start {
            args.push("-movflags".to_string());
            args.push("+faststart".to_string());
        }
    }

    args.push(output_path.display().to_string());
    args
}
