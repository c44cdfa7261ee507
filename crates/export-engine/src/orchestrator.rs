//! Export orchestration across timeline segments.
//!
//! Drives one [`SegmentSession`] at a time: scene reports open and close
//! sessions, frames flow to whichever session is current, and the final
//! `end` tears the last session down. The previous segment's encoder is
//! always fully closed before the next one starts; only the destination
//! directory is shared across segments, and its creation is idempotent.

use scenecast_common::{EncoderConfig, ScenecastError, ScenecastResult};
use scenecast_export_model::{ExportSettings, RenderResult, SceneDescriptor};

use crate::session::SegmentSession;

/// State machine over the current segment of an export run.
///
/// Idle until the first scene report, then one active session per
/// distinct resolved scene name, then idle again after [`end`].
///
/// [`end`]: ExportOrchestrator::end
pub struct ExportOrchestrator {
    settings: ExportSettings,
    encoder: EncoderConfig,
    current_scene: Option<String>,
    session: Option<SegmentSession>,
}

impl ExportOrchestrator {
    pub fn new(settings: ExportSettings, encoder: EncoderConfig) -> ScenecastResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            encoder,
            current_scene: None,
            session: None,
        })
    }

    /// Name of the currently active segment, if any.
    pub fn current_scene(&self) -> Option<&str> {
        self.current_scene.as_deref()
    }

    /// Resolve the segment a scene descriptor maps to. With splitting
    /// disabled the whole project is one segment named after the run.
    fn resolve_scene_name(&self, scene: &SceneDescriptor) -> String {
        if self.settings.split_scenes {
            scene.name.clone()
        } else {
            self.settings.name.clone()
        }
    }

    /// React to a scene boundary.
    ///
    /// Re-entry into the current segment is a no-op. A new segment first
    /// gracefully ends the active session (awaiting its completion), then
    /// builds segment-scoped settings and starts a fresh session.
    pub async fn report_scene(&mut self, scene: &SceneDescriptor) -> ScenecastResult<()> {
        let name = self.resolve_scene_name(scene);
        if self.current_scene.as_deref() == Some(name.as_str()) {
            return Ok(());
        }

        if let Some(mut session) = self.session.take() {
            tracing::debug!(
                from = %session.scene(),
                to = %name,
                "Segment transition, closing previous encoder"
            );
            self.current_scene = None;
            session.end(RenderResult::Success).await?;
        }

        let segment = self.settings.segment_settings(&name);
        let mut session = SegmentSession::new(&name, &segment, &self.encoder)?;
        session.start().await?;
        tracing::info!(
            scene = %name,
            sounds = segment.sounds.len(),
            output = %session.output_path().display(),
            "Segment opened"
        );

        self.session = Some(session);
        self.current_scene = Some(name);
        Ok(())
    }

    /// Forward one raw frame to the current segment's sink. Calling with
    /// no active segment is a programming error.
    pub async fn handle_frame(&mut self, frame: &[u8]) -> ScenecastResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ScenecastError::session("frame delivered with no active segment"))?;
        session.handle_frame(frame).await
    }

    /// Finish the export with the given result, closing the current
    /// segment. The orchestrator is idle afterwards.
    pub async fn end(&mut self, result: RenderResult) -> ScenecastResult<()> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| ScenecastError::session("end called with no active segment"))?;
        self.current_scene = None;
        session.end(result).await
    }
}
