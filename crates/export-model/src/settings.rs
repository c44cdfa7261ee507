//! Export run settings and sound descriptors.
//!
//! An export run is described once, up front, by [`ExportSettings`]. The
//! orchestrator derives per-segment settings from it as scene boundaries
//! are reported; sounds carry enough metadata (owning scene, first frame
//! of that scene) to re-baseline their timing offsets against any segment
//! start.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use scenecast_common::{ScenecastError, ScenecastResult};

/// Immutable settings for one export run (`manifest.json`).
///
/// Frames delivered to the engine are raw RGBA buffers of exactly
/// `width * height * 4` bytes, in timeline order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSettings {
    /// Output frame width in pixels (post resolution-scale).
    pub width: u32,

    /// Output frame height in pixels (post resolution-scale).
    pub height: u32,

    /// Output frame rate.
    pub fps: u32,

    /// Total duration in frames. Seconds = `duration_frames / fps`.
    pub duration_frames: u64,

    /// Independent audio tracks to mix into the output.
    #[serde(default)]
    pub sounds: Vec<Sound>,

    /// Optional single top-level audio track.
    #[serde(default)]
    pub audio: Option<PathBuf>,

    /// Timing offset of the top-level audio track, in seconds.
    #[serde(default)]
    pub audio_offset: f64,

    /// Whether to include any audio at all.
    #[serde(default = "default_true")]
    pub include_audio: bool,

    /// Relocate mp4 metadata for progressive playback. Ignored on the
    /// high-quality path.
    #[serde(default)]
    pub fast_start: bool,

    /// Export each scene as its own file.
    #[serde(default)]
    pub split_scenes: bool,

    /// Near-lossless mkv output instead of compatible mp4.
    #[serde(default)]
    pub high_quality: bool,

    /// Target audio sample rate (Hz).
    pub sample_rate: u32,

    /// Destination directory, created recursively if absent.
    pub dest_dir: PathBuf,

    /// Base output name; also the single segment name when scene
    /// splitting is disabled.
    pub name: String,
}

/// One audio source on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sound {
    /// Audio source file.
    pub path: PathBuf,

    /// Where this sound's timeline zero point falls relative to the
    /// segment start, in seconds. Negative means the sound started
    /// playing before the segment begins and is pre-trimmed.
    #[serde(default)]
    pub offset: f64,

    /// Source-relative trim-in point, in seconds.
    #[serde(default)]
    pub start: Option<f64>,

    /// Source-relative trim-out point, in seconds.
    #[serde(default)]
    pub end: Option<f64>,

    /// Gain in dB.
    #[serde(default)]
    pub gain: Option<f64>,

    /// Playback-rate multiplier. Must be > 0.
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,

    /// Name of the scene that owns this sound.
    #[serde(default)]
    pub scene: Option<String>,

    /// Frame index where the owning scene begins, used to re-baseline
    /// `offset` from project-relative to segment-relative.
    #[serde(default)]
    pub scene_first_frame: Option<u64>,
}

impl Sound {
    /// A sound with all defaults for the given source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0.0,
            start: None,
            end: None,
            gain: None,
            playback_rate: 1.0,
            scene: None,
            scene_first_frame: None,
        }
    }

    /// Same sound shifted by `offset` seconds.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }
}

/// A scene boundary reported by the frame producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneDescriptor {
    /// Scene name; becomes the output file stem when splitting.
    pub name: String,

    /// Frame index where this scene begins on the project timeline.
    #[serde(default)]
    pub first_frame: u64,
}

/// Terminal outcome of a render run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderResult {
    Success,
    Error,
    Aborted,
}

impl ExportSettings {
    /// Total export duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration_frames as f64 / self.fps as f64
    }

    /// Byte length of one raw RGBA frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Fail-fast validation of sizes, rates, and per-sound invariants.
    pub fn validate(&self) -> ScenecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ScenecastError::config("frame size must be non-zero"));
        }
        if self.fps == 0 {
            return Err(ScenecastError::config("fps must be non-zero"));
        }
        if self.duration_frames == 0 {
            return Err(ScenecastError::config("duration must be non-zero"));
        }
        if self.sample_rate == 0 {
            return Err(ScenecastError::config("sample rate must be non-zero"));
        }
        if !self.high_quality && (self.width % 2 != 0 || self.height % 2 != 0) {
            // yuv420p mp4 output requires even dimensions.
            return Err(ScenecastError::config(
                "frame width and height must be even for mp4 output",
            ));
        }
        for sound in &self.sounds {
            if sound.playback_rate <= 0.0 {
                return Err(ScenecastError::config(format!(
                    "sound '{}' has non-positive playback rate {}",
                    sound.path.display(),
                    sound.playback_rate
                )));
            }
        }
        Ok(())
    }

    /// Settings scoped to one segment.
    ///
    /// Folds the top-level audio track into the sound list, drops sounds
    /// owned by other scenes when splitting is enabled, and converts each
    /// remaining sound's project-relative offset into a segment-relative
    /// one by subtracting `scene_first_frame / fps`.
    pub fn segment_settings(&self, scene: &str) -> ExportSettings {
        let mut segment = self.clone();

        let mut sounds: Vec<Sound> = Vec::new();
        if self.include_audio {
            if let Some(audio) = &self.audio {
                sounds.push(Sound::new(audio.clone()).with_offset(self.audio_offset));
            }
            for sound in &self.sounds {
                if self.split_scenes {
                    match &sound.scene {
                        Some(owner) if owner == scene => {}
                        _ => continue,
                    }
                }
                let mut sound = sound.clone();
                if let Some(first_frame) = sound.scene_first_frame {
                    sound.offset -= first_frame as f64 / self.fps as f64;
                }
                sounds.push(sound);
            }
        }

        segment.sounds = sounds;
        segment.name = scene.to_string();
        segment
    }
}

fn default_true() -> bool {
    true
}

fn default_playback_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ExportSettings {
        ExportSettings {
            width: 1920,
            height: 1080,
            fps: 30,
            duration_frames: 300,
            sounds: vec![],
            audio: None,
            audio_offset: 0.0,
            include_audio: true,
            fast_start: true,
            split_scenes: false,
            high_quality: false,
            sample_rate: 48000,
            dest_dir: PathBuf::from("/tmp/exports"),
            name: "project".to_string(),
        }
    }

    #[test]
    fn validate_rejects_bad_dimensions_and_rates() {
        let mut s = settings();
        s.width = 0;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.width = 1921; // odd, mp4 path
        assert!(s.validate().is_err());

        let mut s = settings();
        s.width = 1921;
        s.high_quality = true; // mkv path tolerates odd sizes
        assert!(s.validate().is_ok());

        let mut s = settings();
        s.fps = 0;
        assert!(s.validate().is_err());

        let mut s = settings();
        s.sounds.push(Sound {
            playback_rate: 0.0,
            ..Sound::new("a.wav")
        });
        assert!(s.validate().is_err());
    }

    #[test]
    fn duration_is_frames_over_fps() {
        let s = settings();
        assert!((s.duration_secs() - 10.0).abs() < 1e-9);
        assert_eq!(s.frame_bytes(), 1920 * 1080 * 4);
    }

    #[test]
    fn segment_settings_rebaselines_offsets() {
        let mut s = settings();
        s.sounds.push(Sound {
            offset: 5.0,
            scene: Some("intro".to_string()),
            scene_first_frame: Some(90),
            ..Sound::new("a.wav")
        });

        let segment = s.segment_settings("intro");
        assert_eq!(segment.sounds.len(), 1);
        // 90 frames at 30fps = 3 seconds earlier baseline.
        assert!((segment.sounds[0].offset - 2.0).abs() < 1e-9);
        assert_eq!(segment.name, "intro");
    }

    #[test]
    fn segment_settings_drops_foreign_sounds_only_when_splitting() {
        let mut s = settings();
        s.sounds.push(Sound {
            scene: Some("intro".to_string()),
            ..Sound::new("a.wav")
        });
        s.sounds.push(Sound {
            scene: Some("outro".to_string()),
            ..Sound::new("b.wav")
        });

        let unsplit = s.segment_settings("project");
        assert_eq!(unsplit.sounds.len(), 2);

        s.split_scenes = true;
        let split = s.segment_settings("intro");
        assert_eq!(split.sounds.len(), 1);
        assert_eq!(split.sounds[0].path, PathBuf::from("a.wav"));
    }

    #[test]
    fn segment_settings_folds_top_level_audio() {
        let mut s = settings();
        s.audio = Some(PathBuf::from("track.flac"));
        s.audio_offset = 1.25;

        let segment = s.segment_settings("project");
        assert_eq!(segment.sounds.len(), 1);
        assert_eq!(segment.sounds[0].path, PathBuf::from("track.flac"));
        assert!((segment.sounds[0].offset - 1.25).abs() < 1e-9);
    }

    #[test]
    fn segment_settings_honors_include_audio() {
        let mut s = settings();
        s.audio = Some(PathBuf::from("track.flac"));
        s.sounds.push(Sound::new("a.wav"));
        s.include_audio = false;

        let segment = s.segment_settings("project");
        assert!(segment.sounds.is_empty());
    }

    #[test]
    fn rebaseline_subtracts_first_frame_over_fps() {
        use proptest::prelude::*;

        proptest!(|(offset in -60.0f64..60.0, first_frame in 0u64..100_000, fps in 1u32..240)| {
            let mut s = settings();
            s.fps = fps;
            s.sounds.push(Sound {
                offset,
                scene_first_frame: Some(first_frame),
                ..Sound::new("a.wav")
            });

            let segment = s.segment_settings("project");
            let expected = offset - first_frame as f64 / fps as f64;
            prop_assert!((segment.sounds[0].offset - expected).abs() < 1e-9);
        });
    }

    #[test]
    fn manifest_roundtrip_defaults() {
        let json = r#"{
            "width": 1280,
            "height": 720,
            "fps": 60,
            "duration_frames": 600,
            "sample_rate": 48000,
            "dest_dir": "/tmp/out",
            "name": "demo",
            "sounds": [{ "path": "voice.wav", "offset": -0.5 }]
        }"#;
        let s: ExportSettings = serde_json::from_str(json).unwrap();
        assert!(s.include_audio);
        assert!(!s.split_scenes);
        assert_eq!(s.sounds[0].playback_rate, 1.0);
        assert_eq!(s.sounds[0].offset, -0.5);
        assert!(s.sounds[0].end.is_none());
    }
}
