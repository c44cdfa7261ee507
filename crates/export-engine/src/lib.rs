//! Scenecast Export Engine
//!
//! Orchestrates conversion of a rendered frame sequence plus independent
//! audio tracks into encoded audio/video files via an external ffmpeg
//! process.
//!
//! # Pipeline Architecture
//!
//! ```text
//! frames (raw RGBA) ──────────────┐
//!                                 ├── SegmentSession ── ffmpeg stdin
//! sounds (trim/gain/rate/offset) ─┤         │
//!         │                       │         ├── -i per sound (-ss seek)
//!         ▼                       │         │
//!   Filter-Graph Builder ─────────┘         ├── -filter_complex … [mix]
//!   (atrim, aresample, volume,              │
//!    asetrate, adelay, amix)                ▼
//!                                   {scene}.mp4 / {scene}.mkv
//!
//! scene reports ──► ExportOrchestrator ──► one session per segment
//! ```
//!
//! Frame delivery is awaited against the encoder's stdin pipe, so the
//! external process backpressures the frame producer. Segment
//! transitions fully close the previous encoder before the next starts.

pub mod filter;
pub mod orchestrator;
pub mod session;

pub use filter::{build_audio_graph, AudioGraph, FilterChain, FilterOp, FilterParams};
pub use orchestrator::ExportOrchestrator;
pub use session::{is_encoder_available, SegmentSession};
