//! Scenecast Export Model
//!
//! Data model for export runs: run-wide settings, per-sound descriptors
//! with trim/gain/rate/offset metadata, scene boundaries, and the
//! segment re-baselining rules the orchestrator applies at each scene
//! transition.

pub mod settings;

pub use settings::*;
