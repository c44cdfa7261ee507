//! Error types shared across Scenecast crates.

use std::path::PathBuf;

/// Top-level error type for Scenecast operations.
#[derive(Debug, thiserror::Error)]
pub enum ScenecastError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Filter graph error: {message}")]
    FilterGraph { message: String },

    #[error("Encoder error in segment '{scene}': {message}")]
    Encoder { scene: String, message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ScenecastError.
pub type ScenecastResult<T> = Result<T, ScenecastError>;

impl ScenecastError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn filter_graph(msg: impl Into<String>) -> Self {
        Self::FilterGraph {
            message: msg.into(),
        }
    }

    pub fn encoder(scene: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Encoder {
            scene: scene.into(),
            message: msg.into(),
        }
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}
