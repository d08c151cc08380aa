//! Error types for the attnscope-ml crate.

use thiserror::Error;

/// Top-level error type for model loading, inference and rendering.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Download error: {0}")]
    Download(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Input has {tokens} tokens but the model accepts at most {limit}")]
    SequenceTooLong { tokens: usize, limit: usize },

    #[error("Selection out of range: layer {layer} (max {max_layer}), head {head} (max {max_head})")]
    SelectionOutOfRange {
        layer: usize,
        head: usize,
        max_layer: usize,
        max_head: usize,
    },

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl MlError {
    pub fn download(msg: impl Into<String>) -> Self {
        Self::Download(msg.into())
    }

    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Whether the error was caused by the request rather than the model.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::SelectionOutOfRange { .. } | Self::EmptyInput | Self::SequenceTooLong { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MlError>;
