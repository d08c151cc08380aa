//! # attnscope-ml: model loading, attention extraction and rendering
//!
//! The pipeline behind every view: load a pretrained encoder once, tokenize
//! the input, run a forward pass that keeps each layer's attention
//! probabilities, slice one head out and draw it as a heatmap.

pub mod attention;
pub mod error;
pub mod heatmap;
pub mod model;
pub mod palette;
pub mod view;

// Re-exports
pub use attention::{
    AttentionMatrix, AttentionPattern, AttentionTensor, HeadSummary, TokenFocus, rank_by_focus,
    strongest_targets, summarize_heads,
};
pub use error::{MlError, Result};
pub use heatmap::{HeatmapStyle, render_svg};
pub use model::{AttentionModel, BertAttentionModel, BertConfig, BertEncoder, SharedModel, TokenizerHandle};
pub use view::{
    AttentionView, EMPTY_INPUT_WARNING, ViewOutcome, ViewRequest, compute_head_summaries,
    compute_tokens, compute_view,
};
