//! Pretrained encoder access.
//!
//! [`AttentionModel`] is the seam between the view and the model: tokenize,
//! map ids back to display strings, and run a forward pass that returns the
//! attention probabilities of every layer and head. [`BertAttentionModel`]
//! implements it on top of a hub checkpoint; [`SharedModel`] memoizes the
//! loaded instance for the lifetime of the process.

mod bert;
mod loader;
mod shared;
mod tokenizer;

pub use bert::{BertConfig, BertEncoder, HiddenAct};
pub use loader::{BertAttentionModel, ModelFiles};
pub use shared::SharedModel;
pub use tokenizer::TokenizerHandle;

use crate::attention::AttentionTensor;
use crate::error::Result;

/// A tokenizer plus encoder that exposes its attention probabilities.
pub trait AttentionModel: Send + Sync {
    /// Model identifier shown in the UI.
    fn name(&self) -> &str;

    fn num_layers(&self) -> usize;

    fn num_heads(&self) -> usize;

    /// Token ids for `text`, including boundary markers.
    fn tokenize(&self, text: &str) -> Result<Vec<u32>>;

    /// Display strings for `ids`, one per id.
    fn ids_to_tokens(&self, ids: &[u32]) -> Result<Vec<String>>;

    /// Attention probabilities shaped `(layers, heads, n, n)` for `n = ids.len()`.
    fn forward(&self, ids: &[u32]) -> Result<AttentionTensor>;
}
