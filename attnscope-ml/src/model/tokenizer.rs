//! Wrapper around the Hugging Face tokenizers library.

use std::path::Path;
use std::str::FromStr;

use tokenizers::Tokenizer;

use crate::error::{MlError, Result};

/// Tokenizer that always adds the model's boundary markers.
#[derive(Clone)]
pub struct TokenizerHandle {
    inner: Tokenizer,
}

impl TokenizerHandle {
    /// Load from a `tokenizer.json` file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let inner = Tokenizer::from_file(path).map_err(|e| {
            MlError::tokenizer(format!("failed to load {}: {e}", path.display()))
        })?;
        Ok(Self { inner })
    }

    /// Parse the contents of a `tokenizer.json` file.
    pub fn from_json(json: &str) -> Result<Self> {
        let inner = Tokenizer::from_str(json).map_err(|e| MlError::tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Token ids with `[CLS]`/`[SEP]` (or the model's equivalents) added.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, true)
            .map_err(|e| MlError::tokenizer(format!("failed to encode text: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Vocabulary strings for `ids`; unknown ids are an error.
    pub fn tokens(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&id| {
                self.inner
                    .id_to_token(id)
                    .ok_or_else(|| MlError::tokenizer(format!("token id {id} not in vocabulary")))
            })
            .collect()
    }

    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl std::fmt::Debug for TokenizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerHandle")
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}
