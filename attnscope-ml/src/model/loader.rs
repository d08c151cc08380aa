//! Fetching checkpoint files and assembling a [`BertAttentionModel`].

use std::path::{Path, PathBuf};

use attnscope_core::ModelConfig;
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};

use super::bert::{BertConfig, BertEncoder};
use super::tokenizer::TokenizerHandle;
use super::AttentionModel;
use crate::attention::AttentionTensor;
use crate::error::{MlError, Result};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// The three files a checkpoint needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    /// Files inside a local checkpoint directory.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let files = Self {
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.exists() {
                return Err(MlError::model(format!(
                    "{} not found in {}",
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    dir.display()
                )));
            }
        }
        Ok(files)
    }

    /// Resolve files from `local_dir` when set, otherwise download them from the hub.
    pub fn fetch(config: &ModelConfig) -> Result<Self> {
        if let Some(dir) = &config.local_dir {
            tracing::info!(dir = %dir.display(), "Using local checkpoint");
            return Self::from_dir(dir);
        }

        let mut builder = ApiBuilder::new().with_progress(false);
        if let Some(cache) = &config.cache_dir {
            builder = builder.with_cache_dir(cache.clone());
        }
        let api = builder
            .build()
            .map_err(|e| MlError::download(format!("failed to initialise hub client: {e}")))?;
        let repo = api.repo(Repo::with_revision(
            config.model_id.clone(),
            RepoType::Model,
            config.revision.clone(),
        ));

        let get = |file: &str| {
            tracing::debug!(model = %config.model_id, file, "Fetching from hub");
            repo.get(file).map_err(|e| {
                MlError::download(format!("{}: failed to fetch {file}: {e}", config.model_id))
            })
        };

        Ok(Self {
            config: get(CONFIG_FILE)?,
            tokenizer: get(TOKENIZER_FILE)?,
            weights: get(WEIGHTS_FILE)?,
        })
    }
}

/// Hub BERT checkpoint behind the [`AttentionModel`] interface.
pub struct BertAttentionModel {
    name: String,
    tokenizer: TokenizerHandle,
    encoder: BertEncoder,
}

impl BertAttentionModel {
    /// Fetch and load the checkpoint described by `config`.
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let files = ModelFiles::fetch(config)?;
        Self::from_files(&config.model_id, &files)
    }

    pub fn from_files(name: &str, files: &ModelFiles) -> Result<Self> {
        let raw = std::fs::read_to_string(&files.config)?;
        let bert_config: BertConfig = serde_json::from_str(&raw)?;
        tracing::info!(
            model = name,
            layers = bert_config.num_hidden_layers,
            heads = bert_config.num_attention_heads,
            hidden = bert_config.hidden_size,
            "Loading encoder weights"
        );

        let tokenizer = TokenizerHandle::from_file(&files.tokenizer)?;
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                std::slice::from_ref(&files.weights),
                DType::F32,
                &Device::Cpu,
            )?
        };
        let encoder = BertEncoder::load(vb, &bert_config)?;
        Ok(Self::from_parts(name, tokenizer, encoder))
    }

    pub fn from_parts(name: &str, tokenizer: TokenizerHandle, encoder: BertEncoder) -> Self {
        Self {
            name: name.to_string(),
            tokenizer,
            encoder,
        }
    }
}

impl AttentionModel for BertAttentionModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_layers(&self) -> usize {
        self.encoder.config().num_hidden_layers
    }

    fn num_heads(&self) -> usize {
        self.encoder.config().num_attention_heads
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        self.tokenizer.encode(text)
    }

    fn ids_to_tokens(&self, ids: &[u32]) -> Result<Vec<String>> {
        self.tokenizer.tokens(ids)
    }

    fn forward(&self, ids: &[u32]) -> Result<AttentionTensor> {
        self.encoder.forward(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dir_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{}").unwrap();
        let err = ModelFiles::from_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }

    #[test]
    fn test_from_dir_with_all_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let files = ModelFiles::from_dir(dir.path()).unwrap();
        assert_eq!(files.weights, dir.path().join(WEIGHTS_FILE));
    }

    #[test]
    fn test_fetch_prefers_local_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            local_dir: Some(dir.path().to_path_buf()),
            ..ModelConfig::default()
        };
        // empty directory: fails locally without touching the network
        let err = ModelFiles::fetch(&config).unwrap_err();
        assert!(matches!(err, MlError::Model(_)));
    }
}
