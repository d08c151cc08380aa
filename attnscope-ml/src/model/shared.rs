//! Process-wide, lazily loaded model.

use std::sync::Arc;
use std::time::Instant;

use attnscope_core::ModelConfig;
use tokio::sync::OnceCell;

use super::{AttentionModel, BertAttentionModel};
use crate::error::{MlError, Result};

type Loader = dyn Fn() -> Result<Arc<dyn AttentionModel>> + Send + Sync;

/// Loads the model on first use and hands out the same instance afterwards.
///
/// Concurrent callers during the first load wait for the single in-flight
/// load. A failed load leaves the cell empty, so a later call retries.
pub struct SharedModel {
    cell: OnceCell<Arc<dyn AttentionModel>>,
    loader: Arc<Loader>,
}

impl SharedModel {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn AttentionModel>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            loader: Arc::new(loader),
        }
    }

    /// Hub or local BERT checkpoint described by `config`.
    pub fn from_config(config: ModelConfig) -> Self {
        Self::new(move || {
            let model = BertAttentionModel::load(&config)?;
            Ok(Arc::new(model) as Arc<dyn AttentionModel>)
        })
    }

    /// Wrap an already constructed model.
    pub fn preloaded(model: Arc<dyn AttentionModel>) -> Self {
        let fallback = Arc::clone(&model);
        Self {
            cell: OnceCell::new_with(Some(model)),
            loader: Arc::new(move || Ok(Arc::clone(&fallback))),
        }
    }

    /// The loaded model, loading it on a blocking thread the first time.
    pub async fn get(&self) -> Result<Arc<dyn AttentionModel>> {
        let model = self
            .cell
            .get_or_try_init(|| async {
                let loader = Arc::clone(&self.loader);
                tracing::info!("Loading pretrained model...");
                let started = Instant::now();
                let model = tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| MlError::model(format!("model loading task failed: {e}")))??;
                tracing::info!(
                    model = model.name(),
                    layers = model.num_layers(),
                    heads = model.num_heads(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model ready"
                );
                Ok::<_, MlError>(model)
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// The model if it has already been loaded.
    pub fn loaded(&self) -> Option<Arc<dyn AttentionModel>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}

impl std::fmt::Debug for SharedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedModel")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
