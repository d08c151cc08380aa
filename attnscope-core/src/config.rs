//! Configuration system for attnscope.
//!
//! Uses `figment` for layered configuration: defaults -> config files -> environment -> CLI args.
//! Configuration is loaded from `~/.config/attnscope/config.toml`, `.attnscope/config.toml`
//! in the workspace directory, and optionally an explicit file passed on the command line.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Where the pretrained encoder and its tokenizer come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Hugging Face hub repository id.
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Hub revision (branch, tag or commit).
    #[serde(default = "default_revision")]
    pub revision: String,
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    /// When set, the hub is never contacted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_dir: Option<PathBuf>,
    /// Override for the hub download cache.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

fn default_model_id() -> String {
    "bert-base-uncased".to_string()
}
fn default_revision() -> String {
    "main".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            revision: default_revision(),
            local_dir: None,
            cache_dir: None,
        }
    }
}

/// Web server bind address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8501
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding a listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Initial form values and heatmap appearance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewConfig {
    /// Text pre-filled in the viewer's text area.
    #[serde(default = "default_text")]
    pub default_text: String,
    /// Initial layer slider position.
    #[serde(default = "default_layer")]
    pub default_layer: usize,
    /// Initial head slider position.
    #[serde(default)]
    pub default_head: usize,
    /// Heatmap width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Heatmap height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
    /// Print each score inside its cell.
    #[serde(default)]
    pub annotate: bool,
}

fn default_text() -> String {
    "The quick brown fox jumps over the lazy dog.".to_string()
}
fn default_layer() -> usize {
    6
}
fn default_width() -> u32 {
    1000
}
fn default_height() -> u32 {
    800
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            default_text: default_text(),
            default_layer: default_layer(),
            default_head: 0,
            width: default_width(),
            height: default_height(),
            annotate: false,
        }
    }
}

/// Path of the user-level config file, if a home directory can be resolved.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "attnscope", "attnscope")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Path of the workspace-level config file.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".attnscope").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `ATTNSCOPE_`, `__` separates sections)
/// 3. Explicit config file (`--config`)
/// 4. Workspace-local config (`.attnscope/config.toml`)
/// 5. User config (`~/.config/attnscope/config.toml`)
/// 6. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    explicit: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        tracing::debug!(path = %user_config.display(), "Merging user config");
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            tracing::debug!(path = %ws_config.display(), "Merging workspace config");
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    // ATTNSCOPE_MODEL__MODEL_ID, ATTNSCOPE_SERVER__PORT, ...
    figment = figment.merge(Env::prefixed("ATTNSCOPE_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| ConfigError::Invalid(Box::new(e)))
}

/// Write the default configuration to `<workspace>/.attnscope/config.toml`.
///
/// Returns `Ok(None)` when a file already exists there.
pub fn init_workspace_config(workspace: &Path) -> Result<Option<PathBuf>, ConfigError> {
    let path = workspace_config_path(workspace);
    if path.exists() {
        return Ok(None);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(&AppConfig::default())?;
    std::fs::write(&path, toml_str)?;
    Ok(Some(path))
}
