//! # attnscope core
//!
//! Shared building blocks for the attention viewer: layered configuration,
//! configuration errors, and the static example guide shown next to the
//! interactive view.

pub mod config;
pub mod error;
pub mod guide;

pub use config::{AppConfig, ModelConfig, ServerConfig, ViewConfig, load_config};
pub use error::ConfigError;
pub use guide::{GuideExample, examples, viewer_link};
