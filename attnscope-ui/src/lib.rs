//! # attnscope-ui: browser front end
//!
//! An axum server with two HTML pages (the interactive viewer and the
//! example guide) and a small JSON/SVG API over the same view pipeline.

pub mod error;
pub mod pages;
pub mod server;

pub use error::UiError;
pub use pages::Pages;
pub use server::{AppState, router, run};
