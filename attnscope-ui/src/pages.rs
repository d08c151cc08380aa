//! HTML pages rendered from handlebars templates compiled into the binary.

use attnscope_core::{GuideExample, viewer_link};
use attnscope_ml::AttentionView;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;

use crate::error::UiError;

const HEADER: &str = include_str!("../templates/header.hbs");
const FOOTER: &str = include_str!("../templates/footer.hbs");
const VIEWER: &str = include_str!("../templates/viewer.hbs");
const GUIDE: &str = include_str!("../templates/guide.hbs");

/// Form state and result of the viewer page.
#[derive(Debug, Default)]
pub struct ViewerPage<'a> {
    pub model: &'a str,
    pub text: &'a str,
    pub layer: usize,
    pub head: usize,
    pub max_layer: usize,
    pub max_head: usize,
    pub warning: Option<&'a str>,
    pub error: Option<String>,
    pub view: Option<&'a AttentionView>,
    pub svg: Option<String>,
}

#[derive(Serialize)]
struct StrongestRow<'a> {
    query: &'a str,
    key: &'a str,
    score: String,
}

#[derive(Serialize)]
struct SentenceLink {
    sentence: &'static str,
    link: String,
}

/// The registered template set.
pub struct Pages {
    registry: Handlebars<'static>,
}

impl Pages {
    pub fn new() -> Result<Self, UiError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(false);
        registry.register_partial("header", HEADER)?;
        registry.register_partial("footer", FOOTER)?;
        registry.register_template_string("viewer", VIEWER)?;
        registry.register_template_string("guide", GUIDE)?;
        Ok(Self { registry })
    }

    pub fn viewer(&self, page: &ViewerPage<'_>) -> Result<String, UiError> {
        let strongest: Vec<StrongestRow<'_>> = page
            .view
            .map(|view| {
                view.strongest
                    .iter()
                    .map(|focus| StrongestRow {
                        query: &focus.query,
                        key: &focus.key,
                        score: format!("{:.3}", focus.score),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let context = json!({
            "page_title": "Interactive view",
            "viewer_active": true,
            "model": page.model,
            "text": page.text,
            "layer": page.layer,
            "head": page.head,
            "max_layer": page.max_layer,
            "max_head": page.max_head,
            "warning": page.warning,
            "error": page.error,
            "view": page.view,
            "token_count": page.view.map(|v| v.tokens.len()),
            "svg": page.svg,
            "strongest": strongest,
        });
        Ok(self.registry.render("viewer", &context)?)
    }

    pub fn guide(&self, model: &str, examples: &[GuideExample]) -> Result<String, UiError> {
        let examples: Vec<_> = examples
            .iter()
            .enumerate()
            .map(|(i, example)| {
                let sentences: Vec<SentenceLink> = example
                    .sentences
                    .iter()
                    .map(|&sentence| SentenceLink {
                        sentence,
                        link: viewer_link(sentence),
                    })
                    .collect();
                json!({
                    "number": i + 1,
                    "title": example.title,
                    "summary": example.summary,
                    "expectation": example.expectation,
                    "focus": example.focus_hint(),
                    "sentences": sentences,
                    "multiple": example.sentences.len() > 1,
                    "link": example.viewer_link(),
                })
            })
            .collect();

        let context = json!({
            "page_title": "Example guide",
            "guide_active": true,
            "model": model,
            "examples": examples,
        });
        Ok(self.registry.render("guide", &context)?)
    }
}

impl std::fmt::Debug for Pages {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pages")
            .field("templates", &self.registry.get_templates().len())
            .finish()
    }
}
