//! The interactive view pipeline: text and a (layer, head) selection in,
//! token labels plus one attention matrix out.

use serde::{Deserialize, Serialize};

use crate::attention::{
    AttentionMatrix, HeadSummary, TokenFocus, check_selection, rank_by_focus, strongest_targets,
    summarize_heads,
};
use crate::error::{MlError, Result};
use crate::heatmap::{HeatmapStyle, render_svg};
use crate::model::AttentionModel;

pub const EMPTY_INPUT_WARNING: &str = "Please enter a sentence to analyze.";

/// One user request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewRequest {
    pub text: String,
    pub layer: usize,
    pub head: usize,
}

impl ViewRequest {
    pub fn new(text: impl Into<String>, layer: usize, head: usize) -> Self {
        Self {
            text: text.into(),
            layer,
            head,
        }
    }

    /// Nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Everything needed to show one head.
#[derive(Debug, Clone, Serialize)]
pub struct AttentionView {
    pub model: String,
    pub layer: usize,
    pub head: usize,
    pub tokens: Vec<String>,
    pub matrix: AttentionMatrix,
    pub strongest: Vec<TokenFocus>,
}

impl AttentionView {
    pub fn title(&self) -> String {
        format!("Attention heatmap (layer {}, head {})", self.layer, self.head)
    }

    /// Render the matrix with the default title.
    pub fn heatmap_svg(&self, style: &HeatmapStyle) -> Result<String> {
        let style = match &style.title {
            Some(_) => style.clone(),
            None => style.clone().with_title(self.title()),
        };
        render_svg(&self.matrix, &self.tokens, &style)
    }
}

/// Result of a trigger: a warning on blank input, otherwise the view.
#[derive(Debug, Clone)]
pub enum ViewOutcome {
    Warning(String),
    Ready(AttentionView),
}

impl ViewOutcome {
    pub fn into_view(self) -> Result<AttentionView> {
        match self {
            Self::Ready(view) => Ok(view),
            Self::Warning(_) => Err(MlError::EmptyInput),
        }
    }
}

fn encode(model: &dyn AttentionModel, text: &str) -> Result<(Vec<u32>, Vec<String>)> {
    let ids = model.tokenize(text)?;
    let tokens = model.ids_to_tokens(&ids)?;
    if tokens.len() != ids.len() {
        return Err(MlError::tokenizer(format!(
            "{} ids mapped to {} tokens",
            ids.len(),
            tokens.len()
        )));
    }
    Ok((ids, tokens))
}

/// Tokenize, run one forward pass and slice out the selected head.
///
/// Blank text yields [`ViewOutcome::Warning`] without touching the model.
pub fn compute_view(model: &dyn AttentionModel, request: &ViewRequest) -> Result<ViewOutcome> {
    if request.is_blank() {
        tracing::debug!("Blank input, skipping inference");
        return Ok(ViewOutcome::Warning(EMPTY_INPUT_WARNING.to_string()));
    }
    check_selection(
        request.layer,
        request.head,
        model.num_layers(),
        model.num_heads(),
    )?;

    let (ids, tokens) = encode(model, &request.text)?;
    let attention = model.forward(&ids)?;
    let matrix = attention.matrix(request.layer, request.head)?;
    if matrix.size() != tokens.len() {
        return Err(MlError::model(format!(
            "{} tokens but a {n}x{n} attention matrix",
            tokens.len(),
            n = matrix.size()
        )));
    }
    tracing::debug!(
        tokens = tokens.len(),
        layer = request.layer,
        head = request.head,
        "Computed attention view"
    );

    let strongest = strongest_targets(&matrix, &tokens);
    Ok(ViewOutcome::Ready(AttentionView {
        model: model.name().to_string(),
        layer: request.layer,
        head: request.head,
        tokens,
        matrix,
        strongest,
    }))
}

/// Token labels for `text`.
pub fn compute_tokens(model: &dyn AttentionModel, text: &str) -> Result<Vec<String>> {
    if text.trim().is_empty() {
        return Err(MlError::EmptyInput);
    }
    encode(model, text).map(|(_, tokens)| tokens)
}

/// Head summaries for `text`, most focused first.
pub fn compute_head_summaries(model: &dyn AttentionModel, text: &str) -> Result<Vec<HeadSummary>> {
    if text.trim().is_empty() {
        return Err(MlError::EmptyInput);
    }
    let (ids, _) = encode(model, text)?;
    let attention = model.forward(&ids)?;
    Ok(rank_by_focus(summarize_heads(&attention)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        assert!(ViewRequest::new("", 0, 0).is_blank());
        assert!(ViewRequest::new(" \n\t", 0, 0).is_blank());
        assert!(!ViewRequest::new(" a ", 0, 0).is_blank());
    }

    #[test]
    fn test_warning_converts_to_empty_input() {
        let outcome = ViewOutcome::Warning(EMPTY_INPUT_WARNING.to_string());
        assert!(matches!(outcome.into_view(), Err(MlError::EmptyInput)));
    }

    #[test]
    fn test_view_serializes_matrix_as_rows() {
        let view = AttentionView {
            model: "fake".into(),
            layer: 1,
            head: 2,
            tokens: vec!["a".into(), "b".into()],
            matrix: AttentionMatrix::from_rows(vec![vec![1.0, 0.0], vec![0.5, 0.5]]).unwrap(),
            strongest: Vec::new(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["matrix"], serde_json::json!([[1.0, 0.0], [0.5, 0.5]]));
        assert_eq!(json["tokens"], serde_json::json!(["a", "b"]));
        assert_eq!(view.title(), "Attention heatmap (layer 1, head 2)");
    }
}
