//! Property-based tests for the view pipeline using proptest.

mod common;

use proptest::prelude::*;

use attnscope_ml::attention::AttentionMatrix;
use attnscope_ml::heatmap::{HeatmapStyle, render_svg};
use attnscope_ml::view::{ViewOutcome, ViewRequest, compute_view};
use common::FakeModel;

/// Number of SVG text nodes whose content is exactly `text`.
fn text_nodes(svg: &str, text: &str) -> usize {
    svg.lines().filter(|line| line.trim() == text).count()
}

// --- Shape properties ---

proptest! {
    #[test]
    fn labels_always_match_matrix_side(
        words in prop::collection::vec("[a-z]{1,8}", 1..20),
        layer in 0usize..12,
        head in 0usize..12,
    ) {
        let model = FakeModel::new(12, 12);
        let outcome = compute_view(&model, &ViewRequest::new(words.join(" "), layer, head)).unwrap();
        let ViewOutcome::Ready(view) = outcome else {
            panic!("non-blank input produced a warning");
        };
        prop_assert_eq!(view.tokens.len(), words.len() + 2);
        prop_assert_eq!(view.matrix.size(), view.tokens.len());
        prop_assert_eq!(view.strongest.len(), view.tokens.len());
        for row in view.matrix.rows() {
            prop_assert_eq!(row.len(), view.tokens.len());
            prop_assert!(row.iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn whitespace_only_never_reaches_the_model(
        text in "[ \t\n]{0,16}",
        layer in 0usize..64,
        head in 0usize..64,
    ) {
        let model = FakeModel::new(12, 12);
        let outcome = compute_view(&model, &ViewRequest::new(text, layer, head)).unwrap();
        prop_assert!(matches!(outcome, ViewOutcome::Warning(_)));
        prop_assert_eq!(model.calls(), 0);
    }

    #[test]
    fn out_of_range_selection_always_errors(
        layer in 0usize..30,
        head in 0usize..30,
    ) {
        let model = FakeModel::new(12, 12);
        let result = compute_view(&model, &ViewRequest::new("some words", layer, head));
        prop_assert_eq!(result.is_ok(), layer < 12 && head < 12);
    }
}

// --- Rendering properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn svg_carries_every_label(
        labels in prop::collection::vec("[a-z]{1,6}", 1..12),
    ) {
        let n = labels.len();
        let rows = (0..n)
            .map(|i| (0..n).map(|j| ((i * n + j) % 7) as f32 / 7.0).collect())
            .collect();
        let matrix = AttentionMatrix::from_rows(rows).unwrap();
        let svg = render_svg(&matrix, &labels, &HeatmapStyle::default()).unwrap();
        for label in &labels {
            prop_assert!(text_nodes(&svg, label) >= 2, "missing label {}", label);
        }
    }
}
