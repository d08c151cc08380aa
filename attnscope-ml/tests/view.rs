//! View pipeline behaviour against a counting fake model.

mod common;

use attnscope_ml::attention::AttentionPattern;
use attnscope_ml::view::{
    EMPTY_INPUT_WARNING, ViewOutcome, ViewRequest, compute_head_summaries, compute_tokens,
    compute_view,
};
use attnscope_ml::MlError;
use common::FakeModel;
use pretty_assertions::assert_eq;

#[test]
fn blank_input_warns_without_calling_the_model() {
    let model = FakeModel::new(12, 12);
    for text in ["", "   ", "\n\t "] {
        let outcome = compute_view(&model, &ViewRequest::new(text, 6, 0)).unwrap();
        match outcome {
            ViewOutcome::Warning(message) => assert_eq!(message, EMPTY_INPUT_WARNING),
            ViewOutcome::Ready(_) => panic!("blank input produced a view"),
        }
    }
    assert_eq!(model.calls(), 0);
}

#[test]
fn blank_input_warns_even_with_bad_selection() {
    let model = FakeModel::new(2, 2);
    let outcome = compute_view(&model, &ViewRequest::new(" ", 40, 40)).unwrap();
    assert!(matches!(outcome, ViewOutcome::Warning(_)));
}

#[test]
fn one_forward_pass_per_trigger() {
    let model = FakeModel::new(12, 12);
    compute_view(&model, &ViewRequest::new("one two three", 6, 0)).unwrap();
    assert_eq!(model.forward_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
fn labels_match_matrix_rows_and_columns() {
    let model = FakeModel::new(12, 12);
    let view = compute_view(&model, &ViewRequest::new("a b c d", 3, 4))
        .unwrap()
        .into_view()
        .unwrap();
    assert_eq!(view.tokens.len(), 6);
    assert_eq!(view.matrix.size(), view.tokens.len());
    assert_eq!(view.tokens.first().map(String::as_str), Some("[CLS]"));
    assert_eq!(view.tokens.last().map(String::as_str), Some("[SEP]"));
    assert_eq!((view.layer, view.head), (3, 4));
}

#[test]
fn strongest_targets_follow_the_peak() {
    let model = FakeModel::new(2, 2);
    let view = compute_view(&model, &ViewRequest::new("x y", 0, 1))
        .unwrap()
        .into_view()
        .unwrap();
    // head 1 of layer 0 peaks one position to the right, wrapping around
    let keys: Vec<_> = view.strongest.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["tok1", "tok2", "[SEP]", "[CLS]"]);
    assert!(view.strongest.iter().all(|f| (f.score - 0.8).abs() < 1e-6));
}

#[test]
fn out_of_range_selection_is_rejected_before_inference() {
    let model = FakeModel::new(12, 12);
    let err = compute_view(&model, &ViewRequest::new("hello", 12, 0)).unwrap_err();
    assert!(matches!(err, MlError::SelectionOutOfRange { layer: 12, max_layer: 11, .. }));
    let err = compute_view(&model, &ViewRequest::new("hello", 0, 12)).unwrap_err();
    assert!(err.is_user_error());
    assert_eq!(model.calls(), 0);
}

#[test]
fn token_listing_and_head_summaries() {
    let model = FakeModel::new(2, 2);
    assert_eq!(compute_tokens(&model, "a b").unwrap().len(), 4);
    assert!(matches!(compute_tokens(&model, " "), Err(MlError::EmptyInput)));

    let summaries = compute_head_summaries(&model, "a b c").unwrap();
    assert_eq!(summaries.len(), 4);
    let diagonal = summaries
        .iter()
        .find(|s| s.layer == 0 && s.head == 0)
        .unwrap();
    assert_eq!(diagonal.pattern, AttentionPattern::SelfToken);
}
