//! Deterministic stand-in for a pretrained encoder.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use attnscope_ml::attention::AttentionTensor;
use attnscope_ml::model::AttentionModel;
use attnscope_ml::Result;
use candle_core::{Device, Tensor};

/// Whitespace tokenizer with `[CLS]`/`[SEP]`; head `h` of layer `l` puts
/// most of each row on key `(row + l + h) % n`.
pub struct FakeModel {
    pub layers: usize,
    pub heads: usize,
    pub tokenize_calls: AtomicUsize,
    pub forward_calls: AtomicUsize,
}

impl FakeModel {
    pub fn new(layers: usize, heads: usize) -> Self {
        Self {
            layers,
            heads,
            tokenize_calls: AtomicUsize::new(0),
            forward_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.tokenize_calls.load(Ordering::SeqCst) + self.forward_calls.load(Ordering::SeqCst)
    }
}

impl AttentionModel for FakeModel {
    fn name(&self) -> &str {
        "fake-bert"
    }

    fn num_layers(&self) -> usize {
        self.layers
    }

    fn num_heads(&self) -> usize {
        self.heads
    }

    fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        self.tokenize_calls.fetch_add(1, Ordering::SeqCst);
        let words = text.split_whitespace().count() as u32;
        Ok((0..words + 2).collect())
    }

    fn ids_to_tokens(&self, ids: &[u32]) -> Result<Vec<String>> {
        let last = ids.len().saturating_sub(1);
        Ok(ids
            .iter()
            .enumerate()
            .map(|(i, id)| match i {
                0 => "[CLS]".to_string(),
                i if i == last => "[SEP]".to_string(),
                _ => format!("tok{id}"),
            })
            .collect())
    }

    fn forward(&self, ids: &[u32]) -> Result<AttentionTensor> {
        self.forward_calls.fetch_add(1, Ordering::SeqCst);
        let n = ids.len();
        let rest = if n > 1 { 0.2 / (n - 1) as f32 } else { 0.0 };
        let peak = if n > 1 { 0.8 } else { 1.0 };
        let mut values = Vec::with_capacity(self.layers * self.heads * n * n);
        for layer in 0..self.layers {
            for head in 0..self.heads {
                for row in 0..n {
                    let target = (row + layer + head) % n;
                    values.extend((0..n).map(|col| if col == target { peak } else { rest }));
                }
            }
        }
        let scores = Tensor::from_vec(values, (self.layers, self.heads, n, n), &Device::Cpu)?;
        AttentionTensor::new(scores)
    }
}
