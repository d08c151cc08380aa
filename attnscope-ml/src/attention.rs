//! Attention tensors, per-head matrices and head summaries.

use candle_core::{DType, IndexOp, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{MlError, Result};

/// Attention probabilities for one sequence, shaped `(layers, heads, query, key)`.
#[derive(Debug, Clone)]
pub struct AttentionTensor {
    scores: Tensor,
}

impl AttentionTensor {
    /// Wrap a rank-4 tensor whose two trailing dimensions are equal.
    pub fn new(scores: Tensor) -> Result<Self> {
        let (_, _, queries, keys) = scores.dims4()?;
        if queries != keys {
            return Err(MlError::model(format!(
                "attention slice must be square, got {queries}x{keys}"
            )));
        }
        Ok(Self { scores })
    }

    /// Stack per-layer `(heads, n, n)` tensors into one.
    pub fn from_layers(layers: &[Tensor]) -> Result<Self> {
        if layers.is_empty() {
            return Err(MlError::model("model produced no attention layers"));
        }
        Self::new(Tensor::stack(layers, 0)?)
    }

    pub fn num_layers(&self) -> usize {
        self.scores.dims()[0]
    }

    pub fn num_heads(&self) -> usize {
        self.scores.dims()[1]
    }

    pub fn seq_len(&self) -> usize {
        self.scores.dims()[2]
    }

    pub fn as_tensor(&self) -> &Tensor {
        &self.scores
    }

    /// Reject a (layer, head) pair outside the tensor.
    pub fn check_selection(&self, layer: usize, head: usize) -> Result<()> {
        check_selection(layer, head, self.num_layers(), self.num_heads())
    }

    /// The `n x n` matrix of one head: rows attend, columns are attended to.
    pub fn matrix(&self, layer: usize, head: usize) -> Result<AttentionMatrix> {
        self.check_selection(layer, head)?;
        let rows = self
            .scores
            .i((layer, head))?
            .to_dtype(DType::F32)?
            .to_vec2::<f32>()?;
        AttentionMatrix::from_rows(rows)
    }
}

/// Bounds check shared by the tensor and the view layer.
pub fn check_selection(layer: usize, head: usize, layers: usize, heads: usize) -> Result<()> {
    if layer >= layers || head >= heads {
        return Err(MlError::SelectionOutOfRange {
            layer,
            head,
            max_layer: layers.saturating_sub(1),
            max_head: heads.saturating_sub(1),
        });
    }
    Ok(())
}

/// Square score matrix for a single head, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct AttentionMatrix {
    size: usize,
    values: Vec<f32>,
}

impl AttentionMatrix {
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let size = rows.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != size) {
            return Err(MlError::model(format!(
                "attention matrix is not square: {size} rows, row of length {}",
                bad.len()
            )));
        }
        Ok(Self {
            size,
            values: rows.into_iter().flatten().collect(),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.size + col]
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.values[row * self.size..(row + 1) * self.size]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks(0) panics, so guard the empty matrix
        self.values.chunks(self.size.max(1))
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.rows().map(<[f32]>::to_vec).collect()
    }

    /// Smallest and largest score, `(0, 0)` for an empty matrix.
    pub fn min_max(&self) -> (f32, f32) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn row_sums(&self) -> Vec<f32> {
        self.rows().map(|row| row.iter().sum()).collect()
    }

    /// Column holding the largest score of `row`.
    pub fn argmax_row(&self, row: usize) -> usize {
        self.row(row)
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(col, _)| col)
            .unwrap_or(0)
    }
}

/// Serialized as a list of rows.
impl Serialize for AttentionMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}

/// The key a query token attends to most.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenFocus {
    pub query: String,
    pub key: String,
    pub score: f32,
}

/// For every query row, the strongest key and its score.
pub fn strongest_targets(matrix: &AttentionMatrix, tokens: &[String]) -> Vec<TokenFocus> {
    (0..matrix.size().min(tokens.len()))
        .map(|row| {
            let col = matrix.argmax_row(row);
            TokenFocus {
                query: tokens[row].clone(),
                key: tokens.get(col).cloned().unwrap_or_default(),
                score: matrix.get(row, col),
            }
        })
        .collect()
}

/// Coarse classification of what a head attends to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AttentionPattern {
    SelfToken,
    PreviousToken,
    NextToken,
    Boundary,
    Broad,
    Mixed,
}

impl std::fmt::Display for AttentionPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::SelfToken => "self",
            Self::PreviousToken => "previous-token",
            Self::NextToken => "next-token",
            Self::Boundary => "boundary",
            Self::Broad => "broad",
            Self::Mixed => "mixed",
        };
        f.write_str(label)
    }
}

const DOMINANT_SHARE: f32 = 0.5;
const BROAD_ENTROPY: f32 = 0.8;
/// How far a share must exceed its uniform baseline to count.
const BASELINE_MARGIN: f32 = 0.15;

fn dominates(weight: f32, baseline: f32) -> bool {
    weight >= DOMINANT_SHARE.max(baseline + BASELINE_MARGIN)
}

/// Statistics for one head over one input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadSummary {
    pub layer: usize,
    pub head: usize,
    /// Mean row entropy divided by `ln(n)`, in `[0, 1]`.
    pub entropy: f32,
    pub self_weight: f32,
    pub previous_weight: f32,
    pub next_weight: f32,
    /// Mean weight on the first and last positions (`[CLS]` and `[SEP]` for BERT).
    pub boundary_weight: f32,
    pub pattern: AttentionPattern,
}

impl HeadSummary {
    pub fn from_matrix(layer: usize, head: usize, matrix: &AttentionMatrix) -> Self {
        let n = matrix.size();
        let mean = |values: Vec<f32>| {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f32>() / values.len() as f32
            }
        };

        let self_weight = mean((0..n).map(|i| matrix.get(i, i)).collect());
        let previous_weight = mean((1..n).map(|i| matrix.get(i, i - 1)).collect());
        let next_weight = mean((0..n.saturating_sub(1)).map(|i| matrix.get(i, i + 1)).collect());
        let boundary_weight = mean(
            (0..n)
                .map(|i| {
                    if n == 1 {
                        matrix.get(i, 0)
                    } else {
                        matrix.get(i, 0) + matrix.get(i, n - 1)
                    }
                })
                .collect(),
        );

        let entropy = if n > 1 {
            let max = (n as f32).ln();
            mean(matrix.rows().map(row_entropy).collect()) / max
        } else {
            0.0
        };

        // a uniform row already puts 1/n on each position
        let single = 1.0 / n.max(1) as f32;
        let boundary_baseline = if n > 1 { 2.0 * single } else { single };
        let pattern = if dominates(previous_weight, single) {
            AttentionPattern::PreviousToken
        } else if dominates(next_weight, single) {
            AttentionPattern::NextToken
        } else if dominates(self_weight, single) {
            AttentionPattern::SelfToken
        } else if dominates(boundary_weight, boundary_baseline) {
            AttentionPattern::Boundary
        } else if entropy >= BROAD_ENTROPY {
            AttentionPattern::Broad
        } else {
            AttentionPattern::Mixed
        };

        Self {
            layer,
            head,
            entropy,
            self_weight,
            previous_weight,
            next_weight,
            boundary_weight,
            pattern,
        }
    }
}

fn row_entropy(row: &[f32]) -> f32 {
    row.iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum()
}

/// Summaries for every head, ordered by layer then head.
pub fn summarize_heads(attention: &AttentionTensor) -> Result<Vec<HeadSummary>> {
    let mut summaries = Vec::with_capacity(attention.num_layers() * attention.num_heads());
    for layer in 0..attention.num_layers() {
        for head in 0..attention.num_heads() {
            let matrix = attention.matrix(layer, head)?;
            summaries.push(HeadSummary::from_matrix(layer, head, &matrix));
        }
    }
    Ok(summaries)
}

/// Most focused heads first (lowest normalized entropy).
pub fn rank_by_focus(mut summaries: Vec<HeadSummary>) -> Vec<HeadSummary> {
    summaries.sort_by(|a, b| {
        a.entropy
            .partial_cmp(&b.entropy)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    summaries
}
