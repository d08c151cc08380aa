//! BERT encoder forward pass that keeps the attention probabilities.
//!
//! Parameter names follow the Hugging Face checkpoints (`embeddings.*`,
//! `encoder.layer.{i}.*`), optionally under a `bert.` prefix.

use candle_core::{Device, Module, Tensor};
use candle_nn::{Embedding, Init, LayerNorm, Linear, VarBuilder, embedding, linear};
use serde::Deserialize;

use crate::attention::AttentionTensor;
use crate::error::{MlError, Result};

/// Encoder hyper-parameters, as found in `config.json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BertConfig {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    #[serde(default)]
    pub hidden_act: HiddenAct,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
    #[serde(default = "default_type_vocab_size")]
    pub type_vocab_size: usize,
    #[serde(default = "default_layer_norm_eps")]
    pub layer_norm_eps: f64,
    #[serde(default)]
    pub model_type: Option<String>,
}

fn default_max_position_embeddings() -> usize {
    512
}
fn default_type_vocab_size() -> usize {
    2
}
fn default_layer_norm_eps() -> f64 {
    1e-12
}

impl BertConfig {
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }
}

/// Feed-forward activation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub enum HiddenAct {
    #[default]
    #[serde(rename = "gelu")]
    Gelu,
    #[serde(rename = "gelu_new", alias = "gelu_pytorch_tanh")]
    GeluApproximate,
    #[serde(rename = "relu")]
    Relu,
}

impl HiddenAct {
    fn apply(self, x: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            Self::Gelu => x.gelu_erf(),
            Self::GeluApproximate => x.gelu(),
            Self::Relu => x.relu(),
        }
    }
}

/// LayerNorm accepting both `weight`/`bias` and the older `gamma`/`beta` names.
fn layer_norm(size: usize, eps: f64, vb: VarBuilder) -> candle_core::Result<LayerNorm> {
    let (weight, bias) = match (
        vb.get_with_hints(size, "weight", Init::Const(1.0)),
        vb.get_with_hints(size, "bias", Init::Const(0.0)),
    ) {
        (Ok(weight), Ok(bias)) => (weight, bias),
        (Err(err), _) | (_, Err(err)) => match (vb.get(size, "gamma"), vb.get(size, "beta")) {
            (Ok(weight), Ok(bias)) => (weight, bias),
            _ => return Err(err),
        },
    };
    Ok(LayerNorm::new(weight, bias, eps))
}

struct Embeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    norm: LayerNorm,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        Ok(Self {
            word: embedding(config.vocab_size, config.hidden_size, vb.pp("word_embeddings"))?,
            position: embedding(
                config.max_position_embeddings,
                config.hidden_size,
                vb.pp("position_embeddings"),
            )?,
            token_type: embedding(
                config.type_vocab_size,
                config.hidden_size,
                vb.pp("token_type_embeddings"),
            )?,
            norm: layer_norm(config.hidden_size, config.layer_norm_eps, vb.pp("LayerNorm"))?,
        })
    }

    fn forward(&self, input_ids: &Tensor) -> candle_core::Result<Tensor> {
        let (_, seq_len) = input_ids.dims2()?;
        let positions = Tensor::arange(0u32, seq_len as u32, input_ids.device())?.unsqueeze(0)?;
        // single segment: every token type is 0
        let token_types = input_ids.zeros_like()?;
        let embedded = ((self.word.forward(input_ids)? + self.position.forward(&positions)?)?
            + self.token_type.forward(&token_types)?)?;
        self.norm.forward(&embedded)
    }
}

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    num_heads: usize,
    head_dim: usize,
    scale: f64,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let head_dim = config.head_dim();
        Ok(Self {
            query: linear(hidden, hidden, vb.pp("query"))?,
            key: linear(hidden, hidden, vb.pp("key"))?,
            value: linear(hidden, hidden, vb.pp("value"))?,
            num_heads: config.num_attention_heads,
            head_dim,
            scale: 1.0 / (head_dim as f64).sqrt(),
        })
    }

    /// Returns the context vectors and the `(batch, heads, n, n)` probabilities.
    fn forward(&self, x: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let (b_sz, seq_len, _) = x.dims3()?;
        let split_heads = |t: Tensor| -> candle_core::Result<Tensor> {
            t.reshape((b_sz, seq_len, self.num_heads, self.head_dim))?
                .transpose(1, 2)?
                .contiguous()
        };

        let q = split_heads(self.query.forward(x)?)?;
        let k = split_heads(self.key.forward(x)?)?;
        let v = split_heads(self.value.forward(x)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? * self.scale)?;
        let probs = candle_nn::ops::softmax_last_dim(&scores)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((b_sz, seq_len, self.num_heads * self.head_dim))?;
        Ok((context, probs))
    }
}

struct EncoderLayer {
    attention: SelfAttention,
    attention_output: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    activation: HiddenAct,
}

impl EncoderLayer {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        let hidden = config.hidden_size;
        let eps = config.layer_norm_eps;
        let attn = vb.pp("attention");
        Ok(Self {
            attention: SelfAttention::load(attn.pp("self"), config)?,
            attention_output: linear(hidden, hidden, attn.pp("output").pp("dense"))?,
            attention_norm: layer_norm(hidden, eps, attn.pp("output").pp("LayerNorm"))?,
            intermediate: linear(
                hidden,
                config.intermediate_size,
                vb.pp("intermediate").pp("dense"),
            )?,
            output: linear(config.intermediate_size, hidden, vb.pp("output").pp("dense"))?,
            output_norm: layer_norm(hidden, eps, vb.pp("output").pp("LayerNorm"))?,
            activation: config.hidden_act,
        })
    }

    fn forward(&self, hidden: &Tensor) -> candle_core::Result<(Tensor, Tensor)> {
        let (context, probs) = self.attention.forward(hidden)?;
        let attended = self
            .attention_norm
            .forward(&(self.attention_output.forward(&context)? + hidden)?)?;
        let expanded = self
            .activation
            .apply(&self.intermediate.forward(&attended)?)?;
        let out = self
            .output_norm
            .forward(&(self.output.forward(&expanded)? + &attended)?)?;
        Ok((out, probs))
    }
}

/// Embeddings plus the stack of encoder layers; no pooler, no task head.
pub struct BertEncoder {
    embeddings: Embeddings,
    layers: Vec<EncoderLayer>,
    config: BertConfig,
    device: Device,
}

impl BertEncoder {
    pub fn load(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        let vb = if vb.contains_tensor("embeddings.word_embeddings.weight") {
            vb
        } else {
            let prefix = config.model_type.clone().unwrap_or_else(|| "bert".to_string());
            vb.pp(prefix)
        };
        let device = vb.device().clone();

        let embeddings = Embeddings::load(vb.pp("embeddings"), config)?;
        let layers_vb = vb.pp("encoder").pp("layer");
        let layers = (0..config.num_hidden_layers)
            .map(|i| EncoderLayer::load(layers_vb.pp(i.to_string()), config))
            .collect::<candle_core::Result<Vec<_>>>()?;

        tracing::debug!(
            layers = config.num_hidden_layers,
            heads = config.num_attention_heads,
            hidden = config.hidden_size,
            "BERT encoder loaded"
        );

        Ok(Self {
            embeddings,
            layers,
            config: config.clone(),
            device,
        })
    }

    pub fn config(&self) -> &BertConfig {
        &self.config
    }

    /// Run the encoder on one unpadded sequence and collect every layer's probabilities.
    pub fn forward(&self, ids: &[u32]) -> Result<AttentionTensor> {
        if ids.is_empty() {
            return Err(MlError::EmptyInput);
        }
        if ids.len() > self.config.max_position_embeddings {
            return Err(MlError::SequenceTooLong {
                tokens: ids.len(),
                limit: self.config.max_position_embeddings,
            });
        }

        let input_ids = Tensor::new(ids, &self.device)?.unsqueeze(0)?;
        let mut hidden = self.embeddings.forward(&input_ids)?;
        let mut per_layer = Vec::with_capacity(self.layers.len());
        for layer in &self.layers {
            let (out, probs) = layer.forward(&hidden)?;
            hidden = out;
            per_layer.push(probs.squeeze(0)?);
        }
        AttentionTensor::from_layers(&per_layer)
    }
}
