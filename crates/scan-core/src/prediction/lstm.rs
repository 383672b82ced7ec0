//! LSTM next-token model on candle.
//!
//! Expects a safetensors file with `embedding.weight`, stacked
//! `lstm.{weight,bias}_{ih,hh}_l{n}` layers and an `output` linear head.
//! Dimensions and layer count are read from the tensors.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor, D};
use candle_nn::rnn::{LSTMConfig, LSTM, RNN};
use candle_nn::{Embedding, Linear, VarBuilder};

use super::{PredictionError, TokenModel};

/// Longest token window fed to the network.
const MAX_SEQ_LEN: usize = 32;

pub struct LstmTokenModel {
    embedding: Embedding,
    layers: Vec<LSTM>,
    output: Linear,
    vocab_size: usize,
    device: Device,
}

impl LstmTokenModel {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(path, &device)
            .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;

        let (vocab_size, emb_dim) = tensors
            .get("embedding.weight")
            .ok_or_else(|| anyhow::anyhow!("missing embedding.weight"))?
            .dims2()?;
        let (gates, hidden_dim) = tensors
            .get("lstm.weight_hh_l0")
            .ok_or_else(|| anyhow::anyhow!("missing lstm.weight_hh_l0"))?
            .dims2()?;
        if gates != 4 * hidden_dim {
            anyhow::bail!("lstm.weight_hh_l0 has shape ({gates}, {hidden_dim})");
        }
        let n_layers = (0..)
            .take_while(|i| tensors.contains_key(&format!("lstm.weight_ih_l{i}")))
            .count();
        let has_output_bias = tensors.contains_key("output.bias");

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let embedding = candle_nn::embedding(vocab_size, emb_dim, vb.pp("embedding"))?;
        let layers = (0..n_layers)
            .map(|i| {
                let in_dim = if i == 0 { emb_dim } else { hidden_dim };
                let config = LSTMConfig {
                    layer_idx: i,
                    ..Default::default()
                };
                candle_nn::lstm(in_dim, hidden_dim, config, vb.pp("lstm"))
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let output = if has_output_bias {
            candle_nn::linear(hidden_dim, vocab_size, vb.pp("output"))?
        } else {
            candle_nn::linear_no_bias(hidden_dim, vocab_size, vb.pp("output"))?
        };

        Ok(Self {
            embedding,
            layers,
            output,
            vocab_size,
            device,
        })
    }

    fn forward(&self, tokens: &[u32]) -> candle_core::Result<Vec<f32>> {
        let window = &tokens[tokens.len().saturating_sub(MAX_SEQ_LEN)..];
        let ids = Tensor::new(window, &self.device)?.unsqueeze(0)?;
        let mut hidden = self.embedding.forward(&ids)?;
        for layer in &self.layers {
            let states = layer.seq(&hidden)?;
            hidden = layer.states_to_tensor(&states)?;
        }
        // (1, seq, hidden) -> last position
        let last = hidden.narrow(1, window.len() - 1, 1)?.squeeze(1)?;
        let logits = self.output.forward(&last)?.squeeze(0)?;
        candle_nn::ops::softmax(&logits, D::Minus1)?.to_vec1::<f32>()
    }
}

impl TokenModel for LstmTokenModel {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn next_token_probs(&mut self, tokens: &[u32]) -> Result<Vec<f32>, PredictionError> {
        if tokens.is_empty() {
            return Ok(vec![1.0 / self.vocab_size as f32; self.vocab_size]);
        }
        self.forward(tokens)
            .map_err(|e| PredictionError::Inference(e.to_string()))
    }
}
