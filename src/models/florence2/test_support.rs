//! Scripted in-memory graphs for exercising the engine without model files.

use super::graphs::{DecoderOutput, DecoderStep, Florence2Graphs};
use super::kv_cache::{KvCache, KvLayout, KvSide};
use crate::core::OCRError;
use ndarray::{Array2, Array3, Array4, ArrayD, IxDyn};
use std::sync::Mutex;

pub(crate) const HIDDEN: usize = 4;
pub(crate) const VOCAB: usize = 64;
pub(crate) const VISUAL_TOKENS: usize = 3;
/// Token emitted once the script runs out.
pub(crate) const FILLER_TOKEN: i64 = 5;

/// What one decoder call received.
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub use_cache_branch: bool,
    pub embedded_token: i64,
    pub decoder_seq_len: usize,
    /// Distinct values seen across the encoder-side cache inputs.
    pub encoder_kv_values: Vec<f32>,
    pub encoder_seq_len: usize,
}

pub(crate) struct ScriptedGraphs {
    layout: KvLayout,
    script: Vec<i64>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGraphs {
    pub const PREFILL_ENCODER_KV: f32 = 7.0;

    pub fn new(script: Vec<i64>) -> Self {
        Self {
            layout: KvLayout::new(2, 2, 3),
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Florence2Graphs for ScriptedGraphs {
    fn kv_layout(&self) -> &KvLayout {
        &self.layout
    }

    fn encode_image(&self, pixel_values: &Array4<f32>) -> Result<Array3<f32>, OCRError> {
        assert_eq!(pixel_values.shape()[..2], [1, 3]);
        Ok(Array3::from_elem((1, VISUAL_TOKENS, HIDDEN), 0.5))
    }

    fn embed_tokens(&self, input_ids: &Array2<i64>) -> Result<Array3<f32>, OCRError> {
        let len = input_ids.shape()[1];
        let mut out = Array3::zeros((1, len, HIDDEN));
        for (t, &id) in input_ids.row(0).iter().enumerate() {
            out.slice_mut(ndarray::s![0, t, ..]).fill(id as f32);
        }
        Ok(out)
    }

    fn encode(
        &self,
        inputs_embeds: &Array3<f32>,
        attention_mask: &Array2<i64>,
    ) -> Result<Array3<f32>, OCRError> {
        assert_eq!(inputs_embeds.shape()[1], attention_mask.shape()[1]);
        assert!(attention_mask.iter().all(|&m| m == 1));
        Ok(inputs_embeds.clone())
    }

    fn decode(&self, step: DecoderStep<'_>) -> Result<DecoderOutput, OCRError> {
        let mut calls = self.calls.lock().unwrap();
        let call_idx = calls.len();

        let mut encoder_kv_values: Vec<f32> = self
            .layout
            .keys()
            .filter(|key| key.side == KvSide::Encoder)
            .filter_map(|key| step.past.get(&self.layout, key))
            .flat_map(|t| t.iter().copied().collect::<Vec<_>>())
            .collect();
        encoder_kv_values.sort_by(|a, b| a.total_cmp(b));
        encoder_kv_values.dedup();

        let decoder_seq_len = step.past.decoder_seq_len();
        calls.push(RecordedCall {
            use_cache_branch: step.use_cache_branch,
            embedded_token: step.inputs_embeds[[0, 0, 0]] as i64,
            decoder_seq_len,
            encoder_kv_values,
            encoder_seq_len: step.encoder_hidden_states.shape()[1],
        });

        let token = self.script.get(call_idx).copied().unwrap_or(FILLER_TOKEN);
        let mut logits = Array3::zeros((1, 1, VOCAB));
        logits[[0, 0, token as usize]] = 1.0;

        let heads = self.layout.num_heads();
        let head_dim = self.layout.head_dim();
        let encoder_value = if step.use_cache_branch {
            100.0 + call_idx as f32
        } else {
            Self::PREFILL_ENCODER_KV
        };
        let present = KvCache::from_fn(&self.layout, |key| match key.side {
            KvSide::Decoder => ArrayD::from_elem(IxDyn(&[1, heads, decoder_seq_len + 1, head_dim]), 1.0),
            KvSide::Encoder => ArrayD::from_elem(
                IxDyn(&[1, heads, step.encoder_hidden_states.shape()[1], head_dim]),
                encoder_value,
            ),
        });

        Ok(DecoderOutput { logits, present })
    }
}
