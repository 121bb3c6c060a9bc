//! Greedy autoregressive decoding against the merged decoder graph.

use super::graphs::{DecoderStep, Florence2Graphs};
use super::kv_cache::KvCache;
use crate::core::OCRError;
use ndarray::{Array2, Array3, s};
use std::time::Instant;

/// Index of the largest logit at the final position of batch 0.
///
/// Ties resolve to the lowest index. A NaN is selected as soon as it is seen,
/// the way NumPy's `argmax` behaves.
pub fn argmax_last(logits: &Array3<f32>) -> Result<i64, OCRError> {
    let shape = logits.shape();
    if shape[0] == 0 || shape[1] == 0 || shape[2] == 0 {
        return Err(OCRError::shape_mismatch(
            "argmax",
            &[1, 1, 0],
            shape,
            "decoder logits",
        ));
    }

    let row = logits.slice(s![0, shape[1] - 1, ..]);
    let mut best_idx = 0usize;
    let mut best = f32::NEG_INFINITY;
    for (idx, &value) in row.iter().enumerate() {
        if value.is_nan() {
            return Ok(idx as i64);
        }
        if idx == 0 || value > best {
            best = value;
            best_idx = idx;
        }
    }
    Ok(best_idx as i64)
}

/// Greedy token generator.
///
/// Generation starts from the end-of-sequence id (the BART decoder start
/// convention) and stops after emitting it again or after `max_new_tokens`
/// tokens, so the output holds at most `max_new_tokens + 1` ids.
#[derive(Debug, Clone, Copy)]
pub struct GreedyDecoder {
    eos_token_id: i64,
    max_new_tokens: usize,
}

impl GreedyDecoder {
    pub fn new(eos_token_id: i64, max_new_tokens: usize) -> Self {
        Self {
            eos_token_id,
            max_new_tokens,
        }
    }

    pub fn eos_token_id(&self) -> i64 {
        self.eos_token_id
    }

    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    /// Generates token ids for one encoded image.
    ///
    /// The merged graph's cached branch does not pass the cross-attention cache
    /// through intact, so encoder-side entries captured at prefill are fed to
    /// every later step while decoder-side entries come from the latest output.
    pub fn generate(
        &self,
        graphs: &dyn Florence2Graphs,
        encoder_hidden_states: &Array3<f32>,
        encoder_attention_mask: &Array2<i64>,
    ) -> Result<Vec<i64>, OCRError> {
        let mut tokens = vec![self.eos_token_id];
        if self.max_new_tokens == 0 {
            return Ok(tokens);
        }

        let started = Instant::now();
        let layout = graphs.kv_layout();

        let seed = Array2::from_elem((1, 1), self.eos_token_id);
        let seed_embeds = graphs.embed_tokens(&seed)?;
        let empty = KvCache::empty(layout);
        let prefill = graphs.decode(DecoderStep {
            inputs_embeds: &seed_embeds,
            encoder_hidden_states,
            encoder_attention_mask,
            use_cache_branch: false,
            past: &empty,
        })?;

        let pinned = prefill.present.pin_encoder(layout);
        let mut logits = prefill.logits;
        let mut cache = prefill.present;

        for generated in 1..=self.max_new_tokens {
            let next = argmax_last(&logits)?;
            tokens.push(next);
            if next == self.eos_token_id || generated == self.max_new_tokens {
                break;
            }

            let ids = Array2::from_elem((1, 1), next);
            let embeds = graphs.embed_tokens(&ids)?;
            cache.restore_encoder(&pinned);

            let output = graphs.decode(DecoderStep {
                inputs_embeds: &embeds,
                encoder_hidden_states,
                encoder_attention_mask,
                use_cache_branch: true,
                past: &cache,
            })?;
            logits = output.logits;
            cache = output.present;
        }

        tracing::debug!(
            generated = tokens.len() - 1,
            hit_eos = tokens.last() == Some(&self.eos_token_id) && tokens.len() > 1,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "greedy decode finished"
        );

        Ok(tokens)
    }
}
