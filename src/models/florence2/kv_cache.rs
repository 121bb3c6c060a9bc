//! Key/value cache of the merged Florence-2 decoder.
//!
//! Every decoder layer carries four tensors: self-attention (decoder side) and
//! cross-attention (encoder side) keys and values, each `[1, heads, seq, head_dim]`.
//! [`KvLayout`] computes the graph-level input and output names once; a
//! [`KvCache`] stores tensors in layout order so lookups are plain indexing.
//!
//! Entries are reference counted: pinning and restoring the encoder side only
//! bumps counts, and graph inputs borrow the buffers instead of copying them.

use crate::core::OCRError;
use crate::core::inference::{NamedInputs, OrtOutputs, f32_view};
use ndarray::{ArrayD, IxDyn};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Which attention block a cache entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvSide {
    /// Self-attention over generated tokens; grows by one position per step.
    Decoder,
    /// Cross-attention over the encoder output; fixed after prefill.
    Encoder,
}

impl KvSide {
    fn as_str(&self) -> &'static str {
        match self {
            KvSide::Decoder => "decoder",
            KvSide::Encoder => "encoder",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KvField {
    Key,
    Value,
}

impl KvField {
    fn as_str(&self) -> &'static str {
        match self {
            KvField::Key => "key",
            KvField::Value => "value",
        }
    }
}

/// Address of one cache tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KvKey {
    pub layer: usize,
    pub side: KvSide,
    pub field: KvField,
}

impl KvKey {
    pub fn new(layer: usize, side: KvSide, field: KvField) -> Self {
        Self { layer, side, field }
    }

    /// Name of the graph input that receives this entry.
    pub fn input_name(&self) -> String {
        format!("past_key_values.{self}")
    }

    /// Name of the graph output that returns this entry.
    pub fn output_name(&self) -> String {
        format!("present.{self}")
    }

    /// Parses `past_key_values.{layer}.{side}.{field}`.
    pub fn parse_input_name(name: &str) -> Option<Self> {
        Self::parse_address(name.strip_prefix("past_key_values.")?)
    }

    /// Parses `present.{layer}.{side}.{field}`.
    pub fn parse_output_name(name: &str) -> Option<Self> {
        Self::parse_address(name.strip_prefix("present.")?)
    }

    fn parse_address(rest: &str) -> Option<Self> {
        let mut parts = rest.split('.');
        let layer = parts.next()?.parse::<usize>().ok()?;
        let side = match parts.next()? {
            "decoder" => KvSide::Decoder,
            "encoder" => KvSide::Encoder,
            _ => return None,
        };
        let field = match parts.next()? {
            "key" => KvField::Key,
            "value" => KvField::Value,
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { layer, side, field })
    }
}

impl fmt::Display for KvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.layer,
            self.side.as_str(),
            self.field.as_str()
        )
    }
}

#[derive(Debug, Clone)]
struct KvSlot {
    key: KvKey,
    input_name: String,
    output_name: String,
}

/// Cache geometry plus the naming table for every entry.
#[derive(Debug, Clone)]
pub struct KvLayout {
    num_layers: usize,
    num_heads: usize,
    head_dim: usize,
    slots: Vec<KvSlot>,
}

impl KvLayout {
    pub fn new(num_layers: usize, num_heads: usize, head_dim: usize) -> Self {
        let mut slots = Vec::with_capacity(num_layers * 4);
        for layer in 0..num_layers {
            for side in [KvSide::Decoder, KvSide::Encoder] {
                for field in [KvField::Key, KvField::Value] {
                    let key = KvKey::new(layer, side, field);
                    slots.push(KvSlot {
                        key,
                        input_name: key.input_name(),
                        output_name: key.output_name(),
                    });
                }
            }
        }
        Self {
            num_layers,
            num_heads,
            head_dim,
            slots,
        }
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    pub fn head_dim(&self) -> usize {
        self.head_dim
    }

    /// Number of cache tensors (four per layer).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entry keys in storage order.
    pub fn keys(&self) -> impl Iterator<Item = KvKey> + '_ {
        self.slots.iter().map(|slot| slot.key)
    }

    fn index_of(&self, key: KvKey) -> Option<usize> {
        if key.layer >= self.num_layers {
            return None;
        }
        let side = match key.side {
            KvSide::Decoder => 0,
            KvSide::Encoder => 1,
        };
        let field = match key.field {
            KvField::Key => 0,
            KvField::Value => 1,
        };
        Some(key.layer * 4 + side * 2 + field)
    }

    fn check_shape(&self, name: &str, tensor: &ArrayD<f32>) -> Result<(), OCRError> {
        let shape = tensor.shape();
        let ok = shape.len() == 4
            && shape[0] == 1
            && shape[1] == self.num_heads
            && shape[3] == self.head_dim;
        if ok {
            Ok(())
        } else {
            Err(OCRError::shape_mismatch(
                "kv_cache",
                &[1, self.num_heads, 0, self.head_dim],
                shape,
                name,
            ))
        }
    }
}

/// Encoder-side entries captured after prefill.
#[derive(Debug, Clone)]
pub struct PinnedEncoderKv {
    tensors: Vec<(usize, Arc<ArrayD<f32>>)>,
}

impl PinnedEncoderKv {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

/// One complete set of cache tensors.
#[derive(Debug, Clone)]
pub struct KvCache {
    tensors: Vec<Arc<ArrayD<f32>>>,
}

impl KvCache {
    /// Zero-length entries for the prefill call.
    pub fn empty(layout: &KvLayout) -> Self {
        let empty = Arc::new(ArrayD::<f32>::zeros(IxDyn(&[
            1,
            layout.num_heads,
            0,
            layout.head_dim,
        ])));
        Self {
            tensors: vec![empty; layout.len()],
        }
    }

    /// Builds a cache entry by entry.
    pub fn from_fn<F>(layout: &KvLayout, mut f: F) -> Self
    where
        F: FnMut(KvKey) -> ArrayD<f32>,
    {
        Self {
            tensors: layout.keys().map(|key| Arc::new(f(key))).collect(),
        }
    }

    /// Collects the `present.*` outputs of one decoder run.
    ///
    /// With `encoder_from` set, encoder-side entries are shared from that cache
    /// and the matching outputs are ignored: the merged graph's cached branch
    /// emits placeholders there. Fails when a used entry is missing or its
    /// shape does not match the layout.
    pub fn from_outputs(
        layout: &KvLayout,
        outputs: &mut OrtOutputs,
        encoder_from: Option<&KvCache>,
    ) -> Result<Self, OCRError> {
        let mut tensors = Vec::with_capacity(layout.len());
        for (idx, slot) in layout.slots.iter().enumerate() {
            if let (KvSide::Encoder, Some(carry)) = (slot.key.side, encoder_from) {
                let tensor = carry
                    .tensors
                    .get(idx)
                    .cloned()
                    .ok_or_else(|| OCRError::MissingCacheEntry {
                        name: slot.input_name.clone(),
                    })?;
                tensors.push(tensor);
                continue;
            }

            let tensor = outputs
                .take(&slot.output_name)
                .map_err(|_| OCRError::MissingCacheEntry {
                    name: slot.output_name.clone(),
                })?;
            layout.check_shape(&slot.output_name, &tensor)?;
            tensors.push(Arc::new(tensor));
        }
        Ok(Self { tensors })
    }

    pub fn get(&self, layout: &KvLayout, key: KvKey) -> Option<&ArrayD<f32>> {
        layout
            .index_of(key)
            .and_then(|idx| self.tensors.get(idx))
            .map(Arc::as_ref)
    }

    /// Sequence length of the decoder-side cache.
    pub fn decoder_seq_len(&self) -> usize {
        self.tensors
            .first()
            .and_then(|t| t.shape().get(2).copied())
            .unwrap_or(0)
    }

    /// Shares out the encoder-side entries.
    pub fn pin_encoder(&self, layout: &KvLayout) -> PinnedEncoderKv {
        let tensors = layout
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.key.side == KvSide::Encoder)
            .filter_map(|(idx, _)| self.tensors.get(idx).map(|t| (idx, t.clone())))
            .collect();
        PinnedEncoderKv { tensors }
    }

    /// Overwrites the encoder-side entries with pinned values.
    pub fn restore_encoder(&mut self, pinned: &PinnedEncoderKv) {
        for (idx, tensor) in &pinned.tensors {
            if let Some(slot) = self.tensors.get_mut(*idx) {
                *slot = Arc::clone(tensor);
            }
        }
    }

    /// Binds every entry to its named `past_key_values.*` input.
    pub fn to_inputs(&self, layout: &KvLayout) -> Result<NamedInputs<'_>, OCRError> {
        if self.tensors.len() != layout.len() {
            return Err(OCRError::InvalidInput {
                message: format!(
                    "kv cache holds {} entries, layout expects {}",
                    self.tensors.len(),
                    layout.len()
                ),
            });
        }
        let mut inputs = NamedInputs::with_capacity(self.tensors.len());
        for (slot, tensor) in layout.slots.iter().zip(&self.tensors) {
            inputs.push((Cow::Owned(slot.input_name.clone()), f32_view(tensor.as_ref())?));
        }
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_export_convention() {
        let key = KvKey::new(3, KvSide::Encoder, KvField::Value);
        assert_eq!(key.input_name(), "past_key_values.3.encoder.value");
        assert_eq!(key.output_name(), "present.3.encoder.value");
        assert_eq!(KvKey::parse_input_name(&key.input_name()), Some(key));
        assert_eq!(KvKey::parse_output_name(&key.output_name()), Some(key));
        assert_eq!(KvKey::parse_output_name("logits"), None);
        assert_eq!(KvKey::parse_input_name("inputs_embeds"), None);
        assert_eq!(KvKey::parse_input_name("past_key_values.0.cross.key"), None);
    }

    #[test]
    fn test_layout_orders_four_entries_per_layer() {
        let layout = KvLayout::new(6, 12, 64);
        assert_eq!(layout.len(), 24);
        let keys: Vec<_> = layout.keys().take(4).collect();
        assert_eq!(keys[0], KvKey::new(0, KvSide::Decoder, KvField::Key));
        assert_eq!(keys[3], KvKey::new(0, KvSide::Encoder, KvField::Value));
        assert_eq!(
            layout.index_of(KvKey::new(5, KvSide::Encoder, KvField::Key)),
            Some(22)
        );
        assert_eq!(
            layout.index_of(KvKey::new(6, KvSide::Decoder, KvField::Key)),
            None
        );
    }

    #[test]
    fn test_empty_cache_has_zero_sequence() {
        let layout = KvLayout::new(2, 12, 64);
        let cache = KvCache::empty(&layout);
        let entry = cache
            .get(&layout, KvKey::new(1, KvSide::Encoder, KvField::Key))
            .unwrap();
        assert_eq!(entry.shape(), &[1, 12, 0, 64]);
        assert_eq!(cache.decoder_seq_len(), 0);
    }

    #[test]
    fn test_from_outputs_reports_missing_entry() {
        let layout = KvLayout::new(1, 2, 4);
        let mut outputs = OrtOutputs::from_tensors(
            "decoder_model_merged",
            vec![(
                "present.0.decoder.key".to_string(),
                ArrayD::zeros(IxDyn(&[1, 2, 1, 4])),
            )],
        );
        let err = KvCache::from_outputs(&layout, &mut outputs, None).unwrap_err();
        assert!(matches!(
            err,
            OCRError::MissingCacheEntry { ref name } if name == "present.0.decoder.value"
        ));
    }

    #[test]
    fn test_from_outputs_rejects_wrong_head_count() {
        let layout = KvLayout::new(1, 2, 4);
        let tensors = layout
            .keys()
            .map(|key| (key.output_name(), ArrayD::zeros(IxDyn(&[1, 3, 1, 4]))))
            .collect();
        let mut outputs = OrtOutputs::from_tensors("decoder_model_merged", tensors);
        let err = KvCache::from_outputs(&layout, &mut outputs, None).unwrap_err();
        assert!(matches!(err, OCRError::TensorOperation { .. }));
    }

    #[test]
    fn test_from_outputs_shares_encoder_side_from_previous_cache() {
        let layout = KvLayout::new(1, 2, 4);
        let previous = KvCache::from_fn(&layout, |key| match key.side {
            KvSide::Decoder => ArrayD::zeros(IxDyn(&[1, 2, 1, 4])),
            KvSide::Encoder => ArrayD::from_elem(IxDyn(&[1, 2, 6, 4]), 3.0),
        });
        let tensors = layout
            .keys()
            .map(|key| {
                let shape: &[usize] = match key.side {
                    KvSide::Decoder => &[1, 2, 2, 4],
                    KvSide::Encoder => &[0, 2, 1, 4],
                };
                (key.output_name(), ArrayD::zeros(IxDyn(shape)))
            })
            .collect();
        let mut outputs = OrtOutputs::from_tensors("decoder_model_merged", tensors);

        let cache = KvCache::from_outputs(&layout, &mut outputs, Some(&previous)).unwrap();
        assert_eq!(cache.decoder_seq_len(), 2);
        for key in layout.keys().filter(|key| key.side == KvSide::Encoder) {
            let entry = cache.get(&layout, key).unwrap();
            assert!(std::ptr::eq(entry, previous.get(&layout, key).unwrap()));
        }
    }

    #[test]
    fn test_restore_encoder_only_touches_encoder_side() {
        let layout = KvLayout::new(2, 1, 1);
        let prefill = KvCache::from_fn(&layout, |_| ArrayD::from_elem(IxDyn(&[1, 1, 1, 1]), 1.0));
        let pinned = prefill.pin_encoder(&layout);
        assert_eq!(pinned.len(), 4);

        let mut step = KvCache::from_fn(&layout, |_| ArrayD::from_elem(IxDyn(&[1, 1, 2, 1]), 9.0));
        step.restore_encoder(&pinned);

        for key in layout.keys() {
            let value = step.get(&layout, key).unwrap();
            match key.side {
                KvSide::Encoder => {
                    assert_eq!(value.shape(), &[1, 1, 1, 1]);
                    assert!(std::ptr::eq(value, prefill.get(&layout, key).unwrap()));
                }
                KvSide::Decoder => {
                    assert_eq!(value.shape(), &[1, 1, 2, 1]);
                    assert!(value.iter().all(|&v| v == 9.0));
                }
            }
        }
        assert_eq!(step.decoder_seq_len(), 2);
    }
}
