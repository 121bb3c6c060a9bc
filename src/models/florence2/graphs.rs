//! The four inference stages behind a single seam.
//!
//! [`Florence2Graphs`] is what the engine and the decode loop talk to;
//! [`OrtFlorence2Graphs`] backs it with ONNX Runtime sessions.

use super::config::{Florence2Config, ModelArtifacts};
use super::kv_cache::{KvCache, KvKey, KvLayout, KvSide};
use crate::core::OCRError;
use crate::core::inference::{
    NamedInputs, OrtInfer, OrtOutputs, bool_input, f32_view, i64_input,
};
use ndarray::{Array2, Array3, Array4, ArrayD, Ix3};
use std::borrow::Cow;

/// Inputs of one merged-decoder call.
#[derive(Debug, Clone, Copy)]
pub struct DecoderStep<'a> {
    /// Embedding of the newest token only, `[1, 1, D]`.
    pub inputs_embeds: &'a Array3<f32>,
    pub encoder_hidden_states: &'a Array3<f32>,
    pub encoder_attention_mask: &'a Array2<i64>,
    /// `false` selects the prefill branch, `true` the cached decode branch.
    pub use_cache_branch: bool,
    pub past: &'a KvCache,
}

/// Outputs of one merged-decoder call.
#[derive(Debug, Clone)]
pub struct DecoderOutput {
    /// `[1, T, vocab]`
    pub logits: Array3<f32>,
    pub present: KvCache,
}

/// Vision encoder, token embedding, cross encoder and merged decoder.
pub trait Florence2Graphs: Send + Sync {
    /// Cache layout the decoder consumes and produces.
    fn kv_layout(&self) -> &KvLayout;

    /// `[1, 3, H, W]` pixels to `[1, P, D]` visual features.
    fn encode_image(&self, pixel_values: &Array4<f32>) -> Result<Array3<f32>, OCRError>;

    /// `[1, T]` token ids to `[1, T, D]` embeddings.
    fn embed_tokens(&self, input_ids: &Array2<i64>) -> Result<Array3<f32>, OCRError>;

    /// Runs the cross encoder over concatenated visual and prompt embeddings.
    fn encode(
        &self,
        inputs_embeds: &Array3<f32>,
        attention_mask: &Array2<i64>,
    ) -> Result<Array3<f32>, OCRError>;

    fn decode(&self, step: DecoderStep<'_>) -> Result<DecoderOutput, OCRError>;
}

fn into_rank3(array: ArrayD<f32>, context: &str) -> Result<Array3<f32>, OCRError> {
    let shape = array.shape().to_vec();
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| OCRError::shape_mismatch("into_rank3", &[1, 0, 0], &shape, context))
}

/// ONNX Runtime sessions for the exported Florence-2 graphs.
#[derive(Debug)]
pub struct OrtFlorence2Graphs {
    vision_encoder: OrtInfer,
    embed_tokens: OrtInfer,
    encoder: OrtInfer,
    decoder: OrtInfer,
    kv_layout: KvLayout,
}

impl OrtFlorence2Graphs {
    /// Loads all four graphs.
    ///
    /// Every artifact is checked before any session is created, so a missing
    /// file fails fast without paying for the others.
    pub fn load(config: &Florence2Config) -> Result<Self, OCRError> {
        let artifacts = ModelArtifacts::resolve(&config.model_dir, &config.quantization);
        artifacts.verify()?;

        let cfg = &config.ort_session;
        let pool = config.session_pool_size;
        let vision_encoder =
            OrtInfer::from_config(cfg, &artifacts.vision_encoder, pool, "vision_encoder")?;
        let embed_tokens =
            OrtInfer::from_config(cfg, &artifacts.embed_tokens, pool, "embed_tokens")?;
        let encoder = OrtInfer::from_config(cfg, &artifacts.encoder_model, pool, "encoder_model")?;
        let decoder = OrtInfer::from_config(
            cfg,
            &artifacts.decoder_model_merged,
            pool,
            "decoder_model_merged",
        )?;

        let num_layers = discover_num_layers(decoder.input_names(), config.num_layers)?;
        let kv_layout = KvLayout::new(num_layers, config.num_heads, config.head_dim);

        tracing::info!(
            model_dir = %config.model_dir.display(),
            quantization = %config.quantization,
            num_layers,
            "Florence-2 graphs loaded"
        );

        Ok(Self {
            vision_encoder,
            embed_tokens,
            encoder,
            decoder,
            kv_layout,
        })
    }
}

/// Counts decoder layers from the declared `past_key_values.*` inputs.
///
/// A count that differs from `configured` is logged and the graph wins.
pub fn discover_num_layers(input_names: &[String], configured: usize) -> Result<usize, OCRError> {
    let discovered = input_names
        .iter()
        .filter_map(|name| KvKey::parse_input_name(name))
        .map(|key| key.layer + 1)
        .max()
        .unwrap_or(0);

    if discovered == 0 {
        return Err(OCRError::ConfigError {
            message: "decoder graph declares no past_key_values inputs".to_string(),
        });
    }
    if discovered != configured {
        tracing::warn!(
            configured,
            discovered,
            "decoder layer count differs from configuration; using the graph's"
        );
    }
    Ok(discovered)
}

/// Builds the decoder result from the graph outputs of `step`.
///
/// On the cached branch the encoder-side cache is taken from `step.past`;
/// the graph's own encoder-side outputs are not read.
fn assemble_decoder_output(
    layout: &KvLayout,
    mut outputs: OrtOutputs,
    step: &DecoderStep<'_>,
) -> Result<DecoderOutput, OCRError> {
    let logits = into_rank3(outputs.take("logits")?, "decoder logits")?;
    let carry = step.use_cache_branch.then_some(step.past);
    let present = KvCache::from_outputs(layout, &mut outputs, carry)?;
    Ok(DecoderOutput { logits, present })
}

fn is_encoder_present(name: &str) -> bool {
    KvKey::parse_output_name(name).is_some_and(|key| key.side == KvSide::Encoder)
}

impl Florence2Graphs for OrtFlorence2Graphs {
    fn kv_layout(&self) -> &KvLayout {
        &self.kv_layout
    }

    fn encode_image(&self, pixel_values: &Array4<f32>) -> Result<Array3<f32>, OCRError> {
        let inputs: NamedInputs<'_> = vec![(Cow::Borrowed("pixel_values"), f32_view(pixel_values)?)];
        let outputs = self
            .vision_encoder
            .run(inputs, pixel_values.shape(), "vision encoding")?;
        into_rank3(outputs.into_first()?, "vision_encoder output")
    }

    fn embed_tokens(&self, input_ids: &Array2<i64>) -> Result<Array3<f32>, OCRError> {
        let inputs: NamedInputs<'_> = vec![(Cow::Borrowed("input_ids"), i64_input(input_ids)?)];
        let outputs = self
            .embed_tokens
            .run(inputs, input_ids.shape(), "token embedding")?;
        into_rank3(outputs.into_first()?, "embed_tokens output")
    }

    fn encode(
        &self,
        inputs_embeds: &Array3<f32>,
        attention_mask: &Array2<i64>,
    ) -> Result<Array3<f32>, OCRError> {
        let inputs: NamedInputs<'_> = vec![
            (Cow::Borrowed("inputs_embeds"), f32_view(inputs_embeds)?),
            (Cow::Borrowed("attention_mask"), i64_input(attention_mask)?),
        ];
        let outputs = self
            .encoder
            .run(inputs, inputs_embeds.shape(), "cross encoding")?;
        into_rank3(outputs.into_first()?, "encoder_model output")
    }

    fn decode(&self, step: DecoderStep<'_>) -> Result<DecoderOutput, OCRError> {
        let mut inputs: NamedInputs<'_> = vec![
            (Cow::Borrowed("inputs_embeds"), f32_view(step.inputs_embeds)?),
            (
                Cow::Borrowed("encoder_hidden_states"),
                f32_view(step.encoder_hidden_states)?,
            ),
            (
                Cow::Borrowed("encoder_attention_mask"),
                i64_input(step.encoder_attention_mask)?,
            ),
            (
                Cow::Borrowed("use_cache_branch"),
                bool_input(step.use_cache_branch)?,
            ),
        ];
        inputs.extend(step.past.to_inputs(&self.kv_layout)?);

        let input_shape = step.inputs_embeds.shape();
        let outputs = if step.use_cache_branch {
            self.decoder
                .run_selected(inputs, input_shape, "decode step", |name| {
                    !is_encoder_present(name)
                })?
        } else {
            self.decoder.run(inputs, input_shape, "prefill")?
        };

        assemble_decoder_output(&self.kv_layout, outputs, &step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(layers: usize) -> Vec<String> {
        let mut names = vec![
            "inputs_embeds".to_string(),
            "encoder_hidden_states".to_string(),
            "encoder_attention_mask".to_string(),
        ];
        names.extend(KvLayout::new(layers, 12, 64).keys().map(|k| k.input_name()));
        names.push("use_cache_branch".to_string());
        names
    }

    #[test]
    fn test_discover_num_layers() {
        assert_eq!(discover_num_layers(&names(6), 6).unwrap(), 6);
        assert_eq!(discover_num_layers(&names(12), 6).unwrap(), 12);
    }

    #[test]
    fn test_discover_without_cache_inputs_fails() {
        let names = vec!["inputs_embeds".to_string(), "logits".to_string()];
        assert!(discover_num_layers(&names, 6).is_err());
    }

    fn decoder_outputs(layout: &KvLayout, encoder_shape: Option<[usize; 4]>) -> OrtOutputs {
        let mut tensors = vec![(
            "logits".to_string(),
            ArrayD::zeros(ndarray::IxDyn(&[1, 1, 8])),
        )];
        for key in layout.keys() {
            let shape = match (key.side, encoder_shape) {
                (KvSide::Decoder, _) => [1, layout.num_heads(), 2, layout.head_dim()],
                (KvSide::Encoder, Some(shape)) => shape,
                (KvSide::Encoder, None) => continue,
            };
            tensors.push((key.output_name(), ArrayD::zeros(ndarray::IxDyn(&shape))));
        }
        OrtOutputs::from_tensors("decoder_model_merged", tensors)
    }

    #[test]
    fn test_cached_step_ignores_placeholder_encoder_outputs() {
        let layout = KvLayout::new(2, 2, 3);
        let past = KvCache::from_fn(&layout, |key| match key.side {
            KvSide::Decoder => ArrayD::zeros(ndarray::IxDyn(&[1, 2, 1, 3])),
            KvSide::Encoder => ArrayD::from_elem(ndarray::IxDyn(&[1, 2, 5, 3]), 7.0),
        });
        let embeds = Array3::<f32>::zeros((1, 1, 4));
        let hidden = Array3::<f32>::zeros((1, 5, 4));
        let mask = Array2::<i64>::ones((1, 5));
        let step = DecoderStep {
            inputs_embeds: &embeds,
            encoder_hidden_states: &hidden,
            encoder_attention_mask: &mask,
            use_cache_branch: true,
            past: &past,
        };

        // Placeholder outputs as exported, and outputs skipped at run time.
        for encoder_shape in [Some([0, 2, 1, 3]), None] {
            let outputs = decoder_outputs(&layout, encoder_shape);
            let output = assemble_decoder_output(&layout, outputs, &step).unwrap();
            assert_eq!(output.logits.shape(), &[1, 1, 8]);
            assert_eq!(output.present.decoder_seq_len(), 2);
            for key in layout.keys().filter(|key| key.side == KvSide::Encoder) {
                let entry = output.present.get(&layout, key).unwrap();
                assert_eq!(entry.shape(), &[1, 2, 5, 3]);
                assert!(entry.iter().all(|&v| v == 7.0));
            }
        }
    }

    #[test]
    fn test_prefill_validates_encoder_outputs() {
        let layout = KvLayout::new(2, 2, 3);
        let past = KvCache::empty(&layout);
        let embeds = Array3::<f32>::zeros((1, 1, 4));
        let hidden = Array3::<f32>::zeros((1, 5, 4));
        let mask = Array2::<i64>::ones((1, 5));
        let step = DecoderStep {
            inputs_embeds: &embeds,
            encoder_hidden_states: &hidden,
            encoder_attention_mask: &mask,
            use_cache_branch: false,
            past: &past,
        };

        let outputs = decoder_outputs(&layout, Some([0, 2, 1, 3]));
        let err = assemble_decoder_output(&layout, outputs, &step).unwrap_err();
        assert!(matches!(err, OCRError::TensorOperation { .. }));

        let outputs = decoder_outputs(&layout, Some([1, 2, 5, 3]));
        let output = assemble_decoder_output(&layout, outputs, &step).unwrap();
        let pinned = output.present.pin_encoder(&layout);
        assert_eq!(pinned.len(), 4);
    }

    #[test]
    fn test_encoder_present_names() {
        assert!(is_encoder_present("present.0.encoder.key"));
        assert!(!is_encoder_present("present.0.decoder.value"));
        assert!(!is_encoder_present("logits"));
    }

    #[test]
    fn test_load_fails_on_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = Florence2Config::new(dir.path());
        let err = OrtFlorence2Graphs::load(&config).unwrap_err();
        assert!(matches!(err, OCRError::ModelLoad { .. }));
        assert!(err.to_string().contains("vision_encoder_q4.onnx"));
    }
}
