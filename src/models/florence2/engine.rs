//! Florence-2 OCR engine over ONNX Runtime.
//!
//! One request runs four stages in order: the vision encoder turns the
//! resized image into visual tokens, the prompt is embedded and concatenated
//! after them, the cross encoder runs once over that sequence, and the merged
//! decoder generates location-annotated text that is parsed into regions.

use super::config::{DEFAULT_EOS_TOKEN_ID, Florence2Config};
use super::decoder::GreedyDecoder;
use super::graphs::{Florence2Graphs, OrtFlorence2Graphs};
use super::preprocess::Florence2Preprocessor;
use crate::core::traits::OcrEngine;
use crate::core::{OCRError, ProcessingStage};
use crate::domain::OcrResult;
use crate::processors::{
    OcrWithRegionParser, TaskPostProcessor, build_ocr_result, quad_extent,
};
use crate::utils::load_image_from_bytes;
use async_trait::async_trait;
use image::RgbImage;
use ndarray::{Array2, Array3, Axis, concatenate};
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

/// OCR engine backed by the exported Florence-2 graphs.
///
/// Cloning is cheap; sessions and the tokenizer are shared.
#[derive(Clone)]
pub struct Florence2OnnxEngine {
    graphs: Arc<dyn Florence2Graphs>,
    tokenizer: Arc<Tokenizer>,
    task: Arc<dyn TaskPostProcessor>,
    preprocessor: Florence2Preprocessor,
    decoder: GreedyDecoder,
}

impl std::fmt::Debug for Florence2OnnxEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Florence2OnnxEngine")
            .field("task", &self.task.task_token())
            .field("image_size", &self.preprocessor.image_size())
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl Florence2OnnxEngine {
    /// Loads the tokenizer and all four graphs described by `config`.
    pub fn new(config: &Florence2Config) -> Result<Self, OCRError> {
        config.validate()?;

        let tokenizer_path = config.tokenizer_file();
        if !tokenizer_path.is_file() {
            return Err(OCRError::config_error_with_suggestion(
                "model loading",
                format!("tokenizer not found at '{}'", tokenizer_path.display()),
                "pass --tokenizer or place tokenizer.json in the model directory",
            ));
        }
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|err| {
            OCRError::ConfigError {
                message: format!(
                    "Failed to load tokenizer from {:?}: {}",
                    tokenizer_path, err
                ),
            }
        })?;

        let graphs = OrtFlorence2Graphs::load(config)?;
        Ok(Self::from_parts(Arc::new(graphs), tokenizer, config))
    }

    /// Assembles an engine from already loaded parts.
    pub fn from_parts(
        graphs: Arc<dyn Florence2Graphs>,
        tokenizer: Tokenizer,
        config: &Florence2Config,
    ) -> Self {
        let eos_token_id = tokenizer
            .token_to_id("</s>")
            .map(i64::from)
            .unwrap_or(DEFAULT_EOS_TOKEN_ID);

        Self {
            graphs,
            tokenizer: Arc::new(tokenizer),
            task: Arc::new(OcrWithRegionParser::new()),
            preprocessor: Florence2Preprocessor::new(config.image_size),
            decoder: GreedyDecoder::new(eos_token_id, config.max_new_tokens),
        }
    }

    /// Replaces the task parser.
    pub fn with_task(mut self, task: Arc<dyn TaskPostProcessor>) -> Self {
        self.task = task;
        self
    }

    fn prompt_ids(&self) -> Result<Array2<i64>, OCRError> {
        let encoding = self
            .tokenizer
            .encode(self.task.prompt(), true)
            .map_err(|source| OCRError::Processing {
                kind: ProcessingStage::Preprocessing,
                context: format!("tokenizing prompt for {}", self.task.task_token()),
                source,
            })?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
        let len = ids.len();
        Ok(Array2::from_shape_vec((1, len), ids)?)
    }

    fn decode_text(&self, tokens: &[i64]) -> Result<String, OCRError> {
        let ids = tokens
            .iter()
            .map(|&id| {
                u32::try_from(id).map_err(|_| OCRError::InvalidInput {
                    message: format!("generated token id {id} is outside the vocabulary"),
                })
            })
            .collect::<Result<Vec<u32>, _>>()?;
        self.tokenizer
            .decode(&ids, false)
            .map_err(|source| OCRError::Processing {
                kind: ProcessingStage::PostProcessing,
                context: "decoding generated tokens".to_string(),
                source,
            })
    }

    /// Runs the full pipeline on a decoded image. Blocks the calling thread.
    pub fn recognize(&self, image: &RgbImage) -> Result<OcrResult, OCRError> {
        let started = Instant::now();

        let pixel_values = self.preprocessor.apply(image);
        let visual = self
            .graphs
            .encode_image(&pixel_values)
            .map_err(at_stage(ProcessingStage::VisionEncoding, "vision_encoder"))?;

        let prompt_ids = self.prompt_ids()?;
        let prompt_embeds = self
            .graphs
            .embed_tokens(&prompt_ids)
            .map_err(at_stage(ProcessingStage::TokenEmbedding, "prompt embedding"))?;
        let (inputs_embeds, attention_mask) = concat_encoder_inputs(&visual, &prompt_embeds)?;
        let encoder_hidden = self
            .graphs
            .encode(&inputs_embeds, &attention_mask)
            .map_err(at_stage(ProcessingStage::Encoding, "encoder_model"))?;
        let encoded_at = started.elapsed();

        let tokens = self
            .decoder
            .generate(self.graphs.as_ref(), &encoder_hidden, &attention_mask)
            .map_err(at_stage(ProcessingStage::Decoding, "greedy generation"))?;
        let decoded_at = started.elapsed();

        let text = self.decode_text(&tokens)?;
        let parsed = self.task.parse(&text, image.dimensions());
        for (label, quad) in parsed.labels.iter().zip(&parsed.quad_boxes) {
            let (x_min, y_min, x_max, y_max) = quad_extent(quad);
            tracing::debug!(label = %label, x_min, y_min, x_max, y_max, "region");
        }
        let result = build_ocr_result(parsed);

        tracing::info!(
            regions = result.regions.len(),
            tokens = tokens.len(),
            encode_ms = encoded_at.as_millis() as u64,
            decode_ms = (decoded_at - encoded_at).as_millis() as u64,
            "Florence-2 OCR finished"
        );

        Ok(result)
    }
}

fn at_stage(stage: ProcessingStage, context: &'static str) -> impl FnOnce(OCRError) -> OCRError {
    move |source| OCRError::processing(stage, context, source)
}

/// Appends prompt embeddings after the visual tokens and builds an all-ones mask.
pub fn concat_encoder_inputs(
    visual: &Array3<f32>,
    prompt: &Array3<f32>,
) -> Result<(Array3<f32>, Array2<i64>), OCRError> {
    let (v, p) = (visual.shape(), prompt.shape());
    if v[0] != 1 || p[0] != 1 || v[2] != p[2] {
        return Err(OCRError::shape_mismatch(
            "concat_encoder_inputs",
            &[1, p[1], v[2]],
            p,
            "prompt embeddings vs visual features",
        ));
    }

    let combined = concatenate(Axis(1), &[visual.view(), prompt.view()])?;
    let mask = Array2::<i64>::ones((1, combined.shape()[1]));
    Ok((combined, mask))
}

#[async_trait]
impl OcrEngine for Florence2OnnxEngine {
    fn name(&self) -> &str {
        "florence2-onnx"
    }

    async fn extract_text(&self, image_data: &[u8]) -> Result<OcrResult, OCRError> {
        let image = load_image_from_bytes(image_data)?;
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.recognize(&image))
            .await
            .map_err(|e| OCRError::processing(ProcessingStage::TaskDispatch, "inference worker", e))?
    }
}
