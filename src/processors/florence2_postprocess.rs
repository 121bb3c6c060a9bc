//! Parsing of Florence-2 generations into OCR regions.
//!
//! The model emits text interleaved with location tokens `<loc_N>`, each an
//! index into 1000 bins along one image axis. For the region OCR task every
//! label is followed by eight such tokens: the four corners of its
//! quadrilateral as `x1 y1 x2 y2 x3 y3 x4 y4`.

use crate::domain::{OcrRegion, OcrResult};
use crate::processors::Point;
use once_cell::sync::Lazy;
use regex::Regex;

/// Number of quantization bins per image axis.
pub const DEFAULT_NUM_BINS: u32 = 1000;

/// Special tokens removed before parsing.
const STRIPPED_TOKENS: [&str; 3] = ["<s>", "</s>", "<pad>"];

static QUAD_REGION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(.+?)<loc_(\d+)><loc_(\d+)><loc_(\d+)><loc_(\d+)><loc_(\d+)><loc_(\d+)><loc_(\d+)><loc_(\d+)>")
        .expect("region pattern is a valid regex")
});

/// Labels and quadrilaterals recovered from one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRegions {
    pub labels: Vec<String>,
    pub quad_boxes: Vec<[Point; 4]>,
}

/// Task-specific parser for decoded generations.
pub trait TaskPostProcessor: Send + Sync {
    /// Task token that selects this parser.
    fn task_token(&self) -> &'static str;

    /// Natural-language prompt the task token expands to.
    fn prompt(&self) -> &'static str;

    /// Parses decoded text for an image of `image_size` (width, height) pixels.
    fn parse(&self, text: &str, image_size: (u32, u32)) -> ParsedRegions;
}

/// Parser for `<OCR_WITH_REGION>` generations.
#[derive(Debug, Clone, Copy)]
pub struct OcrWithRegionParser {
    num_bins: u32,
}

impl OcrWithRegionParser {
    pub fn new() -> Self {
        Self {
            num_bins: DEFAULT_NUM_BINS,
        }
    }

    /// Maps a bin index to the pixel coordinate at the center of that bin.
    fn dequantize(&self, bin: u32, size: u32) -> f32 {
        (bin as f32 + 0.5) * size as f32 / self.num_bins as f32
    }
}

impl Default for OcrWithRegionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPostProcessor for OcrWithRegionParser {
    fn task_token(&self) -> &'static str {
        "<OCR_WITH_REGION>"
    }

    fn prompt(&self) -> &'static str {
        "What is the text in the image, with regions?"
    }

    fn parse(&self, text: &str, image_size: (u32, u32)) -> ParsedRegions {
        let (width, height) = image_size;
        let mut cleaned = text.to_string();
        for token in STRIPPED_TOKENS {
            cleaned = cleaned.replace(token, "");
        }

        let mut parsed = ParsedRegions::default();
        for caps in QUAD_REGION_REGEX.captures_iter(&cleaned) {
            let mut bins = [0u32; 8];
            let mut valid = true;
            for (i, bin) in bins.iter_mut().enumerate() {
                match caps[i + 2].parse::<u32>() {
                    Ok(value) => *bin = value,
                    Err(_) => {
                        valid = false;
                        break;
                    }
                }
            }
            if !valid {
                continue;
            }

            let quad = [0, 1, 2, 3].map(|corner| {
                Point::new(
                    self.dequantize(bins[corner * 2], width),
                    self.dequantize(bins[corner * 2 + 1], height),
                )
            });

            parsed.labels.push(caps[1].trim().to_string());
            parsed.quad_boxes.push(quad);
        }

        parsed
    }
}

/// Turns parsed labels and quadrilaterals into an OCR result.
///
/// Confidence is fixed at 1.0 because the generator exposes no per-region
/// score. Lists of unequal length are paired up to the shorter one.
pub fn build_ocr_result(parsed: ParsedRegions) -> OcrResult {
    let regions = parsed
        .labels
        .into_iter()
        .zip(parsed.quad_boxes)
        .map(|(label, quad)| OcrRegion::from_quad(label, 1.0, quad))
        .collect();
    OcrResult::from_regions(regions)
}
