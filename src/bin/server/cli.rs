//! CLI mode: analyze one cover and print the result.

use crate::config::EngineConfig;
use crate::ocr::{build_analyzer, download_bytes};
use coverscan::domain::CoverAnalysisResponse;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Analyze an image downloaded from a URL
pub async fn process_url(
    url: &str,
    config: &EngineConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    info!("Downloading image from URL...");
    let bytes = download_bytes(url).await?;
    info!(
        "Downloaded {} bytes in {:.2}ms",
        bytes.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    process_bytes(&bytes, config, output_format).await
}

/// Analyze a local image file
pub async fn process_file(
    path: &Path,
    config: &EngineConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let bytes = tokio::fs::read(path).await?;
    info!("Read {} bytes from {}", bytes.len(), path.display());
    process_bytes(&bytes, config, output_format).await
}

async fn process_bytes(
    bytes: &[u8],
    config: &EngineConfig,
    output_format: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let init_start = Instant::now();
    let analyzer = build_analyzer(config)?;
    info!(
        "Engine initialized in {:.2}ms",
        init_start.elapsed().as_secs_f64() * 1000.0
    );

    let analysis_start = Instant::now();
    let response = analyzer.analyze(bytes).await;
    let analysis_ms = analysis_start.elapsed().as_secs_f64() * 1000.0;
    info!("Analysis completed in {:.2}ms", analysis_ms);

    output_result(&response, output_format, analysis_ms)
}

/// Output the analysis in the specified format
fn output_result(
    response: &CoverAnalysisResponse,
    format: &str,
    processing_time_ms: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string(response)?);
        }
        "text" => {
            if let Some(text) = &response.analysis.extracted_text {
                println!("{}", text);
            }
        }
        _ => print!("{}", render_pretty(response, processing_time_ms)),
    }

    Ok(())
}

fn render_pretty(response: &CoverAnalysisResponse, processing_time_ms: f64) -> String {
    let mut out = String::new();
    out.push_str("\n=== Cover Analysis ===\n");
    out.push_str(&format!("Processing time: {:.2}ms\n", processing_time_ms));

    if !response.analysis.is_success {
        out.push_str(&format!(
            "Failed: {}\n",
            response.analysis.error_message.as_deref().unwrap_or("unknown error")
        ));
        return out;
    }

    out.push_str(&format!(
        "Extracted text: {}\n",
        response.analysis.extracted_text.as_deref().unwrap_or("")
    ));

    if let Some(nlp) = &response.nlp_analysis {
        if let Some(title) = &nlp.detected_title {
            out.push_str(&format!("Title: {} ({:.0}%)\n", title, nlp.title_confidence * 100.0));
        }
        if let Some(author) = &nlp.detected_author {
            out.push_str(&format!(
                "Author: {} ({:.0}%)\n",
                author,
                nlp.author_confidence * 100.0
            ));
        }
    }

    out.push('\n');
    if response.matched_books.is_empty() {
        out.push_str("No matching books.\n");
    } else {
        out.push_str("--- Matches ---\n");
        for (idx, book) in response.matched_books.iter().enumerate() {
            let marker = if response.exact_match.as_ref() == Some(book) {
                " [exact]"
            } else {
                ""
            };
            out.push_str(&format!("[{}] {} by {}{}\n", idx + 1, book.title, book.author, marker));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverscan::domain::{AnalysisStatus, BookMatch, NlpAnalysis};

    #[test]
    fn test_render_pretty_marks_exact_match() {
        let gatsby = BookMatch::new("The Great Gatsby", "F. Scott Fitzgerald");
        let response = CoverAnalysisResponse {
            analysis: AnalysisStatus {
                is_success: true,
                error_message: None,
                extracted_text: Some("THE GREAT GATSBY".to_string()),
            },
            matched_books: vec![gatsby.clone()],
            exact_match: Some(gatsby),
            nlp_analysis: Some(NlpAnalysis::default()),
        };
        let rendered = render_pretty(&response, 12.0);
        assert!(rendered.contains("Extracted text: THE GREAT GATSBY"));
        assert!(rendered.contains("[1] The Great Gatsby by F. Scott Fitzgerald [exact]"));
    }

    #[test]
    fn test_render_pretty_failure() {
        let response = CoverAnalysisResponse::failure("OCR failed: boom");
        assert!(render_pretty(&response, 1.0).contains("Failed: OCR failed: boom"));
    }
}
