//! Coverscan server and CLI
//!
//! Recognizes the text on a book cover and matches it against a book catalog,
//! either for a single image from the command line or over HTTP.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! coverscan-server analyze --file cover.jpg --model-dir models/florence-2-base-ft
//! coverscan-server analyze --url "https://example.com/cover.jpg" --output json
//! ```
//!
//! ## Server Mode
//! ```bash
//! coverscan-server serve --model-dir models/florence-2-base-ft --port 8000
//! ```

mod cli;
mod config;
mod ocr;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "coverscan-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Book cover analysis via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a single cover image
    Analyze {
        /// URL of the image to analyze
        #[arg(long, conflicts_with = "file", required_unless_present = "file")]
        url: Option<String>,

        /// Local file path of the image to analyze
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        #[command(flatten)]
        engine: config::EngineConfig,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,
    },
    /// Start the HTTP server
    Serve {
        #[command(flatten)]
        engine: config::EngineConfig,

        /// Port to listen on
        #[arg(long, short, default_value = "8000", env = "COVERSCAN_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "COVERSCAN_HOST")]
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    coverscan::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            url,
            file,
            engine,
            output,
        } => {
            if let Some(url) = url {
                info!("Processing URL: {}", url);
                cli::process_url(&url, &engine, &output).await?;
            } else if let Some(file) = file {
                info!("Processing file: {}", file.display());
                cli::process_file(&file, &engine, &output).await?;
            } else {
                eprintln!("Error: Either --url or --file must be provided");
                std::process::exit(1);
            }
        }
        Commands::Serve { engine, port, host } => {
            let config = config::ServerConfig { engine, host, port };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
