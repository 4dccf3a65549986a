//! Mural CLI
//!
//! Live-update client for masonry stream feeds, plus the development
//! stream server and a publisher command.

mod client;
mod logging;
mod render;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8360";

#[derive(Parser)]
#[command(name = "mural")]
#[command(about = "Live updates for masonry feeds", long_about = None)]
struct Cli {
    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format: text or json
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a stream and load new posts on request
    Watch {
        /// Stream identifier; without one there is nothing to watch
        #[arg(env = "MURAL_STREAM")]
        stream: Option<String>,

        /// Server base URL
        #[arg(long, env = "MURAL_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Run the in-memory development stream server
    Serve {
        /// Listen address
        #[arg(long, default_value = "127.0.0.1:8360")]
        listen: String,
    },
    /// Publish a post to a stream
    Post {
        /// Stream identifier
        #[arg(env = "MURAL_STREAM")]
        stream: String,

        /// Post text; read from stdin when omitted
        text: Option<String>,

        /// Server base URL
        #[arg(long, env = "MURAL_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    let result = match cli.command {
        Commands::Watch { stream, server } => handle_watch(stream, &server).await,
        Commands::Serve { listen } => server::run_serve(&listen).await,
        Commands::Post {
            stream,
            text,
            server,
        } => handle_post(&stream, text, &server).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn handle_watch(stream: Option<String>, server: &str) -> Result<()> {
    let Some(stream) = stream else {
        // No stream configured for this page of the feed; nothing to do.
        tracing::info!("no stream id configured, exiting");
        return Ok(());
    };
    client::run_watch(server, &stream).await
}

async fn handle_post(stream: &str, text: Option<String>, server: &str) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            use tokio::io::AsyncReadExt;
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("read post text from stdin")?;
            buf
        }
    };

    let url = format!(
        "{}/api/streams/{}/items",
        server.trim_end_matches('/'),
        stream
    );
    let response = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "text": text }))
        .send()
        .await
        .with_context(|| format!("post to {url}"))?
        .error_for_status()
        .context("server rejected the post")?;

    let body: serde_json::Value = response.json().await.context("decode publish response")?;
    println!("{}", body["id"]);
    Ok(())
}
