//! ijwi CLI — text-to-speech HTTP service.
//!
//! ```text
//! ijwi serve [--host 0.0.0.0] [--port 8000] [--model facebook/mms-tts-kin]
//! ijwi say "Muraho" [--server http://localhost:8000] [--out tts.wav]
//! ijwi health [--server http://localhost:8000]
//! ```
//!
//! `serve` reads its defaults from the environment (`TTS_MODEL_NAME`, `HOST`,
//! `PORT`, ...); flags win over the environment.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use ijwi_lib::ijwi_core::types::{LogFormat, SynthesisRequest};
use ijwi_lib::service::SpeechService;

/// ijwi — text-to-speech over HTTP
#[derive(Parser)]
#[command(name = "ijwi", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the model and start the HTTP service
    Serve {
        /// Listen host (overrides HOST)
        #[arg(long)]
        host: Option<String>,
        /// Listen port (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Hub repo id or local model directory (overrides TTS_MODEL_NAME)
        #[arg(long)]
        model: Option<String>,
    },
    /// Synthesize text on a running server and save the WAV
    Say {
        /// Text to speak
        text: String,
        /// Server URL
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
        /// Output file
        #[arg(long, short, default_value = "tts.wav")]
        out: PathBuf,
    },
    /// Query a running server's health
    Health {
        #[arg(long, default_value = "http://localhost:8000")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, model } => {
            let mut config = ijwi_lib::config::from_env().context("invalid configuration")?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(model) = model {
                config.model_name = model;
            }
            init_logging(config.log_format);

            // Load before binding.
            let service = Arc::new(SpeechService::load(&config).await);
            let app = ijwi_lib::server::router(service);

            let addr = config.listen_addr();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))?;
            info!(%addr, version = env!("CARGO_PKG_VERSION"), "ijwi listening");

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("server error")?;
            info!("server shutdown complete");
        }

        Command::Say { text, server, out } => {
            let resp = reqwest::Client::new()
                .post(format!("{server}/tts"))
                .json(&SynthesisRequest { text })
                .send()
                .await
                .context("request failed")?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                bail!("server returned {status}: {body}");
            }

            let wav = resp.bytes().await.context("failed to read audio")?;
            tokio::fs::write(&out, &wav)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("wrote {} bytes to {}", wav.len(), out.display());
        }

        Command::Health { server } => {
            let resp = reqwest::Client::new()
                .get(format!("{server}/health"))
                .send()
                .await
                .context("request failed")?;
            let body: serde_json::Value = resp.json().await.context("invalid health response")?;
            println!("{body}");
        }
    }

    Ok(())
}

fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ijwi=debug,ijwi_lib=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
    }
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
