#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod config;
mod handlers;
mod service;
mod state;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use quiver_rpc::{Server, ServerOptions};

use crate::config::GlobalConfig;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "JSON-RPC services for chat, embeddings and vector search")]
struct Args {
    /// Unix domain socket path to serve from instead of stdio.
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Path to a configuration file. When unset, an optional default file
    /// in the home directory is tried.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ID of the default client, overriding the config file.
    #[arg(long)]
    default: Option<String>,

    /// Database repack trigger percentage.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=100))]
    repack: u32,

    /// Vector scratch buffer size.
    #[arg(long, default_value_t = 4096)]
    vectorbuf: usize,

    /// Audio buffer preallocation size in bytes.
    #[arg(long, default_value_t = 2 * 1024 * 1024, value_parser = parse_audio_buf)]
    audiobuf: usize,
}

fn parse_audio_buf(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("{e}"))?;
    if n < 100_000 {
        return Err("audio buffer size must be at least 100000".to_string());
    }
    Ok(n)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // stdout carries the RPC frames, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    quiver_vectors::init_pool(args.vectorbuf);

    let file = config::read_config_files(args.config.as_deref())?;

    let app = Arc::new(AppState::new(GlobalConfig {
        repack_percent: args.repack,
        audio_buf_size: args.audiobuf,
    }));

    config::init_clients(&app, file, args.default.as_deref())?;

    serve(app, args.socket).await
}

async fn serve(app: Arc<AppState>, socket: Option<PathBuf>) -> anyhow::Result<()> {
    let server = Arc::new(Server::with_options(
        service::handler(),
        ServerOptions::default(),
    ));

    let Some(path) = socket else {
        return Ok(server
            .run(app.session(), tokio::io::stdin(), tokio::io::stdout())
            .await?);
    };

    // Remove a stale socket from a previous run before binding.
    let _ = std::fs::remove_file(&path);
    let listener = tokio::net::UnixListener::bind(&path)?;
    tracing::info!(path = %path.display(), "serving on unix socket");

    loop {
        let (stream, _) = listener.accept().await?;

        let server = Arc::clone(&server);
        let state = app.session();

        tokio::spawn(async move {
            let (read, write) = stream.into_split();
            if let Err(e) = server.run(state, read, write).await {
                tracing::warn!("session ended with error: {e}");
            }
        });
    }
}
