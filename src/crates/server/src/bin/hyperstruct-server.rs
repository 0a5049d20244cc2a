//! Server binary.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use server::{create_router, AppState};

#[derive(Parser, Debug)]
#[command(name = "hyperstruct-server", about = "Spatiotemporal hypergraph ingestion API")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "HYPERSTRUCT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "HYPERSTRUCT_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let app = create_router(AppState::new());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
