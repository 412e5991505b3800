use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use snapcad::config::{ApiConfig, SnapcadConfig};
use snapcad::server::{self, GeneratorKind, RelayGenerator, StaticModelGenerator};
use snapcad::ModelClient;

#[derive(Parser)]
#[command(name = "snapcad-server")]
#[command(about = "Image-to-3D generation service (/generate3d, /health)", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file; defaults to the per-user snapcad config
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:5500
    #[arg(long)]
    bind: Option<String>,

    /// GLB asset to serve for every request
    #[arg(long, conflicts_with = "upstream")]
    demo_asset: Option<PathBuf>,

    /// Relay requests to another generation service at this base URL
    #[arg(long)]
    upstream: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    snapcad::init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => SnapcadConfig::load(path)?,
        None => SnapcadConfig::load_default()?,
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    if let Some(asset) = cli.demo_asset {
        config.server.demo_asset = Some(asset);
        config.server.upstream = None;
    }
    if let Some(upstream) = cli.upstream {
        config.server.upstream = Some(upstream);
    }

    let generator = match (&config.server.upstream, &config.server.demo_asset) {
        (Some(upstream), _) => {
            let client = ModelClient::new(&ApiConfig::new(upstream.as_str()))?;
            GeneratorKind::Relay(RelayGenerator::new(client))
        }
        (None, Some(asset)) => GeneratorKind::Static(StaticModelGenerator::from_path(asset)?),
        (None, None) => {
            info!("No model asset configured, serving the built-in demo model");
            GeneratorKind::Static(StaticModelGenerator::demo())
        }
    };

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutting down");
        trigger.cancel();
    });

    server::serve_until(listener, generator, shutdown).await?;
    Ok(())
}
