use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use quilt_viewer::config::Configuration;
use quilt_viewer::events::{LoadSources, QuiltsComplete, SourcesLoaded, SyncMessage};
use quilt_viewer::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "quilt-viewer",
    version,
    about = "depth-displacement viewer with quilt capture"
)]
struct Args {
    /// Path to YAML config; defaults apply when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Override the sync channel listen address
    #[arg(long = "listen", value_name = "ADDR")]
    listen: Option<SocketAddr>,
    /// Override the viewer correlation id
    #[arg(long = "id", value_name = "ID")]
    viewer_id: Option<String>,
    /// Override the image API base URL
    #[arg(long = "api-url", value_name = "URL")]
    api_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls the level, default = info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(listen) = args.listen {
        cfg.listen_addr = listen;
    }
    if let Some(id) = args.viewer_id {
        cfg.viewer_id = id;
    }
    if let Some(url) = args.api_url {
        cfg.api_url = Some(url);
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    tracing::info!(
        listen = %cfg.listen_addr,
        viewer_id = %cfg.viewer_id,
        "configuration loaded"
    );

    // Channels (small/bounded)
    let (sync_tx, sync_rx) = mpsc::channel::<SyncMessage>(32); // Control -> Viewer
    let (load_tx, load_rx) = mpsc::channel::<LoadSources>(4); // Viewer -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<SourcesLoaded>(2); // Loader -> Viewer
    let (complete_tx, complete_rx) = mpsc::channel::<QuiltsComplete>(4); // Viewer -> Control

    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let mut background = JoinSet::new();

    background.spawn({
        let listen_addr = cfg.listen_addr;
        let sync_tx = sync_tx.clone();
        let cancel = cancel.clone();
        async move {
            tasks::control::run(listen_addr, sync_tx, complete_rx, cancel)
                .await
                .context("sync channel task failed")
        }
    });

    background.spawn({
        let loaded_tx = loaded_tx.clone();
        let cancel = cancel.clone();
        async move {
            tasks::loader::run(load_rx, loaded_tx, cancel)
                .await
                .context("loader task failed")
        }
    });

    // Run the windowed viewer on the main thread; returns when the window
    // closes or cancellation fires.
    if let Err(err) = tasks::viewer::run_windowed(
        cfg.clone(),
        cancel.clone(),
        sync_rx,
        load_tx,
        loaded_rx,
        complete_tx,
    )
    .context("viewer failed")
    {
        tracing::error!("{err:?}");
    }
    cancel.cancel();

    while let Some(res) = background.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
