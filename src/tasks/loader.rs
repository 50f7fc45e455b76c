//! Source image loader.
//!
//! Resolves color/depth reference pairs against the host API, decodes them
//! to RGBA8 off the async threads, and hands the pair to the viewer. A
//! failed fetch or decode is logged and dropped; the viewer keeps showing
//! the previous surface.

use anyhow::{Context, Result};
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::events::{ImageRef, LoadSources, PreparedImageCpu, SourcesLoaded};

fn image_url(api_url: &str) -> String {
    format!("{}/view", api_url.trim_end_matches('/'))
}

async fn fetch_bytes(
    client: &reqwest::Client,
    api_url: &str,
    image: &ImageRef,
) -> Result<Vec<u8>> {
    let mut query: Vec<(&str, &str)> = vec![("filename", image.filename.as_str())];
    if let Some(subfolder) = image.subfolder.as_deref() {
        query.push(("subfolder", subfolder));
    }
    if let Some(kind) = image.kind.as_deref() {
        query.push(("type", kind));
    }
    let response = client
        .get(image_url(api_url))
        .query(&query)
        .send()
        .await
        .with_context(|| format!("requesting {}", image.filename))?
        .error_for_status()
        .with_context(|| format!("fetching {}", image.filename))?;
    Ok(response.bytes().await?.to_vec())
}

fn decode_rgba8(bytes: &[u8]) -> Result<PreparedImageCpu> {
    let img = image::load_from_memory(bytes)
        .context("decoding image")?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(PreparedImageCpu {
        width,
        height,
        pixels: img.into_raw(),
    })
}

async fn load_pair(client: &reqwest::Client, request: &LoadSources) -> Result<SourcesLoaded> {
    let (color_bytes, depth_bytes) = tokio::try_join!(
        fetch_bytes(client, &request.api_url, &request.reference_image),
        fetch_bytes(client, &request.api_url, &request.depth_map),
    )?;

    // Decoding is CPU-bound; keep it off the async workers.
    let generation = request.generation;
    tokio::task::spawn_blocking(move || {
        let color = decode_rgba8(&color_bytes).context("decoding reference image")?;
        let depth = decode_rgba8(&depth_bytes).context("decoding depth map")?;
        Ok(SourcesLoaded {
            color,
            depth,
            generation,
        })
    })
    .await
    .context("decode task aborted")?
}

pub async fn run(
    mut load_rx: Receiver<LoadSources>,
    to_viewer: Sender<SourcesLoaded>,
    cancel: CancellationToken,
) -> Result<()> {
    let client = reqwest::Client::builder()
        .build()
        .context("building HTTP client")?;

    loop {
        select! {
            _ = cancel.cancelled() => break,
            request = load_rx.recv() => {
                let Some(mut request) = request else { break };
                // Only the newest queued pair matters; older ones would be
                // discarded by the viewer anyway.
                while let Ok(newer) = load_rx.try_recv() {
                    debug!(generation = request.generation, "superseded by newer load request");
                    request = newer;
                }
                match load_pair(&client, &request).await {
                    Ok(loaded) => {
                        debug!(
                            generation = loaded.generation,
                            width = loaded.color.width,
                            height = loaded.color.height,
                            "source pair ready"
                        );
                        if to_viewer.send(loaded).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(
                            reference = %request.reference_image.filename,
                            depth = %request.depth_map.filename,
                            error = %err,
                            "failed to load source pair; keeping current surface"
                        );
                    }
                }
            }
        }
    }
    Ok(())
}
