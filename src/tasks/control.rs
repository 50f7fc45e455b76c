//! Parameter sync channel.
//!
//! Speaks newline-delimited JSON with the embedding host over TCP: one
//! inbound `SyncMessage` per line, outbound `quiltsComplete` batches fanned
//! out to every connected host. A malformed line is logged and discarded
//! without disturbing the connection.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::events::{QuiltsComplete, SyncMessage};

pub async fn run(
    listen_addr: SocketAddr,
    to_viewer: Sender<SyncMessage>,
    complete_rx: Receiver<QuiltsComplete>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("binding sync channel to {listen_addr}"))?;
    info!(addr = %listen_addr, "sync channel listening");
    serve(listener, to_viewer, complete_rx, cancel).await
}

pub async fn serve(
    listener: TcpListener,
    to_viewer: Sender<SyncMessage>,
    mut complete_rx: Receiver<QuiltsComplete>,
    cancel: CancellationToken,
) -> Result<()> {
    let (outbound, _) = broadcast::channel::<String>(16);
    let mut connections = JoinSet::new();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            Some(batch) = complete_rx.recv() => {
                match serde_json::to_string(&batch) {
                    Ok(line) => {
                        if outbound.send(line).is_err() {
                            debug!("no host connected; quilt batch not delivered");
                        }
                    }
                    Err(err) => error!(error = %err, "failed to encode quilt batch"),
                }
            }

            accepted = listener.accept() => {
                let (stream, peer) = accepted.context("accepting sync connection")?;
                info!(%peer, "host connected");
                connections.spawn(serve_connection(
                    stream,
                    peer,
                    to_viewer.clone(),
                    outbound.subscribe(),
                    cancel.clone(),
                ));
            }

            Some(finished) = connections.join_next() => {
                if let Err(err) = finished {
                    debug!(error = %err, "sync connection task aborted");
                }
            }
        }
    }
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    to_viewer: Sender<SyncMessage>,
    mut outbound: broadcast::Receiver<String>,
    cancel: CancellationToken,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    loop {
        select! {
            _ = cancel.cancelled() => break,

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<SyncMessage>(line) {
                            Ok(msg) => {
                                debug!(%peer, ?msg, "sync message received");
                                if to_viewer.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(%peer, error = %err, "discarding malformed sync message");
                            }
                        }
                    }
                    Ok(None) => {
                        info!(%peer, "host disconnected");
                        break;
                    }
                    Err(err) => {
                        warn!(%peer, error = %err, "sync channel read failed");
                        break;
                    }
                }
            }

            batch = outbound.recv() => {
                match batch {
                    Ok(mut line) => {
                        line.push('\n');
                        if writer.write_all(line.as_bytes()).await.is_err() {
                            warn!(%peer, "failed to deliver quilt batch; closing connection");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%peer, skipped, "host fell behind; outbound batches dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    async fn start_server() -> (
        SocketAddr,
        mpsc::Receiver<SyncMessage>,
        mpsc::Sender<QuiltsComplete>,
        CancellationToken,
    ) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (to_viewer, viewer_rx) = mpsc::channel(16);
        let (complete_tx, complete_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        tokio::spawn(serve(listener, to_viewer, complete_rx, cancel.clone()));
        (addr, viewer_rx, complete_tx, cancel)
    }

    #[tokio::test]
    async fn forwards_inbound_messages_and_skips_garbage() {
        let (addr, mut viewer_rx, _complete_tx, cancel) = start_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"{\"type\": \"updateZOffset\", \"value\": 2.0}\nnot json\n{\"type\": \"toggleQuilts\"}\n")
            .await
            .unwrap();

        assert_eq!(
            viewer_rx.recv().await.unwrap(),
            SyncMessage::UpdateZOffset { value: 2.0 }
        );
        // The garbage line is dropped; the next valid message still arrives.
        assert_eq!(viewer_rx.recv().await.unwrap(), SyncMessage::ToggleQuilts);

        cancel.cancel();
    }

    #[tokio::test]
    async fn delivers_quilt_batches_to_connected_host() {
        let (addr, _viewer_rx, complete_tx, cancel) = start_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        // Give the accept loop a moment to subscribe the connection.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        complete_tx
            .send(QuiltsComplete {
                imgs: vec!["data:image/png;base64,AAAA".into()],
                id: "3".into(),
            })
            .await
            .unwrap();

        let mut buf = vec![0u8; 256];
        let n = stream.read(&mut buf).await.unwrap();
        let line = String::from_utf8_lossy(&buf[..n]);
        assert!(line.contains("\"type\":\"quiltsComplete\""));
        assert!(line.contains("\"id\":\"3\""));
        assert!(line.ends_with('\n'));

        cancel.cancel();
    }
}
