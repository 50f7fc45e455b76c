//! Embedder-side handling of a completed quilt batch.
//!
//! The viewer emits `quiltsComplete` with PNG data URIs; the embedding host
//! persists each image in order through an upload collaborator and surfaces
//! the stored count. The collaborator itself is external; it is consumed
//! here behind the `QuiltStore` trait.

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, error, warn};

use crate::events::QuiltsComplete;

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Upload/store collaborator: persists one image and returns a stable,
/// externally addressable reference for it.
pub trait QuiltStore {
    fn store(&mut self, index: usize, png: &[u8]) -> Result<String>;
}

/// Build a PNG data URI from encoded bytes.
pub fn encode_data_uri(png: &[u8]) -> String {
    format!("{PNG_DATA_URI_PREFIX}{}", BASE64.encode(png))
}

/// Decode a PNG data URI back to raw bytes.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let payload = uri
        .strip_prefix(PNG_DATA_URI_PREFIX)
        .ok_or_else(|| anyhow!("not a PNG data URI"))?;
    Ok(BASE64.decode(payload)?)
}

/// Process a completed batch: verify the correlation id, store each frame in
/// order, and return how many were stored. A mismatched id discards the
/// whole message; a bad frame is skipped so the rest of the batch survives.
pub fn handle_quilts_complete(
    msg: &QuiltsComplete,
    expected_id: &str,
    store: &mut dyn QuiltStore,
) -> usize {
    if msg.id != expected_id {
        debug!(
            received = %msg.id,
            expected = %expected_id,
            "ignoring quilt batch for another viewer"
        );
        return 0;
    }

    let mut stored = 0;
    for (index, uri) in msg.imgs.iter().enumerate() {
        let png = match decode_data_uri(uri) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(index, error = %err, "skipping malformed quilt frame");
                continue;
            }
        };
        match store.store(index, &png) {
            Ok(reference) => {
                debug!(index, reference = %reference, "quilt frame stored");
                stored += 1;
            }
            Err(err) => {
                error!(index, error = %err, "failed to store quilt frame");
            }
        }
    }
    stored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        names: Vec<String>,
        fail_on: Option<usize>,
    }

    impl QuiltStore for MemoryStore {
        fn store(&mut self, index: usize, png: &[u8]) -> Result<String> {
            if self.fail_on == Some(index) {
                return Err(anyhow!("store rejected frame {index}"));
            }
            let name = format!("quilt_{index:02}.png ({} bytes)", png.len());
            self.names.push(name.clone());
            Ok(name)
        }
    }

    fn batch(id: &str, frames: &[&[u8]]) -> QuiltsComplete {
        QuiltsComplete {
            imgs: frames.iter().map(|f| encode_data_uri(f)).collect(),
            id: id.to_string(),
        }
    }

    #[test]
    fn data_uri_round_trip() {
        let bytes = b"\x89PNG\r\n\x1a\n fake";
        let uri = encode_data_uri(bytes);
        assert!(uri.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), bytes);
    }

    #[test]
    fn stores_frames_in_order() {
        let msg = batch("7", &[b"one", b"two", b"three"]);
        let mut store = MemoryStore::default();
        assert_eq!(handle_quilts_complete(&msg, "7", &mut store), 3);
        assert_eq!(store.names.len(), 3);
        assert!(store.names[0].starts_with("quilt_00"));
        assert!(store.names[2].starts_with("quilt_02"));
    }

    #[test]
    fn mismatched_id_discards_batch() {
        let msg = batch("7", &[b"one"]);
        let mut store = MemoryStore::default();
        assert_eq!(handle_quilts_complete(&msg, "8", &mut store), 0);
        assert!(store.names.is_empty());
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let mut msg = batch("7", &[b"one", b"two"]);
        msg.imgs.insert(1, "data:text/plain;base64,AAAA".to_string());
        let mut store = MemoryStore::default();
        assert_eq!(handle_quilts_complete(&msg, "7", &mut store), 2);
    }

    #[test]
    fn store_failure_does_not_abort_batch() {
        let msg = batch("7", &[b"one", b"two", b"three"]);
        let mut store = MemoryStore {
            fail_on: Some(1),
            ..MemoryStore::default()
        };
        assert_eq!(handle_quilts_complete(&msg, "7", &mut store), 2);
    }
}
