//! End-to-end quilt flow below the GPU: the capture state machine produces a
//! batch of data URIs, and the embedder-side handler persists them in order.

use std::time::Duration;

use anyhow::Result;
use quilt_viewer::events::QuiltsComplete;
use quilt_viewer::quilt::{CaptureAdvance, QuiltCapture, QuiltTick};
use quilt_viewer::upload::{self, QuiltStore};

struct DirStore {
    dir: std::path::PathBuf,
    written: Vec<std::path::PathBuf>,
}

impl QuiltStore for DirStore {
    fn store(&mut self, index: usize, png: &[u8]) -> Result<String> {
        let path = self.dir.join(format!("quilt_{index:02}.png"));
        std::fs::write(&path, png)?;
        self.written.push(path.clone());
        Ok(path.display().to_string())
    }
}

/// Drive a session to completion, encoding a tiny PNG payload per frame.
fn capture_batch(frames: u32, range: f32) -> Vec<String> {
    let mut capture = QuiltCapture::default();
    capture.start(frames, range).expect("start");
    loop {
        match capture.tick(Duration::from_millis(200)) {
            Some(QuiltTick::CaptureDue { index, heading_deg }) => {
                let payload = format!("frame {index} at {heading_deg:.3}");
                match capture.record_captured(upload::encode_data_uri(payload.as_bytes())) {
                    Some(CaptureAdvance::Finished(batch)) => return batch,
                    Some(CaptureAdvance::NextLeg) => {}
                    None => panic!("session vanished"),
                }
            }
            Some(QuiltTick::Rotating { .. }) => {}
            None => panic!("session ended early"),
        }
    }
}

#[test]
fn captured_batch_is_stored_in_sequence_order() {
    let imgs = capture_batch(4, 14.0);
    assert_eq!(imgs.len(), 4);

    let dir = tempfile::tempdir().unwrap();
    let mut store = DirStore {
        dir: dir.path().to_path_buf(),
        written: Vec::new(),
    };
    let msg = QuiltsComplete {
        imgs,
        id: "9".into(),
    };
    assert_eq!(upload::handle_quilts_complete(&msg, "9", &mut store), 4);

    for (index, path) in store.written.iter().enumerate() {
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.starts_with(&format!("frame {index} at ")));
    }
}

#[test]
fn frame_payloads_follow_the_heading_plan() {
    let imgs = capture_batch(3, 12.0);
    let headings: Vec<f32> = imgs
        .iter()
        .map(|uri| {
            let bytes = upload::decode_data_uri(uri).unwrap();
            let text = String::from_utf8(bytes).unwrap();
            text.rsplit(' ').next().unwrap().parse().unwrap()
        })
        .collect();

    // Start at +range/2 and sweep to -range/2 in equal steps.
    let expected = [6.0_f32, 0.0, -6.0];
    for (got, want) in headings.iter().zip(expected) {
        assert!((got - want).abs() < 1e-2, "heading {got} != {want}");
    }
}

#[test]
fn batch_for_another_viewer_is_ignored() {
    let imgs = capture_batch(2, 10.0);
    let dir = tempfile::tempdir().unwrap();
    let mut store = DirStore {
        dir: dir.path().to_path_buf(),
        written: Vec::new(),
    };
    let msg = QuiltsComplete {
        imgs,
        id: "9".into(),
    };
    assert_eq!(upload::handle_quilts_complete(&msg, "4", &mut store), 0);
    assert!(store.written.is_empty());
}
