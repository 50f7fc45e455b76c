//! Quilt capture state machine.
//!
//! A session owns a fixed plan of headings computed once at start and walks
//! it one leg per second. The machine is advanced with an injected elapsed
//! time so it can be exercised without a frame loop or a real clock; the
//! viewer feeds it the wall-clock delta of each rendered frame.

use std::time::Duration;

use anyhow::{Result, bail};

/// Wall-clock length of one leg (rotation to the next sample).
pub const LEG_DURATION: Duration = Duration::from_millis(1000);

/// Outcome of one tick while a session is active.
#[derive(Debug, Clone, PartialEq)]
pub enum QuiltTick {
    /// Mid-leg: place the camera at this heading and keep rendering.
    Rotating { heading_deg: f32 },
    /// The leg is complete: place the camera at exactly `heading_deg` and
    /// capture frame `index` now.
    CaptureDue { index: usize, heading_deg: f32 },
}

/// Outcome of recording a captured frame.
#[derive(Debug)]
pub enum CaptureAdvance {
    /// More frames remain; a new leg has started.
    NextLeg,
    /// The plan is exhausted; the ordered batch is handed back.
    Finished(Vec<String>),
}

#[derive(Debug)]
struct QuiltSession {
    angles: Vec<f32>,
    /// Index of the sample currently being approached.
    frame: usize,
    /// Heading at the start of the current leg.
    leg_from: f32,
    elapsed: Duration,
    captured: Vec<String>,
}

impl QuiltSession {
    fn new(frame_count: u32, angle_range_deg: f32) -> Self {
        let half = angle_range_deg / 2.0;
        let start = half;
        let end = -half;
        let n = frame_count as usize;
        let angles = if n > 1 {
            let step = (end - start) / (n as f32 - 1.0);
            (0..n).map(|i| start + step * i as f32).collect()
        } else {
            vec![start]
        };
        Self {
            angles,
            frame: 0,
            leg_from: start,
            elapsed: Duration::ZERO,
            captured: Vec::new(),
        }
    }

    fn tick(&mut self, dt: Duration) -> QuiltTick {
        let target = self.angles[self.frame];
        // Sample 0 is captured where the session started, without travel.
        if self.frame == 0 {
            return QuiltTick::CaptureDue {
                index: 0,
                heading_deg: target,
            };
        }

        self.elapsed += dt;
        let progress =
            (self.elapsed.as_secs_f32() / LEG_DURATION.as_secs_f32()).clamp(0.0, 1.0);
        if progress >= 1.0 {
            QuiltTick::CaptureDue {
                index: self.frame,
                heading_deg: target,
            }
        } else {
            QuiltTick::Rotating {
                heading_deg: self.leg_from + (target - self.leg_from) * progress,
            }
        }
    }

    fn record_captured(&mut self, encoded: String) -> CaptureAdvance {
        self.captured.push(encoded);
        if self.frame + 1 < self.angles.len() {
            self.leg_from = self.angles[self.frame];
            self.frame += 1;
            self.elapsed = Duration::ZERO;
            CaptureAdvance::NextLeg
        } else {
            CaptureAdvance::Finished(std::mem::take(&mut self.captured))
        }
    }
}

/// Owns at most one active session and enforces the single-session rule.
#[derive(Debug, Default)]
pub struct QuiltCapture {
    session: Option<QuiltSession>,
}

impl QuiltCapture {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Begin a capture session. Fails while one is active and for an empty
    /// plan; on success returns the heading the camera must jump to
    /// immediately (instant, not animated).
    pub fn start(&mut self, frame_count: u32, angle_range_deg: f32) -> Result<f32> {
        if self.session.is_some() {
            bail!("quilt capture already in progress");
        }
        if frame_count < 1 {
            bail!("quilt capture needs at least one frame");
        }
        let session = QuiltSession::new(frame_count, angle_range_deg);
        let first = session.angles[0];
        self.session = Some(session);
        Ok(first)
    }

    /// End the session, returning whatever frames were already captured.
    /// Safe to call when idle (returns an empty batch).
    pub fn stop(&mut self) -> Vec<String> {
        self.session
            .take()
            .map(|s| s.captured)
            .unwrap_or_default()
    }

    /// Advance the active session by one frame tick. `None` when idle.
    pub fn tick(&mut self, dt: Duration) -> Option<QuiltTick> {
        self.session.as_mut().map(|s| s.tick(dt))
    }

    /// Record the frame just captured. `Finished` clears the session.
    pub fn record_captured(&mut self, encoded: String) -> Option<CaptureAdvance> {
        let advance = self.session.as_mut()?.record_captured(encoded);
        if matches!(advance, CaptureAdvance::Finished(_)) {
            self.session = None;
        }
        Some(advance)
    }

    pub fn frames_captured(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.captured.len())
    }

    /// The fixed heading plan of the active session, for diagnostics.
    pub fn plan(&self) -> Option<&[f32]> {
        self.session.as_ref().map(|s| s.angles.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Run a session to completion, capturing at every `CaptureDue`.
    fn run_to_completion(capture: &mut QuiltCapture, step: Duration) -> (Vec<String>, Vec<f32>) {
        let mut headings = Vec::new();
        for _ in 0..10_000 {
            match capture.tick(step) {
                Some(QuiltTick::CaptureDue { index, heading_deg }) => {
                    headings.push(heading_deg);
                    match capture.record_captured(format!("frame-{index}")) {
                        Some(CaptureAdvance::Finished(batch)) => return (batch, headings),
                        Some(CaptureAdvance::NextLeg) => {}
                        None => panic!("session vanished mid-capture"),
                    }
                }
                Some(QuiltTick::Rotating { .. }) => {}
                None => panic!("session ended without finishing"),
            }
        }
        panic!("session never completed");
    }

    #[test]
    fn four_frames_over_fourteen_degrees() {
        let mut capture = QuiltCapture::default();
        let first = capture.start(4, 14.0).expect("start");
        assert!((first - 7.0).abs() < 1e-4);

        let (batch, headings) = run_to_completion(&mut capture, ms(100));
        assert_eq!(batch.len(), 4);
        assert_eq!(
            batch,
            vec!["frame-0", "frame-1", "frame-2", "frame-3"]
        );

        let expected = [7.0_f32, 7.0 - 14.0 / 3.0, 7.0 - 28.0 / 3.0, -7.0];
        for (got, want) in headings.iter().zip(expected) {
            assert!((got - want).abs() < 1e-3, "heading {got} != {want}");
        }
        assert!(!capture.is_active());
    }

    #[test]
    fn single_frame_captures_at_half_range_without_travel() {
        let mut capture = QuiltCapture::default();
        let first = capture.start(1, 30.0).expect("start");
        assert!((first - 15.0).abs() < 1e-4);

        // First tick is already a capture; no rotation ever happens.
        match capture.tick(ms(0)) {
            Some(QuiltTick::CaptureDue { index: 0, heading_deg }) => {
                assert!((heading_deg - 15.0).abs() < 1e-4);
            }
            other => panic!("expected immediate capture, got {other:?}"),
        }
        match capture.record_captured("only".into()) {
            Some(CaptureAdvance::Finished(batch)) => assert_eq!(batch, vec!["only"]),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn stop_midway_returns_partial_batch() {
        let mut capture = QuiltCapture::default();
        capture.start(4, 14.0).expect("start");

        // Capture frames 0 and 1, then stop.
        for _ in 0..2 {
            loop {
                match capture.tick(ms(250)) {
                    Some(QuiltTick::CaptureDue { index, .. }) => {
                        capture.record_captured(format!("frame-{index}"));
                        break;
                    }
                    Some(QuiltTick::Rotating { .. }) => {}
                    None => panic!("session ended early"),
                }
            }
        }
        assert_eq!(capture.frames_captured(), 2);

        let batch = capture.stop();
        assert_eq!(batch, vec!["frame-0", "frame-1"]);
        assert!(!capture.is_active());
        // A second stop yields nothing.
        assert!(capture.stop().is_empty());
    }

    #[test]
    fn start_while_active_is_rejected_and_preserves_progress() {
        let mut capture = QuiltCapture::default();
        capture.start(4, 14.0).expect("start");
        match capture.tick(ms(0)) {
            Some(QuiltTick::CaptureDue { index: 0, .. }) => {
                capture.record_captured("frame-0".into());
            }
            other => panic!("expected first capture, got {other:?}"),
        }

        assert!(capture.start(8, 90.0).is_err());
        assert_eq!(capture.frames_captured(), 1);
        let plan = capture.plan().expect("active plan").to_vec();
        assert_eq!(plan.len(), 4, "angle sequence must not be recomputed");
        assert!((plan[0] - 7.0).abs() < 1e-4);
    }

    #[test]
    fn zero_frames_is_rejected_synchronously() {
        let mut capture = QuiltCapture::default();
        assert!(capture.start(0, 14.0).is_err());
        assert!(!capture.is_active());
    }

    #[test]
    fn legs_interpolate_linearly_between_samples() {
        let mut capture = QuiltCapture::default();
        capture.start(2, 10.0).expect("start");
        match capture.tick(ms(0)) {
            Some(QuiltTick::CaptureDue { index: 0, .. }) => {
                capture.record_captured("frame-0".into());
            }
            other => panic!("expected first capture, got {other:?}"),
        }

        // Leg from +5 to -5: at 250 ms progress is 0.25.
        match capture.tick(ms(250)) {
            Some(QuiltTick::Rotating { heading_deg }) => {
                assert!((heading_deg - 2.5).abs() < 1e-3);
            }
            other => panic!("expected rotation, got {other:?}"),
        }
        // Another 500 ms: progress 0.75.
        match capture.tick(ms(500)) {
            Some(QuiltTick::Rotating { heading_deg }) => {
                assert!((heading_deg - (-2.5)).abs() < 1e-3);
            }
            other => panic!("expected rotation, got {other:?}"),
        }
        // Past the full second the exact target is due.
        match capture.tick(ms(300)) {
            Some(QuiltTick::CaptureDue { index: 1, heading_deg }) => {
                assert!((heading_deg - (-5.0)).abs() < 1e-4);
            }
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[test]
    fn progress_resumes_across_stalled_frames() {
        let mut capture = QuiltCapture::default();
        capture.start(2, 10.0).expect("start");
        capture.tick(ms(0));
        capture.record_captured("frame-0".into());

        // A long gap (e.g. a backgrounded window) simply lands past the leg.
        match capture.tick(Duration::from_secs(30)) {
            Some(QuiltTick::CaptureDue { index: 1, .. }) => {}
            other => panic!("expected capture after stall, got {other:?}"),
        }
    }
}
