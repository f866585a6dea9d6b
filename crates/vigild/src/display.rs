//! Visual feedback sinks for annotated frames.

use std::path::PathBuf;
use thiserror::Error;
use vigil_core::pixels::{self, PixelError};
use vigil_core::FrameMatch;
use vigil_hw::Frame;

/// Box outline thickness in pixels.
const BOX_THICKNESS: u32 = 2;
/// Height of the filled label bar along the bottom edge of each box.
const LABEL_BAR_HEIGHT: u32 = 35;

const KNOWN_BGR: [u8; 3] = [0, 200, 0];
const UNKNOWN_BGR: [u8; 3] = [0, 0, 255];

#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("invalid frame: {0}")]
    Frame(#[from] PixelError),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Receives every captured frame with the most recent match results.
pub trait FrameSink {
    fn show(&mut self, frame: &Frame, matches: &[FrameMatch]) -> Result<(), DisplayError>;
}

/// No display surface; matches are only traced.
pub struct Headless;

impl FrameSink for Headless {
    fn show(&mut self, frame: &Frame, matches: &[FrameMatch]) -> Result<(), DisplayError> {
        if !matches.is_empty() {
            tracing::trace!(
                seq = frame.sequence,
                faces = ?matches.iter().map(FrameMatch::label).collect::<Vec<_>>(),
                "frame faces"
            );
        }
        Ok(())
    }
}

/// Periodically overwrites an image file with the annotated current frame.
pub struct SnapshotWriter {
    path: PathBuf,
    every: u32,
    frames: u64,
}

impl SnapshotWriter {
    /// Write one snapshot every `every` frames (at least 1).
    pub fn new(path: PathBuf, every: u32) -> Self {
        Self {
            path,
            every: every.max(1),
            frames: 0,
        }
    }
}

impl FrameSink for SnapshotWriter {
    fn show(&mut self, frame: &Frame, matches: &[FrameMatch]) -> Result<(), DisplayError> {
        let due = self.frames % u64::from(self.every) == 0;
        self.frames += 1;
        if !due {
            return Ok(());
        }

        let mut bgr = frame.data.clone();
        annotate(&mut bgr, frame.width, frame.height, matches);
        let rgb = pixels::bgr_to_rgb(&bgr, frame.width, frame.height)?;
        rgb.save(&self.path).map_err(|source| DisplayError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Draw a box and a filled label bar for every match onto a BGR frame.
///
/// Known faces are drawn green, unknown faces red. Boxes are clipped to the frame.
pub fn annotate(bgr: &mut [u8], width: u32, height: u32, matches: &[FrameMatch]) {
    for m in matches {
        let color = if m.is_known() { KNOWN_BGR } else { UNKNOWN_BGR };
        let loc = m.location;
        let (left, right) = (loc.left.min(width), loc.right.min(width));
        let (top, bottom) = (loc.top.min(height), loc.bottom.min(height));
        if left >= right || top >= bottom {
            continue;
        }

        let t = BOX_THICKNESS;
        // Outline: top, bottom, left, right strips.
        fill_rect(bgr, width, left, top, right, (top + t).min(bottom), color);
        fill_rect(bgr, width, left, bottom.saturating_sub(t).max(top), right, bottom, color);
        fill_rect(bgr, width, left, top, (left + t).min(right), bottom, color);
        fill_rect(bgr, width, right.saturating_sub(t).max(left), top, right, bottom, color);
        // Label bar inside the bottom of the box.
        fill_rect(
            bgr,
            width,
            left,
            bottom.saturating_sub(LABEL_BAR_HEIGHT).max(top),
            right,
            bottom,
            color,
        );
    }
}

/// Fill the half-open rectangle [x0, x1) x [y0, y1).
fn fill_rect(bgr: &mut [u8], width: u32, x0: u32, y0: u32, x1: u32, y1: u32, color: [u8; 3]) {
    let w = width as usize;
    for y in y0 as usize..y1 as usize {
        let start = (y * w + x0 as usize) * 3;
        let end = (y * w + x1 as usize) * 3;
        if let Some(row) = bgr.get_mut(start..end) {
            for px in row.chunks_exact_mut(3) {
                px.copy_from_slice(&color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::FaceLocation;

    fn px(bgr: &[u8], width: u32, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * width + x) * 3) as usize;
        [bgr[i], bgr[i + 1], bgr[i + 2]]
    }

    #[test]
    fn test_annotate_draws_outline_and_keeps_interior() {
        let (w, h) = (100u32, 100u32);
        let mut bgr = vec![0u8; (w * h * 3) as usize];
        let m = FrameMatch {
            location: FaceLocation { top: 10, right: 90, bottom: 90, left: 10 },
            identity: None,
        };
        annotate(&mut bgr, w, h, &[m]);

        assert_eq!(px(&bgr, w, 10, 10), UNKNOWN_BGR);
        assert_eq!(px(&bgr, w, 89, 30), UNKNOWN_BGR);
        // Interior above the label bar is untouched.
        assert_eq!(px(&bgr, w, 50, 30), [0, 0, 0]);
        // Label bar is filled.
        assert_eq!(px(&bgr, w, 50, 80), UNKNOWN_BGR);
        // Outside the box is untouched.
        assert_eq!(px(&bgr, w, 5, 5), [0, 0, 0]);
    }

    #[test]
    fn test_annotate_known_face_color() {
        let (w, h) = (20u32, 20u32);
        let mut bgr = vec![0u8; (w * h * 3) as usize];
        let m = FrameMatch {
            location: FaceLocation { top: 0, right: 10, bottom: 10, left: 0 },
            identity: Some("alice".into()),
        };
        annotate(&mut bgr, w, h, &[m]);
        assert_eq!(px(&bgr, w, 0, 0), KNOWN_BGR);
    }

    #[test]
    fn test_annotate_clips_out_of_frame_boxes() {
        let (w, h) = (16u32, 16u32);
        let mut bgr = vec![0u8; (w * h * 3) as usize];
        let m = FrameMatch {
            location: FaceLocation { top: 8, right: 64, bottom: 64, left: 8 },
            identity: None,
        };
        annotate(&mut bgr, w, h, &[m]);
        assert_eq!(bgr.len(), (w * h * 3) as usize);
        assert_eq!(px(&bgr, w, 15, 15), UNKNOWN_BGR);
    }

    #[test]
    fn test_snapshot_writer_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        let mut sink = SnapshotWriter::new(path.clone(), 1);
        let frame = Frame::new(vec![255u8; 8 * 8 * 3], 8, 8, 0);

        sink.show(&frame, &[]).unwrap();

        let written = image::open(&path).unwrap().to_rgb8();
        assert_eq!(written.dimensions(), (8, 8));
    }

    #[test]
    fn test_snapshot_writer_respects_cadence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.png");
        let mut sink = SnapshotWriter::new(path.clone(), 3);
        let bad = Frame::new(vec![0u8; 3], 8, 8, 0);

        // First frame is due and fails on the short buffer; the next two are skipped.
        assert!(sink.show(&bad, &[]).is_err());
        assert!(sink.show(&bad, &[]).is_ok());
        assert!(sink.show(&bad, &[]).is_ok());
        assert!(!path.exists());
    }
}
