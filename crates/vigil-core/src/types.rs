use serde::{Deserialize, Serialize};

/// Label rendered for a face that matched nobody in the catalog.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Integer face location in pixel coordinates, ordered (top, right, bottom, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Round a detector box to pixel edges, clamped to a `width` x `height` image.
    pub fn from_bbox(bbox: &BoundingBox, width: u32, height: u32) -> Self {
        let clamp = |v: f32, max: u32| v.round().clamp(0.0, max as f32) as u32;
        Self {
            top: clamp(bbox.y, height),
            right: clamp(bbox.x + bbox.width, width),
            bottom: clamp(bbox.y + bbox.height, height),
            left: clamp(bbox.x, width),
        }
    }

    /// Multiply every edge by `factor` (maps downscaled coordinates back to the source frame).
    pub fn scaled(self, factor: u32) -> Self {
        Self {
            top: self.top * factor,
            right: self.right * factor,
            bottom: self.bottom * factor,
            left: self.left * factor,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Compute Euclidean distance between two embeddings.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A reference face loaded from the catalog directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownFace {
    /// Identity label (the person's directory name). Shared by all of that person's photos.
    pub name: String,
    pub embedding: Embedding,
}

/// One detected face in a classified frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameMatch {
    /// Location in original-frame pixel coordinates.
    pub location: FaceLocation,
    /// Matched catalog identity, `None` when the face is unknown.
    pub identity: Option<String>,
}

impl FrameMatch {
    pub fn label(&self) -> &str {
        self.identity.as_deref().unwrap_or(UNKNOWN_LABEL)
    }

    pub fn is_known(&self) -> bool {
        self.identity.is_some()
    }
}

/// Result of matching a probe embedding against the catalog.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub matched: bool,
    /// Distance to the closest catalog entry (`f32::INFINITY` for an empty catalog).
    pub distance: f32,
    /// Index of the closest catalog entry, if any.
    pub index: Option<usize>,
    /// Name of the matched entry (only set when `matched`).
    pub name: Option<String>,
}

/// Strategy for comparing a probe embedding against the known faces.
pub trait Matcher {
    fn compare(&self, probe: &Embedding, known: &[KnownFace], tolerance: f32) -> MatchResult;
}

/// Nearest-neighbour matcher over Euclidean distance.
///
/// Every entry is scored, the minimum-distance entry is selected, and it is
/// accepted only if that distance is within `tolerance`. The first entry wins
/// ties.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Embedding, known: &[KnownFace], tolerance: f32) -> MatchResult {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, face) in known.iter().enumerate() {
            let dist = probe.euclidean_distance(&face.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        match best_idx {
            Some(idx) if best_dist <= tolerance => MatchResult {
                matched: true,
                distance: best_dist,
                index: Some(idx),
                name: Some(known[idx].name.clone()),
            },
            _ => MatchResult {
                matched: false,
                distance: best_dist,
                index: best_idx,
                name: None,
            },
        }
    }
}
