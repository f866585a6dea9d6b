//! vigil-core — Face catalog, frame classification and presence tracking.
//!
//! Detection (SCRFD) and recognition (ArcFace) run via ONNX Runtime behind
//! the [`FaceAnalyzer`] trait; the presence state machine is pure and driven
//! by an injectable [`Clock`].

pub mod alignment;
pub mod analyzer;
pub mod catalog;
pub mod classifier;
pub mod detector;
pub mod pixels;
pub mod presence;
pub mod recognizer;
pub mod sampler;
pub mod types;

pub use analyzer::{default_model_dir, AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
pub use catalog::{FaceCatalog, SkipReason, SkippedImage};
pub use classifier::{ClassifyError, FrameClassifier, DEFAULT_MATCH_TOLERANCE, DOWNSCALE_FACTOR};
pub use presence::{Clock, Decision, PresenceState, PresenceTracker, SystemClock};
pub use sampler::FrameSampler;
pub use types::{BoundingBox, Embedding, FaceLocation, FrameMatch, KnownFace, UNKNOWN_LABEL};
