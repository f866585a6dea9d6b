//! Per-frame face classification against the catalog.

use crate::analyzer::{AnalyzerError, FaceAnalyzer};
use crate::catalog::FaceCatalog;
use crate::pixels::{self, PixelError};
use crate::types::{EuclideanMatcher, FaceLocation, FrameMatch, Matcher};
use thiserror::Error;

/// Linear downscale applied before detection (1/4 per axis, 1/16 area).
pub const DOWNSCALE_FACTOR: u32 = 4;

/// Default Euclidean tolerance between L2-normalized embeddings.
///
/// Distance 1.10 corresponds to a cosine similarity of about 0.40.
pub const DEFAULT_MATCH_TOLERANCE: f32 = 1.10;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("invalid frame: {0}")]
    Frame(#[from] PixelError),
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),
}

/// Detects faces in camera frames and names them from a [`FaceCatalog`].
pub struct FrameClassifier<A> {
    analyzer: A,
    matcher: EuclideanMatcher,
    tolerance: f32,
}

impl<A: FaceAnalyzer> FrameClassifier<A> {
    pub fn new(analyzer: A, tolerance: f32) -> Self {
        Self {
            analyzer,
            matcher: EuclideanMatcher,
            tolerance,
        }
    }

    /// Mutable access to the analyzer, e.g. for loading the catalog with the same models.
    pub fn analyzer_mut(&mut self) -> &mut A {
        &mut self.analyzer
    }

    /// Classify every face in a BGR frame.
    ///
    /// The frame is downscaled by [`DOWNSCALE_FACTOR`] and converted to RGB
    /// before detection; returned locations are in original-frame coordinates.
    pub fn classify(
        &mut self,
        bgr: &[u8],
        width: u32,
        height: u32,
        catalog: &FaceCatalog,
    ) -> Result<Vec<FrameMatch>, ClassifyError> {
        let (small, small_w, small_h) = pixels::downscale_bgr(bgr, width, height, DOWNSCALE_FACTOR)?;
        let rgb = pixels::bgr_to_rgb(&small, small_w, small_h)?;

        let faces = self.analyzer.detect(&rgb)?;
        let mut matches = Vec::with_capacity(faces.len());

        for face in &faces {
            let embedding = self.analyzer.embed(&rgb, face)?;
            let result = self.matcher.compare(&embedding, catalog.entries(), self.tolerance);

            tracing::trace!(
                matched = result.matched,
                distance = result.distance,
                name = result.name.as_deref().unwrap_or("-"),
                "face compared against catalog"
            );

            matches.push(FrameMatch {
                location: FaceLocation::from_bbox(face, small_w, small_h).scaled(DOWNSCALE_FACTOR),
                identity: result.name,
            });
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Embedding, KnownFace};
    use image::RgbImage;

    /// Returns scripted boxes and embeddings, recording the image it was handed.
    struct ScriptedAnalyzer {
        faces: Vec<(BoundingBox, Embedding)>,
        seen: Option<RgbImage>,
        embed_calls: usize,
    }

    impl ScriptedAnalyzer {
        fn new(faces: Vec<(BoundingBox, Embedding)>) -> Self {
            Self { faces, seen: None, embed_calls: 0 }
        }
    }

    impl FaceAnalyzer for ScriptedAnalyzer {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            self.seen = Some(image.clone());
            Ok(self.faces.iter().map(|(b, _)| b.clone()).collect())
        }

        fn embed(&mut self, _image: &RgbImage, face: &BoundingBox) -> Result<Embedding, AnalyzerError> {
            self.embed_calls += 1;
            let (_, e) = self
                .faces
                .iter()
                .find(|(b, _)| b.x == face.x && b.y == face.y)
                .expect("scripted face");
            Ok(e.clone())
        }
    }

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    fn catalog() -> FaceCatalog {
        FaceCatalog::from_faces(vec![
            KnownFace { name: "alice".into(), embedding: Embedding::new(vec![1.0, 0.0, 0.0]) },
            KnownFace { name: "bob".into(), embedding: Embedding::new(vec![0.0, 1.0, 0.0]) },
        ])
        .unwrap()
    }

    fn frame(width: u32, height: u32) -> Vec<u8> {
        vec![0u8; (width * height * 3) as usize]
    }

    #[test]
    fn test_no_faces_yields_empty_matches() {
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(vec![]), DEFAULT_MATCH_TOLERANCE);
        let matches = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        assert!(matches.is_empty());
        assert_eq!(classifier.analyzer_mut().embed_calls, 0);
    }

    #[test]
    fn test_exact_embedding_resolves_identity() {
        let faces = vec![(bbox(2.0, 2.0, 4.0, 4.0), Embedding::new(vec![0.0, 1.0, 0.0]))];
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(faces), DEFAULT_MATCH_TOLERANCE);
        let matches = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].identity.as_deref(), Some("bob"));
    }

    #[test]
    fn test_empty_catalog_is_unknown() {
        let faces = vec![
            (bbox(1.0, 1.0, 3.0, 3.0), Embedding::new(vec![1.0, 0.0, 0.0])),
            (bbox(8.0, 1.0, 3.0, 3.0), Embedding::new(vec![0.0, 1.0, 0.0])),
        ];
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(faces), DEFAULT_MATCH_TOLERANCE);
        let matches = classifier
            .classify(&frame(64, 48), 64, 48, &FaceCatalog::default())
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.label() == "Unknown"));
    }

    #[test]
    fn test_distant_face_is_unknown() {
        let faces = vec![(bbox(1.0, 1.0, 3.0, 3.0), Embedding::new(vec![0.0, 0.0, -1.0]))];
        // sqrt(2) to either catalog entry, above a 1.0 tolerance
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(faces), 1.0);
        let matches = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        assert_eq!(matches[0].identity, None);
    }

    #[test]
    fn test_locations_scaled_back_by_four() {
        // Downscaled detection at (t=3, r=9, b=10, l=2) → reported (12, 36, 40, 8).
        let faces = vec![(bbox(2.0, 3.0, 7.0, 7.0), Embedding::new(vec![1.0, 0.0, 0.0]))];
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(faces), DEFAULT_MATCH_TOLERANCE);
        let matches = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        assert_eq!(
            matches[0].location,
            FaceLocation { top: 12, right: 36, bottom: 40, left: 8 }
        );
    }

    #[test]
    fn test_detector_sees_downscaled_rgb() {
        // Solid BGR blue (255, 0, 0) must arrive as RGB (0, 0, 255) at 1/4 size.
        let bgr: Vec<u8> = (0..64 * 48).flat_map(|_| [255u8, 0, 0]).collect();
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(vec![]), DEFAULT_MATCH_TOLERANCE);
        classifier.classify(&bgr, 64, 48, &catalog()).unwrap();

        let seen = classifier.analyzer_mut().seen.take().unwrap();
        assert_eq!(seen.dimensions(), (16, 12));
        assert_eq!(seen.get_pixel(0, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_short_frame_rejected() {
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(vec![]), DEFAULT_MATCH_TOLERANCE);
        let err = classifier.classify(&[0u8; 10], 64, 48, &catalog()).unwrap_err();
        assert!(matches!(err, ClassifyError::Frame(_)));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let faces = vec![(bbox(2.0, 2.0, 4.0, 4.0), Embedding::new(vec![0.9, 0.1, 0.0]))];
        let mut classifier = FrameClassifier::new(ScriptedAnalyzer::new(faces), DEFAULT_MATCH_TOLERANCE);
        let first = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        let second = classifier.classify(&frame(64, 48), 64, 48, &catalog()).unwrap();
        assert_eq!(first, second);
    }
}
