//! Known-face catalog loaded from a `<root>/<identity>/<image>` directory tree.

use crate::analyzer::FaceAnalyzer;
use crate::types::KnownFace;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("embedding dimension mismatch: catalog holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Why an enrollment image was not added to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The image did not contain exactly one face.
    FaceCount(usize),
    /// The file could not be read or decoded as an image.
    Unreadable(String),
    /// Detection or embedding failed.
    Analysis(String),
    /// The embedding does not match the catalog's dimensionality.
    Dimension { expected: usize, actual: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::FaceCount(n) => write!(f, "expected exactly one face, found {n}"),
            SkipReason::Unreadable(e) => write!(f, "unreadable image: {e}"),
            SkipReason::Analysis(e) => write!(f, "face analysis failed: {e}"),
            SkipReason::Dimension { expected, actual } => {
                write!(f, "embedding has {actual} dimensions, catalog has {expected}")
            }
        }
    }
}

/// An enrollment image that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedImage {
    pub identity: String,
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Ordered collection of known faces sharing one embedding dimension.
#[derive(Debug, Clone, Default)]
pub struct FaceCatalog {
    entries: Vec<KnownFace>,
    skipped: Vec<SkippedImage>,
}

impl FaceCatalog {
    /// Build a catalog from already-computed faces.
    pub fn from_faces(faces: Vec<KnownFace>) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for face in faces {
            catalog.push(face)?;
        }
        Ok(catalog)
    }

    /// Load every person directory under `root`.
    ///
    /// Each subdirectory name is an identity; each image in it containing
    /// exactly one face contributes one entry. Anything else is skipped with a
    /// warning. A missing or empty `root` yields an empty catalog.
    pub fn load(root: &Path, analyzer: &mut dyn FaceAnalyzer) -> Self {
        let mut catalog = Self::default();

        let people = match sorted_entries(root) {
            Ok(people) => people,
            Err(e) => {
                tracing::warn!(dir = %root.display(), error = %e, "cannot read known-people directory; catalog is empty");
                return catalog;
            }
        };

        for person_dir in people.into_iter().filter(|p| p.is_dir()) {
            let Some(identity) = person_dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                tracing::warn!(dir = %person_dir.display(), "skipping directory with non UTF-8 name");
                continue;
            };

            let images = match sorted_entries(&person_dir) {
                Ok(images) => images,
                Err(e) => {
                    tracing::warn!(dir = %person_dir.display(), error = %e, "cannot read person directory");
                    continue;
                }
            };

            for path in images.into_iter().filter(|p| p.is_file()) {
                if let Err(reason) = catalog.enroll_image(&identity, &path, analyzer) {
                    tracing::warn!(
                        identity = %identity,
                        path = %path.display(),
                        %reason,
                        "image can't be used for training"
                    );
                    catalog.skipped.push(SkippedImage {
                        identity: identity.clone(),
                        path,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            dir = %root.display(),
            faces = catalog.len(),
            identities = catalog.identities().len(),
            skipped = catalog.skipped.len(),
            "face catalog loaded"
        );

        catalog
    }

    fn enroll_image(
        &mut self,
        identity: &str,
        path: &Path,
        analyzer: &mut dyn FaceAnalyzer,
    ) -> Result<(), SkipReason> {
        let image = image::open(path)
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?
            .to_rgb8();

        let faces = analyzer
            .detect(&image)
            .map_err(|e| SkipReason::Analysis(e.to_string()))?;
        let [face] = faces.as_slice() else {
            return Err(SkipReason::FaceCount(faces.len()));
        };

        let embedding = analyzer
            .embed(&image, face)
            .map_err(|e| SkipReason::Analysis(e.to_string()))?;

        self.push(KnownFace {
            name: identity.to_owned(),
            embedding,
        })
        .map_err(|CatalogError::DimensionMismatch { expected, actual }| SkipReason::Dimension { expected, actual })?;

        tracing::debug!(identity, path = %path.display(), "enrolled reference image");
        Ok(())
    }

    /// Append a face, enforcing a single embedding dimension across the catalog.
    pub fn push(&mut self, face: KnownFace) -> Result<(), CatalogError> {
        if let Some(expected) = self.dimension() {
            let actual = face.embedding.dimension();
            if actual != expected {
                return Err(CatalogError::DimensionMismatch { expected, actual });
            }
        }
        self.entries.push(face);
        Ok(())
    }

    pub fn entries(&self) -> &[KnownFace] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by all entries, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|f| f.embedding.dimension())
    }

    /// Distinct identity names, sorted.
    pub fn identities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.iter().map(|f| f.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|f| f.name == name)
    }

    /// Images rejected while loading.
    pub fn skipped(&self) -> &[SkippedImage] {
        &self.skipped
    }
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    paths.sort();
    Ok(paths)
}
