//! Per-photo metadata enrichment: EXIF, then reverse geocoding, then faces.
//!
//! Every step is best-effort. A failing step leaves its field `None` and the
//! rest of the descriptor intact; [`Enricher::enrich`] itself cannot fail.

pub mod faces;
pub mod geocode;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::error::RegistryError;
use crate::events::{ExifData, FaceMetadata, PhotoDescriptor};
use crate::meta;

pub use faces::{FaceDetector, ProcessFaceDetector};
pub use geocode::{Geocoder, NominatimGeocoder};

/// Which optional steps run for an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichOptions {
    pub exif: bool,
    pub face_detection: bool,
    pub language: String,
}

#[derive(Clone)]
pub struct Enricher {
    options: EnrichOptions,
    geocoder: Option<Arc<dyn Geocoder>>,
    detector: Option<Arc<dyn FaceDetector>>,
}

impl Enricher {
    pub fn new(
        options: EnrichOptions,
        geocoder: Option<Arc<dyn Geocoder>>,
        detector: Option<Arc<dyn FaceDetector>>,
    ) -> Self {
        Self {
            options,
            geocoder,
            detector,
        }
    }

    pub fn options(&self) -> &EnrichOptions {
        &self.options
    }

    /// Fill `exif`, `location` and `face` for `photo`, whose `path` is relative to `root`.
    #[instrument(skip(self, photo), fields(path = %photo.path))]
    pub async fn enrich(&self, root: &Path, mut photo: PhotoDescriptor) -> PhotoDescriptor {
        photo.exif = None;
        photo.location = None;
        photo.face = None;

        let absolute = match resolve_within(root, &photo.path) {
            Ok(path) => path,
            Err(err) => {
                warn!(error = %err, "refusing to enrich photo outside the instance root");
                return photo;
            }
        };

        if self.options.exif {
            photo.exif = read_exif(&absolute).await;
            if let Some(exif) = &photo.exif {
                photo.location = self.locate(exif).await;
            }
        }
        if self.options.face_detection {
            photo.face = self.detect_faces(&absolute).await;
        }
        photo
    }

    async fn locate(&self, exif: &ExifData) -> Option<String> {
        let Some((lat, lon)) = exif.gps() else {
            debug!("no GPS data");
            return None;
        };
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.reverse(lat, lon, &self.options.language).await {
            Ok(resp) => {
                let location = resp.location();
                info!(lat, lon, location = ?location, "reverse geocoded");
                location
            }
            Err(err) => {
                warn!(lat, lon, error = %err, "reverse geocoding failed");
                None
            }
        }
    }

    async fn detect_faces(&self, absolute: &Path) -> Option<FaceMetadata> {
        let detector = self.detector.as_ref()?;
        match detector.detect(absolute).await {
            Ok(faces) => {
                debug!(count = faces.count, "face detection finished");
                Some(faces)
            }
            Err(err) => {
                warn!(error = %err, "face detection failed");
                None
            }
        }
    }
}

async fn read_exif(path: &Path) -> Option<ExifData> {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || meta::read_exif(&owned)).await {
        Ok(Ok(exif)) => Some(exif),
        Ok(Err(err)) => {
            debug!(error = %format!("{err:#}"), "no usable EXIF");
            None
        }
        Err(err) => {
            warn!(error = %err, "EXIF reader task failed");
            None
        }
    }
}

/// Join a catalog-relative path onto `root`, rejecting anything that climbs out.
pub fn resolve_within(root: &Path, rel: &str) -> Result<PathBuf, RegistryError> {
    let rel_path = Path::new(rel);
    let escapes = rel.is_empty()
        || rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(RegistryError::PathEscapesRoot(rel_path.to_path_buf()));
    }
    Ok(root.join(rel_path))
}
