use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure to obtain the photo catalog from the backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Transient failure; the client retries after `retry-delay` while nothing is loaded.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    /// The backend refused the request; retrying cannot help.
    #[error("catalog access forbidden (status {0})")]
    Forbidden(u16),
}

impl CatalogError {
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Forbidden(_))
    }
}

/// The display surface could not decode the image behind a descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("failed to decode image at {url}: {reason}")]
pub struct ImageDecodeFailure {
    pub url: String,
    pub reason: String,
}

/// Reverse-geocoding lookup failure. Always degraded to `location = None`.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoder request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("geocoder reported an error: {0}")]
    Provider(String),

    #[error("geocoder returned malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// External face detector failure. Always degraded to `face = None`.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("failed to launch face detector `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("face detector exited with {status}: {stderr}")]
    ExitStatus { status: String, stderr: String },

    #[error("face detector produced unparsable output: {0}")]
    Unparsable(String),

    #[error("face detector did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Backend-side lookup failures for a registered slideshow instance.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown slideshow instance `{0}`")]
    UnknownInstance(String),

    #[error("path {0} escapes the instance root")]
    PathEscapesRoot(PathBuf),
}
