use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single slideshow photo as it travels from the catalog to the screen.
///
/// The catalog creates it with `path` and `url` only; the backend fills
/// `exif`, `location` and `face`; the client stamps `effect` once an
/// animation has been chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoDescriptor {
    pub path: String,
    pub url: String,
    #[serde(default)]
    pub exif: Option<ExifData>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub face: Option<FaceMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

impl PhotoDescriptor {
    pub fn new(path: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Strip everything the backend adds, leaving the catalog view of the photo.
    #[must_use]
    pub fn minimal(&self) -> Self {
        Self::new(self.path.clone(), self.url.clone())
    }
}

/// Catalog entry as served by `GET /photos/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub url: String,
    pub path: String,
}

impl From<CatalogEntry> for PhotoDescriptor {
    fn from(entry: CatalogEntry) -> Self {
        Self::new(entry.path, entry.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

/// EXIF tags keyed by tag name.
///
/// GPS latitude/longitude are stored as signed decimal degrees and
/// `DateTimeOriginal` as unix seconds; everything else keeps its natural
/// JSON shape (number, array or string).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExifData {
    pub tags: BTreeMap<String, Value>,
    #[serde(default)]
    pub image_size: Option<ImageSize>,
}

impl ExifData {
    pub const GPS_LATITUDE: &'static str = "GPSLatitude";
    pub const GPS_LONGITUDE: &'static str = "GPSLongitude";
    pub const DATE_TIME_ORIGINAL: &'static str = "DateTimeOriginal";

    pub fn number(&self, tag: &str) -> Option<f64> {
        self.tags.get(tag).and_then(Value::as_f64)
    }

    pub fn text(&self, tag: &str) -> Option<&str> {
        self.tags
            .get(tag)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// `(latitude, longitude)` when both are present.
    pub fn gps(&self) -> Option<(f64, f64)> {
        let lat = self.number(Self::GPS_LATITUDE)?;
        let lon = self.number(Self::GPS_LONGITUDE)?;
        Some((lat, lon))
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.tags
            .get(Self::DATE_TIME_ORIGINAL)
            .and_then(Value::as_i64)
    }

    /// Alternate dimensions recorded by the camera in the EXIF sub-IFD.
    pub fn alternate_size(&self) -> Option<ImageSize> {
        let width = self.number("PixelXDimension")?;
        let height = self.number("PixelYDimension")?;
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(ImageSize {
            width: width as u32,
            height: height as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl FaceBox {
    /// Centre of the box as a fraction of the image dimensions.
    pub fn center_fraction(&self, width: u32, height: u32) -> (f64, f64) {
        let width = f64::from(width.max(1));
        let height = f64::from(height.max(1));
        (
            (f64::from(self.x) + f64::from(self.w) / 2.0) / width,
            (f64::from(self.y) + f64::from(self.h) / 2.0) / height,
        )
    }
}

/// Output of the external face detector, one record per image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceMetadata {
    pub width: u32,
    pub height: u32,
    pub faces: Vec<FaceBox>,
    pub count: usize,
}

/// Per-instance settings the client hands to the backend on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default = "InstanceConfig::default_language")]
    pub language: String,
    #[serde(default)]
    pub show_exif: bool,
    #[serde(default)]
    pub face_detection: bool,
}

impl InstanceConfig {
    fn default_language() -> String {
        "en".to_string()
    }
}

/// Client → backend notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientMessage {
    Config(InstanceConfig),
    Metadata { id: String, photo: PhotoDescriptor },
}

/// Backend → client notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ServerMessage {
    Ready { id: String },
    Metadata { id: String, photo: PhotoDescriptor },
}

/// Out-of-band control for a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Suspend,
    Resume,
    ToggleSuspend,
}
