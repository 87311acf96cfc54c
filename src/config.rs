use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::events::InstanceConfig;

/// Effect allow-list entry that enables the face-anchored motion.
pub const FACE_ZOOM_MARKER: &str = "ip-facezoom";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Backend service settings.
    pub server: ServerConfig,
    /// Client presentation settings for one slideshow instance.
    pub slideshow: SlideshowConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.server.validate()?;
        self.slideshow.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Instance paths are resolved relative to this directory.
    pub uploads_root: PathBuf,
    pub geocoder: GeocoderConfig,
    pub face_detector: FaceDetectorConfig,
}

impl ServerConfig {
    /// Absolute directory served for an instance configured with `path`.
    pub fn resolve_instance_root(&self, path: &str) -> PathBuf {
        let joined = self.uploads_root.join(path);
        joined.canonicalize().unwrap_or(joined)
    }

    fn validate(&self) -> Result<()> {
        self.geocoder.validate()?;
        self.face_detector.validate()?;
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            uploads_root: PathBuf::from("uploads"),
            geocoder: GeocoderConfig::default(),
            face_detector: FaceDetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct GeocoderConfig {
    pub endpoint: String,
    pub user_agent: String,
    /// Unset keeps the provider call unbounded.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl GeocoderConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            !self.endpoint.trim().is_empty(),
            "server.geocoder.endpoint must not be blank"
        );
        if let Some(timeout) = self.timeout {
            ensure!(!timeout.is_zero(), "server.geocoder.timeout must be positive");
        }
        Ok(())
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("ambient-slideshow/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FaceDetectorConfig {
    /// Program and leading arguments; the absolute image path is appended.
    pub command: Vec<String>,
    /// Unset keeps the detector wait unbounded.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl FaceDetectorConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.command.first().is_some_and(|p| !p.trim().is_empty()),
            "server.face-detector.command must name a program"
        );
        if let Some(timeout) = self.timeout {
            ensure!(
                !timeout.is_zero(),
                "server.face-detector.timeout must be positive"
            );
        }
        Ok(())
    }
}

impl Default for FaceDetectorConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "python3".to_string(),
                "faceDetection/faceDetection.py".to_string(),
            ],
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SlideshowConfig {
    /// Instance identifier; routes and notifications are keyed by it.
    pub id: String,
    /// Photo directory relative to `server.uploads-root`.
    pub path: String,
    pub language: String,
    pub show_exif: bool,
    pub face_detection: bool,
    /// Walk the catalog in order instead of drawing at random.
    pub sequential: bool,
    #[serde(with = "humantime_serde")]
    pub display_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub fade_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub black_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub catalog_poll_interval: Duration,
    /// Contain the photo inside the viewport (true) or cover it (false).
    pub letterbox: bool,
    /// Fill the letterbox bars with a blurred copy of the photo.
    pub fill: bool,
    /// Backdrop blur radius in pixels, used with `fill`.
    pub blur: u32,
    /// Resting opacity of the photo once faded in.
    pub opacity: f32,
    pub effects: Vec<String>,
    pub effect_duration: DurationRange,
    pub face_zoom: FaceZoomOptions,
    pub backend_url: String,
}

impl SlideshowConfig {
    pub fn instance(&self) -> InstanceConfig {
        InstanceConfig {
            id: self.id.clone(),
            path: self.path.clone(),
            language: self.language.clone(),
            show_exif: self.show_exif,
            face_detection: self.face_detection,
        }
    }

    pub fn timings(&self) -> TransitionTimings {
        TransitionTimings {
            black: self.black_duration,
            fade: self.fade_duration,
            display: self.display_duration,
        }
    }

    /// Allow-list entries that name a declarative preset.
    pub fn presets(&self) -> impl Iterator<Item = &str> {
        self.effects
            .iter()
            .map(String::as_str)
            .filter(|name| *name != FACE_ZOOM_MARKER)
    }

    pub fn face_zoom_enabled(&self) -> bool {
        self.effects.iter().any(|name| name == FACE_ZOOM_MARKER)
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.id.trim().is_empty(), "slideshow.id must not be blank");
        ensure!(
            !self.display_duration.is_zero(),
            "slideshow.display-duration must be greater than zero"
        );
        ensure!(
            !self.retry_delay.is_zero(),
            "slideshow.retry-delay must be greater than zero"
        );
        ensure!(
            !self.catalog_poll_interval.is_zero(),
            "slideshow.catalog-poll-interval must be greater than zero"
        );
        ensure!(
            (0.0..=1.0).contains(&self.opacity),
            "slideshow.opacity must be within [0, 1]"
        );
        ensure!(
            !self.effects.is_empty(),
            "slideshow.effects must list at least one effect"
        );
        ensure!(
            self.effect_duration.min <= self.effect_duration.max,
            "slideshow.effect-duration.min must not exceed max"
        );
        self.face_zoom.validate()
    }
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            id: "slideshow".to_string(),
            path: String::new(),
            language: "en".to_string(),
            show_exif: true,
            face_detection: false,
            sequential: false,
            display_duration: Duration::from_secs(5),
            fade_duration: Duration::from_secs(1),
            black_duration: Duration::from_secs(1),
            retry_delay: Duration::from_millis(2500),
            catalog_poll_interval: Duration::from_secs(60),
            letterbox: true,
            fill: false,
            blur: 8,
            opacity: 0.9,
            effects: [
                "ip-zoom",
                "ip-panright",
                "ip-panleft",
                "ip-panup",
                "ip-pandown",
                "ip-zoom-panright",
                "ip-zoom-panleft",
                "ip-zoom-panup",
                "ip-zoom-pandown",
                FACE_ZOOM_MARKER,
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            effect_duration: DurationRange::default(),
            face_zoom: FaceZoomOptions::default(),
            backend_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

/// Black-hold, fade and display-hold lengths for one display cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionTimings {
    pub black: Duration,
    pub fade: Duration,
    pub display: Duration,
}

impl TransitionTimings {
    /// black + fade-in + display + fade-out
    pub fn total(&self) -> Duration {
        self.black + self.fade + self.display + self.fade
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DurationRange {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for DurationRange {
    fn default() -> Self {
        Self {
            min: Duration::from_secs(10),
            max: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FaceZoomOptions {
    /// Chance that an eligible photo gets the face-anchored motion.
    pub probability: f64,
    /// Scale added on top of identity for the zoom-in pan.
    pub extra_scale: f64,
    /// Where the face should end up, as an offset from the image centre.
    pub anchor: [f64; 2],
    /// Symmetric bound on each translation axis, in percent.
    pub max_translate_percent: f64,
    pub zoom_out_preset: String,
}

impl FaceZoomOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.probability),
            "slideshow.face-zoom.probability must be within [0, 1]"
        );
        ensure!(
            self.extra_scale.is_finite() && self.extra_scale >= 0.0,
            "slideshow.face-zoom.extra-scale must be non-negative"
        );
        ensure!(
            self.max_translate_percent.is_finite() && self.max_translate_percent >= 0.0,
            "slideshow.face-zoom.max-translate-percent must be non-negative"
        );
        ensure!(
            !self.zoom_out_preset.trim().is_empty(),
            "slideshow.face-zoom.zoom-out-preset must not be blank"
        );
        Ok(())
    }
}

impl Default for FaceZoomOptions {
    fn default() -> Self {
        Self {
            probability: 0.4,
            extra_scale: 0.3,
            anchor: [0.0, 1.0 / 6.0],
            max_translate_percent: 25.0,
            zoom_out_preset: "ip-zoomout-face".to_string(),
        }
    }
}
