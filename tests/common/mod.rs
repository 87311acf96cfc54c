//! Shared fixtures and stubs for the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{Cursor, Write as _};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ambient_slideshow::client::SlideshowBackend;
use ambient_slideshow::enrich::geocode::{GeocodeResponse, Geocoder, parse_response};
use ambient_slideshow::error::{CatalogError, GeocodeError, ImageDecodeFailure};
use ambient_slideshow::events::{CatalogEntry, InstanceConfig, PhotoDescriptor};
use ambient_slideshow::render::{DecodedImage, RenderCommand, Surface};
use base64::Engine;
use futures::future::BoxFuture;
use tokio::time::Instant;

// JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
pub const ORIENT6_JPEG: &str = concat!(
    "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
    "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
);

pub fn orient6_jpeg() -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(ORIENT6_JPEG)
        .unwrap()
}

/// A valid minimal 1x1 RGBA PNG.
pub const PNG_1X1: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0xF8,
    0xCF, 0xC0, 0x00, 0x00, 0x03, 0x01, 0x01, 0x00, 0x18, 0xDD, 0x8D, 0x78, 0x00, 0x00, 0x00,
    0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

pub fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, bytes).unwrap();
}

/// 4x3 JPEG carrying GPS coordinates 48°51'24"N 2°21'3"E.
pub fn gps_jpeg() -> Vec<u8> {
    use exif::experimental::Writer;
    use exif::{Field, In, Rational, Tag, Value};

    let dms = |d, m, s| Value::Rational(vec![Rational::from((d, 1)), Rational::from((m, 1)), Rational::from((s, 1))]);
    let lat = Field {
        tag: Tag::GPSLatitude,
        ifd_num: In::PRIMARY,
        value: dms(48, 51, 24),
    };
    let lat_ref = Field {
        tag: Tag::GPSLatitudeRef,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"N".to_vec()]),
    };
    let lon = Field {
        tag: Tag::GPSLongitude,
        ifd_num: In::PRIMARY,
        value: dms(2, 21, 3),
    };
    let lon_ref = Field {
        tag: Tag::GPSLongitudeRef,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![b"E".to_vec()]),
    };
    let mut writer = Writer::new();
    for field in [&lat, &lat_ref, &lon, &lon_ref] {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = Vec::new();
    image::RgbImage::from_pixel(4, 3, image::Rgb([90, 120, 200]))
        .write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)
        .unwrap();

    // APP1 "Exif" segment right after SOI.
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    out.write_all(b"Exif\0\0").unwrap();
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Geocoder answering every lookup with a fixed payload.
pub struct StubGeocoder {
    pub body: String,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(f64, f64, String)>>,
}

impl StubGeocoder {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Geocoder for StubGeocoder {
    fn reverse<'a>(
        &'a self,
        latitude: f64,
        longitude: f64,
        language: &'a str,
    ) -> BoxFuture<'a, Result<GeocodeResponse, GeocodeError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((latitude, longitude, language.to_string()));
        Box::pin(async move { parse_response(&self.body) })
    }
}

/// Detector command running `script` through `sh`.
#[cfg(unix)]
pub fn sh_detector(dir: &Path, name: &str, script: &str) -> Vec<String> {
    let path = dir.join(name);
    std::fs::write(&path, script).unwrap();
    vec!["sh".to_string(), path.to_string_lossy().into_owned()]
}

fn entries(paths: &[&str]) -> Vec<CatalogEntry> {
    paths
        .iter()
        .map(|p| CatalogEntry {
            url: format!("/photo/test/{p}"),
            path: (*p).to_string(),
        })
        .collect()
}

/// In-memory backend with scripted catalog failures and optional enrichment delay.
pub struct StubBackend {
    pub photos: Mutex<Vec<CatalogEntry>>,
    pub catalog_failures: Mutex<VecDeque<CatalogError>>,
    pub metadata_delay: Duration,
    pub register_calls: AtomicUsize,
    pub catalog_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
}

impl StubBackend {
    pub fn new(paths: &[&str]) -> Self {
        Self {
            photos: Mutex::new(entries(paths)),
            catalog_failures: Mutex::new(VecDeque::new()),
            metadata_delay: Duration::ZERO,
            register_calls: AtomicUsize::new(0),
            catalog_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
        }
    }

    /// Replace what the next catalog fetch returns.
    pub fn set_photos(&self, paths: &[&str]) {
        *self.photos.lock().unwrap() = entries(paths);
    }

    pub fn failing_first(self, failures: impl IntoIterator<Item = CatalogError>) -> Self {
        self.catalog_failures.lock().unwrap().extend(failures);
        self
    }

    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = delay;
        self
    }
}

impl SlideshowBackend for StubBackend {
    fn register<'a>(&'a self, _instance: &'a InstanceConfig) -> BoxFuture<'a, Result<(), CatalogError>> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(()) })
    }

    fn fetch_catalog<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, Result<Vec<CatalogEntry>, CatalogError>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        let result = match self.catalog_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(self.photos.lock().unwrap().clone()),
        };
        Box::pin(async move { result })
    }

    fn request_metadata<'a>(
        &'a self,
        _id: &'a str,
        mut photo: PhotoDescriptor,
    ) -> BoxFuture<'a, Result<PhotoDescriptor, CatalogError>> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if !self.metadata_delay.is_zero() {
                tokio::time::sleep(self.metadata_delay).await;
            }
            photo.location = Some("Somewhere".to_string());
            Ok(photo)
        })
    }
}

/// Surface that records every command with its offset from creation.
pub struct RecordingSurface {
    start: Instant,
    broken: Vec<String>,
    log: Mutex<Vec<(Duration, RenderCommand)>>,
}

impl RecordingSurface {
    pub fn new(broken: &[&str]) -> Self {
        Self {
            start: Instant::now(),
            broken: broken.iter().map(|s| (*s).to_string()).collect(),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<(Duration, RenderCommand)> {
        self.log.lock().unwrap().clone()
    }

    /// `(offset, url)` of every photo placed on stage.
    pub fn placed(&self) -> Vec<(Duration, String)> {
        self.commands()
            .into_iter()
            .filter_map(|(at, cmd)| match cmd {
                RenderCommand::Place { url, .. } => Some((at, url)),
                _ => None,
            })
            .collect()
    }

    pub fn placeholders(&self) -> Vec<(Duration, String)> {
        self.commands()
            .into_iter()
            .filter_map(|(at, cmd)| match cmd {
                RenderCommand::Placeholder { text } => Some((at, text)),
                _ => None,
            })
            .collect()
    }
}

impl Surface for RecordingSurface {
    fn viewport(&self) -> (u32, u32) {
        (1280, 800)
    }

    fn decode<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage, ImageDecodeFailure>> {
        Box::pin(async move {
            if self.broken.iter().any(|b| url.ends_with(b.as_str())) {
                return Err(ImageDecodeFailure {
                    url: url.to_string(),
                    reason: "corrupt".to_string(),
                });
            }
            Ok(DecodedImage {
                width: 1920,
                height: 1080,
                pixels: None,
            })
        })
    }

    fn render(&self, command: RenderCommand) {
        let at = Instant::now() - self.start;
        self.log.lock().unwrap().push((at, command));
    }
}

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}
