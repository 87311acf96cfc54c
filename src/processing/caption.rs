use chrono::DateTime;

use crate::events::{ExifData, PhotoDescriptor};

/// Placeholder shown while the slideshow has nothing to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// Catalog not loaded yet.
    Loading,
    /// Display cycle elapsed before the next photo was enriched.
    Preparing,
}

impl Placeholder {
    /// Text for `language` (a BCP 47 tag or its primary subtag); English otherwise.
    pub fn text(self, language: &str) -> &'static str {
        let primary = language
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match (self, primary.as_str()) {
            (Self::Loading, "de") => "Fotos werden geladen …",
            (Self::Loading, "fr") => "Chargement des photos …",
            (Self::Loading, "es") => "Cargando fotos …",
            (Self::Loading, "nl") => "Foto's laden …",
            (Self::Loading, _) => "Loading photos …",
            (Self::Preparing, "de") => "Nächstes Foto wird vorbereitet …",
            (Self::Preparing, "fr") => "Préparation de la photo suivante …",
            (Self::Preparing, "es") => "Preparando la siguiente foto …",
            (Self::Preparing, "nl") => "Volgende foto wordt voorbereid …",
            (Self::Preparing, _) => "Preparing next photo …",
        }
    }
}

/// Caption lines for a photo, each present only when its data is.
pub fn caption_lines(photo: &PhotoDescriptor) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(exif) = photo.exif.as_ref() else {
        return lines;
    };

    if let Some(taken) = exif
        .timestamp()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        lines.push(format!("🗓️ {}", taken.format("%Y-%m-%d %H:%M")));
    }
    if let Some(location) = photo.location.as_deref().filter(|l| !l.is_empty()) {
        lines.push(format!("📍 {location}"));
    }
    if let Some(model) = exif.text("Model") {
        lines.push(format!("📷 {model}"));
    }
    let params = photo_parameters(exif);
    if !params.is_empty() {
        lines.push(format!("⚙️ {}", params.join(" ")));
    }
    lines
}

fn photo_parameters(exif: &ExifData) -> Vec<String> {
    let positive = |tag: &str| exif.number(tag).filter(|v| *v > 0.0);
    let mut parts = Vec::new();
    if let Some(focal) = positive("FocalLength") {
        parts.push(format!("{focal}mm"));
    }
    if let Some(f) = positive("FNumber") {
        parts.push(format!("f/{f:.1}"));
    }
    if let Some(t) = positive("ExposureTime") {
        if t < 1.0 {
            parts.push(format!("1/{}s", (1.0 / t).round()));
        } else {
            parts.push(format!("{t}s"));
        }
    }
    if let Some(iso) = positive("PhotographicSensitivity").or_else(|| positive("ISO")) {
        parts.push(format!("ISO {iso}"));
    }
    parts
}
