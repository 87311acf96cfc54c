//! EXIF extraction for the enrichment pipeline.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use exif::{Exif, Field, In, Tag, Value};
use serde_json::{Number, Value as Json};

use crate::events::{ExifData, ImageSize};

/// Read every primary-image EXIF tag from `path`.
///
/// Fails when the container has no parsable EXIF block; callers treat that as
/// "no EXIF" rather than as an error for the photo.
pub fn read_exif(path: &Path) -> Result<ExifData> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new()
        .read_from_container(&mut buf)
        .with_context(|| format!("parsing EXIF in {}", path.display()))?;

    let mut tags = BTreeMap::new();
    for field in exif.fields().filter(|f| f.ifd_num == In::PRIMARY) {
        if let Some(value) = field_to_json(field) {
            tags.insert(field.tag.to_string(), value);
        }
    }

    if let Some(lat) = gps_coordinate(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef) {
        tags.insert(ExifData::GPS_LATITUDE.to_string(), float(lat));
    }
    if let Some(lon) = gps_coordinate(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef) {
        tags.insert(ExifData::GPS_LONGITUDE.to_string(), float(lon));
    }
    match original_timestamp(&exif) {
        Some(ts) => {
            tags.insert(ExifData::DATE_TIME_ORIGINAL.to_string(), Json::from(ts));
        }
        None => {
            tags.remove(ExifData::DATE_TIME_ORIGINAL);
        }
    }

    let image_size = image::image_dimensions(path)
        .ok()
        .map(|(width, height)| ImageSize { width, height });

    Ok(ExifData { tags, image_size })
}

fn field_to_json(field: &Field) -> Option<Json> {
    let json = match &field.value {
        Value::Ascii(parts) => {
            let text = parts
                .first()
                .map(|raw| String::from_utf8_lossy(raw).trim_end_matches('\0').trim().to_string())?;
            Json::String(text)
        }
        Value::Byte(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::Short(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::Long(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::SByte(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::SShort(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::SLong(v) => collapse(v.iter().map(|n| Json::from(*n))),
        Value::Rational(v) => collapse(v.iter().map(|r| float(r.to_f64()))),
        Value::SRational(v) => collapse(v.iter().map(|r| float(r.to_f64()))),
        Value::Float(v) => collapse(v.iter().map(|n| float(f64::from(*n)))),
        Value::Double(v) => collapse(v.iter().map(|n| float(*n))),
        // Maker notes and other opaque blobs carry no useful display value.
        Value::Undefined(..) | Value::Unknown(..) => return None,
    };
    Some(json)
}

fn collapse(values: impl Iterator<Item = Json>) -> Json {
    let mut values: Vec<Json> = values.collect();
    if values.len() == 1 {
        values.remove(0)
    } else {
        Json::Array(values)
    }
}

fn float(v: f64) -> Json {
    Number::from_f64(v).map_or(Json::Null, Json::Number)
}

fn gps_coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(parts) = &field.value else {
        return None;
    };
    let dms: Vec<f64> = parts.iter().map(|r| r.to_f64()).collect();
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Ascii(v) => v.first().and_then(|s| s.first().copied()),
            _ => None,
        })
        .map(char::from);
    dms_to_decimal(&dms, reference)
}

/// Degrees/minutes/seconds plus an `N`/`S`/`E`/`W` reference to signed degrees.
pub(crate) fn dms_to_decimal(dms: &[f64], reference: Option<char>) -> Option<f64> {
    let degrees = *dms.first()?;
    let minutes = dms.get(1).copied().unwrap_or(0.0);
    let seconds = dms.get(2).copied().unwrap_or(0.0);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    if !value.is_finite() {
        return None;
    }
    match reference.map(|c| c.to_ascii_uppercase()) {
        Some('S') | Some('W') => Some(-value),
        _ => Some(value),
    }
}

fn original_timestamp(exif: &Exif) -> Option<i64> {
    let field = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;
    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;
    let naive = NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(u32::from(dt.hour), u32::from(dt.minute), u32::from(dt.second))?;
    // Camera clocks carry no zone; treat them as UTC like the caption does.
    Some(naive.and_utc().timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_southern_and_western_coordinates() {
        let lat = dms_to_decimal(&[33.0, 51.0, 54.0], Some('S')).unwrap();
        assert!((lat + 33.865).abs() < 1e-9);
        let lon = dms_to_decimal(&[151.0, 12.0, 36.0], Some('E')).unwrap();
        assert!((lon - 151.21).abs() < 1e-9);
        let west = dms_to_decimal(&[0.0, 7.0, 39.0], Some('w')).unwrap();
        assert!(west < 0.0);
    }

    #[test]
    fn missing_degrees_is_not_a_coordinate() {
        assert_eq!(dms_to_decimal(&[], Some('N')), None);
        assert_eq!(dms_to_decimal(&[f64::NAN, 0.0, 0.0], None), None);
    }

    #[test]
    fn single_values_collapse_to_scalars() {
        assert_eq!(collapse([Json::from(6u16)].into_iter()), Json::from(6u16));
        assert_eq!(
            collapse([Json::from(1u8), Json::from(2u8)].into_iter()),
            Json::Array(vec![Json::from(1u8), Json::from(2u8)])
        );
    }

    #[test]
    fn unreadable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.jpg");
        std::fs::write(&path, b"not a jpeg").unwrap();
        assert!(read_exif(&path).is_err());
        assert!(read_exif(&dir.path().join("missing.jpg")).is_err());
    }
}
