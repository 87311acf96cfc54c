use image::imageops::{self, FilterType};
use image::RgbaImage;

/// Side length of the grid the photo is reduced to before averaging.
pub const SAMPLE_GRID: u32 = 40;

/// Alpha-weighted mean colour of a photo reduced to a `SAMPLE_GRID` square.
///
/// `None` when the image has no opaque pixels to sample.
pub fn dominant_color(img: &RgbaImage) -> Option<[u8; 3]> {
    if img.width() == 0 || img.height() == 0 {
        return None;
    }
    let grid = imageops::resize(img, SAMPLE_GRID, SAMPLE_GRID, FilterType::Triangle);

    let mut accum = [0f64; 3];
    let mut total = 0f64;
    for pixel in grid.pixels() {
        let alpha = f64::from(pixel[3]) / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        total += alpha;
        for c in 0..3 {
            accum[c] += f64::from(pixel[c]) * alpha;
        }
    }
    if total <= f64::EPSILON {
        return None;
    }
    Some(accum.map(|sum| (sum / total).round().clamp(0.0, 255.0) as u8))
}

/// CSS-style `rgb(r, g, b)` string for a sampled colour.
pub fn css_rgb([r, g, b]: [u8; 3]) -> String {
    format!("rgb({r}, {g}, {b})")
}
