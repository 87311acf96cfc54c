use crate::events::{ImageSize, PhotoDescriptor};

/// Placement of a photo inside the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScaledImage {
    pub width: u32,
    pub height: u32,
    /// Whether the chosen scale was the fit-by-width one.
    pub scale_to_target_width: bool,
    pub left: i64,
    pub top: i64,
}

/// Fit a `src_w`×`src_h` image into a `dst_w`×`dst_h` target.
///
/// With `letterbox` the whole image stays visible; without it the target is
/// fully covered and the overflow cropped. Offsets may be negative in cover
/// mode. Any non-positive dimension yields the zero placement.
pub fn scale_image(src_w: i64, src_h: i64, dst_w: i64, dst_h: i64, letterbox: bool) -> ScaledImage {
    if src_w <= 0 || src_h <= 0 || dst_w <= 0 || dst_h <= 0 {
        return ScaledImage::default();
    }
    let (sw, sh, dw, dh) = (src_w as f64, src_h as f64, dst_w as f64, dst_h as f64);

    let by_width = (dw, (sh * dw / sw).floor());
    let by_height = ((sw * dh / sh).floor(), dh);
    let overflows_width = by_height.0 > dw;
    let scale_to_target_width = overflows_width == letterbox;
    let (w, h) = if scale_to_target_width {
        by_width
    } else {
        by_height
    };

    ScaledImage {
        width: w as u32,
        height: h as u32,
        scale_to_target_width,
        left: ((dw - w) / 2.0).floor() as i64,
        top: ((dh - h) / 2.0).floor() as i64,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    fn of(size: ImageSize) -> Self {
        if size.width > size.height {
            Self::Landscape
        } else {
            Self::Portrait
        }
    }
}

/// Orientation from the best available dimensions: detector output, then
/// the decoded size recorded with the EXIF data, then the camera's own
/// pixel-dimension tags. Portrait when nothing is known.
pub fn classify_orientation(photo: &PhotoDescriptor) -> Orientation {
    let from_face = photo
        .face
        .as_ref()
        .filter(|f| f.width > 0 && f.height > 0)
        .map(|f| ImageSize {
            width: f.width,
            height: f.height,
        });
    let exif = photo.exif.as_ref();
    from_face
        .or_else(|| exif.and_then(|e| e.image_size))
        .or_else(|| exif.and_then(|e| e.alternate_size()))
        .map_or(Orientation::Portrait, Orientation::of)
}
