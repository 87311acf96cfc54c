use std::io::Cursor;

use futures::future::BoxFuture;
use image::RgbaImage;
use tracing::{debug, info};

use super::{DecodedImage, RenderCommand, Surface};
use crate::error::ImageDecodeFailure;
use crate::processing::color::css_rgb;

/// Surface without a screen: fetches and decodes photos over HTTP and logs
/// every render command.
pub struct HeadlessSurface {
    client: reqwest::Client,
    base_url: String,
    viewport: (u32, u32),
}

impl HeadlessSurface {
    pub fn new(base_url: &str, viewport: (u32, u32)) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            viewport,
        }
    }

    fn absolute(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    async fn fetch_and_decode(&self, url: &str) -> Result<DecodedImage, ImageDecodeFailure> {
        let failure = |reason: String| ImageDecodeFailure {
            url: url.to_string(),
            reason,
        };
        let resp = self
            .client
            .get(self.absolute(url))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| failure(err.to_string()))?;
        let bytes = resp.bytes().await.map_err(|err| failure(err.to_string()))?;

        let pixels = tokio::task::spawn_blocking(move || decode_oriented(&bytes))
            .await
            .map_err(|err| failure(err.to_string()))?
            .map_err(|err| failure(format!("{err:#}")))?;
        debug!(url, width = pixels.width(), height = pixels.height(), "decoded photo");
        Ok(DecodedImage {
            width: pixels.width(),
            height: pixels.height(),
            pixels: Some(pixels),
        })
    }
}

impl Surface for HeadlessSurface {
    fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    fn decode<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage, ImageDecodeFailure>> {
        Box::pin(self.fetch_and_decode(url))
    }

    fn render(&self, command: RenderCommand) {
        match &command {
            RenderCommand::Placeholder { text } => info!(%text, "placeholder"),
            RenderCommand::Background { rgb } => debug!(color = %css_rgb(*rgb), "background"),
            RenderCommand::Backdrop { url, blur } => debug!(%url, blur, "blurred backdrop"),
            RenderCommand::Place {
                url,
                placement,
                orientation,
                opacity,
            } => info!(
                %url,
                width = placement.width,
                height = placement.height,
                left = placement.left,
                top = placement.top,
                orientation = ?orientation,
                opacity,
                "place photo"
            ),
            RenderCommand::DefineKeyframes { name, from, to } => {
                debug!(%name, from = %from.css(), to = %to.css(), "define keyframes");
            }
            RenderCommand::Caption { lines } => info!(caption = %lines.join(" | "), "caption"),
            other => debug!(command = ?other, "render"),
        }
    }
}

/// Decode `bytes` to RGBA8 with EXIF orientation applied.
pub fn decode_oriented(bytes: &[u8]) -> anyhow::Result<RgbaImage> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?
        .to_rgba8();
    Ok(apply_orientation(img, read_orientation(bytes).unwrap_or(1)))
}

fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?
        .value
        .get_uint(0)
}

fn apply_orientation(img: RgbaImage, orientation: u32) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn orientation_six_swaps_axes() {
        let img = RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255]));
        let rotated = apply_orientation(img.clone(), 6);
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_eq!(apply_orientation(img, 1).dimensions(), (4, 2));
    }

    #[test]
    fn relative_urls_resolve_against_backend() {
        let surface = HeadlessSurface::new("http://127.0.0.1:8080/", (800, 600));
        assert_eq!(
            surface.absolute("/photo/a/b.jpg"),
            "http://127.0.0.1:8080/photo/a/b.jpg"
        );
        assert_eq!(surface.absolute("https://x/y.jpg"), "https://x/y.jpg");
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        assert!(decode_oriented(b"definitely not an image").is_err());
    }
}
