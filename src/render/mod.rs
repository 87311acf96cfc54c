//! Display boundary.
//!
//! The presentation engine never draws; it emits [`RenderCommand`]s to a
//! [`Surface`] and awaits image decodes from it.

pub mod headless;

use std::time::Duration;

use futures::future::BoxFuture;
use image::RgbaImage;

use crate::error::ImageDecodeFailure;
use crate::processing::effects::Transform;
use crate::processing::layout::{Orientation, ScaledImage};

pub use headless::HeadlessSurface;

#[derive(Debug, Clone, PartialEq)]
pub enum RenderCommand {
    /// Replace the stage with a text placeholder.
    Placeholder { text: String },
    ClearPlaceholder,
    /// Container colour the photo fades in from.
    Background { rgb: [u8; 3] },
    /// Blurred full-viewport copy of the photo behind the letterboxed one.
    Backdrop { url: String, blur: u32 },
    /// `opacity` is the photo's own resting opacity; fades act on its container.
    Place {
        url: String,
        placement: ScaledImage,
        orientation: Orientation,
        opacity: f32,
    },
    Fade { opacity: f32, over: Duration },
    DefineKeyframes {
        name: String,
        from: Transform,
        to: Transform,
    },
    /// Play keyframes (generated or preset) by name, optionally around a custom origin.
    ApplyEffect {
        name: String,
        duration: Duration,
        origin: Option<(f64, f64)>,
    },
    RemoveKeyframes { name: String },
    Caption { lines: Vec<String> },
}

/// A decoded photo. `pixels` is `None` when the surface cannot expose them
/// for sampling.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Option<RgbaImage>,
}

pub trait Surface: Send + Sync {
    /// Viewport size in pixels.
    fn viewport(&self) -> (u32, u32);

    fn decode<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<DecodedImage, ImageDecodeFailure>>;

    fn render(&self, command: RenderCommand);
}
