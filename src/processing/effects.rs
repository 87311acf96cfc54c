//! Motion effect selection.
//!
//! Regular photos get a named preset applied declaratively. Photos with
//! detected faces may instead get a motion anchored on one face: either a
//! generated pan/zoom keyframe toward a fixed anchor or a named zoom-out
//! preset whose transform origin sits on the face.

use std::time::Duration;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::config::{DurationRange, FACE_ZOOM_MARKER, FaceZoomOptions, SlideshowConfig};
use crate::events::{FaceBox, PhotoDescriptor};

/// Translation (percent of the element box) and uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate_x_pct: f64,
    pub translate_y_pct: f64,
    pub scale: f64,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translate_x_pct: 0.0,
        translate_y_pct: 0.0,
        scale: 1.0,
    };

    pub fn css(&self) -> String {
        format!(
            "translate({:.2}%, {:.2}%) scale({:.3})",
            self.translate_x_pct, self.translate_y_pct, self.scale
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EffectPlan {
    None,
    Preset {
        name: String,
        duration: Duration,
    },
    /// One-shot keyframe from `from` to `to`; the definition is removed after playback.
    FacePan {
        keyframes_name: String,
        from: Transform,
        to: Transform,
        duration: Duration,
    },
    /// Named preset played with its transform origin at `origin` (fractions of width/height).
    FaceZoomOut {
        origin: (f64, f64),
        preset: String,
        duration: Duration,
    },
}

impl EffectPlan {
    /// Diagnostic label stamped onto the descriptor's `effect` field.
    pub fn label(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Preset { name, .. } => Some(name.clone()),
            Self::FacePan { .. } => Some(FACE_ZOOM_MARKER.to_string()),
            Self::FaceZoomOut { preset, .. } => Some(preset.clone()),
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Preset { duration, .. }
            | Self::FacePan { duration, .. }
            | Self::FaceZoomOut { duration, .. } => Some(*duration),
        }
    }
}

pub fn choose_effect<R: Rng + ?Sized>(
    photo: &PhotoDescriptor,
    cfg: &SlideshowConfig,
    rng: &mut R,
) -> EffectPlan {
    if let Some((face, width, height)) = face_candidate(photo, cfg, rng) {
        let center = face.center_fraction(width, height);
        let duration = random_duration(&cfg.effect_duration, rng);
        return if rng.random_bool(0.5) {
            EffectPlan::FacePan {
                keyframes_name: format!("ip-facepan-{:08x}", rng.random::<u32>()),
                from: Transform::IDENTITY,
                to: face_pan_target(center, &cfg.face_zoom),
                duration,
            }
        } else {
            EffectPlan::FaceZoomOut {
                origin: center,
                preset: cfg.face_zoom.zoom_out_preset.clone(),
                duration,
            }
        };
    }

    let presets: Vec<&str> = cfg.presets().collect();
    match presets.choose(rng) {
        Some(name) => EffectPlan::Preset {
            name: (*name).to_string(),
            duration: random_duration(&cfg.effect_duration, rng),
        },
        None => EffectPlan::None,
    }
}

/// Face box picked for the anchored motion, with the detector's image size.
fn face_candidate<R: Rng + ?Sized>(
    photo: &PhotoDescriptor,
    cfg: &SlideshowConfig,
    rng: &mut R,
) -> Option<(FaceBox, u32, u32)> {
    if !cfg.face_zoom_enabled() {
        return None;
    }
    let face = photo.face.as_ref().filter(|f| !f.faces.is_empty())?;
    if !rng.random_bool(cfg.face_zoom.probability.clamp(0.0, 1.0)) {
        return None;
    }
    let picked = face.faces.choose(rng)?;
    Some((*picked, face.width, face.height))
}

/// Scaled transform that moves the face centre toward the configured anchor.
pub fn face_pan_target(center: (f64, f64), opts: &FaceZoomOptions) -> Transform {
    let s = opts.extra_scale;
    let bound = opts.max_translate_percent;
    let axis = |anchor: f64, c: f64| ((anchor - s * (c - 0.5)) * 100.0).clamp(-bound, bound);
    Transform {
        translate_x_pct: axis(opts.anchor[0], center.0),
        translate_y_pct: axis(opts.anchor[1], center.1),
        scale: 1.0 + s,
    }
}

fn random_duration<R: Rng + ?Sized>(range: &DurationRange, rng: &mut R) -> Duration {
    let min = range.min.as_millis() as u64;
    let max = (range.max.as_millis() as u64).max(min);
    Duration::from_millis(rng.random_range(min..=max))
}
