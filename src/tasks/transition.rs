use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tracing::debug;

use crate::config::{SlideshowConfig, TransitionTimings};
use crate::error::ImageDecodeFailure;
use crate::events::PhotoDescriptor;
use crate::processing::caption::caption_lines;
use crate::processing::color::dominant_color;
use crate::processing::effects::EffectPlan;
use crate::processing::layout::{classify_orientation, scale_image};
use crate::render::{RenderCommand, Surface};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    BlackHold,
    FadeIn,
    DisplayHold,
    FadeOut,
}

/// One display cycle for one photo.
pub struct Transition {
    surface: Arc<dyn Surface>,
    photo: PhotoDescriptor,
    plan: EffectPlan,
    timings: TransitionTimings,
    letterbox: bool,
    /// Blur radius of the backdrop; `None` leaves the bars in the background colour.
    backdrop_blur: Option<u32>,
    opacity: f32,
    show_caption: bool,
}

impl Transition {
    pub fn new(
        surface: Arc<dyn Surface>,
        photo: PhotoDescriptor,
        plan: EffectPlan,
        config: &SlideshowConfig,
    ) -> Self {
        Self {
            surface,
            photo,
            plan,
            timings: config.timings(),
            letterbox: config.letterbox,
            backdrop_blur: config.fill.then_some(config.blur),
            opacity: config.opacity,
            show_caption: config.show_exif,
        }
    }

    /// Decode, stage and play the photo through the four phases.
    ///
    /// Resolves once the fade-out has finished; a decode failure resolves
    /// immediately without touching the stage.
    pub async fn run(self) -> Result<(), ImageDecodeFailure> {
        let black_end = Instant::now() + self.timings.black;
        self.enter(TransitionPhase::BlackHold);
        let decoded = self.surface.decode(&self.photo.url).await?;

        let rgb = decoded
            .pixels
            .as_ref()
            .and_then(dominant_color)
            .unwrap_or([0, 0, 0]);
        self.surface.render(RenderCommand::Background { rgb });
        if let Some(blur) = self.backdrop_blur {
            self.surface.render(RenderCommand::Backdrop {
                url: self.photo.url.clone(),
                blur,
            });
        }

        let (vw, vh) = self.surface.viewport();
        let placement = scale_image(
            i64::from(decoded.width),
            i64::from(decoded.height),
            i64::from(vw),
            i64::from(vh),
            self.letterbox,
        );
        self.surface.render(RenderCommand::ClearPlaceholder);
        self.surface.render(RenderCommand::Place {
            url: self.photo.url.clone(),
            placement,
            orientation: classify_orientation(&self.photo),
            opacity: self.opacity,
        });
        if self.show_caption {
            let lines = caption_lines(&self.photo);
            if !lines.is_empty() {
                self.surface.render(RenderCommand::Caption { lines });
            }
        }
        sleep_until(black_end).await;

        self.enter(TransitionPhase::FadeIn);
        let mut cleanup = self.start_effect();
        self.surface.render(RenderCommand::Fade {
            opacity: 1.0,
            over: self.timings.fade,
        });
        let mut deadline = Instant::now() + self.timings.fade;
        self.hold_until(deadline, &mut cleanup).await;

        self.enter(TransitionPhase::DisplayHold);
        deadline += self.timings.display;
        self.hold_until(deadline, &mut cleanup).await;

        self.enter(TransitionPhase::FadeOut);
        self.surface.render(RenderCommand::Fade {
            opacity: 0.0,
            over: self.timings.fade,
        });
        deadline += self.timings.fade;
        self.hold_until(deadline, &mut cleanup).await;

        if let Some((_, name)) = cleanup {
            self.surface.render(RenderCommand::RemoveKeyframes { name });
        }
        Ok(())
    }

    fn enter(&self, phase: TransitionPhase) {
        debug!(path = %self.photo.path, phase = ?phase, "transition phase");
    }

    /// Apply the chosen motion. Returns when and which generated keyframes to drop.
    fn start_effect(&self) -> Option<(Instant, String)> {
        match &self.plan {
            EffectPlan::None => None,
            EffectPlan::Preset { name, duration } => {
                self.apply(name, *duration, None);
                None
            }
            EffectPlan::FacePan {
                keyframes_name,
                from,
                to,
                duration,
            } => {
                self.surface.render(RenderCommand::DefineKeyframes {
                    name: keyframes_name.clone(),
                    from: *from,
                    to: *to,
                });
                self.apply(keyframes_name, *duration, None);
                Some((Instant::now() + *duration, keyframes_name.clone()))
            }
            EffectPlan::FaceZoomOut {
                origin,
                preset,
                duration,
            } => {
                self.apply(preset, *duration, Some(*origin));
                None
            }
        }
    }

    fn apply(&self, name: &str, duration: Duration, origin: Option<(f64, f64)>) {
        self.surface.render(RenderCommand::ApplyEffect {
            name: name.to_string(),
            duration,
            origin,
        });
    }

    async fn hold_until(&self, deadline: Instant, cleanup: &mut Option<(Instant, String)>) {
        let due = cleanup
            .as_ref()
            .map(|(at, _)| *at)
            .filter(|at| *at <= deadline);
        if let Some(at) = due {
            sleep_until(at).await;
            if let Some((_, name)) = cleanup.take() {
                self.surface.render(RenderCommand::RemoveKeyframes { name });
            }
        }
        sleep_until(deadline).await;
    }
}
