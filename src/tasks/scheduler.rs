//! Presentation scheduler.
//!
//! Owns the catalog, the selection policy and the current/next pair. Exactly
//! one timer is pending at a time: the running transition, a catalog retry
//! or a post-failure advance. Replacing or dropping it cancels whatever it
//! was counting down. The catalog re-poll runs on its own clock.

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use rand::Rng;
use rand::rngs::StdRng;
use tokio::select;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::{Sleep, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::SlideshowBackend;
use crate::config::SlideshowConfig;
use crate::error::{CatalogError, ImageDecodeFailure};
use crate::events::{CatalogEntry, PhotoDescriptor, SchedulerCommand};
use crate::processing::caption::Placeholder;
use crate::processing::effects::choose_effect;
use crate::render::{RenderCommand, Surface};
use crate::tasks::transition::Transition;

/// Next index to show out of `n`, never repeating `last` when `n > 1`.
pub fn pick_index<R: Rng + ?Sized>(
    n: usize,
    last: Option<usize>,
    sequential: bool,
    rng: &mut R,
) -> Option<usize> {
    match n {
        0 => None,
        1 => Some(0),
        _ if sequential => Some(last.map_or(0, |l| (l + 1) % n)),
        _ => loop {
            let draw = rng.random_range(0..n);
            if Some(draw) != last {
                break Some(draw);
            }
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Catalog not loaded yet.
    Empty,
    /// Catalog loaded, first photo not shown yet.
    AwaitingFirst,
    Displaying,
}

#[derive(Debug, Default)]
pub struct SchedulerState {
    pub last_index: Option<usize>,
    pub current: Option<PhotoDescriptor>,
    pub next: Option<Arc<PhotoDescriptor>>,
    pub loaded: bool,
    pub suspended: bool,
    /// An enrichment request is in flight.
    pub awaiting_next: bool,
    /// The last cycle ended with no `next`; promote as soon as one arrives.
    pub preparing: bool,
}

impl SchedulerState {
    pub fn phase(&self) -> SchedulerPhase {
        match (self.loaded, &self.current) {
            (false, _) => SchedulerPhase::Empty,
            (true, None) => SchedulerPhase::AwaitingFirst,
            (true, Some(_)) => SchedulerPhase::Displaying,
        }
    }

    /// Move `next` into `current`.
    ///
    /// If anything else still holds the `next` descriptor, `current` becomes a
    /// private copy, so edits to it never show through other references.
    pub fn promote(&mut self) -> Option<&mut PhotoDescriptor> {
        let next = self.next.take()?;
        self.current = Some(Arc::unwrap_or_clone(next));
        self.current.as_mut()
    }
}

enum Inbound {
    Catalog(Result<Vec<CatalogEntry>, CatalogError>),
    Enriched(PhotoDescriptor),
}

enum TimerFired {
    TransitionEnded(Result<(), ImageDecodeFailure>),
    RetryCatalog,
    Advance,
}

type Timer = Pin<Box<dyn Future<Output = TimerFired> + Send>>;

struct Scheduler {
    config: SlideshowConfig,
    backend: Arc<dyn SlideshowBackend>,
    surface: Arc<dyn Surface>,
    rng: StdRng,
    state: SchedulerState,
    catalog: Vec<CatalogEntry>,
    catalog_in_flight: bool,
    /// A re-poll failed; the backend may have lost the instance.
    reregister: bool,
    forbidden: bool,
    timer: Option<Timer>,
    poll: Option<Pin<Box<Sleep>>>,
    inbound: Sender<Inbound>,
}

/// Drive the slideshow until `cancel` fires.
pub async fn run(
    config: SlideshowConfig,
    backend: Arc<dyn SlideshowBackend>,
    surface: Arc<dyn Surface>,
    mut commands: Receiver<SchedulerCommand>,
    cancel: CancellationToken,
    rng: StdRng,
) -> Result<()> {
    let (inbound, mut replies) = mpsc::channel(16);
    let mut scheduler = Scheduler {
        config,
        backend,
        surface,
        rng,
        state: SchedulerState::default(),
        catalog: Vec::new(),
        catalog_in_flight: false,
        reregister: false,
        forbidden: false,
        timer: None,
        poll: None,
        inbound,
    };
    scheduler.show_placeholder(Placeholder::Loading);
    scheduler.fetch_catalog();

    loop {
        select! {
            _ = cancel.cancelled() => break,
            fired = fire(&mut scheduler.timer) => scheduler.on_timer(fired),
            _ = fire(&mut scheduler.poll) => scheduler.on_poll(),
            Some(reply) = replies.recv() => match reply {
                Inbound::Catalog(result) => scheduler.on_catalog(result),
                Inbound::Enriched(photo) => scheduler.on_enriched(photo),
            },
            Some(command) = commands.recv() => scheduler.on_command(command),
        }
    }
    debug!("scheduler stopped");
    Ok(())
}

async fn fire<F: Future + Unpin>(slot: &mut Option<F>) -> F::Output {
    match slot {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

impl Scheduler {
    fn show_placeholder(&self, placeholder: Placeholder) {
        self.surface.render(RenderCommand::Placeholder {
            text: placeholder.text(&self.config.language).to_string(),
        });
    }

    fn arm(&mut self, timer: Timer) {
        // Replacing the slot drops, and so cancels, any pending timer.
        self.timer = Some(timer);
    }

    fn arm_after(&mut self, delay: std::time::Duration, fired: TimerFired) {
        self.arm(Box::pin(async move {
            sleep(delay).await;
            fired
        }));
    }

    fn fetch_catalog(&mut self) {
        if self.catalog_in_flight || self.forbidden {
            return;
        }
        self.catalog_in_flight = true;
        let register = (!self.state.loaded || self.reregister).then(|| self.config.instance());
        let id = self.config.id.clone();
        let backend = self.backend.clone();
        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            let result: Result<Vec<CatalogEntry>, CatalogError> = async {
                if let Some(instance) = register.as_ref() {
                    backend.register(instance).await?;
                }
                backend.fetch_catalog(&id).await
            }
            .await;
            if inbound.send(Inbound::Catalog(result)).await.is_err() {
                debug!("scheduler gone; dropping catalog reply");
            }
        });
    }

    fn request_next(&mut self) {
        let Some(idx) = pick_index(
            self.catalog.len(),
            self.state.last_index,
            self.config.sequential,
            &mut self.rng,
        ) else {
            return;
        };
        self.state.last_index = Some(idx);
        self.state.awaiting_next = true;

        let photo = PhotoDescriptor::from(self.catalog[idx].clone());
        debug!(path = %photo.path, index = idx, "prefetching next photo");
        let id = self.config.id.clone();
        let backend = self.backend.clone();
        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            let enriched = match backend.request_metadata(&id, photo.minimal()).await {
                Ok(enriched) => enriched,
                Err(err) => {
                    warn!(path = %photo.path, error = %err, "metadata request failed; using bare photo");
                    photo
                }
            };
            if inbound.send(Inbound::Enriched(enriched)).await.is_err() {
                debug!("scheduler gone; dropping metadata reply");
            }
        });
    }

    fn on_catalog(&mut self, result: Result<Vec<CatalogEntry>, CatalogError>) {
        self.catalog_in_flight = false;
        match result {
            Ok(entries) => {
                info!(count = entries.len(), "catalog loaded");
                self.catalog = entries;
                self.reregister = false;
                if !self.state.loaded {
                    self.state.loaded = true;
                    self.poll = Some(Box::pin(sleep(self.config.catalog_poll_interval)));
                }
                let idle = self.state.current.is_none() || self.state.preparing;
                if idle && self.state.next.is_none() && !self.state.awaiting_next {
                    self.request_next();
                }
            }
            Err(err) if err.is_permanent() => {
                error!(error = %err, "catalog access refused; giving up");
                self.forbidden = true;
                self.poll = None;
            }
            Err(err) if !self.state.loaded => {
                warn!(error = %err, retry_in = ?self.config.retry_delay, "catalog unavailable");
                if !self.state.suspended {
                    self.arm_after(self.config.retry_delay, TimerFired::RetryCatalog);
                }
            }
            Err(err) => {
                warn!(error = %err, "catalog re-poll failed; keeping previous catalog");
                self.reregister = true;
            }
        }
    }

    fn on_enriched(&mut self, photo: PhotoDescriptor) {
        debug!(path = %photo.path, location = ?photo.location, "next photo ready");
        self.state.awaiting_next = false;
        self.state.next = Some(Arc::new(photo));
        if self.state.suspended {
            return;
        }
        if self.state.current.is_none() || self.state.preparing {
            self.advance();
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        self.timer = None;
        match fired {
            TimerFired::TransitionEnded(Ok(())) | TimerFired::Advance => self.advance(),
            TimerFired::TransitionEnded(Err(err)) => {
                warn!(error = %err, "skipping photo");
                self.arm_after(self.config.retry_delay, TimerFired::Advance);
            }
            TimerFired::RetryCatalog => self.fetch_catalog(),
        }
    }

    fn on_poll(&mut self) {
        self.poll = Some(Box::pin(sleep(self.config.catalog_poll_interval)));
        self.fetch_catalog();
    }

    fn on_command(&mut self, command: SchedulerCommand) {
        let suspend = match command {
            SchedulerCommand::Suspend => true,
            SchedulerCommand::Resume => false,
            SchedulerCommand::ToggleSuspend => !self.state.suspended,
        };
        if suspend == self.state.suspended {
            return;
        }
        self.state.suspended = suspend;
        if suspend {
            info!("slideshow suspended");
            self.timer = None;
            return;
        }
        info!("slideshow resumed");
        if self.state.loaded {
            self.advance();
        } else {
            self.fetch_catalog();
        }
    }

    /// End of a display cycle: promote `next` or show the preparing placeholder.
    fn advance(&mut self) {
        debug!(
            phase = ?self.state.phase(),
            has_next = self.state.next.is_some(),
            "display cycle ended"
        );
        if self.state.next.is_none() {
            // Promote whatever arrives next, even after a re-poll refills an empty catalog.
            self.state.preparing = true;
            if self.catalog.is_empty() {
                self.show_placeholder(Placeholder::Loading);
                return;
            }
            self.show_placeholder(Placeholder::Preparing);
            if !self.state.awaiting_next {
                self.request_next();
            }
            return;
        }

        self.state.preparing = false;
        let Some(current) = self.state.promote() else {
            return;
        };
        let plan = choose_effect(current, &self.config, &mut self.rng);
        current.effect = plan.label();
        let photo = current.clone();
        info!(
            path = %photo.path,
            effect = ?photo.effect,
            effect_duration = ?plan.duration(),
            "showing photo"
        );

        self.request_next();
        let transition = Transition::new(self.surface.clone(), photo, plan, &self.config);
        self.arm(Box::pin(async move {
            TimerFired::TransitionEnded(transition.run().await)
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn random_picks_never_repeat() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 2..6 {
            let mut last = None;
            for _ in 0..500 {
                let idx = pick_index(n, last, false, &mut rng).unwrap();
                assert!(idx < n);
                assert_ne!(Some(idx), last);
                last = Some(idx);
            }
        }
    }

    #[test]
    fn sequential_wraps_around() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut last = None;
        let picks: Vec<usize> = (0..7)
            .map(|_| {
                let idx = pick_index(3, last, true, &mut rng).unwrap();
                last = Some(idx);
                idx
            })
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
        // catalog shrank below the previous index
        assert_eq!(pick_index(2, Some(5), true, &mut rng), Some(0));
    }

    #[test]
    fn single_and_empty_catalogs() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(pick_index(1, Some(0), false, &mut rng), Some(0));
        assert_eq!(pick_index(1, Some(0), true, &mut rng), Some(0));
        assert_eq!(pick_index(0, None, false, &mut rng), None);
    }

    #[test]
    fn promoted_copy_is_independent_of_retained_next() {
        let mut state = SchedulerState::default();
        let retained = Arc::new(PhotoDescriptor::new("a.jpg", "/photo/x/a.jpg"));
        state.next = Some(retained.clone());

        let current = state.promote().unwrap();
        current.effect = Some("ip-zoom".into());

        assert!(state.next.is_none());
        assert_eq!(retained.effect, None);
        assert_eq!(
            state.current.as_ref().and_then(|c| c.effect.as_deref()),
            Some("ip-zoom")
        );
    }

    #[test]
    fn phase_follows_loaded_and_current() {
        let mut state = SchedulerState::default();
        assert_eq!(state.phase(), SchedulerPhase::Empty);
        state.loaded = true;
        assert_eq!(state.phase(), SchedulerPhase::AwaitingFirst);
        state.next = Some(Arc::new(PhotoDescriptor::new("a.jpg", "/a")));
        state.promote();
        assert_eq!(state.phase(), SchedulerPhase::Displaying);
        assert!(state.promote().is_none());
    }
}
