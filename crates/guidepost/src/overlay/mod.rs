//! Guided onboarding overlay.
//!
//! [`OnboardingOverlay`] shows a short sequence of instructions on top of the
//! host page. On a client's first visit it opens by itself after a delay and
//! records a persisted "seen" flag so it never opens by itself again. The user
//! can reopen it at any time with the toggle.
//!
//! ```text
//! Hidden --(timer, first visit only)--> Visible(0)
//! Hidden --(toggle)--> Visible(current)
//! Visible --(toggle | outside interaction)--> Hidden
//! Visible(i) --(next, i < N-1)--> Visible(i + 1)
//! Visible(N-1) --(finish)--> Hidden + acknowledgment
//! ```

mod geometry;
mod state;
mod timer;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::OverlayConfig;
use crate::error::{Error, Result};
use crate::storage::{is_flag_set, FlagStore, FLAG_SET};

pub use geometry::{Point, Rect};
pub use state::{InstructionStep, OverlayState, Phase};
pub use timer::OneShotTimer;

/// Construction options for an [`OnboardingOverlay`].
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayOptions {
    steps: Vec<InstructionStep>,
    first_visit_delay: Duration,
    storage_key: String,
    completion_message: String,
}

impl OverlayOptions {
    /// Options with the given instructions and default everything else.
    ///
    /// # Errors
    ///
    /// Returns an error if `instructions` is empty.
    pub fn new<I, S>(instructions: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let defaults = OverlayConfig::default();
        let steps: Vec<_> = instructions
            .into_iter()
            .map(InstructionStep::new)
            .collect();
        if steps.is_empty() {
            return Err(Error::config_validation(
                "an onboarding overlay needs at least one instruction",
            ));
        }
        Ok(Self {
            steps,
            first_visit_delay: Duration::from_millis(defaults.first_visit_delay_ms),
            storage_key: defaults.storage_key,
            completion_message: defaults.completion_message,
        })
    }

    /// Options taken from the `[overlay]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration has no instructions.
    pub fn from_config(config: &OverlayConfig) -> Result<Self> {
        Ok(Self::new(config.instructions.iter().cloned())?
            .with_first_visit_delay(Duration::from_millis(config.first_visit_delay_ms))
            .with_storage_key(config.storage_key.clone())
            .with_completion_message(config.completion_message.clone()))
    }

    /// Set the first-visit delay.
    #[must_use]
    pub fn with_first_visit_delay(mut self, delay: Duration) -> Self {
        self.first_visit_delay = delay;
        self
    }

    /// Set the key of the persisted flag.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the acknowledgment shown on finish.
    #[must_use]
    pub fn with_completion_message(mut self, message: impl Into<String>) -> Self {
        self.completion_message = message.into();
        self
    }

    /// The instruction steps.
    #[must_use]
    pub fn steps(&self) -> &[InstructionStep] {
        &self.steps
    }

    /// The first-visit delay.
    #[must_use]
    pub fn first_visit_delay(&self) -> Duration {
        self.first_visit_delay
    }

    /// The key of the persisted flag.
    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

impl Default for OverlayOptions {
    fn default() -> Self {
        let config = OverlayConfig::default();
        Self {
            steps: config
                .instructions
                .into_iter()
                .map(InstructionStep::new)
                .collect(),
            first_visit_delay: Duration::from_millis(config.first_visit_delay_ms),
            storage_key: config.storage_key,
            completion_message: config.completion_message,
        }
    }
}

/// Message the host shows when the user finishes the sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgment {
    /// Text to show.
    pub message: String,
}

impl fmt::Display for Acknowledgment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug)]
struct Inner {
    state: OverlayState,
    panel: Option<Rect>,
    disposed: bool,
}

/// State reachable from both the view and the timer task.
struct Shared {
    steps: Vec<InstructionStep>,
    storage_key: String,
    store: Arc<dyn FlagStore>,
    inner: Mutex<Inner>,
    updates: watch::Sender<OverlayState>,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("steps", &self.steps.len())
            .field("storage_key", &self.storage_key)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Shared {
    /// Run `f` against the inner state and publish the result if it changed.
    fn update<R>(&self, event: &str, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = inner.state;
        let result = f(&mut *inner);
        let after = inner.state;

        if before != after {
            debug!(
                event,
                from = %before.phase(),
                to = %after.phase(),
                "Overlay transition"
            );
            self.updates.send_replace(after);
        }
        result
    }

    fn snapshot(&self) -> OverlayState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// First-visit timer callback.
    ///
    /// The flag is written after the state lock is released. An unmount that
    /// lands between the two still gets the write: the overlay was shown.
    fn present_first_visit(&self) {
        let shown = self.update("first_visit", |inner| {
            if inner.disposed {
                return false;
            }
            inner.state.show();
            true
        });
        if !shown {
            return;
        }

        if let Err(err) = self.store.set_item(&self.storage_key, FLAG_SET) {
            warn!(
                key = %self.storage_key,
                error = %err,
                "Could not persist onboarding flag; it may be shown again next session"
            );
        }
    }
}

/// The onboarding overlay component.
///
/// Mount it with [`OnboardingOverlay::mount`], drive it from UI event
/// handlers, and tear it down with [`OnboardingOverlay::unmount`] (or by
/// dropping it). Teardown cancels a pending first-visit timer.
#[derive(Debug)]
pub struct OnboardingOverlay {
    shared: Arc<Shared>,
    completion_message: String,
    timer: Option<OneShotTimer>,
}

impl OnboardingOverlay {
    /// Mount the overlay.
    ///
    /// Reads the persisted flag from `store`. If the flag is absent, or the
    /// store cannot be read, a first-visit timer is scheduled on the current
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a timer is needed but there is no Tokio runtime.
    pub fn mount(options: OverlayOptions, store: Arc<dyn FlagStore>) -> Result<Self> {
        let seen = match store.get_item(&options.storage_key) {
            Ok(value) => is_flag_set(value.as_deref()),
            Err(err) => {
                warn!(
                    key = %options.storage_key,
                    error = %err,
                    "Could not read onboarding flag; treating as first visit"
                );
                false
            }
        };

        let (updates, _) = watch::channel(OverlayState::default());
        let shared = Arc::new(Shared {
            steps: options.steps,
            storage_key: options.storage_key,
            store,
            inner: Mutex::new(Inner {
                state: OverlayState::default(),
                panel: None,
                disposed: false,
            }),
            updates,
        });

        let timer = if seen {
            debug!("Onboarding already seen; not scheduling");
            None
        } else {
            info!(
                delay = ?options.first_visit_delay,
                "First visit; scheduling onboarding overlay"
            );
            let target = Arc::clone(&shared);
            Some(OneShotTimer::schedule(
                options.first_visit_delay,
                move || target.present_first_visit(),
            )?)
        };

        Ok(Self {
            shared,
            completion_message: options.completion_message,
            timer,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> OverlayState {
        self.shared.snapshot()
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    /// All instruction steps.
    #[must_use]
    pub fn steps(&self) -> &[InstructionStep] {
        &self.shared.steps
    }

    /// The step at `current_index`.
    #[must_use]
    pub fn current_step(&self) -> &InstructionStep {
        // current_index is kept in bounds by every transition.
        &self.shared.steps[self.state().current_index]
    }

    /// Whether the first-visit timer is still waiting.
    #[must_use]
    pub fn first_visit_pending(&self) -> bool {
        self.timer.as_ref().is_some_and(OneShotTimer::is_pending)
    }

    /// Watch state changes.
    ///
    /// The receiver sees every transition, including the one made by the
    /// first-visit timer.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OverlayState> {
        self.shared.updates.subscribe()
    }

    /// Flip visibility. The current step is kept.
    pub fn toggle_visibility(&self) -> OverlayState {
        self.shared.update("toggle", |inner| {
            inner.state.toggle();
            inner.state
        })
    }

    /// Move to the next step. No-op on the last step.
    pub fn next(&self) -> OverlayState {
        let count = self.shared.step_count();
        self.shared.update("next", |inner| {
            inner.state.advance(count);
            inner.state
        })
    }

    /// Finish the sequence from the last step.
    ///
    /// Returns the acknowledgment to show when the overlay closed, or `None`
    /// when it was not open on the last step.
    pub fn finish(&self) -> Option<Acknowledgment> {
        let count = self.shared.step_count();
        let finished = self
            .shared
            .update("finish", |inner| inner.state.finish(count));

        finished.then(|| Acknowledgment {
            message: self.completion_message.clone(),
        })
    }

    /// Record where the instruction panel was laid out. `None` clears it.
    pub fn set_panel_bounds(&self, bounds: Option<Rect>) {
        self.shared.update("layout", |inner| inner.panel = bounds);
    }

    /// Handle a pointer interaction at `point`.
    ///
    /// Closes the overlay when it is visible and `point` lies outside the
    /// instruction panel. Without reported panel bounds nothing happens.
    /// Returns whether the overlay closed.
    pub fn handle_outside_interaction(&self, point: Point) -> bool {
        self.shared.update("outside_interaction", |inner| {
            let outside = inner.panel.is_some_and(|panel| !panel.contains(point));
            if inner.state.visible && outside {
                inner.state.hide();
                true
            } else {
                false
            }
        })
    }

    /// Tear the overlay down, cancelling a pending first-visit timer.
    pub fn unmount(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        self.shared.update("unmount", |inner| inner.disposed = true);
        if let Some(timer) = self.timer.take() {
            if timer.is_pending() {
                debug!("Cancelling pending first-visit timer");
            }
            timer.cancel();
        }
    }
}

impl Drop for OnboardingOverlay {
    fn drop(&mut self) {
        self.dispose();
    }
}
