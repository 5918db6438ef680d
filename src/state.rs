//! Activation state machine
//!
//! The four-state lifecycle that gates the whole pipeline. The capture and
//! transcription workers poll this machine and react to its transitions;
//! the embedding application (hotkey handler, tray, whatever) drives it.
//!
//! Transitions that are not legal from the current state are silent no-ops,
//! never errors: pressing "pause" while nothing is recording should do
//! nothing, not blow up.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::observer::{ObserverId, ObserverRegistry};

/// Activation state of the voice-typing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationState {
    /// Pipeline is off. Workers idle, nothing is captured.
    #[default]
    Inactive,
    /// Pipeline is on and waiting for recording to start.
    Ready,
    /// Audio is being captured and transcribed.
    Recording,
    /// Pipeline is on but capture is paused; queued segments wait.
    Paused,
}

impl ActivationState {
    /// Human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            ActivationState::Inactive => "Inactive",
            ActivationState::Ready => "Ready to record",
            ActivationState::Recording => "Recording",
            ActivationState::Paused => "Paused",
        }
    }

    /// Whether audio capture and segment dispatch run in this state.
    pub fn is_processing(&self) -> bool {
        matches!(self, ActivationState::Recording)
    }
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

struct Inner {
    state: ActivationState,
    observers: ObserverRegistry<ActivationState>,
}

/// Thread-safe activation state machine with synchronous change notification.
///
/// Cloning shares the underlying state. Observers are notified inside the
/// critical section that performed the mutation, so by the time a transition
/// call returns, every observer has seen the new state. Callbacks must not
/// call back into the machine and should not block.
#[derive(Clone)]
pub struct StateMachine {
    inner: Arc<Mutex<Inner>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a machine in the `Inactive` state.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ActivationState::Inactive,
                observers: ObserverRegistry::new(),
            })),
        }
    }

    /// Current state (lock-protected read).
    pub fn current(&self) -> ActivationState {
        self.inner.lock().state
    }

    /// Register a state-change observer. Returns a handle for removal.
    pub fn on_state_change(
        &self,
        callback: impl Fn(ActivationState) + Send + 'static,
    ) -> ObserverId {
        self.inner
            .lock()
            .observers
            .subscribe(move |state: &ActivationState| callback(*state))
    }

    /// Remove a previously registered observer.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.inner.lock().observers.unsubscribe(id)
    }

    /// `Inactive -> Ready`. Returns whether a transition occurred.
    pub fn activate(&self) -> bool {
        self.transition(
            |state| matches!(state, ActivationState::Inactive),
            ActivationState::Ready,
        )
    }

    /// `Ready | Recording | Paused -> Inactive`. Returns whether a transition occurred.
    pub fn deactivate(&self) -> bool {
        self.transition(
            |state| {
                matches!(
                    state,
                    ActivationState::Ready | ActivationState::Recording | ActivationState::Paused
                )
            },
            ActivationState::Inactive,
        )
    }

    /// `Ready | Paused -> Recording`. Returns whether a transition occurred.
    pub fn start_recording(&self) -> bool {
        self.transition(
            |state| matches!(state, ActivationState::Ready | ActivationState::Paused),
            ActivationState::Recording,
        )
    }

    /// `Recording -> Paused`. Returns whether a transition occurred.
    pub fn pause_recording(&self) -> bool {
        self.transition(
            |state| matches!(state, ActivationState::Recording),
            ActivationState::Paused,
        )
    }

    /// Force the machine to `Inactive` from any state (clean shutdown path).
    pub fn force_stop(&self) -> bool {
        self.transition(|_| true, ActivationState::Inactive)
    }

    fn transition(
        &self,
        allowed: impl Fn(ActivationState) -> bool,
        to: ActivationState,
    ) -> bool {
        let mut inner = self.inner.lock();
        if !allowed(inner.state) || inner.state == to {
            tracing::debug!("ignoring transition {} -> {}", inner.state, to);
            return false;
        }

        let from = inner.state;
        inner.state = to;
        tracing::debug!("activation state: {} -> {}", from, to);

        // Observers see the new state before the transition call returns.
        inner.observers.notify(&to);
        true
    }
}
