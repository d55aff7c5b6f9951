//! Cooldown gate in front of the language model.
//!
//! At most one model call is allowed per window. The gate is checked before
//! any retrieval work happens and the window restarts once a call has been
//! attempted, whether it succeeded or not.


use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Source of monotonic time for the gate
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    #[inline]
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> Instant {
        let offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + *offset
    }
}

/// Refusal returned while the gate is cooling down or a call is in flight
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cooldown active for another {} seconds", self.wait_seconds())]
pub struct CooldownActive {
    pub remaining: Duration,
}

impl CooldownActive {
    /// Remaining wait in whole seconds, rounded up
    #[inline]
    pub fn wait_seconds(&self) -> u64 {
        self.remaining.as_secs() + u64::from(self.remaining.subsec_nanos() > 0)
    }
}

#[derive(Debug, Default)]
struct GateState {
    last_call: Option<Instant>,
    in_flight: bool,
}

pub struct CooldownGate {
    window: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<GateState>,
}

impl CooldownGate {
    #[inline]
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    #[inline]
    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            state: Mutex::new(GateState::default()),
        }
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Claim the right to make one model call.
    ///
    /// Refuses without changing state while another permit is alive or the
    /// previous call happened less than one window ago.
    ///
    /// A refusal caused by an in-flight call reports the full window as the
    /// remaining wait. That is a lower bound: the real wait is the rest of the
    /// in-flight call plus one window.
    #[inline]
    pub fn try_acquire(&self) -> Result<CallPermit<'_>, CooldownActive> {
        let mut state = self.lock_state();

        if state.in_flight {
            debug!("Refusing question: model call already in flight");
            return Err(CooldownActive {
                remaining: self.window,
            });
        }

        if let Some(last_call) = state.last_call {
            let elapsed = self.clock.now().saturating_duration_since(last_call);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                debug!("Refusing question: {:?} of cooldown left", remaining);
                return Err(CooldownActive { remaining });
            }
        }

        state.in_flight = true;
        Ok(CallPermit {
            gate: self,
            attempted: false,
        })
    }

    /// Forget any previous call
    #[inline]
    pub fn reset(&self) {
        *self.lock_state() = GateState::default();
    }

    fn lock_state(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for CooldownGate {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CooldownGate")
            .field("window", &self.window)
            .field("state", &*self.lock_state())
            .finish_non_exhaustive()
    }
}

/// Held for the duration of one question.
///
/// Dropping the permit releases the gate. The window restarts only if
/// [`CallPermit::record_call`] was invoked.
#[derive(Debug)]
pub struct CallPermit<'a> {
    gate: &'a CooldownGate,
    attempted: bool,
}

impl CallPermit<'_> {
    /// Mark that the model is about to be called
    #[inline]
    pub fn record_call(&mut self) {
        self.attempted = true;
    }
}

impl Drop for CallPermit<'_> {
    #[inline]
    fn drop(&mut self) {
        let mut state = self.gate.lock_state();
        state.in_flight = false;
        if self.attempted {
            state.last_call = Some(self.gate.clock.now());
        }
    }
}
