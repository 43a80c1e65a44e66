//! Component B: single-shot timer registration, keyed by client identity
//! (spec.md §4.B/C, §6).
//!
//! The concrete timer wheel/event loop is an external collaborator; this
//! module only defines the contract the lifecycle FSM drives it through, and
//! the `refresh_timer` policy table from spec.md §4.B/C.

use crate::ids::ClientId;
use core::time::Duration;

/// What the timer is currently armed for, so `refresh_timer` can log/audit
/// *why* a timer fired without the embedder needing to infer it from state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPurpose {
    /// Inactivity watchdog while establishing a subscription.
    SubscribingInactivity,
    /// Liveness confirmation deadline for an initiator in `Established_Idle`.
    LivenessConfirmation,
    /// Non-initiator liveness watchdog.
    LivenessWatchdog,
    /// Resubscribe backoff delay (`Resubscribe_Holdoff`).
    ResubscribeHoldoff,
}

/// A callback token the timer driver hands back on expiry. The client
/// doesn't interpret it; it exists so an embedder's timer wheel can
/// distinguish stale callbacks from canceled timers (a timer canceled and
/// immediately re-armed must not let the old callback fire).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerToken(pub u64);

/// Timer driver contract (spec.md §6: `StartTimer(ms, callback, state)`,
/// `CancelTimer(callback, state)`).
pub trait TimerDriver {
    /// Arm a single-shot timer for `client_id`, replacing any timer
    /// previously armed for the same purpose token. Returns the token to
    /// present on cancellation.
    fn start(&mut self, client_id: ClientId, purpose: TimerPurpose, delay: Duration) -> TimerToken;

    /// Cancel a previously armed timer. A no-op if the token is unknown or
    /// already fired — callers (`refresh_timer`) cancel unconditionally
    /// without tracking whether a timer is currently live.
    fn cancel(&mut self, token: TimerToken);
}

/// The armed-timer state the lifecycle FSM owns (spec.md §5: "client owns at
/// most one timer ... at any instant").
#[derive(Clone, Copy, Debug, Default)]
pub struct ArmedTimer {
    token: Option<TimerToken>,
}

impl ArmedTimer {
    pub fn none() -> Self {
        Self { token: None }
    }

    pub fn is_armed(&self) -> bool {
        self.token.is_some()
    }

    /// Cancel whatever is armed (unconditionally, per spec.md §4.B/C) and
    /// arm a new one if `next` is `Some`.
    pub fn rearm(
        &mut self,
        driver: &mut dyn TimerDriver,
        client_id: ClientId,
        next: Option<(TimerPurpose, Duration)>,
    ) {
        if let Some(token) = self.token.take() {
            driver.cancel(token);
        }
        if let Some((purpose, delay)) = next {
            self.token = Some(driver.start(client_id, purpose, delay));
        }
    }

    /// Mark the timer fired (clears bookkeeping so a stale cancel is a
    /// no-op); does not itself decide what to do next.
    pub fn on_fired(&mut self) {
        self.token = None;
    }
}
