//! Component D: the ten-state subscription lifecycle (spec.md §4.D).
//!
//! Grounded in the teacher's `contract::ContractStateMachine`/`StateAdvance`
//! pattern: a small struct owning only state + the fields a transition needs
//! to validate, with one method per named transition returning `Result<(),
//! ClientError>` rather than a generic `advance(event)` dispatcher — the
//! transition set here is fixed and enumerable, so a match-everything event
//! enum would just move the same `match` one level up for no benefit.

use crate::binding::Binding;
use crate::error::ClientError;
use crate::ids::SubscriptionId;
use crate::limits::{validate_timeout_sec, MAX_TIMEOUT_SEC};
use crate::refcount::RefCount;
use crate::resubscribe::RetryCounter;

/// The ten states named in spec.md §4.D.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    Free,
    Initialized,
    Subscribing,
    SubscribingIdAssigned,
    EstablishedIdle,
    EstablishedConfirming,
    Canceling,
    ResubscribeHoldoff,
    Aborting,
    Aborted,
}

impl ClientState {
    pub fn is_subscribing(self) -> bool {
        matches!(self, ClientState::Subscribing | ClientState::SubscribingIdAssigned)
    }

    pub fn is_established(self) -> bool {
        matches!(self, ClientState::EstablishedIdle | ClientState::EstablishedConfirming)
    }

    /// Subscribing* or Established* — the states in which the notification
    /// pipeline (spec.md §4.E) accepts inbound traffic.
    pub fn accepts_notifications(self) -> bool {
        self.is_subscribing() || self.is_established()
    }
}

/// Subscription identity and liveness parameters (spec.md §3).
#[derive(Clone, Copy, Debug, Default)]
pub struct SubscriptionMeta {
    pub subscription_id: Option<SubscriptionId>,
    pub is_initiator: bool,
    /// `0` means disabled (spec.md §3).
    pub liveness_timeout_ms: u32,
}

/// The state machine itself. Owns no collaborators — callers
/// ([`crate::client::SubscriptionClient`]) hold the binding, exchange, timer
/// and sinks, and call through here only to validate and record a
/// transition.
#[derive(Debug)]
pub struct Lifecycle {
    state: ClientState,
    meta: SubscriptionMeta,
    retry: RetryCounter,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ClientState::Free,
            meta: SubscriptionMeta::default(),
            retry: RetryCounter::new(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn meta(&self) -> SubscriptionMeta {
        self.meta
    }

    pub fn retry_count(&self) -> u32 {
        self.retry.count()
    }

    /// `Free → Initialized`: `Init()` (spec.md §4.D). Adds one binding
    /// reference and takes the permanent refcount hold that keeps the
    /// client alive until `release` brings it back to zero.
    pub fn init(&mut self, binding: &mut dyn Binding, refcount: &RefCount) -> Result<(), ClientError> {
        if self.state != ClientState::Free {
            return Err(ClientError::incorrect_state("Init called outside Free"));
        }
        binding.add_ref();
        refcount.incref();
        self.state = ClientState::Initialized;
        Ok(())
    }

    /// `Initialized | Resubscribe_Holdoff → Subscribing | Subscribing_IdAssigned`:
    /// `InitiateSubscription`/`_InitiateSubscription` (spec.md §4.D). The
    /// caller has already confirmed the binding is `Ready` and obtained a
    /// path list from the application — this method only records the
    /// resulting identity and liveness parameters.
    ///
    /// A counter-subscriber supplies `counter_subscription_id` (pre-assigned
    /// by the application) and pre-sets `liveness_sec` itself; an initiator
    /// passes `None` and waits for `on_subscribe_response`.
    pub fn initiate_subscription(
        &mut self,
        is_initiator: bool,
        counter_subscription_id: Option<SubscriptionId>,
        liveness_sec: u32,
    ) -> Result<(), ClientError> {
        if !matches!(self.state, ClientState::Initialized | ClientState::ResubscribeHoldoff) {
            return Err(ClientError::incorrect_state(
                "InitiateSubscription requires Initialized or Resubscribe_Holdoff",
            ));
        }
        if liveness_sec > 0 {
            validate_timeout_sec(liveness_sec)?;
        }
        self.meta.is_initiator = is_initiator;
        match counter_subscription_id {
            Some(sid) => {
                self.meta.subscription_id = Some(sid);
                self.meta.liveness_timeout_ms = liveness_sec.saturating_mul(1000);
                self.state = ClientState::SubscribingIdAssigned;
            }
            None => {
                self.state = ClientState::Subscribing;
            }
        }
        Ok(())
    }

    /// `Subscribing* → Established_Idle`: receipt of a schema-validated
    /// `SubscribeResponse` (spec.md §4.D). A re-asserted `subscription_id`
    /// must match the one already assigned to a counter-subscriber.
    pub fn on_subscribe_response(&mut self, subscription_id: SubscriptionId, timeout_sec: Option<u32>) -> Result<(), ClientError> {
        if !self.state.is_subscribing() {
            return Err(ClientError::incorrect_state("SubscribeResponse outside Subscribing*"));
        }
        match self.meta.subscription_id {
            Some(existing) if existing != subscription_id => {
                return Err(ClientError::schema_mismatch("SubscribeResponse subscription_id does not match the assigned id"));
            }
            _ => self.meta.subscription_id = Some(subscription_id),
        }
        if let Some(timeout_sec) = timeout_sec {
            if timeout_sec > MAX_TIMEOUT_SEC {
                return Err(ClientError::schema_mismatch("SubscribeResponse timeout exceeds kMaxTimeoutSec"));
            }
            self.meta.liveness_timeout_ms = timeout_sec.saturating_mul(1000);
        }
        self.state = ClientState::EstablishedIdle;
        self.retry.reset();
        Ok(())
    }

    /// `Established_Idle → Established_Confirming`: initiator-only,
    /// liveness-timer fire (spec.md §4.D).
    pub fn on_liveness_timer_fire(&mut self) -> Result<(), ClientError> {
        if self.state != ClientState::EstablishedIdle {
            return Err(ClientError::incorrect_state("liveness timer fired outside Established_Idle"));
        }
        if !self.meta.is_initiator {
            return Err(ClientError::incorrect_state("liveness confirmation is initiator-only"));
        }
        self.state = ClientState::EstablishedConfirming;
        Ok(())
    }

    /// `Established_Confirming → Established_Idle`: status report success
    /// (spec.md §4.D).
    pub fn on_confirm_success(&mut self) -> Result<(), ClientError> {
        if self.state != ClientState::EstablishedConfirming {
            return Err(ClientError::incorrect_state("confirm success outside Established_Confirming"));
        }
        self.state = ClientState::EstablishedIdle;
        Ok(())
    }

    /// `Established_* → Canceling`: `EndSubscription()` (spec.md §4.D, §5:
    /// "cooperative: sends a Cancel, waits for a reply, then aborts on
    /// receipt regardless of the reply code").
    pub fn end_subscription(&mut self) -> Result<(), ClientError> {
        if !self.state.is_established() {
            return Err(ClientError::incorrect_state("EndSubscription requires an Established state"));
        }
        self.state = ClientState::Canceling;
        Ok(())
    }

    /// `* → Resubscribe_Holdoff`: the retry policy accepted a holdoff
    /// (spec.md §4.D). Called after the caller has aborted the exchange
    /// only (not the whole client) in response to `HandleSubscriptionTerminated(will_retry=true, ..)`.
    pub fn enter_resubscribe_holdoff(&mut self) -> Result<(), ClientError> {
        if matches!(self.state, ClientState::Free | ClientState::Aborted) {
            return Err(ClientError::incorrect_state("cannot enter Resubscribe_Holdoff from Free/Aborted"));
        }
        self.state = ClientState::ResubscribeHoldoff;
        Ok(())
    }

    /// `Resubscribe_Holdoff → Initialized`: the retry timer expired
    /// (spec.md §4.D: "retry counter increments and `_InitiateSubscription`
    /// is re-entered"). Returns to `Initialized` so the caller re-runs
    /// `initiate_subscription`.
    pub fn on_resubscribe_timer_fire(&mut self) -> Result<u32, ClientError> {
        if self.state != ClientState::ResubscribeHoldoff {
            return Err(ClientError::incorrect_state("resubscribe timer fired outside Resubscribe_Holdoff"));
        }
        let count = self.retry.increment();
        self.state = ClientState::Initialized;
        Ok(count)
    }

    /// `ResetResubscribe` (spec.md §4.F): zero the retry counter.
    pub fn reset_resubscribe(&mut self) {
        self.retry.reset();
    }

    /// `DisableResubscribe` while holding off aborts (spec.md §5). Returns
    /// `true` iff this call performed the transition (the caller then runs
    /// full-abort side effects); `false` if the client was not currently
    /// holding off.
    pub fn disable_resubscribe_while_holdoff(&mut self) -> bool {
        if self.state == ClientState::ResubscribeHoldoff {
            self.state = ClientState::Aborting;
            true
        } else {
            false
        }
    }

    /// `* → Aborting` (spec.md §4.D). `AbortSubscription` is synchronous
    /// (spec.md §5) but still passes through the transient `Aborting` state
    /// before `finish_abort` settles it into `Aborted`: the teardown this
    /// brackets (timers, exchange, update stores, `SubscriptionTerminated`
    /// broadcast) can invoke application callbacks, and a callback that
    /// re-enters `abort` mid-teardown must see a state distinct from both
    /// "still alive" and "fully torn down" so it short-circuits instead of
    /// restarting the sequence. Idempotent: aborting while `Aborting` or
    /// already `Aborted` is a documented no-op, returning `false`.
    pub fn abort(&mut self) -> bool {
        if matches!(self.state, ClientState::Aborting | ClientState::Aborted) {
            return false;
        }
        self.state = ClientState::Aborting;
        true
    }

    /// Settles `Aborting → Aborted` once the caller's teardown has run.
    pub fn finish_abort(&mut self) {
        if self.state == ClientState::Aborting {
            self.state = ClientState::Aborted;
        }
    }

    /// Releases the permanent refcount hold taken by `init`. When the count
    /// reaches zero the client transitions `Aborted → Free` (spec.md §3
    /// invariant I2); returns whether that happened.
    pub fn release(&mut self, refcount: &RefCount) -> bool {
        let reached_zero = refcount.decref();
        if reached_zero && self.state == ClientState::Aborted {
            self.state = ClientState::Free;
            true
        } else {
            false
        }
    }
}
