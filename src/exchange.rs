//! Component C: the exchange adapter — owns at most one in-flight message
//! exchange and routes inbound callbacks (spec.md §4.B/C, §5 invariant I1).

use crate::error::ClientError;
use crate::wire::OutboundMessage;
use alloc::boxed::Box;

/// Why an exchange context was torn down, mirrored to the embedder so it can
/// decide whether to linger for a final ack (`Close`) or drop immediately
/// (`Abort`) (spec.md §4.B/C: "flush the existing exchange (Close or
/// Abort)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeTeardown {
    Close,
    Abort,
}

/// A single in-flight message exchange (spec.md §1 glossary, §6). The
/// generic messaging/exchange layer (delivery, acks, timeouts) is out of
/// scope; this is the minimal send/receive surface the state machine needs.
#[async_trait::async_trait]
pub trait Exchange: Send + Sync {
    /// Opaque identity used to correlate an inbound `StatusReport`/response
    /// with the exchange that sent the original request (spec.md §5:
    /// "correlated by exchange-context identity, not by any in-payload
    /// id").
    fn id(&self) -> u64;

    async fn send(&self, message: OutboundMessage) -> Result<(), ClientError>;

    /// Close (graceful) or abort (immediate) this exchange. Implementations
    /// must tolerate being called on an exchange with no outstanding
    /// request.
    fn teardown(&self, mode: ExchangeTeardown);
}

/// Owns at most one exchange context at a time (spec.md invariant I1) and
/// replaces it atomically via [`ExchangeSlot::replace`].
#[derive(Default)]
pub struct ExchangeSlot {
    current: Option<Box<dyn Exchange>>,
}

impl ExchangeSlot {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn is_some(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&dyn Exchange> {
        self.current.as_deref()
    }

    /// Flush whatever is currently held (spec.md §4.B/C: "flush the
    /// existing exchange (Close or Abort)"), then install `next`. Returns
    /// the replaced exchange's id, if any, purely for audit/logging.
    pub fn replace(&mut self, next: Option<Box<dyn Exchange>>, teardown: ExchangeTeardown) -> Option<u64> {
        let replaced_id = self.current.as_ref().map(|ex| {
            ex.teardown(teardown);
            ex.id()
        });
        self.current = next;
        replaced_id
    }

    pub fn clear(&mut self, teardown: ExchangeTeardown) -> Option<u64> {
        self.replace(None, teardown)
    }

    /// Whether `exchange_id` names the exchange currently owned (spec.md
    /// §5: "Notifications in Subscribing* must arrive on the original
    /// outbound exchange").
    pub fn is_current(&self, exchange_id: u64) -> bool {
        self.current
            .as_ref()
            .map(|ex| ex.id() == exchange_id)
            .unwrap_or(false)
    }
}
