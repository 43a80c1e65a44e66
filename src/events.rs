//! Component H: the typed event surface to the embedding application
//! (spec.md §4.H). Grounded in the teacher's preference for a tagged sum
//! type over a union-style in/out parameter block (Design Notes §9:
//! "Union-like InEventParam/OutEventParam ... → tagged sum type, one
//! variant per event kind, each carrying only its required fields").

use crate::error::ClientError;
use crate::ids::{ClientId, SubscriptionId, TraitPath};
use crate::wire::{PathStatus, SubscribeRequest};
use alloc::vec::Vec;

/// Reason a subscription ended, surfaced on [`ClientEvent::SubscriptionTerminated`]
/// (spec.md §4.D `HandleSubscriptionTerminated`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationReason {
    Local(LocalTerminationCause),
    Remote,
    Timeout,
    ConnectionAborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalTerminationCause {
    EndSubscriptionRequested,
    SchemaMismatch,
    MalformedUpdateResponse,
    ContractViolation,
}

/// Why an `UpdateComplete` fired (spec.md §4.G, §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateCompleteReason {
    Success,
    /// Remote rejected this path specifically; `status` on the event carries
    /// the profile/status code.
    Failed,
    MismatchUpdateRequiredVersion,
    Timeout,
    ConnectionAborted,
    NoMemory,
}

/// One variant per event kind (spec.md §4.H); each carries only the fields
/// that event needs.
#[derive(Clone, Debug)]
pub enum ClientEvent<'a> {
    /// The binding needs the application to finish preparing it before a
    /// `SubscribeRequest` can be built (spec.md §4.D).
    SubscribeRequestPrepareNeeded {
        client_id: ClientId,
    },
    /// Any inbound traffic refreshed liveness (spec.md §4.E step 1).
    SubscriptionActivity {
        client_id: ClientId,
    },
    SubscriptionEstablished {
        client_id: ClientId,
        subscription_id: SubscriptionId,
    },
    SubscriptionTerminated {
        client_id: ClientId,
        subscription_id: Option<SubscriptionId>,
        will_retry: bool,
        reason: TerminationReason,
    },
    /// Raised before the data list is applied; the application may mutate
    /// client state here (spec.md §4.E step 2), including ending the
    /// subscription — callers must re-check state afterward.
    NotificationRequest {
        client_id: ClientId,
    },
    NotificationProcessed {
        client_id: ClientId,
    },
    /// An event list was present on the inbound notification; `reader`
    /// is positioned at the start of it (event schema out of scope).
    EventStreamReceived {
        client_id: ClientId,
        reader: &'a [u8],
    },
    ExchangeStart {
        client_id: ClientId,
    },
    UpdateComplete {
        client_id: ClientId,
        path: TraitPath,
        status: Option<PathStatus>,
        reason: UpdateCompleteReason,
    },
}

/// Application callback surface (spec.md §4.H: "all dispatched
/// synchronously on the client's thread"). Object-safe so the client can
/// hold `Box<dyn EventCallback>`.
pub trait EventCallback {
    fn on_event(&mut self, event: ClientEvent<'_>);

    /// Invoked when the application must supply the initial path list for
    /// `InitiateSubscription` (kept distinct from `ClientEvent` because it
    /// has a meaningful return value, unlike the fire-and-forget events
    /// above).
    fn build_subscribe_request(&mut self) -> Result<SubscribeRequest, ClientError>;
}

/// A no-op callback useful for tests and for clients that only push
/// updates and never care about notifications.
#[derive(Default)]
pub struct NoopEventCallback;

impl EventCallback for NoopEventCallback {
    fn on_event(&mut self, _event: ClientEvent<'_>) {}

    fn build_subscribe_request(&mut self) -> Result<SubscribeRequest, ClientError> {
        Ok(SubscribeRequest {
            path_list: Vec::new(),
            subscription_id: None,
            timeout_min_sec: None,
            timeout_max_sec: None,
            subscribe_to_all_events: false,
        })
    }
}
