//! Wire message shapes for the WDM profile (spec.md §6). The generic TLV
//! codec is out of scope (spec.md §1); these are the payload *shapes* that
//! get encoded/decoded by an external [`Codec`], grounded in the teacher
//! framework's `codec::traits` delegation pattern (encode/decode is a
//! capability the transport layer supplies, not something this crate
//! implements itself).

use crate::error::ClientError;
use crate::ids::{SubscriptionId, TraitPath};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// WDM profile id, named for documentation/log correlation only — this
/// crate never inspects raw profile bytes itself.
pub const WEAVE_PROFILE_WDM: u32 = 0x0000_000D;

/// `SubscribeRequest` payload (spec.md §6).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubscribeRequest {
    pub path_list: Vec<TraitPath>,
    pub subscription_id: Option<SubscriptionId>,
    pub timeout_min_sec: Option<u32>,
    pub timeout_max_sec: Option<u32>,
    pub subscribe_to_all_events: bool,
}

/// `SubscribeResponse` payload (spec.md §6).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubscribeResponse {
    pub subscription_id: SubscriptionId,
    pub timeout_sec: Option<u32>,
}

/// `SubscribeConfirmRequest` payload (spec.md §6).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubscribeConfirmRequest {
    pub subscription_id: SubscriptionId,
}

/// `SubscribeCancelRequest` payload (spec.md §6).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct SubscribeCancelRequest {
    pub subscription_id: SubscriptionId,
}

/// One element of an inbound `NotificationRequest`'s data list (spec.md
/// §4.E): a trait path, the version it reflects, the still-encoded payload
/// (decoded downstream by the sink), and the partial-change flag.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DataListElement {
    pub trait_path: TraitPath,
    pub version: u64,
    pub data: Vec<u8>,
    pub is_partial_change: bool,
}

/// `NotificationRequest` payload (spec.md §6). `event_list_reader` is
/// represented as already-positioned opaque bytes — the event schema itself
/// is out of scope.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct NotificationRequest {
    pub data_list: Option<Vec<DataListElement>>,
    pub event_list: Option<Vec<u8>>,
}

/// A single `UpdateRequest` `DataElement` (spec.md §4.G/§6).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct UpdateDataElement {
    pub trait_path: TraitPath,
    pub data: Vec<u8>,
    pub force_merge: bool,
    pub private: bool,
}

/// `UpdateRequest` payload (spec.md §6): at most one trait instance's dirty
/// paths per request (spec.md §4.G encoding order rule).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct UpdateRequest {
    pub elements: Vec<UpdateDataElement>,
    pub is_partial_update: bool,
}

/// Per-path status carried in an `UpdateResponse` status list (spec.md §6).
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct PathStatus {
    pub profile_id: u32,
    pub status_code: u16,
}

/// `UpdateResponse`, surfaced inside a `StatusReport`'s additional info
/// (spec.md §4.G, §6).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct UpdateResponse {
    pub version_list: Option<Vec<u64>>,
    pub status_list: Option<Vec<PathStatus>>,
}

/// A generic status report, with the WDM-specific `UpdateResponse` riding
/// in `additional_info` when this is a reply to an `UpdateRequest` (spec.md
/// §6).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct StatusReport {
    pub success: bool,
    pub profile_id: u32,
    pub status_code: u16,
    pub update_response: Option<UpdateResponse>,
}

impl StatusReport {
    pub fn common_success() -> Self {
        Self {
            success: true,
            profile_id: 0,
            status_code: 0,
            update_response: None,
        }
    }
}

/// Tagged outbound message, handed to an [`crate::exchange::Exchange`].
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum OutboundMessage {
    SubscribeRequest(SubscribeRequest),
    SubscribeConfirmRequest(SubscribeConfirmRequest),
    SubscribeCancelRequest(SubscribeCancelRequest),
    UpdateRequest(UpdateRequest),
    StatusReport(StatusReport),
}

/// Tagged inbound message, as delivered by the exchange adapter's callback.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum InboundMessage {
    SubscribeResponse(SubscribeResponse),
    NotificationRequest(NotificationRequest),
    StatusReport(StatusReport),
}

/// Encode/decode delegate (spec.md §1: "the generic TLV codec ... out of
/// scope"). The client calls through this trait at every wire boundary;
/// implementations live in the embedder's transport crate.
pub trait Codec: Send + Sync {
    fn encode(&self, message: &OutboundMessage) -> Result<Vec<u8>, ClientError>;
    fn decode(&self, bytes: &[u8]) -> Result<InboundMessage, ClientError>;
}

pub(crate) type BoxedCodec = Box<dyn Codec>;
