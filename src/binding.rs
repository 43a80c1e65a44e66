//! External collaborator: the binding (peer address, security, transport
//! readiness) (spec.md §1, §6). Out of scope to implement; this module only
//! defines the contract the lifecycle FSM and exchange adapter drive it
//! through.

use crate::error::ClientError;
use crate::exchange::Exchange;
use crate::limits::WrmConfig;
use alloc::boxed::Box;
use core::time::Duration;

/// Binding readiness, mirrored directly from spec.md §4.D's state table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Ready,
    Preparing,
    NotReady,
    Failed,
}

/// The binding contract (spec.md §6): readiness query, async preparation,
/// exchange-context allocation, inbound authenticity check, default WRM
/// config, peer node id, and response-timeout adjustment.
#[async_trait::async_trait]
pub trait Binding: Send + Sync {
    fn state(&self) -> BindingState;

    /// Ask the binding to begin preparing (security handshake, address
    /// resolution, ...). Completion is signaled out-of-band by the
    /// embedder calling back into
    /// [`crate::client::SubscriptionClient::on_binding_ready`].
    fn prepare(&mut self) -> Result<(), ClientError>;

    /// Allocate a fresh exchange context bound to this binding's peer.
    async fn new_exchange_context(&self) -> Result<Box<dyn Exchange>, ClientError>;

    /// Whether an inbound message on this binding passed the transport's
    /// authenticity check (peer identity, message integrity).
    fn is_authentic_inbound(&self) -> bool;

    fn default_wrm_config(&self) -> WrmConfig;

    fn peer_node_id(&self) -> u64;

    /// Per-binding adjustment applied to a base response timeout (e.g. to
    /// account for a slow transport).
    fn adjust_response_timeout(&self, base: Duration) -> Duration;

    /// One reference added at `Init`, released at `Free` (spec.md §4.D).
    fn add_ref(&mut self);
    fn release(&mut self);
}
