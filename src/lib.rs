//! Peer-side subscription client for the Weave Data Management (WDM)
//! profile: a ten-state lifecycle FSM, a notification processing pipeline,
//! a two-stage dirty-path update engine, and the ambient observability /
//! audit / configuration surface around them.
//!
//! The generic TLV codec, the trait schema engine, the transport binding,
//! and the message-exchange layer are external collaborators (see
//! [`wire::Codec`], [`sink::SchemaRelation`], [`binding::Binding`],
//! [`exchange::Exchange`]) — this crate owns only the state machine and
//! the policies layered on top of it.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_debug_implementations)]

extern crate alloc;

pub mod audit;
pub mod binding;
pub mod client;
pub mod error;
pub mod events;
pub mod exchange;
pub mod ids;
pub mod lifecycle;
pub mod limits;
pub mod notification;
pub mod observability;
pub mod path_store;
pub mod prelude;
pub mod refcount;
pub mod resubscribe;
pub mod sink;
pub mod timer;
pub mod update;
pub mod wire;

pub use client::{ClientCollaborators, SubscriptionClient};
pub use error::{ClientError, ErrorCategory};
pub use lifecycle::ClientState;
