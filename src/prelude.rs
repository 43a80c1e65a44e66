//! Convenience re-exports for embedders wiring up a [`crate::client::SubscriptionClient`].

pub use crate::binding::{Binding, BindingState};
pub use crate::client::{ClientCollaborators, SubscriptionClient};
pub use crate::error::{ClientError, ErrorCategory};
pub use crate::events::{ClientEvent, EventCallback, TerminationReason, UpdateCompleteReason};
pub use crate::exchange::{Exchange, ExchangeTeardown};
pub use crate::ids::{ClientId, PropertyPathHandle, SubscriptionId, TraitDataHandle, TraitPath};
pub use crate::lifecycle::ClientState;
pub use crate::limits::{ClientConfig, WrmConfig};
pub use crate::sink::{SchemaRelation, SinkCatalog, TraitDataSink, TraitUpdatableDataSink};
pub use crate::timer::{TimerDriver, TimerPurpose, TimerToken};
pub use crate::update::{UpdateEncoder, UpdateEngine};
pub use crate::wire::{Codec, InboundMessage, OutboundMessage};
