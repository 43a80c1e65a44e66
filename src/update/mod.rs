//! Component G: the update engine (spec.md §4.G) — two-stage dirty-path
//! update store plus response correlation and dictionary-overflow
//! recovery. Split into [`store`] (the bounded containers and per-trait
//! bookkeeping) and [`engine`] (the orchestration), the way the teacher
//! framework's `pipeline` module separates stage storage from stage
//! drivers.

pub mod engine;
pub mod store;

pub use engine::{ConfirmOutcome, EncodeOutcome, PurgeResult, TimeoutOutcome, UpdateCompletion, UpdateEncoder, UpdateEngine};
pub use store::{DispatchedUpdateStore, PendingUpdateStore, TiContextTable, UpdatableTIContext, UpdateRequestContext};
