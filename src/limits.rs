//! Named constants and validated configuration for the subscription client.
//!
//! Grounded in the original implementation's `WDM_*` preprocessor constants
//! and in the teacher framework's preference for named, validated
//! configuration values (`governance::timeout::profile::Timeout::try_new`)
//! over bare magic numbers scattered through the state machine.

use crate::error::ClientError;
use crate::ids::ClientId;
use core::time::Duration;

/// Capacity of [`crate::path_store::PathStore`] (spec.md §3).
pub const MAX_ITEMS_IN_TRAIT_DIRTY_PATH_STORE: usize = 32;

/// Upper bound on a requested liveness timeout, in seconds (spec.md §4.D).
pub const MAX_TIMEOUT_SEC: u32 = 3600;

/// Resubscribe policy constants (spec.md §4.F).
pub const MAX_FIB_INDEX: u32 = 16;
pub const RESUBSCRIBE_WAIT_TIME_MULTIPLIER_MS: u64 = 1_000;
pub const MAX_RETRY_WAIT_MS: u64 = 3_600_000;
pub const MIN_WAIT_TIME_PERCENT: u64 = 10;

/// Reference counting ceiling named in spec.md §3 ("reference count in
/// `[0, 127]`").
pub const MAX_REF_COUNT: u8 = 127;

/// Reliable-messaging parameters used to compute the idle-timer margin in
/// `refresh_timer` (spec.md §4.B/C).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WrmConfig {
    pub max_retrans: u32,
    pub initial_retrans_timeout: Duration,
}

impl WrmConfig {
    /// Default matches the original Weave Reliable Messaging defaults used
    /// by the subscription client when the binding does not override them.
    pub const fn default_config() -> Self {
        Self {
            max_retrans: 3,
            initial_retrans_timeout: Duration::from_millis(300),
        }
    }

    /// `(max_retrans + 1) * initial_retrans_timeout`, per spec.md §4.B/C.
    pub fn margin(&self) -> Duration {
        self.initial_retrans_timeout * (self.max_retrans + 1)
    }
}

impl Default for WrmConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Per-client tunables supplied at [`crate::client::SubscriptionClient::init`]
/// time. Mirrors the teacher's builder-validated config structs: invalid
/// combinations are rejected at construction rather than discovered deep in
/// the state machine.
#[derive(Clone, Copy, Debug)]
pub struct ClientConfig {
    client_id: ClientId,
    inactivity_timeout_during_subscribing: Option<Duration>,
    wrm: WrmConfig,
    resubscribe_enabled: bool,
}

impl ClientConfig {
    pub fn builder(client_id: ClientId) -> ClientConfigBuilder {
        ClientConfigBuilder {
            client_id,
            inactivity_timeout_during_subscribing: None,
            wrm: WrmConfig::default_config(),
            resubscribe_enabled: true,
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn inactivity_timeout_during_subscribing(&self) -> Option<Duration> {
        self.inactivity_timeout_during_subscribing
    }

    pub fn wrm(&self) -> WrmConfig {
        self.wrm
    }

    pub fn resubscribe_enabled(&self) -> bool {
        self.resubscribe_enabled
    }
}

/// Builder for [`ClientConfig`]; validates at `build()`.
pub struct ClientConfigBuilder {
    client_id: ClientId,
    inactivity_timeout_during_subscribing: Option<Duration>,
    wrm: WrmConfig,
    resubscribe_enabled: bool,
}

impl ClientConfigBuilder {
    pub fn inactivity_timeout_during_subscribing(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout_during_subscribing = Some(timeout);
        self
    }

    pub fn wrm(mut self, wrm: WrmConfig) -> Self {
        self.wrm = wrm;
        self
    }

    pub fn resubscribe_enabled(mut self, enabled: bool) -> Self {
        self.resubscribe_enabled = enabled;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ClientError> {
        if let Some(timeout) = self.inactivity_timeout_during_subscribing {
            if timeout.is_zero() {
                return Err(ClientError::invalid_argument(
                    "inactivity_timeout_during_subscribing must be > 0 when set",
                ));
            }
        }
        Ok(ClientConfig {
            client_id: self.client_id,
            inactivity_timeout_during_subscribing: self.inactivity_timeout_during_subscribing,
            wrm: self.wrm,
            resubscribe_enabled: self.resubscribe_enabled,
        })
    }
}

/// Validates a requested liveness timeout in seconds (spec.md §4.D, §6).
pub fn validate_timeout_sec(timeout_sec: u32) -> Result<(), ClientError> {
    if timeout_sec > MAX_TIMEOUT_SEC {
        return Err(ClientError::invalid_argument(alloc::format!(
            "liveness timeout {timeout_sec}s exceeds kMaxTimeoutSec ({MAX_TIMEOUT_SEC}s)"
        )));
    }
    Ok(())
}
