//! Stable error domain for the subscription client.
//!
//! Mirrors the teacher framework's `CoreError`: a `'static` code in the
//! `<namespace>.<reason>` convention, a human message, an optional boxed
//! cause, and a small bag of structured metadata so the failure can be
//! correlated with a client/subscription without parsing the message.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// Error code namespace for this crate: every code is `wdm.<reason>`.
pub mod codes {
    pub const INCORRECT_STATE: &str = "wdm.incorrect_state";
    pub const INVALID_ARGUMENT: &str = "wdm.invalid_argument";
    pub const INVALID_TLV_ELEMENT: &str = "wdm.invalid_tlv_element";
    pub const INVALID_MESSAGE_TYPE: &str = "wdm.invalid_message_type";
    pub const STATUS_REPORT_RECEIVED: &str = "wdm.status_report_received";
    pub const MALFORMED_UPDATE_RESPONSE: &str = "wdm.malformed_update_response";
    pub const SCHEMA_MISMATCH: &str = "wdm.schema_mismatch";
    pub const TIMEOUT: &str = "wdm.timeout";
    pub const CONNECTION_ABORTED: &str = "wdm.connection_aborted";
    pub const SEND_ERROR: &str = "wdm.send_error";
    pub const MISMATCH_UPDATE_REQUIRED_VERSION: &str = "wdm.mismatch_update_required_version";
    pub const NO_MEMORY: &str = "wdm.no_memory";
    pub const BUFFER_TOO_SMALL: &str = "wdm.buffer_too_small";
}

/// Broad grouping used to decide default retry behavior (spec.md §7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Local programmer/contract error: fatal, never retried.
    Contract,
    /// Wire/parse/schema error: terminates the subscription, retryable.
    Wire,
    /// Transport-layer failure: terminates the subscription, retryable.
    Transport,
    /// Per-path version mismatch: does not by itself terminate anything.
    VersionMismatch,
    /// Resource exhaustion during encode: drops the in-flight operation.
    Resource,
}

impl ErrorCategory {
    /// Whether a failure in this category is a candidate for the
    /// resubscribe policy at all (the policy can still be globally
    /// disabled; this only says the category is *eligible*).
    pub fn is_retry_eligible(self) -> bool {
        matches!(self, ErrorCategory::Wire | ErrorCategory::Transport)
    }
}

/// Optional structured context attached to a [`ClientError`].
#[derive(Clone, Debug, Default)]
pub struct ErrorMetadata {
    pub client_id: Option<u32>,
    pub subscription_id: Option<u64>,
}

/// The crate's single error type.
#[derive(Debug)]
pub struct ClientError {
    code: &'static str,
    category: ErrorCategory,
    message: String,
    cause: Option<Box<ClientError>>,
    metadata: ErrorMetadata,
}

impl ClientError {
    pub fn new(code: &'static str, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            code,
            category,
            message: message.into(),
            cause: None,
            metadata: ErrorMetadata::default(),
        }
    }

    pub fn with_cause(mut self, cause: ClientError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_client_id(mut self, client_id: u32) -> Self {
        self.metadata.client_id = Some(client_id);
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: u64) -> Self {
        self.metadata.subscription_id = Some(subscription_id);
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn metadata(&self) -> &ErrorMetadata {
        &self.metadata
    }

    pub fn source(&self) -> Option<&ClientError> {
        self.cause.as_deref()
    }

    pub fn incorrect_state(message: impl Into<String>) -> Self {
        Self::new(codes::INCORRECT_STATE, ErrorCategory::Contract, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_ARGUMENT, ErrorCategory::Contract, message)
    }

    pub fn malformed_update_response(message: impl Into<String>) -> Self {
        Self::new(
            codes::MALFORMED_UPDATE_RESPONSE,
            ErrorCategory::Wire,
            message,
        )
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::new(codes::SCHEMA_MISMATCH, ErrorCategory::Wire, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(codes::TIMEOUT, ErrorCategory::Transport, message)
    }

    pub fn connection_aborted(message: impl Into<String>) -> Self {
        Self::new(codes::CONNECTION_ABORTED, ErrorCategory::Transport, message)
    }

    pub fn mismatch_update_required_version(message: impl Into<String>) -> Self {
        Self::new(
            codes::MISMATCH_UPDATE_REQUIRED_VERSION,
            ErrorCategory::VersionMismatch,
            message,
        )
    }

    pub fn no_memory(message: impl Into<String>) -> Self {
        Self::new(codes::NO_MEMORY, ErrorCategory::Resource, message)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_deref().map(|c| c as _)
    }
}

pub type Result<T> = core::result::Result<T, ClientError>;
