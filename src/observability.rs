//! Ambient diagnostic logging surface (SPEC_FULL.md §11). Grounded in the
//! teacher's `observability::facade::ObservabilityFacade` pattern of
//! injecting a small trait rather than depending on a global logger
//! registry — kept deliberately smaller here since the crate only needs one
//! capability (structured log records), not the teacher's full
//! logger/metrics/ops-bus/health-check bundle.

use crate::ids::ClientId;
use alloc::string::String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A single diagnostic record. Deliberately not tied to the `log` crate's
/// global macros — the embedder wires this to whatever sink it already
/// uses, the same way the application supplies [`crate::events::EventCallback`].
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub level: LogLevel,
    pub target: &'static str,
    pub client_id: ClientId,
    pub message: String,
}

/// Diagnostic sink (spec.md §1 names logging as an external collaborator —
/// this is the injection point, not an implementation of one).
pub trait Logger: Send + Sync {
    fn log(&self, record: LogRecord);
}

/// Default sink: discards everything. Lets the client run without an
/// embedder-supplied logger.
#[derive(Debug, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _record: LogRecord) {}
}

/// Small helper so call sites read like `log_debug!(logger, id, "...")`
/// without formatting cost when nothing consumes the record — kept as a
/// plain function rather than a macro to avoid macro-export plumbing for
/// what is, in this crate, a handful of call sites.
pub fn emit(logger: &dyn Logger, level: LogLevel, target: &'static str, client_id: ClientId, message: String) {
    logger.log(LogRecord {
        level,
        target,
        client_id,
        message,
    });
}
