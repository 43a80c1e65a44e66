//! Tamper-evident audit trail for update/notification traffic
//! (SPEC_FULL.md §13). Grounded in the teacher's `audit::hasher` /
//! `audit::recorder` hash-chaining pattern; supplements (does not replace)
//! the diagnostic [`crate::observability::Logger`] — this is for
//! after-the-fact review of exactly which state transitions and update
//! outcomes occurred, not for live debugging.
//!
//! Not a persistence mechanism (spec.md Non-goals: "no persistence across
//! process restart") — the trail lives in memory for the client's lifetime.

#![cfg(feature = "std")]

use alloc::string::String;
use alloc::vec::Vec;
use sha2::{Digest, Sha256};

/// What kind of fact this entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditKind {
    StateTransition,
    UpdateAccepted,
    UpdateRejected,
    UpdateDispatched,
    UpdateConfirmed,
}

/// One hash-chained entry.
#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub sequence: u64,
    pub prev_hash: [u8; 32],
    pub kind: AuditKind,
    pub summary: String,
    pub hash: [u8; 32],
}

fn compute_hash(sequence: u64, prev_hash: &[u8; 32], kind: AuditKind, summary: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash);
    hasher.update([kind as u8]);
    hasher.update(summary.as_bytes());
    hasher.finalize().into()
}

/// In-memory hash chain. Recording is `O(1)` amortized and only engaged
/// when the embedder opts in — the hot path of the lifecycle FSM and update
/// engine never pays for hashing unless an `AuditTrail` is present.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    fn tip_hash(&self) -> [u8; 32] {
        self.entries.last().map(|e| e.hash).unwrap_or([0u8; 32])
    }

    pub fn record(&mut self, kind: AuditKind, summary: impl Into<String>) {
        let summary = summary.into();
        let sequence = self.entries.len() as u64;
        let prev_hash = self.tip_hash();
        let hash = compute_hash(sequence, &prev_hash, kind, &summary);
        self.entries.push(AuditEntry {
            sequence,
            prev_hash,
            kind,
            summary,
            hash,
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Recompute the chain from scratch and compare — catches accidental
    /// mutation of a logged `AuditEntry` (there is no public mutator, but
    /// this is cheap insurance for anyone hand-constructing a trail in
    /// tests).
    pub fn verify(&self) -> bool {
        let mut prev_hash = [0u8; 32];
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.sequence != i as u64 || entry.prev_hash != prev_hash {
                return false;
            }
            let expected = compute_hash(entry.sequence, &prev_hash, entry.kind, &entry.summary);
            if expected != entry.hash {
                return false;
            }
            prev_hash = entry.hash;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_verifies_after_appends() {
        let mut trail = AuditTrail::new();
        trail.record(AuditKind::StateTransition, "Free -> Initialized");
        trail.record(AuditKind::UpdateAccepted, "path 1:0 accepted");
        assert!(trail.verify());
        assert_eq!(trail.entries().len(), 2);
    }

    #[test]
    fn tampering_breaks_verification() {
        let mut trail = AuditTrail::new();
        trail.record(AuditKind::StateTransition, "Free -> Initialized");
        trail.entries[0].summary = String::from("tampered");
        assert!(!trail.verify());
    }
}
