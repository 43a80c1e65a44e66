//! Component G: the update engine (spec.md §4.G). Orchestrates
//! [`super::store::PendingUpdateStore`]/[`super::store::DispatchedUpdateStore`]
//! through `SetUpdated`, request formation, response correlation, timeout
//! recovery and data-loss detection. Grounded in the teacher's staged
//! `pipeline` modules (a pending stage feeding a dispatched stage behind a
//! single in-flight gate) for the two-store shape, and in
//! `governance::retry::adaptive` for the "continue on overflow" pattern
//! applied here to dictionary encoding instead of congestion control.

use crate::error::ClientError;
use crate::events::UpdateCompleteReason;
use crate::ids::{PropertyPathHandle, TraitPath};
use crate::path_store::PathFlags;
use crate::sink::{SchemaRelation, SinkCatalog};
use crate::wire::{PathStatus, StatusReport, UpdateDataElement, UpdateRequest};
use alloc::vec::Vec;

use super::store::{DispatchedUpdateStore, PendingUpdateStore, TiContextTable, UpdateRequestContext};

/// Result of encoding a single dirty path (spec.md §4.G: "the underlying
/// encoder returns BUFFER_TOO_SMALL or NO_MEMORY mid-dictionary"). The TLV
/// encoder and the schema engine that drives it are both external
/// collaborators (spec.md §1); this is the capability surface the update
/// engine needs from them.
pub enum EncodeOutcome {
    Complete(Vec<u8>),
    /// The schema engine ran out of buffer mid-dictionary and reports where
    /// to resume next time.
    DictionaryOverflow { data: Vec<u8>, resume_at: PropertyPathHandle },
}

pub trait UpdateEncoder {
    fn encode(
        &mut self,
        catalog: &mut dyn SinkCatalog,
        path: TraitPath,
        force_merge: bool,
        resume_from: Option<PropertyPathHandle>,
    ) -> Result<EncodeOutcome, ClientError>;
}

/// One application-visible completion produced while walking the Dispatched
/// store or purging Pending (spec.md §4.G `UpdateComplete`).
#[derive(Clone, Copy, Debug)]
pub struct UpdateCompletion {
    pub path: TraitPath,
    pub status: Option<PathStatus>,
    pub reason: UpdateCompleteReason,
}

/// What `OnUpdateConfirm` produced, for the caller to turn into application
/// events and follow-up actions.
#[derive(Debug, Default)]
pub struct ConfirmOutcome {
    pub completions: Vec<UpdateCompletion>,
    /// `PurgePendingUpdate` found work remaining; caller should immediately
    /// call [`UpdateEngine::build_next_request`] again with `force = true`.
    pub should_flush_again: bool,
    /// A trait carried `potential_data_loss` through this confirm; caller
    /// should force a resync if currently `Established_Idle` (spec.md §4.G).
    pub force_resync: bool,
}

/// What `OnUpdateResponseTimeout` produced.
#[derive(Debug, Default)]
pub struct TimeoutOutcome {
    pub completions: Vec<UpdateCompletion>,
    /// `MoveDispatchedToPending` overflowed; both stores were cleared and a
    /// `NoMemory` error should be surfaced.
    pub overflow: bool,
    /// Pending is non-empty in `Established_Idle`; caller should terminate
    /// the subscription to force a clean restart (spec.md §4.G).
    pub should_terminate: bool,
}

/// The two-stage update store plus per-trait bookkeeping (spec.md §4.G).
#[derive(Debug, Default)]
pub struct UpdateEngine {
    pending: PendingUpdateStore,
    dispatched: DispatchedUpdateStore,
    contexts: TiContextTable,
    request_ctx: UpdateRequestContext,
    update_in_flight: bool,
}

impl UpdateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_in_flight(&self) -> bool {
        self.update_in_flight
    }

    pub fn pending(&self) -> &PendingUpdateStore {
        &self.pending
    }

    pub fn dispatched(&self) -> &DispatchedUpdateStore {
        &self.dispatched
    }

    /// `SetUpdated(sink, path, conditional)` (spec.md §4.G).
    pub fn set_updated(
        &mut self,
        catalog: &mut dyn SinkCatalog,
        path: TraitPath,
        conditional: bool,
        force_merge: bool,
        private: bool,
        schema: &dyn SchemaRelation,
    ) -> Result<(), ClientError> {
        let handle = path.trait_data_handle;
        let sink = catalog
            .locate_updatable(handle)
            .ok_or_else(|| ClientError::incorrect_state("SetUpdated on a handle with no updatable sink"))?;

        if conditional && !sink.is_version_valid() {
            return Err(ClientError::incorrect_state(
                "conditional SetUpdated requires a sink with a valid version",
            ));
        }

        let already_tracked = self.pending.contains_handle(handle) || self.dispatched.contains_handle(handle);
        if conditional && !already_tracked {
            let version = sink.get_version();
            sink.set_update_required_version(version);
            sink.set_conditional_update();
        }

        let mut flags = PathFlags::empty();
        if force_merge {
            flags = flags | PathFlags::FORCE_MERGE;
        }
        if private {
            flags = flags | PathFlags::PRIVATE;
        }

        if !self.pending.add_item(path, flags, schema) {
            // Store full: log-and-drop is the documented contract; the
            // application finds out through a later FlushUpdate's
            // completion chain, not synchronously here.
            return Ok(());
        }

        self.contexts.get_or_create(handle).is_dirty = true;
        Ok(())
    }

    /// `FormAndSendUpdate`: builds the next `UpdateRequest`, if any, and
    /// moves its paths into Dispatched. Returns `None` when there is no
    /// dirty trait, or an update is already in flight. Setting
    /// `update_in_flight` is atomic with this call returning `Some` (spec.md
    /// §4.G) — the caller must actually send the request it receives.
    pub fn build_next_request(
        &mut self,
        catalog: &mut dyn SinkCatalog,
        encoder: &mut dyn UpdateEncoder,
    ) -> Result<Option<UpdateRequest>, ClientError> {
        if self.update_in_flight || self.contexts.is_empty() {
            return Ok(None);
        }
        let start = self.request_ctx.cur_processing_trait_instance_idx;
        let Some(idx) = self.contexts.next_dirty(start) else {
            return Ok(None);
        };
        let handle = self.contexts.at(idx).expect("index from next_dirty").trait_data_handle;
        let mut elements = Vec::new();
        let mut is_partial = false;

        let resuming = self
            .contexts
            .at(idx)
            .expect("index from next_dirty")
            .dictionary_in_progress();

        if resuming {
            let resume_at = self.contexts.at(idx).unwrap().next_dictionary_element_path_handle;
            let root_path = TraitPath::root(handle);
            match encoder.encode(catalog, root_path, true, Some(resume_at))? {
                EncodeOutcome::Complete(data) => {
                    self.contexts.at_mut(idx).unwrap().next_dictionary_element_path_handle = PropertyPathHandle::NULL;
                    elements.push(UpdateDataElement {
                        trait_path: root_path,
                        data,
                        force_merge: true,
                        private: false,
                    });
                    self.dispatched.add(root_path, PathFlags::FORCE_MERGE);
                    self.contexts.clear_dirty(handle);
                }
                EncodeOutcome::DictionaryOverflow { data, resume_at } => {
                    self.contexts.at_mut(idx).unwrap().next_dictionary_element_path_handle = resume_at;
                    is_partial = true;
                    elements.push(UpdateDataElement {
                        trait_path: root_path,
                        data,
                        force_merge: true,
                        private: false,
                    });
                    self.dispatched.add(root_path, PathFlags::FORCE_MERGE);
                }
            }
        } else {
            loop {
                let Some((path, flags)) = self.pending.take_next_for_handle(handle) else {
                    self.contexts.clear_dirty(handle);
                    break;
                };
                let force_merge = flags.contains(PathFlags::FORCE_MERGE);
                let private = flags.contains(PathFlags::PRIVATE);
                match encoder.encode(catalog, path, force_merge, None)? {
                    EncodeOutcome::Complete(data) => {
                        elements.push(UpdateDataElement {
                            trait_path: path,
                            data,
                            force_merge,
                            private,
                        });
                        self.dispatched.add(path, flags);
                    }
                    EncodeOutcome::DictionaryOverflow { data, resume_at } => {
                        elements.push(UpdateDataElement {
                            trait_path: path,
                            data,
                            force_merge: true,
                            private,
                        });
                        self.dispatched.add(path, flags | PathFlags::FORCE_MERGE);
                        self.contexts.at_mut(idx).unwrap().next_dictionary_element_path_handle = resume_at;
                        is_partial = true;
                        break;
                    }
                }
            }
        }

        self.request_ctx.cur_processing_trait_instance_idx = idx + 1;

        if elements.is_empty() {
            return Ok(None);
        }

        self.update_in_flight = true;
        Ok(Some(UpdateRequest {
            elements,
            is_partial_update: is_partial,
        }))
    }

    /// The previous `build_next_request`'s send concluded (response, error,
    /// or timeout already handled); clears the in-flight gate so another
    /// request may be formed.
    pub fn flight_finished(&mut self) {
        self.update_in_flight = false;
    }

    /// `OnUpdateConfirm` (spec.md §4.G). `report` must already be known to
    /// carry WDM's `UpdateResponse` in `additional_info` when present.
    pub fn on_update_confirm(
        &mut self,
        catalog: &mut dyn SinkCatalog,
        report: &StatusReport,
    ) -> Result<ConfirmOutcome, ClientError> {
        let whole_ok = report.success;
        let update_response = report.update_response.as_ref();
        let mut version_iter = update_response.and_then(|u| u.version_list.as_ref()).map(|v| v.iter());
        let mut status_iter = update_response.and_then(|u| u.status_list.as_ref()).map(|v| v.iter());

        if !whole_ok && status_iter.is_none() {
            return Err(ClientError::malformed_update_response(
                "non-success UpdateResponse missing its status_list",
            ));
        }

        let snapshot: Vec<(usize, TraitPath, PathFlags)> = self.dispatched.iter().collect();
        let mut completions = Vec::with_capacity(snapshot.len());
        let mut force_resync = false;

        for (idx, path, flags) in snapshot {
            let version_created = version_iter.as_mut().and_then(|it| it.next()).copied();
            let path_status = if whole_ok {
                None
            } else {
                match status_iter.as_mut().and_then(|it| it.next()) {
                    Some(s) => Some(*s),
                    None => {
                        return Err(ClientError::malformed_update_response(
                            "status_list exhausted before all dispatched paths were accounted for",
                        ));
                    }
                }
            };
            let path_succeeded = whole_ok || path_status.map(|s| s.status_code == 0).unwrap_or(false);

            if !flags.contains(PathFlags::PRIVATE) {
                completions.push(UpdateCompletion {
                    path,
                    status: path_status,
                    reason: if path_succeeded {
                        UpdateCompleteReason::Success
                    } else {
                        UpdateCompleteReason::Failed
                    },
                });
            }
            self.dispatched.remove_at(idx);

            let handle = path.trait_data_handle;
            if let Some(sink) = catalog.locate_updatable(handle) {
                if path_succeeded {
                    if sink.is_conditional_update() {
                        if self.pending.contains_handle(handle) {
                            if let Some(vc) = version_created {
                                sink.set_update_required_version(vc);
                            }
                        } else {
                            sink.clear_version();
                            sink.clear_conditional_update();
                        }
                    }
                    if let Some(vc) = version_created {
                        if sink.get_version() == vc {
                            if let Some(ctx) = self.contexts.get_mut(handle) {
                                ctx.potential_data_loss = false;
                            }
                        }
                    }
                } else {
                    sink.clear_version();
                    sink.clear_conditional_update();
                }
            }
        }

        let purge = self.purge_pending_update(catalog);
        completions.extend(purge.completions);
        for ctx in self.contexts.iter() {
            if ctx.potential_data_loss {
                force_resync = true;
            }
        }

        Ok(ConfirmOutcome {
            completions,
            should_flush_again: !self.pending.is_empty(),
            force_resync,
        })
    }

    /// `PurgePendingUpdate` (spec.md §4.G), also invoked standalone from
    /// `OnUpdateResponseTimeout`.
    pub fn purge_pending_update(&mut self, catalog: &mut dyn SinkCatalog) -> PurgeResult {
        let mut completions = Vec::new();
        let mut handled = Vec::new();
        let mut to_remove = Vec::new();
        for (_, path, _) in self.pending.iter() {
            let handle = path.trait_data_handle;
            if handled.contains(&handle) {
                continue;
            }
            handled.push(handle);
            let stale = catalog.locate_updatable(handle).is_some_and(|sink| {
                sink.is_conditional_update()
                    && (!sink.is_version_valid()
                        || sink
                            .update_required_version()
                            .is_some_and(|required| sink.get_version() < required))
            });
            if stale {
                completions.push(UpdateCompletion {
                    path: TraitPath::root(handle),
                    status: None,
                    reason: UpdateCompleteReason::MismatchUpdateRequiredVersion,
                });
                to_remove.push(handle);
            }
        }
        for handle in to_remove {
            self.pending.remove_by_handle(handle);
        }
        PurgeResult { completions }
    }

    /// `OnUpdateResponseTimeout` (spec.md §4.G).
    pub fn on_update_response_timeout(&mut self, catalog: &mut dyn SinkCatalog, schema: &dyn SchemaRelation) -> TimeoutOutcome {
        let mut completions: Vec<UpdateCompletion> = self
            .dispatched
            .iter()
            .filter(|(_, _, flags)| !flags.contains(PathFlags::PRIVATE))
            .map(|(_, path, _)| UpdateCompletion {
                path,
                status: None,
                reason: UpdateCompleteReason::Timeout,
            })
            .collect();

        self.update_in_flight = false;

        if self.move_dispatched_to_pending(schema).is_err() {
            return TimeoutOutcome {
                completions,
                overflow: true,
                should_terminate: false,
            };
        }

        let purge = self.purge_pending_update(catalog);
        completions.extend(purge.completions);

        TimeoutOutcome {
            completions,
            overflow: false,
            should_terminate: !self.pending.is_empty(),
        }
    }

    /// `MoveDispatchedToPending`: non-private dispatched entries are
    /// requeued; private (continuation) entries are dropped. On overflow,
    /// both stores are cleared.
    fn move_dispatched_to_pending(&mut self, schema: &dyn SchemaRelation) -> Result<(), ClientError> {
        let entries: Vec<(TraitPath, PathFlags)> = self
            .dispatched
            .iter()
            .filter(|(_, _, flags)| !flags.contains(PathFlags::PRIVATE))
            .map(|(_, path, flags)| (path, flags))
            .collect();
        self.dispatched.clear();

        for (path, flags) in entries {
            if !self.pending.add_item(path, flags, schema) {
                self.clear_all();
                return Err(ClientError::no_memory(
                    "pending store overflow while requeuing timed-out update paths",
                ));
            }
        }
        Ok(())
    }

    /// `CheckPotentialDataLoss` (spec.md §4.G).
    pub fn check_potential_data_loss(&mut self, touched: TraitPath, schema: &dyn SchemaRelation) {
        if self.pending.intersects(touched, schema) || self.dispatched.intersects(touched, schema) {
            self.contexts.set_potential_data_loss(touched.trait_data_handle);
        }
    }

    /// Everything still resident across both stores, for the caller to turn
    /// into `UpdateComplete(reason=ConnectionAborted)` events before
    /// clearing (spec.md §4.D: "clears update stores with ConnectionAborted").
    pub fn drain_for_abort(&mut self) -> Vec<TraitPath> {
        let mut out: Vec<TraitPath> = self
            .pending
            .iter()
            .filter(|(_, _, flags)| !flags.contains(PathFlags::PRIVATE))
            .map(|(_, path, _)| path)
            .collect();
        out.extend(
            self.dispatched
                .iter()
                .filter(|(_, _, flags)| !flags.contains(PathFlags::PRIVATE))
                .map(|(_, path, _)| path),
        );
        self.clear_all();
        out
    }

    fn clear_all(&mut self) {
        self.pending.clear();
        self.dispatched.clear();
        self.contexts = TiContextTable::new();
        self.update_in_flight = false;
        self.request_ctx = UpdateRequestContext::default();
    }
}

#[derive(Debug, Default)]
pub struct PurgeResult {
    pub completions: Vec<UpdateCompletion>,
}
