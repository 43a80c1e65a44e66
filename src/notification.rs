//! Component E: the notification processing pipeline (spec.md §4.E).
//! Grounded in the teacher's `pipeline` staged-processing modules for the
//! "refresh → begin → apply each element → end" shape, and in
//! `data_plane` for treating decode/apply failures as a single terminating
//! error rather than partial application.

use crate::error::ClientError;
use crate::events::{ClientEvent, EventCallback, LocalTerminationCause, TerminationReason};
use crate::ids::{ClientId, TraitDataHandle, TraitPath};
use crate::lifecycle::Lifecycle;
use crate::sink::{SchemaRelation, SinkBroadcastEvent, SinkCatalog};
use crate::update::UpdateEngine;
use crate::wire::{DataListElement, NotificationRequest, StatusReport};

/// Access-control delegate consulted per data-list element (spec.md §4.E
/// step 4). The default behavior — allow everything — matches spec.md's
/// "default: allow".
pub trait AccessControlDelegate {
    fn allow(&self, path: TraitPath) -> bool;
}

/// Default delegate: allow every element.
#[derive(Debug, Default)]
pub struct AllowAll;

impl AccessControlDelegate for AllowAll {
    fn allow(&self, _path: TraitPath) -> bool {
        true
    }
}

/// What the caller should do after processing a notification.
#[derive(Debug, Default)]
pub struct NotificationOutcome {
    /// `true` iff a reply `StatusReport` should be sent on the inbound
    /// exchange (spec.md §4.E step 6). `false` only when the application's
    /// `NotificationRequest` callback mutated state such that processing
    /// bailed out early (spec.md §4.E step 2).
    pub should_reply: bool,
}

/// Runs one inbound `NotificationRequest` end to end (spec.md §4.E). The
/// caller is responsible for the preceding state check (Subscribing* or
/// Established*) and for actually arming the refreshed timer and sending
/// the reply — this function only performs the steps that read or mutate
/// client-owned state.
#[allow(clippy::too_many_arguments)]
pub fn process_notification(
    client_id: ClientId,
    lifecycle: &Lifecycle,
    catalog: &mut dyn SinkCatalog,
    schema: &dyn SchemaRelation,
    access: &dyn AccessControlDelegate,
    update_engine: &mut UpdateEngine,
    events: &mut dyn EventCallback,
    request: &NotificationRequest,
) -> Result<NotificationOutcome, ClientError> {
    let state_before = lifecycle.state();

    events.on_event(ClientEvent::SubscriptionActivity { client_id });

    events.on_event(ClientEvent::NotificationRequest { client_id });
    if lifecycle.state() != state_before {
        // The application ended or re-pointed the subscription from inside
        // the callback (spec.md §4.E step 2: "allowed to mutate state —
        // bail if it did").
        return Ok(NotificationOutcome { should_reply: false });
    }

    catalog.dispatch_event(SinkBroadcastEvent::NotifyRequestBegin);

    if let Some(data_list) = &request.data_list {
        apply_data_list(catalog, schema, access, update_engine, data_list)?;
    }

    if let Some(event_bytes) = &request.event_list {
        events.on_event(ClientEvent::EventStreamReceived {
            client_id,
            reader: event_bytes,
        });
    }

    events.on_event(ClientEvent::NotificationProcessed { client_id });
    catalog.dispatch_event(SinkBroadcastEvent::NotifyRequestEnd);

    Ok(NotificationOutcome { should_reply: true })
}

/// Step 4: iterate the data list, enforcing cross-element continuity of
/// partial changes within one trait instance (spec.md §4.E: "a partial
/// change must be continued by an element on the same trait").
fn apply_data_list(
    catalog: &mut dyn SinkCatalog,
    schema: &dyn SchemaRelation,
    access: &dyn AccessControlDelegate,
    update_engine: &mut UpdateEngine,
    data_list: &[DataListElement],
) -> Result<(), ClientError> {
    let mut prev_trait_data_handle: Option<TraitDataHandle> = None;
    let mut prev_is_partial_change = false;

    for element in data_list {
        if prev_is_partial_change {
            let continues_same_trait = prev_trait_data_handle == Some(element.trait_path.trait_data_handle);
            if !continues_same_trait {
                return Err(ClientError::malformed_update_response(
                    "partial change was not continued by an element on the same trait",
                ));
            }
        }

        if !access.allow(element.trait_path) {
            prev_trait_data_handle = Some(element.trait_path.trait_data_handle);
            prev_is_partial_change = element.is_partial_change;
            continue;
        }

        update_engine.check_potential_data_loss(element.trait_path, schema);

        let sink = catalog
            .locate(element.trait_path.trait_data_handle)
            .ok_or_else(|| ClientError::schema_mismatch("notification references an unknown trait handle"))?;
        sink.apply_data(element.trait_path, element.version, &element.data, element.is_partial_change)?;

        prev_trait_data_handle = Some(element.trait_path.trait_data_handle);
        prev_is_partial_change = element.is_partial_change;
    }

    Ok(())
}

/// Builds the `Common/Success` reply sent on step 6 (spec.md §4.E).
pub fn success_reply() -> StatusReport {
    StatusReport::common_success()
}

/// spec.md §4.E: "On any error, emit status-report-less
/// `HandleSubscriptionTerminated(retry_enabled, err, nil)`." Returns the
/// termination reason the caller hands to
/// [`crate::client::SubscriptionClient::handle_subscription_terminated`].
pub fn termination_reason_for_error(err: &ClientError) -> TerminationReason {
    match err.category() {
        crate::error::ErrorCategory::Contract => TerminationReason::Local(LocalTerminationCause::ContractViolation),
        crate::error::ErrorCategory::Wire => TerminationReason::Local(LocalTerminationCause::MalformedUpdateResponse),
        crate::error::ErrorCategory::Transport => TerminationReason::ConnectionAborted,
        crate::error::ErrorCategory::VersionMismatch | crate::error::ErrorCategory::Resource => {
            TerminationReason::Local(LocalTerminationCause::ContractViolation)
        }
    }
}
