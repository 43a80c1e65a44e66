//! Top-level wiring: [`SubscriptionClient`] owns every collaborator and
//! drives components A–I through one subscription's lifetime. Grounded in
//! the teacher's top-level service structs that hold a
//! `contract::ContractStateMachine` plus its external collaborators behind
//! trait objects and expose a handful of entry points the runtime calls
//! into — the same shape here, specialized to WDM's binding/exchange/codec
//! collaborators instead of the teacher's transport/service stack.

use alloc::boxed::Box;
use alloc::format;
use core::time::Duration;

use crate::binding::{Binding, BindingState};
use crate::error::ClientError;
use crate::events::{ClientEvent, EventCallback, LocalTerminationCause, TerminationReason, UpdateCompleteReason};
use crate::exchange::{Exchange, ExchangeSlot, ExchangeTeardown};
use crate::ids::{ClientId, SubscriptionId, TraitDataHandle, TraitPath};
use crate::lifecycle::{ClientState, Lifecycle};
use crate::limits::ClientConfig;
use crate::notification::{process_notification, success_reply, termination_reason_for_error, AccessControlDelegate, AllowAll};
use crate::observability::{LogLevel, Logger, NoopLogger};
use crate::refcount::{ExternalLock, NoopLock, ReentrancyGuard, RefCount};
use crate::resubscribe::{DefaultResubscribePolicy, ResubscribeParam, ResubscribePolicy};
use crate::sink::{SchemaRelation, SinkBroadcastEvent, SinkCatalog};
use crate::timer::{ArmedTimer, TimerDriver, TimerPurpose};
use crate::update::{UpdateCompletion, UpdateEncoder, UpdateEngine};
use crate::wire::{Codec, InboundMessage, OutboundMessage, StatusReport, SubscribeCancelRequest, SubscribeConfirmRequest};

#[cfg(feature = "std")]
use crate::audit::{AuditKind, AuditTrail};

/// Everything the client needs that the spec names an external collaborator
/// (spec.md §1, §6). Bundled into one struct so construction reads as "here
/// is the environment", matching the teacher's pattern of a single
/// collaborators struct passed to a service constructor instead of a long
/// positional argument list.
pub struct ClientCollaborators {
    pub binding: Box<dyn Binding>,
    pub catalog: Box<dyn SinkCatalog>,
    pub codec: Box<dyn Codec>,
    pub schema: Box<dyn SchemaRelation>,
    pub timer_driver: Box<dyn TimerDriver>,
    pub encoder: Box<dyn UpdateEncoder>,
    pub events: Box<dyn EventCallback>,
    pub access: Box<dyn AccessControlDelegate>,
    pub resubscribe_policy: Box<dyn ResubscribePolicy>,
    pub logger: Box<dyn Logger>,
    pub lock: Box<dyn ExternalLock>,
}

impl ClientCollaborators {
    /// Convenience constructor for embedders that only need to override a
    /// handful of fields; the rest get the crate's no-op defaults.
    pub fn new(
        binding: Box<dyn Binding>,
        catalog: Box<dyn SinkCatalog>,
        codec: Box<dyn Codec>,
        schema: Box<dyn SchemaRelation>,
        timer_driver: Box<dyn TimerDriver>,
        encoder: Box<dyn UpdateEncoder>,
        events: Box<dyn EventCallback>,
    ) -> Self {
        Self {
            binding,
            catalog,
            codec,
            schema,
            timer_driver,
            encoder,
            events,
            access: Box::new(AllowAll),
            resubscribe_policy: Box::new(DefaultResubscribePolicy::new(0x5EED)),
            logger: Box::new(NoopLogger),
            lock: Box::new(NoopLock),
        }
    }
}

/// The WDM subscription client (spec.md, all of §4). Single-threaded
/// cooperative by design (spec.md §5) — `!Send` is the honest default; an
/// embedder that needs cross-thread `SetUpdated` callers goes through
/// [`ExternalLock`], not by sharing this struct across threads.
pub struct SubscriptionClient {
    client_id: ClientId,
    config: ClientConfig,
    refcount: RefCount,
    lifecycle: Lifecycle,
    timer: ArmedTimer,
    exchange: ExchangeSlot,
    update_engine: UpdateEngine,
    collaborators: ClientCollaborators,
    #[cfg(feature = "std")]
    audit: Option<AuditTrail>,
}

impl SubscriptionClient {
    pub fn new(config: ClientConfig, collaborators: ClientCollaborators) -> Self {
        Self {
            client_id: config.client_id(),
            config,
            refcount: RefCount::new(),
            lifecycle: Lifecycle::new(),
            timer: ArmedTimer::none(),
            exchange: ExchangeSlot::new(),
            update_engine: UpdateEngine::new(),
            collaborators,
            #[cfg(feature = "std")]
            audit: None,
        }
    }

    #[cfg(feature = "std")]
    pub fn with_audit_trail(mut self) -> Self {
        self.audit = Some(AuditTrail::new());
        self
    }

    pub fn state(&self) -> ClientState {
        self.lifecycle.state()
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    #[cfg(feature = "std")]
    fn record_audit(&mut self, kind: AuditKind, summary: impl Into<alloc::string::String>) {
        if let Some(trail) = self.audit.as_mut() {
            trail.record(kind, summary);
        }
    }

    #[cfg(feature = "std")]
    pub fn audit_trail(&self) -> Option<&AuditTrail> {
        self.audit.as_ref()
    }

    fn log(&self, level: LogLevel, target: &'static str, message: alloc::string::String) {
        crate::observability::emit(self.collaborators.logger.as_ref(), level, target, self.client_id, message);
    }

    /// `Init()` (spec.md §4.D).
    pub fn init(&mut self) -> Result<(), ClientError> {
        self.lifecycle.init(self.collaborators.binding.as_mut(), &self.refcount)?;
        #[cfg(feature = "std")]
        self.record_audit(AuditKind::StateTransition, "Free -> Initialized");
        Ok(())
    }

    /// Releases the permanent refcount hold taken by `init`, settling the
    /// client to `Free` once nothing else keeps it alive (spec.md §3, §4.D).
    pub fn release(&mut self) -> bool {
        self.lifecycle.release(&self.refcount)
    }

    /// `InitiateSubscription` as the initiator (spec.md §4.D). If the
    /// binding is not `Ready`, requests preparation and returns without
    /// error; `on_binding_ready` re-enters once preparation completes.
    pub async fn initiate_subscription(&mut self) -> Result<(), ClientError> {
        if self.collaborators.binding.state() != BindingState::Ready {
            self.collaborators.binding.prepare()?;
            self.collaborators
                .events
                .on_event(ClientEvent::SubscribeRequestPrepareNeeded { client_id: self.client_id });
            return Ok(());
        }
        self.initiate_subscription_locked(true, None, 0).await
    }

    /// `InitiateCounterSubscription` (spec.md §4.D, §8 scenario 2): the
    /// application supplies the subscription id and liveness up front.
    pub async fn initiate_counter_subscription(&mut self, subscription_id: SubscriptionId, liveness_sec: u32) -> Result<(), ClientError> {
        self.initiate_subscription_locked(false, Some(subscription_id), liveness_sec).await
    }

    /// Re-entry point after the application finishes preparing the binding
    /// out of band (spec.md §4.D). Short-circuits if the client already
    /// moved past `Initialized`.
    pub async fn on_binding_ready(&mut self) -> Result<(), ClientError> {
        if self.lifecycle.state() != ClientState::Initialized {
            return Ok(());
        }
        self.initiate_subscription().await
    }

    async fn initiate_subscription_locked(
        &mut self,
        is_initiator: bool,
        counter_subscription_id: Option<SubscriptionId>,
        liveness_sec: u32,
    ) -> Result<(), ClientError> {
        let _refcount_ptr: *const RefCount = &self.refcount;
        let _guard = ReentrancyGuard::enter(unsafe { &*_refcount_ptr });
        self.lifecycle
            .initiate_subscription(is_initiator, counter_subscription_id, liveness_sec)?;

        let mut request = self.collaborators.events.build_subscribe_request()?;
        request.subscription_id = self.lifecycle.meta().subscription_id;

        self.replace_exchange_context(ExchangeTeardown::Close).await?;
        self.refresh_timer()?;

        self.send(OutboundMessage::SubscribeRequest(request)).await
    }

    /// `replace_exchange_context()` (spec.md §4.B/C).
    async fn replace_exchange_context(&mut self, teardown: ExchangeTeardown) -> Result<(), ClientError> {
        let next: Box<dyn Exchange> = self.collaborators.binding.new_exchange_context().await?;
        self.exchange.replace(Some(next), teardown);
        self.collaborators
            .events
            .on_event(ClientEvent::ExchangeStart { client_id: self.client_id });
        Ok(())
    }

    async fn send(&mut self, message: OutboundMessage) -> Result<(), ClientError> {
        let send_result = match self.exchange.current() {
            Some(exchange) => exchange.send(message).await,
            None => return Err(ClientError::incorrect_state("send with no exchange context")),
        };
        if let Err(err) = send_result {
            self.log(LogLevel::Warn, "wdm.send", format!("send failed: {err}"));
            self.handle_subscription_terminated(self.config.resubscribe_enabled(), TerminationReason::ConnectionAborted)
                .await?;
            return Err(err);
        }
        Ok(())
    }

    /// `refresh_timer()` policy table (spec.md §4.B/C).
    fn refresh_timer(&mut self) -> Result<(), ClientError> {
        let meta = self.lifecycle.meta();
        let next = match self.lifecycle.state() {
            ClientState::Subscribing | ClientState::SubscribingIdAssigned => self
                .config
                .inactivity_timeout_during_subscribing()
                .map(|d| (TimerPurpose::SubscribingInactivity, d)),
            ClientState::EstablishedIdle if meta.is_initiator => {
                let timeout = Duration::from_millis(meta.liveness_timeout_ms as u64);
                let margin = self.config.wrm().margin();
                if margin >= timeout {
                    return Err(ClientError::timeout("WRM margin exceeds the liveness timeout"));
                }
                Some((TimerPurpose::LivenessConfirmation, timeout - margin))
            }
            ClientState::EstablishedIdle => {
                (meta.liveness_timeout_ms > 0).then(|| (TimerPurpose::LivenessWatchdog, Duration::from_millis(meta.liveness_timeout_ms as u64)))
            }
            ClientState::EstablishedConfirming | ClientState::Aborting => None,
            _ => None,
        };
        self.timer.rearm(self.collaborators.timer_driver.as_mut(), self.client_id, next);
        Ok(())
    }

    fn set_retry_timer(&mut self, delay: Duration) {
        self.timer
            .rearm(self.collaborators.timer_driver.as_mut(), self.client_id, Some((TimerPurpose::ResubscribeHoldoff, delay)));
    }

    /// Dispatch for an inbound message on the currently tracked exchange
    /// (spec.md §5: correlated by exchange identity, not any in-payload id).
    pub async fn on_message_received(&mut self, exchange_id: u64, message: InboundMessage) -> Result<(), ClientError> {
        if !self.exchange.is_current(exchange_id) && !self.lifecycle.state().is_established() {
            // Notifications in Subscribing* must arrive on the original
            // outbound exchange (spec.md §5); anything else in that phase
            // is ignored rather than acted on.
            return Ok(());
        }
        match message {
            InboundMessage::SubscribeResponse(resp) => {
                let _refcount_ptr: *const RefCount = &self.refcount;
                let _guard = ReentrancyGuard::enter(unsafe { &*_refcount_ptr });
                self.lifecycle.on_subscribe_response(resp.subscription_id, resp.timeout_sec)?;
                self.refresh_timer()?;
                #[cfg(feature = "std")]
                self.record_audit(AuditKind::StateTransition, "-> Established_Idle");
                self.collaborators.events.on_event(ClientEvent::SubscriptionEstablished {
                    client_id: self.client_id,
                    subscription_id: resp.subscription_id,
                });
                Ok(())
            }
            InboundMessage::NotificationRequest(req) => self.on_notification_request(&req).await,
            InboundMessage::StatusReport(report) => self.on_status_report(report).await,
        }
    }

    async fn on_notification_request(&mut self, request: &crate::wire::NotificationRequest) -> Result<(), ClientError> {
        if self.lifecycle.state() == ClientState::Canceling {
            return self
                .run_full_abort(TerminationReason::Local(LocalTerminationCause::EndSubscriptionRequested))
                .await;
        }
        if !self.lifecycle.state().accepts_notifications() {
            return Ok(());
        }
        self.refresh_timer()?;
        let result = process_notification(
            self.client_id,
            &self.lifecycle,
            self.collaborators.catalog.as_mut(),
            self.collaborators.schema.as_ref(),
            self.collaborators.access.as_ref(),
            &mut self.update_engine,
            self.collaborators.events.as_mut(),
            request,
        );
        match result {
            Ok(outcome) if outcome.should_reply => self.send(OutboundMessage::StatusReport(success_reply())).await,
            Ok(_) => Ok(()),
            Err(err) => {
                let reason = termination_reason_for_error(&err);
                self.handle_subscription_terminated(self.config.resubscribe_enabled(), reason).await
            }
        }
    }

    async fn on_status_report(&mut self, report: StatusReport) -> Result<(), ClientError> {
        match self.lifecycle.state() {
            ClientState::EstablishedConfirming if report.success => {
                self.lifecycle.on_confirm_success()?;
                self.refresh_timer()
            }
            ClientState::Canceling => {
                self.run_full_abort(TerminationReason::Local(LocalTerminationCause::EndSubscriptionRequested))
                    .await
            }
            _ if report.update_response.is_some() => self.on_update_confirm(report).await,
            _ => Err(ClientError::new(
                crate::error::codes::STATUS_REPORT_RECEIVED,
                crate::error::ErrorCategory::Wire,
                "unexpected StatusReport for current state",
            )),
        }
    }

    async fn on_update_confirm(&mut self, report: StatusReport) -> Result<(), ClientError> {
        let outcome = self.update_engine.on_update_confirm(self.collaborators.catalog.as_mut(), &report)?;
        self.update_engine.flight_finished();
        self.emit_update_completions(outcome.completions);
        if outcome.should_flush_again {
            self.flush_update().await?;
        }
        if outcome.force_resync && self.lifecycle.state() == ClientState::EstablishedIdle {
            self.handle_subscription_terminated(self.config.resubscribe_enabled(), TerminationReason::Remote)
                .await?;
        }
        Ok(())
    }

    fn emit_update_completions(&mut self, completions: alloc::vec::Vec<UpdateCompletion>) {
        for completion in completions {
            self.collaborators.events.on_event(ClientEvent::UpdateComplete {
                client_id: self.client_id,
                path: completion.path,
                status: completion.status,
                reason: completion.reason,
            });
        }
    }

    /// `OnUpdateResponseTimeout` (spec.md §4.G).
    pub async fn on_update_response_timeout(&mut self) -> Result<(), ClientError> {
        let outcome = self
            .update_engine
            .on_update_response_timeout(self.collaborators.catalog.as_mut(), self.collaborators.schema.as_ref());
        self.emit_update_completions(outcome.completions);
        if outcome.overflow {
            self.collaborators.events.on_event(ClientEvent::UpdateComplete {
                client_id: self.client_id,
                path: TraitPath::root(TraitDataHandle(0)),
                status: None,
                reason: UpdateCompleteReason::NoMemory,
            });
        }
        if outcome.should_terminate && self.lifecycle.state() == ClientState::EstablishedIdle {
            self.handle_subscription_terminated(self.config.resubscribe_enabled(), TerminationReason::Timeout)
                .await?;
        }
        Ok(())
    }

    /// `SetUpdated(sink, path, conditional)` (spec.md §4.G).
    pub fn set_updated(&mut self, path: TraitPath, conditional: bool, force_merge: bool) -> Result<(), ClientError> {
        self.collaborators.lock.lock();
        let result =
            self.update_engine
                .set_updated(self.collaborators.catalog.as_mut(), path, conditional, force_merge, false, self.collaborators.schema.as_ref());
        self.collaborators.lock.unlock();
        result
    }

    /// `FlushUpdate`/`FormAndSendUpdate` (spec.md §4.G): only in
    /// `Established_Idle` with no update in flight.
    pub async fn flush_update(&mut self) -> Result<(), ClientError> {
        if self.lifecycle.state() != ClientState::EstablishedIdle || self.update_engine.update_in_flight() {
            return Ok(());
        }
        self.collaborators.lock.lock();
        let request = self
            .update_engine
            .build_next_request(self.collaborators.catalog.as_mut(), self.collaborators.encoder.as_mut());
        self.collaborators.lock.unlock();
        match request? {
            Some(request) => self.send(OutboundMessage::UpdateRequest(request)).await,
            None => Ok(()),
        }
    }

    /// `EndSubscription()` (spec.md §4.D, §5).
    pub async fn end_subscription(&mut self) -> Result<(), ClientError> {
        self.lifecycle.end_subscription()?;
        let subscription_id = self
            .lifecycle
            .meta()
            .subscription_id
            .ok_or_else(|| ClientError::incorrect_state("no subscription_id to cancel"))?;
        self.send(OutboundMessage::SubscribeCancelRequest(SubscribeCancelRequest { subscription_id }))
            .await
    }

    /// `HandleSubscriptionTerminated(will_retry, reason, status?)` (spec.md
    /// §4.D): the single join point for every error path.
    pub async fn handle_subscription_terminated(&mut self, will_retry: bool, reason: TerminationReason) -> Result<(), ClientError> {
        if !will_retry {
            return self.run_full_abort(reason).await;
        }

        let _refcount_ptr: *const RefCount = &self.refcount;
        let _guard = ReentrancyGuard::enter(unsafe { &*_refcount_ptr });
        let subscription_id = self.lifecycle.meta().subscription_id;
        self.exchange.clear(ExchangeTeardown::Abort);
        self.collaborators.events.on_event(ClientEvent::SubscriptionTerminated {
            client_id: self.client_id,
            subscription_id,
            will_retry: true,
            reason,
        });
        if self.lifecycle.enter_resubscribe_holdoff().is_ok() {
            let wait = self
                .collaborators
                .resubscribe_policy
                .compute_wait(ResubscribeParam { num_retries: self.lifecycle.retry_count() });
            self.set_retry_timer(wait);
        }
        Ok(())
    }

    /// `AbortSubscription` (spec.md §4.D, §5: "immediate and synchronous").
    pub async fn abort_subscription(&mut self, reason: TerminationReason) -> Result<(), ClientError> {
        self.run_full_abort(reason).await
    }

    async fn run_full_abort(&mut self, reason: TerminationReason) -> Result<(), ClientError> {
        if !self.lifecycle.abort() {
            return Ok(());
        }
        let _refcount_ptr: *const RefCount = &self.refcount;
        let _guard = ReentrancyGuard::enter(unsafe { &*_refcount_ptr });
        let subscription_id = self.lifecycle.meta().subscription_id;
        self.timer.rearm(self.collaborators.timer_driver.as_mut(), self.client_id, None);
        self.exchange.clear(ExchangeTeardown::Abort);

        let dropped = self.update_engine.drain_for_abort();
        for path in dropped {
            self.collaborators.events.on_event(ClientEvent::UpdateComplete {
                client_id: self.client_id,
                path,
                status: None,
                reason: UpdateCompleteReason::ConnectionAborted,
            });
        }

        self.collaborators.catalog.dispatch_event(SinkBroadcastEvent::SubscriptionTerminated);
        self.collaborators.events.on_event(ClientEvent::SubscriptionTerminated {
            client_id: self.client_id,
            subscription_id,
            will_retry: false,
            reason,
        });
        self.collaborators.binding.release();
        self.lifecycle.finish_abort();
        #[cfg(feature = "std")]
        self.record_audit(AuditKind::StateTransition, "-> Aborted");
        Ok(())
    }

    /// `on_liveness_timer_fire` driving `Established_Idle →
    /// Established_Confirming` (spec.md §4.D).
    pub async fn on_liveness_timer_fire(&mut self) -> Result<(), ClientError> {
        self.timer.on_fired();
        self.lifecycle.on_liveness_timer_fire()?;
        let subscription_id = self
            .lifecycle
            .meta()
            .subscription_id
            .ok_or_else(|| ClientError::incorrect_state("no subscription_id"))?;
        self.send(OutboundMessage::SubscribeConfirmRequest(SubscribeConfirmRequest { subscription_id }))
            .await
    }

    /// `on_resubscribe_timer_fire`: `Resubscribe_Holdoff → _InitiateSubscription` (spec.md §4.D).
    pub async fn on_resubscribe_timer_fire(&mut self) -> Result<(), ClientError> {
        self.timer.on_fired();
        self.lifecycle.on_resubscribe_timer_fire()?;
        self.initiate_subscription().await
    }
}
