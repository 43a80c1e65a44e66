//! Shared test doubles for the integration suites. Not a test binary itself
//! (`tests/common/mod.rs` is excluded from cargo's test autodiscovery).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wdm_subscription_client::prelude::*;
use wdm_subscription_client::sink::{NoRelationSchema, SinkBroadcastEvent, TraitDataSink, TraitUpdatableDataSink};
use wdm_subscription_client::update::{EncodeOutcome, UpdateEncoder};

/// Records every send so a test can assert on the outbound sequence without
/// a real transport.
#[derive(Default)]
pub struct SendLog(pub Mutex<Vec<OutboundMessage>>);

pub struct FakeExchange {
    pub id: u64,
    pub log: Arc<SendLog>,
    pub fail_sends: Arc<Mutex<bool>>,
}

#[async_trait::async_trait]
impl Exchange for FakeExchange {
    fn id(&self) -> u64 {
        self.id
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), ClientError> {
        if *self.fail_sends.lock().unwrap() {
            return Err(ClientError::connection_aborted("fake exchange send failure"));
        }
        self.log.0.lock().unwrap().push(message);
        Ok(())
    }

    fn teardown(&self, _mode: ExchangeTeardown) {}
}

pub struct FakeBinding {
    pub state: BindingState,
    pub log: Arc<SendLog>,
    pub fail_sends: Arc<Mutex<bool>>,
    pub next_exchange_id: Mutex<u64>,
    pub refs: Mutex<u32>,
}

impl FakeBinding {
    pub fn ready(log: Arc<SendLog>) -> Self {
        Self {
            state: BindingState::Ready,
            log,
            fail_sends: Arc::new(Mutex::new(false)),
            next_exchange_id: Mutex::new(1),
            refs: Mutex::new(0),
        }
    }
}

#[async_trait::async_trait]
impl Binding for FakeBinding {
    fn state(&self) -> BindingState {
        self.state
    }

    fn prepare(&mut self) -> Result<(), ClientError> {
        self.state = BindingState::Ready;
        Ok(())
    }

    async fn new_exchange_context(&self) -> Result<Box<dyn Exchange>, ClientError> {
        let mut id = self.next_exchange_id.lock().unwrap();
        let exchange = FakeExchange {
            id: *id,
            log: self.log.clone(),
            fail_sends: self.fail_sends.clone(),
        };
        *id += 1;
        Ok(Box::new(exchange))
    }

    fn is_authentic_inbound(&self) -> bool {
        true
    }

    fn default_wrm_config(&self) -> WrmConfig {
        WrmConfig::default_config()
    }

    fn peer_node_id(&self) -> u64 {
        0xAAAA
    }

    fn adjust_response_timeout(&self, base: Duration) -> Duration {
        base
    }

    fn add_ref(&mut self) {
        *self.refs.lock().unwrap() += 1;
    }

    fn release(&mut self) {
        *self.refs.lock().unwrap() -= 1;
    }
}

#[derive(Default)]
pub struct FakeSink {
    pub version: u64,
    pub required_version: Option<u64>,
    pub conditional: bool,
}

impl TraitDataSink for FakeSink {
    fn get_version(&self) -> u64 {
        self.version
    }

    fn apply_data(&mut self, _path: TraitPath, version: u64, _data: &[u8], _is_partial: bool) -> Result<(), ClientError> {
        self.version = version;
        Ok(())
    }
}

impl TraitUpdatableDataSink for FakeSink {
    fn is_version_valid(&self) -> bool {
        self.required_version.is_some() || self.version > 0
    }

    fn set_update_required_version(&mut self, version: u64) {
        self.required_version = Some(version);
    }

    fn clear_version(&mut self) {
        self.required_version = None;
    }

    fn update_required_version(&self) -> Option<u64> {
        self.required_version
    }

    fn is_conditional_update(&self) -> bool {
        self.conditional
    }

    fn set_conditional_update(&mut self) {
        self.conditional = true;
    }

    fn clear_conditional_update(&mut self) {
        self.conditional = false;
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub sinks: HashMap<TraitDataHandle, FakeSink>,
    pub begin_count: u32,
    pub end_count: u32,
    pub terminated_count: u32,
}

impl FakeCatalog {
    pub fn with_sink(handle: TraitDataHandle, sink: FakeSink) -> Self {
        let mut sinks = HashMap::new();
        sinks.insert(handle, sink);
        Self { sinks, begin_count: 0, end_count: 0, terminated_count: 0 }
    }
}

impl SinkCatalog for FakeCatalog {
    fn locate_updatable(&mut self, handle: TraitDataHandle) -> Option<&mut dyn TraitUpdatableDataSink> {
        self.sinks.get_mut(&handle).map(|s| s as &mut dyn TraitUpdatableDataSink)
    }

    fn locate(&mut self, handle: TraitDataHandle) -> Option<&mut dyn TraitDataSink> {
        self.sinks.get_mut(&handle).map(|s| s as &mut dyn TraitDataSink)
    }

    fn get_resource_id(&self, _handle: TraitDataHandle) -> Option<u64> {
        Some(1)
    }

    fn get_instance_id(&self, _handle: TraitDataHandle) -> Option<u64> {
        Some(0)
    }

    fn handles(&self) -> Vec<TraitDataHandle> {
        self.sinks.keys().copied().collect()
    }

    fn dispatch_event(&mut self, event: SinkBroadcastEvent) {
        match event {
            SinkBroadcastEvent::NotifyRequestBegin => self.begin_count += 1,
            SinkBroadcastEvent::NotifyRequestEnd => self.end_count += 1,
            SinkBroadcastEvent::SubscriptionTerminated => self.terminated_count += 1,
        }
    }
}

pub struct FakeCodec;

impl Codec for FakeCodec {
    fn encode(&self, _message: &OutboundMessage) -> Result<Vec<u8>, ClientError> {
        Ok(Vec::new())
    }

    fn decode(&self, _bytes: &[u8]) -> Result<InboundMessage, ClientError> {
        Err(ClientError::invalid_argument("FakeCodec::decode is unused in these tests"))
    }
}

/// Encodes every path as a fixed 3-byte payload; never reports overflow.
/// Good enough for scenarios that only need `UpdateRequest` framing, not
/// real dictionary-overflow behavior (see `tests/update_engine.rs` for a
/// dedicated overflow double).
pub struct FixedEncoder;

impl UpdateEncoder for FixedEncoder {
    fn encode(
        &mut self,
        _catalog: &mut dyn wdm_subscription_client::sink::SinkCatalog,
        _path: TraitPath,
        _force_merge: bool,
        _resume_from: Option<PropertyPathHandle>,
    ) -> Result<EncodeOutcome, ClientError> {
        Ok(EncodeOutcome::Complete(vec![1, 2, 3]))
    }
}

#[derive(Default)]
pub struct RecordingEventsData {
    pub events: Vec<String>,
    pub terminated: Vec<TerminationReason>,
    pub established: Vec<SubscriptionId>,
    pub update_complete: Vec<UpdateCompleteReason>,
}

/// Thin `EventCallback` adapter over a shared [`RecordingEventsData`], so a
/// test can keep an `Rc` clone after the callback itself is moved into a
/// `Box<dyn EventCallback>` inside [`ClientCollaborators`].
pub struct RecordingEvents(pub Arc<Mutex<RecordingEventsData>>);

impl RecordingEvents {
    pub fn new() -> (Self, Arc<Mutex<RecordingEventsData>>) {
        let data = Arc::new(Mutex::new(RecordingEventsData::default()));
        (Self(data.clone()), data)
    }
}

impl EventCallback for RecordingEvents {
    fn on_event(&mut self, event: ClientEvent<'_>) {
        let mut data = self.0.lock().unwrap();
        match event {
            ClientEvent::SubscriptionEstablished { subscription_id, .. } => {
                data.events.push("SubscriptionEstablished".into());
                data.established.push(subscription_id);
            }
            ClientEvent::SubscriptionTerminated { will_retry, reason, .. } => {
                data.events.push(format!("SubscriptionTerminated(retry={will_retry})"));
                data.terminated.push(reason);
            }
            ClientEvent::UpdateComplete { reason, .. } => {
                data.events.push("UpdateComplete".into());
                data.update_complete.push(reason);
            }
            ClientEvent::NotificationRequest { .. } => data.events.push("NotificationRequest".into()),
            ClientEvent::NotificationProcessed { .. } => data.events.push("NotificationProcessed".into()),
            ClientEvent::SubscriptionActivity { .. } => data.events.push("SubscriptionActivity".into()),
            ClientEvent::ExchangeStart { .. } => data.events.push("ExchangeStart".into()),
            ClientEvent::SubscribeRequestPrepareNeeded { .. } => data.events.push("SubscribeRequestPrepareNeeded".into()),
            ClientEvent::EventStreamReceived { .. } => data.events.push("EventStreamReceived".into()),
        }
    }

    fn build_subscribe_request(&mut self) -> Result<wdm_subscription_client::wire::SubscribeRequest, ClientError> {
        Ok(wdm_subscription_client::wire::SubscribeRequest {
            path_list: vec![TraitPath::root(TraitDataHandle(1))],
            subscription_id: None,
            timeout_min_sec: None,
            timeout_max_sec: None,
            subscribe_to_all_events: false,
        })
    }
}

/// Append-only record of every `start()` call, so a test can assert on the
/// exact sequence of timers armed even though intervening `cancel()` calls
/// (which `ArmedTimer::rearm` issues unconditionally) would otherwise erase
/// the history from a simple "currently armed" map.
#[derive(Default)]
pub struct TimerLog {
    pub started: Mutex<Vec<(ClientId, TimerPurpose, Duration)>>,
    pub canceled: Mutex<u32>,
}

impl TimerLog {
    pub fn waits_for(&self, purpose: TimerPurpose) -> Vec<Duration> {
        self.started
            .lock().unwrap()
            .iter()
            .filter(|(_, p, _)| *p == purpose)
            .map(|(_, _, d)| *d)
            .collect()
    }
}

pub struct FakeTimerDriver {
    pub next_token: u64,
    pub log: Arc<TimerLog>,
}

impl FakeTimerDriver {
    pub fn new(log: Arc<TimerLog>) -> Self {
        Self { next_token: 0, log }
    }
}

impl TimerDriver for FakeTimerDriver {
    fn start(&mut self, client_id: ClientId, purpose: TimerPurpose, delay: Duration) -> TimerToken {
        self.next_token += 1;
        self.log.started.lock().unwrap().push((client_id, purpose, delay));
        TimerToken(self.next_token)
    }

    fn cancel(&mut self, _token: TimerToken) {
        *self.log.canceled.lock().unwrap() += 1;
    }
}

pub fn path(h: u16, p: u32) -> TraitPath {
    TraitPath::new(TraitDataHandle(h), PropertyPathHandle(p))
}

pub fn schema() -> NoRelationSchema {
    NoRelationSchema::linear_chain()
}

/// Everything a test holds onto after [`make_client`]: handles into the
/// collaborators that were otherwise moved into the client.
pub struct ClientHandles {
    pub sent: Arc<SendLog>,
    pub events: Arc<Mutex<RecordingEventsData>>,
    pub fail_sends: Arc<Mutex<bool>>,
    pub timers: Arc<TimerLog>,
}

/// Builds a ready-to-use client with every collaborator stubbed, plus shared
/// handles so a test can assert on outbound traffic, inject a send failure,
/// and inspect dispatched `ClientEvent`s.
pub fn make_client(client_id: u32, catalog: FakeCatalog) -> (SubscriptionClient, ClientHandles) {
    make_client_with_encoder(client_id, catalog, Box::new(FixedEncoder))
}

/// Like [`make_client`] but with a caller-supplied [`UpdateEncoder`], for
/// scenarios that need dictionary-overflow behavior `FixedEncoder` never
/// produces.
pub fn make_client_with_encoder(
    client_id: u32,
    catalog: FakeCatalog,
    encoder: Box<dyn UpdateEncoder>,
) -> (SubscriptionClient, ClientHandles) {
    let log = Arc::new(SendLog::default());
    let binding = FakeBinding::ready(log.clone());
    let fail_sends = binding.fail_sends.clone();
    let (events, events_data) = RecordingEvents::new();
    let timers = Arc::new(TimerLog::default());
    let collaborators = ClientCollaborators::new(
        Box::new(binding),
        Box::new(catalog),
        Box::new(FakeCodec),
        Box::new(schema()),
        Box::new(FakeTimerDriver::new(timers.clone())),
        encoder,
        Box::new(events),
    );
    let config = ClientConfig::builder(ClientId(client_id)).build().unwrap();
    (
        SubscriptionClient::new(config, collaborators),
        ClientHandles { sent: log, events: events_data, fail_sends, timers },
    )
}

/// Minimal single-poll executor for driving this crate's `async fn`s in
/// tests: none of the test doubles ever return `Poll::Pending` (no real I/O
/// backs any of them), so there is nothing here to reach for a runtime crate
/// over.
pub fn block_on<F: core::future::Future>(mut fut: F) -> F::Output {
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn no_op(_: *const ()) {}
    fn clone(_: *const ()) -> RawWaker {
        raw_waker()
    }
    fn raw_waker() -> RawWaker {
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(core::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    // SAFETY: `fut` is not moved again after being pinned; it is a local that
    // outlives the pinned reference and is dropped normally at scope end.
    let mut fut = unsafe { core::pin::Pin::new_unchecked(&mut fut) };
    loop {
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(value) => return value,
            Poll::Pending => std::thread::yield_now(),
        }
    }
}
