//! Recording port implementations for tests.
//!
//! Requires feature: `test-utils` (always available to this crate's tests).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::outbound::{
    ImportanceSource, LivenessMonitor, PeerHandleResolver, PermissionGate, RangingCallback,
    RangingHardware, SchedulerPorts, StateAnnouncer, TimeSource, WakeupTimer,
};
use crate::domain::{
    CorrelationId, FailureCode, LivenessToken, MacAddress, OperationId, PeerHandle, RangingResult,
    RttState, Timestamp, Uid,
};

/// Grants permission to every uid not explicitly denied.
#[derive(Debug, Default)]
pub struct MockPermissionGate {
    denied: Mutex<HashSet<Uid>>,
}

impl MockPermissionGate {
    pub fn deny(&self, uid: Uid) {
        self.denied.lock().insert(uid);
    }

    pub fn grant(&self, uid: Uid) {
        self.denied.lock().remove(&uid);
    }
}

impl PermissionGate for MockPermissionGate {
    fn check_permission(&self, _package_name: &str, uid: Uid) -> bool {
        !self.denied.lock().contains(&uid)
    }
}

/// Every uid is background unless marked foreground.
#[derive(Debug, Default)]
pub struct MockImportance {
    foreground: Mutex<HashSet<Uid>>,
}

impl MockImportance {
    pub fn set_foreground(&self, uid: Uid, foreground: bool) {
        let mut set = self.foreground.lock();
        if foreground {
            set.insert(uid);
        } else {
            set.remove(&uid);
        }
    }
}

impl ImportanceSource for MockImportance {
    fn is_foreground(&self, uid: Uid) -> bool {
        self.foreground.lock().contains(&uid)
    }
}

/// Records lookups; the test answers them by calling
/// `on_peer_addresses_resolved` itself.
#[derive(Debug, Default)]
pub struct MockResolver {
    requests: Mutex<Vec<(Uid, Vec<PeerHandle>, OperationId)>>,
}

impl MockResolver {
    pub fn requests(&self) -> Vec<(Uid, Vec<PeerHandle>, OperationId)> {
        self.requests.lock().clone()
    }

    pub fn last_operation(&self) -> Option<OperationId> {
        self.requests.lock().last().map(|(_, _, op)| *op)
    }
}

impl PeerHandleResolver for MockResolver {
    fn request_addresses(&self, uid: Uid, handles: Vec<PeerHandle>, operation: OperationId) {
        self.requests.lock().push((uid, handles, operation));
    }
}

#[derive(Debug)]
pub struct MockHardware {
    ready: AtomicBool,
    accept: AtomicBool,
    submitted: Mutex<Vec<(CorrelationId, Vec<MacAddress>)>>,
    cancelled: Mutex<Vec<(CorrelationId, Vec<MacAddress>)>>,
}

impl Default for MockHardware {
    fn default() -> Self {
        Self {
            ready: AtomicBool::new(true),
            accept: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }
}

impl MockHardware {
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// `false` makes every following submit a synchronous rejection.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<(CorrelationId, Vec<MacAddress>)> {
        self.submitted.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<(CorrelationId, Vec<MacAddress>)> {
        self.cancelled.lock().clone()
    }

    pub fn last_submitted(&self) -> Option<(CorrelationId, Vec<MacAddress>)> {
        self.submitted.lock().last().cloned()
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().len()
    }
}

impl RangingHardware for MockHardware {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn submit(&self, correlation_id: CorrelationId, peers: &[MacAddress]) -> bool {
        self.submitted.lock().push((correlation_id, peers.to_vec()));
        self.accept.load(Ordering::SeqCst)
    }

    fn cancel(&self, correlation_id: CorrelationId, peers: &[MacAddress]) {
        self.cancelled.lock().push((correlation_id, peers.to_vec()));
    }
}

#[derive(Debug, Default)]
pub struct MockTimer {
    armed: Mutex<Vec<(Timestamp, &'static str, CorrelationId)>>,
    cancelled: Mutex<Vec<CorrelationId>>,
}

impl MockTimer {
    pub fn armed(&self) -> Vec<(Timestamp, &'static str, CorrelationId)> {
        self.armed.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<CorrelationId> {
        self.cancelled.lock().clone()
    }
}

impl WakeupTimer for MockTimer {
    fn arm_exact(&self, deadline_ms: Timestamp, tag: &'static str, correlation_id: CorrelationId) {
        self.armed.lock().push((deadline_ms, tag, correlation_id));
    }

    fn cancel(&self, correlation_id: CorrelationId) {
        self.cancelled.lock().push(correlation_id);
    }
}

#[derive(Debug, Default)]
pub struct MockLivenessMonitor {
    registered: Mutex<Vec<LivenessToken>>,
    unregistered: Mutex<Vec<LivenessToken>>,
}

impl MockLivenessMonitor {
    pub fn registered(&self) -> Vec<LivenessToken> {
        self.registered.lock().clone()
    }

    pub fn unregistered(&self) -> Vec<LivenessToken> {
        self.unregistered.lock().clone()
    }

    /// Registrations not yet matched by an unregister.
    pub fn outstanding(&self) -> usize {
        self.registered.lock().len() - self.unregistered.lock().len()
    }
}

impl LivenessMonitor for MockLivenessMonitor {
    fn register(&self, token: LivenessToken) {
        self.registered.lock().push(token);
    }

    fn unregister(&self, token: LivenessToken) {
        self.unregistered.lock().push(token);
    }
}

#[derive(Debug, Default)]
pub struct MockAnnouncer {
    states: Mutex<Vec<RttState>>,
}

impl MockAnnouncer {
    pub fn states(&self) -> Vec<RttState> {
        self.states.lock().clone()
    }
}

impl StateAnnouncer for MockAnnouncer {
    fn announce(&self, state: RttState) {
        self.states.lock().push(state);
    }
}

#[derive(Debug, Default)]
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now_ms(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    Results(Vec<RangingResult>),
    Failure(FailureCode),
}

#[derive(Debug, Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallback {
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn results(&self) -> Option<Vec<RangingResult>> {
        self.events.lock().iter().find_map(|e| match e {
            CallbackEvent::Results(r) => Some(r.clone()),
            CallbackEvent::Failure(_) => None,
        })
    }

    pub fn failure(&self) -> Option<FailureCode> {
        self.events.lock().iter().find_map(|e| match e {
            CallbackEvent::Failure(code) => Some(*code),
            CallbackEvent::Results(_) => None,
        })
    }
}

impl RangingCallback for RecordingCallback {
    fn on_ranging_results(&self, results: Vec<RangingResult>) {
        self.events.lock().push(CallbackEvent::Results(results));
    }

    fn on_ranging_failure(&self, code: FailureCode) {
        self.events.lock().push(CallbackEvent::Failure(code));
    }
}

/// One recording mock per port, wired into [`SchedulerPorts`] by [`MockPorts::ports`].
#[derive(Clone, Default)]
pub struct MockPorts {
    pub permissions: Arc<MockPermissionGate>,
    pub importance: Arc<MockImportance>,
    pub resolver: Arc<MockResolver>,
    pub hardware: Arc<MockHardware>,
    pub timer: Arc<MockTimer>,
    pub liveness: Arc<MockLivenessMonitor>,
    pub announcer: Arc<MockAnnouncer>,
    pub clock: Arc<MockTimeSource>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ports(&self) -> SchedulerPorts {
        SchedulerPorts {
            permissions: self.permissions.clone(),
            importance: self.importance.clone(),
            resolver: self.resolver.clone(),
            hardware: self.hardware.clone(),
            timer: self.timer.clone(),
            liveness: self.liveness.clone(),
            announcer: self.announcer.clone(),
            clock: self.clock.clone(),
        }
    }
}

pub mod fixtures {
    use crate::domain::{MacAddress, PeerDescriptor, RangingRequest, RawRangingResult};

    /// Three-peer request whose first two addresses end in `seed`.
    pub fn dummy_request(seed: u8) -> RangingRequest {
        RangingRequest::new()
            .with_address(MacAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, seed]))
            .with_address(MacAddress::new([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, seed]))
            .with_address(MacAddress::new([0x08, 0x09, 0x08, 0x07, 0x06, 0x05]))
    }

    /// One successful raw result per directly addressed peer.
    pub fn dummy_results(request: &RangingRequest) -> Vec<RawRangingResult> {
        request
            .peers()
            .iter()
            .enumerate()
            .filter_map(|(i, peer)| match peer {
                PeerDescriptor::Address(mac) => Some(RawRangingResult::success(
                    *mac,
                    1_000 + i as i32 * 100,
                    10_000 + i as u64,
                )),
                PeerDescriptor::Handle(_) => None,
            })
            .collect()
    }
}
