//! Tokio implementations of the driven ports.
//!
//! Each adapter does its waiting on its own task and reports back by posting
//! a [`SchedulerEvent`]. None of them call into the scheduler directly.
//! `arm_exact`, `register` and `request_addresses` spawn tasks and so must
//! run inside a tokio runtime; the scheduler task always does.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{EventSender, SchedulerEvent};
use crate::domain::{CorrelationId, LivenessToken, OperationId, PeerHandle, RttState, Timestamp, Uid};
use crate::ports::outbound::{
    AsyncPeerResolver, LivenessMonitor, PeerHandleResolver, ResolveError, StateAnnouncer,
    TimeSource, WakeupTimer,
};

// ============================================================================
// MonotonicTimeSource
// ============================================================================

/// Milliseconds since construction, on tokio's clock so paused-time tests
/// see it advance.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    start: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now_ms(&self) -> Timestamp {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

// ============================================================================
// TokioWakeupTimer
// ============================================================================

/// One sleeping task per armed correlation id.
pub struct TokioWakeupTimer {
    events: EventSender,
    clock: Arc<dyn TimeSource>,
    pending: Arc<Mutex<HashMap<CorrelationId, JoinHandle<()>>>>,
}

impl TokioWakeupTimer {
    /// `clock` must be the same source the scheduler computes deadlines with.
    pub fn new(events: EventSender, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            events,
            clock,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl WakeupTimer for TokioWakeupTimer {
    fn arm_exact(&self, deadline_ms: Timestamp, tag: &'static str, correlation_id: CorrelationId) {
        let delay = Duration::from_millis(deadline_ms.saturating_sub(self.clock.now_ms()));
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);

        // held across spawn so the task cannot remove its entry before insert
        let mut table = self.pending.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            pending.lock().remove(&correlation_id);
            debug!(tag, correlation_id = %correlation_id, "wakeup fired");
            let _ = events.send(SchedulerEvent::TimeoutFired(correlation_id));
        });
        if let Some(previous) = table.insert(correlation_id, task) {
            previous.abort();
        }
    }

    fn cancel(&self, correlation_id: CorrelationId) {
        if let Some(task) = self.pending.lock().remove(&correlation_id) {
            task.abort();
        }
    }
}

// ============================================================================
// LivenessHub
// ============================================================================

type ChannelTable = Arc<Mutex<HashMap<LivenessToken, LivenessChannel>>>;

#[derive(Debug)]
struct LivenessChannel {
    alive: watch::Receiver<()>,
    watcher: Option<JoinHandle<()>>,
}

/// Held by a requester for as long as it is alive. Dropping it is death.
#[derive(Debug)]
pub struct LivenessGuard {
    token: LivenessToken,
    channels: ChannelTable,
    _alive: watch::Sender<()>,
}

impl LivenessGuard {
    pub fn token(&self) -> LivenessToken {
        self.token
    }
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        // watched entries are removed by `unregister` once the death is handled
        let mut channels = self.channels.lock();
        if channels
            .get(&self.token)
            .is_some_and(|c| c.watcher.is_none())
        {
            channels.remove(&self.token);
        }
    }
}

/// Issues liveness tokens and watches the registered ones.
///
/// Death is only observed while a token is registered. A guard dropped
/// before registration is reported as soon as the token is registered.
/// An entry lives until its guard is dropped and the token is no longer
/// registered.
pub struct LivenessHub {
    events: EventSender,
    next_token: AtomicU64,
    channels: ChannelTable,
}

impl LivenessHub {
    pub fn new(events: EventSender) -> Self {
        Self {
            events,
            next_token: AtomicU64::new(1),
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// New token plus the guard whose lifetime it tracks.
    pub fn connect(&self) -> (LivenessToken, LivenessGuard) {
        let token = LivenessToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = watch::channel(());
        self.channels.lock().insert(
            token,
            LivenessChannel {
                alive: rx,
                watcher: None,
            },
        );
        let guard = LivenessGuard {
            token,
            channels: Arc::clone(&self.channels),
            _alive: tx,
        };
        (token, guard)
    }

    /// Tokens with a live guard or an outstanding registration.
    pub fn connected(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn watched(&self) -> usize {
        self.channels
            .lock()
            .values()
            .filter(|c| c.watcher.is_some())
            .count()
    }

    fn was_issued(&self, token: LivenessToken) -> bool {
        token.0 != 0 && token.0 < self.next_token.load(Ordering::Relaxed)
    }
}

impl LivenessMonitor for LivenessHub {
    fn register(&self, token: LivenessToken) {
        let mut channels = self.channels.lock();
        let Some(channel) = channels.get_mut(&token) else {
            if self.was_issued(token) {
                // guard dropped before registration
                debug!(token = %token, "requester gone before registration");
                let _ = self.events.send(SchedulerEvent::RequesterDied(token));
            } else {
                warn!(token = %token, "[rtt] register for unknown liveness token");
            }
            return;
        };
        if channel.watcher.is_some() {
            return;
        }

        let mut alive = channel.alive.clone();
        let events = self.events.clone();
        channel.watcher = Some(tokio::spawn(async move {
            while alive.changed().await.is_ok() {}
            debug!(token = %token, "requester liveness lost");
            let _ = events.send(SchedulerEvent::RequesterDied(token));
        }));
    }

    fn unregister(&self, token: LivenessToken) {
        let mut channels = self.channels.lock();
        let Some(channel) = channels.get_mut(&token) else {
            return;
        };
        if let Some(watcher) = channel.watcher.take() {
            watcher.abort();
        }
        // an open channel stays until its guard drops
        if channel.alive.has_changed().is_err() {
            channels.remove(&token);
        }
    }
}

// ============================================================================
// ResolverBridge
// ============================================================================

/// Runs an [`AsyncPeerResolver`] lookup on its own task and posts the answer.
///
/// Errors and timeouts resolve to an empty map.
pub struct ResolverBridge {
    resolver: Arc<dyn AsyncPeerResolver>,
    events: EventSender,
    timeout: Duration,
}

impl ResolverBridge {
    pub fn new(resolver: Arc<dyn AsyncPeerResolver>, events: EventSender, timeout_ms: u64) -> Self {
        Self {
            resolver,
            events,
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl PeerHandleResolver for ResolverBridge {
    fn request_addresses(&self, uid: Uid, handles: Vec<PeerHandle>, operation: OperationId) {
        let resolver = Arc::clone(&self.resolver);
        let events = self.events.clone();
        let timeout = self.timeout;

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, resolver.resolve(uid, handles)).await {
                Ok(result) => result,
                Err(_) => Err(ResolveError::TimedOut(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                )),
            };
            let addresses = outcome.unwrap_or_else(|e| {
                warn!(operation = %operation, error = %e, "[rtt] peer resolution failed");
                HashMap::new()
            });
            let _ = events.send(SchedulerEvent::AddressesResolved {
                operation,
                addresses,
            });
        });
    }
}

// ============================================================================
// BroadcastAnnouncer
// ============================================================================

/// Publishes availability transitions to any number of subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastAnnouncer {
    tx: broadcast::Sender<RttState>,
}

impl BroadcastAnnouncer {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RttState> {
        self.tx.subscribe()
    }
}

impl StateAnnouncer for BroadcastAnnouncer {
    fn announce(&self, state: RttState) {
        // no subscribers is not an error
        let _ = self.tx.send(state);
    }
}
