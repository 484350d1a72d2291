//! # Event Loop Runtime
//!
//! Runs a [`RangingScheduler`] on one tokio task. Every external stimulus
//! (API calls, hardware results, timer fires, requester deaths, resolver
//! answers) is an [`SchedulerEvent`] on one unbounded channel, so the
//! scheduler handles exactly one event at a time.
//!
//! ```text
//! RangingHandle ──┐
//! TokioWakeupTimer ├──→ mpsc ──→ [scheduler task] ──→ RangingScheduler
//! LivenessHub ─────┤
//! ResolverBridge ──┘
//! ```
//!
//! Adapters need the sender before the scheduler exists, so the channel is
//! created first with [`event_channel`].

pub mod adapters;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use adapters::{
    BroadcastAnnouncer, LivenessGuard, LivenessHub, MonotonicTimeSource, ResolverBridge,
    TokioWakeupTimer,
};

use crate::config::{ConfigError, SchedulerConfig};
use crate::domain::{
    AttributionSet, CorrelationId, LivenessToken, MacAddress, OperationId, PeerHandle,
    RangingRequest, RawRangingResult, RequesterIdentity, SchedulerError, SchedulerStatus,
};
use crate::ports::inbound::RangingApi;
use crate::ports::outbound::{RangingCallback, SchedulerPorts};
use crate::service::RangingScheduler;

pub enum SchedulerEvent {
    Submit {
        requester: RequesterIdentity,
        attribution: Option<AttributionSet>,
        request: RangingRequest,
        liveness: LivenessToken,
        callback: Arc<dyn RangingCallback>,
    },
    Cancel(AttributionSet),
    HardwareResult {
        correlation_id: CorrelationId,
        results: Vec<RawRangingResult>,
    },
    AddressesResolved {
        operation: OperationId,
        addresses: HashMap<PeerHandle, MacAddress>,
    },
    TimeoutFired(CorrelationId),
    RequesterDied(LivenessToken),
    HardwareAvailable(bool),
    DeviceIdle(bool),
    Status(oneshot::Sender<SchedulerStatus>),
    Shutdown,
}

/// Cloneable sending side of the scheduler channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<SchedulerEvent>,
}

impl EventSender {
    pub fn send(&self, event: SchedulerEvent) -> Result<(), SchedulerError> {
        self.tx.send(event).map_err(|_| SchedulerError::Closed)
    }
}

/// Receiving side, consumed by [`spawn_scheduler`].
#[derive(Debug)]
pub struct EventInbox {
    rx: mpsc::UnboundedReceiver<SchedulerEvent>,
}

pub fn event_channel() -> (EventSender, EventInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventInbox { rx })
}

/// Spawns the scheduler task. Must be called inside a tokio runtime.
///
/// # Errors
///
/// Returns error if `config` fails validation; nothing is spawned.
pub fn spawn_scheduler(
    config: SchedulerConfig,
    ports: SchedulerPorts,
    events: EventSender,
    inbox: EventInbox,
) -> Result<(RangingHandle, JoinHandle<()>), ConfigError> {
    let handle = RangingHandle {
        events,
        max_peers_per_request: config.max_peers_per_request,
    };
    let scheduler = RangingScheduler::new(config, ports)?;
    let task = tokio::spawn(run(scheduler, inbox));
    Ok((handle, task))
}

async fn run(mut scheduler: RangingScheduler, mut inbox: EventInbox) {
    info!("[rtt] scheduler loop started");

    while let Some(event) = inbox.rx.recv().await {
        if !apply(&mut scheduler, event) {
            break;
        }
    }

    scheduler.shutdown();

    // events sent before the channel closed still get an answer; submits
    // among them fail as unavailable
    inbox.rx.close();
    while let Ok(event) = inbox.rx.try_recv() {
        apply(&mut scheduler, event);
    }

    info!(
        delivered = scheduler.metrics().delivered,
        failed = scheduler.metrics().total_failed(),
        "[rtt] scheduler loop stopped"
    );
}

/// Applies one event. Returns `false` on `Shutdown`.
fn apply(scheduler: &mut RangingScheduler, event: SchedulerEvent) -> bool {
    match event {
        SchedulerEvent::Submit {
            requester,
            attribution,
            request,
            liveness,
            callback,
        } => {
            if let Err(e) = scheduler.submit(requester, attribution, request, liveness, callback) {
                warn!(error = %e, "[rtt] dropping malformed ranging request");
            }
        }
        SchedulerEvent::Cancel(attribution) => scheduler.cancel(&attribution),
        SchedulerEvent::HardwareResult {
            correlation_id,
            results,
        } => scheduler.on_hardware_result(correlation_id, results),
        SchedulerEvent::AddressesResolved {
            operation,
            addresses,
        } => scheduler.on_peer_addresses_resolved(operation, addresses),
        SchedulerEvent::TimeoutFired(cid) => scheduler.on_timeout(cid),
        SchedulerEvent::RequesterDied(token) => scheduler.on_requester_died(token),
        SchedulerEvent::HardwareAvailable(ready) => scheduler.set_hardware_available(ready),
        SchedulerEvent::DeviceIdle(idle) => scheduler.set_device_idle(idle),
        SchedulerEvent::Status(reply) => {
            let _ = reply.send(scheduler.status());
        }
        SchedulerEvent::Shutdown => return false,
    }
    true
}

/// Client handle to a running scheduler.
///
/// Calls are non-blocking channel sends. Once the loop has stopped every call
/// returns [`SchedulerError::Closed`].
#[derive(Debug, Clone)]
pub struct RangingHandle {
    events: EventSender,
    max_peers_per_request: usize,
}

impl RangingHandle {
    /// Round trip to the scheduler task for a status snapshot.
    pub async fn status(&self) -> Result<SchedulerStatus, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.events.send(SchedulerEvent::Status(tx))?;
        rx.await.map_err(|_| SchedulerError::StatusUnavailable)
    }

    pub fn shutdown(&self) -> Result<(), SchedulerError> {
        self.events.send(SchedulerEvent::Shutdown)
    }
}

impl RangingApi for RangingHandle {
    fn submit(
        &self,
        requester: RequesterIdentity,
        attribution: Option<AttributionSet>,
        request: RangingRequest,
        liveness: LivenessToken,
        callback: Arc<dyn RangingCallback>,
    ) -> Result<(), SchedulerError> {
        request.validate(self.max_peers_per_request)?;
        self.events.send(SchedulerEvent::Submit {
            requester,
            attribution,
            request,
            liveness,
            callback,
        })
    }

    fn cancel(&self, attribution: AttributionSet) -> Result<(), SchedulerError> {
        self.events.send(SchedulerEvent::Cancel(attribution))
    }

    fn on_hardware_result(
        &self,
        correlation_id: CorrelationId,
        results: Vec<RawRangingResult>,
    ) -> Result<(), SchedulerError> {
        self.events.send(SchedulerEvent::HardwareResult {
            correlation_id,
            results,
        })
    }

    fn set_hardware_available(&self, ready: bool) -> Result<(), SchedulerError> {
        self.events.send(SchedulerEvent::HardwareAvailable(ready))
    }

    fn set_device_idle(&self, idle: bool) -> Result<(), SchedulerError> {
        self.events.send(SchedulerEvent::DeviceIdle(idle))
    }
}
