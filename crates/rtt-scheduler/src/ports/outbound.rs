//! Outbound Ports (Driven Ports)
//!
//! Collaborators the scheduler calls. Every call is fire-and-forget from the
//! scheduler's point of view: completions come back as new inbound events.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::domain::RangingCallback;
use crate::domain::{
    CorrelationId, LivenessToken, MacAddress, OperationId, PeerHandle, RttState, Timestamp, Uid,
};

/// Yes/no ranging permission verdict for a package running as `uid`.
pub trait PermissionGate: Send + Sync {
    fn check_permission(&self, package_name: &str, uid: Uid) -> bool;
}

/// Process importance classification.
pub trait ImportanceSource: Send + Sync {
    fn is_foreground(&self, uid: Uid) -> bool;
}

/// Starts a peer handle lookup. The answer is delivered later through
/// `RangingScheduler::on_peer_addresses_resolved` with the same `operation`.
pub trait PeerHandleResolver: Send + Sync {
    fn request_addresses(&self, uid: Uid, handles: Vec<PeerHandle>, operation: OperationId);
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("peer resolver unavailable: {0}")]
    Unavailable(String),

    #[error("peer resolver timed out after {0} ms")]
    TimedOut(u64),
}

/// Async peer handle lookup, bridged onto [`PeerHandleResolver`] by the
/// runtime.
#[async_trait]
pub trait AsyncPeerResolver: Send + Sync {
    /// Handles missing from the returned map are treated as unresolvable.
    async fn resolve(
        &self,
        uid: Uid,
        handles: Vec<PeerHandle>,
    ) -> Result<HashMap<PeerHandle, MacAddress>, ResolveError>;
}

/// Ranging hardware boundary.
pub trait RangingHardware: Send + Sync {
    fn is_ready(&self) -> bool;

    /// Returns `false` on synchronous rejection. Results for an accepted
    /// submit arrive through `on_hardware_result`.
    fn submit(&self, correlation_id: CorrelationId, peers: &[MacAddress]) -> bool;

    /// Best-effort; failures are not surfaced.
    fn cancel(&self, correlation_id: CorrelationId, peers: &[MacAddress]);
}

/// Exact wakeup timer. A fire is delivered through `on_timeout`.
pub trait WakeupTimer: Send + Sync {
    fn arm_exact(&self, deadline_ms: Timestamp, tag: &'static str, correlation_id: CorrelationId);

    fn cancel(&self, correlation_id: CorrelationId);
}

/// Requester death notifications. A death is delivered through
/// `on_requester_died`.
pub trait LivenessMonitor: Send + Sync {
    fn register(&self, token: LivenessToken);

    fn unregister(&self, token: LivenessToken);
}

/// Publishes availability transitions.
pub trait StateAnnouncer: Send + Sync {
    fn announce(&self, state: RttState);
}

/// Monotonic millisecond clock.
pub trait TimeSource: Send + Sync {
    fn now_ms(&self) -> Timestamp;
}

/// Every driven port the scheduler needs.
#[derive(Clone)]
pub struct SchedulerPorts {
    pub permissions: Arc<dyn PermissionGate>,
    pub importance: Arc<dyn ImportanceSource>,
    pub resolver: Arc<dyn PeerHandleResolver>,
    pub hardware: Arc<dyn RangingHardware>,
    pub timer: Arc<dyn WakeupTimer>,
    pub liveness: Arc<dyn LivenessMonitor>,
    pub announcer: Arc<dyn StateAnnouncer>,
    pub clock: Arc<dyn TimeSource>,
}
