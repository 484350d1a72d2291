//! # Value Objects
//!
//! Results exchanged with the hardware and the requester, plus the
//! scheduler's observable status.

use serde::Serialize;

use super::entities::{
    AttributionSet, CorrelationId, MacAddress, OperationId, PeerDescriptor, Timestamp, Uid,
};
use super::errors::FailureKind;

/// Per-peer measurement status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RangingStatus {
    Success,
    Fail,
}

/// One per-peer result as reported by the hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawRangingResult {
    pub address: MacAddress,
    pub status: RangingStatus,
    pub distance_mm: i32,
    pub distance_std_dev_mm: i32,
    pub rssi: i8,
    pub timestamp_us: u64,
}

impl RawRangingResult {
    pub fn success(address: MacAddress, distance_mm: i32, timestamp_us: u64) -> Self {
        Self {
            address,
            status: RangingStatus::Success,
            distance_mm,
            distance_std_dev_mm: 0,
            rssi: 0,
            timestamp_us,
        }
    }
}

/// One per-peer result as delivered to the requester.
///
/// `peer` carries the identity the requester used: a handle stays a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RangingResult {
    pub peer: PeerDescriptor,
    pub status: RangingStatus,
    pub distance_mm: i32,
    pub distance_std_dev_mm: i32,
    pub rssi: i8,
    pub timestamp_us: u64,
}

impl RangingResult {
    pub fn from_raw(peer: PeerDescriptor, raw: &RawRangingResult) -> Self {
        Self {
            peer,
            status: raw.status,
            distance_mm: raw.distance_mm,
            distance_std_dev_mm: raw.distance_std_dev_mm,
            rssi: raw.rssi,
            timestamp_us: raw.timestamp_us,
        }
    }

    /// Backfilled entry for a peer the hardware did not report.
    pub fn failed(peer: PeerDescriptor) -> Self {
        Self {
            peer,
            status: RangingStatus::Fail,
            distance_mm: 0,
            distance_std_dev_mm: 0,
            rssi: 0,
            timestamp_us: 0,
        }
    }
}

/// Externally announced availability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RttState {
    Enabled,
    Disabled,
}

/// What the active slot is currently waiting on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum OperationPhase {
    /// Waiting for peer handle addresses.
    Resolving,
    /// Submitted to hardware, waiting for results or the deadline.
    Dispatched,
}

/// Snapshot of the active operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveSummary {
    pub operation: OperationId,
    pub calling_uid: Uid,
    pub attribution: AttributionSet,
    pub phase: OperationPhase,
    pub correlation_id: Option<CorrelationId>,
    pub peers: usize,
}

/// Lifetime counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerMetrics {
    pub submitted: u64,
    pub dispatched: u64,
    pub delivered: u64,
    pub silently_removed: u64,
    pub failed_permission: u64,
    pub failed_unavailable: u64,
    pub failed_throttled: u64,
    pub failed_queue_full: u64,
    pub failed_hardware: u64,
    pub failed_timeout: u64,
    pub stale_results: u64,
}

impl SchedulerMetrics {
    pub fn record_failure(&mut self, kind: FailureKind) {
        let counter = match kind {
            FailureKind::PermissionDenied => &mut self.failed_permission,
            FailureKind::ResourceUnavailable => &mut self.failed_unavailable,
            FailureKind::Throttled => &mut self.failed_throttled,
            FailureKind::QueueFull => &mut self.failed_queue_full,
            FailureKind::HardwareRejected => &mut self.failed_hardware,
            FailureKind::Timeout => &mut self.failed_timeout,
        };
        *counter += 1;
    }

    pub fn total_failed(&self) -> u64 {
        self.failed_permission
            + self.failed_unavailable
            + self.failed_throttled
            + self.failed_queue_full
            + self.failed_hardware
            + self.failed_timeout
    }
}

/// Point-in-time view of the scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub available: bool,
    pub hardware_ready: bool,
    pub device_idle: bool,
    pub queued: usize,
    pub active: Option<ActiveSummary>,
    pub tracked_requesters: usize,
    pub throttle_entries: usize,
    pub armed_deadline_ms: Option<Timestamp>,
    pub metrics: SchedulerMetrics,
}
