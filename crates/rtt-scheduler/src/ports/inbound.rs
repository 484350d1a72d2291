//! Inbound Ports (Driving Ports)
//!
//! The API requesters and the platform drive the scheduler through.

use std::sync::Arc;

use crate::domain::{
    AttributionSet, CorrelationId, LivenessToken, RangingRequest, RawRangingResult,
    RequesterIdentity, SchedulerError,
};
use crate::ports::outbound::RangingCallback;

/// Ranging API.
///
/// Admission outcomes are reported through the callback, never through the
/// return value. `Err` means the call itself was malformed or could not be
/// delivered.
pub trait RangingApi: Send + Sync {
    /// Submits a batch ranging request. `attribution` defaults to the
    /// calling uid.
    fn submit(
        &self,
        requester: RequesterIdentity,
        attribution: Option<AttributionSet>,
        request: RangingRequest,
        liveness: LivenessToken,
        callback: Arc<dyn RangingCallback>,
    ) -> Result<(), SchedulerError>;

    /// Silently removes every operation billed only to uids in `attribution`.
    fn cancel(&self, attribution: AttributionSet) -> Result<(), SchedulerError>;

    /// Hardware results for a dispatched operation.
    fn on_hardware_result(
        &self,
        correlation_id: CorrelationId,
        results: Vec<RawRangingResult>,
    ) -> Result<(), SchedulerError>;

    fn set_hardware_available(&self, ready: bool) -> Result<(), SchedulerError>;

    fn set_device_idle(&self, idle: bool) -> Result<(), SchedulerError>;
}
