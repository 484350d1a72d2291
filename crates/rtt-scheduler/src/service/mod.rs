//! # Ranging Scheduler Service
//!
//! The synchronous state machine owning the queue, the active hardware slot,
//! the throttle ledger, the liveness registry and the timeout.
//!
//! ## Architecture
//!
//! This service:
//! 1. Admits operations (permission, availability, queue cap, throttle)
//! 2. Dispatches one operation at a time to the hardware
//! 3. Retires the active operation on result, timeout, cancel, death or disable
//! 4. Calls its driven ports fire-and-forget; completions re-enter as events
//!
//! Every method takes `&mut self`, so all transitions are serialized by
//! whoever owns the scheduler (see `runtime`).

mod availability;
mod completion;
mod dispatch;

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{ConfigError, SchedulerConfig};
use crate::domain::{
    check_all_invariants, ActiveSummary, AttributionSet, AttributionThrottle, FailureKind,
    InvariantViolation, LivenessRegistry, LivenessToken, OperationId, OperationPhase,
    RangingOperation, RangingRequest, RequesterIdentity, SchedulerError, SchedulerMetrics,
    SchedulerStatus, TerminalOutcome, TimeoutManager, Timestamp,
};
use crate::ports::outbound::{RangingCallback, SchedulerPorts};

/// The single hardware slot.
#[derive(Debug, Default)]
pub(crate) enum ActiveSlot {
    #[default]
    Idle,
    /// Waiting for peer handle addresses before dispatch.
    Resolving(RangingOperation),
    /// Submitted to hardware.
    Dispatched(RangingOperation),
}

impl ActiveSlot {
    fn take(&mut self) -> ActiveSlot {
        std::mem::take(self)
    }

    fn is_idle(&self) -> bool {
        matches!(self, ActiveSlot::Idle)
    }

    fn operation(&self) -> Option<(&RangingOperation, OperationPhase)> {
        match self {
            ActiveSlot::Idle => None,
            ActiveSlot::Resolving(op) => Some((op, OperationPhase::Resolving)),
            ActiveSlot::Dispatched(op) => Some((op, OperationPhase::Dispatched)),
        }
    }
}

pub struct RangingScheduler {
    config: SchedulerConfig,
    ports: SchedulerPorts,
    queue: VecDeque<RangingOperation>,
    active: ActiveSlot,
    throttle: AttributionThrottle,
    liveness: LivenessRegistry,
    timeout: TimeoutManager,
    hardware_ready: bool,
    device_idle: bool,
    shut_down: bool,
    next_operation_id: u64,
    next_correlation_id: u32,
    metrics: SchedulerMetrics,
}

impl RangingScheduler {
    /// Hardware readiness is sampled once here; later changes arrive through
    /// `set_hardware_available`.
    ///
    /// # Errors
    ///
    /// Returns error if `config` fails validation.
    pub fn new(config: SchedulerConfig, ports: SchedulerPorts) -> Result<Self, ConfigError> {
        config.validate()?;
        let hardware_ready = ports.hardware.is_ready();
        info!(
            hardware_ready,
            gap_ms = config.background_exec_gap_ms,
            timeout_ms = config.hardware_timeout_ms,
            "[rtt] scheduler created"
        );
        Ok(Self {
            throttle: AttributionThrottle::new(config.background_exec_gap_ms),
            config,
            ports,
            queue: VecDeque::new(),
            active: ActiveSlot::Idle,
            liveness: LivenessRegistry::new(),
            timeout: TimeoutManager::new(),
            hardware_ready,
            device_idle: false,
            shut_down: false,
            next_operation_id: 1,
            next_correlation_id: 1,
            metrics: SchedulerMetrics::default(),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Admits a ranging request.
    ///
    /// Admission failures are reported through `callback`; the returned id
    /// identifies the operation either way. `Err` only for malformed requests.
    pub fn submit(
        &mut self,
        requester: RequesterIdentity,
        attribution: Option<AttributionSet>,
        request: RangingRequest,
        liveness: LivenessToken,
        callback: Arc<dyn RangingCallback>,
    ) -> Result<OperationId, SchedulerError> {
        request.validate(self.config.max_peers_per_request)?;

        let attribution =
            attribution.unwrap_or_else(|| AttributionSet::single(requester.calling_uid));
        let now = self.ports.clock.now_ms();
        let id = OperationId(self.next_operation_id);
        self.next_operation_id += 1;
        self.metrics.submitted += 1;

        let op = RangingOperation::new(
            id,
            requester,
            attribution,
            request,
            liveness,
            callback,
            now,
        );

        if let Some(kind) = self.admission_failure(&op, now) {
            info!(
                operation = %id,
                uid = op.requester.calling_uid,
                attribution = %op.attribution,
                reason = %kind,
                "[rtt] ranging request rejected"
            );
            self.finish(op, TerminalOutcome::Failed(kind));
            return Ok(id);
        }

        debug!(
            operation = %id,
            uid = op.requester.calling_uid,
            attribution = %op.attribution,
            peers = op.request.len(),
            "[rtt] ranging request queued"
        );
        if self.liveness.attach(op.liveness, op.id) {
            self.ports.liveness.register(op.liveness);
        }
        self.queue.push_back(op);
        self.schedule_next();
        Ok(id)
    }

    fn admission_failure(&self, op: &RangingOperation, now: Timestamp) -> Option<FailureKind> {
        let uid = op.requester.calling_uid;
        if !self
            .ports
            .permissions
            .check_permission(&op.requester.package_name, uid)
        {
            return Some(FailureKind::PermissionDenied);
        }
        if !self.is_available() {
            return Some(FailureKind::ResourceUnavailable);
        }
        if self.is_spamming(&op.attribution) {
            return Some(FailureKind::QueueFull);
        }
        let foreground = self.ports.importance.is_foreground(uid);
        if !self.throttle.allow(&op.attribution, foreground, now) {
            return Some(FailureKind::Throttled);
        }
        None
    }

    /// True when every attributed uid already has the maximum number of live
    /// operations.
    fn is_spamming(&self, attribution: &AttributionSet) -> bool {
        let max = self.config.max_queued_per_uid;
        attribution.iter().all(|uid| {
            self.live_operations()
                .filter(|op| op.attribution.contains(uid))
                .count()
                >= max
        })
    }

    fn live_operations(&self) -> impl Iterator<Item = &RangingOperation> + '_ {
        self.queue
            .iter()
            .chain(self.active.operation().map(|(op, _)| op))
    }

    /// Retires an operation. The only place a callback is invoked.
    fn finish(&mut self, op: RangingOperation, outcome: TerminalOutcome) {
        if self.liveness.detach(op.liveness, op.id) {
            self.ports.liveness.unregister(op.liveness);
        }

        let id = op.id;
        let callback = op.into_callback();
        match outcome {
            TerminalOutcome::Delivered(results) => {
                self.metrics.delivered += 1;
                debug!(operation = %id, results = results.len(), "[rtt] results delivered");
                callback.on_ranging_results(results);
            }
            TerminalOutcome::Failed(kind) => {
                self.metrics.record_failure(kind);
                debug!(operation = %id, reason = %kind, "[rtt] operation failed");
                callback.on_ranging_failure(kind.status_code());
            }
            TerminalOutcome::SilentlyRemoved(cause) => {
                self.metrics.silently_removed += 1;
                debug!(operation = %id, ?cause, "[rtt] operation removed");
            }
        }
    }

    /// Removes and returns queued operations matching `pred`, keeping order.
    fn remove_queued<F>(&mut self, pred: F) -> Vec<RangingOperation>
    where
        F: Fn(&RangingOperation) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) = self.queue.drain(..).partition(|op| pred(op));
        self.queue = VecDeque::from(kept);
        removed
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn active_operation(&self) -> Option<ActiveSummary> {
        self.active.operation().map(|(op, phase)| ActiveSummary {
            operation: op.id,
            calling_uid: op.requester.calling_uid,
            attribution: op.attribution.clone(),
            phase,
            correlation_id: op.correlation_id,
            peers: op.request.len(),
        })
    }

    pub fn metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    pub fn status(&self) -> SchedulerStatus {
        SchedulerStatus {
            available: self.is_available(),
            hardware_ready: self.hardware_ready,
            device_idle: self.device_idle,
            queued: self.queue.len(),
            active: self.active_operation(),
            tracked_requesters: self.liveness.token_count(),
            throttle_entries: self.throttle.len(),
            armed_deadline_ms: self.timeout.deadline(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let queued: Vec<&RangingOperation> = self.queue.iter().collect();
        check_all_invariants(&queued, self.active.operation(), &self.liveness, &self.timeout)
    }
}
