//! Scheduling: moving the queue head into the hardware slot.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use super::{ActiveSlot, RangingScheduler};
use crate::domain::{
    correlate, CorrelationId, FailureKind, MacAddress, OperationId, OperationState, PeerHandle,
    PeerTranslation, RangingOperation, TerminalOutcome, RANGING_TIMEOUT_TAG,
};

impl RangingScheduler {
    /// Fills the hardware slot from the queue head if the slot is idle.
    ///
    /// Operations that fail before reaching the hardware are retired and the
    /// next head is tried at once.
    pub(super) fn schedule_next(&mut self) {
        while self.active.is_idle() && self.is_available() {
            let Some(op) = self.queue.pop_front() else {
                return;
            };

            if op.needs_translation() {
                let handles = op.request.peer_handles();
                let uid = op.requester.calling_uid;
                let id = op.id;
                debug!(operation = %id, handles = handles.len(), "[rtt] resolving peer handles");
                self.active = ActiveSlot::Resolving(op);
                self.ports.resolver.request_addresses(uid, handles, id);
                return;
            }

            if self.dispatch(op) {
                return;
            }
        }
    }

    /// Answer to a `PeerHandleResolver::request_addresses` call.
    ///
    /// Answers for an operation no longer resolving are discarded.
    pub fn on_peer_addresses_resolved(
        &mut self,
        operation: OperationId,
        addresses: HashMap<PeerHandle, MacAddress>,
    ) {
        let mut op = match self.active.take() {
            ActiveSlot::Resolving(op) if op.id == operation => op,
            other => {
                self.active = other;
                debug!(operation = %operation, "[rtt] discarding stale peer resolution");
                return;
            }
        };

        let translation = PeerTranslation::from_resolved(&op.request, addresses);
        let unresolved = translation.unresolved_handles(&op.request);
        if !unresolved.is_empty() {
            warn!(
                operation = %op.id,
                unresolved = unresolved.len(),
                "[rtt] peer handles could not be resolved"
            );
        }
        op.translation = Some(translation);

        if !self.dispatch(op) {
            self.schedule_next();
        }
    }

    /// Sends `op` to the hardware. Returns `true` if it now occupies the slot.
    fn dispatch(&mut self, mut op: RangingOperation) -> bool {
        let peers = op.hardware_peers();
        if peers.is_empty() {
            info!(operation = %op.id, "[rtt] no addressable peers, completing without hardware");
            let results = correlate(&op.request, op.translation.as_ref(), &[]);
            self.finish(op, TerminalOutcome::Delivered(results));
            return false;
        }

        let cid = self.allocate_correlation_id();
        op.correlation_id = Some(cid);
        op.state = OperationState::Dispatched;

        if !self.ports.hardware.submit(cid, &peers) {
            warn!(operation = %op.id, correlation_id = %cid, "[rtt] hardware rejected ranging request");
            self.finish(op, TerminalOutcome::Failed(FailureKind::HardwareRejected));
            return false;
        }

        let now = self.ports.clock.now_ms();
        self.throttle.record(&op.attribution, now);
        self.metrics.dispatched += 1;

        let deadline = now.saturating_add(self.config.hardware_timeout_ms);
        match self.timeout.arm(cid, deadline) {
            Ok(()) => self.ports.timer.arm_exact(deadline, RANGING_TIMEOUT_TAG, cid),
            Err(e) => error!(error = %e, "[rtt] timeout already armed"),
        }

        info!(
            operation = %op.id,
            correlation_id = %cid,
            peers = peers.len(),
            "[rtt] ranging request dispatched"
        );
        self.active = ActiveSlot::Dispatched(op);
        true
    }

    fn allocate_correlation_id(&mut self) -> CorrelationId {
        let cid = CorrelationId(self.next_correlation_id);
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);
        cid
    }

    /// Takes the active operation out of the slot. A dispatched operation has
    /// its deadline disarmed and a best-effort hardware cancel issued.
    pub(super) fn take_active(&mut self) -> Option<RangingOperation> {
        match self.active.take() {
            ActiveSlot::Idle => None,
            ActiveSlot::Resolving(op) => Some(op),
            ActiveSlot::Dispatched(op) => {
                self.disarm_timeout();
                if let Some(cid) = op.correlation_id {
                    self.ports.hardware.cancel(cid, &op.hardware_peers());
                }
                Some(op)
            }
        }
    }

    pub(super) fn disarm_timeout(&mut self) {
        if let Some(cid) = self.timeout.disarm() {
            self.ports.timer.cancel(cid);
        }
    }
}
