//! Retiring the active operation and purging queued ones.

use tracing::{debug, error, info, warn};

use super::{ActiveSlot, RangingScheduler};
use crate::domain::{
    correlate, AttributionSet, CorrelationId, FailureKind, LivenessToken, RangingOperation,
    RawRangingResult, RemovalCause, TerminalOutcome,
};

impl RangingScheduler {
    /// Hardware results for `correlation_id`.
    ///
    /// Results that do not match the dispatched operation are stale and
    /// dropped without any other effect.
    pub fn on_hardware_result(
        &mut self,
        correlation_id: CorrelationId,
        results: Vec<RawRangingResult>,
    ) {
        let op = match self.active.take() {
            ActiveSlot::Dispatched(op) if op.correlation_id == Some(correlation_id) => op,
            other => {
                self.active = other;
                self.metrics.stale_results += 1;
                debug!(correlation_id = %correlation_id, "[rtt] discarding stale ranging results");
                return;
            }
        };
        self.disarm_timeout();

        if !self
            .ports
            .permissions
            .check_permission(&op.requester.package_name, op.requester.calling_uid)
        {
            warn!(
                operation = %op.id,
                uid = op.requester.calling_uid,
                "[rtt] permission revoked before delivery"
            );
            self.finish(op, TerminalOutcome::Failed(FailureKind::PermissionDenied));
        } else {
            let delivered = correlate(&op.request, op.translation.as_ref(), &results);
            debug!(
                operation = %op.id,
                reported = results.len(),
                requested = delivered.len(),
                "[rtt] ranging results correlated"
            );
            self.finish(op, TerminalOutcome::Delivered(delivered));
        }

        self.schedule_next();
    }

    /// Wakeup for the deadline armed at dispatch. A fire that no longer
    /// matches the armed deadline is ignored.
    pub fn on_timeout(&mut self, correlation_id: CorrelationId) {
        if !self.timeout.fire(correlation_id) {
            debug!(correlation_id = %correlation_id, "[rtt] ignoring stale timeout");
            return;
        }
        if !matches!(self.active, ActiveSlot::Dispatched(_)) {
            error!(correlation_id = %correlation_id, "[rtt] timeout fired with nothing dispatched");
            return;
        }

        if let Some(op) = self.take_active() {
            info!(operation = %op.id, correlation_id = %correlation_id, "[rtt] ranging request timed out");
            self.finish(op, TerminalOutcome::Failed(FailureKind::Timeout));
        }
        self.schedule_next();
    }

    /// Silently removes every operation billed only to uids in `attribution`.
    pub fn cancel(&mut self, attribution: &AttributionSet) {
        let removed = self.remove_queued(|op| op.attribution.is_subset_of(attribution));
        let active = self.active_matches(|op| op.attribution.is_subset_of(attribution));

        info!(
            attribution = %attribution,
            queued = removed.len(),
            active,
            "[rtt] cancelling ranging requests"
        );
        self.retire_silently(removed, active, RemovalCause::Cancelled);
    }

    /// The requester behind `token` is gone. Its operations are removed
    /// silently and its registration is released once.
    pub fn on_requester_died(&mut self, token: LivenessToken) {
        if self.liveness.purge(token).is_none() {
            debug!(token = %token, "[rtt] death of untracked requester");
            return;
        }
        self.ports.liveness.unregister(token);

        let removed = self.remove_queued(|op| op.liveness == token);
        let active = self.active_matches(|op| op.liveness == token);

        info!(
            token = %token,
            queued = removed.len(),
            active,
            "[rtt] requester died"
        );
        self.retire_silently(removed, active, RemovalCause::RequesterDied);
    }

    /// Retires every live operation ahead of the scheduler being dropped.
    /// Each fails with `ResourceUnavailable`; the dispatched one is also
    /// cancelled on the hardware. Later submits fail the same way.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        info!(
            queued = self.queue.len(),
            active = !self.active.is_idle(),
            "[rtt] shutting down"
        );
        self.shut_down = true;
        self.fail_all(FailureKind::ResourceUnavailable);
    }

    /// Fails the active operation first, then the queue in order.
    pub(super) fn fail_all(&mut self, kind: FailureKind) {
        if let Some(op) = self.take_active() {
            self.finish(op, TerminalOutcome::Failed(kind));
        }
        let queued: Vec<_> = self.queue.drain(..).collect();
        for op in queued {
            self.finish(op, TerminalOutcome::Failed(kind));
        }
    }

    fn retire_silently(&mut self, queued: Vec<RangingOperation>, active: bool, cause: RemovalCause) {
        for op in queued {
            self.finish(op, TerminalOutcome::SilentlyRemoved(cause));
        }
        if active {
            if let Some(op) = self.take_active() {
                self.finish(op, TerminalOutcome::SilentlyRemoved(cause));
            }
            self.schedule_next();
        }
    }

    fn active_matches<F>(&self, pred: F) -> bool
    where
        F: Fn(&RangingOperation) -> bool,
    {
        self.active.operation().is_some_and(|(op, _)| pred(op))
    }
}
