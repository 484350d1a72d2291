//! State machine invariants for the ranging scheduler.

use std::collections::HashSet;

use thiserror::Error;

use super::entities::{OperationState, RangingOperation};
use super::liveness::LivenessRegistry;
use super::timeout::TimeoutManager;
use super::value_objects::OperationPhase;

/// INVARIANT-1: Queued operations have not been dispatched.
/// They carry no correlation id and sit in the `Queued` state.
pub fn invariant_queued_not_dispatched<'a, I>(queue: I) -> bool
where
    I: IntoIterator<Item = &'a RangingOperation>,
{
    queue
        .into_iter()
        .all(|op| op.state == OperationState::Queued && op.correlation_id.is_none())
}

/// INVARIANT-2: Timer armed iff an operation is dispatched, and armed for
/// that operation's correlation id.
pub fn invariant_timer_matches_dispatch(
    active: Option<(&RangingOperation, OperationPhase)>,
    timeout: &TimeoutManager,
) -> bool {
    match active {
        Some((op, OperationPhase::Dispatched)) => {
            op.state == OperationState::Dispatched
                && op.correlation_id.is_some()
                && timeout.armed_for() == op.correlation_id
        }
        Some((op, OperationPhase::Resolving)) => {
            op.correlation_id.is_none() && !timeout.is_armed()
        }
        None => !timeout.is_armed(),
    }
}

/// INVARIANT-3: Liveness registrations balance.
/// Every live operation's token is tracked and no other token is.
pub fn invariant_liveness_balanced<'a, I>(live: I, registry: &LivenessRegistry) -> bool
where
    I: IntoIterator<Item = &'a RangingOperation>,
{
    let tokens: HashSet<_> = live.into_iter().map(|op| op.liveness).collect();
    tokens.iter().all(|t| registry.is_tracked(*t)) && tokens.len() == registry.token_count()
}

/// INVARIANT-4: Operation ids are unique across the queue and the active slot.
pub fn invariant_unique_operations<'a, I>(live: I) -> bool
where
    I: IntoIterator<Item = &'a RangingOperation>,
{
    let mut seen = HashSet::new();
    live.into_iter().all(|op| seen.insert(op.id))
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("queued operation carries dispatch state")]
    QueuedOperationDispatched,

    #[error("armed timer does not match the dispatched operation")]
    TimerMismatch,

    #[error("liveness registrations do not match live operations")]
    LivenessUnbalanced,

    #[error("operation id appears more than once")]
    DuplicateOperation,
}

/// Checks every scheduler invariant.
pub fn check_all_invariants<'a>(
    queue: &'a [&'a RangingOperation],
    active: Option<(&'a RangingOperation, OperationPhase)>,
    registry: &LivenessRegistry,
    timeout: &TimeoutManager,
) -> Result<(), InvariantViolation> {
    let live = || queue.iter().copied().chain(active.map(|(op, _)| op));

    if !invariant_queued_not_dispatched(queue.iter().copied()) {
        return Err(InvariantViolation::QueuedOperationDispatched);
    }

    if !invariant_timer_matches_dispatch(active, timeout) {
        return Err(InvariantViolation::TimerMismatch);
    }

    if !invariant_liveness_balanced(live(), registry) {
        return Err(InvariantViolation::LivenessUnbalanced);
    }

    if !invariant_unique_operations(live()) {
        return Err(InvariantViolation::DuplicateOperation);
    }

    Ok(())
}
