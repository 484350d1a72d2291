use serde::Serialize;
use thiserror::Error;

use super::value_objects::RangingResult;

/// Why an operation ended without results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Error)]
pub enum FailureKind {
    #[error("requester lacks ranging permission")]
    PermissionDenied,

    #[error("ranging is not available")]
    ResourceUnavailable,

    #[error("background requester throttled")]
    Throttled,

    #[error("per-uid queue limit reached")]
    QueueFull,

    #[error("hardware rejected the dispatch")]
    HardwareRejected,

    #[error("hardware did not answer before the deadline")]
    Timeout,
}

impl FailureKind {
    /// Status code reported to the requester.
    pub fn status_code(self) -> FailureCode {
        match self {
            FailureKind::ResourceUnavailable => FailureCode::RttNotAvailable,
            _ => FailureCode::Fail,
        }
    }
}

/// Status code carried by a failure callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum FailureCode {
    Fail = 1,
    RttNotAvailable = 2,
}

impl FailureCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Why an operation was removed without notifying its requester.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RemovalCause {
    Cancelled,
    RequesterDied,
}

/// How an operation left the scheduler.
#[derive(Clone, Debug, PartialEq)]
pub enum TerminalOutcome {
    Delivered(Vec<RangingResult>),
    Failed(FailureKind),
    SilentlyRemoved(RemovalCause),
}

/// Synchronous errors returned by the public API.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("ranging request has no peers")]
    EmptyRequest,

    #[error("ranging request has {count} peers, max {max}")]
    TooManyPeers { count: usize, max: usize },

    #[error("scheduler is shut down")]
    Closed,

    #[error("scheduler status unavailable")]
    StatusUnavailable,
}
