//! Deadline bookkeeping for the dispatched operation.
//!
//! At most one deadline is armed at a time. The scheduler pairs every state
//! change here with the matching `WakeupTimer` call.

use thiserror::Error;

use super::entities::{CorrelationId, Timestamp};

/// Tag passed to the wakeup timer for ranging deadlines.
pub const RANGING_TIMEOUT_TAG: &str = "rtt-scheduler.ranging-timeout";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("deadline already armed for {armed}, refusing {requested}")]
    AlreadyArmed {
        armed: CorrelationId,
        requested: CorrelationId,
    },
}

#[derive(Debug, Default)]
pub struct TimeoutManager {
    armed: Option<(CorrelationId, Timestamp)>,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arm(&mut self, cid: CorrelationId, deadline_ms: Timestamp) -> Result<(), TimeoutError> {
        if let Some((armed, _)) = self.armed {
            return Err(TimeoutError::AlreadyArmed {
                armed,
                requested: cid,
            });
        }
        self.armed = Some((cid, deadline_ms));
        Ok(())
    }

    /// Clears the armed deadline. Idempotent.
    pub fn disarm(&mut self) -> Option<CorrelationId> {
        self.armed.take().map(|(cid, _)| cid)
    }

    /// Consumes a timer fire. Returns `false` for a fire that no longer
    /// matches the armed deadline.
    pub fn fire(&mut self, cid: CorrelationId) -> bool {
        match self.armed {
            Some((armed, _)) if armed == cid => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }

    pub fn armed_for(&self) -> Option<CorrelationId> {
        self.armed.map(|(cid, _)| cid)
    }

    pub fn deadline(&self) -> Option<Timestamp> {
        self.armed.map(|(_, deadline)| deadline)
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }
}
