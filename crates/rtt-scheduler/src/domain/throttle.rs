//! Background execution throttle.
//!
//! A background requester may dispatch only if at least one uid it bills has
//! not dispatched within the last `gap_ms`. Foreground requesters are never
//! throttled but still update the ledger.

use std::collections::HashMap;

use super::entities::{AttributionSet, Timestamp, Uid};

#[derive(Debug, Clone)]
pub struct AttributionThrottle {
    gap_ms: u64,
    ledger: HashMap<Uid, Timestamp>,
}

impl AttributionThrottle {
    pub fn new(gap_ms: u64) -> Self {
        Self {
            gap_ms,
            ledger: HashMap::new(),
        }
    }

    pub fn gap_ms(&self) -> u64 {
        self.gap_ms
    }

    /// Admission decision for an operation billed to `set`.
    pub fn allow(&self, set: &AttributionSet, foreground: bool, now: Timestamp) -> bool {
        if foreground {
            return true;
        }
        set.iter().any(|uid| match self.ledger.get(&uid) {
            None => true,
            Some(&last) => now.saturating_sub(last) > self.gap_ms,
        })
    }

    /// Stamps every uid in `set` with `now`.
    pub fn record(&mut self, set: &AttributionSet, now: Timestamp) {
        for uid in set.iter() {
            self.ledger.insert(uid, now);
        }
    }

    pub fn last_dispatch(&self, uid: Uid) -> Option<Timestamp> {
        self.ledger.get(&uid).copied()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }
}
