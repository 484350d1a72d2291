//! Reference-counted requester liveness registry.
//!
//! A token is registered with the monitor when its first dependent operation
//! attaches and unregistered when the last one detaches, so register and
//! unregister calls stay balanced per token.

use std::collections::{HashMap, HashSet};

use super::entities::{LivenessToken, OperationId};

#[derive(Debug, Default)]
pub struct LivenessRegistry {
    dependents: HashMap<LivenessToken, HashSet<OperationId>>,
}

impl LivenessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the token was not tracked before.
    pub fn attach(&mut self, token: LivenessToken, operation: OperationId) -> bool {
        let entry = self.dependents.entry(token).or_default();
        let first = entry.is_empty();
        entry.insert(operation);
        first
    }

    /// Returns `true` if this was the token's last dependent.
    pub fn detach(&mut self, token: LivenessToken, operation: OperationId) -> bool {
        let Some(entry) = self.dependents.get_mut(&token) else {
            return false;
        };
        if !entry.remove(&operation) {
            return false;
        }
        if entry.is_empty() {
            self.dependents.remove(&token);
            return true;
        }
        false
    }

    /// Drops the token outright, returning the operations that depended on it.
    pub fn purge(&mut self, token: LivenessToken) -> Option<HashSet<OperationId>> {
        self.dependents.remove(&token)
    }

    pub fn is_tracked(&self, token: LivenessToken) -> bool {
        self.dependents.contains_key(&token)
    }

    pub fn dependents(&self, token: LivenessToken) -> usize {
        self.dependents.get(&token).map_or(0, HashSet::len)
    }

    pub fn token_count(&self) -> usize {
        self.dependents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_detach_balance() {
        let mut registry = LivenessRegistry::new();
        let token = LivenessToken(1);

        assert!(registry.attach(token, OperationId(1)));
        assert!(!registry.attach(token, OperationId(2)));
        assert_eq!(registry.dependents(token), 2);

        assert!(!registry.detach(token, OperationId(1)));
        assert!(registry.detach(token, OperationId(2)));
        assert!(!registry.is_tracked(token));
    }

    #[test]
    fn test_detach_unknown_is_noop() {
        let mut registry = LivenessRegistry::new();
        let token = LivenessToken(1);
        registry.attach(token, OperationId(1));

        assert!(!registry.detach(token, OperationId(99)));
        assert!(!registry.detach(LivenessToken(2), OperationId(1)));
        assert!(registry.is_tracked(token));
    }

    #[test]
    fn test_purge_returns_dependents() {
        let mut registry = LivenessRegistry::new();
        let token = LivenessToken(7);
        registry.attach(token, OperationId(1));
        registry.attach(token, OperationId(2));

        let purged = registry.purge(token).unwrap();
        assert_eq!(purged.len(), 2);
        assert_eq!(registry.token_count(), 0);
        assert!(registry.purge(token).is_none());
    }
}
