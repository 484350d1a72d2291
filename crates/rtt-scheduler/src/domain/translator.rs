//! Peer handle translation.

use std::collections::HashMap;

use super::entities::{MacAddress, PeerDescriptor, PeerHandle, RangingRequest};

/// Addresses resolved for the handles of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerTranslation {
    resolved: HashMap<PeerHandle, MacAddress>,
}

impl PeerTranslation {
    /// Keeps only entries for handles the request actually names.
    pub fn from_resolved(
        request: &RangingRequest,
        resolved: HashMap<PeerHandle, MacAddress>,
    ) -> Self {
        let wanted = request.peer_handles();
        let resolved = resolved
            .into_iter()
            .filter(|(handle, _)| wanted.contains(handle))
            .collect();
        Self { resolved }
    }

    pub fn address_for(&self, handle: PeerHandle) -> Option<MacAddress> {
        self.resolved.get(&handle).copied()
    }

    /// Handles in `request` with no resolved address.
    pub fn unresolved_handles(&self, request: &RangingRequest) -> Vec<PeerHandle> {
        request
            .peer_handles()
            .into_iter()
            .filter(|h| !self.resolved.contains_key(h))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// Addresses the hardware should range, in request order.
///
/// A handle with no translation is omitted; the correlator backfills it as a
/// failure.
pub fn hardware_peers(
    request: &RangingRequest,
    translation: Option<&PeerTranslation>,
) -> Vec<MacAddress> {
    request
        .peers()
        .iter()
        .filter_map(|peer| address_of(peer, translation))
        .collect()
}

/// Address a requested peer was ranged at, if any.
pub fn address_of(
    peer: &PeerDescriptor,
    translation: Option<&PeerTranslation>,
) -> Option<MacAddress> {
    match peer {
        PeerDescriptor::Address(mac) => Some(*mac),
        PeerDescriptor::Handle(handle) => translation.and_then(|t| t.address_for(*handle)),
    }
}
