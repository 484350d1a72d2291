//! # Core Domain Entities
//!
//! Defines the data structures the scheduler moves through its state machine.
//!
//! ## Entities
//!
//! - [`RangingOperation`]: an admitted batch ranging request and its lifecycle
//! - [`RangingRequest`]: ordered peers to range against
//! - [`PeerDescriptor`]: a hardware address or an opaque peer handle
//! - [`AttributionSet`]: the non-empty set of uids billed for an operation
//! - [`LivenessToken`], [`CorrelationId`], [`OperationId`]: identifiers

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::errors::{FailureCode, SchedulerError};
use super::translator::{hardware_peers, PeerTranslation};
use super::value_objects::RangingResult;

/// Process uid of a requester or of an attributed app.
pub type Uid = u32;

/// Monotonic timestamp in milliseconds.
pub type Timestamp = u64;

/// 6-byte hardware (MAC) address of a ranging peer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({})", self)
    }
}

/// Opaque peer identity that must be resolved to a [`MacAddress`] before
/// the hardware can range against it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PeerHandle(pub u32);

/// A peer as the requester named it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PeerDescriptor {
    /// Directly addressable peer.
    Address(MacAddress),
    /// Peer known only by handle; translated at dispatch time.
    Handle(PeerHandle),
}

/// Ordered batch of peers to range against.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RangingRequest {
    peers: Vec<PeerDescriptor>,
}

impl RangingRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_peers(peers: Vec<PeerDescriptor>) -> Self {
        Self { peers }
    }

    /// Appends a directly addressable peer.
    pub fn with_address(mut self, address: MacAddress) -> Self {
        self.peers.push(PeerDescriptor::Address(address));
        self
    }

    /// Appends a peer known only by handle.
    pub fn with_peer_handle(mut self, handle: PeerHandle) -> Self {
        self.peers.push(PeerDescriptor::Handle(handle));
        self
    }

    pub fn peers(&self) -> &[PeerDescriptor] {
        &self.peers
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn has_peer_handles(&self) -> bool {
        self.peers
            .iter()
            .any(|p| matches!(p, PeerDescriptor::Handle(_)))
    }

    /// Distinct peer handles in request order.
    pub fn peer_handles(&self) -> Vec<PeerHandle> {
        let mut seen = BTreeSet::new();
        self.peers
            .iter()
            .filter_map(|p| match p {
                PeerDescriptor::Handle(h) if seen.insert(*h) => Some(*h),
                _ => None,
            })
            .collect()
    }

    /// Rejects requests the hardware could never service.
    pub fn validate(&self, max_peers: usize) -> Result<(), SchedulerError> {
        if self.peers.is_empty() {
            return Err(SchedulerError::EmptyRequest);
        }
        if self.peers.len() > max_peers {
            return Err(SchedulerError::TooManyPeers {
                count: self.peers.len(),
                max: max_peers,
            });
        }
        Ok(())
    }
}

/// Non-empty set of uids billed for an operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct AttributionSet(BTreeSet<Uid>);

impl AttributionSet {
    /// Attribution to a single uid.
    pub fn single(uid: Uid) -> Self {
        Self(BTreeSet::from([uid]))
    }

    /// Builds a set from uids; `None` when no uid is supplied.
    pub fn from_uids<I: IntoIterator<Item = Uid>>(uids: I) -> Option<Self> {
        let set: BTreeSet<Uid> = uids.into_iter().collect();
        if set.is_empty() {
            None
        } else {
            Some(Self(set))
        }
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.0.contains(&uid)
    }

    /// True when every uid in `self` is also in `other`.
    pub fn is_subset_of(&self, other: &AttributionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = Uid> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AttributionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let uids: Vec<String> = self.0.iter().map(|u| u.to_string()).collect();
        write!(f, "{{{}}}", uids.join(","))
    }
}

/// Who is asking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequesterIdentity {
    pub calling_uid: Uid,
    pub package_name: String,
}

impl RequesterIdentity {
    pub fn new(calling_uid: Uid, package_name: impl Into<String>) -> Self {
        Self {
            calling_uid,
            package_name: package_name.into(),
        }
    }
}

/// Handle to a requester's liveness channel. Shared by every operation the
/// same requester submits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LivenessToken(pub u64);

impl fmt::Display for LivenessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "liveness-{}", self.0)
    }
}

/// Identifier the hardware echoes back with its results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CorrelationId(pub u32);

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduler-internal identifier assigned at admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// Lifecycle state of a live [`RangingOperation`].
///
/// ```text
/// [QUEUED] ──dispatch──→ [DISPATCHED]
/// ```
///
/// There is no terminal state: retiring an operation consumes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub enum OperationState {
    #[default]
    Queued,
    Dispatched,
}

/// Terminal notification sink of one operation.
pub trait RangingCallback: Send + Sync {
    fn on_ranging_results(&self, results: Vec<RangingResult>);

    fn on_ranging_failure(&self, code: FailureCode);
}

/// An admitted ranging operation.
///
/// The callback is only reachable by consuming the operation, so a terminal
/// notification can be delivered at most once.
pub struct RangingOperation {
    pub id: OperationId,
    pub requester: RequesterIdentity,
    pub attribution: AttributionSet,
    pub request: RangingRequest,
    pub liveness: LivenessToken,
    /// Assigned at dispatch; `None` while queued.
    pub correlation_id: Option<CorrelationId>,
    pub submit_time_ms: Timestamp,
    pub state: OperationState,
    /// Resolved peer handles; `None` until the resolver answers.
    pub translation: Option<PeerTranslation>,
    callback: Arc<dyn RangingCallback>,
}

impl RangingOperation {
    pub fn new(
        id: OperationId,
        requester: RequesterIdentity,
        attribution: AttributionSet,
        request: RangingRequest,
        liveness: LivenessToken,
        callback: Arc<dyn RangingCallback>,
        submit_time_ms: Timestamp,
    ) -> Self {
        Self {
            id,
            requester,
            attribution,
            request,
            liveness,
            correlation_id: None,
            submit_time_ms,
            state: OperationState::Queued,
            translation: None,
            callback,
        }
    }

    /// True while peer handles still need a resolver round trip.
    pub fn needs_translation(&self) -> bool {
        self.translation.is_none() && self.request.has_peer_handles()
    }

    /// Addresses sent to the hardware. Unresolved handles are left out.
    pub fn hardware_peers(&self) -> Vec<MacAddress> {
        hardware_peers(&self.request, self.translation.as_ref())
    }

    /// Consumes the operation, yielding its callback.
    pub fn into_callback(self) -> Arc<dyn RangingCallback> {
        self.callback
    }
}

impl fmt::Debug for RangingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RangingOperation")
            .field("id", &self.id)
            .field("requester", &self.requester)
            .field("attribution", &self.attribution)
            .field("peers", &self.request.len())
            .field("liveness", &self.liveness)
            .field("correlation_id", &self.correlation_id)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_display() {
        let mac = MacAddress::new([0xAA, 0xBB, 0xCC, 0x0D, 0x0E, 0xFF]);
        assert_eq!(mac.to_string(), "aa:bb:cc:0d:0e:ff");
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            RangingRequest::new().validate(10),
            Err(SchedulerError::EmptyRequest)
        ));

        let mut request = RangingRequest::new();
        for i in 0..11u8 {
            request = request.with_address(MacAddress::new([0, 0, 0, 0, 0, i]));
        }
        assert!(matches!(
            request.validate(10),
            Err(SchedulerError::TooManyPeers { count: 11, max: 10 })
        ));
        assert!(request.validate(11).is_ok());
    }

    #[test]
    fn test_peer_handles_are_distinct_and_ordered() {
        let request = RangingRequest::new()
            .with_peer_handle(PeerHandle(7))
            .with_address(MacAddress::new([1; 6]))
            .with_peer_handle(PeerHandle(3))
            .with_peer_handle(PeerHandle(7));

        assert!(request.has_peer_handles());
        assert_eq!(request.peer_handles(), vec![PeerHandle(7), PeerHandle(3)]);
    }

    #[test]
    fn test_attribution_set_subset() {
        let billed = AttributionSet::from_uids([10, 20, 30]).unwrap();
        let full = AttributionSet::from_uids([30, 10, 20]).unwrap();
        let partial = AttributionSet::from_uids([10, 20]).unwrap();

        assert!(billed.is_subset_of(&full));
        assert!(!billed.is_subset_of(&partial));
        assert!(AttributionSet::from_uids(Vec::<Uid>::new()).is_none());
        assert_eq!(billed.to_string(), "{10,20,30}");
    }
}
