//! # Result Correlation
//!
//! Maps raw hardware results back onto the peers a requester asked for.
//!
//! ## Rules
//!
//! - Output has exactly one entry per requested peer, in request order.
//! - Each entry carries the identity the requester used. A handle peer is
//!   reported by handle even though the hardware ranged its address.
//! - A requested peer the hardware did not report is backfilled as failed.
//! - Raw results for addresses nobody asked for are dropped.
//! - If the hardware reports an address twice, the first report wins.

use std::collections::HashMap;

use super::entities::{MacAddress, RangingRequest};
use super::translator::{address_of, PeerTranslation};
use super::value_objects::{RangingResult, RawRangingResult};

pub fn correlate(
    request: &RangingRequest,
    translation: Option<&PeerTranslation>,
    raw: &[RawRangingResult],
) -> Vec<RangingResult> {
    let mut by_address: HashMap<MacAddress, &RawRangingResult> = HashMap::with_capacity(raw.len());
    for result in raw {
        by_address.entry(result.address).or_insert(result);
    }

    request
        .peers()
        .iter()
        .map(|peer| {
            address_of(peer, translation)
                .and_then(|mac| by_address.get(&mac))
                .map_or_else(
                    || RangingResult::failed(*peer),
                    |raw| RangingResult::from_raw(*peer, raw),
                )
        })
        .collect()
}
