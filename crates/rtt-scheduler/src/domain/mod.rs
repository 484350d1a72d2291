//! # Domain Layer - Ranging Scheduler
//!
//! Pure scheduling logic with no I/O. Everything here is synchronous and
//! owned by a single `RangingScheduler`.
//!
//! ## Components
//!
//! - `entities`: operations, requests, peers and identifiers
//! - `value_objects`: hardware/caller results, status snapshot, metrics
//! - `errors`: failure kinds, status codes, synchronous API errors
//! - `throttle`: background attribution throttle ledger
//! - `liveness`: reference-counted requester liveness registry
//! - `translator`: peer handle to hardware address translation
//! - `correlator`: result correlation and missing-peer backfill
//! - `timeout`: single outstanding deadline bookkeeping
//! - `invariants`: state machine invariant checks

pub mod correlator;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod liveness;
pub mod throttle;
pub mod timeout;
pub mod translator;
pub mod value_objects;

pub use correlator::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use liveness::*;
pub use throttle::*;
pub use timeout::*;
pub use translator::*;
pub use value_objects::*;
