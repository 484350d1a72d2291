//! # Integration Tests
//!
//! - `runtime_flows`: scheduler task driven through `RangingHandle` with the
//!   tokio timer, liveness hub, resolver bridge and broadcast announcer

pub mod runtime_flows;
