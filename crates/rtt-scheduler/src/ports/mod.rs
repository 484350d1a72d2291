//! Ports layer for the ranging scheduler.
//!
//! - Inbound (Driving) ports: the API requesters and the platform call
//! - Outbound (Driven) ports: hardware, timer, liveness, permission and
//!   other collaborators the scheduler depends on

pub mod inbound;
pub mod outbound;

#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

pub use inbound::*;
pub use outbound::*;
