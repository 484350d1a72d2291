//! # Ranging Session Scheduler
//!
//! Arbitrates a single serialized ranging (RTT) hardware slot between many
//! concurrent requesters.
//!
//! ## Purpose
//!
//! Each requester submits a batch of peers to range against. The hardware
//! services one batch at a time, so the scheduler queues admitted operations,
//! dispatches them one by one, bounds every dispatch with a timeout and
//! correlates hardware results back to the requester that asked for them.
//!
//! ## Operation Lifecycle
//!
//! ```text
//! submit ──admit──→ [QUEUED] ──schedule──→ [DISPATCHED] ──result──→ [TERMINAL]
//!    │                 │                        │
//!    │                 │                        ├── timeout / rejected ──→ [TERMINAL] (failure)
//!    │                 │                        └── cancel / death ──────→ [TERMINAL] (silent)
//!    │                 └── cancel / death / disable ───────────────────→ [TERMINAL]
//!    └── permission / unavailable / queue full / throttled ────────────→ [TERMINAL] (failure)
//! ```
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Single in-flight dispatch | `service/mod.rs` - `ActiveSlot` holds at most one operation |
//! | At most one terminal delivery | `service/mod.rs` - `finish()` consumes the operation |
//! | Unique correlation id while outstanding | `service/dispatch.rs` - `allocate_correlation_id()` |
//! | Balanced liveness registration | `domain/liveness.rs` - reference-counted registry |
//! | Timer armed iff dispatched | `domain/timeout.rs` - `TimeoutManager` |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  runtime/ - tokio event loop, RangingHandle, async adapters     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ drives ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  service/          - RangingScheduler state machine             │
//! │  ports/inbound.rs  - RangingApi trait                           │
//! │  ports/outbound.rs - hardware, timer, liveness, permission ...  │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/throttle.rs    - background attribution throttle        │
//! │  domain/liveness.rs    - requester liveness registry            │
//! │  domain/translator.rs  - peer handle → address translation      │
//! │  domain/correlator.rs  - result correlation and backfill        │
//! │  domain/timeout.rs     - single deadline bookkeeping            │
//! │  domain/invariants.rs  - state machine invariant checks         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod domain;
pub mod ports;
pub mod runtime;
pub mod service;

pub use config::{ConfigError, SchedulerConfig};
pub use domain::*;
pub use ports::inbound::RangingApi;
pub use ports::outbound::{
    AsyncPeerResolver, ImportanceSource, LivenessMonitor, PeerHandleResolver, PermissionGate,
    RangingHardware, ResolveError, SchedulerPorts, StateAnnouncer, TimeSource, WakeupTimer,
};
pub use runtime::{spawn_scheduler, RangingHandle};
pub use service::RangingScheduler;
