//! # Ranging Scheduler Test Suite
//!
//! Unified test crate for flows that need the real tokio runtime adapters.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # End-to-end flows through RangingHandle
//! └── benches/           # Criterion benchmarks of the scheduler core
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p rtt-tests
//! RUST_LOG=rtt_scheduler=debug cargo test -p rtt-tests -- --nocapture
//! cargo bench -p rtt-tests
//! ```

pub mod integration;

/// Installs a test-friendly subscriber filtered by `RUST_LOG`. Safe to call
/// from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
