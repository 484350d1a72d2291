//! # Scheduler Laws
//!
//! Property tests over random inputs and random event sequences.
//!
//! 1. **Throttle law** - background admission matches a reference model
//! 2. **Cancellation coverage** - an operation is cancelled iff its set is covered
//! 3. **Event accounting** - every operation ends exactly once, invariants hold
//!    after every event and liveness registrations balance

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use rtt_scheduler::ports::mocks::fixtures::{dummy_request, dummy_results};
use rtt_scheduler::ports::mocks::{MockPorts, RecordingCallback};
use rtt_scheduler::{
    AttributionSet, AttributionThrottle, LivenessToken, RangingScheduler, RequesterIdentity,
    SchedulerConfig, Uid,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

const FOREGROUND_UID: Uid = 1000;

fn make_scheduler(mocks: &MockPorts) -> RangingScheduler {
    mocks.importance.set_foreground(FOREGROUND_UID, true);
    mocks.clock.set(1_000);
    let config = SchedulerConfig {
        max_queued_per_uid: 64,
        ..SchedulerConfig::default()
    };
    RangingScheduler::new(config, mocks.ports()).expect("valid config")
}

fn uid_set() -> impl Strategy<Value = AttributionSet> {
    prop::collection::btree_set(1u32..6, 1..4)
        .prop_map(|uids| AttributionSet::from_uids(uids).expect("non-empty"))
}

// =============================================================================
// THROTTLE LAW
// =============================================================================

proptest! {
    #[test]
    fn throttle_matches_reference_model(
        gap in 1u64..10_000,
        steps in prop::collection::vec((uid_set(), 0u64..5_000, any::<bool>()), 1..40),
    ) {
        let mut throttle = AttributionThrottle::new(gap);
        let mut model: HashMap<Uid, u64> = HashMap::new();
        let mut now = 0u64;

        for (set, advance, foreground) in steps {
            now += advance;
            let expected = foreground
                || set.iter().any(|uid| model.get(&uid).map_or(true, |last| now - last > gap));

            prop_assert_eq!(throttle.allow(&set, foreground, now), expected);

            if expected {
                throttle.record(&set, now);
                for uid in set.iter() {
                    model.insert(uid, now);
                }
            }
        }
    }
}

// =============================================================================
// CANCELLATION COVERAGE
// =============================================================================

proptest! {
    #[test]
    fn cancellation_requires_coverage(
        sets in prop::collection::vec(uid_set(), 1..8),
        cancel in uid_set(),
    ) {
        let mocks = MockPorts::new();
        let mut scheduler = make_scheduler(&mocks);

        let mut callbacks = Vec::new();
        for (i, set) in sets.iter().enumerate() {
            let callback = Arc::new(RecordingCallback::default());
            scheduler
                .submit(
                    RequesterIdentity::new(FOREGROUND_UID, "com.example.cancel"),
                    Some(set.clone()),
                    dummy_request(i as u8),
                    LivenessToken(i as u64),
                    callback.clone(),
                )
                .unwrap();
            callbacks.push(callback);
        }

        scheduler.cancel(&cancel);
        prop_assert!(scheduler.check_invariants().is_ok());

        let expected_remaining = sets.iter().filter(|s| !s.is_subset_of(&cancel)).count();
        let remaining = scheduler.queue_len() + usize::from(scheduler.active_operation().is_some());
        prop_assert_eq!(remaining, expected_remaining);
        prop_assert!(callbacks.iter().all(|c| c.count() == 0));
        prop_assert_eq!(
            scheduler.metrics().silently_removed as usize,
            sets.len() - expected_remaining
        );
    }
}

// =============================================================================
// EVENT ACCOUNTING
// =============================================================================

#[derive(Debug, Clone)]
enum Event {
    Submit { set: AttributionSet, token: u64 },
    DeliverActive { partial: bool },
    DeliverStale,
    TimeoutActive,
    Reject(bool),
    Cancel(AttributionSet),
    Death(u64),
    HardwareReady(bool),
    DeviceIdle(bool),
    Advance(u64),
}

fn event() -> impl Strategy<Value = Event> {
    prop_oneof![
        4 => (uid_set(), 0u64..4).prop_map(|(set, token)| Event::Submit { set, token }),
        3 => any::<bool>().prop_map(|partial| Event::DeliverActive { partial }),
        1 => Just(Event::DeliverStale),
        1 => Just(Event::TimeoutActive),
        1 => any::<bool>().prop_map(Event::Reject),
        1 => uid_set().prop_map(Event::Cancel),
        1 => (0u64..4).prop_map(Event::Death),
        1 => any::<bool>().prop_map(Event::HardwareReady),
        1 => any::<bool>().prop_map(Event::DeviceIdle),
        1 => (0u64..3_600_000).prop_map(Event::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_operation_ends_exactly_once(events in prop::collection::vec(event(), 1..80)) {
        let mocks = MockPorts::new();
        let mut scheduler = make_scheduler(&mocks);
        let mut callbacks = Vec::new();
        let mut seed = 0u8;

        for event in events {
            match event {
                Event::Submit { set, token } => {
                    let callback = Arc::new(RecordingCallback::default());
                    let uid = if token % 2 == 0 { FOREGROUND_UID } else { 2000 };
                    scheduler
                        .submit(
                            RequesterIdentity::new(uid, "com.example.laws"),
                            Some(set),
                            dummy_request(seed),
                            LivenessToken(token),
                            callback.clone(),
                        )
                        .unwrap();
                    seed = seed.wrapping_add(1);
                    callbacks.push(callback);
                }
                Event::DeliverActive { partial } => {
                    if let Some(cid) = scheduler.active_operation().and_then(|a| a.correlation_id) {
                        let mut results = dummy_results(&dummy_request(0));
                        if partial {
                            results.truncate(1);
                        }
                        scheduler.on_hardware_result(cid, results);
                    }
                }
                Event::DeliverStale => {
                    if let Some((cid, _)) = mocks.hardware.last_submitted() {
                        let active = scheduler.active_operation().and_then(|a| a.correlation_id);
                        if active != Some(cid) {
                            scheduler.on_hardware_result(cid, Vec::new());
                        }
                    }
                }
                Event::TimeoutActive => {
                    if let Some(cid) = scheduler.active_operation().and_then(|a| a.correlation_id) {
                        scheduler.on_timeout(cid);
                    }
                }
                Event::Reject(reject) => mocks.hardware.set_accept(!reject),
                Event::Cancel(set) => scheduler.cancel(&set),
                Event::Death(token) => scheduler.on_requester_died(LivenessToken(token)),
                Event::HardwareReady(ready) => scheduler.set_hardware_available(ready),
                Event::DeviceIdle(idle) => scheduler.set_device_idle(idle),
                Event::Advance(ms) => mocks.clock.advance(ms),
            }

            prop_assert!(scheduler.check_invariants().is_ok());
        }

        // at most one terminal notification per operation
        prop_assert!(callbacks.iter().all(|c| c.count() <= 1));

        let metrics = scheduler.metrics();
        let outstanding =
            scheduler.queue_len() as u64 + u64::from(scheduler.active_operation().is_some());
        prop_assert_eq!(metrics.submitted, callbacks.len() as u64);
        prop_assert_eq!(
            metrics.submitted,
            metrics.delivered + metrics.total_failed() + metrics.silently_removed + outstanding
        );

        // registrations stay balanced with what is still tracked
        prop_assert_eq!(
            mocks.liveness.outstanding(),
            scheduler.status().tracked_requesters
        );

        // shutdown ends whatever is left
        scheduler.shutdown();
        prop_assert!(scheduler.check_invariants().is_ok());
        prop_assert!(callbacks.iter().all(|c| c.count() <= 1));
        let metrics = scheduler.metrics();
        prop_assert_eq!(
            metrics.submitted,
            metrics.delivered + metrics.total_failed() + metrics.silently_removed
        );
        prop_assert_eq!(mocks.liveness.outstanding(), 0);
        // every armed deadline was either cancelled or fired
        prop_assert_eq!(
            mocks.timer.armed().len(),
            mocks.timer.cancelled().len() + metrics.failed_timeout as usize
        );
    }
}
