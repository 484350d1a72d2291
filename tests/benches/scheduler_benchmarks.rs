//! # Ranging Scheduler Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | submit → dispatch → deliver cycle | < 10µs per operation |
//! | result correlation, 10 peers | < 2µs |
//! | throttle admission, 1k-uid ledger | < 200ns |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rtt_scheduler::ports::mocks::fixtures::{dummy_request, dummy_results};
use rtt_scheduler::ports::mocks::{MockPorts, RecordingCallback};
use rtt_scheduler::{
    correlate, AttributionSet, AttributionThrottle, LivenessToken, MacAddress, RangingRequest,
    RangingScheduler, RawRangingResult, RequesterIdentity, SchedulerConfig,
};

fn bench_dispatch_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler-dispatch-cycle");

    for depth in [1usize, 10, 50] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("queue_depth", depth), &depth, |b, &depth| {
            b.iter(|| {
                let mocks = MockPorts::new();
                mocks.importance.set_foreground(1000, true);
                let config = SchedulerConfig {
                    max_queued_per_uid: depth,
                    ..SchedulerConfig::default()
                };
                let mut scheduler = RangingScheduler::new(config, mocks.ports()).expect("valid config");
                let callback = Arc::new(RecordingCallback::default());

                for seed in 0..depth {
                    let _ = scheduler.submit(
                        RequesterIdentity::new(1000, "com.example.bench"),
                        None,
                        dummy_request(seed as u8),
                        LivenessToken(1),
                        callback.clone(),
                    );
                }
                for seed in 0..depth {
                    if let Some(cid) = scheduler.active_operation().and_then(|a| a.correlation_id) {
                        scheduler.on_hardware_result(cid, dummy_results(&dummy_request(seed as u8)));
                    }
                }
                black_box(scheduler.metrics().delivered)
            })
        });
    }

    group.finish();
}

fn bench_correlation(c: &mut Criterion) {
    let mut request = RangingRequest::new();
    for i in 0..10u8 {
        request = request.with_address(MacAddress::new([0, 0, 0, 0, 0, i]));
    }
    // every other peer missing, plus an unrequested report
    let mut raw: Vec<RawRangingResult> = (0..10u8)
        .step_by(2)
        .map(|i| RawRangingResult::success(MacAddress::new([0, 0, 0, 0, 0, i]), 1_000, 1))
        .collect();
    raw.push(RawRangingResult::success(MacAddress::new([9; 6]), 1, 1));

    c.bench_function("correlate_10_peers_half_missing", |b| {
        b.iter(|| black_box(correlate(black_box(&request), None, black_box(&raw))))
    });
}

fn bench_throttle(c: &mut Criterion) {
    let mut throttle = AttributionThrottle::new(1_800_000);
    for uid in 0..1_000u32 {
        if let Some(set) = AttributionSet::from_uids([uid]) {
            throttle.record(&set, 1_000);
        }
    }
    let set = AttributionSet::from_uids([10, 500, 999]).unwrap_or_else(|| AttributionSet::single(10));

    c.bench_function("throttle_allow_background", |b| {
        b.iter(|| black_box(throttle.allow(black_box(&set), false, 2_000)))
    });
}

criterion_group!(benches, bench_dispatch_cycle, bench_correlation, bench_throttle);
criterion_main!(benches);
