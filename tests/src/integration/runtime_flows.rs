//! # Runtime Flows
//!
//! End-to-end flows through the scheduler task with the real tokio adapters.
//! Hardware, permission and importance stay mocked.
//!
//! All tests run on paused time, so timer deadlines elapse instantly and in
//! order.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::task::JoinHandle;

    use rtt_scheduler::ports::mocks::fixtures::{dummy_request, dummy_results};
    use rtt_scheduler::ports::mocks::{MockPorts, RecordingCallback};
    use rtt_scheduler::runtime::{
        event_channel, BroadcastAnnouncer, LivenessHub, MonotonicTimeSource, ResolverBridge,
        TokioWakeupTimer,
    };
    use rtt_scheduler::{
        spawn_scheduler, AsyncPeerResolver, FailureCode, LivenessToken, MacAddress,
        PeerDescriptor, PeerHandle, RangingApi, RangingHandle, RangingRequest, RequesterIdentity,
        ResolveError, RttState, SchedulerConfig, SchedulerPorts, Uid,
    };

    use crate::init_tracing;

    const APP_UID: Uid = 1000;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    /// Resolves handles from a fixed table.
    struct TableResolver {
        table: HashMap<PeerHandle, MacAddress>,
    }

    #[async_trait]
    impl AsyncPeerResolver for TableResolver {
        async fn resolve(
            &self,
            _uid: Uid,
            handles: Vec<PeerHandle>,
        ) -> Result<HashMap<PeerHandle, MacAddress>, ResolveError> {
            Ok(handles
                .into_iter()
                .filter_map(|h| self.table.get(&h).map(|mac| (h, *mac)))
                .collect())
        }
    }

    struct Node {
        mocks: MockPorts,
        handle: RangingHandle,
        hub: Arc<LivenessHub>,
        timer: Arc<TokioWakeupTimer>,
        announcer: BroadcastAnnouncer,
        _task: JoinHandle<()>,
    }

    fn start_node(table: HashMap<PeerHandle, MacAddress>) -> Node {
        init_tracing();

        let config = SchedulerConfig::default();
        let mocks = MockPorts::new();
        mocks.importance.set_foreground(APP_UID, true);

        let (events, inbox) = event_channel();
        let clock = Arc::new(MonotonicTimeSource::new());
        let timer = Arc::new(TokioWakeupTimer::new(events.clone(), clock.clone()));
        let hub = Arc::new(LivenessHub::new(events.clone()));
        let announcer = BroadcastAnnouncer::new(16);
        let resolver = Arc::new(ResolverBridge::new(
            Arc::new(TableResolver { table }),
            events.clone(),
            config.resolver_timeout_ms,
        ));

        let ports = SchedulerPorts {
            permissions: mocks.permissions.clone(),
            importance: mocks.importance.clone(),
            resolver,
            hardware: mocks.hardware.clone(),
            timer: timer.clone(),
            liveness: hub.clone(),
            announcer: Arc::new(announcer.clone()),
            clock,
        };
        let (handle, task) = spawn_scheduler(config, ports, events, inbox).unwrap();

        Node {
            mocks,
            handle,
            hub,
            timer,
            announcer,
            _task: task,
        }
    }

    fn submit(
        node: &Node,
        request: RangingRequest,
        token: LivenessToken,
    ) -> Arc<RecordingCallback> {
        let callback = Arc::new(RecordingCallback::default());
        node.handle
            .submit(
                RequesterIdentity::new(APP_UID, "com.example.ranging"),
                None,
                request,
                token,
                callback.clone(),
            )
            .unwrap();
        callback
    }

    /// Lets spawned adapter tasks run to quiescence.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // =========================================================================
    // FLOWS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_operations_through_handle() {
        let node = start_node(HashMap::new());
        let (token, guard) = node.hub.connect();

        let callbacks: Vec<_> = (0..10u8)
            .map(|seed| submit(&node, dummy_request(seed), token))
            .collect();

        for seed in 0..10u8 {
            node.handle.status().await.unwrap();
            let (cid, _) = node.mocks.hardware.last_submitted().unwrap();
            node.handle
                .on_hardware_result(cid, dummy_results(&dummy_request(seed)))
                .unwrap();
        }

        let status = node.handle.status().await.unwrap();
        assert_eq!(status.metrics.delivered, 10);
        assert_eq!(status.tracked_requesters, 0);
        assert!(callbacks.iter().all(|c| c.results().is_some()));
        assert_eq!(node.timer.pending(), 0);
        assert_eq!(node.hub.watched(), 0);

        // client leaves after its last operation finished
        drop(guard);
        assert_eq!(node.hub.connected(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_real_timer_times_out_and_advances_queue() {
        let node = start_node(HashMap::new());
        let (token, _guard) = node.hub.connect();

        let first = submit(&node, dummy_request(1), token);
        let second = submit(&node, dummy_request(2), token);
        node.handle.status().await.unwrap();
        let (first_cid, _) = node.mocks.hardware.last_submitted().unwrap();

        tokio::time::sleep(Duration::from_millis(5_001)).await;
        let status = node.handle.status().await.unwrap();

        assert_eq!(first.failure(), Some(FailureCode::Fail));
        assert_eq!(second.count(), 0);
        assert_eq!(status.metrics.failed_timeout, 1);
        assert_eq!(status.metrics.dispatched, 2);
        assert_eq!(node.mocks.hardware.cancelled()[0].0, first_cid);
        assert_eq!(node.timer.pending(), 1);

        // a late answer for the timed-out dispatch is discarded
        node.handle
            .on_hardware_result(first_cid, dummy_results(&dummy_request(1)))
            .unwrap();
        let status = node.handle.status().await.unwrap();
        assert_eq!(status.metrics.stale_results, 1);
        assert_eq!(first.count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_drop_purges_requester() {
        let node = start_node(HashMap::new());
        let (dying, guard) = node.hub.connect();
        let (surviving, _survivor_guard) = node.hub.connect();

        let doomed = submit(&node, dummy_request(1), dying);
        let survivor = submit(&node, dummy_request(2), surviving);
        node.handle.status().await.unwrap();
        assert_eq!(node.hub.watched(), 2);

        drop(guard);
        settle().await;
        let status = node.handle.status().await.unwrap();

        assert_eq!(doomed.count(), 0);
        assert_eq!(status.metrics.silently_removed, 1);
        assert_eq!(status.tracked_requesters, 1);
        assert_eq!(node.hub.watched(), 1);
        assert_eq!(node.hub.connected(), 1);
        assert_eq!(node.mocks.hardware.cancelled().len(), 1);
        assert_eq!(node.mocks.hardware.submit_count(), 2);

        let (cid, _) = node.mocks.hardware.last_submitted().unwrap();
        node.handle
            .on_hardware_result(cid, dummy_results(&dummy_request(2)))
            .unwrap();
        node.handle.status().await.unwrap();
        assert!(survivor.results().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_handles_resolved_through_bridge() {
        let resolved = MacAddress::new([0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F]);
        let node = start_node(HashMap::from([(PeerHandle(42), resolved)]));
        let (token, _guard) = node.hub.connect();

        let request = RangingRequest::new()
            .with_peer_handle(PeerHandle(42))
            .with_peer_handle(PeerHandle(43));
        let callback = submit(&node, request, token);
        settle().await;
        node.handle.status().await.unwrap();

        let (cid, peers) = node.mocks.hardware.last_submitted().unwrap();
        assert_eq!(peers, vec![resolved]);

        node.handle
            .on_hardware_result(
                cid,
                vec![rtt_scheduler::RawRangingResult::success(resolved, 3_000, 1)],
            )
            .unwrap();
        node.handle.status().await.unwrap();

        let results = callback.results().unwrap();
        assert_eq!(results[0].peer, PeerDescriptor::Handle(PeerHandle(42)));
        assert_eq!(results[0].distance_mm, 3_000);
        assert_eq!(results[1].peer, PeerDescriptor::Handle(PeerHandle(43)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_broadcast() {
        let node = start_node(HashMap::new());
        let mut states = node.announcer.subscribe();
        let (token, _guard) = node.hub.connect();
        let callback = submit(&node, dummy_request(1), token);

        node.handle.set_device_idle(true).unwrap();
        assert_eq!(states.recv().await.unwrap(), RttState::Disabled);
        assert_eq!(callback.failure(), Some(FailureCode::RttNotAvailable));

        node.handle.set_device_idle(false).unwrap();
        assert_eq!(states.recv().await.unwrap(), RttState::Enabled);

        let status = node.handle.status().await.unwrap();
        assert!(status.available);
        assert_eq!(node.timer.pending(), 0);
        assert_eq!(node.hub.watched(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_releases_timer_and_liveness() {
        let node = start_node(HashMap::new());
        let (token, _guard) = node.hub.connect();
        let active = submit(&node, dummy_request(1), token);
        let queued = submit(&node, dummy_request(2), token);
        node.handle.status().await.unwrap();
        assert_eq!(node.timer.pending(), 1);
        assert_eq!(node.hub.watched(), 1);

        let Node {
            handle,
            hub,
            timer,
            _task: task,
            ..
        } = node;
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(active.failure(), Some(FailureCode::RttNotAvailable));
        assert_eq!(queued.failure(), Some(FailureCode::RttNotAvailable));
        assert_eq!(timer.pending(), 0);
        assert_eq!(hub.watched(), 0);
        assert!(handle.status().await.is_err());
    }
}
