use std::sync::Arc;
use std::time::Duration;

use multilog::Level;
use multilog::LogRouter;
use multilog::MemorySink;
use similar_asserts::assert_eq;
use stathat::Pipeline;
use stathat::RecordingSink;
use stathat::Shipped;
use stathat::ShipperStats;
use stathat::ShutdownPolicy;
use test_log::test;

fn router_with_memory(level: Level) -> (Arc<LogRouter>, Arc<MemorySink>) {
    let memory = Arc::new(MemorySink::with_level(level));
    let router = Arc::new(LogRouter::new());
    router.add(memory.clone());
    (router, memory)
}

#[test(tokio::test)]
async fn ships_prefixed_events_with_the_configured_key() {
    let sink = Arc::new(RecordingSink::new());
    let (router, _memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_prefix("[svc]")
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    pipeline.client().count("users", 1);
    pipeline.client().measure("latency", 2.5);
    sink.wait_for(2).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.total().shipped, 2);

    let mut calls = sink.calls();
    calls.sort_by(|a, b| a.name().cmp(b.name()));
    assert_eq!(
        calls,
        vec![
            Shipped::Value {
                name: "[svc] latency".to_string(),
                key: "k".to_string(),
                value: 2.5,
            },
            Shipped::Count {
                name: "[svc] users".to_string(),
                key: "k".to_string(),
                n: 1,
            },
        ]
    );
}

#[test(tokio::test)]
async fn key_from_environment_when_not_configured() {
    let sink = Arc::new(RecordingSink::new());
    let (router, _memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .spawn_with_env(sink.clone(), router, |name| {
            (name == "SH_KEY").then(|| "helloKey".to_string())
        })
        .expect("pipeline should start");

    assert_eq!(pipeline.client().api_key(), "helloKey");
    pipeline.client().count("a", 1);
    pipeline.shutdown().await;

    assert_eq!(
        sink.calls(),
        vec![Shipped::Count {
            name: "a".to_string(),
            key: "helloKey".to_string(),
            n: 1,
        }]
    );
}

#[test(tokio::test)]
async fn disabled_without_any_key() {
    let sink = Arc::new(RecordingSink::new());
    let (router, memory) = router_with_memory(Level::Debug);

    let pipeline = Pipeline::builder()
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    assert!(!pipeline.client().is_enabled());
    pipeline.client().count("a", 1);
    pipeline.client().measure("b", 1.0);
    pipeline.client().time("c", std::time::Instant::now(), Duration::ZERO);

    let report = pipeline.shutdown().await;
    assert_eq!(report.total(), ShipperStats::default());
    assert!(sink.is_empty());
    assert!(!memory.contains("dropped"));
    assert!(!memory.contains("zero precision"));
}

#[test(tokio::test)]
async fn full_queue_drops_and_warns() {
    let sink = Arc::new(RecordingSink::new());
    let (router, memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_count_capacity(2)
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    // the shippers have not been polled yet on this runtime
    for _ in 0..4 {
        pipeline.client().count("users", 1);
    }
    assert_eq!(memory.count_containing("[WARNING] dropped count for users"), 2);

    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.shipped, 2);
    assert_eq!(sink.len(), 2);
}

#[test(tokio::test)]
async fn drain_ships_everything_queued_before_shutdown() {
    let sink = Arc::new(RecordingSink::new());
    let (router, _memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_shutdown_policy(ShutdownPolicy::Drain)
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    for i in 0..5 {
        pipeline.client().count(&format!("c{i}"), i);
    }
    pipeline.client().measure("m", 1.0);

    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.shipped, 5);
    assert_eq!(report.measures.shipped, 1);
    assert_eq!(report.total().discarded, 0);

    let names: Vec<String> = sink
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Shipped::Count { .. }))
        .map(|call| call.name().to_string())
        .collect();
    assert_eq!(names, vec!["c0", "c1", "c2", "c3", "c4"]);
}

#[test(tokio::test)]
async fn discard_reports_what_was_left_behind() {
    let sink = Arc::new(RecordingSink::new());
    let (router, memory) = router_with_memory(Level::Info);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_shutdown_policy(ShutdownPolicy::Discard)
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    for _ in 0..5 {
        pipeline.client().count("users", 1);
    }

    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.discarded, 5);
    assert_eq!(report.counts.shipped, 0);
    assert!(sink.is_empty());
    assert!(memory.called_with("[INFO] discarded 5 queued count events"));
}

#[test(tokio::test)]
async fn failed_shipments_are_logged_and_skipped() {
    let sink = Arc::new(RecordingSink::new());
    sink.fail_with("boom");
    let (router, memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    pipeline.client().count("users", 1);
    pipeline.client().count("orders", 1);
    sink.wait_for(2).await;

    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.failed, 2);
    assert_eq!(report.counts.shipped, 0);
    assert_eq!(memory.count_containing("[WARNING] failed to ship count"), 2);
    assert!(memory.contains("boom"));
}

#[test(tokio::test(start_paused = true))]
async fn stuck_shipper_is_aborted_at_the_timeout() {
    let sink = Arc::new(RecordingSink::new());
    sink.slow_down(Duration::from_secs(60));
    let (router, memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_shutdown_timeout(Duration::from_secs(1))
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    pipeline.client().count("users", 1);
    // let the count shipper enter the slow sink call
    tokio::time::sleep(Duration::from_millis(1)).await;

    let started = tokio::time::Instant::now();
    let report = pipeline.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(report.counts, ShipperStats::default());
    assert!(memory.contains("count shipper did not stop before the shutdown timeout"));
}

#[test(tokio::test(start_paused = true))]
async fn runtime_sampler_reports_through_the_pipeline() {
    let sink = Arc::new(RecordingSink::new());
    let (router, _memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_prefix("[svc]")
        .with_runtime_interval(Duration::from_secs(120))
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    tokio::time::sleep(Duration::from_secs(121)).await;
    sink.wait_for(5).await;
    pipeline.shutdown().await;

    let mut names: Vec<String> = sink
        .calls()
        .into_iter()
        .map(|call| call.name().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "[svc] [runtime] alloc",
            "[svc] [runtime] gcpausetime",
            "[svc] [runtime] goroutines",
            "[svc] [runtime] heapalloc",
            "[svc] [runtime] heapobj",
        ]
    );
}

#[test(tokio::test(start_paused = true))]
async fn sub_second_runtime_interval_is_honoured() {
    let sink = Arc::new(RecordingSink::new());
    let (router, memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_runtime_interval(Duration::from_millis(500))
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    sink.wait_for(10).await;
    pipeline.shutdown().await;

    assert_eq!(sink.len(), 10);
    assert!(!memory.contains("zero interval"));
}

#[test(tokio::test(start_paused = true))]
async fn dropping_the_pipeline_stops_its_tasks() {
    let sink = Arc::new(RecordingSink::new());
    let (router, memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_runtime_interval(Duration::from_secs(60))
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");
    let token = pipeline.cancellation_token();
    let client = pipeline.client().clone();

    drop(pipeline);
    assert!(token.is_cancelled());

    tokio::time::sleep(Duration::from_secs(601)).await;
    assert!(sink.is_empty(), "nothing shipped after drop: {:?}", sink.calls());

    // the shippers closed their queues on the way out
    client.count("late", 1);
    assert!(memory.called_with("[WARNING] dropped count for late"));
}

#[test(tokio::test)]
async fn unbounded_shutdown_timeout_still_joins() {
    let sink = Arc::new(RecordingSink::new());
    let (router, _memory) = router_with_memory(Level::Warning);

    let pipeline = Pipeline::builder()
        .with_api_key("k")
        .with_shutdown_timeout(Duration::MAX)
        .spawn_with_env(sink.clone(), router, |_| None)
        .expect("pipeline should start");

    pipeline.client().count("users", 1);
    let report = pipeline.shutdown().await;
    assert_eq!(report.counts.shipped, 1);
}
