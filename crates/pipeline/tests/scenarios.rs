//! End-to-end graph scenarios: fan-out distribution, congestion-aware
//! routing, graceful shutdown, and worker survival past a user-logic error.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Congestion, Pipeline, RoundRobin, RuntimeConfig, StageError, StageTemplate, Tanh};

#[tokio::test(flavor = "multi_thread")]
async fn round_robin_fans_out_evenly() {
    let a_count = Arc::new(AtomicUsize::new(0));
    let b_count = Arc::new(AtomicUsize::new(0));
    let a_for_task = a_count.clone();
    let b_for_task = b_count.clone();

    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(2), || async {
        Some(1i32)
    })
    .balancer(RoundRobin::default());

    let a = StageTemplate::transform_fn("a", move |item: i32| {
        let a_count = a_for_task.clone();
        async move {
            a_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item])
        }
    });
    let b = StageTemplate::transform_fn("b", move |item: i32| {
        let b_count = b_for_task.clone();
        async move {
            b_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item])
        }
    });

    let pipeline = Pipeline::new(vec![producer]).map(vec![a, b]).unwrap();
    let kill = pipeline.kill_switch();
    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_millis(300)).await;
    kill.cancel();
    let report = handle.await.unwrap();

    assert!(report.graceful);
    let a_final = a_count.load(Ordering::SeqCst);
    let b_final = b_count.load(Ordering::SeqCst);
    let total = a_final + b_final;
    assert!(total > 0, "no items were processed");
    let skew = (a_final as f64 - b_final as f64).abs() / total as f64;
    assert!(skew < 0.3, "round robin distribution too skewed: {a_final} vs {b_final}");
}

#[tokio::test(flavor = "multi_thread")]
async fn congestion_prefers_the_faster_downstream() {
    let slow_count = Arc::new(AtomicUsize::new(0));
    let fast_count = Arc::new(AtomicUsize::new(0));
    let slow_for_task = slow_count.clone();
    let fast_for_task = fast_count.clone();

    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(1), || async {
        Some(1i32)
    })
    .balancer(Congestion);

    let slow = StageTemplate::transform_fn("slow", move |item: i32| {
        let slow_count = slow_for_task.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            slow_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item])
        }
    })
    .scale(1);
    let fast = StageTemplate::transform_fn("fast", move |item: i32| {
        let fast_count = fast_for_task.clone();
        async move {
            fast_count.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item])
        }
    })
    .scale(20);

    let pipeline = Pipeline::new(vec![producer]).map(vec![slow, fast]).unwrap();
    let kill = pipeline.kill_switch();
    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_millis(500)).await;
    kill.cancel();
    let report = handle.await.unwrap();

    assert!(report.graceful);
    let slow_final = slow_count.load(Ordering::SeqCst);
    let fast_final = fast_count.load(Ordering::SeqCst);
    let total = slow_final + fast_final;
    assert!(total > 0);
    assert!(
        fast_final as f64 / total as f64 >= 0.8,
        "congestion balancer did not favor the faster downstream: slow={slow_final} fast={fast_final}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_drains_in_flight_work_without_panicking() {
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_for_sink = processed.clone();

    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(2), || async {
        Some(1i32)
    });
    let sink = StageTemplate::transform_fn("sink", move |item: i32| {
        let processed = processed_for_sink.clone();
        async move {
            processed.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    });

    let pipeline = Pipeline::new(vec![producer]).map(vec![sink]).unwrap();
    let kill = pipeline.kill_switch();
    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_millis(100)).await;
    kill.cancel();
    let report = handle.await.unwrap();

    assert!(report.graceful);
    assert!(report.stages_timed_out.is_empty());
    assert!(processed.load(Ordering::SeqCst) > 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stage_survives_intermittent_user_logic_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let processed = Arc::new(AtomicUsize::new(0));
    let calls_for_task = calls.clone();
    let processed_for_task = processed.clone();

    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(2), || async {
        Some(1i32)
    });
    let flaky = StageTemplate::transform_fn("flaky", move |item: i32| {
        let calls = calls_for_task.clone();
        let processed = processed_for_task.clone();
        async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 7 == 0 {
                return Err(StageError::UserLogic {
                    stage: "flaky".into(),
                    source: anyhow::anyhow!("synthetic failure on call {n}"),
                });
            }
            processed.fetch_add(1, Ordering::SeqCst);
            Ok(vec![item])
        }
    });

    let pipeline = Pipeline::new(vec![producer]).map(vec![flaky]).unwrap();
    let kill = pipeline.kill_switch();
    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_millis(200)).await;
    kill.cancel();
    let report = handle.await.unwrap();

    assert!(report.graceful);
    assert!(calls.load(Ordering::SeqCst) > 7, "not enough calls to exercise the failing path");
    assert!(processed.load(Ordering::SeqCst) > 0, "pipeline stopped processing after an error");
}

#[tokio::test(flavor = "multi_thread")]
async fn autoscaling_catches_up_with_a_growing_backlog() {
    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(10), || async {
        Some(1u64)
    });
    let bottleneck = StageTemplate::transform_fn("bottleneck", |item: u64| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(vec![item])
    })
    .scaler(Tanh::default());

    let pipeline = Pipeline::new(vec![producer]).map(vec![bottleneck]).unwrap();
    let kill = pipeline.kill_switch();
    let (handles, join) = pipeline.spawn(RuntimeConfig::default()).await;
    let bottleneck_handle = handles.into_iter().find(|h| h.name() == "bottleneck").unwrap();

    let mut depth_samples = Vec::new();
    for _ in 0..8 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        depth_samples.push(bottleneck_handle.queue_depth());
    }
    let workers_after_catchup = bottleneck_handle.worker_count();
    kill.cancel();
    let report = join.await.unwrap();

    assert!(report.graceful);
    assert!(
        workers_after_catchup >= 5,
        "autoscaler did not grow the worker pool to keep up: only {workers_after_catchup} workers after 8s"
    );
    let last_two = &depth_samples[depth_samples.len() - 2..];
    assert!(
        last_two[1] <= last_two[0] + 20,
        "queue depth kept growing even after the worker pool caught up: {depth_samples:?}"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn static_scaler_holds_worker_count_steady() {
    let producer = StageTemplate::producer_fn("producer", Duration::from_millis(10), || async {
        Some(1u64)
    });
    let fixed = StageTemplate::transform_fn("fixed", |item: u64| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(vec![item])
    })
    .scale(10);

    let pipeline = Pipeline::new(vec![producer]).map(vec![fixed]).unwrap();
    let kill = pipeline.kill_switch();
    let (handles, join) = pipeline.spawn(RuntimeConfig::default()).await;
    let fixed_handle = handles.into_iter().find(|h| h.name() == "fixed").unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    for _ in 0..4 {
        assert_eq!(
            fixed_handle.worker_count(),
            10,
            "Static scaler must hold the worker pool exactly at its target"
        );
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    kill.cancel();
    let report = join.await.unwrap();
    assert!(report.graceful);
}
