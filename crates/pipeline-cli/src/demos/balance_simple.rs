//! One producer round-robins its output between a single-worker transform
//! and a fifty-worker transform, showing how round-robin balancing builds
//! up a backlog on the slower one regardless of downstream capacity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Pipeline, RoundRobin, RunReport, RuntimeConfig, StageError, StageTemplate};

#[derive(Clone)]
enum Event {
    Tick(Duration),
    Processed { slow: bool },
}

pub async fn run(config: RuntimeConfig) -> RunReport {
    let slow_count = Arc::new(AtomicUsize::new(0));
    let fast_count = Arc::new(AtomicUsize::new(0));
    let slow_count_for_recv = slow_count.clone();
    let fast_count_for_recv = fast_count.clone();

    let hundred_per_second =
        StageTemplate::producer_fn("hundred_per_second", Duration::from_millis(10), || async {
            Some(Event::Tick(Duration::from_millis(5)))
        })
        .balancer(RoundRobin::default());

    let task1 = StageTemplate::transform_fn("task1", |event: Event| async move {
        match event {
            Event::Tick(sleep) => {
                tokio::time::sleep(sleep * 5).await;
                Ok(vec![Event::Processed { slow: true }])
            }
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .scale(1);

    let task2 = StageTemplate::transform_fn("task2", |event: Event| async move {
        match event {
            Event::Tick(sleep) => {
                tokio::time::sleep(sleep * 5).await;
                Ok(vec![Event::Processed { slow: false }])
            }
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .scale(50);

    let receive = StageTemplate::transform_fn("receive", move |event: Event| {
        let slow_count = slow_count_for_recv.clone();
        let fast_count = fast_count_for_recv.clone();
        async move {
            let Event::Processed { slow } = event else {
                return Ok::<_, StageError>(Vec::new());
            };
            let (s, f) = if slow {
                (
                    slow_count.fetch_add(1, Ordering::SeqCst) + 1,
                    fast_count.load(Ordering::SeqCst),
                )
            } else {
                (
                    slow_count.load(Ordering::SeqCst),
                    fast_count.fetch_add(1, Ordering::SeqCst) + 1,
                )
            };
            if (s + f) % 20 == 0 {
                println!("task1={s}, task2={f}");
            }
            Ok(Vec::new())
        }
    });

    let pipeline = Pipeline::new(vec![hundred_per_second])
        .map(vec![task1, task2])
        .expect("graph construction failed")
        .reduce(vec![receive])
        .expect("graph construction failed");
    let kill = pipeline.kill_switch();

    let handle = tokio::spawn(pipeline.run_with_config(config));
    tokio::time::sleep(Duration::from_secs(5)).await;
    kill.cancel();
    handle.await.expect("supervisor task panicked")
}
