//! A producer emitting 100 items/s into a single transform that can only
//! keep up with 10/s, demonstrating the Tanh scaler growing and shrinking
//! that transform's worker pool to match the backlog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Pipeline, RunReport, RuntimeConfig, StageTemplate, Tanh};

pub async fn run(config: RuntimeConfig) -> RunReport {
    let processed = Arc::new(AtomicUsize::new(0));
    let processed_for_sink = processed.clone();

    let hundred_per_second =
        StageTemplate::producer_fn("hundred_per_second", Duration::from_millis(10), || async {
            Some(100u64)
        });

    let bottleneck = StageTemplate::transform_fn("bottleneck", |sleep_millis: u64| async move {
        tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
        Ok(vec![sleep_millis])
    })
    .scaler(Tanh::default());

    let printer = StageTemplate::transform_fn("printer", move |_: u64| {
        let processed = processed_for_sink.clone();
        async move {
            let n = processed.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 20 == 0 {
                println!("queued items processed: {n}");
            }
            Ok(Vec::new())
        }
    });

    let pipeline = Pipeline::new(vec![hundred_per_second])
        .map(vec![bottleneck])
        .expect("graph construction failed")
        .map(vec![printer])
        .expect("graph construction failed");
    let kill = pipeline.kill_switch();

    let handle = tokio::spawn(pipeline.run_with_config(config));
    tokio::time::sleep(Duration::from_secs(5)).await;
    kill.cancel();
    handle.await.expect("supervisor task panicked")
}
