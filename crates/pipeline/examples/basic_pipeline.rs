//! A minimal three-stage pipeline: a timer producer feeding a doubling
//! transform feeding a sink that just counts what it sees.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Pipeline, StageTemplate};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let counter = Arc::new(AtomicUsize::new(0));
    let produced = counter.clone();

    let ticker = StageTemplate::producer_fn("ticker", Duration::from_millis(50), move || {
        let produced = produced.clone();
        async move {
            produced.fetch_add(1, Ordering::SeqCst);
            Some(1i32)
        }
    });

    let doubler =
        StageTemplate::transform_fn("doubler", |item: i32| async move { Ok(vec![item * 2]) });

    let sink = StageTemplate::transform_fn("sink", |item: i32| async move {
        println!("sink received {item}");
        Ok(Vec::new())
    });

    let pipeline = ticker
        .map(vec![doubler])
        .expect("graph construction failed")
        .map(vec![sink])
        .expect("graph construction failed");
    let kill = pipeline.kill_switch();

    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_millis(500)).await;
    kill.cancel();
    let report = handle.await.expect("supervisor task panicked");

    println!("graceful shutdown: {}", report.graceful);
    println!("items produced: {}", counter.load(Ordering::SeqCst));
}
