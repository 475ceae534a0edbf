//! One producer feeding two workers through a congestion-aware balancer,
//! reduced into a single stage that reports which worker handled what.

use std::time::Duration;

use pipeline::{Congestion, Pipeline, StageTemplate};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let hundred_per_second = StageTemplate::producer_fn(
        "hundred_per_second",
        Duration::from_millis(10),
        || async { Some(1u64) },
    )
    .balancer(Congestion);

    let slow_worker = StageTemplate::transform_fn("slow_worker", |item: u64| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(vec![item])
    })
    .scale(1);

    let fast_worker = StageTemplate::transform_fn("fast_worker", |item: u64| async move {
        Ok(vec![item])
    })
    .scale(4);

    let receive = StageTemplate::transform_fn("receive", |item: u64| async move {
        println!("received {item}");
        Ok(Vec::new())
    });

    let pipeline = Pipeline::new(vec![hundred_per_second])
        .map(vec![slow_worker, fast_worker])
        .expect("graph construction failed")
        .reduce(vec![receive])
        .expect("graph construction failed");
    let kill = pipeline.kill_switch();

    let handle = tokio::spawn(pipeline.run(false));
    tokio::time::sleep(Duration::from_secs(2)).await;
    kill.cancel();
    let report = handle.await.expect("supervisor task panicked");
    println!("graceful shutdown: {}", report.graceful);
}
