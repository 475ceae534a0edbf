//! Compares round-robin against congestion-aware balancing side by side:
//! `route_a` (round-robin) and `route_b` (congestion) both feed the same
//! pair of downstream workers, and `receive` tracks the throughput each
//! router achieves independently.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Congestion, Pipeline, RoundRobin, RunReport, RuntimeConfig, StageError, StageTemplate};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Router {
    RoundRobin,
    Congestion,
}

#[derive(Clone)]
enum Event {
    Tick(Router),
    Processed { router: Router },
}

#[derive(Default)]
struct RouterTally {
    processed: AtomicUsize,
}

pub async fn run(config: RuntimeConfig) -> RunReport {
    let rr_tally = Arc::new(RouterTally::default());
    let cg_tally = Arc::new(RouterTally::default());
    let rr_tally_for_recv = rr_tally.clone();
    let cg_tally_for_recv = cg_tally.clone();

    let every_second =
        StageTemplate::producer_fn("every_second", Duration::from_millis(10), || async {
            Some(Event::Tick(Router::RoundRobin))
        });

    let route_a = StageTemplate::transform_fn("route_a", |event: Event| async move {
        match event {
            Event::Tick(_) => Ok(vec![Event::Tick(Router::RoundRobin)]),
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .balancer(RoundRobin::default());

    let route_b = StageTemplate::transform_fn("route_b", |event: Event| async move {
        match event {
            Event::Tick(_) => Ok(vec![Event::Tick(Router::Congestion)]),
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .balancer(Congestion);

    let task1 = StageTemplate::transform_fn("task1", |event: Event| async move {
        match event {
            Event::Tick(router) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(vec![Event::Processed { router }])
            }
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .scale(1);

    let task2 = StageTemplate::transform_fn("task2", |event: Event| async move {
        match event {
            Event::Tick(router) => {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(vec![Event::Processed { router }])
            }
            Event::Processed { .. } => Ok(Vec::new()),
        }
    })
    .scale(50);

    let receive = StageTemplate::transform_fn("receive", move |event: Event| {
        let rr_tally = rr_tally_for_recv.clone();
        let cg_tally = cg_tally_for_recv.clone();
        async move {
            let Event::Processed { router } = event else {
                return Ok::<_, StageError>(Vec::new());
            };
            let tally = match router {
                Router::RoundRobin => &rr_tally,
                Router::Congestion => &cg_tally,
            };
            let n = tally.processed.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 20 == 0 {
                let rr = rr_tally.processed.load(Ordering::SeqCst);
                let cg = cg_tally.processed.load(Ordering::SeqCst);
                println!("RoundRobin processed={rr} | Congestion processed={cg}");
            }
            Ok(Vec::new())
        }
    });

    let pipeline = Pipeline::new(vec![every_second])
        .map(vec![route_a, route_b])
        .expect("graph construction failed")
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
