//! Two transforms racing on the same workload: `tortoise` starts with one
//! worker and scales up via the Tanh scaler, `hare` is pinned to 30 workers
//! from the start. `score` tallies which one is processing more.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pipeline::{Pipeline, RunReport, RuntimeConfig, StageError, StageTemplate, Tanh};

#[derive(Clone)]
enum RaceEvent {
    Tick(Duration),
    Finished { tortoise: bool },
}

pub async fn run(config: RuntimeConfig) -> RunReport {
    let tortoise_pos = Arc::new(AtomicUsize::new(0));
    let hare_pos = Arc::new(AtomicUsize::new(0));
    let tortoise_pos_for_score = tortoise_pos.clone();
    let hare_pos_for_score = hare_pos.clone();

    let hundred_per_second =
        StageTemplate::producer_fn("hundred_per_second", Duration::from_millis(10), || async {
            Some(RaceEvent::Tick(Duration::from_millis(100)))
        });

    let tortoise = StageTemplate::transform_fn("tortoise", |event: RaceEvent| async move {
        match event {
            RaceEvent::Tick(sleep) => {
                tokio::time::sleep(sleep).await;
                Ok(vec![RaceEvent::Finished { tortoise: true }])
            }
            RaceEvent::Finished { .. } => Ok(Vec::new()),
        }
    })
    .scaler(Tanh::default());

    let hare = StageTemplate::transform_fn("hare", |event: RaceEvent| async move {
        match event {
            RaceEvent::Tick(sleep) => {
                tokio::time::sleep(sleep).await;
                Ok(vec![RaceEvent::Finished { tortoise: false }])
            }
            RaceEvent::Finished { .. } => Ok(Vec::new()),
        }
    })
    .scale(30);

    let score = StageTemplate::transform_fn("score", move |event: RaceEvent| {
        let tortoise_pos = tortoise_pos_for_score.clone();
        let hare_pos = hare_pos_for_score.clone();
        async move {
            let RaceEvent::Finished { tortoise } = event else {
                return Ok::<_, StageError>(Vec::new());
            };
            let (t, h) = if tortoise {
                (
                    tortoise_pos.fetch_add(1, Ordering::SeqCst) + 1,
                    hare_pos.load(Ordering::SeqCst),
                )
            } else {
                (
                    tortoise_pos.load(Ordering::SeqCst),
                    hare_pos.fetch_add(1, Ordering::SeqCst) + 1,
                )
            };
            if (t + h) % 20 == 0 {
                println!("tortoise={t}, hare={h}");
            }
            Ok(Vec::new())
        }
    });

    let pipeline = Pipeline::new(vec![hundred_per_second])
        .map(vec![tortoise, hare])
        .expect("graph construction failed")
        .reduce(vec![score])
        .expect("graph construction failed");
    let kill = pipeline.kill_switch();

    let handle = tokio::spawn(pipeline.run_with_config(config));
    tokio::time::sleep(Duration::from_secs(5)).await;
    kill.cancel();
    handle.await.expect("supervisor task panicked")
}
