//! The Supervisor: turns a built `Pipeline<T>` into a running set of stage
//! control loops, installs `Ctrl+C` handling, and coordinates shutdown.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::RuntimeConfig;
use crate::graph::Pipeline;
use crate::queue::bounded;
use crate::stage::{DownstreamLink, StageHandle, StageId, StageRuntime};
use crate::visualizer;

/// What happened when a pipeline finished running.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    /// `true` if every stage's control loop exited on its own within the
    /// soft shutdown budget; `false` if any had to be hard-cancelled.
    pub graceful: bool,
    /// Names of stages that needed the hard-cancel path.
    pub stages_timed_out: Vec<String>,
}

impl RunReport {
    /// Exit code a CLI wrapping this crate should use: `0` for a graceful
    /// stop, `1` if anything had to be force-cancelled.
    pub fn exit_code(&self) -> i32 {
        if self.graceful {
            0
        } else {
            1
        }
    }
}

/// Coordinates running a single `Pipeline<T>` to completion.
pub struct Supervisor {
    id: Uuid,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl Supervisor {
    pub fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Materializes every `StageTemplate` in `pipeline` into a `StageRuntime`
    /// with a resolved input queue (sized from `config.default_queue_capacity`)
    /// and downstream edges, spawns each one's control loop, optionally spawns
    /// the visualizer, and hands back a read-only handle per stage plus a
    /// join handle for the background task that waits for `Ctrl+C` (or the
    /// pipeline's own kill token) and drives shutdown.
    ///
    /// Most callers want [`run`](Self::run)/[`run_with_config`](Self::run_with_config)
    /// instead; `spawn` exists for callers that need to observe live stage
    /// state (worker counts, queue depths) while the pipeline is running.
    pub async fn spawn<T>(
        self,
        pipeline: Pipeline<T>,
        config: RuntimeConfig,
    ) -> (Vec<StageHandle<T>>, JoinHandle<RunReport>)
    where
        T: Clone + Send + Sync + 'static,
    {
        let config = config.validated().unwrap_or_default();
        let run_id = self.id;
        tracing::info!(run_id = %run_id, stages = pipeline.tasks.len(), "pipeline starting");

        let kill = pipeline.kill.clone();
        let n = pipeline.tasks.len();

        // Create one input queue per stage up front so edges can be
        // resolved regardless of declaration order.
        let mut senders = Vec::with_capacity(n);
        let mut receivers = Vec::with_capacity(n);
        for _ in 0..n {
            let (tx, rx) = bounded(config.default_queue_capacity);
            senders.push(tx);
            receivers.push(rx);
        }

        let mut runtimes = Vec::with_capacity(n);
        let mut handles: Vec<StageHandle<T>> = Vec::with_capacity(n);
        for (index, template) in pipeline.tasks.iter().enumerate() {
            let downstream: Vec<DownstreamLink<T>> = template
                .output
                .iter()
                .map(|&target| {
                    DownstreamLink::new(
                        StageId(target),
                        pipeline.tasks[target].name.clone(),
                        senders[target].clone(),
                    )
                })
                .collect();
            let runtime = StageRuntime::new(
                template.name.clone(),
                template,
                senders[index].clone(),
                receivers[index].clone(),
                downstream,
                kill.clone(),
            );
            handles.push(runtime.handle());
            runtimes.push(runtime);
        }
        drop(receivers); // each stage now holds its own receiver via StageRuntime

        let mut control_handles = Vec::with_capacity(n);
        for runtime in runtimes {
            control_handles.push(tokio::spawn(runtime.run_control_loop()));
        }

        let visualizer_handle = if config.with_visualizer {
            let handles = handles.clone();
            let kill = kill.clone();
            Some(tokio::spawn(async move {
                visualizer::run(handles, kill).await;
            }))
        } else {
            None
        };

        let caller_handles = handles.clone();
        let supervise = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(run_id = %run_id, "interrupt received, shutting down");
                }
                _ = kill.cancelled() => {
                    tracing::info!(run_id = %run_id, "kill latch engaged externally");
                }
            }
            kill.cancel();

            let mut stages_timed_out = Vec::new();
            let soft = tokio::time::timeout(
                Duration::from_secs(10),
                futures::future::join_all(&mut control_handles),
            )
            .await;
            if soft.is_err() {
                tracing::warn!(run_id = %run_id, "stage control loops past soft shutdown budget");
                for (handle, name) in control_handles.iter_mut().zip(handles.iter().map(|h| h.name().to_string())) {
                    if !handle.is_finished() {
                        handle.abort();
                        stages_timed_out.push(name);
                    }
                }
                let _ = tokio::time::timeout(
                    Duration::from_secs(30),
                    futures::future::join_all(&mut control_handles),
                )
                .await;
            }

            if let Some(handle) = visualizer_handle {
                handle.abort();
            }

            let graceful = stages_timed_out.is_empty();
            tracing::info!(run_id = %run_id, graceful, "pipeline stopped");
            RunReport {
                graceful,
                stages_timed_out,
            }
        });

        (caller_handles, supervise)
    }

    /// Runs `pipeline` to completion using `config`'s queue capacity and
    /// visualizer toggle.
    pub async fn run_with_config<T>(self, pipeline: Pipeline<T>, config: RuntimeConfig) -> RunReport
    where
        T: Clone + Send + Sync + 'static,
    {
        let (_, supervise) = self.spawn(pipeline, config).await;
        supervise.await.expect("supervisor task panicked")
    }

    /// Materializes every `StageTemplate` in `pipeline` into a `StageRuntime`,
    /// spawns each one's control loop, optionally spawns the visualizer, then
    /// waits for `Ctrl+C` (or the pipeline's own kill token) before engaging
    /// shutdown. Uses the default queue capacity; see
    /// [`run_with_config`](Self::run_with_config) to override it.
    pub async fn run<T>(self, pipeline: Pipeline<T>, with_visualizer: bool) -> RunReport
    where
        T: Clone + Send + Sync + 'static,
    {
        self.run_with_config(
            pipeline,
            RuntimeConfig {
                with_visualizer,
                ..RuntimeConfig::default()
            },
        )
        .await
    }
}

/// Convenience entry points so callers can do `pipeline.run(...)` directly.
impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    pub async fn run(self, with_visualizer: bool) -> RunReport {
        Supervisor::new().run(self, with_visualizer).await
    }

    pub async fn run_with_config(self, config: RuntimeConfig) -> RunReport {
        Supervisor::new().run_with_config(self, config).await
    }

    /// Starts the pipeline in the background and returns a read-only handle
    /// per stage alongside a join handle for the eventual `RunReport`,
    /// instead of blocking until shutdown like `run`.
    pub async fn spawn(self, config: RuntimeConfig) -> (Vec<StageHandle<T>>, JoinHandle<RunReport>) {
        Supervisor::new().spawn(self, config).await
    }

    /// Exposes this pipeline's kill latch so callers can trigger shutdown
    /// programmatically instead of through `Ctrl+C` (used by tests).
    pub fn kill_switch(&self) -> CancellationToken {
        self.kill.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageTemplate;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    #[tokio::test(flavor = "multi_thread")]
    async fn run_stops_gracefully_on_kill_switch() {
        let produced = Arc::new(AtomicUsize::new(0));
        let produced2 = produced.clone();
        let producer = StageTemplate::producer_fn("ticker", StdDuration::from_millis(5), move || {
            let produced = produced2.clone();
            async move {
                produced.fetch_add(1, Ordering::SeqCst);
                Some(1i32)
            }
        });
        let pipeline = Pipeline::new(vec![producer]);
        let kill = pipeline.kill_switch();
        let handle = tokio::spawn(pipeline.run(false));
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        kill.cancel();
        let report = handle.await.unwrap();
        assert!(report.graceful);
        assert!(produced.load(Ordering::SeqCst) > 0);
    }
}
