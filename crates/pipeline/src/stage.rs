//! Stages: the unit of work in a pipeline.
//!
//! A `StageTemplate` is the declaration a user builds with `producer`/
//! `transform` plus the builder methods (`scale`, `scaler`, `balancer`,
//! `routes`); a `Pipeline` arranges templates into a graph; the runtime
//! turns each template into a live `StageRuntime` with its own input queue
//! and worker pool before handing a read-only `StageHandle` to callers that
//! only need to observe it (the visualizer, tests, logging).

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::balance::LoadBalancer;
use crate::error::{PipelineError, StageError};
use crate::graph::Pipeline;
use crate::queue::{QueueReceiver, QueueSender};
use crate::scale::{Scaler, Tanh};
use crate::signal::Signal;

/// A stage's position in its owning `Pipeline`'s stage table. Stages never
/// hold a strong reference to their downstream neighbors directly; they
/// address them by `StageId`, so the graph has no reference cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageId(pub usize);

/// An opaque tag used for route-based dispatch (see [`StageTemplate::routes`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteKey(pub String);

impl RouteKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

/// The lifecycle state of a stage's control loop, exposed read-only for
/// introspection and the visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Running,
    Draining,
    Halted,
}

fn encode_state(s: StageState) -> u8 {
    match s {
        StageState::Running => 0,
        StageState::Draining => 1,
        StageState::Halted => 2,
    }
}

fn decode_state(v: u8) -> StageState {
    match v {
        0 => StageState::Running,
        1 => StageState::Draining,
        _ => StageState::Halted,
    }
}

/// A resolved edge to a downstream stage: a name for logging, and the
/// sending half of that stage's input queue.
pub struct DownstreamLink<T> {
    id: StageId,
    name: Arc<str>,
    queue_tx: QueueSender<T>,
}

impl<T> Clone for DownstreamLink<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            queue_tx: self.queue_tx.clone(),
        }
    }
}

impl<T> DownstreamLink<T> {
    pub fn new(id: StageId, name: Arc<str>, queue_tx: QueueSender<T>) -> Self {
        Self { id, name, queue_tx }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Best-effort input queue depth of this downstream neighbor, used by
    /// congestion-aware load balancers.
    pub fn queue_depth(&self) -> usize {
        self.queue_tx.size()
    }

    pub(crate) fn sender(&self) -> &QueueSender<T> {
        &self.queue_tx
    }
}

/// Per-item transform/sink logic. A fresh instance is created for every
/// worker a stage spawns (see [`TransformFactory`]), so workers never share
/// mutable state unless the user explicitly puts it behind an `Arc`.
#[async_trait]
pub trait StageFn<T>: Send {
    async fn call(&mut self, item: T) -> Result<Vec<T>, StageError>;
}

/// Timer-driven producer logic, invoked once per `interval` tick with no
/// input. Returning `None` simply skips that tick's emission.
#[async_trait]
pub trait ProducerFn<T>: Send {
    async fn produce(&mut self) -> Option<T>;
}

struct FnTransform<F> {
    f: F,
}

#[async_trait]
impl<T, F, Fut> StageFn<T> for FnTransform<F>
where
    T: Send + 'static,
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = Result<Vec<T>, StageError>> + Send,
{
    async fn call(&mut self, item: T) -> Result<Vec<T>, StageError> {
        (self.f)(item).await
    }
}

struct FnProducer<F> {
    f: F,
}

#[async_trait]
impl<T, F, Fut> ProducerFn<T> for FnProducer<F>
where
    T: Send + 'static,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Option<T>> + Send,
{
    async fn produce(&mut self) -> Option<T> {
        (self.f)().await
    }
}

pub type TransformFactory<T> = Arc<dyn Fn() -> Box<dyn StageFn<T>> + Send + Sync>;
pub type ProducerFactory<T> = Arc<dyn Fn() -> Box<dyn ProducerFn<T>> + Send + Sync>;

enum StageRole<T> {
    Producer {
        interval: Duration,
        factory: ProducerFactory<T>,
    },
    Transform {
        factory: TransformFactory<T>,
    },
}

impl<T> StageRole<T> {
    fn clone_role(&self) -> Self {
        match self {
            StageRole::Producer { interval, factory } => StageRole::Producer {
                interval: *interval,
                factory: factory.clone(),
            },
            StageRole::Transform { factory } => StageRole::Transform {
                factory: factory.clone(),
            },
        }
    }

    fn spawn_logic(&self) -> WorkerLogic<T> {
        match self {
            StageRole::Producer { interval, factory } => WorkerLogic::Producer {
                interval: *interval,
                logic: factory(),
            },
            StageRole::Transform { factory } => WorkerLogic::Transform { logic: factory() },
        }
    }
}

enum WorkerLogic<T> {
    Producer {
        interval: Duration,
        logic: Box<dyn ProducerFn<T>>,
    },
    Transform {
        logic: Box<dyn StageFn<T>>,
    },
}

/// A stage declaration, before it has been placed into a `Pipeline` graph.
pub struct StageTemplate<T> {
    pub(crate) name: Arc<str>,
    role: StageRole<T>,
    pub(crate) scaler: Box<dyn Scaler>,
    pub(crate) balancer: Option<Box<dyn LoadBalancer<T>>>,
    pub(crate) routes: Vec<RouteKey>,
    route_key_of: Option<Arc<dyn Fn(&T) -> Option<(RouteKey, T)> + Send + Sync>>,
    pub(crate) output: Vec<usize>,
}

impl<T: Clone + Send + Sync + 'static> StageTemplate<T> {
    /// A timer-driven producer: ignores input, invokes `factory()` once to
    /// build its per-worker logic, then calls `produce()` every `interval`.
    pub fn producer(
        name: impl Into<Arc<str>>,
        interval: Duration,
        factory: impl Fn() -> Box<dyn ProducerFn<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            role: StageRole::Producer {
                interval,
                factory: Arc::new(factory),
            },
            scaler: Box::new(Tanh::default()),
            balancer: None,
            routes: Vec::new(),
            route_key_of: None,
            output: Vec::new(),
        }
    }

    /// A transformer/sink: consumes its input queue, invoking `factory()`
    /// once per worker to build that worker's own logic instance.
    pub fn transform(
        name: impl Into<Arc<str>>,
        factory: impl Fn() -> Box<dyn StageFn<T>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            role: StageRole::Transform {
                factory: Arc::new(factory),
            },
            scaler: Box::new(Tanh::default()),
            balancer: None,
            routes: Vec::new(),
            route_key_of: None,
            output: Vec::new(),
        }
    }

    /// Convenience over [`producer`](Self::producer) for a stateless `Fn`
    /// — `f` is cloned once per worker rather than called through a
    /// factory indirection.
    pub fn producer_fn<F, Fut>(name: impl Into<Arc<str>>, interval: Duration, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Option<T>> + Send + 'static,
    {
        Self::producer(name, interval, move || {
            let f = f.clone();
            Box::new(FnProducer { f }) as Box<dyn ProducerFn<T>>
        })
    }

    /// Convenience over [`transform`](Self::transform) for a stateless `Fn`.
    pub fn transform_fn<F, Fut>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<Vec<T>, StageError>> + Send + 'static,
    {
        Self::transform(name, move || {
            let f = f.clone();
            Box::new(FnTransform { f }) as Box<dyn StageFn<T>>
        })
    }

    pub fn scale(mut self, workers: usize) -> Self {
        self.scaler = Box::new(crate::scale::Static::new(workers));
        self
    }

    pub fn scaler(mut self, scaler: impl Scaler + 'static) -> Self {
        self.scaler = Box::new(scaler);
        self
    }

    pub fn balancer(mut self, balancer: impl LoadBalancer<T> + 'static) -> Self {
        self.balancer = Some(Box::new(balancer));
        self
    }

    /// Configures route-based dispatch: when no balancer is set, `extractor`
    /// is applied to each outgoing item and, on a match against `routes`,
    /// returns both the matched key and the residual item — the payload
    /// the matched downstream neighbor actually receives, with the routing
    /// tag stripped. Unmatched or unextractable items fall back to
    /// broadcasting the original item to every downstream neighbor, rather
    /// than being silently dropped.
    pub fn routes(
        mut self,
        routes: Vec<RouteKey>,
        extractor: impl Fn(&T) -> Option<(RouteKey, T)> + Send + Sync + 'static,
    ) -> Self {
        self.routes = routes;
        self.route_key_of = Some(Arc::new(extractor));
        self
    }

    pub(crate) fn is_producer(&self) -> bool {
        matches!(self.role, StageRole::Producer { .. })
    }

    /// Convenience over [`Pipeline::map`]: wraps this template alone as the
    /// root of a new `Pipeline` and fans out to `next`.
    pub fn map(self, next: Vec<StageTemplate<T>>) -> Result<Pipeline<T>, PipelineError> {
        Pipeline::new(vec![self]).map(next)
    }

    /// Convenience over [`Pipeline::reduce`]: wraps this template alone as
    /// the root of a new `Pipeline` and fans in `next`.
    pub fn reduce(self, next: Vec<StageTemplate<T>>) -> Result<Pipeline<T>, PipelineError> {
        Pipeline::new(vec![self]).reduce(next)
    }

    pub(crate) fn copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            role: self.role.clone_role(),
            scaler: self.scaler.clone_box(),
            balancer: self.balancer.as_ref().map(|b| b.clone_box()),
            routes: self.routes.clone(),
            route_key_of: self.route_key_of.clone(),
            output: Vec::new(),
        }
    }
}

pub(crate) struct StageCore<T> {
    pub name: Arc<str>,
    pub self_tx: QueueSender<T>,
    pub input_rx: QueueReceiver<T>,
    pub downstream: Vec<DownstreamLink<T>>,
    pub routes: Vec<RouteKey>,
    pub route_key_of: Option<Arc<dyn Fn(&T) -> Option<(RouteKey, T)> + Send + Sync>>,
    pub balancer: Option<AsyncMutex<Box<dyn LoadBalancer<T>>>>,
    pub kill: CancellationToken,
}

/// A read-only view onto a running stage, safe to hold and poll from
/// another task (the visualizer, a test, a metrics exporter) without any
/// ability to mutate the stage's worker pool or routing.
#[derive(Clone)]
pub struct StageHandle<T> {
    core: Arc<StageCore<T>>,
    worker_count: Arc<AtomicUsize>,
    state: Arc<AtomicU8>,
}

impl<T> StageHandle<T> {
    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn queue_depth(&self) -> usize {
        self.core.input_rx.size()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count.load(Ordering::Relaxed)
    }

    pub fn downstream(&self) -> impl Iterator<Item = &str> {
        self.core.downstream.iter().map(|d| d.name())
    }

    pub fn state(&self) -> StageState {
        decode_state(self.state.load(Ordering::Relaxed))
    }
}

#[derive(Clone)]
struct StopLatch {
    flag: Arc<std::sync::atomic::AtomicBool>,
}

impl StopLatch {
    fn new() -> Self {
        Self {
            flag: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    fn engage(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    fn is_engaged(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A fully materialized stage: its input queue, resolved downstream edges,
/// and the control loop that owns its worker pool.
pub struct StageRuntime<T> {
    core: Arc<StageCore<T>>,
    role: StageRole<T>,
    scaler: Box<dyn Scaler>,
    workers: Vec<JoinHandle<()>>,
    worker_locks: Vec<StopLatch>,
    worker_count: Arc<AtomicUsize>,
    state: Arc<AtomicU8>,
}

impl<T: Clone + Send + Sync + 'static> StageRuntime<T> {
    pub(crate) fn new(
        name: Arc<str>,
        role_template: &StageTemplate<T>,
        self_tx: QueueSender<T>,
        input_rx: QueueReceiver<T>,
        downstream: Vec<DownstreamLink<T>>,
        kill: CancellationToken,
    ) -> Self {
        let core = Arc::new(StageCore {
            name,
            self_tx,
            input_rx,
            downstream,
            routes: role_template.routes.clone(),
            route_key_of: role_template.route_key_of.clone(),
            balancer: role_template
                .balancer
                .as_ref()
                .map(|b| AsyncMutex::new(b.clone_box())),
            kill,
        });
        Self {
            core,
            role: role_template.role.clone_role(),
            scaler: role_template.scaler.clone_box(),
            workers: Vec::new(),
            worker_locks: Vec::new(),
            worker_count: Arc::new(AtomicUsize::new(0)),
            state: Arc::new(AtomicU8::new(encode_state(StageState::Running))),
        }
    }

    pub fn handle(&self) -> StageHandle<T> {
        StageHandle {
            core: self.core.clone(),
            worker_count: self.worker_count.clone(),
            state: self.state.clone(),
        }
    }

    fn set_state(&self, s: StageState) {
        self.state.store(encode_state(s), Ordering::Relaxed);
    }

    /// The stage's scaling control loop: scales workers to follow its
    /// `Scaler`'s recommendation, then drains and stops every worker once
    /// the shared kill token is engaged.
    pub async fn run_control_loop(mut self) {
        let kill = self.core.kill.clone();
        self.set_state(StageState::Running);
        loop {
            if kill.is_cancelled() {
                break;
            }
            self.reap_finished();
            let workers_n = self.workers.len();
            let depth = self.core.input_rx.size();
            let delta = self.scaler.scale(workers_n, depth);
            if delta > 0 {
                for _ in 0..delta {
                    self.add_worker();
                }
            } else if delta < 0 {
                for _ in 0..delta.unsigned_abs() {
                    self.remove_worker().await;
                }
            }
            let sleep_for = self.scaler.sleep_interval();
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = kill.cancelled() => break,
            }
        }
        self.set_state(StageState::Draining);
        self.shutdown().await;
        self.set_state(StageState::Halted);
    }

    /// Drops workers that have already exited on their own — most commonly
    /// a transform worker that hit a `StageError::UserLogic` and returned
    /// from `worker_loop` — so the next scaling decision sees the true live
    /// worker count instead of counting dead task handles.
    fn reap_finished(&mut self) {
        let mut index = 0;
        while index < self.workers.len() {
            if self.workers[index].is_finished() {
                self.workers.remove(index);
                self.worker_locks.remove(index);
            } else {
                index += 1;
            }
        }
        self.worker_count.store(self.workers.len(), Ordering::Relaxed);
    }

    fn add_worker(&mut self) {
        let idx = self.workers.len();
        let worker_name = format!("{}-{}", self.core.name, idx);
        let latch = StopLatch::new();
        let core = self.core.clone();
        let logic = self.role.spawn_logic();
        let latch_for_task = latch.clone();
        let handle = tokio::spawn(async move {
            worker_loop(core, logic, latch_for_task, worker_name).await;
        });
        self.worker_locks.push(latch);
        self.workers.push(handle);
        self.worker_count.store(self.workers.len(), Ordering::Relaxed);
        tracing::info!(stage = %self.core.name, workers = self.workers.len(), "worker added");
    }

    /// Pops the most recently added worker, engages its stop latch, and
    /// waits up to 10s for cooperative exit before aborting the task and
    /// waiting up to a further 30s for the abort to take effect.
    async fn remove_worker(&mut self) {
        let Some(mut handle) = self.workers.pop() else {
            return;
        };
        let latch = self
            .worker_locks
            .pop()
            .expect("workers and worker_locks are kept in lockstep");
        latch.engage();
        let abort = handle.abort_handle();
        if tokio::time::timeout(Duration::from_secs(10), &mut handle)
            .await
            .is_err()
        {
            tracing::warn!(stage = %self.core.name, "worker past its soft shutdown budget, cancelling");
            abort.abort();
            if tokio::time::timeout(Duration::from_secs(30), &mut handle)
                .await
                .is_err()
            {
                tracing::error!(stage = %self.core.name, "worker did not terminate after hard cancel");
            }
        }
        self.worker_count.store(self.workers.len(), Ordering::Relaxed);
        tracing::info!(stage = %self.core.name, workers = self.workers.len(), "worker removed");
    }

    /// Enqueues one `Term` per live worker and drains the worker pool.
    async fn shutdown(&mut self) {
        let n = self.workers.len();
        for _ in 0..n {
            let _ = self.core.self_tx.put_term().await;
        }
        while !self.workers.is_empty() {
            self.remove_worker().await;
        }
    }
}

async fn worker_loop<T: Clone + Send + Sync + 'static>(
    core: Arc<StageCore<T>>,
    mut logic: WorkerLogic<T>,
    latch: StopLatch,
    worker_name: String,
) {
    match &mut logic {
        WorkerLogic::Producer { interval, logic } => loop {
            if latch.is_engaged() || core.kill.is_cancelled() {
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(*interval) => {}
                _ = core.kill.cancelled() => return,
            }
            if latch.is_engaged() || core.kill.is_cancelled() {
                return;
            }
            if let Some(item) = logic.produce().await {
                send(&core, item, &worker_name).await;
            }
        },
        WorkerLogic::Transform { logic } => loop {
            if latch.is_engaged() {
                return;
            }
            let signal = tokio::select! {
                s = core.input_rx.get() => s,
                _ = core.kill.cancelled() => return,
            };
            match signal {
                None | Some(Signal::Term) => return,
                Some(Signal::Item(item)) => {
                    if latch.is_engaged() {
                        return;
                    }
                    match logic.call(item).await {
                        Ok(outputs) => {
                            for item in outputs {
                                send(&core, item, &worker_name).await;
                            }
                        }
                        Err(error) => {
                            tracing::error!(stage = %core.name, worker = %worker_name, %error, "stage logic failed, worker exiting");
                            return;
                        }
                    }
                }
            }
        },
    }
}

/// Dispatches one emitted item to the stage's downstream neighbors. A
/// balancer, when present, always takes precedence over route-based
/// dispatch; with neither configured the item is broadcast to everyone. A
/// route match delivers the stripped residual payload only to the aligned
/// downstream neighbor; an unmatched or unextractable item still broadcasts
/// the original, untouched item to everyone.
async fn send<T: Clone + Send + 'static>(core: &Arc<StageCore<T>>, item: T, worker_name: &str) {
    if let Some(balancer) = &core.balancer {
        let targets = {
            let mut balancer = balancer.lock().await;
            balancer.balance(&core.downstream)
        };
        for index in targets {
            deliver(core, index, item.clone(), worker_name).await;
        }
        return;
    }
    if !core.routes.is_empty() {
        if let Some((index, residual)) = route_dispatch(core, &item) {
            deliver(core, index, residual, worker_name).await;
        } else {
            for index in 0..core.downstream.len() {
                deliver(core, index, item.clone(), worker_name).await;
            }
        }
        return;
    }
    for index in 0..core.downstream.len() {
        deliver(core, index, item.clone(), worker_name).await;
    }
}

async fn deliver<T: Send + 'static>(core: &Arc<StageCore<T>>, index: usize, item: T, worker_name: &str) {
    if let Some(link) = core.downstream.get(index) {
        if link.sender().put(item).await.is_err() {
            tracing::warn!(
                stage = %core.name,
                worker = %worker_name,
                downstream = link.name(),
                "downstream queue closed, dropping item"
            );
        }
    }
}

/// Resolves a route match, returning the target downstream index together
/// with the residual (tag-stripped) payload the extractor produced.
fn route_dispatch<T>(core: &StageCore<T>, item: &T) -> Option<(usize, T)> {
    let extract = core.route_key_of.as_ref()?;
    let (key, residual) = extract(item)?;
    let position = core.routes.iter().position(|route| *route == key)?;
    Some((position, residual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::bounded;
    use std::sync::atomic::AtomicI64;

    fn test_link(id: usize) -> (DownstreamLink<i32>, crate::queue::QueueReceiver<i32>) {
        let (tx, rx) = bounded(16);
        (
            DownstreamLink::new(StageId(id), format!("s{id}").into(), tx),
            rx,
        )
    }

    #[tokio::test]
    async fn broadcast_default_reaches_every_downstream() {
        let kill = CancellationToken::new();
        let (self_tx, self_rx) = bounded::<i32>(16);
        let (link_a, rx_a) = test_link(1);
        let (link_b, rx_b) = test_link(2);
        let core = Arc::new(StageCore {
            name: "src".into(),
            self_tx,
            input_rx: self_rx,
            downstream: vec![link_a, link_b],
            routes: Vec::new(),
            route_key_of: None,
            balancer: None,
            kill,
        });
        send(&core, 42, "src-0").await;
        assert_eq!(rx_a.get().await.unwrap().into_item(), Some(42));
        assert_eq!(rx_b.get().await.unwrap().into_item(), Some(42));
    }

    #[tokio::test]
    async fn route_dispatch_picks_single_downstream_and_strips_the_tag() {
        #[derive(Clone)]
        enum Tagged {
            Routed { route: RouteKey, value: i32 },
            Delivered { value: i32 },
        }

        let kill = CancellationToken::new();
        let (self_tx, self_rx) = bounded::<Tagged>(16);
        let (tx_a, rx_a) = bounded::<Tagged>(16);
        let (tx_b, rx_b) = bounded::<Tagged>(16);
        let link_a = DownstreamLink::new(StageId(1), "a".into(), tx_a);
        let link_b = DownstreamLink::new(StageId(2), "b".into(), tx_b);
        let core = Arc::new(StageCore {
            name: "src".into(),
            self_tx,
            input_rx: self_rx,
            downstream: vec![link_a, link_b],
            routes: vec![RouteKey::new("a"), RouteKey::new("b")],
            route_key_of: Some(Arc::new(|item: &Tagged| match item {
                Tagged::Routed { route, value } => {
                    Some((route.clone(), Tagged::Delivered { value: *value }))
                }
                Tagged::Delivered { .. } => None,
            })),
            balancer: None,
            kill,
        });
        send(
            &core,
            Tagged::Routed {
                route: RouteKey::new("b"),
                value: 7,
            },
            "src-0",
        )
        .await;
        assert_eq!(rx_a.size(), 0);
        let received = rx_b.get().await.unwrap().into_item().unwrap();
        match received {
            Tagged::Delivered { value } => assert_eq!(value, 7),
            Tagged::Routed { .. } => panic!("downstream must not see the routing tag"),
        }
    }

    #[tokio::test]
    async fn worker_stops_on_term() {
        let kill = CancellationToken::new();
        let (self_tx, self_rx) = bounded::<i32>(16);
        let core = Arc::new(StageCore {
            name: "t".into(),
            self_tx: self_tx.clone(),
            input_rx: self_rx,
            downstream: Vec::new(),
            routes: Vec::new(),
            route_key_of: None,
            balancer: None,
            kill,
        });
        let seen = Arc::new(AtomicI64::new(0));
        let seen2 = seen.clone();
        let logic = WorkerLogic::Transform {
            logic: Box::new(FnTransform {
                f: move |item: i32| {
                    let seen = seen2.clone();
                    async move {
                        seen.fetch_add(item as i64, Ordering::SeqCst);
                        Ok(Vec::new())
                    }
                },
            }),
        };
        let latch = StopLatch::new();
        self_tx.put(3).await.unwrap();
        self_tx.put_term().await.unwrap();
        worker_loop(core, logic, latch, "t-0".into()).await;
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
