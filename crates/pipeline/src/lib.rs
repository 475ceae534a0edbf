//! An in-process asynchronous dataflow pipeline runtime.
//!
//! A [`Pipeline`](graph::Pipeline) is built from [`StageTemplate`](stage::StageTemplate)s
//! wired together with `map`/`reduce`/`merge`, then handed to
//! [`Supervisor::run`](runtime::Supervisor::run) to execute. Each stage
//! scales its own worker pool independently via a [`Scaler`](scale::Scaler)
//! and dispatches emitted items to its downstream neighbors via a
//! [`LoadBalancer`](balance::LoadBalancer).

pub mod balance;
pub mod config;
pub mod error;
pub mod graph;
pub mod queue;
pub mod runtime;
pub mod scale;
pub mod signal;
pub mod stage;
pub mod visualizer;

pub use balance::{Broadcast, Congestion, LoadBalancer, Random, RoundRobin};
pub use config::RuntimeConfig;
pub use error::{PipelineError, PipelineResult, StageError};
pub use graph::Pipeline;
pub use queue::{QueueReceiver, QueueSender, DEFAULT_QUEUE_CAPACITY};
pub use runtime::{RunReport, Supervisor};
pub use scale::{Scaler, Static, Tanh};
pub use signal::Signal;
pub use stage::{
    DownstreamLink, ProducerFn, RouteKey, StageFn, StageHandle, StageId, StageState, StageTemplate,
};
