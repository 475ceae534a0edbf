//! Scalers decide, once per control-loop tick, how many workers a stage
//! should add or remove.

use std::time::Duration;

/// Produces a worker delta given the stage's current worker count and
/// input queue depth. A positive return value means "add this many
/// workers", negative means "remove this many", zero means "no change".
///
/// Like [`LoadBalancer`](crate::balance::LoadBalancer), a `Scaler` carries
/// its own state and must support an independent copy via `clone_box` so a
/// stage template reused at two positions in a graph does not share scaling
/// history between the two.
pub trait Scaler: Send {
    fn scale(&mut self, workers: usize, queue_depth: usize) -> i64;

    /// How long the control loop should sleep between ticks while this
    /// scaler is in charge.
    fn sleep_interval(&self) -> Duration;

    fn clone_box(&self) -> Box<dyn Scaler>;
}

impl Clone for Box<dyn Scaler> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Drives the worker count to a fixed target exactly once, then holds it.
#[derive(Debug, Clone, Copy)]
pub struct Static {
    target: usize,
    applied: bool,
}

impl Static {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            applied: false,
        }
    }
}

impl Scaler for Static {
    fn scale(&mut self, workers: usize, _queue_depth: usize) -> i64 {
        if self.applied {
            return 0;
        }
        self.applied = true;
        self.target as i64 - workers as i64
    }

    fn sleep_interval(&self) -> Duration {
        Duration::from_secs(5)
    }

    fn clone_box(&self) -> Box<dyn Scaler> {
        Box::new(*self)
    }
}

/// Scales toward `setpoint` queue depth using a bounded hyperbolic-tangent
/// step: `round(max_step * tanh((depth - setpoint) / k))`, clamped to
/// `[-max_step, max_step]`. Once any item has ever been observed on the
/// queue, the scaler never lets the worker count drop below one, so a
/// producer that stalls doesn't orphan a stage mid-backlog.
#[derive(Debug, Clone, Copy)]
pub struct Tanh {
    max_step: i64,
    k: f64,
    setpoint: f64,
    has_seen_item: bool,
}

impl Tanh {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for Tanh {
    fn default() -> Self {
        Self {
            max_step: 5,
            k: 50.0,
            setpoint: 0.0,
            has_seen_item: false,
        }
    }
}

impl Scaler for Tanh {
    fn scale(&mut self, workers: usize, queue_depth: usize) -> i64 {
        if queue_depth > 0 {
            self.has_seen_item = true;
        }
        let raw = self.max_step as f64 * ((queue_depth as f64 - self.setpoint) / self.k).tanh();
        let mut delta = raw.round() as i64;
        delta = delta.clamp(-self.max_step, self.max_step);
        if self.has_seen_item && workers as i64 + delta < 1 {
            delta = 1 - workers as i64;
        }
        delta
    }

    fn sleep_interval(&self) -> Duration {
        Duration::from_millis(750)
    }

    fn clone_box(&self) -> Box<dyn Scaler> {
        Box::new(*self)
    }
}
