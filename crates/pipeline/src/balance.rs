//! Load balancers decide, for a single emitted item, which of a stage's
//! downstream neighbors should receive it.

use crate::stage::DownstreamLink;

/// Chooses a subset (possibly empty, possibly more than one) of a stage's
/// downstream neighbors to deliver an item to. Implementations hold their
/// own routing state (a counter, an RNG) and must be able to produce an
/// independent copy of that state via [`clone_box`](LoadBalancer::clone_box)
/// so that copying a stage template for reuse elsewhere in the graph does
/// not share mutable state between the two instances.
pub trait LoadBalancer<T>: Send {
    /// Returns the indices into `downstream` that should receive the item.
    /// An empty `downstream` slice always yields an empty result.
    fn balance(&mut self, downstream: &[DownstreamLink<T>]) -> Vec<usize>;

    fn clone_box(&self) -> Box<dyn LoadBalancer<T>>;
}

impl<T> Clone for Box<dyn LoadBalancer<T>> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Delivers every item to every downstream neighbor. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct Broadcast;

impl<T: Send + 'static> LoadBalancer<T> for Broadcast {
    fn balance(&mut self, downstream: &[DownstreamLink<T>]) -> Vec<usize> {
        (0..downstream.len()).collect()
    }

    fn clone_box(&self) -> Box<dyn LoadBalancer<T>> {
        Box::new(*self)
    }
}

/// Cycles through downstream neighbors in order, one item at a time.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin {
    counter: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Send + 'static> LoadBalancer<T> for RoundRobin {
    fn balance(&mut self, downstream: &[DownstreamLink<T>]) -> Vec<usize> {
        if downstream.is_empty() {
            return Vec::new();
        }
        let index = self.counter % downstream.len();
        self.counter = self.counter.wrapping_add(1);
        vec![index]
    }

    fn clone_box(&self) -> Box<dyn LoadBalancer<T>> {
        Box::new(*self)
    }
}

/// Picks a uniformly random downstream neighbor for each item.
#[derive(Debug, Default, Clone, Copy)]
pub struct Random;

impl<T: Send + 'static> LoadBalancer<T> for Random {
    fn balance(&mut self, downstream: &[DownstreamLink<T>]) -> Vec<usize> {
        if downstream.is_empty() {
            return Vec::new();
        }
        let pick = (rand::random::<f64>() * downstream.len() as f64) as usize;
        vec![pick.min(downstream.len() - 1)]
    }

    fn clone_box(&self) -> Box<dyn LoadBalancer<T>> {
        Box::new(*self)
    }
}

/// Sends each item to whichever downstream neighbor currently has the
/// shallowest input queue, breaking ties toward the first neighbor seen.
#[derive(Debug, Default, Clone, Copy)]
pub struct Congestion;

impl<T: Send + 'static> LoadBalancer<T> for Congestion {
    fn balance(&mut self, downstream: &[DownstreamLink<T>]) -> Vec<usize> {
        if downstream.is_empty() {
            return Vec::new();
        }
        let mut best = 0;
        let mut best_depth = downstream[0].queue_depth();
        for (index, link) in downstream.iter().enumerate().skip(1) {
            let depth = link.queue_depth();
            if depth < best_depth {
                best_depth = depth;
                best = index;
            }
        }
        vec![best]
    }

    fn clone_box(&self) -> Box<dyn LoadBalancer<T>> {
        Box::new(*self)
    }
}
