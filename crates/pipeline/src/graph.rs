//! The `Pipeline` graph builder: `map`, `reduce`, `merge`.
//!
//! A `Pipeline<T>` owns every `StageTemplate<T>` that will ever run under
//! it, addressed by position in `tasks`. Each template's `output` field
//! holds the indices of its downstream neighbors, so the graph has no
//! strong back-edges and can be walked, merged, or handed to the runtime
//! without any reference-counting cycles.

use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::stage::StageTemplate;

/// A dataflow graph under construction. `frontier` tracks the current set
/// of "leaf" stages that the next `map`/`reduce` call will attach to.
pub struct Pipeline<T> {
    pub(crate) tasks: Vec<StageTemplate<T>>,
    pub(crate) frontier: Vec<usize>,
    pub(crate) kill: CancellationToken,
}

impl<T: Clone + Send + Sync + 'static> Pipeline<T> {
    /// Starts a new pipeline rooted at `roots` (typically one or more
    /// timer-driven producers).
    pub fn new(roots: Vec<StageTemplate<T>>) -> Self {
        let frontier = (0..roots.len()).collect();
        Self {
            tasks: roots,
            frontier,
            kill: CancellationToken::new(),
        }
    }

    /// Fans out: every stage currently on the frontier gets its own fresh
    /// copy of every template in `next`, wired as that stage's downstream.
    /// The new frontier is the set of all newly created stages.
    ///
    /// Fails at build time, before any stage ever runs, if a template in
    /// `next` declares itself a producer — a producer drives itself off a
    /// timer and never reads an input queue, so wiring one downstream of
    /// another stage can never do anything useful.
    pub fn map(mut self, next: Vec<StageTemplate<T>>) -> Result<Self, PipelineError> {
        reject_producers(&next)?;
        let mut new_frontier = Vec::new();
        for &source in &self.frontier {
            for template in &next {
                let copy = template.copy();
                let index = self.tasks.len();
                self.tasks.push(copy);
                self.tasks[source].output.push(index);
                new_frontier.push(index);
            }
        }
        self.frontier = new_frontier;
        Ok(self)
    }

    /// Fans in: every template in `next` is instantiated exactly once and
    /// wired as downstream of every stage currently on the frontier, so all
    /// of them converge on the same new stage(s). Same producer-downstream
    /// rejection as [`map`](Self::map).
    pub fn reduce(mut self, next: Vec<StageTemplate<T>>) -> Result<Self, PipelineError> {
        reject_producers(&next)?;
        let mut new_frontier = Vec::new();
        for template in &next {
            let index = self.tasks.len();
            self.tasks.push(template.copy());
            new_frontier.push(index);
        }
        for &source in &self.frontier {
            for &index in &new_frontier {
                self.tasks[source].output.push(index);
            }
        }
        self.frontier = new_frontier;
        Ok(self)
    }

    /// Absorbs one or more independently built pipelines into this one,
    /// reindexing their internal edges to land at their new positions in
    /// `self.tasks`. The frontier is left unchanged — `merge` is typically
    /// the last step before `run`.
    pub fn merge(mut self, others: impl IntoIterator<Item = Pipeline<T>>) -> Self {
        for other in others {
            let offset = self.tasks.len();
            for mut task in other.tasks {
                task.output = task.output.into_iter().map(|i| i + offset).collect();
                self.tasks.push(task);
            }
        }
        self
    }

    pub fn stage_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_ref())
    }
}

fn reject_producers<T>(next: &[StageTemplate<T>]) -> Result<(), PipelineError> {
    for template in next {
        if template.is_producer() {
            return Err(PipelineError::GraphConstructionError(format!(
                "stage '{}' is a producer and cannot be wired downstream of another stage",
                template.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn producer(name: &str) -> StageTemplate<i32> {
        StageTemplate::producer_fn(name, Duration::from_millis(1), || async { None })
    }

    fn transform(name: &str) -> StageTemplate<i32> {
        StageTemplate::transform_fn(name, |item: i32| async move { Ok(vec![item]) })
    }

    #[test]
    fn map_fans_out_to_every_frontier_member() {
        let p = Pipeline::new(vec![producer("src")])
            .map(vec![transform("a"), transform("b")])
            .unwrap();
        assert_eq!(p.stage_count(), 3);
        assert_eq!(p.tasks[0].output, vec![1, 2]);
        assert_eq!(p.frontier, vec![1, 2]);
    }

    #[test]
    fn reduce_fans_in_from_every_frontier_member() {
        let p = Pipeline::new(vec![producer("a"), producer("b")])
            .reduce(vec![transform("sink")])
            .unwrap();
        assert_eq!(p.stage_count(), 3);
        assert_eq!(p.tasks[0].output, vec![2]);
        assert_eq!(p.tasks[1].output, vec![2]);
        assert_eq!(p.frontier, vec![2]);
    }

    #[test]
    fn merge_reindexes_absorbed_edges() {
        let left = Pipeline::new(vec![producer("l_src")]).map(vec![transform("l_sink")]).unwrap();
        let right = Pipeline::new(vec![producer("r_src")]).map(vec![transform("r_sink")]).unwrap();
        let merged = left.merge(vec![right]);
        assert_eq!(merged.stage_count(), 4);
        // left's own edge (0 -> 1) is untouched
        assert_eq!(merged.tasks[0].output, vec![1]);
        // right's edge (0 -> 1) became (2 -> 3) after the offset
        assert_eq!(merged.tasks[2].output, vec![3]);
    }

    #[test]
    fn map_rejects_a_producer_wired_downstream() {
        let err = Pipeline::new(vec![producer("src")])
            .map(vec![producer("not-a-transform")])
            .unwrap_err();
        assert!(matches!(err, PipelineError::GraphConstructionError(_)));
    }

    #[test]
    fn map_gives_each_copy_independent_scaler_state() {
        // Two frontier members fanning into the same template produce two
        // independent copies; consuming one copy's one-shot `Static` scaler
        // must not affect the other's.
        let mut p = Pipeline::new(vec![producer("src1"), producer("src2")])
            .map(vec![transform("a").scale(2)])
            .unwrap();
        assert_eq!(p.stage_count(), 4);
        assert_eq!(p.tasks[2].scaler.scale(0, 0), 2);
        assert_eq!(p.tasks[3].scaler.scale(0, 0), 2);
        assert_eq!(p.tasks[2].scaler.scale(2, 0), 0);
    }
}
