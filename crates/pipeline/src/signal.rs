//! The in-band control value carried alongside every item on a queue.

/// Wraps a queue element so that shutdown can be signaled without a side
/// channel: a worker dequeuing `Signal::Term` knows no further items are
/// coming and exits its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T> {
    Item(T),
    Term,
}

impl<T> Signal<T> {
    pub fn into_item(self) -> Option<T> {
        match self {
            Signal::Item(item) => Some(item),
            Signal::Term => None,
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, Signal::Term)
    }
}
