use std::collections::{BTreeMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("empty queue")]
pub struct EmptyQueueError;

/// FIFO buckets keyed by priority. Lower priorities dequeue first; equal priorities keep
/// their enqueue order. Empty buckets are dropped eagerly so the first bucket is always
/// the one to serve.
#[derive(Debug, Clone)]
pub struct PriorityQueue<P, T> {
    buckets: BTreeMap<P, VecDeque<T>>,
    count: usize,
}

impl<P: Ord, T> Default for PriorityQueue<P, T> {
    fn default() -> Self {
        Self { buckets: BTreeMap::new(), count: 0 }
    }
}

impl<P: Ord, T> PriorityQueue<P, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn enqueue(&mut self, item: T, priority: P) {
        self.buckets.entry(priority).or_default().push_back(item);
        self.count += 1;
    }

    pub fn dequeue(&mut self) -> Result<T, EmptyQueueError> {
        let mut bucket = self.buckets.first_entry().ok_or(EmptyQueueError)?;
        let item = bucket.get_mut().pop_front().ok_or(EmptyQueueError)?;
        if bucket.get().is_empty() {
            bucket.remove();
        }
        self.count -= 1;
        Ok(item)
    }

    pub fn peek(&self) -> Result<&T, EmptyQueueError> {
        self.buckets.values().find_map(VecDeque::front).ok_or(EmptyQueueError)
    }

    pub fn contains(&self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.buckets.values().any(|bucket| bucket.contains(item))
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }

    /// Items in dequeue order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buckets.values().flat_map(|bucket| bucket.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.buckets.values_mut().flat_map(|bucket| bucket.iter_mut())
    }
}

impl<'a, P: Ord, T> IntoIterator for &'a PriorityQueue<P, T> {
    type Item = &'a T;
    type IntoIter = Box<dyn Iterator<Item = &'a T> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
