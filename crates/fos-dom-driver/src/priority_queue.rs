//! Priority queue of listener destinations
//!
//! Higher priorities come first; equal priorities keep insertion order.

#[derive(Debug)]
pub struct PriorityQueue<T> {
    items: Vec<(T, usize)>,
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first item with a lower priority
    pub fn add(&mut self, item: T, priority: usize) {
        let index = self
            .items
            .iter()
            .position(|(_, p)| *p < priority)
            .unwrap_or(self.items.len());
        self.items.insert(index, (item, priority));
    }

    /// Remove the first item matching `predicate`
    pub fn remove_where(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.items.iter().position(|(item, _)| predicate(item))?;
        Some(self.items.remove(index).0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(item, _)| item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Clone> PriorityQueue<T> {
    /// Copy of the items in order, safe to iterate while the queue changes
    pub fn snapshot(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
