//! FIFO queue that ignores pushes of items already queued.

use std::collections::VecDeque;
use std::hash::Hash;

use rustc_hash::FxHashSet;

/// FIFO queue holding each item at most once.
#[derive(Clone, Debug)]
pub struct UniqueQueue<T> {
    order: VecDeque<T>,
    members: FxHashSet<T>,
}

impl<T: Copy + Eq + Hash> UniqueQueue<T> {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
            members: FxHashSet::default(),
        }
    }

    /// Appends `item` unless it is already queued. Returns whether it was added.
    pub fn push_back(&mut self, item: T) -> bool {
        if !self.members.insert(item) {
            return false;
        }
        self.order.push_back(item);
        true
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let item = self.order.pop_front()?;
        self.members.remove(&item);
        Some(item)
    }

    pub fn front(&self) -> Option<&T> {
        self.order.front()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.members.contains(item)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.order.iter()
    }

    /// Moves every item of `other` to the back of this queue, in order.
    pub fn append(&mut self, other: &mut UniqueQueue<T>) {
        while let Some(item) = other.pop_front() {
            self.push_back(item);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }
}

impl<T: Copy + Eq + Hash> Default for UniqueQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Eq + Hash> Extend<T> for UniqueQueue<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push_back(item);
        }
    }
}

impl<T: Copy + Eq + Hash> FromIterator<T> for UniqueQueue<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut q = Self::new();
        q.extend(iter);
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_ignored() {
        let mut q = UniqueQueue::new();
        assert!(q.push_back(1));
        assert!(q.push_back(2));
        assert!(!q.push_back(1));
        assert_eq!(q.len(), 2);
        assert_eq!(q.pop_front(), Some(1));
        // Once popped an item may be queued again.
        assert!(q.push_back(1));
        assert_eq!(q.iter().copied().collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn test_append_drains_other() {
        let mut a: UniqueQueue<u32> = [1, 2].into_iter().collect();
        let mut b: UniqueQueue<u32> = [2, 3].into_iter().collect();
        a.append(&mut b);
        assert!(b.is_empty());
        assert_eq!(a.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}
