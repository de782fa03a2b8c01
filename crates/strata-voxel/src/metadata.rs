//! Per-node key/value metadata and node timers.
//!
//! Both are keyed by the node's linear index inside its chunk.

use std::collections::BTreeMap;

/// String key/value pairs attached to a single node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    fields: BTreeMap<String, String>,
}

impl NodeMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Sets `key`; an empty value removes it.
    pub fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.fields.remove(key);
        } else {
            self.fields.insert(key.to_string(), value.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Metadata of every node in a chunk that has any.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeMetadataList {
    entries: BTreeMap<u16, NodeMetadata>,
}

impl NodeMetadataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u16) -> Option<&NodeMetadata> {
        self.entries.get(&index)
    }

    /// Returns the metadata at `index`, creating an empty record if needed.
    pub fn get_or_insert(&mut self, index: u16) -> &mut NodeMetadata {
        self.entries.entry(index).or_default()
    }

    /// Stores `meta` at `index`. Empty records are dropped instead.
    pub fn set(&mut self, index: u16, meta: NodeMetadata) {
        if meta.is_empty() {
            self.entries.remove(&index);
        } else {
            self.entries.insert(index, meta);
        }
    }

    pub fn remove(&mut self, index: u16) -> Option<NodeMetadata> {
        self.entries.remove(&index)
    }

    /// Drops records that became empty through in-place edits.
    pub fn prune(&mut self) {
        self.entries.retain(|_, meta| !meta.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &NodeMetadata)> {
        self.entries.iter().map(|(i, m)| (*i, m))
    }
}

/// A countdown attached to one node.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NodeTimer {
    /// Seconds until the timer fires.
    pub timeout: f32,
    /// Seconds already elapsed.
    pub elapsed: f32,
}

impl NodeTimer {
    pub fn new(timeout: f32, elapsed: f32) -> Self {
        Self { timeout, elapsed }
    }
}

/// Timers of every node in a chunk that has one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeTimerList {
    timers: BTreeMap<u16, NodeTimer>,
}

impl NodeTimerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: u16) -> Option<NodeTimer> {
        self.timers.get(&index).copied()
    }

    pub fn set(&mut self, index: u16, timer: NodeTimer) {
        self.timers.insert(index, timer);
    }

    pub fn remove(&mut self, index: u16) -> Option<NodeTimer> {
        self.timers.remove(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, NodeTimer)> + '_ {
        self.timers.iter().map(|(i, t)| (*i, *t))
    }

    /// Advances every timer by `dt` seconds, removing and returning the ones
    /// that expired, in index order.
    pub fn step(&mut self, dt: f32) -> Vec<(u16, NodeTimer)> {
        let mut expired = Vec::new();
        self.timers.retain(|index, timer| {
            timer.elapsed += dt;
            if timer.elapsed >= timer.timeout {
                expired.push((*index, *timer));
                false
            } else {
                true
            }
        });
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_removes_key() {
        let mut meta = NodeMetadata::new();
        meta.set("owner", "alice");
        assert_eq!(meta.get("owner"), Some("alice"));
        meta.set("owner", "");
        assert!(meta.is_empty());
    }

    #[test]
    fn test_list_drops_empty_records() {
        let mut list = NodeMetadataList::new();
        list.set(10, NodeMetadata::new());
        assert!(list.is_empty());

        list.get_or_insert(3).set("text", "hello");
        list.get_or_insert(4);
        list.prune();
        assert_eq!(list.len(), 1);
        assert_eq!(list.get(3).unwrap().get("text"), Some("hello"));
    }

    #[test]
    fn test_timer_step_expires_in_order() {
        let mut timers = NodeTimerList::new();
        timers.set(7, NodeTimer::new(1.0, 0.0));
        timers.set(2, NodeTimer::new(0.5, 0.25));
        timers.set(9, NodeTimer::new(10.0, 0.0));

        let expired = timers.step(0.75);
        let indices: Vec<u16> = expired.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2]);

        let expired = timers.step(0.25);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].0, 7);
        assert_eq!(timers.len(), 1);
        assert!((timers.get(9).unwrap().elapsed - 1.0).abs() < 1e-6);
    }
}
