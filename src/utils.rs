//! Utility types and functions.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// A map from keys to owned values.
#[derive(Default)]
pub struct Dispatcher<K, V> {
    items: HashMap<K, V>,
}

impl<K, V> Dispatcher<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            items: HashMap::new(),
        }
    }

    pub fn insert(&mut self, k: K, v: V) -> Option<V> {
        self.items.insert(k, v)
    }

    pub fn get(&self, k: &K) -> Option<&V> {
        self.items.get(k)
    }

    pub fn remove(&mut self, k: &K) -> Option<V> {
        self.items.remove(k)
    }

    pub fn contains(&self, k: &K) -> bool {
        self.items.contains_key(k)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.items.keys()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A bounded FIFO.
///
/// Pushing past capacity evicts and returns the oldest element so that the
/// caller can run its own teardown on it.
pub struct RingBuffer<T> {
    capacity: usize,
    buff: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buff: VecDeque::new(),
        }
    }

    pub fn push(&mut self, val: T) -> Option<T> {
        self.buff.push_back(val);
        if self.buff.len() > self.capacity {
            return self.buff.pop_front();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.buff.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buff.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, RingBuffer};

    #[test]
    fn test_ring_buffer_eviction() {
        let mut buff = RingBuffer::new(2);

        assert_eq!(buff.push(1), None);
        assert_eq!(buff.push(2), None);
        assert_eq!(buff.push(3), Some(1));
        assert_eq!(buff.push(4), Some(2));
        assert_eq!(buff.len(), 2);
    }

    #[test]
    fn test_dispatcher() {
        let mut d: Dispatcher<u32, Vec<u32>> = Dispatcher::new();

        assert_eq!(d.insert(1, vec![10]), None);
        assert_eq!(d.insert(1, vec![10, 11]), Some(vec![10]));
        assert!(d.contains(&1));
        assert_eq!(d.keys().count(), 1);

        assert_eq!(d.remove(&1), Some(vec![10, 11]));
        assert!(d.is_empty());
    }
}
