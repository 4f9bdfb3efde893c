use std::collections::{HashSet, VecDeque};

use crate::constants::RECENTLY_SERVED_CAPACITY;

/// Bounded FIFO of the character names served most recently.
///
/// Used to avoid immediate repetition across requests. It is a quality
/// signal only, so selection may relax it when nothing else is left.
#[derive(Debug, Clone)]
pub struct RecentlyServedRing {
    names: VecDeque<String>,
    capacity: usize,
}

impl Default for RecentlyServedRing {
    fn default() -> Self {
        Self::new(RECENTLY_SERVED_CAPACITY)
    }
}

impl RecentlyServedRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            names: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `name` as the newest entry, evicting the oldest on overflow.
    /// A name already in the ring moves to the newest position.
    pub fn push(&mut self, name: &str) {
        if self.capacity == 0 {
            return;
        }
        if let Some(pos) = self.names.iter().position(|n| n == name) {
            self.names.remove(pos);
        }
        while self.names.len() >= self.capacity {
            self.names.pop_front();
        }
        self.names.push_back(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Owned copy of the current contents, for use as a per-request exclusion set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.names.iter().cloned().collect()
    }
}
