use std::collections::HashMap;

use crate::{ConditionalOutcome, DeleteOutcome, PutOutcome};

struct Node {
    key: Box<[u8]>,
    value: Box<[u8]>,
    prev: Option<u32>,
    next: Option<u32>,
}

impl Node {
    fn entry_size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Shared state behind both [`crate::SimpleLru`] and [`crate::ThreadSafeLru`].
///
/// `head` is most-recently-used, `tail` is least-recently-used, a doubly
/// linked list threaded through the arena by index rather than raw pointer.
pub(crate) struct Inner {
    max_bytes: usize,
    pub(crate) size_bytes: usize,
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    index: HashMap<Box<[u8]>, u32>,
    head: Option<u32>,
    tail: Option<u32>,
}

impl Inner {
    pub(crate) fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            size_bytes: 0,
            nodes: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    fn node(&self, idx: u32) -> &Node {
        self.nodes[idx as usize].as_ref().expect("live index points at freed node")
    }

    fn node_mut(&mut self, idx: u32) -> &mut Node {
        self.nodes[idx as usize].as_mut().expect("live index points at freed node")
    }

    fn detach(&mut self, idx: u32) {
        let (prev, next) = {
            let n = self.node(idx);
            (n.prev, n.next)
        };
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
        let n = self.node_mut(idx);
        n.prev = None;
        n.next = None;
    }

    fn push_front(&mut self, idx: u32) {
        self.node_mut(idx).next = self.head;
        self.node_mut(idx).prev = None;
        if let Some(h) = self.head {
            self.node_mut(h).prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Promote `idx` to the head unless it already is one.
    fn move_to_front(&mut self, idx: u32) {
        if self.head == Some(idx) {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    fn alloc_node(&mut self, node: Node) -> u32 {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = Some(node);
            slot
        } else {
            self.nodes.push(Some(node));
            (self.nodes.len() - 1) as u32
        }
    }

    fn free_node(&mut self, idx: u32) {
        self.nodes[idx as usize] = None;
        self.free.push(idx);
    }

    /// Evict the tail entry. Returns `false` if the store is empty.
    fn evict_tail(&mut self) -> bool {
        let Some(idx) = self.tail else { return false };
        self.detach(idx);
        let entry_size = self.node(idx).entry_size();
        let key = self.node(idx).key.clone();
        self.index.remove(&key);
        self.size_bytes -= entry_size;
        self.free_node(idx);
        true
    }

    /// Evict from the tail in strict LRU order until `size_bytes <= target`.
    fn reduce_to(&mut self, target: usize) {
        while self.size_bytes > target {
            if !self.evict_tail() {
                // Ran out of entries to evict before reaching budget: the
                // caller always picks `target` so that the remaining live
                // entries fit, so this means `size_bytes`/the arena's free
                // list have drifted apart from reality. Not reachable
                // through any public API path; treated as fatal rather
                // than silently returning over-budget.
                panic!("kvcache-store: ran out of entries to evict while still over budget");
            }
        }
    }

    /// Cross-check the running byte counter and index size against the
    /// linked list in debug builds. A mismatch means the arena bookkeeping
    /// (head/tail/free list/size_bytes) has drifted apart from the nodes it
    /// describes, which no public operation can cause on its own.
    fn check_invariants(&self) {
        debug_assert!(self.size_bytes <= self.max_bytes || self.max_bytes == 0);
        #[cfg(debug_assertions)]
        {
            let mut count = 0usize;
            let mut total = 0usize;
            let mut cur = self.head;
            let mut prev = None;
            while let Some(idx) = cur {
                let n = self.node(idx);
                debug_assert_eq!(n.prev, prev, "linked list prev pointer mismatch");
                total += n.entry_size();
                count += 1;
                prev = Some(idx);
                cur = n.next;
            }
            debug_assert_eq!(prev, self.tail, "tail pointer does not match list end");
            debug_assert_eq!(count, self.index.len(), "index size disagrees with list length");
            debug_assert_eq!(total, self.size_bytes, "size_bytes disagrees with summed entries");
        }
    }

    fn insert_new(&mut self, key: &[u8], value: &[u8]) -> bool {
        let entry_size = key.len() + value.len();
        if self.max_bytes == 0 || entry_size > self.max_bytes {
            return false;
        }
        self.reduce_to(self.max_bytes - entry_size);
        let node = Node {
            key: key.into(),
            value: value.into(),
            prev: None,
            next: None,
        };
        let idx = self.alloc_node(node);
        self.push_front(idx);
        self.index.insert(key.into(), idx);
        self.size_bytes += entry_size;
        self.check_invariants();
        true
    }

    /// Update an existing entry's value, evicting other tail entries as
    /// needed to stay within budget. Returns `false` (no mutation at all,
    /// not even reordering) if the new entry alone would exceed `max_bytes`.
    fn update_existing(&mut self, idx: u32, value: &[u8]) -> bool {
        let key_len = self.node(idx).key.len();
        let new_entry_size = key_len + value.len();
        if self.max_bytes == 0 || new_entry_size > self.max_bytes {
            return false;
        }
        self.move_to_front(idx);
        let old_entry_size = key_len + self.node(idx).value.len();
        self.size_bytes -= old_entry_size;
        self.reduce_to(self.max_bytes - new_entry_size);
        self.node_mut(idx).value = value.into();
        self.size_bytes += new_entry_size;
        self.check_invariants();
        true
    }

    pub(crate) fn put(&mut self, key: &[u8], value: &[u8]) -> PutOutcome {
        if let Some(&idx) = self.index.get(key) {
            if self.update_existing(idx, value) {
                PutOutcome::Stored
            } else {
                PutOutcome::Rejected
            }
        } else if self.insert_new(key, value) {
            PutOutcome::Stored
        } else {
            PutOutcome::Rejected
        }
    }

    pub(crate) fn put_if_absent(&mut self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        if self.index.contains_key(key) {
            return ConditionalOutcome::NotStored;
        }
        if self.insert_new(key, value) {
            ConditionalOutcome::Stored
        } else {
            ConditionalOutcome::NotStored
        }
    }

    pub(crate) fn set(&mut self, key: &[u8], value: &[u8]) -> ConditionalOutcome {
        let Some(&idx) = self.index.get(key) else {
            return ConditionalOutcome::NotStored;
        };
        if self.update_existing(idx, value) {
            ConditionalOutcome::Stored
        } else {
            ConditionalOutcome::NotStored
        }
    }

    pub(crate) fn delete(&mut self, key: &[u8]) -> DeleteOutcome {
        let Some(idx) = self.index.remove(key) else {
            return DeleteOutcome::Absent;
        };
        self.detach(idx);
        self.size_bytes -= self.node(idx).entry_size();
        self.free_node(idx);
        self.check_invariants();
        DeleteOutcome::Deleted
    }

    pub(crate) fn get(&mut self, key: &[u8]) -> Option<Box<[u8]>> {
        let &idx = self.index.get(key)?;
        self.move_to_front(idx);
        Some(self.node(idx).value.clone())
    }
}
