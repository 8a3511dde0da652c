//! Slab-backed doubly linked recency list
//!
//! Front is most recently used, back is least recently used. Links are slot
//! indices, so promotion and eviction are O(1) without raw pointers. Freed
//! slots are recycled through a free list.

/// Position of an entry inside the slab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotIdx(u32);

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlotIdx>,
    next: Option<SlotIdx>,
}

#[derive(Debug)]
pub struct RecencyList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<u32>,
    head: Option<SlotIdx>,
    tail: Option<SlotIdx>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            ..Self::new()
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn front_index(&self) -> Option<SlotIdx> {
        self.head
    }

    /// Insert at the most recently used end; `None` once the slab is exhausted
    pub fn push_front(&mut self, value: T) -> Option<SlotIdx> {
        let idx = self.alloc(value)?;
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.next = old_head;
        }
        match old_head.and_then(|head| self.node_mut(head)) {
            Some(node) => node.prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
        self.len += 1;
        Some(idx)
    }

    /// Remove and return the least recently used value
    pub fn pop_back(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    /// Unlink a slot; `None` for a vacant slot
    pub fn remove(&mut self, idx: SlotIdx) -> Option<T> {
        let node = self.slots.get_mut(idx.0 as usize)?.take()?;
        self.unlink(node.prev, node.next);
        self.free.push(idx.0);
        self.len -= 1;
        Some(node.value)
    }

    /// Promote a slot to the most recently used end; false for a vacant slot
    pub fn move_to_front(&mut self, idx: SlotIdx) -> bool {
        let (prev, next) = match self.node(idx) {
            Some(node) => (node.prev, node.next),
            None => return false,
        };
        if self.head == Some(idx) {
            return true;
        }

        self.unlink(prev, next);
        let old_head = self.head;
        if let Some(node) = self.node_mut(idx) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(node) = old_head.and_then(|head| self.node_mut(head)) {
            node.prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
        true
    }

    pub fn get(&self, idx: SlotIdx) -> Option<&T> {
        self.node(idx).map(|node| &node.value)
    }

    /// Walk from most to least recently used
    pub fn iter(&self) -> RecencyIter<'_, T> {
        RecencyIter {
            list: self,
            current: self.head,
            remaining: self.len,
        }
    }

    fn unlink(&mut self, prev: Option<SlotIdx>, next: Option<SlotIdx>) {
        match prev.and_then(|p| self.node_mut(p)) {
            Some(node) => node.next = next,
            None => self.head = next,
        }
        match next.and_then(|n| self.node_mut(n)) {
            Some(node) => node.prev = prev,
            None => self.tail = prev,
        }
    }

    fn alloc(&mut self, value: T) -> Option<SlotIdx> {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        if let Some(free) = self.free.pop() {
            self.slots[free as usize] = Some(node);
            return Some(SlotIdx(free));
        }
        let raw = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Some(node));
        Some(SlotIdx(raw))
    }

    #[inline]
    fn node(&self, idx: SlotIdx) -> Option<&Node<T>> {
        self.slots.get(idx.0 as usize)?.as_ref()
    }

    #[inline]
    fn node_mut(&mut self, idx: SlotIdx) -> Option<&mut Node<T>> {
        self.slots.get_mut(idx.0 as usize)?.as_mut()
    }
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RecencyIter<'a, T> {
    list: &'a RecencyList<T>,
    current: Option<SlotIdx>,
    // bounds the walk even if links were corrupted into a cycle
    remaining: usize,
}

impl<'a, T> Iterator for RecencyIter<'a, T> {
    type Item = (SlotIdx, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let idx = self.current?;
        let node = self.list.node(idx)?;
        self.current = node.next;
        self.remaining -= 1;
        Some((idx, &node.value))
    }
}
