//! LRU List Module
//!
//! Implements Least Recently Used ordering for cache eviction.
//!
//! The list is an intrusive doubly linked list stored in an arena: nodes
//! live in a `Vec` and the prev/next links are stable indices into that
//! same `Vec`, not pointers. Freed slots are recycled through a free list.
//! This keeps `move_to_front` and `remove` O(1) without any unsafe code.

// == Node Id ==
/// Stable handle to a node in an [`LruList`] arena.
///
/// Only valid for the list that issued it, and only until the node is
/// removed. The cache keeps exactly one live handle per entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct NodeId(usize);

/// Sentinel index marking the absence of a neighbor.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Node<K> {
    /// None while the slot sits on the free list
    key: Option<K>,
    prev: usize,
    next: usize,
}

// == LRU List ==
/// Tracks access order for LRU eviction.
///
/// Front = most recently used, back = least recently used. Insertion
/// counts as a touch, so entries never read after insertion fall out in
/// FIFO order among themselves.
#[derive(Debug)]
pub(crate) struct LruList<K> {
    nodes: Vec<Node<K>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl<K> LruList<K> {
    // == Constructor ==
    /// Creates a new empty LRU list.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts a key at the front (most recently used) and returns its handle.
    pub fn push_front(&mut self, key: K) -> NodeId {
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx].key = Some(key);
                idx
            }
            None => {
                self.nodes.push(Node {
                    key: Some(key),
                    prev: NIL,
                    next: NIL,
                });
                self.nodes.len() - 1
            }
        };

        self.link_front(idx);
        self.len += 1;
        NodeId(idx)
    }

    // == Move To Front ==
    /// Marks a node as most recently used.
    pub fn move_to_front(&mut self, id: NodeId) {
        if self.head == id.0 {
            return;
        }
        self.unlink(id.0);
        self.link_front(id.0);
    }

    // == Remove ==
    /// Removes a node and returns its key, recycling the arena slot.
    pub fn remove(&mut self, id: NodeId) -> Option<K> {
        let key = self.nodes[id.0].key.take()?;
        self.unlink(id.0);
        self.free.push(id.0);
        self.len -= 1;
        Some(key)
    }

    // == Pop Back ==
    /// Removes and returns the least recently used key.
    ///
    /// Returns None if the list is empty.
    pub fn pop_back(&mut self) -> Option<K> {
        if self.tail == NIL {
            return None;
        }
        self.remove(NodeId(self.tail))
    }

    // == Peek Back ==
    /// Returns the least recently used key without removing it.
    #[allow(dead_code)]
    pub fn peek_back(&self) -> Option<&K> {
        if self.tail == NIL {
            return None;
        }
        self.nodes[self.tail].key.as_ref()
    }

    // == Length ==
    /// Returns the number of live nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Clear ==
    /// Drops all nodes and frees the arena.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    // == Internal Linking ==
    /// Detaches a node from its neighbors without freeing its slot.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);

        if prev == NIL {
            self.head = next;
        } else {
            self.nodes[prev].next = next;
        }

        if next == NIL {
            self.tail = prev;
        } else {
            self.nodes[next].prev = prev;
        }
    }

    /// Attaches a detached node at the front.
    fn link_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NIL;
        self.nodes[idx].next = self.head;

        if self.head == NIL {
            self.tail = idx;
        } else {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
    }
}
