//! Circular doubly linked wait list threaded through the thread table.
//!
//! Nodes live inside the records they link (one [`Link`] per TCB) and refer
//! to each other by table index, so popping yields an index rather than a
//! pointer. The list head owns a sentinel link; an empty list is a sentinel
//! linked to itself, and a node outside any list is linked to itself.
//!
//! All operations are O(1) link rewiring with no allocation.

/// Index the sentinel uses in `prev`/`next` fields.
const SENTINEL: usize = usize::MAX;

/// Embedded list node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    prev: usize,
    next: usize,
}

impl Link {
    /// A node linked to itself (isolated) at table index `own`.
    pub const fn isolated(own: usize) -> Self {
        Self { prev: own, next: own }
    }

    /// Re-isolate the node. Required after removal so that stale links are
    /// never mistaken for membership.
    pub fn init(&mut self, own: usize) {
        *self = Self::isolated(own);
    }

    /// Whether the node at table index `own` is currently in a list.
    pub fn is_linked(&self, own: usize) -> bool {
        self.next != own
    }
}

/// Records that embed a [`Link`].
pub trait Linked {
    /// Shared access to the embedded node.
    fn link(&self) -> &Link;
    /// Exclusive access to the embedded node.
    fn link_mut(&mut self) -> &mut Link;
}

/// FIFO list of table indices.
#[derive(Debug)]
pub struct WaitList {
    sentinel: Link,
}

impl WaitList {
    /// An empty list.
    pub const fn new() -> Self {
        Self {
            sentinel: Link::isolated(SENTINEL),
        }
    }

    /// Whether the list holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.sentinel.next == SENTINEL
    }

    /// Reset to empty without touching the nodes.
    pub fn clear(&mut self) {
        self.sentinel.init(SENTINEL);
    }

    /// Append the node at `index` at the tail (before the sentinel).
    ///
    /// The node must be isolated.
    pub fn append<T: Linked>(&mut self, nodes: &mut [T], index: usize) {
        debug_assert!(!nodes[index].link().is_linked(index));
        let tail = self.sentinel.prev;
        *nodes[index].link_mut() = Link {
            prev: tail,
            next: SENTINEL,
        };
        self.link_at(nodes, tail).next = index;
        self.sentinel.prev = index;
    }

    /// Unlink and return the first node, or `None` if only the sentinel
    /// remains. The returned node is re-isolated.
    pub fn pop_front<T: Linked>(&mut self, nodes: &mut [T]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let head = self.sentinel.next;
        self.remove(nodes, head);
        Some(head)
    }

    /// Unlink the node at `index` from anywhere in the list and re-isolate it.
    /// Does nothing if the node is not linked.
    pub fn remove<T: Linked>(&mut self, nodes: &mut [T], index: usize) {
        let link = *nodes[index].link();
        if !link.is_linked(index) {
            return;
        }
        self.link_at(nodes, link.prev).next = link.next;
        self.link_at(nodes, link.next).prev = link.prev;
        nodes[index].link_mut().init(index);
    }

    /// Indices in FIFO order.
    pub fn iter<'a, T: Linked>(&'a self, nodes: &'a [T]) -> impl Iterator<Item = usize> + 'a {
        let mut cursor = self.sentinel.next;
        core::iter::from_fn(move || {
            if cursor == SENTINEL {
                return None;
            }
            let current = cursor;
            cursor = nodes[current].link().next;
            Some(current)
        })
    }

    fn link_at<'a, T: Linked>(&'a mut self, nodes: &'a mut [T], index: usize) -> &'a mut Link {
        if index == SENTINEL {
            &mut self.sentinel
        } else {
            nodes[index].link_mut()
        }
    }
}

impl Default for WaitList {
    fn default() -> Self {
        Self::new()
    }
}
