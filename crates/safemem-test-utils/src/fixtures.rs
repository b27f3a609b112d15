//! Reusable object graphs built from owning and soft handles.
//!
//! - [`Node`]: singly linked list node owning its successor and holding a
//!   soft back-link to its predecessor.
//! - [`chain`]: builds a list of `n` nodes on a heap.
//! - [`Registry`]: owner of several objects plus soft "views" into them,
//!   used for mass-invalidation scenarios.

use safemem_heap::{Heap, OwningPtr, SoftPtr};

/// List node: owns the next node, observes the previous one.
pub struct Node {
    pub value: u32,
    pub next: OwningPtr<Node>,
    pub prev: SoftPtr<Node>,
}

/// Build a chain `0 -> 1 -> ... -> n-1` on `heap` with back-links.
pub fn chain(heap: &Heap, n: u32) -> OwningPtr<Node> {
    let mut head = OwningPtr::empty();
    for value in (0..n).rev() {
        let node = Node {
            value,
            next: head,
            prev: SoftPtr::null(),
        };
        head = OwningPtr::new_in(heap, node);
        let back = head.soft();
        let mut current = head.borrow_mut();
        if let Ok(mut next) = current.next.try_borrow_mut() {
            next.prev = back;
        };
    }
    head
}

/// Sum of values reachable from `head` through owning links.
pub fn chain_sum(head: &OwningPtr<Node>) -> u32 {
    let mut total = 0;
    let mut cursor = head.soft();
    loop {
        let next = match cursor.try_get() {
            Ok(node) => {
                total += node.value;
                node.next.soft()
            }
            Err(_) => break,
        };
        cursor = next;
    }
    total
}

/// Several owned objects plus soft views into each.
pub struct Registry {
    pub owners: Vec<OwningPtr<u64>>,
    pub views: Vec<SoftPtr<u64>>,
}

impl Registry {
    /// `objects` owners, each observed by `views_per_object` soft handles.
    pub fn new(heap: &Heap, objects: usize, views_per_object: usize) -> Self {
        let owners: Vec<OwningPtr<u64>> = (0..objects)
            .map(|i| OwningPtr::new_in(heap, i as u64))
            .collect();
        let views = owners
            .iter()
            .flat_map(|o| (0..views_per_object).map(move |_| o.soft()))
            .collect();
        Self { owners, views }
    }

    /// Number of views that still resolve.
    pub fn valid_views(&self) -> usize {
        self.views.iter().filter(|v| v.is_valid()).count()
    }
}
