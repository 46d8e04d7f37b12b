// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Generational storage for work nodes.

use alloc::vec;
use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

use crate::host::HostConfig;

use super::id::NodeId;
use super::node::Fiber;
use super::traverse::Children;

/// Slot storage for every work node of every root.
///
/// Nodes are addressed by [`NodeId`] handles. Released slots are recycled via
/// a free list, and generation counters prevent stale handle access.
pub(crate) struct FiberArena<H: HostConfig> {
    slots: Vec<Option<Fiber<H>>>,
    generation: Vec<u32>,
    free_list: Vec<u32>,
}

impl<H: HostConfig> Default for FiberArena<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: HostConfig> FiberArena<H> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Stores a node and returns its handle.
    pub(crate) fn alloc(&mut self, fiber: Fiber<H>) -> NodeId {
        let idx = if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(fiber);
            idx
        } else {
            let idx = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
            assert!(idx != u32::MAX, "fiber arena exhausted");
            self.slots.push(Some(fiber));
            self.generation.push(0);
            idx
        };
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Releases a node. Its handle and every copy of it become stale.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn free(&mut self, id: NodeId) -> Fiber<H> {
        self.validate(id);
        let idx = id.idx as usize;
        self.generation[idx] = self.generation[idx].wrapping_add(1);
        self.free_list.push(id.idx);
        match self.slots[idx].take() {
            Some(fiber) => fiber,
            None => unreachable!("validated slot is occupied"),
        }
    }

    /// Returns whether the handle refers to a live node.
    pub(crate) fn is_alive(&self, id: NodeId) -> bool {
        let idx = id.idx as usize;
        idx < self.slots.len() && self.generation[idx] == id.generation && self.slots[idx].is_some()
    }

    /// Number of live nodes.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Iterates the children of `id` in sibling order.
    pub(crate) fn children(&self, id: NodeId) -> Children<'_, H> {
        Children::new(self, self[id].child)
    }

    /// Releases every node not reachable from `roots`.
    ///
    /// Reachability follows child, sibling, parent and alternate links, so a
    /// committed tree keeps its in-progress twins alive for reuse. Returns
    /// the number of released nodes.
    pub(crate) fn collect_garbage(&mut self, roots: impl IntoIterator<Item = NodeId>) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !self.is_alive(id) || marked[id.idx as usize] {
                continue;
            }
            marked[id.idx as usize] = true;
            let fiber = &self[id];
            stack.extend(
                [fiber.child, fiber.sibling, fiber.parent, fiber.alternate]
                    .into_iter()
                    .flatten(),
            );
        }

        let mut released = 0;
        for (idx, mark) in marked.iter().enumerate() {
            if *mark || self.slots[idx].is_none() {
                continue;
            }
            #[expect(
                clippy::cast_possible_truncation,
                reason = "slot count is bounded by u32 in alloc"
            )]
            let id = NodeId {
                idx: idx as u32,
                generation: self.generation[idx],
            };
            drop(self.free(id));
            released += 1;
        }
        released
    }

    fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            self.generation
                .get(id.idx as usize)
                .copied()
                .unwrap_or(u32::MAX)
        );
    }
}

impl<H: HostConfig> Index<NodeId> for FiberArena<H> {
    type Output = Fiber<H>;

    fn index(&self, id: NodeId) -> &Fiber<H> {
        self.validate(id);
        match &self.slots[id.idx as usize] {
            Some(fiber) => fiber,
            None => unreachable!("validated slot is occupied"),
        }
    }
}

impl<H: HostConfig> IndexMut<NodeId> for FiberArena<H> {
    fn index_mut(&mut self, id: NodeId) -> &mut Fiber<H> {
        self.validate(id);
        match &mut self.slots[id.idx as usize] {
            Some(fiber) => fiber,
            None => unreachable!("validated slot is occupied"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{FiberProps, WorkTag};
    use crate::root::RootMode;
    use crate::testing::TestHost;

    fn fiber() -> Fiber<TestHost> {
        Fiber::new(WorkTag::Fragment, FiberProps::None, None, RootMode::Concurrent)
    }

    #[test]
    fn alloc_and_free() {
        let mut arena = FiberArena::<TestHost>::new();
        let id = arena.alloc(fiber());
        assert!(arena.is_alive(id));
        assert_eq!(arena.len(), 1);
        let _ = arena.free(id);
        assert!(!arena.is_alive(id));
        assert_eq!(arena.len(), 0);
    }

    #[test]
    fn generation_prevents_stale_access() {
        let mut arena = FiberArena::<TestHost>::new();
        let a = arena.alloc(fiber());
        let _ = arena.free(a);
        let b = arena.alloc(fiber());
        assert!(!arena.is_alive(a));
        assert!(arena.is_alive(b));
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    #[should_panic(expected = "stale NodeId")]
    fn stale_index_panics() {
        let mut arena = FiberArena::<TestHost>::new();
        let a = arena.alloc(fiber());
        let _ = arena.free(a);
        let _ = &arena[a];
    }

    #[test]
    fn garbage_collection_keeps_reachable_nodes() {
        let mut arena = FiberArena::<TestHost>::new();
        let root = arena.alloc(fiber());
        let child = arena.alloc(fiber());
        let twin = arena.alloc(fiber());
        let orphan = arena.alloc(fiber());
        arena[root].child = Some(child);
        arena[child].parent = Some(root);
        arena[child].alternate = Some(twin);

        assert_eq!(arena.collect_garbage([root]), 1);
        assert!(arena.is_alive(twin));
        assert!(!arena.is_alive(orphan));
        assert_eq!(arena.children(root).collect::<Vec<_>>(), [child]);
    }
}
