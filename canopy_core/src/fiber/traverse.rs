// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree traversal utilities.

use alloc::vec;
use alloc::vec::Vec;

use crate::host::HostConfig;

use super::arena::FiberArena;
use super::id::NodeId;

/// An iterator over the direct children of a work node.
///
/// Created by [`FiberArena::children`].
pub(crate) struct Children<'a, H: HostConfig> {
    arena: &'a FiberArena<H>,
    current: Option<NodeId>,
}

impl<'a, H: HostConfig> Children<'a, H> {
    pub(crate) fn new(arena: &'a FiberArena<H>, first: Option<NodeId>) -> Self {
        Self {
            arena,
            current: first,
        }
    }
}

impl<H: HostConfig> Iterator for Children<'_, H> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.arena[id].sibling;
        Some(id)
    }
}

/// Pre-order walk of the subtree rooted at `root`, `root` included.
///
/// The walk follows child and sibling links only. Parent links of shared
/// children can point at the other twin of their parent, so they are never
/// used to climb back up.
pub(crate) struct Subtree<'a, H: HostConfig> {
    arena: &'a FiberArena<H>,
    root: NodeId,
    stack: Vec<NodeId>,
}

impl<'a, H: HostConfig> Subtree<'a, H> {
    pub(crate) fn new(arena: &'a FiberArena<H>, root: NodeId) -> Self {
        Self {
            arena,
            root,
            stack: vec![root],
        }
    }
}

impl<H: HostConfig> Iterator for Subtree<'_, H> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let fiber = &self.arena[id];
        if id != self.root
            && let Some(sibling) = fiber.sibling
        {
            self.stack.push(sibling);
        }
        if let Some(child) = fiber.child {
            self.stack.push(child);
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiber::{Fiber, FiberProps, WorkTag};
    use crate::root::RootMode;
    use crate::testing::TestHost;

    #[test]
    fn subtree_stays_inside_root() {
        let mut arena = FiberArena::<TestHost>::new();
        let mut alloc = || {
            arena.alloc(Fiber::new(
                WorkTag::Fragment,
                FiberProps::None,
                None,
                RootMode::Concurrent,
            ))
        };
        let (a, b, c, d, e) = (alloc(), alloc(), alloc(), alloc(), alloc());
        // a -> [b -> [d], c], with e as a sibling of a. d's parent link
        // points elsewhere, as it does for shared children.
        arena[a].child = Some(b);
        arena[a].sibling = Some(e);
        arena[b].parent = Some(a);
        arena[b].sibling = Some(c);
        arena[b].child = Some(d);
        arena[d].parent = Some(e);
        arena[c].parent = Some(a);

        let order: Vec<_> = Subtree::new(&arena, a).collect();
        assert_eq!(order, [a, b, d, c]);
        let order: Vec<_> = Subtree::new(&arena, b).collect();
        assert_eq!(order, [b, d]);
        assert_eq!(arena.children(a).collect::<Vec<_>>(), [b, c]);
    }
}
