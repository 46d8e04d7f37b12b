// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Work node identity.

use core::fmt;

/// A handle to a work node in the fiber arena.
///
/// Contains both a slot index and a generation counter so that stale handles
/// can be detected after a node is released and its slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId {
    /// Slot index into the arena.
    pub(crate) idx: u32,
    /// Generation counter; must match the arena's generation for this slot.
    pub(crate) generation: u32,
}

impl NodeId {
    /// Returns the raw slot index (for diagnostics only).
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> u32 {
        self.idx
    }

    /// Returns the generation counter.
    #[cfg(test)]
    #[inline]
    #[must_use]
    pub(crate) const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}@gen{})", self.idx, self.generation)
    }
}
