// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Work nodes ("fibers") and their arena.
//!
//! Every tree position is a [`Fiber`] stored in a [`FiberArena`] and
//! addressed by a generational [`NodeId`]. Parent, child, sibling and
//! alternate links are ids, so the committed tree and the tree being built
//! can point at each other without shared mutable references.

mod arena;
mod flags;
mod id;
mod node;
mod traverse;

pub(crate) use id::NodeId;

pub(crate) use arena::FiberArena;
pub(crate) use flags::Flags;
pub(crate) use node::{Fiber, FiberProps, FiberQueue, MemoizedState, StateNode, WorkTag};
pub(crate) use traverse::Subtree;

/// An entry of a finished render's effect list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Effect {
    /// Remove the committed subtree rooted at the node.
    Deletion(NodeId),
    /// Apply the flags of the node.
    Node(NodeId),
}
