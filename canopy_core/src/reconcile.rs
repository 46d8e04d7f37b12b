// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyed child reconciliation.
//!
//! Given an in-progress parent, the first committed child, and a new child
//! description, [`ChildReconciler::reconcile`] builds the parent's new child
//! chain. Matching nodes are reused through their alternates (local state is
//! kept); everything else is created fresh, and committed children without a
//! match are recorded as deletions.
//!
//! Lists use two passes. The first walks old and new children in lock-step
//! while keys agree. On the first mismatch the remaining old children are
//! indexed by key (or position, when unkeyed) and the remaining new children
//! are looked up there. Of the nodes reused in the second pass, those whose
//! old positions form a longest increasing subsequence stay in place; the
//! rest are flagged for placement, which is the smallest set of moves that
//! produces the new order.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use crate::element::{Element, Key, NodeElement};
use crate::fiber::{Effect, Fiber, FiberArena, FiberProps, Flags, NodeId, WorkTag};
use crate::host::HostConfig;
use crate::lane::Lanes;

/// Creates (or recycles) the in-progress twin of a committed node.
pub(crate) fn create_work_in_progress<H: HostConfig>(
    fibers: &mut FiberArena<H>,
    current: NodeId,
    pending_props: FiberProps,
) -> NodeId {
    let wip = match fibers[current].alternate {
        Some(alternate) => {
            let wip = &mut fibers[alternate];
            wip.pending_props = pending_props;
            wip.flags = Flags::empty();
            wip.update_payload = None;
            alternate
        }
        None => {
            let cur = &fibers[current];
            let mut fiber = Fiber::new(cur.tag, pending_props, cur.key.clone(), cur.mode);
            fiber.element_type = cur.element_type.clone();
            fiber.state_node = cur.state_node.clone();
            fiber.alternate = Some(current);
            let id = fibers.alloc(fiber);
            fibers[current].alternate = Some(id);
            id
        }
    };

    let cur = &fibers[current];
    let child_lanes = cur.child_lanes;
    let lanes = cur.lanes;
    let child = cur.child;
    let sibling = cur.sibling;
    let index = cur.index;
    let memoized_props = cur.memoized_props.clone();
    let memoized_state = cur.memoized_state.clone();
    let update_queue = cur.update_queue.clone();
    let node_ref = cur.node_ref.clone();
    let parent = cur.parent;

    let fiber = &mut fibers[wip];
    fiber.child_lanes = child_lanes;
    fiber.lanes = lanes;
    fiber.child = child;
    fiber.sibling = sibling;
    fiber.index = index;
    fiber.memoized_props = memoized_props;
    fiber.memoized_state = memoized_state;
    fiber.update_queue = update_queue;
    fiber.node_ref = node_ref;
    fiber.parent = parent;
    wip
}

/// Gives `wip` in-progress copies of its committed children without
/// re-rendering them.
pub(crate) fn clone_child_fibers<H: HostConfig>(fibers: &mut FiberArena<H>, wip: NodeId) {
    let Some(first) = fibers[wip].child else {
        return;
    };
    let props = fibers[first].pending_props.clone();
    let mut new_child = create_work_in_progress(fibers, first, props);
    fibers[wip].child = Some(new_child);
    fibers[new_child].parent = Some(wip);

    let mut current = first;
    while let Some(sibling) = fibers[current].sibling {
        current = sibling;
        let props = fibers[current].pending_props.clone();
        let next = create_work_in_progress(fibers, current, props);
        fibers[new_child].sibling = Some(next);
        fibers[next].parent = Some(wip);
        new_child = next;
    }
    fibers[new_child].sibling = None;
}

/// Slot of an unmatched committed child in the second list pass.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SlotKey {
    Key(Key),
    Index(u32),
}

/// Remaining committed children of a list, in sibling order.
struct ExistingChildren {
    entries: Vec<Option<NodeId>>,
    lookup: BTreeMap<SlotKey, usize>,
}

impl ExistingChildren {
    fn get(&self, key: &SlotKey) -> Option<NodeId> {
        self.lookup.get(key).and_then(|&i| self.entries[i])
    }

    fn remove(&mut self, key: &SlotKey) {
        if let Some(i) = self.lookup.remove(key) {
            self.entries[i] = None;
        }
    }

    fn remaining(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().flatten().copied()
    }
}

/// Child reconciliation for one render.
pub(crate) struct ChildReconciler<'a, H: HostConfig> {
    pub(crate) fibers: &'a mut FiberArena<H>,
    /// Effect list of the render; deletions are appended here.
    pub(crate) effects: &'a mut Vec<Effect>,
    /// Lanes of the render, given to newly created nodes.
    pub(crate) lanes: Lanes,
    /// `false` while mounting a subtree that has no committed counterpart.
    pub(crate) track_side_effects: bool,
}

impl<H: HostConfig> ChildReconciler<'_, H> {
    /// Reconciles the children of `parent` and returns the new first child.
    pub(crate) fn reconcile(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        new_child: &Element,
    ) -> Option<NodeId> {
        let new_child = match new_child {
            Element::Fragment(fragment) if fragment.key.is_none() => &fragment.children,
            other => other,
        };
        match new_child {
            Element::Node(node) => {
                let child = self.reconcile_single_element(parent, current_first, node);
                Some(self.place_single_child(child))
            }
            Element::Fragment(fragment) => {
                let child = self.reconcile_single_fragment(
                    parent,
                    current_first,
                    fragment.key.as_ref(),
                    &fragment.children,
                );
                Some(self.place_single_child(child))
            }
            Element::Text(text) => {
                let child = self.reconcile_single_text(parent, current_first, text);
                Some(self.place_single_child(child))
            }
            Element::List(items) => self.reconcile_children_array(parent, current_first, items),
            Element::Empty => {
                self.delete_remaining_children(parent, current_first);
                None
            }
        }
    }

    fn delete_child(&mut self, child: NodeId) {
        if self.track_side_effects {
            self.effects.push(Effect::Deletion(child));
        }
    }

    fn delete_remaining_children(&mut self, _parent: NodeId, first: Option<NodeId>) {
        if !self.track_side_effects {
            return;
        }
        let mut child = first;
        while let Some(id) = child {
            self.delete_child(id);
            child = self.fibers[id].sibling;
        }
    }

    fn use_fiber(&mut self, current: NodeId, props: FiberProps) -> NodeId {
        let clone = create_work_in_progress(self.fibers, current, props);
        let fiber = &mut self.fibers[clone];
        fiber.index = 0;
        fiber.sibling = None;
        clone
    }

    fn create(&mut self, mut fiber: Fiber<H>, parent: NodeId) -> NodeId {
        fiber.parent = Some(parent);
        fiber.mode = self.fibers[parent].mode;
        self.fibers.alloc(fiber)
    }

    fn create_from_element(&mut self, parent: NodeId, node: &Rc<NodeElement>) -> NodeId {
        let mode = self.fibers[parent].mode;
        self.create(Fiber::from_element(node, mode, self.lanes), parent)
    }

    fn create_text(&mut self, parent: NodeId, text: &Rc<str>) -> NodeId {
        let mode = self.fibers[parent].mode;
        let mut fiber = Fiber::new(WorkTag::HostText, FiberProps::Text(Rc::clone(text)), None, mode);
        fiber.lanes = self.lanes;
        self.create(fiber, parent)
    }

    fn create_fragment(&mut self, parent: NodeId, children: &Element, key: Option<&Key>) -> NodeId {
        let mode = self.fibers[parent].mode;
        let mut fiber = Fiber::new(
            WorkTag::Fragment,
            FiberProps::Children(children.clone()),
            key.cloned(),
            mode,
        );
        fiber.lanes = self.lanes;
        self.create(fiber, parent)
    }

    fn place_single_child(&mut self, child: NodeId) -> NodeId {
        if self.track_side_effects && self.fibers[child].alternate.is_none() {
            self.fibers[child].flags |= Flags::PLACEMENT;
        }
        child
    }

    fn reconcile_single_element(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        node: &Rc<NodeElement>,
    ) -> NodeId {
        let mut child = current_first;
        while let Some(id) = child {
            let fiber = &self.fibers[id];
            let sibling = fiber.sibling;
            if fiber.key == node.key {
                let compatible = fiber
                    .element_type
                    .as_ref()
                    .is_some_and(|ty| ty.same_as(&node.element_type));
                if compatible {
                    self.delete_remaining_children(parent, sibling);
                    let existing = self.use_fiber(id, FiberProps::Element(Rc::clone(node)));
                    self.fibers[existing].node_ref = node.node_ref.clone();
                    self.fibers[existing].parent = Some(parent);
                    return existing;
                }
                self.delete_remaining_children(parent, Some(id));
                break;
            }
            self.delete_child(id);
            child = sibling;
        }
        self.create_from_element(parent, node)
    }

    fn reconcile_single_fragment(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        key: Option<&Key>,
        children: &Element,
    ) -> NodeId {
        let mut child = current_first;
        while let Some(id) = child {
            let fiber = &self.fibers[id];
            let sibling = fiber.sibling;
            if fiber.key.as_ref() == key {
                if fiber.tag == WorkTag::Fragment {
                    self.delete_remaining_children(parent, sibling);
                    let existing = self.use_fiber(id, FiberProps::Children(children.clone()));
                    self.fibers[existing].parent = Some(parent);
                    return existing;
                }
                self.delete_remaining_children(parent, Some(id));
                break;
            }
            self.delete_child(id);
            child = sibling;
        }
        self.create_fragment(parent, children, key)
    }

    fn reconcile_single_text(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        text: &Rc<str>,
    ) -> NodeId {
        if let Some(id) = current_first {
            if self.fibers[id].tag == WorkTag::HostText {
                let sibling = self.fibers[id].sibling;
                self.delete_remaining_children(parent, sibling);
                let existing = self.use_fiber(id, FiberProps::Text(Rc::clone(text)));
                self.fibers[existing].parent = Some(parent);
                return existing;
            }
        }
        self.delete_remaining_children(parent, current_first);
        self.create_text(parent, text)
    }

    fn update_text(&mut self, parent: NodeId, current: Option<NodeId>, text: &Rc<str>) -> NodeId {
        match current {
            Some(id) if self.fibers[id].tag == WorkTag::HostText => {
                let existing = self.use_fiber(id, FiberProps::Text(Rc::clone(text)));
                self.fibers[existing].parent = Some(parent);
                existing
            }
            _ => self.create_text(parent, text),
        }
    }

    fn update_element(
        &mut self,
        parent: NodeId,
        current: Option<NodeId>,
        node: &Rc<NodeElement>,
    ) -> NodeId {
        if let Some(id) = current {
            let compatible = self.fibers[id]
                .element_type
                .as_ref()
                .is_some_and(|ty| ty.same_as(&node.element_type));
            if compatible {
                let existing = self.use_fiber(id, FiberProps::Element(Rc::clone(node)));
                self.fibers[existing].node_ref = node.node_ref.clone();
                self.fibers[existing].parent = Some(parent);
                return existing;
            }
        }
        self.create_from_element(parent, node)
    }

    fn update_fragment(
        &mut self,
        parent: NodeId,
        current: Option<NodeId>,
        children: &Element,
        key: Option<&Key>,
    ) -> NodeId {
        match current {
            Some(id) if self.fibers[id].tag == WorkTag::Fragment => {
                let existing = self.use_fiber(id, FiberProps::Children(children.clone()));
                self.fibers[existing].parent = Some(parent);
                existing
            }
            _ => self.create_fragment(parent, children, key),
        }
    }

    /// Creates a node for a child with no committed counterpart.
    fn create_child(&mut self, parent: NodeId, child: &Element) -> Option<NodeId> {
        match child {
            Element::Text(text) => Some(self.create_text(parent, text)),
            Element::Node(node) => Some(self.create_from_element(parent, node)),
            Element::Fragment(fragment) => {
                Some(self.create_fragment(parent, &fragment.children, fragment.key.as_ref()))
            }
            Element::List(_) => Some(self.create_fragment(parent, child, None)),
            Element::Empty => None,
        }
    }

    /// Reuses `old` for `child` when their keys agree. Returns `None` on a
    /// key mismatch (or an empty child), which ends the first list pass.
    fn update_slot(
        &mut self,
        parent: NodeId,
        old: Option<NodeId>,
        child: &Element,
    ) -> Option<NodeId> {
        let key = old.and_then(|id| self.fibers[id].key.clone());
        match child {
            Element::Text(text) => key.is_none().then(|| self.update_text(parent, old, text)),
            Element::Node(node) => (node.key == key).then(|| self.update_element(parent, old, node)),
            Element::Fragment(fragment) => (fragment.key == key).then(|| {
                self.update_fragment(parent, old, &fragment.children, fragment.key.as_ref())
            }),
            Element::List(_) => key
                .is_none()
                .then(|| self.update_fragment(parent, old, child, None)),
            Element::Empty => None,
        }
    }

    fn map_remaining_children(&self, first: Option<NodeId>) -> ExistingChildren {
        let mut existing = ExistingChildren {
            entries: Vec::new(),
            lookup: BTreeMap::new(),
        };
        let mut child = first;
        while let Some(id) = child {
            let fiber = &self.fibers[id];
            let key = match &fiber.key {
                Some(key) => SlotKey::Key(Rc::clone(key)),
                None => SlotKey::Index(fiber.index),
            };
            existing.lookup.insert(key, existing.entries.len());
            existing.entries.push(Some(id));
            child = fiber.sibling;
        }
        existing
    }

    fn update_from_map(
        &mut self,
        existing: &ExistingChildren,
        parent: NodeId,
        new_idx: u32,
        child: &Element,
    ) -> (Option<NodeId>, SlotKey) {
        let slot = |key: Option<&Key>| match key {
            Some(key) => SlotKey::Key(Rc::clone(key)),
            None => SlotKey::Index(new_idx),
        };
        match child {
            Element::Text(text) => {
                let slot = SlotKey::Index(new_idx);
                let matched = existing.get(&slot);
                (Some(self.update_text(parent, matched, text)), slot)
            }
            Element::Node(node) => {
                let slot = slot(node.key.as_ref());
                let matched = existing.get(&slot);
                (Some(self.update_element(parent, matched, node)), slot)
            }
            Element::Fragment(fragment) => {
                let slot = slot(fragment.key.as_ref());
                let matched = existing.get(&slot);
                let fiber =
                    self.update_fragment(parent, matched, &fragment.children, fragment.key.as_ref());
                (Some(fiber), slot)
            }
            Element::List(_) => {
                let slot = SlotKey::Index(new_idx);
                let matched = existing.get(&slot);
                (Some(self.update_fragment(parent, matched, child, None)), slot)
            }
            Element::Empty => (None, SlotKey::Index(new_idx)),
        }
    }

    /// Greedy move detection of the first pass: a reused node whose old
    /// position precedes the last placed one has to move.
    fn place_child(&mut self, child: NodeId, last_placed_index: u32, new_index: u32) -> u32 {
        let fiber = &mut self.fibers[child];
        fiber.index = new_index;
        if !self.track_side_effects {
            return last_placed_index;
        }
        match fiber.alternate {
            Some(current) => {
                let old_index = self.fibers[current].index;
                if old_index < last_placed_index {
                    self.fibers[child].flags |= Flags::PLACEMENT;
                    last_placed_index
                } else {
                    old_index
                }
            }
            None => {
                fiber.flags |= Flags::PLACEMENT;
                last_placed_index
            }
        }
    }

    fn reconcile_children_array(
        &mut self,
        parent: NodeId,
        current_first: Option<NodeId>,
        new_children: &[Element],
    ) -> Option<NodeId> {
        let len = u32::try_from(new_children.len()).unwrap_or(u32::MAX);
        let mut first: Option<NodeId> = None;
        let mut previous: Option<NodeId> = None;
        let mut link = |fibers: &mut FiberArena<H>, id: NodeId| {
            match previous {
                Some(prev) => fibers[prev].sibling = Some(id),
                None => first = Some(id),
            }
            previous = Some(id);
        };

        let mut old_fiber = current_first;
        let mut last_placed_index = 0;
        let mut new_idx = 0;

        // Pass 1: lock-step while keys agree.
        while let Some(old) = old_fiber {
            if new_idx >= len {
                break;
            }
            let (slot_old, next_old) = if self.fibers[old].index > new_idx {
                (None, Some(old))
            } else {
                (Some(old), self.fibers[old].sibling)
            };
            let Some(new_fiber) = self.update_slot(parent, slot_old, &new_children[new_idx as usize])
            else {
                old_fiber = slot_old.or(next_old);
                break;
            };
            if let Some(old) = slot_old {
                if self.track_side_effects && self.fibers[new_fiber].alternate.is_none() {
                    self.delete_child(old);
                }
            }
            last_placed_index = self.place_child(new_fiber, last_placed_index, new_idx);
            link(self.fibers, new_fiber);
            old_fiber = next_old;
            new_idx += 1;
        }

        if new_idx == len {
            self.delete_remaining_children(parent, old_fiber);
            return first;
        }

        if old_fiber.is_none() {
            for i in new_idx..len {
                if let Some(new_fiber) = self.create_child(parent, &new_children[i as usize]) {
                    last_placed_index = self.place_child(new_fiber, last_placed_index, i);
                    link(self.fibers, new_fiber);
                }
            }
            return first;
        }

        // Pass 2: match the rest by key, then keep the longest run of reused
        // nodes whose old order is already right.
        let mut existing = self.map_remaining_children(old_fiber);
        let mut reused: Vec<(NodeId, u32)> = Vec::new();
        for i in new_idx..len {
            let (new_fiber, slot) =
                self.update_from_map(&existing, parent, i, &new_children[i as usize]);
            let Some(new_fiber) = new_fiber else {
                continue;
            };
            self.fibers[new_fiber].index = i;
            if self.track_side_effects {
                match self.fibers[new_fiber].alternate {
                    Some(current) => {
                        existing.remove(&slot);
                        reused.push((new_fiber, self.fibers[current].index));
                    }
                    None => self.fibers[new_fiber].flags |= Flags::PLACEMENT,
                }
            }
            link(self.fibers, new_fiber);
        }

        if self.track_side_effects {
            let old_positions: Vec<u32> = reused.iter().map(|&(_, old)| old).collect();
            let stays = longest_increasing_subsequence(&old_positions);
            for (&(fiber, old_index), stay) in reused.iter().zip(stays) {
                if !stay || old_index < last_placed_index {
                    self.fibers[fiber].flags |= Flags::PLACEMENT;
                }
            }
            let leftovers: Vec<NodeId> = existing.remaining().collect();
            for old in leftovers {
                self.delete_child(old);
            }
        }

        first
    }
}

/// Marks the members of one longest strictly increasing subsequence of
/// `seq`.
pub(crate) fn longest_increasing_subsequence(seq: &[u32]) -> Vec<bool> {
    // tails[k]: index into `seq` of the smallest tail of an increasing run of
    // length k + 1.
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        prev[i] = pos.checked_sub(1).map(|p| tails[p]);
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut members = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        members[i] = true;
        cursor = prev[i];
    }
    members
}
