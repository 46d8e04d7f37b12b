// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Complete phase: create or diff host instances and collect effects.

use alloc::borrow::ToOwned;

use crate::fiber::{Effect, FiberProps, Flags, NodeId, StateNode, WorkTag};
use crate::host::HostConfig;
use crate::lane::Lanes;

use super::{Reconciler, RootExitStatus};

impl<H: HostConfig> Reconciler<H> {
    /// Completes `unit` and then its ancestors until one has a sibling left
    /// to begin. Incomplete nodes unwind instead.
    pub(super) fn complete_unit_of_work(&mut self, unit: NodeId) {
        let mut completed = unit;
        loop {
            let current = self.fibers[completed].alternate;
            let parent = self.fibers[completed].parent;

            if self.fibers[completed].flags.contains(Flags::INCOMPLETE) {
                if let Some(boundary) = self.unwind_work(completed) {
                    // Render the boundary again in its capture state.
                    self.fibers[boundary].flags &= Flags::HOST_EFFECTS;
                    self.wip = Some(boundary);
                    return;
                }
                if let Some(parent) = parent {
                    self.fibers[parent].flags |= Flags::INCOMPLETE;
                }
            } else {
                self.complete_work(current, completed);
                self.reset_child_lanes(completed);
                if let Some(parent) = parent
                    && !self.fibers[parent].flags.contains(Flags::INCOMPLETE)
                    && self.fibers[completed].flags.intersects(Flags::EFFECTS)
                {
                    self.effects.push(Effect::Node(completed));
                }
            }

            if let Some(sibling) = self.fibers[completed].sibling {
                self.wip = Some(sibling);
                return;
            }
            match parent {
                Some(parent) => {
                    completed = parent;
                    self.wip = Some(parent);
                }
                None => {
                    self.wip = None;
                    if self.wip_root_exit_status == RootExitStatus::Incomplete {
                        self.wip_root_exit_status = RootExitStatus::Completed;
                    }
                    return;
                }
            }
        }
    }

    /// Collects the pending lanes left in the node's children.
    fn reset_child_lanes(&mut self, wip: NodeId) {
        let mut lanes = Lanes::NONE;
        let mut child = self.fibers[wip].child;
        while let Some(id) = child {
            let fiber = &self.fibers[id];
            lanes = lanes | fiber.lanes | fiber.child_lanes;
            child = fiber.sibling;
        }
        self.fibers[wip].child_lanes = lanes;
    }

    fn complete_work(&mut self, current: Option<NodeId>, wip: NodeId) {
        match self.fibers[wip].tag {
            WorkTag::Fragment | WorkTag::FunctionComponent | WorkTag::ClassComponent => {}
            WorkTag::HostRoot => {
                let first_mount = current.is_none_or(|current| self.fibers[current].child.is_none());
                if first_mount {
                    // Clear the container before the first insertion.
                    self.fibers[wip].flags |= Flags::SNAPSHOT;
                }
            }
            WorkTag::HostElement => self.complete_host_element(current, wip),
            WorkTag::HostText => self.complete_host_text(current, wip),
        }
    }

    fn complete_host_element(&mut self, current: Option<NodeId>, wip: NodeId) {
        let FiberProps::Element(node) = self.fibers[wip].pending_props.clone() else {
            return;
        };
        let Some(tag) = self.fibers[wip].host_tag().map(ToOwned::to_owned) else {
            return;
        };

        if let (Some(current), Some(instance)) = (current, self.fibers[wip].state_node.host()) {
            let old = &self.fibers[current].memoized_props;
            if old.ptr_eq(&self.fibers[wip].pending_props) {
                return;
            }
            let Some(old_props) = old.props() else {
                return;
            };
            let payload = self
                .host
                .prepare_update(instance, &tag, old_props, &node.props);
            let fiber = &mut self.fibers[wip];
            if payload.is_some() {
                fiber.flags |= Flags::UPDATE;
            }
            fiber.update_payload = payload;
            return;
        }

        let instance = self.host.create_instance(&tag, &node.props);
        self.append_all_children(&instance, wip);
        self.fibers[wip].state_node = StateNode::Host(instance);
    }

    fn complete_host_text(&mut self, current: Option<NodeId>, wip: NodeId) {
        let Some(text) = self.fibers[wip].pending_props.text().cloned() else {
            return;
        };
        if let Some(current) = current
            && self.fibers[wip].state_node.host().is_some()
        {
            let changed = self.fibers[current]
                .memoized_props
                .text()
                .is_none_or(|old| **old != *text);
            if changed {
                self.fibers[wip].flags |= Flags::UPDATE;
            }
            return;
        }
        let instance = self.host.create_text_instance(&text);
        self.fibers[wip].state_node = StateNode::Host(instance);
    }

    /// Appends the nearest host descendants of `wip` to its new instance.
    fn append_all_children(&mut self, parent: &H::Instance, wip: NodeId) {
        let mut node = self.fibers[wip].child;
        while let Some(id) = node {
            let fiber = &self.fibers[id];
            if fiber.is_host() {
                if let Some(instance) = fiber.state_node.host() {
                    self.host.append_initial_child(parent, instance);
                }
            } else if let Some(child) = fiber.child {
                node = Some(child);
                continue;
            }

            // Next sibling, climbing back up while staying below `wip`.
            let mut cursor = id;
            node = loop {
                if let Some(sibling) = self.fibers[cursor].sibling {
                    break Some(sibling);
                }
                match self.fibers[cursor].parent {
                    Some(parent) if parent != wip => cursor = parent,
                    _ => break None,
                }
            };
        }
    }
}
