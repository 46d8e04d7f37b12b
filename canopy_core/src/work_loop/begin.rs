// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Begin phase: render one node and reconcile its children.

use alloc::rc::Rc;

use crate::component::{ClassComponent, ClassInstance, Poll, RenderContext, StateHandle};
use crate::element::{Element, ElementType};
use crate::fiber::{FiberProps, FiberQueue, Flags, MemoizedState, NodeId, StateNode, WorkTag};
use crate::host::HostConfig;
use crate::lane::Lanes;
use crate::props::{Props, State};
use crate::reconcile::{ChildReconciler, clone_child_fibers};
use crate::root::RootState;
use crate::update_queue::{Processed, QueueState, UpdateQueue};

use super::{Reconciler, Thrown};

impl<H: HostConfig> Reconciler<H> {
    /// Renders `wip` and returns its first child to work on next, or `None`
    /// when the node has no children needing work.
    pub(super) fn begin_work(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        render_lanes: Lanes,
    ) -> Result<Option<NodeId>, Thrown> {
        self.fibers[wip].effect_start = self.effects.len();

        if let Some(current) = current
            && self.fibers[current]
                .memoized_props
                .ptr_eq(&self.fibers[wip].pending_props)
            && !render_lanes.includes_some(self.fibers[wip].lanes)
        {
            // Same inputs and no update of its own in these lanes.
            return Ok(self.bailout_on_already_finished_work(wip, render_lanes));
        }

        self.fibers[wip].lanes = Lanes::NONE;
        match self.fibers[wip].tag {
            WorkTag::HostRoot => Ok(self.update_host_root(current, wip, render_lanes)),
            WorkTag::HostElement => {
                self.mark_ref(current, wip);
                let children = self.fibers[wip].pending_props.children();
                Ok(self.reconcile_children(current, wip, &children))
            }
            WorkTag::HostText => Ok(None),
            WorkTag::Fragment => {
                let children = self.fibers[wip].pending_props.children();
                Ok(self.reconcile_children(current, wip, &children))
            }
            WorkTag::FunctionComponent => self.update_function_component(current, wip),
            WorkTag::ClassComponent => self.update_class_component(current, wip, render_lanes),
        }
    }

    /// Skips rendering `wip`. Its children are cloned when they have work
    /// in `render_lanes`, otherwise the whole subtree is skipped.
    fn bailout_on_already_finished_work(
        &mut self,
        wip: NodeId,
        render_lanes: Lanes,
    ) -> Option<NodeId> {
        if !render_lanes.includes_some(self.fibers[wip].child_lanes) {
            return None;
        }
        clone_child_fibers(&mut self.fibers, wip);
        self.fibers[wip].child
    }

    fn reconcile_children(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        children: &Element,
    ) -> Option<NodeId> {
        // Fresh subtrees are appended to their parent's instance in the
        // complete phase, so only updates record placements and deletions.
        let (current_first, track_side_effects) = match current {
            Some(current) => (self.fibers[current].child, true),
            None => (None, false),
        };
        let child = ChildReconciler {
            fibers: &mut self.fibers,
            effects: &mut self.effects,
            lanes: self.wip_root_render_lanes,
            track_side_effects,
        }
        .reconcile(wip, current_first, children);
        self.fibers[wip].child = child;
        child
    }

    /// Flags `REF` when the node's ref was added or replaced.
    fn mark_ref(&mut self, current: Option<NodeId>, wip: NodeId) {
        let new_ref = self.fibers[wip].pending_props.node_ref();
        let changed = match current {
            None => new_ref.is_some(),
            Some(current) => match (self.fibers[current].node_ref.as_ref(), new_ref) {
                (None, None) => false,
                (Some(old), Some(new)) => !old.ptr_eq(new),
                _ => true,
            },
        };
        self.fibers[wip].node_ref = new_ref.cloned();
        if changed {
            self.fibers[wip].flags |= Flags::REF;
        }
    }

    /// Applies pending updates of a root or class node for `render_lanes`.
    fn process_update_queue<S: QueueState>(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        props: &Props,
        render_lanes: Lanes,
        select: fn(&mut FiberQueue) -> Option<&mut UpdateQueue<S>>,
    ) -> Option<Processed<S>> {
        let mut queue = core::mem::take(&mut self.fibers[wip].update_queue);
        let processed = select(&mut queue).map(|q| {
            let pending = q.take_pending();
            q.append_to_base(&pending);
            // The committed copy keeps them too, so an interrupted render
            // loses nothing.
            if let Some(current) = current
                && let Some(cq) = select(&mut self.fibers[current].update_queue)
            {
                cq.append_to_base(&pending);
            }
            q.process(props, render_lanes)
        });
        self.fibers[wip].update_queue = queue;

        let processed = processed?;
        let fiber = &mut self.fibers[wip];
        fiber.lanes = processed.remaining_lanes;
        if processed.has_callbacks {
            fiber.flags |= Flags::CALLBACK;
        }
        if processed.did_capture {
            fiber.flags |= Flags::DID_CAPTURE;
        }
        Some(processed)
    }

    fn update_host_root(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        render_lanes: Lanes,
    ) -> Option<NodeId> {
        let prev_children = match &self.fibers[wip].memoized_state {
            MemoizedState::Root(state) => state.element.clone(),
            _ => Element::Empty,
        };
        let processed = self.process_update_queue(
            current,
            wip,
            &Props::new(),
            render_lanes,
            root_queue,
        )?;
        let next_children = processed.state.element.clone();
        self.fibers[wip].memoized_state = MemoizedState::Root(processed.state);
        if next_children.ptr_eq(&prev_children) {
            return self.bailout_on_already_finished_work(wip, render_lanes);
        }
        self.reconcile_children(current, wip, &next_children)
    }

    fn update_function_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
    ) -> Result<Option<NodeId>, Thrown> {
        let fiber = &self.fibers[wip];
        let (Some(ElementType::Function(component)), FiberProps::Element(node)) =
            (&fiber.element_type, &fiber.pending_props)
        else {
            return Ok(None);
        };
        let next = match component.render(&node.props, &node.children) {
            Ok(Poll::Ready(element)) => element,
            Ok(Poll::Pending(dependency)) => return Err(Thrown::Pending(dependency)),
            Err(error) => return Err(Thrown::Error(error)),
        };
        self.fibers[wip].flags |= Flags::PERFORMED_WORK;
        Ok(self.reconcile_children(current, wip, &next))
    }

    fn update_class_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        render_lanes: Lanes,
    ) -> Result<Option<NodeId>, Thrown> {
        let should_update = if self.fibers[wip].state_node.class().is_none() {
            self.mount_class_instance(wip);
            true
        } else if current.is_none() {
            // Created by a render that never committed. Mount again.
            self.resume_mount_class_instance(wip, render_lanes);
            true
        } else {
            self.update_class_instance(current, wip, render_lanes)
        };
        self.finish_class_component(current, wip, should_update, render_lanes)
    }

    fn mount_class_instance(&mut self, wip: NodeId) {
        let fiber = &self.fibers[wip];
        let (Some(ElementType::Class(component)), Some(props)) =
            (&fiber.element_type, fiber.pending_props.props())
        else {
            return;
        };
        let component: ClassComponent = component.clone();
        let state = Rc::new(component.get().initial_state(props));
        let handle = StateHandle::new(Rc::downgrade(&self.inbox), wip);
        let has_passive = component.get().has_passive_effects();

        let fiber = &mut self.fibers[wip];
        fiber.state_node = StateNode::Class(Rc::new(ClassInstance { component, handle }));
        fiber.memoized_state = MemoizedState::Class(Rc::clone(&state));
        fiber.update_queue = FiberQueue::Class(UpdateQueue::new(state));
        fiber.flags |= Flags::UPDATE;
        if has_passive {
            fiber.flags |= Flags::PASSIVE;
        }
    }

    fn resume_mount_class_instance(&mut self, wip: NodeId, render_lanes: Lanes) {
        let props = self.fibers[wip]
            .pending_props
            .props()
            .cloned()
            .unwrap_or_default();
        if let Some(processed) =
            self.process_update_queue(None, wip, &props, render_lanes, class_queue)
        {
            self.fibers[wip].memoized_state = MemoizedState::Class(processed.state);
        }
        let has_passive = self.fibers[wip]
            .state_node
            .class()
            .is_some_and(|instance| instance.component.get().has_passive_effects());
        let fiber = &mut self.fibers[wip];
        fiber.flags |= Flags::UPDATE;
        if has_passive {
            fiber.flags |= Flags::PASSIVE;
        }
    }

    /// Processes updates of a mounted class node and decides whether it
    /// re-renders.
    fn update_class_instance(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        render_lanes: Lanes,
    ) -> bool {
        let Some(instance) = self.fibers[wip].state_node.class().cloned() else {
            return false;
        };
        let old_props = self.fibers[wip].memoized_props.clone();
        let new_props = self.fibers[wip].pending_props.clone();
        let old_state = self.fibers[wip]
            .memoized_state
            .class_state()
            .cloned()
            .unwrap_or_default();

        let props = new_props.props().cloned().unwrap_or_default();
        let Some(processed) =
            self.process_update_queue(current, wip, &props, render_lanes, class_queue)
        else {
            return false;
        };
        let new_state = processed.state;
        self.fibers[wip].memoized_state = MemoizedState::Class(Rc::clone(&new_state));

        if old_props.ptr_eq(&new_props)
            && Rc::ptr_eq(&old_state, &new_state)
            && !processed.force_update
        {
            return false;
        }

        let empty = Props::new();
        let should_update = processed.force_update
            || instance.component.get().should_update(
                old_props.props().unwrap_or(&empty),
                &old_state,
                new_props.props().unwrap_or(&empty),
                &new_state,
            );
        if should_update {
            let fiber = &mut self.fibers[wip];
            fiber.flags |= Flags::UPDATE | Flags::SNAPSHOT;
            if instance.component.get().has_passive_effects() {
                fiber.flags |= Flags::PASSIVE;
            }
        }
        should_update
    }

    fn finish_class_component(
        &mut self,
        current: Option<NodeId>,
        wip: NodeId,
        should_update: bool,
        render_lanes: Lanes,
    ) -> Result<Option<NodeId>, Thrown> {
        self.mark_ref(current, wip);
        let did_capture = self.fibers[wip].flags.contains(Flags::DID_CAPTURE);
        if !should_update && !did_capture {
            return Ok(self.bailout_on_already_finished_work(wip, render_lanes));
        }

        let fiber = &self.fibers[wip];
        let (Some(instance), FiberProps::Element(node)) =
            (fiber.state_node.class(), &fiber.pending_props)
        else {
            return Ok(None);
        };
        let state: Rc<State> = fiber
            .memoized_state
            .class_state()
            .cloned()
            .unwrap_or_default();
        let cx = RenderContext {
            props: &node.props,
            children: &node.children,
            state: &state,
        };
        let next = match instance.component.get().render(&cx) {
            Ok(Poll::Ready(element)) => element,
            Ok(Poll::Pending(dependency)) => return Err(Thrown::Pending(dependency)),
            Err(error) => return Err(Thrown::Error(error)),
        };
        self.fibers[wip].flags |= Flags::PERFORMED_WORK;

        if let Some(current) = current
            && did_capture
        {
            // Recovering from a fault: drop the failed children outright
            // instead of matching against them.
            let current_first = self.fibers[current].child;
            ChildReconciler {
                fibers: &mut self.fibers,
                effects: &mut self.effects,
                lanes: render_lanes,
                track_side_effects: true,
            }
            .reconcile(wip, current_first, &Element::Empty);
            let child = ChildReconciler {
                fibers: &mut self.fibers,
                effects: &mut self.effects,
                lanes: render_lanes,
                track_side_effects: true,
            }
            .reconcile(wip, None, &next);
            self.fibers[wip].child = child;
            return Ok(child);
        }
        Ok(self.reconcile_children(current, wip, &next))
    }
}

fn root_queue(queue: &mut FiberQueue) -> Option<&mut UpdateQueue<RootState>> {
    match queue {
        FiberQueue::Root(q) => Some(q),
        _ => None,
    }
}

fn class_queue(queue: &mut FiberQueue) -> Option<&mut UpdateQueue<Rc<State>>> {
    match queue {
        FiberQueue::Class(q) => Some(q),
        _ => None,
    }
}
