// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commit: apply a finished render to the host.
//!
//! A commit walks the effect list three times:
//!
//! - **Before mutation**: snapshots of class components that are about to
//!   update, and clearing the container on a root's first mount.
//! - **Mutation**: ref detachment, insertions, host updates and removals.
//!   The finished tree becomes the root's current tree afterwards.
//! - **Layout**: `did_mount`/`did_update`, update callbacks, and ref
//!   attachment.
//!
//! Passive effects are queued during the commit and flushed later, either by
//! a normal-priority task or before the next render starts, whichever comes
//! first.
//!
//! Failures of individual effects do not stop the commit. They are collected
//! as [`CommitError`]s and reported once the passes finish.

use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

use crate::component::{ClassInstance, LifecycleContext};
use crate::error::{CommitError, CommitFault, EngineError};
use crate::fiber::{Effect, FiberProps, FiberQueue, Flags, NodeId, StateNode, Subtree, WorkTag};
use crate::host::HostConfig;
use crate::lane::{LanePriority, Lanes};
use crate::props::{Props, State};
use crate::root::RootId;
use crate::scheduler::{Priority, TaskId, TaskStatus};
#[cfg(feature = "trace-rich")]
use crate::trace::{EffectKind, EffectRecord};
use crate::trace::{
    CommitBeginEvent, CommitEndEvent, CommitSummaryBuilder, PhaseBeginEvent, PhaseEndEvent,
    PhaseKind,
};
use crate::update_queue::UpdateCallback;
use crate::work_loop::{ExecutionContext, Reconciler, Sched, task};

/// One deferred effect or cleanup of a class component.
#[derive(Clone)]
struct PassiveEffect {
    instance: Rc<ClassInstance>,
    props: FiberProps,
    state: Rc<State>,
    node_index: u32,
}

/// Passive effects waiting to be flushed.
#[derive(Default)]
pub(crate) struct PassiveQueue {
    /// Lanes of the commit that queued the effects.
    pub(crate) lanes: Lanes,
    root: Option<RootId>,
    unmounts: Vec<PassiveEffect>,
    mounts: Vec<PassiveEffect>,
    task: Option<TaskId>,
}

impl PassiveQueue {
    pub(crate) fn is_empty(&self) -> bool {
        self.unmounts.is_empty() && self.mounts.is_empty()
    }
}

/// Failures collected while walking the effect list.
#[derive(Default)]
struct Faults(Vec<CommitError>);

impl Faults {
    fn push(&mut self, node: NodeId, phase: PhaseKind, fault: impl Into<CommitFault>) {
        self.0.push(CommitError {
            node_index: node.index(),
            phase,
            fault: fault.into(),
        });
    }

    fn check<E: Into<CommitFault>>(&mut self, node: NodeId, phase: PhaseKind, result: Result<(), E>) {
        if let Err(fault) = result {
            self.push(node, phase, fault);
        }
    }
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl<H: HostConfig> Reconciler<H> {
    // -----------------------------------------------------------------------
    // Passive effects
    // -----------------------------------------------------------------------

    /// Runs queued passive cleanups and then passive effects. Returns
    /// `false` when nothing was queued.
    pub(crate) fn flush_passive_effects(&mut self, sched: &mut Sched<H>) -> bool {
        if self.passive.is_empty() {
            return false;
        }
        if let Some(task) = self.passive.task.take() {
            sched.cancel_callback(task);
        }
        sched.run_with_priority(Priority::Normal, |sched| {
            self.run_passive_effects(sched);
        });
        true
    }

    fn run_passive_effects(&mut self, sched: &mut Sched<H>) {
        let root = self.passive.root.take();
        let unmounts = core::mem::take(&mut self.passive.unmounts);
        let mounts = core::mem::take(&mut self.passive.mounts);
        self.passive.lanes = Lanes::NONE;

        let previous = self.context;
        self.context |= ExecutionContext::COMMIT;
        if let Some(root) = root {
            self.tracer.phase_begin(&PhaseBeginEvent {
                root,
                phase: PhaseKind::Passive,
                timestamp: sched.now(),
            });
        }

        let mut errors = Vec::new();
        let empty = Props::new();
        // Every cleanup runs before any effect.
        for effect in &unmounts {
            let cx = LifecycleContext {
                props: effect.props.props().unwrap_or(&empty),
                state: &effect.state,
                handle: &effect.instance.handle,
            };
            if let Err(error) = effect.instance.component.get().passive_cleanup(&cx) {
                errors.push(CommitError {
                    node_index: effect.node_index,
                    phase: PhaseKind::Passive,
                    fault: error.into(),
                });
            }
        }
        for effect in &mounts {
            let cx = LifecycleContext {
                props: effect.props.props().unwrap_or(&empty),
                state: &effect.state,
                handle: &effect.instance.handle,
            };
            if let Err(error) = effect.instance.component.get().passive_effect(&cx) {
                errors.push(CommitError {
                    node_index: effect.node_index,
                    phase: PhaseKind::Passive,
                    fault: error.into(),
                });
            }
        }

        if let Some(root) = root {
            self.tracer.phase_end(&PhaseEndEvent {
                root,
                phase: PhaseKind::Passive,
                timestamp: sched.now(),
            });
        }
        self.context = previous;
        if !errors.is_empty() {
            self.errors.push(EngineError::Commit(errors));
        }

        self.drain_inbox(sched);
        if self.context.is_empty() {
            self.flush_sync_callback_queue(sched);
        }
    }

    fn schedule_passive_flush(&mut self, sched: &mut Sched<H>) {
        if self.passive.task.is_some() || self.passive.is_empty() {
            return;
        }
        let id = sched.schedule_callback(
            Priority::Normal,
            task(|rec: &mut Self, sched, _| {
                rec.passive.task = None;
                rec.flush_passive_effects(sched);
                TaskStatus::Done
            }),
        );
        self.passive.task = Some(id);
    }

    /// Queues a passive record for a class node, with a cleanup first when
    /// the node was already mounted.
    fn enqueue_passive(&mut self, id: NodeId) {
        let fiber = &self.fibers[id];
        let Some(instance) = fiber.state_node.class().cloned() else {
            return;
        };
        if let Some(current) = fiber.alternate {
            let previous = &self.fibers[current];
            self.passive.unmounts.push(PassiveEffect {
                instance: Rc::clone(&instance),
                props: previous.memoized_props.clone(),
                state: previous.memoized_state.class_state().cloned().unwrap_or_default(),
                node_index: id.index(),
            });
        }
        self.passive.mounts.push(PassiveEffect {
            instance,
            props: fiber.memoized_props.clone(),
            state: fiber.memoized_state.class_state().cloned().unwrap_or_default(),
            node_index: id.index(),
        });
    }

    // -----------------------------------------------------------------------
    // Commit
    // -----------------------------------------------------------------------

    /// Commits the root's finished tree at immediate priority.
    pub(crate) fn commit_root(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        sched.run_with_priority(Priority::Immediate, |sched| {
            self.commit_root_impl(sched, root_id);
        });
    }

    fn commit_root_impl(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        let previous = self.context;
        self.context |= ExecutionContext::COMMIT;
        // Effects of the previous commit run before this one mutates the
        // host. Passive effects can queue more of them, hence the loop.
        while self.flush_passive_effects(sched) {}

        let Some(root) = self.roots.get_mut(&root_id) else {
            self.context = previous;
            return;
        };
        let Some(finished) = root.finished_work.take() else {
            self.context = previous;
            return;
        };
        let lanes = core::mem::replace(&mut root.finished_lanes, Lanes::NONE);
        let container = root.container.clone();
        root.callback_node = None;
        root.callback_priority = LanePriority::NoLane;

        let started = sched.now();
        self.tracer.commit_begin(&CommitBeginEvent {
            root: root_id,
            lanes,
            timestamp: started,
        });

        let remaining = self.fibers[finished].lanes | self.fibers[finished].child_lanes;
        root.lanes.mark_finished(remaining);

        let mut effects = core::mem::take(&mut self.effects);
        if self.fibers[finished].flags.intersects(Flags::EFFECTS) {
            effects.push(Effect::Node(finished));
        }

        let mut summary = CommitSummaryBuilder::new(root_id, lanes, started);
        summary.set_effect_count(count(effects.len()));
        let mut faults = Faults::default();

        self.phase_begin(sched, root_id, PhaseKind::BeforeMutation, &mut summary);
        self.commit_before_mutation_effects(&effects, &container, &mut faults);
        self.phase_end(sched, root_id, PhaseKind::BeforeMutation, &mut summary);

        self.phase_begin(sched, root_id, PhaseKind::Mutation, &mut summary);
        self.host.prepare_for_commit(&container);
        self.commit_mutation_effects(root_id, &effects, &container, &mut faults);
        self.host.reset_after_commit(&container);
        self.phase_end(sched, root_id, PhaseKind::Mutation, &mut summary);

        // The finished tree is current from here on: `did_mount` and
        // `did_update` observe the new host tree.
        if let Some(root) = self.roots.get_mut(&root_id) {
            root.current = finished;
        }

        self.phase_begin(sched, root_id, PhaseKind::Layout, &mut summary);
        self.commit_layout_effects(root_id, &effects, &mut faults);
        self.phase_end(sched, root_id, PhaseKind::Layout, &mut summary);

        sched.request_paint();

        // State changes from the layout pass are batched into one follow-up
        // render.
        self.drain_inbox(sched);
        self.context = previous;

        if !self.passive.is_empty() {
            self.passive.root = Some(root_id);
            self.passive.lanes = lanes;
            self.schedule_passive_flush(sched);
        }

        let remaining = self
            .roots
            .get(&root_id)
            .map_or(Lanes::NONE, |root| root.lanes.pending);
        if remaining.includes_some(Lanes::SYNC) {
            if self.root_with_nested_updates == Some(root_id) {
                self.nested_update_count += 1;
            } else {
                self.nested_update_count = 0;
                self.root_with_nested_updates = Some(root_id);
            }
        } else {
            self.nested_update_count = 0;
        }
        if !remaining.includes_some(Lanes::INPUT_DISCRETE) {
            self.forget_discrete_updates(root_id);
        }

        summary.set_error_count(count(faults.0.len()));
        self.tracer.commit_summary(&summary.finish());
        self.tracer.commit_end(&CommitEndEvent {
            root: root_id,
            remaining_lanes: remaining,
            effect_count: count(effects.len()),
            timestamp: sched.now(),
        });
        if !faults.0.is_empty() {
            self.errors.push(EngineError::Commit(faults.0));
        }

        self.ensure_root_is_scheduled(sched, root_id);
        self.collect_garbage();
        self.flush_sync_callback_queue(sched);
    }

    fn phase_begin(
        &self,
        sched: &Sched<H>,
        root: RootId,
        phase: PhaseKind,
        summary: &mut CommitSummaryBuilder,
    ) {
        let timestamp = sched.now();
        summary.phase_begin(phase, timestamp);
        self.tracer.phase_begin(&PhaseBeginEvent {
            root,
            phase,
            timestamp,
        });
    }

    fn phase_end(
        &self,
        sched: &Sched<H>,
        root: RootId,
        phase: PhaseKind,
        summary: &mut CommitSummaryBuilder,
    ) {
        let timestamp = sched.now();
        summary.phase_end(phase, timestamp);
        self.tracer.phase_end(&PhaseEndEvent {
            root,
            phase,
            timestamp,
        });
    }

    // -----------------------------------------------------------------------
    // Before mutation
    // -----------------------------------------------------------------------

    fn commit_before_mutation_effects(
        &mut self,
        effects: &[Effect],
        container: &H::Instance,
        faults: &mut Faults,
    ) {
        for effect in effects {
            let Effect::Node(id) = *effect else {
                continue;
            };
            if !self.fibers[id].flags.contains(Flags::SNAPSHOT) {
                continue;
            }
            match self.fibers[id].tag {
                WorkTag::ClassComponent => self.commit_snapshot(id),
                WorkTag::HostRoot => {
                    faults.check(id, PhaseKind::BeforeMutation, self.host.clear_container(container));
                }
                _ => {}
            }
        }
    }

    fn commit_snapshot(&mut self, id: NodeId) {
        let fiber = &self.fibers[id];
        let (Some(current), Some(instance)) = (fiber.alternate, fiber.state_node.class()) else {
            return;
        };
        let empty = Props::new();
        let previous = &self.fibers[current];
        let prev_state = previous.memoized_state.class_state().cloned().unwrap_or_default();
        let state = fiber.memoized_state.class_state().cloned().unwrap_or_default();
        let cx = LifecycleContext {
            props: fiber.memoized_props.props().unwrap_or(&empty),
            state: &state,
            handle: &instance.handle,
        };
        let snapshot = instance.component.get().snapshot_before_update(
            &cx,
            previous.memoized_props.props().unwrap_or(&empty),
            &prev_state,
        );
        self.fibers[id].snapshot = snapshot;
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    fn commit_mutation_effects(
        &mut self,
        root_id: RootId,
        effects: &[Effect],
        container: &H::Instance,
        faults: &mut Faults,
    ) {
        #[cfg(feature = "trace-rich")]
        let mut records = Vec::new();
        #[cfg(feature = "trace-rich")]
        let mut record = |id: NodeId, kind: EffectKind| {
            records.push(EffectRecord {
                node_index: id.index(),
                kind,
            });
        };

        for effect in effects {
            match *effect {
                Effect::Deletion(id) => {
                    #[cfg(feature = "trace-rich")]
                    record(id, EffectKind::Deletion);
                    self.commit_deletion(id, container, faults);
                }
                Effect::Node(id) => {
                    let flags = self.fibers[id].flags;
                    if flags.contains(Flags::REF)
                        && let Some(current) = self.fibers[id].alternate
                        && let Some(node_ref) = &self.fibers[current].node_ref
                    {
                        node_ref.detach();
                    }
                    if flags.contains(Flags::PLACEMENT) {
                        #[cfg(feature = "trace-rich")]
                        record(id, EffectKind::Placement);
                        self.commit_placement(id, container, faults);
                        self.fibers[id].flags.remove(Flags::PLACEMENT);
                    }
                    if flags.contains(Flags::UPDATE) && self.fibers[id].is_host() {
                        #[cfg(feature = "trace-rich")]
                        record(id, EffectKind::Update);
                        self.commit_work(id, faults);
                    }
                }
            }
        }

        #[cfg(feature = "trace-rich")]
        self.tracer.effects(root_id, &records);
        #[cfg(not(feature = "trace-rich"))]
        let _ = root_id;
    }

    /// Applies a prepared host update.
    fn commit_work(&mut self, id: NodeId, faults: &mut Faults) {
        match self.fibers[id].tag {
            WorkTag::HostElement => {
                let Some(payload) = self.fibers[id].update_payload.take() else {
                    return;
                };
                let fiber = &self.fibers[id];
                let (Some(instance), Some(tag), Some(props)) =
                    (fiber.state_node.host(), fiber.host_tag(), fiber.memoized_props.props())
                else {
                    return;
                };
                faults.check(
                    id,
                    PhaseKind::Mutation,
                    self.host.commit_update(instance, &payload, tag, props),
                );
            }
            WorkTag::HostText => {
                let fiber = &self.fibers[id];
                let (Some(instance), Some(text)) = (fiber.state_node.host(), fiber.memoized_props.text())
                else {
                    return;
                };
                let old = fiber
                    .alternate
                    .and_then(|current| self.fibers[current].memoized_props.text())
                    .map_or("", |old| &**old);
                faults.check(
                    id,
                    PhaseKind::Mutation,
                    self.host.commit_text_update(instance, old, text),
                );
            }
            _ => {}
        }
    }

    /// Instance of the nearest host ancestor, or the container.
    fn host_parent(&self, id: NodeId, container: &H::Instance) -> Option<H::Instance> {
        let mut node = self.fibers[id].parent;
        while let Some(parent) = node {
            let fiber = &self.fibers[parent];
            match (fiber.tag, &fiber.state_node) {
                (WorkTag::HostElement, StateNode::Host(instance)) => return Some(instance.clone()),
                (WorkTag::HostRoot, StateNode::Root(root)) => {
                    return Some(
                        self.roots
                            .get(root)
                            .map_or_else(|| container.clone(), |root| root.container.clone()),
                    );
                }
                _ => node = fiber.parent,
            }
        }
        None
    }

    fn is_host_parent(&self, id: NodeId) -> bool {
        matches!(
            self.fibers[id].tag,
            WorkTag::HostElement | WorkTag::HostRoot
        )
    }

    /// First host node after `id` in document order that is already in
    /// place. Nodes still waiting for their own placement do not count.
    ///
    /// Parent links are repaired on the way down: children shared with the
    /// previous tree can still point at the old twin of their parent.
    fn host_sibling(&mut self, id: NodeId) -> Option<H::Instance> {
        let mut node = id;
        'siblings: loop {
            while self.fibers[node].sibling.is_none() {
                match self.fibers[node].parent {
                    Some(parent) if !self.is_host_parent(parent) => node = parent,
                    _ => return None,
                }
            }
            let parent = self.fibers[node].parent;
            let sibling = self.fibers[node].sibling?;
            self.fibers[sibling].parent = parent;
            node = sibling;

            while !self.fibers[node].is_host() {
                if self.fibers[node].flags.contains(Flags::PLACEMENT) {
                    continue 'siblings;
                }
                let Some(child) = self.fibers[node].child else {
                    continue 'siblings;
                };
                self.fibers[child].parent = Some(node);
                node = child;
            }
            if !self.fibers[node].flags.contains(Flags::PLACEMENT) {
                return self.fibers[node].state_node.host().cloned();
            }
        }
    }

    fn commit_placement(&mut self, id: NodeId, container: &H::Instance, faults: &mut Faults) {
        let Some(parent) = self.host_parent(id, container) else {
            return;
        };
        let before = self.host_sibling(id);

        // A non-host node places each of its top-level host descendants.
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if node != id
                && let Some(sibling) = self.fibers[node].sibling
            {
                stack.push(sibling);
            }
            let fiber = &self.fibers[node];
            if let Some(instance) = fiber.state_node.host() {
                let result = match &before {
                    Some(before) => self.host.insert_before(&parent, instance, before),
                    None => self.host.append_child(&parent, instance),
                };
                faults.check(node, PhaseKind::Mutation, result);
            } else if let Some(child) = fiber.child {
                stack.push(child);
            }
        }
    }

    /// Unmounts a removed subtree and detaches its top-level host nodes.
    fn commit_deletion(&mut self, id: NodeId, container: &H::Instance, faults: &mut Faults) {
        let parent = self.host_parent(id, container);
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if node != id
                && let Some(sibling) = self.fibers[node].sibling
            {
                stack.push(sibling);
            }
            if self.fibers[node].is_host() {
                let nested: Vec<NodeId> = Subtree::new(&self.fibers, node).collect();
                for descendant in nested {
                    self.commit_unmount(descendant, faults);
                }
                if let (Some(parent), Some(instance)) = (&parent, self.fibers[node].state_node.host()) {
                    faults.check(node, PhaseKind::Mutation, self.host.remove_child(parent, instance));
                }
            } else {
                self.commit_unmount(node, faults);
                if let Some(child) = self.fibers[node].child {
                    stack.push(child);
                }
            }
        }

        // Detached from the tree; the collector frees it after the commit.
        self.fibers[id].parent = None;
        if let Some(alternate) = self.fibers[id].alternate {
            self.fibers[alternate].parent = None;
        }
    }

    /// Detaches refs and runs unmount lifecycles of one removed node.
    fn commit_unmount(&mut self, id: NodeId, faults: &mut Faults) {
        let fiber = &self.fibers[id];
        if let Some(node_ref) = &fiber.node_ref {
            node_ref.detach();
        }
        let Some(instance) = fiber.state_node.class().cloned() else {
            return;
        };
        let empty = Props::new();
        let state = fiber.memoized_state.class_state().cloned().unwrap_or_default();
        let cx = LifecycleContext {
            props: fiber.memoized_props.props().unwrap_or(&empty),
            state: &state,
            handle: &instance.handle,
        };
        faults.check(id, PhaseKind::Mutation, instance.component.get().will_unmount(&cx));
        if instance.component.get().has_passive_effects() {
            self.passive.unmounts.push(PassiveEffect {
                props: fiber.memoized_props.clone(),
                state,
                node_index: id.index(),
                instance,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    fn commit_layout_effects(&mut self, root_id: RootId, effects: &[Effect], faults: &mut Faults) {
        for effect in effects {
            let Effect::Node(id) = *effect else {
                continue;
            };
            let flags = self.fibers[id].flags;
            if flags.intersects(Flags::UPDATE | Flags::CALLBACK) {
                match self.fibers[id].tag {
                    WorkTag::ClassComponent => {
                        self.commit_class_layout(root_id, id, flags, faults);
                    }
                    WorkTag::HostRoot => self.commit_root_callbacks(root_id, id),
                    _ => {}
                }
            }
            if flags.contains(Flags::PASSIVE) {
                self.enqueue_passive(id);
            }
            if flags.contains(Flags::REF) {
                self.commit_attach_ref(id);
            }
        }
    }

    fn commit_class_layout(
        &mut self,
        root_id: RootId,
        id: NodeId,
        flags: Flags,
        faults: &mut Faults,
    ) {
        let fiber = &mut self.fibers[id];
        let snapshot = fiber.snapshot.take();
        let callbacks = match &mut fiber.update_queue {
            FiberQueue::Class(queue) => queue.take_effects(),
            FiberQueue::None | FiberQueue::Root(_) => Vec::new(),
        };
        let fiber = &self.fibers[id];
        let Some(instance) = fiber.state_node.class().cloned() else {
            return;
        };
        let component = instance.component.get();
        let empty = Props::new();
        let state = fiber.memoized_state.class_state().cloned().unwrap_or_default();
        let cx = LifecycleContext {
            props: fiber.memoized_props.props().unwrap_or(&empty),
            state: &state,
            handle: &instance.handle,
        };

        if flags.contains(Flags::UPDATE) {
            let result = match fiber.alternate {
                None => component.did_mount(&cx),
                Some(current) => {
                    let previous = &self.fibers[current];
                    let prev_state = previous.memoized_state.class_state().cloned().unwrap_or_default();
                    component.did_update(
                        &cx,
                        previous.memoized_props.props().unwrap_or(&empty),
                        &prev_state,
                        snapshot.as_ref(),
                    )
                }
            };
            faults.check(id, PhaseKind::Layout, result);
        }

        for callback in callbacks {
            match callback {
                UpdateCallback::User(callback) => callback(),
                UpdateCallback::DidCatch(error) => {
                    faults.check(id, PhaseKind::Layout, component.did_catch(&cx, &error));
                }
                UpdateCallback::Uncaught(error) => {
                    self.errors.push(EngineError::Uncaught {
                        root: root_id,
                        error,
                    });
                }
            }
        }
    }

    fn commit_root_callbacks(&mut self, root_id: RootId, id: NodeId) {
        let callbacks = match &mut self.fibers[id].update_queue {
            FiberQueue::Root(queue) => queue.take_effects(),
            FiberQueue::None | FiberQueue::Class(_) => Vec::new(),
        };
        for callback in callbacks {
            match callback {
                UpdateCallback::User(callback) => callback(),
                UpdateCallback::Uncaught(error) | UpdateCallback::DidCatch(error) => {
                    self.errors.push(EngineError::Uncaught {
                        root: root_id,
                        error,
                    });
                }
            }
        }
    }

    fn commit_attach_ref(&mut self, id: NodeId) {
        let fiber = &self.fibers[id];
        let Some(node_ref) = &fiber.node_ref else {
            return;
        };
        match &fiber.state_node {
            StateNode::Host(instance) => node_ref.attach(Rc::new(instance.clone())),
            StateNode::Class(instance) => node_ref.attach(Rc::new(instance.handle.clone())),
            StateNode::None | StateNode::Root(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::boxed::Box;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use crate::clock::ManualClock;
    use crate::element::{Element, host};
    use crate::fiber::{Flags, Subtree};
    use crate::root::{EngineConfig, RootId, RootOptions};
    use crate::scheduler::Scheduler;
    use crate::testing::TestHost;
    use crate::work_loop::{Reconciler, Sched};

    fn mount() -> (Reconciler<TestHost>, Sched<TestHost>, RootId, u32) {
        let config = EngineConfig::DEFAULT;
        let mut sched = Scheduler::new(config.scheduler, Box::new(ManualClock::new()));
        let mut host = TestHost::new();
        let container = host.container();
        let mut rec = Reconciler::new(host, config);
        let root = rec.create_root(container, RootOptions::LEGACY);
        rec.update_container(&mut sched, root, Element::text("a"), None).unwrap();
        sched.run_until_idle(&mut rec);
        (rec, sched, root, container)
    }

    #[test]
    fn current_swaps_after_the_mutation_pass() {
        let (mut rec, mut sched, root, container) = mount();
        let before = rec.roots[&root].current;
        assert!(!rec.host.committing);

        let tree = host("p").child(Element::text("b"));
        rec.update_container(&mut sched, root, tree.build(), None).unwrap();
        sched.run_until_idle(&mut rec);
        assert!(!rec.host.committing);
        assert_ne!(rec.roots[&root].current, before);
        assert_eq!(rec.host.render(container), "<p>b</p>");
    }

    #[test]
    fn failed_mutation_pass_keeps_the_old_tree_current() {
        let (mut rec, mut sched, root, container) = mount();
        rec.update_container(&mut sched, root, host("p").build(), None).unwrap();
        sched.run_until_idle(&mut rec);
        let before = rec.roots[&root].current;

        // The new `br` is placed during the mutation pass.
        rec.host.panic_on_placement = true;
        let tree = host("p").child(host("br")).build();
        let result = catch_unwind(AssertUnwindSafe(|| {
            rec.update_container(&mut sched, root, tree, None)
        }));
        assert!(result.is_err());

        // `reset_after_commit` never ran, and the root still points at the
        // tree the host last finished.
        assert!(rec.host.committing);
        assert_eq!(rec.roots[&root].current, before);
        assert!(
            Subtree::new(&rec.fibers, before)
                .all(|id| !rec.fibers[id].flags.contains(Flags::PLACEMENT))
        );
        assert_eq!(rec.host.render(container), "<p></p>");
    }
}
