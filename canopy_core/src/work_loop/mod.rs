// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The reconciler: update scheduling, the render loops, and root bookkeeping.
//!
//! A state change is turned into an update in a lane, recorded on the
//! node's queue and on every ancestor's `child_lanes`, and then
//! [`ensure_root_is_scheduled`](Reconciler::ensure_root_is_scheduled) makes
//! sure the root has exactly one scheduler callback at the priority of its
//! most urgent pending lanes.
//!
//! Synchronous lanes go to an engine-local queue flushed at the end of the
//! current batch. Everything else becomes a scheduler task that renders in
//! slices, yielding between work units when the scheduler asks it to.
//!
//! The per-node phases live in submodules: `begin` (render one node and
//! reconcile its children), `complete` (create host instances and collect
//! effects), and `unwind` (error capture and suspension).

mod begin;
mod complete;
mod unwind;

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use bitflags::bitflags;

use crate::commit::PassiveQueue;
use crate::component::{Dependency, Inbox, StateRequest};
use crate::element::Element;
use crate::error::{ComponentError, EngineError};
use crate::fiber::{
    Effect, Fiber, FiberArena, FiberProps, FiberQueue, MemoizedState, NodeId, StateNode, WorkTag,
};
use crate::host::HostConfig;
use crate::lane::{Lane, LanePriority, Lanes, find_transition_lane, find_update_lane};
use crate::reconcile::create_work_in_progress;
use crate::root::{
    CallbackNode, EngineConfig, FiberRoot, RootId, RootMode, RootOptions, RootState,
};
use crate::scheduler::{Priority, Scheduler, TaskCallback, TaskContext, TaskId, TaskStatus};
use crate::time::HostTime;
use crate::trace::{LanesScheduledEvent, RenderEvent, RenderEventKind, Tracer};
use crate::update_queue::{Payload, Update, UpdateCallback, UpdateQueue};

/// The scheduler type the reconciler runs on.
pub(crate) type Sched<H> = Scheduler<Reconciler<H>>;

bitflags! {
    /// What the engine is doing right now.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub(crate) struct ExecutionContext: u8 {
        /// Inside `batched_updates` or another batching entry point.
        const BATCHED = 1;
        /// Inside a discrete event.
        const DISCRETE_EVENT = 1 << 1;
        /// Rendering.
        const RENDER = 1 << 2;
        /// Committing or running passive effects.
        const COMMIT = 1 << 3;
        /// Rendering again after an error.
        const RETRY_AFTER_ERROR = 1 << 4;
    }
}

/// How a render of a root ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RootExitStatus {
    /// Still in progress (yielded).
    Incomplete,
    /// The root node itself failed.
    FatalErrored,
    /// A fault was captured by a boundary or by the root.
    Errored,
    /// A component was waiting on a dependency.
    Suspended,
    /// Every node completed.
    Completed,
}

/// Why a work unit could not finish.
pub(crate) enum Thrown {
    /// The component failed.
    Error(ComponentError),
    /// The component is waiting on a dependency.
    Pending(Dependency),
}

/// Wraps a closure as a scheduler task.
pub(crate) fn task<H: HostConfig>(
    f: impl FnMut(&mut Reconciler<H>, &mut Sched<H>, TaskContext) -> TaskStatus + 'static,
) -> TaskCallback<Reconciler<H>> {
    Box::new(f)
}

/// Owns the node arena, the mounted roots, and all render state.
pub(crate) struct Reconciler<H: HostConfig> {
    pub(crate) host: H,
    pub(crate) fibers: FiberArena<H>,
    pub(crate) roots: BTreeMap<RootId, FiberRoot<H>>,
    next_root: u32,
    pub(crate) config: EngineConfig,
    pub(crate) tracer: Tracer,
    pub(crate) inbox: Rc<RefCell<Inbox>>,
    pub(crate) context: ExecutionContext,

    // Render in progress.
    pub(crate) wip_root: Option<RootId>,
    pub(crate) wip: Option<NodeId>,
    pub(crate) wip_root_render_lanes: Lanes,
    /// Lanes of the last prepared render. Survives completion so updates
    /// interleaved with it can be detected afterwards.
    wip_root_included_lanes: Lanes,
    pub(crate) wip_root_exit_status: RootExitStatus,
    wip_root_fatal_error: Option<ComponentError>,
    wip_root_updated_lanes: Lanes,
    wip_root_pinged_lanes: Lanes,
    /// Effect list of the render in progress, in completion order.
    pub(crate) effects: Vec<Effect>,

    // Per-event lane caches.
    current_event_wip_lanes: Lanes,
    current_event_pending_lanes: Lanes,
    pub(crate) is_transition: bool,

    sync_queue: Vec<RootId>,
    sync_queue_task: Option<TaskId>,
    is_flushing_sync_queue: bool,
    roots_with_pending_discrete_updates: BTreeSet<RootId>,

    pub(crate) nested_update_count: u32,
    pub(crate) root_with_nested_updates: Option<RootId>,

    pub(crate) passive: PassiveQueue,
    pub(crate) errors: Vec<EngineError>,
}

impl<H: HostConfig> Reconciler<H> {
    pub(crate) fn new(host: H, config: EngineConfig) -> Self {
        Self {
            host,
            fibers: FiberArena::new(),
            roots: BTreeMap::new(),
            next_root: 0,
            config,
            tracer: Tracer::none(),
            inbox: Rc::new(RefCell::new(Inbox::default())),
            context: ExecutionContext::empty(),
            wip_root: None,
            wip: None,
            wip_root_render_lanes: Lanes::NONE,
            wip_root_included_lanes: Lanes::NONE,
            wip_root_exit_status: RootExitStatus::Incomplete,
            wip_root_fatal_error: None,
            wip_root_updated_lanes: Lanes::NONE,
            wip_root_pinged_lanes: Lanes::NONE,
            effects: Vec::new(),
            current_event_wip_lanes: Lanes::NONE,
            current_event_pending_lanes: Lanes::NONE,
            is_transition: false,
            sync_queue: Vec::new(),
            sync_queue_task: None,
            is_flushing_sync_queue: false,
            roots_with_pending_discrete_updates: BTreeSet::new(),
            nested_update_count: 0,
            root_with_nested_updates: None,
            passive: PassiveQueue::default(),
            errors: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    /// Mounts an empty root over `container`.
    pub(crate) fn create_root(&mut self, container: H::Instance, options: RootOptions) -> RootId {
        let id = RootId(self.next_root);
        self.next_root = self.next_root.wrapping_add(1);
        let mut fiber = Fiber::new(WorkTag::HostRoot, FiberProps::None, None, options.mode);
        fiber.state_node = StateNode::Root(id);
        fiber.memoized_state = MemoizedState::Root(RootState::default());
        fiber.update_queue = FiberQueue::Root(UpdateQueue::new(RootState::default()));
        let current = self.fibers.alloc(fiber);
        self.roots
            .insert(id, FiberRoot::new(id, options.mode, container, current));
        id
    }

    /// Forgets a root whose tree has already been cleared.
    pub(crate) fn remove_root(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        if self.wip_root == Some(root_id) {
            self.discard_work_in_progress(sched.now());
        }
        if let Some(root) = self.roots.remove(&root_id)
            && let Some(CallbackNode::Task(task)) = root.callback_node
        {
            sched.cancel_callback(task);
        }
        self.roots_with_pending_discrete_updates.remove(&root_id);
        self.collect_garbage();
    }

    /// Schedules `element` as the new content of a root.
    pub(crate) fn update_container(
        &mut self,
        sched: &mut Sched<H>,
        root_id: RootId,
        element: Element,
        callback: Option<UpdateCallback>,
    ) -> Result<(), EngineError> {
        let Some(root) = self.roots.get(&root_id) else {
            return Err(EngineError::UnknownRoot(root_id));
        };
        let (current, mode) = (root.current, root.mode);
        let lane = self.request_update_lane(sched, mode);
        let update = Update::new(lane)
            .with_payload(Payload::Value(RootState { element }))
            .with_callback(callback);
        if let FiberQueue::Root(queue) = &self.fibers[current].update_queue {
            queue.enqueue(update);
        }
        self.schedule_update_on_fiber(sched, current, lane);
        Ok(())
    }

    /// Releases every node no root can reach.
    pub(crate) fn collect_garbage(&mut self) -> usize {
        if self.context.contains(ExecutionContext::RENDER) {
            return 0;
        }
        let live: Vec<NodeId> = self.roots.values().map(|root| root.current).collect();
        self.fibers.collect_garbage(live)
    }

    // -----------------------------------------------------------------------
    // Entry points and batching
    // -----------------------------------------------------------------------

    /// Adds `flags` to the execution context and returns the previous one.
    pub(crate) fn enter(&mut self, flags: ExecutionContext) -> ExecutionContext {
        let previous = self.context;
        if previous.is_empty() {
            self.current_event_wip_lanes = Lanes::NONE;
            self.current_event_pending_lanes = Lanes::NONE;
        }
        self.context |= flags;
        previous
    }

    /// Drains requests made inside the batch, restores the context, and
    /// flushes synchronous work once the outermost batch ends.
    pub(crate) fn leave(&mut self, sched: &mut Sched<H>, previous: ExecutionContext) {
        self.drain_inbox(sched);
        self.context = previous;
        if previous.is_empty() {
            self.flush_sync_callback_queue(sched);
        }
    }

    /// Dispatches state changes and pings queued by handles and
    /// dependencies.
    pub(crate) fn drain_inbox(&mut self, sched: &mut Sched<H>) {
        loop {
            let (requests, pings) = {
                let mut inbox = self.inbox.borrow_mut();
                if inbox.is_empty() {
                    break;
                }
                (
                    core::mem::take(&mut inbox.state),
                    core::mem::take(&mut inbox.pings),
                )
            };
            for ping in pings {
                self.ping_suspended_root(sched, ping.root, ping.lanes);
            }
            for request in requests {
                self.dispatch_state_request(sched, request);
            }
        }
    }

    fn dispatch_state_request(&mut self, sched: &mut Sched<H>, request: StateRequest) {
        let StateRequest { fiber, mut update } = request;
        if !self.fibers.is_alive(fiber) {
            return;
        }
        let lane = self.request_update_lane(sched, self.fibers[fiber].mode);
        update.lane = lane;
        match &self.fibers[fiber].update_queue {
            FiberQueue::Class(queue) => queue.enqueue(update),
            FiberQueue::None | FiberQueue::Root(_) => return,
        }
        self.schedule_update_on_fiber(sched, fiber, lane);
    }

    /// Expires discrete updates left over from earlier events and renders
    /// them synchronously.
    pub(crate) fn flush_pending_discrete_updates(&mut self, sched: &mut Sched<H>) {
        let roots = core::mem::take(&mut self.roots_with_pending_discrete_updates);
        for root_id in roots {
            if let Some(root) = self.roots.get_mut(&root_id) {
                root.lanes.mark_expired(Lanes::INPUT_DISCRETE);
            }
            self.ensure_root_is_scheduled(sched, root_id);
        }
        self.flush_sync_callback_queue(sched);
    }

    /// Drops a root from the discrete flush set once its discrete lanes
    /// are committed.
    pub(crate) fn forget_discrete_updates(&mut self, root_id: RootId) {
        self.roots_with_pending_discrete_updates.remove(&root_id);
    }

    // -----------------------------------------------------------------------
    // Update scheduling
    // -----------------------------------------------------------------------

    /// Picks the lane for an update requested now.
    pub(crate) fn request_update_lane(&mut self, sched: &Sched<H>, mode: RootMode) -> Lane {
        if mode == RootMode::Legacy {
            return Lanes::SYNC;
        }
        if self.context.contains(ExecutionContext::RENDER) && !self.wip_root_render_lanes.is_empty()
        {
            // An update made while rendering joins the render in progress.
            return self.wip_root_render_lanes.pick_arbitrary();
        }

        // Updates of one event share a lane: the wip lanes are read once per
        // event.
        if self.current_event_wip_lanes.is_empty() {
            self.current_event_wip_lanes = self.wip_root_included_lanes;
        }

        if self.is_transition {
            if self.current_event_pending_lanes.is_empty() {
                self.current_event_pending_lanes = self.passive.lanes;
            }
            return find_transition_lane(
                self.current_event_wip_lanes,
                self.current_event_pending_lanes,
            );
        }

        let priority = sched.current_priority();
        let lane_priority = if self.context.contains(ExecutionContext::DISCRETE_EVENT)
            && priority == Priority::UserBlocking
        {
            LanePriority::InputDiscrete
        } else {
            LanePriority::from_scheduler_priority(priority)
        };
        find_update_lane(lane_priority, self.current_event_wip_lanes)
    }

    /// Records an update in `lane` on `fiber` and makes sure its root will
    /// render it.
    pub(crate) fn schedule_update_on_fiber(
        &mut self,
        sched: &mut Sched<H>,
        fiber: NodeId,
        lane: Lane,
    ) {
        if self.nested_update_count > self.config.nested_update_limit {
            self.nested_update_count = 0;
            self.root_with_nested_updates = None;
            self.errors.push(EngineError::NestedUpdateLimit {
                limit: self.config.nested_update_limit,
            });
            return;
        }

        let Some(root_id) = self.mark_update_lane_from_fiber_to_root(fiber, lane) else {
            // Unmounted.
            return;
        };
        let Some(root) = self.roots.get_mut(&root_id) else {
            return;
        };
        root.lanes.mark_updated(lane);

        if self.wip_root == Some(root_id) && !self.context.contains(ExecutionContext::RENDER) {
            // Interleaved with the render in progress.
            self.wip_root_updated_lanes |= lane;
        }

        if lane == Lanes::SYNC {
            self.ensure_root_is_scheduled(sched, root_id);
            if self.context.is_empty() {
                self.flush_sync_callback_queue(sched);
            }
        } else {
            if self.context.contains(ExecutionContext::DISCRETE_EVENT)
                && matches!(
                    sched.current_priority(),
                    Priority::UserBlocking | Priority::Immediate
                )
            {
                self.roots_with_pending_discrete_updates.insert(root_id);
            }
            self.ensure_root_is_scheduled(sched, root_id);
        }
    }

    /// Adds `lane` to the node, its alternate, and the `child_lanes` of
    /// every ancestor pair. Returns the root the path ends in, or `None`
    /// when the node is no longer mounted.
    fn mark_update_lane_from_fiber_to_root(&mut self, fiber: NodeId, lane: Lane) -> Option<RootId> {
        if !self.fibers.is_alive(fiber) {
            return None;
        }
        self.fibers[fiber].lanes |= lane;
        if let Some(alternate) = self.fibers[fiber].alternate {
            self.fibers[alternate].lanes |= lane;
        }

        let mut node = fiber;
        while let Some(parent) = self.fibers[node].parent {
            self.fibers[parent].child_lanes |= lane;
            if let Some(alternate) = self.fibers[parent].alternate {
                self.fibers[alternate].child_lanes |= lane;
            }
            node = parent;
        }

        match (self.fibers[node].tag, &self.fibers[node].state_node) {
            (WorkTag::HostRoot, StateNode::Root(root)) => Some(*root),
            _ => None,
        }
    }

    /// Gives the root a callback for its most urgent lanes, replacing one
    /// of a different priority.
    pub(crate) fn ensure_root_is_scheduled(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        let now = sched.now();
        let wip_lanes = if self.wip_root == Some(root_id) {
            self.wip_root_render_lanes
        } else {
            Lanes::NONE
        };
        let Some(root) = self.roots.get_mut(&root_id) else {
            return;
        };
        let existing = root.callback_node;
        root.lanes.mark_starved_as_expired(now);
        let (next_lanes, priority) = root.lanes.next_lanes(wip_lanes);

        if next_lanes.is_empty() {
            if let Some(CallbackNode::Task(task)) = existing {
                sched.cancel_callback(task);
            }
            root.callback_node = None;
            root.callback_priority = LanePriority::NoLane;
            return;
        }

        if existing.is_some() {
            if root.callback_priority == priority {
                return;
            }
            if let Some(CallbackNode::Task(task)) = existing {
                sched.cancel_callback(task);
            }
        }

        let node = match priority {
            LanePriority::Sync => {
                self.schedule_sync_callback(sched, root_id);
                CallbackNode::SyncQueue
            }
            LanePriority::SyncBatched => CallbackNode::Task(sched.schedule_callback(
                Priority::Immediate,
                task(move |rec: &mut Self, sched, _| {
                    rec.perform_sync_work_on_root(sched, root_id);
                    TaskStatus::Done
                }),
            )),
            _ => {
                let scheduler_priority = priority
                    .to_scheduler_priority()
                    .unwrap_or(Priority::Normal);
                CallbackNode::Task(sched.schedule_callback(
                    scheduler_priority,
                    task(move |rec: &mut Self, sched, cx| {
                        rec.perform_concurrent_work_on_root(sched, root_id, cx)
                    }),
                ))
            }
        };

        if let Some(root) = self.roots.get_mut(&root_id) {
            root.callback_node = Some(node);
            root.callback_priority = priority;
        }
        self.tracer.lanes_scheduled(&LanesScheduledEvent {
            root: root_id,
            lanes: next_lanes,
            priority,
            timestamp: now,
        });
    }

    fn callback_node(&self, root_id: RootId) -> Option<CallbackNode> {
        self.roots.get(&root_id).and_then(|root| root.callback_node)
    }

    fn clear_callback_node(&mut self, root_id: RootId) {
        if let Some(root) = self.roots.get_mut(&root_id) {
            root.callback_node = None;
            root.callback_priority = LanePriority::NoLane;
        }
    }

    // -----------------------------------------------------------------------
    // Synchronous queue
    // -----------------------------------------------------------------------

    fn schedule_sync_callback(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        self.sync_queue.push(root_id);
        if self.sync_queue_task.is_none() {
            let id = sched.schedule_callback(
                Priority::Immediate,
                task(|rec: &mut Self, sched, _| {
                    rec.sync_queue_task = None;
                    rec.flush_sync_callback_queue(sched);
                    TaskStatus::Done
                }),
            );
            self.sync_queue_task = Some(id);
        }
    }

    /// Renders every root queued for synchronous work.
    pub(crate) fn flush_sync_callback_queue(&mut self, sched: &mut Sched<H>) {
        if let Some(task) = self.sync_queue_task.take() {
            sched.cancel_callback(task);
        }
        if self.is_flushing_sync_queue || self.sync_queue.is_empty() {
            return;
        }
        self.is_flushing_sync_queue = true;
        sched.run_with_priority(Priority::Immediate, |sched| {
            // Roots queued while flushing are handled in the same pass.
            let mut i = 0;
            while i < self.sync_queue.len() {
                let root_id = self.sync_queue[i];
                i += 1;
                if self.callback_node(root_id) == Some(CallbackNode::SyncQueue) {
                    self.perform_sync_work_on_root(sched, root_id);
                }
            }
        });
        self.sync_queue.clear();
        self.is_flushing_sync_queue = false;
    }

    // -----------------------------------------------------------------------
    // Root work
    // -----------------------------------------------------------------------

    /// Scheduler task body for non-synchronous lanes.
    fn perform_concurrent_work_on_root(
        &mut self,
        sched: &mut Sched<H>,
        root_id: RootId,
        cx: TaskContext,
    ) -> TaskStatus {
        self.current_event_wip_lanes = Lanes::NONE;
        self.current_event_pending_lanes = Lanes::NONE;

        if !self.roots.contains_key(&root_id) {
            return TaskStatus::Done;
        }
        let original = self.callback_node(root_id);
        if self.flush_passive_effects(sched) && self.callback_node(root_id) != original {
            // A passive effect rescheduled the root.
            return TaskStatus::Done;
        }

        let wip_lanes = if self.wip_root == Some(root_id) {
            self.wip_root_render_lanes
        } else {
            Lanes::NONE
        };
        let lanes = self
            .roots
            .get(&root_id)
            .map_or(Lanes::NONE, |root| root.lanes.next_lanes(wip_lanes).0);
        if lanes.is_empty() {
            self.clear_callback_node(root_id);
            return TaskStatus::Done;
        }

        if cx.did_timeout {
            // Starved: finish synchronously.
            if let Some(root) = self.roots.get_mut(&root_id) {
                root.lanes.mark_expired(lanes);
            }
            self.ensure_root_is_scheduled(sched, root_id);
            return TaskStatus::Done;
        }

        let exit = self.render_root_concurrent(sched, root_id, lanes);
        if self
            .wip_root_included_lanes
            .includes_some(self.wip_root_updated_lanes)
        {
            // An update landed in the lanes being rendered. Start over.
            self.discard_work_in_progress(sched.now());
        } else if exit != RootExitStatus::Incomplete {
            self.finish_render(sched, root_id, exit, lanes);
        }

        self.ensure_root_is_scheduled(sched, root_id);
        let current = self.callback_node(root_id);
        if current.is_some() && current == original {
            TaskStatus::Continue
        } else {
            TaskStatus::Done
        }
    }

    /// Renders and commits a root's most urgent lanes without yielding.
    pub(crate) fn perform_sync_work_on_root(&mut self, sched: &mut Sched<H>, root_id: RootId) {
        self.flush_passive_effects(sched);
        // This callback is being consumed.
        self.clear_callback_node(root_id);
        let Some(root) = self.roots.get(&root_id) else {
            return;
        };

        let continuing = self.wip_root == Some(root_id)
            && root.lanes.expired.includes_some(self.wip_root_render_lanes);
        let mut lanes = if continuing {
            // Finish the expired render in progress rather than restart it.
            self.wip_root_render_lanes
        } else {
            root.lanes.next_lanes(Lanes::NONE).0
        };
        if lanes.is_empty() {
            return;
        }

        let mut exit = self.render_root_sync(sched, root_id, lanes);
        if continuing
            && self
                .wip_root_included_lanes
                .includes_some(self.wip_root_updated_lanes)
        {
            lanes = self
                .roots
                .get(&root_id)
                .map_or(Lanes::NONE, |root| root.lanes.next_lanes(lanes).0);
            exit = self.render_root_sync(sched, root_id, lanes);
        }

        self.finish_render(sched, root_id, exit, lanes);
        self.ensure_root_is_scheduled(sched, root_id);
    }

    /// Retries an errored render once, then commits, suspends, or reports.
    fn finish_render(
        &mut self,
        sched: &mut Sched<H>,
        root_id: RootId,
        mut exit: RootExitStatus,
        mut lanes: Lanes,
    ) {
        let Some(mode) = self.roots.get(&root_id).map(|root| root.mode) else {
            return;
        };

        if exit == RootExitStatus::Errored && mode == RootMode::Concurrent {
            // The fault may have come from an inconsistent interleaving.
            // Render everything pending synchronously once more.
            let previous = self.context;
            self.context |= ExecutionContext::RETRY_AFTER_ERROR;
            let retry = self
                .roots
                .get(&root_id)
                .map_or(Lanes::NONE, |root| root.lanes.lanes_to_retry_on_error());
            if !retry.is_empty() {
                lanes = retry;
                exit = self.render_root_sync(sched, root_id, lanes);
            }
            self.context = previous;
        }

        match exit {
            RootExitStatus::Incomplete => {}
            RootExitStatus::FatalErrored => {
                let error = self
                    .wip_root_fatal_error
                    .take()
                    .unwrap_or_else(|| ComponentError::new("#root", "render failed"));
                self.discard_work_in_progress(sched.now());
                self.mark_root_suspended(root_id, lanes);
                self.errors.push(EngineError::Fatal {
                    root: root_id,
                    error,
                });
            }
            RootExitStatus::Suspended => {
                // No fallback exists to show; keep the committed tree and
                // wait for a ping.
                self.mark_root_suspended(root_id, lanes);
            }
            RootExitStatus::Errored | RootExitStatus::Completed => {
                let Some(root) = self.roots.get_mut(&root_id) else {
                    return;
                };
                root.finished_work = self.fibers[root.current].alternate;
                root.finished_lanes = lanes;
                self.commit_root(sched, root_id);
            }
        }
    }

    fn mark_root_suspended(&mut self, root_id: RootId, lanes: Lanes) {
        let lanes = lanes
            .remove(self.wip_root_pinged_lanes)
            .remove(self.wip_root_updated_lanes);
        if let Some(root) = self.roots.get_mut(&root_id) {
            root.lanes.mark_suspended(lanes);
        }
    }

    fn ping_suspended_root(&mut self, sched: &mut Sched<H>, root_id: RootId, lanes: Lanes) {
        let Some(root) = self.roots.get_mut(&root_id) else {
            return;
        };
        root.lanes.mark_pinged(lanes);
        if self.wip_root == Some(root_id) && self.wip_root_render_lanes.contains(lanes) {
            if self.wip_root_exit_status == RootExitStatus::Suspended {
                self.discard_work_in_progress(sched.now());
            } else {
                self.wip_root_pinged_lanes |= lanes;
            }
        }
        self.ensure_root_is_scheduled(sched, root_id);
    }

    // -----------------------------------------------------------------------
    // Render loops
    // -----------------------------------------------------------------------

    fn render_root_sync(
        &mut self,
        sched: &mut Sched<H>,
        root_id: RootId,
        lanes: Lanes,
    ) -> RootExitStatus {
        let previous = self.context;
        self.context |= ExecutionContext::RENDER;
        if self.wip_root != Some(root_id) || self.wip_root_render_lanes != lanes {
            self.prepare_fresh_stack(sched.now(), root_id, lanes);
        }

        loop {
            match self.work_loop_sync() {
                Ok(()) => break,
                Err(thrown) => self.handle_error(thrown),
            }
        }

        self.context = previous;
        debug_assert!(self.wip.is_none(), "synchronous render left work behind");
        self.wip_root = None;
        self.wip_root_render_lanes = Lanes::NONE;
        self.trace_render_finished(sched.now(), root_id, lanes);
        self.wip_root_exit_status
    }

    fn render_root_concurrent(
        &mut self,
        sched: &mut Sched<H>,
        root_id: RootId,
        lanes: Lanes,
    ) -> RootExitStatus {
        let previous = self.context;
        self.context |= ExecutionContext::RENDER;
        if self.wip_root != Some(root_id) || self.wip_root_render_lanes != lanes {
            self.prepare_fresh_stack(sched.now(), root_id, lanes);
        }

        loop {
            match self.work_loop_concurrent(sched) {
                Ok(()) => break,
                Err(thrown) => self.handle_error(thrown),
            }
        }

        self.context = previous;
        if self.wip.is_some() {
            self.tracer.render(&RenderEvent {
                root: root_id,
                lanes,
                kind: RenderEventKind::Yield,
                timestamp: sched.now(),
            });
            return RootExitStatus::Incomplete;
        }

        self.wip_root = None;
        self.wip_root_render_lanes = Lanes::NONE;
        self.trace_render_finished(sched.now(), root_id, lanes);
        self.wip_root_exit_status
    }

    fn trace_render_finished(&self, now: HostTime, root: RootId, lanes: Lanes) {
        let kind = match self.wip_root_exit_status {
            RootExitStatus::Completed => RenderEventKind::Complete,
            RootExitStatus::Suspended => RenderEventKind::Suspended,
            RootExitStatus::Errored | RootExitStatus::FatalErrored => RenderEventKind::Errored,
            RootExitStatus::Incomplete => return,
        };
        self.tracer.render(&RenderEvent {
            root,
            lanes,
            kind,
            timestamp: now,
        });
    }

    fn work_loop_sync(&mut self) -> Result<(), Thrown> {
        while let Some(unit) = self.wip {
            self.perform_unit_of_work(unit)?;
        }
        Ok(())
    }

    fn work_loop_concurrent(&mut self, sched: &Sched<H>) -> Result<(), Thrown> {
        while let Some(unit) = self.wip {
            if sched.should_yield() {
                break;
            }
            self.perform_unit_of_work(unit)?;
        }
        Ok(())
    }

    fn perform_unit_of_work(&mut self, unit: NodeId) -> Result<(), Thrown> {
        let current = self.fibers[unit].alternate;
        let next = self.begin_work(current, unit, self.wip_root_render_lanes)?;
        let props = self.fibers[unit].pending_props.clone();
        self.fibers[unit].memoized_props = props;
        match next {
            Some(child) => self.wip = Some(child),
            None => self.complete_unit_of_work(unit),
        }
        Ok(())
    }

    /// Resets render state and creates the in-progress root for `lanes`.
    fn prepare_fresh_stack(&mut self, now: HostTime, root_id: RootId, lanes: Lanes) {
        self.discard_work_in_progress(now);
        let Some(root) = self.roots.get_mut(&root_id) else {
            return;
        };
        root.finished_work = None;
        root.finished_lanes = Lanes::NONE;
        let current = root.current;
        let wip = create_work_in_progress(&mut self.fibers, current, FiberProps::None);

        self.wip_root = Some(root_id);
        self.wip = Some(wip);
        self.wip_root_render_lanes = lanes;
        self.wip_root_included_lanes = lanes;
        self.tracer.render(&RenderEvent {
            root: root_id,
            lanes,
            kind: RenderEventKind::Start,
            timestamp: now,
        });
    }

    /// Drops the render in progress, if any.
    pub(crate) fn discard_work_in_progress(&mut self, now: HostTime) {
        if let (Some(root), Some(_)) = (self.wip_root, self.wip) {
            self.tracer.render(&RenderEvent {
                root,
                lanes: self.wip_root_render_lanes,
                kind: RenderEventKind::Interrupted,
                timestamp: now,
            });
        }
        self.wip_root = None;
        self.wip = None;
        self.wip_root_render_lanes = Lanes::NONE;
        self.wip_root_included_lanes = Lanes::NONE;
        self.wip_root_exit_status = RootExitStatus::Incomplete;
        self.wip_root_fatal_error = None;
        self.wip_root_updated_lanes = Lanes::NONE;
        self.wip_root_pinged_lanes = Lanes::NONE;
        self.effects.clear();
    }

    /// Routes a fault raised by the current work unit.
    fn handle_error(&mut self, thrown: Thrown) {
        let Some(errored) = self.wip else {
            return;
        };
        let Some(parent) = self.fibers[errored].parent else {
            // The root node itself failed; nothing above it can capture.
            self.wip_root_exit_status = RootExitStatus::FatalErrored;
            self.wip_root_fatal_error = Some(match thrown {
                Thrown::Error(error) => error,
                Thrown::Pending(_) => ComponentError::new("#root", "root suspended"),
            });
            self.wip = None;
            return;
        };
        if self.throw_exception(parent, errored, thrown) {
            self.complete_unit_of_work(errored);
        } else {
            self.wip = None;
        }
    }
}
