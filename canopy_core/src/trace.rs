// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the scheduler and the work loop.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that
//! engine instrumentation calls at each stage. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] is a cloneable handle to an optional shared sink. The scheduler
//! and the reconciler each hold a clone. When the `trace` feature is **off**,
//! every `Tracer` method compiles to nothing (zero overhead). When **on**,
//! each method performs a single `Option` branch before dispatching.
//!
//! [`CommitSummaryBuilder`] is a convenience helper that collects phase
//! timestamps during a commit and produces a [`CommitSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`EffectRecord`] events plus the
//!   corresponding `TraceSink` method.

#[cfg(feature = "trace")]
use alloc::rc::Rc;
#[cfg(feature = "trace")]
use core::cell::RefCell;

use crate::lane::{LanePriority, Lanes};
use crate::root::RootId;
use crate::scheduler::{Priority, TaskId};
use crate::time::HostTime;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which pass of the commit pipeline is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Snapshots taken before the host tree changes.
    BeforeMutation,
    /// Host insertions, updates and removals.
    Mutation,
    /// Lifecycle callbacks and ref attachment after the tree swap.
    Layout,
    /// Deferred passive effects.
    Passive,
}

impl PhaseKind {
    /// All phases in execution order.
    pub const ALL: [Self; 4] = [
        Self::BeforeMutation,
        Self::Mutation,
        Self::Layout,
        Self::Passive,
    ];

    /// Short lowercase name, used by text and JSON exporters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeMutation => "before_mutation",
            Self::Mutation => "mutation",
            Self::Layout => "layout",
            Self::Passive => "passive",
        }
    }
}

/// What happened to a scheduler task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskEventKind {
    /// The task was queued.
    Scheduled,
    /// The task's callback started running.
    Start,
    /// The callback returned a continuation.
    Yield,
    /// The callback finished and the task was removed.
    Complete,
    /// The task was cancelled.
    Cancel,
}

/// What happened to a render of a root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderEventKind {
    /// A render began (possibly resuming earlier progress).
    Start,
    /// A time-sliced render yielded to the host.
    Yield,
    /// An in-progress render was discarded and restarted.
    Interrupted,
    /// A render could not finish because a dependency is not ready.
    Suspended,
    /// A render hit a fault.
    Errored,
    /// The render finished and its tree is ready to commit.
    Complete,
}

/// Kind of host mutation applied during the mutation pass.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EffectKind {
    /// A node was inserted or moved.
    Placement,
    /// A node's attributes or text changed.
    Update,
    /// A subtree was removed.
    Deletion,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted at each step of a scheduler task's life.
#[derive(Clone, Copy, Debug)]
pub struct TaskEvent {
    /// The task.
    pub task: TaskId,
    /// The task's priority.
    pub priority: Priority,
    /// What happened.
    pub kind: TaskEventKind,
    /// Host time of the event.
    pub timestamp: HostTime,
}

/// Emitted when a root's pending lanes get a scheduler callback.
#[derive(Clone, Copy, Debug)]
pub struct LanesScheduledEvent {
    /// The root.
    pub root: RootId,
    /// Lanes the callback will render.
    pub lanes: Lanes,
    /// Band priority of those lanes.
    pub priority: LanePriority,
    /// Host time of the event.
    pub timestamp: HostTime,
}

/// Emitted at each step of a render.
#[derive(Clone, Copy, Debug)]
pub struct RenderEvent {
    /// The root being rendered.
    pub root: RootId,
    /// Lanes being rendered.
    pub lanes: Lanes,
    /// What happened.
    pub kind: RenderEventKind,
    /// Host time of the event.
    pub timestamp: HostTime,
}

/// Marks the beginning of a commit.
#[derive(Clone, Copy, Debug)]
pub struct CommitBeginEvent {
    /// The root being committed.
    pub root: RootId,
    /// Lanes the finished tree contains.
    pub lanes: Lanes,
    /// Host time at the start of the commit.
    pub timestamp: HostTime,
}

/// Marks the end of a commit.
#[derive(Clone, Copy, Debug)]
pub struct CommitEndEvent {
    /// The root that was committed.
    pub root: RootId,
    /// Lanes still pending after the commit.
    pub remaining_lanes: Lanes,
    /// Number of nodes in the effect list.
    pub effect_count: u32,
    /// Host time at the end of the commit.
    pub timestamp: HostTime,
}

/// Marks the beginning of a commit pass.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// The root being committed.
    pub root: RootId,
    /// Which pass is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the pass.
    pub timestamp: HostTime,
}

/// Marks the end of a commit pass.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// The root being committed.
    pub root: RootId,
    /// Which pass is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the pass.
    pub timestamp: HostTime,
}

/// Per-commit timing summary produced by [`CommitSummaryBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct CommitSummary {
    /// The committed root.
    pub root: RootId,
    /// Lanes the committed tree contained.
    pub lanes: Lanes,
    /// Host time the commit started.
    pub started: HostTime,
    /// Before-mutation pass duration in nanoseconds (0 if not measured).
    pub before_mutation_nanos: u64,
    /// Mutation pass duration in nanoseconds (0 if not measured).
    pub mutation_nanos: u64,
    /// Layout pass duration in nanoseconds (0 if not measured).
    pub layout_nanos: u64,
    /// Number of nodes in the effect list.
    pub effect_count: u32,
    /// Number of effects that failed.
    pub error_count: u32,
}

/// A per-commit host mutation record.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct EffectRecord {
    /// Arena index of the node the effect applies to.
    pub node_index: u32,
    /// Which mutation was applied.
    pub kind: EffectKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the engine.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at each step of a scheduler task.
    fn on_task(&mut self, e: &TaskEvent) {
        _ = e;
    }

    /// Called when a root's lanes are handed to the scheduler.
    fn on_lanes_scheduled(&mut self, e: &LanesScheduledEvent) {
        _ = e;
    }

    /// Called at each step of a render.
    fn on_render(&mut self, e: &RenderEvent) {
        _ = e;
    }

    /// Called when a commit starts.
    fn on_commit_begin(&mut self, e: &CommitBeginEvent) {
        _ = e;
    }

    /// Called when a commit ends.
    fn on_commit_end(&mut self, e: &CommitEndEvent) {
        _ = e;
    }

    /// Called at the beginning of a commit pass.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a commit pass.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called with a per-commit timing summary.
    fn on_commit_summary(&mut self, s: &CommitSummary) {
        _ = s;
    }

    /// Called with the host mutations of a commit (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    fn on_effects(&mut self, root: RootId, effects: &[EffectRecord]) {
        _ = (root, effects);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer handle
// ---------------------------------------------------------------------------

/// Cloneable handle to an optional shared [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing.
/// When **on**, each method checks the inner `Option` (one branch) before
/// borrowing the sink and dispatching to it. Sinks must not call back into
/// the engine.
#[derive(Clone, Default)]
pub struct Tracer {
    #[cfg(feature = "trace")]
    sink: Option<Rc<RefCell<dyn TraceSink>>>,
}

impl core::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! dispatch {
    ($self:ident, $method:ident, $($arg:expr),+) => {{
        #[cfg(feature = "trace")]
        if let Some(sink) = &$self.sink {
            sink.borrow_mut().$method($($arg),+);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = ($($arg),+);
        }
    }};
}

impl Tracer {
    /// Creates a tracer that dispatches to the given sink.
    #[cfg(feature = "trace")]
    #[inline]
    #[must_use]
    pub fn new(sink: Rc<RefCell<dyn TraceSink>>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if events reach a sink.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }

    /// Emits a [`TaskEvent`].
    #[inline]
    pub fn task(&self, e: &TaskEvent) {
        dispatch!(self, on_task, e);
    }

    /// Emits a [`LanesScheduledEvent`].
    #[inline]
    pub fn lanes_scheduled(&self, e: &LanesScheduledEvent) {
        dispatch!(self, on_lanes_scheduled, e);
    }

    /// Emits a [`RenderEvent`].
    #[inline]
    pub fn render(&self, e: &RenderEvent) {
        dispatch!(self, on_render, e);
    }

    /// Emits a [`CommitBeginEvent`].
    #[inline]
    pub fn commit_begin(&self, e: &CommitBeginEvent) {
        dispatch!(self, on_commit_begin, e);
    }

    /// Emits a [`CommitEndEvent`].
    #[inline]
    pub fn commit_end(&self, e: &CommitEndEvent) {
        dispatch!(self, on_commit_end, e);
    }

    /// Emits a [`PhaseBeginEvent`].
    #[inline]
    pub fn phase_begin(&self, e: &PhaseBeginEvent) {
        dispatch!(self, on_phase_begin, e);
    }

    /// Emits a [`PhaseEndEvent`].
    #[inline]
    pub fn phase_end(&self, e: &PhaseEndEvent) {
        dispatch!(self, on_phase_end, e);
    }

    /// Emits a [`CommitSummary`].
    #[inline]
    pub fn commit_summary(&self, s: &CommitSummary) {
        dispatch!(self, on_commit_summary, s);
    }

    /// Emits the host mutations of a commit (requires `trace-rich`).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn effects(&self, root: RootId, effects: &[EffectRecord]) {
        if let Some(sink) = &self.sink {
            sink.borrow_mut().on_effects(root, effects);
        }
    }
}

// ---------------------------------------------------------------------------
// CommitSummaryBuilder
// ---------------------------------------------------------------------------

/// Collects pass timestamps during a commit and produces a [`CommitSummary`].
#[derive(Debug)]
pub struct CommitSummaryBuilder {
    root: RootId,
    lanes: Lanes,
    started: HostTime,
    phase_starts: [Option<HostTime>; 4],
    phase_ends: [Option<HostTime>; 4],
    effect_count: u32,
    error_count: u32,
}

impl CommitSummaryBuilder {
    /// Starts building a summary for a commit of `lanes` on `root`.
    #[must_use]
    pub fn new(root: RootId, lanes: Lanes, started: HostTime) -> Self {
        Self {
            root,
            lanes,
            started,
            phase_starts: [None; 4],
            phase_ends: [None; 4],
            effect_count: 0,
            error_count: 0,
        }
    }

    /// Records the start of a pass.
    pub fn phase_begin(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_starts[phase_index(phase)] = Some(t);
    }

    /// Records the end of a pass.
    pub fn phase_end(&mut self, phase: PhaseKind, t: HostTime) {
        self.phase_ends[phase_index(phase)] = Some(t);
    }

    /// Sets the number of nodes in the effect list.
    pub fn set_effect_count(&mut self, count: u32) {
        self.effect_count = count;
    }

    /// Sets the number of failed effects.
    pub fn set_error_count(&mut self, count: u32) {
        self.error_count = count;
    }

    /// Consumes the builder and produces the final [`CommitSummary`].
    #[must_use]
    pub fn finish(self) -> CommitSummary {
        CommitSummary {
            root: self.root,
            lanes: self.lanes,
            started: self.started,
            before_mutation_nanos: self.phase_duration(PhaseKind::BeforeMutation),
            mutation_nanos: self.phase_duration(PhaseKind::Mutation),
            layout_nanos: self.phase_duration(PhaseKind::Layout),
            effect_count: self.effect_count,
            error_count: self.error_count,
        }
    }

    fn phase_duration(&self, phase: PhaseKind) -> u64 {
        let idx = phase_index(phase);
        match (self.phase_starts[idx], self.phase_ends[idx]) {
            (Some(start), Some(end)) => end.saturating_duration_since(start).nanos(),
            _ => 0,
        }
    }
}

/// Maps a [`PhaseKind`] to an array index.
const fn phase_index(phase: PhaseKind) -> usize {
    match phase {
        PhaseKind::BeforeMutation => 0,
        PhaseKind::Mutation => 1,
        PhaseKind::Layout => 2,
        PhaseKind::Passive => 3,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> TaskEvent {
        TaskEvent {
            task: TaskId(7),
            priority: Priority::Normal,
            kind: TaskEventKind::Start,
            timestamp: HostTime(1_000),
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_task(&sample_task());
        sink.on_commit_summary(&CommitSummary {
            root: RootId(0),
            lanes: Lanes::SYNC,
            started: HostTime(0),
            before_mutation_nanos: 0,
            mutation_nanos: 0,
            layout_nanos: 0,
            effect_count: 0,
            error_count: 0,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let tracer = Tracer::none();
        assert!(!tracer.is_enabled());
        tracer.task(&sample_task());
        tracer.render(&RenderEvent {
            root: RootId(0),
            lanes: Lanes::DEFAULT,
            kind: RenderEventKind::Start,
            timestamp: HostTime(0),
        });
    }

    #[test]
    fn summary_builder_computes_durations() {
        let mut builder = CommitSummaryBuilder::new(RootId(3), Lanes::SYNC, HostTime(1_000));

        builder.phase_begin(PhaseKind::BeforeMutation, HostTime(1_000));
        builder.phase_end(PhaseKind::BeforeMutation, HostTime(1_100));
        builder.phase_begin(PhaseKind::Mutation, HostTime(1_100));
        builder.phase_end(PhaseKind::Mutation, HostTime(1_500));
        builder.phase_begin(PhaseKind::Layout, HostTime(1_500));
        builder.phase_end(PhaseKind::Layout, HostTime(3_000));
        builder.set_effect_count(4);

        let summary = builder.finish();
        assert_eq!(summary.root, RootId(3));
        assert_eq!(summary.before_mutation_nanos, 100);
        assert_eq!(summary.mutation_nanos, 400);
        assert_eq!(summary.layout_nanos, 1500);
        assert_eq!(summary.effect_count, 4);
        assert_eq!(summary.error_count, 0);
    }

    #[test]
    fn summary_builder_missing_phases_are_zero() {
        let builder = CommitSummaryBuilder::new(RootId(0), Lanes::DEFAULT, HostTime(0));
        let summary = builder.finish();
        assert_eq!(summary.before_mutation_nanos, 0);
        assert_eq!(summary.mutation_nanos, 0);
        assert_eq!(summary.layout_nanos, 0);
    }

    #[test]
    fn phase_names_are_distinct() {
        let names = PhaseKind::ALL.map(PhaseKind::name);
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[cfg(feature = "trace")]
    #[test]
    fn tracer_dispatches_to_shared_sink() {
        use alloc::vec::Vec;

        #[derive(Default)]
        struct RecordingSink {
            tasks: Vec<TaskId>,
        }
        impl TraceSink for RecordingSink {
            fn on_task(&mut self, e: &TaskEvent) {
                self.tasks.push(e.task);
            }
        }

        let sink = Rc::new(RefCell::new(RecordingSink::default()));
        let tracer = Tracer::new(sink.clone());
        let clone = tracer.clone();
        tracer.task(&sample_task());
        clone.task(&sample_task());
        assert_eq!(sink.borrow().tasks, [TaskId(7), TaskId(7)]);
    }
}
