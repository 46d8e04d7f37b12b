// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps
//! are printed in microseconds.

use std::io::Write;

use canopy_core::root::RootId;
use canopy_core::time::HostTime;
use canopy_core::trace::{
    CommitBeginEvent, CommitEndEvent, CommitSummary, EffectKind, EffectRecord,
    LanesScheduledEvent, PhaseBeginEvent, PhaseEndEvent, RenderEvent, RenderEventKind, TaskEvent,
    TaskEventKind, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its destination.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn us(t: HostTime) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}

fn task_kind(kind: TaskEventKind) -> &'static str {
    match kind {
        TaskEventKind::Scheduled => "scheduled",
        TaskEventKind::Start => "start",
        TaskEventKind::Yield => "yield",
        TaskEventKind::Complete => "complete",
        TaskEventKind::Cancel => "cancel",
    }
}

fn render_kind(kind: RenderEventKind) -> &'static str {
    match kind {
        RenderEventKind::Start => "start",
        RenderEventKind::Yield => "yield",
        RenderEventKind::Interrupted => "interrupted",
        RenderEventKind::Suspended => "suspended",
        RenderEventKind::Errored => "errored",
        RenderEventKind::Complete => "complete",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_task(&mut self, e: &TaskEvent) {
        let _ = writeln!(
            self.writer,
            "[task:{}] id={} priority={} at {:.1}µs",
            task_kind(e.kind),
            e.task.0,
            e.priority.name(),
            us(e.timestamp),
        );
    }

    fn on_lanes_scheduled(&mut self, e: &LanesScheduledEvent) {
        let _ = writeln!(
            self.writer,
            "[lanes] root={} lanes={:?} priority={:?} at {:.1}µs",
            e.root.0,
            e.lanes,
            e.priority,
            us(e.timestamp),
        );
    }

    fn on_render(&mut self, e: &RenderEvent) {
        let _ = writeln!(
            self.writer,
            "[render:{}] root={} lanes={:?} at {:.1}µs",
            render_kind(e.kind),
            e.root.0,
            e.lanes,
            us(e.timestamp),
        );
    }

    fn on_commit_begin(&mut self, e: &CommitBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[commit:begin] root={} lanes={:?} at {:.1}µs",
            e.root.0,
            e.lanes,
            us(e.timestamp),
        );
    }

    fn on_commit_end(&mut self, e: &CommitEndEvent) {
        let _ = writeln!(
            self.writer,
            "[commit:end] root={} effects={} remaining={:?} at {:.1}µs",
            e.root.0,
            e.effect_count,
            e.remaining_lanes,
            us(e.timestamp),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] root={} {} at {:.1}µs",
            e.root.0,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] root={} {} at {:.1}µs",
            e.root.0,
            e.phase.name(),
            us(e.timestamp),
        );
    }

    fn on_commit_summary(&mut self, s: &CommitSummary) {
        let errors = if s.error_count == 0 {
            String::from("ok")
        } else {
            format!("{} FAILED", s.error_count)
        };
        let _ = writeln!(
            self.writer,
            "[summary] root={} lanes={:?} before_mutation={:.1}µs mutation={:.1}µs \
             layout={:.1}µs effects={} errors={errors}",
            s.root.0,
            s.lanes,
            nanos_to_us(s.before_mutation_nanos),
            nanos_to_us(s.mutation_nanos),
            nanos_to_us(s.layout_nanos),
            s.effect_count,
        );
    }

    fn on_effects(&mut self, root: RootId, effects: &[EffectRecord]) {
        let count = |kind: EffectKind| effects.iter().filter(|e| e.kind == kind).count();
        let _ = writeln!(
            self.writer,
            "[effects] root={} placements={} updates={} deletions={}",
            root.0,
            count(EffectKind::Placement),
            count(EffectKind::Update),
            count(EffectKind::Deletion),
        );
    }
}
