// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][format] JSON to the given writer.
//!
//! Scheduler tasks appear on thread 0 of each root's process, renders and
//! commits on thread 1. Commit passes are nested `B`/`E` slices inside the
//! commit slice.
//!
//! [format]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use canopy_core::time::HostTime;
use canopy_core::trace::TaskEventKind;

use crate::recorder::{RecordedEvent, decode};

const SCHEDULER_TID: u32 = 0;
const RENDER_TID: u32 = 1;

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::Task(e) => {
                let ph = match e.kind {
                    TaskEventKind::Start => "B",
                    TaskEventKind::Yield | TaskEventKind::Complete => "E",
                    TaskEventKind::Scheduled | TaskEventKind::Cancel => "i",
                };
                let mut event = json!({
                    "ph": ph,
                    "name": format!("task {}", e.task.0),
                    "cat": "Scheduler",
                    "ts": us(e.timestamp),
                    "pid": 0,
                    "tid": SCHEDULER_TID,
                    "args": {
                        "priority": e.priority.name(),
                        "kind": format!("{:?}", e.kind),
                    }
                });
                if ph == "i" {
                    event["s"] = json!("t");
                }
                events.push(event);
            }
            RecordedEvent::LanesScheduled(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "LanesScheduled",
                    "cat": "Lanes",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                    "s": "p",
                    "args": {
                        "lanes": format!("{:?}", e.lanes),
                        "priority": format!("{:?}", e.priority),
                    }
                }));
            }
            RecordedEvent::Render(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": format!("Render{:?}", e.kind),
                    "cat": "Render",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                    "s": "t",
                    "args": {
                        "lanes": format!("{:?}", e.lanes),
                    }
                }));
            }
            RecordedEvent::CommitBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": "Commit",
                    "cat": "Commit",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                    "args": {
                        "lanes": format!("{:?}", e.lanes),
                    }
                }));
            }
            RecordedEvent::CommitEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": "Commit",
                    "cat": "Commit",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                    "args": {
                        "effects": e.effect_count,
                        "remaining_lanes": format!("{:?}", e.remaining_lanes),
                    }
                }));
            }
            RecordedEvent::PhaseBegin(e) => {
                events.push(json!({
                    "ph": "B",
                    "name": e.phase.name(),
                    "cat": "Commit",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                }));
            }
            RecordedEvent::PhaseEnd(e) => {
                events.push(json!({
                    "ph": "E",
                    "name": e.phase.name(),
                    "cat": "Commit",
                    "ts": us(e.timestamp),
                    "pid": e.root.0,
                    "tid": RENDER_TID,
                }));
            }
            RecordedEvent::CommitSummary(s) => {
                events.push(json!({
                    "ph": "i",
                    "name": "CommitSummary",
                    "cat": "Summary",
                    "ts": us(s.started),
                    "pid": s.root.0,
                    "tid": RENDER_TID,
                    "s": "p",
                    "args": {
                        "lanes": format!("{:?}", s.lanes),
                        "before_mutation_us": nanos_to_us(s.before_mutation_nanos),
                        "mutation_us": nanos_to_us(s.mutation_nanos),
                        "layout_us": nanos_to_us(s.layout_nanos),
                        "effects": s.effect_count,
                        "errors": s.error_count,
                    }
                }));
            }
            RecordedEvent::EffectCounts {
                root,
                placements,
                updates,
                deletions,
            } => {
                events.push(json!({
                    "ph": "C",
                    "name": "Effects",
                    "cat": "Rich",
                    "ts": 0,
                    "pid": root.0,
                    "tid": RENDER_TID,
                    "args": {
                        "placements": placements,
                        "updates": updates,
                        "deletions": deletions,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn us(t: HostTime) -> f64 {
    nanos_to_us(t.nanos())
}

fn nanos_to_us(nanos: u64) -> f64 {
    nanos as f64 / 1000.0
}
