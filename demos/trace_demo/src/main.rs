// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated host loop that exercises the tracing and diagnostics pipeline.
//!
//! Mounts a keyed list of slow rows in a concurrent root and drives the
//! engine one scheduler slice per 16.6ms frame. Part way through the first
//! render a discrete "click" reverses the list, interrupting the default
//! render. Events go to both a
//! [`PrettyPrintSink`](canopy_debug::pretty::PrettyPrintSink) and a
//! [`RecorderSink`](canopy_debug::recorder::RecorderSink); the recording is
//! then exported as a Chrome trace JSON file.

use std::cell::RefCell;
use std::fs::File;
use std::io::BufWriter;
use std::rc::Rc;

use canopy_backend_memory::MemoryHost;
use canopy_core::clock::{Clock as _, ManualClock};
use canopy_core::component::FunctionComponent;
use canopy_core::element::{Element, component, host};
use canopy_core::engine::Engine;
use canopy_core::lane::EventPriority;
use canopy_core::props::Value;
use canopy_core::root::{RootId, RootOptions};
use canopy_core::time::{Duration, HostTime};
use canopy_core::trace::{
    CommitBeginEvent, CommitEndEvent, CommitSummary, EffectRecord, LanesScheduledEvent,
    PhaseBeginEvent, PhaseEndEvent, RenderEvent, TaskEvent, TraceSink, Tracer,
};

use canopy_debug::pretty::PrettyPrintSink;
use canopy_debug::recorder::RecorderSink;

const ROW_COUNT: u32 = 24;
const MAX_FRAMES: u32 = 120;
/// Frame at which the simulated click arrives.
const CLICK_FRAME: u32 = 2;
/// 16.6ms refresh interval (≈60 Hz).
const REFRESH_INTERVAL: Duration = Duration(16_666_667);
/// Simulated cost of rendering one row.
const ROW_COST: Duration = Duration::from_micros(700);

/// Forwards every event to a pretty printer and a recorder.
struct Tee {
    pretty: PrettyPrintSink,
    recorder: RecorderSink,
}

macro_rules! tee {
    ($($method:ident($ty:ty)),* $(,)?) => {
        $(
            fn $method(&mut self, e: &$ty) {
                self.pretty.$method(e);
                self.recorder.$method(e);
            }
        )*
    };
}

impl TraceSink for Tee {
    tee!(
        on_task(TaskEvent),
        on_lanes_scheduled(LanesScheduledEvent),
        on_render(RenderEvent),
        on_commit_begin(CommitBeginEvent),
        on_commit_end(CommitEndEvent),
        on_phase_begin(PhaseBeginEvent),
        on_phase_end(PhaseEndEvent),
        on_commit_summary(CommitSummary),
    );

    fn on_effects(&mut self, root: RootId, effects: &[EffectRecord]) {
        self.pretty.on_effects(root, effects);
        self.recorder.on_effects(root, effects);
    }
}

fn rows(row: &FunctionComponent, order: impl Iterator<Item = u32>) -> Element {
    Element::list(order.map(|i| {
        component(row.clone())
            .key(format!("row-{i}"))
            .prop("index", i64::from(i))
            .build()
    }))
}

fn main() {
    // -- sinks -------------------------------------------------------------
    let tee = Rc::new(RefCell::new(Tee {
        pretty: PrettyPrintSink::new(Box::new(std::io::stdout())),
        recorder: RecorderSink::new(),
    }));

    // -- engine ------------------------------------------------------------
    let clock = ManualClock::starting_at(HostTime(1_000_000_000));
    let mut memory_host = MemoryHost::new();
    let container = memory_host.create_container();
    let mut engine = Engine::new(memory_host, Box::new(clock.clone()));
    engine.set_tracer(Tracer::new(tee.clone()));
    assert!(engine.set_frame_rate(60), "60 fps is supported");

    let row_clock = clock.clone();
    let row = FunctionComponent::pure("Row", move |props, _| {
        row_clock.advance(ROW_COST);
        let index = props.get("index").and_then(Value::as_int).unwrap_or(0);
        host("li")
            .prop("index", index)
            .child(Element::text(format!("row {index}")))
            .build()
    });

    let root = engine.create_root(container, RootOptions::CONCURRENT);
    engine
        .render(root, host("ul").child(rows(&row, 0..ROW_COUNT)))
        .expect("render request failed");

    // -- simulated loop ----------------------------------------------------
    let mut frame = 0;
    while !engine.is_idle() && frame < MAX_FRAMES {
        let frame_start = clock.now();

        if frame == CLICK_FRAME {
            engine
                .dispatch_event(EventPriority::Discrete, |engine| {
                    engine.render(root, host("ul").child(rows(&row, (0..ROW_COUNT).rev())))
                })
                .expect("click dispatch failed")
                .expect("click render failed");
        }

        // One slice per frame; the rest of the frame belongs to the host.
        engine.flush().expect("scheduler slice failed");

        let next_frame = frame_start.saturating_add(REFRESH_INTERVAL);
        if clock.now() < next_frame {
            clock.set(next_frame);
        }
        frame += 1;
    }
    engine.flush_passive_effects().expect("passive effects failed");

    let stats = engine.host().stats();
    println!(
        "Committed after {frame} frames: {} created, {} placed, {} commits",
        stats.created,
        stats.placements(),
        stats.commits,
    );
    let markup = engine.host().to_markup(container);
    println!("Markup: {}…", markup.get(..48).unwrap_or(&markup));

    // -- export Chrome trace -----------------------------------------------
    drop(engine);
    let tee = Rc::try_unwrap(tee)
        .ok()
        .expect("the engine released its tracer")
        .into_inner();
    let path = "trace.json";
    let file = File::create(path).expect("failed to create trace.json");
    let mut writer = BufWriter::new(file);
    canopy_debug::chrome::export(tee.recorder.as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path}");
}
