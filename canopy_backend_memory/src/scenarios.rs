// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end scenarios: the engine driving a [`MemoryHost`].

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use canopy_core::clock::ManualClock;
use canopy_core::component::{
    ClassComponent, Component, FunctionComponent, LifecycleContext, Poll, RenderContext,
    StateHandle,
};
use canopy_core::element::{Element, component, host};
use canopy_core::engine::Engine;
use canopy_core::error::ComponentError;
use canopy_core::host::HostConfig as _;
use canopy_core::lane::{EventPriority, Lanes};
use canopy_core::props::{Props, State, Value};
use canopy_core::root::{RootId, RootOptions};
use canopy_core::time::Duration;
use kurbo::{Point, Rect};

use crate::{MemoryHost, MutationStats, NodeHandle};

fn mount(options: RootOptions) -> (Engine<MemoryHost>, NodeHandle, RootId, ManualClock) {
    let clock = ManualClock::new();
    let mut host = MemoryHost::new();
    let container = host.create_container();
    let mut engine = Engine::new(host, Box::new(clock.clone()));
    let root = engine.create_root(container, options);
    (engine, container, root, clock)
}

fn rows(keys: impl IntoIterator<Item = u32>) -> Element {
    Element::list(keys.into_iter().map(|k| {
        host("row")
            .key(format!("{k}"))
            .prop("id", i64::from(k))
            .child(Element::text(format!("{k}")))
            .build()
    }))
}

#[test]
fn reversing_a_keyed_list_moves_without_recreating() {
    let (mut engine, container, root, _) = mount(RootOptions::LEGACY);
    engine.render(root, rows(0..8)).unwrap();
    assert_eq!(engine.host().text_content(container), "01234567");
    let first: Vec<NodeHandle> = engine.host().children(container).to_vec();
    engine.host_mut().reset_stats();

    engine.render(root, rows((0..8).rev())).unwrap();
    let host = engine.host();
    assert_eq!(host.text_content(container), "76543210");
    let stats = host.stats();
    assert_eq!(stats.created, 0);
    assert_eq!(stats.removed, 0);
    // One row stays put; every other row moves once.
    assert_eq!(stats.placements(), 7, "{stats:?}");
    let mut reordered: Vec<NodeHandle> = host.children(container).to_vec();
    reordered.reverse();
    assert_eq!(reordered, first);
}

#[test]
fn first_mount_clears_preexisting_content() {
    let clock = ManualClock::new();
    let mut host = MemoryHost::new();
    let container = host.create_container();
    let stale = host.create_text_instance("server markup");
    host.append_child(&container, &stale).unwrap();

    let mut engine = Engine::new(host, Box::new(clock));
    let root = engine.create_root(container, RootOptions::LEGACY);
    engine.render(root, host_tree("fresh")).unwrap();
    assert_eq!(engine.host().to_markup(container), "<p>fresh</p>");
    assert_eq!(engine.host().parent(stale), None);
}

fn host_tree(text: &str) -> Element {
    host("p").child(Element::text(String::from(text))).build()
}

#[test]
fn every_commit_is_bracketed_once() {
    let (mut engine, container, root, _) = mount(RootOptions::LEGACY);
    for text in ["a", "b", "c"] {
        engine.render(root, host_tree(text)).unwrap();
    }
    assert_eq!(engine.host().stats().commits, 3);
    assert_eq!(engine.host().stats().text_updated, 2);

    engine.unmount(root).unwrap();
    assert_eq!(engine.host().to_markup(container), "");
    assert_eq!(engine.host().stats().commits, 4);
}

#[test]
fn attribute_removal_reaches_the_host() {
    let (mut engine, container, root, _) = mount(RootOptions::LEGACY);
    engine
        .render(root, host("div").prop("class", "a").prop("title", "t"))
        .unwrap();
    engine.render(root, host("div").prop("class", "b")).unwrap();
    assert_eq!(engine.host().to_markup(container), "<div class=\"b\"></div>");
    assert_eq!(
        engine.host().stats(),
        MutationStats {
            created: 1,
            updated: 1,
            appended: 1,
            commits: 2,
            ..MutationStats::default()
        }
    );
}

#[test]
fn host_event_priority_picks_the_lane() {
    let (mut engine, container, root, _) = mount(RootOptions::CONCURRENT);
    engine.render(root, Element::text("idle")).unwrap();
    let pending = engine.pending_lanes(root).unwrap();
    assert!(pending.includes_some(Lanes::DEFAULT), "{pending:?}");
    engine.run_until_idle().unwrap();

    engine.host_mut().set_event_priority(EventPriority::Discrete);
    engine.render(root, Element::text("clicked")).unwrap();
    let pending = engine.pending_lanes(root).unwrap();
    assert!(pending.includes_some(Lanes::INPUT_DISCRETE), "{pending:?}");
    engine.host_mut().set_event_priority(EventPriority::Default);

    engine.run_until_idle().unwrap();
    assert_eq!(engine.host().text_content(container), "clicked");
}

/// A button that counts its presses.
struct Counter {
    handle: Rc<RefCell<Option<StateHandle>>>,
}

impl Component for Counter {
    fn name(&self) -> &str {
        "Counter"
    }

    fn initial_state(&self, _props: &Props) -> State {
        State::new().with("count", 0_i64)
    }

    fn render(&self, cx: &RenderContext<'_>) -> Result<Poll<Element>, ComponentError> {
        let count = cx.state.get("count").and_then(Value::as_int).unwrap_or(0);
        Ok(Poll::Ready(
            host("panel")
                .prop(MemoryHost::FRAME, Rect::new(0.0, 0.0, 200.0, 100.0))
                .child(
                    host("button")
                        .prop("id", "increment")
                        .prop(MemoryHost::FRAME, Rect::new(10.0, 10.0, 60.0, 40.0))
                        .child(Element::text(format!("{count}"))),
                )
                .build(),
        ))
    }

    fn did_mount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
        *self.handle.borrow_mut() = Some(cx.handle.clone());
        Ok(())
    }
}

#[test]
fn clicks_route_through_hit_testing() {
    let (mut engine, container, root, _) = mount(RootOptions::CONCURRENT);
    let handle = Rc::new(RefCell::new(None));
    let counter = ClassComponent::new(Counter {
        handle: Rc::clone(&handle),
    });
    engine.render(root, component(counter)).unwrap();
    engine.run_until_idle().unwrap();
    assert_eq!(engine.host().text_content(container), "0");

    for _ in 0..2 {
        let target = engine
            .host()
            .hit_test(container, Point::new(20.0, 20.0))
            .unwrap();
        assert_eq!(
            engine.host().props(target).and_then(|p| p.get("id")),
            Some(&Value::from("increment"))
        );
        let handle = handle.borrow().clone().unwrap();
        engine
            .dispatch_event(EventPriority::Discrete, |_| {
                handle.update(|state, _| {
                    let count = state.get("count").and_then(Value::as_int).unwrap_or(0);
                    Some(State::new().with("count", count + 1))
                });
            })
            .unwrap();
        let pending = engine.pending_lanes(root).unwrap();
        assert!(pending.includes_some(Lanes::INPUT_DISCRETE), "{pending:?}");
        engine.run_until_idle().unwrap();
    }
    assert_eq!(engine.host().text_content(container), "2");

    // Outside the panel nothing is hit.
    assert_eq!(engine.host().hit_test(container, Point::new(250.0, 20.0)), None);
}

#[test]
fn sliced_render_leaves_the_host_untouched_until_commit() {
    let (mut engine, container, root, clock) = mount(RootOptions::CONCURRENT);
    let slow_clock = clock.clone();
    let slow = FunctionComponent::pure("Slow", move |props, _| {
        slow_clock.advance(Duration::from_millis(2));
        Element::text(format!("{}", props.get("i").and_then(Value::as_int).unwrap_or(0)))
    });
    let items: Vec<Element> = (0..12_i64)
        .map(|i| component(slow.clone()).key(format!("{i}")).prop("i", i).build())
        .collect();
    engine.render(root, Element::list(items)).unwrap();

    let mut slices = 0;
    while engine.host().stats().commits == 0 {
        assert_eq!(engine.host().to_markup(container), "");
        assert!(slices < 100, "the render never committed");
        engine.flush().unwrap();
        slices += 1;
    }
    assert!(slices > 1, "the render was split into {slices} slices");
    engine.run_until_idle().unwrap();
    assert_eq!(engine.host().stats().commits, 1);
    assert_eq!(engine.host().text_content(container), "01234567891011");
}

#[test]
fn framed_rows_resolve_to_absolute_bounds() {
    let (mut engine, container, root, _) = mount(RootOptions::LEGACY);
    let list = host("list")
        .prop(MemoryHost::FRAME, Rect::new(0.0, 100.0, 300.0, 400.0))
        .children((0..3_u32).map(|i| {
            let y = f64::from(i) * 20.0;
            host("row")
                .key(format!("{i}"))
                .prop("id", i64::from(i))
                .prop(MemoryHost::FRAME, Rect::new(0.0, y, 300.0, y + 20.0))
                .build()
        }))
        .build();
    engine.render(root, list).unwrap();

    let host = engine.host();
    let hit = host.hit_test(container, Point::new(5.0, 145.0)).unwrap();
    assert_eq!(host.props(hit).and_then(|p| p.get("id")), Some(&Value::Int(2)));
    assert_eq!(
        host.absolute_frame(hit),
        Some(Rect::new(0.0, 140.0, 300.0, 160.0))
    );
    let rows = host.find_all(container, "id", &Value::Int(1));
    assert_eq!(rows.len(), 1);
}
