// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The public engine: roots, entry points, and the host loop hooks.
//!
//! An [`Engine`] owns a scheduler and the reconciler it drives. The host
//! calls entry points ([`render`](Engine::render),
//! [`batched_updates`](Engine::batched_updates), ...) in response to its own
//! events and calls [`flush`](Engine::flush) from its event loop whenever
//! the engine has scheduled work.
//!
//! Errors raised while an entry point runs (including errors from work it
//! flushed synchronously) are returned by that entry point. When several
//! errors occur in one call, the first is returned and the rest stay queued:
//! each following entry point returns the next one before doing its own
//! work's result.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::fmt;

use crate::clock::Clock;
use crate::element::Element;
use crate::error::EngineError;
use crate::host::HostConfig;
use crate::lane::{EventPriority, Lanes};
use crate::root::{EngineConfig, RootId, RootOptions};
use crate::scheduler::{Priority, Scheduler};
use crate::time::HostTime;
use crate::trace::Tracer;
use crate::update_queue::UpdateCallback;
use crate::work_loop::{ExecutionContext, Reconciler, Sched};

/// A reconciliation engine bound to one host.
pub struct Engine<H: HostConfig> {
    scheduler: Sched<H>,
    reconciler: Reconciler<H>,
}

impl<H: HostConfig> fmt::Debug for Engine<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("roots", &self.reconciler.roots.len())
            .field("nodes", &self.reconciler.fibers.len())
            .field("now", &self.scheduler.now())
            .finish_non_exhaustive()
    }
}

impl<H: HostConfig> Engine<H> {
    /// Creates an engine with the default configuration.
    pub fn new(host: H, clock: Box<dyn Clock>) -> Self {
        Self::with_config(host, clock, EngineConfig::DEFAULT)
    }

    /// Creates an engine with `config`.
    pub fn with_config(host: H, clock: Box<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            scheduler: Scheduler::new(config.scheduler, clock),
            reconciler: Reconciler::new(host, config),
        }
    }

    /// Mounts an empty root over `container`.
    pub fn create_root(&mut self, container: H::Instance, options: RootOptions) -> RootId {
        self.reconciler.create_root(container, options)
    }

    /// Schedules `element` as the content of `root`.
    ///
    /// Legacy roots render and commit before this returns (unless called
    /// inside a batch). Concurrent roots render when the scheduler runs.
    pub fn render(&mut self, root: RootId, element: impl Into<Element>) -> Result<(), EngineError> {
        self.update_container(root, element.into(), None)
    }

    /// Like [`render`](Self::render), calling `callback` once the element
    /// has committed.
    pub fn render_then(
        &mut self,
        root: RootId,
        element: impl Into<Element>,
        callback: impl Fn() + 'static,
    ) -> Result<(), EngineError> {
        let callback = UpdateCallback::User(Rc::new(callback));
        self.update_container(root, element.into(), Some(callback))
    }

    fn update_container(
        &mut self,
        root: RootId,
        element: Element,
        callback: Option<UpdateCallback>,
    ) -> Result<(), EngineError> {
        let (flags, priority) = self.ambient_event();
        self.enter(flags, priority, |rec, sched| {
            rec.update_container(sched, root, element, callback)
        })?
    }

    /// Clears `root` synchronously and forgets it.
    pub fn unmount(&mut self, root: RootId) -> Result<(), EngineError> {
        if !self.reconciler.roots.contains_key(&root) {
            return Err(EngineError::UnknownRoot(root));
        }
        let cleared = self.flush_sync(|engine| engine.render(root, Element::Empty));
        self.reconciler.remove_root(&mut self.scheduler, root);
        cleared??;
        Ok(())
    }

    /// Runs `f` with updates batched: synchronous work is flushed once, when
    /// the outermost batch ends.
    pub fn batched_updates<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, EngineError> {
        self.nest(ExecutionContext::BATCHED, None, f)
    }

    /// Runs `f` as a discrete user event. Discrete updates left over from
    /// earlier events are flushed first.
    pub fn discrete_updates<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, EngineError> {
        if self.reconciler.context.is_empty() {
            self.reconciler
                .flush_pending_discrete_updates(&mut self.scheduler);
        }
        self.nest(
            ExecutionContext::DISCRETE_EVENT,
            Some(Priority::UserBlocking),
            f,
        )
    }

    /// Runs `f` as a host event of the given priority.
    pub fn dispatch_event<R>(
        &mut self,
        priority: EventPriority,
        f: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, EngineError> {
        match priority {
            EventPriority::Discrete => self.discrete_updates(f),
            _ => self.nest(
                ExecutionContext::BATCHED,
                Some(priority.scheduler_priority()),
                f,
            ),
        }
    }

    /// Runs `f` with its updates assigned to transition lanes.
    pub fn start_transition<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, EngineError> {
        let previous = core::mem::replace(&mut self.reconciler.is_transition, true);
        let out = self.nest(ExecutionContext::BATCHED, None, f);
        self.reconciler.is_transition = previous;
        out
    }

    /// Runs `f` and renders the synchronous work it scheduled before
    /// returning, even inside a batch.
    pub fn flush_sync<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Result<R, EngineError> {
        let previous_priority = self.scheduler.swap_priority(Priority::Immediate);
        let previous = self.reconciler.enter(ExecutionContext::BATCHED);
        let out = f(self);
        self.reconciler.leave(&mut self.scheduler, previous);
        if !previous.intersects(ExecutionContext::RENDER | ExecutionContext::COMMIT) {
            self.reconciler
                .flush_sync_callback_queue(&mut self.scheduler);
        }
        self.scheduler.swap_priority(previous_priority);
        self.finish(out)
    }

    /// Runs pending passive effects now. Returns `true` if any ran.
    pub fn flush_passive_effects(&mut self) -> Result<bool, EngineError> {
        self.enter(ExecutionContext::empty(), None, |rec, sched| {
            rec.flush_passive_effects(sched)
        })
    }

    /// Runs one scheduler slice. Returns `true` when ready work remains.
    ///
    /// Requests made through state handles or dependency resolution since
    /// the last entry point are dispatched first, at the host's current
    /// event priority.
    pub fn flush(&mut self) -> Result<bool, EngineError> {
        let (flags, priority) = self.ambient_event();
        self.enter(flags, priority, |rec, sched| rec.drain_inbox(sched))?;
        let more = self.scheduler.flush(&mut self.reconciler);
        self.finish(more)
    }

    /// Flushes until no ready work remains. Stops at the first error.
    pub fn run_until_idle(&mut self) -> Result<(), EngineError> {
        while self.flush()? {}
        Ok(())
    }

    /// Returns `true` if no scheduler task is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    /// When the host should wake up for the earliest delayed task.
    #[must_use]
    pub fn next_timer_deadline(&self) -> Option<HostTime> {
        self.scheduler.next_timer_deadline()
    }

    /// Adjusts the scheduler's slice length to a frame rate. See
    /// [`Scheduler::set_frame_rate`].
    pub fn set_frame_rate(&mut self, fps: u32) -> bool {
        self.scheduler.set_frame_rate(fps)
    }

    /// Current host time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.scheduler.now()
    }

    /// The host renderer.
    #[must_use]
    pub fn host(&self) -> &H {
        &self.reconciler.host
    }

    /// The host renderer, mutably.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.reconciler.host
    }

    /// Routes scheduler and render events to `tracer`.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.scheduler.set_tracer(tracer.clone());
        self.reconciler.tracer = tracer;
    }

    /// Number of live work nodes across all roots.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.reconciler.fibers.len()
    }

    /// Lanes with pending work on `root`.
    #[must_use]
    pub fn pending_lanes(&self, root: RootId) -> Option<Lanes> {
        self.reconciler.roots.get(&root).map(|root| root.lanes.pending)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    /// Context and priority for an update requested outside any batch.
    fn ambient_event(&self) -> (ExecutionContext, Option<Priority>) {
        if !self.reconciler.context.is_empty() {
            return (ExecutionContext::empty(), None);
        }
        match self.reconciler.host.current_event_priority() {
            EventPriority::Default => (ExecutionContext::empty(), None),
            EventPriority::Discrete => (
                ExecutionContext::DISCRETE_EVENT,
                Some(Priority::UserBlocking),
            ),
            priority => (
                ExecutionContext::empty(),
                Some(priority.scheduler_priority()),
            ),
        }
    }

    /// Runs `f` on the internals inside `flags`.
    fn enter<R>(
        &mut self,
        flags: ExecutionContext,
        priority: Option<Priority>,
        f: impl FnOnce(&mut Reconciler<H>, &mut Sched<H>) -> R,
    ) -> Result<R, EngineError> {
        let previous_priority = priority.map(|p| self.scheduler.swap_priority(p));
        let previous = self.reconciler.enter(flags);
        let out = f(&mut self.reconciler, &mut self.scheduler);
        self.reconciler.leave(&mut self.scheduler, previous);
        if let Some(p) = previous_priority {
            self.scheduler.swap_priority(p);
        }
        self.finish(out)
    }

    /// Runs a user closure inside `flags`.
    fn nest<R>(
        &mut self,
        flags: ExecutionContext,
        priority: Option<Priority>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> Result<R, EngineError> {
        let previous_priority = priority.map(|p| self.scheduler.swap_priority(p));
        let previous = self.reconciler.enter(flags);
        let out = f(self);
        self.reconciler.leave(&mut self.scheduler, previous);
        if let Some(p) = previous_priority {
            self.scheduler.swap_priority(p);
        }
        self.finish(out)
    }

    fn finish<R>(&mut self, out: R) -> Result<R, EngineError> {
        if self.reconciler.errors.is_empty() {
            return Ok(out);
        }
        Err(self.reconciler.errors.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::{String, ToString};
    use alloc::vec::Vec;
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::clock::ManualClock;
    use crate::component::{
        ClassComponent, Component, Dependency, FunctionComponent, LifecycleContext, Poll, Ref,
        RenderContext, StateHandle,
    };
    use crate::element::{component, host};
    use crate::error::{CommitFault, ComponentError, HostError};
    use crate::props::{Props, State, Value};
    use crate::testing::{Log, TestHost, drain, log};
    use crate::time::Duration;

    fn engine() -> (Engine<TestHost>, u32, ManualClock) {
        let clock = ManualClock::new();
        let mut host = TestHost::new();
        let container = host.container();
        (Engine::new(host, Box::new(clock.clone())), container, clock)
    }

    fn keyed(keys: &[&str]) -> Element {
        Element::list(
            keys.iter()
                .map(|k| host("li").key(*k).child(Element::text(*k)).build()),
        )
    }

    /// Logs lifecycle calls and exposes its state handle.
    struct Probe {
        name: &'static str,
        log: Log,
        handle: Rc<RefCell<Option<StateHandle>>>,
        passive: bool,
    }

    impl Probe {
        fn new(name: &'static str, log: &Log) -> Self {
            Self {
                name,
                log: log.clone(),
                handle: Rc::new(RefCell::new(None)),
                passive: false,
            }
        }

        fn note(&self, what: &str, props: &Props) {
            let label = props
                .get("label")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .unwrap_or_default();
            self.log
                .borrow_mut()
                .push(format!("{} {what} {label}", self.name).trim_end().to_string());
        }
    }

    impl Component for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn initial_state(&self, _props: &Props) -> State {
            State::new().with("count", 0_i64)
        }

        fn render(&self, cx: &RenderContext<'_>) -> Result<Poll<Element>, ComponentError> {
            let count = cx.state.get("count").and_then(Value::as_int).unwrap_or(0);
            Ok(Poll::Ready(Element::list([
                Element::text(format!("{}={count}", self.name)),
                cx.children.clone(),
            ])))
        }

        fn did_mount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
            *self.handle.borrow_mut() = Some(cx.handle.clone());
            self.note("mount", cx.props);
            Ok(())
        }

        fn snapshot_before_update(
            &self,
            _cx: &LifecycleContext<'_>,
            _prev_props: &Props,
            prev_state: &State,
        ) -> Option<Value> {
            prev_state.get("count").cloned()
        }

        fn did_update(
            &self,
            cx: &LifecycleContext<'_>,
            _prev_props: &Props,
            _prev_state: &State,
            snapshot: Option<&Value>,
        ) -> Result<(), ComponentError> {
            let before = snapshot.and_then(Value::as_int).unwrap_or(-1);
            self.note(&format!("update from {before}"), cx.props);
            Ok(())
        }

        fn will_unmount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
            self.note("unmount", cx.props);
            Ok(())
        }

        fn has_passive_effects(&self) -> bool {
            self.passive
        }

        fn passive_effect(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
            self.note("effect", cx.props);
            Ok(())
        }

        fn passive_cleanup(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
            self.note("cleanup", cx.props);
            Ok(())
        }
    }

    /// Catches descendant faults and renders a fallback.
    struct Boundary {
        log: Log,
    }

    impl Component for Boundary {
        fn name(&self) -> &str {
            "Boundary"
        }

        fn render(&self, cx: &RenderContext<'_>) -> Result<Poll<Element>, ComponentError> {
            if cx.state.get("failed").and_then(Value::as_bool) == Some(true) {
                return Ok(Poll::Ready(Element::text("fallback")));
            }
            Ok(Poll::Ready(cx.children.clone()))
        }

        fn catches_errors(&self) -> bool {
            true
        }

        fn derived_state_from_error(&self, _error: &ComponentError) -> Option<State> {
            Some(State::new().with("failed", true))
        }

        fn did_catch(
            &self,
            _cx: &LifecycleContext<'_>,
            error: &ComponentError,
        ) -> Result<(), ComponentError> {
            self.log.borrow_mut().push(format!("caught {error}"));
            Ok(())
        }
    }

    fn thrower() -> FunctionComponent {
        FunctionComponent::new("Thrower", |_, _| Err(ComponentError::new("Thrower", "boom")))
    }

    #[test]
    fn legacy_render_commits_before_returning() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine
            .render(
                root,
                host("div")
                    .prop("id", 1_i64)
                    .child(Element::text("hello"))
                    .child(host("br")),
            )
            .unwrap();
        assert_eq!(
            engine.host().render(container),
            "<div id=1>hello<br></br></div>"
        );
        assert!(engine.is_idle(), "no task left behind");
    }

    #[test]
    fn concurrent_render_waits_for_the_scheduler() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine.render(root, host("p").child(Element::text("x"))).unwrap();
        assert_eq!(engine.host().render(container), "");
        assert!(!engine.is_idle(), "a render task is queued");
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "<p>x</p>");
    }

    #[test]
    fn rotation_inserts_once() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, keyed(&["1", "2", "3"])).unwrap();
        engine.host_mut().clear_ops();

        engine.render(root, keyed(&["3", "1", "2"])).unwrap();
        assert_eq!(engine.host().render(container), "<li>3</li><li>1</li><li>2</li>");
        let host = engine.host();
        assert_eq!(host.count("insert") + host.count("append"), 1, "{:?}", host.ops);
        assert_eq!(host.count("create"), 0, "every node is reused");
    }

    #[test]
    fn identical_render_touches_nothing() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, keyed(&["a", "b"])).unwrap();
        engine.host_mut().clear_ops();
        engine.render(root, keyed(&["a", "b"])).unwrap();
        assert!(engine.host().ops.is_empty(), "{:?}", engine.host().ops);
    }

    #[test]
    fn prop_and_text_changes_are_applied_in_place() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine
            .render(root, host("div").prop("a", 1_i64).child(Element::text("one")))
            .unwrap();
        engine.host_mut().clear_ops();
        engine
            .render(root, host("div").prop("a", 2_i64).child(Element::text("two")))
            .unwrap();
        assert_eq!(engine.host().render(container), "<div a=2>two</div>");
        assert_eq!(engine.host().count("update"), 1);
        assert_eq!(engine.host().count("text"), 1);
        assert_eq!(engine.host().count("create"), 0);
    }

    #[test]
    fn removal_and_insertion_in_the_middle() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, keyed(&["a", "b", "c"])).unwrap();
        engine.render(root, keyed(&["a", "x", "c"])).unwrap();
        assert_eq!(engine.host().render(container), "<li>a</li><li>x</li><li>c</li>");
        engine.render(root, keyed(&["c"])).unwrap();
        assert_eq!(engine.host().render(container), "<li>c</li>");
    }

    #[test]
    fn state_handle_updates_rerender() {
        let (mut engine, container, _) = engine();
        let events = log();
        let probe = Probe::new("P", &events);
        let handle = Rc::clone(&probe.handle);
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine
            .render(root, component(ClassComponent::new(probe)))
            .unwrap();
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "P=0");
        assert_eq!(drain(&events), ["P mount"]);

        handle
            .borrow()
            .as_ref()
            .unwrap()
            .set_state(State::new().with("count", 1_i64));
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "P=1");
        assert_eq!(drain(&events), ["P update from 0"]);
    }

    #[test]
    fn batched_updates_render_once() {
        let (mut engine, container, _) = engine();
        let renders = Rc::new(Cell::new(0));
        let counter = Rc::clone(&renders);
        let app = FunctionComponent::pure("App", move |props, _| {
            counter.set(counter.get() + 1);
            let n = props.get("n").and_then(Value::as_int).unwrap_or(0);
            Element::text(format!("{n}"))
        });
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine
            .batched_updates(|engine| {
                engine.render(root, component(app.clone()).prop("n", 1_i64)).unwrap();
                engine.render(root, component(app.clone()).prop("n", 2_i64)).unwrap();
                assert_eq!(engine.host().render(container), "", "nothing commits inside the batch");
            })
            .unwrap();
        assert_eq!(engine.host().render(container), "2");
        assert_eq!(renders.get(), 1);
    }

    #[test]
    fn lifecycles_run_children_first_and_unmount_on_removal() {
        let (mut engine, container, _) = engine();
        let events = log();
        let outer = ClassComponent::new(Probe::new("outer", &events));
        let inner = ClassComponent::new(Probe::new("inner", &events));
        let root = engine.create_root(container, RootOptions::LEGACY);
        let tree = |label: &str| {
            component(outer.clone())
                .prop("label", label)
                .child(component(inner.clone()).prop("label", label))
                .build()
        };
        engine.render(root, tree("a")).unwrap();
        assert_eq!(drain(&events), ["inner mount a", "outer mount a"]);

        engine.render(root, tree("b")).unwrap();
        assert_eq!(
            drain(&events),
            ["inner update from 0 b", "outer update from 0 b"]
        );

        engine.render(root, Element::Empty).unwrap();
        assert_eq!(drain(&events), ["outer unmount b", "inner unmount b"]);
        assert_eq!(engine.host().render(container), "");
    }

    #[test]
    fn passive_effects_run_after_commit() {
        let (mut engine, container, _) = engine();
        let events = log();
        let mut probe = Probe::new("P", &events);
        probe.passive = true;
        let probe = ClassComponent::new(probe);
        let root = engine.create_root(container, RootOptions::LEGACY);

        engine
            .render(root, component(probe.clone()).prop("label", "1"))
            .unwrap();
        assert_eq!(drain(&events), ["P mount 1"]);
        engine.run_until_idle().unwrap();
        assert_eq!(drain(&events), ["P effect 1"]);

        engine
            .render(root, component(probe.clone()).prop("label", "2"))
            .unwrap();
        engine.flush_passive_effects().unwrap();
        assert_eq!(
            drain(&events),
            ["P update from 0 2", "P cleanup 1", "P effect 2"]
        );

        engine.unmount(root).unwrap();
        engine.run_until_idle().unwrap();
        assert_eq!(drain(&events), ["P unmount 2", "P cleanup 2"]);
    }

    #[test]
    fn pending_passive_effects_flush_before_next_commit() {
        let (mut engine, container, _) = engine();
        let events = log();
        let mut probe = Probe::new("P", &events);
        probe.passive = true;
        let probe = ClassComponent::new(probe);
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine
            .render(root, component(probe.clone()).prop("label", "1"))
            .unwrap();
        engine
            .render(root, component(probe.clone()).prop("label", "2"))
            .unwrap();
        assert_eq!(
            drain(&events),
            ["P mount 1", "P effect 1", "P update from 0 2"]
        );
    }

    #[test]
    fn boundary_renders_fallback_and_hears_the_error() {
        let (mut engine, container, _) = engine();
        let events = log();
        let boundary = ClassComponent::new(Boundary { log: events.clone() });
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine
            .render(
                root,
                host("main").child(component(boundary).child(component(thrower()))),
            )
            .unwrap();
        assert_eq!(engine.host().render(container), "<main>fallback</main>");
        assert_eq!(drain(&events), ["caught Thrower: boom"]);
    }

    #[test]
    fn boundary_recovers_in_concurrent_mode() {
        let (mut engine, container, _) = engine();
        let events = log();
        let boundary = ClassComponent::new(Boundary { log: events.clone() });
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine
            .render(root, component(boundary.clone()).child(Element::text("ok")))
            .unwrap();
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "ok");

        engine
            .render(root, component(boundary).child(component(thrower())))
            .unwrap();
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "fallback");
        assert_eq!(drain(&events), ["caught Thrower: boom"]);
    }

    #[test]
    fn uncaught_error_tears_the_root_down() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, host("p").child(Element::text("before"))).unwrap();

        let err = engine
            .render(root, host("div").child(component(thrower())))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Uncaught {
                root,
                error: ComponentError::new("Thrower", "boom"),
            }
        );
        assert_eq!(engine.host().render(container), "");

        // The root is usable again.
        engine.render(root, Element::text("after")).unwrap();
        assert_eq!(engine.host().render(container), "after");
    }

    #[test]
    fn suspended_render_resumes_when_the_dependency_resolves() {
        let (mut engine, container, _) = engine();
        let dependency = Dependency::new();
        let waiting = dependency.clone();
        let lazy = FunctionComponent::new("Lazy", move |_, _| {
            if waiting.is_resolved() {
                Ok(Poll::Ready(Element::text("loaded")))
            } else {
                Ok(Poll::Pending(waiting.clone()))
            }
        });
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine.render(root, host("div").child(component(lazy))).unwrap();
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "");
        assert!(engine.is_idle(), "suspended lanes are not retried on their own");

        dependency.resolve();
        engine.run_until_idle().unwrap();
        assert_eq!(engine.host().render(container), "<div>loaded</div>");
    }

    #[test]
    fn long_render_yields_between_units() {
        let (mut engine, container, clock) = engine();
        let slow_clock = clock.clone();
        let slow = FunctionComponent::pure("Slow", move |props, _| {
            slow_clock.advance(Duration::from_millis(1));
            Element::text(format!("{}", props.get("i").and_then(Value::as_int).unwrap_or(0)))
        });
        let items: Vec<Element> = (0..20_i64)
            .map(|i| component(slow.clone()).key(format!("{i}")).prop("i", i).build())
            .collect();
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine.render(root, Element::list(items)).unwrap();

        assert!(engine.flush().unwrap(), "the first slice yields");
        assert_eq!(engine.host().render(container), "", "nothing is committed mid-render");
        engine.run_until_idle().unwrap();
        let expected: String = (0..20).map(|i| format!("{i}")).collect();
        assert_eq!(engine.host().render(container), expected);
    }

    #[test]
    fn discrete_update_overtakes_a_default_render() {
        let (mut engine, container, clock) = engine();
        let slow_clock = clock.clone();
        let slow = FunctionComponent::pure("Slow", move |_, _| {
            slow_clock.advance(Duration::from_millis(2));
            Element::text("a")
        });
        let commits = log();
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        let items: Vec<Element> = (0..10).map(|_| component(slow.clone()).build()).collect();
        let on_a = commits.clone();
        engine
            .render_then(root, Element::list(items), move || {
                on_a.borrow_mut().push("A".to_string());
            })
            .unwrap();
        assert!(engine.flush().unwrap(), "render A yields part way");

        let on_b = commits.clone();
        engine
            .discrete_updates(|engine| {
                engine
                    .render_then(root, Element::text("B"), move || {
                        on_b.borrow_mut().push("B".to_string());
                    })
                    .unwrap();
            })
            .unwrap();
        engine.run_until_idle().unwrap();

        assert_eq!(drain(&commits), ["B", "A"]);
        // Updates apply in insertion order: B was requested last.
        assert_eq!(engine.host().render(container), "B");
    }

    #[test]
    fn flush_sync_renders_a_concurrent_root_immediately() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine
            .flush_sync(|engine| engine.render(root, Element::text("now")).unwrap())
            .unwrap();
        assert_eq!(engine.host().render(container), "now");
    }

    #[test]
    fn transitions_use_transition_lanes() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::CONCURRENT);
        engine
            .start_transition(|engine| engine.render(root, Element::text("t")).unwrap())
            .unwrap();
        let pending = engine.pending_lanes(root).unwrap();
        assert!(pending.includes_some(Lanes::TRANSITIONS), "{pending:?}");
        engine.run_until_idle().unwrap();
        assert_eq!(engine.pending_lanes(root), Some(Lanes::NONE));
        assert_eq!(engine.host().render(container), "t");
    }

    #[test]
    fn refs_attach_in_layout_and_detach_on_removal() {
        let (mut engine, container, _) = engine();
        let node_ref = Ref::new();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, host("input").with_ref(&node_ref)).unwrap();
        let instance = node_ref.downcast::<u32>().expect("host instance attached");
        assert_eq!(engine.host().render(container), "<input></input>");
        assert_eq!(engine.host().count(&format!("create input {instance}")), 1);

        engine.render(root, Element::Empty).unwrap();
        assert!(!node_ref.is_attached());
    }

    #[test]
    fn runaway_commit_updates_hit_the_limit() {
        struct Runaway;
        impl Component for Runaway {
            fn name(&self) -> &str {
                "Runaway"
            }
            fn render(&self, _cx: &RenderContext<'_>) -> Result<Poll<Element>, ComponentError> {
                Ok(Poll::Ready(Element::Empty))
            }
            fn did_mount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
                cx.handle.force_update();
                Ok(())
            }
            fn did_update(
                &self,
                cx: &LifecycleContext<'_>,
                _prev_props: &Props,
                _prev_state: &State,
                _snapshot: Option<&Value>,
            ) -> Result<(), ComponentError> {
                cx.handle.force_update();
                Ok(())
            }
        }

        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        let err = engine
            .render(root, component(ClassComponent::new(Runaway)))
            .unwrap_err();
        assert_eq!(err, EngineError::NestedUpdateLimit { limit: 50 });
    }

    #[test]
    fn failed_effects_are_reported_after_the_rest_apply() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, keyed(&["a", "b"])).unwrap();
        // Instance ids: container 0, then li/text pairs in creation order.
        let a = engine
            .host()
            .ops
            .iter()
            .find_map(|op| op.strip_prefix("create li "))
            .and_then(|id| id.parse::<u32>().ok())
            .unwrap();
        engine.host_mut().fail_removal_of = Some(a);

        let err = engine.render(root, keyed(&["b", "c"])).unwrap_err();
        let EngineError::Commit(errors) = err else {
            panic!("expected a commit error, got {err:?}");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].fault,
            CommitFault::Host(HostError::Other("removal refused".into()))
        );
        assert_eq!(errors[0].phase, crate::trace::PhaseKind::Mutation);
        // The insertion of "c" still happened.
        assert!(engine.host().render(container).ends_with("<li>b</li><li>c</li>"));
    }

    #[test]
    fn every_uncaught_error_reaches_a_caller() {
        let (mut engine, first_container, _) = engine();
        let second_container = engine.host_mut().container();
        let first = engine.create_root(first_container, RootOptions::LEGACY);
        let second = engine.create_root(second_container, RootOptions::LEGACY);

        let err = engine
            .batched_updates(|engine| {
                engine.render(first, component(thrower())).unwrap();
                engine.render(second, component(thrower())).unwrap();
            })
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Uncaught {
                root: first,
                error: ComponentError::new("Thrower", "boom"),
            }
        );
        assert_eq!(
            engine.flush(),
            Err(EngineError::Uncaught {
                root: second,
                error: ComponentError::new("Thrower", "boom"),
            })
        );
        engine.run_until_idle().unwrap();
    }

    #[test]
    fn unmount_releases_every_node() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        engine.render(root, keyed(&["a", "b", "c"])).unwrap();
        engine.render(root, keyed(&["c", "b"])).unwrap();
        assert!(engine.node_count() > 0);
        engine.unmount(root).unwrap();
        assert_eq!(engine.node_count(), 0);
        assert_eq!(engine.render(root, Element::Empty), Err(EngineError::UnknownRoot(root)));
    }

    #[test]
    fn garbage_collection_bounds_node_count() {
        let (mut engine, container, _) = engine();
        let root = engine.create_root(container, RootOptions::LEGACY);
        for round in 0..10 {
            let keys: Vec<String> = (0..5).map(|i| format!("{round}-{i}")).collect();
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            engine.render(root, keyed(&keys)).unwrap();
        }
        // Two root nodes plus, per list item, an element and a text node and
        // at most one alternate each.
        assert!(engine.node_count() <= 2 + 5 * 2 * 2, "{}", engine.node_count());
    }
}
