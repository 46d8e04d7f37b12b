// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Components, state handles, refs and async dependencies.
//!
//! A [`FunctionComponent`] is a render function of its props. A
//! [`Component`] implementation (wrapped in a [`ClassComponent`]) adds local
//! state, lifecycle methods, passive effects, and can act as an error
//! boundary.
//!
//! Rendering may report that it is not ready by returning
//! [`Poll::Pending`] with a [`Dependency`]. The work loop suspends the
//! root's lanes and retries once the dependency resolves.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::any::Any;
use core::cell::{Cell, RefCell};
use core::fmt;

use crate::element::Element;
use crate::error::ComponentError;
use crate::fiber::NodeId;
use crate::lane::Lanes;
use crate::props::{Props, State, Value};
use crate::root::RootId;
use crate::update_queue::{Payload, Update, UpdateCallback, UpdateTag};

/// Result of a render that may be waiting on something.
#[derive(Clone, Debug)]
pub enum Poll<T> {
    /// The render finished.
    Ready(T),
    /// The render needs `Dependency` to resolve first.
    Pending(Dependency),
}

impl<T> Poll<T> {
    /// Returns `true` for [`Poll::Ready`].
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Signature of a function component's render.
pub type RenderFn = dyn Fn(&Props, &Element) -> Result<Poll<Element>, ComponentError>;

/// A stateless component.
///
/// Identity is the allocation: clones compare equal, separately constructed
/// components never do.
#[derive(Clone)]
pub struct FunctionComponent {
    name: Rc<str>,
    render: Rc<RenderFn>,
}

impl FunctionComponent {
    /// Wraps a render function that may fail or suspend.
    pub fn new(
        name: &str,
        render: impl Fn(&Props, &Element) -> Result<Poll<Element>, ComponentError> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            render: Rc::new(render),
        }
    }

    /// Wraps a render function that always succeeds.
    pub fn pure(name: &str, render: impl Fn(&Props, &Element) -> Element + 'static) -> Self {
        Self::new(name, move |props, children| {
            Ok(Poll::Ready(render(props, children)))
        })
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if both handles refer to the same component.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.render, &other.render)
    }

    pub(crate) fn render(
        &self,
        props: &Props,
        children: &Element,
    ) -> Result<Poll<Element>, ComponentError> {
        (self.render)(props, children)
    }
}

impl fmt::Debug for FunctionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FunctionComponent").field(&self.name).finish()
    }
}

/// Inputs to [`Component::render`].
#[derive(Debug)]
pub struct RenderContext<'a> {
    /// Current props.
    pub props: &'a Props,
    /// Children passed by the parent.
    pub children: &'a Element,
    /// Current local state.
    pub state: &'a State,
}

/// Inputs to commit-time lifecycle methods.
#[derive(Debug)]
pub struct LifecycleContext<'a> {
    /// Committed props.
    pub props: &'a Props,
    /// Committed state.
    pub state: &'a State,
    /// Handle for requesting further state changes.
    pub handle: &'a StateHandle,
}

/// A stateful component.
///
/// Every method except [`name`](Self::name) and [`render`](Self::render) has
/// a default that does nothing.
pub trait Component {
    /// Display name used in errors and traces.
    fn name(&self) -> &str;

    /// State at mount.
    fn initial_state(&self, props: &Props) -> State {
        let _ = props;
        State::new()
    }

    /// Produces the child description.
    fn render(&self, cx: &RenderContext<'_>) -> Result<Poll<Element>, ComponentError>;

    /// Whether a props or state change needs a re-render.
    fn should_update(
        &self,
        old_props: &Props,
        old_state: &State,
        new_props: &Props,
        new_state: &State,
    ) -> bool {
        let _ = (old_props, old_state, new_props, new_state);
        true
    }

    /// Returns `true` if this component captures render faults of its
    /// descendants.
    fn catches_errors(&self) -> bool {
        false
    }

    /// Partial state to merge after a descendant fault is captured.
    fn derived_state_from_error(&self, error: &ComponentError) -> Option<State> {
        let _ = error;
        None
    }

    /// Called in the layout pass after a captured fault commits.
    fn did_catch(
        &self,
        cx: &LifecycleContext<'_>,
        error: &ComponentError,
    ) -> Result<(), ComponentError> {
        let _ = (cx, error);
        Ok(())
    }

    /// Called in the layout pass after the first commit.
    fn did_mount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
        let _ = cx;
        Ok(())
    }

    /// Called before the mutation pass of an update. The returned value is
    /// handed to [`did_update`](Self::did_update).
    fn snapshot_before_update(
        &self,
        cx: &LifecycleContext<'_>,
        prev_props: &Props,
        prev_state: &State,
    ) -> Option<Value> {
        let _ = (cx, prev_props, prev_state);
        None
    }

    /// Called in the layout pass after an update commits.
    fn did_update(
        &self,
        cx: &LifecycleContext<'_>,
        prev_props: &Props,
        prev_state: &State,
        snapshot: Option<&Value>,
    ) -> Result<(), ComponentError> {
        let _ = (cx, prev_props, prev_state, snapshot);
        Ok(())
    }

    /// Called in the mutation pass before the component is removed.
    fn will_unmount(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
        let _ = cx;
        Ok(())
    }

    /// Returns `true` if the component has deferred effects to run after
    /// paint.
    fn has_passive_effects(&self) -> bool {
        false
    }

    /// Runs after every commit that mounted or updated the component.
    fn passive_effect(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
        let _ = cx;
        Ok(())
    }

    /// Runs before the next passive effect and after unmount.
    fn passive_cleanup(&self, cx: &LifecycleContext<'_>) -> Result<(), ComponentError> {
        let _ = cx;
        Ok(())
    }
}

/// A shared [`Component`] usable as an element type.
///
/// Identity is the allocation.
#[derive(Clone)]
pub struct ClassComponent(Rc<dyn Component>);

impl ClassComponent {
    /// Wraps a component.
    pub fn new(component: impl Component + 'static) -> Self {
        Self(Rc::new(component))
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Returns `true` if both handles refer to the same component.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }

    pub(crate) fn get(&self) -> &dyn Component {
        &*self.0
    }
}

impl fmt::Debug for ClassComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassComponent").field(&self.name()).finish()
    }
}

/// Per-node instance of a class component.
pub(crate) struct ClassInstance {
    pub(crate) component: ClassComponent,
    pub(crate) handle: StateHandle,
}

/// Something a suspended render waits on.
///
/// Cloning shares the same dependency.
#[derive(Clone, Default)]
pub struct Dependency(Rc<DependencyInner>);

#[derive(Default)]
struct DependencyInner {
    resolved: Cell<bool>,
    listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Dependency {
    /// Creates an unresolved dependency.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the dependency resolved and notifies listeners once.
    pub fn resolve(&self) {
        if self.0.resolved.replace(true) {
            return;
        }
        let listeners = core::mem::take(&mut *self.0.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }

    /// Returns `true` once [`resolve`](Self::resolve) was called.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.resolved.get()
    }

    /// Runs `listener` on resolution, or immediately if already resolved.
    pub(crate) fn on_resolve(&self, listener: impl FnOnce() + 'static) {
        if self.is_resolved() {
            listener();
        } else {
            self.0.listeners.borrow_mut().push(Box::new(listener));
        }
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("resolved", &self.is_resolved())
            .field("listeners", &self.0.listeners.borrow().len())
            .finish()
    }
}

/// A mutable slot filled with the host instance (host elements) or the
/// [`StateHandle`] (class components) of the node it is attached to.
#[derive(Clone, Default)]
pub struct Ref(Rc<RefCell<Option<Rc<dyn Any>>>>);

impl Ref {
    /// Creates an empty ref.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the attached value.
    #[must_use]
    pub fn get(&self) -> Option<Rc<dyn Any>> {
        self.0.borrow().clone()
    }

    /// Returns the attached value if it has type `T`.
    #[must_use]
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        self.get().and_then(|v| v.downcast::<T>().ok())
    }

    /// Returns `true` while a value is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Returns `true` if both handles share the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn attach(&self, value: Rc<dyn Any>) {
        *self.0.borrow_mut() = Some(value);
    }

    pub(crate) fn detach(&self) {
        *self.0.borrow_mut() = None;
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// A queued state change, waiting for the engine to assign a lane.
pub(crate) struct StateRequest {
    pub(crate) fiber: NodeId,
    pub(crate) update: Update<Rc<State>>,
}

/// A resolved dependency of a suspended render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Ping {
    pub(crate) root: RootId,
    pub(crate) lanes: Lanes,
}

/// Requests made outside the engine's control flow.
///
/// Drained at every engine entry point, after the layout pass, and after
/// passive effects. Lanes are assigned at drain time from the execution
/// context active then.
#[derive(Default)]
pub(crate) struct Inbox {
    pub(crate) state: Vec<StateRequest>,
    pub(crate) pings: Vec<Ping>,
}

impl Inbox {
    pub(crate) fn is_empty(&self) -> bool {
        self.state.is_empty() && self.pings.is_empty()
    }
}

/// Handle through which a class component changes its state.
///
/// Requests made after the engine is dropped are ignored.
#[derive(Clone)]
pub struct StateHandle {
    inbox: Weak<RefCell<Inbox>>,
    fiber: NodeId,
}

impl StateHandle {
    pub(crate) fn new(inbox: Weak<RefCell<Inbox>>, fiber: NodeId) -> Self {
        Self { inbox, fiber }
    }

    /// Merges `partial` into the state.
    pub fn set_state(&self, partial: State) {
        self.push(
            Update::new(Lanes::NONE).with_payload(Payload::Value(Rc::new(partial))),
        );
    }

    /// Merges `partial` into the state and calls `callback` after the
    /// change commits.
    pub fn set_state_then(&self, partial: State, callback: impl Fn() + 'static) {
        self.push(
            Update::new(Lanes::NONE)
                .with_payload(Payload::Value(Rc::new(partial)))
                .with_callback(Some(UpdateCallback::User(Rc::new(callback)))),
        );
    }

    /// Replaces the whole state.
    pub fn replace_state(&self, state: State) {
        self.push(
            Update::new(Lanes::NONE)
                .with_tag(UpdateTag::Replace)
                .with_payload(Payload::Value(Rc::new(state))),
        );
    }

    /// Merges the result of `reducer(previous state, props)`; `None` leaves
    /// the state alone.
    pub fn update(&self, reducer: impl Fn(&State, &Props) -> Option<State> + 'static) {
        let reducer = move |prev: &Rc<State>, props: &Props| reducer(prev, props).map(Rc::new);
        self.push(Update::new(Lanes::NONE).with_payload(Payload::Reducer(Rc::new(reducer))));
    }

    /// Re-renders without changing state, skipping `should_update`.
    pub fn force_update(&self) {
        self.push(Update::new(Lanes::NONE).with_tag(UpdateTag::Force));
    }

    /// Returns `false` once the owning engine is gone.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inbox.strong_count() > 0
    }

    pub(crate) fn fiber(&self) -> NodeId {
        self.fiber
    }

    fn push(&self, update: Update<Rc<State>>) {
        if let Some(inbox) = self.inbox.upgrade() {
            inbox.borrow_mut().state.push(StateRequest {
                fiber: self.fiber,
                update,
            });
        }
    }
}

impl fmt::Debug for StateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandle")
            .field("fiber", &self.fiber)
            .field("connected", &self.is_connected())
            .finish()
    }
}
