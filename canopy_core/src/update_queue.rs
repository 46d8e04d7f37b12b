// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Lane-aware state update queues.
//!
//! Each stateful node (a root or a class component) and its alternate share a
//! pending list that new updates are pushed to. When the node is rendered, the
//! pending list is moved onto the end of the base list of *both* copies, so an
//! interrupted render never loses an update.
//!
//! Processing walks the base list in insertion order and applies only updates
//! whose lane is in the render lanes. The first skipped update freezes the
//! base state; every update after it is kept (applied ones as `NONE`-lane
//! clones) so that a later render rebases them in the original order.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::error::ComponentError;
use crate::lane::{Lane, Lanes};
use crate::props::{Props, State};

/// State types an [`UpdateQueue`] can hold.
pub(crate) trait QueueState: Clone {
    /// Combines a partial update with the current state.
    fn merge(&self, partial: &Self) -> Self;
}

impl QueueState for Rc<State> {
    fn merge(&self, partial: &Self) -> Self {
        Rc::new(self.merged(partial))
    }
}

/// How an update combines with the previous state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UpdateTag {
    /// Shallow-merge the payload over the previous state.
    Update,
    /// Replace the previous state with the payload.
    Replace,
    /// Keep the state but force a re-render.
    Force,
    /// An error-boundary capture; merges like `Update`.
    Capture,
}

/// The state an update produces.
pub(crate) enum Payload<S> {
    /// A fixed value.
    Value(S),
    /// A function of the previous state and the current props. Returning
    /// `None` leaves the state unchanged.
    Reducer(Rc<dyn Fn(&S, &Props) -> Option<S>>),
}

impl<S: Clone> Clone for Payload<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Value(v) => Self::Value(v.clone()),
            Self::Reducer(f) => Self::Reducer(Rc::clone(f)),
        }
    }
}

/// Work to run in the layout pass after an update commits.
#[derive(Clone)]
pub(crate) enum UpdateCallback {
    /// A user callback.
    User(Rc<dyn Fn()>),
    /// Call the boundary's `did_catch` with the captured error.
    DidCatch(ComponentError),
    /// Report the error as uncaught once the root commits.
    Uncaught(ComponentError),
}

impl fmt::Debug for UpdateCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(_) => f.write_str("User"),
            Self::DidCatch(e) => f.debug_tuple("DidCatch").field(e).finish(),
            Self::Uncaught(e) => f.debug_tuple("Uncaught").field(e).finish(),
        }
    }
}

/// One state change request.
pub(crate) struct Update<S> {
    pub(crate) lane: Lane,
    pub(crate) tag: UpdateTag,
    pub(crate) payload: Option<Payload<S>>,
    pub(crate) callback: Option<UpdateCallback>,
}

impl<S: Clone> Clone for Update<S> {
    fn clone(&self) -> Self {
        Self {
            lane: self.lane,
            tag: self.tag,
            payload: self.payload.clone(),
            callback: self.callback.clone(),
        }
    }
}

impl<S> Update<S> {
    /// An `Update`-tagged request with no payload.
    pub(crate) fn new(lane: Lane) -> Self {
        Self {
            lane,
            tag: UpdateTag::Update,
            payload: None,
            callback: None,
        }
    }

    pub(crate) fn with_tag(mut self, tag: UpdateTag) -> Self {
        self.tag = tag;
        self
    }

    pub(crate) fn with_payload(mut self, payload: Payload<S>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub(crate) fn with_callback(mut self, callback: Option<UpdateCallback>) -> Self {
        self.callback = callback;
        self
    }
}

/// Result of [`UpdateQueue::process`].
pub(crate) struct Processed<S> {
    /// State after every included update.
    pub(crate) state: S,
    /// Lanes of skipped updates.
    pub(crate) remaining_lanes: Lanes,
    /// A `Force` update was applied.
    pub(crate) force_update: bool,
    /// A `Capture` update was applied.
    pub(crate) did_capture: bool,
    /// At least one applied update carries a callback.
    pub(crate) has_callbacks: bool,
}

/// Update queue of one stateful node.
pub(crate) struct UpdateQueue<S> {
    base_state: S,
    base_updates: Rc<Vec<Update<S>>>,
    pending: Rc<RefCell<Vec<Update<S>>>>,
    effects: Vec<UpdateCallback>,
}

impl<S: Clone> Clone for UpdateQueue<S> {
    /// Clones for an alternate: the base list is shared copy-on-write and the
    /// pending list stays shared.
    fn clone(&self) -> Self {
        Self {
            base_state: self.base_state.clone(),
            base_updates: Rc::clone(&self.base_updates),
            pending: Rc::clone(&self.pending),
            effects: self.effects.clone(),
        }
    }
}

impl<S: QueueState> UpdateQueue<S> {
    pub(crate) fn new(base_state: S) -> Self {
        Self {
            base_state,
            base_updates: Rc::new(Vec::new()),
            pending: Rc::new(RefCell::new(Vec::new())),
            effects: Vec::new(),
        }
    }

    /// Appends to the shared pending list.
    pub(crate) fn enqueue(&self, update: Update<S>) {
        self.pending.borrow_mut().push(update);
    }

    /// Appends directly to this copy's base list. Used for captured errors,
    /// which belong to the in-progress render only.
    pub(crate) fn enqueue_captured(&mut self, update: Update<S>) {
        Rc::make_mut(&mut self.base_updates).push(update);
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.pending.borrow().is_empty()
    }

    /// Drains the shared pending list.
    pub(crate) fn take_pending(&self) -> Vec<Update<S>> {
        core::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Appends drained pending updates to this copy's base list.
    pub(crate) fn append_to_base(&mut self, updates: &[Update<S>]) {
        if updates.is_empty() {
            return;
        }
        Rc::make_mut(&mut self.base_updates).extend(updates.iter().cloned());
    }

    pub(crate) fn base_state(&self) -> &S {
        &self.base_state
    }

    /// Overwrites the base state and clears the base list. Used when a
    /// failed component is force-reset.
    pub(crate) fn reset(&mut self, state: S) {
        self.base_state = state;
        self.base_updates = Rc::new(Vec::new());
    }

    /// Applies every base update whose lane is in `render_lanes`.
    pub(crate) fn process(&mut self, props: &Props, render_lanes: Lanes) -> Processed<S> {
        let base = Rc::clone(&self.base_updates);
        let mut state = self.base_state.clone();
        let mut new_base_state: Option<S> = None;
        let mut new_base: Vec<Update<S>> = Vec::new();
        let mut processed = Processed {
            state: self.base_state.clone(),
            remaining_lanes: Lanes::NONE,
            force_update: false,
            did_capture: false,
            has_callbacks: false,
        };

        for update in base.iter() {
            if !render_lanes.contains(update.lane) {
                if new_base.is_empty() {
                    new_base_state = Some(state.clone());
                }
                new_base.push(update.clone());
                processed.remaining_lanes = processed.remaining_lanes.merge(update.lane);
                continue;
            }

            if !new_base.is_empty() {
                // Kept for rebasing; always included. The callback already
                // fires in this pass.
                new_base.push(Update {
                    lane: Lanes::NONE,
                    tag: update.tag,
                    payload: update.payload.clone(),
                    callback: None,
                });
            }

            state = apply(update, state, props, &mut processed);
            if let Some(callback) = &update.callback {
                self.effects.push(callback.clone());
                processed.has_callbacks = true;
            }
        }

        self.base_state = new_base_state.unwrap_or_else(|| state.clone());
        self.base_updates = Rc::new(new_base);
        processed.state = state;
        processed
    }

    /// Takes the callbacks collected by the last [`process`](Self::process).
    pub(crate) fn take_effects(&mut self) -> Vec<UpdateCallback> {
        core::mem::take(&mut self.effects)
    }
}

fn apply<S: QueueState>(update: &Update<S>, prev: S, props: &Props, out: &mut Processed<S>) -> S {
    let resolve = |payload: &Payload<S>, prev: &S| match payload {
        Payload::Value(v) => Some(v.clone()),
        Payload::Reducer(f) => f(prev, props),
    };
    match update.tag {
        UpdateTag::Replace => match update.payload.as_ref().and_then(|p| resolve(p, &prev)) {
            Some(next) => next,
            None => prev,
        },
        UpdateTag::Update | UpdateTag::Capture => {
            if update.tag == UpdateTag::Capture {
                out.did_capture = true;
            }
            match update.payload.as_ref().and_then(|p| resolve(p, &prev)) {
                Some(partial) => prev.merge(&partial),
                None => prev,
            }
        }
        UpdateTag::Force => {
            out.force_update = true;
            prev
        }
    }
}
