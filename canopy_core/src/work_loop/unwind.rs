// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fault capture and suspension.
//!
//! A render fault marks the failing node incomplete and enqueues a capture
//! update on the nearest class ancestor that catches errors and is not
//! already showing its capture state. When there is none, the root itself
//! captures: its next state is empty, which tears the tree down, and the
//! fault is reported once the empty tree commits.
//!
//! A pending dependency stops the render. The root's lanes are marked
//! suspended when the render finishes and the dependency pings them when
//! it resolves.

use alloc::rc::Rc;

use crate::component::{ClassComponent, Ping};
use crate::error::ComponentError;
use crate::fiber::{FiberQueue, Flags, NodeId, WorkTag};
use crate::host::HostConfig;
use crate::lane::Lane;
use crate::props::{Props, State};
use crate::root::RootState;
use crate::update_queue::{Payload, Update, UpdateCallback, UpdateTag};

use super::{Reconciler, RootExitStatus, Thrown};

impl<H: HostConfig> Reconciler<H> {
    /// Records a fault raised by `source`, whose parent is `parent`.
    ///
    /// Returns `false` when the render must stop instead of unwinding.
    pub(super) fn throw_exception(&mut self, parent: NodeId, source: NodeId, thrown: Thrown) -> bool {
        self.fibers[source].flags |= Flags::INCOMPLETE;
        match thrown {
            Thrown::Pending(dependency) => {
                if let Some(root) = self.wip_root {
                    let inbox = Rc::downgrade(&self.inbox);
                    let lanes = self.wip_root_render_lanes;
                    dependency.on_resolve(move || {
                        if let Some(inbox) = inbox.upgrade() {
                            inbox.borrow_mut().pings.push(Ping { root, lanes });
                        }
                    });
                }
                self.wip_root_exit_status = RootExitStatus::Suspended;
                false
            }
            Thrown::Error(error) => {
                if self.wip_root_exit_status != RootExitStatus::Completed {
                    self.wip_root_exit_status = RootExitStatus::Errored;
                }
                self.capture_error(parent, error);
                true
            }
        }
    }

    /// Enqueues a capture update on the nearest boundary above `start`.
    fn capture_error(&mut self, start: NodeId, error: ComponentError) {
        let lane = self.wip_root_render_lanes.pick_arbitrary();
        let mut node = Some(start);
        while let Some(id) = node {
            let fiber = &self.fibers[id];
            match fiber.tag {
                WorkTag::HostRoot => {
                    let update = Update::new(lane)
                        .with_tag(UpdateTag::Capture)
                        .with_payload(Payload::Value(RootState::default()))
                        .with_callback(Some(UpdateCallback::Uncaught(error)));
                    let fiber = &mut self.fibers[id];
                    fiber.flags |= Flags::SHOULD_CAPTURE;
                    fiber.lanes |= lane;
                    if let FiberQueue::Root(queue) = &mut fiber.update_queue {
                        queue.enqueue_captured(update);
                    }
                    return;
                }
                WorkTag::ClassComponent => {
                    let boundary = fiber
                        .state_node
                        .class()
                        .filter(|instance| instance.component.get().catches_errors())
                        .map(|instance| instance.component.clone());
                    if let Some(component) = boundary
                        && !fiber.flags.contains(Flags::DID_CAPTURE)
                    {
                        let update = capture_update(lane, component, error);
                        let fiber = &mut self.fibers[id];
                        fiber.flags |= Flags::SHOULD_CAPTURE;
                        fiber.lanes |= lane;
                        if let FiberQueue::Class(queue) = &mut fiber.update_queue {
                            queue.enqueue_captured(update);
                        }
                        return;
                    }
                }
                WorkTag::HostElement
                | WorkTag::HostText
                | WorkTag::Fragment
                | WorkTag::FunctionComponent => {}
            }
            node = fiber.parent;
        }
    }

    /// Unwinds an incomplete node. Returns it when it is the boundary that
    /// captured the fault, so it renders again.
    pub(super) fn unwind_work(&mut self, wip: NodeId) -> Option<NodeId> {
        let fiber = &mut self.fibers[wip];
        match fiber.tag {
            WorkTag::HostRoot | WorkTag::ClassComponent
                if fiber.flags.contains(Flags::SHOULD_CAPTURE) =>
            {
                fiber.flags.remove(Flags::SHOULD_CAPTURE);
                fiber.flags |= Flags::DID_CAPTURE;
                let start = fiber.effect_start;
                // Effects of the failed attempt are void.
                self.effects.truncate(start);
                Some(wip)
            }
            _ => None,
        }
    }
}

/// A capture update merging the boundary's derived state.
fn capture_update(
    lane: Lane,
    component: ClassComponent,
    error: ComponentError,
) -> Update<Rc<State>> {
    let derive_from = error.clone();
    Update::new(lane)
        .with_tag(UpdateTag::Capture)
        .with_payload(Payload::Reducer(Rc::new(move |_: &Rc<State>, _: &Props| {
            component
                .get()
                .derived_state_from_error(&derive_from)
                .map(Rc::new)
        })))
        .with_callback(Some(UpdateCallback::DidCatch(error)))
}
