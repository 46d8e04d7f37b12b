// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host renderer contract.
//!
//! The engine decides *what* changes; a host turns those decisions into
//! platform mutations. Canopy splits platform-specific work into *backend*
//! crates, each providing a [`HostConfig`] implementation:
//!
//! - **Instance creation** runs in the complete phase of a render and must
//!   not have visible side effects: instances are not attached to anything
//!   until the commit's mutation pass places them.
//!
//! - **Update preparation** diffs committed and pending props during the
//!   complete phase and returns an opaque payload, or `None` when nothing
//!   changed. The payload is applied later by [`HostConfig::commit_update`].
//!
//! - **Mutations** (`append_child`, `insert_before`, `remove_child`,
//!   `commit_update`, `commit_text_update`) are called only from the commit's
//!   mutation pass. A failure is collected and reported after the commit
//!   finishes; the remaining effects still run.
//!
//! # Crate boundaries
//!
//! `canopy_core` owns the engine and this contract. Backend crates depend on
//! `canopy_core` and provide platform glue. Application code depends on both
//! and drives the engine's scheduler from its event loop.

use crate::error::HostError;
use crate::lane::EventPriority;
use crate::props::Props;

/// Creates and mutates platform instances on behalf of the engine.
///
/// Containers (the mount points of roots) are instances too; the host is
/// expected to hand them out before [`create_root`] is called.
///
/// [`create_root`]: crate::engine::Engine::create_root
pub trait HostConfig: 'static {
    /// Handle to a platform node. Cloning must be cheap and refer to the
    /// same node.
    type Instance: Clone + 'static;
    /// Prepared attribute changes for one instance.
    type UpdatePayload: Clone + 'static;

    /// Creates a detached element instance.
    fn create_instance(&mut self, tag: &str, props: &Props) -> Self::Instance;

    /// Creates a detached text instance.
    fn create_text_instance(&mut self, text: &str) -> Self::Instance;

    /// Attaches `child` to a freshly created, still detached `parent`.
    ///
    /// Called from the complete phase while building a new subtree.
    fn append_initial_child(&mut self, parent: &Self::Instance, child: &Self::Instance);

    /// Computes the changes between committed and pending props, or `None`
    /// when the instance needs no update.
    fn prepare_update(
        &mut self,
        instance: &Self::Instance,
        tag: &str,
        old_props: &Props,
        new_props: &Props,
    ) -> Option<Self::UpdatePayload>;

    /// Applies a payload produced by [`prepare_update`](Self::prepare_update).
    fn commit_update(
        &mut self,
        instance: &Self::Instance,
        payload: &Self::UpdatePayload,
        tag: &str,
        new_props: &Props,
    ) -> Result<(), HostError>;

    /// Replaces the content of a text instance.
    fn commit_text_update(
        &mut self,
        instance: &Self::Instance,
        old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError>;

    /// Appends `child` as the last child of an attached `parent` (an element
    /// or a container). Moves the child if it is already attached.
    fn append_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Inserts `child` before `before` in `parent`. Moves the child if it is
    /// already attached.
    fn insert_before(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
        before: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Detaches `child` from `parent`.
    fn remove_child(
        &mut self,
        parent: &Self::Instance,
        child: &Self::Instance,
    ) -> Result<(), HostError>;

    /// Removes any pre-existing content of a container on first mount.
    fn clear_container(&mut self, container: &Self::Instance) -> Result<(), HostError> {
        let _ = container;
        Ok(())
    }

    /// Called before the mutation pass of every commit.
    fn prepare_for_commit(&mut self, container: &Self::Instance) {
        let _ = container;
    }

    /// Called after the mutation pass of every commit.
    fn reset_after_commit(&mut self, container: &Self::Instance) {
        let _ = container;
    }

    /// Priority of the host event currently being dispatched, if any.
    ///
    /// Used to pick lanes for updates requested outside any explicit
    /// batching call.
    fn current_event_priority(&self) -> EventPriority {
        EventPriority::Default
    }
}
