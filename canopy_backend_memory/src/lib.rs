// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory host renderer for canopy.
//!
//! [`MemoryHost`] implements [`HostConfig`](canopy_core::host::HostConfig)
//! over a plain node table. It is the backend for tests, headless hosts, and
//! server-side markup generation:
//!
//! - **Inspection**: [`MemoryHost::to_markup`], [`MemoryHost::text_content`],
//!   and node accessors read the committed tree back.
//! - **Accounting**: [`MutationStats`] counts every host operation, so tests
//!   can assert how much work a commit did.
//! - **Hit testing**: elements with a `frame` attribute can be located by
//!   point with [`MemoryHost::hit_test`], which is how a simulated input
//!   loop routes events.
//! - **Event priority**: [`MemoryHost::set_event_priority`] sets what the
//!   host reports to the engine for updates made outside a batch.
//!
//! Mutations validate their arguments and fail with
//! [`HostError`](canopy_core::error::HostError) the way a real platform tree
//! would: removing a node from a parent it is not attached to, inserting
//! before a foreign anchor, or attaching a node inside itself.

#![no_std]

extern crate alloc;

mod host;

#[cfg(test)]
mod scenarios;

pub use host::{MemoryHost, MutationStats, NodeHandle, NodeKind, PropPatch};
