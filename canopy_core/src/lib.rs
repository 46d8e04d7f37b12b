// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Incremental tree reconciliation with priority-lane scheduling.
//!
//! `canopy_core` turns declarative descriptions of a UI tree into the
//! minimal set of mutations on a host's native tree. It is `no_std`
//! compatible (with `alloc`), keeps its work nodes in a generational arena,
//! and never owns a thread: the host drives it from its own event loop.
//!
//! # Architecture
//!
//! ```text
//!   Host event / StateHandle / Dependency
//!       │
//!       ▼
//!   update in a lane ──► Reconciler::ensure_root_is_scheduled
//!                                 │
//!           ┌─────────────────────┴──────────────────┐
//!           ▼                                        ▼
//!   sync queue (SYNC lane)              Scheduler task (other lanes)
//!           │                                        │
//!           └─────────────► render ◄─────────────────┘
//!                   begin / reconcile children / complete
//!                             │
//!                             ▼
//!   commit: before-mutation ──► mutation ──► layout ──► (passive, later)
//!                                  │
//!                                  ▼
//!                          HostConfig mutations
//! ```
//!
//! **[`engine`]**: The public entry points. An [`Engine`](engine::Engine)
//! owns the reconciler and its scheduler, mounts roots, and exposes the
//! batching helpers a host calls from its event handlers.
//!
//! **[`scheduler`]**: Cooperative min-heap task scheduler with five
//! priorities, delayed tasks, continuations, and time slicing against a
//! [`Clock`](clock::Clock).
//!
//! **[`lane`]**: 31-bit lane model. Updates carry a lane; roots track
//! pending, suspended, pinged, and expired lanes and pick the next batch to
//! render.
//!
//! **[`element`]**, **[`component`]**, **[`props`]**: The immutable tree
//! description, function and class components, refs, state handles, and
//! suspension dependencies.
//!
//! **[`host`]**: The [`HostConfig`](host::HostConfig) trait a renderer
//! implements to create and mutate native instances.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! scheduler and commit instrumentation, with the zero-overhead
//! [`Tracer`](trace::Tracer) wrapper.
//!
//! **[`clock`]**, **[`time`]**: Monotonic host time and the clock source
//! the scheduler reads.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-node
//!   effect records emitted during the mutation pass.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod clock;
pub mod component;
pub mod element;
pub mod engine;
pub mod error;
pub mod host;
pub mod lane;
pub mod props;
pub mod root;
pub mod scheduler;
pub mod time;
pub mod trace;

mod commit;
mod fiber;
mod reconcile;
mod update_queue;
mod work_loop;

#[cfg(test)]
mod testing;
