// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Render faults raised by components are [`ComponentError`]s. Host mutations
//! fail with [`HostError`]. Failures during commit are collected per effect
//! as [`CommitError`]s and surfaced together. Everything an engine entry point
//! can report is an [`EngineError`].

use alloc::string::String;
use alloc::vec::Vec;

use thiserror::Error;

use crate::root::RootId;
use crate::trace::PhaseKind;

/// A fault raised by a component.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{component}: {message}")]
pub struct ComponentError {
    /// Name of the component that failed.
    pub component: String,
    /// Human-readable description.
    pub message: String,
}

impl ComponentError {
    /// Creates an error attributed to `component`.
    #[must_use]
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// A failure reported by the host renderer.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HostError {
    /// The instance is not known to the host.
    #[error("unknown host instance")]
    UnknownInstance,
    /// The child is not attached to the given parent.
    #[error("instance is not a child of the given parent")]
    NotAChild,
    /// The reference sibling for an insertion is not a child of the parent.
    #[error("insertion anchor is not a child of the given parent")]
    InvalidAnchor,
    /// Any other host-specific failure.
    #[error("{0}")]
    Other(String),
}

/// What went wrong in a failed commit effect.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CommitFault {
    /// A host mutation failed.
    #[error(transparent)]
    Host(#[from] HostError),
    /// A component lifecycle method failed.
    #[error(transparent)]
    Component(#[from] ComponentError),
}

/// One failed effect of a commit.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{} effect on node {node_index} failed: {fault}", .phase.name())]
pub struct CommitError {
    /// Arena index of the node whose effect failed.
    pub node_index: u32,
    /// The commit pass the failure happened in.
    pub phase: PhaseKind,
    /// The underlying failure.
    #[source]
    pub fault: CommitFault,
}

/// Errors reported by [`Engine`](crate::engine::Engine) entry points.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A render fault no error boundary captured. The root's tree was torn
    /// down.
    #[error("uncaught render error in root {root:?}: {error}")]
    Uncaught {
        /// The root that was torn down.
        root: RootId,
        /// The fault.
        error: ComponentError,
    },
    /// A fault that could not even be captured by the root.
    #[error("fatal render error in root {root:?}: {error}")]
    Fatal {
        /// The root whose render failed.
        root: RootId,
        /// The fault.
        error: ComponentError,
    },
    /// One or more commit effects failed. Every other effect was still
    /// applied.
    #[error("{} commit effect(s) failed; first: {}", .0.len(), first_message(.0))]
    Commit(Vec<CommitError>),
    /// Updates kept scheduling synchronous re-renders from commit callbacks.
    #[error("maximum update depth exceeded ({limit} nested updates)")]
    NestedUpdateLimit {
        /// The configured limit.
        limit: u32,
    },
    /// The root id does not refer to a mounted root.
    #[error("unknown root {0:?}")]
    UnknownRoot(RootId),
}

fn first_message(errors: &[CommitError]) -> String {
    errors
        .first()
        .map_or_else(String::new, alloc::string::ToString::to_string)
}
