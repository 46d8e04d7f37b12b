// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mounted roots and engine configuration.

use crate::element::Element;
use crate::fiber::NodeId;
use crate::host::HostConfig;
use crate::lane::{LanePriority, Lanes, RootLanes};
use crate::scheduler::{SchedulerConfig, TaskId};
use crate::update_queue::QueueState;

/// Identifier of a mounted root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootId(pub u32);

/// How updates to a root are scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RootMode {
    /// Every update renders synchronously, flushed at the end of the
    /// current batch.
    Legacy,
    /// Updates get lanes from their context and render in time slices.
    #[default]
    Concurrent,
}

/// Options for [`Engine::create_root`](crate::engine::Engine::create_root).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct RootOptions {
    /// Scheduling mode.
    pub mode: RootMode,
}

impl RootOptions {
    /// Legacy synchronous mode.
    pub const LEGACY: Self = Self {
        mode: RootMode::Legacy,
    };

    /// Concurrent mode.
    pub const CONCURRENT: Self = Self {
        mode: RootMode::Concurrent,
    };
}

/// Engine-wide settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How many synchronous re-renders commit callbacks may trigger in a
    /// row before the engine gives up.
    pub nested_update_limit: u32,
    /// Scheduler settings.
    pub scheduler: SchedulerConfig,
}

impl EngineConfig {
    /// Default nested update limit.
    pub const DEFAULT_NESTED_UPDATE_LIMIT: u32 = 50;

    /// Default configuration.
    pub const DEFAULT: Self = Self {
        nested_update_limit: Self::DEFAULT_NESTED_UPDATE_LIMIT,
        scheduler: SchedulerConfig::DEFAULT,
    };
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// State of a root node: the element last rendered into it.
#[derive(Clone, Debug, Default)]
pub(crate) struct RootState {
    pub(crate) element: Element,
}

impl QueueState for RootState {
    fn merge(&self, partial: &Self) -> Self {
        partial.clone()
    }
}

/// How a root's pending work is scheduled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CallbackNode {
    /// A scheduler task running concurrent work.
    Task(TaskId),
    /// An entry in the engine's synchronous callback queue.
    SyncQueue,
}

/// Bookkeeping for one mounted tree.
pub(crate) struct FiberRoot<H: HostConfig> {
    pub(crate) id: RootId,
    pub(crate) mode: RootMode,
    pub(crate) container: H::Instance,
    /// Root work node of the committed tree.
    pub(crate) current: NodeId,
    /// Completed work-in-progress root waiting to commit.
    pub(crate) finished_work: Option<NodeId>,
    pub(crate) finished_lanes: Lanes,
    pub(crate) lanes: RootLanes,
    pub(crate) callback_node: Option<CallbackNode>,
    pub(crate) callback_priority: LanePriority,
}

impl<H: HostConfig> FiberRoot<H> {
    pub(crate) fn new(id: RootId, mode: RootMode, container: H::Instance, current: NodeId) -> Self {
        Self {
            id,
            mode,
            container,
            current,
            finished_work: None,
            finished_lanes: Lanes::NONE,
            lanes: RootLanes::default(),
            callback_node: None,
            callback_priority: LanePriority::NoLane,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(EngineConfig::default().nested_update_limit, 50);
        assert_eq!(RootOptions::default().mode, RootMode::Concurrent);
        assert_eq!(RootOptions::LEGACY.mode, RootMode::Legacy);
    }

    #[test]
    fn root_state_replaces_on_merge() {
        let a = RootState {
            element: Element::text("a"),
        };
        let b = RootState {
            element: Element::text("b"),
        };
        assert!(a.merge(&b).element.ptr_eq(&b.element));
    }
}
