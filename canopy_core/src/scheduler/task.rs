// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Task records and heap ordering.

use alloc::boxed::Box;
use core::cmp::Ordering;
use core::fmt;

use super::Scheduler;
use crate::time::HostTime;

/// Scheduler priority of a task.
///
/// Variants are ordered from most to least urgent; the ordering only matters
/// for comparisons, queue order is decided by expiration time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    /// Must run now; already expired when scheduled.
    Immediate,
    /// Result of user interaction.
    UserBlocking,
    /// Ordinary work.
    #[default]
    Normal,
    /// Work that can wait.
    Low,
    /// Work that runs only when nothing else is queued.
    Idle,
}

impl Priority {
    /// Short lowercase name, used by text and JSON exporters.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::UserBlocking => "user_blocking",
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Idle => "idle",
        }
    }
}

/// Identifier of a scheduled task. Ids increase monotonically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub u64);

/// What a task's callback reports when it returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// The task is finished and is removed from the queue.
    Done,
    /// The task has more work; the same callback runs again later, keeping
    /// its place in the queue.
    Continue,
}

/// Information passed to a running callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskContext {
    /// The running task.
    pub id: TaskId,
    /// `true` if the task ran past its expiration time. Expired work should
    /// finish without yielding.
    pub did_timeout: bool,
}

/// A task callback.
///
/// It receives the scheduler's context value, the scheduler itself (so it
/// can schedule or cancel other tasks and query [`Scheduler::should_yield`]),
/// and a [`TaskContext`].
pub type TaskCallback<C> = Box<dyn FnMut(&mut C, &mut Scheduler<C>, TaskContext) -> TaskStatus>;

/// Options for [`Scheduler::schedule_callback_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Delay before the task becomes eligible to run.
    pub delay: Option<crate::time::Duration>,
}

pub(crate) struct Task<C> {
    pub(crate) callback: Option<TaskCallback<C>>,
    pub(crate) priority: Priority,
    pub(crate) start_time: HostTime,
    pub(crate) expiration_time: HostTime,
    pub(crate) cancelled: bool,
}

impl<C> fmt::Debug for Task<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .field("start_time", &self.start_time)
            .field("expiration_time", &self.expiration_time)
            .field("has_callback", &self.callback.is_some())
            .field("cancelled", &self.cancelled)
            .finish()
    }
}

/// Heap entry. Ordered so that `BinaryHeap` pops the smallest sort index
/// first, with ties broken by task id (insertion order).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct HeapEntry {
    pub(crate) sort_index: HostTime,
    pub(crate) id: TaskId,
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: smaller sort index, then smaller id, first.
        other
            .sort_index
            .cmp(&self.sort_index)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BinaryHeap;
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn heap_pops_smallest_sort_index_then_oldest() {
        let mut heap = BinaryHeap::new();
        for (sort, id) in [(30, 1), (10, 2), (10, 3), (20, 4)] {
            heap.push(HeapEntry {
                sort_index: HostTime(sort),
                id: TaskId(id),
            });
        }
        let order: Vec<u64> = core::iter::from_fn(|| heap.pop()).map(|e| e.id.0).collect();
        assert_eq!(order, [2, 3, 4, 1]);
    }

    #[test]
    fn priorities_order_by_urgency() {
        assert!(Priority::Immediate < Priority::UserBlocking);
        assert!(Priority::Low < Priority::Idle);
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
