// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative priority task scheduling with time slicing.
//!
//! The [`Scheduler`] keeps two min-heaps: a *timer queue* of delayed tasks
//! ordered by start time, and a *ready queue* ordered by expiration time.
//! A task's expiration is its start time plus the timeout of its
//! [`Priority`], so more urgent tasks sort first and long-waiting tasks
//! eventually overtake newer urgent ones.
//!
//! The scheduler does not own a thread or an event loop. The host calls
//! [`Scheduler::flush`] whenever [`Scheduler::is_host_callback_scheduled`]
//! reports work (or when [`Scheduler::next_timer_deadline`] passes). One call
//! is one slice: tasks run until the queue empties or
//! [`Scheduler::should_yield`] reports that the slice is used up.
//!
//! # Usage
//!
//! ```rust,ignore
//! let id = scheduler.schedule_callback(Priority::Normal, Box::new(|ctx, sched, task| {
//!     while ctx.has_work() {
//!         if !task.did_timeout && sched.should_yield() {
//!             return TaskStatus::Continue;
//!         }
//!         ctx.do_unit();
//!     }
//!     TaskStatus::Done
//! }));
//! while scheduler.flush(&mut ctx) {
//!     // give the host a chance to paint and dispatch input
//! }
//! ```

mod task;

pub use task::{Priority, ScheduleOptions, TaskCallback, TaskContext, TaskId, TaskStatus};

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BinaryHeap};
use core::fmt;

use task::{HeapEntry, Task};

use crate::clock::Clock;
use crate::time::{Duration, HostTime};
use crate::trace::{TaskEvent, TaskEventKind, Tracer};

/// Configuration for the [`Scheduler`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Length of a slice before [`Scheduler::should_yield`] returns `true`.
    pub yield_interval: Duration,
    /// Timeout of [`Priority::Immediate`] tasks (zero: expired on arrival).
    pub immediate_timeout: Duration,
    /// Timeout of [`Priority::UserBlocking`] tasks.
    pub user_blocking_timeout: Duration,
    /// Timeout of [`Priority::Normal`] tasks.
    pub normal_timeout: Duration,
    /// Timeout of [`Priority::Low`] tasks.
    pub low_timeout: Duration,
    /// Timeout of [`Priority::Idle`] tasks; large enough to never expire in
    /// practice.
    pub idle_timeout: Duration,
}

impl SchedulerConfig {
    /// Default yield quantum.
    pub const DEFAULT_YIELD_INTERVAL: Duration = Duration::from_millis(5);

    /// Highest frame rate accepted by [`with_frame_rate`](Self::with_frame_rate).
    pub const MAX_FRAME_RATE: u32 = 125;

    /// Default configuration: 5 ms slices and browser-equivalent timeouts.
    pub const DEFAULT: Self = Self {
        yield_interval: Self::DEFAULT_YIELD_INTERVAL,
        immediate_timeout: Duration::ZERO,
        user_blocking_timeout: Duration::from_millis(250),
        normal_timeout: Duration::from_millis(5000),
        low_timeout: Duration::from_millis(10000),
        // Max 31-bit signed millisecond count.
        idle_timeout: Duration::from_millis(1_073_741_823),
    };

    /// Returns a copy whose slice length matches a target frame rate.
    ///
    /// `fps == 0` restores the default slice length. Rates above
    /// [`MAX_FRAME_RATE`](Self::MAX_FRAME_RATE) are not supported and return
    /// `None`.
    #[must_use]
    pub const fn with_frame_rate(self, fps: u32) -> Option<Self> {
        if fps > Self::MAX_FRAME_RATE {
            return None;
        }
        let yield_interval = if fps == 0 {
            Self::DEFAULT_YIELD_INTERVAL
        } else {
            Duration::from_millis(1000 / fps as u64)
        };
        Some(Self {
            yield_interval,
            ..self
        })
    }

    /// Returns the timeout for `priority`.
    #[must_use]
    pub const fn timeout(&self, priority: Priority) -> Duration {
        match priority {
            Priority::Immediate => self.immediate_timeout,
            Priority::UserBlocking => self.user_blocking_timeout,
            Priority::Normal => self.normal_timeout,
            Priority::Low => self.low_timeout,
            Priority::Idle => self.idle_timeout,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Min-heap task scheduler, generic over the context value `C` that every
/// callback receives mutably.
///
/// Passing the context into [`flush`](Self::flush) instead of capturing it
/// in callbacks lets one owner hold both the scheduler and the state its
/// tasks operate on.
pub struct Scheduler<C> {
    config: SchedulerConfig,
    clock: Box<dyn Clock>,
    tracer: Tracer,
    tasks: BTreeMap<TaskId, Task<C>>,
    task_queue: BinaryHeap<HeapEntry>,
    timer_queue: BinaryHeap<HeapEntry>,
    next_id: u64,
    current_task: Option<TaskId>,
    current_priority: Priority,
    is_performing_work: bool,
    is_host_callback_scheduled: bool,
    needs_paint: bool,
    slice_start: HostTime,
}

impl<C> fmt::Debug for Scheduler<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("tasks", &self.tasks)
            .field("ready", &self.task_queue.len())
            .field("timers", &self.timer_queue.len())
            .field("current_task", &self.current_task)
            .field("current_priority", &self.current_priority)
            .field("is_performing_work", &self.is_performing_work)
            .finish_non_exhaustive()
    }
}

impl<C> Scheduler<C> {
    /// Creates a new scheduler reading time from `clock`.
    #[must_use]
    pub fn new(config: SchedulerConfig, clock: Box<dyn Clock>) -> Self {
        let slice_start = clock.now();
        Self {
            config,
            clock,
            tracer: Tracer::none(),
            tasks: BTreeMap::new(),
            task_queue: BinaryHeap::new(),
            timer_queue: BinaryHeap::new(),
            next_id: 1,
            current_task: None,
            current_priority: Priority::Normal,
            is_performing_work: false,
            is_host_callback_scheduled: false,
            needs_paint: false,
            slice_start,
        }
    }

    /// Routes task events to `tracer`.
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Changes the slice length to match a frame rate.
    ///
    /// Returns `false` and leaves the configuration unchanged if the rate is
    /// not supported.
    pub fn set_frame_rate(&mut self, fps: u32) -> bool {
        match self.config.with_frame_rate(fps) {
            Some(config) => {
                self.config = config;
                true
            }
            None => false,
        }
    }

    /// Returns the current host time.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.clock.now()
    }

    /// Schedules `callback` at `priority` to run as soon as possible.
    pub fn schedule_callback(&mut self, priority: Priority, callback: TaskCallback<C>) -> TaskId {
        self.schedule_callback_with(priority, callback, ScheduleOptions::default())
    }

    /// Schedules `callback` at `priority`, optionally delayed.
    pub fn schedule_callback_with(
        &mut self,
        priority: Priority,
        callback: TaskCallback<C>,
        options: ScheduleOptions,
    ) -> TaskId {
        let current_time = self.clock.now();
        let start_time = match options.delay {
            Some(delay) if delay > Duration::ZERO => current_time.saturating_add(delay),
            _ => current_time,
        };
        let expiration_time = start_time.saturating_add(self.config.timeout(priority));

        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(
            id,
            Task {
                callback: Some(callback),
                priority,
                start_time,
                expiration_time,
                cancelled: false,
            },
        );

        if start_time > current_time {
            self.timer_queue.push(HeapEntry {
                sort_index: start_time,
                id,
            });
        } else {
            self.task_queue.push(HeapEntry {
                sort_index: expiration_time,
                id,
            });
            if !self.is_performing_work {
                self.is_host_callback_scheduled = true;
            }
        }

        self.trace(id, priority, TaskEventKind::Scheduled, current_time);
        id
    }

    /// Cancels a task.
    ///
    /// The task's callback is dropped in place; its heap entry is discarded
    /// when it reaches the top. Cancelling a finished or unknown task does
    /// nothing. A running task may cancel itself; a continuation it returns
    /// is then ignored.
    pub fn cancel_callback(&mut self, id: TaskId) {
        if let Some(task) = self.tasks.get_mut(&id) {
            if task.cancelled {
                return;
            }
            task.callback = None;
            task.cancelled = true;
            let priority = task.priority;
            let now = self.clock.now();
            self.trace(id, priority, TaskEventKind::Cancel, now);
        }
    }

    /// Returns `true` if `id` is queued and not cancelled.
    #[must_use]
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.get(&id).is_some_and(|task| !task.cancelled)
    }

    /// Returns `true` if the current slice is used up and the running task
    /// should return [`TaskStatus::Continue`].
    ///
    /// That is the case once the slice length has elapsed, after
    /// [`request_paint`](Self::request_paint), or while the host reports
    /// pending input.
    #[must_use]
    pub fn should_yield(&self) -> bool {
        if self.needs_paint || self.clock.is_input_pending() {
            return true;
        }
        self.clock.now().saturating_duration_since(self.slice_start) >= self.config.yield_interval
    }

    /// Asks the scheduler to yield at the next opportunity so the host can
    /// paint.
    pub fn request_paint(&mut self) {
        self.needs_paint = true;
    }

    /// Returns the priority of the running task, or the priority set by
    /// [`run_with_priority`](Self::run_with_priority).
    #[must_use]
    pub fn current_priority(&self) -> Priority {
        self.current_priority
    }

    /// Runs `f` with [`current_priority`](Self::current_priority) set to
    /// `priority`.
    pub fn run_with_priority<R>(&mut self, priority: Priority, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = self.current_priority;
        self.current_priority = priority;
        let result = f(self);
        self.current_priority = previous;
        result
    }

    /// Sets the ambient priority and returns the previous one. Callers that
    /// cannot pass a closure to [`run_with_priority`](Self::run_with_priority)
    /// restore it themselves.
    pub(crate) fn swap_priority(&mut self, priority: Priority) -> Priority {
        core::mem::replace(&mut self.current_priority, priority)
    }

    /// Returns the task at the head of the ready queue, if any.
    #[must_use]
    pub fn first_callback(&self) -> Option<TaskId> {
        self.task_queue.peek().map(|entry| entry.id)
    }

    /// Returns the task currently running, if any.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskId> {
        self.current_task
    }

    /// Returns `true` if ready tasks are waiting for [`flush`](Self::flush).
    #[must_use]
    pub fn is_host_callback_scheduled(&self) -> bool {
        self.is_host_callback_scheduled
    }

    /// Returns the earliest start time among delayed tasks, if any.
    ///
    /// The host should call [`flush`](Self::flush) once this time passes.
    #[must_use]
    pub fn next_timer_deadline(&self) -> Option<HostTime> {
        self.timer_queue
            .iter()
            .filter(|entry| self.is_scheduled(entry.id))
            .map(|entry| entry.sort_index)
            .min()
    }

    /// Returns `true` if no live task is queued.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.tasks.values().all(|task| task.cancelled)
    }

    /// Runs one slice of work. Returns `true` if ready work remains, in which
    /// case the host should call `flush` again after handling its own events.
    ///
    /// Re-entrant calls from inside a running task do nothing.
    pub fn flush(&mut self, ctx: &mut C) -> bool {
        if self.is_performing_work {
            return false;
        }
        let now = self.clock.now();
        self.slice_start = now;
        self.needs_paint = false;
        self.is_host_callback_scheduled = false;
        self.is_performing_work = true;
        let previous_priority = self.current_priority;

        let has_more = self.work_loop(ctx, now);

        self.current_task = None;
        self.current_priority = previous_priority;
        self.is_performing_work = false;
        if has_more {
            self.is_host_callback_scheduled = true;
        }
        has_more
    }

    /// Flushes until no ready work remains. Delayed tasks whose start time
    /// has not yet arrived stay queued.
    pub fn run_until_idle(&mut self, ctx: &mut C) {
        while self.flush(ctx) {}
    }

    fn work_loop(&mut self, ctx: &mut C, mut current_time: HostTime) -> bool {
        self.advance_timers(current_time);

        while let Some(top) = self.task_queue.peek().copied() {
            let Some(expiration_time) = self.tasks.get(&top.id).map(|task| task.expiration_time)
            else {
                // Finished while not at the head; stale entry.
                self.task_queue.pop();
                continue;
            };
            if expiration_time > current_time && self.should_yield() {
                break;
            }

            let Some(task) = self.tasks.get_mut(&top.id) else {
                break;
            };
            let Some(mut callback) = task.callback.take() else {
                // Cancelled.
                self.task_queue.pop();
                self.tasks.remove(&top.id);
                continue;
            };
            let priority = task.priority;
            let did_timeout = expiration_time <= current_time;

            self.current_task = Some(top.id);
            self.current_priority = priority;
            self.trace(top.id, priority, TaskEventKind::Start, current_time);

            let status = callback(
                ctx,
                self,
                TaskContext {
                    id: top.id,
                    did_timeout,
                },
            );
            current_time = self.clock.now();
            self.current_task = None;

            let cancelled = self.tasks.get(&top.id).is_none_or(|task| task.cancelled);
            if status == TaskStatus::Continue && !cancelled {
                if let Some(task) = self.tasks.get_mut(&top.id) {
                    task.callback = Some(callback);
                }
                self.trace(top.id, priority, TaskEventKind::Yield, current_time);
                self.advance_timers(current_time);
                return true;
            }

            if !cancelled {
                self.trace(top.id, priority, TaskEventKind::Complete, current_time);
            }
            self.tasks.remove(&top.id);
            if self.task_queue.peek().is_some_and(|entry| entry.id == top.id) {
                self.task_queue.pop();
            }
            self.advance_timers(current_time);
        }

        !self.task_queue.is_empty()
    }

    /// Moves delayed tasks whose start time has arrived onto the ready queue.
    fn advance_timers(&mut self, current_time: HostTime) {
        while let Some(top) = self.timer_queue.peek().copied() {
            match self.tasks.get(&top.id) {
                None => {
                    self.timer_queue.pop();
                }
                Some(task) if task.cancelled => {
                    self.timer_queue.pop();
                    self.tasks.remove(&top.id);
                }
                Some(task) if task.start_time <= current_time => {
                    self.timer_queue.pop();
                    self.task_queue.push(HeapEntry {
                        sort_index: task.expiration_time,
                        id: top.id,
                    });
                }
                Some(_) => break,
            }
        }
    }

    fn trace(&self, task: TaskId, priority: Priority, kind: TaskEventKind, timestamp: HostTime) {
        self.tracer.task(&TaskEvent {
            task,
            priority,
            kind,
            timestamp,
        });
    }
}
