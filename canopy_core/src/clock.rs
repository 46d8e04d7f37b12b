// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host clock contract.
//!
//! The scheduler never reads a platform clock directly. The host hands it a
//! [`Clock`] that reports monotonic time and, where the platform can tell,
//! whether user input is waiting to be dispatched.
//!
//! [`ManualClock`] is a clock whose time only moves when told to. Tests and
//! simulations share one between the scheduler and the code driving it.

use alloc::rc::Rc;
use core::cell::Cell;

use crate::time::{Duration, HostTime};

/// A monotonic time source supplied by the host.
pub trait Clock {
    /// Returns the current host time.
    fn now(&self) -> HostTime;

    /// Returns `true` when the host has input events waiting.
    ///
    /// The scheduler yields early when this reports pending input so the
    /// host can dispatch it. Hosts that cannot tell return `false`.
    fn is_input_pending(&self) -> bool {
        false
    }
}

/// A clock advanced explicitly by its owner.
///
/// Clones share the same underlying time, so a test can keep one handle
/// and give another to the scheduler.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Rc<Cell<HostTime>>,
    input_pending: Rc<Cell<bool>>,
}

impl ManualClock {
    /// Creates a clock starting at [`HostTime::ZERO`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a clock starting at `start`.
    #[must_use]
    pub fn starting_at(start: HostTime) -> Self {
        let clock = Self::default();
        clock.now.set(start);
        clock
    }

    /// Moves time forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by));
    }

    /// Sets the current time.
    ///
    /// # Panics
    ///
    /// Panics if `to` is earlier than the current time.
    pub fn set(&self, to: HostTime) {
        assert!(to >= self.now.get(), "ManualClock must not go backwards");
        self.now.set(to);
    }

    /// Sets whether the simulated host reports pending input.
    pub fn set_input_pending(&self, pending: bool) {
        self.input_pending.set(pending);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        self.now.get()
    }

    fn is_input_pending(&self) -> bool {
        self.input_pending.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::new();
        let other = clock.clone();
        clock.advance(Duration::from_millis(3));
        assert_eq!(other.now(), HostTime(3_000_000));
    }

    #[test]
    fn input_pending_is_shared() {
        let clock = ManualClock::starting_at(HostTime(10));
        let other = clock.clone();
        assert!(!other.is_input_pending());
        clock.set_input_pending(true);
        assert!(other.is_input_pending());
    }

    #[test]
    #[should_panic(expected = "must not go backwards")]
    fn set_rejects_going_backwards() {
        let clock = ManualClock::starting_at(HostTime(100));
        clock.set(HostTime(50));
    }
}
