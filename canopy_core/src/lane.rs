// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Priority lanes.
//!
//! A *lane* is one bit of a 31-bit mask. Every update is tagged with exactly
//! one lane; a render targets a *set* of lanes ([`Lanes`]) and processes the
//! updates whose lane is in that set. Lower bit index means higher priority.
//!
//! Bits are grouped into bands:
//!
//! ```text
//! bit  0        SYNC
//! bit  1        SYNC_BATCHED
//! bits 3..=4    INPUT_DISCRETE
//! bits 6..=7    INPUT_CONTINUOUS
//! bits 9..=11   DEFAULT
//! bits 13..=21  TRANSITIONS
//! bits 22..=25  RETRY
//! bits 28..=29  IDLE
//! bit  30       OFFSCREEN
//! ```
//!
//! Bits 2, 5, 8, 12, 26 and 27 are reserved and never assigned.
//!
//! All operations are pure bitwise algebra. [`RootLanes`] carries the
//! per-root bookkeeping (pending, suspended, pinged, expired) and implements
//! [`next_lanes`](RootLanes::next_lanes), the selection of what to render
//! next.

use core::fmt;
use core::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

use crate::scheduler::Priority;
use crate::time::{Duration, HostTime};

/// Number of lanes in a [`Lanes`] mask.
pub const TOTAL_LANES: usize = 31;

/// A set of lanes. A value with exactly one bit set is used as a single lane.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Lanes(u32);

/// A single lane. Always has at most one bit set.
pub type Lane = Lanes;

impl Lanes {
    /// The empty set.
    pub const NONE: Self = Self(0);
    /// Synchronous, non-interruptible work.
    pub const SYNC: Self = Self(0b0000000000000000000000000000001);
    /// Synchronous work batched until the end of the current event.
    pub const SYNC_BATCHED: Self = Self(0b0000000000000000000000000000010);
    /// Discrete user input (clicks, key presses).
    pub const INPUT_DISCRETE: Self = Self(0b0000000000000000000000000011000);
    /// Continuous user input (pointer moves, scrolling).
    pub const INPUT_CONTINUOUS: Self = Self(0b0000000000000000000000011000000);
    /// Default priority updates.
    pub const DEFAULT: Self = Self(0b0000000000000000000111000000000);
    /// Transition updates.
    pub const TRANSITIONS: Self = Self(0b0000000001111111110000000000000);
    /// Retries after a suspended render resolves.
    pub const RETRY: Self = Self(0b0000011110000000000000000000000);
    /// Every lane that is not idle or offscreen.
    pub const NON_IDLE: Self = Self(0b0000111111111111111111111111111);
    /// Idle updates.
    pub const IDLE: Self = Self(0b0110000000000000000000000000000);
    /// Work for hidden subtrees.
    pub const OFFSCREEN: Self = Self(0b1000000000000000000000000000000);
    /// Every valid lane bit.
    pub const ALL: Self = Self(0b1111111111111111111111111111111);

    /// Creates a lane set from raw bits, dropping bits above [`TOTAL_LANES`].
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the single lane with the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= TOTAL_LANES`.
    #[inline]
    #[must_use]
    pub const fn lane(index: usize) -> Lane {
        assert!(index < TOTAL_LANES, "lane index out of range");
        Self(1 << index)
    }

    /// Returns `true` if the set is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Union of two sets.
    #[inline]
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` without the lanes in `other`.
    #[inline]
    #[must_use]
    pub const fn remove(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Intersection of two sets.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Returns `true` if the sets share at least one lane.
    #[inline]
    #[must_use]
    pub const fn includes_some(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if every lane of `subset` is in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, subset: Self) -> bool {
        self.0 & subset.0 == subset.0
    }

    /// Returns the highest-priority lane of the set (its lowest set bit).
    ///
    /// This is also the "pick one arbitrary lane" operation: any lane of a
    /// set is a valid representative, and the lowest bit is the cheapest to
    /// isolate.
    #[inline]
    #[must_use]
    pub const fn highest_priority_lane(self) -> Lane {
        Self(self.0 & self.0.wrapping_neg())
    }

    /// Picks one lane from the set.
    #[inline]
    #[must_use]
    pub const fn pick_arbitrary(self) -> Lane {
        self.highest_priority_lane()
    }

    /// Returns the lowest-priority lane of the set (its highest set bit).
    #[inline]
    #[must_use]
    pub const fn lowest_priority_lane(self) -> Lane {
        if self.0 == 0 {
            Self::NONE
        } else {
            Self(1 << (31 - self.0.leading_zeros()))
        }
    }

    /// Returns the index of the single lane `self`.
    ///
    /// For a set with several lanes, returns the index of the lowest-priority
    /// lane.
    ///
    /// # Panics
    ///
    /// Panics if the set is empty.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        assert!(self.0 != 0, "index of an empty lane set");
        (31 - self.0.leading_zeros()) as usize
    }

    /// Returns the number of lanes in the set.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Iterates over the individual lanes in priority order.
    pub fn iter(self) -> impl Iterator<Item = Lane> {
        let mut remaining = self.0;
        core::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            let lane = remaining & remaining.wrapping_neg();
            remaining &= !lane;
            Some(Self(lane))
        })
    }

    /// Returns the lanes of the highest-priority band present in `self`,
    /// together with that band's priority.
    ///
    /// Every lane of the band that is present is returned; lanes in one band
    /// render together.
    #[must_use]
    pub const fn highest_priority_band(self) -> (Self, LanePriority) {
        if self.0 & Self::SYNC.0 != 0 {
            return (Self::SYNC, LanePriority::Sync);
        }
        if self.0 & Self::SYNC_BATCHED.0 != 0 {
            return (Self::SYNC_BATCHED, LanePriority::SyncBatched);
        }
        let discrete = self.0 & Self::INPUT_DISCRETE.0;
        if discrete != 0 {
            return (Self(discrete), LanePriority::InputDiscrete);
        }
        let continuous = self.0 & Self::INPUT_CONTINUOUS.0;
        if continuous != 0 {
            return (Self(continuous), LanePriority::InputContinuous);
        }
        let default = self.0 & Self::DEFAULT.0;
        if default != 0 {
            return (Self(default), LanePriority::Default);
        }
        let transitions = self.0 & Self::TRANSITIONS.0;
        if transitions != 0 {
            return (Self(transitions), LanePriority::Transition);
        }
        let retry = self.0 & Self::RETRY.0;
        if retry != 0 {
            return (Self(retry), LanePriority::Retry);
        }
        let idle = self.0 & Self::IDLE.0;
        if idle != 0 {
            return (Self(idle), LanePriority::Idle);
        }
        if self.0 & Self::OFFSCREEN.0 != 0 {
            return (Self::OFFSCREEN, LanePriority::Offscreen);
        }
        (Self::NONE, LanePriority::NoLane)
    }

    /// Returns the priority of the highest-priority band in `self`.
    #[inline]
    #[must_use]
    pub const fn priority(self) -> LanePriority {
        self.highest_priority_band().1
    }

    /// Returns `true` if any lane outside the idle/offscreen bands is set.
    #[inline]
    #[must_use]
    pub const fn includes_non_idle_work(self) -> bool {
        self.0 & Self::NON_IDLE.0 != 0
    }

    /// Returns `true` if the set is non-empty and only holds retry lanes.
    #[inline]
    #[must_use]
    pub const fn includes_only_retries(self) -> bool {
        self.0 != 0 && self.0 & Self::RETRY.0 == self.0
    }
}

impl BitOr for Lanes {
    type Output = Self;

    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        self.merge(rhs)
    }
}

impl BitOrAssign for Lanes {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.merge(rhs);
    }
}

impl BitAnd for Lanes {
    type Output = Self;

    #[inline]
    fn bitand(self, rhs: Self) -> Self {
        self.intersect(rhs)
    }
}

impl BitAndAssign for Lanes {
    #[inline]
    fn bitand_assign(&mut self, rhs: Self) {
        *self = self.intersect(rhs);
    }
}

impl Not for Lanes {
    type Output = Self;

    #[inline]
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lanes({:#033b})", self.0)
    }
}

/// Priority of a lane band. Higher values are more urgent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LanePriority {
    /// No lanes.
    #[default]
    NoLane = 0,
    /// Hidden subtree work.
    Offscreen = 1,
    /// Idle work.
    Idle = 2,
    /// Retry after suspension.
    Retry = 5,
    /// Transitions.
    Transition = 6,
    /// Default updates.
    Default = 8,
    /// Continuous input.
    InputContinuous = 10,
    /// Discrete input.
    InputDiscrete = 12,
    /// Batched synchronous work.
    SyncBatched = 14,
    /// Synchronous work.
    Sync = 15,
}

impl LanePriority {
    /// Maps a lane priority to the scheduler priority its callback runs at.
    ///
    /// Returns `None` for [`LanePriority::NoLane`].
    #[must_use]
    pub const fn to_scheduler_priority(self) -> Option<Priority> {
        match self {
            Self::Sync | Self::SyncBatched => Some(Priority::Immediate),
            Self::InputDiscrete | Self::InputContinuous => Some(Priority::UserBlocking),
            Self::Default | Self::Transition | Self::Retry => Some(Priority::Normal),
            Self::Idle | Self::Offscreen => Some(Priority::Idle),
            Self::NoLane => None,
        }
    }

    /// Maps the ambient scheduler priority to the lane band updates use.
    #[must_use]
    pub const fn from_scheduler_priority(priority: Priority) -> Self {
        match priority {
            Priority::Immediate => Self::Sync,
            Priority::UserBlocking => Self::InputContinuous,
            Priority::Normal | Priority::Low => Self::Default,
            Priority::Idle => Self::Idle,
        }
    }
}

/// Priority class of a host event, as reported by the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EventPriority {
    /// Discrete input such as a click or key press.
    Discrete,
    /// Continuous input such as pointer movement.
    Continuous,
    /// No event, or an event without special urgency.
    #[default]
    Default,
    /// Background notifications.
    Idle,
}

impl EventPriority {
    /// The scheduler priority updates dispatched during such an event run at.
    #[must_use]
    pub const fn scheduler_priority(self) -> Priority {
        match self {
            Self::Discrete | Self::Continuous => Priority::UserBlocking,
            Self::Default => Priority::Normal,
            Self::Idle => Priority::Idle,
        }
    }
}

/// Picks a free lane in the band for `priority`, avoiding lanes in
/// `wip_lanes` so a new update does not join a render already in progress.
///
/// When every lane of the band is taken the search moves to the next lower
/// band.
#[must_use]
pub fn find_update_lane(priority: LanePriority, wip_lanes: Lanes) -> Lane {
    match priority {
        LanePriority::NoLane | LanePriority::Offscreen => Lanes::NONE,
        LanePriority::Sync => Lanes::SYNC,
        LanePriority::SyncBatched => Lanes::SYNC_BATCHED,
        LanePriority::InputDiscrete => {
            let lane = Lanes::INPUT_DISCRETE.remove(wip_lanes).pick_arbitrary();
            if lane.is_empty() {
                find_update_lane(LanePriority::InputContinuous, wip_lanes)
            } else {
                lane
            }
        }
        LanePriority::InputContinuous => {
            let lane = Lanes::INPUT_CONTINUOUS.remove(wip_lanes).pick_arbitrary();
            if lane.is_empty() {
                find_update_lane(LanePriority::Default, wip_lanes)
            } else {
                lane
            }
        }
        LanePriority::Default | LanePriority::Transition | LanePriority::Retry => {
            let mut lane = Lanes::DEFAULT.remove(wip_lanes).pick_arbitrary();
            if lane.is_empty() {
                // Default band is full; borrow a transition lane before
                // colliding with the render in progress.
                lane = Lanes::TRANSITIONS.remove(wip_lanes).pick_arbitrary();
                if lane.is_empty() {
                    lane = Lanes::DEFAULT.pick_arbitrary();
                }
            }
            lane
        }
        LanePriority::Idle => {
            let lane = Lanes::IDLE.remove(wip_lanes).pick_arbitrary();
            if lane.is_empty() {
                Lanes::IDLE.pick_arbitrary()
            } else {
                lane
            }
        }
    }
}

/// Picks a transition lane not used by the render in progress nor already
/// pending, falling back to progressively busier lanes.
#[must_use]
pub fn find_transition_lane(wip_lanes: Lanes, pending_lanes: Lanes) -> Lane {
    let lane = Lanes::TRANSITIONS
        .remove(wip_lanes | pending_lanes)
        .pick_arbitrary();
    if !lane.is_empty() {
        return lane;
    }
    let lane = Lanes::TRANSITIONS.remove(wip_lanes).pick_arbitrary();
    if !lane.is_empty() {
        return lane;
    }
    Lanes::TRANSITIONS.pick_arbitrary()
}

/// Picks a retry lane not used by the render in progress.
#[must_use]
pub fn find_retry_lane(wip_lanes: Lanes) -> Lane {
    let lane = Lanes::RETRY.remove(wip_lanes).pick_arbitrary();
    if lane.is_empty() {
        Lanes::RETRY.pick_arbitrary()
    } else {
        lane
    }
}

/// Returns when an update in `lane` scheduled at `now` becomes starved, or
/// `None` if the lane never expires.
#[must_use]
pub fn compute_expiration_time(lane: Lane, now: HostTime) -> Option<HostTime> {
    let priority = lane.priority();
    if priority >= LanePriority::InputContinuous {
        Some(now.saturating_add(Duration::from_millis(250)))
    } else if priority >= LanePriority::Transition {
        Some(now.saturating_add(Duration::from_millis(5000)))
    } else {
        None
    }
}

/// Per-root lane bookkeeping.
#[derive(Clone, Debug)]
pub struct RootLanes {
    /// Lanes with at least one unprocessed update.
    pub pending: Lanes,
    /// Pending lanes whose last render suspended.
    pub suspended: Lanes,
    /// Suspended lanes whose dependency has since resolved.
    pub pinged: Lanes,
    /// Lanes that waited past their expiration time.
    pub expired: Lanes,
    expiration_times: [Option<HostTime>; TOTAL_LANES],
}

impl Default for RootLanes {
    fn default() -> Self {
        Self {
            pending: Lanes::NONE,
            suspended: Lanes::NONE,
            pinged: Lanes::NONE,
            expired: Lanes::NONE,
            expiration_times: [None; TOTAL_LANES],
        }
    }
}

impl RootLanes {
    /// Returns the lanes to render next and their band priority.
    ///
    /// Expired lanes come first and are rendered synchronously, together with
    /// a pending [`Lanes::SYNC`] so it never waits behind them. Otherwise the
    /// candidate set is `pending - suspended`, or the pinged lanes when every
    /// pending lane is suspended, with idle work considered only when no
    /// other work is pending. The highest-priority band of the candidates is
    /// returned whole.
    ///
    /// When `wip_lanes` (the lanes of a render in progress) are at least as
    /// urgent as the candidates, the render in progress keeps going.
    #[must_use]
    pub fn next_lanes(&self, wip_lanes: Lanes) -> (Lanes, LanePriority) {
        let pending = self.pending;
        if pending.is_empty() {
            return (Lanes::NONE, LanePriority::NoLane);
        }

        let (next, priority) = if !self.expired.is_empty() {
            (self.expired | (pending & Lanes::SYNC), LanePriority::Sync)
        } else {
            let non_idle = pending & Lanes::NON_IDLE;
            let candidates = if non_idle.is_empty() {
                pending
            } else {
                non_idle
            };
            let unblocked = candidates.remove(self.suspended);
            if !unblocked.is_empty() {
                unblocked.highest_priority_band()
            } else {
                let pinged = candidates & self.pinged;
                if pinged.is_empty() {
                    (Lanes::NONE, LanePriority::NoLane)
                } else {
                    pinged.highest_priority_band()
                }
            }
        };

        if next.is_empty() {
            return (Lanes::NONE, LanePriority::NoLane);
        }

        if !wip_lanes.is_empty()
            && wip_lanes != next
            && !wip_lanes.includes_some(self.suspended)
        {
            let wip_priority = wip_lanes.priority();
            if priority <= wip_priority {
                return (wip_lanes, wip_priority);
            }
        }

        (next, priority)
    }

    /// Records a new update in `lane`.
    ///
    /// Any suspended or pinged lane of equal or lower priority is released:
    /// the new update may unblock it, so it gets another attempt.
    pub fn mark_updated(&mut self, lane: Lane) {
        self.pending |= lane;
        if !Lanes::IDLE.includes_some(lane) {
            let higher = Lanes::from_bits(lane.highest_priority_lane().bits().wrapping_sub(1));
            self.suspended &= higher;
            self.pinged &= higher;
        }
    }

    /// Records that a render of `lanes` suspended.
    pub fn mark_suspended(&mut self, lanes: Lanes) {
        self.suspended |= lanes;
        self.pinged = self.pinged.remove(lanes);
        for lane in lanes.iter() {
            self.expiration_times[lane.index()] = None;
        }
    }

    /// Records that a dependency blocking `lanes` resolved.
    pub fn mark_pinged(&mut self, lanes: Lanes) {
        self.pinged |= self.suspended & lanes;
    }

    /// Forces `lanes` to render synchronously next time.
    pub fn mark_expired(&mut self, lanes: Lanes) {
        self.expired |= lanes & self.pending;
    }

    /// Records a commit; `remaining` are the lanes still pending in the
    /// committed tree.
    pub fn mark_finished(&mut self, remaining: Lanes) {
        let no_longer_pending = self.pending.remove(remaining);
        self.pending = remaining;
        self.suspended = Lanes::NONE;
        self.pinged = Lanes::NONE;
        self.expired &= remaining;
        for lane in no_longer_pending.iter() {
            self.expiration_times[lane.index()] = None;
        }
    }

    /// Starts the expiration clock for newly pending lanes and marks lanes
    /// whose clock ran out as expired.
    ///
    /// Suspended lanes that have not been pinged do not age, so a blocked
    /// render cannot starve its way into a synchronous retry.
    pub fn mark_starved_as_expired(&mut self, now: HostTime) {
        for lane in self.pending.iter() {
            let index = lane.index();
            match self.expiration_times[index] {
                None => {
                    if !self.suspended.includes_some(lane) || self.pinged.includes_some(lane) {
                        self.expiration_times[index] = compute_expiration_time(lane, now);
                    }
                }
                Some(expires) => {
                    if expires <= now {
                        self.expired |= lane;
                    }
                }
            }
        }
    }

    /// Returns the expiration time recorded for `lane`, if any.
    #[must_use]
    pub fn expiration_time(&self, lane: Lane) -> Option<HostTime> {
        self.expiration_times[lane.index()]
    }

    /// Lanes worth retrying synchronously after a render error.
    ///
    /// Prefers the non-offscreen pending lanes; the render that errored may
    /// have been blocked on an interleaved update in one of them.
    #[must_use]
    pub fn lanes_to_retry_on_error(&self) -> Lanes {
        let everything_but_offscreen = self.pending.remove(Lanes::OFFSCREEN);
        if !everything_but_offscreen.is_empty() {
            return everything_but_offscreen;
        }
        if self.pending.includes_some(Lanes::OFFSCREEN) {
            return Lanes::OFFSCREEN;
        }
        Lanes::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_do_not_overlap() {
        let bands = [
            Lanes::SYNC,
            Lanes::SYNC_BATCHED,
            Lanes::INPUT_DISCRETE,
            Lanes::INPUT_CONTINUOUS,
            Lanes::DEFAULT,
            Lanes::TRANSITIONS,
            Lanes::RETRY,
            Lanes::IDLE,
            Lanes::OFFSCREEN,
        ];
        let mut seen = Lanes::NONE;
        for band in bands {
            assert!(!seen.includes_some(band), "{band:?} overlaps");
            seen |= band;
        }
        assert!(Lanes::ALL.contains(seen));
        assert!(Lanes::NON_IDLE.contains(Lanes::RETRY));
        assert!(!Lanes::NON_IDLE.includes_some(Lanes::IDLE));
    }

    #[test]
    fn set_algebra() {
        let a = Lanes::SYNC | Lanes::lane(9);
        let b = Lanes::lane(9) | Lanes::lane(10);
        assert_eq!(a.merge(b).count(), 3);
        assert_eq!(a.remove(b), Lanes::SYNC);
        assert_eq!(a & b, Lanes::lane(9));
        assert!(a.includes_some(b));
        assert!(Lanes::DEFAULT.contains(b));
        assert!(!b.contains(Lanes::DEFAULT));
        assert!(Lanes::NONE.is_empty());
        assert_eq!(!Lanes::NONE, Lanes::ALL);
    }

    #[test]
    fn highest_and_lowest_priority_lanes() {
        let set = Lanes::lane(4) | Lanes::lane(10) | Lanes::lane(29);
        assert_eq!(set.highest_priority_lane(), Lanes::lane(4));
        assert_eq!(set.pick_arbitrary(), Lanes::lane(4));
        assert_eq!(set.lowest_priority_lane(), Lanes::lane(29));
        assert_eq!(Lanes::lane(10).index(), 10);
        let collected: alloc::vec::Vec<_> = set.iter().collect();
        assert_eq!(collected, [Lanes::lane(4), Lanes::lane(10), Lanes::lane(29)]);
    }

    #[test]
    fn band_isolation_returns_whole_band() {
        let set = Lanes::lane(9) | Lanes::lane(11) | Lanes::lane(14);
        let (band, priority) = set.highest_priority_band();
        assert_eq!(band, Lanes::lane(9) | Lanes::lane(11));
        assert_eq!(priority, LanePriority::Default);
        assert_eq!(Lanes::NONE.highest_priority_band().1, LanePriority::NoLane);
    }

    #[test]
    fn next_lanes_prefers_sync() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(9));
        root.mark_updated(Lanes::lane(14));
        root.mark_updated(Lanes::SYNC);
        let (next, priority) = root.next_lanes(Lanes::NONE);
        assert_eq!(next, Lanes::SYNC);
        assert_eq!(priority, LanePriority::Sync);

        // A starved lane does not push a pending sync update back.
        let mut root = RootLanes::default();
        let continuous = Lanes::lane(6);
        root.mark_updated(continuous);
        root.mark_starved_as_expired(HostTime::ZERO);
        root.mark_starved_as_expired(HostTime::MAX);
        assert_eq!(root.expired, continuous);
        root.mark_updated(Lanes::SYNC);
        let (next, priority) = root.next_lanes(Lanes::NONE);
        assert_eq!(next, continuous | Lanes::SYNC);
        assert_eq!(priority, LanePriority::Sync);
    }

    #[test]
    fn next_lanes_is_subset_of_pending() {
        let mut root = RootLanes::default();
        for bits in [0b1_u32, 0b1000, 0b1100_0000, 0b10_0000_0000, 1 << 28] {
            root.mark_updated(Lanes::from_bits(bits));
            let (next, _) = root.next_lanes(Lanes::NONE);
            assert!(!next.is_empty(), "pending work must yield lanes");
            assert!(root.pending.contains(next), "next ⊆ pending");
        }
    }

    #[test]
    fn suspended_lanes_are_skipped_until_pinged() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(9));
        root.mark_suspended(Lanes::lane(9));
        assert_eq!(root.next_lanes(Lanes::NONE).0, Lanes::NONE);
        root.mark_pinged(Lanes::lane(9));
        assert_eq!(root.next_lanes(Lanes::NONE).0, Lanes::lane(9));
    }

    #[test]
    fn update_releases_lower_priority_suspensions() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(14));
        root.mark_suspended(Lanes::lane(14));
        root.mark_updated(Lanes::lane(9));
        assert!(root.suspended.is_empty(), "default update unsuspends transition");
    }

    #[test]
    fn idle_only_when_nothing_else() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(28));
        root.mark_updated(Lanes::lane(13));
        assert_eq!(root.next_lanes(Lanes::NONE).0, Lanes::lane(13));
        root.mark_finished(Lanes::lane(28));
        assert_eq!(root.next_lanes(Lanes::NONE).0, Lanes::lane(28));
    }

    #[test]
    fn wip_lanes_are_kept_when_not_outranked() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(9));
        root.mark_updated(Lanes::lane(13));
        // Rendering the default lane; a transition arriving does not interrupt.
        let (next, _) = root.next_lanes(Lanes::lane(9));
        assert_eq!(next, Lanes::lane(9));
        // A sync update does.
        root.mark_updated(Lanes::SYNC);
        assert_eq!(root.next_lanes(Lanes::lane(9)).0, Lanes::SYNC);
    }

    #[test]
    fn starved_lanes_expire() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(6));
        root.mark_starved_as_expired(HostTime::ZERO);
        assert_eq!(
            root.expiration_time(Lanes::lane(6)),
            Some(HostTime::ZERO + Duration::from_millis(250))
        );
        root.mark_starved_as_expired(HostTime::ZERO + Duration::from_millis(250));
        assert_eq!(root.expired, Lanes::lane(6));
        assert_eq!(root.next_lanes(Lanes::NONE), (Lanes::lane(6), LanePriority::Sync));
    }

    #[test]
    fn finishing_clears_bookkeeping() {
        let mut root = RootLanes::default();
        root.mark_updated(Lanes::lane(6));
        root.mark_updated(Lanes::lane(9));
        root.mark_starved_as_expired(HostTime::ZERO);
        root.mark_finished(Lanes::lane(9));
        assert_eq!(root.pending, Lanes::lane(9));
        assert_eq!(root.expiration_time(Lanes::lane(6)), None);
    }

    #[test]
    fn update_lane_avoids_wip_lanes() {
        let first = find_update_lane(LanePriority::Default, Lanes::NONE);
        assert_eq!(first, Lanes::lane(9));
        let second = find_update_lane(LanePriority::Default, first);
        assert_eq!(second, Lanes::lane(10));
        // Discrete band full: overflow to continuous.
        let lane = find_update_lane(LanePriority::InputDiscrete, Lanes::INPUT_DISCRETE);
        assert_eq!(lane, Lanes::lane(6));
        // Default and transitions full: collide with default.
        let lane = find_update_lane(
            LanePriority::Default,
            Lanes::DEFAULT | Lanes::TRANSITIONS,
        );
        assert_eq!(lane, Lanes::lane(9));
    }

    #[test]
    fn transition_and_retry_lanes() {
        assert_eq!(find_transition_lane(Lanes::NONE, Lanes::lane(13)), Lanes::lane(14));
        assert_eq!(find_retry_lane(Lanes::lane(22)), Lanes::lane(23));
        assert_eq!(find_retry_lane(Lanes::RETRY), Lanes::lane(22));
    }

    #[test]
    fn scheduler_priority_mapping() {
        assert_eq!(
            LanePriority::Sync.to_scheduler_priority(),
            Some(Priority::Immediate)
        );
        assert_eq!(
            LanePriority::Transition.to_scheduler_priority(),
            Some(Priority::Normal)
        );
        assert_eq!(LanePriority::NoLane.to_scheduler_priority(), None);
        assert_eq!(
            LanePriority::from_scheduler_priority(Priority::UserBlocking),
            LanePriority::InputContinuous
        );
    }
}
