// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Side-effect flags.

use bitflags::bitflags;

bitflags! {
    /// Side effects a work node carries into the commit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub(crate) struct Flags: u16 {
        /// Render function ran. Never committed on its own.
        const PERFORMED_WORK = 1;
        /// Insert (or move) the host node.
        const PLACEMENT = 1 << 1;
        /// Apply a prepared host update or run `did_update`.
        const UPDATE = 1 << 2;
        /// Update callbacks to run in the layout pass.
        const CALLBACK = 1 << 5;
        /// An error boundary rendered its captured state.
        const DID_CAPTURE = 1 << 6;
        /// Attach or detach a ref.
        const REF = 1 << 7;
        /// Read state before mutations.
        const SNAPSHOT = 1 << 8;
        /// Passive effects to run after paint.
        const PASSIVE = 1 << 9;
        /// The node did not complete because a descendant failed.
        const INCOMPLETE = 1 << 11;
        /// Error boundary that should re-render with a captured error.
        const SHOULD_CAPTURE = 1 << 12;
    }
}

impl Flags {
    /// Flags that put a node on the effect list.
    pub(crate) const EFFECTS: Self = Self::PLACEMENT
        .union(Self::UPDATE)
        .union(Self::CALLBACK)
        .union(Self::REF)
        .union(Self::SNAPSHOT)
        .union(Self::PASSIVE);

    /// Everything except the unwinding markers.
    pub(crate) const HOST_EFFECTS: Self = Self::all()
        .difference(Self::INCOMPLETE)
        .difference(Self::SHOULD_CAPTURE);
}
