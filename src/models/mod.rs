// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod booking;
pub mod client;
pub mod occupancy;
pub mod overrides;
pub mod slot;

pub use booking::{Booking, NewBooking};
pub use client::{ClientRecord, UserProfile, DEFAULT_MAX_BOOKINGS_PER_MONTH};
pub use occupancy::{DetailedOccupancy, OccupancyMap, SlotOccupancy};
pub use overrides::{DisabledSlot, OverridesConfig};
pub use slot::{SlotDefinition, SlotId, SLOTS};
