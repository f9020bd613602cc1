// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Occupancy projections delivered to calendar viewers.
//!
//! Two distinct types exist on purpose: the anonymous projection has no
//! field that could carry a booker's identity, so nothing can leak through
//! serialization.

use super::{Booking, SlotId};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Per-slot "is anything booked here" flags for one date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SlotOccupancy {
    pub morning: bool,
    pub afternoon: bool,
}

impl SlotOccupancy {
    pub fn get(&self, slot: SlotId) -> bool {
        match slot {
            SlotId::Morning => self.morning,
            SlotId::Afternoon => self.afternoon,
        }
    }

    fn mark(&mut self, slot: SlotId) {
        match slot {
            SlotId::Morning => self.morning = true,
            SlotId::Afternoon => self.afternoon = true,
        }
    }
}

/// Anonymous occupancy keyed by date. Dates without bookings are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OccupancyMap(pub BTreeMap<NaiveDate, SlotOccupancy>);

impl OccupancyMap {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let mut map: BTreeMap<NaiveDate, SlotOccupancy> = BTreeMap::new();
        for booking in bookings {
            map.entry(booking.date).or_default().mark(booking.slot_id);
        }
        Self(map)
    }

    pub fn is_occupied(&self, date: NaiveDate, slot: SlotId) -> bool {
        self.0.get(&date).is_some_and(|day| day.get(slot))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Who holds a booking, as shown to the administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct SlotHolder {
    pub booking_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
}

/// Bookings of one date, grouped by slot. A slot may list more than one
/// holder when concurrent bookings raced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DetailedDay {
    pub morning: Vec<SlotHolder>,
    pub afternoon: Vec<SlotHolder>,
}

/// Admin occupancy keyed by date, with identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetailedOccupancy(pub BTreeMap<NaiveDate, DetailedDay>);

impl DetailedOccupancy {
    pub fn from_bookings<'a>(bookings: impl IntoIterator<Item = &'a Booking>) -> Self {
        let mut map: BTreeMap<NaiveDate, DetailedDay> = BTreeMap::new();
        for booking in bookings {
            let day = map.entry(booking.date).or_default();
            let holder = SlotHolder {
                booking_id: booking.id.clone(),
                user_id: booking.user_id.clone(),
                user_email: booking.user_email.clone(),
            };
            match booking.slot_id {
                SlotId::Morning => day.morning.push(holder),
                SlotId::Afternoon => day.afternoon.push(holder),
            }
        }
        Self(map)
    }
}
