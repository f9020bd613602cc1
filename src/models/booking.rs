// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking records.

use super::SlotId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A reservation of one (date, slot) by one user.
///
/// Stored at `bookings/{id}`. The store enforces no uniqueness per
/// (date, slot); capacity is only considered when a booking is admitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    /// Generated document id
    pub id: String,
    /// Owning user (opaque id from the identity provider)
    pub user_id: String,
    /// Denormalized owner email, for admin views only (not authoritative)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Calendar date, stored as `yyyy-MM-dd`
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub date: NaiveDate,
    pub slot_id: SlotId,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

/// Booking fields supplied by the caller; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: String,
    pub user_email: Option<String>,
    pub date: NaiveDate,
    pub slot_id: SlotId,
    pub created_at: DateTime<Utc>,
}

impl NewBooking {
    pub fn into_booking(self, id: String) -> Booking {
        Booking {
            id,
            user_id: self.user_id,
            user_email: self.user_email,
            date: self.date,
            slot_id: self.slot_id,
            created_at: self.created_at,
        }
    }
}
