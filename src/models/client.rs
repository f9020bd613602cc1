// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client registry records and per-user profiles.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Quota used when a user has no profile or no matching client record.
pub const DEFAULT_MAX_BOOKINGS_PER_MONTH: u32 = 2;
pub const MIN_BOOKINGS_PER_MONTH: u32 = 1;
pub const MAX_BOOKINGS_PER_MONTH: u32 = 31;

/// Administrator-owned client record, stored at `clients/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct ClientRecord {
    /// Derived from the normalized email, see [`client_id_for_email`]
    pub id: String,
    /// Normalized (trimmed, lowercase) email
    pub email: String,
    pub display_name: String,
    pub max_bookings_per_month: u32,
}

/// Per-user profile, stored at `userProfiles/{uid}`.
///
/// Derived data: reconciled from the matching [`ClientRecord`] on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_quota")]
    pub max_bookings_per_month: u32,
}

fn default_quota() -> u32 {
    DEFAULT_MAX_BOOKINGS_PER_MONTH
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Stable document id for a client email.
///
/// Percent-encodes the normalized address and additionally escapes `.`, so
/// the id is a single path segment and distinct emails never collide.
pub fn client_id_for_email(email: &str) -> String {
    urlencoding::encode(&normalize_email(email)).replace('.', "%2E")
}

/// Clamp a requested monthly quota into the allowed range.
pub fn clamp_quota(requested: i64) -> u32 {
    requested.clamp(
        MIN_BOOKINGS_PER_MONTH as i64,
        MAX_BOOKINGS_PER_MONTH as i64,
    ) as u32
}
