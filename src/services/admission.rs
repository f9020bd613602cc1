// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking admission.
//!
//! A request is checked in a fixed order and the first failing check wins:
//! 1. the date is not disabled
//! 2. the (date, slot) is not disabled
//! 3. the user's bookings in the target date's month are below their quota
//!
//! Single occupancy of a slot is NOT enforced here. Two concurrent requests
//! for the same (date, slot) can both be admitted; the administrator resolves
//! such double bookings with the admin operations below.

use crate::db::{BookingStore, OverridesStore, ProfileStore, Stores};
use crate::error::{AdmissionError, AppError};
use crate::models::{Booking, NewBooking, SlotId, DEFAULT_MAX_BOOKINGS_PER_MONTH};
use crate::services::identity::{AdminSession, ClientSession};
use crate::time_utils::DateRange;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Bookings used versus allowed in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MonthlyUsage {
    /// `yyyy-MM`
    pub month: String,
    pub count: u32,
    pub limit: u32,
}

/// Decides whether booking requests may be created.
#[derive(Clone)]
pub struct AdmissionEngine {
    bookings: Arc<dyn BookingStore>,
    overrides: Arc<dyn OverridesStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl AdmissionEngine {
    pub fn new(stores: &Stores) -> Self {
        Self {
            bookings: stores.bookings.clone(),
            overrides: stores.overrides.clone(),
            profiles: stores.profiles.clone(),
        }
    }

    /// The user's monthly quota, falling back to the system default.
    pub async fn effective_quota(&self, user_id: &str) -> Result<u32, AppError> {
        Ok(self
            .profiles
            .get_profile(user_id)
            .await?
            .map(|p| p.max_bookings_per_month)
            .unwrap_or(DEFAULT_MAX_BOOKINGS_PER_MONTH))
    }

    /// Bookings the user holds in the calendar month containing `date`.
    pub async fn monthly_count(&self, user_id: &str, date: NaiveDate) -> Result<u32, AppError> {
        self.bookings
            .count_user_bookings_in_range(user_id, DateRange::month_of(date))
            .await
    }

    pub async fn usage(&self, user_id: &str, date: NaiveDate) -> Result<MonthlyUsage, AppError> {
        let (count, limit) = tokio::try_join!(
            self.monthly_count(user_id, date),
            self.effective_quota(user_id)
        )?;
        Ok(MonthlyUsage {
            month: date.format("%Y-%m").to_string(),
            count,
            limit,
        })
    }

    /// Run the admission checks without writing anything.
    pub async fn check(
        &self,
        user_id: &str,
        date: NaiveDate,
        slot_id: SlotId,
    ) -> Result<(), AppError> {
        let overrides = self.overrides.get_overrides().await?;
        if overrides.is_date_disabled(date) {
            return Err(AdmissionError::DateDisabled.into());
        }
        if overrides.is_slot_disabled(date, slot_id) {
            return Err(AdmissionError::SlotDisabled.into());
        }

        let (count, limit) = tokio::try_join!(
            self.monthly_count(user_id, date),
            self.effective_quota(user_id)
        )?;
        if count >= limit {
            return Err(AdmissionError::QuotaExceeded { limit, count }.into());
        }

        Ok(())
    }

    /// Book a slot for the calling client.
    pub async fn try_book(
        &self,
        session: &ClientSession,
        date: NaiveDate,
        slot_id: SlotId,
    ) -> Result<Booking, AppError> {
        if let Err(e) = self.check(session.user_id(), date, slot_id).await {
            if let AppError::Admission(reason) = &e {
                tracing::info!(
                    user_id = session.user_id(),
                    %date,
                    slot = %slot_id,
                    reason = reason.code(),
                    "Booking rejected"
                );
            }
            return Err(e);
        }

        let booking = self
            .bookings
            .create_booking(
                NewBooking {
                    user_id: session.user_id().to_string(),
                    user_email: session.email().map(str::to_string),
                    date,
                    slot_id,
                    created_at: chrono::Utc::now(),
                },
                &session.principal(),
            )
            .await?;

        tracing::info!(
            user_id = session.user_id(),
            booking_id = %booking.id,
            %date,
            slot = %slot_id,
            "Booking created"
        );
        Ok(booking)
    }

    /// Cancel a booking. Ownership is enforced by the store's access rules.
    pub async fn cancel(
        &self,
        session: &ClientSession,
        booking_id: &str,
    ) -> Result<Booking, AppError> {
        let removed = self
            .bookings
            .delete_booking(booking_id, &session.principal())
            .await
            .inspect_err(|e| {
                if matches!(e, AppError::PermissionDenied(_)) {
                    tracing::warn!(
                        user_id = session.user_id(),
                        booking_id,
                        "Cancel rejected by access rules"
                    );
                }
            })?;

        tracing::info!(user_id = session.user_id(), booking_id, "Booking cancelled");
        Ok(removed)
    }

    /// Create a booking for any user. No overrides or quota checks.
    pub async fn admin_create_booking(
        &self,
        admin: &AdminSession,
        user_id: &str,
        user_email: Option<String>,
        date: NaiveDate,
        slot_id: SlotId,
    ) -> Result<Booking, AppError> {
        let booking = self
            .bookings
            .create_booking(
                NewBooking {
                    user_id: user_id.to_string(),
                    user_email,
                    date,
                    slot_id,
                    created_at: chrono::Utc::now(),
                },
                &admin.principal(),
            )
            .await?;

        tracing::info!(
            admin = admin.email(),
            user_id,
            booking_id = %booking.id,
            %date,
            slot = %slot_id,
            "Booking created by admin"
        );
        Ok(booking)
    }

    /// Move a booking. No overrides or quota checks.
    pub async fn admin_update_booking(
        &self,
        admin: &AdminSession,
        booking_id: &str,
        date: NaiveDate,
        slot_id: SlotId,
    ) -> Result<Booking, AppError> {
        let updated = self
            .bookings
            .update_booking(booking_id, date, slot_id, &admin.principal())
            .await?;

        tracing::info!(
            admin = admin.email(),
            booking_id,
            %date,
            slot = %slot_id,
            "Booking moved by admin"
        );
        Ok(updated)
    }

    pub async fn admin_delete_booking(
        &self,
        admin: &AdminSession,
        booking_id: &str,
    ) -> Result<Booking, AppError> {
        let removed = self
            .bookings
            .delete_booking(booking_id, &admin.principal())
            .await?;

        tracing::info!(admin = admin.email(), booking_id, "Booking deleted by admin");
        Ok(removed)
    }

    pub async fn list_user_bookings(&self, user_id: &str) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_bookings_for_user(user_id).await
    }

    pub async fn list_all_bookings(&self, _admin: &AdminSession) -> Result<Vec<Booking>, AppError> {
        self.bookings.list_all_bookings().await
    }
}
