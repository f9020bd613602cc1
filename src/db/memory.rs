// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory backend with the same semantics as Firestore.
//!
//! Used for tests, benchmarks and `STORAGE_BACKEND=memory` local runs.

use super::feed::{ChangeFeed, ChangeSource, Listener, StoreEvent, Subscription};
use super::rules::{self, Principal};
use super::{collections, new_document_id, BookingStore, ClientStore, OverridesStore, ProfileStore};
use crate::error::AppError;
use crate::models::{Booking, ClientRecord, NewBooking, OverridesConfig, SlotId, UserProfile};
use crate::time_utils::DateRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    bookings: DashMap<String, Booking>,
    clients: DashMap<String, ClientRecord>,
    profiles: DashMap<String, UserProfile>,
    config: DashMap<&'static str, OverridesConfig>,
}

/// In-memory database. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryDb {
    data: Arc<Collections>,
    feed: ChangeFeed,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.slot_id.cmp(&b.slot_id))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        bookings
    }

    fn collect_where(&self, mut keep: impl FnMut(&Booking) -> bool) -> Vec<Booking> {
        Self::sorted(
            self.data
                .bookings
                .iter()
                .filter(|entry| keep(entry.value()))
                .map(|entry| entry.value().clone())
                .collect(),
        )
    }

    fn existing_booking(&self, id: &str) -> Result<Booking, AppError> {
        self.data
            .bookings
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }
}

#[async_trait]
impl BookingStore for MemoryDb {
    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, AppError> {
        Ok(self.data.bookings.get(id).map(|entry| entry.value().clone()))
    }

    async fn create_booking(
        &self,
        booking: NewBooking,
        principal: &Principal,
    ) -> Result<Booking, AppError> {
        rules::check_create(principal, &booking)?;

        let booking = booking.into_booking(new_document_id()?);
        self.data
            .bookings
            .insert(booking.id.clone(), booking.clone());
        self.feed.publish(StoreEvent::BookingCreated(booking.clone()));
        Ok(booking)
    }

    async fn list_bookings_in_range(&self, range: DateRange) -> Result<Vec<Booking>, AppError> {
        Ok(self.collect_where(|b| range.contains(b.date)))
    }

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError> {
        Ok(self.collect_where(|b| b.user_id == user_id))
    }

    async fn count_user_bookings_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<u32, AppError> {
        let count = self
            .data
            .bookings
            .iter()
            .filter(|entry| entry.user_id == user_id && range.contains(entry.date))
            .count();
        Ok(count as u32)
    }

    async fn list_all_bookings(&self) -> Result<Vec<Booking>, AppError> {
        Ok(self.collect_where(|_| true))
    }

    async fn update_booking(
        &self,
        id: &str,
        date: NaiveDate,
        slot_id: SlotId,
        principal: &Principal,
    ) -> Result<Booking, AppError> {
        let before = self.existing_booking(id)?;
        rules::check_update(principal, &before)?;

        let after = Booking {
            date,
            slot_id,
            ..before.clone()
        };
        self.data.bookings.insert(id.to_string(), after.clone());
        self.feed.publish(StoreEvent::BookingUpdated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    async fn delete_booking(&self, id: &str, principal: &Principal) -> Result<Booking, AppError> {
        let existing = self.existing_booking(id)?;
        rules::check_delete(principal, &existing)?;

        let (_, removed) = self
            .data
            .bookings
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))?;
        self.feed.publish(StoreEvent::BookingDeleted(removed.clone()));
        Ok(removed)
    }
}

#[async_trait]
impl ClientStore for MemoryDb {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, AppError> {
        Ok(self.data.clients.get(id).map(|entry| entry.value().clone()))
    }

    async fn upsert_client(&self, client: &ClientRecord) -> Result<(), AppError> {
        self.data.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, AppError> {
        let mut clients: Vec<ClientRecord> = self
            .data
            .clients
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        clients.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(clients)
    }

    async fn delete_client(&self, id: &str) -> Result<bool, AppError> {
        Ok(self.data.clients.remove(id).is_some())
    }
}

#[async_trait]
impl ProfileStore for MemoryDb {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(self.data.profiles.get(uid).map(|entry| entry.value().clone()))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        self.data
            .profiles
            .insert(profile.uid.clone(), profile.clone());
        self.feed.publish(StoreEvent::ProfileChanged(profile.clone()));
        Ok(())
    }
}

#[async_trait]
impl OverridesStore for MemoryDb {
    async fn get_overrides(&self) -> Result<OverridesConfig, AppError> {
        Ok(self
            .data
            .config
            .get(collections::CALENDAR_DOC)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn set_overrides(&self, config: &OverridesConfig) -> Result<(), AppError> {
        self.data
            .config
            .insert(collections::CALENDAR_DOC, config.clone());
        self.feed.publish(StoreEvent::OverridesChanged(config.clone()));
        Ok(())
    }
}

impl ChangeSource for MemoryDb {
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.feed.subscribe(listener)
    }
}
