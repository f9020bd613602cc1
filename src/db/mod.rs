// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer: store capabilities and their backends.

pub mod feed;
pub mod firestore;
pub mod memory;
pub mod rules;

pub use feed::{listener, ChangeFeed, ChangeSource, StoreEvent, Subscription};
pub use firestore::FirestoreDb;
pub use memory::MemoryDb;
pub use rules::Principal;

use crate::error::AppError;
use crate::models::{Booking, ClientRecord, NewBooking, OverridesConfig, SlotId, UserProfile};
use crate::time_utils::DateRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use ring::rand::{SecureRandom, SystemRandom};
use std::sync::Arc;

/// Collection names as constants.
pub mod collections {
    pub const CLIENTS: &str = "clients";
    pub const USER_PROFILES: &str = "userProfiles";
    pub const BOOKINGS: &str = "bookings";
    /// Holds the `calendar` overrides singleton
    pub const CONFIG: &str = "config";
    pub const CALENDAR_DOC: &str = "calendar";
}

/// Reservation log.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, AppError>;

    async fn create_booking(
        &self,
        booking: NewBooking,
        principal: &Principal,
    ) -> Result<Booking, AppError>;

    /// Bookings whose date lies in the inclusive range.
    async fn list_bookings_in_range(&self, range: DateRange) -> Result<Vec<Booking>, AppError>;

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError>;

    async fn count_user_bookings_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<u32, AppError>;

    async fn list_all_bookings(&self) -> Result<Vec<Booking>, AppError>;

    /// Move a booking. Returns the updated record.
    async fn update_booking(
        &self,
        id: &str,
        date: NaiveDate,
        slot_id: SlotId,
        principal: &Principal,
    ) -> Result<Booking, AppError>;

    /// Remove a booking. Returns the removed record.
    async fn delete_booking(&self, id: &str, principal: &Principal) -> Result<Booking, AppError>;
}

/// Administrator-owned client records.
#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, AppError>;
    async fn upsert_client(&self, client: &ClientRecord) -> Result<(), AppError>;
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, AppError>;
    /// Returns whether a record was removed.
    async fn delete_client(&self, id: &str) -> Result<bool, AppError>;
}

/// Per-user profiles keyed by user id.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError>;
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError>;
}

/// Access to the overrides singleton.
#[async_trait]
pub trait OverridesStore: Send + Sync {
    /// Current overrides; empty when the document was never written.
    async fn get_overrides(&self) -> Result<OverridesConfig, AppError>;
    async fn set_overrides(&self, config: &OverridesConfig) -> Result<(), AppError>;
}

/// The store capabilities handed to services.
#[derive(Clone)]
pub struct Stores {
    pub bookings: Arc<dyn BookingStore>,
    pub clients: Arc<dyn ClientStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub overrides: Arc<dyn OverridesStore>,
    pub changes: Arc<dyn ChangeSource>,
}

impl Stores {
    /// Use one backend for every capability.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: BookingStore + ClientStore + ProfileStore + OverridesStore + ChangeSource + 'static,
    {
        Self {
            bookings: backend.clone(),
            clients: backend.clone(),
            profiles: backend.clone(),
            overrides: backend.clone(),
            changes: backend,
        }
    }
}

const AUTO_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const AUTO_ID_LEN: usize = 20;
/// Bytes at or above this would favour the start of the alphabet.
const UNBIASED_BYTE_LIMIT: usize = 256 - 256 % AUTO_ID_ALPHABET.len();

fn id_char(byte: u8) -> Option<char> {
    let byte = byte as usize;
    (byte < UNBIASED_BYTE_LIMIT).then(|| AUTO_ID_ALPHABET[byte % AUTO_ID_ALPHABET.len()] as char)
}

/// Random 20-character document id, uniform over the alphanumeric alphabet.
pub fn new_document_id() -> Result<String, AppError> {
    let rng = SystemRandom::new();
    let mut id = String::with_capacity(AUTO_ID_LEN);
    let mut bytes = [0u8; AUTO_ID_LEN];

    while id.len() < AUTO_ID_LEN {
        rng.fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Random id generation failed")))?;
        let missing = AUTO_ID_LEN - id.len();
        id.extend(bytes.iter().filter_map(|b| id_char(*b)).take(missing));
    }
    Ok(id)
}
