// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Bookings (reservation log, range queries on the `date` string)
//! - Clients (administrator-owned records)
//! - User profiles (per-user quota copies)
//! - The `config/calendar` overrides singleton
//!
//! Dates are stored as `yyyy-MM-dd` strings, so range filters compare
//! strings and still follow calendar order.
//!
//! A listen stream on `bookings`, `userProfiles` and `config/calendar` feeds
//! the change feed, so live views also see writes made by other instances
//! or directly in the console.

use super::feed::{ChangeFeed, ChangeSource, Listener, StoreEvent, Subscription};
use super::rules::{self, Principal};
use super::{collections, new_document_id, BookingStore, ClientStore, OverridesStore, ProfileStore};
use crate::error::AppError;
use crate::models::{Booking, ClientRecord, NewBooking, OverridesConfig, SlotId, UserProfile};
use crate::time_utils::DateRange;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use firestore::{
    FirestoreListenEvent, FirestoreListener, FirestoreListenerTarget,
    FirestoreMemListenStateStorage,
};
use gcloud_sdk::google::firestore::v1::Document;
use std::sync::Arc;
use tokio::sync::Mutex;

type ChangeListener = FirestoreListener<firestore::FirestoreDb, FirestoreMemListenStateStorage>;

const BOOKINGS_TARGET: u32 = 1;
const PROFILES_TARGET: u32 = 2;
const CALENDAR_TARGET: u32 = 3;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
    feed: ChangeFeed,
    /// Last seen state of every booking, shared with the listen stream.
    known: Arc<DashMap<String, Booking>>,
    /// Runs for as long as any handle exists.
    _listener: Option<Arc<Mutex<ChangeListener>>>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Self::connected(client).await
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Self::connected(client).await
    }

    /// Wrap a connection and start relaying its listen stream.
    async fn connected(client: firestore::FirestoreDb) -> Result<Self, AppError> {
        let relay = RemoteChanges {
            feed: ChangeFeed::new(),
            known: Arc::new(DashMap::new()),
        };
        let listener = start_change_listener(&client, relay.clone()).await?;

        Ok(Self {
            client: Some(client),
            feed: relay.feed,
            known: relay.known,
            _listener: Some(Arc::new(Mutex::new(listener))),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            client: None,
            feed: ChangeFeed::new(),
            known: Arc::new(DashMap::new()),
            _listener: None,
        }
    }

    /// Helper to get the connection or return an error if offline.
    fn connection(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    async fn write_booking(&self, booking: &Booking) -> Result<(), AppError> {
        let _: () = self
            .connection()?
            .fluent()
            .update()
            .in_col(collections::BOOKINGS)
            .document_id(&booking.id)
            .object(booking)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn existing_booking(&self, id: &str) -> Result<Booking, AppError> {
        self.get_booking(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }
}

// ─── Booking Operations ──────────────────────────────────────

#[async_trait]
impl BookingStore for FirestoreDb {
    async fn get_booking(&self, id: &str) -> Result<Option<Booking>, AppError> {
        self.connection()?
            .fluent()
            .select()
            .by_id_in(collections::BOOKINGS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn create_booking(
        &self,
        booking: NewBooking,
        principal: &Principal,
    ) -> Result<Booking, AppError> {
        rules::check_create(principal, &booking)?;

        let booking = booking.into_booking(new_document_id()?);
        self.write_booking(&booking).await?;
        self.known.insert(booking.id.clone(), booking.clone());
        self.feed.publish(StoreEvent::BookingCreated(booking.clone()));
        Ok(booking)
    }

    async fn list_bookings_in_range(&self, range: DateRange) -> Result<Vec<Booking>, AppError> {
        let (start, end) = range.iso_bounds();

        self.connection()?
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("date").greater_than_or_equal(start.clone()),
                    q.field("date").less_than_or_equal(end.clone()),
                ])
            })
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list_bookings_for_user(&self, user_id: &str) -> Result<Vec<Booking>, AppError> {
        let user_id = user_id.to_string();

        self.connection()?
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| q.for_all([q.field("userId").eq(user_id.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count_user_bookings_in_range(
        &self,
        user_id: &str,
        range: DateRange,
    ) -> Result<u32, AppError> {
        let user_id = user_id.to_string();
        let (start, end) = range.iso_bounds();

        let bookings: Vec<Booking> = self
            .connection()?
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .filter(move |q| {
                q.for_all([
                    q.field("userId").eq(user_id.clone()),
                    q.field("date").greater_than_or_equal(start.clone()),
                    q.field("date").less_than_or_equal(end.clone()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(bookings.len() as u32)
    }

    async fn list_all_bookings(&self) -> Result<Vec<Booking>, AppError> {
        self.connection()?
            .fluent()
            .select()
            .from(collections::BOOKINGS)
            .order_by([("date", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update_booking(
        &self,
        id: &str,
        date: NaiveDate,
        slot_id: SlotId,
        principal: &Principal,
    ) -> Result<Booking, AppError> {
        let before = self.existing_booking(id).await?;
        rules::check_update(principal, &before)?;

        let after = Booking {
            date,
            slot_id,
            ..before.clone()
        };
        self.write_booking(&after).await?;
        self.known.insert(after.id.clone(), after.clone());
        self.feed.publish(StoreEvent::BookingUpdated {
            before,
            after: after.clone(),
        });
        Ok(after)
    }

    async fn delete_booking(&self, id: &str, principal: &Principal) -> Result<Booking, AppError> {
        let existing = self.existing_booking(id).await?;
        rules::check_delete(principal, &existing)?;

        self.connection()?
            .fluent()
            .delete()
            .from(collections::BOOKINGS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.known.remove(id);
        self.feed.publish(StoreEvent::BookingDeleted(existing.clone()));
        Ok(existing)
    }
}

// ─── Client Operations ───────────────────────────────────────

#[async_trait]
impl ClientStore for FirestoreDb {
    async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, AppError> {
        self.connection()?
            .fluent()
            .select()
            .by_id_in(collections::CLIENTS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_client(&self, client: &ClientRecord) -> Result<(), AppError> {
        let _: () = self
            .connection()?
            .fluent()
            .update()
            .in_col(collections::CLIENTS)
            .document_id(&client.id)
            .object(client)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, AppError> {
        self.connection()?
            .fluent()
            .select()
            .from(collections::CLIENTS)
            .order_by([("email", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn delete_client(&self, id: &str) -> Result<bool, AppError> {
        if self.get_client(id).await?.is_none() {
            return Ok(false);
        }

        self.connection()?
            .fluent()
            .delete()
            .from(collections::CLIENTS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(true)
    }
}

// ─── Profile Operations ──────────────────────────────────────

#[async_trait]
impl ProfileStore for FirestoreDb {
    async fn get_profile(&self, uid: &str) -> Result<Option<UserProfile>, AppError> {
        self.connection()?
            .fluent()
            .select()
            .by_id_in(collections::USER_PROFILES)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _: () = self
            .connection()?
            .fluent()
            .update()
            .in_col(collections::USER_PROFILES)
            .document_id(&profile.uid)
            .object(profile)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.feed.publish(StoreEvent::ProfileChanged(profile.clone()));
        Ok(())
    }
}

// ─── Overrides Operations ────────────────────────────────────

#[async_trait]
impl OverridesStore for FirestoreDb {
    async fn get_overrides(&self) -> Result<OverridesConfig, AppError> {
        let config: Option<OverridesConfig> = self
            .connection()?
            .fluent()
            .select()
            .by_id_in(collections::CONFIG)
            .obj()
            .one(collections::CALENDAR_DOC)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(config.unwrap_or_default())
    }

    async fn set_overrides(&self, config: &OverridesConfig) -> Result<(), AppError> {
        let _: () = self
            .connection()?
            .fluent()
            .update()
            .in_col(collections::CONFIG)
            .document_id(collections::CALENDAR_DOC)
            .object(config)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.feed.publish(StoreEvent::OverridesChanged(config.clone()));
        Ok(())
    }
}

impl ChangeSource for FirestoreDb {
    fn subscribe(&self, listener: Listener) -> Subscription {
        self.feed.subscribe(listener)
    }
}

// ─── Listen Stream ───────────────────────────────────────────

async fn start_change_listener(
    client: &firestore::FirestoreDb,
    relay: RemoteChanges,
) -> Result<ChangeListener, AppError> {
    let listen_error =
        |e: firestore::errors::FirestoreError| AppError::Database(format!("Listen failed: {}", e));

    let mut listener = client
        .create_listener(FirestoreMemListenStateStorage::new())
        .await
        .map_err(listen_error)?;

    client
        .fluent()
        .select()
        .from(collections::BOOKINGS)
        .listen()
        .add_target(FirestoreListenerTarget::new(BOOKINGS_TARGET), &mut listener)
        .map_err(listen_error)?;
    client
        .fluent()
        .select()
        .from(collections::USER_PROFILES)
        .listen()
        .add_target(FirestoreListenerTarget::new(PROFILES_TARGET), &mut listener)
        .map_err(listen_error)?;
    client
        .fluent()
        .select()
        .by_id_in(collections::CONFIG)
        .batch_listen([collections::CALENDAR_DOC])
        .add_target(FirestoreListenerTarget::new(CALENDAR_TARGET), &mut listener)
        .map_err(listen_error)?;

    listener
        .start(move |event| {
            let relay = relay.clone();
            async move {
                relay.apply(event);
                Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
            }
        })
        .await
        .map_err(listen_error)?;

    tracing::info!("Firestore change listener started");
    Ok(listener)
}

/// Split `.../documents/{collection}/{id}` into its last two segments.
fn collection_and_id(name: &str) -> Option<(&str, &str)> {
    let mut segments = name.rsplit('/');
    let id = segments.next()?;
    let collection = segments.next()?;
    Some((collection, id))
}

/// Turns listen-stream documents into [`StoreEvent`]s.
///
/// Writes made through this handle are already in `known`, so their echo
/// from the stream is not published a second time.
#[derive(Clone)]
struct RemoteChanges {
    feed: ChangeFeed,
    known: Arc<DashMap<String, Booking>>,
}

impl RemoteChanges {
    fn apply(&self, event: FirestoreListenEvent) {
        match event {
            FirestoreListenEvent::DocumentChange(change) => {
                if let Some(doc) = change.document {
                    self.document_written(&doc);
                }
            }
            FirestoreListenEvent::DocumentDelete(deleted) => self.document_removed(&deleted.document),
            FirestoreListenEvent::DocumentRemove(removed) => self.document_removed(&removed.document),
            _ => {}
        }
    }

    fn document_written(&self, doc: &Document) {
        let Some((collection, id)) = collection_and_id(&doc.name) else {
            return;
        };

        match collection {
            collections::BOOKINGS => match firestore::FirestoreDb::deserialize_doc_to::<Booking>(doc) {
                Ok(booking) => self.booking_written(booking),
                Err(e) => tracing::warn!(id, error = %e, "Skipping unreadable booking"),
            },
            collections::USER_PROFILES => {
                match firestore::FirestoreDb::deserialize_doc_to::<UserProfile>(doc) {
                    Ok(profile) => self.feed.publish(StoreEvent::ProfileChanged(profile)),
                    Err(e) => tracing::warn!(id, error = %e, "Skipping unreadable profile"),
                }
            }
            collections::CONFIG if id == collections::CALENDAR_DOC => {
                match firestore::FirestoreDb::deserialize_doc_to::<OverridesConfig>(doc) {
                    Ok(config) => self.feed.publish(StoreEvent::OverridesChanged(config)),
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable overrides"),
                }
            }
            _ => {}
        }
    }

    fn booking_written(&self, after: Booking) {
        match self.known.insert(after.id.clone(), after.clone()) {
            None => self.feed.publish(StoreEvent::BookingCreated(after)),
            Some(before) if before != after => {
                self.feed.publish(StoreEvent::BookingUpdated { before, after })
            }
            Some(_) => {}
        }
    }

    fn document_removed(&self, name: &str) {
        match collection_and_id(name) {
            Some((collections::BOOKINGS, id)) => {
                if let Some((_, before)) = self.known.remove(id) {
                    self.feed.publish(StoreEvent::BookingDeleted(before));
                }
            }
            Some((collections::CONFIG, collections::CALENDAR_DOC)) => {
                self.feed.publish(StoreEvent::OverridesChanged(OverridesConfig::default()));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_offline_mock_reports_database_errors() {
        let db = FirestoreDb::new_mock();

        let err = BookingStore::get_booking(&db, "missing").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));

        let err = db.get_overrides().await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }

    type Events = tokio::sync::mpsc::UnboundedReceiver<StoreEvent>;

    fn relay() -> (RemoteChanges, Events, Subscription) {
        let relay = RemoteChanges {
            feed: ChangeFeed::new(),
            known: Arc::new(DashMap::new()),
        };
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let subscription = relay.feed.subscribe(crate::db::listener(move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event);
            }
        }));
        (relay, rx, subscription)
    }

    fn booking(id: &str, date: &str) -> Booking {
        Booking {
            id: id.to_string(),
            user_id: "u1".to_string(),
            user_email: None,
            date: date.parse().unwrap(),
            slot_id: SlotId::Morning,
            created_at: chrono::Utc::now(),
        }
    }

    const DOCS: &str = "projects/p/databases/(default)/documents";

    #[test]
    fn test_document_name_split() {
        assert_eq!(
            collection_and_id(&format!("{}/bookings/abc", DOCS)),
            Some(("bookings", "abc"))
        );
        assert_eq!(collection_and_id("abc"), None);
    }

    #[tokio::test]
    async fn test_remote_booking_changes_become_events() {
        let (relay, mut rx, _subscription) = relay();

        relay.booking_written(booking("b1", "2025-03-05"));
        assert!(matches!(rx.recv().await, Some(StoreEvent::BookingCreated(b)) if b.id == "b1"));

        relay.booking_written(booking("b1", "2025-03-06"));
        match rx.recv().await {
            Some(StoreEvent::BookingUpdated { before, after }) => {
                assert_eq!(before.date.to_string(), "2025-03-05");
                assert_eq!(after.date.to_string(), "2025-03-06");
            }
            other => panic!("unexpected event: {:?}", other),
        }

        relay.document_removed(&format!("{}/bookings/b1", DOCS));
        assert!(matches!(rx.recv().await, Some(StoreEvent::BookingDeleted(b)) if b.id == "b1"));
    }

    #[tokio::test]
    async fn test_echo_of_local_write_is_not_republished() {
        let (relay, mut rx, _subscription) = relay();
        let local = booking("b2", "2025-03-05");
        relay.known.insert(local.id.clone(), local.clone());

        relay.booking_written(local);
        relay.document_removed(&format!("{}/bookings/never-seen", DOCS));
        relay.document_removed(&format!("{}/config/calendar", DOCS));

        // Only the overrides reset comes through.
        assert!(matches!(
            rx.recv().await,
            Some(StoreEvent::OverridesChanged(c)) if c == OverridesConfig::default()
        ));
        assert!(rx.try_recv().is_err());
    }
}
