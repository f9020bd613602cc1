// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Live read models over the booking log.
//!
//! A view loads its bookings once, then reloads whenever a change touches
//! its scope and hands the new projection to the caller's sink. Failures
//! never reach the caller: a view that cannot load starts empty, and a
//! failed reload keeps the last delivered projection.

use crate::db::{listener, BookingStore, ChangeSource, StoreEvent, Stores, Subscription};
use crate::error::AppError;
use crate::models::{Booking, DetailedOccupancy, OccupancyMap};
use crate::services::identity::AdminSession;
use crate::time_utils::DateRange;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Which bookings a view covers.
#[derive(Debug, Clone)]
enum Scope {
    Range(DateRange),
    User(String),
}

impl Scope {
    async fn load(&self, store: &dyn BookingStore) -> Result<Vec<Booking>, AppError> {
        match self {
            Scope::Range(range) => store.list_bookings_in_range(*range).await,
            Scope::User(user_id) => store.list_bookings_for_user(user_id).await,
        }
    }

    fn touched_by(&self, event: &StoreEvent) -> bool {
        match self {
            Scope::Range(range) => event.touches_dates(|d| range.contains(d)),
            Scope::User(user_id) => event.touches_user(user_id),
        }
    }
}

type Project<P> = Box<dyn Fn(&[Booking]) -> P + Send + Sync>;
type Sink<P> = Box<dyn Fn(P) + Send + Sync>;

struct LiveView<P> {
    scope: Scope,
    store: Arc<dyn BookingStore>,
    project: Project<P>,
    sink: Sink<P>,
    issued: AtomicU64,
    delivered: Mutex<u64>,
}

impl<P> LiveView<P> {
    /// Reload and deliver, unless a newer reload already delivered.
    async fn refresh(&self, initial: bool) {
        let ticket = self.issued.fetch_add(1, Ordering::SeqCst) + 1;

        let bookings = match self.scope.load(self.store.as_ref()).await {
            Ok(bookings) => bookings,
            Err(e) if initial => {
                tracing::warn!(error = %e, scope = ?self.scope, "Read model load failed, starting empty");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, scope = ?self.scope, "Read model refresh failed, keeping last snapshot");
                return;
            }
        };

        let mut delivered = self.delivered.lock().await;
        if ticket > *delivered {
            *delivered = ticket;
            (self.sink)((self.project)(&bookings));
        }
    }
}

/// Occupancy and own-bookings projections.
#[derive(Clone)]
pub struct OccupancyReadModel {
    bookings: Arc<dyn BookingStore>,
    changes: Arc<dyn ChangeSource>,
}

impl OccupancyReadModel {
    pub fn new(stores: &Stores) -> Self {
        Self {
            bookings: stores.bookings.clone(),
            changes: stores.changes.clone(),
        }
    }

    async fn load_range(&self, range: DateRange) -> Vec<Booking> {
        match self.bookings.list_bookings_in_range(range).await {
            Ok(bookings) => bookings,
            Err(e) => {
                tracing::warn!(error = %e, start = %range.start, end = %range.end, "Occupancy query failed, returning empty map");
                Vec::new()
            }
        }
    }

    /// Which slots are taken, without identities. Safe for any caller.
    pub async fn anonymous(&self, range: DateRange) -> OccupancyMap {
        OccupancyMap::from_bookings(&self.load_range(range).await)
    }

    /// Who holds each slot.
    pub async fn detailed(&self, _admin: &AdminSession, range: DateRange) -> DetailedOccupancy {
        DetailedOccupancy::from_bookings(&self.load_range(range).await)
    }

    pub async fn watch_anonymous<S>(&self, range: DateRange, sink: S) -> Subscription
    where
        S: Fn(OccupancyMap) + Send + Sync + 'static,
    {
        self.watch::<OccupancyMap>(
            Scope::Range(range),
            Box::new(|b: &[Booking]| OccupancyMap::from_bookings(b)),
            Box::new(sink),
        )
        .await
    }

    pub async fn watch_detailed<S>(
        &self,
        _admin: &AdminSession,
        range: DateRange,
        sink: S,
    ) -> Subscription
    where
        S: Fn(DetailedOccupancy) + Send + Sync + 'static,
    {
        self.watch::<DetailedOccupancy>(
            Scope::Range(range),
            Box::new(|b: &[Booking]| DetailedOccupancy::from_bookings(b)),
            Box::new(sink),
        )
        .await
    }

    /// Live list of one user's bookings.
    pub async fn watch_user_bookings<S>(&self, user_id: &str, sink: S) -> Subscription
    where
        S: Fn(Vec<Booking>) + Send + Sync + 'static,
    {
        self.watch::<Vec<Booking>>(
            Scope::User(user_id.to_string()),
            Box::new(|b: &[Booking]| b.to_vec()),
            Box::new(sink),
        )
        .await
    }

    async fn watch<P: 'static>(&self, scope: Scope, project: Project<P>, sink: Sink<P>) -> Subscription {
        let view = Arc::new(LiveView {
            scope,
            store: self.bookings.clone(),
            project,
            sink,
            issued: AtomicU64::new(0),
            delivered: Mutex::new(0),
        });

        // Subscribe before the first load so no change falls in between.
        let subscription = {
            let view = view.clone();
            self.changes.subscribe(listener(move |event| {
                let view = view.clone();
                async move {
                    if view.scope.touched_by(&event) {
                        view.refresh(false).await;
                    }
                }
            }))
        };

        view.refresh(true).await;
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryDb, Principal};
    use crate::models::{NewBooking, SlotId};
    use crate::services::identity::{IdentityResolver, Session};
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    fn d(s: &str) -> chrono::NaiveDate {
        s.parse().unwrap()
    }

    fn march() -> DateRange {
        DateRange::month_of(d("2025-03-01"))
    }

    async fn book(db: &MemoryDb, uid: &str, date: &str, slot: SlotId) -> Booking {
        db.create_booking(
            NewBooking {
                user_id: uid.to_string(),
                user_email: Some(format!("{}@example.com", uid)),
                date: d(date),
                slot_id: slot,
                created_at: chrono::Utc::now(),
            },
            &Principal::User(uid.to_string()),
        )
        .await
        .unwrap()
    }

    fn admin() -> AdminSession {
        match IdentityResolver::new("admin@example.com").resolve("root", Some("admin@example.com")) {
            Session::Admin(a) => a,
            Session::Client(_) => unreachable!(),
        }
    }

    async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for projection")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn test_snapshot_marks_occupied_slots() {
        let db = MemoryDb::new();
        let model = OccupancyReadModel::new(&Stores::from_backend(Arc::new(db.clone())));
        book(&db, "u1", "2025-03-05", SlotId::Morning).await;
        book(&db, "u2", "2025-04-05", SlotId::Morning).await;

        let map = model.anonymous(march()).await;
        assert!(map.is_occupied(d("2025-03-05"), SlotId::Morning));
        assert!(!map.is_occupied(d("2025-03-05"), SlotId::Afternoon));
        assert_eq!(map.0.len(), 1);

        let detailed = model.detailed(&admin(), march()).await;
        assert_eq!(detailed.0[&d("2025-03-05")].morning[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_live_view_follows_creates_and_deletes() {
        let db = MemoryDb::new();
        let model = OccupancyReadModel::new(&Stores::from_backend(Arc::new(db.clone())));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let subscription = model
            .watch_anonymous(march(), move |map| {
                let _ = tx.send(map);
            })
            .await;

        assert!(next(&mut rx).await.is_empty());

        let booking = book(&db, "u1", "2025-03-05", SlotId::Afternoon).await;
        let map = next(&mut rx).await;
        assert!(map.is_occupied(d("2025-03-05"), SlotId::Afternoon));

        db.delete_booking(&booking.id, &Principal::User("u1".to_string()))
            .await
            .unwrap();
        assert!(next(&mut rx).await.is_empty());

        drop(subscription);
    }

    #[tokio::test]
    async fn test_live_view_ignores_changes_outside_range() {
        let db = MemoryDb::new();
        let model = OccupancyReadModel::new(&Stores::from_backend(Arc::new(db.clone())));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = model
            .watch_anonymous(march(), move |map| {
                let _ = tx.send(map);
            })
            .await;
        next(&mut rx).await;

        book(&db, "u1", "2025-05-01", SlotId::Morning).await;
        book(&db, "u1", "2025-03-31", SlotId::Morning).await;

        let map = next(&mut rx).await;
        assert!(map.is_occupied(d("2025-03-31"), SlotId::Morning));
        assert_eq!(map.0.len(), 1);
    }

    #[tokio::test]
    async fn test_user_view_only_tracks_that_user() {
        let db = MemoryDb::new();
        let model = OccupancyReadModel::new(&Stores::from_backend(Arc::new(db.clone())));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _subscription = model
            .watch_user_bookings("u1", move |list| {
                let _ = tx.send(list);
            })
            .await;
        assert!(next(&mut rx).await.is_empty());

        book(&db, "u2", "2025-03-05", SlotId::Morning).await;
        book(&db, "u1", "2025-03-06", SlotId::Morning).await;

        let list = next(&mut rx).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].user_id, "u1");
    }

    #[tokio::test]
    async fn test_failed_load_degrades_to_empty() {
        let db = crate::db::FirestoreDb::new_mock();
        let model = OccupancyReadModel::new(&Stores::from_backend(Arc::new(db)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        assert!(model.anonymous(march()).await.is_empty());

        let _subscription = model
            .watch_anonymous(march(), move |map| {
                let _ = tx.send(map);
            })
            .await;
        assert!(next(&mut rx).await.is_empty());
    }
}
