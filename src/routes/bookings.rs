// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Booking, availability and profile routes for signed-in users.

use crate::db::Subscription;
use crate::error::{AppError, Result};
use crate::models::{Booking, OverridesConfig, SlotId};
use crate::services::identity::{Identity, Session};
use crate::services::MonthlyUsage;
use crate::time_utils::{parse_month, DateRange};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::watch;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Booking routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/me/usage", get(get_usage))
        .route("/api/me/stream", get(stream_me))
        .route("/api/bookings", get(list_my_bookings).post(create_booking))
        .route("/api/bookings/stream", get(stream_my_bookings))
        .route("/api/bookings/{id}", delete(cancel_booking))
        .route("/api/calendar/overrides", get(get_overrides))
        .route("/api/calendar/overrides/stream", get(stream_overrides))
        .route("/api/availability", get(get_availability))
        .route("/api/availability/stream", get(stream_availability))
}

// ─── Current User ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    #[serde(flatten)]
    pub identity: Identity,
    pub display_name: String,
    pub max_bookings_per_month: u32,
}

/// Identity and quota. Clients get their profile synced first so admin-side
/// quota edits apply without signing out.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MeResponse>> {
    let profile = match &session {
        Session::Client(client) => state
            .profiles
            .sync_client_to_user_profile(client.user_id(), client.email())
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(user_id = client.user_id(), error = %e, "Profile sync failed");
                None
            }),
        Session::Admin(_) => None,
    };

    let max_bookings_per_month = match &profile {
        Some(p) => p.max_bookings_per_month,
        None => state.admission.effective_quota(session.user_id()).await?,
    };

    Ok(Json(MeResponse {
        identity: session.identity(),
        display_name: profile.map(|p| p.display_name).unwrap_or_default(),
        max_bookings_per_month,
    }))
}

#[derive(Deserialize)]
struct UsageQuery {
    /// `yyyy-MM`; defaults to the current month
    month: Option<String>,
}

async fn get_usage(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<UsageQuery>,
) -> Result<Json<MonthlyUsage>> {
    let month = match query.month.as_deref() {
        Some(raw) => parse_month(raw)
            .ok_or_else(|| AppError::InvalidArgument(format!("Invalid month: {}", raw)))?,
        None => chrono::Utc::now().date_naive(),
    };

    Ok(Json(state.admission.usage(session.user_id(), month).await?))
}

// ─── Bookings ────────────────────────────────────────────────

async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<Booking>>> {
    Ok(Json(
        state.admission.list_user_bookings(session.user_id()).await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    date: NaiveDate,
    slot_id: SlotId,
}

/// Book a slot for the caller.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let booking = match &session {
        Session::Client(client) => {
            state
                .admission
                .try_book(client, body.date, body.slot_id)
                .await?
        }
        Session::Admin(admin) => {
            state
                .admission
                .admin_create_booking(
                    admin,
                    admin.user_id(),
                    Some(admin.email().to_string()),
                    body.date,
                    body.slot_id,
                )
                .await?
        }
    };

    Ok((StatusCode::CREATED, Json(booking)))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    match &session {
        Session::Client(client) => state.admission.cancel(client, &id).await?,
        Session::Admin(admin) => state.admission.admin_delete_booking(admin, &id).await?,
    };
    Ok(StatusCode::NO_CONTENT)
}

// ─── Calendar ────────────────────────────────────────────────

async fn get_overrides(State(state): State<Arc<AppState>>) -> Result<Json<OverridesConfig>> {
    Ok(Json(state.overrides.get().await?))
}

#[derive(Deserialize)]
struct RangeQuery {
    from: NaiveDate,
    to: NaiveDate,
}

impl RangeQuery {
    fn range(&self) -> Result<DateRange> {
        DateRange::new(self.from, self.to).map_err(AppError::InvalidArgument)
    }
}

/// Occupancy snapshot. Clients get slot flags only, the admin gets holders.
async fn get_availability(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<RangeQuery>,
) -> Result<Response> {
    let range = query.range()?;

    Ok(match &session {
        Session::Client(_) => Json(state.occupancy.anonymous(range).await).into_response(),
        Session::Admin(admin) => Json(state.occupancy.detailed(admin, range).await).into_response(),
    })
}

// ─── Live Views (SSE) ────────────────────────────────────────

/// Latest-value handoff from a subscription to one SSE response.
///
/// Only the newest projection is kept. A client that stops reading holds at
/// most one pending event, and skips straight to the current state.
#[derive(Clone)]
struct EventSink {
    name: &'static str,
    latest: watch::Sender<Option<Event>>,
}

impl EventSink {
    fn new(name: &'static str) -> (Self, watch::Receiver<Option<Event>>) {
        let (latest, rx) = watch::channel(None);
        (Self { name, latest }, rx)
    }

    fn send<T: Serialize>(&self, value: &T) {
        match Event::default().event(self.name).json_data(value) {
            Ok(event) => {
                self.latest.send_replace(Some(event));
            }
            Err(e) => tracing::warn!(event = self.name, error = %e, "Failed to encode live update"),
        }
    }
}

/// Turn a subscription's deliveries into an SSE stream.
///
/// The stream owns the subscription, so it ends when the client disconnects.
fn into_stream(
    rx: watch::Receiver<Option<Event>>,
    subscription: Subscription,
) -> impl Stream<Item = std::result::Result<Event, Infallible>> {
    stream::unfold((rx, subscription), |(mut rx, subscription)| async move {
        loop {
            rx.changed().await.ok()?;
            let event = rx.borrow_and_update().clone();
            if let Some(event) = event {
                return Some((Ok(event), (rx, subscription)));
            }
        }
    })
}

fn live(
    rx: watch::Receiver<Option<Event>>,
    subscription: Subscription,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    Sse::new(into_stream(rx, subscription)).keep_alive(KeepAlive::default())
}

async fn stream_availability(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(query): Query<RangeQuery>,
) -> Result<Response> {
    let range = query.range()?;
    let (sink, rx) = EventSink::new("occupancy");

    let subscription = match &session {
        Session::Client(_) => {
            state
                .occupancy
                .watch_anonymous(range, move |map| sink.send(&map))
                .await
        }
        Session::Admin(admin) => {
            state
                .occupancy
                .watch_detailed(admin, range, move |map| sink.send(&map))
                .await
        }
    };

    Ok(live(rx, subscription).into_response())
}

async fn stream_my_bookings(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Response {
    let (sink, rx) = EventSink::new("bookings");
    let subscription = state
        .occupancy
        .watch_user_bookings(session.user_id(), move |bookings| sink.send(&bookings))
        .await;

    live(rx, subscription).into_response()
}

/// Profile updates, so a quota edited by the admin shows up without reload.
async fn stream_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Response {
    let (sink, rx) = EventSink::new("profile");
    let subscription = state
        .profiles
        .watch_profile(session.user_id(), session.email(), move |profile| {
            sink.send(&profile)
        })
        .await;

    live(rx, subscription).into_response()
}

async fn stream_overrides(State(state): State<Arc<AppState>>) -> Response {
    let (sink, rx) = EventSink::new("overrides");
    let subscription = state.overrides.watch(move |config| sink.send(&config)).await;

    live(rx, subscription).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ChangeFeed, ChangeSource};
    use futures_util::StreamExt;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stalled_stream_keeps_only_latest_event() {
        let (sink, rx) = EventSink::new("occupancy");
        let subscription = ChangeFeed::new().subscribe(crate::db::listener(|_| async {}));
        let mut events = Box::pin(into_stream(rx, subscription));

        for n in 0..100 {
            sink.send(&n);
        }

        let first = events.next().await.unwrap().unwrap();
        assert!(format!("{:?}", first).contains("99"));

        let pending = tokio::time::timeout(Duration::from_millis(50), events.next()).await;
        assert!(pending.is_err(), "older events were queued");

        sink.send(&100);
        assert!(events.next().await.is_some());
    }

    #[tokio::test]
    async fn test_stream_ends_when_sink_is_gone() {
        let (sink, rx) = EventSink::new("bookings");
        let subscription = ChangeFeed::new().subscribe(crate::db::listener(|_| async {}));
        let mut events = Box::pin(into_stream(rx, subscription));

        sink.send(&"last");
        drop(sink);

        assert!(events.next().await.is_some());
        assert!(events.next().await.is_none());
    }
}
