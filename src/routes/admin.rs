// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Administrator routes.
//!
//! Every handler takes an [`AdminSession`], which only `require_admin`
//! inserts, so none of these can run for a client.

use crate::error::Result;
use crate::models::{Booking, ClientRecord, OverridesConfig, SlotId, DEFAULT_MAX_BOOKINGS_PER_MONTH};
use crate::services::identity::AdminSession;
use crate::services::{ProvisionRequest, ProvisionedAccount};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;

/// Admin routes. Auth and admin middleware are applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/clients", get(list_clients).post(save_client))
        .route(
            "/api/admin/clients/{id}",
            put(update_client).delete(delete_client),
        )
        .route("/api/admin/overrides", put(replace_overrides))
        .route("/api/admin/overrides/dates/{date}", put(toggle_date))
        .route("/api/admin/overrides/slots/{date}/{slot_id}", put(toggle_slot))
        .route("/api/admin/bookings", get(list_bookings).post(create_booking))
        .route(
            "/api/admin/bookings/{id}",
            put(update_booking).delete(delete_booking),
        )
        .route("/api/admin/accounts", post(provision_account))
}

// ─── Clients ─────────────────────────────────────────────────

async fn list_clients(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
) -> Result<Json<Vec<ClientRecord>>> {
    Ok(Json(state.clients.list_clients(&admin).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveClientRequest {
    email: String,
    #[serde(default)]
    display_name: String,
    max_bookings_per_month: Option<i64>,
}

/// Create or update the client with this email.
async fn save_client(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Json(body): Json<SaveClientRequest>,
) -> Result<Json<ClientRecord>> {
    let quota = body
        .max_bookings_per_month
        .unwrap_or(DEFAULT_MAX_BOOKINGS_PER_MONTH as i64);

    Ok(Json(
        state
            .clients
            .add_or_update_client(&admin, &body.email, &body.display_name, quota)
            .await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateClientRequest {
    display_name: Option<String>,
    max_bookings_per_month: Option<i64>,
}

async fn update_client(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
    Json(body): Json<UpdateClientRequest>,
) -> Result<Json<ClientRecord>> {
    Ok(Json(
        state
            .clients
            .update_client(
                &admin,
                &id,
                body.display_name.as_deref(),
                body.max_bookings_per_month,
            )
            .await?,
    ))
}

async fn delete_client(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.clients.delete_client(&admin, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Overrides ───────────────────────────────────────────────

async fn replace_overrides(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Json(config): Json<OverridesConfig>,
) -> Result<Json<OverridesConfig>> {
    Ok(Json(state.overrides.replace(&admin, config).await?))
}

#[derive(Deserialize)]
struct ToggleRequest {
    disabled: bool,
}

async fn toggle_date(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path(date): Path<NaiveDate>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<OverridesConfig>> {
    Ok(Json(
        state
            .overrides
            .set_date_disabled(&admin, date, body.disabled)
            .await?,
    ))
}

async fn toggle_slot(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path((date, slot_id)): Path<(NaiveDate, SlotId)>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<OverridesConfig>> {
    Ok(Json(
        state
            .overrides
            .set_slot_disabled(&admin, date, slot_id, body.disabled)
            .await?,
    ))
}

// ─── Bookings ────────────────────────────────────────────────

async fn list_bookings(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
) -> Result<Json<Vec<Booking>>> {
    Ok(Json(state.admission.list_all_bookings(&admin).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminCreateBookingRequest {
    user_id: String,
    user_email: Option<String>,
    date: NaiveDate,
    slot_id: SlotId,
}

/// Book on behalf of any user, ignoring overrides and quota.
async fn create_booking(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Json(body): Json<AdminCreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>)> {
    let booking = state
        .admission
        .admin_create_booking(&admin, &body.user_id, body.user_email, body.date, body.slot_id)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveBookingRequest {
    date: NaiveDate,
    slot_id: SlotId,
}

async fn update_booking(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
    Json(body): Json<MoveBookingRequest>,
) -> Result<Json<Booking>> {
    Ok(Json(
        state
            .admission
            .admin_update_booking(&admin, &id, body.date, body.slot_id)
            .await?,
    ))
}

async fn delete_booking(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.admission.admin_delete_booking(&admin, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Accounts ────────────────────────────────────────────────

/// Create login credentials for a client.
async fn provision_account(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AdminSession>,
    Json(body): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<ProvisionedAccount>)> {
    let account = state.provisioning.create_client_user(&admin, body).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
