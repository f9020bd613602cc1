// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client registry: administrator-owned CRUD over client records.

use crate::db::{ClientStore, Stores};
use crate::error::AppError;
use crate::models::client::{clamp_quota, client_id_for_email, normalize_email};
use crate::models::ClientRecord;
use crate::services::identity::AdminSession;
use std::sync::Arc;
use validator::ValidateEmail;

/// Client records keyed by the id derived from their email.
///
/// Every read goes to the store, so a quota edited by another instance is
/// never hidden behind a copy held in this process.
#[derive(Clone)]
pub struct ClientRegistry {
    store: Arc<dyn ClientStore>,
}

impl ClientRegistry {
    pub fn new(stores: &Stores) -> Self {
        Self {
            store: stores.clients.clone(),
        }
    }

    /// Create or replace the record for `email`. Re-adding an email updates it.
    pub async fn add_or_update_client(
        &self,
        admin: &AdminSession,
        email: &str,
        display_name: &str,
        max_bookings_per_month: i64,
    ) -> Result<ClientRecord, AppError> {
        let email = normalize_email(email);
        if email.is_empty() || !email.validate_email() {
            return Err(AppError::InvalidArgument(
                "A valid email address is required.".to_string(),
            ));
        }

        let record = ClientRecord {
            id: client_id_for_email(&email),
            email,
            display_name: display_name.trim().to_string(),
            max_bookings_per_month: clamp_quota(max_bookings_per_month),
        };
        self.write(&record).await?;

        tracing::info!(
            admin = admin.email(),
            client_id = %record.id,
            quota = record.max_bookings_per_month,
            "Client saved"
        );
        Ok(record)
    }

    /// Partial update. The id (and therefore the email) never changes.
    pub async fn update_client(
        &self,
        admin: &AdminSession,
        id: &str,
        display_name: Option<&str>,
        max_bookings_per_month: Option<i64>,
    ) -> Result<ClientRecord, AppError> {
        let mut record = self
            .get_client(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Client {} not found", id)))?;

        if let Some(name) = display_name {
            record.display_name = name.trim().to_string();
        }
        if let Some(quota) = max_bookings_per_month {
            record.max_bookings_per_month = clamp_quota(quota);
        }
        self.write(&record).await?;

        tracing::info!(
            admin = admin.email(),
            client_id = id,
            quota = record.max_bookings_per_month,
            "Client updated"
        );
        Ok(record)
    }

    /// Remove a record. Profiles and bookings of that client are left alone.
    pub async fn delete_client(&self, admin: &AdminSession, id: &str) -> Result<(), AppError> {
        if !self.store.delete_client(id).await? {
            return Err(AppError::NotFound(format!("Client {} not found", id)));
        }

        tracing::info!(admin = admin.email(), client_id = id, "Client deleted");
        Ok(())
    }

    pub async fn list_clients(&self, _admin: &AdminSession) -> Result<Vec<ClientRecord>, AppError> {
        self.store.list_clients().await
    }

    pub async fn get_client(&self, id: &str) -> Result<Option<ClientRecord>, AppError> {
        self.store.get_client(id).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<ClientRecord>, AppError> {
        self.get_client(&client_id_for_email(email)).await
    }

    async fn write(&self, record: &ClientRecord) -> Result<(), AppError> {
        self.store.upsert_client(record).await
    }
}
