// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Copies quota and name from the client registry into the user's profile.

use crate::db::{listener, ChangeSource, ProfileStore, StoreEvent, Stores, Subscription};
use crate::error::AppError;
use crate::models::{UserProfile, DEFAULT_MAX_BOOKINGS_PER_MONTH};
use crate::services::clients::ClientRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct ProfileSynchronizer {
    registry: ClientRegistry,
    profiles: Arc<dyn ProfileStore>,
    changes: Arc<dyn ChangeSource>,
}

impl ProfileSynchronizer {
    pub fn new(stores: &Stores, registry: ClientRegistry) -> Self {
        Self {
            registry,
            profiles: stores.profiles.clone(),
            changes: stores.changes.clone(),
        }
    }

    /// Reconcile the user's profile with their client record.
    ///
    /// The record is read from the store on every call. Without an email or a matching record nothing is written and
    /// the current profile (if any) is returned.
    pub async fn sync_client_to_user_profile(
        &self,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError> {
        let current = self.profiles.get_profile(user_id).await?;

        let Some(email) = email.filter(|e| !e.trim().is_empty()) else {
            return Ok(current);
        };
        let Some(client) = self.registry.find_by_email(email).await? else {
            tracing::debug!(user_id, "No client record, profile left as is");
            return Ok(current);
        };

        let synced = UserProfile {
            uid: user_id.to_string(),
            email: client.email,
            display_name: client.display_name,
            max_bookings_per_month: client.max_bookings_per_month,
        };
        if current.as_ref() == Some(&synced) {
            return Ok(current);
        }

        self.profiles.upsert_profile(&synced).await?;
        tracing::info!(
            user_id,
            quota = synced.max_bookings_per_month,
            "Profile synced from client record"
        );
        Ok(Some(synced))
    }

    /// Deliver the user's profile now and whenever it is written.
    ///
    /// A user without a stored profile first sees the default quota.
    pub async fn watch_profile<S>(
        &self,
        user_id: &str,
        email: Option<&str>,
        sink: S,
    ) -> Subscription
    where
        S: Fn(UserProfile) + Send + Sync + 'static,
    {
        let sink = Arc::new(sink);
        let subscription = {
            let user_id = user_id.to_string();
            let sink = sink.clone();
            self.changes.subscribe(listener(move |event| {
                let user_id = user_id.clone();
                let sink = sink.clone();
                async move {
                    if let StoreEvent::ProfileChanged(profile) = event {
                        if profile.uid == user_id {
                            sink(profile);
                        }
                    }
                }
            }))
        };

        let current = match self.profiles.get_profile(user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Profile load failed, using defaults");
                None
            }
        };
        sink(current.unwrap_or_else(|| UserProfile {
            uid: user_id.to_string(),
            email: email.unwrap_or_default().to_string(),
            display_name: String::new(),
            max_bookings_per_month: DEFAULT_MAX_BOOKINGS_PER_MONTH,
        }));
        subscription
    }
}
