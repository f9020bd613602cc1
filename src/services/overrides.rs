// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Availability overrides: disabled dates and disabled (date, slot) pairs.

use crate::db::{listener, ChangeSource, OverridesStore, StoreEvent, Stores, Subscription};
use crate::error::AppError;
use crate::models::{OverridesConfig, SlotId};
use crate::services::identity::AdminSession;
use chrono::NaiveDate;
use std::sync::Arc;

#[derive(Clone)]
pub struct OverridesService {
    store: Arc<dyn OverridesStore>,
    changes: Arc<dyn ChangeSource>,
}

impl OverridesService {
    pub fn new(stores: &Stores) -> Self {
        Self {
            store: stores.overrides.clone(),
            changes: stores.changes.clone(),
        }
    }

    pub async fn get(&self) -> Result<OverridesConfig, AppError> {
        self.store.get_overrides().await
    }

    /// Replace the whole document.
    pub async fn replace(
        &self,
        admin: &AdminSession,
        config: OverridesConfig,
    ) -> Result<OverridesConfig, AppError> {
        self.store.set_overrides(&config).await?;
        tracing::info!(
            admin = admin.email(),
            disabled_dates = config.disabled_dates.len(),
            disabled_slots = config.disabled_slots.len(),
            "Overrides replaced"
        );
        Ok(config)
    }

    pub async fn set_date_disabled(
        &self,
        admin: &AdminSession,
        date: NaiveDate,
        disabled: bool,
    ) -> Result<OverridesConfig, AppError> {
        let mut config = self.store.get_overrides().await?;
        if config.set_date_disabled(date, disabled) {
            self.store.set_overrides(&config).await?;
            tracing::info!(admin = admin.email(), %date, disabled, "Date override changed");
        }
        Ok(config)
    }

    pub async fn set_slot_disabled(
        &self,
        admin: &AdminSession,
        date: NaiveDate,
        slot_id: SlotId,
        disabled: bool,
    ) -> Result<OverridesConfig, AppError> {
        let mut config = self.store.get_overrides().await?;
        if config.set_slot_disabled(date, slot_id, disabled) {
            self.store.set_overrides(&config).await?;
            tracing::info!(
                admin = admin.email(),
                %date,
                slot = %slot_id,
                disabled,
                "Slot override changed"
            );
        }
        Ok(config)
    }

    /// Deliver the document now and after every write.
    pub async fn watch<S>(&self, sink: S) -> Subscription
    where
        S: Fn(OverridesConfig) + Send + Sync + 'static,
    {
        let sink = Arc::new(sink);
        let subscription = {
            let sink = sink.clone();
            self.changes.subscribe(listener(move |event| {
                let sink = sink.clone();
                async move {
                    if let StoreEvent::OverridesChanged(config) = event {
                        sink(config);
                    }
                }
            }))
        };

        match self.store.get_overrides().await {
            Ok(config) => sink(config),
            Err(e) => {
                tracing::warn!(error = %e, "Overrides load failed, starting with none");
                sink(OverridesConfig::default());
            }
        }
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::services::identity::{IdentityResolver, Session};
    use tokio::sync::mpsc;

    fn admin() -> AdminSession {
        match IdentityResolver::new("admin@example.com").resolve("root", Some("admin@example.com")) {
            Session::Admin(a) => a,
            Session::Client(_) => unreachable!(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_toggles_round_trip() {
        let service = OverridesService::new(&Stores::from_backend(Arc::new(MemoryDb::new())));
        let admin = admin();

        service.set_date_disabled(&admin, d("2025-12-25"), true).await.unwrap();
        service
            .set_slot_disabled(&admin, d("2025-12-24"), SlotId::Afternoon, true)
            .await
            .unwrap();

        let config = service.get().await.unwrap();
        assert!(config.is_date_disabled(d("2025-12-25")));
        assert!(config.is_slot_disabled(d("2025-12-24"), SlotId::Afternoon));
        assert!(!config.is_slot_disabled(d("2025-12-24"), SlotId::Morning));

        let config = service.set_date_disabled(&admin, d("2025-12-25"), false).await.unwrap();
        assert!(!config.is_date_disabled(d("2025-12-25")));
        assert_eq!(service.get().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_unchanged_toggle_does_not_write() {
        let db = MemoryDb::new();
        let service = OverridesService::new(&Stores::from_backend(Arc::new(db)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = service
            .watch(move |config| {
                let _ = tx.send(config);
            })
            .await;
        assert_eq!(rx.recv().await.unwrap(), OverridesConfig::default());

        service.set_date_disabled(&admin(), d("2025-01-01"), false).await.unwrap();
        service.set_date_disabled(&admin(), d("2025-01-06"), true).await.unwrap();

        // Only the second call changed anything.
        let config = rx.recv().await.unwrap();
        assert!(config.is_date_disabled(d("2025-01-06")));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replace_overwrites_everything() {
        let service = OverridesService::new(&Stores::from_backend(Arc::new(MemoryDb::new())));
        let admin = admin();
        service.set_date_disabled(&admin, d("2025-08-15"), true).await.unwrap();

        let mut config = OverridesConfig::default();
        config.set_slot_disabled(d("2025-08-16"), SlotId::Morning, true);
        service.replace(&admin, config.clone()).await.unwrap();

        let stored = service.get().await.unwrap();
        assert_eq!(stored, config);
        assert!(!stored.is_date_disabled(d("2025-08-15")));
    }
}
