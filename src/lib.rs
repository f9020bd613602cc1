// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Slot-Booking: monthly-quota appointment booking for a single practice
//!
//! This crate provides the backend API: clients book one of two daily slots
//! within their monthly quota, the administrator manages clients, calendar
//! overrides and every booking, and all callers see live slot occupancy.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Stores;
use services::{
    AccountProvisioner, AdmissionEngine, ClientRegistry, IdentityResolver,
    IdentityToolkitProvisioner, OccupancyReadModel, OverridesService, ProfileSynchronizer,
    ProvisioningService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: IdentityResolver,
    pub admission: AdmissionEngine,
    pub occupancy: OccupancyReadModel,
    pub clients: ClientRegistry,
    pub profiles: ProfileSynchronizer,
    pub overrides: OverridesService,
    pub provisioning: ProvisioningService,
}

impl AppState {
    /// Wire every service to the given stores.
    ///
    /// Account provisioning uses Identity Toolkit when an API key is set.
    pub fn new(config: Config, stores: Stores) -> Self {
        let provisioner = config.identity_api_key.clone().map(|key| {
            Arc::new(IdentityToolkitProvisioner::new(&config.identity_api_url, key))
                as Arc<dyn AccountProvisioner>
        });
        Self::with_provisioner(config, stores, provisioner)
    }

    pub fn with_provisioner(
        config: Config,
        stores: Stores,
        provisioner: Option<Arc<dyn AccountProvisioner>>,
    ) -> Self {
        let clients = ClientRegistry::new(&stores);

        Self {
            identity: IdentityResolver::new(&config.admin_email),
            admission: AdmissionEngine::new(&stores),
            occupancy: OccupancyReadModel::new(&stores),
            profiles: ProfileSynchronizer::new(&stores, clients.clone()),
            overrides: OverridesService::new(&stores),
            provisioning: ProvisioningService::new(&stores, provisioner),
            clients,
            config,
        }
    }
}
