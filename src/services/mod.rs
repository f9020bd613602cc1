// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod admission;
pub mod clients;
pub mod identity;
pub mod occupancy;
pub mod overrides;
pub mod profile_sync;
pub mod provisioning;

pub use admission::{AdmissionEngine, MonthlyUsage};
pub use clients::ClientRegistry;
pub use identity::{AdminSession, ClientSession, Identity, IdentityResolver, Session};
pub use occupancy::OccupancyReadModel;
pub use overrides::OverridesService;
pub use profile_sync::ProfileSynchronizer;
pub use provisioning::{
    AccountProvisioner, IdentityToolkitProvisioner, ProvisionRequest, ProvisionedAccount,
    ProvisioningService,
};
