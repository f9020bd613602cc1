// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account provisioning through the identity provider.
//!
//! Creates login credentials for a client and seeds their profile. The
//! client registry does not depend on this: a record can exist without an
//! account and the other way around.

use crate::db::{ProfileStore, Stores};
use crate::error::AppError;
use crate::models::client::{clamp_quota, normalize_email};
use crate::models::{UserProfile, DEFAULT_MAX_BOOKINGS_PER_MONTH};
use crate::services::identity::AdminSession;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const MIN_PASSWORD_LEN: u64 = 6;

/// Creates accounts with the identity provider. Returns the new user id.
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<String, AppError>;
}

/// Identity Toolkit REST client (`accounts:signUp`).
#[derive(Clone)]
pub struct IdentityToolkitProvisioner {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    local_id: String,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

impl IdentityToolkitProvisioner {
    pub fn new(base_url: &str, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

/// Map an Identity Toolkit error message to an application error.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be ...`.
fn map_provider_error(message: &str) -> AppError {
    let code = message.split(':').next().unwrap_or_default().trim();
    match code {
        "EMAIL_EXISTS" => {
            AppError::AlreadyExists("This email is already registered.".to_string())
        }
        "INVALID_EMAIL" => AppError::InvalidArgument("The email address is invalid.".to_string()),
        "WEAK_PASSWORD" => AppError::InvalidArgument(format!(
            "The password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )),
        _ => AppError::IdentityProvider(message.to_string()),
    }
}

#[async_trait]
impl AccountProvisioner for IdentityToolkitProvisioner {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<String, AppError> {
        let url = format!("{}/accounts:signUp", self.base_url);

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&SignUpRequest {
                email,
                password,
                display_name,
                return_secure_token: false,
            })
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            return Err(match serde_json::from_str::<ProviderErrorBody>(&body) {
                Ok(parsed) => map_provider_error(&parsed.error.message),
                Err(_) => AppError::IdentityProvider(format!("HTTP {}: {}", status, body)),
            });
        }

        let created: SignUpResponse = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("JSON parse error: {}", e)))?;
        Ok(created.local_id)
    }
}

/// Quota for a new account. Missing or non-positive values get the default.
fn requested_quota(requested: Option<i64>) -> u32 {
    requested
        .filter(|&q| q >= 1)
        .map(clamp_quota)
        .unwrap_or(DEFAULT_MAX_BOOKINGS_PER_MONTH)
}

/// Provisioning request as accepted from the admin console.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(min = 6, message = "The password must be at least 6 characters."))]
    pub password: String,
    pub display_name: Option<String>,
    pub max_bookings_per_month: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionedAccount {
    pub uid: String,
    pub email: String,
    pub message: String,
}

#[derive(Clone)]
pub struct ProvisioningService {
    provisioner: Option<Arc<dyn AccountProvisioner>>,
    profiles: Arc<dyn ProfileStore>,
}

impl ProvisioningService {
    pub fn new(stores: &Stores, provisioner: Option<Arc<dyn AccountProvisioner>>) -> Self {
        Self {
            provisioner,
            profiles: stores.profiles.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provisioner.is_some()
    }

    /// Create the account, then write its profile with the requested quota.
    pub async fn create_client_user(
        &self,
        admin: &AdminSession,
        request: ProvisionRequest,
    ) -> Result<ProvisionedAccount, AppError> {
        let provisioner = self.provisioner.as_ref().ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("Account provisioning is not configured"))
        })?;

        let request = ProvisionRequest {
            email: normalize_email(&request.email),
            password: request.password.trim().to_string(),
            display_name: request
                .display_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            ..request
        };
        if request.email.is_empty() {
            return Err(AppError::InvalidArgument("Email is required.".to_string()));
        }
        request.validate().map_err(|e| {
            let message = e
                .field_errors()
                .values()
                .flat_map(|errors| errors.iter())
                .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "Invalid request.".to_string());
            AppError::InvalidArgument(message)
        })?;

        let uid = provisioner
            .create_account(
                &request.email,
                &request.password,
                request.display_name.as_deref(),
            )
            .await?;

        let profile = UserProfile {
            uid: uid.clone(),
            email: request.email.clone(),
            display_name: request.display_name.clone().unwrap_or_default(),
            max_bookings_per_month: requested_quota(request.max_bookings_per_month),
        };
        self.profiles.upsert_profile(&profile).await?;

        tracing::info!(admin = admin.email(), uid = %uid, "Client account provisioned");
        Ok(ProvisionedAccount {
            uid,
            email: request.email.clone(),
            message: format!("Account created for {}", request.email),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDb;
    use crate::services::identity::{IdentityResolver, Session};

    struct FakeProvisioner;

    #[async_trait]
    impl AccountProvisioner for FakeProvisioner {
        async fn create_account(
            &self,
            email: &str,
            _password: &str,
            _display_name: Option<&str>,
        ) -> Result<String, AppError> {
            if email == "taken@example.com" {
                return Err(map_provider_error("EMAIL_EXISTS"));
            }
            Ok(format!("uid-{}", email.split('@').next().unwrap_or_default()))
        }
    }

    fn admin() -> AdminSession {
        match IdentityResolver::new("admin@example.com").resolve("root", Some("admin@example.com")) {
            Session::Admin(a) => a,
            Session::Client(_) => unreachable!(),
        }
    }

    fn request(email: &str, password: &str, quota: Option<i64>) -> ProvisionRequest {
        ProvisionRequest {
            email: email.to_string(),
            password: password.to_string(),
            display_name: Some(" New Client ".to_string()),
            max_bookings_per_month: quota,
        }
    }

    fn service(db: &MemoryDb) -> ProvisioningService {
        ProvisioningService::new(
            &Stores::from_backend(Arc::new(db.clone())),
            Some(Arc::new(FakeProvisioner)),
        )
    }

    #[test]
    fn test_provider_error_mapping() {
        assert!(matches!(
            map_provider_error("EMAIL_EXISTS"),
            AppError::AlreadyExists(_)
        ));
        assert!(matches!(
            map_provider_error("WEAK_PASSWORD : Password should be at least 6 characters"),
            AppError::InvalidArgument(_)
        ));
        assert!(matches!(
            map_provider_error("INVALID_EMAIL"),
            AppError::InvalidArgument(_)
        ));
        match map_provider_error("OPERATION_NOT_ALLOWED") {
            AppError::IdentityProvider(msg) => assert_eq!(msg, "OPERATION_NOT_ALLOWED"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_provision_writes_profile_with_clamped_quota() {
        let db = MemoryDb::new();
        let account = service(&db)
            .create_client_user(&admin(), request(" New@Example.com ", "secret1", Some(50)))
            .await
            .unwrap();
        assert_eq!(account.uid, "uid-new");
        assert_eq!(account.email, "new@example.com");

        let profile = db.get_profile("uid-new").await.unwrap().unwrap();
        assert_eq!(profile.max_bookings_per_month, 31);
        assert_eq!(profile.display_name, "New Client");
    }

    #[tokio::test]
    async fn test_provision_defaults_quota() {
        let db = MemoryDb::new();
        service(&db)
            .create_client_user(&admin(), request("plain@example.com", "secret1", None))
            .await
            .unwrap();
        let profile = db.get_profile("uid-plain").await.unwrap().unwrap();
        assert_eq!(profile.max_bookings_per_month, DEFAULT_MAX_BOOKINGS_PER_MONTH);
    }

    #[tokio::test]
    async fn test_provision_non_positive_quota_uses_default() {
        let db = MemoryDb::new();
        let service = service(&db);
        for (email, quota) in [("zero@example.com", 0), ("neg@example.com", -3)] {
            let account = service
                .create_client_user(&admin(), request(email, "secret1", Some(quota)))
                .await
                .unwrap();
            let profile = db.get_profile(&account.uid).await.unwrap().unwrap();
            assert_eq!(profile.max_bookings_per_month, DEFAULT_MAX_BOOKINGS_PER_MONTH);
        }
        assert_eq!(requested_quota(Some(1)), 1);
    }

    #[tokio::test]
    async fn test_provision_validation() {
        let db = MemoryDb::new();
        let service = service(&db);

        for req in [
            request("  ", "secret1", None),
            request("x@example.com", "  abc  ", None),
            request("nope", "secret1", None),
        ] {
            let err = service.create_client_user(&admin(), req).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidArgument(_)), "{:?}", err);
        }

        let err = service
            .create_client_user(&admin(), request("taken@example.com", "secret1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_disabled_without_provider() {
        let db = MemoryDb::new();
        let service = ProvisioningService::new(&Stores::from_backend(Arc::new(db)), None);
        assert!(!service.is_enabled());

        let err = service
            .create_client_user(&admin(), request("a@example.com", "secret1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
