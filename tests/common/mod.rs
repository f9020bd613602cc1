// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use slot_booking::config::Config;
use slot_booking::db::{FirestoreDb, MemoryDb, Stores};
use slot_booking::middleware::auth::create_jwt;
use slot_booking::routes::create_router;
use slot_booking::services::AccountProvisioner;
use slot_booking::AppState;
use std::sync::Arc;

pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test app over a fresh in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: MemoryDb,
}

#[allow(dead_code)]
impl TestApp {
    /// Token for a client account `<uid>@example.com`.
    pub fn client_token(&self, uid: &str) -> String {
        self.token(uid, Some(&format!("{}@example.com", uid)))
    }

    pub fn admin_token(&self) -> String {
        self.token("admin-uid", Some(ADMIN_EMAIL))
    }

    pub fn token(&self, uid: &str, email: Option<&str>) -> String {
        create_jwt(uid, email, &self.state.config.jwt_signing_key).unwrap()
    }

    /// Send a request, optionally authenticated and with a JSON body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Response<Body> {
        use tower::ServiceExt;

        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Create a test app backed by the in-memory store.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_provisioner(None)
}

#[allow(dead_code)]
pub fn create_test_app_with_provisioner(
    provisioner: Option<Arc<dyn AccountProvisioner>>,
) -> TestApp {
    let config = Config::test_default();
    let db = MemoryDb::new();
    let stores = Stores::from_backend(Arc::new(db.clone()));
    let state = Arc::new(AppState::with_provisioner(config, stores, provisioner));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
    }
}
