// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity resolution and role capabilities.
//!
//! An authenticated principal becomes either a [`ClientSession`] or an
//! [`AdminSession`]. Administrative operations take `&AdminSession`, and the
//! only way to obtain one is through [`IdentityResolver::resolve`] with the
//! configured administrator email.

use crate::db::Principal;
use crate::models::client::normalize_email;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity as seen by the rest of the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// A signed-in client. Can book and cancel for itself only.
#[derive(Debug, Clone)]
pub struct ClientSession {
    user_id: String,
    email: Option<String>,
}

impl ClientSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn principal(&self) -> Principal {
        Principal::User(self.user_id.clone())
    }
}

/// The signed-in administrator.
#[derive(Debug, Clone)]
pub struct AdminSession {
    user_id: String,
    email: String,
}

impl AdminSession {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn principal(&self) -> Principal {
        Principal::Admin(self.user_id.clone())
    }
}

/// Role-specific session for one authenticated request.
#[derive(Debug, Clone)]
pub enum Session {
    Client(ClientSession),
    Admin(AdminSession),
}

impl Session {
    pub fn user_id(&self) -> &str {
        match self {
            Session::Client(s) => s.user_id(),
            Session::Admin(s) => s.user_id(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Session::Client(s) => s.email(),
            Session::Admin(s) => Some(s.email()),
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id().to_string(),
            email: self.email().map(str::to_string),
            is_admin: matches!(self, Session::Admin(_)),
        }
    }
}

/// Maps authenticated principals to sessions.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    admin_email: String,
}

impl IdentityResolver {
    pub fn new(admin_email: &str) -> Self {
        Self {
            admin_email: normalize_email(admin_email),
        }
    }

    /// Exact match after trimming and lowercasing both sides.
    pub fn is_admin_email(&self, email: Option<&str>) -> bool {
        email.is_some_and(|e| !self.admin_email.is_empty() && normalize_email(e) == self.admin_email)
    }

    pub fn resolve(&self, user_id: &str, email: Option<&str>) -> Session {
        let email = email
            .map(normalize_email)
            .filter(|e| !e.is_empty());

        match email {
            Some(email) if self.is_admin_email(Some(&email)) => Session::Admin(AdminSession {
                user_id: user_id.to_string(),
                email,
            }),
            email => Session::Client(ClientSession {
                user_id: user_id.to_string(),
                email,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_match_is_case_insensitive() {
        let resolver = IdentityResolver::new("Admin@Example.com");

        let session = resolver.resolve("uid-1", Some(" ADMIN@example.COM"));
        assert!(matches!(session, Session::Admin(_)));
        assert!(session.identity().is_admin);
        assert_eq!(session.email(), Some("admin@example.com"));
    }

    #[test]
    fn test_other_emails_are_clients() {
        let resolver = IdentityResolver::new("admin@example.com");

        let session = resolver.resolve("uid-2", Some("admin@example.com.evil"));
        assert!(matches!(session, Session::Client(_)));

        let session = resolver.resolve("uid-3", None);
        match session {
            Session::Client(client) => {
                assert_eq!(client.user_id(), "uid-3");
                assert_eq!(client.email(), None);
                assert_eq!(client.principal(), Principal::User("uid-3".to_string()));
            }
            Session::Admin(_) => panic!("missing email must never resolve to admin"),
        }
    }

    #[test]
    fn test_empty_admin_email_matches_nobody() {
        let resolver = IdentityResolver::new("");
        assert!(!resolver.is_admin_email(Some("")));
        assert!(matches!(resolver.resolve("u", Some("")), Session::Client(_)));
    }
}
