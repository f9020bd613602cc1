// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Storage access rules for booking documents.
//!
//! Every backend runs these checks before mutating a booking, in the same
//! way document-store security rules guard writes from untrusted clients.

use crate::error::AppError;
use crate::models::{Booking, NewBooking};

/// Who is performing a storage write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    User(String),
    Admin(String),
}

/// Users may only create bookings they own.
pub fn check_create(principal: &Principal, booking: &NewBooking) -> Result<(), AppError> {
    match principal {
        Principal::Admin(_) => Ok(()),
        Principal::User(uid) if *uid == booking.user_id => Ok(()),
        Principal::User(_) => Err(AppError::PermissionDenied(
            "cannot create a booking for another user".to_string(),
        )),
    }
}

/// Owners may delete their own bookings; the administrator may delete any.
pub fn check_delete(principal: &Principal, booking: &Booking) -> Result<(), AppError> {
    match principal {
        Principal::Admin(_) => Ok(()),
        Principal::User(uid) if *uid == booking.user_id => Ok(()),
        Principal::User(_) => Err(AppError::PermissionDenied(format!(
            "booking {} belongs to another user",
            booking.id
        ))),
    }
}

/// Only the administrator may move a booking.
pub fn check_update(principal: &Principal, booking: &Booking) -> Result<(), AppError> {
    match principal {
        Principal::Admin(_) => Ok(()),
        Principal::User(_) => Err(AppError::PermissionDenied(format!(
            "booking {} can only be changed by the administrator",
            booking.id
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotId;

    fn booking(owner: &str) -> Booking {
        Booking {
            id: "b1".to_string(),
            user_id: owner.to_string(),
            user_email: None,
            date: "2025-03-05".parse().unwrap(),
            slot_id: SlotId::Morning,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_owner_and_admin_may_delete() {
        let b = booking("owner");
        assert!(check_delete(&Principal::User("owner".into()), &b).is_ok());
        assert!(check_delete(&Principal::Admin("root".into()), &b).is_ok());
        assert!(matches!(
            check_delete(&Principal::User("intruder".into()), &b),
            Err(AppError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_only_admin_may_update() {
        let b = booking("owner");
        assert!(check_update(&Principal::User("owner".into()), &b).is_err());
        assert!(check_update(&Principal::Admin("root".into()), &b).is_ok());
    }

    #[test]
    fn test_users_create_only_for_themselves() {
        let new = NewBooking {
            user_id: "owner".to_string(),
            user_email: None,
            date: "2025-03-05".parse().unwrap(),
            slot_id: SlotId::Morning,
            created_at: chrono::Utc::now(),
        };
        assert!(check_create(&Principal::User("owner".into()), &new).is_ok());
        assert!(check_create(&Principal::User("other".into()), &new).is_err());
        assert!(check_create(&Principal::Admin("root".into()), &new).is_ok());
    }
}
