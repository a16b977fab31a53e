//! Session context: who is using the wishlist
//!
//! Replaces the process-wide "current user" with a value passed into the
//! store at construction. A session is opened through the secret gate.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::{WishlistError, WishlistResult};
use crate::types::User;

/// The shared code that unlocks the app
pub const SECRET_CODE: &str = "bicanosaurus";

/// Check a code typed into the gate (case-insensitive, surrounding whitespace ignored)
pub fn check_code(input: &str) -> bool {
    input.trim().to_lowercase() == SECRET_CODE
}

/// An unlocked session for one of the two users
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
    opened_at: DateTime<Utc>,
}

impl Session {
    /// Open a session after the gate accepts `code`.
    pub fn unlock(code: &str, user: User) -> WishlistResult<Self> {
        if !check_code(code) {
            return Err(WishlistError::InvalidCode);
        }
        info!(%user, "Session unlocked");
        Ok(Self::for_user(user))
    }

    /// Session for a user that has already passed the gate
    pub fn for_user(user: User) -> Self {
        Self {
            user,
            opened_at: Utc::now(),
        }
    }

    pub fn user(&self) -> User {
        self.user
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    /// Greeting line shown under the wishlist header
    pub fn greeting(&self) -> String {
        format!("Logged in as {}", self.user.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_is_case_and_whitespace_insensitive() {
        assert!(check_code("bicanosaurus"));
        assert!(check_code("  BicaNosaurus \n"));
        assert!(!check_code("bicano"));
        assert!(!check_code(""));
    }

    #[test]
    fn test_unlock() {
        let session = Session::unlock("Bicanosaurus", User::Kevin).unwrap();
        assert_eq!(session.user(), User::Kevin);
        assert_eq!(session.greeting(), "Logged in as Kevin");

        let err = Session::unlock("wrong", User::Kevin).unwrap_err();
        assert!(matches!(err, WishlistError::InvalidCode));
    }
}
