//! Blog Models
//!
//! Record types for a small blog: users, their posts and comments on those
//! posts. Each table is keyed by a generated business id and stamped with
//! its creation time.

pub mod blog;

pub use blog::{Blog, Comment, User};

use chrono::Utc;
use uuid::Uuid;

/// Generate a business id: 32 lower-case hex characters from a random UUID
pub fn business_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Current unix time in whole seconds
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_id_shape() {
        let id = business_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, business_id());
    }

    #[test]
    fn test_unix_now_is_seconds() {
        let now = unix_now();
        // Later than 2020-01-01 and not in milliseconds
        assert!(now > 1_577_836_800);
        assert!(now < 10_000_000_000);
    }
}
