//! Utility functions shared across the bot

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a fresh idempotency identifier for an outbound relay message
pub fn generate_guid() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Case-insensitive substring test
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_guids() {
        let id1 = generate_guid();
        let id2 = generate_guid();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Preset: S4 weekly", "s4"));
        assert!(contains_ignore_case("allsanity", "AllSanity"));
        assert!(!contains_ignore_case("beginner", "s1"));
    }
}
