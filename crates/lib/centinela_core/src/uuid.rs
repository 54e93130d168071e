//! Identifier helpers.
//!
//! Role and API key ids are UUIDv7, generated app-side so they sort by
//! creation time. Token ids (`jti`) use the same generator.

use uuid::Uuid;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Parse an id received from a caller. Returns `None` if it is not a UUID.
pub fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuidv7_is_valid() {
        let id = uuidv7();
        assert_eq!(id.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn uuidv7_is_monotonic() {
        let a = uuidv7();
        let b = uuidv7();
        assert!(b >= a);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid").is_none());
        assert!(parse_id(&uuidv7().to_string()).is_some());
    }
}
