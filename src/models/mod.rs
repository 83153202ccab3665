pub mod conversation;
pub mod engagement;
pub mod message;
pub mod notification;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub created_at: i64,
}

/// Current wall-clock time as Unix milliseconds, the storage representation
/// for every timestamp column.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render a stored millisecond timestamp as RFC 3339 for the wire.
pub fn ms_to_rfc3339(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Parse an RFC 3339 cursor (e.g. the `before` query param) back to millis.
pub fn rfc3339_to_ms(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trip() {
        let ms = 1_723_560_000_123i64;
        let rendered = ms_to_rfc3339(ms);
        assert_eq!(rfc3339_to_ms(&rendered), Some(ms));
    }

    #[test]
    fn bad_cursor_is_none() {
        assert_eq!(rfc3339_to_ms("not-a-date"), None);
    }
}
