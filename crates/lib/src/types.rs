use crate::errors::KbError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Formats a timestamp the way every table stores it: RFC 3339, UTC,
/// microsecond precision. Stored values therefore sort lexicographically.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_ts() -> String {
    format_ts(Utc::now())
}

pub fn parse_ts(raw: &str) -> Result<DateTime<Utc>, KbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| KbError::DataIntegrity(format!("Failed to parse timestamp '{raw}': {e}")))
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Who performed a mutation. Threaded through every write so services can
/// stamp `*_by_id` columns and emit attributable activity events.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
}

impl Actor {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ip_address: None,
        }
    }

    pub fn with_ip(mut self, ip: Option<String>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Used by background jobs and tests that mutate without a caller.
    pub fn system() -> Self {
        Self::default()
    }
}

/// A compact `{id, name, email}` view of a user joined onto other records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
}

/// Deserializes a field that distinguishes "absent" from "explicitly null".
///
/// `None` means the key was not sent, `Some(None)` means it was sent as
/// `null` and the column should be cleared.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        icon: Option<Option<String>>,
    }

    #[test]
    fn double_option_separates_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"icon": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"icon": "book"}"#).unwrap();
        assert_eq!(missing.icon, None);
        assert_eq!(null.icon, Some(None));
        assert_eq!(set.icon, Some(Some("book".to_string())));
    }

    #[test]
    fn timestamps_round_trip_and_sort() {
        let earlier = now_ts();
        let later = format_ts(Utc::now() + chrono::Duration::seconds(1));
        assert!(earlier < later);
        assert!(parse_ts(&earlier).is_ok());
        assert!(parse_ts("yesterday").is_err());
    }
}
