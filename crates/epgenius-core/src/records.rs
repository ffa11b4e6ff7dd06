//! Per-user file records.
//!
//! The record endpoint answers `{status, file?}`. Its boolean columns come
//! back as either JSON booleans or `0`/`1`, and ids as either strings or
//! numbers; both are accepted here so callers only ever see [`UserRecord`].

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FetchError;
use crate::registry::EntryId;
use crate::sentinel::present;

/// A user's registered file, normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub record_key: String,
    pub registry_entry_id: EntryId,
    pub file_reference: String,
    pub is_free_update_enabled: bool,
    pub is_supporter_update_enabled: bool,
    /// Raw timestamps; normalized by the eligibility engine.
    pub created_at: Option<String>,
    pub last_free_sync_at: Option<String>,
    pub last_supporter_sync_at: Option<String>,
    pub owner_identifier: String,
    pub file_owner_name: Option<String>,
}

/// What the record endpoint said about a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    Found(UserRecord),
    /// Several files are registered; a file id is required.
    Duplicate,
    /// The file exists but belongs to someone else.
    Mismatch,
    NotFound,
}

/// Per-user record endpoint.
#[async_trait]
pub trait UserRecordSource: Send + Sync {
    /// Look up the record for `duid`, optionally narrowed to one file.
    ///
    /// A rejected bearer token is reported as [`FetchError::Unauthorized`].
    async fn fetch_record(
        &self,
        duid: &str,
        file_id: Option<&str>,
    ) -> Result<RecordLookup, FetchError>;
}

/// Request body for the record endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RecordRequest<'a> {
    pub duid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    Duplicate,
    Mismatch,
    NotFound,
}

/// Response body of the record endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordResponse {
    pub status: RecordStatus,
    #[serde(default)]
    pub file: Option<WireFile>,
}

/// `file` object as returned by the record endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct WireFile {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub list_id: EntryId,
    #[serde(default)]
    pub drive_file_id: String,
    #[serde(deserialize_with = "flexible_bool", default)]
    pub valid: bool,
    #[serde(deserialize_with = "flexible_bool", default)]
    pub auto_update: bool,
    #[serde(default)]
    pub uploaded_at: Option<String>,
    #[serde(default)]
    pub last_update_owner: Option<String>,
    #[serde(default)]
    pub last_update_provider: Option<String>,
    #[serde(deserialize_with = "string_or_number", default)]
    pub discord_id: String,
    #[serde(default)]
    pub file_owner: Option<String>,
}

impl From<WireFile> for UserRecord {
    fn from(wire: WireFile) -> Self {
        Self {
            record_key: wire.id,
            registry_entry_id: wire.list_id,
            file_reference: wire.drive_file_id,
            is_free_update_enabled: wire.valid,
            is_supporter_update_enabled: wire.auto_update,
            created_at: present(wire.uploaded_at),
            last_free_sync_at: present(wire.last_update_owner),
            last_supporter_sync_at: present(wire.last_update_provider),
            owner_identifier: wire.discord_id,
            file_owner_name: present(wire.file_owner),
        }
    }
}

impl RecordResponse {
    /// Convert into a [`RecordLookup`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Decode`] when `status` is `ok` but no `file`
    /// was sent.
    pub fn into_lookup(self) -> Result<RecordLookup, FetchError> {
        match self.status {
            RecordStatus::Ok => self
                .file
                .map(|file| RecordLookup::Found(file.into()))
                .ok_or_else(|| FetchError::Decode("status ok without file".into())),
            RecordStatus::Duplicate => Ok(RecordLookup::Duplicate),
            RecordStatus::Mismatch => Ok(RecordLookup::Mismatch),
            RecordStatus::NotFound => Ok(RecordLookup::NotFound),
        }
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    match Flexible::deserialize(deserializer)? {
        Flexible::Bool(b) => Ok(b),
        Flexible::Int(0) | Flexible::Null(()) => Ok(false),
        Flexible::Int(1) => Ok(true),
        Flexible::Int(other) => Err(serde::de::Error::custom(format!(
            "expected boolean or 0/1, got {other}"
        ))),
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flexible {
        Str(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Flexible::deserialize(deserializer)? {
        Flexible::Str(s) => s,
        Flexible::Int(n) => n.to_string(),
        Flexible::UInt(n) => n.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use serde_json::json;

    use super::*;

    fn decode(value: serde_json::Value) -> Result<RecordLookup, FetchError> {
        serde_json::from_value::<RecordResponse>(value)
            .unwrap()
            .into_lookup()
    }

    #[test]
    fn found_record_maps_every_field() {
        let lookup = decode(json!({
            "status": "ok",
            "file": {
                "id": 17,
                "list_id": 6,
                "drive_file_id": "1AbC-xyz",
                "valid": 1,
                "auto_update": false,
                "uploaded_at": "2025-10-01 08:00:00",
                "last_update_owner": "N/A",
                "last_update_provider": "2025-10-06T10:00:00Z",
                "discord_id": "123456789012345678",
                "file_owner": "GanjaRelease"
            }
        }))
        .unwrap();

        let RecordLookup::Found(record) = lookup else {
            panic!("expected a found record");
        };
        assert_eq!(record.record_key, "17");
        assert_eq!(record.registry_entry_id, 6);
        assert_eq!(record.file_reference, "1AbC-xyz");
        assert!(record.is_free_update_enabled);
        assert!(!record.is_supporter_update_enabled);
        assert_eq!(record.created_at.as_deref(), Some("2025-10-01 08:00:00"));
        assert_eq!(record.last_free_sync_at, None);
        assert_eq!(
            record.last_supporter_sync_at.as_deref(),
            Some("2025-10-06T10:00:00Z")
        );
        assert_eq!(record.owner_identifier, "123456789012345678");
        assert_eq!(record.file_owner_name.as_deref(), Some("GanjaRelease"));
    }

    #[test]
    fn numeric_discord_id_is_accepted() {
        let lookup = decode(json!({
            "status": "ok",
            "file": {"id": "a", "list_id": 1, "valid": true, "auto_update": 0, "discord_id": 42}
        }))
        .unwrap();
        let RecordLookup::Found(record) = lookup else {
            panic!("expected a found record");
        };
        assert_eq!(record.owner_identifier, "42");
        assert!(!record.is_supporter_update_enabled);
    }

    #[test]
    fn out_of_range_flag_is_rejected() {
        let result = serde_json::from_value::<RecordResponse>(json!({
            "status": "ok",
            "file": {"id": 1, "list_id": 1, "valid": 2}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn non_ok_statuses_map_to_variants() {
        assert_eq!(
            decode(json!({"status": "duplicate"})).unwrap(),
            RecordLookup::Duplicate
        );
        assert_eq!(
            decode(json!({"status": "mismatch"})).unwrap(),
            RecordLookup::Mismatch
        );
        assert_eq!(
            decode(json!({"status": "not_found"})).unwrap(),
            RecordLookup::NotFound
        );
    }

    #[test]
    fn ok_without_file_is_a_decode_error() {
        assert!(matches!(
            decode(json!({"status": "ok"})),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn request_omits_missing_file_id() {
        let body = serde_json::to_value(RecordRequest {
            duid: "99",
            file_id: None,
        })
        .unwrap();
        assert_eq!(body, json!({"duid": "99"}));
    }
}
