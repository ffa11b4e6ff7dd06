//! Registry data model.
//!
//! The registry endpoint returns a JSON array of playlist rows. [`WireEntry`]
//! mirrors that shape exactly (it is also what the durable snapshot stores);
//! [`RegistryEntry`] is the normalized form every other module works with.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sentinel::present;

/// Registry entry id (the playlist number).
pub type EntryId = i64;

/// Registry row as returned by the upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub id: EntryId,
    #[serde(default)]
    pub reddit_user: Option<String>,
    #[serde(default)]
    pub service_name: String,
    #[serde(default)]
    pub github_epg_url: Option<String>,
    #[serde(default)]
    pub donation_info: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub thank_message: Option<String>,
}

/// Normalized registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: EntryId,
    pub owner_name: Option<String>,
    pub provider_name: String,
    pub epg_url: Option<String>,
    pub donation_url: Option<String>,
    /// Raw last-owner-update timestamp; parsed lazily by the eligibility engine.
    pub last_owner_update_at: Option<String>,
    pub thank_you_text: Option<String>,
}

impl From<WireEntry> for RegistryEntry {
    fn from(wire: WireEntry) -> Self {
        Self {
            id: wire.id,
            owner_name: present(wire.reddit_user),
            provider_name: wire.service_name.trim().to_string(),
            epg_url: present(wire.github_epg_url),
            donation_url: present(wire.donation_info),
            last_owner_update_at: present(wire.timestamp),
            thank_you_text: present(wire.thank_message),
        }
    }
}

impl From<&RegistryEntry> for WireEntry {
    fn from(entry: &RegistryEntry) -> Self {
        Self {
            id: entry.id,
            reddit_user: entry.owner_name.clone(),
            service_name: entry.provider_name.clone(),
            github_epg_url: entry.epg_url.clone(),
            donation_info: entry.donation_url.clone(),
            timestamp: entry.last_owner_update_at.clone(),
            thank_message: entry.thank_you_text.clone(),
        }
    }
}

const NO_EPG_URL: &str = "No EPG URL";
const PROVIDER_GUIDE_MARKERS: &[&str] = &["use provider's epg", "use provider\u{2019}s epg"];

impl RegistryEntry {
    /// EPG URL for display. Entries that point at the provider's own guide
    /// have no URL of their own.
    pub fn epg_display(&self) -> &str {
        match self.epg_url.as_deref() {
            Some(url)
                if !PROVIDER_GUIDE_MARKERS
                    .iter()
                    .any(|m| url.trim().eq_ignore_ascii_case(m)) =>
            {
                url
            }
            _ => NO_EPG_URL,
        }
    }

    /// Owner name for display.
    pub fn owner_display(&self) -> &str {
        self.owner_name.as_deref().unwrap_or("N/A")
    }
}

/// Registry entries keyed by id. Ids are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: BTreeMap<EntryId, RegistryEntry>,
}

impl RegistrySnapshot {
    /// Build a snapshot from entries, keeping the first row for each id.
    pub fn from_entries(entries: impl IntoIterator<Item = RegistryEntry>) -> Self {
        let mut map = BTreeMap::new();
        for entry in entries {
            match map.entry(entry.id) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                Entry::Occupied(_) => {
                    warn!(id = entry.id, "Dropping duplicate registry entry");
                }
            }
        }
        Self { entries: map }
    }

    /// Build a snapshot from wire rows.
    pub fn from_wire(rows: Vec<WireEntry>) -> Self {
        Self::from_entries(rows.into_iter().map(RegistryEntry::from))
    }

    /// Convert back to wire rows, in id order.
    pub fn to_wire(&self) -> Vec<WireEntry> {
        self.entries.values().map(WireEntry::from).collect()
    }

    pub fn get(&self, id: EntryId) -> Option<&RegistryEntry> {
        self.entries.get(&id)
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owner names in entry order, one per entry (duplicates included).
    pub fn owner_names(&self) -> Vec<&str> {
        self.entries
            .values()
            .filter_map(|e| e.owner_name.as_deref())
            .collect()
    }

    /// Sorted, deduplicated owner names.
    pub fn distinct_owners(&self) -> Vec<String> {
        let mut owners: Vec<String> = self
            .owner_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        owners.sort();
        owners.dedup();
        owners
    }

    /// All entries registered to `owner`.
    pub fn entries_for_owner<'a>(
        &'a self,
        owner: &'a str,
    ) -> impl Iterator<Item = &'a RegistryEntry> + 'a {
        self.entries
            .values()
            .filter(move |e| e.owner_name.as_deref() == Some(owner))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn wire(id: EntryId, owner: &str) -> WireEntry {
        WireEntry {
            id,
            reddit_user: Some(owner.to_string()),
            service_name: "Strong".to_string(),
            github_epg_url: Some(format!("https://example.com/epg{id}.xml.gz")),
            donation_info: None,
            timestamp: Some("2025-10-07 14:03:00".to_string()),
            thank_message: None,
        }
    }

    #[test]
    fn decodes_upstream_json_and_folds_sentinels() {
        let json = r#"[
            {"id": 3, "reddit_user": "N/A", "service_name": "France OTT",
             "github_epg_url": null, "donation_info": null,
             "timestamp": "NULL", "thank_message": ""},
            {"id": 6, "reddit_user": "GanjaRelease", "service_name": "Strong",
             "github_epg_url": "https://example.com/epg6.xml.gz",
             "donation_info": "https://ko-fi.com/ganja",
             "timestamp": "2025-10-07 14:03:00", "thank_message": "Thanks!"}
        ]"#;
        let rows: Vec<WireEntry> = serde_json::from_str(json).unwrap();
        let snapshot = RegistrySnapshot::from_wire(rows);

        let three = snapshot.get(3).unwrap();
        assert_eq!(three.owner_name, None);
        assert_eq!(three.last_owner_update_at, None);
        assert_eq!(three.thank_you_text, None);
        assert_eq!(three.owner_display(), "N/A");

        let six = snapshot.get(6).unwrap();
        assert_eq!(six.owner_name.as_deref(), Some("GanjaRelease"));
        assert_eq!(six.donation_url.as_deref(), Some("https://ko-fi.com/ganja"));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let snapshot = RegistrySnapshot::from_wire(vec![wire(1, "ferteque"), wire(1, "jams")]);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get(1).unwrap().owner_name.as_deref(), Some("ferteque"));
    }

    #[test]
    fn distinct_owners_sorted_and_deduplicated() {
        let snapshot = RegistrySnapshot::from_wire(vec![
            wire(14, "tropaz"),
            wire(6, "GanjaRelease"),
            wire(15, "tropaz"),
        ]);
        assert_eq!(snapshot.owner_names(), vec!["GanjaRelease", "tropaz", "tropaz"]);
        assert_eq!(snapshot.distinct_owners(), vec!["GanjaRelease", "tropaz"]);
        assert_eq!(snapshot.entries_for_owner("tropaz").count(), 2);
    }

    #[test]
    fn provider_guide_has_no_epg_url() {
        let mut entry = RegistryEntry::from(wire(17, "OldJob8069"));
        entry.epg_url = Some("Use Provider\u{2019}s EPG".to_string());
        assert_eq!(entry.epg_display(), "No EPG URL");
        entry.epg_url = None;
        assert_eq!(entry.epg_display(), "No EPG URL");
    }

    #[test]
    fn wire_round_trip_preserves_entries() {
        let snapshot = RegistrySnapshot::from_wire(vec![wire(2, "jams"), wire(1, "ferteque")]);
        let rows = snapshot.to_wire();
        assert_eq!(rows[0].id, 1);
        assert_eq!(RegistrySnapshot::from_wire(rows), snapshot);
    }
}
