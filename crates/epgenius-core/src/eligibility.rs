//! Update-eligibility rules.
//!
//! [`EligibilityEngine::evaluate`] turns a user record, its registry entry
//! and the current time into a [`StatusReport`]. It is total: missing or
//! unparseable timestamps become messages, never errors.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::UserRecord;
use crate::registry::RegistryEntry;
use crate::timestamp;

/// Time windows used by the rules, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityConfig {
    /// New files are not judged before this much time has passed.
    pub grace_period_hours: u32,
    /// How long a sync may trail an owner update before it is an error.
    pub owner_sync_window_hours: u32,
    /// Maximum age of the last supporter sync.
    pub supporter_max_age_hours: u32,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            grace_period_hours: 24,
            owner_sync_window_hours: 5,
            supporter_max_age_hours: 36,
        }
    }
}

impl EligibilityConfig {
    fn grace_period(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.grace_period_hours))
    }

    fn owner_sync_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.owner_sync_window_hours))
    }
}

/// A timestamp the free-update rules needed but could not read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    LastFreeSync,
    OwnerLastUpdate,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LastFreeSync => f.write_str("the last free sync date"),
            Self::OwnerLastUpdate => f.write_str("the list owner's last update date"),
        }
    }
}

/// One line of a status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusMessage {
    MissingCreationDate,
    WaitUntil(DateTime<Utc>),
    MissingSyncData(Vec<MissingField>),
    SyncLag {
        owner_updated_at: DateTime<Utc>,
        window_hours: u32,
    },
    StillSyncing {
        check_after: DateTime<Utc>,
    },
    FreeUpdatesDisabled,
    /// The entry's own thank-you text, or the generic one when `None`.
    SupporterThanks(Option<String>),
    MissingSupporterSync,
    SupporterSyncLag {
        last_sync: DateTime<Utc>,
        max_age_hours: u32,
    },
    DonationPrompt(String),
    SupporterUnavailable,
}

impl StatusMessage {
    /// Whether the message reports a problem needing support.
    pub const fn is_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCreationDate
                | Self::MissingSyncData(_)
                | Self::SyncLag { .. }
                | Self::MissingSupporterSync
                | Self::SupporterSyncLag { .. }
        )
    }
}

const SUPPORT_HINT: &str = "Please open a support ticket.";

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = |dt: &DateTime<Utc>| timestamp::format(Some(*dt));
        match self {
            Self::MissingCreationDate => write!(
                f,
                "Data integrity issue: this file has no valid creation date. {SUPPORT_HINT}"
            ),
            Self::WaitUntil(when) => write!(
                f,
                "This file was added recently. Please check back after {}.",
                at(when)
            ),
            Self::MissingSyncData(fields) => {
                let names: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "Cannot verify sync status: {} is missing. {SUPPORT_HINT}",
                    names.join(" and ")
                )
            }
            Self::SyncLag {
                owner_updated_at,
                window_hours,
            } => write!(
                f,
                "Sync error: the list owner updated at {} but this file has not synced \
                 within {window_hours} hours. {SUPPORT_HINT}",
                at(owner_updated_at)
            ),
            Self::StillSyncing { check_after } => write!(
                f,
                "The list owner updated recently and this file is still syncing. \
                 Check again after {}.",
                at(check_after)
            ),
            Self::FreeUpdatesDisabled => write!(
                f,
                "Free updates are disabled for this file. If you think this is a mistake, \
                 {}",
                SUPPORT_HINT.to_lowercase()
            ),
            Self::SupporterThanks(Some(text)) => f.write_str(text),
            Self::SupporterThanks(None) => f.write_str("Thank you for supporting this list!"),
            Self::MissingSupporterSync => write!(
                f,
                "Supporter sync error: no valid supporter sync date is recorded. {SUPPORT_HINT}"
            ),
            Self::SupporterSyncLag {
                last_sync,
                max_age_hours,
            } => write!(
                f,
                "Supporter sync error: the last supporter sync was {}, more than \
                 {max_age_hours} hours ago. {SUPPORT_HINT}",
                at(last_sync)
            ),
            Self::DonationPrompt(url) => write!(
                f,
                "Supporter updates are not enabled for this file. Support the list owner \
                 to enable them: {url}"
            ),
            Self::SupporterUnavailable => {
                f.write_str("Supporter updates are currently unavailable for this list.")
            }
        }
    }
}

/// Display strings for every timestamp a report mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedTimestamps {
    pub created_at: String,
    pub last_free_sync: String,
    pub last_supporter_sync: String,
    pub owner_last_update: String,
}

impl FormattedTimestamps {
    fn new(record: &UserRecord, entry: Option<&RegistryEntry>) -> Self {
        Self {
            created_at: timestamp::format_raw(record.created_at.as_deref()),
            last_free_sync: timestamp::format_raw(record.last_free_sync_at.as_deref()),
            last_supporter_sync: timestamp::format_raw(record.last_supporter_sync_at.as_deref()),
            owner_last_update: timestamp::format_raw(
                entry.and_then(|e| e.last_owner_update_at.as_deref()),
            ),
        }
    }

    /// `(label, value)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("Created", self.created_at.as_str()),
            ("Last free sync", self.last_free_sync.as_str()),
            ("Last supporter sync", self.last_supporter_sync.as_str()),
            ("Owner last update", self.owner_last_update.as_str()),
        ]
        .into_iter()
    }
}

/// Everything the user gets told about their file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub free_enabled: bool,
    pub free_messages: Vec<StatusMessage>,
    pub supporter_enabled: bool,
    pub supporter_messages: Vec<StatusMessage>,
    pub formatted_timestamps: FormattedTimestamps,
}

impl StatusReport {
    pub fn has_errors(&self) -> bool {
        self.free_messages
            .iter()
            .chain(&self.supporter_messages)
            .any(StatusMessage::is_error)
    }
}

/// Applies the eligibility rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibilityEngine {
    config: EligibilityConfig,
}

impl EligibilityEngine {
    pub const fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn evaluate(
        &self,
        record: &UserRecord,
        entry: Option<&RegistryEntry>,
        now: DateTime<Utc>,
    ) -> StatusReport {
        StatusReport {
            free_enabled: record.is_free_update_enabled,
            free_messages: self.free_messages(record, entry, now),
            supporter_enabled: record.is_supporter_update_enabled,
            supporter_messages: self.supporter_messages(record, entry, now),
            formatted_timestamps: FormattedTimestamps::new(record, entry),
        }
    }

    fn free_messages(
        &self,
        record: &UserRecord,
        entry: Option<&RegistryEntry>,
        now: DateTime<Utc>,
    ) -> Vec<StatusMessage> {
        if !record.is_free_update_enabled {
            return vec![StatusMessage::FreeUpdatesDisabled];
        }

        let Some(created_at) = timestamp::parse_opt(record.created_at.as_deref()) else {
            return vec![StatusMessage::MissingCreationDate];
        };

        let grace_ends = created_at + self.config.grace_period();
        if now <= grace_ends {
            return vec![StatusMessage::WaitUntil(grace_ends)];
        }

        let last_sync = timestamp::parse_opt(record.last_free_sync_at.as_deref());
        let owner_update =
            timestamp::parse_opt(entry.and_then(|e| e.last_owner_update_at.as_deref()));
        let (last_sync, owner_update) = match (last_sync, owner_update) {
            (Some(sync), Some(owner)) => (sync, owner),
            (sync, owner) => {
                let mut missing = Vec::with_capacity(2);
                if sync.is_none() {
                    missing.push(MissingField::LastFreeSync);
                }
                if owner.is_none() {
                    missing.push(MissingField::OwnerLastUpdate);
                }
                return vec![StatusMessage::MissingSyncData(missing)];
            }
        };

        if owner_update <= last_sync {
            return Vec::new();
        }

        let deadline = owner_update + self.config.owner_sync_window();
        if deadline < now {
            vec![StatusMessage::SyncLag {
                owner_updated_at: owner_update,
                window_hours: self.config.owner_sync_window_hours,
            }]
        } else {
            vec![StatusMessage::StillSyncing {
                check_after: deadline,
            }]
        }
    }

    fn supporter_messages(
        &self,
        record: &UserRecord,
        entry: Option<&RegistryEntry>,
        now: DateTime<Utc>,
    ) -> Vec<StatusMessage> {
        if !record.is_supporter_update_enabled {
            let prompt = entry
                .and_then(|e| e.donation_url.clone())
                .map_or(StatusMessage::SupporterUnavailable, StatusMessage::DonationPrompt);
            return vec![prompt];
        }

        let mut messages = vec![StatusMessage::SupporterThanks(
            entry.and_then(|e| e.thank_you_text.clone()),
        )];

        let raw = record.last_supporter_sync_at.as_deref().unwrap_or_default();
        match (timestamp::parse(raw), timestamp::age_hours(raw, now)) {
            (Some(last_sync), Some(age))
                if age > f64::from(self.config.supporter_max_age_hours) =>
            {
                messages.push(StatusMessage::SupporterSyncLag {
                    last_sync,
                    max_age_hours: self.config.supporter_max_age_hours,
                });
            }
            (Some(_), Some(_)) => {}
            _ => messages.push(StatusMessage::MissingSupporterSync),
        }
        messages
    }
}
