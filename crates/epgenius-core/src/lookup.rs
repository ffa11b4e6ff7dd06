//! Registry lookup dispatcher.
//!
//! A raw query is one of:
//! - `list`: every entry,
//! - `owner`: the owner names to pick from,
//! - an integer of any size: exact id lookup,
//! - anything else: fuzzy owner-name match.

use std::sync::Arc;

use tracing::debug;

use crate::cache::RegistryView;
use crate::registry::{EntryId, RegistryEntry, RegistrySnapshot};
use crate::resolver::{OwnerMatcher, is_integer_query};

/// Parsed form of a raw lookup query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    List,
    Owners,
    Id(EntryId),
    /// Integer literal outside the id range. Nothing can match it.
    UnknownId(String),
    Name(String),
}

impl LookupQuery {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("list") {
            Self::List
        } else if trimmed.eq_ignore_ascii_case("owner") {
            Self::Owners
        } else if is_integer_query(trimmed) {
            trimmed.parse::<EntryId>().map_or_else(
                |_| Self::UnknownId(trimmed.trim_start_matches('+').to_string()),
                Self::Id,
            )
        } else {
            Self::Name(trimmed.to_string())
        }
    }
}

/// One matched owner and the entries registered to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerEntries {
    pub owner: String,
    pub score: u8,
    pub entries: Vec<RegistryEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    /// All entries in id order.
    Listing(Vec<RegistryEntry>),
    /// Sorted, distinct owner names. Empty when no entry has an owner.
    Owners(Vec<String>),
    Entry(RegistryEntry),
    /// No entry with this id, as written in the query.
    NotFound(String),
    Matches(Vec<OwnerEntries>),
    /// Nothing scored high enough; `owners` is offered for manual choice.
    NoConfidentMatch { query: String, owners: Vec<String> },
    /// No registry data could be served at all.
    Unavailable,
}

/// Answer `query` against `snapshot`.
///
/// Only [`LookupQuery::Name`] consults `matcher`.
pub fn lookup(
    snapshot: &RegistrySnapshot,
    query: &LookupQuery,
    matcher: &dyn OwnerMatcher,
) -> LookupOutcome {
    match query {
        LookupQuery::List => LookupOutcome::Listing(snapshot.iter().cloned().collect()),
        LookupQuery::Owners => LookupOutcome::Owners(snapshot.distinct_owners()),
        LookupQuery::Id(id) => snapshot
            .get(*id)
            .cloned()
            .map_or_else(|| LookupOutcome::NotFound(id.to_string()), LookupOutcome::Entry),
        LookupQuery::UnknownId(id) => LookupOutcome::NotFound(id.clone()),
        LookupQuery::Name(name) => {
            let candidates = snapshot.owner_names();
            let matches = matcher.resolve(name, &candidates);
            debug!(query = %name, matches = matches.len(), "Resolved owner query");
            if matches.is_empty() {
                return LookupOutcome::NoConfidentMatch {
                    query: name.clone(),
                    owners: snapshot.distinct_owners(),
                };
            }
            LookupOutcome::Matches(
                matches
                    .into_iter()
                    .map(|m| OwnerEntries {
                        entries: snapshot.entries_for_owner(&m.name).cloned().collect(),
                        owner: m.name,
                        score: m.score,
                    })
                    .collect(),
            )
        }
    }
}

/// Lookup over whatever registry view is configured.
pub struct RegistryLookup {
    view: Arc<dyn RegistryView>,
    matcher: Arc<dyn OwnerMatcher>,
}

impl RegistryLookup {
    pub fn new(view: Arc<dyn RegistryView>, matcher: Arc<dyn OwnerMatcher>) -> Self {
        Self { view, matcher }
    }

    pub async fn query(&self, raw: &str) -> LookupOutcome {
        let Some(snapshot) = self.view.snapshot().await else {
            return LookupOutcome::Unavailable;
        };
        lookup(&snapshot, &LookupQuery::parse(raw), self.matcher.as_ref())
    }
}
