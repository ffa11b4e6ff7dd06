//! Per-user status: record fetch, registry enrichment, eligibility.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::RegistryView;
use crate::clock::Clock;
use crate::eligibility::{EligibilityEngine, StatusReport};
use crate::error::{Error, FetchError, Result};
use crate::records::{RecordLookup, UserRecord, UserRecordSource};
use crate::registry::RegistryEntry;

/// Answer to a status request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    Report {
        record: UserRecord,
        /// Registry entry the record points at, when the registry could be read.
        entry: Option<RegistryEntry>,
        report: StatusReport,
    },
    NotFound,
    Duplicate,
    Mismatch,
    Unavailable,
}

impl fmt::Display for StatusOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Report { record, .. } => {
                write!(f, "Status for file {}", record.file_reference)
            }
            Self::NotFound => f.write_str("No registered file was found for this user."),
            Self::Duplicate => f.write_str(
                "More than one file is registered for this user. Please specify a file id.",
            ),
            Self::Mismatch => f.write_str("That file is registered to a different user."),
            Self::Unavailable => f.write_str(
                "The status service is unreachable right now. Please try again later.",
            ),
        }
    }
}

/// Looks up a user's record and evaluates it.
pub struct StatusService {
    records: Arc<dyn UserRecordSource>,
    view: Arc<dyn RegistryView>,
    engine: EligibilityEngine,
    clock: Arc<dyn Clock>,
}

impl StatusService {
    pub fn new(
        records: Arc<dyn UserRecordSource>,
        view: Arc<dyn RegistryView>,
        engine: EligibilityEngine,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            records,
            view,
            engine,
            clock,
        }
    }

    /// Status for `duid`, optionally narrowed to `file_id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authorization`] when the record endpoint rejects our
    /// token. Every other upstream failure becomes
    /// [`StatusOutcome::Unavailable`].
    pub async fn status_for(&self, duid: &str, file_id: Option<&str>) -> Result<StatusOutcome> {
        let lookup = match self.records.fetch_record(duid, file_id).await {
            Ok(lookup) => lookup,
            Err(FetchError::Unauthorized) => {
                return Err(Error::Authorization(
                    "record endpoint rejected the bearer token".into(),
                ));
            }
            Err(e) => {
                warn!(duid, error = %e, "User record fetch failed");
                return Ok(StatusOutcome::Unavailable);
            }
        };

        let record = match lookup {
            RecordLookup::Found(record) => record,
            RecordLookup::Duplicate => return Ok(StatusOutcome::Duplicate),
            RecordLookup::Mismatch => return Ok(StatusOutcome::Mismatch),
            RecordLookup::NotFound => return Ok(StatusOutcome::NotFound),
        };

        let entry = self
            .view
            .snapshot()
            .await
            .and_then(|snapshot| snapshot.get(record.registry_entry_id).cloned());
        if entry.is_none() {
            debug!(
                list_id = record.registry_entry_id,
                "No registry entry for record; evaluating without enrichment"
            );
        }

        let report = self
            .engine
            .evaluate(&record, entry.as_ref(), self.clock.now());
        Ok(StatusOutcome::Report {
            record,
            entry,
            report,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::eligibility::StatusMessage;
    use crate::registry::RegistrySnapshot;
    use crate::testing::{FakeRecordSource, fixed_clock, reference_now, sample_snapshot};

    struct StaticView(Option<Arc<RegistrySnapshot>>);

    #[async_trait]
    impl RegistryView for StaticView {
        async fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
            self.0.clone()
        }
    }

    fn record() -> UserRecord {
        UserRecord {
            record_key: "17".into(),
            registry_entry_id: 6,
            file_reference: "1AbC".into(),
            is_free_update_enabled: true,
            is_supporter_update_enabled: false,
            created_at: Some(reference_now().to_rfc3339()),
            last_free_sync_at: None,
            last_supporter_sync_at: None,
            owner_identifier: "42".into(),
            file_owner_name: None,
        }
    }

    fn service(
        answer: std::result::Result<RecordLookup, FetchError>,
        view: StaticView,
    ) -> StatusService {
        StatusService::new(
            Arc::new(FakeRecordSource::new(answer)),
            Arc::new(view),
            EligibilityEngine::default(),
            fixed_clock(),
        )
    }

    #[tokio::test]
    async fn found_record_is_evaluated_with_entry() {
        let svc = service(
            Ok(RecordLookup::Found(record())),
            StaticView(Some(Arc::new(sample_snapshot()))),
        );

        let StatusOutcome::Report { entry, report, .. } = svc.status_for("42", None).await.unwrap()
        else {
            panic!("expected a report");
        };
        assert_eq!(entry.unwrap().id, 6);
        assert!(matches!(
            report.free_messages[..],
            [StatusMessage::WaitUntil(_)]
        ));
    }

    #[tokio::test]
    async fn missing_registry_still_produces_report() {
        let svc = service(Ok(RecordLookup::Found(record())), StaticView(None));

        let outcome = svc.status_for("42", Some("1AbC")).await.unwrap();
        assert!(matches!(outcome, StatusOutcome::Report { entry: None, .. }));
    }

    #[tokio::test]
    async fn endpoint_answers_map_to_outcomes() {
        for (answer, expected) in [
            (RecordLookup::NotFound, StatusOutcome::NotFound),
            (RecordLookup::Duplicate, StatusOutcome::Duplicate),
            (RecordLookup::Mismatch, StatusOutcome::Mismatch),
        ] {
            let svc = service(Ok(answer), StaticView(None));
            assert_eq!(svc.status_for("42", None).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn upstream_failure_is_unavailable() {
        let svc = service(Err(FetchError::Status(502)), StaticView(None));
        let outcome = svc.status_for("42", None).await.unwrap();
        assert_eq!(outcome, StatusOutcome::Unavailable);
        assert!(outcome.to_string().contains("try again later"));
    }

    #[tokio::test]
    async fn rejected_token_propagates() {
        let svc = service(Err(FetchError::Unauthorized), StaticView(None));
        assert!(matches!(
            svc.status_for("42", None).await,
            Err(Error::Authorization(_))
        ));
    }
}
