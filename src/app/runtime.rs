use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::adapters::feed::{FeedApi, FeedError};
use crate::adapters::storage::StorageApi;
use crate::domain::reading;
use crate::domain::upload::{UploadFlowError, UploadOutcome, run_upload};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("station feed has no reading for {target_hour} (station outage?)")]
    NoData { target_hour: String },
    #[error("station feed unavailable: {0}")]
    FeedUnavailable(#[from] FeedError),
    #[error(transparent)]
    Upload(#[from] UploadFlowError),
}

pub struct RelayJob<F, S> {
    feed: F,
    storage: S,
    feed_offset: FixedOffset,
}

impl<F, S> RelayJob<F, S>
where
    F: FeedApi,
    S: StorageApi,
{
    pub fn new(feed: F, storage: S, feed_offset: FixedOffset) -> Self {
        Self {
            feed,
            storage,
            feed_offset,
        }
    }

    pub fn execute(&mut self, now: DateTime<Utc>) -> Result<UploadOutcome, JobError> {
        let target = reading::target_hour(now, self.feed_offset);
        let year_month = target.format("%Y%m").to_string();

        tracing::info!(
            target_hour = %target.to_rfc3339(),
            year_month = %year_month,
            "fetching station reading"
        );

        let records = self.feed.fetch_month(&year_month)?;
        let selected = reading::select_hour(&records, target).ok_or_else(|| JobError::NoData {
            target_hour: target.to_rfc3339(),
        })?;

        tracing::info!(
            detected_at_utc = %selected.detected_at_utc,
            "reading prepared for upload"
        );

        Ok(run_upload(&mut self.storage, &selected)?)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use chrono::{FixedOffset, TimeZone, Utc};
    use serde_json::{Map, Value, json};

    use crate::adapters::feed::{FeedApi, FeedError};
    use crate::adapters::storage::{Session, StorageApi, StorageError, StoredRecord};
    use crate::domain::upload::{UploadFlowError, UploadOutcome};

    use super::{JobError, RelayJob};

    struct FakeFeed {
        result: RefCell<Option<Result<Vec<Value>, FeedError>>>,
        requested_months: RefCell<Vec<String>>,
    }

    impl FakeFeed {
        fn with_records(records: Vec<Value>) -> Self {
            Self {
                result: RefCell::new(Some(Ok(records))),
                requested_months: RefCell::new(Vec::new()),
            }
        }

        fn unavailable() -> Self {
            Self {
                result: RefCell::new(Some(Err(FeedError::MissingJsonBlock))),
                requested_months: RefCell::new(Vec::new()),
            }
        }
    }

    impl FeedApi for FakeFeed {
        fn fetch_month(&self, year_month: &str) -> Result<Vec<Value>, FeedError> {
            self.requested_months
                .borrow_mut()
                .push(year_month.to_string());
            self.result
                .borrow_mut()
                .take()
                .expect("unexpected fetch_month call")
        }
    }

    struct FakeStorage {
        window: Vec<StoredRecord>,
        list_error: Option<StorageError>,
        created: Vec<Map<String, Value>>,
    }

    impl FakeStorage {
        fn with_window(detected: &[&str]) -> Self {
            Self {
                window: detected
                    .iter()
                    .map(|value| StoredRecord {
                        detected_at_utc: Some((*value).to_string()),
                    })
                    .collect(),
                list_error: None,
                created: Vec::new(),
            }
        }
    }

    impl StorageApi for FakeStorage {
        fn login(&mut self) -> Result<Session, StorageError> {
            Ok(Session {
                cookie: "opaque-session-cookie".to_string(),
                authenticated_at: Utc::now(),
            })
        }

        fn list_latest(&mut self) -> Result<Vec<StoredRecord>, StorageError> {
            match self.list_error.take() {
                Some(error) => Err(error),
                None => Ok(self.window.clone()),
            }
        }

        fn create(&mut self, payload: &Map<String, Value>) -> Result<(), StorageError> {
            self.created.push(payload.clone());
            Ok(())
        }
    }

    fn feed_offset() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).expect("offset should be valid")
    }

    fn month_records() -> Vec<Value> {
        vec![
            json!({"日期時間": "2026/01/07 11:00:00", "PM25": "10.1", "CO2": "410"}),
            json!({"日期時間": "2026/01/07 12:00:00", "PM25": "12.5", "CO2": "NA"}),
            json!({"日期時間": "2026/01/07 13:00:00", "PM25": "14.0", "CO2": "415"}),
        ]
    }

    // 05:10 UTC is 13:10 at the station, so the job targets the 12:00 local hour.
    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 7, 5, 10, 0)
            .single()
            .expect("timestamp should be valid")
    }

    #[test]
    fn uploads_the_previous_hour_reading() {
        let feed = FakeFeed::with_records(month_records());
        let storage = FakeStorage::with_window(&["2026-01-07T03:00:00.000Z"]);
        let mut job = RelayJob::new(feed, storage, feed_offset());

        let outcome = job.execute(now()).expect("job should succeed");

        assert_eq!(outcome, UploadOutcome::Uploaded);
        assert_eq!(
            job.feed.requested_months.borrow().as_slice(),
            ["202601".to_string()]
        );
        assert_eq!(job.storage.created.len(), 1);

        let payload = &job.storage.created[0];
        assert_eq!(payload["detectedAtUtc"], json!("2026-01-07T04:00:00.000Z"));
        assert_eq!(payload["pm_25"], json!(12.5));
        assert_eq!(payload["co2"], Value::Null);
    }

    #[test]
    fn skips_when_the_hour_is_already_stored() {
        let feed = FakeFeed::with_records(month_records());
        let storage = FakeStorage::with_window(&[
            "2026-01-07T05:00:00.000Z",
            "2026-01-07T04:00:00.000Z",
            "2026-01-07T03:00:00.000Z",
        ]);
        let mut job = RelayJob::new(feed, storage, feed_offset());

        let outcome = job.execute(now()).expect("job should complete");

        assert_eq!(outcome, UploadOutcome::Skipped);
        assert!(job.storage.created.is_empty());
    }

    #[test]
    fn missing_target_hour_is_reported_as_station_outage() {
        let feed = FakeFeed::with_records(vec![json!({
            "日期時間": "2026/01/07 09:00:00",
            "PM25": "9.9",
        })]);
        let storage = FakeStorage::with_window(&[]);
        let mut job = RelayJob::new(feed, storage, feed_offset());

        let error = job.execute(now()).expect_err("job should fail");

        assert!(matches!(error, JobError::NoData { .. }));
        assert!(job.storage.created.is_empty());
    }

    #[test]
    fn feed_failure_is_reported_as_unavailable() {
        let feed = FakeFeed::unavailable();
        let storage = FakeStorage::with_window(&[]);
        let mut job = RelayJob::new(feed, storage, feed_offset());

        let error = job.execute(now()).expect_err("job should fail");

        assert!(matches!(
            error,
            JobError::FeedUnavailable(FeedError::MissingJsonBlock)
        ));
    }

    #[test]
    fn upload_flow_failures_surface_through_the_job() {
        let feed = FakeFeed::with_records(month_records());
        let mut storage = FakeStorage::with_window(&[]);
        storage.list_error = Some(StorageError::Schema("rows missing".to_string()));
        let mut job = RelayJob::new(feed, storage, feed_offset());

        let error = job.execute(now()).expect_err("job should fail");

        assert!(matches!(
            error,
            JobError::Upload(UploadFlowError::Query(_))
        ));
    }
}
