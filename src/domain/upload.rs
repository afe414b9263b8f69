use thiserror::Error;

use crate::adapters::storage::{StorageApi, StorageError, StoredRecord};
use crate::domain::reading::{Reading, normalize_detected_at};
use crate::domain::validation::{ValidationError, validate_payload};

// Two login attempts total: the initial one plus the single reauth retry.
const MAX_LOGIN_ATTEMPTS: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded,
    Skipped,
}

#[derive(Debug, Error)]
pub enum UploadFlowError {
    #[error("reading failed validation: {0}")]
    Validation(#[from] ValidationError),
    #[error("authentication failed: {0}")]
    Auth(#[source] StorageError),
    #[error("dedupe query failed: {0}")]
    Query(#[source] StorageError),
    #[error("upload failed: {0}")]
    Upload(#[source] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadState {
    Start,
    LoggingIn { attempt: u8 },
    CheckingDuplicate { attempt: u8 },
    Submitting { attempt: u8 },
}

pub fn run_upload<S: StorageApi>(
    storage: &mut S,
    reading: &Reading,
) -> Result<UploadOutcome, UploadFlowError> {
    let payload = reading.payload();
    let candidate = normalize_detected_at(&reading.detected_at_utc)
        .unwrap_or_else(|| reading.detected_at_utc.trim().to_string());

    let mut state = UploadState::Start;
    loop {
        state = match state {
            UploadState::Start => {
                validate_payload(&payload)?;
                UploadState::LoggingIn { attempt: 1 }
            }
            UploadState::LoggingIn { attempt } => {
                let session = storage.login().map_err(UploadFlowError::Auth)?;
                tracing::info!(
                    attempt,
                    authenticated_at = %session.authenticated_at,
                    "storage login succeeded"
                );
                UploadState::CheckingDuplicate { attempt }
            }
            UploadState::CheckingDuplicate { attempt } => match storage.list_latest() {
                Ok(window) => {
                    if window_contains(&window, &candidate) {
                        tracing::info!(
                            detected_at_utc = %candidate,
                            checked_latest = window.len(),
                            "duplicate reading already stored, skipping upload"
                        );
                        return Ok(UploadOutcome::Skipped);
                    }
                    UploadState::Submitting { attempt }
                }
                Err(StorageError::Unauthorized { status }) if attempt < MAX_LOGIN_ATTEMPTS => {
                    tracing::warn!(status, "dedupe query rejected, re-authenticating once");
                    UploadState::LoggingIn {
                        attempt: attempt + 1,
                    }
                }
                Err(error @ StorageError::Unauthorized { .. }) => {
                    return Err(UploadFlowError::Auth(error));
                }
                Err(error) => return Err(UploadFlowError::Query(error)),
            },
            UploadState::Submitting { attempt } => match storage.create(&payload) {
                Ok(()) => {
                    tracing::info!(detected_at_utc = %candidate, "reading uploaded");
                    return Ok(UploadOutcome::Uploaded);
                }
                Err(StorageError::Unauthorized { status }) if attempt < MAX_LOGIN_ATTEMPTS => {
                    tracing::warn!(status, "upload rejected, re-authenticating once");
                    UploadState::LoggingIn {
                        attempt: attempt + 1,
                    }
                }
                Err(error) => return Err(UploadFlowError::Upload(error)),
            },
        };
    }
}

pub fn window_contains(window: &[StoredRecord], candidate: &str) -> bool {
    window
        .iter()
        .filter_map(|record| record.detected_at_utc.as_deref())
        .filter_map(normalize_detected_at)
        .any(|normalized| normalized == candidate)
}
