mod config;
mod error;
mod logging;
pub mod runtime;

pub use error::AppError;

use std::time::Duration;

use chrono::Utc;

use crate::adapters::feed::HttpFeedApi;
use crate::adapters::storage::HttpStorageApi;
use crate::domain::upload::UploadOutcome;

pub fn run() -> Result<UploadOutcome, AppError> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let config = config::AppConfig::from_env()?;

    tracing::info!(
        feed_base_url = %config.feed_base_url,
        storage_base_url = %config.storage_base_url,
        http_timeout_secs = config.http_timeout_secs,
        feed_utc_offset = %config.feed_utc_offset,
        dedupe_page_size = config.dedupe_page_size,
        "hourly uplink starting"
    );

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let feed = HttpFeedApi::new(&config.feed_base_url, timeout).map_err(AppError::http_client)?;
    let storage = HttpStorageApi::new(
        &config.storage_base_url,
        &config.account,
        &config.password,
        timeout,
        config.dedupe_page_size,
    )
    .map_err(AppError::http_client)?;

    let mut job = runtime::RelayJob::new(feed, storage, config.feed_utc_offset);
    let outcome = job.execute(Utc::now())?;

    Ok(outcome)
}
