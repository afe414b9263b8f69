use chrono::FixedOffset;

use crate::app::AppError;

pub const DEFAULT_FEED_BASE_URL: &str = "https://tortoise-fluent-rationally.ngrok-free.app";
pub const DEFAULT_STORAGE_BASE_URL: &str = "https://meteo.local2.tempestdigi.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub account: String,
    pub password: String,
    pub feed_base_url: String,
    pub storage_base_url: String,
    pub http_timeout_secs: u64,
    pub feed_utc_offset: FixedOffset,
    pub dedupe_page_size: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account = required(&lookup, "METEO_ACCOUNT")?;
        let password = required(&lookup, "METEO_PASSWORD")?;

        let offset_hours = parse_or_default(&lookup, "FEED_UTC_OFFSET_HOURS", 8_i32)?;
        let feed_utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::config("FEED_UTC_OFFSET_HOURS must be between -23 and 23")
        })?;

        Ok(Self {
            account,
            password,
            feed_base_url: base_url_or_default(&lookup, "FEED_BASE_URL", DEFAULT_FEED_BASE_URL),
            storage_base_url: base_url_or_default(
                &lookup,
                "STORAGE_BASE_URL",
                DEFAULT_STORAGE_BASE_URL,
            ),
            http_timeout_secs: parse_or_default(&lookup, "HTTP_TIMEOUT_SECS", 20_u64)?,
            feed_utc_offset,
            dedupe_page_size: parse_or_default(&lookup, "DEDUPE_PAGE_SIZE", 24_u32)?,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn base_url_or_default<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}
