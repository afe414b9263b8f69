use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const SESSION_COOKIE_NAME: &str = ".AspNetCore.Cookies";

const LOGIN_PATH: &str = "/api/Account/login";
const LIST_PATH: &str = "/api/AirQuality/list";
const CREATE_PATH: &str = "/api/AirQuality";
const ERROR_BODY_LIMIT: usize = 300;

pub trait StorageApi {
    fn login(&mut self) -> Result<Session, StorageError>;
    fn list_latest(&mut self) -> Result<Vec<StoredRecord>, StorageError>;
    fn create(&mut self, payload: &Map<String, Value>) -> Result<(), StorageError>;
}

#[derive(Debug, Clone)]
pub struct Session {
    pub cookie: String,
    pub authenticated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRecord {
    #[serde(default)]
    pub detected_at_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    rows: Vec<StoredRecord>,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage api rejected the session (status {status})")]
    Unauthorized { status: u16 },
    #[error("login failed (status {status}): {body}")]
    LoginRejected { status: u16, body: String },
    #[error("login succeeded but the .AspNetCore.Cookies session cookie was not set")]
    SessionCookieMissing,
    #[error("storage api returned status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("storage api transport failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("storage api response schema unexpected: {0}")]
    Schema(String),
}

pub struct HttpStorageApi {
    client: reqwest::blocking::Client,
    base_url: String,
    account: String,
    password: String,
    page_size: u32,
}

impl HttpStorageApi {
    pub fn new(
        base_url: &str,
        account: &str,
        password: &str,
        timeout: Duration,
        page_size: u32,
    ) -> Result<Self, StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account: account.to_string(),
            password: password.to_string(),
            page_size,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl StorageApi for HttpStorageApi {
    fn login(&mut self) -> Result<Session, StorageError> {
        let response = self
            .client
            .post(self.endpoint(LOGIN_PATH))
            .json(&json!({ "account": self.account, "password": self.password }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::LoginRejected {
                status: status.as_u16(),
                body: truncate_body(response.text().unwrap_or_default()),
            });
        }

        let cookie = response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
            .map(|cookie| cookie.value().to_string())
            .ok_or(StorageError::SessionCookieMissing)?;

        Ok(Session {
            cookie,
            authenticated_at: Utc::now(),
        })
    }

    fn list_latest(&mut self) -> Result<Vec<StoredRecord>, StorageError> {
        let query = json!({
            "page": 0,
            "pageSize": self.page_size,
            "sortModel": { "items": [{ "field": "DetectedAtUtc", "sort": "desc" }] },
            "filterModel": { "items": [] },
        });

        let response = self
            .client
            .post(self.endpoint(LIST_PATH))
            .json(&query)
            .send()?;

        let status = response.status();
        if is_unauthorized(status) {
            return Err(StorageError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(StorageError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_body(response.text().unwrap_or_default()),
            });
        }

        let text = response.text()?;
        match serde_json::from_str::<ListResponse>(&text) {
            Ok(list) => Ok(list.rows),
            Err(error) => Err(StorageError::Schema(format!(
                "{error} | body: {}",
                truncate_body(text)
            ))),
        }
    }

    fn create(&mut self, payload: &Map<String, Value>) -> Result<(), StorageError> {
        let response = self
            .client
            .post(self.endpoint(CREATE_PATH))
            .json(payload)
            .send()?;

        let status = response.status();
        if is_unauthorized(status) {
            return Err(StorageError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(StorageError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_body(response.text().unwrap_or_default()),
            });
        }

        Ok(())
    }
}

fn is_unauthorized(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 401 | 403)
}

fn truncate_body(body: String) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }

    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
