use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

pub trait FeedApi {
    fn fetch_month(&self, year_month: &str) -> Result<Vec<Value>, FeedError>;
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("feed returned status {status}")]
    Status { status: u16 },
    #[error("no <pre> json block found in feed document")]
    MissingJsonBlock,
    #[error("failed to parse feed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feed document is not a json array")]
    NotAnArray,
}

// The feed serves the monthly JSON array wrapped in an HTML <pre> block with
// entity-escaped content.
#[derive(Debug, Clone)]
pub struct HttpFeedApi {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpFeedApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl FeedApi for HttpFeedApi {
    fn fetch_month(&self, year_month: &str) -> Result<Vec<Value>, FeedError> {
        let url = format!("{}/api/60min/json/{year_month}", self.base_url);
        let response = self.client.get(&url).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text()?;
        let json = extract_pre_json(&body).ok_or(FeedError::MissingJsonBlock)?;
        let document: Value = serde_json::from_str(&json)?;

        match document {
            Value::Array(records) => Ok(records),
            _ => Err(FeedError::NotAnArray),
        }
    }
}

pub fn extract_pre_json(document: &str) -> Option<String> {
    let start = document.find("<pre>")? + "<pre>".len();
    let end = document[start..].find("</pre>")? + start;
    Some(unescape_entities(document[start..end].trim()))
}

fn unescape_entities(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(index) = rest.find('&') {
        output.push_str(&rest[..index]);
        rest = &rest[index..];
        match decode_entity(rest) {
            Some((decoded, consumed)) => {
                output.push(decoded);
                rest = &rest[consumed..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }

    output.push_str(rest);
    output
}

fn decode_entity(text: &str) -> Option<(char, usize)> {
    let end = text.find(';')?;
    let entity = &text[1..end];

    let decoded = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))?;
            char::from_u32(code)?
        }
    };

    Some((decoded, end + 1))
}
