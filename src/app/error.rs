use thiserror::Error;

use crate::app::runtime::JobError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to build http client: {0}")]
    HttpClient(String),
    #[error(transparent)]
    Job(#[from] JobError),
}

impl AppError {
    pub fn logging_init<E: std::fmt::Display>(error: E) -> Self {
        Self::LoggingInit(error.to_string())
    }

    pub fn config<E: std::fmt::Display>(error: E) -> Self {
        Self::Config(error.to_string())
    }

    pub fn http_client<E: std::fmt::Display>(error: E) -> Self {
        Self::HttpClient(error.to_string())
    }
}
