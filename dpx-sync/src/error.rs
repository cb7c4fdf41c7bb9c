//! Error types for dpx-sync
//!
//! Layered the same way the pipeline is:
//! - [`FetchError`] for collection reads (transport, status, envelope shape)
//! - [`SubmitError`] for downstream submissions, carrying the diagnostic detail
//!   that gets logged when a row finally fails
//! - [`SyncError`] for everything a stage or run can surface

use thiserror::Error;

/// Collection read failure
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS or TLS failure
    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Request exceeded its timeout
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// Non-success HTTP status
    #[error("API error {status} for {url}: {body}")]
    Api { url: String, status: u16, body: String },

    /// Body did not match either paging envelope
    #[error("Parse error for {url}: {message}")]
    Parse { url: String, message: String },

    /// Collection path or continuation link could not be resolved
    #[error("Invalid URL '{0}'")]
    InvalidUrl(String),
}

impl FetchError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: error_chain(&err),
            }
        }
    }

    /// Transport problems, throttling and server faults are worth another attempt
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Timeout { .. } => true,
            FetchError::Api { status, .. } => *status == 429 || *status >= 500,
            FetchError::Parse { .. } | FetchError::InvalidUrl(_) => false,
        }
    }
}

/// Downstream submission failure
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Request never produced a response
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        timeout: bool,
    },

    /// Endpoint answered with a non-success status
    #[error("Submission rejected with status {status} by {url}: {body}")]
    Status {
        url: String,
        status: u16,
        headers: String,
        body: String,
    },

    /// Payload could not be encoded
    #[error("Payload encoding failed: {0}")]
    Encode(String),
}

impl SubmitError {
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        SubmitError::Transport {
            url: url.to_string(),
            timeout: err.is_timeout(),
            message: error_chain(&err),
        }
    }

    /// 4xx other than 429 will not change on retry
    pub fn is_retriable(&self) -> bool {
        match self {
            SubmitError::Transport { .. } => true,
            SubmitError::Status { status, .. } => *status == 429 || *status >= 500,
            SubmitError::Encode(_) => false,
        }
    }
}

/// Render an error with its full `source()` chain
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Stage or run failure
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Submission failed: {0}")]
    Submit(#[from] SubmitError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extract file error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Common error: {0}")]
    Common(#[from] dpx_common::Error),

    /// Work unit could not be admitted to its pool
    #[error("Task pool error: {0}")]
    Pool(String),
}

/// Result type for dpx-sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
