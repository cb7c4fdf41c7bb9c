//! Submission dispatcher
//!
//! Each extract row becomes one JSON POST to the downstream endpoint. Rows of
//! a file are submitted one after another in file order; a row that still
//! fails after its retries is logged in full and the next row goes out.

use crate::error::{error_chain, SubmitError};
use crate::models::ExtractRow;
use crate::retry::{retry_linear, RetryPolicy};
use async_trait::async_trait;
use dpx_common::config::SubmissionConfig;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Body of one submission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionPayload {
    #[serde(rename = "Accountingdocument")]
    pub accounting_document: String,
    #[serde(rename = "SFID_I")]
    pub correlation_id: String,
    #[serde(rename = "Customer")]
    pub customer: String,
    #[serde(rename = "SalesDocument")]
    pub sales_document: String,
    #[serde(rename = "SalesDocumentItem")]
    pub sales_document_item: String,
    #[serde(rename = "Companycode")]
    pub company_code: String,
    #[serde(rename = "Fiscalyear")]
    pub fiscal_year: String,
}

impl From<&ExtractRow> for SubmissionPayload {
    fn from(row: &ExtractRow) -> Self {
        Self {
            accounting_document: row.accounting_document.clone(),
            correlation_id: row.correlation_id.clone(),
            customer: row.customer.clone(),
            sales_document: row.sales_order.clone(),
            sales_document_item: row.sales_order_item.clone(),
            company_code: row.company_code.clone(),
            fiscal_year: row.fiscal_year.clone(),
        }
    }
}

/// Downstream submission seam
#[async_trait]
pub trait Submit: Send + Sync {
    /// Endpoint the payloads go to (for diagnostics)
    fn target(&self) -> &str;

    /// Submit one payload, retries included
    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmitError>;
}

/// [`Submit`] over HTTP POST with basic auth
pub struct HttpSubmitter {
    http_client: Client,
    url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
}

impl HttpSubmitter {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, SubmitError> {
        let url = url.into();
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SubmitError::from_reqwest(&url, e))?;

        Ok(Self {
            http_client,
            url,
            username: username.into(),
            password: password.into(),
            retry,
        })
    }

    pub fn from_config(config: &SubmissionConfig) -> Result<Self, SubmitError> {
        Self::new(
            config.url.clone(),
            config.username.clone(),
            config.password.clone(),
            config.timeout(),
            RetryPolicy::new(config.max_retries, Duration::from_millis(config.base_delay_ms)),
        )
    }

    async fn post_once(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        let body = serde_json::to_vec(payload).map_err(|e| SubmitError::Encode(e.to_string()))?;

        let response = self
            .http_client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::from_reqwest(&self.url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let headers = render_headers(response.headers());
        let body = response.text().await.unwrap_or_default();
        Err(SubmitError::Status {
            url: self.url.clone(),
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Submit for HttpSubmitter {
    fn target(&self) -> &str {
        &self.url
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        retry_linear("row submission", &self.retry, SubmitError::is_retriable, || {
            self.post_once(payload)
        })
        .await
    }
}

fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("<binary>")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Per-file submission tally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn any_succeeded(&self) -> bool {
        self.succeeded > 0
    }
}

/// Submits the rows of one extract file
pub struct Dispatcher<S> {
    submitter: S,
}

impl<S: Submit> Dispatcher<S> {
    pub fn new(submitter: S) -> Self {
        Self { submitter }
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Submit every row in order; failures never stop the file
    pub async fn dispatch_file(&self, path: &Path, rows: &[ExtractRow]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, row) in rows.iter().enumerate() {
            let payload = SubmissionPayload::from(row);
            report.attempted += 1;

            match self.submitter.submit(&payload).await {
                Ok(()) => {
                    report.succeeded += 1;
                    tracing::debug!(
                        file = %path.display(),
                        row = index + 1,
                        accounting_document = %payload.accounting_document,
                        "Row submitted"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    self.log_failure(path, index + 1, &payload, &e);
                }
            }
        }

        tracing::info!(
            file = %path.display(),
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "File dispatched"
        );
        report
    }

    fn log_failure(&self, path: &Path, row: usize, payload: &SubmissionPayload, err: &SubmitError) {
        let payload_json =
            serde_json::to_string(payload).unwrap_or_else(|e| format!("<unencodable: {}>", e));

        match err {
            SubmitError::Status {
                url,
                status,
                headers,
                body,
            } => tracing::error!(
                file = %path.display(),
                row,
                url = %url,
                payload = %payload_json,
                status,
                headers = %headers,
                body = %body,
                "Row submission failed"
            ),
            SubmitError::Transport { url, timeout, .. } => tracing::error!(
                file = %path.display(),
                row,
                url = %url,
                payload = %payload_json,
                timeout,
                error = %error_chain(err),
                "Row submission failed"
            ),
            SubmitError::Encode(_) => tracing::error!(
                file = %path.display(),
                row,
                url = %self.submitter.target(),
                payload = %payload_json,
                error = %error_chain(err),
                "Row submission failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Scripted {
        outcomes: Mutex<Vec<bool>>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Submit for Scripted {
        fn target(&self) -> &str {
            "memory://submit"
        }

        async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
            self.seen.lock().unwrap().push(payload.sales_document.clone());
            if self.outcomes.lock().unwrap().remove(0) {
                Ok(())
            } else {
                Err(SubmitError::Status {
                    url: "memory://submit".to_string(),
                    status: 400,
                    headers: String::new(),
                    body: "rejected".to_string(),
                })
            }
        }
    }

    fn row(so: &str) -> ExtractRow {
        ExtractRow::from_fields([so, "10", "SF-1", "C1", "A1", "1000", "2024"])
    }

    #[test]
    fn test_payload_field_names() {
        let payload = SubmissionPayload::from(&row("500"));
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "Accountingdocument": "A1",
                "SFID_I": "SF-1",
                "Customer": "C1",
                "SalesDocument": "500",
                "SalesDocumentItem": "10",
                "Companycode": "1000",
                "Fiscalyear": "2024"
            })
        );
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_file() {
        let dispatcher = Dispatcher::new(Scripted {
            outcomes: Mutex::new(vec![false, true, false]),
            seen: Mutex::new(Vec::new()),
        });

        let report = dispatcher
            .dispatch_file(Path::new("x.csv"), &[row("500"), row("501"), row("502")])
            .await;

        assert_eq!(
            report,
            DispatchReport {
                attempted: 3,
                succeeded: 1,
                failed: 2
            }
        );
        assert!(report.any_succeeded());
        assert_eq!(*dispatcher.submitter().seen.lock().unwrap(), vec!["500", "501", "502"]);
    }
}
