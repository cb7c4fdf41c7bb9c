//! Scripted [`Submit`] implementation

use async_trait::async_trait;
use dpx_sync::dispatch::{Submit, SubmissionPayload};
use dpx_sync::error::SubmitError;
use std::collections::HashSet;
use std::sync::Mutex;

/// Accepts every payload except those whose sales document is rejected
#[derive(Default)]
pub struct RecordingSubmitter {
    rejected: HashSet<String>,
    pub accepted: Mutex<Vec<SubmissionPayload>>,
    pub attempts: Mutex<Vec<String>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(sales_documents: &[&str]) -> Self {
        Self {
            rejected: sales_documents.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().unwrap().len()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

#[async_trait]
impl Submit for RecordingSubmitter {
    fn target(&self) -> &str {
        "memory://submissions"
    }

    async fn submit(&self, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        self.attempts.lock().unwrap().push(payload.sales_document.clone());
        if self.rejected.contains(&payload.sales_document) {
            return Err(SubmitError::Status {
                url: self.target().to_string(),
                status: 422,
                headers: String::new(),
                body: "rejected".to_string(),
            });
        }
        self.accepted.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
