//! Per-item outcome collection for batch operations.

use serde::Serialize;

use crate::error::CalMcpResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItemResult {
    pub index: usize,
    /// Identifier the caller gave for this item, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub error: String,
}

/// Aggregate report. Item failures never fail the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItemResult>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of the next item; on success the value is the
    /// identifier of the item produced or affected.
    pub fn record(&mut self, id: Option<String>, outcome: CalMcpResult<String>) {
        let index = self.total;
        self.total += 1;

        match outcome {
            Ok(result_id) => {
                self.succeeded += 1;
                self.results.push(BatchItemResult {
                    index,
                    id,
                    success: true,
                    result_id: Some(result_id),
                    error: None,
                });
            }
            Err(err) => {
                self.failed += 1;
                let message = err.to_string();
                tracing::debug!(index, error = %message, "Batch item failed");
                self.failures.push(BatchFailure {
                    index,
                    id: id.clone(),
                    error: message.clone(),
                });
                self.results.push(BatchItemResult {
                    index,
                    id,
                    success: false,
                    result_id: None,
                    error: Some(message),
                });
            }
        }
    }

    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation,
            total = self.total,
            succeeded = self.succeeded,
            failed = self.failed,
            "Batch finished"
        );
    }
}
