//! Spreadsheet service — fetches the generated budget workbook.
//!
//! The payload is opaque binary: this client never inspects it.  Decoding
//! into a displayable grid is the job of [`crate::sheet::decode_workbook`].

use async_trait::async_trait;

use crate::config::ServiceConfig;
use crate::services::ServiceError;

// ---------------------------------------------------------------------------
// SpreadsheetService trait
// ---------------------------------------------------------------------------

/// Async seam for spreadsheet requests.
#[async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Request the budget workbook generated for `prompt`.  Returns the raw
    /// workbook bytes.
    async fn request_spreadsheet(&self, prompt: &str) -> Result<Vec<u8>, ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpSpreadsheetService
// ---------------------------------------------------------------------------

/// Production spreadsheet client.  POSTs to `{base}/api/spreadsheet` and
/// returns the response body verbatim.
pub struct HttpSpreadsheetService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpSpreadsheetService {
    /// Build a client from application config, with the configured timeout.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl SpreadsheetService for HttpSpreadsheetService {
    async fn request_spreadsheet(&self, prompt: &str) -> Result<Vec<u8>, ServiceError> {
        let url = format!("{}/api/spreadsheet", self.config.base_url);

        let body = serde_json::json!({ "prompt": prompt });

        let mut req = self.client.post(&url).json(&body);

        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let message = if message.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                message.trim().to_string()
            };
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }
}

// ---------------------------------------------------------------------------
// MockSpreadsheetService  (test-only)
// ---------------------------------------------------------------------------

/// Test double returning fixed workbook bytes.
#[cfg(test)]
pub struct MockSpreadsheetService {
    response: Result<Vec<u8>, ServiceError>,
    calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSpreadsheetService {
    pub fn ok(bytes: Vec<u8>) -> Self {
        Self {
            response: Ok(bytes),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn err(error: ServiceError) -> Self {
        Self {
            response: Err(error),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SpreadsheetService for MockSpreadsheetService {
    async fn request_spreadsheet(&self, prompt: &str) -> Result<Vec<u8>, ServiceError> {
        self.calls.lock().unwrap().push(prompt.to_string());
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
