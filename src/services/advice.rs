//! Advice service — turns a budget description into financial advice.
//!
//! [`HttpAdviceService`] posts the user's prompt to `{base}/api/advice` and
//! deserializes the response into the declared [`FinancialAdvice`] schema.
//! All connection details come from [`crate::config::ServiceConfig`];
//! nothing is hardcoded.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ServiceConfig;
use crate::services::ServiceError;

// ---------------------------------------------------------------------------
// FinancialAdvice
// ---------------------------------------------------------------------------

/// Successful advice response.
///
/// This is the wire schema: both fields are required, and a response missing
/// either fails with [`ServiceError::Schema`] before reaching the UI.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FinancialAdvice {
    /// Free-form advice text.
    pub advice: String,
    /// Short summary of the generated budget.
    #[serde(rename = "budgetSummary")]
    pub budget_summary: String,
}

// ---------------------------------------------------------------------------
// AdviceService trait
// ---------------------------------------------------------------------------

/// Async seam for advice requests.
///
/// Implementors must be `Send + Sync` so they can be shared across tasks
/// behind an `Arc<dyn AdviceService>`.
#[async_trait]
pub trait AdviceService: Send + Sync {
    /// Request advice for `prompt`.  `from_voice` records whether the text
    /// originated from voice capture.
    async fn request_advice(
        &self,
        prompt: &str,
        from_voice: bool,
    ) -> Result<FinancialAdvice, ServiceError>;
}

// ---------------------------------------------------------------------------
// HttpAdviceService
// ---------------------------------------------------------------------------

/// Production advice client.
pub struct HttpAdviceService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpAdviceService {
    /// Build a client from application config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails.
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

    /// Validate a raw response body against the advice schema.
    ///
    /// Split out from the transport so schema handling is testable without
    /// a live server.
    pub fn parse_body(body: &[u8]) -> Result<FinancialAdvice, ServiceError> {
        serde_json::from_slice(body).map_err(|e| ServiceError::Schema(e.to_string()))
    }
}

#[async_trait]
impl AdviceService for HttpAdviceService {
    /// POST the prompt to the configured endpoint.
    ///
    /// The `Authorization: Bearer …` header is attached **only** when
    /// `config.api_key` is `Some(key)` and `key` is non-empty.
    async fn request_advice(
        &self,
        prompt: &str,
        from_voice: bool,
    ) -> Result<FinancialAdvice, ServiceError> {
        let url = format!("{}/api/advice", self.config.base_url);

        let body = serde_json::json!({
            "prompt": prompt,
            "fromVoice": from_voice,
        });

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
        Self::parse_body(&bytes)
    }
}

// ---------------------------------------------------------------------------
// MockAdviceService  (test-only)
// ---------------------------------------------------------------------------

/// Test double that records every request and returns a fixed response.
#[cfg(test)]
pub struct MockAdviceService {
    response: Result<FinancialAdvice, ServiceError>,
    calls: std::sync::Mutex<Vec<(String, bool)>>,
}

#[cfg(test)]
impl MockAdviceService {
    pub fn ok(advice: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            response: Ok(FinancialAdvice {
                advice: advice.into(),
                budget_summary: summary.into(),
            }),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn err(error: ServiceError) -> Self {
        Self {
            response: Err(error),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Every `(prompt, from_voice)` pair received so far.
    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl AdviceService for MockAdviceService {
    async fn request_advice(
        &self,
        prompt: &str,
        from_voice: bool,
    ) -> Result<FinancialAdvice, ServiceError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), from_voice));
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn make_config(api_key: Option<&str>) -> ServiceConfig {
        ServiceConfig {
            base_url: "http://localhost:8080".into(),
            api_key: api_key.map(|s| s.to_string()),
            timeout_secs: 5,
        }
    }

    #[test]
    fn from_config_builds_without_panic() {
        let _service = HttpAdviceService::from_config(&make_config(None));
        let _service = HttpAdviceService::from_config(&make_config(Some("")));
        let _service = HttpAdviceService::from_config(&make_config(Some("sk-test-1234")));
    }

    #[test]
    fn parse_valid_body() {
        let body = br#"{
            "advice": "Reduce discretionary spending by 5-10%.",
            "budgetSummary": "Income $5000, expenses $3500, savings $1500."
        }"#;

        let advice = HttpAdviceService::parse_body(body).unwrap();
        assert_eq!(advice.advice, "Reduce discretionary spending by 5-10%.");
        assert!(advice.budget_summary.starts_with("Income $5000"));
    }

    #[test]
    fn parse_tolerates_extra_fields() {
        let body = br#"{
            "id": "advice-17",
            "createdAt": "2024-05-01T00:00:00Z",
            "advice": "Build an emergency fund.",
            "budgetSummary": "ok"
        }"#;

        let advice = HttpAdviceService::parse_body(body).unwrap();
        assert_eq!(advice.advice, "Build an emergency fund.");
    }

    #[test]
    fn parse_missing_field_is_schema_error() {
        let body = br#"{ "advice": "only advice, no summary" }"#;
        let err = HttpAdviceService::parse_body(body).unwrap_err();
        assert!(matches!(err, ServiceError::Schema(_)));
    }

    #[test]
    fn parse_mistyped_field_is_schema_error() {
        let body = br#"{ "advice": 42, "budgetSummary": "x" }"#;
        let err = HttpAdviceService::parse_body(body).unwrap_err();
        assert!(matches!(err, ServiceError::Schema(_)));
    }

    #[test]
    fn parse_non_json_is_schema_error() {
        let err = HttpAdviceService::parse_body(b"<html>502</html>").unwrap_err();
        assert!(matches!(err, ServiceError::Schema(_)));
    }

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockAdviceService::ok("a", "b");
        let _ = mock.request_advice("I earn $5000 monthly", true).await;

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "I earn $5000 monthly");
        assert!(calls[0].1);
    }

    /// Verify that `HttpAdviceService` is object-safe.
    #[test]
    fn service_is_object_safe() {
        let service: Box<dyn AdviceService> =
            Box::new(HttpAdviceService::from_config(&make_config(None)));
        drop(service);
    }
}
