//! Outbound HTTP contract (§4.7) for `WEBHOOK_CALL` / `API_INTEGRATION`
//! nodes.
//!
//! Templated request construction is separated from execution so handlers
//! can unit-test the former without a network, and the latter is a thin,
//! mockable trait like `langgraph-core`'s tool-calling boundary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// A request built from a node's config, with `{field}` placeholders
/// already substituted.
#[derive(Clone, Debug)]
pub struct HttpActionRequest {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
    /// Retry once on a network-level failure only; a non-2xx HTTP response
    /// is not retried (§4.7).
    pub retry_on_fail: bool,
}

/// Result surfaced back to the step, per §4.7's
/// `{success, status_code?, body_excerpt?, error?}` contract.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HttpActionResult {
    pub success: bool,
    pub status_code: Option<u16>,
    /// Response body truncated to 1000 characters (§4.7).
    pub body_excerpt: Option<String>,
    pub error: Option<String>,
}

const BODY_EXCERPT_LIMIT: usize = 1000;

fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LIMIT {
        body.to_string()
    } else {
        body.chars().take(BODY_EXCERPT_LIMIT).collect()
    }
}

/// Executes an [`HttpActionRequest`]. Implemented over `reqwest` in
/// production; tests substitute a fake to avoid real network calls, the
/// same seam `langgraph-core`'s tool trait uses for its HTTP tools.
#[async_trait]
pub trait HttpActionExecutor: Send + Sync {
    async fn execute(&self, request: &HttpActionRequest) -> HttpActionResult;
}

/// Default executor backed by a shared `reqwest::Client`.
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        ReqwestExecutor { client }
    }

    async fn attempt(&self, request: &HttpActionRequest) -> Result<(u16, String), String> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| e.to_string())?;
        let mut builder = self.client.request(method, &request.url).timeout(request.timeout);
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

#[async_trait]
impl HttpActionExecutor for ReqwestExecutor {
    async fn execute(&self, request: &HttpActionRequest) -> HttpActionResult {
        let first = self.attempt(request).await;
        let outcome = match first {
            Ok((status, body)) => Ok((status, body)),
            Err(network_err) if request.retry_on_fail => {
                tracing::warn!(url = %request.url, error = %network_err, "http action failed, retrying once");
                self.attempt(request).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok((status, body)) => HttpActionResult {
                success: (200..300).contains(&status),
                status_code: Some(status),
                body_excerpt: Some(excerpt(&body)),
                error: None,
            },
            Err(e) => HttpActionResult {
                success: false,
                status_code: None,
                body_excerpt: None,
                error: Some(e),
            },
        }
    }
}

/// Render `{field}` placeholders in a request body/URL template. §4.7 calls
/// for templating `body`'s string values from `collected_data`; this is
/// the same substitution rule §4.5 defines for message text, so it's
/// reused rather than reimplemented here.
pub fn render_template(template: &str, data: &HashMap<String, crate::validators::FieldValue>) -> String {
    crate::render::substitute(template, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::FieldValue;

    struct FixedExecutor(HttpActionResult);

    #[async_trait]
    impl HttpActionExecutor for FixedExecutor {
        async fn execute(&self, _request: &HttpActionRequest) -> HttpActionResult {
            self.0.clone()
        }
    }

    #[test]
    fn template_substitutes_known_fields() {
        let mut data = HashMap::new();
        data.insert("name".to_string(), FieldValue::String("Ana".to_string()));
        let rendered = render_template("Hello {name}, welcome", &data);
        assert_eq!(rendered, "Hello Ana, welcome");
    }

    #[test]
    fn template_drops_unresolved_placeholder() {
        let data = HashMap::new();
        let rendered = render_template("Hello {name}", &data);
        assert_eq!(rendered, "Hello ");
    }

    #[test]
    fn body_excerpt_truncates_to_limit() {
        let body = "x".repeat(2000);
        let trimmed = excerpt(&body);
        assert_eq!(trimmed.chars().count(), BODY_EXCERPT_LIMIT);
    }

    #[tokio::test]
    async fn fixed_executor_reports_success() {
        let executor = FixedExecutor(HttpActionResult {
            success: true,
            status_code: Some(200),
            body_excerpt: Some("ok".to_string()),
            error: None,
        });
        let request = HttpActionRequest {
            url: "https://example.com".to_string(),
            method: "GET".to_string(),
            headers: HashMap::new(),
            body: None,
            timeout: Duration::from_secs(5),
            retry_on_fail: false,
        };
        let result = executor.execute(&request).await;
        assert!(result.success);
    }
}
