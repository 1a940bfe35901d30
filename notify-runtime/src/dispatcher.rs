//! Routes a rendered message to a named [`Integration`] and performs the
//! outbound HTTP delivery.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use tracing::warn;

use notify_core::Integration;

use crate::error::DispatchError;
use crate::registry::IntegrationRegistry;
use crate::validator::{self, ValidatorOutcome};

/// HTTP client timeout for outbound integration requests.
///
/// The Go original leaves its `http.Client{}` unbounded; a long-lived
/// controller process with an unbounded client is an availability hazard, so
/// this crate sets an explicit default instead of silently inheriting it
/// (see `DESIGN.md`).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolves a named integration and delivers a rendered message to it.
pub struct IntegrationDispatcher {
    integrations: std::sync::Arc<IntegrationRegistry>,
    http: reqwest::Client,
}

impl IntegrationDispatcher {
    pub fn new(integrations: std::sync::Arc<IntegrationRegistry>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("reqwest client with a fixed timeout never fails to build");
        Self { integrations, http }
    }

    /// Only used by tests, to point the dispatcher's HTTP client at a mock
    /// server without touching the timeout default.
    #[cfg(any(test, feature = "test-util"))]
    pub fn with_client(integrations: std::sync::Arc<IntegrationRegistry>, http: reqwest::Client) -> Self {
        Self { integrations, http }
    }

    pub async fn send_message(&self, integration_name: &str, data: &str) -> Result<(), DispatchError> {
        let Some(integration) = self.integrations.get(integration_name) else {
            return Err(DispatchError::NotFound(integration_name.to_string()));
        };

        match integration.spec.type_.as_str() {
            "alertmanager" => {
                // Grounded in the Go original's placeholder `alertmanager.SendMessage`:
                // intentionally inert pending a real Alertmanager API client.
                tracing::info!(integration = integration_name, "alertmanager integration kind is a no-op sender");
                Ok(())
            }
            _ => self.send_webhook(&integration, data).await,
        }
    }

    async fn send_webhook(&self, integration: &Integration, data: &str) -> Result<(), DispatchError> {
        let webhook = &integration.spec.webhook;

        if let Some(name) = webhook.validator.as_deref().filter(|n| !n.is_empty()) {
            match validator::run(name, data)? {
                ValidatorOutcome::Accepted => {}
                ValidatorOutcome::Rejected(hint) => return Err(DispatchError::ValidationFailed(hint)),
            }
        }

        let method = Method::from_bytes(webhook.verb.as_bytes())
            .map_err(|_| DispatchError::InvalidVerb(webhook.verb.clone()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (key, value) in &webhook.headers {
            let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
                warn!(header = key, "skipping header with an invalid name");
                continue;
            };
            let Ok(value) = HeaderValue::from_str(value) else {
                warn!(header = key, "skipping header with an invalid value");
                continue;
            };
            headers.insert(name, value);
        }

        let response = self
            .http
            .request(method, &webhook.url)
            .headers(headers)
            .body(data.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(
                integration = integration.name,
                status = %response.status(),
                "integration endpoint returned a non-2xx status"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use notify_core::{IntegrationSpec, WebhookSpec};
    use wiremock::matchers::{body_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn integration(name: &str, url: &str, validator: Option<&str>) -> Integration {
        Integration {
            name: name.into(),
            spec: IntegrationSpec {
                type_: "webhook".into(),
                webhook: WebhookSpec {
                    url: url.into(),
                    verb: "POST".into(),
                    headers: Default::default(),
                    validator: validator.map(str::to_string),
                },
                ..Default::default()
            },
            status: Default::default(),
        }
    }

    #[tokio::test]
    async fn sends_a_post_with_the_rendered_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/y"))
            .and(body_string("alert:api"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let registry = Arc::new(IntegrationRegistry::new());
        registry.upsert(integration("hook", &format!("{}/y", server.uri()), None));

        let dispatcher = IntegrationDispatcher::new(registry);
        dispatcher.send_message("hook", "alert:api").await.unwrap();
    }

    #[tokio::test]
    async fn unknown_integration_name_is_not_found() {
        let registry = Arc::new(IntegrationRegistry::new());
        let dispatcher = IntegrationDispatcher::new(registry);

        let err = dispatcher.send_message("missing", "x").await.unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn non_2xx_status_is_not_treated_as_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let registry = Arc::new(IntegrationRegistry::new());
        registry.upsert(integration("hook", &server.uri(), None));

        let dispatcher = IntegrationDispatcher::new(registry);
        dispatcher.send_message("hook", "x").await.unwrap();
    }

    #[tokio::test]
    async fn failing_validator_blocks_the_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let registry = Arc::new(IntegrationRegistry::new());
        registry.upsert(integration("hook", &server.uri(), Some("alertmanager")));

        let dispatcher = IntegrationDispatcher::new(registry);
        let err = dispatcher.send_message("hook", r#"[{"labels":{}}]"#).await.unwrap_err();
        assert!(matches!(err, DispatchError::ValidationFailed(hint) if hint.contains("alertname")));
    }
}
