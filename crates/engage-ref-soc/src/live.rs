//! Live bindings: tools backed by an authenticated HTTP endpoint.
//!
//! A binding posts the validated arguments as a JSON body and hands the JSON
//! response back as the tool output.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use engage_contracts::error::{EngageError, EngageResult, HandlerError};
use engage_core::traits::ToolHandler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One `[[live]]` entry of the CLI configuration.
///
/// ```toml
/// [[live]]
/// tool = "ticket_create"
/// url = "https://tickets.example.com/api/engage/ticket"
/// token_env = "ENGAGE_TICKETS_TOKEN"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveBinding {
    pub tool: String,
    pub url: String,
    /// Environment variable holding a bearer token, if the endpoint needs one.
    #[serde(default)]
    pub token_env: Option<String>,
}

pub struct HttpToolHandler {
    client: reqwest::Client,
    tool: String,
    url: String,
    token: Option<String>,
}

impl HttpToolHandler {
    pub fn new(tool: impl Into<String>, url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            tool: tool.into(),
            url: url.into(),
            token,
        }
    }

    /// Build a handler from a binding, reading its token from the environment.
    ///
    /// # Errors
    ///
    /// `EngageError::Config` when `token_env` names an unset variable.
    pub fn from_binding(binding: &LiveBinding) -> EngageResult<Self> {
        let token = match &binding.token_env {
            Some(var) => Some(std::env::var(var).map_err(|_| EngageError::Config {
                reason: format!(
                    "live binding for '{}' needs environment variable {}",
                    binding.tool, var
                ),
            })?),
            None => None,
        };
        Ok(Self::new(&binding.tool, &binding.url, token))
    }
}

#[async_trait]
impl ToolHandler for HttpToolHandler {
    async fn invoke(&self, arguments: &Value) -> Result<Value, HandlerError> {
        debug!(tool = %self.tool, url = %self.url, "calling live integration");

        let mut request = self
            .client
            .post(&self.url)
            .timeout(REQUEST_TIMEOUT)
            .json(arguments);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::new(format!("{} is unreachable: {}", self.tool, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(tool = %self.tool, status = %status, "live integration rejected the call");
            return Err(HandlerError::new(format!(
                "{} returned {}: {}",
                self.tool,
                status,
                body.trim()
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| HandlerError::new(format!("{} returned invalid JSON: {}", self.tool, e)))
    }
}
