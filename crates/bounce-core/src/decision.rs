//! Decision Service collaborator.
//!
//! The decision service is external: it weighs a user's stated reason for
//! visiting a blocked domain and answers with a verdict. The relay always
//! answers with a verdict-shaped body -- its own failures arrive as denials
//! with an explanatory `response` -- so the client parses the body
//! regardless of HTTP status. The core engine never calls this; hosts wire
//! an approval ahead of `REQUEST_TEMP_ACCESS` themselves.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::DecisionError;
use crate::storage::Task;

/// What the caller sends for judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub target_domain: String,
    pub user_message: String,
    /// The primary task the user should be working on, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,
    /// Every task selected for the session.
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// The verdict: grant or deny, with optional commentary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionVerdict {
    pub grant_access: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// HTTP client for the relay's decision endpoint.
pub struct DecisionClient {
    endpoint: Url,
    client: reqwest::Client,
}

impl DecisionClient {
    pub fn new(endpoint: &str) -> Result<Self, DecisionError> {
        let endpoint = Url::parse(endpoint).map_err(|e| DecisionError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    /// POST the request and parse the verdict from the body.
    pub async fn decide(&self, request: &DecisionRequest) -> Result<DecisionVerdict, DecisionError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| DecisionError::MalformedPayload(e.to_string()))
    }
}
