//! Remote AI-answer service client.
//!
//! Answer generation happens on a remote HTTP service, not over the
//! session socket. This is the one call in the crate whose failure
//! propagates to the caller — everything on the socket path is
//! fire-and-forget.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors from the assistant service.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// The base URL is not usable.
    #[error("invalid assistant base URL: {0}")]
    InvalidBaseUrl(String),

    /// The HTTP request failed or returned a non-success status.
    #[error("assistant request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest<'a> {
    message: &'a str,
    user_id: &'a str,
    group_id: &'a str,
}

/// An answer from the assistant service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantAnswer {
    /// The generated answer text.
    pub response: String,
}

/// HTTP client for the remote assistant.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssistantClient {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::InvalidBaseUrl`] for an unparsable URL and
    /// [`AssistantError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AssistantError> {
        let base_url = base_url.into();
        url::Url::parse(&base_url)
            .map_err(|e| AssistantError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Asks the assistant for an answer in the context of a group.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Http`] on transport failure, a non-success
    /// status, or a malformed response body.
    pub async fn ask(
        &self,
        message: &str,
        user_id: &str,
        group_id: &str,
    ) -> Result<AssistantAnswer, AssistantError> {
        let request = AskRequest {
            message,
            user_id,
            group_id,
        };
        let response = self
            .http
            .post(format!("{}/ask", self.base_url))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
