//! Submission collaborator
//!
//! The wizard hands the validated, normalized values to a [`Submitter`]. Any
//! error it returns is treated as retryable: the wizard keeps its values and
//! the saved draft.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::form::FormValues;

/// Successful submission, with a message for the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAck {
    pub message: String,
}

impl SubmitAck {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failed submission
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The backend answered but refused the registration
    #[error("{message}")]
    Rejected {
        status: Option<u16>,
        message: String,
    },
    /// The backend could not be reached
    #[error("network error: {0}")]
    Network(String),
}

impl SubmitError {
    pub fn rejected(message: impl Into<String>) -> Self {
        SubmitError::Rejected {
            status: None,
            message: message.into(),
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::Rejected { message, .. } => message.clone(),
            SubmitError::Network(_) => {
                "Could not reach the server. Your answers are saved; please try again.".to_string()
            }
        }
    }
}

/// Receives a completed registration
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, values: &FormValues) -> Result<SubmitAck, SubmitError>;
}

/// Body shape the backend uses for both success and error replies
#[derive(Debug, Deserialize)]
struct ServerReply {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// POSTs the values as JSON to an HTTP endpoint
pub struct HttpSubmitter {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        use anyhow::Context;

        let client = reqwest::Client::builder()
            .user_agent(concat!("regwiz/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(&self, values: &FormValues) -> Result<SubmitAck, SubmitError> {
        debug!(endpoint = %self.endpoint, fields = values.len(), "Submitting form");

        let response = self
            .client
            .post(&self.endpoint)
            .json(values)
            .send()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SubmitError::Network(e.to_string()))?;
        let reply: Option<ServerReply> = serde_json::from_str(&body).ok();

        if status.is_success() {
            let message = reply
                .and_then(|r| r.message)
                .unwrap_or_else(|| "Registration submitted".to_string());
            Ok(SubmitAck { message })
        } else {
            let message = reply
                .and_then(|r| r.message.or(r.error))
                .unwrap_or_else(|| format!("Submission failed (HTTP {})", status.as_u16()));
            Err(SubmitError::Rejected {
                status: Some(status.as_u16()),
                message,
            })
        }
    }
}

/// Submitter that records every call and replays queued responses.
/// Clones share state. With nothing queued it acknowledges.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubmitter {
    calls: Arc<Mutex<Vec<FormValues>>>,
    responses: Arc<Mutex<VecDeque<Result<SubmitAck, SubmitError>>>>,
}

impl RecordingSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next call
    pub fn respond_with(&self, response: Result<SubmitAck, SubmitError>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    pub fn calls(&self) -> Vec<FormValues> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Submitter for RecordingSubmitter {
    async fn submit(&self, values: &FormValues) -> Result<SubmitAck, SubmitError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(values.clone());
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(SubmitAck::new("Registration received")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FieldKey, FieldValue};

    #[test]
    fn test_user_message() {
        assert_eq!(
            SubmitError::rejected("Email already registered").user_message(),
            "Email already registered"
        );
        assert!(SubmitError::Network("connection refused".to_string())
            .user_message()
            .contains("try again"));
    }

    #[test]
    fn test_display() {
        let err = SubmitError::Network("timeout".to_string());
        assert_eq!(err.to_string(), "network error: timeout");
    }

    #[tokio::test]
    async fn test_recording_submitter_replays_queue() {
        let submitter = RecordingSubmitter::new();
        submitter.respond_with(Err(SubmitError::rejected("busy")));

        let mut values = FormValues::new();
        values.insert(FieldKey::from("name"), FieldValue::text("Ana"));

        assert_eq!(
            submitter.submit(&values).await,
            Err(SubmitError::rejected("busy"))
        );
        assert_eq!(
            submitter.submit(&values).await,
            Ok(SubmitAck::new("Registration received"))
        );
        assert_eq!(submitter.call_count(), 2);
        assert_eq!(submitter.calls()[0], values);
    }

    #[tokio::test]
    async fn test_http_submitter_unreachable_is_network_error() {
        let submitter =
            HttpSubmitter::new("http://127.0.0.1:9/register", Duration::from_secs(2)).unwrap();
        let result = submitter.submit(&FormValues::new()).await;
        assert!(matches!(result, Err(SubmitError::Network(_))));
    }
}
