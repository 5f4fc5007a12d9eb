//! Completion reporting
//!
//! Turns a terminal [`Outcome`] into the CloudFormation response object and
//! delivers it, either by PUT to the presigned `ResponseURL` or to stdout.

use crate::apigw::http::format_api_error;
use crate::dispatch::Outcome;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

/// Body CloudFormation expects at the response URL
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CompletionResponse {
    pub status: Status,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CompletionResponse {
    /// Build the response for a terminal outcome; `None` for [`Outcome::Deferred`]
    ///
    /// `log_ref` names where the run's logs went and becomes the reason on success.
    pub fn from_outcome(request: &ChangeRequest, outcome: &Outcome, log_ref: &str) -> Option<Self> {
        let (status, reason, data) = match outcome {
            Outcome::Success { data } => (
                Status::Success,
                format!("See the details in {}", log_ref),
                Some(data.clone()),
            ),
            Outcome::Failure { error } => (Status::Failed, failure_reason(error), None),
            Outcome::Deferred { .. } => return None,
        };

        Some(Self {
            status,
            reason,
            physical_resource_id: request.physical_id.clone(),
            stack_id: request.stack_id.clone(),
            request_id: request.request_id.clone(),
            logical_resource_id: request.logical_resource_id.clone(),
            data,
        })
    }
}

fn failure_reason(error: &ProvisionError) -> String {
    match error {
        ProvisionError::Provisioning(api) => format_api_error(api),
        other => other.to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("request has no ResponseURL")]
    MissingResponseUrl,
    #[error("invalid ResponseURL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to send completion: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion rejected with status {status}")]
    Rejected { status: u16 },
    #[error("failed to encode completion: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write completion: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination of completion responses
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn send(
        &self,
        request: &ChangeRequest,
        response: &CompletionResponse,
    ) -> Result<(), ReportError>;
}

/// PUTs the completion to the request's presigned `ResponseURL`
#[derive(Clone, Default)]
pub struct HttpReporter {
    client: Client,
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn send(
        &self,
        request: &ChangeRequest,
        response: &CompletionResponse,
    ) -> Result<(), ReportError> {
        let raw = request
            .response_url
            .as_deref()
            .ok_or(ReportError::MissingResponseUrl)?;
        let url = url::Url::parse(raw)?;
        let body = serde_json::to_vec(response)?;

        tracing::debug!(
            "Reporting {:?} for {} to {}",
            response.status,
            response.physical_resource_id,
            url.host_str().unwrap_or_default()
        );

        // The presigned URL is signed for an empty content type
        let sent = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, "")
            .body(body)
            .send()
            .await?;

        let status = sent.status();
        if !status.is_success() {
            tracing::error!("Completion rejected: {}", status);
            return Err(ReportError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Prints the completion as pretty JSON, for dry runs
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter;

#[async_trait]
impl Reporter for StdoutReporter {
    async fn send(
        &self,
        _request: &ChangeRequest,
        response: &CompletionResponse,
    ) -> Result<(), ReportError> {
        let body = serde_json::to_string_pretty(response)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", body)?;
        Ok(())
    }
}
