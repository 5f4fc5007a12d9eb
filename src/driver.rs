//! Outermost driver
//!
//! The only place that waits. It processes a change request, sleeps and
//! replays the same request while the dispatcher defers it, then reports the
//! terminal outcome.

use crate::dispatch::{Dispatcher, Outcome};
use crate::error::ProvisionError;
use crate::event::{ChangeRequest, CloudFormationEvent, RequestType};
use crate::resource::HandlerSet;
use crate::response::{CompletionResponse, ReportError, Reporter};
use crate::tracker::ResourceTracker;
use serde_json::json;

/// Reschedules allowed before a rate-limited request is reported as failed
pub const DEFAULT_MAX_RESCHEDULES: u32 = 10;

pub struct Driver<H, T, R> {
    dispatcher: Dispatcher<H, T>,
    reporter: R,
    max_reschedules: u32,
    log_ref: String,
}

impl<H: HandlerSet, T: ResourceTracker, R: Reporter> Driver<H, T, R> {
    pub fn new(dispatcher: Dispatcher<H, T>, reporter: R) -> Self {
        Self {
            dispatcher,
            reporter,
            max_reschedules: DEFAULT_MAX_RESCHEDULES,
            log_ref: "stderr".to_string(),
        }
    }

    pub fn with_max_reschedules(mut self, max_reschedules: u32) -> Self {
        self.max_reschedules = max_reschedules;
        self
    }

    /// Where this run's logs go, quoted in successful completions
    pub fn with_log_ref(mut self, log_ref: impl Into<String>) -> Self {
        self.log_ref = log_ref.into();
        self
    }

    /// Drive `request` to a terminal outcome, without reporting it
    pub async fn settle(&self, request: &ChangeRequest) -> Outcome {
        tracing::info!("Received {}", request.redacted());

        let mut reschedules = 0;
        loop {
            match self.dispatcher.process(request).await {
                Outcome::Deferred { delay } => {
                    if reschedules >= self.max_reschedules {
                        tracing::error!(
                            "{} still rate limited after {} reschedules",
                            request.physical_id,
                            reschedules
                        );
                        return Outcome::Failure {
                            error: ProvisionError::RescheduleLimit {
                                attempts: reschedules + 1,
                            },
                        };
                    }
                    reschedules += 1;
                    tracing::info!(
                        "Rescheduling {} in {}s (attempt {})",
                        request.physical_id,
                        delay.as_secs(),
                        reschedules
                    );
                    tokio::time::sleep(delay).await;
                }
                terminal => return terminal,
            }
        }
    }

    /// Drive `request` to a terminal outcome and report it
    pub async fn run(&self, request: &ChangeRequest) -> Result<Outcome, ReportError> {
        let outcome = self.settle(request).await;
        self.report(request, outcome).await
    }

    /// Convert a raw event and run it, reporting even when conversion fails
    ///
    /// An event that cannot become a request still gets a completion: a
    /// Delete succeeds so a teardown is never blocked, anything else fails
    /// with the conversion error.
    pub async fn run_event(&self, event: CloudFormationEvent) -> Result<Outcome, ReportError> {
        let unresolved = ChangeRequest::unresolved(&event);
        let error = match ChangeRequest::from_event(event) {
            Ok(request) => return self.run(&request).await,
            Err(error) => error,
        };

        tracing::warn!("Unusable event for {}: {}", unresolved.physical_id, error);
        let outcome = if unresolved.request_type == RequestType::Delete {
            Outcome::Success { data: json!({}) }
        } else {
            Outcome::Failure {
                error: error.into(),
            }
        };
        self.report(&unresolved, outcome).await
    }

    async fn report(&self, request: &ChangeRequest, outcome: Outcome) -> Result<Outcome, ReportError> {
        if let Some(response) = CompletionResponse::from_outcome(request, &outcome, &self.log_ref) {
            match &outcome {
                Outcome::Failure { error } => tracing::error!(
                    "{} {} failed: {}",
                    request.request_type.as_str(),
                    request.physical_id,
                    error
                ),
                _ => tracing::info!(
                    "{} {} succeeded",
                    request.request_type.as_str(),
                    request.physical_id
                ),
            }
            self.reporter.send(request, &response).await?;
        }
        Ok(outcome)
    }
}
