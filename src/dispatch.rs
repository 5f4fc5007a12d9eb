//! Dispatcher
//!
//! Resolves a change request to its handler and drives the matching
//! lifecycle transition. Steps run strictly in sequence and the first failure
//! short-circuits; the tracker is only written after the provider side has
//! fully succeeded.
//!
//! | verb   | steps                                                               |
//! |--------|---------------------------------------------------------------------|
//! | Create | create → read → put                                                 |
//! | Delete | get → (untracked: done) → delete → untrack                          |
//! | Update | get → delete → untrack → create → read → put  (or in-place update)  |

use crate::error::ProvisionError;
use crate::event::{ChangeRequest, RequestType};
use crate::resource::{EventParams, Handler, HandlerSet};
use crate::retry::RetryPolicy;
use crate::tracker::{ResourceTracker, TrackedEntry};
use serde_json::{Map, Value};
use std::time::Duration;

/// Result of processing one change request
#[derive(Debug)]
pub enum Outcome {
    /// Terminal success with the attributes returned to the stack
    Success { data: Value },
    /// Terminal failure
    Failure { error: ProvisionError },
    /// Not terminal: replay the whole request after `delay`
    Deferred { delay: Duration },
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Deferred { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

pub struct Dispatcher<H, T> {
    handlers: H,
    tracker: T,
    retry: RetryPolicy,
}

impl<H: HandlerSet, T: ResourceTracker> Dispatcher<H, T> {
    pub fn new(handlers: H, tracker: T, retry: RetryPolicy) -> Self {
        Self {
            handlers,
            tracker,
            retry,
        }
    }

    /// Process one change request to an [`Outcome`]
    ///
    /// Never sleeps and never re-enters itself; a rate limit comes back as
    /// [`Outcome::Deferred`] for the caller to schedule.
    pub async fn process(&self, request: &ChangeRequest) -> Outcome {
        match self.run(request).await {
            Ok(data) => Outcome::Success { data },
            Err(ProvisionError::RateLimited { step, retry_after }) => {
                let delay = self.retry.reschedule_delay(retry_after);
                tracing::info!(
                    "{} {} deferred by rate limit in {}, replaying in {}s",
                    request.request_type.as_str(),
                    request.physical_id,
                    step,
                    delay.as_secs()
                );
                Outcome::Deferred { delay }
            }
            Err(error) => Outcome::Failure { error },
        }
    }

    async fn run(&self, request: &ChangeRequest) -> Result<Value, ProvisionError> {
        let Some(handler) = request.type_tag().and_then(|tag| self.handlers.resolve(tag)) else {
            if request.request_type == RequestType::Delete {
                tracing::warn!(
                    "Ignoring delete of unknown resource type {} ({})",
                    request.resource_type,
                    request.physical_id
                );
                return Ok(empty_data());
            }
            return Err(ProvisionError::UnknownResourceType(
                request.resource_type.clone(),
            ));
        };

        let params = handler.extract_parameters(request)?;
        let identity = request.physical_id.as_str();
        tracing::debug!(
            "{} {} via {} handler",
            request.request_type.as_str(),
            identity,
            handler.name()
        );

        match request.request_type {
            RequestType::Create => self.create(handler, identity, &params).await,
            RequestType::Delete => self.delete(handler, identity).await,
            RequestType::Update => self.update(handler, identity, &params).await,
        }
    }

    async fn create(
        &self,
        handler: &dyn Handler,
        identity: &str,
        params: &EventParams,
    ) -> Result<Value, ProvisionError> {
        let entry = self.retry.invoke("create", handler.create(params)).await?;
        self.respond_and_track(handler, identity, params, entry).await
    }

    async fn delete(&self, handler: &dyn Handler, identity: &str) -> Result<Value, ProvisionError> {
        let Some(entry) = self.tracked(identity).await? else {
            tracing::info!("{} is not tracked, nothing to delete", identity);
            return Ok(empty_data());
        };

        self.retry.invoke("delete", handler.delete(&entry)).await?;
        self.untrack(identity).await?;
        Ok(empty_data())
    }

    async fn update(
        &self,
        handler: &dyn Handler,
        identity: &str,
        params: &EventParams,
    ) -> Result<Value, ProvisionError> {
        let Some(previous) = self.tracked(identity).await? else {
            tracing::info!("{} is not tracked, updating by creating", identity);
            return self.create(handler, identity, params).await;
        };

        if handler.supports_in_place_update(params) {
            let entry = self
                .retry
                .invoke("update", handler.update(&previous, params))
                .await?;
            return self.respond_and_track(handler, identity, params, entry).await;
        }

        self.retry.invoke("delete", handler.delete(&previous)).await?;
        // The old resource is gone; a failure below must not leave a stale entry behind
        self.untrack(identity).await?;
        self.create(handler, identity, params).await
    }

    async fn respond_and_track(
        &self,
        handler: &dyn Handler,
        identity: &str,
        params: &EventParams,
        entry: TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let data = self
            .retry
            .invoke("read", handler.read_for_response(params, &entry))
            .await?;
        self.tracker
            .put(identity, &entry)
            .await
            .map_err(|e| ProvisionError::tracker("put", e))?;
        Ok(data)
    }

    async fn tracked(&self, identity: &str) -> Result<Option<TrackedEntry>, ProvisionError> {
        self.tracker
            .get(identity)
            .await
            .map_err(|e| ProvisionError::tracker("get", e))
    }

    async fn untrack(&self, identity: &str) -> Result<(), ProvisionError> {
        self.tracker
            .delete(identity)
            .await
            .map_err(|e| ProvisionError::tracker("delete", e))
    }
}

fn empty_data() -> Value {
    Value::Object(Map::new())
}
