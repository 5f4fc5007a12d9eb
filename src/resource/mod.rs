//! Resource handlers
//!
//! Every custom resource type is served by one [`Handler`]. The set of types
//! is closed: [`registry::ResourceType`] lists them and
//! [`registry::ApiGatewayHandlers`] maps each one to its handler.
//!
//! # Architecture
//!
//! - [`registry`] - Resource types and the tag → handler resolution
//! - [`params`] - Property validation and normalisation shared by handlers
//! - one module per resource type, each talking to API Gateway through
//!   [`crate::apigw::ApiGatewayClient`]
//!
//! # Handler contract
//!
//! The dispatcher drives handlers strictly in order: `extract_parameters`,
//! then `create` / `update` / `delete`, then `read_for_response` after a
//! create or update. Handlers never touch the tracker; they return the
//! provider identifiers in a [`TrackedEntry`] and receive it back on delete.

pub mod api_base_path_mapping;
pub mod api_deploy;
pub mod api_domain_name;
pub mod api_method;
pub mod api_model;
pub mod api_resource;
pub mod params;
pub mod registry;
pub mod rest_api;

use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde_json::Value;

pub use params::EventParams;
pub use registry::{ApiGatewayHandlers, HandlerSet, ResourceType};

/// Per-resource-type implementation of the lifecycle contract
#[async_trait]
pub trait Handler: Send + Sync {
    /// Type tag served by this handler, e.g. `ApiMethod`
    fn name(&self) -> &'static str;

    /// Validate and normalise the declared properties
    ///
    /// Must name every missing required field in a single
    /// [`ProvisionError::Validation`], and must skip required-field checks on
    /// Delete.
    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError>;

    /// Create the provider resource and return its identifiers
    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError>;

    /// Whether this request can be applied in place instead of delete-then-create
    fn supports_in_place_update(&self, _params: &EventParams) -> bool {
        false
    }

    /// Apply the update in place, returning the (possibly changed) identifiers
    async fn update(
        &self,
        _entry: &TrackedEntry,
        _params: &EventParams,
    ) -> Result<TrackedEntry, ProvisionError> {
        Err(ProvisionError::UpdateNotSupported {
            resource_type: self.name(),
        })
    }

    /// Remove the provider resource identified by `entry`
    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError>;

    /// Attributes returned to the stack after a create or update
    async fn read_for_response(
        &self,
        params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError>;
}

/// Pull a string field out of an API response
pub(crate) fn response_str(response: &Value, key: &str) -> Result<String, ProvisionError> {
    response
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ProvisionError::Provisioning(crate::error::ApiError::UnexpectedResponse(format!(
                "response has no `{}` field",
                key
            )))
        })
}
