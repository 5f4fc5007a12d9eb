//! Change requests
//!
//! Parses CloudFormation custom-resource events into [`ChangeRequest`]s and
//! produces the redacted view used whenever a request is logged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Declared properties that must never reach diagnostic output
pub const SECRET_PROPERTIES: &[&str] = &["certificatePrivateKey"];

/// Replacement for secret values in the redacted view
pub const MASK: &str = "***masked***";

/// Property CloudFormation adds to every custom resource; not a declared property
const SERVICE_TOKEN: &str = "ServiceToken";

/// Lifecycle verb of a change request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

impl RequestType {
    /// Anything that is not Create or Delete is handled as Update
    pub fn from_str(s: &str) -> Self {
        match s {
            "Create" => Self::Create,
            "Delete" => Self::Delete,
            _ => Self::Update,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "Create",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }
}

/// Raw CloudFormation custom-resource event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CloudFormationEvent {
    pub request_type: String,
    pub resource_type: String,
    #[serde(default, rename = "ResponseURL")]
    pub response_url: Option<String>,
    #[serde(default)]
    pub stack_id: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub logical_resource_id: String,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: Map<String, Value>,
    #[serde(default)]
    pub old_resource_properties: Option<Map<String, Value>>,
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("{0} request has no PhysicalResourceId")]
    MissingIdentity(&'static str),
}

/// One create/update/delete instruction for a single logical resource
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRequest {
    pub request_type: RequestType,
    pub resource_type: String,
    /// Stable identity, assigned once when a Create arrives without one
    pub physical_id: String,
    pub properties: Map<String, Value>,
    pub old_properties: Option<Map<String, Value>>,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub response_url: Option<String>,
}

impl ChangeRequest {
    pub fn from_event(event: CloudFormationEvent) -> Result<Self, EventError> {
        let request_type = RequestType::from_str(&event.request_type);

        let physical_id = match (event.physical_resource_id, request_type) {
            (Some(id), _) if !id.is_empty() => id,
            (_, RequestType::Create) => assign_identity(&event.logical_resource_id),
            (_, other) => return Err(EventError::MissingIdentity(other.as_str())),
        };

        let mut properties = event.resource_properties;
        properties.remove(SERVICE_TOKEN);
        let old_properties = event.old_resource_properties.map(|mut old| {
            old.remove(SERVICE_TOKEN);
            old
        });

        Ok(Self {
            request_type,
            resource_type: event.resource_type,
            physical_id,
            properties,
            old_properties,
            stack_id: event.stack_id,
            request_id: event.request_id,
            logical_resource_id: event.logical_resource_id,
            response_url: event.response_url,
        })
    }

    /// Resource type tag, e.g. `ApiMethod` for `Custom::ApiMethod`
    pub fn type_tag(&self) -> Option<&str> {
        self.resource_type
            .split_once("::")
            .map(|(_, tag)| tag)
            .filter(|tag| !tag.is_empty())
    }

    /// Stand-in for an event that could not become a request
    ///
    /// Carries only what a completion needs; the identity falls back to the
    /// logical id when the event has none.
    pub fn unresolved(event: &CloudFormationEvent) -> Self {
        let physical_id = event
            .physical_resource_id
            .clone()
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| event.logical_resource_id.clone());

        Self {
            request_type: RequestType::from_str(&event.request_type),
            resource_type: event.resource_type.clone(),
            physical_id,
            properties: Map::new(),
            old_properties: None,
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
            response_url: event.response_url.clone(),
        }
    }

    /// JSON view of the request with every secret masked
    ///
    /// The response URL is presigned, so it is masked too.
    pub fn redacted(&self) -> Value {
        let mut value = match serde_json::to_value(self) {
            Ok(value) => redact(&value),
            Err(_) => return Value::Null,
        };
        if self.response_url.is_some() {
            value["response_url"] = Value::String(MASK.to_string());
        }
        value
    }
}

fn assign_identity(logical_id: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    if logical_id.is_empty() {
        suffix
    } else {
        format!("{}-{}", logical_id, &suffix[..12])
    }
}

/// Mask every secret property anywhere in `value`
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let redacted = if SECRET_PROPERTIES.contains(&key.as_str()) && !inner.is_null() {
                        Value::String(MASK.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), redacted)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}
