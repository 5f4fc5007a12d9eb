//! Declared-property helpers shared by the handlers

use crate::error::{ProvisionError, ValidationError};
use crate::event::{ChangeRequest, RequestType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Validated declared properties of a change request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventParams {
    pub params: Map<String, Value>,
    /// Previous properties, only present on Update
    pub old: Option<Map<String, Value>>,
}

impl EventParams {
    /// Copy the request's properties, checking `required` unless it is a Delete
    ///
    /// Fields may be dotted paths into nested objects (`method.httpMethod`).
    pub fn from_request(request: &ChangeRequest, required: &[&str]) -> Result<Self, ProvisionError> {
        if request.request_type != RequestType::Delete {
            ValidationError::missing(missing_fields(&request.properties, required)).into_result()?;
        }

        Ok(Self {
            params: request.properties.clone(),
            old: request.old_properties.clone(),
        })
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.params, path)
    }

    pub fn str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn require_str(&self, path: &str) -> Result<&str, ProvisionError> {
        self.str(path).ok_or_else(|| {
            ProvisionError::Validation(ValidationError::missing(vec![path.to_string()]))
        })
    }

    pub fn old_str(&self, path: &str) -> Option<&str> {
        self.old
            .as_ref()
            .and_then(|old| lookup(old, path))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether `path` differs between the previous and current properties
    pub fn changed(&self, path: &str) -> bool {
        let old = self.old.as_ref().and_then(|old| lookup(old, path));
        old != self.get(path)
    }

    /// Deserialize the current properties into a typed parameter struct
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProvisionError> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            ProvisionError::Validation(ValidationError::malformed("ResourceProperties", e.to_string()))
        })
    }
}

/// Resolve a dotted path inside a property map
pub fn lookup<'a>(props: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let first = parts.next()?;
    parts.try_fold(props.get(first)?, |current, part| current.get(part))
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Every required field that is absent or empty, in declaration order
pub fn missing_fields(props: &Map<String, Value>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| !is_present(lookup(props, field)))
        .map(|field| field.to_string())
        .collect()
}

/// Put a PEM block's header, body and footer on their own lines
///
/// CloudFormation templates often flatten PEM blocks onto a single line; the
/// body's whitespace runs become line breaks.
pub fn normalize_pem(pem: &str) -> String {
    let pem = pem.trim();
    let Some(header_end) = pem
        .strip_prefix("-----BEGIN ")
        .and_then(|rest| rest.find("-----"))
        .map(|i| i + "-----BEGIN ".len() + "-----".len())
    else {
        return pem.to_string();
    };
    let Some(footer_start) = pem.rfind("-----END ") else {
        return pem.to_string();
    };
    if footer_start < header_end {
        return pem.to_string();
    }

    let header = &pem[..header_end];
    let footer = &pem[footer_start..];
    let body = pem[header_end..footer_start]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("\n");

    format!("{}\n{}\n{}", header, body, footer)
}

/// Accept `true`, `"true"` and `"True"`; CloudFormation passes every scalar as a string
pub fn deserialize_flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) => match s.to_lowercase().as_str() {
            "true" => Ok(Some(true)),
            "false" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, got {:?}",
                other
            ))),
        },
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}
