//! Error types
//!
//! [`ApiError`] is what the API Gateway HTTP layer produces. [`ProvisionError`]
//! is what every handler and tracker step surfaces to the dispatcher, which
//! turns it into a completion (or, for rate limits, a reschedule).

use crate::event::EventError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error kind reported by the API Gateway management API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    TooManyRequests,
    NotFound,
    Conflict,
    BadRequest,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    Other,
}

impl ApiErrorKind {
    /// Parse the `x-amzn-ErrorType` header value, e.g. `TooManyRequestsException:http://...`
    pub fn from_error_type(value: &str) -> Option<Self> {
        let name = value.split(':').next().unwrap_or(value).trim();
        match name {
            "TooManyRequestsException" => Some(Self::TooManyRequests),
            "NotFoundException" => Some(Self::NotFound),
            "ConflictException" => Some(Self::Conflict),
            "BadRequestException" => Some(Self::BadRequest),
            "UnauthorizedException" => Some(Self::Unauthorized),
            "AccessDeniedException" => Some(Self::Forbidden),
            "ServiceUnavailableException" => Some(Self::ServiceUnavailable),
            _ => None,
        }
    }

    /// Fallback classification when no error type header is present
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::TooManyRequests,
            404 => Self::NotFound,
            409 => Self::Conflict,
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            500..=599 => Self::ServiceUnavailable,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TooManyRequests => "TooManyRequestsException",
            Self::NotFound => "NotFoundException",
            Self::Conflict => "ConflictException",
            Self::BadRequest => "BadRequestException",
            Self::Unauthorized => "UnauthorizedException",
            Self::Forbidden => "AccessDeniedException",
            Self::ServiceUnavailable => "ServiceUnavailableException",
            Self::Other => "UnknownError",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single provisioning API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{kind} ({status}): {message}")]
    Rejected {
        kind: ApiErrorKind,
        status: u16,
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to parse response JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    pub fn rejected(
        kind: ApiErrorKind,
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self::Rejected {
            kind,
            status,
            message: message.into(),
            retry_after,
        }
    }

    pub fn kind(&self) -> Option<ApiErrorKind> {
        match self {
            Self::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Provider-suggested delay, only for rate-limit rejections that carry one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Rejected {
                kind: ApiErrorKind::TooManyRequests,
                retry_after,
                ..
            } => *retry_after,
            _ => None,
        }
    }
}

/// Failure of the resource tracker's backing store
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("tracker storage is corrupt: {0}")]
    Format(#[from] serde_json::Error),
}

/// Declared properties that failed validation, reported together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub missing: Vec<String>,
    pub malformed: Vec<(String, String)>,
}

impl ValidationError {
    pub fn missing(fields: Vec<String>) -> Self {
        Self {
            missing: fields,
            malformed: Vec::new(),
        }
    }

    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            missing: Vec::new(),
            malformed: vec![(field.into(), reason.into())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty()
    }

    /// Every offending field name
    pub fn fields(&self) -> Vec<&str> {
        self.missing
            .iter()
            .map(String::as_str)
            .chain(self.malformed.iter().map(|(field, _)| field.as_str()))
            .collect()
    }

    pub fn into_result(self) -> Result<(), ProvisionError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ProvisionError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "Missing required properties: {}",
                self.missing.join(", ")
            ));
        }
        for (field, reason) in &self.malformed {
            parts.push(format!("Invalid property {}: {}", field, reason));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Error surfaced by a lifecycle step
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("{resource_type} does not support in-place update")]
    UpdateNotSupported { resource_type: &'static str },
    #[error("{0}")]
    Validation(ValidationError),
    #[error(transparent)]
    Provisioning(#[from] ApiError),
    #[error("{step} was rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited {
        step: &'static str,
        retry_after: Duration,
    },
    #[error("resource tracker {operation} failed: {source}")]
    Tracker {
        operation: &'static str,
        #[source]
        source: TrackerError,
    },
    #[error("tracked entry for {resource_type} has no `{key}` identifier")]
    MissingIdentifier { resource_type: String, key: String },
    #[error("gave up after {attempts} rate-limited attempts")]
    RescheduleLimit { attempts: u32 },
    #[error(transparent)]
    InvalidEvent(#[from] EventError),
}

impl ProvisionError {
    pub fn tracker(operation: &'static str, source: TrackerError) -> Self {
        Self::Tracker { operation, source }
    }
}
