//! Provisioning-lifecycle orchestrator for API Gateway custom resources
//!
//! A CloudFormation custom-resource event becomes a [`event::ChangeRequest`],
//! the [`dispatch::Dispatcher`] drives the matching handler through its
//! lifecycle while the [`tracker`] records what exists, and the
//! [`driver::Driver`] replays rate-limited requests before reporting the
//! outcome through a [`response::Reporter`].

pub mod apigw;
pub mod config;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod event;
pub mod resource;
pub mod response;
pub mod retry;
pub mod tracker;

/// Version injected at compile time via APIGW_PROVISIONER_VERSION (set by CI/CD),
/// or "dev" for local builds.
pub const VERSION: &str = match option_env!("APIGW_PROVISIONER_VERSION") {
    Some(v) => v,
    None => "dev",
};
