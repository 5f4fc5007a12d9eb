//! API Gateway Client
//!
//! Main client for the API Gateway management API, combining the HTTP
//! wrapper with endpoint configuration and path builders.

use super::http::ApiHttpClient;
use crate::error::ApiError;
use reqwest::Method;
use serde_json::Value;

/// API Gateway stores an empty base path under this literal name
pub const EMPTY_BASE_PATH: &str = "(none)";

/// Main API Gateway client
#[derive(Clone)]
pub struct ApiGatewayClient {
    pub http: ApiHttpClient,
    base_url: String,
    token: Option<String>,
}

impl ApiGatewayClient {
    /// Create a new client for `endpoint` (no trailing slash required)
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            http: ApiHttpClient::new()?,
            base_url: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Default regional endpoint
    pub fn regional_endpoint(region: &str) -> String {
        format!("https://apigateway.{}.amazonaws.com", region)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.http
            .send(Method::GET, &self.url(path), self.token.as_deref(), None)
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.http
            .send(Method::POST, &self.url(path), self.token.as_deref(), Some(body))
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.http
            .send(Method::PUT, &self.url(path), self.token.as_deref(), Some(body))
            .await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.http
            .send(Method::PATCH, &self.url(path), self.token.as_deref(), Some(body))
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.http
            .send(Method::DELETE, &self.url(path), self.token.as_deref(), None)
            .await
    }

    // =========================================================================
    // REST API paths
    // =========================================================================

    pub fn rest_apis_path() -> String {
        "/restapis".to_string()
    }

    pub fn rest_api_path(rest_api_id: &str) -> String {
        format!("/restapis/{}", encode(rest_api_id))
    }

    pub fn resources_path(rest_api_id: &str) -> String {
        format!("{}/resources", Self::rest_api_path(rest_api_id))
    }

    pub fn resource_path(rest_api_id: &str, resource_id: &str) -> String {
        format!("{}/{}", Self::resources_path(rest_api_id), encode(resource_id))
    }

    pub fn method_path(rest_api_id: &str, resource_id: &str, http_method: &str) -> String {
        format!(
            "{}/methods/{}",
            Self::resource_path(rest_api_id, resource_id),
            encode(&http_method.to_uppercase())
        )
    }

    pub fn models_path(rest_api_id: &str) -> String {
        format!("{}/models", Self::rest_api_path(rest_api_id))
    }

    pub fn model_path(rest_api_id: &str, model_name: &str) -> String {
        format!("{}/{}", Self::models_path(rest_api_id), encode(model_name))
    }

    pub fn deployments_path(rest_api_id: &str) -> String {
        format!("{}/deployments", Self::rest_api_path(rest_api_id))
    }

    pub fn deployment_path(rest_api_id: &str, deployment_id: &str) -> String {
        format!(
            "{}/{}",
            Self::deployments_path(rest_api_id),
            encode(deployment_id)
        )
    }

    // =========================================================================
    // Custom domain paths
    // =========================================================================

    pub fn domain_names_path() -> String {
        "/domainnames".to_string()
    }

    pub fn domain_name_path(domain_name: &str) -> String {
        format!("/domainnames/{}", encode(domain_name))
    }

    pub fn base_path_mappings_path(domain_name: &str) -> String {
        format!("{}/basepathmappings", Self::domain_name_path(domain_name))
    }

    pub fn base_path_mapping_path(domain_name: &str, base_path: &str) -> String {
        let base_path = if base_path.is_empty() {
            EMPTY_BASE_PATH
        } else {
            base_path
        };
        format!(
            "{}/{}",
            Self::base_path_mappings_path(domain_name),
            encode(base_path)
        )
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}
