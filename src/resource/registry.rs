//! Resource Registry
//!
//! The closed set of supported custom resource types and the resolution of a
//! type tag to its handler.

use super::api_base_path_mapping::ApiBasePathMappingHandler;
use super::api_deploy::ApiDeployHandler;
use super::api_domain_name::ApiDomainNameHandler;
use super::api_method::ApiMethodHandler;
use super::api_model::ApiModelHandler;
use super::api_resource::ApiResourceHandler;
use super::rest_api::RestApiHandler;
use super::Handler;
use crate::apigw::ApiGatewayClient;
use std::fmt;
use std::sync::Arc;

/// Supported custom resource types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    RestApi,
    ApiResource,
    ApiMethod,
    ApiModel,
    ApiDeploy,
    ApiDomainName,
    ApiBasePathMapping,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        Self::RestApi,
        Self::ApiResource,
        Self::ApiMethod,
        Self::ApiModel,
        Self::ApiDeploy,
        Self::ApiDomainName,
        Self::ApiBasePathMapping,
    ];

    /// Resolve a type tag; unknown tags are `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_tag() == tag)
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::RestApi => "RestApi",
            Self::ApiResource => "ApiResource",
            Self::ApiMethod => "ApiMethod",
            Self::ApiModel => "ApiModel",
            Self::ApiDeploy => "ApiDeploy",
            Self::ApiDomainName => "ApiDomainName",
            Self::ApiBasePathMapping => "ApiBasePathMapping",
        }
    }

    /// CloudFormation resource type, e.g. `Custom::ApiMethod`
    pub fn cloudformation_type(&self) -> String {
        format!("Custom::{}", self.as_tag())
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Resolution of type tags to handlers
pub trait HandlerSet: Send + Sync {
    fn resolve(&self, tag: &str) -> Option<&dyn Handler>;
}

impl<H: HandlerSet + ?Sized> HandlerSet for Arc<H> {
    fn resolve(&self, tag: &str) -> Option<&dyn Handler> {
        (**self).resolve(tag)
    }
}

/// One handler per [`ResourceType`], all sharing one API Gateway client
pub struct ApiGatewayHandlers {
    rest_api: RestApiHandler,
    api_resource: ApiResourceHandler,
    api_method: ApiMethodHandler,
    api_model: ApiModelHandler,
    api_deploy: ApiDeployHandler,
    api_domain_name: ApiDomainNameHandler,
    api_base_path_mapping: ApiBasePathMappingHandler,
}

impl ApiGatewayHandlers {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self {
            rest_api: RestApiHandler::new(client.clone()),
            api_resource: ApiResourceHandler::new(client.clone()),
            api_method: ApiMethodHandler::new(client.clone()),
            api_model: ApiModelHandler::new(client.clone()),
            api_deploy: ApiDeployHandler::new(client.clone()),
            api_domain_name: ApiDomainNameHandler::new(client.clone()),
            api_base_path_mapping: ApiBasePathMappingHandler::new(client),
        }
    }

    pub fn handler(&self, resource_type: ResourceType) -> &dyn Handler {
        match resource_type {
            ResourceType::RestApi => &self.rest_api,
            ResourceType::ApiResource => &self.api_resource,
            ResourceType::ApiMethod => &self.api_method,
            ResourceType::ApiModel => &self.api_model,
            ResourceType::ApiDeploy => &self.api_deploy,
            ResourceType::ApiDomainName => &self.api_domain_name,
            ResourceType::ApiBasePathMapping => &self.api_base_path_mapping,
        }
    }
}

impl HandlerSet for ApiGatewayHandlers {
    fn resolve(&self, tag: &str) -> Option<&dyn Handler> {
        ResourceType::from_tag(tag).map(|t| self.handler(t))
    }
}
