//! `Custom::ApiMethod` - an HTTP method on a resource

use super::params::deserialize_flexible_bool;
use super::{EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const NAME: &str = "ApiMethod";
const REQUIRED: &[&str] = &["restApiId", "resourceId", "method.httpMethod"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMethodParams {
    rest_api_id: String,
    resource_id: String,
    method: MethodParams,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MethodParams {
    http_method: String,
    #[serde(default)]
    authorization_type: Option<String>,
    #[serde(default)]
    authorizer_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_bool")]
    api_key_required: Option<bool>,
    #[serde(default)]
    request_parameters: Option<Map<String, Value>>,
    #[serde(default)]
    request_models: Option<Map<String, Value>>,
}

impl MethodParams {
    fn body(&self) -> Value {
        let mut body = json!({
            "authorizationType": self.authorization_type.as_deref().unwrap_or("NONE"),
            "apiKeyRequired": self.api_key_required.unwrap_or(false),
        });
        if let Some(authorizer_id) = &self.authorizer_id {
            body["authorizerId"] = json!(authorizer_id);
        }
        if let Some(parameters) = &self.request_parameters {
            // API Gateway expects booleans; templates pass "true"/"false"
            let parameters: Map<String, Value> = parameters
                .iter()
                .map(|(k, v)| {
                    let required = matches!(v, Value::Bool(true))
                        || v.as_str().is_some_and(|s| s.eq_ignore_ascii_case("true"));
                    (k.clone(), Value::Bool(required))
                })
                .collect();
            body["requestParameters"] = Value::Object(parameters);
        }
        if let Some(models) = &self.request_models {
            body["requestModels"] = Value::Object(models.clone());
        }
        body
    }
}

pub struct ApiMethodHandler {
    client: ApiGatewayClient,
}

impl ApiMethodHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ApiMethodHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: ApiMethodParams = params.decode()?;
        let http_method = input.method.http_method.to_uppercase();
        let path = ApiGatewayClient::method_path(&input.rest_api_id, &input.resource_id, &http_method);

        self.client.put(&path, &input.method.body()).await?;
        tracing::info!(
            "Created method {} on {} in {}",
            http_method,
            input.resource_id,
            input.rest_api_id
        );

        Ok(TrackedEntry::new(NAME)
            .with("restApiId", input.rest_api_id)
            .with("resourceId", input.resource_id)
            .with("httpMethod", http_method))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let path = ApiGatewayClient::method_path(
            entry.identifier("restApiId")?,
            entry.identifier("resourceId")?,
            entry.identifier("httpMethod")?,
        );
        self.client.delete(&path).await?;
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let path = ApiGatewayClient::method_path(
            entry.identifier("restApiId")?,
            entry.identifier("resourceId")?,
            entry.identifier("httpMethod")?,
        );
        let response = self.client.get(&path).await?;
        let http_method = response
            .get("httpMethod")
            .and_then(Value::as_str)
            .unwrap_or(entry.identifier("httpMethod")?);

        Ok(json!({ "httpMethod": http_method }))
    }
}
