//! `Custom::RestApi` - a REST API and its root resource

use super::{response_str, EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::{ApiError, ProvisionError};
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "RestApi";
const REQUIRED: &[&str] = &["name"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestApiParams {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

pub struct RestApiHandler {
    client: ApiGatewayClient,
}

impl RestApiHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }

    /// Id of the `/` resource API Gateway creates with every REST API
    async fn root_resource_id(&self, rest_api_id: &str) -> Result<String, ProvisionError> {
        let response = self
            .client
            .get(&ApiGatewayClient::resources_path(rest_api_id))
            .await?;

        response
            .get("item")
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .find(|item| item.get("path").and_then(Value::as_str) == Some("/"))
            })
            .and_then(|root| root.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::UnexpectedResponse(format!("REST API {} has no root resource", rest_api_id))
                    .into()
            })
    }
}

#[async_trait]
impl Handler for RestApiHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: RestApiParams = params.decode()?;
        let mut body = json!({ "name": input.name });
        if let Some(description) = input.description {
            body["description"] = json!(description);
        }

        let response = self
            .client
            .post(&ApiGatewayClient::rest_apis_path(), &body)
            .await?;
        let rest_api_id = response_str(&response, "id")?;
        tracing::info!("Created REST API {} ({})", input.name, rest_api_id);

        let root_id = self.root_resource_id(&rest_api_id).await?;
        Ok(TrackedEntry::new(NAME)
            .with("restApiId", rest_api_id)
            .with("parentResourceId", root_id))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let rest_api_id = entry.identifier("restApiId")?;
        self.client
            .delete(&ApiGatewayClient::rest_api_path(rest_api_id))
            .await?;
        tracing::info!("Deleted REST API {}", rest_api_id);
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let rest_api_id = entry.identifier("restApiId")?;
        let response = self
            .client
            .get(&ApiGatewayClient::rest_api_path(rest_api_id))
            .await?;

        Ok(json!({
            "restApiId": response_str(&response, "id")?,
            "parentResourceId": entry.identifier("parentResourceId")?,
        }))
    }
}
