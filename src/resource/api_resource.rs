//! `Custom::ApiResource` - a path part under an existing resource

use super::{response_str, EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "ApiResource";
const REQUIRED: &[&str] = &["restApiId", "parentId", "pathPart"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResourceParams {
    rest_api_id: String,
    parent_id: String,
    path_part: String,
}

pub struct ApiResourceHandler {
    client: ApiGatewayClient,
}

impl ApiResourceHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ApiResourceHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: ApiResourceParams = params.decode()?;
        let path = ApiGatewayClient::resource_path(&input.rest_api_id, &input.parent_id);
        let response = self
            .client
            .post(&path, &json!({ "pathPart": input.path_part }))
            .await?;

        let resource_id = response_str(&response, "id")?;
        tracing::info!(
            "Created resource {} under {} in {}",
            resource_id,
            input.parent_id,
            input.rest_api_id
        );

        Ok(TrackedEntry::new(NAME)
            .with("restApiId", input.rest_api_id)
            .with("resourceId", resource_id))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let rest_api_id = entry.identifier("restApiId")?;
        let resource_id = entry.identifier("resourceId")?;
        self.client
            .delete(&ApiGatewayClient::resource_path(rest_api_id, resource_id))
            .await?;
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let rest_api_id = entry.identifier("restApiId")?;
        let resource_id = entry.identifier("resourceId")?;
        let response = self
            .client
            .get(&ApiGatewayClient::resource_path(rest_api_id, resource_id))
            .await?;

        Ok(json!({ "resourceId": response_str(&response, "id")? }))
    }
}
