//! `Custom::ApiDeploy` - a deployment of a REST API to a stage
//!
//! Deleting is a no-op: the stage keeps pointing at its last deployment and
//! API Gateway refuses to delete a deployment a stage still uses.

use super::{response_str, EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "ApiDeploy";
const REQUIRED: &[&str] = &["restApiId", "stageName"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiDeployParams {
    rest_api_id: String,
    stage_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stage_description: Option<String>,
}

pub struct ApiDeployHandler {
    client: ApiGatewayClient,
}

impl ApiDeployHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ApiDeployHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: ApiDeployParams = params.decode()?;
        let mut body = json!({ "stageName": input.stage_name });
        if let Some(description) = &input.description {
            body["description"] = json!(description);
        }
        if let Some(stage_description) = &input.stage_description {
            body["stageDescription"] = json!(stage_description);
        }

        let response = self
            .client
            .post(&ApiGatewayClient::deployments_path(&input.rest_api_id), &body)
            .await?;
        let deployment_id = response_str(&response, "id")?;
        tracing::info!(
            "Deployed {} to stage {} ({})",
            input.rest_api_id,
            input.stage_name,
            deployment_id
        );

        Ok(TrackedEntry::new(NAME)
            .with("restApiId", input.rest_api_id)
            .with("deploymentId", deployment_id)
            .with("stageName", input.stage_name))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        tracing::debug!(
            "Keeping deployment {} of {}",
            entry.identifier("deploymentId")?,
            entry.identifier("restApiId")?
        );
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let path = ApiGatewayClient::deployment_path(
            entry.identifier("restApiId")?,
            entry.identifier("deploymentId")?,
        );
        let response = self.client.get(&path).await?;

        Ok(json!({
            "deploymentId": response_str(&response, "id")?,
            "stageName": entry.identifier("stageName")?,
        }))
    }
}
