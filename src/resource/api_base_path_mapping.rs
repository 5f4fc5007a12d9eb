//! `Custom::ApiBasePathMapping` - maps a base path of a custom domain to a stage

use super::{EventParams, Handler};
use crate::apigw::client::EMPTY_BASE_PATH;
use crate::apigw::ApiGatewayClient;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "ApiBasePathMapping";
const REQUIRED: &[&str] = &["domainName", "restApiId"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BasePathMappingParams {
    domain_name: String,
    rest_api_id: String,
    #[serde(default)]
    base_path: Option<String>,
    #[serde(default)]
    stage: Option<String>,
}

pub struct ApiBasePathMappingHandler {
    client: ApiGatewayClient,
}

impl ApiBasePathMappingHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ApiBasePathMappingHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: BasePathMappingParams = params.decode()?;
        let base_path = input.base_path.unwrap_or_default();

        let mut body = json!({ "restApiId": input.rest_api_id });
        if !base_path.is_empty() {
            body["basePath"] = json!(base_path);
        }
        if let Some(stage) = &input.stage {
            body["stage"] = json!(stage);
        }

        let response = self
            .client
            .post(&ApiGatewayClient::base_path_mappings_path(&input.domain_name), &body)
            .await?;
        let created = response
            .get("basePath")
            .and_then(Value::as_str)
            .filter(|bp| *bp != EMPTY_BASE_PATH)
            .unwrap_or(&base_path)
            .to_string();
        tracing::info!(
            "Mapped {}/{} to {}",
            input.domain_name,
            created,
            input.rest_api_id
        );

        Ok(TrackedEntry::new(NAME)
            .with("domainName", input.domain_name)
            .with("basePath", created))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let path = ApiGatewayClient::base_path_mapping_path(
            entry.identifier("domainName")?,
            entry.identifier("basePath")?,
        );
        self.client.delete(&path).await?;
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let base_path = entry.identifier("basePath")?;
        let path =
            ApiGatewayClient::base_path_mapping_path(entry.identifier("domainName")?, base_path);
        let response = self.client.get(&path).await?;

        Ok(json!({
            "basePath": base_path,
            "stage": response.get("stage").cloned().unwrap_or(Value::Null),
        }))
    }
}
