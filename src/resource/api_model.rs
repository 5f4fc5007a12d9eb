//! `Custom::ApiModel` - a request/response model schema

use super::{response_str, EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::ProvisionError;
use crate::event::ChangeRequest;
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const NAME: &str = "ApiModel";
const REQUIRED: &[&str] = &["restApiId", "name"];
const DEFAULT_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiModelParams {
    rest_api_id: String,
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    schema: Option<Value>,
}

pub struct ApiModelHandler {
    client: ApiGatewayClient,
}

impl ApiModelHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Handler for ApiModelHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        EventParams::from_request(request, REQUIRED)
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let input: ApiModelParams = params.decode()?;
        let mut body = json!({
            "name": input.name,
            "contentType": input.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
        });
        if let Some(description) = &input.description {
            body["description"] = json!(description);
        }
        // The API takes the schema as a string; templates may inline it as an object
        match &input.schema {
            Some(Value::String(schema)) => body["schema"] = json!(schema),
            Some(schema @ Value::Object(_)) => body["schema"] = json!(schema.to_string()),
            _ => {}
        }

        let response = self
            .client
            .post(&ApiGatewayClient::models_path(&input.rest_api_id), &body)
            .await?;
        let model_name = response_str(&response, "name")?;
        tracing::info!("Created model {} in {}", model_name, input.rest_api_id);

        Ok(TrackedEntry::new(NAME)
            .with("restApiId", input.rest_api_id)
            .with("modelName", model_name))
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let path = ApiGatewayClient::model_path(
            entry.identifier("restApiId")?,
            entry.identifier("modelName")?,
        );
        self.client.delete(&path).await?;
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let path = ApiGatewayClient::model_path(
            entry.identifier("restApiId")?,
            entry.identifier("modelName")?,
        );
        let response = self.client.get(&path).await?;

        Ok(json!({
            "modelName": response_str(&response, "name")?,
            "modelId": response.get("id").cloned().unwrap_or(Value::Null),
        }))
    }
}
