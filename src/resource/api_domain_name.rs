//! `Custom::ApiDomainName` - a custom domain backed by an uploaded certificate
//!
//! The certificate is given either inline (`certificateBody` +
//! `certificateChain`) or by reference (`iamServerCertificateName`, passed to
//! API Gateway as the certificate ARN). PEM blocks are normalised before use.
//! A change to `certificateName` or `domainName` alone is applied in place
//! with PATCH; a change to certificate material replaces the domain.

use super::params::{missing_fields, normalize_pem};
use super::{response_str, EventParams, Handler};
use crate::apigw::ApiGatewayClient;
use crate::error::{ProvisionError, ValidationError};
use crate::event::{ChangeRequest, RequestType};
use crate::tracker::TrackedEntry;
use async_trait::async_trait;
use serde_json::{json, Map, Value};

const NAME: &str = "ApiDomainName";
const REQUIRED: &[&str] = &["certificateName", "certificatePrivateKey", "domainName"];
const INLINE_CERTIFICATE: &[&str] = &["certificateBody", "certificateChain"];
const IAM_CERTIFICATE: &str = "iamServerCertificateName";
const PEM_FIELDS: &[&str] = &["certificateBody", "certificateChain", "certificatePrivateKey"];

/// Fields API Gateway can change on an existing domain
const PATCHABLE: &[&str] = &["certificateName", "domainName"];

/// Fields whose change forces a replacement
const REPLACING: &[&str] = &[
    "certificateBody",
    "certificateChain",
    "certificatePrivateKey",
    IAM_CERTIFICATE,
];

pub struct ApiDomainNameHandler {
    client: ApiGatewayClient,
}

impl ApiDomainNameHandler {
    pub fn new(client: ApiGatewayClient) -> Self {
        Self { client }
    }
}

fn validate(props: &Map<String, Value>) -> ValidationError {
    let mut missing = missing_fields(props, REQUIRED);
    if missing_fields(props, &[IAM_CERTIFICATE]).is_empty() {
        return ValidationError::missing(missing);
    }

    let inline_missing = missing_fields(props, INLINE_CERTIFICATE);
    if inline_missing.iter().any(|f| f == "certificateBody") {
        // either form of certificate would do; name both
        missing.push(IAM_CERTIFICATE.to_string());
    }
    missing.extend(inline_missing);
    ValidationError::missing(missing)
}

fn normalize(mut props: Map<String, Value>) -> Map<String, Value> {
    for field in PEM_FIELDS {
        if let Some(Value::String(pem)) = props.get(*field) {
            let normalized = normalize_pem(pem);
            props.insert(field.to_string(), Value::String(normalized));
        }
    }
    props
}

/// PATCH operations for the patchable fields that changed
pub fn patch_operations(params: &EventParams) -> Vec<Value> {
    PATCHABLE
        .iter()
        .filter(|field| params.changed(field))
        .map(|field| {
            json!({
                "op": "replace",
                "path": format!("/{}", field),
                "value": params.str(field).unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl Handler for ApiDomainNameHandler {
    fn name(&self) -> &'static str {
        NAME
    }

    fn extract_parameters(&self, request: &ChangeRequest) -> Result<EventParams, ProvisionError> {
        if request.request_type != RequestType::Delete {
            validate(&request.properties).into_result()?;
        }

        Ok(EventParams {
            params: normalize(request.properties.clone()),
            old: request.old_properties.clone().map(normalize),
        })
    }

    async fn create(&self, params: &EventParams) -> Result<TrackedEntry, ProvisionError> {
        let domain_name = params.require_str("domainName")?;
        let mut body = json!({
            "domainName": domain_name,
            "certificateName": params.require_str("certificateName")?,
            "certificatePrivateKey": params.require_str("certificatePrivateKey")?,
        });
        match params.str(IAM_CERTIFICATE) {
            Some(certificate_arn) => body["certificateArn"] = json!(certificate_arn),
            None => {
                body["certificateBody"] = json!(params.require_str("certificateBody")?);
                body["certificateChain"] = json!(params.require_str("certificateChain")?);
            }
        }

        let response = self
            .client
            .post(&ApiGatewayClient::domain_names_path(), &body)
            .await?;
        let created = response_str(&response, "domainName")?;
        tracing::info!("Created domain name {}", created);

        Ok(TrackedEntry::new(NAME).with("domainName", created))
    }

    fn supports_in_place_update(&self, params: &EventParams) -> bool {
        params.old.is_some() && !REPLACING.iter().any(|field| params.changed(field))
    }

    async fn update(
        &self,
        entry: &TrackedEntry,
        params: &EventParams,
    ) -> Result<TrackedEntry, ProvisionError> {
        let domain_name = entry.identifier("domainName")?;
        let operations = patch_operations(params);
        if operations.is_empty() {
            tracing::debug!("No patchable changes for {}", domain_name);
            return Ok(entry.clone());
        }

        // Patched under the old name; a rename moves the tracked identifier
        self.client
            .patch(
                &ApiGatewayClient::domain_name_path(domain_name),
                &json!({ "patchOperations": operations }),
            )
            .await?;
        tracing::info!("Patched domain name {} ({} operations)", domain_name, operations.len());
        match params.str("domainName") {
            Some(renamed) => Ok(entry.clone().with("domainName", renamed)),
            None => Ok(entry.clone()),
        }
    }

    async fn delete(&self, entry: &TrackedEntry) -> Result<(), ProvisionError> {
        let domain_name = entry.identifier("domainName")?;
        self.client
            .delete(&ApiGatewayClient::domain_name_path(domain_name))
            .await?;
        tracing::info!("Deleted domain name {}", domain_name);
        Ok(())
    }

    async fn read_for_response(
        &self,
        _params: &EventParams,
        entry: &TrackedEntry,
    ) -> Result<Value, ProvisionError> {
        let domain_name = entry.identifier("domainName")?;
        let response = self
            .client
            .get(&ApiGatewayClient::domain_name_path(domain_name))
            .await?;

        Ok(json!({
            "domainName": domain_name,
            "distributionDomainName": response_str(&response, "distributionDomainName")?,
        }))
    }
}
