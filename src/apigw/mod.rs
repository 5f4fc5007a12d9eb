//! API Gateway interaction module
//!
//! # Module Structure
//!
//! - [`client`] - Management API client with endpoint config and path builders
//! - [`http`] - HTTP wrapper mapping error responses to [`crate::error::ApiError`]
//!
//! # Example
//!
//! ```ignore
//! use crate::apigw::client::ApiGatewayClient;
//!
//! async fn example() -> Result<(), crate::error::ApiError> {
//!     let client = ApiGatewayClient::new("https://apigateway.us-east-1.amazonaws.com", None)?;
//!     let apis = client.get(&ApiGatewayClient::rest_apis_path()).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;

pub use client::ApiGatewayClient;
