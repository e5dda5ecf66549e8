//! NGC Cloud Function Provider
//!
//! A declarative-infrastructure provider for NVIDIA Cloud Functions (NVCF).
//! It manages function versions with their deployments and telemetry
//! endpoints through the NVCF REST API.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Schema types**: Types describing the provider configuration, resources, and data sources
//! - **Planner**: Schema-driven defaults, diffs and replacement decisions
//! - **ProviderService trait**: The operations a host plugin adapter calls
//! - **NgcProvider**: The provider itself, with the `ngc_cloud_function` and
//!   `ngc_cloud_function_telemetry` resources and the `ngc_cloud_function` data source
//! - **NVCF client**: An authenticated REST client behind the [`NvcfApi`] trait
//! - **Deployment controller**: Submits deployments and polls them until ACTIVE
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use ngc_cloud_function_provider::{NgcProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     ngc_cloud_function_provider::init_logging();
//!
//!     let provider = NgcProvider::new();
//!     provider.configure(json!({"ngc_org": "my-org"})).await?;
//!
//!     let config = json!({
//!         "function_name": "echo",
//!         "inference_url": "/echo",
//!         "container_image": "nvcr.io/my-org/echo:1.0",
//!         "deployment_specifications": [{
//!             "gpu": "L40",
//!             "instance_type": "gl40_1.br20_2xlarge",
//!             "min_instances": 1,
//!             "max_instances": 1
//!         }]
//!     });
//!     let plan = provider.plan("ngc_cloud_function", None, config).await?;
//!     let result = provider.create("ngc_cloud_function", plan.planned_state).await?;
//!     println!("{:?}", result.state);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! | Attribute | Environment | Default |
//! |-----------|-------------|---------|
//! | `ngc_endpoint` | `NGC_ENDPOINT` | `https://api.ngc.nvidia.com` |
//! | `ngc_api_key` | `NGC_API_KEY` | required |
//! | `ngc_org` | `NGC_ORG` | required |
//! | `ngc_team` | `NGC_TEAM` | none |
//! | `deployment_poll_interval` | | `60s` |
//!
//! Short artifact URIs in `models` and `resources` are expanded against
//! `NGC_ARTIFACT_HOST` (default `https://api.ngc.nvidia.com/v2/org`) at plan time.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod artifact;
pub mod client;
pub mod config;
pub mod deployment;
pub mod error;
pub mod logging;
#[allow(missing_docs)]
pub mod models;
pub mod plan;
pub mod provider;
#[allow(missing_docs)]
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod validation;

// Re-export main types at crate root
pub use api::NvcfApi;
pub use client::NvcfClient;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::NgcProvider;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ApplyResult, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{is_valid, validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
