//! The NGC Cloud Function provider: wires configuration, the NVCF client and
//! the resource implementations into a [`ProviderService`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::api::NvcfApi;
use crate::client::NvcfClient;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::{function, telemetry, ResourceContext};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ApplyResult, ImportedResource, PlanResult};

/// Provider for NVIDIA Cloud Functions.
///
/// Resource operations fail with [`ProviderError::NotConfigured`] until
/// [`ProviderService::configure`] succeeds.
#[derive(Default)]
pub struct NgcProvider {
    injected_api: Option<Arc<dyn NvcfApi>>,
    context: RwLock<Option<ResourceContext>>,
}

impl NgcProvider {
    /// A provider that talks to the NVCF API once configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider bound to `api`, already usable without `configure`.
    ///
    /// A later `configure` keeps `api` and only picks up the poll interval.
    pub fn with_api(api: Arc<dyn NvcfApi>, poll_interval: Duration) -> Self {
        Self {
            injected_api: Some(api.clone()),
            context: RwLock::new(Some(ResourceContext::new(api, poll_interval))),
        }
    }

    async fn context(&self) -> Result<ResourceContext, ProviderError> {
        self.context.read().await.clone().ok_or_else(|| {
            ProviderError::NotConfigured("configure must succeed before resource operations".to_string())
        })
    }
}

fn unknown_resource(resource_type: &str) -> ProviderError {
    ProviderError::UnknownResource(resource_type.to_string())
}

#[async_trait::async_trait]
impl ProviderService for NgcProvider {
    fn schema(&self) -> ProviderSchema {
        ProviderSchema::new()
            .with_provider_config(ProviderConfig::schema())
            .with_resource(function::RESOURCE_TYPE, function::schema())
            .with_resource(telemetry::RESOURCE_TYPE, telemetry::schema())
            .with_data_source(function::DATA_SOURCE_TYPE, function::data_source_schema())
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::from_value(&config) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "provider configuration rejected");
                return Ok(vec![err.to_diagnostic()]);
            },
        };

        let api: Arc<dyn NvcfApi> = match &self.injected_api {
            Some(api) => api.clone(),
            None => Arc::new(NvcfClient::new(&config)?),
        };

        info!(
            org = %config.ngc_org,
            team = ?config.ngc_team,
            poll_interval = ?config.deployment_poll_interval,
            "provider configured"
        );
        *self.context.write().await = Some(ResourceContext::new(api, config.deployment_poll_interval));
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        match resource_type {
            function::RESOURCE_TYPE => Ok(function::validate(&config)),
            telemetry::RESOURCE_TYPE => Ok(telemetry::validate(&config)),
            other => Err(unknown_resource(other)),
        }
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        match resource_type {
            function::RESOURCE_TYPE => Ok(function::plan(prior_state.as_ref(), proposed_state)),
            telemetry::RESOURCE_TYPE => Ok(telemetry::plan(prior_state.as_ref(), proposed_state)),
            other => Err(unknown_resource(other)),
        }
    }

    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        let ctx = self.context().await?;
        match resource_type {
            function::RESOURCE_TYPE => function::create(&ctx, planned_state).await,
            telemetry::RESOURCE_TYPE => telemetry::create(&ctx, planned_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let ctx = self.context().await?;
        match resource_type {
            function::RESOURCE_TYPE => function::read(&ctx, current_state).await,
            telemetry::RESOURCE_TYPE => telemetry::read(&ctx, current_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        let ctx = self.context().await?;
        match resource_type {
            function::RESOURCE_TYPE => function::update(&ctx, prior_state, planned_state).await,
            telemetry::RESOURCE_TYPE => telemetry::update(&ctx, prior_state, planned_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let ctx = self.context().await?;
        match resource_type {
            function::RESOURCE_TYPE => function::delete(&ctx, current_state).await,
            telemetry::RESOURCE_TYPE => telemetry::delete(&ctx, current_state).await,
            other => Err(unknown_resource(other)),
        }
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let ctx = self.context().await?;
        match resource_type {
            function::RESOURCE_TYPE => function::import(&ctx, id).await,
            telemetry::RESOURCE_TYPE => telemetry::import(&ctx, id).await,
            other => Err(unknown_resource(other)),
        }
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let ctx = self.context().await?;
        match data_source_type {
            function::DATA_SOURCE_TYPE => function::read_data_source(&ctx, config).await,
            other => Err(unknown_resource(other)),
        }
    }
}
