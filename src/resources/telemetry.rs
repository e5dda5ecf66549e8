//! The `ngc_cloud_function_telemetry` resource.
//!
//! Telemetry endpoints cannot be modified on the backend, so every
//! configurable attribute forces replacement and update is rejected.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::ProviderError;
use crate::models::{CreateTelemetryRequest, Telemetry, TelemetrySecret};
use crate::plan::plan_resource;
use crate::resources::{merge_set, secret_block, ResourceContext, SecretModel};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Diagnostic, NestedBlock, Schema};
use crate::types::{ApplyResult, ImportedResource, PlanResult};
use crate::validation;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "ngc_cloud_function_telemetry";

/// State of an `ngc_cloud_function_telemetry` resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryModel {
    pub telemetry_id: Option<String>,
    pub name: Option<String>,
    pub endpoint: Option<String>,
    pub protocol: Option<String>,
    pub provider: Option<String>,
    pub types: Option<Vec<String>>,
    pub secret: Option<SecretModel>,
    pub created_at: Option<String>,
}

impl TelemetryModel {
    fn from_value(value: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(value)?)
    }

    fn to_value(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    fn telemetry_id(&self) -> Result<&str, ProviderError> {
        self.telemetry_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Validation("telemetry_id must be set".to_string()))
    }

    /// Build the create body. The secret value is sent as JSON when it parses
    /// as JSON and as a plain string otherwise.
    pub fn to_request(&self) -> Result<CreateTelemetryRequest, ProviderError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .ok_or_else(|| ProviderError::Validation(format!("{} must be set", name)))
        };
        let secret = self
            .secret
            .as_ref()
            .ok_or_else(|| ProviderError::Validation("secret must be set".to_string()))?;

        Ok(CreateTelemetryRequest {
            name: required(&self.name, "name")?,
            endpoint: required(&self.endpoint, "endpoint")?,
            protocol: required(&self.protocol, "protocol")?,
            provider: required(&self.provider, "provider")?,
            types: self.types.clone().unwrap_or_default(),
            secret: TelemetrySecret {
                name: secret.name.clone(),
                value: serde_json::from_str(&secret.value)
                    .unwrap_or_else(|_| Value::String(secret.value.clone())),
            },
        })
    }

    fn refreshed(&self, telemetry: Telemetry) -> Self {
        Self {
            telemetry_id: Some(telemetry.telemetry_id),
            name: Some(telemetry.name),
            endpoint: Some(telemetry.endpoint),
            protocol: Some(telemetry.protocol),
            provider: Some(telemetry.provider),
            types: merge_set(&self.types, Some(telemetry.types)),
            secret: self.secret.clone(),
            created_at: telemetry.created_at.or_else(|| self.created_at.clone()),
        }
    }
}

/// Schema of the `ngc_cloud_function_telemetry` resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A telemetry endpoint cloud functions can export to")
        .with_attribute(
            "telemetry_id",
            Attribute::computed_string().with_use_state_for_unknown(),
        )
        .with_attribute(
            "created_at",
            Attribute::computed_string().with_use_state_for_unknown(),
        )
        .with_attribute("name", Attribute::required_string().with_requires_replace())
        .with_attribute(
            "endpoint",
            Attribute::required_string().with_requires_replace(),
        )
        .with_attribute(
            "protocol",
            Attribute::required_string()
                .with_allowed_values(["HTTP", "GRPC"])
                .with_requires_replace(),
        )
        .with_attribute(
            "provider",
            Attribute::required_string()
                .with_allowed_values([
                    "PROMETHEUS",
                    "GRAFANA_CLOUD",
                    "SPLUNK",
                    "DATADOG",
                    "SERVICENOW",
                    "KRATOS",
                    "AZURE_MONITOR",
                    "KRATOS_THANOS",
                ])
                .with_requires_replace(),
        )
        .with_attribute(
            "types",
            Attribute::new(
                AttributeType::set(AttributeType::String),
                AttributeFlags::required(),
            )
            .with_allowed_values(["LOGS", "METRICS", "TRACES"])
            .with_requires_replace(),
        )
        .with_block(
            "secret",
            NestedBlock::single(secret_block())
                .with_min_items(1)
                .with_requires_replace(),
        )
}

/// Validate a resource configuration.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    validation::validate(&schema(), config)
}

/// Plan a change.
pub fn plan(prior: Option<&Value>, proposed: Value) -> PlanResult {
    plan_resource(&schema(), prior, proposed)
}

/// Create a telemetry endpoint.
#[instrument(skip_all)]
pub async fn create(ctx: &ResourceContext, planned: Value) -> Result<ApplyResult, ProviderError> {
    let model = TelemetryModel::from_value(planned)?;
    let request = model.to_request()?;
    let telemetry = ctx.api.create_telemetry(&request).await?;
    info!(telemetry_id = %telemetry.telemetry_id, "created telemetry endpoint");
    Ok(ApplyResult::applied(model.refreshed(telemetry).to_value()?))
}

/// Refresh a telemetry endpoint. A missing endpoint is removed from state.
#[instrument(skip_all)]
pub async fn read(ctx: &ResourceContext, current: Value) -> Result<Option<Value>, ProviderError> {
    let prior = TelemetryModel::from_value(current)?;
    match ctx.api.get_telemetry(prior.telemetry_id()?).await {
        Ok(telemetry) => Ok(Some(prior.refreshed(telemetry).to_value()?)),
        Err(err) if err.is_not_found() => {
            info!(telemetry_id = ?prior.telemetry_id, "telemetry endpoint no longer exists");
            Ok(None)
        },
        Err(err) => Err(err),
    }
}

/// Telemetry endpoints are immutable; every change is planned as a replacement.
pub async fn update(
    _ctx: &ResourceContext,
    _prior: Value,
    _planned: Value,
) -> Result<ApplyResult, ProviderError> {
    Err(ProviderError::Unimplemented(format!(
        "update not supported for {}: telemetry endpoints are replaced on change",
        RESOURCE_TYPE
    )))
}

/// Delete a telemetry endpoint.
#[instrument(skip_all)]
pub async fn delete(ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
    let model = TelemetryModel::from_value(current)?;
    let telemetry_id = model.telemetry_id()?;
    ctx.api.delete_telemetry(telemetry_id).await?;
    info!(telemetry_id, "deleted telemetry endpoint");
    Ok(())
}

/// Import a telemetry endpoint by its ID. The secret cannot be recovered.
#[instrument(skip(ctx))]
pub async fn import(ctx: &ResourceContext, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(ProviderError::Validation(
            "import ID must be a telemetry ID".to_string(),
        ));
    }
    let seed = TelemetryModel {
        telemetry_id: Some(id.to_string()),
        ..Default::default()
    };
    let state = read(ctx, seed.to_value()?)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("telemetry {} does not exist", id)))?;
    Ok(vec![ImportedResource::new(RESOURCE_TYPE, state)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_error_contains, assert_no_errors, MockNvcfApi, MOCK_CREATED_AT};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn context(api: &Arc<MockNvcfApi>) -> ResourceContext {
        ResourceContext::new(api.clone(), Duration::from_secs(60))
    }

    fn config() -> Value {
        json!({
            "name": "prometheus-metrics",
            "endpoint": "https://prometheus.example.com/api/v1/write",
            "protocol": "HTTP",
            "provider": "PROMETHEUS",
            "types": ["METRICS", "LOGS"],
            "secret": {"name": "prom-token", "value": "{\"token\": \"abc\"}"}
        })
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);

        let result = create(&ctx, plan(None, config()).planned_state).await.unwrap();
        assert_no_errors(&result.diagnostics);
        let state = result.state.unwrap();
        assert_eq!(state["telemetry_id"], "tel-1");
        assert_eq!(state["created_at"], MOCK_CREATED_AT);
        assert_eq!(state["types"], json!(["METRICS", "LOGS"]));

        let request = &api.telemetry_requests()[0];
        assert_eq!(request["secret"]["value"], json!({"token": "abc"}));

        let refreshed = read(&ctx, state.clone()).await.unwrap().unwrap();
        assert_eq!(refreshed, state);
    }

    #[tokio::test]
    async fn test_plain_secret_is_sent_as_string() {
        let api = Arc::new(MockNvcfApi::new());
        let mut config = config();
        config["secret"]["value"] = json!("plain-token");

        create(&context(&api), plan(None, config).planned_state)
            .await
            .unwrap();

        assert_eq!(api.telemetry_requests()[0]["secret"]["value"], "plain-token");
    }

    #[tokio::test]
    async fn test_read_missing_removes_from_state() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let state = create(&ctx, plan(None, config()).planned_state)
            .await
            .unwrap()
            .state
            .unwrap();
        api.remove_telemetry("tel-1");

        assert!(read(&ctx, state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_every_change_replaces() {
        let prior = json!({
            "telemetry_id": "tel-1",
            "created_at": MOCK_CREATED_AT,
            "name": "prometheus-metrics",
            "endpoint": "https://prometheus.example.com/api/v1/write",
            "protocol": "HTTP",
            "provider": "PROMETHEUS",
            "types": ["METRICS", "LOGS"],
            "secret": {"name": "prom-token", "value": "{\"token\": \"abc\"}"}
        });

        assert!(plan(Some(&prior), config()).changes.is_empty());

        let mut rotated = config();
        rotated["secret"]["value"] = json!("new-token");
        let plan = plan(Some(&prior), rotated);
        assert!(plan.requires_replace);
        assert!(plan.planned_state["telemetry_id"].is_null());
    }

    #[tokio::test]
    async fn test_reordered_types_plan_no_change() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let state = create(&ctx, plan(None, config()).planned_state)
            .await
            .unwrap()
            .state
            .unwrap();

        let mut reordered = config();
        reordered["types"] = json!(["LOGS", "METRICS"]);
        let reordered_plan = plan(Some(&state), reordered);
        assert!(reordered_plan.changes.is_empty());
        assert!(!reordered_plan.requires_replace);

        let mut narrowed = config();
        narrowed["types"] = json!(["LOGS"]);
        assert!(plan(Some(&state), narrowed).requires_replace);
    }

    #[tokio::test]
    async fn test_plan_after_read_has_no_changes() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let state = create(&ctx, plan(None, config()).planned_state)
            .await
            .unwrap()
            .state
            .unwrap();

        let refreshed = read(&ctx, state).await.unwrap().unwrap();

        assert!(plan(Some(&refreshed), config()).changes.is_empty());
    }

    #[tokio::test]
    async fn test_update_is_rejected() {
        let api = Arc::new(MockNvcfApi::new());
        let err = update(&context(&api), config(), config()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Unimplemented(_)));
        assert!(err.to_string().contains(RESOURCE_TYPE));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_import() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        create(&ctx, plan(None, config()).planned_state).await.unwrap();

        let imported = import(&ctx, "tel-1").await.unwrap();
        assert_eq!(imported[0].state["name"], "prometheus-metrics");
        assert!(imported[0].state["secret"].is_null());

        delete(&ctx, imported[0].state.clone()).await.unwrap();
        assert!(import(&ctx, "tel-1").await.unwrap_err().is_not_found());
        assert!(matches!(
            import(&ctx, " ").await.unwrap_err(),
            ProviderError::Validation(_)
        ));
    }

    #[test]
    fn test_validate() {
        assert_no_errors(&validate(&config()));

        let mut bad = config();
        bad["types"] = json!(["EVENTS"]);
        bad["provider"] = json!("NAGIOS");
        let diagnostics = validate(&bad);
        assert_error_contains(&diagnostics, "types");
        assert_error_contains(&diagnostics, "provider");

        let mut missing_secret = config();
        missing_secret["secret"] = Value::Null;
        assert_error_contains(&validate(&missing_secret), "secret");
    }
}
