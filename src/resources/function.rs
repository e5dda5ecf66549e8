//! The `ngc_cloud_function` resource and data source.
//!
//! One resource instance tracks one function version. Creating it creates the
//! version, authorizes the declared parties and deploys it; any change that
//! does not replace the whole function mints a new version of the same
//! function and deletes the previous one once the new version is ACTIVE.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::api::NvcfApi;
use crate::artifact;
use crate::deployment::{self, PollOptions};
use crate::error::ProviderError;
use crate::models::{
    ArtifactRef, AuthorizedParty, CreateFunctionRequest, Deployment, DeploymentSpecification,
    EnvVar, FunctionArtifact, FunctionVersion, HealthCheck, SecretEntry,
};
use crate::plan::plan_resource;
use crate::resources::{merge_list, merge_set, secret_block, ResourceContext, SecretModel};
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema,
};
use crate::types::{ApplyResult, ImportedResource, PlanResult};
use crate::validation;

/// Resource type name.
pub const RESOURCE_TYPE: &str = "ngc_cloud_function";

/// Data source type name.
pub const DATA_SOURCE_TYPE: &str = "ngc_cloud_function";

/// Deadline for create and update when `timeouts` leaves it unset.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// State of an `ngc_cloud_function` resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionModel {
    pub function_id: Option<String>,
    pub version_id: Option<String>,
    pub nca_id: Option<String>,
    pub status: Option<String>,
    pub function_name: Option<String>,
    pub container_image: Option<String>,
    pub container_args: Option<String>,
    pub helm_chart: Option<String>,
    pub helm_chart_service_name: Option<String>,
    pub inference_url: Option<String>,
    pub inference_port: Option<i64>,
    pub health: Option<HealthModel>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub api_body_format: Option<String>,
    pub function_type: Option<String>,
    pub models: Option<Vec<ArtifactRef>>,
    pub resources: Option<Vec<ArtifactRef>>,
    pub secrets: Option<Vec<SecretModel>>,
    pub container_environment: Option<Vec<EnvVar>>,
    pub authorized_parties: Option<Vec<String>>,
    pub deployment_specifications: Option<Vec<DeploymentSpecModel>>,
    pub keep_failed_resource: Option<bool>,
    pub timeouts: Option<TimeoutsModel>,
}

/// The `health` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthModel {
    pub protocol: String,
    pub uri: String,
    pub port: i64,
    pub timeout: String,
    pub expected_status_code: i64,
}

impl From<HealthModel> for HealthCheck {
    fn from(health: HealthModel) -> Self {
        Self {
            protocol: health.protocol,
            uri: health.uri,
            port: health.port,
            timeout: health.timeout,
            expected_status_code: health.expected_status_code,
        }
    }
}

impl From<HealthCheck> for HealthModel {
    fn from(health: HealthCheck) -> Self {
        Self {
            protocol: health.protocol,
            uri: health.uri,
            port: health.port,
            timeout: health.timeout,
            expected_status_code: health.expected_status_code,
        }
    }
}

/// One entry of the `deployment_specifications` block.
///
/// `configuration` is kept as JSON text so the configured formatting survives
/// a refresh when the backend returns an equal document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentSpecModel {
    pub backend: Option<String>,
    pub gpu: String,
    pub instance_type: String,
    pub min_instances: i64,
    pub max_instances: i64,
    pub max_request_concurrency: Option<i64>,
    pub configuration: Option<String>,
    pub clusters: Option<Vec<String>>,
    pub regions: Option<Vec<String>>,
}

impl DeploymentSpecModel {
    fn to_specification(&self, index: usize) -> Result<DeploymentSpecification, ProviderError> {
        let configuration = self
            .configuration
            .as_deref()
            .map(|text| parse_configuration(index, text))
            .transpose()?;

        Ok(DeploymentSpecification {
            backend: self.backend.clone(),
            gpu: self.gpu.clone(),
            instance_type: self.instance_type.clone(),
            min_instances: self.min_instances,
            max_instances: self.max_instances,
            max_request_concurrency: self.max_request_concurrency,
            configuration,
            clusters: self.clusters.clone().filter(|c| !c.is_empty()),
            regions: self.regions.clone().filter(|r| !r.is_empty()),
        })
    }

    fn from_specification(spec: DeploymentSpecification, prior: Option<&DeploymentSpecModel>) -> Self {
        let configuration = spec.configuration.map(|value| {
            prior
                .and_then(|p| p.configuration.as_ref())
                .filter(|text| serde_json::from_str::<Value>(text).ok().as_ref() == Some(&value))
                .cloned()
                .unwrap_or_else(|| value.to_string())
        });

        Self {
            backend: spec.backend,
            gpu: spec.gpu,
            instance_type: spec.instance_type,
            min_instances: spec.min_instances,
            max_instances: spec.max_instances,
            max_request_concurrency: spec.max_request_concurrency,
            configuration,
            clusters: merge_list(&prior.and_then(|p| p.clusters.clone()), spec.clusters),
            regions: merge_list(&prior.and_then(|p| p.regions.clone()), spec.regions),
        }
    }
}

fn parse_configuration(index: usize, text: &str) -> Result<Value, ProviderError> {
    serde_json::from_str(text).map_err(|e| {
        ProviderError::Validation(format!(
            "deployment_specifications[{}].configuration is not valid JSON: {}",
            index, e
        ))
    })
}

/// The `timeouts` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsModel {
    pub create: Option<String>,
    pub update: Option<String>,
}

fn parse_timeout(name: &str, value: Option<&str>) -> Result<Duration, ProviderError> {
    match value {
        Some(text) => humantime::parse_duration(text).map_err(|e| {
            ProviderError::Validation(format!("invalid timeouts.{} \"{}\": {}", name, text, e))
        }),
        None => Ok(DEFAULT_TIMEOUT),
    }
}

fn missing(attribute: &str) -> ProviderError {
    ProviderError::Validation(format!("{} must be set", attribute))
}

fn non_empty<T>(items: &Option<Vec<T>>) -> Option<Vec<T>>
where
    T: Clone,
{
    items.clone().filter(|items| !items.is_empty())
}

impl FunctionModel {
    /// Decode a state or configuration document.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Encode as a state document.
    pub fn to_value(&self) -> Result<Value, ProviderError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Function and version ID recorded in state.
    pub fn identity(&self) -> Result<(String, String), ProviderError> {
        let function_id = self.function_id.clone().filter(|id| !id.is_empty());
        let version_id = self.version_id.clone().filter(|id| !id.is_empty());
        match (function_id, version_id) {
            (Some(function_id), Some(version_id)) => Ok((function_id, version_id)),
            _ => Err(ProviderError::Validation(
                "function_id and version_id must be set".to_string(),
            )),
        }
    }

    /// Build the create-function body. Unset optional fields stay off the wire.
    pub fn to_request(&self) -> Result<CreateFunctionRequest, ProviderError> {
        let name = self.function_name.clone().ok_or_else(|| missing("function_name"))?;
        let inference_url = self.inference_url.clone().ok_or_else(|| missing("inference_url"))?;
        let artifact = FunctionArtifact::from_parts(
            self.container_image.clone().filter(|s| !s.is_empty()),
            self.container_args.clone().filter(|s| !s.is_empty()),
            self.helm_chart.clone().filter(|s| !s.is_empty()),
            self.helm_chart_service_name.clone().filter(|s| !s.is_empty()),
        )?;

        let secrets = non_empty(&self.secrets).map(|secrets| {
            secrets
                .into_iter()
                .map(|secret| SecretEntry {
                    name: secret.name,
                    value: Value::String(secret.value),
                })
                .collect()
        });

        Ok(CreateFunctionRequest {
            name,
            inference_url,
            inference_port: self.inference_port,
            artifact,
            health: self.health.clone().map(HealthCheck::from),
            description: self.description.clone(),
            tags: non_empty(&self.tags),
            api_body_format: self.api_body_format.clone(),
            function_type: self.function_type.clone(),
            models: non_empty(&self.models),
            resources: non_empty(&self.resources),
            secrets,
            container_environment: non_empty(&self.container_environment),
        })
    }

    /// Deployment specifications with their configuration parsed.
    pub fn deployment_specifications(&self) -> Result<Vec<DeploymentSpecification>, ProviderError> {
        self.deployment_specifications
            .iter()
            .flatten()
            .enumerate()
            .map(|(index, spec)| spec.to_specification(index))
            .collect()
    }

    fn parties(&self) -> Vec<AuthorizedParty> {
        self.authorized_parties
            .iter()
            .flatten()
            .map(|nca_id| AuthorizedParty {
                nca_id: nca_id.clone(),
                client_id: None,
            })
            .collect()
    }

    fn create_timeout(&self) -> Result<Duration, ProviderError> {
        parse_timeout("create", self.timeouts.as_ref().and_then(|t| t.create.as_deref()))
    }

    fn update_timeout(&self) -> Result<Duration, ProviderError> {
        parse_timeout("update", self.timeouts.as_ref().and_then(|t| t.update.as_deref()))
    }

    fn record_created(&mut self, created: &FunctionVersion) {
        self.function_id = Some(created.id.clone());
        self.version_id = Some(created.version_id.clone());
        self.nca_id = Some(created.nca_id.clone()).filter(|id| !id.is_empty());
        self.status = created.status.clone();
    }

    /// Merge what the backend reports into this state.
    ///
    /// Secrets and provider-only settings are carried over unchanged.
    fn refreshed(
        &self,
        version: FunctionVersion,
        deployment: Option<Deployment>,
        parties: Vec<AuthorizedParty>,
    ) -> Self {
        let status = deployment
            .as_ref()
            .map(|d| d.function_status.to_string())
            .or(version.status);

        let prior_specs = self.deployment_specifications.as_deref().unwrap_or_default();
        let specifications = deployment.map(|d| {
            d.deployment_specifications
                .into_iter()
                .enumerate()
                .map(|(i, spec)| DeploymentSpecModel::from_specification(spec, prior_specs.get(i)))
                .collect()
        });

        let party_ids = parties.into_iter().map(|p| p.nca_id).collect();

        Self {
            function_id: Some(version.id),
            version_id: Some(version.version_id),
            nca_id: Some(version.nca_id).filter(|id| !id.is_empty()),
            status,
            function_name: Some(version.name),
            container_image: version.container_image,
            container_args: version.container_args,
            helm_chart: version.helm_chart,
            helm_chart_service_name: version.helm_chart_service_name,
            inference_url: version.inference_url.or_else(|| self.inference_url.clone()),
            inference_port: version.inference_port.or(self.inference_port),
            health: version.health.map(HealthModel::from).or_else(|| self.health.clone()),
            description: version.description,
            tags: merge_set(&self.tags, version.tags),
            api_body_format: version.api_body_format.or_else(|| self.api_body_format.clone()),
            function_type: version.function_type.or_else(|| self.function_type.clone()),
            models: merge_list(&self.models, version.models),
            resources: merge_list(&self.resources, version.resources),
            secrets: self.secrets.clone(),
            container_environment: merge_list(&self.container_environment, version.container_environment),
            authorized_parties: merge_set(&self.authorized_parties, Some(party_ids)),
            deployment_specifications: merge_list(&self.deployment_specifications, specifications),
            keep_failed_resource: Some(self.keep_failed_resource.unwrap_or(false)),
            timeouts: self.timeouts.clone(),
        }
    }

    /// What the backend stores for a version, in a comparable form.
    ///
    /// Identity, status and provider-only settings are cleared; set-like
    /// collections are sorted and empty collections collapse to `None`.
    fn backend_view(&self) -> Self {
        let sorted = |items: &Option<Vec<String>>| {
            non_empty(items).map(|mut items| {
                items.sort();
                items
            })
        };
        Self {
            function_id: None,
            version_id: None,
            nca_id: None,
            status: None,
            tags: sorted(&self.tags),
            authorized_parties: sorted(&self.authorized_parties),
            secrets: non_empty(&self.secrets).map(|mut secrets| {
                secrets.sort();
                secrets
            }),
            models: non_empty(&self.models),
            resources: non_empty(&self.resources),
            container_environment: non_empty(&self.container_environment),
            deployment_specifications: non_empty(&self.deployment_specifications),
            keep_failed_resource: None,
            timeouts: None,
            ..self.clone()
        }
    }
}

// =========================================================================
// Schema
// =========================================================================

fn artifact_block(kind: &str) -> Block {
    Block::new()
        .with_description(format!("A {} artifact mounted into the function", kind))
        .with_attribute("name", Attribute::required_string())
        .with_attribute("version", Attribute::required_string())
        .with_attribute(
            "uri",
            Attribute::required_string().with_description(format!(
                "Artifact URI. URIs without a scheme are prefixed with ${} or {}",
                artifact::ENV_ARTIFACT_HOST,
                artifact::DEFAULT_ARTIFACT_HOST
            )),
        )
}

fn health_block() -> Block {
    Block::new()
        .with_attribute(
            "protocol",
            Attribute::required_string().with_allowed_values(["HTTP", "gRPC"]),
        )
        .with_attribute("uri", Attribute::required_string())
        .with_attribute("port", Attribute::required_int64())
        .with_attribute(
            "timeout",
            Attribute::optional_string()
                .with_default(Value::String("PT10S".to_string()))
                .with_description("ISO-8601 duration"),
        )
        .with_attribute("expected_status_code", Attribute::required_int64())
}

fn environment_block() -> Block {
    Block::new()
        .with_attribute("key", Attribute::required_string())
        .with_attribute("value", Attribute::required_string())
}

fn deployment_specification_block() -> Block {
    Block::new()
        .with_attribute("backend", Attribute::optional_string())
        .with_attribute("gpu", Attribute::required_string())
        .with_attribute("instance_type", Attribute::required_string())
        .with_attribute("min_instances", Attribute::required_int64())
        .with_attribute("max_instances", Attribute::required_int64())
        .with_attribute("max_request_concurrency", Attribute::optional_int64())
        .with_attribute(
            "configuration",
            Attribute::optional_string().with_description("Free-form JSON document"),
        )
        .with_attribute("clusters", Attribute::optional_string_list())
        .with_attribute("regions", Attribute::optional_string_list())
}

fn timeouts_block() -> Block {
    Block::new()
        .with_attribute(
            "create",
            Attribute::optional_string().with_description("Create deadline, e.g. \"90m\""),
        )
        .with_attribute(
            "update",
            Attribute::optional_string().with_description("Update deadline, e.g. \"90m\""),
        )
}

/// Schema of the `ngc_cloud_function` resource.
pub fn schema() -> Schema {
    Schema::v0()
        .with_description("A version of an NVIDIA Cloud Function with its deployment")
        .with_attribute(
            "function_id",
            Attribute::optional_computed_string()
                .with_requires_replace()
                .with_use_state_for_unknown()
                .with_description("Function to add the version to. A new function is created when unset"),
        )
        .with_attribute("version_id", Attribute::computed_string())
        .with_attribute(
            "nca_id",
            Attribute::computed_string().with_use_state_for_unknown(),
        )
        .with_attribute(
            "status",
            Attribute::computed_string().with_description("Deployment status of the version"),
        )
        .with_attribute(
            "function_name",
            Attribute::required_string().with_requires_replace(),
        )
        .with_attribute("container_image", Attribute::optional_string())
        .with_attribute("container_args", Attribute::optional_string())
        .with_attribute("helm_chart", Attribute::optional_string())
        .with_attribute("helm_chart_service_name", Attribute::optional_string())
        .with_attribute("inference_url", Attribute::required_string())
        .with_attribute(
            "inference_port",
            Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                .with_use_state_for_unknown(),
        )
        .with_attribute("description", Attribute::optional_string())
        .with_attribute("tags", Attribute::optional_string_set())
        .with_attribute(
            "api_body_format",
            Attribute::optional_computed_string()
                .with_default(Value::String("CUSTOM".to_string()))
                .with_allowed_values(["PREDICT_V2", "CUSTOM"]),
        )
        .with_attribute(
            "function_type",
            Attribute::optional_computed_string()
                .with_default(Value::String("DEFAULT".to_string()))
                .with_allowed_values(["DEFAULT", "STREAMING"]),
        )
        .with_attribute(
            "authorized_parties",
            Attribute::optional_string_set().with_description("NCA IDs allowed to invoke the version"),
        )
        .with_attribute(
            "keep_failed_resource",
            Attribute::optional_bool()
                .with_default(Value::Bool(false))
                .with_description("Keep the function version when its deployment fails"),
        )
        .with_block(
            "health",
            NestedBlock::single(health_block()).with_use_state_for_unknown(),
        )
        .with_block("models", NestedBlock::list(artifact_block("model")))
        .with_block("resources", NestedBlock::list(artifact_block("resource")))
        .with_block("secrets", NestedBlock::set(secret_block()))
        .with_block(
            "container_environment",
            NestedBlock::list(environment_block()),
        )
        .with_block(
            "deployment_specifications",
            NestedBlock::list(deployment_specification_block()),
        )
        .with_block("timeouts", NestedBlock::single(timeouts_block()))
}

fn computed(attr_type: AttributeType) -> Attribute {
    Attribute::new(attr_type, AttributeFlags::computed())
}

/// Schema of the `ngc_cloud_function` data source.
pub fn data_source_schema() -> Schema {
    let mut schema = Schema::v0()
        .with_description("Reads an existing NVIDIA Cloud Function version")
        .with_attribute("function_id", Attribute::required_string())
        .with_attribute("version_id", Attribute::required_string())
        .with_attribute("inference_port", computed(AttributeType::Int64))
        .with_attribute("tags", computed(AttributeType::set(AttributeType::String)))
        .with_attribute(
            "authorized_parties",
            computed(AttributeType::set(AttributeType::String)),
        )
        .with_block("health", NestedBlock::single(health_block()))
        .with_block("models", NestedBlock::list(artifact_block("model")))
        .with_block("resources", NestedBlock::list(artifact_block("resource")))
        .with_block(
            "container_environment",
            NestedBlock::list(environment_block()),
        )
        .with_block(
            "deployment_specifications",
            NestedBlock::list(deployment_specification_block()),
        );

    for name in [
        "nca_id",
        "status",
        "function_name",
        "container_image",
        "container_args",
        "helm_chart",
        "helm_chart_service_name",
        "inference_url",
        "description",
        "api_body_format",
        "function_type",
    ] {
        schema = schema.with_attribute(name, computed(AttributeType::String));
    }
    schema
}

// =========================================================================
// Validate & Plan
// =========================================================================

/// Validate a resource configuration without calling the backend.
pub fn validate(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = validation::validate(&schema(), config);
    let is_set = |name: &str| config.get(name).is_some_and(|v| !v.is_null());

    match (is_set("container_image"), is_set("helm_chart")) {
        (true, true) => diagnostics.push(
            Diagnostic::error("Conflicting artifact")
                .with_detail("only one of container_image or helm_chart may be set")
                .with_attribute("helm_chart"),
        ),
        (false, false) => diagnostics.push(
            Diagnostic::error("Missing artifact")
                .with_detail("one of container_image or helm_chart must be set"),
        ),
        _ => {},
    }

    if is_set("helm_chart") && !is_set("helm_chart_service_name") {
        diagnostics.push(
            Diagnostic::error("Missing required attribute 'helm_chart_service_name'")
                .with_detail("helm_chart_service_name is required when helm_chart is set")
                .with_attribute("helm_chart_service_name"),
        );
    }

    if let Some(Value::Array(specs)) = config.get("deployment_specifications") {
        for (index, spec) in specs.iter().enumerate() {
            if let Some(Value::String(text)) = spec.get("configuration") {
                if let Err(err) = parse_configuration(index, text) {
                    diagnostics.push(
                        err.to_diagnostic()
                            .with_attribute(format!("deployment_specifications.{}.configuration", index)),
                    );
                }
            }
        }
    }

    for name in ["create", "update"] {
        if let Some(Value::String(text)) = config.pointer(&format!("/timeouts/{}", name)) {
            if let Err(err) = parse_timeout(name, Some(text)) {
                diagnostics.push(err.to_diagnostic().with_attribute(format!("timeouts.{}", name)));
            }
        }
    }

    diagnostics
}

/// Plan a change, expanding short artifact URIs first.
pub fn plan(prior: Option<&Value>, mut proposed: Value) -> PlanResult {
    if !proposed.is_null() {
        artifact::normalize_artifacts(&mut proposed, &artifact::artifact_host());
        if let Some(prior) = prior {
            keep_configuration_text(prior, &mut proposed);
        }
    }
    plan_resource(&schema(), prior, proposed)
}

/// Reuse the prior `configuration` text of each deployment specification
/// when the proposed text parses to the same document.
fn keep_configuration_text(prior: &Value, proposed: &mut Value) {
    let (Some(Value::Array(before)), Some(Value::Array(after))) = (
        prior.get("deployment_specifications"),
        proposed.get_mut("deployment_specifications"),
    ) else {
        return;
    };

    for (old, new) in before.iter().zip(after.iter_mut()) {
        let (Some(Value::String(old_text)), Some(Value::String(new_text))) =
            (old.get("configuration"), new.get("configuration"))
        else {
            continue;
        };
        if old_text == new_text {
            continue;
        }
        let same = match (
            serde_json::from_str::<Value>(old_text),
            serde_json::from_str::<Value>(new_text),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            let text = old_text.clone();
            new["configuration"] = Value::String(text);
        }
    }
}

// =========================================================================
// Lifecycle
// =========================================================================

/// Create a function version, authorize it and deploy it.
#[instrument(skip_all)]
pub async fn create(ctx: &ResourceContext, planned: Value) -> Result<ApplyResult, ProviderError> {
    let model = FunctionModel::from_value(planned)?;
    let options = PollOptions::new(ctx.poll_interval, model.create_timeout()?);
    let function_id = model.function_id.clone().filter(|id| !id.is_empty());
    create_version(ctx.api.as_ref(), model, function_id.as_deref(), options).await
}

/// Refresh a function version from the backend.
///
/// A version that no longer exists is an error rather than a removal.
#[instrument(skip_all)]
pub async fn read(ctx: &ResourceContext, current: Value) -> Result<Option<Value>, ProviderError> {
    let prior = FunctionModel::from_value(current)?;
    let (function_id, version_id) = prior.identity()?;
    let refreshed = fetch(ctx.api.as_ref(), &function_id, &version_id, &prior).await?;
    Ok(Some(refreshed.to_value()?))
}

/// Replace the tracked version with a new version of the same function.
///
/// The previous version is deleted only once the new one is fully deployed;
/// failing to delete it is reported as a warning.
#[instrument(skip_all)]
pub async fn update(
    ctx: &ResourceContext,
    prior: Value,
    planned: Value,
) -> Result<ApplyResult, ProviderError> {
    let prior = FunctionModel::from_value(prior)?;
    let mut planned = FunctionModel::from_value(planned)?;
    let (function_id, old_version_id) = prior.identity()?;
    planned.function_id = Some(function_id.clone());

    if prior.backend_view() == planned.backend_view() {
        planned.version_id = prior.version_id.clone();
        planned.nca_id = prior.nca_id.clone();
        planned.status = prior.status.clone();
        info!(
            function_id = %function_id,
            version_id = %old_version_id,
            "only provider settings changed; keeping current version"
        );
        return Ok(ApplyResult::applied(planned.to_value()?));
    }

    let options = PollOptions::new(ctx.poll_interval, planned.update_timeout()?);
    let api = ctx.api.as_ref();
    let result = create_version(api, planned, Some(function_id.as_str()), options).await?;

    if result.has_errors() {
        warn!(
            function_id = %function_id,
            version_id = %old_version_id,
            "new version did not deploy; previous version left in place"
        );
        if result.state.is_none() {
            return Ok(result);
        }
        return Ok(result.with_diagnostic(
            Diagnostic::warning(format!(
                "Previous function version {} is still deployed but no longer tracked",
                old_version_id
            ))
            .with_detail("Delete it manually once the new version is fixed or removed."),
        ));
    }

    match api.delete_function_version(&function_id, &old_version_id).await {
        Ok(()) => {
            info!(function_id = %function_id, version_id = %old_version_id, "deleted previous version");
            Ok(result)
        },
        Err(err) => {
            warn!(
                function_id = %function_id,
                version_id = %old_version_id,
                error = %err,
                "failed to delete previous version"
            );
            Ok(result.with_diagnostic(
                Diagnostic::warning(format!(
                    "Failed to delete previous function version {}",
                    old_version_id
                ))
                .with_detail(err.to_string()),
            ))
        },
    }
}

/// Delete the tracked function version.
#[instrument(skip_all)]
pub async fn delete(ctx: &ResourceContext, current: Value) -> Result<(), ProviderError> {
    let model = FunctionModel::from_value(current)?;
    let (function_id, version_id) = model.identity()?;
    ctx.api
        .delete_function_version(&function_id, &version_id)
        .await?;
    info!(%function_id, %version_id, "deleted function version");
    Ok(())
}

/// Split an import ID of the form `<functionID>,<versionID>`.
pub fn parse_import_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split(',').collect::<Vec<_>>().as_slice() {
        [function_id, version_id] if !function_id.trim().is_empty() && !version_id.trim().is_empty() => {
            Ok((function_id.trim().to_string(), version_id.trim().to_string()))
        },
        _ => Err(ProviderError::Validation(format!(
            "invalid import ID \"{}\": expected <functionID>,<versionID>",
            id
        ))),
    }
}

/// Import an existing function version.
#[instrument(skip(ctx))]
pub async fn import(ctx: &ResourceContext, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
    let (function_id, version_id) = parse_import_id(id)?;
    let seed = FunctionModel {
        function_id: Some(function_id.clone()),
        version_id: Some(version_id.clone()),
        ..Default::default()
    };
    let state = fetch(ctx.api.as_ref(), &function_id, &version_id, &seed).await?;
    Ok(vec![ImportedResource::new(RESOURCE_TYPE, state.to_value()?)])
}

/// Read the data source: an existing version looked up by ID.
#[instrument(skip_all)]
pub async fn read_data_source(ctx: &ResourceContext, config: Value) -> Result<Value, ProviderError> {
    let query = FunctionModel::from_value(config)?;
    let (function_id, version_id) = query.identity()?;
    let found = fetch(ctx.api.as_ref(), &function_id, &version_id, &FunctionModel::default()).await?;

    let declared = data_source_schema().block;
    let mut value = found.to_value()?;
    if let Value::Object(map) = &mut value {
        map.retain(|key, _| {
            declared.attributes.contains_key(key) || declared.blocks.contains_key(key)
        });
    }
    Ok(value)
}

async fn fetch(
    api: &dyn NvcfApi,
    function_id: &str,
    version_id: &str,
    prior: &FunctionModel,
) -> Result<FunctionModel, ProviderError> {
    let version = api
        .list_function_versions(function_id)
        .await?
        .into_iter()
        .find(|v| v.id == function_id && v.version_id == version_id)
        .ok_or_else(|| {
            ProviderError::NotFound(format!(
                "function {} version {} does not exist",
                function_id, version_id
            ))
        })?;

    let deployment = match api.get_deployment(function_id, version_id).await {
        Ok(deployment) => Some(deployment),
        Err(err) if err.is_not_found() => {
            debug!(function_id, version_id, "version has no deployment");
            None
        },
        Err(err) => return Err(err),
    };

    let parties = match api.get_authorized_parties(function_id, version_id).await {
        Ok(parties) => parties,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err) => return Err(err),
    };

    Ok(prior.refreshed(version, deployment, parties))
}

async fn create_version(
    api: &dyn NvcfApi,
    mut model: FunctionModel,
    function_id: Option<&str>,
    options: PollOptions,
) -> Result<ApplyResult, ProviderError> {
    let request = model.to_request()?;
    let specifications = model.deployment_specifications()?;
    let parties = model.parties();

    let created = api.create_function(function_id, &request).await?;
    info!(
        function_id = %created.id,
        version_id = %created.version_id,
        "created function version"
    );
    model.record_created(&created);

    match provision(api, &created, &parties, specifications, options).await {
        Ok(deployment) => {
            if let Some(deployment) = deployment {
                model.status = Some(deployment.function_status.to_string());
            }
            Ok(ApplyResult::applied(model.to_value()?))
        },
        Err(err) => rollback(api, &model, &created, err).await,
    }
}

async fn provision(
    api: &dyn NvcfApi,
    created: &FunctionVersion,
    parties: &[AuthorizedParty],
    specifications: Vec<DeploymentSpecification>,
    options: PollOptions,
) -> Result<Option<Deployment>, ProviderError> {
    if !parties.is_empty() {
        api.authorize_parties(&created.id, &created.version_id, parties)
            .await?;
        debug!(parties = parties.len(), "authorized parties");
    }
    deployment::deploy(api, &created.id, &created.version_id, specifications, options).await
}

/// Handle a failure after the version exists.
///
/// The version is deleted and the original error returned, unless the caller
/// keeps failed versions or the delete itself fails. In both of those cases
/// the version still exists, so its state is returned with the errors.
async fn rollback(
    api: &dyn NvcfApi,
    model: &FunctionModel,
    created: &FunctionVersion,
    err: ProviderError,
) -> Result<ApplyResult, ProviderError> {
    let state = model.to_value()?;

    if model.keep_failed_resource.unwrap_or(false) {
        warn!(
            function_id = %created.id,
            version_id = %created.version_id,
            error = %err,
            "keeping function version after failed deployment"
        );
        return Ok(ApplyResult::partial(state, err));
    }

    match api
        .delete_function_version(&created.id, &created.version_id)
        .await
    {
        Ok(()) => {
            info!(
                function_id = %created.id,
                version_id = %created.version_id,
                "deleted function version after failed deployment"
            );
            Err(err)
        },
        Err(cleanup) => {
            error!(
                function_id = %created.id,
                version_id = %created.version_id,
                error = %cleanup,
                "failed to delete function version after failed deployment"
            );
            Ok(ApplyResult::partial(state, err).with_diagnostic(
                Diagnostic::error("Failed to delete function version after failed deployment")
                    .with_detail(cleanup.to_string()),
            ))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DeploymentStatus;
    use crate::schema::DiagnosticSeverity;
    use crate::testing::{assert_error_contains, assert_no_errors, MockNvcfApi, MOCK_NCA_ID};
    use serde_json::json;
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_secs(60);

    fn context(api: &Arc<MockNvcfApi>) -> ResourceContext {
        ResourceContext::new(api.clone(), INTERVAL)
    }

    fn container_config() -> Value {
        json!({
            "function_name": "echo",
            "inference_url": "/echo",
            "inference_port": 8000,
            "container_image": "nvcr.io/my-org/echo:1.0",
            "health": {
                "protocol": "HTTP",
                "uri": "/health",
                "port": 8000,
                "expected_status_code": 200
            },
            "secrets": [{"name": "HF_TOKEN", "value": "hf-secret"}]
        })
    }

    fn spec(min: i64, max: i64) -> Value {
        json!({
            "backend": "GFN",
            "gpu": "L40",
            "instance_type": "gl40_1.br20_2xlarge",
            "min_instances": min,
            "max_instances": max,
            "max_request_concurrency": 1,
            "configuration": "{ \"replicas\": 1 }"
        })
    }

    fn with(mut config: Value, key: &str, value: Value) -> Value {
        config[key] = value;
        config
    }

    fn planned(config: Value) -> Value {
        plan(None, config).planned_state
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_container_function_sends_only_container_fields() {
        let api = Arc::new(MockNvcfApi::new());
        let result = create(&context(&api), planned(container_config()))
            .await
            .unwrap();

        assert_no_errors(&result.diagnostics);
        let state = result.state.unwrap();
        assert_eq!(state["function_id"], "fn-1");
        assert_eq!(state["version_id"], "ver-1");
        assert_eq!(state["nca_id"], MOCK_NCA_ID);

        let requests = api.function_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["containerImage"], "nvcr.io/my-org/echo:1.0");
        assert!(requests[0].get("helmChart").is_none());
        assert_eq!(requests[0]["health"]["timeout"], "PT10S");
        assert_eq!(requests[0]["secrets"][0]["value"], "hf-secret");
        assert!(requests[0].get("description").is_none());
        assert_eq!(api.call_count("authorize_parties"), 0);
        assert_eq!(api.call_count("create_deployment"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_helm_function_sends_only_helm_fields() {
        let api = Arc::new(MockNvcfApi::new());
        let mut config = container_config();
        config["container_image"] = Value::Null;
        config["helm_chart"] = json!("https://helm.ngc.nvidia.com/my-org/charts/echo-1.0.tgz");
        config["helm_chart_service_name"] = json!("echo-svc");

        create(&context(&api), planned(config)).await.unwrap();

        let request = &api.function_requests()[0];
        assert_eq!(request["helmChartServiceName"], "echo-svc");
        assert!(request.get("containerImage").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_authorizes_and_deploys() {
        let api = Arc::new(
            MockNvcfApi::new()
                .with_deployment_statuses([DeploymentStatus::Deploying, DeploymentStatus::Active]),
        );
        let config = with(
            with(container_config(), "authorized_parties", json!(["nca-2", "nca-3"])),
            "deployment_specifications",
            json!([spec(1, 2)]),
        );

        let result = create(&context(&api), planned(config)).await.unwrap();

        let state = result.state.unwrap();
        assert_eq!(state["status"], "ACTIVE");
        assert_eq!(
            api.calls(),
            vec![
                "create_function",
                "authorize_parties",
                "create_deployment",
                "get_deployment",
                "get_deployment"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_round_trips_through_read() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(
            with(container_config(), "authorized_parties", json!(["nca-3", "nca-2"])),
            "deployment_specifications",
            json!([spec(1, 2)]),
        );

        let created = create(&ctx, planned(config)).await.unwrap().state.unwrap();
        let refreshed = read(&ctx, created.clone()).await.unwrap().unwrap();

        let spec = &refreshed["deployment_specifications"][0];
        assert_eq!(spec["gpu"], "L40");
        assert_eq!(spec["instance_type"], "gl40_1.br20_2xlarge");
        assert_eq!(spec["min_instances"], 1);
        assert_eq!(spec["max_instances"], 2);
        assert_eq!(spec["max_request_concurrency"], 1);
        // Semantically equal JSON keeps the configured text.
        assert_eq!(spec["configuration"], "{ \"replicas\": 1 }");
        assert_eq!(refreshed["authorized_parties"], json!(["nca-3", "nca-2"]));
        assert_eq!(refreshed["secrets"], created["secrets"]);
        assert_eq!(refreshed, created);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_without_deployment_succeeds() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let created = create(&ctx, planned(container_config()))
            .await
            .unwrap()
            .state
            .unwrap();

        let refreshed = read(&ctx, created).await.unwrap().unwrap();

        assert!(refreshed["deployment_specifications"].is_null());
        assert_eq!(refreshed["status"], "INACTIVE");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_missing_version_is_error() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let created = create(&ctx, planned(container_config()))
            .await
            .unwrap()
            .state
            .unwrap();
        // A second version keeps the function itself alive.
        create(&ctx, planned(with(container_config(), "function_id", json!("fn-1"))))
            .await
            .unwrap();
        api.remove_function_version("fn-1", "ver-1");

        let err = read(&ctx, created).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("ver-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_instances_surface_backend_message_and_roll_back() {
        let api = Arc::new(MockNvcfApi::new());
        let config = with(
            container_config(),
            "deployment_specifications",
            json!([spec(2, 1)]),
        );

        let err = create(&context(&api), planned(config)).await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert!(err.message().contains("Validation failed"));
        assert!(!api.has_version("fn-1", "ver-1"));
        assert_eq!(
            api.deleted_versions(),
            vec![("fn-1".to_string(), "ver-1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_deployment_is_rolled_back() {
        let api = Arc::new(MockNvcfApi::new().with_deployment_statuses([DeploymentStatus::Failed]));
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 1)]));

        let err = create(&context(&api), planned(config)).await.unwrap_err();

        assert_eq!(err.to_string(), "unexpected status FAILED");
        assert!(!api.has_version("fn-1", "ver-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_failed_resource_returns_partial_state() {
        let api = Arc::new(MockNvcfApi::new().with_deployment_statuses([DeploymentStatus::Failed]));
        let config = with(
            with(container_config(), "deployment_specifications", json!([spec(1, 1)])),
            "keep_failed_resource",
            json!(true),
        );

        let result = create(&context(&api), planned(config)).await.unwrap();

        assert!(result.has_errors());
        assert_error_contains(&result.diagnostics, "FAILED");
        assert_eq!(result.state.unwrap()["version_id"], "ver-1");
        assert!(api.has_version("fn-1", "ver-1"));
        assert_eq!(api.call_count("delete_function_version"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cleanup_reports_both_errors() {
        let api = Arc::new(
            MockNvcfApi::new()
                .with_deployment_statuses([DeploymentStatus::Failed])
                .with_failure(
                    "delete_function_version",
                    ProviderError::Api {
                        status: 500,
                        message: "delete exploded".to_string(),
                    },
                ),
        );
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 1)]));

        let result = create(&context(&api), planned(config)).await.unwrap();

        assert_eq!(result.diagnostics.len(), 2);
        assert_error_contains(&result.diagnostics, "unexpected status FAILED");
        assert_error_contains(&result.diagnostics, "delete exploded");
        assert_eq!(result.state.unwrap()["version_id"], "ver-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_timeout_bounds_polling() {
        let api = Arc::new(MockNvcfApi::new().with_deployment_statuses([DeploymentStatus::Deploying]));
        let config = with(
            with(container_config(), "deployment_specifications", json!([spec(1, 1)])),
            "timeouts",
            json!({"create": "5m"}),
        );

        let err = create(&context(&api), planned(config)).await.unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(_)));
        assert!(!api.has_version("fn-1", "ver-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_before_version_exists_needs_no_cleanup() {
        let api = Arc::new(MockNvcfApi::new().with_failure(
            "create_function",
            ProviderError::Api {
                status: 400,
                message: "Function name is invalid".to_string(),
            },
        ));

        let err = create(&context(&api), planned(container_config()))
            .await
            .unwrap_err();

        assert_eq!(err.message(), "Function name is invalid");
        assert_eq!(api.calls(), vec!["create_function"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_creates_new_version_then_deletes_old() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 1)]));
        let prior = create(&ctx, planned(config.clone())).await.unwrap().state.unwrap();

        let proposed = with(config, "description", json!("second revision"));
        let plan = plan(Some(&prior), proposed);
        assert!(!plan.requires_replace);
        assert_eq!(plan.planned_state["function_id"], "fn-1");
        assert!(plan.planned_state["version_id"].is_null());

        let result = update(&ctx, prior, plan.planned_state).await.unwrap();

        assert_no_errors(&result.diagnostics);
        let state = result.state.unwrap();
        assert_eq!(state["function_id"], "fn-1");
        assert_eq!(state["version_id"], "ver-2");
        assert_eq!(state["description"], "second revision");

        let calls = api.calls();
        let last_poll = calls.iter().rposition(|c| c == "get_deployment").unwrap();
        let delete = calls.iter().position(|c| c == "delete_function_version").unwrap();
        assert!(last_poll < delete);
        assert_eq!(
            api.deleted_versions(),
            vec![("fn-1".to_string(), "ver-1".to_string())]
        );
        assert!(api.has_version("fn-1", "ver-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_failure_keeps_previous_version() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 1)]));
        let prior = create(&ctx, planned(config.clone())).await.unwrap().state.unwrap();

        let proposed = with(config, "deployment_specifications", json!([spec(3, 1)]));
        let planned_state = plan(Some(&prior), proposed).planned_state;
        let err = update(&ctx, prior, planned_state).await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 400, .. }));
        assert!(api.has_version("fn-1", "ver-1"));
        assert!(!api.has_version("fn-1", "ver-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_old_version_delete_failure_is_warning() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let prior = create(&ctx, planned(container_config())).await.unwrap().state.unwrap();
        api.fail_next(
            "delete_function_version",
            ProviderError::Api {
                status: 409,
                message: "version is busy".to_string(),
            },
        );

        let proposed = with(container_config(), "inference_port", json!(9000));
        let planned_state = plan(Some(&prior), proposed).planned_state;
        let result = update(&ctx, prior, planned_state).await.unwrap();

        assert!(!result.has_errors());
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].summary.contains("ver-1"));
        assert_eq!(result.state.unwrap()["version_id"], "ver-2");
    }

    fn without_secrets(mut config: Value) -> Value {
        if let Value::Object(map) = &mut config {
            map.remove("secrets");
        }
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_after_import_has_no_changes() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(
            with(
                without_secrets(container_config()),
                "authorized_parties",
                json!(["nca-2"]),
            ),
            "deployment_specifications",
            json!([spec(1, 1)]),
        );
        create(&ctx, planned(config.clone())).await.unwrap();

        let imported = import(&ctx, "fn-1,ver-1").await.unwrap();
        let state = &imported[0].state;
        assert_eq!(state["keep_failed_resource"], false);

        let plan = plan(Some(state), config);
        assert!(plan.changes.is_empty(), "{:?}", plan.changes);
        assert_eq!(&plan.planned_state, state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_after_read_has_no_changes() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 2)]));
        let created = create(&ctx, planned(config.clone())).await.unwrap().state.unwrap();

        let refreshed = read(&ctx, created).await.unwrap().unwrap();

        assert!(plan(Some(&refreshed), config).changes.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_reordered_sets_have_no_changes() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(
            with(
                with(container_config(), "tags", json!(["a", "b"])),
                "authorized_parties",
                json!(["nca-2", "nca-3"]),
            ),
            "secrets",
            json!([
                {"name": "HF_TOKEN", "value": "hf-secret"},
                {"name": "NGC_KEY", "value": "ngc-secret"}
            ]),
        );
        let prior = create(&ctx, planned(config)).await.unwrap().state.unwrap();

        let reordered = with(
            with(
                with(container_config(), "tags", json!(["b", "a"])),
                "authorized_parties",
                json!(["nca-3", "nca-2"]),
            ),
            "secrets",
            json!([
                {"name": "NGC_KEY", "value": "ngc-secret"},
                {"name": "HF_TOKEN", "value": "hf-secret"}
            ]),
        );

        let plan = plan(Some(&prior), reordered);
        assert!(plan.changes.is_empty(), "{:?}", plan.changes);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plan_keeps_port_and_health_when_unconfigured() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let prior = create(&ctx, planned(container_config())).await.unwrap().state.unwrap();

        let mut bare = container_config();
        if let Value::Object(map) = &mut bare {
            map.remove("inference_port");
            map.remove("health");
        }
        assert!(plan(Some(&prior), bare.clone()).changes.is_empty());

        let described = plan(Some(&prior), with(bare, "description", json!("v2")));
        assert_eq!(described.changes.len(), 1);
        assert_eq!(described.planned_state["inference_port"], 8000);
        assert_eq!(described.planned_state["health"], prior["health"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_of_provider_settings_keeps_version() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let config = with(container_config(), "deployment_specifications", json!([spec(1, 1)]));
        let prior = create(&ctx, planned(config.clone())).await.unwrap().state.unwrap();
        let calls_before = api.calls().len();

        let proposed = with(
            with(config, "keep_failed_resource", json!(true)),
            "timeouts",
            json!({"update": "10m"}),
        );
        let plan = plan(Some(&prior), proposed);
        assert!(!plan.requires_replace);
        assert_eq!(plan.changes.len(), 2);

        let result = update(&ctx, prior, plan.planned_state).await.unwrap();

        assert_no_errors(&result.diagnostics);
        let state = result.state.unwrap();
        assert_eq!(state["version_id"], "ver-1");
        assert_eq!(state["status"], "ACTIVE");
        assert_eq!(state["nca_id"], MOCK_NCA_ID);
        assert_eq!(state["keep_failed_resource"], true);
        assert_eq!(state["timeouts"]["update"], "10m");
        assert_eq!(api.calls().len(), calls_before);
        assert_eq!(api.call_count("create_function"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kept_failed_update_warns_about_untracked_version() {
        let api = Arc::new(MockNvcfApi::new().with_deployment_statuses([DeploymentStatus::Failed]));
        let ctx = context(&api);
        let prior = create(&ctx, planned(container_config())).await.unwrap().state.unwrap();

        let proposed = with(
            with(container_config(), "deployment_specifications", json!([spec(1, 1)])),
            "keep_failed_resource",
            json!(true),
        );
        let planned_state = plan(Some(&prior), proposed).planned_state;
        let result = update(&ctx, prior, planned_state).await.unwrap();

        assert!(result.has_errors());
        assert_error_contains(&result.diagnostics, "FAILED");
        assert!(result
            .diagnostics
            .iter()
            .any(|d| matches!(d.severity, DiagnosticSeverity::Warning) && d.summary.contains("ver-1")));
        assert_eq!(result.state.unwrap()["version_id"], "ver-2");
        assert!(api.has_version("fn-1", "ver-1"));
        assert!(api.has_version("fn-1", "ver-2"));
        assert_eq!(api.call_count("delete_function_version"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_version() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        let state = create(&ctx, planned(container_config())).await.unwrap().state.unwrap();

        delete(&ctx, state.clone()).await.unwrap();
        assert!(!api.has_version("fn-1", "ver-1"));

        assert!(delete(&ctx, state).await.unwrap_err().is_not_found());
    }

    #[test]
    fn test_parse_import_id() {
        assert_eq!(
            parse_import_id("fn-1,ver-1").unwrap(),
            ("fn-1".to_string(), "ver-1".to_string())
        );
        for bad in ["fn-1", "fn-1,", ",ver-1", "fn-1,ver-1,extra", ""] {
            let err = parse_import_id(bad).unwrap_err();
            assert!(matches!(err, ProviderError::Validation(_)), "{}", bad);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_rejects_malformed_id_without_calls() {
        let api = Arc::new(MockNvcfApi::new());
        assert!(import(&context(&api), "fn-1").await.is_err());
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_completes_state() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        create(&ctx, planned(with(container_config(), "deployment_specifications", json!([spec(1, 1)]))))
            .await
            .unwrap();

        let imported = import(&ctx, "fn-1,ver-1").await.unwrap();

        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].resource_type, RESOURCE_TYPE);
        let state = &imported[0].state;
        assert_eq!(state["function_name"], "echo");
        assert_eq!(state["container_image"], "nvcr.io/my-org/echo:1.0");
        assert_eq!(state["status"], "ACTIVE");
        assert!(state["secrets"].is_null());
        // Backend JSON is compact when there is no configured text to keep.
        assert_eq!(
            state["deployment_specifications"][0]["configuration"],
            "{\"replicas\":1}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_data_source() {
        let api = Arc::new(MockNvcfApi::new());
        let ctx = context(&api);
        create(&ctx, planned(container_config())).await.unwrap();

        let found = read_data_source(
            &ctx,
            json!({"function_id": "fn-1", "version_id": "ver-1", "function_name": null}),
        )
        .await
        .unwrap();
        assert_eq!(found["function_name"], "echo");
        assert_eq!(found["inference_port"], 8000);
        for undeclared in ["secrets", "keep_failed_resource", "timeouts"] {
            assert!(found.get(undeclared).is_none(), "{}", undeclared);
        }

        let err = read_data_source(&ctx, json!({"function_id": "fn-1", "version_id": "ver-9"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_validate_artifact_discriminant() {
        assert_no_errors(&validate(&container_config()));

        let both = with(container_config(), "helm_chart", json!("chart"));
        assert_error_contains(&validate(&both), "only one of container_image or helm_chart");

        let neither = with(container_config(), "container_image", Value::Null);
        assert_error_contains(&validate(&neither), "must be set");

        let helm = with(neither, "helm_chart", json!("chart"));
        assert_error_contains(&validate(&helm), "helm_chart_service_name");
    }

    #[test]
    fn test_validate_configuration_and_timeouts() {
        let mut bad_spec = spec(1, 1);
        bad_spec["configuration"] = json!("{not json");
        let config = with(
            with(container_config(), "deployment_specifications", json!([bad_spec])),
            "timeouts",
            json!({"create": "soon"}),
        );

        let diagnostics = validate(&config);
        assert_error_contains(&diagnostics, "configuration is not valid JSON");
        assert_error_contains(&diagnostics, "invalid timeouts.create");
        assert!(diagnostics
            .iter()
            .any(|d| d.attribute.as_deref() == Some("deployment_specifications.0.configuration")));
    }

    #[test]
    fn test_validate_allowed_values() {
        let config = with(container_config(), "function_type", json!("BATCH"));
        assert_error_contains(&validate(&config), "function_type");
    }

    #[test]
    fn test_plan_normalizes_artifact_uris() {
        let config = with(
            container_config(),
            "models",
            json!([
                {"name": "llama", "version": "1.0", "uri": "my-org/models/llama/1.0"},
                {"name": "mistral", "version": "2.0", "uri": "https://example.com/mistral"}
            ]),
        );

        let plan = plan(None, config);

        let models = &plan.planned_state["models"];
        assert!(models[0]["uri"].as_str().unwrap().ends_with("/my-org/models/llama/1.0"));
        assert!(models[0]["uri"].as_str().unwrap().starts_with("http"));
        assert_eq!(models[1]["uri"], "https://example.com/mistral");
    }

    #[test]
    fn test_plan_defaults_and_replacement() {
        let plan_create = plan(None, container_config());
        assert_eq!(plan_create.planned_state["api_body_format"], "CUSTOM");
        assert_eq!(plan_create.planned_state["function_type"], "DEFAULT");
        assert_eq!(plan_create.planned_state["keep_failed_resource"], false);
        assert!(plan_create.planned_state["version_id"].is_null());

        let prior = with(
            with(
                with(plan_create.planned_state, "function_id", json!("fn-1")),
                "version_id",
                json!("ver-1"),
            ),
            "nca_id",
            json!(MOCK_NCA_ID),
        );
        let unchanged = plan(Some(&prior), container_config());
        assert!(unchanged.changes.is_empty());

        let renamed = plan(Some(&prior), with(container_config(), "function_name", json!("echo-2")));
        assert!(renamed.requires_replace);
        assert!(renamed.planned_state["function_id"].is_null());
    }
}
