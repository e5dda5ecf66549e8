//! Wire types of the NVCF REST API.
//!
//! Field names follow the backend's camelCase JSON. Optional request fields are
//! skipped when unset so the backend applies its own defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::ProviderError;

/// What a function version runs: a container image or a helm chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FunctionArtifact {
    /// A single container serving inference requests.
    #[serde(rename_all = "camelCase")]
    Container {
        /// Image reference, e.g. `nvcr.io/org/image:tag`.
        container_image: String,
        /// Arguments passed to the container entrypoint.
        #[serde(skip_serializing_if = "Option::is_none")]
        container_args: Option<String>,
    },
    /// A helm chart deployed to the backend cluster.
    #[serde(rename_all = "camelCase")]
    HelmChart {
        /// Chart reference.
        helm_chart: String,
        /// Service within the chart that receives inference requests.
        helm_chart_service_name: String,
    },
}

impl FunctionArtifact {
    /// Pick the artifact from optional container and helm fields.
    ///
    /// Exactly one of `container_image` and `helm_chart` must be set.
    pub fn from_parts(
        container_image: Option<String>,
        container_args: Option<String>,
        helm_chart: Option<String>,
        helm_chart_service_name: Option<String>,
    ) -> Result<Self, ProviderError> {
        match (container_image, helm_chart) {
            (Some(container_image), None) => Ok(Self::Container {
                container_image,
                container_args,
            }),
            (None, Some(helm_chart)) => {
                let helm_chart_service_name = helm_chart_service_name.ok_or_else(|| {
                    ProviderError::Validation(
                        "helm_chart_service_name is required when helm_chart is set".to_string(),
                    )
                })?;
                Ok(Self::HelmChart {
                    helm_chart,
                    helm_chart_service_name,
                })
            },
            (Some(_), Some(_)) => Err(ProviderError::Validation(
                "only one of container_image or helm_chart may be set".to_string(),
            )),
            (None, None) => Err(ProviderError::Validation(
                "one of container_image or helm_chart must be set".to_string(),
            )),
        }
    }
}

/// Health check probed by the backend before routing traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    /// `HTTP` or `gRPC`.
    pub protocol: String,
    /// Path probed for HTTP checks.
    pub uri: String,
    /// Port probed.
    pub port: i64,
    /// ISO-8601 duration, e.g. `PT10S`.
    pub timeout: String,
    /// Status code that marks the function healthy.
    pub expected_status_code: i64,
}

/// A model or resource artifact mounted into the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub name: String,
    pub version: String,
    pub uri: String,
}

/// A container environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

/// A secret injected into the function. Values are write-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretEntry {
    pub name: String,
    pub value: Value,
}

/// Body of a create-function or create-version call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFunctionRequest {
    pub name: String,
    pub inference_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_port: Option<i64>,
    #[serde(flatten)]
    pub artifact: FunctionArtifact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_body_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<ArtifactRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ArtifactRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets: Option<Vec<SecretEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_environment: Option<Vec<EnvVar>>,
}

/// A function version as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionVersion {
    pub id: String,
    pub version_id: String,
    #[serde(default)]
    pub nca_id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub inference_url: Option<String>,
    #[serde(default)]
    pub inference_port: Option<i64>,
    #[serde(default)]
    pub container_image: Option<String>,
    #[serde(default)]
    pub container_args: Option<String>,
    #[serde(default)]
    pub helm_chart: Option<String>,
    #[serde(default)]
    pub helm_chart_service_name: Option<String>,
    #[serde(default)]
    pub health: Option<HealthCheck>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub api_body_format: Option<String>,
    #[serde(default)]
    pub function_type: Option<String>,
    #[serde(default)]
    pub models: Option<Vec<ArtifactRef>>,
    #[serde(default)]
    pub resources: Option<Vec<ArtifactRef>>,
    #[serde(default)]
    pub container_environment: Option<Vec<EnvVar>>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FunctionResponse {
    pub function: FunctionVersion,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FunctionListResponse {
    #[serde(default)]
    pub functions: Vec<FunctionVersion>,
}

/// Status of a function version's deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentStatus {
    Deploying,
    Active,
    Failed,
    /// Any value this provider does not know about.
    Other(String),
}

impl From<String> for DeploymentStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "DEPLOYING" => Self::Deploying,
            "ACTIVE" => Self::Active,
            "FAILED" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<DeploymentStatus> for String {
    fn from(status: DeploymentStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deploying => f.write_str("DEPLOYING"),
            Self::Active => f.write_str("ACTIVE"),
            Self::Failed => f.write_str("FAILED"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// One scaling and placement rule of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub gpu: String,
    pub instance_type: String,
    pub min_instances: i64,
    pub max_instances: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_request_concurrency: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clusters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions: Option<Vec<String>>,
}

/// Body of a create-deployment call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub deployment_specifications: Vec<DeploymentSpecification>,
}

/// A deployment as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub function_id: String,
    pub function_version_id: String,
    pub function_status: DeploymentStatus,
    #[serde(default)]
    pub deployment_specifications: Vec<DeploymentSpecification>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeploymentResponse {
    pub deployment: Deployment,
}

/// An account allowed to invoke a function version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedParty {
    pub nca_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorizationRequest<'a> {
    pub authorized_parties: &'a [AuthorizedParty],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthorizationFunction {
    #[serde(default)]
    pub authorized_parties: Vec<AuthorizedParty>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthorizationResponse {
    pub function: AuthorizationFunction,
}

/// Secret attached to a telemetry endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySecret {
    pub name: String,
    pub value: Value,
}

/// Body of a create-telemetry call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateTelemetryRequest {
    pub name: String,
    pub endpoint: String,
    pub protocol: String,
    pub provider: String,
    pub types: Vec<String>,
    pub secret: TelemetrySecret,
}

/// A telemetry endpoint as returned by the backend. Secrets are never returned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub telemetry_id: String,
    pub name: String,
    pub endpoint: String,
    pub protocol: String,
    pub provider: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TelemetryResponse {
    pub telemetry: Telemetry,
}

/// Error envelope carrying a nested request status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestStatusEnvelope {
    pub request_status: RequestStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RequestStatus {
    #[serde(default)]
    pub status_description: Option<String>,
}

/// Error envelope carrying a flat detail message.
#[derive(Debug, Deserialize)]
pub(crate) struct DetailEnvelope {
    pub detail: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(artifact: FunctionArtifact) -> CreateFunctionRequest {
        CreateFunctionRequest {
            name: "echo".to_string(),
            inference_url: "/echo".to_string(),
            inference_port: Some(8000),
            artifact,
            health: None,
            description: None,
            tags: None,
            api_body_format: None,
            function_type: None,
            models: None,
            resources: None,
            secrets: None,
            container_environment: None,
        }
    }

    #[test]
    fn test_container_request_has_only_container_fields() {
        let artifact =
            FunctionArtifact::from_parts(Some("nvcr.io/org/echo:1".to_string()), None, None, None)
                .unwrap();
        let body = serde_json::to_value(request(artifact)).unwrap();

        assert_eq!(body["containerImage"], "nvcr.io/org/echo:1");
        assert!(body.get("helmChart").is_none());
        assert!(body.get("helmChartServiceName").is_none());
        assert!(body.get("containerArgs").is_none());
        assert!(body.get("description").is_none());
        assert_eq!(body["inferencePort"], 8000);
    }

    #[test]
    fn test_helm_request_has_only_helm_fields() {
        let artifact = FunctionArtifact::from_parts(
            None,
            None,
            Some("https://helm.ngc.nvidia.com/org/charts/echo-1.0.tgz".to_string()),
            Some("echo-svc".to_string()),
        )
        .unwrap();
        let body = serde_json::to_value(request(artifact)).unwrap();

        assert_eq!(body["helmChartServiceName"], "echo-svc");
        assert!(body.get("containerImage").is_none());
    }

    #[test]
    fn test_artifact_discriminant_validation() {
        let both = FunctionArtifact::from_parts(
            Some("img".to_string()),
            None,
            Some("chart".to_string()),
            Some("svc".to_string()),
        );
        assert!(matches!(both, Err(ProviderError::Validation(_))));

        let neither = FunctionArtifact::from_parts(None, None, None, None);
        assert!(matches!(neither, Err(ProviderError::Validation(_))));

        let helm_without_service =
            FunctionArtifact::from_parts(None, None, Some("chart".to_string()), None);
        assert!(helm_without_service
            .unwrap_err()
            .message()
            .contains("helm_chart_service_name"));
    }

    #[test]
    fn test_deployment_status_parsing() {
        let deployment: Deployment = serde_json::from_value(json!({
            "functionId": "fn-1",
            "functionVersionId": "ver-1",
            "functionStatus": "DEPLOYING",
            "deploymentSpecifications": [{
                "gpu": "L40",
                "instanceType": "gl40_1.br20_2xlarge",
                "minInstances": 1,
                "maxInstances": 2
            }]
        }))
        .unwrap();

        assert_eq!(deployment.function_status, DeploymentStatus::Deploying);
        assert_eq!(deployment.deployment_specifications[0].max_instances, 2);

        let status: DeploymentStatus = serde_json::from_value(json!("DEGRADED")).unwrap();
        assert_eq!(status, DeploymentStatus::Other("DEGRADED".to_string()));
        assert_eq!(serde_json::to_value(&status).unwrap(), json!("DEGRADED"));
    }

    #[test]
    fn test_function_version_tolerates_missing_fields() {
        let version: FunctionVersion = serde_json::from_value(json!({
            "id": "fn-1",
            "versionId": "ver-1",
            "name": "echo",
            "containerImage": "nvcr.io/org/echo:1"
        }))
        .unwrap();

        assert_eq!(version.container_image.as_deref(), Some("nvcr.io/org/echo:1"));
        assert!(version.helm_chart.is_none());
        assert!(version.nca_id.is_empty());
    }
}
