//! The set of NVCF operations used by the provider.
//!
//! Resources depend on [`NvcfApi`] rather than on the HTTP client, so the
//! orchestration logic can run against an in-memory backend in tests.

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::instrument;

use crate::client::NvcfClient;
use crate::error::ProviderError;
use crate::models::{
    AuthorizationRequest, AuthorizationResponse, AuthorizedParty, CreateFunctionRequest,
    CreateTelemetryRequest, Deployment, DeploymentRequest, DeploymentResponse,
    FunctionListResponse, FunctionResponse, FunctionVersion, Telemetry, TelemetryResponse,
};

const NO_BODY: Option<&Value> = None;

/// Backend operations for functions, deployments, authorizations and telemetry.
#[async_trait]
pub trait NvcfApi: Send + Sync {
    /// Create a new function, or a new version of `function_id` when given.
    async fn create_function(
        &self,
        function_id: Option<&str>,
        request: &CreateFunctionRequest,
    ) -> Result<FunctionVersion, ProviderError>;

    /// List every version of a function.
    async fn list_function_versions(
        &self,
        function_id: &str,
    ) -> Result<Vec<FunctionVersion>, ProviderError>;

    /// Delete a function version together with its deployment.
    async fn delete_function_version(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<(), ProviderError>;

    /// Replace the parties allowed to invoke a function version.
    async fn authorize_parties(
        &self,
        function_id: &str,
        version_id: &str,
        parties: &[AuthorizedParty],
    ) -> Result<(), ProviderError>;

    /// Parties allowed to invoke a function version.
    async fn get_authorized_parties(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Vec<AuthorizedParty>, ProviderError>;

    /// Submit a deployment for a function version.
    async fn create_deployment(
        &self,
        function_id: &str,
        version_id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError>;

    /// Current deployment of a function version. `NotFound` if there is none.
    async fn get_deployment(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Deployment, ProviderError>;

    /// Create a telemetry endpoint.
    async fn create_telemetry(
        &self,
        request: &CreateTelemetryRequest,
    ) -> Result<Telemetry, ProviderError>;

    /// Fetch a telemetry endpoint.
    async fn get_telemetry(&self, telemetry_id: &str) -> Result<Telemetry, ProviderError>;

    /// Delete a telemetry endpoint.
    async fn delete_telemetry(&self, telemetry_id: &str) -> Result<(), ProviderError>;
}

fn function_versions_path(function_id: &str) -> String {
    format!("/nvcf/functions/{}/versions", function_id)
}

fn deployment_path(function_id: &str, version_id: &str) -> String {
    format!(
        "/nvcf/deployments/functions/{}/versions/{}",
        function_id, version_id
    )
}

fn authorization_path(function_id: &str, version_id: &str) -> String {
    format!(
        "/nvcf/authorizations/functions/{}/versions/{}",
        function_id, version_id
    )
}

#[async_trait]
impl NvcfApi for NvcfClient {
    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_function(
        &self,
        function_id: Option<&str>,
        request: &CreateFunctionRequest,
    ) -> Result<FunctionVersion, ProviderError> {
        let path = match function_id {
            Some(id) => function_versions_path(id),
            None => "/nvcf/functions".to_string(),
        };
        let response: FunctionResponse = self
            .send_request(Method::POST, &path, Some(request), &[StatusCode::OK])
            .await?;
        Ok(response.function)
    }

    #[instrument(skip(self))]
    async fn list_function_versions(
        &self,
        function_id: &str,
    ) -> Result<Vec<FunctionVersion>, ProviderError> {
        let response: FunctionListResponse = self
            .send_request(
                Method::GET,
                &function_versions_path(function_id),
                NO_BODY,
                &[StatusCode::OK],
            )
            .await?;
        Ok(response.functions)
    }

    #[instrument(skip(self))]
    async fn delete_function_version(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<(), ProviderError> {
        let path = format!("{}/{}", function_versions_path(function_id), version_id);
        self.send_request_no_content(
            Method::DELETE,
            &path,
            NO_BODY,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
        )
        .await
    }

    #[instrument(skip(self, parties), fields(parties = parties.len()))]
    async fn authorize_parties(
        &self,
        function_id: &str,
        version_id: &str,
        parties: &[AuthorizedParty],
    ) -> Result<(), ProviderError> {
        let body = AuthorizationRequest {
            authorized_parties: parties,
        };
        self.send_request_no_content(
            Method::POST,
            &authorization_path(function_id, version_id),
            Some(&body),
            &[StatusCode::OK],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_authorized_parties(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Vec<AuthorizedParty>, ProviderError> {
        let response: AuthorizationResponse = self
            .send_request(
                Method::GET,
                &authorization_path(function_id, version_id),
                NO_BODY,
                &[StatusCode::OK],
            )
            .await?;
        Ok(response.function.authorized_parties)
    }

    #[instrument(skip(self, request), fields(specifications = request.deployment_specifications.len()))]
    async fn create_deployment(
        &self,
        function_id: &str,
        version_id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        let response: DeploymentResponse = self
            .send_request(
                Method::POST,
                &deployment_path(function_id, version_id),
                Some(request),
                &[StatusCode::OK],
            )
            .await?;
        Ok(response.deployment)
    }

    #[instrument(skip(self))]
    async fn get_deployment(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Deployment, ProviderError> {
        let response: DeploymentResponse = self
            .send_request(
                Method::GET,
                &deployment_path(function_id, version_id),
                NO_BODY,
                &[StatusCode::OK],
            )
            .await?;
        Ok(response.deployment)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_telemetry(
        &self,
        request: &CreateTelemetryRequest,
    ) -> Result<Telemetry, ProviderError> {
        let response: TelemetryResponse = self
            .send_request(
                Method::POST,
                "/nvcf/telemetries",
                Some(request),
                &[StatusCode::OK, StatusCode::CREATED],
            )
            .await?;
        Ok(response.telemetry)
    }

    #[instrument(skip(self))]
    async fn get_telemetry(&self, telemetry_id: &str) -> Result<Telemetry, ProviderError> {
        let response: TelemetryResponse = self
            .send_request(
                Method::GET,
                &format!("/nvcf/telemetries/{}", telemetry_id),
                NO_BODY,
                &[StatusCode::OK],
            )
            .await?;
        Ok(response.telemetry)
    }

    #[instrument(skip(self))]
    async fn delete_telemetry(&self, telemetry_id: &str) -> Result<(), ProviderError> {
        self.send_request_no_content(
            Method::DELETE,
            &format!("/nvcf/telemetries/{}", telemetry_id),
            NO_BODY,
            &[StatusCode::OK, StatusCode::NO_CONTENT],
        )
        .await
    }
}
