//! Testing utilities for provider implementations.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through plan/apply/read
//! cycles the way a host would, without a plugin protocol in between.
//! [`MockNvcfApi`] is an in-memory NVCF backend that records calls, scripts
//! deployment statuses and injects failures.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ngc_cloud_function_provider::testing::{MockNvcfApi, ProviderTester};
//! use ngc_cloud_function_provider::NgcProvider;
//! use serde_json::json;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_create_function() {
//!     let api = Arc::new(MockNvcfApi::new());
//!     let tester = ProviderTester::new(NgcProvider::with_api(api.clone(), Duration::from_secs(1)));
//!
//!     let state = tester.lifecycle_create("ngc_cloud_function", json!({
//!         "function_name": "echo",
//!         "inference_url": "/echo",
//!         "container_image": "nvcr.io/org/echo:1"
//!     })).await.unwrap();
//!
//!     assert_eq!(state["version_id"], "ver-1");
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::api::NvcfApi;
use crate::error::ProviderError;
use crate::models::{
    AuthorizedParty, CreateFunctionRequest, CreateTelemetryRequest, Deployment, DeploymentRequest,
    DeploymentSpecification, DeploymentStatus, FunctionArtifact, FunctionVersion, Telemetry,
};
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ApplyResult, ImportedResource, PlanResult};

/// A test harness for provider implementations.
///
/// Wraps a [`ProviderService`] and exposes simplified methods that turn error
/// diagnostics into `Err` values.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    // =========================================================================
    // Schema & Metadata
    // =========================================================================

    /// Get the provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Get the list of data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource creation (no prior state).
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, None, proposed_state).await
    }

    /// Plan a resource update.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state)
            .await
    }

    /// Plan a resource deletion.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null)
            .await
    }

    /// Create a new resource and return the raw apply result.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource and return the raw apply result.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<ApplyResult, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    /// Read data from a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .read_data_source(data_source_type, config)
            .await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Run a full create lifecycle: validate → plan → create → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self.plan_create(resource_type, config).await?;
        let created = expect_state(self.create(resource_type, plan.planned_state).await?)?;
        self.read_existing(resource_type, created).await
    }

    /// Run a full update lifecycle: plan → update → read.
    ///
    /// Returns the final state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<Value, TestError> {
        let plan = self
            .plan_update(resource_type, prior_state.clone(), proposed_state)
            .await?;
        let updated = expect_state(
            self.update(resource_type, prior_state, plan.planned_state)
                .await?,
        )?;
        self.read_existing(resource_type, updated).await
    }

    /// Run a full delete lifecycle: plan → delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), TestError> {
        let plan = self
            .plan_delete(resource_type, current_state.clone())
            .await?;
        assert!(plan.planned_state.is_null(), "delete plan must have a null planned state");
        self.delete(resource_type, current_state).await?;
        Ok(())
    }

    async fn read_existing(&self, resource_type: &str, state: Value) -> Result<Value, TestError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            TestError::Provider(ProviderError::NotFound(format!(
                "{} disappeared right after apply",
                resource_type
            )))
        })
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn expect_state(result: ApplyResult) -> Result<Value, TestError> {
    if result.has_errors() {
        return Err(TestError::Diagnostics(result.diagnostics));
    }
    result.state.ok_or_else(|| {
        TestError::Provider(ProviderError::NotFound("apply returned no state".to_string()))
    })
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a plan result creates a resource.
///
/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "Expected plan to have changes for create, but got no changes"
    );
    assert!(
        !plan.requires_replace,
        "Expected plan to create, not replace"
    );
}

/// Assert that a plan result indicates no changes.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan requires resource replacement.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "Expected plan to require replacement, but it does not"
    );
}

/// Assert that a plan does not require resource replacement.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that a plan has a change for a specific attribute path.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let has_change = plan.changes.iter().any(|c| c.path == path);
    assert!(
        has_change,
        "Expected plan to change attribute '{}', but it was not changed. Changed attributes: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error whose summary or detail contains
/// the given substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let matches = |d: &Diagnostic| {
        d.summary.contains(substring)
            || d.detail.as_deref().is_some_and(|detail| detail.contains(substring))
    };
    let has_matching_error = diagnostics.iter().any(|d| d.is_error() && matches(d));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

// =========================================================================
// In-memory NVCF backend
// =========================================================================

/// Timestamp stamped on everything the mock backend creates.
pub const MOCK_CREATED_AT: &str = "2024-01-01T00:00:00Z";

/// NCA ID owning every function the mock backend creates.
pub const MOCK_NCA_ID: &str = "nca-test";

#[derive(Default)]
struct MockState {
    function_seq: u32,
    version_seq: u32,
    telemetry_seq: u32,
    functions: Vec<FunctionVersion>,
    function_requests: Vec<Value>,
    deployments: HashMap<(String, String), Deployment>,
    authorizations: HashMap<(String, String), Vec<AuthorizedParty>>,
    telemetries: HashMap<String, Telemetry>,
    telemetry_requests: Vec<Value>,
    statuses: VecDeque<DeploymentStatus>,
    failures: HashMap<String, ProviderError>,
    deleted_versions: Vec<(String, String)>,
    calls: Vec<String>,
}

/// An in-memory NVCF backend.
///
/// IDs are deterministic: functions are `fn-1`, `fn-2`, ..., versions are
/// `ver-1`, `ver-2`, ... across all functions, and telemetry endpoints are
/// `tel-1`, ....
///
/// New deployments start DEPLOYING. Each `get_deployment` call takes the next
/// status from the scripted queue; the last scripted status repeats, and with
/// nothing scripted every deployment reports ACTIVE.
#[derive(Default)]
pub struct MockNvcfApi {
    state: Mutex<MockState>,
}

impl MockNvcfApi {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the statuses returned by successive `get_deployment` calls.
    pub fn with_deployment_statuses(self, statuses: impl IntoIterator<Item = DeploymentStatus>) -> Self {
        self.lock().statuses = statuses.into_iter().collect();
        self
    }

    /// Fail the next call of `operation` with `error`.
    pub fn with_failure(self, operation: &str, error: ProviderError) -> Self {
        self.fail_next(operation, error);
        self
    }

    /// Fail the next call of `operation` with `error`.
    pub fn fail_next(&self, operation: &str, error: ProviderError) {
        self.lock().failures.insert(operation.to_string(), error);
    }

    /// Store a DEPLOYING deployment for a version without going through
    /// `create_deployment`.
    pub fn insert_deployment(
        &self,
        function_id: &str,
        version_id: &str,
        specifications: Vec<DeploymentSpecification>,
    ) {
        self.lock().deployments.insert(
            (function_id.to_string(), version_id.to_string()),
            Deployment {
                function_id: function_id.to_string(),
                function_version_id: version_id.to_string(),
                function_status: DeploymentStatus::Deploying,
                deployment_specifications: specifications,
            },
        );
    }

    /// Remove a version behind the provider's back.
    pub fn remove_function_version(&self, function_id: &str, version_id: &str) {
        self.lock()
            .functions
            .retain(|f| !(f.id == function_id && f.version_id == version_id));
    }

    /// Remove a telemetry endpoint behind the provider's back.
    pub fn remove_telemetry(&self, telemetry_id: &str) {
        self.lock().telemetries.remove(telemetry_id);
    }

    /// Number of calls made to `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.iter().filter(|c| *c == operation).count()
    }

    /// Every operation called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Every create-function body sent, serialized as it would go on the wire.
    pub fn function_requests(&self) -> Vec<Value> {
        self.lock().function_requests.clone()
    }

    /// Every create-telemetry body sent, serialized as it would go on the wire.
    pub fn telemetry_requests(&self) -> Vec<Value> {
        self.lock().telemetry_requests.clone()
    }

    /// Versions deleted through `delete_function_version`, in order.
    pub fn deleted_versions(&self) -> Vec<(String, String)> {
        self.lock().deleted_versions.clone()
    }

    /// Whether the backend holds the given function version.
    pub fn has_version(&self, function_id: &str, version_id: &str) -> bool {
        self.lock()
            .functions
            .iter()
            .any(|f| f.id == function_id && f.version_id == version_id)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call and return the injected failure for it, if any.
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, MockState>, ProviderError> {
        let mut state = self.lock();
        state.calls.push(operation.to_string());
        match state.failures.remove(operation) {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

fn key(function_id: &str, version_id: &str) -> (String, String) {
    (function_id.to_string(), version_id.to_string())
}

fn version_not_found(function_id: &str, version_id: &str) -> ProviderError {
    ProviderError::NotFound(format!(
        "Function {} version {} not found",
        function_id, version_id
    ))
}

impl MockState {
    fn version_exists(&self, function_id: &str, version_id: &str) -> bool {
        self.functions
            .iter()
            .any(|f| f.id == function_id && f.version_id == version_id)
    }
}

#[async_trait]
impl NvcfApi for MockNvcfApi {
    async fn create_function(
        &self,
        function_id: Option<&str>,
        request: &CreateFunctionRequest,
    ) -> Result<FunctionVersion, ProviderError> {
        let mut state = self.begin("create_function")?;

        let id = match function_id {
            Some(id) if state.functions.iter().any(|f| f.id == id) => id.to_string(),
            Some(id) => {
                return Err(ProviderError::NotFound(format!("Function {} not found", id)));
            },
            None => {
                state.function_seq += 1;
                format!("fn-{}", state.function_seq)
            },
        };
        state.version_seq += 1;
        let version_id = format!("ver-{}", state.version_seq);

        let (container_image, container_args, helm_chart, helm_chart_service_name) =
            match request.artifact.clone() {
                FunctionArtifact::Container {
                    container_image,
                    container_args,
                } => (Some(container_image), container_args, None, None),
                FunctionArtifact::HelmChart {
                    helm_chart,
                    helm_chart_service_name,
                } => (None, None, Some(helm_chart), Some(helm_chart_service_name)),
            };

        let version = FunctionVersion {
            id,
            version_id,
            nca_id: MOCK_NCA_ID.to_string(),
            name: request.name.clone(),
            status: Some("INACTIVE".to_string()),
            inference_url: Some(request.inference_url.clone()),
            inference_port: request.inference_port,
            container_image,
            container_args,
            helm_chart,
            helm_chart_service_name,
            health: request.health.clone(),
            description: request.description.clone(),
            tags: request.tags.clone(),
            api_body_format: Some(
                request
                    .api_body_format
                    .clone()
                    .unwrap_or_else(|| "CUSTOM".to_string()),
            ),
            function_type: Some(
                request
                    .function_type
                    .clone()
                    .unwrap_or_else(|| "DEFAULT".to_string()),
            ),
            models: request.models.clone(),
            resources: request.resources.clone(),
            container_environment: request.container_environment.clone(),
            created_at: Some(MOCK_CREATED_AT.to_string()),
        };

        let body = serde_json::to_value(request)?;
        state.function_requests.push(body);
        state.functions.push(version.clone());
        Ok(version)
    }

    async fn list_function_versions(
        &self,
        function_id: &str,
    ) -> Result<Vec<FunctionVersion>, ProviderError> {
        let state = self.begin("list_function_versions")?;
        let versions: Vec<_> = state
            .functions
            .iter()
            .filter(|f| f.id == function_id)
            .cloned()
            .collect();
        if versions.is_empty() {
            return Err(ProviderError::NotFound(format!(
                "Function {} not found",
                function_id
            )));
        }
        Ok(versions)
    }

    async fn delete_function_version(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.begin("delete_function_version")?;
        if !state.version_exists(function_id, version_id) {
            return Err(version_not_found(function_id, version_id));
        }
        state
            .functions
            .retain(|f| !(f.id == function_id && f.version_id == version_id));
        state.deployments.remove(&key(function_id, version_id));
        state.authorizations.remove(&key(function_id, version_id));
        state
            .deleted_versions
            .push(key(function_id, version_id));
        Ok(())
    }

    async fn authorize_parties(
        &self,
        function_id: &str,
        version_id: &str,
        parties: &[AuthorizedParty],
    ) -> Result<(), ProviderError> {
        let mut state = self.begin("authorize_parties")?;
        if !state.version_exists(function_id, version_id) {
            return Err(version_not_found(function_id, version_id));
        }
        state
            .authorizations
            .insert(key(function_id, version_id), parties.to_vec());
        Ok(())
    }

    async fn get_authorized_parties(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Vec<AuthorizedParty>, ProviderError> {
        let state = self.begin("get_authorized_parties")?;
        if !state.version_exists(function_id, version_id) {
            return Err(version_not_found(function_id, version_id));
        }
        Ok(state
            .authorizations
            .get(&key(function_id, version_id))
            .cloned()
            .unwrap_or_default())
    }

    async fn create_deployment(
        &self,
        function_id: &str,
        version_id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ProviderError> {
        let mut state = self.begin("create_deployment")?;
        if let Some(spec) = request
            .deployment_specifications
            .iter()
            .find(|s| s.min_instances > s.max_instances)
        {
            return Err(ProviderError::Api {
                status: 400,
                message: format!(
                    "Validation failed: minInstances ({}) must be less than or equal to maxInstances ({}) for {}",
                    spec.min_instances, spec.max_instances, spec.instance_type
                ),
            });
        }

        let deployment = Deployment {
            function_id: function_id.to_string(),
            function_version_id: version_id.to_string(),
            function_status: DeploymentStatus::Deploying,
            deployment_specifications: request.deployment_specifications.clone(),
        };
        state
            .deployments
            .insert(key(function_id, version_id), deployment.clone());
        Ok(deployment)
    }

    async fn get_deployment(
        &self,
        function_id: &str,
        version_id: &str,
    ) -> Result<Deployment, ProviderError> {
        let mut state = self.begin("get_deployment")?;
        if !state.deployments.contains_key(&key(function_id, version_id)) {
            return Err(ProviderError::NotFound(format!(
                "No deployment found for function {} version {}",
                function_id, version_id
            )));
        }

        let status = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        }
        .unwrap_or(DeploymentStatus::Active);

        let deployment = state
            .deployments
            .get_mut(&key(function_id, version_id))
            .ok_or_else(|| ProviderError::NotFound("No deployment found".to_string()))?;
        deployment.function_status = status;
        Ok(deployment.clone())
    }

    async fn create_telemetry(
        &self,
        request: &CreateTelemetryRequest,
    ) -> Result<Telemetry, ProviderError> {
        let mut state = self.begin("create_telemetry")?;
        state.telemetry_seq += 1;
        let telemetry = Telemetry {
            telemetry_id: format!("tel-{}", state.telemetry_seq),
            name: request.name.clone(),
            endpoint: request.endpoint.clone(),
            protocol: request.protocol.clone(),
            provider: request.provider.clone(),
            types: request.types.clone(),
            created_at: Some(MOCK_CREATED_AT.to_string()),
        };
        let body = serde_json::to_value(request)?;
        state.telemetry_requests.push(body);
        state
            .telemetries
            .insert(telemetry.telemetry_id.clone(), telemetry.clone());
        Ok(telemetry)
    }

    async fn get_telemetry(&self, telemetry_id: &str) -> Result<Telemetry, ProviderError> {
        let state = self.begin("get_telemetry")?;
        state.telemetries.get(telemetry_id).cloned().ok_or_else(|| {
            ProviderError::NotFound(format!("Telemetry {} not found", telemetry_id))
        })
    }

    async fn delete_telemetry(&self, telemetry_id: &str) -> Result<(), ProviderError> {
        let mut state = self.begin("delete_telemetry")?;
        state
            .telemetries
            .remove(telemetry_id)
            .map(|_| ())
            .ok_or_else(|| ProviderError::NotFound(format!("Telemetry {} not found", telemetry_id)))
    }
}
