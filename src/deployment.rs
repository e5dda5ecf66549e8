//! Deployment lifecycle: submit specifications, then poll until the function
//! version is ACTIVE, fails, or the caller's deadline elapses.

use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::api::NvcfApi;
use crate::error::ProviderError;
use crate::models::{Deployment, DeploymentRequest, DeploymentSpecification, DeploymentStatus};

/// How long to wait for a deployment and how often to check it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    /// Interval between status checks.
    pub interval: Duration,
    /// Point in time after which waiting stops with [`ProviderError::Timeout`].
    pub deadline: Instant,
}

impl PollOptions {
    /// Poll every `interval` until `timeout` from now.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + timeout,
        }
    }
}

/// Submit `specifications` for a function version and wait until it is ACTIVE.
///
/// Returns `Ok(None)` without calling the backend when no specifications were
/// declared.
pub async fn deploy(
    api: &dyn NvcfApi,
    function_id: &str,
    version_id: &str,
    specifications: Vec<DeploymentSpecification>,
    options: PollOptions,
) -> Result<Option<Deployment>, ProviderError> {
    if specifications.is_empty() {
        debug!(function_id, version_id, "no deployment specifications declared");
        return Ok(None);
    }

    let request = DeploymentRequest {
        deployment_specifications: specifications,
    };
    api.create_deployment(function_id, version_id, &request)
        .await?;
    info!(function_id, version_id, "deployment submitted");

    wait_until_active(api, function_id, version_id, options)
        .await
        .map(Some)
}

/// Poll a deployment until it reaches a terminal status.
///
/// ACTIVE returns the deployment. FAILED or any status other than DEPLOYING
/// is an [`ProviderError::UnexpectedStatus`]. Reaching the deadline, whether
/// while waiting or while a status request is in flight, is a
/// [`ProviderError::Timeout`].
pub async fn wait_until_active(
    api: &dyn NvcfApi,
    function_id: &str,
    version_id: &str,
    options: PollOptions,
) -> Result<Deployment, ProviderError> {
    let timed_out = || {
        warn!(function_id, version_id, "deadline reached while waiting for deployment");
        ProviderError::Timeout(format!(
            "function version {} did not become ACTIVE before the deadline",
            version_id
        ))
    };

    loop {
        let deployment = match timeout_at(
            options.deadline,
            api.get_deployment(function_id, version_id),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => return Err(timed_out()),
        };

        match &deployment.function_status {
            DeploymentStatus::Active => {
                info!(function_id, version_id, "deployment is ACTIVE");
                return Ok(deployment);
            },
            DeploymentStatus::Deploying => {
                debug!(function_id, version_id, "deployment in progress");
            },
            other => {
                warn!(function_id, version_id, status = %other, "deployment reached a terminal status");
                return Err(ProviderError::UnexpectedStatus(other.to_string()));
            },
        }

        tokio::select! {
            _ = sleep(options.interval) => {},
            _ = tokio::time::sleep_until(options.deadline) => return Err(timed_out()),
        }
    }
}
