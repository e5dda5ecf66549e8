//! Plan-time normalization of model and resource artifact URIs.
//!
//! The backend addresses registry artifacts by absolute URL. Configurations may
//! use a short `<team>/<name>/<version>` form, which is expanded against the
//! artifact host so that the planned value matches what the backend stores.

use serde_json::Value;
use tracing::debug;

/// Host prepended to artifact URIs that carry no scheme.
pub const DEFAULT_ARTIFACT_HOST: &str = "https://api.ngc.nvidia.com/v2/org";

/// Environment variable overriding [`DEFAULT_ARTIFACT_HOST`].
pub const ENV_ARTIFACT_HOST: &str = "NGC_ARTIFACT_HOST";

/// Blocks whose `uri` attribute is normalized.
pub const ARTIFACT_BLOCKS: [&str; 2] = ["models", "resources"];

/// The artifact host from the process environment, or the default.
pub fn artifact_host() -> String {
    std::env::var(ENV_ARTIFACT_HOST)
        .ok()
        .filter(|host| !host.is_empty())
        .unwrap_or_else(|| DEFAULT_ARTIFACT_HOST.to_string())
}

/// Prefix `uri` with `host` unless it is already an `http://` or `https://` URL.
pub fn normalize_uri(host: &str, uri: &str) -> String {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        return uri.to_string();
    }
    format!("{}/{}", host.trim_end_matches('/'), uri.trim_start_matches('/'))
}

/// Normalize the `uri` of every entry of the artifact blocks in a state document.
///
/// Unknown (null) URIs are left alone.
pub fn normalize_artifacts(state: &mut Value, host: &str) {
    for block in ARTIFACT_BLOCKS {
        let Some(Value::Array(items)) = state.get_mut(block) else {
            continue;
        };
        for item in items {
            if let Some(Value::String(uri)) = item.get_mut("uri") {
                let normalized = normalize_uri(host, uri);
                if normalized != *uri {
                    debug!(block, from = %uri, to = %normalized, "normalized artifact uri");
                    *uri = normalized;
                }
            }
        }
    }
}
