//! Resource and data source implementations.
//!
//! Each resource module exposes its schema together with plain async functions
//! for the lifecycle operations. They take a [`ResourceContext`] holding the
//! configured backend, which `NgcProvider` builds at configure time.

pub mod function;
pub mod telemetry;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::NvcfApi;
use crate::schema::{Attribute, Block};

/// Everything a resource operation needs from the configured provider.
#[derive(Clone)]
pub struct ResourceContext {
    /// Backend the operation talks to.
    pub api: Arc<dyn NvcfApi>,
    /// Interval between deployment status checks.
    pub poll_interval: Duration,
}

impl ResourceContext {
    /// Bundle a backend with its poll interval.
    pub fn new(api: Arc<dyn NvcfApi>, poll_interval: Duration) -> Self {
        Self { api, poll_interval }
    }
}

impl fmt::Debug for ResourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceContext")
            .field("poll_interval", &self.poll_interval)
            .finish_non_exhaustive()
    }
}

/// A named secret as tracked in state. The backend never returns values, so
/// secrets always come from configuration or prior state.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretModel {
    /// Secret name.
    pub name: String,
    /// Secret value.
    pub value: String,
}

pub(crate) fn secret_block() -> Block {
    Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_description("Name of the secret"),
        )
        .with_attribute(
            "value",
            Attribute::required_string()
                .sensitive()
                .with_description("Value of the secret"),
        )
}

/// Pick the refreshed value of an optional list attribute.
///
/// A non-empty backend list wins. An empty or missing one keeps the prior
/// value only when that was an explicit empty list, so configurations that
/// never set the attribute do not drift to `[]`.
pub(crate) fn merge_list<T: Clone>(prior: &Option<Vec<T>>, fresh: Option<Vec<T>>) -> Option<Vec<T>> {
    match fresh {
        Some(items) if !items.is_empty() => Some(items),
        _ => prior.as_ref().filter(|p| p.is_empty()).cloned(),
    }
}

/// Like [`merge_list`] for set attributes: when the backend returns the same
/// members as the prior state, the prior ordering is kept.
pub(crate) fn merge_set(prior: &Option<Vec<String>>, fresh: Option<Vec<String>>) -> Option<Vec<String>> {
    let fresh = merge_list(prior, fresh)?;
    match prior {
        Some(prior) if same_members(prior, &fresh) => Some(prior.clone()),
        _ => Some(fresh),
    }
}

fn same_members(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}
