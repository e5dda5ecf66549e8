//! Error types for the NGC Cloud Function provider.

use thiserror::Error;

use crate::schema::Diagnostic;

/// Errors raised while planning or applying provider resources.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found on the backend.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A local validation error occurred (no network call was made).
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation ran before `configure` succeeded.
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the API key.
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    /// The backend returned an unexpected status with an error body.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the backend.
        status: u16,
        /// Message decoded from the error envelope.
        message: String,
    },

    /// A deployment reached a terminal state other than ACTIVE.
    #[error("unexpected status {0}")]
    UnexpectedStatus(String),

    /// The operation deadline elapsed before the deployment settled.
    #[error("timeout occurred: {0}")]
    Timeout(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::NotConfigured(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Http(_err) => "http error (see Debug output)",
            Self::NotAuthenticated(msg) => msg,
            Self::Api { message, .. } => message,
            Self::UnexpectedStatus(status) => status,
            Self::Timeout(msg) => msg,
            Self::Unimplemented(msg) => msg,
        }
    }

    /// Whether the backend reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Render this error as an error diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.to_string())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        err.to_diagnostic()
    }
}
