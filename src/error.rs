//! The error type shared by every stage of the catalog.
//!
//! Each variant corresponds to one stable, machine-readable reason returned by
//! [`Error::reason`]. Callers that need to branch on the failure category should
//! match on the variant or the reason string rather than on the display text.

use thiserror::Error;

use crate::source::SourceError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The provider identifier is not of the form `[a-z0-9_-]{1,255}`.
    #[error("provider \"{0}\" is malformed")]
    BadProvider(String),
    /// The provider identifier is well-formed but not registered.
    #[error("provider \"{0}\" is not known")]
    UnknownProvider(String),
    /// A record carries no `id`.
    #[error("record is missing an id")]
    MissingId,
    /// A model record carries no `provider`.
    #[error("model \"{0}\" is missing a provider")]
    MissingProvider(String),
    /// A record `id` is present but unusable.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// A model record was rejected by the schema validator.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// A provider record was rejected by the schema validator.
    #[error("invalid provider: {0}")]
    InvalidProvider(String),
    /// A model spec literal could not be split into a provider and a model.
    #[error("invalid model spec {0}")]
    InvalidFormat(String),
    /// A model id pattern could not be compiled.
    #[error("invalid pattern {0}")]
    InvalidPattern(String),
    /// A model spec literal contains both separators and no format was requested.
    #[error("model spec \"{0}\" is ambiguous, it contains both ':' and '@'")]
    AmbiguousFormat(String),
    /// The pipeline finished with no providers or no models.
    #[error("the catalog is empty")]
    EmptyCatalog,
    /// No model satisfied the selection.
    #[error("no model matches the selection")]
    NoMatch,
    /// A direct lookup missed.
    #[error("{0} not found")]
    NotFound(String),
    /// A capability predicate name is not one of the supported paths.
    #[error("unknown capability \"{0}\"")]
    UnknownCapability(String),
    /// The store has never been loaded, or was cleared.
    #[error("the catalog has not been loaded")]
    NotLoaded,
    /// A source failed and no other source produced data.
    #[error("source \"{source_name}\" failed: {error}")]
    Source {
        source_name: String,
        #[source]
        error: SourceError,
    },
    /// The configuration file could not be read or parsed.
    #[error("failed to read config {path}: {detail}")]
    Config { path: String, detail: String },
}

impl Error {
    /// The stable reason code for this error.
    pub fn reason(&self) -> &'static str {
        match self {
            Error::BadProvider(_) => "bad_provider",
            Error::UnknownProvider(_) => "unknown_provider",
            Error::MissingId => "missing_id",
            Error::MissingProvider(_) => "missing_provider",
            Error::InvalidId(_) => "invalid_id",
            Error::InvalidModel(_) => "invalid_model",
            Error::InvalidProvider(_) => "invalid_provider",
            Error::InvalidFormat(_) => "invalid_format",
            Error::InvalidPattern(_) => "invalid_pattern",
            Error::AmbiguousFormat(_) => "ambiguous_format",
            Error::EmptyCatalog => "empty_catalog",
            Error::NoMatch => "no_match",
            Error::NotFound(_) => "not_found",
            Error::UnknownCapability(_) => "unknown_capability",
            Error::NotLoaded => "not_loaded",
            Error::Source { error, .. } => error.reason(),
            Error::Config { .. } => "bad_config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_pass_their_reason_through() {
        let err = Error::Source {
            source_name: "remote".to_string(),
            error: SourceError::NoApiKey,
        };

        assert_eq!(err.reason(), "no_api_key");
        assert!(err.to_string().contains("remote"));
    }

    #[test]
    fn reasons_are_snake_case() {
        assert_eq!(Error::EmptyCatalog.reason(), "empty_catalog");
        assert_eq!(Error::AmbiguousFormat("a:b@c".into()).reason(), "ambiguous_format");
        assert_eq!(Error::MissingProvider("m".into()).reason(), "missing_provider");
    }
}
