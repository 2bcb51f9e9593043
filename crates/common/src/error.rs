//! Error types for the Cloud Avenue client

use thiserror::Error;

/// Result type alias using the Cloud Avenue Error
pub type Result<T> = std::result::Result<T, Error>;

/// Cloud Avenue error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Resource not found: {kind} with id {id}")]
    NotFound { kind: String, id: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Task {id} failed: {message}")]
    Task { id: String, message: String },

    #[error("Operation timeout after {seconds}s")]
    Timeout { seconds: u64 },
}

impl Error {
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// True when the error means the remote object does not exist.
    ///
    /// vCloud Director is inconsistent here: a missing entity may come back
    /// as a 404, or as a 400/403 whose message says the entity is unknown.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Api { status: 404, .. } => true,
            Error::Api { message, .. } => contains_not_found(message),
            Error::Task { message, .. } => contains_not_found(message),
            _ => false,
        }
    }
}

fn contains_not_found(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("no such entity")
}

/// Walks an `anyhow` chain looking for a not-found Cloud Avenue error.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_not_found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_variants() {
        assert!(Error::not_found("vdc", "my-vdc").is_not_found());
        assert!(Error::Api {
            status: 404,
            message: String::new()
        }
        .is_not_found());
        assert!(Error::Api {
            status: 403,
            message: "[ 2b6c ] The VDC Group urn:vcloud:vdcGroup:1234 does not exist.".into()
        }
        .is_not_found());
        assert!(!Error::Api {
            status: 500,
            message: "internal server error".into()
        }
        .is_not_found());
        assert!(!Error::Auth("bad password".into()).is_not_found());
    }

    #[test]
    fn test_not_found_through_anyhow_context() {
        let err = anyhow::Error::new(Error::not_found("edge gateway", "edge-01"))
            .context("reading edge gateway");
        assert!(is_not_found(&err));

        let err = anyhow::anyhow!("something else");
        assert!(!is_not_found(&err));
    }
}
