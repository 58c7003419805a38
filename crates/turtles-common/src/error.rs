//! Error types for the import controller
//!
//! Errors carry enough context (URL, document index, cluster, object) to
//! make a failed reconciliation debuggable from the controller log alone.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for import operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Manifest download failed (transport error or non-success status)
    #[error("manifest download from {url} failed: {message}")]
    Download {
        /// URL the manifest was fetched from
        url: String,
        /// Description of what failed
        message: String,
    },

    /// Manifest document could not be decoded
    #[error("manifest decode error in document {document}: {message}")]
    Decode {
        /// Zero-based index of the offending document in the stream
        document: usize,
        /// Description of what failed
        message: String,
    },

    /// Target cluster client could not be built
    #[error("remote cluster error for {cluster}: {message}")]
    Remote {
        /// `namespace/name` of the primary cluster
        cluster: String,
        /// Description of what failed
        message: String,
    },

    /// Reading or creating an object on the target cluster failed
    #[error("apply error for {object}: {message}")]
    Apply {
        /// Human readable identity of the object (kind namespace/name)
        object: String,
        /// Description of what failed
        message: String,
        /// Whether the target API reported the object as missing
        not_found: bool,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error occurred
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a download error for the given URL
    pub fn download(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a decode error for a document in the manifest stream
    pub fn decode(document: usize, msg: impl Into<String>) -> Self {
        Self::Decode {
            document,
            message: msg.into(),
        }
    }

    /// Create a remote cluster error
    pub fn remote(cluster: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Remote {
            cluster: cluster.into(),
            message: msg.into(),
        }
    }

    /// Create an apply error for an object on the target cluster
    pub fn apply(object: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Apply {
            object: object.into(),
            message: msg.into(),
            not_found: false,
        }
    }

    /// Create an apply error wrapping a kube error, keeping the 404 marker
    pub fn apply_from_kube(object: impl Into<String>, source: kube::Error) -> Self {
        let not_found = is_kube_not_found(&source);
        Self::Apply {
            object: object.into(),
            message: source.to_string(),
            not_found,
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            context: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Whether the error means "the resource does not exist"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube { source } => is_kube_not_found(source),
            Error::Apply { not_found, .. } => *not_found,
            _ => false,
        }
    }

    /// Check if this error is retryable
    ///
    /// Decode errors are not retryable (the manifest itself is bad).
    /// Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => !matches!(
                source,
                kube::Error::Api(ae) if (400..500).contains(&ae.code) && ae.code != 429
            ),
            Error::Download { .. } => true,
            Error::Decode { .. } => false,
            Error::Remote { .. } => true,
            Error::Apply { .. } => true,
            Error::Internal { .. } => true,
        }
    }
}

/// Whether a kube error is an API 404
pub fn is_kube_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}
