//! Error types for chef-core

use std::path::PathBuf;

/// Result type for chef-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while declaring, slicing or resolving clusters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Facet referenced but never declared
    #[error("Facet '{facet}' is not defined in cluster '{cluster}'")]
    FacetNotFound { cluster: String, facet: String },

    /// Slice index beyond the servers in scope
    #[error("Server index {index} is out of range for {scope} in cluster '{cluster}' ({len} servers)")]
    IndexOutOfRange {
        cluster: String,
        scope: String,
        index: usize,
        len: usize,
    },

    /// Slice index expression that cannot be used
    #[error("Invalid slice indexes '{spec}': {reason}")]
    InvalidSliceIndexes { spec: String, reason: String },

    /// Cluster not registered and no manifest declares it
    #[error("Cluster '{cluster}' is not defined")]
    ClusterNotFound { cluster: String },

    /// Registering a name that is already taken
    #[error("Cluster '{cluster}' is already registered")]
    DuplicateClusterName { cluster: String },

    /// Clusters that `use` each other
    #[error("Circular cluster use: {chain}")]
    CircularUse { chain: String },

    /// Provisioning requested before `resolve`
    #[error("Cluster '{cluster}' has not been resolved")]
    NotResolved { cluster: String },

    /// A settings layer could not be merged
    #[error("Cannot merge settings for {context}: {source}")]
    MergeFailed {
        context: String,
        #[source]
        source: chef_settings::Error,
    },

    /// Manifest file that does not parse
    #[error("Invalid cluster manifest {path}: {message}")]
    ManifestParse { path: PathBuf, message: String },

    /// Manifest content rejected before it is tied to a file
    #[error("Invalid cluster manifest: {message}")]
    InvalidManifest { message: String },

    /// Provisioner failure surfaced unchanged
    #[error("Provisioning failed for {resource}: {message}")]
    Provision { resource: String, message: String },

    // Transparent wrappers for underlying crate errors
    /// Settings error from chef-settings
    #[error(transparent)]
    Settings(#[from] chef_settings::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn merge(context: impl Into<String>) -> impl FnOnce(chef_settings::Error) -> Self {
        let context = context.into();
        move |source| Self::MergeFailed { context, source }
    }
}
