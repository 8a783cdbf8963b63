//! Error taxonomy for shrike build planning.

/// Errors produced while normalizing repository paths.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path escapes the repository root: {path}")]
    EscapesRoot { path: String },

    #[error("path {path} is outside repository root {root}")]
    OutsideRoot { path: String, root: String },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8(String),
}

/// Malformed or conflicting configuration values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid version for {field}: {value} ({reason})")]
    InvalidVersion {
        field: String,
        value: String,
        reason: String,
    },

    #[error("invalid activation method: '{0}' (expected 'all' or 'smart')")]
    InvalidActivationMethod(String),

    #[error(
        "compliant branch must start with '^refs/heads/' and end with '$', got: '{0}'"
    )]
    InvalidCompliantBranch(String),

    #[error("use_build_number is set but BUILD_BUILDNUMBER is not available")]
    MissingBuildNumber,

    #[error("invalid glob pattern {pattern}: {reason}")]
    InvalidGlob { pattern: String, reason: String },
}

/// Errors raised while reading a module manifest.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest entry #{index} has neither key nor name")]
    MissingKey { index: usize },

    #[error("duplicate manifest key: {0}")]
    DuplicateKey(String),

    #[error("module key '{0}' is not in the manifest")]
    UnknownKey(String),

    #[error("{0}: a yaml spec is required to load the module locally")]
    MissingLocalSpec(String),
}

impl ManifestError {
    /// Module key the error is about, when the entry had one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::MissingKey { .. } => None,
            Self::DuplicateKey(key) | Self::UnknownKey(key) | Self::MissingLocalSpec(key) => {
                Some(key)
            }
        }
    }
}

/// Top-level errors for shrike build planning.
#[derive(Debug, thiserror::Error)]
pub enum ShrikeError {
    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("component {key}: {source}")]
    ComponentPath {
        key: String,
        #[source]
        source: PathError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("duplicate component key: {0}")]
    DuplicateComponent(String),

    #[error("invalid component specification {path}: {reason}")]
    InvalidSpec { path: String, reason: String },

    #[error("git error: {0}")]
    Git(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for shrike build operations.
pub type Result<T> = std::result::Result<T, ShrikeError>;
