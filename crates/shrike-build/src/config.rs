//! Layered build configuration.
//!
//! Settings come from three layers, lowest to highest precedence:
//! built-in defaults, the YAML configuration file, and the command line.
//! [`BuildConfig::from_layers`] merges them once at the process boundary and
//! validates the result; the core only ever sees the immutable outcome.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detect::ActivationMethod;
use crate::discovery::DEFAULT_SPEC_GLOB;
use crate::domain::component::Component;
use crate::domain::error::{ConfigError, Result};
use crate::git::CompliantBranch;
use crate::manifest::LocalSelection;
use crate::version::{validate_version, VersionResolutionContext};

/// Environment variable carrying the CI build number.
pub const BUILD_NUMBER_ENV: &str = "BUILD_BUILDNUMBER";

/// Default compliant branch pattern.
pub const DEFAULT_COMPLIANT_BRANCH: &str = "^refs/heads/main$";

/// One configuration layer; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub working_directory: Option<PathBuf>,
    pub component_specification_glob: Option<String>,
    pub activation_method: Option<String>,
    pub compliant_branch: Option<String>,
    pub all_component_version: Option<String>,
    pub default_component_version: Option<String>,
    pub use_build_number: Option<bool>,
    pub manifest: Option<PathBuf>,
    pub use_local: Option<String>,
    pub verbose: Option<bool>,
}

impl ConfigLayer {
    /// Built-in defaults, the lowest layer.
    pub fn defaults() -> Self {
        Self {
            working_directory: Some(PathBuf::from(".")),
            component_specification_glob: Some(DEFAULT_SPEC_GLOB.to_string()),
            activation_method: Some(ActivationMethod::All.as_str().to_string()),
            compliant_branch: Some(DEFAULT_COMPLIANT_BRANCH.to_string()),
            use_build_number: Some(false),
            verbose: Some(false),
            ..Self::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let layer = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), "loaded configuration file");
        Ok(layer)
    }

    /// Overlay `higher` on top of `self`; set fields in `higher` win.
    pub fn overlay(self, higher: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            working_directory: higher.working_directory.or(self.working_directory),
            component_specification_glob: higher
                .component_specification_glob
                .or(self.component_specification_glob),
            activation_method: higher.activation_method.or(self.activation_method),
            compliant_branch: higher.compliant_branch.or(self.compliant_branch),
            all_component_version: higher.all_component_version.or(self.all_component_version),
            default_component_version: higher
                .default_component_version
                .or(self.default_component_version),
            use_build_number: higher.use_build_number.or(self.use_build_number),
            manifest: higher.manifest.or(self.manifest),
            use_local: higher.use_local.or(self.use_local),
            verbose: higher.verbose.or(self.verbose),
        }
    }
}

/// Effective, validated configuration for one build invocation.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub working_directory: PathBuf,
    pub component_specification_glob: String,
    pub activation_method: ActivationMethod,
    pub compliant_branch: CompliantBranch,
    pub all_component_version: Option<String>,
    pub default_component_version: Option<String>,
    pub use_build_number: bool,
    pub manifest: Option<PathBuf>,
    pub use_local: LocalSelection,
    pub verbose: bool,
}

impl BuildConfig {
    /// Merge defaults < file < cli, then apply environment-driven overrides.
    pub fn from_layers(
        file: Option<ConfigLayer>,
        cli: ConfigLayer,
        env: &BTreeMap<String, String>,
    ) -> std::result::Result<Self, ConfigError> {
        let merged = ConfigLayer::defaults()
            .overlay(file.unwrap_or_default())
            .overlay(cli);

        let activation_method = merged
            .activation_method
            .as_deref()
            .unwrap_or(ActivationMethod::All.as_str())
            .parse::<ActivationMethod>()?;

        let compliant_branch = CompliantBranch::parse(
            merged
                .compliant_branch
                .as_deref()
                .unwrap_or(DEFAULT_COMPLIANT_BRANCH),
        )?;

        let use_build_number = merged.use_build_number.unwrap_or(false);
        let mut all_component_version = non_empty(merged.all_component_version);
        if use_build_number {
            let build_number = env
                .get(BUILD_NUMBER_ENV)
                .filter(|n| !n.trim().is_empty())
                .cloned()
                .ok_or(ConfigError::MissingBuildNumber)?;
            if let Some(previous) = &all_component_version {
                warn!(
                    "The build number {} overwrites the value of all_component_version {}",
                    build_number, previous
                );
            }
            all_component_version = Some(build_number);
        } else if let Some(version) = &all_component_version {
            validate_version("all_component_version", version)?;
        }

        let default_component_version = non_empty(merged.default_component_version);
        if let Some(version) = &default_component_version {
            validate_version("default_component_version", version)?;
        }

        Ok(Self {
            working_directory: merged
                .working_directory
                .unwrap_or_else(|| PathBuf::from(".")),
            component_specification_glob: merged
                .component_specification_glob
                .unwrap_or_else(|| DEFAULT_SPEC_GLOB.to_string()),
            activation_method,
            compliant_branch,
            all_component_version,
            default_component_version,
            use_build_number,
            manifest: merged.manifest,
            use_local: LocalSelection::parse(merged.use_local.as_deref()),
            verbose: merged.verbose.unwrap_or(false),
        })
    }

    /// Resolution inputs for `component` under this configuration.
    pub fn resolution_context<'a>(&'a self, component: &'a Component) -> VersionResolutionContext<'a> {
        VersionResolutionContext::new(component)
            .force_all(self.all_component_version.as_deref())
            .force_default(self.default_component_version.as_deref())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
