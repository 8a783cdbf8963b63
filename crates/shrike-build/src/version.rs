//! Module version resolution.
//!
//! Decides which version string a component is bound to when a pipeline
//! graph is built. Sources are consulted in a fixed order and the first one
//! that is set wins:
//!
//! 1. `force_all_module_version`
//! 2. the manifest entry for the component key
//! 3. the version hardcoded in graph code for the key
//! 4. `force_default_module_version`
//! 5. nothing: the platform picks its own default (usually latest)

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::component::Component;
use crate::domain::error::ConfigError;

/// Inputs for one resolution call.
#[derive(Debug, Clone, Copy)]
pub struct VersionResolutionContext<'a> {
    pub force_all_module_version: Option<&'a str>,
    pub force_default_module_version: Option<&'a str>,
    pub component: &'a Component,
}

impl<'a> VersionResolutionContext<'a> {
    pub fn new(component: &'a Component) -> Self {
        Self {
            force_all_module_version: None,
            force_default_module_version: None,
            component,
        }
    }

    pub fn force_all(mut self, version: Option<&'a str>) -> Self {
        self.force_all_module_version = version;
        self
    }

    pub fn force_default(mut self, version: Option<&'a str>) -> Self {
        self.force_default_module_version = version;
        self
    }
}

/// Which precedence rule produced a pinned version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    ForceAll,
    Manifest,
    Declared,
    ForceDefault,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::ForceAll => "force_all",
            VersionSource::Manifest => "manifest",
            VersionSource::Declared => "declared",
            VersionSource::ForceDefault => "force_default",
        }
    }
}

/// Outcome of version resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedVersion {
    /// A concrete version chosen by one of the precedence rules.
    Pinned {
        version: String,
        source: VersionSource,
    },
    /// Unset: defer to the platform's own default resolution.
    PlatformDefault,
}

impl ResolvedVersion {
    /// The pinned version, or `None` for the platform default.
    pub fn as_option(&self) -> Option<&str> {
        match self {
            ResolvedVersion::Pinned { version, .. } => Some(version),
            ResolvedVersion::PlatformDefault => None,
        }
    }

    pub fn source(&self) -> Option<VersionSource> {
        match self {
            ResolvedVersion::Pinned { source, .. } => Some(*source),
            ResolvedVersion::PlatformDefault => None,
        }
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self, ResolvedVersion::Pinned { .. })
    }
}

impl fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedVersion::Pinned { version, source } => {
                write!(f, "{version} ({})", source.as_str())
            }
            ResolvedVersion::PlatformDefault => f.write_str("<platform default>"),
        }
    }
}

/// Resolve the version to bind for `ctx.component`.
///
/// Empty strings count as unset. Version strings are not validated here.
pub fn resolve_version(ctx: &VersionResolutionContext<'_>) -> ResolvedVersion {
    let candidates = [
        (ctx.force_all_module_version, VersionSource::ForceAll),
        (
            ctx.component.manifest_version.as_deref(),
            VersionSource::Manifest,
        ),
        (
            ctx.component.declared_version.as_deref(),
            VersionSource::Declared,
        ),
        (ctx.force_default_module_version, VersionSource::ForceDefault),
    ];

    candidates
        .into_iter()
        .find_map(|(value, source)| {
            non_empty(value).map(|version| ResolvedVersion::Pinned {
                version: version.to_string(),
                source,
            })
        })
        .unwrap_or(ResolvedVersion::PlatformDefault)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Check that `value` is a semantic version.
///
/// `field` names the setting the value came from, for the error message.
pub fn validate_version(field: &str, value: &str) -> Result<semver::Version, ConfigError> {
    semver::Version::parse(value.trim()).map_err(|e| ConfigError::InvalidVersion {
        field: field.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
