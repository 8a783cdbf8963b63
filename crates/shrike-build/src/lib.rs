//! shrike build planning library
//!
//! Decides, for a repository of ML pipeline components:
//! - which components a change touches ("smart" activation)
//! - which version each component binds to (override precedence)
//!
//! Both decisions are pure functions over explicit inputs. The surrounding
//! modules supply those inputs (discovery, manifest, git, config) and
//! report the outcome (plan).

pub mod config;
pub mod detect;
pub mod discovery;
pub mod domain;
pub mod git;
pub mod manifest;
pub mod obs;
pub mod plan;
pub mod repo_path;
pub mod telemetry;
pub mod version;

pub use config::{BuildConfig, ConfigLayer, BUILD_NUMBER_ENV, DEFAULT_COMPLIANT_BRANCH};
pub use detect::{ActivationMethod, ActivationResult, ChangeDetector, ChangeSet};
pub use discovery::{ComponentDiscovery, DEFAULT_SPEC_GLOB};
pub use domain::{
    Component, ComponentKey, ComponentSet, ConfigError, ManifestError, PathError, Result,
    ShrikeError,
};
pub use git::{
    is_git_repo, Baseline, BuildScenario, CompliantBranch, DiffProvider, GitDiffProvider,
    StaticDiffProvider,
};
pub use manifest::{LocalSelection, ManifestEntry, ModuleLoader, ModuleManifest, ModuleSource};
pub use obs::PlanSpan;
pub use plan::{render_plan_md, write_plan_json, write_plan_md, BuildPlan, PlannedComponent};
pub use repo_path::RepoPath;
pub use telemetry::init_tracing;
pub use version::{
    resolve_version, validate_version, ResolvedVersion, VersionResolutionContext, VersionSource,
};

/// shrike version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
