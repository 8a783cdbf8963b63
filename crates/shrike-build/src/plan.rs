//! Per-component build plan: activation and resolved version.
//!
//! The plan is produced before any validate/sign/register step so a failed
//! build can be diagnosed from the artifact alone.

use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::BuildConfig;
use crate::detect::{ActivationMethod, ChangeDetector, ChangeSet};
use crate::domain::component::ComponentSet;
use crate::obs;
use crate::repo_path::RepoPath;
use crate::version::{resolve_version, ResolvedVersion};

pub const PLAN_SCHEMA_VERSION: &str = "1.0";

/// Outcome for a single component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedComponent {
    pub key: String,
    pub folder: RepoPath,
    pub active: bool,
    pub version: ResolvedVersion,
    /// Changed paths that activated the component (empty for `all`).
    pub triggers: Vec<RepoPath>,
}

/// Build plan artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildPlan {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub activation_method: ActivationMethod,
    pub baseline: Option<String>,
    pub changed_paths: usize,
    /// SHA-256 over the ordered (key, active, version) tuples.
    pub digest: String,
    pub components: Vec<PlannedComponent>,
}

impl BuildPlan {
    /// Run change detection and version resolution for every component.
    pub fn assemble(components: &ComponentSet, changes: &ChangeSet, config: &BuildConfig) -> Self {
        let method = config.activation_method;
        let activation = ChangeDetector::activate(method, changes, components.as_slice());
        obs::emit_changes_detected(changes.len(), components.len(), activation.active_count());

        let planned: Vec<PlannedComponent> = components
            .iter()
            .map(|component| {
                let active = activation.is_active(&component.key);
                let version = resolve_version(&config.resolution_context(component));
                let triggers = match method {
                    ActivationMethod::Smart => ChangeDetector::matching_paths(changes, component)
                        .into_iter()
                        .cloned()
                        .collect(),
                    ActivationMethod::All => Vec::new(),
                };
                obs::emit_component_planned(&component.key, active, &version);
                PlannedComponent {
                    key: component.key.clone(),
                    folder: component.folder_path.clone(),
                    active,
                    version,
                    triggers,
                }
            })
            .collect();

        Self {
            schema_version: PLAN_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            activation_method: method,
            baseline: None,
            changed_paths: changes.len(),
            digest: compute_plan_digest(&planned),
            components: planned,
        }
    }

    pub fn with_baseline(mut self, baseline: impl Into<String>) -> Self {
        self.baseline = Some(baseline.into());
        self
    }

    pub fn active(&self) -> impl Iterator<Item = &PlannedComponent> {
        self.components.iter().filter(|c| c.active)
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }
}

fn compute_plan_digest(components: &[PlannedComponent]) -> String {
    let mut hasher = Sha256::new();
    for component in components {
        hasher.update(component.key.as_bytes());
        hasher.update(b"\0");
        hasher.update(if component.active { b"1" } else { b"0" });
        hasher.update(b"\0");
        hasher.update(component.version.as_option().unwrap_or("").as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// Write the plan as pretty JSON.
pub fn write_plan_json(path: &Path, plan: &BuildPlan) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(plan).context("serialize build plan")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    obs::emit_plan_written(&path.display().to_string(), plan.components.len());
    Ok(())
}

/// Render a markdown summary for PR comments and build summaries.
pub fn render_plan_md(plan: &BuildPlan) -> String {
    let mut out = String::new();
    out.push_str("# Build Plan\n\n");
    out.push_str(&format!(
        "- activation method: {}\n- changed paths: {}\n- active components: {} of {}\n",
        plan.activation_method.as_str(),
        plan.changed_paths,
        plan.active_count(),
        plan.components.len()
    ));
    if let Some(baseline) = &plan.baseline {
        out.push_str(&format!("- baseline: `{}`\n", baseline));
    }
    out.push('\n');

    out.push_str("| Component | Active | Version |\n|---|---|---|\n");
    for c in &plan.components {
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            c.key,
            if c.active { "yes" } else { "no" },
            c.version
        ));
    }
    out
}

/// Write the markdown summary.
pub fn write_plan_md(path: &Path, plan: &BuildPlan) -> anyhow::Result<()> {
    std::fs::write(path, render_plan_md(plan)).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
