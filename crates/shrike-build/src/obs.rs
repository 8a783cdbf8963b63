//! Structured observability hooks for build planning.
//!
//! Events are emitted at `info!` level with an `event` field so log
//! aggregation can filter on them. For JSON output pass `--json` to the CLI.

use tracing::info;

use crate::version::ResolvedVersion;

/// RAII guard that enters a span for one build invocation.
///
/// ```ignore
/// let _span = PlanSpan::enter("smart", "/repo");
/// // every event below is tagged with method and repo
/// ```
pub struct PlanSpan {
    _span: tracing::span::EnteredSpan,
}

impl PlanSpan {
    pub fn enter(method: &str, repo: &str) -> Self {
        let span = tracing::info_span!("shrike.plan", method = %method, repo = %repo);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: change detection finished.
pub fn emit_changes_detected(changed_paths: usize, components: usize, active: usize) {
    info!(
        event = "changes.detected",
        changed_paths = changed_paths,
        components = components,
        active = active,
    );
}

/// Emit event: one component's activation and version decided.
pub fn emit_component_planned(key: &str, active: bool, version: &ResolvedVersion) {
    info!(
        event = "component.planned",
        key = %key,
        active = active,
        version = version.as_option().unwrap_or(""),
        source = version.source().map(|s| s.as_str()).unwrap_or("platform_default"),
    );
}

/// Emit event: a module's version resolved from the manifest.
pub fn emit_version_resolved(key: &str, version: &ResolvedVersion) {
    info!(event = "version.resolved", key = %key, version = %version);
}

/// Emit event: plan artifact written.
pub fn emit_plan_written(path: &str, components: usize) {
    info!(event = "plan.written", path = %path, components = components);
}

/// Emit event: a component was rejected while loading (warning level).
pub fn emit_component_rejected(key: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "component.rejected", key = %key, error = %error);
}
