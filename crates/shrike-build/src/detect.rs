//! "Smart" change detection.
//!
//! A component is active when a changed path falls under its folder or under
//! one of its additional include paths. Containment is segment-aware (see
//! [`RepoPath::contains`]). Broad include directories over-activate on
//! purpose: a change anywhere under `shared/` activates every component that
//! includes `shared/`, whether or not it uses the changed file.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::component::{Component, ComponentKey};
use crate::domain::error::ConfigError;
use crate::repo_path::RepoPath;

/// Paths modified between a baseline commit and the working state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    paths: Vec<RepoPath>,
}

impl ChangeSet {
    pub fn new(paths: Vec<RepoPath>) -> Self {
        Self { paths }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Normalize raw path strings into a change set.
    pub fn parse<I, S>(raw: I) -> Result<Self, crate::domain::error::PathError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths = raw
            .into_iter()
            .map(|p| RepoPath::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { paths })
    }

    pub fn paths(&self) -> &[RepoPath] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// How active components are chosen.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMethod {
    /// Every discovered component is active.
    #[default]
    All,
    /// Only components touched by the change set are active.
    Smart,
}

impl ActivationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationMethod::All => "all",
            ActivationMethod::Smart => "smart",
        }
    }
}

impl FromStr for ActivationMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(ActivationMethod::All),
            "smart" => Ok(ActivationMethod::Smart),
            other => Err(ConfigError::InvalidActivationMethod(other.to_string())),
        }
    }
}

/// Component key -> whether it must be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivationResult {
    entries: BTreeMap<ComponentKey, bool>,
}

impl ActivationResult {
    pub fn is_active(&self, key: &str) -> bool {
        self.entries.get(key).copied().unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    /// Active keys in key order.
    pub fn active_keys(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, active)| **active)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.entries.values().filter(|active| **active).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_map(self) -> BTreeMap<ComponentKey, bool> {
        self.entries
    }
}

impl FromIterator<(ComponentKey, bool)> for ActivationResult {
    fn from_iter<T: IntoIterator<Item = (ComponentKey, bool)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Decides which components a change set touches.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Mark each component active iff a changed path is under one of its roots.
    ///
    /// An empty change set leaves every component inactive.
    pub fn detect(changes: &ChangeSet, components: &[Component]) -> ActivationResult {
        components
            .iter()
            .map(|component| {
                let active = changes
                    .paths()
                    .iter()
                    .any(|changed| Self::touches(component, changed));
                (component.key.clone(), active)
            })
            .collect()
    }

    /// Apply `method`: `All` ignores the change set entirely.
    pub fn activate(
        method: ActivationMethod,
        changes: &ChangeSet,
        components: &[Component],
    ) -> ActivationResult {
        match method {
            ActivationMethod::All => components
                .iter()
                .map(|component| (component.key.clone(), true))
                .collect(),
            ActivationMethod::Smart => Self::detect(changes, components),
        }
    }

    /// Changed paths that activate `component`, in change-set order.
    pub fn matching_paths<'c>(changes: &'c ChangeSet, component: &Component) -> Vec<&'c RepoPath> {
        changes
            .paths()
            .iter()
            .filter(|changed| Self::touches(component, changed))
            .collect()
    }

    fn touches(component: &Component, changed: &RepoPath) -> bool {
        component.watched_roots().any(|root| root.contains(changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> RepoPath {
        RepoPath::parse(raw).unwrap()
    }

    fn changes(raw: &[&str]) -> ChangeSet {
        ChangeSet::parse(raw.iter().copied()).unwrap()
    }

    #[test]
    fn test_folder_containment_is_segment_aware() {
        let foo = Component::new("foo", p("components/foo"));
        let foobar = Component::new("foobar", p("components/foobar"));
        let result = ChangeDetector::detect(
            &changes(&["components/foo/script.py"]),
            &[foo, foobar],
        );
        assert!(result.is_active("foo"));
        assert!(!result.is_active("foobar"));
    }

    #[test]
    fn test_include_file_matches_exactly() {
        let c = Component::new("a", p("c/A")).with_includes(vec![p("shared/config.json")]);
        assert!(ChangeDetector::detect(&changes(&["shared/config.json"]), &[c.clone()]).is_active("a"));
        assert!(!ChangeDetector::detect(&changes(&["shared/config.json.bak"]), &[c]).is_active("a"));
    }

    #[test]
    fn test_empty_change_set_activates_nothing() {
        let c = Component::new("a", p("c/A"));
        let result = ChangeDetector::detect(&ChangeSet::empty(), &[c]);
        assert_eq!(result.get("a"), Some(false));
        assert_eq!(result.active_count(), 0);
    }

    #[test]
    fn test_all_method_ignores_changes() {
        let a = Component::new("a", p("c/A"));
        let b = Component::new("b", p("c/B"));
        let result = ChangeDetector::activate(ActivationMethod::All, &ChangeSet::empty(), &[a, b]);
        assert_eq!(result.active_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_matching_paths_reports_triggers() {
        let c = Component::new("b", p("c/B")).with_includes(vec![p("shared")]);
        let set = changes(&["docs/x.md", "shared/lib.py", "c/B/run.py"]);
        let hits: Vec<String> = ChangeDetector::matching_paths(&set, &c)
            .into_iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(hits, vec!["shared/lib.py", "c/B/run.py"]);
    }

    #[test]
    fn test_activation_method_parse() {
        assert_eq!("smart".parse::<ActivationMethod>().unwrap(), ActivationMethod::Smart);
        assert_eq!("all".parse::<ActivationMethod>().unwrap(), ActivationMethod::All);
        assert!(matches!(
            "some".parse::<ActivationMethod>(),
            Err(ConfigError::InvalidActivationMethod(_))
        ));
    }

    #[test]
    fn test_activation_result_serializes_as_map() {
        let result: ActivationResult =
            vec![("A".to_string(), true), ("B".to_string(), false)].into_iter().collect();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({"A": true, "B": false}));
    }
}
