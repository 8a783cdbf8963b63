//! Component model shared by version resolution and change detection.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, ShrikeError};
use crate::repo_path::RepoPath;

/// Identifier of a component within one pipeline graph.
pub type ComponentKey = String;

/// One deployable pipeline unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Component {
    /// Unique key within a graph (not necessarily the registered name).
    pub key: ComponentKey,

    /// Version hardcoded by the graph author for this key.
    #[serde(default)]
    pub declared_version: Option<String>,

    /// Version pinned for this key in the shared manifest.
    #[serde(default)]
    pub manifest_version: Option<String>,

    /// Root directory holding the component's own files.
    pub folder_path: RepoPath,

    /// Files or directories whose modification also counts as a change.
    #[serde(default)]
    pub additional_include_paths: Vec<RepoPath>,
}

impl Component {
    pub fn new(key: impl Into<ComponentKey>, folder_path: RepoPath) -> Self {
        Self {
            key: key.into(),
            declared_version: None,
            manifest_version: None,
            folder_path,
            additional_include_paths: Vec::new(),
        }
    }

    pub fn with_declared_version(mut self, version: impl Into<String>) -> Self {
        self.declared_version = Some(version.into());
        self
    }

    pub fn with_manifest_version(mut self, version: impl Into<String>) -> Self {
        self.manifest_version = Some(version.into());
        self
    }

    /// Append include paths, dropping ones already present.
    pub fn with_includes(mut self, paths: impl IntoIterator<Item = RepoPath>) -> Self {
        for path in paths {
            if !self.additional_include_paths.contains(&path) {
                self.additional_include_paths.push(path);
            }
        }
        self
    }

    /// Every root whose subtree belongs to this component, folder first.
    pub fn watched_roots(&self) -> impl Iterator<Item = &RepoPath> {
        std::iter::once(&self.folder_path).chain(self.additional_include_paths.iter())
    }
}

/// A collection of components with unique keys, kept in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentSet {
    components: Vec<Component>,
}

impl ComponentSet {
    /// Build a set, rejecting duplicate keys.
    pub fn new(components: Vec<Component>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for component in &components {
            if !seen.insert(component.key.as_str()) {
                return Err(ShrikeError::DuplicateComponent(component.key.clone()));
            }
        }
        let mut components = components;
        components.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(Self { components })
    }

    pub fn get(&self, key: &str) -> Option<&Component> {
        self.components
            .binary_search_by(|c| c.key.as_str().cmp(key))
            .ok()
            .map(|idx| &self.components[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Component> {
        self.components.iter()
    }

    pub fn as_slice(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<'a> IntoIterator for &'a ComponentSet {
    type Item = &'a Component;
    type IntoIter = std::slice::Iter<'a, Component>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> RepoPath {
        RepoPath::parse(raw).unwrap()
    }

    #[test]
    fn test_with_includes_dedups() {
        let c = Component::new("a", p("c/A")).with_includes(vec![p("shared"), p("shared/")]);
        assert_eq!(c.additional_include_paths, vec![p("shared")]);
    }

    #[test]
    fn test_watched_roots_folder_first() {
        let c = Component::new("b", p("c/B")).with_includes(vec![p("shared")]);
        let roots: Vec<String> = c.watched_roots().map(ToString::to_string).collect();
        assert_eq!(roots, vec!["c/B", "shared"]);
    }

    #[test]
    fn test_component_set_rejects_duplicate_keys() {
        let err = ComponentSet::new(vec![
            Component::new("a", p("c/A")),
            Component::new("a", p("c/other")),
        ])
        .unwrap_err();
        assert!(matches!(err, ShrikeError::DuplicateComponent(key) if key == "a"));
    }

    #[test]
    fn test_component_set_sorted_lookup() {
        let set = ComponentSet::new(vec![
            Component::new("zeta", p("c/Z")),
            Component::new("alpha", p("c/A")),
        ])
        .unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().key, "alpha");
        assert_eq!(set.get("zeta").unwrap().folder_path, p("c/Z"));
        assert!(set.get("missing").is_none());
    }
}
