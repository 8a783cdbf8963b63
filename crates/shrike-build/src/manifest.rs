//! Module manifest: a team-shared list of components pinned by key.
//!
//! ```yaml
//! manifest:
//!   - key: train
//!     name: contoso.train
//!     version: 1.2.0
//!     yaml: components/train/spec.yaml
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::component::Component;
use crate::domain::error::{ManifestError, Result};
use crate::version::{resolve_version, ResolvedVersion, VersionResolutionContext};

/// One manifest entry as written in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub yaml: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    manifest: Vec<ManifestEntry>,
}

/// Manifest entries indexed by key (`key`, falling back to `name`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl ModuleManifest {
    pub fn from_entries(entries: Vec<ManifestEntry>) -> std::result::Result<Self, ManifestError> {
        let mut indexed = BTreeMap::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let key = entry
                .key
                .clone()
                .or_else(|| entry.name.clone())
                .filter(|k| !k.is_empty())
                .ok_or(ManifestError::MissingKey { index })?;
            if indexed.contains_key(&key) {
                return Err(ManifestError::DuplicateKey(key));
            }
            indexed.insert(key, entry);
        }
        Ok(Self { entries: indexed })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let file: ManifestFile = serde_yaml::from_str(content)?;
        Ok(Self::from_entries(file.manifest)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest = Self::from_yaml_str(&content)?;
        debug!(path = %path.display(), entries = manifest.len(), "loaded module manifest");
        Ok(manifest)
    }

    pub fn get(&self, key: &str) -> Option<&ManifestEntry> {
        self.entries.get(key)
    }

    /// Version pinned for `key`, if any.
    pub fn version_for(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|e| e.version.as_deref())
    }

    /// Copy manifest pins onto matching components.
    pub fn apply(&self, components: &mut [Component]) {
        for component in components.iter_mut() {
            if let Some(version) = self.version_for(&component.key) {
                component.manifest_version = Some(version.to_string());
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Which manifest keys are loaded from local sources instead of the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSelection {
    #[default]
    None,
    All,
    Keys(Vec<String>),
}

impl LocalSelection {
    /// Parse the `use_local` setting: empty, `*`, or a comma-separated list.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => LocalSelection::None,
            Some("*") => LocalSelection::All,
            Some(list) => LocalSelection::Keys(
                list.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }

    pub fn is_local(&self, key: &str) -> bool {
        match self {
            LocalSelection::None => false,
            LocalSelection::All => true,
            LocalSelection::Keys(keys) => keys.iter().any(|k| k == key),
        }
    }
}

/// Where a module comes from once the manifest and overrides are applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ModuleSource {
    Local { spec: String },
    Registered { name: String, version: ResolvedVersion },
}

/// Plans module loading from a manifest plus version overrides.
#[derive(Debug, Clone)]
pub struct ModuleLoader<'a> {
    manifest: &'a ModuleManifest,
    local: LocalSelection,
    force_all_module_version: Option<&'a str>,
    force_default_module_version: Option<&'a str>,
}

impl<'a> ModuleLoader<'a> {
    pub fn new(manifest: &'a ModuleManifest, local: LocalSelection) -> Self {
        Self {
            manifest,
            local,
            force_all_module_version: None,
            force_default_module_version: None,
        }
    }

    pub fn with_overrides(
        mut self,
        force_all: Option<&'a str>,
        force_default: Option<&'a str>,
    ) -> Self {
        self.force_all_module_version = force_all;
        self.force_default_module_version = force_default;
        self
    }

    /// Decide how `key` is loaded.
    ///
    /// `declared_version` is a version hardcoded by graph code for this key.
    pub fn plan(
        &self,
        key: &str,
        declared_version: Option<&str>,
    ) -> std::result::Result<ModuleSource, ManifestError> {
        let entry = self
            .manifest
            .get(key)
            .ok_or_else(|| ManifestError::UnknownKey(key.to_string()))?;

        if self.local.is_local(key) {
            let spec = entry
                .yaml
                .clone()
                .ok_or_else(|| ManifestError::MissingLocalSpec(key.to_string()))?;
            return Ok(ModuleSource::Local { spec });
        }

        let name = entry.name.clone().unwrap_or_else(|| key.to_string());
        let mut component = Component::new(key, crate::repo_path::RepoPath::root());
        component.manifest_version = entry.version.clone();
        component.declared_version = declared_version.map(str::to_string);

        let ctx = VersionResolutionContext::new(&component)
            .force_all(self.force_all_module_version)
            .force_default(self.force_default_module_version);
        Ok(ModuleSource::Registered {
            name,
            version: resolve_version(&ctx),
        })
    }

    /// Plan every manifest key, collecting all errors rather than stopping at the first.
    pub fn plan_all(
        &self,
    ) -> std::result::Result<BTreeMap<String, ModuleSource>, Vec<ManifestError>> {
        let mut planned = BTreeMap::new();
        let mut errors = Vec::new();
        for key in self.manifest.keys() {
            match self.plan(key, None) {
                Ok(source) => {
                    planned.insert(key.to_string(), source);
                }
                Err(e) => errors.push(e),
            }
        }
        if errors.is_empty() {
            Ok(planned)
        } else {
            Err(errors)
        }
    }
}
