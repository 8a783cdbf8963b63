//! Component specification discovery.
//!
//! Component specs are found by glob under the working directory. Each spec
//! may have a sibling `<stem>.additional_includes` file listing extra files or
//! directories (relative to the component folder) that the component depends
//! on.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::component::{Component, ComponentSet};
use crate::domain::error::{ConfigError, Result, ShrikeError};
use crate::repo_path::RepoPath;

/// Default glob used to find component specification files.
pub const DEFAULT_SPEC_GLOB: &str = "**/spec.yaml";

const ADDITIONAL_INCLUDES_EXT: &str = "additional_includes";

#[derive(Debug, Default, Deserialize)]
struct SpecHeader {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

/// Finds component specs and turns them into [`Component`] records.
#[derive(Debug, Clone)]
pub struct ComponentDiscovery {
    repo_root: PathBuf,
    working_directory: PathBuf,
    spec_glob: String,
}

impl ComponentDiscovery {
    /// `working_directory` is resolved against `repo_root` when relative.
    pub fn new(repo_root: &Path, working_directory: &Path, spec_glob: &str) -> Result<Self> {
        let repo_root = std::fs::canonicalize(repo_root)?;
        let working_directory = std::fs::canonicalize(repo_root.join(working_directory))?;
        glob::Pattern::new(spec_glob).map_err(|e| ConfigError::InvalidGlob {
            pattern: spec_glob.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            repo_root,
            working_directory,
            spec_glob: spec_glob.to_string(),
        })
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Absolute paths of every spec file matching the glob, sorted.
    pub fn spec_files(&self) -> Result<Vec<PathBuf>> {
        let directory = glob::Pattern::escape(&self.working_directory.to_string_lossy());
        let pattern = format!("{}/{}", directory.trim_end_matches('/'), self.spec_glob);
        let entries = glob::glob(&pattern).map_err(|e| ConfigError::InvalidGlob {
            pattern: self.spec_glob.clone(),
            reason: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| ShrikeError::Io(e.into()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        debug!(count = files.len(), glob = %self.spec_glob, "found component specs");
        Ok(files)
    }

    /// Load every matching spec as a component.
    pub fn discover(&self) -> Result<ComponentSet> {
        let components = self
            .spec_files()?
            .iter()
            .map(|spec| self.load_component(spec))
            .collect::<Result<Vec<_>>>()?;
        info!(count = components.len(), "discovered components");
        ComponentSet::new(components)
    }

    /// Build one component from its spec file.
    pub fn load_component(&self, spec_path: &Path) -> Result<Component> {
        let spec_repo_path = RepoPath::from_fs(&self.repo_root, spec_path)?;
        let folder = spec_repo_path.parent().unwrap_or_default();

        let content = std::fs::read_to_string(spec_path)?;
        let header: SpecHeader =
            serde_yaml::from_str(&content).map_err(|e| ShrikeError::InvalidSpec {
                path: spec_repo_path.to_string(),
                reason: e.to_string(),
            })?;

        let key = header
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| folder.to_string());

        let includes_path = additional_includes_path(spec_path);
        let includes = if includes_path.is_file() {
            let raw = std::fs::read_to_string(&includes_path)?;
            parse_additional_includes(&raw, &folder).map_err(|source| {
                ShrikeError::ComponentPath {
                    key: key.clone(),
                    source,
                }
            })?
        } else {
            Vec::new()
        };

        let mut component = Component::new(key, folder).with_includes(includes);
        component.declared_version = header.version.filter(|v| !v.trim().is_empty());
        debug!(
            key = %component.key,
            folder = %component.folder_path,
            includes = component.additional_include_paths.len(),
            "loaded component spec"
        );
        Ok(component)
    }
}

/// `<dir>/<stem>.additional_includes` for a spec at `<dir>/<stem>.yaml`.
pub fn additional_includes_path(spec_path: &Path) -> PathBuf {
    let file_name = spec_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file_name.split(".yaml").next().unwrap_or(&file_name);
    spec_path.with_file_name(format!("{stem}.{ADDITIONAL_INCLUDES_EXT}"))
}

/// Parse an additional-includes listing relative to `folder`.
///
/// Blank lines and `#` comments are skipped; duplicates keep first position.
pub fn parse_additional_includes(
    raw: &str,
    folder: &RepoPath,
) -> std::result::Result<Vec<RepoPath>, crate::domain::error::PathError> {
    let mut out: Vec<RepoPath> = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let path = folder.join(line)?;
        if !out.contains(&path) {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> RepoPath {
        RepoPath::parse(raw).unwrap()
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_additional_includes_path() {
        assert_eq!(
            additional_includes_path(Path::new("/r/c/train/spec.yaml")),
            PathBuf::from("/r/c/train/spec.additional_includes")
        );
        assert_eq!(
            additional_includes_path(Path::new("/r/c/train/train.yaml")),
            PathBuf::from("/r/c/train/train.additional_includes")
        );
    }

    #[test]
    fn test_parse_additional_includes() {
        let folder = p("components/train");
        let raw = "../../shared/utils\n\n# comment\n../../shared/utils/\n../common.py\n";
        let parsed = parse_additional_includes(raw, &folder).unwrap();
        assert_eq!(parsed, vec![p("shared/utils"), p("components/common.py")]);

        assert!(parse_additional_includes("../../../etc", &folder).is_err());
    }

    #[test]
    fn test_discover_components() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "components/A/spec.yaml", "name: A\nversion: 1.0.0\n");
        write(root, "components/B/spec.yaml", "name: B\n");
        write(root, "components/B/spec.additional_includes", "../../shared\n");
        write(root, "components/C/spec.yaml", "version: 2\n");
        write(root, "docs/readme.md", "# docs\n");

        let discovery = ComponentDiscovery::new(root, Path::new("."), DEFAULT_SPEC_GLOB).unwrap();
        let set = discovery.discover().unwrap();
        assert_eq!(set.len(), 3);

        let a = set.get("A").unwrap();
        assert_eq!(a.folder_path, p("components/A"));
        assert_eq!(a.declared_version.as_deref(), Some("1.0.0"));

        let b = set.get("B").unwrap();
        assert_eq!(b.additional_include_paths, vec![p("shared")]);

        let c = set.get("components/C").unwrap();
        assert_eq!(c.declared_version.as_deref(), Some("2"));
    }

    #[test]
    fn test_declared_version_keeps_spec_text() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "c/A/spec.yaml", "name: A\nversion: 1.10\n");
        write(root, "c/B/spec.yaml", "name: B\nversion: ''\n");

        let discovery = ComponentDiscovery::new(root, Path::new("."), DEFAULT_SPEC_GLOB).unwrap();
        let set = discovery.discover().unwrap();
        assert_eq!(set.get("A").unwrap().declared_version.as_deref(), Some("1.10"));
        assert_eq!(set.get("B").unwrap().declared_version, None);
    }

    #[test]
    fn test_glob_metacharacters_in_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "build[1]/c/A/spec.yaml", "name: A\n");
        write(root, "build1/c/B/spec.yaml", "name: B\n");

        let discovery =
            ComponentDiscovery::new(root, Path::new("build[1]"), DEFAULT_SPEC_GLOB).unwrap();
        let set = discovery.discover().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("A").unwrap().folder_path,
            RepoPath::parse("build[1]/c/A").unwrap()
        );
    }

    #[test]
    fn test_escaping_include_names_component() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "c/A/spec.yaml", "name: A\n");
        write(root, "c/A/spec.additional_includes", "../../../outside\n");

        let discovery = ComponentDiscovery::new(root, Path::new("."), DEFAULT_SPEC_GLOB).unwrap();
        let err = discovery.discover().unwrap_err();
        assert!(matches!(err, ShrikeError::ComponentPath { ref key, .. } if key == "A"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "c/A/spec.yaml", "name: same\n");
        write(root, "c/B/spec.yaml", "name: same\n");

        let discovery = ComponentDiscovery::new(root, Path::new("."), DEFAULT_SPEC_GLOB).unwrap();
        assert!(matches!(
            discovery.discover(),
            Err(ShrikeError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ComponentDiscovery::new(dir.path(), Path::new("."), "[").unwrap_err();
        assert!(matches!(err, ShrikeError::Config(ConfigError::InvalidGlob { .. })));
    }
}
