//! Normalized, segment-aware repository paths.
//!
//! Every path that reaches the change detector goes through [`RepoPath`], so
//! containment is decided on whole segments: `c/foo` contains `c/foo/run.py`
//! but never `c/foobar`.

use std::fmt;
use std::path::{Component as FsComponent, Path};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::error::PathError;

/// A repository-relative path stored as normalized segments.
///
/// The empty path is the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepoPath {
    segments: Vec<String>,
}

impl RepoPath {
    /// The repository root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Normalize a repo-relative path string.
    ///
    /// Both `/` and `\` separate segments. Empty and `.` segments are dropped,
    /// `..` pops the previous segment, and a leading separator is ignored.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        Self::root().join(raw)
    }

    /// Resolve `raw` relative to this path.
    pub fn join(&self, raw: &str) -> Result<Self, PathError> {
        let mut segments = self.segments.clone();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            path: raw.to_string(),
                        });
                    }
                }
                other => segments.push(other.to_string()),
            }
        }
        Ok(Self { segments })
    }

    /// Convert a filesystem path under `root` into a repository path.
    ///
    /// Relative inputs are taken as already relative to `root`.
    pub fn from_fs(root: &Path, path: &Path) -> Result<Self, PathError> {
        let relative = if path.is_absolute() {
            path.strip_prefix(root).map_err(|_| PathError::OutsideRoot {
                path: path.display().to_string(),
                root: root.display().to_string(),
            })?
        } else {
            path
        };

        let mut out = Self::root();
        for component in relative.components() {
            match component {
                FsComponent::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| PathError::NonUtf8(path.display().to_string()))?;
                    out.segments.push(part.to_string());
                }
                FsComponent::ParentDir => {
                    if out.segments.pop().is_none() {
                        return Err(PathError::EscapesRoot {
                            path: path.display().to_string(),
                        });
                    }
                }
                FsComponent::CurDir | FsComponent::RootDir | FsComponent::Prefix(_) => {}
            }
        }
        Ok(out)
    }

    /// Whether `other` is this path or nested under it.
    pub fn contains(&self, other: &RepoPath) -> bool {
        other.segments.len() >= self.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|(a, b)| a == b)
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<RepoPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Final segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Rebuild a filesystem path under `root`.
    pub fn to_fs(&self, root: &Path) -> std::path::PathBuf {
        let mut out = root.to_path_buf();
        for segment in &self.segments {
            out.push(segment);
        }
        out
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl std::str::FromStr for RepoPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for RepoPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepoPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        RepoPath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p(raw: &str) -> RepoPath {
        RepoPath::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_normalizes_separators_and_dots() {
        assert_eq!(p("components\\foo/./run.py"), p("components/foo/run.py"));
        assert_eq!(p("/components//foo/"), p("components/foo"));
        assert_eq!(p("components/bar/../foo"), p("components/foo"));
        assert_eq!(p("components/foo").to_string(), "components/foo");
    }

    #[test]
    fn test_parse_rejects_escape() {
        let err = RepoPath::parse("components/../../etc/passwd").unwrap_err();
        assert!(matches!(err, PathError::EscapesRoot { .. }));
    }

    #[test]
    fn test_contains_is_segment_aware() {
        let foo = p("components/foo");
        assert!(foo.contains(&p("components/foo/script.py")));
        assert!(foo.contains(&p("components/foo")));
        assert!(!foo.contains(&p("components/foobar/script.py")));
        assert!(!foo.contains(&p("components")));
        assert!(!p("/a/b").contains(&p("/a/bc")));
    }

    #[test]
    fn test_root_contains_everything() {
        assert!(RepoPath::root().contains(&p("docs/readme.md")));
        assert!(RepoPath::root().is_root());
    }

    #[test]
    fn test_join_relative_to_component_folder() {
        let folder = p("components/train");
        assert_eq!(folder.join("../../shared/utils").unwrap(), p("shared/utils"));
        assert!(folder.join("../../../outside").is_err());
    }

    #[test]
    fn test_from_fs_strips_root() {
        let root = PathBuf::from("/repo");
        let path = PathBuf::from("/repo/components/foo/spec.yaml");
        assert_eq!(
            RepoPath::from_fs(&root, &path).unwrap(),
            p("components/foo/spec.yaml")
        );

        let outside = PathBuf::from("/elsewhere/file");
        assert!(matches!(
            RepoPath::from_fs(&root, &outside),
            Err(PathError::OutsideRoot { .. })
        ));
    }

    #[test]
    fn test_parent_and_file_name() {
        let spec = p("components/foo/spec.yaml");
        assert_eq!(spec.file_name(), Some("spec.yaml"));
        assert_eq!(spec.parent(), Some(p("components/foo")));
        assert_eq!(RepoPath::root().parent(), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&p("shared\\utils")).unwrap();
        assert_eq!(json, "\"shared/utils\"");
        let back: RepoPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("shared/utils"));
    }
}
