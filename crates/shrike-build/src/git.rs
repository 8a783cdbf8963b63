//! Git integration: baseline selection and change-set computation.
//!
//! The baseline depends on where the build runs:
//! - after merge (building the compliant branch itself): the previous
//!   `Merged PR` commit before the branch tip
//! - before merge (`refs/pull/...`): the latest `Merged PR` commit on the
//!   compliant branch
//! - manual: the local compliant branch tip, else the before-merge rule

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use regex::Regex;
use tracing::{debug, info};

use crate::detect::ChangeSet;
use crate::domain::error::{ConfigError, Result, ShrikeError};
use crate::repo_path::RepoPath;

/// Commit subject prefix marking a completed pull request merge.
pub const MERGED_PR_PREFIX: &str = "Merged PR";

/// Environment variable carrying the source branch on CI agents.
pub const SOURCE_BRANCH_ENV: &str = "BUILD_SOURCEBRANCH";

const HEADS_PREFIX: &str = "refs/heads/";
const PULL_PREFIX: &str = "refs/pull/";

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| ShrikeError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ShrikeError::Git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Top-level directory of the work tree containing `dir`.
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    let out = run_git(dir, &["rev-parse", "--show-toplevel"])?;
    let root = out.trim();
    if root.is_empty() {
        return Err(ShrikeError::Git(
            "git rev-parse --show-toplevel returned empty output".to_string(),
        ));
    }
    Ok(PathBuf::from(root))
}

/// Full ref name of the checked-out branch.
///
/// Detached heads (the norm on CI agents) fall back to `BUILD_SOURCEBRANCH`.
pub fn current_branch(dir: &Path, env: &BTreeMap<String, String>) -> Result<String> {
    if let Ok(out) = run_git(dir, &["symbolic-ref", "-q", "HEAD"]) {
        let branch = out.trim();
        if !branch.is_empty() {
            return Ok(branch.to_string());
        }
    }
    env.get(SOURCE_BRANCH_ENV)
        .filter(|b| !b.is_empty())
        .cloned()
        .ok_or_else(|| {
            ShrikeError::Git(format!(
                "HEAD is detached and {SOURCE_BRANCH_ENV} is not set"
            ))
        })
}

/// Resolve a revision to a commit SHA, if it exists.
fn rev_parse(dir: &Path, rev: &str) -> Option<String> {
    let spec = format!("{rev}^{{commit}}");
    run_git(dir, &["rev-parse", "--verify", "--quiet", &spec])
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The protected branch whose merges define baselines.
///
/// Configured as an anchored pattern, e.g. `^refs/heads/main$`.
#[derive(Debug, Clone)]
pub struct CompliantBranch {
    pattern: String,
    name: String,
    regex: Regex,
}

impl CompliantBranch {
    pub fn parse(pattern: &str) -> std::result::Result<Self, ConfigError> {
        let name = pattern
            .strip_prefix("^refs/heads/")
            .and_then(|rest| rest.strip_suffix('$'))
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ConfigError::InvalidCompliantBranch(pattern.to_string()))?;
        let regex = Regex::new(pattern)
            .map_err(|_| ConfigError::InvalidCompliantBranch(pattern.to_string()))?;
        Ok(Self {
            pattern: pattern.to_string(),
            name: name.to_string(),
            regex,
        })
    }

    /// Short branch name, e.g. `main`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether `branch` (short or full ref name) is the compliant branch.
    pub fn matches(&self, branch: &str) -> bool {
        if branch.starts_with("refs/") {
            self.regex.is_match(branch)
        } else {
            self.regex.is_match(&format!("{HEADS_PREFIX}{branch}"))
        }
    }
}

/// Where the build is running relative to the compliant branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildScenario {
    AfterMerge,
    BeforeMerge,
    Manual,
}

impl BuildScenario {
    pub fn classify(current_branch: &str, compliant: &CompliantBranch) -> Self {
        if compliant.matches(current_branch) {
            BuildScenario::AfterMerge
        } else if current_branch.starts_with(PULL_PREFIX) {
            BuildScenario::BeforeMerge
        } else {
            BuildScenario::Manual
        }
    }
}

/// The two commits a change set is computed between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub scenario: BuildScenario,
    pub base: String,
    pub head: String,
}

/// Walk history from `start` and return the first `Merged PR` commit.
///
/// With `include_start = false` the start commit itself is skipped. When no
/// such commit exists, the start commit is returned.
pub fn find_merged_pr_commit(dir: &Path, start: &str, include_start: bool) -> Result<String> {
    let log = run_git(dir, &["log", "--first-parent", "--format=%H%x09%s", start])?;
    let mut commits = log.lines().filter_map(|line| line.split_once('\t'));

    let (start_sha, start_subject) = commits
        .next()
        .ok_or_else(|| ShrikeError::Git(format!("no commits reachable from {start}")))?;
    if include_start && start_subject.starts_with(MERGED_PR_PREFIX) {
        return Ok(start_sha.to_string());
    }

    let found = commits
        .find(|(_, subject)| subject.starts_with(MERGED_PR_PREFIX))
        .map(|(sha, _)| sha.to_string());
    Ok(found.unwrap_or_else(|| start_sha.to_string()))
}

/// Source of the change set for one build invocation.
pub trait DiffProvider {
    fn change_set(&self) -> Result<ChangeSet>;
}

/// Fixed change set, e.g. passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticDiffProvider {
    changes: ChangeSet,
}

impl StaticDiffProvider {
    pub fn new(changes: ChangeSet) -> Self {
        Self { changes }
    }
}

impl DiffProvider for StaticDiffProvider {
    fn change_set(&self) -> Result<ChangeSet> {
        Ok(self.changes.clone())
    }
}

/// Computes change sets from git history against the compliant branch.
#[derive(Debug, Clone)]
pub struct GitDiffProvider {
    repo_dir: PathBuf,
    compliant: CompliantBranch,
    env: BTreeMap<String, String>,
}

impl GitDiffProvider {
    pub fn new(
        repo_dir: &Path,
        compliant: CompliantBranch,
        env: BTreeMap<String, String>,
    ) -> Result<Self> {
        let repo_dir = repo_root(repo_dir)?;
        info!(repo = %repo_dir.display(), "found git repository");
        Ok(Self {
            repo_dir,
            compliant,
            env,
        })
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Tip of the compliant branch, preferring the remote-tracking ref.
    fn compliant_tip(&self) -> Result<String> {
        let name = self.compliant.name();
        rev_parse(&self.repo_dir, &format!("origin/{name}"))
            .or_else(|| rev_parse(&self.repo_dir, name))
            .ok_or_else(|| ShrikeError::Git(format!("compliant branch '{name}' not found")))
    }

    /// Select base and head commits for the current checkout.
    pub fn baseline(&self) -> Result<Baseline> {
        let branch = current_branch(&self.repo_dir, &self.env)?;
        let scenario = BuildScenario::classify(&branch, &self.compliant);
        info!(branch = %branch, compliant = %self.compliant.name(), scenario = ?scenario, "classified build");

        let (base, head) = match scenario {
            BuildScenario::AfterMerge => {
                let head = self.compliant_tip()?;
                let base = find_merged_pr_commit(&self.repo_dir, &head, false)?;
                (base, head)
            }
            BuildScenario::BeforeMerge => {
                let head = self.head()?;
                let tip = self.compliant_tip()?;
                let base = find_merged_pr_commit(&self.repo_dir, &tip, true)?;
                (base, head)
            }
            BuildScenario::Manual => {
                let head = self.head()?;
                let local_ref = format!("{HEADS_PREFIX}{}", self.compliant.name());
                let base = match rev_parse(&self.repo_dir, &local_ref) {
                    Some(local) => local,
                    None => {
                        let tip = self.compliant_tip()?;
                        find_merged_pr_commit(&self.repo_dir, &tip, true)?
                    }
                };
                (base, head)
            }
        };

        debug!(base = %base, head = %head, "selected baseline");
        Ok(Baseline {
            scenario,
            base,
            head,
        })
    }

    fn head(&self) -> Result<String> {
        rev_parse(&self.repo_dir, "HEAD")
            .ok_or_else(|| ShrikeError::Git("HEAD does not point at a commit".to_string()))
    }

    /// Files changed between two commits; renames contribute both paths.
    pub fn diff(&self, base: &str, head: &str) -> Result<ChangeSet> {
        let out = run_git(
            &self.repo_dir,
            &["diff", "--name-only", "--no-renames", "-z", base, head],
        )?;
        let paths = out
            .split('\0')
            .filter(|p| !p.is_empty())
            .map(RepoPath::parse)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ChangeSet::new(paths))
    }
}

impl DiffProvider for GitDiffProvider {
    fn change_set(&self) -> Result<ChangeSet> {
        let baseline = self.baseline()?;
        let changes = self.diff(&baseline.base, &baseline.head)?;
        info!(changed = changes.len(), "computed change set");
        Ok(changes)
    }
}
