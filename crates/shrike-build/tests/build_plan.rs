//! End-to-end: discover components, diff against the compliant branch,
//! apply the manifest and assemble a build plan.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use shrike_build::{
    BuildConfig, BuildPlan, ComponentDiscovery, ComponentSet, ConfigLayer, DiffProvider,
    GitDiffProvider, ModuleManifest, VersionSource,
};

fn git(repo: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, content).expect("write");
}

/// Repository with components A and B on `main`, B including `shared/`.
fn make_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    git(root, &["init"]);
    git(root, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(root, &["config", "user.name", "test-user"]);
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "commit.gpgsign", "false"]);

    write(root, "c/A/spec.yaml", "name: A\nversion: 1.0.0\n");
    write(root, "c/A/run.py", "print('a')\n");
    write(root, "c/B/spec.yaml", "name: B\n");
    write(root, "c/B/spec.additional_includes", "../../shared\n");
    write(root, "shared/lib.py", "X = 1\n");
    write(root, "docs/readme.md", "# docs\n");
    write(
        root,
        "manifest.yaml",
        "manifest:\n  - key: B\n    name: contoso.b\n    version: 3.1.0\n",
    );
    git(root, &["add", "-A"]);
    git(root, &["commit", "-m", "Merged PR 1: initial components"]);
    dir
}

fn smart_config(extra: ConfigLayer) -> BuildConfig {
    let cli = ConfigLayer {
        activation_method: Some("smart".to_string()),
        ..extra
    };
    BuildConfig::from_layers(None, cli, &BTreeMap::new()).expect("valid config")
}

fn plan_for(root: &Path, config: &BuildConfig) -> BuildPlan {
    let discovery = ComponentDiscovery::new(
        root,
        &config.working_directory,
        &config.component_specification_glob,
    )
    .expect("discovery");
    let mut components = discovery.discover().expect("discover").as_slice().to_vec();
    ModuleManifest::load(&root.join("manifest.yaml"))
        .expect("manifest")
        .apply(&mut components);
    let components = ComponentSet::new(components).expect("unique keys");

    let provider = GitDiffProvider::new(root, config.compliant_branch.clone(), BTreeMap::new())
        .expect("git provider");
    let changes = provider.change_set().expect("change set");
    BuildPlan::assemble(&components, &changes, config)
}

#[test]
fn shared_change_on_feature_branch_activates_including_component() {
    let repo = make_repo();
    let root = repo.path();
    git(root, &["checkout", "-b", "feature"]);
    write(root, "shared/lib.py", "X = 2\n");
    git(root, &["commit", "-am", "tweak shared lib"]);

    let plan = plan_for(root, &smart_config(ConfigLayer::default()));

    assert_eq!(plan.changed_paths, 1);
    let a = plan.components.iter().find(|c| c.key == "A").expect("A");
    let b = plan.components.iter().find(|c| c.key == "B").expect("B");
    assert!(!a.active);
    assert!(b.active);
    assert_eq!(a.version.source(), Some(VersionSource::Declared));
    assert_eq!(b.version.as_option(), Some("3.1.0"));
    assert_eq!(b.version.source(), Some(VersionSource::Manifest));
}

#[test]
fn docs_only_change_activates_nothing() {
    let repo = make_repo();
    let root = repo.path();
    git(root, &["checkout", "-b", "docs"]);
    write(root, "docs/readme.md", "# more docs\n");
    git(root, &["commit", "-am", "docs"]);

    let plan = plan_for(root, &smart_config(ConfigLayer::default()));
    assert_eq!(plan.active_count(), 0);
}

#[test]
fn force_all_version_applies_to_every_planned_component() {
    let repo = make_repo();
    let root = repo.path();
    git(root, &["checkout", "-b", "feature"]);
    write(root, "c/A/run.py", "print('changed')\n");
    git(root, &["commit", "-am", "change A"]);

    let plan = plan_for(
        root,
        &smart_config(ConfigLayer {
            all_component_version: Some("2.0.0".to_string()),
            ..ConfigLayer::default()
        }),
    );
    assert_eq!(plan.active_count(), 1);
    for component in &plan.components {
        assert_eq!(component.version.as_option(), Some("2.0.0"));
        assert_eq!(component.version.source(), Some(VersionSource::ForceAll));
    }
}
