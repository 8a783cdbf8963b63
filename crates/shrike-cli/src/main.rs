//! shrike - build planning for ML pipeline components
//!
//! ## Commands
//!
//! - `detect`: list which components a change touches
//! - `resolve`: resolve module versions from the manifest
//! - `plan`: per-component activation and version report, written before
//!   any validate/sign/register step

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, Level};

use shrike_build::git::repo_root;
use shrike_build::{
    is_git_repo, obs, ActivationMethod, BuildConfig, BuildPlan, ChangeDetector, ChangeSet,
    ComponentDiscovery, ComponentSet, ConfigLayer, DiffProvider, GitDiffProvider, ModuleLoader,
    ModuleManifest, ModuleSource, PlanSpan, StaticDiffProvider,
};

#[derive(Parser)]
#[command(name = "shrike")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Smart change detection and version resolution for ML pipeline components", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which components are active for the current change
    Detect {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Resolve the version bound to every manifest key
    Resolve {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Report activation and resolved version for every component
    Plan {
        #[command(flatten)]
        build: BuildArgs,

        /// Write the plan as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write a markdown summary to this path
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

/// Settings shared by every command; each overrides the configuration file.
#[derive(Args, Debug, Default)]
struct BuildArgs {
    /// Repository to inspect (default: current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// YAML configuration file
    #[arg(long, env = "SHRIKE_CONFIGURATION_FILE")]
    configuration_file: Option<PathBuf>,

    /// Directory searched for component specs, relative to the repository
    #[arg(long)]
    working_directory: Option<PathBuf>,

    /// Glob matching component specification files
    #[arg(long)]
    component_specification_glob: Option<String>,

    /// Activation method: all or smart
    #[arg(long)]
    activation_method: Option<String>,

    /// Compliant branch pattern, e.g. ^refs/heads/main$
    #[arg(long)]
    compliant_branch: Option<String>,

    /// Version forced onto every component
    #[arg(long)]
    all_component_version: Option<String>,

    /// Version used for components without one
    #[arg(long)]
    default_component_version: Option<String>,

    /// Use BUILD_BUILDNUMBER as the version for every component
    #[arg(long)]
    use_build_number: bool,

    /// Module manifest file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Manifest keys loaded locally (comma-separated, or *)
    #[arg(long)]
    use_local: Option<String>,

    /// Changed paths, bypassing git (repeatable)
    #[arg(long = "changed", value_name = "PATH")]
    changed: Vec<String>,
}

impl BuildArgs {
    fn cli_layer(&self, verbose: bool) -> ConfigLayer {
        ConfigLayer {
            working_directory: self.working_directory.clone(),
            component_specification_glob: self.component_specification_glob.clone(),
            activation_method: self.activation_method.clone(),
            compliant_branch: self.compliant_branch.clone(),
            all_component_version: self.all_component_version.clone(),
            default_component_version: self.default_component_version.clone(),
            use_build_number: self.use_build_number.then_some(true),
            manifest: self.manifest.clone(),
            use_local: self.use_local.clone(),
            verbose: verbose.then_some(true),
        }
    }

    fn load_config(&self, verbose: bool) -> Result<BuildConfig> {
        let file = self
            .configuration_file
            .as_deref()
            .map(ConfigLayer::load)
            .transpose()
            .context("Failed to read configuration file")?;
        let env: BTreeMap<String, String> = std::env::vars().collect();
        let config = BuildConfig::from_layers(file, self.cli_layer(verbose), &env)
            .context("Invalid configuration")?;
        info!(
            activation_method = %config.activation_method.as_str(),
            compliant_branch = %config.compliant_branch.name(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Repository root: the git top level when available.
fn resolve_repo_root(repo: &Path) -> Result<PathBuf> {
    if is_git_repo(repo) {
        Ok(repo_root(repo)?)
    } else {
        std::fs::canonicalize(repo).with_context(|| format!("Repository not found: {:?}", repo))
    }
}

fn discover(build: &BuildArgs, config: &BuildConfig, root: &Path) -> Result<ComponentSet> {
    let discovery = ComponentDiscovery::new(
        root,
        &config.working_directory,
        &config.component_specification_glob,
    )?;
    let set = discovery.discover().context("Failed to discover components")?;
    if set.is_empty() {
        info!(repo = %build.repo.display(), "no component specifications found");
    }
    Ok(set)
}

fn load_manifest(config: &BuildConfig, root: &Path) -> Result<Option<ModuleManifest>> {
    match &config.manifest {
        Some(path) => {
            let path = root.join(path);
            let manifest = ModuleManifest::load(&path)
                .with_context(|| format!("Failed to load manifest {:?}", path))?;
            Ok(Some(manifest))
        }
        None => Ok(None),
    }
}

/// Change set and baseline commit (when computed from git).
fn compute_changes(
    build: &BuildArgs,
    config: &BuildConfig,
    root: &Path,
) -> Result<(ChangeSet, Option<String>)> {
    if !build.changed.is_empty() {
        let changes = ChangeSet::parse(&build.changed).context("Invalid --changed path")?;
        return Ok((StaticDiffProvider::new(changes).change_set()?, None));
    }
    if config.activation_method == ActivationMethod::All {
        return Ok((ChangeSet::empty(), None));
    }

    let env: BTreeMap<String, String> = std::env::vars().collect();
    let provider = GitDiffProvider::new(root, config.compliant_branch.clone(), env)
        .context("Smart activation requires a git repository")?;
    let baseline = provider.baseline()?;
    let changes = provider.diff(&baseline.base, &baseline.head)?;
    info!(changed = changes.len(), base = %baseline.base, "computed change set");
    Ok((changes, Some(baseline.base)))
}

fn cmd_detect(build: &BuildArgs, config: &BuildConfig) -> Result<()> {
    let root = resolve_repo_root(&build.repo)?;
    let _span = PlanSpan::enter(config.activation_method.as_str(), &root.display().to_string());

    let components = discover(build, config, &root)?;
    let (changes, _) = compute_changes(build, config, &root)?;
    let activation =
        ChangeDetector::activate(config.activation_method, &changes, components.as_slice());
    obs::emit_changes_detected(changes.len(), components.len(), activation.active_count());

    println!("{}", serde_json::to_string_pretty(&activation)?);
    Ok(())
}

#[derive(Serialize)]
struct ResolveOutput<'a> {
    modules: &'a BTreeMap<String, ModuleSource>,
}

fn cmd_resolve(build: &BuildArgs, config: &BuildConfig) -> Result<()> {
    let root = resolve_repo_root(&build.repo)?;
    let Some(manifest) = load_manifest(config, &root)? else {
        bail!("resolve requires a manifest (--manifest or `manifest:` in the configuration file)");
    };

    let loader = ModuleLoader::new(&manifest, config.use_local.clone()).with_overrides(
        config.all_component_version.as_deref(),
        config.default_component_version.as_deref(),
    );

    let modules = match loader.plan_all() {
        Ok(modules) => modules,
        Err(errors) => {
            for error in &errors {
                obs::emit_component_rejected(error.key().unwrap_or("<unnamed>"), error);
            }
            let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
            bail!("Manifest errors:\n{}", details.join("\n"));
        }
    };

    for (key, source) in &modules {
        if let ModuleSource::Registered { version, .. } = source {
            obs::emit_version_resolved(key, version);
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&ResolveOutput { modules: &modules })?
    );
    Ok(())
}

fn cmd_plan(
    build: &BuildArgs,
    config: &BuildConfig,
    output: Option<&Path>,
    summary: Option<&Path>,
) -> Result<()> {
    let root = resolve_repo_root(&build.repo)?;
    let _span = PlanSpan::enter(config.activation_method.as_str(), &root.display().to_string());

    let components = discover(build, config, &root)?;
    let components = match load_manifest(config, &root)? {
        Some(manifest) => {
            let mut list = components.as_slice().to_vec();
            manifest.apply(&mut list);
            ComponentSet::new(list)?
        }
        None => components,
    };

    let (changes, baseline) = compute_changes(build, config, &root)?;
    let mut plan = BuildPlan::assemble(&components, &changes, config);
    if let Some(base) = baseline {
        plan = plan.with_baseline(base);
    }

    if let Some(path) = output {
        shrike_build::write_plan_json(path, &plan)?;
    }
    if let Some(path) = summary {
        shrike_build::write_plan_md(path, &plan)?;
    }

    print!("{}", shrike_build::render_plan_md(&plan));
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shrike_build::init_tracing(cli.json, level);

    match &cli.command {
        Commands::Detect { build } => {
            let config = build.load_config(cli.verbose)?;
            cmd_detect(build, &config)
        }
        Commands::Resolve { build } => {
            let config = build.load_config(cli.verbose)?;
            cmd_resolve(build, &config)
        }
        Commands::Plan {
            build,
            output,
            summary,
        } => {
            let config = build.load_config(cli.verbose)?;
            cmd_plan(build, &config, output.as_deref(), summary.as_deref())
        }
    }
}
