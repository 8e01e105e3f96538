//! Build phase
//!
//! Approved packages are built one after another in approval order, since
//! the isolated build root is a single shared resource. A failure only
//! affects its own package. The stop flag is checked before each package.

pub mod cache;
pub mod deps;
pub mod drain;
pub mod invocation;
pub mod privilege;
pub mod publish;
pub mod sink;

pub use invocation::BuildInvocation;

use crate::core::config::{OverflowPolicy, TimestampMode};
use crate::core::output;
use crate::package::{BuildOutcome, Package, RunTable};
use crate::supervisor::StatusBoard;
use anyhow::Result;
use drain::{LogTargets, run_drained};
use publish::{PublishTarget, publish};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The isolated build root and the host tools around it.
pub trait BuildRoot {
    /// Bring the root's own packages up to date
    fn update(&self) -> Result<()>;
    /// Download and check the recipe's sources
    fn verify_sources(&self, dir: &Path) -> Result<()>;
    fn set_ccache(&self, enabled: bool) -> Result<()>;
    fn install_wrappers(&self, script: &str, names: &[&str]) -> Result<()>;
    fn remove_wrappers(&self, names: &[&str]) -> Result<()>;
    /// Download a native package into the host cache
    fn fetch_native(&self, name: &str) -> Result<()>;
    /// Command that builds `pkg` from `dir` with `deps` injected
    fn invocation(&self, pkg: &Package, dir: &Path, deps: &[PathBuf]) -> BuildInvocation;
}

/// Detached signatures
pub trait Signer {
    /// Write `<file>.sig`
    fn sign(&self, file: &Path) -> Result<()>;
}

/// The published repository database
pub trait RepoDatabase {
    fn add(&self, repo: &Path, artifacts: &[PathBuf]) -> Result<()>;
}

/// Timestamp used in per-build log names
pub fn log_stamp(mode: TimestampMode) -> String {
    const FORMAT: &str = "%Y-%m-%d_%H-%M-%S_%Z";
    match mode {
        TimestampMode::Utc => chrono::Utc::now().format(FORMAT).to_string(),
        TimestampMode::Local => chrono::Local::now().format(FORMAT).to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub dirs: PathBuf,
    pub pkg_dir: PathBuf,
    pub repo: PathBuf,
    pub logs_dir: PathBuf,
    pub native_cache: PathBuf,
    pub log_limit: u64,
    pub log_overflow: OverflowPolicy,
    pub echo_logs: bool,
    pub timestamps: TimestampMode,
    /// Sign, insert and relocate successful builds
    pub store: bool,
}

pub struct BuildTools<'a> {
    pub root: &'a dyn BuildRoot,
    pub signer: Option<&'a dyn Signer>,
    pub repo_db: &'a dyn RepoDatabase,
}

pub struct BuildExecutor<'a> {
    tools: BuildTools<'a>,
    settings: BuildSettings,
    stop: Arc<AtomicBool>,
    board: StatusBoard,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(
        tools: BuildTools<'a>,
        settings: BuildSettings,
        stop: Arc<AtomicBool>,
        board: StatusBoard,
    ) -> Self {
        BuildExecutor {
            tools,
            settings,
            stop,
            board,
        }
    }

    /// Build every package whose verdict is `install`. Returns false when a
    /// stop request cut the batch short.
    pub fn run(&self, table: &mut RunTable) -> bool {
        let queue = table.to_build();
        for &i in &queue {
            table.state_mut(i).outcome = BuildOutcome::WillBuild;
        }

        let mut completed = true;
        for (n, &i) in queue.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                output::warning("Stop requested, not building the remaining packages");
                for &rest in &queue[n..] {
                    table.state_mut(rest).outcome = BuildOutcome::NotBuilding;
                }
                completed = false;
                break;
            }
            self.board.publish(table);
            output::action_numbered(
                n + 1,
                queue.len(),
                &format!("Building \"{}\"...", table.package(i).name),
            );
            let outcome = self.build_one(table.package(i));
            table.state_mut(i).outcome = outcome;
        }

        self.board.publish(table);
        for &i in &queue {
            output::info(&format!(
                "\"{}\" status: {}",
                table.package(i).name,
                table.state(i).outcome
            ));
        }
        completed
    }

    fn build_one(&self, pkg: &Package) -> BuildOutcome {
        let dir = pkg.recipe_dir(&self.settings.dirs);
        let root = self.tools.root;

        output::sub_action("Verifying sources...");
        if let Err(e) = root.verify_sources(&dir) {
            output::error(&format!("Failed to verify sources of \"{}\": {:#}", pkg.name, e));
            return BuildOutcome::IntegrityFailed;
        }

        if let Err(e) = cache::configure(root, &pkg.cache) {
            output::error(&format!("{:#}", e));
            return BuildOutcome::BuildFailed;
        }

        let deps = match deps::resolve(root, pkg, &self.settings.native_cache, &self.settings.pkg_dir)
        {
            Ok(deps) => deps,
            Err(e) => {
                output::error(&format!("{:#}", e));
                return BuildOutcome::DependencyFetchFailed;
            }
        };

        let invocation = root.invocation(pkg, &dir, &deps);
        let stamp = log_stamp(self.settings.timestamps);
        let logs = LogTargets {
            stdout: self
                .settings
                .logs_dir
                .join(format!("{}_stdout_{}", pkg.name, stamp)),
            stderr: self
                .settings
                .logs_dir
                .join(format!("{}_stderr_{}", pkg.name, stamp)),
            limit: self.settings.log_limit,
            policy: self.settings.log_overflow,
            echo: self.settings.echo_logs,
        };

        let pb = output::spinner(&format!("{} {}", invocation.program, pkg.name));
        let report = match run_drained(&invocation, &logs) {
            Ok(report) => report,
            Err(e) => {
                output::progress_fail(pb, "failed to run the builder");
                output::error(&format!("Failed to build pkg \"{}\": {:#}", pkg.name, e));
                return BuildOutcome::BuildFailed;
            }
        };
        if !report.success {
            output::progress_fail(pb, "build failed");
            output::error(&format!(
                "Failed to build pkg \"{}\" in chroot (exit {})",
                pkg.name,
                report
                    .code
                    .map_or_else(|| "by signal".to_string(), |c| c.to_string())
            ));
            return BuildOutcome::BuildFailed;
        }
        if report.overflow_failed() {
            output::progress_fail(pb, "log limit exceeded");
            return BuildOutcome::BuildFailed;
        }
        output::progress_success(pb, "built");

        if !self.settings.store {
            return BuildOutcome::Success;
        }
        publish(
            self.tools.signer,
            self.tools.repo_db,
            &PublishTarget {
                repo: &self.settings.repo,
                pkg_dir: &self.settings.pkg_dir,
            },
            &pkg.name,
            &dir,
        )
    }
}
