//! recipe-update - review, build and publish updated package recipes
//!
//! Usage:
//!   recipe-update --config packages.toml
//!   recipe-update --config packages.toml -p ion-git -p foo
//!   recipe-update -p foo --chroot /var/lib/chroot --pkg-dir /srv/repo \
//!       --repo /srv/repo/custom.db.tar --gpg-dir ~/checkingGPG --logs-dir ~/logs

use anyhow::{Context, Result, bail};
use clap::Parser;
use recipe_pipeline::build::{
    BuildExecutor, BuildRoot, BuildSettings, BuildTools, Signer, deps, privilege,
};
use recipe_pipeline::core::config::{
    ConfigFile, Overrides, Settings, TimestampMode, VersionSource,
};
use recipe_pipeline::core::{lock, output};
use recipe_pipeline::package::RunTable;
use recipe_pipeline::pipeline::{
    Collaborators, PipelineController, PipelineOptions, PipelineOutcome, RetryPolicy,
    confirm_builds,
};
use recipe_pipeline::probe::TarLister;
use recipe_pipeline::prompt::TerminalPrompter;
use recipe_pipeline::review::BaselineHashes;
use recipe_pipeline::supervisor::{CancellationSupervisor, StatusBoard};
use recipe_pipeline::tools::{ArchChroot, CommandEditor, Git, Gpg, Makepkg, RepoAdd};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "recipe-update")]
#[command(about = "Update, review, build and publish package recipes into a local repository")]
#[command(version)]
struct Cli {
    /// TOML config with global settings and [[entry]] packages
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only handle these packages (defines the package list without --config)
    #[arg(short, long = "pkg")]
    pkgs: Vec<String>,

    /// Always review this package even if its branch is up to date
    #[arg(long = "no-skip")]
    no_skip: Vec<String>,

    /// Editor used for reviews
    #[arg(short, long)]
    editor: Option<String>,

    /// Build root (the directory holding `root/`)
    #[arg(long)]
    chroot: Option<PathBuf>,

    /// Directory built packages are moved into
    #[arg(long)]
    pkg_dir: Option<PathBuf>,

    /// Repository database built packages are added to
    #[arg(long)]
    repo: Option<PathBuf>,

    /// GNUPGHOME used when verifying sources
    #[arg(long)]
    gpg_dir: Option<PathBuf>,

    #[arg(long)]
    logs_dir: Option<PathBuf>,

    /// Parent directory of the recipe checkouts
    #[arg(long)]
    dirs_dir: Option<PathBuf>,

    #[arg(long)]
    signing_gpg_dir: Option<PathBuf>,

    #[arg(long)]
    signing_gpg_key_fp: Option<String>,

    /// Do not update the build root before building
    #[arg(long)]
    no_update: bool,

    /// Build only: no signing, no repo insertion, artifacts stay in place
    #[arg(long)]
    no_store: bool,

    /// Where candidate versions come from: ask, snapshot or resolve
    #[arg(long)]
    version_source: Option<VersionSource>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            pkgs: self.pkgs.clone(),
            no_skip: self.no_skip.clone(),
            editor: self.editor.clone(),
            chroot: self.chroot.clone(),
            pkg_dir: self.pkg_dir.clone(),
            repo: self.repo.clone(),
            gpg_dir: self.gpg_dir.clone(),
            logs_dir: self.logs_dir.clone(),
            dirs_dir: self.dirs_dir.clone(),
            signing_gpg_dir: self.signing_gpg_dir.clone(),
            signing_gpg_key_fp: self.signing_gpg_key_fp.clone(),
            version_source: self.version_source,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let file = cli.config.as_deref().map(ConfigFile::load).transpose()?;
    Ok(Settings::resolve(file, cli.overrides())?)
}

fn prepare_logs_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            bail!("logs_dir \"{}\" exists but is not a directory", dir.display());
        }
        return Ok(());
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))
}

fn export_environment(settings: &Settings) -> Result<()> {
    let chroot = settings
        .chroot
        .canonicalize()
        .with_context(|| format!("chroot \"{}\" does not exist", settings.chroot.display()))?;
    let gpg_dir = settings
        .gpg_dir
        .canonicalize()
        .with_context(|| format!("gpg_dir \"{}\" does not exist", settings.gpg_dir.display()))?;
    // SAFETY: called before any other thread is started.
    unsafe {
        std::env::set_var("CHROOT", chroot);
        std::env::set_var("GNUPGHOME", gpg_dir);
    }
    Ok(())
}

fn unlock_signer(settings: &Settings, cli: &Cli) -> Result<Option<Gpg>> {
    let Some(identity) = settings.signing.as_ref().filter(|_| !cli.no_store) else {
        return Ok(None);
    };
    let passphrase = dialoguer::Password::new()
        .with_prompt("Signing key passphrase")
        .allow_empty_password(true)
        .interact()
        .context("Failed to read the signing passphrase")?;
    let gpg = Gpg::new(&identity.gpg_dir, &identity.key_fp, passphrase);
    gpg.verify_passphrase()?;
    Ok(Some(gpg))
}

/// Returns whether the run finished cleanly.
fn run(cli: &Cli) -> Result<bool> {
    let settings = load_settings(cli)?;

    prepare_logs_dir(&settings.logs_dir)?;
    let run_log = output::init_run_log(&settings.logs_dir.join("update.log"))?;
    let now = match settings.timestamps {
        TimestampMode::Utc => chrono::Utc::now().format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        TimestampMode::Local => chrono::Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string(),
    };
    output::info(&format!("Run started {}", now));
    output::detail(&format!("Logging to \"{}\"", run_log.display()));

    export_environment(&settings)?;
    let signer = unlock_signer(&settings, cli)?;

    let board = StatusBoard::new();
    let supervisor = CancellationSupervisor::new(board.clone());
    supervisor.install()?;

    let baseline = BaselineHashes::capture(&settings.packages, &settings.dirs);
    let mut table = RunTable::new(settings.packages.clone());

    let git = Git;
    let lister = TarLister;
    let resolver = Makepkg;
    let editor = CommandEditor::new(&settings.editor);
    let prompter = TerminalPrompter;

    let pipeline = PipelineController::new(
        Collaborators {
            scm: &git,
            lister: &lister,
            resolver: &resolver,
            editor: &editor,
            prompter: &prompter,
        },
        PipelineOptions {
            dirs: settings.dirs.clone(),
            repo: settings.repo.clone(),
            version_source: settings.version_source,
            retry: RetryPolicy::default(),
        },
        baseline,
        board.clone(),
    );
    if pipeline.run(&mut table) == PipelineOutcome::Aborted {
        return Ok(false);
    }

    if !confirm_builds(&prompter, &table)? {
        return Ok(!table.has_errors());
    }

    let chroot = ArchChroot::new(&settings.chroot, settings.tmpfs);
    let _lock = lock::acquire_build_root_lock(&settings.chroot)?;
    let _sudo = privilege::keep_alive()?;
    if !cli.no_update {
        output::action("Updating the build root...");
        chroot.update()?;
    }

    supervisor.enter_build_phase();
    let repo_db = RepoAdd;
    let executor = BuildExecutor::new(
        BuildTools {
            root: &chroot,
            signer: signer.as_ref().map(|s| s as &dyn Signer),
            repo_db: &repo_db,
        },
        BuildSettings {
            dirs: settings.dirs.clone(),
            pkg_dir: settings.pkg_dir.clone(),
            repo: settings.repo.clone(),
            logs_dir: settings.logs_dir.clone(),
            native_cache: PathBuf::from(deps::NATIVE_CACHE),
            log_limit: settings.log_limit,
            log_overflow: settings.log_overflow,
            echo_logs: settings.echo_build_logs,
            timestamps: settings.timestamps,
            store: !cli.no_store,
        },
        supervisor.stop_flag(),
        board,
    );
    let completed = executor.run(&mut table);

    Ok(completed && !table.has_errors())
}
