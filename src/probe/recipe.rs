//! Candidate version of a recipe
//!
//! Read either from the `.SRCINFO` metadata snapshot, or by letting the
//! builder resolve the descriptor (which may compute `pkgver` dynamically)
//! and reading the fields back out of `PKGBUILD`.

use crate::core::output;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

pub const SNAPSHOT_FILE: &str = ".SRCINFO";
pub const DESCRIPTOR_FILE: &str = "PKGBUILD";
/// Scratch directory the builder leaves behind in the recipe directory
pub const SCRATCH_DIR: &str = "src";

static SNAPSHOT_VER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*pkgver\s*=\s*([a-zA-Z0-9._+-]+)\s*$").unwrap());
static SNAPSHOT_REL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*pkgrel\s*=\s*([0-9.]+)\s*$").unwrap());
static SNAPSHOT_EPOCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*epoch\s*=\s*([0-9]+)\s*$").unwrap());
static DESCRIPTOR_INSTALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^install=(\S+)\s*$").unwrap());

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VersionProbeError {
    #[error(".SRCINFO does not exist for pkg \"{0}\"")]
    MissingSnapshot(String),

    #[error("failed to get version of \"{0}\" (pkgver or pkgrel missing)")]
    Incomplete(String),

    #[error("invalid epoch '{0}'")]
    InvalidEpoch(String),
}

/// Candidate version of the recipe HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateVersion {
    pub epoch: Option<u64>,
    pub version: String,
    pub release: String,
}

impl CandidateVersion {
    /// `<version>-<release>`, the form the published listing uses
    pub fn full(&self) -> String {
        format!("{}-{}", self.version, self.release)
    }
}

/// Which retrieval mode to use for one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    Snapshot,
    Resolve,
}

/// The builder's resolve-only operations.
pub trait RecipeResolver {
    /// Run the builder without building so dynamic version fields are
    /// rewritten into the descriptor.
    fn resolve_only(&self, dir: &Path) -> Result<()>;
    /// Print `pkgver=`, `pkgrel=`, `epoch=` and `install=` lines for the
    /// descriptor in `dir`.
    fn descriptor_fields(&self, dir: &Path) -> Result<String>;
}

fn last_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures_iter(text)
        .last()
        .map(|c| c[1].to_string())
        .filter(|s| !s.is_empty())
}

fn candidate_from(
    name: &str,
    epoch: Option<String>,
    version: Option<String>,
    release: Option<String>,
) -> Result<CandidateVersion, VersionProbeError> {
    let (Some(version), Some(release)) = (version, release) else {
        return Err(VersionProbeError::Incomplete(name.to_string()));
    };
    let epoch = epoch
        .map(|e| e.parse::<u64>().map_err(|_| VersionProbeError::InvalidEpoch(e)))
        .transpose()?;
    Ok(CandidateVersion {
        epoch,
        version,
        release,
    })
}

/// Parse the version fields of a `.SRCINFO` snapshot.
pub fn parse_snapshot(name: &str, content: &str) -> Result<CandidateVersion, VersionProbeError> {
    candidate_from(
        name,
        last_capture(&SNAPSHOT_EPOCH, content),
        last_capture(&SNAPSHOT_VER, content),
        last_capture(&SNAPSHOT_REL, content),
    )
}

/// Parse the `key=value` lines printed by [`RecipeResolver::descriptor_fields`].
pub fn parse_descriptor_output(
    name: &str,
    output: &str,
) -> Result<CandidateVersion, VersionProbeError> {
    static VER: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^pkgver=([a-zA-Z0-9._+-]+)\s*$").unwrap());
    static REL: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^pkgrel=([0-9.]+)\s*$").unwrap());
    static EPOCH: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^epoch=([0-9]+)\s*$").unwrap());

    candidate_from(
        name,
        last_capture(&EPOCH, output),
        last_capture(&VER, output),
        last_capture(&REL, output),
    )
}

/// Read the candidate version from the metadata snapshot.
pub fn read_snapshot(dir: &Path, name: &str) -> Result<CandidateVersion> {
    let path = dir.join(SNAPSHOT_FILE);
    if !path.exists() {
        return Err(VersionProbeError::MissingSnapshot(name.to_string()).into());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(parse_snapshot(name, &content)?)
}

fn remove_scratch(dir: &Path) {
    let scratch = dir.join(SCRATCH_DIR);
    if scratch.exists()
        && let Err(e) = std::fs::remove_dir_all(&scratch)
    {
        output::warning(&format!("Failed to remove {}: {}", scratch.display(), e));
    }
}

/// Run the builder in resolve-only mode, cleaning its scratch directory on
/// every path.
pub fn run_resolve_only(resolver: &dyn RecipeResolver, dir: &Path, name: &str) -> Result<()> {
    output::detail("Running the builder with --nobuild to ensure pkgver in PKGBUILD is updated...");
    let result = resolver
        .resolve_only(dir)
        .with_context(|| format!("Failed to run \"makepkg --nobuild\" in \"{}\"", name));
    remove_scratch(dir);
    result
}

/// Resolve the descriptor and read the candidate version from it.
pub fn resolve_candidate(
    resolver: &dyn RecipeResolver,
    dir: &Path,
    name: &str,
) -> Result<CandidateVersion> {
    run_resolve_only(resolver, dir, name)?;
    let fields = resolver.descriptor_fields(dir)?;
    Ok(parse_descriptor_output(name, &fields)?)
}

/// Candidate version using the requested mode. A missing snapshot falls back
/// to resolving.
pub fn probe_candidate(
    resolver: &dyn RecipeResolver,
    dir: &Path,
    name: &str,
    mode: ProbeMode,
) -> Result<CandidateVersion> {
    output::detail(&format!("Getting version of \"{}\"...", name));
    match mode {
        ProbeMode::Snapshot if dir.join(SNAPSHOT_FILE).exists() => read_snapshot(dir, name),
        ProbeMode::Snapshot => {
            output::info(&format!(
                "No {} for \"{}\", resolving {} instead",
                SNAPSHOT_FILE, name, DESCRIPTOR_FILE
            ));
            resolve_candidate(resolver, dir, name)
        }
        ProbeMode::Resolve => resolve_candidate(resolver, dir, name),
    }
}

/// Path of the post-install script the descriptor declares, if any.
pub fn install_script(resolver: &dyn RecipeResolver, dir: &Path, name: &str) -> Result<Option<String>> {
    run_resolve_only(resolver, dir, name)?;
    let fields = resolver.descriptor_fields(dir)?;
    Ok(last_capture(&DESCRIPTOR_INSTALL, &fields))
}
