//! Package identity and per-run state
//!
//! A [`Package`] is built once from configuration. Everything the run learns
//! about it lives in its [`PackageRunState`] inside the [`RunTable`].

use std::fmt;
use std::path::{Path, PathBuf};

/// Default origin used when a package declares no `repo_path`.
pub const DEFAULT_ORIGIN_TEMPLATE: &str = "https://aur.archlinux.org/{}.git";

/// Sentinel value of `repo_path` meaning "local only, never fetch".
pub const NO_REMOTE: &str = "NO_REPO";

/// Where a recipe directory is synchronized from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Derived from the package name
    Default(String),
    /// Explicit `repo_path`
    Url(String),
    /// `NO_REPO`: the directory must already exist and is never fetched
    LocalOnly,
}

impl Origin {
    pub fn for_package(name: &str, repo_path: Option<&str>) -> Self {
        match repo_path {
            Some(NO_REMOTE) => Origin::LocalOnly,
            Some(url) => Origin::Url(url.to_string()),
            None => Origin::Default(DEFAULT_ORIGIN_TEMPLATE.replace("{}", name)),
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Origin::Default(url) | Origin::Url(url) => Some(url),
            Origin::LocalOnly => None,
        }
    }
}

/// Compiler cache wrapper to configure in the build root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    None,
    /// ccache with the given host cache directory
    Plain { dir: PathBuf },
    /// sccache with the given host cache directory and size quota (e.g. "5G")
    Distributed { dir: PathBuf, quota: String },
}

/// One package of the run, as declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Package {
    /// Recipe key; also the recipe directory name
    pub name: String,
    /// Artifact name inside the published repository
    pub published_name: String,
    /// Prebuilt native packages injected into the build
    pub native_deps: Vec<String>,
    /// Sibling packages of this repository injected into the build
    pub sibling_deps: Vec<String>,
    pub cache: CacheMode,
    pub skip_if_unchanged: bool,
    pub auto_review: bool,
    pub origin: Origin,
}

impl Package {
    pub fn new(name: &str) -> Self {
        Package {
            name: name.to_string(),
            published_name: name.to_string(),
            native_deps: Vec::new(),
            sibling_deps: Vec::new(),
            cache: CacheMode::None,
            skip_if_unchanged: false,
            auto_review: false,
            origin: Origin::for_package(name, None),
        }
    }

    /// Recipe directory of this package under `dirs`
    pub fn recipe_dir(&self, dirs: &Path) -> PathBuf {
        dirs.join(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewState {
    #[default]
    NotReached,
    Ok,
    Skip,
    Error,
}

/// Computed fact: is the published artifact outdated?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildDecision {
    #[default]
    NotReached,
    Install,
    UpToDate,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildOutcome {
    #[default]
    Unknown,
    WillBuild,
    NotBuilding,
    Success,
    IntegrityFailed,
    BuildFailed,
    PublishFailed,
    DependencyFetchFailed,
}

/// Operator-visible terminal outcome of the decision pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verdict {
    #[default]
    NotReached,
    Install,
    UpToDate,
    Skip,
    Error,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::NotReached => "not reached",
            Verdict::Install => "install",
            Verdict::UpToDate => "up to date",
            Verdict::Skip => "skip",
            Verdict::Error => "error",
        })
    }
}

impl fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildOutcome::Unknown => "unknown",
            BuildOutcome::WillBuild => "will build",
            BuildOutcome::NotBuilding => "not building",
            BuildOutcome::Success => "success",
            BuildOutcome::IntegrityFailed => "integrity check failed",
            BuildOutcome::BuildFailed => "build failed",
            BuildOutcome::PublishFailed => "add to repo failed",
            BuildOutcome::DependencyFetchFailed => "dependency fetch failed",
        })
    }
}

/// Everything the run attaches to one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageRunState {
    pub review: ReviewState,
    pub decision: BuildDecision,
    pub outcome: BuildOutcome,
    pub verdict: Verdict,
}

impl PackageRunState {
    /// Forget the computed decision so the next visit probes again.
    pub fn recheck(&mut self) {
        self.decision = BuildDecision::NotReached;
    }
}

/// The packages of one run, in order, each with its single run state.
#[derive(Debug, Clone, Default)]
pub struct RunTable {
    entries: Vec<(Package, PackageRunState)>,
}

impl RunTable {
    pub fn new(packages: Vec<Package>) -> Self {
        RunTable {
            entries: packages
                .into_iter()
                .map(|p| (p, PackageRunState::default()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn package(&self, index: usize) -> &Package {
        &self.entries[index].0
    }

    pub fn state(&self, index: usize) -> &PackageRunState {
        &self.entries[index].1
    }

    pub fn state_mut(&mut self, index: usize) -> &mut PackageRunState {
        &mut self.entries[index].1
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Package, &PackageRunState)> {
        self.entries.iter().map(|(p, s)| (p, s))
    }

    /// Indices of packages whose verdict is `install`, in list order
    pub fn to_build(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, (_, s))| s.verdict == Verdict::Install)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|(_, s)| s.verdict == Verdict::Error)
    }
}
