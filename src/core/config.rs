//! Run configuration
//!
//! Settings come from a TOML document (`[[entry]]` tables for packages plus
//! global keys) and from command-line overrides. Command-line values win.
//! Paths may start with `~/`.
//!
//! ```toml
//! chroot = "/var/lib/chroots/x86_64"
//! pkg_dir = "/srv/repo/x86_64"
//! repo = "/srv/repo/x86_64/custom.db.tar"
//! gpg_dir = "/home/builder/checkingGPG"
//! logs_dir = "/home/builder/logs"
//! dirs_dir = "/home/builder/recipes"
//! signing_gpg_dir = "/home/builder/signingGPG"
//! signing_gpg_key_fp = "04D9E3A2880F6418EC4BA70EA0F3F8FAA2088E62"
//! log_limit = 1073741824
//! log_overflow = "warn"
//! echo_build_logs = false
//!
//! [[entry]]
//! name = "ion-git"
//! skip_branch_up_to_date = true
//! auto_review = true
//!
//! [[entry]]
//! name = "sccache-heavy"
//! sccache_dir = "/home/builder/sccache"
//! sccache_cache_size = "10G"
//! aur_deps = ["ion-git"]
//! ```

use crate::core::output;
use crate::package::{CacheMode, Origin, Package};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EDITOR: &str = "/usr/bin/nano";
pub const DEFAULT_SCCACHE_SIZE: &str = "5G";
pub const DEFAULT_LOG_LIMIT: u64 = 1024 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing required setting \"{0}\" (set it in the config or on the command line)")]
    Missing(&'static str),

    #[error("at least --config or --pkg must be specified")]
    NoPackages,

    #[error("[[entry]] number {0} has an empty name")]
    UnnamedEntry(usize),
}

/// What happens when a build log reaches its byte ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Stop writing and report a warning
    #[default]
    Warn,
    /// Stop writing, report an error and fail the build
    Error,
}

/// How the recipe's candidate version is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// Ask the operator for each package
    #[default]
    Ask,
    /// Always read the metadata snapshot
    Snapshot,
    /// Always resolve through the builder
    Resolve,
}

impl std::str::FromStr for VersionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(VersionSource::Ask),
            "snapshot" => Ok(VersionSource::Snapshot),
            "resolve" => Ok(VersionSource::Resolve),
            other => Err(format!(
                "unknown version source '{}' (expected ask, snapshot or resolve)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampMode {
    #[default]
    Utc,
    Local,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub chroot: Option<PathBuf>,
    pub pkg_dir: Option<PathBuf>,
    pub repo: Option<PathBuf>,
    pub gpg_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub dirs_dir: Option<PathBuf>,
    pub signing_gpg_dir: Option<PathBuf>,
    pub signing_gpg_key_fp: Option<String>,
    pub editor: Option<String>,
    pub log_limit: Option<u64>,
    pub log_overflow: Option<OverflowPolicy>,
    pub datetime_in_local_time: bool,
    pub tmpfs: bool,
    pub echo_build_logs: bool,
    pub version_source: Option<VersionSource>,
    pub entry: Vec<EntryToml>,
}

/// One `[[entry]]` table. Only `name` is mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryToml {
    pub name: String,
    pub pkg_name: Option<String>,
    pub repo_path: Option<String>,
    #[serde(default)]
    pub other_deps: Vec<String>,
    #[serde(default)]
    pub aur_deps: Vec<String>,
    pub ccache_dir: Option<PathBuf>,
    pub sccache_dir: Option<PathBuf>,
    pub sccache_cache_size: Option<String>,
    #[serde(default)]
    pub skip_branch_up_to_date: bool,
    #[serde(default, alias = "hash_compare_PKGBUILD")]
    pub auto_review: bool,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl EntryToml {
    fn into_package(self, no_skip: &[String]) -> Package {
        let cache = match (self.ccache_dir, self.sccache_dir) {
            (Some(dir), sccache) => {
                if sccache.is_some() {
                    output::warning(&format!(
                        "\"{}\" sets both ccache_dir and sccache_dir, using ccache",
                        self.name
                    ));
                }
                CacheMode::Plain { dir }
            }
            (None, Some(dir)) => CacheMode::Distributed {
                dir,
                quota: self
                    .sccache_cache_size
                    .unwrap_or_else(|| DEFAULT_SCCACHE_SIZE.to_string()),
            },
            (None, None) => CacheMode::None,
        };

        Package {
            published_name: self.pkg_name.unwrap_or_else(|| self.name.clone()),
            origin: Origin::for_package(&self.name, self.repo_path.as_deref()),
            native_deps: self.other_deps,
            sibling_deps: self.aur_deps,
            cache,
            skip_if_unchanged: self.skip_branch_up_to_date && !no_skip.contains(&self.name),
            auto_review: self.auto_review,
            name: self.name,
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: PathBuf) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path;
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path,
    }
}

fn required(value: Option<PathBuf>, key: &'static str) -> Result<PathBuf, ConfigError> {
    value.map(expand_home).ok_or(ConfigError::Missing(key))
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub pkgs: Vec<String>,
    pub no_skip: Vec<String>,
    pub editor: Option<String>,
    pub chroot: Option<PathBuf>,
    pub pkg_dir: Option<PathBuf>,
    pub repo: Option<PathBuf>,
    pub gpg_dir: Option<PathBuf>,
    pub logs_dir: Option<PathBuf>,
    pub dirs_dir: Option<PathBuf>,
    pub signing_gpg_dir: Option<PathBuf>,
    pub signing_gpg_key_fp: Option<String>,
    pub version_source: Option<VersionSource>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    pub gpg_dir: PathBuf,
    pub key_fp: String,
}

/// Fully resolved settings of one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub chroot: PathBuf,
    pub pkg_dir: PathBuf,
    pub repo: PathBuf,
    pub gpg_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Parent directory of all recipe directories
    pub dirs: PathBuf,
    pub signing: Option<SigningIdentity>,
    pub editor: String,
    pub log_limit: u64,
    pub log_overflow: OverflowPolicy,
    pub timestamps: TimestampMode,
    pub tmpfs: bool,
    /// Copy build output lines into the run log as well
    pub echo_build_logs: bool,
    pub version_source: VersionSource,
    pub packages: Vec<Package>,
}

impl Settings {
    pub fn resolve(file: Option<ConfigFile>, overrides: Overrides) -> Result<Self, ConfigError> {
        if file.is_none() && overrides.pkgs.is_empty() {
            return Err(ConfigError::NoPackages);
        }
        let file = file.unwrap_or_default();
        if let Some(i) = file.entry.iter().position(|e| e.name.trim().is_empty()) {
            return Err(ConfigError::UnnamedEntry(i + 1));
        }

        let packages = if file.entry.is_empty() {
            overrides.pkgs.iter().map(|name| Package::new(name)).collect()
        } else {
            file.entry
                .into_iter()
                .filter(|e| overrides.pkgs.is_empty() || overrides.pkgs.contains(&e.name))
                .map(|e| e.into_package(&overrides.no_skip))
                .collect()
        };

        let signing_dir = overrides.signing_gpg_dir.or(file.signing_gpg_dir);
        let signing_fp = overrides.signing_gpg_key_fp.or(file.signing_gpg_key_fp);
        let signing = match (signing_dir, signing_fp) {
            (Some(gpg_dir), Some(key_fp)) => Some(SigningIdentity {
                gpg_dir: expand_home(gpg_dir),
                key_fp,
            }),
            (Some(_), None) => return Err(ConfigError::Missing("signing_gpg_key_fp")),
            (None, _) => None,
        };

        let editor = overrides
            .editor
            .or(file.editor)
            .or_else(|| std::env::var("EDITOR").ok().filter(|e| !e.is_empty()))
            .unwrap_or_else(|| DEFAULT_EDITOR.to_string());

        Ok(Settings {
            chroot: required(overrides.chroot.or(file.chroot), "chroot")?,
            pkg_dir: required(overrides.pkg_dir.or(file.pkg_dir), "pkg_dir")?,
            repo: required(overrides.repo.or(file.repo), "repo")?,
            gpg_dir: required(overrides.gpg_dir.or(file.gpg_dir), "gpg_dir")?,
            logs_dir: required(overrides.logs_dir.or(file.logs_dir), "logs_dir")?,
            dirs: overrides
                .dirs_dir
                .or(file.dirs_dir)
                .map(expand_home)
                .unwrap_or_else(|| PathBuf::from(".")),
            signing,
            editor,
            log_limit: file.log_limit.unwrap_or(DEFAULT_LOG_LIMIT),
            log_overflow: file.log_overflow.unwrap_or_default(),
            timestamps: if file.datetime_in_local_time {
                TimestampMode::Local
            } else {
                TimestampMode::Utc
            },
            tmpfs: file.tmpfs,
            echo_build_logs: file.echo_build_logs,
            version_source: overrides
                .version_source
                .or(file.version_source)
                .unwrap_or_default(),
            packages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
chroot = "/chroot"
pkg_dir = "/repo"
repo = "/repo/custom.db.tar"
gpg_dir = "/gpg"
logs_dir = "/logs"
dirs_dir = "/recipes"
editor = "vim"
log_limit = 4096
log_overflow = "error"
datetime_in_local_time = true

[[entry]]
name = "ion-git"
skip_branch_up_to_date = true
auto_review = true

[[entry]]
name = "heavy"
pkg_name = "heavy-bin"
sccache_dir = "/sccache"
aur_deps = ["ion-git"]
other_deps = ["llvm-libs"]

[[entry]]
name = "ccached"
ccache_dir = "/ccache"
repo_path = "NO_REPO"
hash_compare_PKGBUILD = true
"#;

    fn parse() -> ConfigFile {
        ConfigFile::parse(CONFIG, Path::new("test.toml")).unwrap()
    }

    #[test]
    fn test_resolve_full_config() {
        let settings = Settings::resolve(Some(parse()), Overrides::default()).unwrap();
        assert_eq!(settings.chroot, PathBuf::from("/chroot"));
        assert_eq!(settings.dirs, PathBuf::from("/recipes"));
        assert_eq!(settings.editor, "vim");
        assert_eq!(settings.log_limit, 4096);
        assert_eq!(settings.log_overflow, OverflowPolicy::Error);
        assert_eq!(settings.timestamps, TimestampMode::Local);
        assert_eq!(settings.version_source, VersionSource::Ask);
        assert!(settings.signing.is_none());
        assert_eq!(settings.packages.len(), 3);

        let ion = &settings.packages[0];
        assert!(ion.skip_if_unchanged);
        assert!(ion.auto_review);
        assert_eq!(ion.published_name, "ion-git");

        let heavy = &settings.packages[1];
        assert_eq!(heavy.published_name, "heavy-bin");
        assert_eq!(heavy.sibling_deps, vec!["ion-git".to_string()]);
        assert_eq!(heavy.native_deps, vec!["llvm-libs".to_string()]);
        assert_eq!(
            heavy.cache,
            CacheMode::Distributed {
                dir: PathBuf::from("/sccache"),
                quota: "5G".to_string()
            }
        );

        let ccached = &settings.packages[2];
        assert_eq!(ccached.origin, Origin::LocalOnly);
        assert!(ccached.auto_review);
        assert_eq!(
            ccached.cache,
            CacheMode::Plain {
                dir: PathBuf::from("/ccache")
            }
        );
    }

    #[test]
    fn test_pkg_filter_keeps_config_order() {
        let overrides = Overrides {
            pkgs: vec!["ccached".to_string(), "ion-git".to_string()],
            ..Default::default()
        };
        let settings = Settings::resolve(Some(parse()), overrides).unwrap();
        let names: Vec<_> = settings.packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["ion-git", "ccached"]);
    }

    #[test]
    fn test_no_skip_disables_skip_if_unchanged() {
        let overrides = Overrides {
            no_skip: vec!["ion-git".to_string()],
            ..Default::default()
        };
        let settings = Settings::resolve(Some(parse()), overrides).unwrap();
        assert!(!settings.packages[0].skip_if_unchanged);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let overrides = Overrides {
            chroot: Some(PathBuf::from("/other")),
            editor: Some("nvim".to_string()),
            version_source: Some(VersionSource::Snapshot),
            ..Default::default()
        };
        let settings = Settings::resolve(Some(parse()), overrides).unwrap();
        assert_eq!(settings.chroot, PathBuf::from("/other"));
        assert_eq!(settings.editor, "nvim");
        assert_eq!(settings.version_source, VersionSource::Snapshot);
    }

    #[test]
    fn test_missing_required_setting() {
        let overrides = Overrides {
            pkgs: vec!["foo".to_string()],
            ..Default::default()
        };
        let err = Settings::resolve(None, overrides).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("chroot")));
    }

    #[test]
    fn test_nothing_specified() {
        let err = Settings::resolve(None, Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::NoPackages));
    }

    #[test]
    fn test_signing_requires_fingerprint() {
        let mut file = parse();
        file.signing_gpg_dir = Some(PathBuf::from("/signing"));
        let err = Settings::resolve(Some(file), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("signing_gpg_key_fp")));
    }

    #[test]
    fn test_packages_from_command_line_only() {
        let overrides = Overrides {
            pkgs: vec!["a".to_string(), "b".to_string()],
            chroot: Some(PathBuf::from("/c")),
            pkg_dir: Some(PathBuf::from("/p")),
            repo: Some(PathBuf::from("/p/r.db.tar")),
            gpg_dir: Some(PathBuf::from("/g")),
            logs_dir: Some(PathBuf::from("/l")),
            ..Default::default()
        };
        let settings = Settings::resolve(None, overrides).unwrap();
        assert_eq!(settings.packages.len(), 2);
        assert_eq!(settings.packages[1].name, "b");
        assert_eq!(settings.dirs, PathBuf::from("."));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(PathBuf::from("/abs")), PathBuf::from("/abs"));
        assert_eq!(expand_home(PathBuf::from("rel/~")), PathBuf::from("rel/~"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(PathBuf::from("~/logs")), home.join("logs"));
        }
    }

    #[test]
    fn test_echo_build_logs_defaults_off() {
        let settings = Settings::resolve(Some(parse()), Overrides::default()).unwrap();
        assert!(!settings.echo_build_logs);
        let file = ConfigFile::parse(
            "echo_build_logs = true\nchroot = \"/c\"",
            Path::new("x.toml"),
        )
        .unwrap();
        assert!(file.echo_build_logs);
    }

    #[test]
    fn test_entry_without_name_rejected() {
        let content = "dirs_dir = \"/recipes\"\n[[entry]]\npkg_name = \"foo\"\n";
        let result = ConfigFile::parse(content, Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_entry_with_blank_name_rejected() {
        let content = "[[entry]]\nname = \"ok\"\n[[entry]]\nname = \" \"\n";
        let file = ConfigFile::parse(content, Path::new("x.toml")).unwrap();
        let err = Settings::resolve(Some(file), Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnnamedEntry(2)));
    }

    #[test]
    fn test_unknown_overflow_policy_rejected() {
        let result = ConfigFile::parse("log_overflow = \"panic\"", Path::new("x.toml"));
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
