//! devtools build root (`arch-nspawn`, `makechrootpkg`)

use super::run;
use crate::build::invocation::chroot_build;
use crate::build::{BuildInvocation, BuildRoot};
use crate::package::Package;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

const ENABLE_CCACHE: &str = "/^BUILDENV=/s/!ccache/ccache/";
const DISABLE_CCACHE: &str = "/^BUILDENV=/s/ ccache/ !ccache/";

#[derive(Debug, Clone)]
pub struct ArchChroot {
    root: PathBuf,
    tmpfs: bool,
}

impl ArchChroot {
    pub fn new(root: impl Into<PathBuf>, tmpfs: bool) -> Self {
        ArchChroot {
            root: root.into(),
            tmpfs,
        }
    }

    /// The root copy every build starts from
    fn base(&self) -> PathBuf {
        self.root.join("root")
    }

    fn makepkg_conf(&self) -> PathBuf {
        self.base().join("etc/makepkg.conf")
    }

    /// Wrapper script locations inside the root
    pub fn wrapper_paths(&self, names: &[&str]) -> Vec<PathBuf> {
        let bin = self.base().join("usr/local/bin");
        names.iter().map(|n| bin.join(n)).collect()
    }
}

impl BuildRoot for ArchChroot {
    fn update(&self) -> Result<()> {
        run(Command::new("arch-nspawn")
            .arg(self.base())
            .args(["pacman", "-Syu"]))
        .context("Failed to update the chroot")
    }

    fn verify_sources(&self, dir: &Path) -> Result<()> {
        run(Command::new("makepkg")
            .args(["--verifysource", "-f"])
            .current_dir(dir))
    }

    fn set_ccache(&self, enabled: bool) -> Result<()> {
        let expr = if enabled { ENABLE_CCACHE } else { DISABLE_CCACHE };
        run(Command::new("sudo")
            .args(["sed", "-i", expr])
            .arg(self.makepkg_conf()))
    }

    fn install_wrappers(&self, script: &str, names: &[&str]) -> Result<()> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(script.as_bytes())?;
        staged.flush()?;
        for dest in self.wrapper_paths(names) {
            run(Command::new("sudo")
                .args(["install", "-m", "755"])
                .arg(staged.path())
                .arg(&dest))
            .with_context(|| format!("Failed to create executable script \"{}\"", dest.display()))?;
        }
        Ok(())
    }

    fn remove_wrappers(&self, names: &[&str]) -> Result<()> {
        run(Command::new("sudo")
            .args(["rm", "-f"])
            .args(self.wrapper_paths(names)))
    }

    fn fetch_native(&self, name: &str) -> Result<()> {
        run(Command::new("sudo").args(["pacman", "-Sw", "--noconfirm", name]))
    }

    fn invocation(&self, pkg: &Package, dir: &Path, deps: &[PathBuf]) -> BuildInvocation {
        chroot_build(&self.root, self.tmpfs, deps, &pkg.cache, dir)
    }
}
