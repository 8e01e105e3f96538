//! Prebuilt dependency archives injected into a build

use super::BuildRoot;
use crate::core::output;
use crate::package::Package;
use anyhow::{Result, bail};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Host package cache native dependencies are taken from
pub const NATIVE_CACHE: &str = "/var/cache/pacman/pkg";

fn archive_pattern(name: &str) -> Result<Regex> {
    Ok(Regex::new(&format!(
        r"^{}-[0-9a-zA-Z.+_:]+-[0-9a-zA-Z.+_]+-(any|x86_64)\.pkg\.tar\.(xz|gz|zst)$",
        regex::escape(name)
    ))?)
}

/// Newest archive of `name` in `dir`, by lexicographic file name.
pub fn latest_archive(dir: &Path, name: &str) -> Result<Option<PathBuf>> {
    let pattern = format!(
        "{}/{}*",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob::Pattern::escape(name)
    );
    let re = archive_pattern(name)?;

    let mut matches: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| {
            path.file_name()
                .map(|f| re.is_match(&f.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    matches.sort();
    Ok(matches.pop())
}

/// Resolve every dependency of `pkg` to an archive path, natives first.
pub fn resolve(
    root: &dyn BuildRoot,
    pkg: &Package,
    native_cache: &Path,
    pkg_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();

    for dep in &pkg.native_deps {
        let mut found = latest_archive(native_cache, dep)?;
        if found.is_none() {
            output::detail(&format!("Downloading dep \"{}\"...", dep));
            if let Err(e) = root.fetch_native(dep) {
                output::warning(&format!("Failed to download \"{}\": {:#}", dep, e));
            }
            found = latest_archive(native_cache, dep)?;
        }
        match found {
            Some(path) => resolved.push(path),
            None => bail!("Failed to get dep \"{}\"", dep),
        }
    }

    for dep in &pkg.sibling_deps {
        match latest_archive(pkg_dir, dep)? {
            Some(path) => resolved.push(path),
            None => bail!("Failed to get aur_dep \"{}\"", dep),
        }
    }

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            std::fs::write(dir.join(name), "").unwrap();
        }
    }

    #[test]
    fn test_latest_archive_picks_last_sorted() {
        let dir = TempDir::new().unwrap();
        touch(
            dir.path(),
            &[
                "foo-1.0-1-x86_64.pkg.tar.zst",
                "foo-1.1-1-x86_64.pkg.tar.zst",
                "foo-1.1-1-x86_64.pkg.tar.zst.sig",
                "foo-bar-2.0-1-any.pkg.tar.zst",
                "foo-1.2-1-aarch64.pkg.tar.zst",
            ],
        );
        assert_eq!(
            latest_archive(dir.path(), "foo").unwrap(),
            Some(dir.path().join("foo-1.1-1-x86_64.pkg.tar.zst"))
        );
    }

    #[test]
    fn test_latest_archive_accepts_epoch_and_any() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["bar-2:0.9-3-any.pkg.tar.xz"]);
        assert!(latest_archive(dir.path(), "bar").unwrap().is_some());
    }

    #[test]
    fn test_latest_archive_none() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), &["foo-bar-2.0-1-any.pkg.tar.zst"]);
        assert_eq!(latest_archive(dir.path(), "foo").unwrap(), None);
    }
}
