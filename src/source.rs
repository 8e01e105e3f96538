//! Recipe directory synchronization
//!
//! Makes sure each package's recipe directory exists (cloning it when needed)
//! and brings it up to the tip of the branch it tracks.

use crate::core::output;
use crate::package::{Origin, Package};
use anyhow::{Result, bail};
use std::path::Path;

/// Source-control operations needed to keep a recipe directory current.
pub trait SourceControl {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    /// Fetch all remotes, pruning deleted branches
    fn fetch_all(&self, dir: &Path) -> Result<()>;
    fn remotes(&self, dir: &Path) -> Result<Vec<String>>;
    /// Short branch status line(s), e.g. `## master...origin/master`
    fn branch_status(&self, dir: &Path) -> Result<String>;
    /// Hash of the newest commit of `rev` (HEAD when `None`)
    fn head_hash(&self, dir: &Path, rev: Option<&str>) -> Result<String>;
    fn pull(&self, dir: &Path) -> Result<()>;
    fn discard_changes(&self, dir: &Path) -> Result<()>;
}

/// Result of a successful synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Updated,
    /// Local and remote tips match and the package may be fast-skipped
    AlreadyCurrent,
}

/// Make sure the recipe directory exists, cloning it from its origin if not.
pub fn ensure_cloned(scm: &dyn SourceControl, pkg: &Package, dirs: &Path) -> Result<()> {
    let dir = pkg.recipe_dir(dirs);
    output::detail(&format!("Checking that dir for \"{}\" exists...", pkg.name));

    if dir.is_dir() {
        return Ok(());
    }
    if dir.exists() {
        bail!("\"{}\" exists but is not a dir", dir.display());
    }

    match &pkg.origin {
        Origin::LocalOnly => bail!(
            "\"{}\" does not exist, but NO_REPO is specified for its repo_path",
            dir.display()
        ),
        Origin::Default(url) | Origin::Url(url) => {
            scm.clone_repo(url, &dir).map_err(|e| {
                e.context(format!(
                    "Failed to clone \"{}\" (tried repo path \"{}\")",
                    pkg.name, url
                ))
            })?;
            output::detail(&format!("Created dir for \"{}\".", pkg.name));
            Ok(())
        }
    }
}

/// Pick the remote the checked-out branch tracks out of the branch status.
pub fn tracked_remote(status: &str, remotes: &[String]) -> Option<String> {
    remotes
        .iter()
        .map(|r| r.trim())
        .find(|r| !r.is_empty() && status.contains(r))
        .map(|r| r.to_string())
}

/// Fetch and fast-forward the recipe directory of `pkg`.
pub fn synchronize(scm: &dyn SourceControl, pkg: &Package, dirs: &Path) -> Result<SyncStatus> {
    let dir = pkg.recipe_dir(dirs);
    output::detail(&format!(
        "Making sure pkg dir for \"{}\" is up to date...",
        pkg.name
    ));

    scm.fetch_all(&dir)
        .map_err(|e| e.context(format!("Failed to update pkg dir of \"{}\" (fetching)", pkg.name)))?;

    let remotes: Vec<String> = scm
        .remotes(&dir)?
        .into_iter()
        .filter(|r| !r.trim().is_empty())
        .collect();
    if remotes.is_empty() {
        bail!("Failed to update pkg dir of \"{}\" (getting remotes)", pkg.name);
    }

    let status = scm.branch_status(&dir)?;
    let Some(remote) = tracked_remote(&status, &remotes) else {
        bail!(
            "Failed to update pkg dir of \"{}\" (getting branch's remote)",
            pkg.name
        );
    };

    let local = scm.head_hash(&dir, None)?;
    let upstream = scm.head_hash(&dir, Some(&remote))?;
    if local.trim().is_empty() || upstream.trim().is_empty() {
        bail!("Failed to update pkg dir of \"{}\" (getting hashes)", pkg.name);
    }

    if local.trim() != upstream.trim() {
        if scm.pull(&dir).is_err() {
            scm.discard_changes(&dir)
                .and_then(|_| scm.pull(&dir))
                .map_err(|e| e.context(format!("Failed to update pkg dir of \"{}\"", pkg.name)))?;
        }
    } else if pkg.skip_if_unchanged {
        output::detail(&format!("\"{}\" is up to date", pkg.name));
        return Ok(SyncStatus::AlreadyCurrent);
    }

    output::detail(&format!("Updated pkg dir for \"{}\"", pkg.name));
    Ok(SyncStatus::Updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeScm {
        local: String,
        upstream: String,
        pull_failures: RefCell<u32>,
        calls: RefCell<Vec<String>>,
    }

    impl SourceControl for FakeScm {
        fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
            self.calls.borrow_mut().push(format!("clone {}", url));
            std::fs::create_dir_all(dest)?;
            Ok(())
        }
        fn fetch_all(&self, _dir: &Path) -> Result<()> {
            self.calls.borrow_mut().push("fetch".into());
            Ok(())
        }
        fn remotes(&self, _dir: &Path) -> Result<Vec<String>> {
            Ok(vec!["upstream".into(), "origin".into(), "".into()])
        }
        fn branch_status(&self, _dir: &Path) -> Result<String> {
            Ok("## master...origin/master".into())
        }
        fn head_hash(&self, _dir: &Path, rev: Option<&str>) -> Result<String> {
            Ok(match rev {
                None => self.local.clone(),
                Some(_) => self.upstream.clone(),
            })
        }
        fn pull(&self, _dir: &Path) -> Result<()> {
            self.calls.borrow_mut().push("pull".into());
            let mut failures = self.pull_failures.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                bail!("pull failed");
            }
            Ok(())
        }
        fn discard_changes(&self, _dir: &Path) -> Result<()> {
            self.calls.borrow_mut().push("discard".into());
            Ok(())
        }
    }

    fn setup(name: &str) -> (TempDir, Package) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(name)).unwrap();
        (dir, Package::new(name))
    }

    #[test]
    fn test_tracked_remote_from_status() {
        let remotes = vec!["upstream".to_string(), "origin".to_string()];
        assert_eq!(
            tracked_remote("## master...origin/master", &remotes),
            Some("origin".to_string())
        );
        assert_eq!(tracked_remote("## master", &remotes), None);
    }

    #[test]
    fn test_ensure_cloned_existing_dir() {
        let (dir, pkg) = setup("foo");
        let scm = FakeScm::default();
        ensure_cloned(&scm, &pkg, dir.path()).unwrap();
        assert!(scm.calls.borrow().is_empty());
    }

    #[test]
    fn test_ensure_cloned_clones_default_origin() {
        let dir = TempDir::new().unwrap();
        let scm = FakeScm::default();
        ensure_cloned(&scm, &Package::new("bar"), dir.path()).unwrap();
        assert_eq!(
            scm.calls.borrow().as_slice(),
            ["clone https://aur.archlinux.org/bar.git"]
        );
    }

    #[test]
    fn test_ensure_cloned_rejects_file_in_the_way() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("foo"), "").unwrap();
        let err = ensure_cloned(&FakeScm::default(), &Package::new("foo"), dir.path()).unwrap_err();
        assert!(err.to_string().contains("not a dir"));
    }

    #[test]
    fn test_ensure_cloned_local_only_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let mut pkg = Package::new("foo");
        pkg.origin = Origin::LocalOnly;
        let err = ensure_cloned(&FakeScm::default(), &pkg, dir.path()).unwrap_err();
        assert!(err.to_string().contains("NO_REPO"));
    }

    #[test]
    fn test_synchronize_same_hash_with_skip_flag() {
        let (dir, mut pkg) = setup("foo");
        pkg.skip_if_unchanged = true;
        let scm = FakeScm {
            local: "abc".into(),
            upstream: "abc".into(),
            ..Default::default()
        };
        assert_eq!(synchronize(&scm, &pkg, dir.path()).unwrap(), SyncStatus::AlreadyCurrent);
    }

    #[test]
    fn test_synchronize_same_hash_without_skip_flag() {
        let (dir, pkg) = setup("foo");
        let scm = FakeScm {
            local: "abc".into(),
            upstream: "abc".into(),
            ..Default::default()
        };
        assert_eq!(synchronize(&scm, &pkg, dir.path()).unwrap(), SyncStatus::Updated);
        assert!(!scm.calls.borrow().contains(&"pull".to_string()));
    }

    #[test]
    fn test_synchronize_discards_once_then_retries_pull() {
        let (dir, pkg) = setup("foo");
        let scm = FakeScm {
            local: "abc".into(),
            upstream: "def".into(),
            pull_failures: RefCell::new(1),
            ..Default::default()
        };
        assert_eq!(synchronize(&scm, &pkg, dir.path()).unwrap(), SyncStatus::Updated);
        assert_eq!(
            scm.calls.borrow().as_slice(),
            ["fetch", "pull", "discard", "pull"]
        );
    }

    #[test]
    fn test_synchronize_fails_after_second_pull_failure() {
        let (dir, pkg) = setup("foo");
        let scm = FakeScm {
            local: "abc".into(),
            upstream: "def".into(),
            pull_failures: RefCell::new(2),
            ..Default::default()
        };
        assert!(synchronize(&scm, &pkg, dir.path()).is_err());
    }
}
