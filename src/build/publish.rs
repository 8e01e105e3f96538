//! Signing, repository insertion and relocation of built artifacts

use super::{RepoDatabase, Signer};
use crate::core::output;
use crate::package::BuildOutcome;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Built package archives in `dir`, signatures excluded
pub fn artifacts(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.pkg.tar*", glob::Pattern::escape(&dir.to_string_lossy()));
    let mut found: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.extension().is_none_or(|ext| ext != "sig"))
        .collect();
    found.sort();
    Ok(found)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

/// Path of the `<repo without .tar>.sig` symlink
pub fn repo_signature_link(repo: &Path) -> PathBuf {
    let s = repo.to_string_lossy();
    PathBuf::from(format!("{}.sig", s.strip_suffix(".tar").unwrap_or(&s)))
}

/// Re-sign the repository database and point its short signature name at it.
pub fn sign_repository(signer: &dyn Signer, repo: &Path) -> Result<()> {
    let signature = with_suffix(repo, ".sig");
    match std::fs::remove_file(&signature) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            return Err(e).with_context(|| format!("Failed to remove {}", signature.display()));
        }
        _ => {}
    }
    signer.sign(repo)?;

    let link = repo_signature_link(repo);
    if link == signature {
        return Ok(());
    }
    let target = signature
        .file_name()
        .context("repository path has no file name")?;
    if std::fs::symlink_metadata(&link).is_ok() {
        std::fs::remove_file(&link)
            .with_context(|| format!("Failed to replace {}", link.display()))?;
    }
    std::os::unix::fs::symlink(target, &link)
        .with_context(|| format!("Failed to link {}", link.display()))?;
    Ok(())
}

/// Move `file` into `dest_dir`, copying when a rename is not possible.
pub fn relocate(file: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    let dest = dest_dir.join(name);
    if std::fs::rename(file, &dest).is_err() {
        std::fs::copy(file, &dest).with_context(|| {
            format!("Failed to copy {} to {}", file.display(), dest.display())
        })?;
        std::fs::remove_file(file)
            .with_context(|| format!("Failed to remove {}", file.display()))?;
    }
    Ok(dest)
}

/// Where publishing happens
pub struct PublishTarget<'a> {
    pub repo: &'a Path,
    pub pkg_dir: &'a Path,
}

/// Sign, insert and move the artifacts of one successful build.
///
/// Only a failed insertion changes the outcome. Signing and relocation
/// problems are reported and the build still counts as a success.
pub fn publish(
    signer: Option<&dyn Signer>,
    repo_db: &dyn RepoDatabase,
    target: &PublishTarget<'_>,
    name: &str,
    recipe_dir: &Path,
) -> BuildOutcome {
    let built = match artifacts(recipe_dir) {
        Ok(files) => files,
        Err(e) => {
            output::error(&format!("Failed to list built pkgs of \"{}\": {:#}", name, e));
            return BuildOutcome::PublishFailed;
        }
    };

    if let Some(signer) = signer {
        output::sub_action("Signing package...");
        for file in &built {
            if let Err(e) = signer.sign(file) {
                output::warning(&format!("Failed to sign pkg \"{}\": {:#}", name, e));
            }
        }
    }

    output::sub_action("Adding built pkgs to repo...");
    if let Err(e) = repo_db.add(target.repo, &built) {
        output::error(&format!(
            "Failed to add built pkg(s) \"{}\" to repo: {:#}",
            name, e
        ));
        return BuildOutcome::PublishFailed;
    }

    if let Some(signer) = signer {
        output::sub_action(&format!("Signing \"{}\"...", target.repo.display()));
        if let Err(e) = sign_repository(signer, target.repo) {
            output::warning(&format!(
                "Failed to sign \"{}\": {:#}",
                target.repo.display(),
                e
            ));
        }
    }

    output::sub_action("Moving pkg to pkgs directory...");
    for file in &built {
        for path in [file.clone(), with_suffix(file, ".sig")] {
            if !path.exists() {
                continue;
            }
            output::detail(&format!("Moving \"{}\"...", path.display()));
            if let Err(e) = relocate(&path, target.pkg_dir) {
                output::warning(&format!("{:#}", e));
            }
        }
    }

    BuildOutcome::Success
}
