use super::run;
use crate::build::RepoDatabase;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Inserts packages with `repo-add`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RepoAdd;

impl RepoDatabase for RepoAdd {
    fn add(&self, repo: &Path, artifacts: &[PathBuf]) -> Result<()> {
        run(Command::new("repo-add").arg(repo).args(artifacts))
    }
}
