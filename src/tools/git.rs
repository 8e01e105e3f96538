//! `git` working copies

use super::{capture, run};
use crate::source::SourceControl;
use anyhow::Result;
use std::path::Path;
use std::process::Command;

#[derive(Debug, Default, Clone, Copy)]
pub struct Git;

fn git(dir: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.current_dir(dir);
    cmd
}

impl SourceControl for Git {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        run(Command::new("git").arg("clone").arg(url).arg(dest))
    }

    fn fetch_all(&self, dir: &Path) -> Result<()> {
        run(git(dir).args(["fetch", "-p", "--all"]))
    }

    fn remotes(&self, dir: &Path) -> Result<Vec<String>> {
        Ok(capture(git(dir).arg("remote"))?
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    fn branch_status(&self, dir: &Path) -> Result<String> {
        capture(git(dir).args(["status", "-sb", "--porcelain"]))
    }

    fn head_hash(&self, dir: &Path, rev: Option<&str>) -> Result<String> {
        let mut cmd = git(dir);
        cmd.args(["log", "-1", "--format=format:%H"]);
        if let Some(rev) = rev {
            cmd.arg(rev);
        }
        Ok(capture(&mut cmd)?.trim().to_string())
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        run(git(dir).arg("pull"))
    }

    fn discard_changes(&self, dir: &Path) -> Result<()> {
        run(git(dir).args(["checkout", "--", "*"]))
    }
}
