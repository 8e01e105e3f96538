//! Command-backed collaborators
//!
//! Each type wraps one external program behind the trait the engine uses.
//! Child output goes straight to the terminal unless it is captured for
//! parsing.

pub mod chroot;
pub mod editor;
pub mod git;
pub mod gpg;
pub mod makepkg;
pub mod repo;

pub use chroot::ArchChroot;
pub use editor::CommandEditor;
pub use git::Git;
pub use gpg::Gpg;
pub use makepkg::Makepkg;
pub use repo::RepoAdd;

use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command on the terminal, failing on a non-zero exit.
pub(crate) fn run(cmd: &mut Command) -> Result<()> {
    let what = describe(cmd);
    let status = cmd
        .status()
        .with_context(|| format!("command failed to start: {}", what))?;
    if !status.success() {
        bail!(
            "command failed with exit code: {:?}\n  command: {}",
            status.code(),
            what
        );
    }
    Ok(())
}

/// Run a command and return its stdout, failing on a non-zero exit.
pub(crate) fn capture(cmd: &mut Command) -> Result<String> {
    let what = describe(cmd);
    let output = cmd
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("command failed to start: {}", what))?;
    if !output.status.success() {
        bail!(
            "command failed with exit code: {:?}\n  command: {}",
            output.status.code(),
            what
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
