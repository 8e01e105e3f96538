//! `makepkg` in resolve-only mode, and reading descriptor fields with `bash`

use super::{capture, run};
use crate::probe::recipe::{DESCRIPTOR_FILE, RecipeResolver};
use anyhow::Result;
use std::path::Path;
use std::process::Command;

const PRINT_FIELDS: &str = r#"source "$1" || exit 1
echo "pkgver=$pkgver"
echo "pkgrel=$pkgrel"
echo "epoch=$epoch"
echo "install=$install""#;

#[derive(Debug, Default, Clone, Copy)]
pub struct Makepkg;

impl RecipeResolver for Makepkg {
    fn resolve_only(&self, dir: &Path) -> Result<()> {
        run(Command::new("makepkg")
            .args(["-c", "--nobuild", "-s", "-r"])
            .current_dir(dir))
    }

    fn descriptor_fields(&self, dir: &Path) -> Result<String> {
        capture(
            Command::new("bash")
                .args(["-c", PRINT_FIELDS, "bash"])
                .arg(dir.join(DESCRIPTOR_FILE))
                .current_dir(dir),
        )
    }
}
