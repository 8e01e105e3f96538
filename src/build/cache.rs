//! Compiler cache setup inside the build root
//!
//! ccache is switched through the root's `makepkg.conf`. sccache works
//! through wrapper scripts placed ahead of the real compilers on `PATH`.
//! Only one of the two is ever active.

use super::BuildRoot;
use crate::core::output;
use crate::package::CacheMode;
use anyhow::{Context, Result};

/// Front-ends that get an sccache wrapper
pub const WRAPPED_COMPILERS: [&str; 5] = ["gcc", "g++", "clang", "clang++", "rustc"];

/// Drops `/usr/local/bin` from `PATH` and hands the call to sccache under the
/// name it was invoked as.
pub const SCCACHE_WRAPPER: &str = "#!/usr/bin/env sh\n\
export PATH=${PATH/:\\/usr\\/local\\/bin/}\n\
/usr/bin/env sccache $(basename \"$0\") \"$@\"\n";

fn remove_wrappers(root: &dyn BuildRoot) {
    if let Err(e) = root.remove_wrappers(&WRAPPED_COMPILERS) {
        output::warning(&format!("Failed to cleanup sccache files: {:#}", e));
    }
}

/// Put the build root in the cache mode `mode` asks for.
pub fn configure(root: &dyn BuildRoot, mode: &CacheMode) -> Result<()> {
    match mode {
        CacheMode::Plain { .. } => {
            remove_wrappers(root);
            root.set_ccache(true)
                .context("Failed to enable ccache in makepkg.conf")
        }
        CacheMode::Distributed { .. } => {
            root.set_ccache(false)
                .context("Failed to disable ccache in makepkg.conf")?;
            root.install_wrappers(SCCACHE_WRAPPER, &WRAPPED_COMPILERS)
                .context("Failed to set up sccache wrapper scripts")
        }
        CacheMode::None => {
            root.set_ccache(false)
                .context("Failed to disable ccache in makepkg.conf")?;
            remove_wrappers(root);
            Ok(())
        }
    }
}
