//! Isolated builder command lines

use crate::package::CacheMode;
use std::path::{Path, PathBuf};

/// One process to run for a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// `makechrootpkg` invocation for one recipe directory.
///
/// Every dependency archive becomes an `-I` flag. The cache directory is
/// bind-mounted into the root and its environment is passed through to
/// `makepkg` after the `--` separator.
pub fn chroot_build(
    root: &Path,
    tmpfs: bool,
    deps: &[PathBuf],
    cache: &CacheMode,
    recipe_dir: &Path,
) -> BuildInvocation {
    let mut args: Vec<String> = vec!["-c".into(), "-r".into(), root.display().to_string()];
    if tmpfs {
        args.push("-T".into());
    }
    for dep in deps {
        args.push("-I".into());
        args.push(dep.display().to_string());
    }

    let mut env = Vec::new();
    match cache {
        CacheMode::None => {}
        CacheMode::Plain { dir } => {
            args.push("-d".into());
            args.push(format!("{}:/ccache", dir.display()));
            env.push("CCACHE_DIR=/ccache".to_string());
        }
        CacheMode::Distributed { dir, quota } => {
            args.push("-d".into());
            args.push(format!("{}:/sccache", dir.display()));
            env.push("SCCACHE_DIR=/sccache".to_string());
            env.push(format!("SCCACHE_CACHE_SIZE={}", quota));
            env.push("RUSTC_WRAPPER=/usr/bin/sccache".to_string());
        }
    }

    args.push("--".into());
    args.extend(env);
    args.extend(
        ["--syncdeps", "--noconfirm", "--log", "--holdver"]
            .iter()
            .map(|s| s.to_string()),
    );

    BuildInvocation {
        program: "makechrootpkg".into(),
        args,
        cwd: recipe_dir.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_build() {
        let inv = chroot_build(
            Path::new("/chroot"),
            false,
            &[],
            &CacheMode::None,
            Path::new("/recipes/foo"),
        );
        assert_eq!(inv.program, "makechrootpkg");
        assert_eq!(
            inv.args,
            ["-c", "-r", "/chroot", "--", "--syncdeps", "--noconfirm", "--log", "--holdver"]
        );
        assert_eq!(inv.cwd, PathBuf::from("/recipes/foo"));
    }

    #[test]
    fn test_deps_tmpfs_and_ccache() {
        let inv = chroot_build(
            Path::new("/chroot"),
            true,
            &[PathBuf::from("/cache/a-1-1-any.pkg.tar.zst")],
            &CacheMode::Plain {
                dir: PathBuf::from("/home/b/ccache"),
            },
            Path::new("/r/foo"),
        );
        assert_eq!(
            inv.args,
            [
                "-c",
                "-r",
                "/chroot",
                "-T",
                "-I",
                "/cache/a-1-1-any.pkg.tar.zst",
                "-d",
                "/home/b/ccache:/ccache",
                "--",
                "CCACHE_DIR=/ccache",
                "--syncdeps",
                "--noconfirm",
                "--log",
                "--holdver"
            ]
        );
    }

    #[test]
    fn test_sccache_environment() {
        let inv = chroot_build(
            Path::new("/chroot"),
            false,
            &[],
            &CacheMode::Distributed {
                dir: PathBuf::from("/sc"),
                quota: "10G".into(),
            },
            Path::new("/r/foo"),
        );
        let sep = inv.args.iter().position(|a| a == "--").unwrap();
        assert_eq!(inv.args[sep - 1], "/sc:/sccache");
        assert_eq!(
            &inv.args[sep + 1..sep + 4],
            ["SCCACHE_DIR=/sccache", "SCCACHE_CACHE_SIZE=10G", "RUSTC_WRAPPER=/usr/bin/sccache"]
        );
    }
}
