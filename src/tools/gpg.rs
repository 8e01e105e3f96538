//! Detached signatures with `gpg`

use crate::build::Signer;
use crate::core::output;
use anyhow::{Context, Result, bail};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Signs with one key from one keyring. The passphrase is fed on fd 0.
pub struct Gpg {
    home: PathBuf,
    key_fp: String,
    passphrase: String,
}

impl Gpg {
    pub fn new(home: impl Into<PathBuf>, key_fp: impl Into<String>, passphrase: String) -> Self {
        Gpg {
            home: home.into(),
            key_fp: key_fp.into(),
            passphrase,
        }
    }

    /// Prove the passphrase works by signing a throwaway file.
    pub fn verify_passphrase(&self) -> Result<()> {
        let mut probe = tempfile::NamedTempFile::new()?;
        probe.write_all(b"Test file content")?;
        probe.flush()?;
        self.sign(probe.path())
            .context("Failed to sign test file with gpg")?;
        let mut signature = probe.path().as_os_str().to_os_string();
        signature.push(".sig");
        let _ = std::fs::remove_file(signature);
        output::success("Verified passphrase works by signing dummy test file");
        Ok(())
    }
}

impl Signer for Gpg {
    fn sign(&self, file: &Path) -> Result<()> {
        let mut child = Command::new("gpg")
            .args(["--batch", "--yes", "--passphrase-fd", "0", "--pinentry-mode", "loopback"])
            .arg("--default-key")
            .arg(&self.key_fp)
            .arg("--detach-sign")
            .arg(file)
            .env("GNUPGHOME", &self.home)
            .stdin(Stdio::piped())
            .spawn()
            .context("Failed to start gpg")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(self.passphrase.as_bytes())
                .context("Failed to pass passphrase to gpg")?;
        }
        let status = child.wait().context("Failed waiting for gpg")?;
        if !status.success() {
            bail!("gpg failed to sign {} ({:?})", file.display(), status.code());
        }
        Ok(())
    }
}
