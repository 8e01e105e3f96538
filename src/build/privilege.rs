//! Elevated privilege renewal for the build phase

use crate::core::output;
use crate::core::runtime::runtime;
use anyhow::{Context, Result, bail};
use std::process::Command;
use std::time::Duration;

pub const RENEW_INTERVAL: Duration = Duration::from_secs(120);

/// Background renewal task; stops when dropped.
#[derive(Debug)]
pub struct KeepAlive {
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Run `program args…` once and keep re-running it every `interval`.
pub fn keep_alive_with(program: &str, args: &[&str], interval: Duration) -> Result<KeepAlive> {
    output::detail(&format!("{} {}", program, args.join(" ")));
    let status = Command::new(program)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", program))?;
    if !status.success() {
        bail!("Failed to get sudo privileges");
    }

    let program = program.to_string();
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    let handle = runtime().spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let renewed = tokio::process::Command::new(&program)
                .args(&args)
                .status()
                .await;
            if !matches!(renewed, Ok(s) if s.success()) {
                output::warning("Failed to renew sudo privileges");
            }
        }
    });
    Ok(KeepAlive { handle })
}

/// `sudo -v` now and every two minutes until the guard is dropped.
pub fn keep_alive() -> Result<KeepAlive> {
    keep_alive_with("sudo", &["-v"], RENEW_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_failure_is_error() {
        assert!(keep_alive_with("false", &[], Duration::from_secs(60)).is_err());
    }

    #[test]
    fn test_renewal_task_runs_until_dropped() {
        let guard = keep_alive_with("true", &[], Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(!guard.handle.is_finished());
        drop(guard);
    }
}
