//! Colored output, progress reporting and the durable run log
//!
//! Uses owo-colors for terminal colors and indicatif for spinners. Once
//! [`init_run_log`] has been called every message is also appended to the run
//! log as plain text, with `ERROR:` / `WARNING:` prefixes so the two severities
//! stay distinguishable for tools that read the log afterwards.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
}

static RUN_LOG: OnceLock<RunLog> = OnceLock::new();

/// Open (append) the run log. Later calls are ignored and return the path
/// of the log that is already active.
pub fn init_run_log(path: &Path) -> Result<PathBuf> {
    if let Some(log) = RUN_LOG.get() {
        return Ok(log.path.clone());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open run log: {}", path.display()))?;
    let _ = RUN_LOG.set(RunLog {
        path: path.to_path_buf(),
        file: Mutex::new(file),
    });
    Ok(path.to_path_buf())
}

fn append(line: &str) {
    if let Some(log) = RUN_LOG.get()
        && let Ok(mut file) = log.file.lock()
    {
        // Best effort.
        let _ = writeln!(file, "{}", line);
    }
}

/// Print an action header (blue, bold)
/// Example: "==> Building ripgrep"
pub fn action(message: &str) {
    println!("{} {}", "==>".blue().bold(), message.bold());
    append(message);
}

/// Print an action with package counter (blue, bold)
/// Example: "(1/5) Building ripgrep"
pub fn action_numbered(current: usize, total: usize, message: &str) {
    println!(
        "{} {}",
        format!("({}/{})", current, total).cyan(),
        message.bold()
    );
    append(&format!("({}/{}) {}", current, total, message));
}

/// Print a sub-action (cyan arrow)
/// Example: "  -> signing"
pub fn sub_action(step: &str) {
    println!("  {} {}", "->".cyan(), step);
    append(step);
}

/// Print a detail line (dimmed prefix)
pub fn detail(message: &str) {
    println!("     {}", message.dimmed());
    append(message);
}

/// Print a success message (green)
pub fn success(message: &str) {
    println!("{} {}", "==>".green().bold(), message.green());
    append(message);
}

/// Print an info message (cyan)
pub fn info(message: &str) {
    println!("{} {}", "::".cyan(), message);
    append(message);
}

/// Print a warning message (yellow)
pub fn warning(message: &str) {
    eprintln!("{} {}", "WARNING:".yellow().bold(), message.yellow());
    append(&format!("WARNING: {}", message));
}

/// Print an error message (red)
pub fn error(message: &str) {
    eprintln!("{} {}", "ERROR:".red().bold(), message.red());
    append(&format!("ERROR: {}", message));
}

/// Print a skip message (dimmed)
/// Example: "==> ripgrep is up to date, skipping"
pub fn skip(message: &str) {
    println!("{} {}", "==>".dimmed(), message.dimmed());
    append(message);
}

/// Print an operator prompt (magenta)
pub fn prompt(message: &str) {
    println!("{} {}", "??".magenta().bold(), message);
    append(message);
}

/// Echo one line of build output to the status log only
pub fn echo(stream: &str, line: &str) {
    append(&format!("[{}] {}", stream, line));
}

/// Print one row of the package state table
pub fn state_row(name: &str, state: &str) {
    println!("    {:40}: {}", name, state);
    append(&format!("    {:40}: {}", name, state));
}

/// Create a simple spinner for operations
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("     {spinner:.cyan} {msg}")
            .unwrap()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Finish a progress bar with a success message
pub fn progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{}", message.green()));
}

/// Finish a progress bar with a failure message
pub fn progress_fail(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{}", message.red()));
}
