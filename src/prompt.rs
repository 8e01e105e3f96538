//! Operator prompts
//!
//! The pipeline only sees the [`Prompter`] trait and the parsed action
//! enums. [`TerminalPrompter`] reads the answers with `dialoguer`.

use crate::core::output;
use crate::probe::ProbeMode;
use anyhow::{Context, Result};
use dialoguer::Input;

/// Source of operator answers
pub trait Prompter {
    /// Show `message` and read one line of input.
    fn ask(&self, message: &str) -> Result<String>;

    /// Ask which retrieval mode to use for the version of `name`.
    fn choose_source(&self, name: &str) -> Result<ProbeMode> {
        loop {
            output::prompt("Use .SRCINFO or directly parse PKGBUILD?");
            match self
                .ask(&format!("\"{}\": 1 for .SRCINFO, 2 for PKGBUILD", name))?
                .trim()
            {
                "1" => return Ok(ProbeMode::Snapshot),
                "2" => return Ok(ProbeMode::Resolve),
                _ => continue,
            }
        }
    }

    /// Yes/no question defaulting to yes.
    fn confirm(&self, message: &str) -> Result<bool> {
        loop {
            let answer = self.ask(&format!("{} [Y/n]", message))?;
            match answer.trim().to_lowercase().as_str() {
                "" | "y" => return Ok(true),
                "n" => return Ok(false),
                _ => output::error("User gave invalid input..."),
            }
        }
    }
}

/// Answer at a recipe or install-script review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewAction {
    Approve,
    Reject,
    /// Open the file again
    Reexamine,
    Abort,
    Force,
    Back,
}

impl ReviewAction {
    pub const CHOICES: &'static str = "[Y/n/c(heck again)/a(bort)/f(orce build)/b(ack)]";

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "" | "y" => Some(ReviewAction::Approve),
            "n" => Some(ReviewAction::Reject),
            "c" => Some(ReviewAction::Reexamine),
            "a" => Some(ReviewAction::Abort),
            "f" => Some(ReviewAction::Force),
            "b" => Some(ReviewAction::Back),
            _ => None,
        }
    }
}

/// Answer at the per-package decision confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    Continue,
    Recheck,
    Force,
    Skip,
    Back,
    Abort,
}

impl ConfirmAction {
    pub const CHOICES: &'static str =
        "[C(ontinue), r(echeck), f(orce build), s(kip), b(ack), a(bort)]";

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "" | "c" => Some(ConfirmAction::Continue),
            "r" => Some(ConfirmAction::Recheck),
            "f" => Some(ConfirmAction::Force),
            "s" => Some(ConfirmAction::Skip),
            "b" => Some(ConfirmAction::Back),
            "a" => Some(ConfirmAction::Abort),
            _ => None,
        }
    }
}

/// Ask until the answer parses.
pub fn ask_until<T>(
    prompter: &dyn Prompter,
    message: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    loop {
        let answer = prompter.ask(message)?;
        if let Some(action) = parse(&answer) {
            return Ok(action);
        }
        output::error("User gave invalid input...");
    }
}

/// Interactive prompter on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn ask(&self, message: &str) -> Result<String> {
        output::prompt(message);
        let answer: String = Input::new()
            .with_prompt(">")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read operator input")?;
        output::echo("input", &answer);
        Ok(answer)
    }
}
