//! Decision pipeline
//!
//! Walks the packages in order. Each visit runs
//! `dir-exists → synchronized → (fast-skip) → reviewed →
//! install-script-reviewed → version-decided → confirmed`
//! and ends in one [`Step`] that moves the [`PipelineCursor`].
//!
//! Revisiting a package after stepping back skips synchronization and the
//! fast-skip check and reuses the decision already computed, but the review
//! and confirmation prompts always run again.

pub mod cursor;

pub use cursor::PipelineCursor;

use crate::core::config::VersionSource;
use crate::core::output;
use crate::decision::{Decision, ProbeContext, evaluate};
use crate::package::{BuildDecision, Origin, Package, ReviewState, RunTable, Verdict};
use crate::probe::{ArchiveLister, ProbeMode, RecipeResolver};
use crate::prompt::{ConfirmAction, Prompter, ask_until};
use crate::review::{BaselineHashes, Editor, ReviewGate, ReviewOutcome};
use crate::source::{SourceControl, SyncStatus, ensure_cloned, synchronize};
use crate::supervisor::{StatusBoard, print_state};
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

/// External collaborators the pipeline drives
pub struct Collaborators<'a> {
    pub scm: &'a dyn SourceControl,
    pub lister: &'a dyn ArchiveLister,
    pub resolver: &'a dyn RecipeResolver,
    pub editor: &'a dyn Editor,
    pub prompter: &'a dyn Prompter,
}

/// Synchronization retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            attempts: 5,
            pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Parent of all recipe directories
    pub dirs: PathBuf,
    /// Published repository database
    pub repo: PathBuf,
    pub version_source: VersionSource,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Every package has a verdict
    Finished,
    /// The operator aborted the run
    Aborted,
}

/// How one visit moves the cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Advance,
    Back,
    Abort,
}

pub struct PipelineController<'a> {
    tools: Collaborators<'a>,
    options: PipelineOptions,
    baseline: BaselineHashes,
    board: StatusBoard,
}

fn verdict_for(decision: BuildDecision) -> Verdict {
    match decision {
        BuildDecision::Install => Verdict::Install,
        BuildDecision::UpToDate => Verdict::UpToDate,
        BuildDecision::Error => Verdict::Error,
        BuildDecision::NotReached => Verdict::NotReached,
    }
}

fn decision_label(decision: BuildDecision) -> &'static str {
    match decision {
        BuildDecision::Install => "install",
        BuildDecision::UpToDate => "up to date",
        BuildDecision::Error => "fail",
        BuildDecision::NotReached => "not reached",
    }
}

impl<'a> PipelineController<'a> {
    pub fn new(
        tools: Collaborators<'a>,
        options: PipelineOptions,
        baseline: BaselineHashes,
        board: StatusBoard,
    ) -> Self {
        PipelineController {
            tools,
            options,
            baseline,
            board,
        }
    }

    /// Walk every package of `table` until each has a verdict or the operator
    /// aborts.
    pub fn run(&self, table: &mut RunTable) -> PipelineOutcome {
        let mut cursor = PipelineCursor::new();
        while !cursor.is_done(table.len()) {
            self.board.publish(table);
            let index = cursor.index();
            output::action_numbered(index + 1, table.len(), &table.package(index).name);

            let step = self
                .visit(table, index, cursor.is_revisit())
                .unwrap_or_else(|e| {
                    output::error(&format!("{:#}", e));
                    Step::Abort
                });
            match step {
                Step::Advance => cursor.advance(),
                Step::Back => cursor.back(),
                Step::Abort => {
                    self.board.publish(table);
                    print_state(table);
                    return PipelineOutcome::Aborted;
                }
            }
        }
        self.board.publish(table);
        PipelineOutcome::Finished
    }

    fn visit(&self, table: &mut RunTable, index: usize, revisit: bool) -> Result<Step> {
        let pkg = table.package(index).clone();
        let state = table.state(index);
        // A package that never got past synchronization starts over.
        let revisit =
            revisit && !(state.verdict == Verdict::Error && state.review == ReviewState::NotReached);
        let mut reuse_decision = revisit && state.decision != BuildDecision::NotReached;

        if !revisit {
            table.state_mut(index).recheck();
            match self.synchronize_with_retries(&pkg) {
                Err(e) => {
                    output::error(&format!("{:#}", e));
                    table.state_mut(index).verdict = Verdict::Error;
                    return Ok(Step::Advance);
                }
                Ok(SyncStatus::AlreadyCurrent) => {
                    match self.decide(&pkg, ProbeMode::Snapshot) {
                        Decision::Install(_) => {
                            table.state_mut(index).decision = BuildDecision::Install;
                            reuse_decision = true;
                        }
                        Decision::UpToDate(_) => {
                            output::skip(&format!("Pkg {} is up to date, skipping...", pkg.name));
                            let state = table.state_mut(index);
                            state.decision = BuildDecision::UpToDate;
                            state.verdict = Verdict::UpToDate;
                            return Ok(Step::Advance);
                        }
                        Decision::Failed(_) => {
                            let state = table.state_mut(index);
                            state.decision = BuildDecision::Error;
                            state.verdict = Verdict::Error;
                            return Ok(Step::Advance);
                        }
                    }
                }
                Ok(SyncStatus::Updated) => {}
            }
        }

        let gate = ReviewGate {
            editor: self.tools.editor,
            prompter: self.tools.prompter,
            baseline: &self.baseline,
        };

        let outcome = gate.review_recipe(&pkg, &self.options.dirs)?;
        if let Some(step) = Self::apply_review(table, index, outcome) {
            return Ok(step);
        }

        match gate.review_install_script(self.tools.resolver, &pkg, &self.options.dirs) {
            Ok(outcome) => {
                if let Some(step) = Self::apply_review(table, index, outcome) {
                    return Ok(step);
                }
            }
            Err(e) => {
                output::error(&format!(
                    "Failed to get install script of \"{}\": {:#}",
                    pkg.name, e
                ));
                let state = table.state_mut(index);
                state.review = ReviewState::Error;
                state.verdict = Verdict::Error;
                return Ok(Step::Advance);
            }
        }

        loop {
            if !reuse_decision {
                let mode = match self.options.version_source {
                    VersionSource::Ask => self.tools.prompter.choose_source(&pkg.name)?,
                    VersionSource::Snapshot => ProbeMode::Snapshot,
                    VersionSource::Resolve => ProbeMode::Resolve,
                };
                table.state_mut(index).decision = self.decide(&pkg, mode).build_decision();
                reuse_decision = true;
            }
            let decision = table.state(index).decision;

            let question = format!(
                "Got \"{}\" for pkg \"{}\", action: {}",
                decision_label(decision),
                pkg.name,
                ConfirmAction::CHOICES
            );
            let state = table.state_mut(index);
            match ask_until(self.tools.prompter, &question, ConfirmAction::parse)? {
                ConfirmAction::Continue => {
                    state.verdict = verdict_for(decision);
                    return Ok(Step::Advance);
                }
                ConfirmAction::Recheck => {
                    state.recheck();
                    reuse_decision = false;
                }
                ConfirmAction::Force => {
                    state.verdict = Verdict::Install;
                    return Ok(Step::Advance);
                }
                ConfirmAction::Skip => {
                    state.verdict = Verdict::Skip;
                    return Ok(Step::Advance);
                }
                ConfirmAction::Back => return Ok(Step::Back),
                ConfirmAction::Abort => return Ok(Step::Abort),
            }
        }
    }

    /// Record a review outcome. `None` means the visit goes on.
    fn apply_review(table: &mut RunTable, index: usize, outcome: ReviewOutcome) -> Option<Step> {
        let state = table.state_mut(index);
        match outcome {
            ReviewOutcome::Approved => {
                state.review = ReviewState::Ok;
                None
            }
            ReviewOutcome::Rejected => {
                state.review = ReviewState::Skip;
                state.verdict = Verdict::Skip;
                Some(Step::Advance)
            }
            ReviewOutcome::Forced => {
                state.review = ReviewState::Ok;
                state.verdict = Verdict::Install;
                Some(Step::Advance)
            }
            ReviewOutcome::Back => Some(Step::Back),
            ReviewOutcome::Aborted => Some(Step::Abort),
            ReviewOutcome::EditorFailed => {
                state.review = ReviewState::Error;
                Some(Step::Abort)
            }
        }
    }

    fn sync_once(&self, pkg: &Package) -> Result<SyncStatus> {
        ensure_cloned(self.tools.scm, pkg, &self.options.dirs)?;
        synchronize(self.tools.scm, pkg, &self.options.dirs)
    }

    fn synchronize_with_retries(&self, pkg: &Package) -> Result<SyncStatus> {
        if pkg.origin == Origin::LocalOnly {
            ensure_cloned(self.tools.scm, pkg, &self.options.dirs)?;
            return Ok(SyncStatus::Updated);
        }

        let attempts = self.options.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.sync_once(pkg) {
                Ok(status) => return Ok(status),
                Err(e) if attempt >= attempts => {
                    return Err(e.context(format!("Failed to update pkg dir for \"{}\"", pkg.name)));
                }
                Err(e) => {
                    output::warning(&format!(
                        "Attempt {}/{} for \"{}\" failed: {:#}",
                        attempt, attempts, pkg.name, e
                    ));
                    std::thread::sleep(self.options.retry.pause);
                    attempt += 1;
                }
            }
        }
    }

    fn decide(&self, pkg: &Package, mode: ProbeMode) -> Decision {
        let ctx = ProbeContext {
            lister: self.tools.lister,
            resolver: self.tools.resolver,
            repo: &self.options.repo,
        };
        let (decision, description) = evaluate(
            &ctx,
            &pkg.recipe_dir(&self.options.dirs),
            &pkg.name,
            &pkg.published_name,
            mode,
        );
        if let Some(description) = description {
            output::detail(&description);
        }
        match &decision {
            Decision::Install(reason) => output::info(&format!(
                "Current installed version of \"{}\" is out of date ({}).",
                pkg.published_name, reason
            )),
            Decision::UpToDate(reason) => output::info(&format!(
                "Current installed version of \"{}\" is up to date ({}).",
                pkg.published_name, reason
            )),
            Decision::Failed(msg) => output::error(&format!(
                "Failed to get pkg_version of \"{}\": {}",
                pkg.published_name, msg
            )),
        }
        decision
    }
}

/// Show the state table and, when anything is to be built, ask for the final
/// go-ahead. `Ok(false)` means nothing will be built.
pub fn confirm_builds(prompter: &dyn Prompter, table: &RunTable) -> Result<bool> {
    output::action("Showing current actions:");
    print_state(table);
    if table.to_build().is_empty() {
        output::info("No packages to update, done.");
        return Ok(false);
    }
    if prompter.confirm("Continue?")? {
        Ok(true)
    } else {
        output::info("Canceled.");
        Ok(false)
    }
}
