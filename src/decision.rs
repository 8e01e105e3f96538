//! Rebuild decision
//!
//! [`decide`] is a pure function of the published and candidate versions.
//! [`evaluate`] runs both probes and folds any probe failure into
//! [`Decision::Failed`].

use crate::package::BuildDecision;
use crate::probe::published::{ArchiveLister, Published, probe_published};
use crate::probe::recipe::{CandidateVersion, ProbeMode, RecipeResolver, probe_candidate};
use crate::version::ParsedVersion;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Why a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NeverPublished,
    /// Candidate declares an epoch, the published version does not
    CandidateGainedEpoch,
    /// Published version declares an epoch, the candidate does not
    PublishedHasEpoch,
    NewerEpoch,
    NewerVersion,
    NotNewer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Install(Reason),
    UpToDate(Reason),
    Failed(String),
}

impl Decision {
    pub fn build_decision(&self) -> BuildDecision {
        match self {
            Decision::Install(_) => BuildDecision::Install,
            Decision::UpToDate(_) => BuildDecision::UpToDate,
            Decision::Failed(_) => BuildDecision::Error,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reason::NeverPublished => "not yet in the repository",
            Reason::CandidateGainedEpoch => "recipe introduces an epoch",
            Reason::PublishedHasEpoch => "published version has an epoch the recipe lacks",
            Reason::NewerEpoch => "recipe epoch is newer",
            Reason::NewerVersion => "recipe version is newer",
            Reason::NotNewer => "recipe version is not newer",
        })
    }
}

/// Decide whether `candidate` should replace what is `published`.
pub fn decide(published: &Published, candidate: &CandidateVersion) -> Decision {
    let installed = match published {
        Published::Never => return Decision::Install(Reason::NeverPublished),
        Published::Found(v) => v,
    };

    match (installed.epoch, candidate.epoch) {
        (None, Some(_)) => return Decision::Install(Reason::CandidateGainedEpoch),
        (Some(_), None) => return Decision::UpToDate(Reason::PublishedHasEpoch),
        (Some(i), Some(c)) if i < c => return Decision::Install(Reason::NewerEpoch),
        _ => {}
    }

    let installed = ParsedVersion::parse(&installed.version);
    let candidate = ParsedVersion::parse(&candidate.full());
    match candidate.cmp(&installed) {
        Ordering::Greater => Decision::Install(Reason::NewerVersion),
        Ordering::Less | Ordering::Equal => Decision::UpToDate(Reason::NotNewer),
    }
}

fn describe(published: &Published, candidate: &CandidateVersion) -> String {
    let installed = match published {
        Published::Never => "none".to_string(),
        Published::Found(v) => match v.epoch {
            Some(e) => format!("{}:{}", e, v.version),
            None => v.version.clone(),
        },
    };
    let candidate = match candidate.epoch {
        Some(e) => format!("{}:{}", e, candidate.full()),
        None => candidate.full(),
    };
    format!("published version is {}, recipe version is {}", installed, candidate)
}

/// Everything needed to probe one package
pub struct ProbeContext<'a> {
    pub lister: &'a dyn ArchiveLister,
    pub resolver: &'a dyn RecipeResolver,
    pub repo: &'a Path,
}

/// Probe both versions of a package and decide. Returns the decision plus a
/// human-readable description of the versions involved when both were read.
pub fn evaluate(
    ctx: &ProbeContext<'_>,
    recipe_dir: &Path,
    name: &str,
    published_name: &str,
    mode: ProbeMode,
) -> (Decision, Option<String>) {
    let candidate = match probe_candidate(ctx.resolver, recipe_dir, name, mode) {
        Ok(c) => c,
        Err(e) => return (Decision::Failed(format!("{:#}", e)), None),
    };
    let published = match probe_published(ctx.lister, ctx.repo, published_name) {
        Ok(p) => p,
        Err(e) => return (Decision::Failed(format!("{:#}", e)), None),
    };
    let description = describe(&published, &candidate);
    (decide(&published, &candidate), Some(description))
}
