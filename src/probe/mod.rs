//! Version probes
//!
//! - [`recipe`]: candidate version of a recipe HEAD
//! - [`published`]: version currently in the published repository

pub mod published;
pub mod recipe;

pub use published::{
    ArchiveLister, Published, PublishedProbeError, PublishedVersion, TarLister, probe_published,
};
pub use recipe::{
    CandidateVersion, ProbeMode, RecipeResolver, VersionProbeError, install_script,
    probe_candidate,
};
