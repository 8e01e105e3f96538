//! Interactive update pipeline for externally-sourced package recipes
//!
//! Each configured package is a recipe directory (a `PKGBUILD` plus its
//! `.SRCINFO` snapshot) tracked by a git checkout. One run walks the
//! packages in order and for each one:
//!
//! 1. Synchronizes the checkout with its upstream, retrying on failure.
//! 2. Compares the recipe's candidate version against the version already
//!    published in the local repository database.
//! 3. Lets the operator review the recipe (and its install script) in an
//!    editor, and confirm or override the install decision.
//!
//! The operator can step back to an earlier package at any prompt. Once
//! every package is decided, the approved ones are built one after another
//! in an isolated build root, signed, inserted into the repository and
//! moved into the package directory.
//!
//! # Configuration
//!
//! ```toml
//! chroot = "/var/lib/chroots/x86_64"
//! pkg_dir = "/srv/repo/x86_64"
//! repo = "/srv/repo/x86_64/custom.db.tar"
//! gpg_dir = "~/checkingGPG"
//! logs_dir = "~/logs"
//!
//! [[entry]]
//! name = "ion-git"
//! skip_branch_up_to_date = true
//! ```
//!
//! See [`core::config`] for every key.
//!
//! # Signals
//!
//! `SIGINT` while packages are being decided prints every package's state
//! and exits. During the build phase the first `SIGINT` lets the current
//! build finish and skips the rest; a second one exits. `SIGUSR1` prints
//! the state table at any time.

pub mod build;
pub mod core;
pub mod decision;
pub mod package;
pub mod pipeline;
pub mod probe;
pub mod prompt;
pub mod review;
pub mod source;
pub mod supervisor;
pub mod tools;
pub mod version;
