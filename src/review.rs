//! Recipe review checkpoints
//!
//! Hashes of every recipe are captured once before the pipeline starts.
//! A package with `auto_review` whose recipe still matches its baseline is
//! approved without opening the editor.

use crate::core::output;
use crate::package::Package;
use crate::probe::recipe::{DESCRIPTOR_FILE, RecipeResolver, install_script};
use crate::prompt::{Prompter, ReviewAction, ask_until};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;

/// Opens a file of a recipe directory for the operator.
pub trait Editor {
    fn open(&self, dir: &Path, file: &str) -> Result<()>;
}

/// Result of one review checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    Approved,
    Rejected,
    Forced,
    Back,
    Aborted,
    /// The editor could not be run
    EditorFailed,
}

/// Recipe hashes taken at the start of the run
#[derive(Debug, Clone, Default)]
pub struct BaselineHashes {
    hashes: HashMap<String, blake3::Hash>,
}

fn hash_file(path: &Path) -> Option<blake3::Hash> {
    std::fs::read(path).ok().map(|bytes| blake3::hash(&bytes))
}

impl BaselineHashes {
    /// Hash the descriptor of every package that has one.
    pub fn capture(packages: &[Package], dirs: &Path) -> Self {
        let hashes = packages
            .iter()
            .filter_map(|pkg| {
                hash_file(&pkg.recipe_dir(dirs).join(DESCRIPTOR_FILE))
                    .map(|h| (pkg.name.clone(), h))
            })
            .collect();
        BaselineHashes { hashes }
    }

    /// True when the recipe exists and matches its baseline.
    pub fn unchanged(&self, pkg: &Package, dirs: &Path) -> bool {
        match (
            self.hashes.get(&pkg.name),
            hash_file(&pkg.recipe_dir(dirs).join(DESCRIPTOR_FILE)),
        ) {
            (Some(before), Some(now)) => *before == now,
            _ => false,
        }
    }
}

pub struct ReviewGate<'a> {
    pub editor: &'a dyn Editor,
    pub prompter: &'a dyn Prompter,
    pub baseline: &'a BaselineHashes,
}

impl ReviewGate<'_> {
    fn examine(&self, pkg: &Package, dir: &Path, file: &str, label: &str) -> Result<ReviewOutcome> {
        loop {
            output::detail(&format!("Checking {} for \"{}\"...", label, pkg.name));
            if let Err(e) = self.editor.open(dir, file) {
                output::error(&format!(
                    "Failed checking {} for \"{}\": {:#}",
                    label, pkg.name, e
                ));
                return Ok(ReviewOutcome::EditorFailed);
            }
            let question = format!("{} okay? {}", label, ReviewAction::CHOICES);
            let outcome = match ask_until(self.prompter, &question, ReviewAction::parse)? {
                ReviewAction::Approve => ReviewOutcome::Approved,
                ReviewAction::Reject => ReviewOutcome::Rejected,
                ReviewAction::Reexamine => {
                    output::detail(&format!("User will check {} again", label));
                    continue;
                }
                ReviewAction::Abort => ReviewOutcome::Aborted,
                ReviewAction::Force => ReviewOutcome::Forced,
                ReviewAction::Back => ReviewOutcome::Back,
            };
            match outcome {
                ReviewOutcome::Approved => output::info(&format!("User decided {} is ok", label)),
                ReviewOutcome::Rejected => {
                    output::info(&format!("User decided {} is not ok", label))
                }
                _ => {}
            }
            return Ok(outcome);
        }
    }

    /// Review the build descriptor of `pkg`.
    pub fn review_recipe(&self, pkg: &Package, dirs: &Path) -> Result<ReviewOutcome> {
        if pkg.auto_review && self.baseline.unchanged(pkg, dirs) {
            output::skip(&format!(
                "{} for \"{}\" unchanged, approving",
                DESCRIPTOR_FILE, pkg.name
            ));
            return Ok(ReviewOutcome::Approved);
        }
        self.examine(pkg, &pkg.recipe_dir(dirs), DESCRIPTOR_FILE, DESCRIPTOR_FILE)
    }

    /// Review the post-install script `pkg` declares, if any.
    pub fn review_install_script(
        &self,
        resolver: &dyn RecipeResolver,
        pkg: &Package,
        dirs: &Path,
    ) -> Result<ReviewOutcome> {
        let dir = pkg.recipe_dir(dirs);
        let Some(script) = install_script(resolver, &dir, &pkg.name)? else {
            return Ok(ReviewOutcome::Approved);
        };
        self.examine(pkg, &dir, &script, &format!("install script \"{}\"", script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeEditor {
        fail: bool,
        opened: RefCell<Vec<String>>,
    }

    impl Editor for FakeEditor {
        fn open(&self, _dir: &Path, file: &str) -> Result<()> {
            self.opened.borrow_mut().push(file.to_string());
            if self.fail {
                anyhow::bail!("editor exited with 1");
            }
            Ok(())
        }
    }

    struct Answers(RefCell<VecDeque<&'static str>>);

    impl Prompter for Answers {
        fn ask(&self, _message: &str) -> Result<String> {
            self.0
                .borrow_mut()
                .pop_front()
                .map(str::to_string)
                .ok_or_else(|| anyhow::anyhow!("no more input"))
        }
    }

    fn answers(a: &[&'static str]) -> Answers {
        Answers(RefCell::new(a.iter().copied().collect()))
    }

    struct Fields(&'static str);

    impl RecipeResolver for Fields {
        fn resolve_only(&self, _dir: &Path) -> Result<()> {
            Ok(())
        }
        fn descriptor_fields(&self, _dir: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn recipe(dirs: &Path, name: &str, body: &str) -> Package {
        std::fs::create_dir_all(dirs.join(name)).unwrap();
        std::fs::write(dirs.join(name).join(DESCRIPTOR_FILE), body).unwrap();
        Package::new(name)
    }

    #[test]
    fn test_auto_review_unchanged_skips_editor() {
        let dir = TempDir::new().unwrap();
        let mut pkg = recipe(dir.path(), "foo", "pkgver=1\n");
        pkg.auto_review = true;
        let baseline = BaselineHashes::capture(std::slice::from_ref(&pkg), dir.path());
        let editor = FakeEditor::default();
        let prompter = answers(&[]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        assert_eq!(gate.review_recipe(&pkg, dir.path()).unwrap(), ReviewOutcome::Approved);
        assert!(editor.opened.borrow().is_empty());
    }

    #[test]
    fn test_auto_review_changed_opens_editor() {
        let dir = TempDir::new().unwrap();
        let mut pkg = recipe(dir.path(), "foo", "pkgver=1\n");
        pkg.auto_review = true;
        let baseline = BaselineHashes::capture(std::slice::from_ref(&pkg), dir.path());
        std::fs::write(dir.path().join("foo").join(DESCRIPTOR_FILE), "pkgver=2\n").unwrap();

        let editor = FakeEditor::default();
        let prompter = answers(&["n"]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        assert_eq!(gate.review_recipe(&pkg, dir.path()).unwrap(), ReviewOutcome::Rejected);
        assert_eq!(editor.opened.borrow().as_slice(), ["PKGBUILD"]);
    }

    #[test]
    fn test_check_again_reopens_editor() {
        let dir = TempDir::new().unwrap();
        let pkg = recipe(dir.path(), "foo", "x");
        let baseline = BaselineHashes::default();
        let editor = FakeEditor::default();
        let prompter = answers(&["c", "?", "f"]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        assert_eq!(gate.review_recipe(&pkg, dir.path()).unwrap(), ReviewOutcome::Forced);
        assert_eq!(editor.opened.borrow().len(), 2);
    }

    #[test]
    fn test_editor_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let pkg = recipe(dir.path(), "foo", "x");
        let baseline = BaselineHashes::default();
        let editor = FakeEditor {
            fail: true,
            ..Default::default()
        };
        let prompter = answers(&[]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        assert_eq!(gate.review_recipe(&pkg, dir.path()).unwrap(), ReviewOutcome::EditorFailed);
    }

    #[test]
    fn test_install_script_reviewed_when_declared() {
        let dir = TempDir::new().unwrap();
        let pkg = recipe(dir.path(), "foo", "x");
        let baseline = BaselineHashes::default();
        let editor = FakeEditor::default();
        let prompter = answers(&["b"]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        let outcome = gate
            .review_install_script(&Fields("pkgver=1\npkgrel=1\ninstall=foo.install\n"), &pkg, dir.path())
            .unwrap();
        assert_eq!(outcome, ReviewOutcome::Back);
        assert_eq!(editor.opened.borrow().as_slice(), ["foo.install"]);
    }

    #[test]
    fn test_no_install_script_approves() {
        let dir = TempDir::new().unwrap();
        let pkg = recipe(dir.path(), "foo", "x");
        let baseline = BaselineHashes::default();
        let editor = FakeEditor::default();
        let prompter = answers(&[]);
        let gate = ReviewGate {
            editor: &editor,
            prompter: &prompter,
            baseline: &baseline,
        };
        let outcome = gate
            .review_install_script(&Fields("pkgver=1\npkgrel=1\ninstall=\n"), &pkg, dir.path())
            .unwrap();
        assert_eq!(outcome, ReviewOutcome::Approved);
        assert!(editor.opened.borrow().is_empty());
    }
}
