//! Scripted collaborators shared by the integration tests.

#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use recipe_pipeline::build::{BuildInvocation, BuildRoot, RepoDatabase, Signer};
use recipe_pipeline::package::{Origin, Package};
use recipe_pipeline::probe::{ArchiveLister, RecipeResolver};
use recipe_pipeline::prompt::Prompter;
use recipe_pipeline::review::Editor;
use recipe_pipeline::source::SourceControl;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Git stand-in whose checkouts are always at the upstream tip.
#[derive(Default)]
pub struct FakeScm {
    /// Packages whose fetch always fails
    broken: Vec<String>,
    fetches: RefCell<HashMap<String, u32>>,
}

impl FakeScm {
    pub fn broken(names: &[&str]) -> Self {
        FakeScm {
            broken: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn fetches(&self, name: &str) -> u32 {
        self.fetches.borrow().get(name).copied().unwrap_or(0)
    }
}

impl SourceControl for FakeScm {
    fn clone_repo(&self, url: &str, _dest: &Path) -> Result<()> {
        bail!("unexpected clone of {}", url)
    }
    fn fetch_all(&self, dir: &Path) -> Result<()> {
        let name = dir_name(dir);
        *self.fetches.borrow_mut().entry(name.clone()).or_default() += 1;
        if self.broken.contains(&name) {
            bail!("could not resolve host");
        }
        Ok(())
    }
    fn remotes(&self, _dir: &Path) -> Result<Vec<String>> {
        Ok(vec!["origin".into()])
    }
    fn branch_status(&self, _dir: &Path) -> Result<String> {
        Ok("## master...origin/master".into())
    }
    fn head_hash(&self, _dir: &Path, _rev: Option<&str>) -> Result<String> {
        Ok("0123abcd".into())
    }
    fn pull(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
    fn discard_changes(&self, _dir: &Path) -> Result<()> {
        Ok(())
    }
}

/// Fixed repository listing
pub struct Listing(pub Vec<String>);

impl Listing {
    pub fn of(entries: &[&str]) -> Self {
        Listing(entries.iter().map(|e| e.to_string()).collect())
    }
}

impl ArchiveLister for Listing {
    fn list(&self, _archive: &Path) -> Result<Option<Vec<String>>> {
        Ok(Some(self.0.clone()))
    }
}

/// Resolver answering `pkgver`/`pkgrel` per recipe directory.
#[derive(Default)]
pub struct FakeResolver {
    versions: HashMap<String, (String, String)>,
    pub resolves: RefCell<u32>,
}

impl FakeResolver {
    pub fn with(versions: &[(&str, &str, &str)]) -> Self {
        FakeResolver {
            versions: versions
                .iter()
                .map(|(n, v, r)| (n.to_string(), (v.to_string(), r.to_string())))
                .collect(),
            resolves: RefCell::new(0),
        }
    }
}

impl RecipeResolver for FakeResolver {
    fn resolve_only(&self, _dir: &Path) -> Result<()> {
        *self.resolves.borrow_mut() += 1;
        Ok(())
    }
    fn descriptor_fields(&self, dir: &Path) -> Result<String> {
        let (ver, rel) = self
            .versions
            .get(&dir_name(dir))
            .ok_or_else(|| anyhow!("no PKGBUILD in {}", dir.display()))?;
        Ok(format!("pkgver={}\npkgrel={}\nepoch=\ninstall=\n", ver, rel))
    }
}

pub struct QuietEditor;

impl Editor for QuietEditor {
    fn open(&self, _dir: &Path, _file: &str) -> Result<()> {
        Ok(())
    }
}

/// Answers prompts from a script and remembers every question.
pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    asked: RefCell<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        ScriptedPrompter {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            asked: RefCell::new(Vec::new()),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.borrow().len()
    }

    pub fn count_asked(&self, needle: &str) -> usize {
        self.asked
            .borrow()
            .iter()
            .filter(|q| q.contains(needle))
            .count()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&self, message: &str) -> Result<String> {
        self.asked.borrow_mut().push(message.to_string());
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("EOF at \"{}\"", message))
    }
}

/// Build root running a shell snippet per package.
#[derive(Default)]
pub struct ShellRoot {
    scripts: HashMap<String, String>,
    pub verified: RefCell<Vec<PathBuf>>,
}

impl ShellRoot {
    pub fn with(scripts: &[(&str, &str)]) -> Self {
        ShellRoot {
            scripts: scripts
                .iter()
                .map(|(n, s)| (n.to_string(), s.to_string()))
                .collect(),
            ..Default::default()
        }
    }
}

impl BuildRoot for ShellRoot {
    fn update(&self) -> Result<()> {
        Ok(())
    }
    fn verify_sources(&self, dir: &Path) -> Result<()> {
        self.verified.borrow_mut().push(dir.to_path_buf());
        if dir.join("BAD_SOURCES").exists() {
            bail!("checksum mismatch");
        }
        Ok(())
    }
    fn set_ccache(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }
    fn install_wrappers(&self, _script: &str, _names: &[&str]) -> Result<()> {
        Ok(())
    }
    fn remove_wrappers(&self, _names: &[&str]) -> Result<()> {
        Ok(())
    }
    fn fetch_native(&self, name: &str) -> Result<()> {
        bail!("no network for {}", name)
    }
    fn invocation(&self, pkg: &Package, dir: &Path, _deps: &[PathBuf]) -> BuildInvocation {
        let script = self
            .scripts
            .get(&pkg.name)
            .cloned()
            .unwrap_or_else(|| "true".into());
        BuildInvocation {
            program: "sh".into(),
            args: vec!["-c".into(), script],
            cwd: dir.to_path_buf(),
        }
    }
}

/// Repository database stand-in recording every insertion.
#[derive(Default)]
pub struct RecordingRepo {
    pub added: RefCell<Vec<PathBuf>>,
}

impl RepoDatabase for RecordingRepo {
    fn add(&self, repo: &Path, artifacts: &[PathBuf]) -> Result<()> {
        std::fs::write(repo, "db")?;
        self.added.borrow_mut().extend(artifacts.iter().cloned());
        Ok(())
    }
}

/// Writes a dummy detached signature.
pub struct TouchSigner;

impl Signer for TouchSigner {
    fn sign(&self, file: &Path) -> Result<()> {
        let mut sig = file.as_os_str().to_os_string();
        sig.push(".sig");
        std::fs::write(sig, "sig")?;
        Ok(())
    }
}

/// Create recipe directories for `names` under `dirs`.
pub fn recipes(dirs: &Path, names: &[&str]) -> Vec<Package> {
    names
        .iter()
        .map(|name| {
            let dir = dirs.join(name);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("PKGBUILD"), format!("pkgname={}\n", name)).unwrap();
            let mut pkg = Package::new(name);
            pkg.origin = Origin::Url(format!("https://example.invalid/{}.git", name));
            pkg
        })
        .collect()
}
