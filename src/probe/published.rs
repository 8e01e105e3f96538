//! Published repository inspection
//!
//! The repository database is a tar archive (optionally compressed) holding
//! one directory per published package, named
//! `<name>-[<epoch>:]<version>-<release>/`.

use anyhow::{Context, Result};
use regex::Regex;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishedProbeError {
    #[error("failed to get current version from repo for package {0}")]
    Unparseable(String),

    #[error("invalid epoch '{epoch}' for package {name}")]
    InvalidEpoch { name: String, epoch: String },
}

/// Version of the artifact currently published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub epoch: Option<u64>,
    /// `<version>-<release>`
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    /// The listing has no entry for the package at all
    Never,
    Found(PublishedVersion),
}

/// Lists the entry names of a repository archive.
pub trait ArchiveLister {
    /// `Ok(None)` when the archive does not exist.
    fn list(&self, archive: &Path) -> Result<Option<Vec<String>>>;
}

/// Extract the published version of `name` out of an archive listing.
pub fn parse_listing(entries: &[String], name: &str) -> Result<Published, PublishedProbeError> {
    let candidates: Vec<&String> = entries
        .iter()
        .filter(|e| e.contains(name) && e.ends_with('/'))
        .collect();
    if candidates.is_empty() {
        return Ok(Published::Never);
    }

    let pattern = format!(
        r"^{}-(?:(?P<epoch>[0-9]+):)?(?P<version>[^-/: ]*-[0-9]+)/$",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).map_err(|_| PublishedProbeError::Unparseable(name.to_string()))?;

    for entry in candidates {
        if let Some(caps) = re.captures(entry) {
            let epoch = match caps.name("epoch") {
                Some(m) => Some(m.as_str().parse::<u64>().map_err(|_| {
                    PublishedProbeError::InvalidEpoch {
                        name: name.to_string(),
                        epoch: m.as_str().to_string(),
                    }
                })?),
                None => None,
            };
            return Ok(Published::Found(PublishedVersion {
                epoch,
                version: caps["version"].to_string(),
            }));
        }
    }

    Err(PublishedProbeError::Unparseable(name.to_string()))
}

/// Look up the currently published version of `published_name`.
pub fn probe_published(
    lister: &dyn ArchiveLister,
    repo: &Path,
    published_name: &str,
) -> Result<Published> {
    match lister.list(repo)? {
        Some(entries) => Ok(parse_listing(&entries, published_name)?),
        None => Ok(Published::Never),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    Gzip,
    Xz,
    Bzip2,
    Zstd,
    None,
}

/// Detect the compression of an archive from its magic bytes
fn sniff(head: &[u8]) -> Compression {
    if head.starts_with(&[0x1f, 0x8b]) {
        Compression::Gzip
    } else if head.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
        Compression::Xz
    } else if head.starts_with(b"BZh") {
        Compression::Bzip2
    } else if head.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
        Compression::Zstd
    } else {
        Compression::None
    }
}

fn entry_names<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(reader);
    let mut names = Vec::new();
    for entry in archive.entries().context("tar read error")? {
        let entry = entry.context("tar entry error")?;
        let path = entry.path().context("tar path error")?;
        let mut name = path.to_string_lossy().to_string();
        if entry.header().entry_type().is_dir() && !name.ends_with('/') {
            name.push('/');
        }
        names.push(name);
    }
    Ok(names)
}

/// Reads repository archives natively with the `tar` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TarLister;

impl ArchiveLister for TarLister {
    fn list(&self, archive: &Path) -> Result<Option<Vec<String>>> {
        let file = match File::open(archive) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("cannot open {}", archive.display()));
            }
        };
        let mut reader = BufReader::new(file);
        let mut head = [0u8; 6];
        let read = reader.read(&mut head)?;
        reader.seek(SeekFrom::Start(0))?;

        let names = match sniff(&head[..read]) {
            Compression::Gzip => entry_names(flate2::read::GzDecoder::new(reader)),
            Compression::Xz => entry_names(xz2::read::XzDecoder::new(reader)),
            Compression::Bzip2 => entry_names(bzip2::read::BzDecoder::new(reader)),
            Compression::Zstd => entry_names(
                zstd::stream::read::Decoder::new(reader).context("zstd init error")?,
            ),
            Compression::None => entry_names(reader),
        }
        .with_context(|| format!("failed to list {}", archive.display()))?;
        Ok(Some(names))
    }
}
