//! Build archive access
//!
//! Read-only view of a repository of published builds. The directory
//! layout is:
//!
//! ```text
//! groups.json                       ["group-a", "group-b"]
//! <group>/metadata.json             {"Files": [..], "Builds": [..], "Missing": {..}}
//! <group>/builds/<GUID>/<file>      build artifacts
//! ```
//!
//! Author: Moroya Sakamoto

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::dump::Snapshot;
use crate::error::{Error, Result};
use crate::version::Version;

/// A published build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    /// Archive group holding the build's files; not part of its identity
    pub group: String,
    /// Stable build identifier (`version-0123456789abcdef`)
    pub guid: String,
    pub date: DateTime<Utc>,
    pub version: Version,
}

impl Build {
    pub fn new(guid: &str, date: DateTime<Utc>) -> Self {
        Self {
            group: String::new(),
            guid: String::from(guid),
            date,
            version: Version::default(),
        }
    }

    pub fn with_group(mut self, group: &str) -> Self {
        self.group = String::from(group);
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }
}

/// Source of builds and their files
pub trait Archive {
    /// Every build, ordered by date
    fn builds(&self) -> Result<Vec<Build>>;

    /// Whether the archive claims `name` exists for `build`. Answered from
    /// metadata only.
    fn exists(&self, build: &Build, name: &str) -> bool;

    /// Open a file of a build. `Ok(None)` when the file is absent; an error
    /// only when a present file cannot be read.
    fn open(&self, build: &Build, name: &str) -> Result<Option<Box<dyn Read + '_>>>;
}

// ── Directory archive ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawMetadata {
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    builds: Vec<RawBuild>,
    #[serde(default)]
    missing: HashMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawBuild {
    #[serde(rename = "GUID")]
    guid: String,
    #[serde(rename = "Date")]
    date: DateTime<Utc>,
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Debug)]
struct Group {
    files: Vec<String>,
    builds: Vec<Build>,
    missing: HashMap<String, Vec<String>>,
}

/// Archive laid out in a local directory
#[derive(Debug)]
pub struct DirArchive {
    root: PathBuf,
    groups: Vec<String>,
    metadata: HashMap<String, Group>,
    latest: Option<Build>,
}

impl DirArchive {
    /// Read all archive metadata under `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let groups: Vec<String> = read_json(&root.join("groups.json"))?;

        let mut metadata = HashMap::with_capacity(groups.len());
        let mut latest: Option<Build> = None;
        for group in &groups {
            let path = root.join(group).join("metadata.json");
            let raw: RawMetadata = read_json(&path)?;
            let mut builds = Vec::with_capacity(raw.builds.len());
            for b in raw.builds {
                let version = b.version.parse::<Version>().map_err(|e| {
                    Error::Archive(format!("{}: build {}: {e}", path.display(), b.guid))
                })?;
                let build = Build {
                    group: group.clone(),
                    guid: b.guid,
                    date: b.date,
                    version,
                };
                if latest.as_ref().map_or(true, |l| build.date > l.date) {
                    latest = Some(build.clone());
                }
                builds.push(build);
            }
            debug!(group = %group, builds = builds.len(), "loaded group metadata");
            metadata.insert(
                group.clone(),
                Group {
                    files: raw.files,
                    builds,
                    missing: raw.missing,
                },
            );
        }

        Ok(Self {
            root,
            groups,
            metadata,
            latest,
        })
    }

    /// Newest build over all groups
    pub fn latest(&self) -> Option<&Build> {
        self.latest.as_ref()
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    fn file_path(&self, build: &Build, name: &str) -> PathBuf {
        self.root
            .join(&build.group)
            .join("builds")
            .join(&build.guid)
            .join(name)
    }
}

impl Archive for DirArchive {
    fn builds(&self) -> Result<Vec<Build>> {
        let mut builds: Vec<Build> = self
            .groups
            .iter()
            .filter_map(|g| self.metadata.get(g))
            .flat_map(|md| md.builds.iter().cloned())
            .collect();
        builds.sort_by_key(|b| b.date);
        Ok(builds)
    }

    fn exists(&self, build: &Build, name: &str) -> bool {
        let Some(md) = self.metadata.get(&build.group) else {
            return false;
        };
        if !md.files.iter().any(|f| f == name) {
            return false;
        }
        match md.missing.get(&build.guid) {
            Some(missing) => !missing.iter().any(|f| f == name),
            None => true,
        }
    }

    fn open(&self, build: &Build, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        if !self.exists(build, name) {
            return Ok(None);
        }
        match File::open(self.file_path(build, name)) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .map_err(|e| Error::Archive(format!("open {}: {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| Error::Archive(format!("decode {}: {e}", path.display())))
}

// ── In-memory archive ──────────────────────────────────────────────────

/// Archive held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    builds: Vec<Build>,
    /// (GUID, file name) -> content
    files: HashMap<(String, String), Vec<u8>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_build(&mut self, build: Build) {
        self.builds.push(build);
    }

    pub fn insert_file(&mut self, guid: &str, name: &str, data: Vec<u8>) {
        self.files
            .insert((String::from(guid), String::from(name)), data);
    }

    /// Store `snapshot` as the JSON artifact `name` of build `guid`
    pub fn insert_snapshot(&mut self, guid: &str, name: &str, snapshot: &Snapshot) -> Result<()> {
        self.insert_file(guid, name, snapshot.encode()?);
        Ok(())
    }

    /// Remove a file. Returns `true` if it existed.
    pub fn remove_file(&mut self, guid: &str, name: &str) -> bool {
        self.files
            .remove(&(String::from(guid), String::from(name)))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

impl Archive for MemoryArchive {
    fn builds(&self) -> Result<Vec<Build>> {
        let mut builds = self.builds.clone();
        builds.sort_by_key(|b| b.date);
        Ok(builds)
    }

    fn exists(&self, build: &Build, name: &str) -> bool {
        self.files
            .contains_key(&(build.guid.clone(), String::from(name)))
    }

    fn open(&self, build: &Build, name: &str) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(self
            .files
            .get(&(build.guid.clone(), String::from(name)))
            .map(|data| Box::new(io::Cursor::new(data.as_slice())) as Box<dyn Read + '_>))
    }
}
