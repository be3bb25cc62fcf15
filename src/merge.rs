//! History merge engine
//!
//! Folds every build of an archive into a fresh history, reusing a stored
//! history as a cache. Builds the stored history already covers are not
//! fetched again: their snapshots are rebuilt by replaying the stored
//! history with a [`Cursor`], re-diffed, and checked against what was
//! recorded. Everything else is fetched from the archive and decoded.
//!
//! The result is always a brand-new [`Root`]; the stored one is only read.
//!
//! Author: Moroya Sakamoto

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::archive::{Archive, Build, DirArchive};
use crate::codec;
use crate::cursor::Cursor;
use crate::diff::{self, Action};
use crate::dump::Snapshot;
use crate::error::{Error, Result};
use crate::history::{Root, UpdateId};
use crate::tags;

/// Artifact holding the complete API dump of a build
pub const FULL_API_DUMP: &str = "Full-API-Dump.json";
/// Artifact holding the API dump without defaults
pub const API_DUMP: &str = "API-Dump.json";

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Updates in the stored history
    pub stored: usize,
    /// Builds fetched from the archive and decoded
    pub fetched: usize,
    /// Builds rebuilt from the stored history
    pub replayed: usize,
    /// GUIDs of builds whose dump was missing or undecodable
    pub skipped: Vec<String>,
    /// GUIDs of stored updates the archive no longer offers
    pub dropped: Vec<String>,
    /// Actions appended over all updates
    pub actions: usize,
    /// Tag spellings rewritten by normalization
    pub normalized_tags: usize,
}

/// Merge result
#[derive(Debug)]
pub struct MergeResult {
    pub root: Root,
    pub report: MergeReport,
}

// ── Build Selection ────────────────────────────────────────────────────

fn has_api<A: Archive + ?Sized>(archive: &A, build: &Build) -> bool {
    archive.exists(build, FULL_API_DUMP) || archive.exists(build, API_DUMP)
}

/// Drop builds without any API dump, and of builds sharing a GUID keep
/// only the latest. `builds` must be ordered by date; so is the result.
pub fn filter_builds<A: Archive + ?Sized>(archive: &A, builds: Vec<Build>) -> Vec<Build> {
    let mut seen = HashSet::new();
    let mut kept: Vec<Build> = builds
        .into_iter()
        .filter(|b| has_api(archive, b))
        .rev()
        .filter(|b| seen.insert(b.guid.clone()))
        .collect();
    kept.reverse();
    kept
}

/// Canonical order of actions within one build: by element group, primary
/// and secondary id, then Remove before Change before Add, then element
/// and first field name.
pub fn sort_actions(actions: &mut [Action]) {
    fn first_field(action: &Action) -> Option<&str> {
        action.fields.keys().next().map(String::as_str)
    }
    actions.sort_by(|a, b| {
        a.element
            .group()
            .cmp(&b.element.group())
            .then_with(|| a.primary.cmp(&b.primary))
            .then_with(|| a.secondary.cmp(&b.secondary))
            .then_with(|| a.kind.cmp(&b.kind))
            .then_with(|| a.element.cmp(&b.element))
            .then_with(|| first_field(a).cmp(&first_field(b)))
    });
}

/// Fetch and decode the API dump of `build`, preferring the full dump.
/// `None` when the build has to be skipped.
fn fetch<A: Archive + ?Sized>(archive: &A, build: &Build) -> Result<Option<Snapshot>> {
    let name = if archive.exists(build, FULL_API_DUMP) {
        FULL_API_DUMP
    } else if archive.exists(build, API_DUMP) {
        API_DUMP
    } else {
        warn!(guid = %build.guid, "no api dump");
        return Ok(None);
    };
    info!(guid = %build.guid, file = name, "fetching");
    let Some(reader) = archive.open(build, name)? else {
        warn!(guid = %build.guid, file = name, "api dump missing from archive");
        return Ok(None);
    };
    match Snapshot::decode(reader) {
        Ok(dump) => Ok(Some(dump)),
        Err(e) => {
            warn!(guid = %build.guid, file = name, error = %e, "bad api dump");
            Ok(None)
        }
    }
}

// ── Merge ──────────────────────────────────────────────────────────────

/// One build to fold in, with the stored update to rebuild it from
struct Plan {
    build: Build,
    replay: Option<UpdateId>,
}

/// Fold every build of `archive` into a new history, using `stored` as a
/// cache.
///
/// A build recorded in `stored` with a date not older than the archive's
/// is rebuilt by replay and keeps its recorded date and version. When its
/// predecessor in this merge is the same update it was recorded after, the
/// re-diffed action count must match the record, otherwise the merge fails
/// with [`Error::Inconsistent`].
pub fn merge_history<A: Archive + ?Sized>(archive: &A, stored: &Root) -> Result<MergeResult> {
    let mut report = MergeReport {
        stored: stored.updates().len(),
        ..MergeReport::default()
    };
    info!(updates = report.stored, "loaded stored history");

    let recorded: HashMap<&str, UpdateId> = stored
        .updates()
        .iter()
        .enumerate()
        .map(|(i, u)| (u.guid.as_str(), UpdateId(i)))
        .collect();

    let builds = filter_builds(archive, archive.builds()?);
    let mut planned = HashSet::with_capacity(builds.len());
    let mut plans = Vec::with_capacity(builds.len());
    for build in builds {
        planned.insert(build.guid.clone());
        let replay = recorded.get(build.guid.as_str()).copied().filter(|id| {
            let update = &stored.updates()[id.0];
            if update.date < build.date {
                debug!(guid = %build.guid, "recorded build was republished");
                return false;
            }
            true
        });
        let build = match replay.and_then(|id| stored.update(id)) {
            Some(update) => Build {
                date: update.date,
                version: update.version,
                ..build
            },
            None => build,
        };
        plans.push(Plan { build, replay });
    }
    plans.sort_by_key(|p| p.build.date);

    for update in stored.updates() {
        if !planned.contains(&update.guid) {
            warn!(guid = %update.guid, "recorded build not in archive, dropping");
            report.dropped.push(update.guid.clone());
        }
    }

    let mut cursor = Cursor::new();
    let mut root = Root::new();
    let mut prev: Option<Snapshot> = None;
    let mut prev_replay: Option<UpdateId> = None;
    for plan in plans {
        let guid = plan.build.guid.as_str();
        let next = match plan.replay {
            Some(id) => {
                if !cursor.roll(stored, id) {
                    return Err(Error::Detached {
                        guid: String::from(guid),
                    });
                }
                debug!(guid, "rolled to recorded build");
                report.replayed += 1;
                cursor.dump().clone()
            }
            None => match fetch(archive, &plan.build)? {
                Some(dump) => {
                    report.fetched += 1;
                    dump
                }
                None => {
                    report.skipped.push(String::from(guid));
                    continue;
                }
            },
        };

        let mut actions = diff::diff(prev.as_ref(), &next);
        sort_actions(&mut actions);

        if let Some(id) = plan.replay {
            verify(stored, id, root.updates().is_empty(), prev_replay, guid, &actions)?;
        }

        let count = actions.len();
        root.append_update(&plan.build, actions, prev.as_ref());
        info!(guid, actions = count, "appended update");
        report.actions += count;

        prev = Some(next);
        prev_replay = plan.replay;
    }

    info!(
        updates = root.updates().len(),
        fetched = report.fetched,
        replayed = report.replayed,
        skipped = report.skipped.len(),
        "merged history"
    );
    Ok(MergeResult { root, report })
}

/// Check a re-diffed recorded build against its record, when it was diffed
/// against the same baseline both times.
fn verify(
    stored: &Root,
    id: UpdateId,
    first: bool,
    prev_replay: Option<UpdateId>,
    guid: &str,
    actions: &[Action],
) -> Result<()> {
    let Some(update) = stored.update(id) else {
        return Ok(());
    };
    let same_baseline = match update.prev {
        None => first,
        Some(p) => !first && prev_replay == Some(p),
    };
    if !same_baseline {
        debug!(guid, "baseline changed, not verifying");
        return Ok(());
    }
    if update.change_count() == actions.len() {
        return Ok(());
    }

    let recorded = stored.actions(id);
    error!(
        guid,
        recorded = recorded.len(),
        computed = actions.len(),
        "recorded build diffs differently"
    );
    for action in &recorded {
        error!(guid, %action, "recorded");
    }
    for action in actions {
        error!(guid, %action, "computed");
    }
    Err(Error::Inconsistent {
        guid: String::from(guid),
        recorded,
        computed: actions.to_vec(),
    })
}

// ── Entrypoint ─────────────────────────────────────────────────────────

/// Merge settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConfig {
    /// Archive directory
    pub archive: PathBuf,
    /// Stored history file
    pub history: PathBuf,
    /// Where to write the merged history; the history file when absent
    pub output: Option<PathBuf>,
    /// Start from an empty history instead of the stored one
    pub no_cache: bool,
    /// Rewrite tags to one spelling per case-insensitive group
    pub normalize_tags: bool,
}

impl MergeConfig {
    pub fn new(archive: impl Into<PathBuf>, history: impl Into<PathBuf>) -> Self {
        Self {
            archive: archive.into(),
            history: history.into(),
            output: None,
            no_cache: false,
            normalize_tags: true,
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    pub fn with_normalize_tags(mut self, normalize: bool) -> Self {
        self.normalize_tags = normalize;
        self
    }

    pub fn output_path(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.history)
    }
}

/// Merge the archive into the history file. Nothing is written unless the
/// whole merge succeeds.
pub fn run(config: &MergeConfig) -> Result<MergeReport> {
    let stored = if config.no_cache {
        info!("ignoring stored history");
        Root::new()
    } else {
        codec::read_history(&config.history)?
    };
    let archive = DirArchive::open(&config.archive)?;
    let MergeResult { mut root, mut report } = merge_history(&archive, &stored)?;
    if config.normalize_tags {
        report.normalized_tags = tags::normalize_tags(&mut root);
    }
    codec::write_history(config.output_path(), &root)?;
    info!(path = %config.output_path().display(), "wrote history");
    Ok(report)
}
