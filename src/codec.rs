//! History codec: persisted JSON form of a [`Root`]
//!
//! The in-memory ledger links updates by position and hands out change
//! ids; the persisted form flattens that into three tables:
//!
//! - `change`: every change, tagged with its owning update and its position
//!   inside that update
//! - `update`: every update, as a start offset and count into `change`
//! - `object`: the per-entity indexes, as lists of offsets into `change`
//!
//! Decoding checks that all offsets line up and relinks `prev`/`next` by
//! array adjacency.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::Action;
use crate::dump::{Fields, TypeDesc};
use crate::error::{Error, Result};
use crate::history::{Change, ChangeId, Objects, RefContainer, Root, TypeRef, Update, UpdateId};
use crate::id::{EnumItemKey, MemberKey, TypeKey};

// ── Stored Form ────────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredRoot {
    #[serde(default)]
    change: Vec<StoredChange>,
    #[serde(default)]
    update: Vec<StoredUpdate>,
    #[serde(default)]
    object: StoredObjects,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredChange {
    /// Owning update
    update: usize,
    /// Position within the owning update
    index: usize,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prev: Option<Fields>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredUpdate {
    date: DateTime<Utc>,
    guid: String,
    version: String,
    change_start: usize,
    change_count: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredObjects {
    #[serde(default)]
    class: BTreeMap<String, Vec<usize>>,
    /// class -> member -> offsets
    #[serde(default)]
    member: BTreeMap<String, BTreeMap<String, Vec<usize>>>,
    #[serde(default, rename = "enum")]
    enums: BTreeMap<String, Vec<usize>>,
    /// enum -> item -> offsets
    #[serde(default)]
    enum_item: BTreeMap<String, BTreeMap<String, Vec<usize>>>,
    /// category -> name -> references
    #[serde(default, rename = "type")]
    types: BTreeMap<String, BTreeMap<String, Vec<StoredTypeRef>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredTypeRef {
    change: usize,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    prev: bool,
    field: String,
    container: RefContainer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    value: TypeDesc,
}

// ── Encode ─────────────────────────────────────────────────────────────

fn offsets(ids: &[ChangeId]) -> Vec<usize> {
    ids.iter().map(|id| id.0).collect()
}

fn store_objects(objects: &Objects) -> StoredObjects {
    let mut stored = StoredObjects::default();
    for (class, ids) in &objects.class {
        stored.class.insert(class.clone(), offsets(ids));
    }
    for (key, ids) in &objects.member {
        stored
            .member
            .entry(key.class.clone())
            .or_default()
            .insert(key.member.clone(), offsets(ids));
    }
    for (enum_id, ids) in &objects.enums {
        stored.enums.insert(enum_id.clone(), offsets(ids));
    }
    for (key, ids) in &objects.enum_item {
        stored
            .enum_item
            .entry(key.enum_id.clone())
            .or_default()
            .insert(key.item.clone(), offsets(ids));
    }
    for (key, refs) in &objects.types {
        let refs = refs
            .iter()
            .map(|r| StoredTypeRef {
                change: r.change.0,
                prev: r.prev,
                field: r.field.clone(),
                container: r.container,
                index: r.index,
                value: r.value.clone(),
            })
            .collect();
        stored
            .types
            .entry(key.category.clone())
            .or_default()
            .insert(key.name.clone(), refs);
    }
    stored
}

/// Encode a history as JSON
pub fn encode(root: &Root) -> Result<Vec<u8>> {
    let mut change = Vec::with_capacity(root.changes.len());
    for (i, update) in root.updates.iter().enumerate() {
        for (index, c) in root.changes[update.changes.clone()].iter().enumerate() {
            change.push(StoredChange {
                update: i,
                index,
                action: c.action.clone(),
                prev: c.prev.clone(),
            });
        }
    }
    let update = root
        .updates
        .iter()
        .map(|u| StoredUpdate {
            date: u.date,
            guid: u.guid.clone(),
            version: u.version.to_string(),
            change_start: u.changes.start,
            change_count: u.changes.len(),
        })
        .collect();

    let stored = StoredRoot {
        change,
        update,
        object: store_objects(&root.objects),
    };
    Ok(serde_json::to_vec(&stored)?)
}

// ── Decode ─────────────────────────────────────────────────────────────

/// Resolve persisted offsets against a change list of length `len`
fn change_ids(offsets: Vec<usize>, len: usize, what: &str) -> Result<Vec<ChangeId>> {
    offsets
        .into_iter()
        .map(|offset| {
            if offset < len {
                Ok(ChangeId(offset))
            } else {
                Err(Error::Corrupt(format!(
                    "{what} refers to change {offset}, history has {len}"
                )))
            }
        })
        .collect()
}

fn load_objects(stored: StoredObjects, len: usize) -> Result<Objects> {
    let mut objects = Objects::default();
    for (class, ids) in stored.class {
        let ids = change_ids(ids, len, &format!("class {class}"))?;
        objects.class.insert(class, ids);
    }
    for (class, members) in stored.member {
        for (member, ids) in members {
            let ids = change_ids(ids, len, &format!("member {class}.{member}"))?;
            objects.member.insert(MemberKey::new(class.as_str(), member), ids);
        }
    }
    for (enum_id, ids) in stored.enums {
        let ids = change_ids(ids, len, &format!("enum {enum_id}"))?;
        objects.enums.insert(enum_id, ids);
    }
    for (enum_id, items) in stored.enum_item {
        for (item, ids) in items {
            let ids = change_ids(ids, len, &format!("enum item {enum_id}.{item}"))?;
            objects.enum_item.insert(EnumItemKey::new(enum_id.as_str(), item), ids);
        }
    }
    for (category, names) in stored.types {
        for (name, refs) in names {
            let mut loaded = Vec::with_capacity(refs.len());
            for r in refs {
                if r.change >= len {
                    return Err(Error::Corrupt(format!(
                        "type {category}:{name} refers to change {}, history has {len}",
                        r.change
                    )));
                }
                loaded.push(TypeRef {
                    change: ChangeId(r.change),
                    prev: r.prev,
                    field: r.field,
                    container: r.container,
                    index: r.index,
                    value: r.value,
                });
            }
            objects.types.insert(TypeKey::new(category.as_str(), name), loaded);
        }
    }
    Ok(objects)
}

/// Decode a history from its JSON form
///
/// Fails with [`Error::Corrupt`] when update ranges are not contiguous,
/// a change's owner or position disagrees with the range holding it, or an
/// index refers past the change list.
pub fn decode(data: &[u8]) -> Result<Root> {
    let stored: StoredRoot = serde_json::from_slice(data)?;
    let len = stored.change.len();

    let mut updates = Vec::with_capacity(stored.update.len());
    let mut next_start = 0;
    for (i, u) in stored.update.into_iter().enumerate() {
        if u.change_start != next_start {
            return Err(Error::Corrupt(format!(
                "update {i} starts at change {}, expected {next_start}",
                u.change_start
            )));
        }
        let end = match u.change_start.checked_add(u.change_count) {
            Some(end) if end <= len => end,
            _ => {
                return Err(Error::Corrupt(format!(
                    "update {i} spans {} changes from {}, history has {len}",
                    u.change_count, u.change_start
                )));
            }
        };
        next_start = end;
        updates.push(Update {
            prev: i.checked_sub(1).map(UpdateId),
            next: None,
            date: u.date,
            version: u.version.parse()?,
            guid: u.guid,
            changes: u.change_start..end,
        });
    }
    if next_start != len {
        return Err(Error::Corrupt(format!(
            "{} changes belong to no update",
            len - next_start
        )));
    }
    let count = updates.len();
    for (i, update) in updates.iter_mut().enumerate() {
        update.next = (i + 1 < count).then_some(UpdateId(i + 1));
    }

    let mut changes = Vec::with_capacity(len);
    for (offset, c) in stored.change.into_iter().enumerate() {
        let owner = updates.get(c.update).ok_or_else(|| {
            Error::Corrupt(format!("change {offset} names missing update {}", c.update))
        })?;
        if !owner.changes.contains(&offset) || offset - owner.changes.start != c.index {
            return Err(Error::Corrupt(format!(
                "change {offset} claims update {} position {}",
                c.update, c.index
            )));
        }
        changes.push(Change {
            update: UpdateId(c.update),
            action: c.action,
            prev: c.prev,
        });
    }

    let objects = load_objects(stored.object, len)?;
    Ok(Root::from_parts(changes, updates, objects))
}

// ── Files ──────────────────────────────────────────────────────────────

/// Read a history file. A file that does not exist yet reads as an empty
/// history.
pub fn read_history(path: &Path) -> Result<Root> {
    match fs::read(path) {
        Ok(data) => decode(&data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no stored history");
            Ok(Root::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Write a history file, replacing any previous one only once the new
/// content is fully on disk
pub fn write_history(path: &Path, root: &Root) -> Result<()> {
    let data = encode(root)?;
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        writer.write_all(&data)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    debug!(path = %path.display(), bytes = data.len(), "wrote history");
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────
