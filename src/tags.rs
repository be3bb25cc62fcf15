//! Tag normalization
//!
//! Builds published over the years spell the same tag or security context
//! with different casing (`WriteOnly`, `writeonly`). Normalization picks one
//! canonical spelling per case-insensitive group and rewrites the whole
//! history to it.
//!
//! Author: Moroya Sakamoto

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, info};

use crate::diff::ActionType;
use crate::dump::{Fields, Value, ITEMS_FIELD, MEMBERS_FIELD};
use crate::history::{Change, Root};

/// Fields whose values are tags or security contexts
const TAG_FIELDS: [&str; 4] = ["Tags", "Security", "ReadSecurity", "WriteSecurity"];

/// Visit every tag in every change's fields and previous fields, including
/// the members and items a removal keeps for undo. Returning `Some` from
/// `visit` replaces the tag.
pub fn visit_tags(root: &mut Root, mut visit: impl FnMut(&str) -> Option<String>) {
    for change in &mut root.changes {
        visit_field_tags(&mut change.action.fields, &mut visit);
        if let Some(prev) = &mut change.prev {
            visit_field_tags(prev, &mut visit);
        }
    }
}

fn visit_field_tags(fields: &mut Fields, visit: &mut impl FnMut(&str) -> Option<String>) {
    for name in TAG_FIELDS {
        match fields.get_mut(name) {
            Some(Value::Tags(tags)) => {
                for tag in tags.iter_mut() {
                    if let Some(next) = visit(tag) {
                        *tag = next;
                    }
                }
            }
            Some(Value::Text(tag)) => {
                if let Some(next) = visit(tag) {
                    *tag = next;
                }
            }
            _ => {}
        }
    }
    if let Some(Value::Members(members)) = fields.get_mut(MEMBERS_FIELD) {
        for member in members.values_mut() {
            visit_field_tags(&mut member.fields, visit);
        }
    }
    if let Some(Value::Items(items)) = fields.get_mut(ITEMS_FIELD) {
        for item in items.values_mut() {
            visit_field_tags(&mut item.fields, visit);
        }
    }
}

/// A change whose fields equal what they replaced
fn is_noop(change: &Change) -> bool {
    change.action.kind == ActionType::Change && change.prev.as_ref() == Some(&change.action.fields)
}

/// Rewrite every tag to its canonical spelling. Returns the number of
/// distinct spellings that were replaced.
///
/// A change that only differed in casing is left with nothing to change
/// and is dropped, so the history matches what a fresh diff of the
/// normalized builds records.
pub fn normalize_tags(root: &mut Root) -> usize {
    let mut canon: HashMap<String, String> = HashMap::new();
    visit_tags(root, |tag| {
        canon
            .entry(tag.to_lowercase())
            .and_modify(|cur| *cur = String::from(normalize_tag(cur, tag)))
            .or_insert_with(|| String::from(tag));
        None
    });

    let mut rewritten = BTreeSet::new();
    visit_tags(root, |tag| {
        let target = canon.get(&tag.to_lowercase())?;
        if target == tag {
            return None;
        }
        if rewritten.insert(String::from(tag)) {
            info!(from = %tag, to = %target, "normalized tag");
        }
        Some(target.clone())
    });

    if !rewritten.is_empty() {
        let dropped = root.retain_changes(|c| !is_noop(c));
        if dropped > 0 {
            debug!(dropped, "dropped changes emptied by normalization");
        }
    }
    rewritten.len()
}

/// Pick the more canonical of two equivalent spellings: more uppercase
/// letters wins; on a tie `current` wins only if it starts uppercase.
pub fn normalize_tag<'a>(current: &'a str, next: &'a str) -> &'a str {
    let uppers = |s: &str| s.chars().filter(|c| c.is_uppercase()).count();
    let (cu, nu) = (uppers(current), uppers(next));
    let first_upper = current.chars().next().is_some_and(char::is_uppercase);
    if cu > nu || (cu == nu && first_upper) {
        current
    } else {
        next
    }
}
