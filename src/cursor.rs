//! History replay cursor
//!
//! A cursor holds the snapshot the API had right after some update. Moving
//! it forward re-applies recorded actions; moving it backward applies their
//! reversals, newest first. A cursor never moves between disconnected
//! chains and is left untouched when a move is impossible.
//!
//! Author: Moroya Sakamoto

use crate::diff;
use crate::dump::Snapshot;
use crate::history::{Root, UpdateId};

/// Replay position within a [`Root`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    target: Option<UpdateId>,
    dump: Snapshot,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the cursor currently sits after
    pub fn target(&self) -> Option<UpdateId> {
        self.target
    }

    /// Snapshot as of [`Cursor::target`]
    pub fn dump(&self) -> &Snapshot {
        &self.dump
    }

    pub fn into_dump(self) -> Snapshot {
        self.dump
    }

    /// Move to the state right after `target`.
    ///
    /// An unset cursor first starts at the head of `target`'s chain with an
    /// empty snapshot. Returns `false`, leaving the cursor as it was, when
    /// `target` is not an update of `root` or lies on another chain.
    #[must_use]
    pub fn roll(&mut self, root: &Root, target: UpdateId) -> bool {
        if root.update(target).is_none() {
            return false;
        }
        if self.target == Some(target) {
            return true;
        }

        let current = match self.target {
            Some(current) if root.update(current).is_some() => current,
            Some(_) => return false,
            None => {
                let head = root.predecessors(target).last().unwrap_or(target);
                self.dump = Snapshot::new();
                self.forward(root, head);
                self.target = Some(head);
                if head == target {
                    return true;
                }
                head
            }
        };

        if let Some(steps) = path_to(root.successors(current), target) {
            for step in steps {
                self.forward(root, step);
            }
            self.target = Some(target);
            return true;
        }

        if let Some(steps) = path_to(root.predecessors(current), target) {
            // Undo the current update and every earlier one down to, but
            // not including, the target.
            self.backward(root, current);
            for step in steps.into_iter().filter(|s| *s != target) {
                self.backward(root, step);
            }
            self.target = Some(target);
            return true;
        }

        false
    }

    fn forward(&mut self, root: &Root, update: UpdateId) {
        for change in root.update_changes(update) {
            diff::apply(&mut self.dump, std::slice::from_ref(&change.action));
        }
    }

    fn backward(&mut self, root: &Root, update: UpdateId) {
        for change in root.update_changes(update).iter().rev() {
            diff::apply(&mut self.dump, &[change.reversed()]);
        }
    }
}

/// Steps of `walk` up to and including `target`, or `None` if it never
/// appears
fn path_to(walk: impl Iterator<Item = UpdateId>, target: UpdateId) -> Option<Vec<UpdateId>> {
    let mut steps = Vec::new();
    for step in walk {
        steps.push(step);
        if step == target {
            return Some(steps);
        }
    }
    None
}
