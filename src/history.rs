//! Change history ledger
//!
//! Append-only record of every structural change ever observed, grouped
//! into one update per build and indexed by the entity each change
//! touches. The flat change list is the source of truth; the per-entity
//! indexes are derived from it and can be rebuilt with [`Root::reindex`].
//!
//! Updates and changes refer to each other by position (`UpdateId`,
//! `ChangeId`) rather than by pointer, so the ledger has no cycles and
//! clones cheaply into the persisted form.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::ops::Range;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::archive::Build;
use crate::diff::{self, Action, ActionType, Element};
use crate::dump::{Fields, Snapshot, TypeDesc, Value, ITEMS_FIELD, MEMBERS_FIELD};
use crate::id::{ClassId, EnumId, EnumItemKey, MemberKey, TypeKey};
use crate::version::Version;

/// Position of an update in [`Root::updates`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UpdateId(pub usize);

/// Position of a change in [`Root::changes`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChangeId(pub usize);

/// One recorded action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Update that owns this change
    pub update: UpdateId,
    pub action: Action,
    /// Field values the action overwrote. `None` when the update had no
    /// baseline snapshot to invert against.
    pub prev: Option<Fields>,
}

impl Change {
    /// The action that undoes this change
    pub fn reversed(&self) -> Action {
        match &self.prev {
            Some(prev) => self.action.reversed(prev),
            None => self.action.reversed(&Fields::new()),
        }
    }
}

/// All changes produced by one build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    /// Chronologically previous update
    pub prev: Option<UpdateId>,
    /// Chronologically next update
    pub next: Option<UpdateId>,
    pub date: DateTime<Utc>,
    /// Build GUID (`version-0123456789abcdef`)
    pub guid: String,
    pub version: Version,
    /// Contiguous slice of [`Root::changes`]
    pub(crate) changes: Range<usize>,
}

impl Update {
    pub fn change_ids(&self) -> impl Iterator<Item = ChangeId> {
        self.changes.clone().map(ChangeId)
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}

/// Where inside a field a type reference was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefContainer {
    /// The field holds the type directly
    Type,
    /// The type is a parameter's type
    Parameter,
}

/// A type mentioned by a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub change: ChangeId,
    /// true: found in `Change::prev`; false: in the action's fields
    pub prev: bool,
    pub field: String,
    pub container: RefContainer,
    /// Position within a list-valued field
    pub index: Option<usize>,
    pub value: TypeDesc,
}

/// Per-entity views of the change list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Objects {
    pub class: BTreeMap<ClassId, Vec<ChangeId>>,
    pub member: BTreeMap<MemberKey, Vec<ChangeId>>,
    pub enums: BTreeMap<EnumId, Vec<ChangeId>>,
    pub enum_item: BTreeMap<EnumItemKey, Vec<ChangeId>>,
    pub types: BTreeMap<TypeKey, Vec<TypeRef>>,
}

impl Objects {
    /// File `id` under every entity `action` affects. `children` are the
    /// members or items that a class or enum removal takes with it.
    fn route(&mut self, id: ChangeId, action: &Action, children: &[String]) {
        let primary = action.primary.as_str();
        match action.element {
            Element::Class => {
                self.class.entry(action.primary.clone()).or_default().push(id);
                for member in children {
                    self.member
                        .entry(MemberKey::new(primary, member.as_str()))
                        .or_default()
                        .push(id);
                }
            }
            Element::Property | Element::Function | Element::Event | Element::Callback => {
                if let Some(member) = &action.secondary {
                    self.member
                        .entry(MemberKey::new(primary, member.as_str()))
                        .or_default()
                        .push(id);
                }
            }
            Element::Enum => {
                self.enums.entry(action.primary.clone()).or_default().push(id);
                for item in children {
                    self.enum_item
                        .entry(EnumItemKey::new(primary, item.as_str()))
                        .or_default()
                        .push(id);
                }
            }
            Element::EnumItem => {
                if let Some(item) = &action.secondary {
                    self.enum_item
                        .entry(EnumItemKey::new(primary, item.as_str()))
                        .or_default()
                        .push(id);
                }
            }
        }
    }

    /// Record every non-class, non-enum type found in the change, previous
    /// values first, each side in field-name order.
    fn add_type_refs(&mut self, id: ChangeId, change: &Change) {
        if let Some(prev) = &change.prev {
            for (field, value) in prev {
                self.add_type_ref(id, true, field, value);
            }
        }
        for (field, value) in &change.action.fields {
            self.add_type_ref(id, false, field, value);
        }
    }

    fn add_type_ref(&mut self, change: ChangeId, prev: bool, field: &str, value: &Value) {
        let mut push = |container: RefContainer, index: Option<usize>, ty: &TypeDesc| {
            // Classes and enums have their own indexes
            if ty.category == "Class" || ty.category == "Enum" {
                return;
            }
            self.types
                .entry(TypeKey::new(ty.category.as_str(), ty.name.as_str()))
                .or_default()
                .push(TypeRef {
                    change,
                    prev,
                    field: String::from(field),
                    container,
                    index,
                    value: ty.clone(),
                });
        };
        match value {
            Value::Type(ty) => push(RefContainer::Type, None, ty),
            Value::Types(types) => {
                for (i, ty) in types.iter().enumerate() {
                    push(RefContainer::Type, Some(i), ty);
                }
            }
            Value::Parameter(param) => push(RefContainer::Parameter, None, &param.ty),
            Value::Parameters(params) => {
                for (i, param) in params.iter().enumerate() {
                    push(RefContainer::Parameter, Some(i), &param.ty);
                }
            }
            _ => {}
        }
    }
}

/// Children a class or enum removal takes with it, according to `baseline`
fn removed_children(action: &Action, baseline: &Snapshot) -> Vec<String> {
    if action.kind != ActionType::Remove {
        return Vec::new();
    }
    match action.element {
        Element::Class => baseline
            .classes
            .get(&action.primary)
            .map(|c| c.members.keys().cloned().collect())
            .unwrap_or_default(),
        Element::Enum => baseline
            .enums
            .get(&action.primary)
            .map(|e| e.items.keys().cloned().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Same as [`removed_children`], recovered from the removal's stored
/// previous values instead of a snapshot
fn removed_children_from_prev(action: &Action, prev: &Fields) -> Vec<String> {
    if action.kind != ActionType::Remove {
        return Vec::new();
    }
    match (action.element, prev.get(MEMBERS_FIELD), prev.get(ITEMS_FIELD)) {
        (Element::Class, Some(Value::Members(members)), _) => members.keys().cloned().collect(),
        (Element::Enum, _, Some(Value::Items(items))) => items.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

/// History root. Owns every update and change plus their indexes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Root {
    pub(crate) objects: Objects,
    pub(crate) changes: Vec<Change>,
    pub(crate) updates: Vec<Update>,
}

impl Root {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a root from already consistent parts
    pub(crate) fn from_parts(changes: Vec<Change>, updates: Vec<Update>, objects: Objects) -> Self {
        Self {
            objects,
            changes,
            updates,
        }
    }

    /// Append the update for `build`, made of `actions` computed against
    /// `baseline` (absent for the first build of a history).
    ///
    /// The new update becomes the tail of the chain. With a baseline, each
    /// change records the values it overwrote, and a class or enum removal
    /// is also filed under every member or item the baseline gave it.
    pub fn append_update(
        &mut self,
        build: &Build,
        actions: Vec<Action>,
        baseline: Option<&Snapshot>,
    ) -> UpdateId {
        let id = UpdateId(self.updates.len());
        let prev = self.updates.len().checked_sub(1).map(UpdateId);
        let mut inverse = baseline.map(|base| diff::inverse(base, &actions).into_iter());

        let start = self.changes.len();
        for action in actions {
            let change_id = ChangeId(self.changes.len());
            let children = baseline
                .map(|base| removed_children(&action, base))
                .unwrap_or_default();
            let change = Change {
                update: id,
                prev: inverse.as_mut().and_then(Iterator::next).map(|inv| inv.fields),
                action,
            };
            self.objects.route(change_id, &change.action, &children);
            self.objects.add_type_refs(change_id, &change);
            self.changes.push(change);
        }

        self.updates.push(Update {
            prev,
            next: None,
            date: build.date,
            guid: build.guid.clone(),
            version: build.version,
            changes: start..self.changes.len(),
        });
        if let Some(prev) = prev {
            self.updates[prev.0].next = Some(id);
        }
        id
    }

    /// Keep only the changes `keep` accepts. Update ranges shrink to match
    /// and the indexes are rebuilt from what is left. Returns the number of
    /// changes removed.
    pub fn retain_changes(&mut self, mut keep: impl FnMut(&Change) -> bool) -> usize {
        let before = self.changes.len();
        let mut old = std::mem::take(&mut self.changes).into_iter();
        let mut changes = Vec::with_capacity(before);
        for update in &mut self.updates {
            let start = changes.len();
            for change in old.by_ref().take(update.changes.len()) {
                if keep(&change) {
                    changes.push(change);
                }
            }
            update.changes = start..changes.len();
        }
        self.changes = changes;
        self.objects = self.reindex();
        before - self.changes.len()
    }

    /// Derive the indexes from the change list alone
    pub fn reindex(&self) -> Objects {
        let mut objects = Objects::default();
        for (i, change) in self.changes.iter().enumerate() {
            let children = change
                .prev
                .as_ref()
                .map(|prev| removed_children_from_prev(&change.action, prev))
                .unwrap_or_default();
            objects.route(ChangeId(i), &change.action, &children);
            objects.add_type_refs(ChangeId(i), change);
        }
        objects
    }

    pub fn objects(&self) -> &Objects {
        &self.objects
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn updates(&self) -> &[Update] {
        &self.updates
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn update(&self, id: UpdateId) -> Option<&Update> {
        self.updates.get(id.0)
    }

    pub fn change(&self, id: ChangeId) -> Option<&Change> {
        self.changes.get(id.0)
    }

    /// Changes of an update, in recorded order
    pub fn update_changes(&self, id: UpdateId) -> &[Change] {
        self.update(id)
            .and_then(|u| self.changes.get(u.changes.clone()))
            .unwrap_or(&[])
    }

    /// Actions of an update, in recorded order
    pub fn actions(&self, id: UpdateId) -> Vec<Action> {
        self.update_changes(id)
            .iter()
            .map(|c| c.action.clone())
            .collect()
    }

    pub fn update_by_guid(&self, guid: &str) -> Option<UpdateId> {
        self.updates
            .iter()
            .position(|u| u.guid == guid)
            .map(UpdateId)
    }

    pub fn class_changes(&self, class: &str) -> &[ChangeId] {
        self.objects
            .class
            .get(class)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn member_changes(&self, class: &str, member: &str) -> &[ChangeId] {
        self.objects
            .member
            .get(&MemberKey::new(class, member))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn enum_changes(&self, enum_: &str) -> &[ChangeId] {
        self.objects
            .enums
            .get(enum_)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn enum_item_changes(&self, enum_: &str, item: &str) -> &[ChangeId] {
        self.objects
            .enum_item
            .get(&EnumItemKey::new(enum_, item))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn type_refs(&self, category: &str, name: &str) -> &[TypeRef] {
        self.objects
            .types
            .get(&TypeKey::new(category, name))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Updates after `id`, following `next` links
    pub fn successors(&self, id: UpdateId) -> impl Iterator<Item = UpdateId> + '_ {
        let first = self.update(id).and_then(|u| u.next);
        std::iter::successors(first, move |u| self.update(*u).and_then(|u| u.next))
            .take(self.updates.len())
    }

    /// Updates before `id`, following `prev` links
    pub fn predecessors(&self, id: UpdateId) -> impl Iterator<Item = UpdateId> + '_ {
        let first = self.update(id).and_then(|u| u.prev);
        std::iter::successors(first, move |u| self.update(*u).and_then(|u| u.prev))
            .take(self.updates.len())
    }

    /// Updates with `start <= date < end`, ordered by date. An absent bound
    /// is not compared.
    pub fn update_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<UpdateId> {
        let mut ids: Vec<UpdateId> = self
            .updates
            .iter()
            .enumerate()
            .filter(|(_, u)| start.map_or(true, |s| s <= u.date))
            .filter(|(_, u)| end.map_or(true, |e| u.date < e))
            .map(|(i, _)| UpdateId(i))
            .collect();
        ids.sort_by_key(|id| self.updates[id.0].date);
        ids
    }

    /// Update with the earliest date; the first one wins a tie
    pub fn earliest_update(&self) -> Option<UpdateId> {
        let mut best: Option<UpdateId> = None;
        for (i, update) in self.updates.iter().enumerate() {
            if best.map_or(true, |b| update.date < self.updates[b.0].date) {
                best = Some(UpdateId(i));
            }
        }
        best
    }

    /// Update with the latest date; the first one wins a tie
    pub fn latest_update(&self) -> Option<UpdateId> {
        let mut best: Option<UpdateId> = None;
        for (i, update) in self.updates.iter().enumerate() {
            if best.map_or(true, |b| update.date > self.updates[b.0].date) {
                best = Some(UpdateId(i));
            }
        }
        best
    }

    /// Stable-sort change ids by the date of their owning update
    pub fn sort_changes(&self, changes: &mut [ChangeId]) {
        changes.sort_by_key(|id| {
            self.change(*id)
                .and_then(|c| self.update(c.update))
                .map(|u| u.date)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::{Class, Enum, EnumItem, Member, MemberKind, Parameter};

    fn build(guid: &str, date: &str) -> Build {
        Build::new(guid, format!("{date}T00:00:00Z").parse().unwrap())
    }

    fn foo_with_bar() -> Snapshot {
        Snapshot::new().with_class(
            "Foo",
            Class::default().with_member("Bar", Member::new(MemberKind::Property)),
        )
    }

    /// Appends each snapshot as one update, the way a merge would.
    fn chain(snapshots: &[Snapshot]) -> Root {
        let mut root = Root::new();
        let mut prev: Option<&Snapshot> = None;
        for (i, next) in snapshots.iter().enumerate() {
            let actions = diff::diff(prev, next);
            let date = format!("2020-{:02}-01", i + 1);
            root.append_update(&build(&format!("g{}", i + 1), &date), actions, prev);
            prev = Some(next);
        }
        root
    }

    #[test]
    fn test_new_root_is_empty() {
        let root = Root::new();
        assert!(root.is_empty());
        assert!(root.changes().is_empty());
        assert_eq!(root.objects(), &Objects::default());
        assert!(root.latest_update().is_none());
    }

    #[test]
    fn test_class_removal_scenario() {
        let root = chain(&[foo_with_bar(), Snapshot::new()]);
        assert_eq!(root.updates().len(), 2);

        let class = root.class_changes("Foo");
        assert_eq!(class.len(), 2);
        assert_eq!(root.change(class[0]).unwrap().action.kind, ActionType::Add);
        assert_eq!(root.change(class[0]).unwrap().update, UpdateId(0));
        assert_eq!(root.change(class[1]).unwrap().action.kind, ActionType::Remove);
        assert_eq!(root.change(class[1]).unwrap().update, UpdateId(1));

        let member = root.member_changes("Foo", "Bar");
        assert_eq!(member.len(), 2);
        assert_eq!(root.change(member[0]).unwrap().action.element, Element::Property);
        // The member's second entry is the class removal itself
        assert_eq!(member[1], class[1]);
    }

    #[test]
    fn test_class_removal_propagates_to_every_member() {
        let v1 = Snapshot::new().with_class(
            "Foo",
            Class::default()
                .with_member("Bar", Member::new(MemberKind::Property))
                .with_member("Baz", Member::new(MemberKind::Function)),
        );
        let root = chain(&[v1, Snapshot::new()]);
        let removal = root.class_changes("Foo")[1];
        for member in ["Bar", "Baz"] {
            let list = root.member_changes("Foo", member);
            assert_eq!(list.len(), 2, "{member}");
            assert_eq!(list[1], removal);
            assert_eq!(root.change(list[1]).unwrap().update, UpdateId(1));
        }
    }

    #[test]
    fn test_enum_removal_propagates_to_items() {
        let v1 = Snapshot::new().with_enum(
            "Material",
            Enum::default()
                .with_item("Plastic", EnumItem::default())
                .with_item("Wood", EnumItem::default()),
        );
        let root = chain(&[v1, Snapshot::new()]);
        let removal = root.enum_changes("Material")[1];
        assert_eq!(root.enum_item_changes("Material", "Plastic"), &[ChangeId(1), removal]);
        assert_eq!(root.enum_item_changes("Material", "Wood"), &[ChangeId(2), removal]);
    }

    #[test]
    fn test_removal_without_baseline_does_not_propagate() {
        let mut root = Root::new();
        root.append_update(
            &build("g1", "2020-01-01"),
            vec![Action::new(ActionType::Remove, Element::Class, "Foo", None)],
            None,
        );
        assert_eq!(root.class_changes("Foo").len(), 1);
        assert!(root.objects().member.is_empty());
        assert!(root.changes()[0].prev.is_none());
    }

    #[test]
    fn test_updates_are_linked() {
        let root = chain(&[foo_with_bar(), Snapshot::new(), foo_with_bar()]);
        let updates = root.updates();
        assert_eq!(updates[0].prev, None);
        assert_eq!(updates[0].next, Some(UpdateId(1)));
        assert_eq!(updates[1].prev, Some(UpdateId(0)));
        assert_eq!(updates[1].next, Some(UpdateId(2)));
        assert_eq!(updates[2].prev, Some(UpdateId(1)));
        assert_eq!(updates[2].next, None);
        assert_eq!(root.successors(UpdateId(0)).collect::<Vec<_>>(), vec![UpdateId(1), UpdateId(2)]);
        assert_eq!(root.predecessors(UpdateId(2)).collect::<Vec<_>>(), vec![UpdateId(1), UpdateId(0)]);
    }

    #[test]
    fn test_every_indexed_change_has_one_owner() {
        let v2 = foo_with_bar().with_enum("E", Enum::default().with_item("A", EnumItem::default()));
        let root = chain(&[foo_with_bar(), v2, Snapshot::new()]);
        let objects = root.objects();
        let indexed = objects
            .class
            .values()
            .chain(objects.member.values())
            .chain(objects.enums.values())
            .chain(objects.enum_item.values())
            .flatten();
        for id in indexed {
            let change = root.change(*id).expect("indexed change exists");
            let owners = root
                .updates()
                .iter()
                .filter(|u| u.change_ids().any(|c| c == *id))
                .count();
            assert_eq!(owners, 1);
            assert!(root.updates()[change.update.0].change_ids().any(|c| c == *id));
        }
    }

    #[test]
    fn test_reindex_matches_incremental_indexes() {
        let v1 = foo_with_bar().with_enum("E", Enum::default().with_item("A", EnumItem::default()));
        let v2 = Snapshot::new().with_class(
            "Foo",
            Class::default().with_member(
                "Bar",
                Member::new(MemberKind::Function).with_field(
                    "Parameters",
                    Value::Parameters(vec![Parameter::new("x", TypeDesc::new("Primitive", "int"))]),
                ),
            ),
        );
        let root = chain(&[v1, v2, Snapshot::new()]);
        assert_eq!(root.reindex(), *root.objects());
    }

    #[test]
    fn test_change_prev_records_overwritten_values() {
        let v1 = Snapshot::new().with_class(
            "Foo",
            Class::default().with_field("Superclass", Value::Text(String::from("Instance"))),
        );
        let v2 = Snapshot::new().with_class(
            "Foo",
            Class::default().with_field("Superclass", Value::Text(String::from("PVInstance"))),
        );
        let root = chain(&[v1, v2]);
        let change = &root.update_changes(UpdateId(1))[0];
        assert_eq!(
            change.prev.as_ref().unwrap().get("Superclass"),
            Some(&Value::Text(String::from("Instance")))
        );
        assert!(root.update_changes(UpdateId(0))[0].prev.is_none());
    }

    #[test]
    fn test_type_refs_skip_class_and_enum_categories() {
        let v1 = Snapshot::new().with_class(
            "Foo",
            Class::default()
                .with_member(
                    "Size",
                    Member::new(MemberKind::Property)
                        .with_field("ValueType", Value::Type(TypeDesc::new("DataType", "Vector3"))),
                )
                .with_member(
                    "Parent",
                    Member::new(MemberKind::Property)
                        .with_field("ValueType", Value::Type(TypeDesc::new("Class", "Instance"))),
                )
                .with_member(
                    "Resize",
                    Member::new(MemberKind::Function).with_field(
                        "Parameters",
                        Value::Parameters(vec![
                            Parameter::new("face", TypeDesc::new("Enum", "NormalId")),
                            Parameter::new("delta", TypeDesc::new("Primitive", "int")),
                        ]),
                    ),
                ),
        );
        let root = chain(&[v1]);
        assert_eq!(root.type_refs("DataType", "Vector3").len(), 1);
        assert!(root.type_refs("Class", "Instance").is_empty());
        assert!(root.type_refs("Enum", "NormalId").is_empty());

        let int_refs = root.type_refs("Primitive", "int");
        assert_eq!(int_refs.len(), 1);
        assert_eq!(int_refs[0].container, RefContainer::Parameter);
        assert_eq!(int_refs[0].index, Some(1));
        assert_eq!(int_refs[0].field, "Parameters");
        assert!(!int_refs[0].prev);
    }

    #[test]
    fn test_type_refs_include_previous_values() {
        let vector = |name: &str| {
            Snapshot::new().with_class(
                "Foo",
                Class::default().with_member(
                    "Size",
                    Member::new(MemberKind::Property)
                        .with_field("ValueType", Value::Type(TypeDesc::new("DataType", name))),
                ),
            )
        };
        let root = chain(&[vector("Vector3"), vector("Vector2")]);
        let v3 = root.type_refs("DataType", "Vector3");
        assert_eq!(v3.len(), 2);
        assert!(!v3[0].prev);
        assert!(v3[1].prev);
        assert_eq!(v3[1].change, root.type_refs("DataType", "Vector2")[0].change);
    }

    #[test]
    fn test_update_range_bounds() {
        let root = chain(&[foo_with_bar(), Snapshot::new(), foo_with_bar()]);
        let at = |d: &str| -> Option<DateTime<Utc>> { Some(format!("{d}T00:00:00Z").parse().unwrap()) };
        assert_eq!(root.update_range(None, None).len(), 3);
        assert_eq!(root.update_range(at("2020-02-01"), None), vec![UpdateId(1), UpdateId(2)]);
        assert_eq!(root.update_range(None, at("2020-02-01")), vec![UpdateId(0)]);
        assert_eq!(root.update_range(at("2020-02-01"), at("2020-03-01")), vec![UpdateId(1)]);
    }

    #[test]
    fn test_earliest_and_latest_update() {
        let root = chain(&[foo_with_bar(), Snapshot::new(), foo_with_bar()]);
        assert_eq!(root.earliest_update(), Some(UpdateId(0)));
        assert_eq!(root.latest_update(), Some(UpdateId(2)));
    }

    #[test]
    fn test_sort_changes_by_update_date() {
        let root = chain(&[foo_with_bar(), Snapshot::new(), foo_with_bar()]);
        let mut ids: Vec<ChangeId> = root.class_changes("Foo").iter().rev().copied().collect();
        root.sort_changes(&mut ids);
        assert_eq!(ids, root.class_changes("Foo"));
    }

    #[test]
    fn test_actions_and_guid_lookup() {
        let root = chain(&[foo_with_bar(), Snapshot::new()]);
        assert_eq!(root.update_by_guid("g2"), Some(UpdateId(1)));
        assert!(root.update_by_guid("nope").is_none());
        assert_eq!(
            root.actions(UpdateId(1)),
            vec![Action::new(ActionType::Remove, Element::Class, "Foo", None)]
        );
        assert!(root.actions(UpdateId(9)).is_empty());
    }

    #[test]
    fn test_retain_changes_renumbers_and_reindexes() {
        let v2 = foo_with_bar().with_class("Baz", Class::default());
        let mut root = chain(&[foo_with_bar(), v2, Snapshot::new()]);
        let removed = root.retain_changes(|c| c.action.primary != "Baz");
        assert_eq!(removed, 2);
        assert_eq!(root.update_changes(UpdateId(1)).len(), 0);
        assert_eq!(root.updates()[2].change_ids().collect::<Vec<_>>(), vec![ChangeId(2)]);
        assert!(root.class_changes("Baz").is_empty());
        assert_eq!(root.class_changes("Foo"), &[ChangeId(0), ChangeId(2)]);
        assert_eq!(root.member_changes("Foo", "Bar"), &[ChangeId(1), ChangeId(2)]);
        for (i, update) in root.updates().iter().enumerate() {
            for id in update.change_ids() {
                assert_eq!(root.change(id).unwrap().update, UpdateId(i));
            }
        }
    }

    #[test]
    fn test_change_reversed_uses_prev() {
        let root = chain(&[foo_with_bar(), Snapshot::new()]);
        let removal = &root.update_changes(UpdateId(1))[0];
        let undo = removal.reversed();
        assert_eq!(undo.kind, ActionType::Add);
        assert!(matches!(undo.fields.get(MEMBERS_FIELD), Some(Value::Members(m)) if m.contains_key("Bar")));
    }
}
