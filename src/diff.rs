//! API dump diff engine
//!
//! Computes the structural actions that turn one snapshot into another,
//! inverts actions against a base snapshot to recover what they overwrote,
//! and patches snapshots in place. Field changes are emitted one action per
//! field so every action names exactly one thing that changed.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dump::{
    Class, Enum, EnumItem, Fields, Member, MemberKind, Snapshot, Value, ITEMS_FIELD, MEMBERS_FIELD,
};

/// Kind of entity an action applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Element {
    Class,
    Property,
    Function,
    Event,
    Callback,
    Enum,
    EnumItem,
}

impl Element {
    /// The top-level element this element belongs under
    pub fn group(self) -> Element {
        match self {
            Element::Enum | Element::EnumItem => Element::Enum,
            _ => Element::Class,
        }
    }

    /// Member kind for member elements
    pub fn member_kind(self) -> Option<MemberKind> {
        match self {
            Element::Property => Some(MemberKind::Property),
            Element::Function => Some(MemberKind::Function),
            Element::Event => Some(MemberKind::Event),
            Element::Callback => Some(MemberKind::Callback),
            _ => None,
        }
    }

    pub fn from_member_kind(kind: MemberKind) -> Self {
        match kind {
            MemberKind::Property => Element::Property,
            MemberKind::Function => Element::Function,
            MemberKind::Event => Element::Event,
            MemberKind::Callback => Element::Callback,
        }
    }
}

/// What an action does to its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    Remove,
    Change,
    Add,
}

impl ActionType {
    /// Opposite polarity: Add and Remove swap, Change stays Change
    pub fn inverse(self) -> Self {
        match self {
            ActionType::Remove => ActionType::Add,
            ActionType::Change => ActionType::Change,
            ActionType::Add => ActionType::Remove,
        }
    }
}

/// One structural difference between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub element: Element,
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
    /// Add: the new entity's fields. Change: the changed fields only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: Fields,
}

impl Action {
    pub fn new(kind: ActionType, element: Element, primary: &str, secondary: Option<&str>) -> Self {
        Self {
            kind,
            element,
            primary: String::from(primary),
            secondary: secondary.map(String::from),
            fields: Fields::new(),
        }
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(String::from(name), value);
        self
    }

    /// The action that undoes this one, given the field values it overwrote
    pub fn reversed(&self, prev: &Fields) -> Action {
        Action {
            kind: self.kind.inverse(),
            element: self.element,
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            fields: prev.clone(),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} {}", self.kind, self.element, self.primary)?;
        if let Some(secondary) = &self.secondary {
            write!(f, ".{secondary}")?;
        }
        if self.kind == ActionType::Change && !self.fields.is_empty() {
            let names: Vec<&str> = self.fields.keys().map(String::as_str).collect();
            write!(f, ": {}", names.join(", "))?;
        }
        Ok(())
    }
}

// ── Diff ───────────────────────────────────────────────────────────────

/// Compute the actions that transform `prev` into `next`
///
/// A missing `prev` diffs against an empty snapshot, so every entity of
/// `next` is added. Removing a class or enum emits a single action for the
/// parent; its members or items are not removed individually.
pub fn diff(prev: Option<&Snapshot>, next: &Snapshot) -> Vec<Action> {
    let empty = Snapshot::new();
    let prev = prev.unwrap_or(&empty);
    let mut actions = Vec::new();

    for (name, old) in &prev.classes {
        match next.classes.get(name) {
            Some(new) => diff_class(name, old, new, &mut actions),
            None => actions.push(Action::new(ActionType::Remove, Element::Class, name, None)),
        }
    }
    for (name, new) in &next.classes {
        if !prev.classes.contains_key(name) {
            actions.push(
                Action::new(ActionType::Add, Element::Class, name, None).with_fields(new.fields.clone()),
            );
            for (member_name, member) in &new.members {
                actions.push(add_member(name, member_name, member));
            }
        }
    }

    for (name, old) in &prev.enums {
        match next.enums.get(name) {
            Some(new) => diff_enum(name, old, new, &mut actions),
            None => actions.push(Action::new(ActionType::Remove, Element::Enum, name, None)),
        }
    }
    for (name, new) in &next.enums {
        if !prev.enums.contains_key(name) {
            actions.push(
                Action::new(ActionType::Add, Element::Enum, name, None).with_fields(new.fields.clone()),
            );
            for (item_name, item) in &new.items {
                actions.push(
                    Action::new(ActionType::Add, Element::EnumItem, name, Some(item_name.as_str()))
                        .with_fields(item.fields.clone()),
                );
            }
        }
    }

    actions
}

fn add_member(class: &str, name: &str, member: &Member) -> Action {
    Action::new(
        ActionType::Add,
        Element::from_member_kind(member.kind),
        class,
        Some(name),
    )
    .with_fields(member.fields.clone())
}

fn diff_class(name: &str, old: &Class, new: &Class, actions: &mut Vec<Action>) {
    diff_fields(&old.fields, &new.fields, actions, || {
        Action::new(ActionType::Change, Element::Class, name, None)
    });

    for (member_name, old_member) in &old.members {
        match new.members.get(member_name) {
            Some(new_member) if new_member.kind == old_member.kind => {
                let element = Element::from_member_kind(new_member.kind);
                diff_fields(&old_member.fields, &new_member.fields, actions, || {
                    Action::new(ActionType::Change, element, name, Some(member_name.as_str()))
                });
            }
            Some(new_member) => {
                // Kind changed: the old member goes away and a new one appears
                actions.push(Action::new(
                    ActionType::Remove,
                    Element::from_member_kind(old_member.kind),
                    name,
                    Some(member_name.as_str()),
                ));
                actions.push(add_member(name, member_name, new_member));
            }
            None => actions.push(Action::new(
                ActionType::Remove,
                Element::from_member_kind(old_member.kind),
                name,
                Some(member_name.as_str()),
            )),
        }
    }
    for (member_name, new_member) in &new.members {
        if !old.members.contains_key(member_name) {
            actions.push(add_member(name, member_name, new_member));
        }
    }
}

fn diff_enum(name: &str, old: &Enum, new: &Enum, actions: &mut Vec<Action>) {
    diff_fields(&old.fields, &new.fields, actions, || {
        Action::new(ActionType::Change, Element::Enum, name, None)
    });

    for (item_name, old_item) in &old.items {
        match new.items.get(item_name) {
            Some(new_item) => diff_fields(&old_item.fields, &new_item.fields, actions, || {
                Action::new(ActionType::Change, Element::EnumItem, name, Some(item_name.as_str()))
            }),
            None => actions.push(Action::new(
                ActionType::Remove,
                Element::EnumItem,
                name,
                Some(item_name.as_str()),
            )),
        }
    }
    for (item_name, new_item) in &new.items {
        if !old.items.contains_key(item_name) {
            actions.push(
                Action::new(ActionType::Add, Element::EnumItem, name, Some(item_name.as_str()))
                    .with_fields(new_item.fields.clone()),
            );
        }
    }
}

/// One Change action per differing field. A field dropped in `new` is
/// reported as `Null`.
fn diff_fields(old: &Fields, new: &Fields, actions: &mut Vec<Action>, change: impl Fn() -> Action) {
    for (field, old_value) in old {
        match new.get(field) {
            Some(new_value) if new_value == old_value => {}
            Some(new_value) => actions.push(change().with_field(field, new_value.clone())),
            None => actions.push(change().with_field(field, Value::Null)),
        }
    }
    for (field, new_value) in new {
        if !old.contains_key(field) {
            actions.push(change().with_field(field, new_value.clone()));
        }
    }
}

// ── Inverse ────────────────────────────────────────────────────────────

/// Invert actions against the snapshot they were computed from
///
/// Each result has the opposite polarity and carries the field values the
/// original action overwrote in `base`: nothing for an Add, the whole
/// entity for a Remove (children included for classes and enums), and the
/// prior value of each named field for a Change (`Null` where absent).
pub fn inverse(base: &Snapshot, actions: &[Action]) -> Vec<Action> {
    actions
        .iter()
        .map(|action| action.reversed(&prior_fields(base, action)))
        .collect()
}

fn prior_fields(base: &Snapshot, action: &Action) -> Fields {
    match action.kind {
        ActionType::Add => Fields::new(),
        ActionType::Remove => entity_state(base, action).unwrap_or_default(),
        ActionType::Change => {
            let current = entity_fields(base, action);
            action
                .fields
                .keys()
                .map(|field| {
                    let value = current
                        .and_then(|fields| fields.get(field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    (field.clone(), value)
                })
                .collect()
        }
    }
}

fn entity_fields<'a>(base: &'a Snapshot, action: &Action) -> Option<&'a Fields> {
    match action.element {
        Element::Class => base.classes.get(&action.primary).map(|c| &c.fields),
        Element::Enum => base.enums.get(&action.primary).map(|e| &e.fields),
        Element::EnumItem => base
            .enum_item(&action.primary, action.secondary.as_deref()?)
            .map(|i| &i.fields),
        Element::Property | Element::Function | Element::Event | Element::Callback => base
            .member(&action.primary, action.secondary.as_deref()?)
            .map(|m| &m.fields),
    }
}

fn entity_state(base: &Snapshot, action: &Action) -> Option<Fields> {
    let mut fields = entity_fields(base, action)?.clone();
    match action.element {
        Element::Class => {
            let class = base.classes.get(&action.primary)?;
            fields.insert(String::from(MEMBERS_FIELD), Value::Members(class.members.clone()));
        }
        Element::Enum => {
            let enum_ = base.enums.get(&action.primary)?;
            fields.insert(String::from(ITEMS_FIELD), Value::Items(enum_.items.clone()));
        }
        _ => {}
    }
    Some(fields)
}

// ── Apply ──────────────────────────────────────────────────────────────

/// Apply actions to a snapshot in place
///
/// Actions whose target does not exist (a member of a missing class, a
/// Change of a missing entity) are ignored.
pub fn apply(snapshot: &mut Snapshot, actions: &[Action]) {
    for action in actions {
        apply_action(snapshot, action);
    }
}

fn apply_action(snapshot: &mut Snapshot, action: &Action) {
    match action.element {
        Element::Class => match action.kind {
            ActionType::Add => {
                let mut fields = action.fields.clone();
                let members = fields.remove(MEMBERS_FIELD);
                let class = snapshot.classes.entry(action.primary.clone()).or_default();
                class.fields = fields;
                if let Some(Value::Members(members)) = members {
                    class.members = members;
                }
            }
            ActionType::Remove => {
                snapshot.classes.remove(&action.primary);
            }
            ActionType::Change => {
                if let Some(class) = snapshot.classes.get_mut(&action.primary) {
                    patch_fields(&mut class.fields, &action.fields);
                }
            }
        },
        Element::Enum => match action.kind {
            ActionType::Add => {
                let mut fields = action.fields.clone();
                let items = fields.remove(ITEMS_FIELD);
                let enum_ = snapshot.enums.entry(action.primary.clone()).or_default();
                enum_.fields = fields;
                if let Some(Value::Items(items)) = items {
                    enum_.items = items;
                }
            }
            ActionType::Remove => {
                snapshot.enums.remove(&action.primary);
            }
            ActionType::Change => {
                if let Some(enum_) = snapshot.enums.get_mut(&action.primary) {
                    patch_fields(&mut enum_.fields, &action.fields);
                }
            }
        },
        Element::EnumItem => {
            let Some(name) = &action.secondary else {
                return;
            };
            let Some(enum_) = snapshot.enums.get_mut(&action.primary) else {
                return;
            };
            match action.kind {
                ActionType::Add => {
                    enum_.items.insert(
                        name.clone(),
                        EnumItem {
                            fields: action.fields.clone(),
                        },
                    );
                }
                ActionType::Remove => {
                    enum_.items.remove(name);
                }
                ActionType::Change => {
                    if let Some(item) = enum_.items.get_mut(name) {
                        patch_fields(&mut item.fields, &action.fields);
                    }
                }
            }
        }
        Element::Property | Element::Function | Element::Event | Element::Callback => {
            let (Some(name), Some(kind)) = (&action.secondary, action.element.member_kind()) else {
                return;
            };
            let Some(class) = snapshot.classes.get_mut(&action.primary) else {
                return;
            };
            match action.kind {
                ActionType::Add => {
                    class.members.insert(
                        name.clone(),
                        Member {
                            kind,
                            fields: action.fields.clone(),
                        },
                    );
                }
                ActionType::Remove => {
                    class.members.remove(name);
                }
                ActionType::Change => {
                    if let Some(member) = class.members.get_mut(name) {
                        patch_fields(&mut member.fields, &action.fields);
                    }
                }
            }
        }
    }
}

fn patch_fields(fields: &mut Fields, changes: &Fields) {
    for (name, value) in changes {
        if *value == Value::Null {
            fields.remove(name);
        } else {
            fields.insert(name.clone(), value.clone());
        }
    }
}
