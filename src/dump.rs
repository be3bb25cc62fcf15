//! API dump representation
//!
//! In-memory snapshot of an API surface: classes with their members, enums
//! with their items. Every entity carries an open set of named fields so the
//! diff engine can compare and patch them generically.
//!
//! Author: Moroya Sakamoto

use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Named field values of one entity
pub type Fields = BTreeMap<String, Value>;

/// Field name holding a removed class's members
pub const MEMBERS_FIELD: &str = "Members";
/// Field name holding a removed enum's items
pub const ITEMS_FIELD: &str = "Items";

/// What sort of member of a class this is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemberKind {
    Property,
    Function,
    Event,
    Callback,
}

/// A reference to a type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeDesc {
    /// "Class", "Enum", "DataType", "Primitive", "Group"
    pub category: String,
    pub name: String,
}

impl TypeDesc {
    pub fn new(category: &str, name: &str) -> Self {
        Self {
            category: String::from(category),
            name: String::from(name),
        }
    }
}

/// A function, event or callback parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDesc,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(name: &str, ty: TypeDesc) -> Self {
        Self {
            name: String::from(name),
            ty,
            default: None,
        }
    }
}

/// Value of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Field absent; patching with `Null` deletes the field
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Tags(Vec<String>),
    Type(TypeDesc),
    Types(Vec<TypeDesc>),
    Parameter(Parameter),
    Parameters(Vec<Parameter>),
    /// Full member set of a class, carried by the inverse of a class removal
    Members(BTreeMap<String, Member>),
    /// Full item set of an enum, carried by the inverse of an enum removal
    Items(BTreeMap<String, EnumItem>),
}

/// Class member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub kind: MemberKind,
    #[serde(default)]
    pub fields: Fields,
}

impl Member {
    pub fn new(kind: MemberKind) -> Self {
        Self {
            kind,
            fields: Fields::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(String::from(name), value);
        self
    }
}

/// Class and its members
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub members: BTreeMap<String, Member>,
}

impl Class {
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(String::from(name), value);
        self
    }

    pub fn with_member(mut self, name: &str, member: Member) -> Self {
        self.members.insert(String::from(name), member);
        self
    }
}

/// Enum item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumItem {
    #[serde(default)]
    pub fields: Fields,
}

impl EnumItem {
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(String::from(name), value);
        self
    }
}

/// Enum and its items
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enum {
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub items: BTreeMap<String, EnumItem>,
}

impl Enum {
    pub fn with_field(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(String::from(name), value);
        self
    }

    pub fn with_item(mut self, name: &str, item: EnumItem) -> Self {
        self.items.insert(String::from(name), item);
        self
    }
}

/// Whole API surface at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub classes: BTreeMap<String, Class>,
    #[serde(default)]
    pub enums: BTreeMap<String, Enum>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a snapshot from a JSON artifact
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Encode as a JSON artifact
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn with_class(mut self, name: &str, class: Class) -> Self {
        self.classes.insert(String::from(name), class);
        self
    }

    pub fn with_enum(mut self, name: &str, enum_: Enum) -> Self {
        self.enums.insert(String::from(name), enum_);
        self
    }

    /// Look up a member by class and member name
    pub fn member(&self, class: &str, member: &str) -> Option<&Member> {
        self.classes.get(class)?.members.get(member)
    }

    /// Look up an enum item by enum and item name
    pub fn enum_item(&self, enum_: &str, item: &str) -> Option<&EnumItem> {
        self.enums.get(enum_)?.items.get(item)
    }

    /// Total number of members over all classes
    pub fn member_count(&self) -> usize {
        self.classes.values().map(|c| c.members.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.enums.is_empty()
    }
}
