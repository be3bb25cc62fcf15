//! Identifiers for API entities
//!
//! Plain string names plus the composite keys the history indexes use.
//!
//! Author: Moroya Sakamoto

use serde::{Deserialize, Serialize};

/// Class name.
pub type ClassId = String;
/// Member name, unique within its class.
pub type MemberName = String;
/// Enum name.
pub type EnumId = String;
/// Enum item name, unique within its enum.
pub type EnumItemName = String;
/// Type category ("Class", "Enum", "DataType", "Primitive", ...).
pub type TypeCategory = String;
/// Type name.
pub type TypeName = String;

/// A member within a class.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    pub class: ClassId,
    pub member: MemberName,
}

impl MemberKey {
    pub fn new(class: impl Into<ClassId>, member: impl Into<MemberName>) -> Self {
        Self {
            class: class.into(),
            member: member.into(),
        }
    }
}

/// An item within an enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnumItemKey {
    #[serde(rename = "enum")]
    pub enum_id: EnumId,
    pub item: EnumItemName,
}

impl EnumItemKey {
    pub fn new(enum_id: impl Into<EnumId>, item: impl Into<EnumItemName>) -> Self {
        Self {
            enum_id: enum_id.into(),
            item: item.into(),
        }
    }
}

/// A type within its category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    pub category: TypeCategory,
    pub name: TypeName,
}

impl TypeKey {
    pub fn new(category: impl Into<TypeCategory>, name: impl Into<TypeName>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }
}
