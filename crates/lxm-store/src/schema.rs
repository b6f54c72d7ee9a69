//! Custom field schema.
//!
//! Custom fields extend a record kind with a named slot of a declared type.
//! Values live beside the records, keyed by `(record, field)`.

use std::fmt;

use serde::{Deserialize, Serialize};

use lxm_types::{MultiText, RecordId};

use crate::record::RecordKind;

/// Handle of a custom field definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

/// Value type of a custom field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldType {
    /// Single-writing-system text.
    String,
    /// Text with one alternative per writing system.
    MultiString,
    Integer,
    /// Generic (possibly fuzzy) date kept in its document form.
    GenDate,
    Binary,
    Image,
    /// Reference to one vocabulary item.
    ReferenceAtom,
    /// Unordered references to vocabulary items.
    ReferenceCollection,
    /// Ordered references to vocabulary items.
    ReferenceSequence,
}

impl FieldType {
    /// Parse the `Type=` value of a field descriptor.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "String" | "Unicode" => Some(FieldType::String),
            "MultiString" | "MultiUnicode" => Some(FieldType::MultiString),
            "Integer" => Some(FieldType::Integer),
            "GenDate" => Some(FieldType::GenDate),
            "Binary" => Some(FieldType::Binary),
            "Image" => Some(FieldType::Image),
            "ReferenceAtom" | "ReferenceAtomic" => Some(FieldType::ReferenceAtom),
            "ReferenceCollection" => Some(FieldType::ReferenceCollection),
            "ReferenceSequence" => Some(FieldType::ReferenceSequence),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            FieldType::ReferenceAtom | FieldType::ReferenceCollection | FieldType::ReferenceSequence
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::MultiString => "MultiString",
            FieldType::Integer => "Integer",
            FieldType::GenDate => "GenDate",
            FieldType::Binary => "Binary",
            FieldType::Image => "Image",
            FieldType::ReferenceAtom => "ReferenceAtom",
            FieldType::ReferenceCollection => "ReferenceCollection",
            FieldType::ReferenceSequence => "ReferenceSequence",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A custom field of one record kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFieldDef {
    pub id: FieldId,
    pub name: String,
    pub owner: RecordKind,
    pub field_type: FieldType,
    /// Writing-system selector (`kwsVern`, `kwsAnal`, a tag, ...).
    pub ws_selector: Option<String>,
    /// Target vocabulary of reference-valued fields.
    pub vocabulary: Option<String>,
}

/// The value of one custom field on one record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum CustomValue {
    Text(String),
    MultiText(MultiText),
    Integer(i64),
    GenDate(String),
    Binary(Vec<u8>),
    Reference(RecordId),
    References(Vec<RecordId>),
}

impl CustomValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CustomValue::Text(s) | CustomValue::GenDate(s) => s.is_empty(),
            CustomValue::MultiText(t) => t.is_empty(),
            CustomValue::Integer(i) => *i == 0,
            CustomValue::Binary(b) => b.is_empty(),
            CustomValue::Reference(_) => false,
            CustomValue::References(r) => r.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptor_type_names() {
        assert_eq!(FieldType::parse("MultiUnicode"), Some(FieldType::MultiString));
        assert_eq!(FieldType::parse("ReferenceAtomic"), Some(FieldType::ReferenceAtom));
        assert_eq!(FieldType::parse("OwningAtom"), None);
    }

    #[test]
    fn empty_values() {
        assert!(CustomValue::Text(String::new()).is_empty());
        assert!(CustomValue::References(vec![]).is_empty());
        assert!(!CustomValue::Reference(RecordId(1)).is_empty());
    }
}
