use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::query::{Alias, Insert, Search, Unique, Update};
use super::{BitfieldId, EnumId, FieldId, StructId, Symbol};
use crate::diagnostics::Pos;

/// Storage type of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "of", rename_all = "snake_case")]
pub enum FieldType {
    Int,
    Bit,
    Blob,
    Date,
    Epoch,
    Real,
    Text,
    Email,
    Password,
    Enum(Symbol<EnumId>),
    Bitfield(Symbol<BitfieldId>),
    /// Embedded struct, named through the local field holding the foreign key.
    Struct(Symbol<FieldId>),
}

impl FieldType {
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int => "int",
            FieldType::Bit => "bit",
            FieldType::Blob => "blob",
            FieldType::Date => "date",
            FieldType::Epoch => "epoch",
            FieldType::Real => "real",
            FieldType::Text => "text",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Enum(_) => "enum",
            FieldType::Bitfield(_) => "bitfield",
            FieldType::Struct(_) => "struct",
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, FieldType::Struct(_))
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, FieldType::Text | FieldType::Email)
    }

    /// Types stored as a plain integer column.
    pub fn is_integer_alias(&self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Epoch | FieldType::Bit | FieldType::Enum(_)
        )
    }

    /// Whether a foreign key of this type may point at a field of `other`.
    pub fn key_compatible(&self, other: &FieldType) -> bool {
        match (self, other) {
            (FieldType::Enum(a), FieldType::Enum(b)) => a.target() == b.target(),
            (FieldType::Bitfield(a), FieldType::Bitfield(b)) => a.target() == b.target(),
            (FieldType::Struct(_), _) | (_, FieldType::Struct(_)) => false,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

/// Attribute flags declared on a field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldFlags {
    pub rowid: bool,
    pub unique: bool,
    pub nullable: bool,
    pub noexport: bool,
}

/// Foreign key update/delete action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    Restrict,
    Nullify,
    Cascade,
    Default,
}

/// Literal used for defaults and validation bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Real(f64),
    Text(String),
}

/// Comparator used by a validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

/// Range or length constraint checked on input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Validation {
    pub op: ValidationOp,
    pub value: Literal,
    pub pos: Pos,
}

/// Declared, still symbolic, foreign key of a native field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKey {
    pub target_struct: Symbol<StructId>,
    pub target_field: Symbol<FieldId>,
    pub on_update: Action,
    pub on_delete: Action,
    pub pos: Pos,
}

/// Resolved edge from a field to the field it points at.
///
/// For a foreign key `source` is the field itself; for an embedded struct it
/// is the local field that carries the foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub source: FieldId,
    pub target: FieldId,
    pub on_update: Action,
    pub on_delete: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    pub parent: StructId,
    pub ty: FieldType,
    pub flags: FieldFlags,
    pub default: Option<Literal>,
    pub validations: Vec<Validation>,
    pub foreign: Option<ForeignKey>,
    pub reference: Option<Reference>,
    /// A foreign key was declared but could not be parsed.
    #[serde(skip)]
    pub(crate) malformed_foreign: bool,
}

impl Field {
    pub(crate) fn new(name: String, pos: Pos, parent: StructId, ty: FieldType) -> Self {
        Self {
            name,
            pos,
            doc: None,
            parent,
            ty,
            flags: FieldFlags::default(),
            default: None,
            validations: Vec::new(),
            foreign: None,
            reference: None,
            malformed_foreign: false,
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Rowid or unique: a single equality on this field selects one row.
    pub fn is_unique_key(&self) -> bool {
        self.flags.rowid || self.flags.unique
    }
}

/// Flags computed by the linker for generators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StructFlags {
    pub has_queue: bool,
    pub has_iterator: bool,
    pub has_blob: bool,
    pub has_nullrefs: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Struct {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    pub fields: Vec<FieldId>,
    pub searches: Vec<Search>,
    pub updates: Vec<Update>,
    pub insert: Option<Insert>,
    pub uniques: Vec<Unique>,
    pub rowid: Option<FieldId>,
    pub flags: StructFlags,
    pub height: usize,
    pub aliases: Vec<Alias>,
    /// Foreign keys in other structs that target this one.
    pub referenced_by: Vec<FieldId>,
}

impl Struct {
    pub(crate) fn new(name: String, pos: Pos) -> Self {
        Self {
            name,
            pos,
            doc: None,
            fields: Vec::new(),
            searches: Vec::new(),
            updates: Vec::new(),
            insert: None,
            uniques: Vec::new(),
            rowid: None,
            flags: StructFlags::default(),
            height: 0,
            aliases: Vec::new(),
            referenced_by: Vec::new(),
        }
    }

    pub fn alias(&self, path: &str) -> Option<usize> {
        self.aliases
            .iter()
            .position(|alias| alias.path.eq_ignore_ascii_case(path))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumItem {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    /// Value given in the source; `None` means auto-numbered.
    pub declared: Option<i64>,
    /// Final value, assigned while linking.
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    pub items: Vec<EnumItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BitIndex {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bitfield {
    pub name: String,
    pub pos: Pos,
    pub doc: Option<String>,
    pub items: Vec<BitIndex>,
}
