//! Arena model shared by the front end, the linker and the generators.
//!
//! Every entity lives in a flat vector owned by [`Config`] and is addressed
//! by a copyable id. Cross references start out as [`Symbol`]s holding only a
//! name and are bound to ids by the linker.

mod query;
mod roles;
mod types;

use serde::Serialize;

use crate::diagnostics::Pos;

pub use query::{
    Aggregate, AggregateOp, Alias, Condition, Distinct, FieldPath, Insert, Modifier,
    ModifierKind, Operation, Operator, OrderDirection, OrderTerm, Predicate, Search,
    SearchKind, Unique, Update, UpdateKind,
};
pub use roles::{Role, RoleKind, RoleMap};
pub use types::{
    Action, BitIndex, Bitfield, Enum, EnumItem, Field, FieldFlags, FieldType, ForeignKey,
    Literal, Reference, Struct, StructFlags, Validation, ValidationOp,
};

/// Index of a struct in [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct StructId(pub(crate) usize);

/// Index of a field in [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldId(pub(crate) usize);

/// Index of an enumeration in [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EnumId(pub(crate) usize);

/// Index of a bitfield in [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BitfieldId(pub(crate) usize);

/// Index of a role in [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RoleId(pub(crate) usize);

impl StructId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl FieldId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl RoleId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A by-name reference that the linker binds to a concrete id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Symbol<T> {
    pub name: String,
    pub pos: Pos,
    target: Option<T>,
}

impl<T: Copy> Symbol<T> {
    pub fn new(name: impl Into<String>, pos: Pos) -> Self {
        Self {
            name: name.into(),
            pos,
            target: None,
        }
    }

    /// The bound id, or `None` before (or after failed) linking.
    pub fn target(&self) -> Option<T> {
        self.target
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    pub(crate) fn bind(&mut self, target: T) {
        self.target = Some(target);
    }
}

pub(crate) const ROLE_ALL: RoleId = RoleId(0);
pub(crate) const ROLE_NONE: RoleId = RoleId(1);
pub(crate) const ROLE_DEFAULT: RoleId = RoleId(2);

/// Root of one compilation run: every struct, field, enum, bitfield and role.
///
/// The three reserved roles (`all`, `none`, `default`) exist from creation;
/// declared roles are appended after them.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub(crate) structs: Vec<Struct>,
    pub(crate) fields: Vec<Field>,
    pub(crate) enums: Vec<Enum>,
    pub(crate) bitfields: Vec<Bitfield>,
    pub(crate) roles: Vec<Role>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        let builtin = Pos::file("<builtin>");
        let mut roles = vec![
            Role::reserved("all", RoleKind::Root, builtin.clone(), None),
            Role::reserved("none", RoleKind::Sink, builtin.clone(), Some(ROLE_ALL)),
            Role::reserved("default", RoleKind::Default, builtin, Some(ROLE_ALL)),
        ];
        roles[ROLE_ALL.0].children = vec![ROLE_NONE, ROLE_DEFAULT];

        Self {
            structs: Vec::new(),
            fields: Vec::new(),
            enums: Vec::new(),
            bitfields: Vec::new(),
            roles,
        }
    }

    pub fn add_struct(&mut self, name: impl Into<String>, pos: Pos) -> StructId {
        let id = StructId(self.structs.len());
        self.structs.push(Struct::new(name.into(), pos));
        id
    }

    pub fn add_field(
        &mut self,
        parent: StructId,
        name: impl Into<String>,
        pos: Pos,
        ty: FieldType,
    ) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(Field::new(name.into(), pos, parent, ty));
        self.structs[parent.0].fields.push(id);
        id
    }

    pub fn add_enum(&mut self, value: Enum) -> EnumId {
        let id = EnumId(self.enums.len());
        self.enums.push(value);
        id
    }

    pub fn add_bitfield(&mut self, value: Bitfield) -> BitfieldId {
        let id = BitfieldId(self.bitfields.len());
        self.bitfields.push(value);
        id
    }

    /// Declare a role. The parent edge is only set once linking binds
    /// `parent`; without a parent name the role hangs under `all`.
    pub fn add_role(
        &mut self,
        name: impl Into<String>,
        pos: Pos,
        parent: Option<Symbol<RoleId>>,
        doc: Option<String>,
    ) -> RoleId {
        let id = RoleId(self.roles.len());
        self.roles.push(Role::declared(name.into(), pos, parent, doc));
        id
    }

    pub fn strct(&self, id: StructId) -> &Struct {
        &self.structs[id.0]
    }

    pub fn strct_mut(&mut self, id: StructId) -> &mut Struct {
        &mut self.structs[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.0]
    }

    pub fn field_mut(&mut self, id: FieldId) -> &mut Field {
        &mut self.fields[id.0]
    }

    pub fn enumeration(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn bitfield(&self, id: BitfieldId) -> &Bitfield {
        &self.bitfields[id.0]
    }

    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.0]
    }

    pub fn structs(&self) -> impl Iterator<Item = (StructId, &Struct)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(idx, strct)| (StructId(idx), strct))
    }

    pub fn struct_ids(&self) -> impl Iterator<Item = StructId> + use<> {
        (0..self.structs.len()).map(StructId)
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    pub fn enums(&self) -> impl Iterator<Item = (EnumId, &Enum)> {
        self.enums
            .iter()
            .enumerate()
            .map(|(idx, value)| (EnumId(idx), value))
    }

    pub fn bitfields(&self) -> impl Iterator<Item = (BitfieldId, &Bitfield)> {
        self.bitfields
            .iter()
            .enumerate()
            .map(|(idx, value)| (BitfieldId(idx), value))
    }

    pub fn roles(&self) -> impl Iterator<Item = (RoleId, &Role)> {
        self.roles
            .iter()
            .enumerate()
            .map(|(idx, role)| (RoleId(idx), role))
    }

    /// Fields of a struct in declaration order.
    pub fn fields_of(&self, id: StructId) -> impl Iterator<Item = (FieldId, &Field)> {
        self.structs[id.0]
            .fields
            .iter()
            .map(|field_id| (*field_id, &self.fields[field_id.0]))
    }

    /// Struct-typed fields of a struct with their resolved target struct.
    pub fn embeds(&self, id: StructId) -> impl Iterator<Item = (FieldId, StructId)> + '_ {
        self.fields_of(id).filter_map(|(field_id, field)| {
            if !field.ty.is_struct() {
                return None;
            }
            let target = field.reference.as_ref()?.target;
            Some((field_id, self.fields[target.0].parent))
        })
    }

    /// Look up a struct by case-insensitive name.
    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.structs
            .iter()
            .position(|strct| strct.name.eq_ignore_ascii_case(name))
            .map(StructId)
    }

    /// Look up a field of a struct by case-insensitive name.
    pub fn find_field(&self, parent: StructId, name: &str) -> Option<FieldId> {
        self.fields_of(parent)
            .find(|(_, field)| field.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    /// Look up a role by case-insensitive name, reserved roles included.
    pub fn find_role(&self, name: &str) -> Option<RoleId> {
        self.roles
            .iter()
            .position(|role| role.name.eq_ignore_ascii_case(name))
            .map(RoleId)
    }

    /// Declared roles in declaration order, the reserved ones excluded.
    pub fn declared_roles(&self) -> impl Iterator<Item = (RoleId, &Role)> {
        self.roles().filter(|(_, role)| role.kind == RoleKind::Named)
    }

    /// Role-based access control is active once any role is declared.
    pub fn has_declared_roles(&self) -> bool {
        self.declared_roles().next().is_some()
    }

    /// Roles above `id`, nearest first, ending at `all`.
    pub fn ancestors(&self, id: RoleId) -> impl Iterator<Item = RoleId> + '_ {
        let mut next = self.roles[id.0].parent;
        let mut steps = 0;
        std::iter::from_fn(move || {
            let current = next?;
            // Bounded by the role count so an unlinked cycle cannot spin.
            steps += 1;
            if steps > self.roles.len() {
                return None;
            }
            next = self.roles[current.0].parent;
            Some(current)
        })
    }

    /// True when `ancestor` lies strictly above `id` in the role tree.
    pub fn is_ancestor(&self, ancestor: RoleId, id: RoleId) -> bool {
        self.ancestors(id).any(|role| role == ancestor)
    }
}
