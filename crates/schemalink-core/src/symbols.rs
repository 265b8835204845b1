use std::collections::HashMap;

use crate::diagnostics::{Channel, Diagnostics, Pos};
use crate::model::{BitfieldId, Config, EnumId, FieldId, RoleId, StructId};

/// Case-insensitive name index over every source merged into a [`Config`].
///
/// The first declaration of a name wins; later ones are reported and left
/// unreachable by name.
#[derive(Debug, Default)]
pub(crate) struct Namespace {
    structs: HashMap<String, StructId>,
    fields: HashMap<(StructId, String), FieldId>,
    enums: HashMap<String, EnumId>,
    bitfields: HashMap<String, BitfieldId>,
    roles: HashMap<String, RoleId>,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

fn insert_unique<K, V: Copy>(
    map: &mut HashMap<K, V>,
    key: K,
    value: V,
    first_pos: impl Fn(V) -> Pos,
    pos: &Pos,
    message: String,
    diagnostics: &mut Diagnostics,
) where
    K: std::hash::Hash + Eq,
{
    if let Some(existing) = map.get(&key) {
        let first = first_pos(*existing);
        diagnostics.push_error(
            Channel::Resolve,
            pos,
            format!("{message} (first declared at {first})"),
        );
        return;
    }
    map.insert(key, value);
}

impl Namespace {
    pub(crate) fn build(config: &Config, diagnostics: &mut Diagnostics) -> Self {
        let mut names = Self::default();

        for (id, strct) in config.structs() {
            insert_unique(
                &mut names.structs,
                key(&strct.name),
                id,
                |prev| config.strct(prev).pos.clone(),
                &strct.pos,
                format!("duplicate structure name: {}", strct.name),
                diagnostics,
            );
            for (field_id, field) in config.fields_of(id) {
                insert_unique(
                    &mut names.fields,
                    (id, key(&field.name)),
                    field_id,
                    |prev| config.field(prev).pos.clone(),
                    &field.pos,
                    format!("duplicate field name: {}.{}", strct.name, field.name),
                    diagnostics,
                );
            }
        }

        for (id, value) in config.enums() {
            insert_unique(
                &mut names.enums,
                key(&value.name),
                id,
                |prev| config.enumeration(prev).pos.clone(),
                &value.pos,
                format!("duplicate enumeration name: {}", value.name),
                diagnostics,
            );
        }

        for (id, value) in config.bitfields() {
            insert_unique(
                &mut names.bitfields,
                key(&value.name),
                id,
                |prev| config.bitfield(prev).pos.clone(),
                &value.pos,
                format!("duplicate bitfield name: {}", value.name),
                diagnostics,
            );
        }

        for (id, role) in config.roles() {
            if let Some(existing) = names.roles.get(&key(&role.name))
                && config.role(*existing).kind.is_reserved()
            {
                diagnostics.push_error(
                    Channel::Roles,
                    &role.pos,
                    format!("reserved role name cannot be redeclared: {}", role.name),
                );
                continue;
            }
            insert_unique(
                &mut names.roles,
                key(&role.name),
                id,
                |prev| config.role(prev).pos.clone(),
                &role.pos,
                format!("duplicate role name: {}", role.name),
                diagnostics,
            );
        }

        names
    }

    pub(crate) fn strct(&self, name: &str) -> Option<StructId> {
        self.structs.get(&key(name)).copied()
    }

    pub(crate) fn field(&self, parent: StructId, name: &str) -> Option<FieldId> {
        self.fields.get(&(parent, key(name))).copied()
    }

    pub(crate) fn enumeration(&self, name: &str) -> Option<EnumId> {
        self.enums.get(&key(name)).copied()
    }

    pub(crate) fn bitfield(&self, name: &str) -> Option<BitfieldId> {
        self.bitfields.get(&key(name)).copied()
    }

    pub(crate) fn role(&self, name: &str) -> Option<RoleId> {
        self.roles.get(&key(name)).copied()
    }
}
