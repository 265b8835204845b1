//! Schema-evolution checks between two linked configs.
//!
//! Names are matched case-insensitively. Differences that a database
//! migration cannot absorb are errors; representation-preserving changes are
//! warnings. Diagnostics comparing two declarations carry the old position
//! first and the new one as `related`.

use std::collections::BTreeSet;

use crate::diagnostics::{Channel, Diagnostic, Diagnostics, Pos};
use crate::linked::LinkedConfig;
use crate::model::{Config, Field, FieldId, Struct, StructId};

/// Compare an old linked config against a new one.
pub fn diff_configs(old: &LinkedConfig, new: &LinkedConfig) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let (old, new) = (old.config(), new.config());

    diff_enums(old, new, &mut diagnostics);

    for (old_id, old_struct) in old.structs() {
        let Some(new_id) = new.find_struct(&old_struct.name) else {
            diagnostics.push_error(Channel::Diff, &old_struct.pos, "table was dropped");
            continue;
        };
        let pair = StructPair {
            old,
            new,
            old_id,
            new_id,
        };
        pair.diff_fields(&mut diagnostics);
        pair.diff_uniques(&mut diagnostics);
    }

    tracing::debug!(
        event = "diff_complete",
        errors = diagnostics.error_count(),
        warnings = diagnostics.warning_count()
    );
    diagnostics
}

fn diff_enums(old: &Config, new: &Config, diagnostics: &mut Diagnostics) {
    for (_, value) in new.enums() {
        let Some((_, previous)) = old
            .enums()
            .find(|(_, candidate)| candidate.name.eq_ignore_ascii_case(&value.name))
        else {
            diagnostics.push_warning(Channel::Diff, &value.pos, "new enumeration");
            continue;
        };

        for item in &value.items {
            match previous
                .items
                .iter()
                .find(|candidate| candidate.name.eq_ignore_ascii_case(&item.name))
            {
                None => diagnostics.push_warning(Channel::Diff, &item.pos, "new item"),
                Some(before) if before.value != item.value => diagnostics.push(
                    Diagnostic::error(Channel::Diff, &before.pos, "item has changed value")
                        .with_related(&item.pos),
                ),
                Some(_) => {}
            }
        }

        for before in &previous.items {
            let kept = value
                .items
                .iter()
                .any(|item| item.name.eq_ignore_ascii_case(&before.name));
            if !kept {
                diagnostics.push_error(Channel::Diff, &before.pos, "lost old item");
            }
        }
    }

    for (_, previous) in old.enums() {
        let kept = new
            .enums()
            .any(|(_, value)| value.name.eq_ignore_ascii_case(&previous.name));
        if !kept {
            diagnostics.push_error(Channel::Diff, &previous.pos, "lost old enumeration");
        }
    }
}

struct StructPair<'a> {
    old: &'a Config,
    new: &'a Config,
    old_id: StructId,
    new_id: StructId,
}

impl StructPair<'_> {
    fn old_struct(&self) -> &Struct {
        self.old.strct(self.old_id)
    }

    fn new_struct(&self) -> &Struct {
        self.new.strct(self.new_id)
    }

    fn diff_fields(&self, diagnostics: &mut Diagnostics) {
        for (_, field) in self.new.fields_of(self.new_id) {
            if field.ty.is_struct() && self.old.find_field(self.old_id, &field.name).is_none() {
                diagnostics.push_warning(Channel::Diff, &field.pos, "new inner joined field");
            }
        }

        for (old_field, before) in self.old.fields_of(self.old_id) {
            match self.new.find_field(self.new_id, &before.name) {
                Some(new_field) => self.diff_field(old_field, new_field, diagnostics),
                None if before.ty.is_struct() => {
                    diagnostics.push_warning(Channel::Diff, &before.pos, "old inner joined field");
                }
                None => diagnostics.push_error(Channel::Diff, &before.pos, "column was dropped"),
            }
        }
    }

    fn diff_field(&self, old_id: FieldId, new_id: FieldId, diagnostics: &mut Diagnostics) {
        let before = self.old.field(old_id);
        let after = self.new.field(new_id);
        let error = |message: String| {
            Diagnostic::error(Channel::Diff, &before.pos, message).with_related(&after.pos)
        };
        let warning = |message: String| {
            Diagnostic::warning(Channel::Diff, &before.pos, message).with_related(&after.pos)
        };

        if std::mem::discriminant(&before.ty) != std::mem::discriminant(&after.ty) {
            let (from, to) = (before.ty.name(), after.ty.name());
            diagnostics.push(
                if before.ty.is_integer_alias() && after.ty.is_integer_alias() {
                    warning(format!("change between integer alias types: {from} to {to}"))
                } else if before.ty.is_textual() && after.ty.is_textual() {
                    warning(format!("change between text alias types: {from} to {to}"))
                } else {
                    error(format!("type change: {from} to {to}"))
                },
            );
        }

        if !same_attributes(before, after) {
            diagnostics.push(error("attribute change".to_string()));
        }

        // Struct fields share the reference of their source column.
        if before.ty.is_struct() || after.ty.is_struct() {
            return;
        }

        match (before.reference, after.reference) {
            (Some(old_ref), Some(new_ref)) => {
                if old_ref.on_delete != new_ref.on_delete {
                    diagnostics.push(error("delete action change".to_string()));
                }
                if old_ref.on_update != new_ref.on_update {
                    diagnostics.push(error("update action change".to_string()));
                }
                let old_target = &self.old.strct(self.old.field(old_ref.target).parent).name;
                let new_target = &self.new.strct(self.new.field(new_ref.target).parent).name;
                if !old_target.eq_ignore_ascii_case(new_target) {
                    diagnostics.push(error("foreign reference target change".to_string()));
                }
            }
            (None, None) => {}
            _ => diagnostics.push(error("foreign reference change".to_string())),
        }
    }

    fn diff_uniques(&self, diagnostics: &mut Diagnostics) {
        let old_sets = unique_sets(self.old, self.old_struct());
        let new_sets = unique_sets(self.new, self.new_struct());

        for (set, pos) in &new_sets {
            if !old_sets.iter().any(|(other, _)| other == set) {
                diagnostics.push_error(Channel::Diff, pos, "new unique fields");
            }
        }
        for (set, pos) in &old_sets {
            if !new_sets.iter().any(|(other, _)| other == set) {
                diagnostics.push_error(Channel::Diff, pos, "unique field disappeared");
            }
        }
    }
}

/// Storage attributes; `noexport` only affects generated output.
fn same_attributes(before: &Field, after: &Field) -> bool {
    before.flags.rowid == after.flags.rowid
        && before.flags.unique == after.flags.unique
        && before.flags.nullable == after.flags.nullable
}

/// Unique constraints as lowercase field-name sets.
fn unique_sets<'a>(config: &Config, strct: &'a Struct) -> Vec<(BTreeSet<String>, &'a Pos)> {
    strct
        .uniques
        .iter()
        .map(|unique| {
            let names = unique
                .fields
                .iter()
                .map(|symbol| match symbol.target() {
                    Some(id) => config.field(id).name.to_ascii_lowercase(),
                    None => symbol.name.to_ascii_lowercase(),
                })
                .collect();
            (names, &unique.pos)
        })
        .collect()
}
