//! Reference resolution.
//!
//! Binds every symbolic name in the config to an arena id. Each broken symbol
//! yields one diagnostic and resolution carries on with the next one, so a
//! single run reports every failure.

use std::collections::HashSet;

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{
    Config, Distinct, FieldId, FieldPath, FieldType, Reference, StructId, Symbol, UpdateKind,
};
use crate::symbols::Namespace;

pub(crate) fn resolve(config: &mut Config, names: &Namespace) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    number_enums(config, &mut diagnostics);
    check_bitfields(config, &mut diagnostics);
    resolve_rowids(config, &mut diagnostics);
    resolve_value_types(config, names, &mut diagnostics);
    resolve_foreign_keys(config, names, &mut diagnostics);
    resolve_struct_fields(config, names, &mut diagnostics);
    check_validations(config, &mut diagnostics);
    resolve_queries(config, names, &mut diagnostics);

    tracing::debug!(
        event = "resolve_complete",
        errors = diagnostics.error_count(),
        warnings = diagnostics.warning_count()
    );
    diagnostics
}

/// Assign auto values and reject duplicate item names or values.
fn number_enums(config: &mut Config, diagnostics: &mut Diagnostics) {
    for value in &mut config.enums {
        let mut next = 0_i64;
        for item in &mut value.items {
            item.value = match item.declared {
                Some(declared) => declared,
                None => next,
            };
            next = next.max(item.value.saturating_add(1));
        }

        let mut seen_names = HashSet::new();
        let mut seen_values = HashSet::new();
        for item in &value.items {
            if !seen_names.insert(item.name.to_ascii_lowercase()) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &item.pos,
                    format!("duplicate enumeration item: {}.{}", value.name, item.name),
                );
            }
            if !seen_values.insert(item.value) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &item.pos,
                    format!(
                        "duplicate enumeration value: {}.{} = {}",
                        value.name, item.name, item.value
                    ),
                );
            }
        }
    }
}

fn check_bitfields(config: &Config, diagnostics: &mut Diagnostics) {
    for (_, value) in config.bitfields() {
        let mut seen_names = HashSet::new();
        let mut seen_bits = HashSet::new();
        for item in &value.items {
            if !(0..=63).contains(&item.value) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &item.pos,
                    format!("bit index out of range: {}.{} = {}", value.name, item.name, item.value),
                );
            }
            if !seen_names.insert(item.name.to_ascii_lowercase()) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &item.pos,
                    format!("duplicate bitfield item: {}.{}", value.name, item.name),
                );
            }
            if !seen_bits.insert(item.value) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &item.pos,
                    format!("duplicate bit index: {}.{} = {}", value.name, item.name, item.value),
                );
            }
        }
    }
}

fn resolve_rowids(config: &mut Config, diagnostics: &mut Diagnostics) {
    for id in config.struct_ids() {
        let mut rowid = None;
        for (field_id, field) in config.fields_of(id) {
            if !field.flags.rowid {
                continue;
            }
            if field.flags.nullable {
                diagnostics.push_error(
                    Channel::Resolve,
                    &field.pos,
                    format!("rowid field cannot be null: {}", field.name),
                );
            }
            if !matches!(field.ty, FieldType::Int) {
                diagnostics.push_error(
                    Channel::Resolve,
                    &field.pos,
                    format!("rowid field must be an int: {}", field.name),
                );
            }
            if rowid.is_some() {
                diagnostics.push_error(
                    Channel::Resolve,
                    &field.pos,
                    format!("multiple rowid fields: {}", field.name),
                );
            } else {
                rowid = Some(field_id);
            }
        }
        config.strct_mut(id).rowid = rowid;
    }
}

/// Bind enum-valued and bitfield-valued field types.
fn resolve_value_types(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    for field in &mut config.fields {
        match &mut field.ty {
            FieldType::Enum(symbol) => match names.enumeration(&symbol.name) {
                Some(id) => symbol.bind(id),
                None => diagnostics.push_error(
                    Channel::Resolve,
                    &symbol.pos,
                    format!("unknown enumeration: {}", symbol.name),
                ),
            },
            FieldType::Bitfield(symbol) => match names.bitfield(&symbol.name) {
                Some(id) => symbol.bind(id),
                None => diagnostics.push_error(
                    Channel::Resolve,
                    &symbol.pos,
                    format!("unknown bitfield: {}", symbol.name),
                ),
            },
            _ => {}
        }
    }
}

/// Bind foreign keys and record the resulting references.
///
/// The target must be a rowid or unique field of a key-compatible type.
fn resolve_foreign_keys(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    for index in 0..config.fields.len() {
        let id = FieldId(index);
        let Some(mut foreign) = config.fields[index].foreign.take() else {
            continue;
        };

        let target_struct = names.strct(&foreign.target_struct.name);
        let target_field = target_struct
            .and_then(|strct| names.field(strct, &foreign.target_field.name));

        match (target_struct, target_field) {
            (None, _) => diagnostics.push_error(
                Channel::Resolve,
                &foreign.pos,
                format!("unknown reference target structure: {}", foreign.target_struct.name),
            ),
            (Some(_), None) => diagnostics.push_error(
                Channel::Resolve,
                &foreign.pos,
                format!(
                    "unknown reference target field: {}.{}",
                    foreign.target_struct.name, foreign.target_field.name
                ),
            ),
            (Some(strct), Some(target)) => {
                foreign.target_struct.bind(strct);
                foreign.target_field.bind(target);

                let source = config.field(id);
                let dest = config.field(target);
                let mut valid = true;
                if target == id {
                    diagnostics.push_error(
                        Channel::Resolve,
                        &foreign.pos,
                        format!("field references itself: {}", source.name),
                    );
                    valid = false;
                } else if !dest.is_unique_key() {
                    diagnostics.push_error(
                        Channel::Resolve,
                        &foreign.pos,
                        format!(
                            "reference target must be a rowid or unique field: {}.{}",
                            config.strct(strct).name,
                            dest.name
                        ),
                    );
                    valid = false;
                } else if !source.ty.key_compatible(&dest.ty) {
                    diagnostics.push_error(
                        Channel::Resolve,
                        &foreign.pos,
                        format!(
                            "reference type mismatch: {} references {}",
                            source.ty.name(),
                            dest.ty.name()
                        ),
                    );
                    valid = false;
                }

                if valid {
                    config.fields[index].reference = Some(Reference {
                        source: id,
                        target,
                        on_update: foreign.on_update,
                        on_delete: foreign.on_delete,
                    });
                    config.strct_mut(strct).referenced_by.push(id);
                }
            }
        }

        config.fields[index].foreign = Some(foreign);
    }
}

/// Bind embedded-struct fields through their local foreign-key source field.
fn resolve_struct_fields(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    let mut bindings = Vec::new();

    for (index, field) in config.fields.iter().enumerate() {
        let FieldType::Struct(symbol) = &field.ty else {
            continue;
        };
        let Some(source_id) = names.field(field.parent, &symbol.name) else {
            diagnostics.push_error(
                Channel::Resolve,
                &symbol.pos,
                format!("unknown struct source field: {}", symbol.name),
            );
            continue;
        };

        let source = config.field(source_id);
        if source.ty.is_struct() {
            diagnostics.push_error(
                Channel::Resolve,
                &symbol.pos,
                format!("struct source field is itself a struct: {}", source.name),
            );
            continue;
        }

        match (&source.foreign, source.reference) {
            (None, _) if !source.malformed_foreign => diagnostics.push_error(
                Channel::Resolve,
                &symbol.pos,
                format!("struct source field has no foreign key: {}", source.name),
            ),
            // The foreign key itself failed and has been reported.
            (None, _) | (Some(_), None) => {}
            (Some(_), Some(reference)) => bindings.push((index, source_id, reference)),
        }
    }

    for (index, source_id, reference) in bindings {
        let field = &mut config.fields[index];
        if let FieldType::Struct(symbol) = &mut field.ty {
            symbol.bind(source_id);
        }
        field.reference = Some(reference);
    }
}

fn check_validations(config: &Config, diagnostics: &mut Diagnostics) {
    for field in &config.fields {
        if field.validations.is_empty() {
            continue;
        }
        if matches!(field.ty, FieldType::Struct(_) | FieldType::Enum(_)) {
            diagnostics.push_error(
                Channel::Resolve,
                &field.pos,
                format!("validation rules not allowed on {} fields", field.ty.name()),
            );
        }
    }
}

fn resolve_queries(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    for id in config.struct_ids() {
        let mut searches = std::mem::take(&mut config.strct_mut(id).searches);
        let mut updates = std::mem::take(&mut config.strct_mut(id).updates);
        let mut uniques = std::mem::take(&mut config.strct_mut(id).uniques);

        let walker = PathWalker {
            config: &*config,
            names,
            origin: id,
        };

        for search in &mut searches {
            for param in &mut search.params {
                walker.field_path(&mut param.path, "search", diagnostics);
            }
            for term in &mut search.order {
                walker.field_path(&mut term.path, "order", diagnostics);
            }
            if let Some(aggregate) = &mut search.aggregate {
                walker.field_path(&mut aggregate.path, "aggregate", diagnostics);
            }
            if let Some(group) = &mut search.group {
                walker.field_path(group, "group", diagnostics);
            }
            if let Some(distinct) = &mut search.distinct {
                walker.distinct(distinct, diagnostics);
            }
        }

        for update in &mut updates {
            if update.kind == UpdateKind::Modify && update.modifies.is_empty() && !update.all {
                diagnostics.push_error(
                    Channel::Resolve,
                    &update.pos,
                    "update has no fields to modify",
                );
            }
            for modifier in &mut update.modifies {
                walker.local_field(&mut modifier.field, "modify", diagnostics);
            }
            for condition in &mut update.constraints {
                walker.local_field(&mut condition.field, "constrain", diagnostics);
            }
        }

        for unique in &mut uniques {
            for field in &mut unique.fields {
                walker.local_field(field, "unique", diagnostics);
            }
        }

        let strct = config.strct_mut(id);
        strct.searches = searches;
        strct.updates = updates;
        strct.uniques = uniques;
    }
}

/// Resolves field names and dotted paths relative to one struct.
struct PathWalker<'a> {
    config: &'a Config,
    names: &'a Namespace,
    origin: StructId,
}

impl PathWalker<'_> {
    /// Follow a struct field to the struct it embeds.
    fn step(&self, field: FieldId) -> Option<StructId> {
        let field = self.config.field(field);
        if !field.ty.is_struct() {
            return None;
        }
        let reference = field.reference?;
        Some(self.config.field(reference.target).parent)
    }

    fn field_path(&self, path: &mut FieldPath, context: &str, diagnostics: &mut Diagnostics) {
        let dotted = path.dotted();
        let mut current = self.origin;
        let last = path.segments.len().saturating_sub(1);

        for (index, segment) in path.segments.iter_mut().enumerate() {
            let Some(id) = self.names.field(current, &segment.name) else {
                diagnostics.push_error(
                    Channel::Resolve,
                    &segment.pos,
                    format!("unknown {context} field: {dotted}"),
                );
                return;
            };
            segment.bind(id);

            if index < last {
                let Some(next) = self.step(id) else {
                    diagnostics.push_error(
                        Channel::Resolve,
                        &segment.pos,
                        format!("{context} path component is not a struct: {dotted}"),
                    );
                    return;
                };
                current = next;
            } else if self.config.field(id).ty.is_struct() {
                diagnostics.push_error(
                    Channel::Resolve,
                    &segment.pos,
                    format!("cannot {context} on a struct field: {dotted}"),
                );
            }
        }
    }

    fn distinct(&self, distinct: &mut Distinct, diagnostics: &mut Diagnostics) {
        let mut current = self.origin;
        for segment in &mut distinct.path {
            let Some(id) = self.names.field(current, &segment.name) else {
                diagnostics.push_error(
                    Channel::Resolve,
                    &segment.pos,
                    format!("unknown distinct field: {}", segment.name),
                );
                return;
            };
            segment.bind(id);
            let Some(next) = self.step(id) else {
                diagnostics.push_error(
                    Channel::Resolve,
                    &segment.pos,
                    format!("distinct path component is not a struct: {}", segment.name),
                );
                return;
            };
            current = next;
        }
        distinct.target = Some(current);
    }

    fn local_field(&self, symbol: &mut Symbol<FieldId>, context: &str, diagnostics: &mut Diagnostics) {
        let Some(id) = self.names.field(self.origin, &symbol.name) else {
            diagnostics.push_error(
                Channel::Resolve,
                &symbol.pos,
                format!("unknown {context} field: {}", symbol.name),
            );
            return;
        };
        if self.config.field(id).ty.is_struct() {
            diagnostics.push_error(
                Channel::Resolve,
                &symbol.pos,
                format!("cannot {context} a struct field: {}", symbol.name),
            );
            return;
        }
        symbol.bind(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Pos;
    use crate::model::{
        Action, Enum, EnumItem, FieldFlags, ForeignKey, Predicate, Search, SearchKind, Update,
    };

    fn pos(line: usize) -> Pos {
        Pos::new("test.json", line, 1)
    }

    fn foreign(strct: &str, field: &str, line: usize) -> ForeignKey {
        ForeignKey {
            target_struct: Symbol::new(strct, pos(line)),
            target_field: Symbol::new(field, pos(line)),
            on_update: Action::None,
            on_delete: Action::Cascade,
            pos: pos(line),
        }
    }

    fn run(config: &mut Config) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let names = Namespace::build(config, &mut diagnostics);
        diagnostics.merge(resolve(config, &names));
        diagnostics
    }

    fn messages(diagnostics: &Diagnostics) -> Vec<String> {
        diagnostics.iter().map(|diag| diag.message.clone()).collect()
    }

    fn user_and_post(config: &mut Config) -> (StructId, StructId, FieldId, FieldId) {
        let user = config.add_struct("user", pos(1));
        let user_id = config.add_field(user, "id", pos(2), FieldType::Int);
        config.field_mut(user_id).flags.rowid = true;
        let post = config.add_struct("post", pos(3));
        let post_id = config.add_field(post, "id", pos(4), FieldType::Int);
        config.field_mut(post_id).flags.rowid = true;
        (user, post, user_id, post_id)
    }

    #[test]
    fn forward_references_resolve_with_back_links() {
        let mut config = Config::new();
        // post is declared before the user it points at
        let post = config.add_struct("post", pos(1));
        let author_id = config.add_field(post, "authorid", pos(2), FieldType::Int);
        config.field_mut(author_id).foreign = Some(foreign("User", "ID", 2));
        let author = config.add_field(
            post,
            "author",
            pos(3),
            FieldType::Struct(Symbol::new("authorid", pos(3))),
        );
        let user = config.add_struct("user", pos(4));
        let user_id = config.add_field(user, "id", pos(5), FieldType::Int);
        config.field_mut(user_id).flags.rowid = true;

        let diagnostics = run(&mut config);
        assert!(diagnostics.is_empty(), "{:?}", messages(&diagnostics));

        let reference = config.field(author_id).reference.expect("foreign key reference");
        assert_eq!(reference.target, user_id);
        assert_eq!(reference.on_delete, Action::Cascade);
        assert_eq!(config.field(author).reference, Some(reference));
        assert_eq!(config.strct(user).referenced_by, vec![author_id]);
        assert_eq!(config.embeds(post).collect::<Vec<_>>(), vec![(author, user)]);
    }

    #[test]
    fn every_broken_symbol_is_reported() {
        let mut config = Config::new();
        let (_, post, _, _) = user_and_post(&mut config);
        let a = config.add_field(post, "a", pos(10), FieldType::Int);
        config.field_mut(a).foreign = Some(foreign("ghost", "id", 10));
        let b = config.add_field(post, "b", pos(11), FieldType::Int);
        config.field_mut(b).foreign = Some(foreign("user", "missing", 11));
        config.add_field(
            post,
            "c",
            pos(12),
            FieldType::Enum(Symbol::new("colour", pos(12))),
        );

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec![
                "unknown enumeration: colour",
                "unknown reference target structure: ghost",
                "unknown reference target field: user.missing",
            ]
        );
        assert!(config.field(a).reference.is_none());
    }

    #[test]
    fn foreign_keys_need_unique_compatible_targets() {
        let mut config = Config::new();
        let (user, post, _, _) = user_and_post(&mut config);
        config.add_field(user, "name", pos(5), FieldType::Text);
        let email = config.add_field(user, "email", pos(6), FieldType::Email);
        config.field_mut(email).flags = FieldFlags {
            unique: true,
            ..FieldFlags::default()
        };

        let by_name = config.add_field(post, "byname", pos(7), FieldType::Text);
        config.field_mut(by_name).foreign = Some(foreign("user", "name", 7));
        let by_email = config.add_field(post, "byemail", pos(8), FieldType::Int);
        config.field_mut(by_email).foreign = Some(foreign("user", "email", 8));

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec![
                "reference target must be a rowid or unique field: user.name",
                "reference type mismatch: int references email",
            ]
        );
    }

    #[test]
    fn struct_source_must_carry_a_foreign_key() {
        let mut config = Config::new();
        let (_, post, _, _) = user_and_post(&mut config);
        config.add_field(post, "plain", pos(5), FieldType::Int);
        config.add_field(
            post,
            "author",
            pos(6),
            FieldType::Struct(Symbol::new("plain", pos(6))),
        );

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec!["struct source field has no foreign key: plain"]
        );
    }

    #[test]
    fn enums_are_auto_numbered_after_the_largest_value() {
        let mut config = Config::new();
        let item = |name: &str, declared: Option<i64>| EnumItem {
            name: name.to_string(),
            pos: pos(1),
            doc: None,
            declared,
            value: 0,
        };
        config.add_enum(Enum {
            name: "state".to_string(),
            pos: pos(1),
            doc: None,
            items: vec![item("new", None), item("open", Some(10)), item("closed", None)],
        });
        config.add_enum(Enum {
            name: "clash".to_string(),
            pos: pos(2),
            doc: None,
            items: vec![item("a", Some(1)), item("b", None), item("c", Some(2))],
        });

        let diagnostics = run(&mut config);
        let values: Vec<i64> = config.enums[0].items.iter().map(|item| item.value).collect();
        assert_eq!(values, vec![0, 10, 11]);
        assert_eq!(
            messages(&diagnostics),
            vec!["duplicate enumeration value: clash.c = 2"]
        );
    }

    #[test]
    fn dotted_paths_walk_struct_fields() {
        let mut config = Config::new();
        let (user, post, _, _) = user_and_post(&mut config);
        let name = config.add_field(user, "name", pos(5), FieldType::Text);
        let author_id = config.add_field(post, "authorid", pos(6), FieldType::Int);
        config.field_mut(author_id).foreign = Some(foreign("user", "id", 6));
        let author = config.add_field(
            post,
            "author",
            pos(7),
            FieldType::Struct(Symbol::new("authorid", pos(7))),
        );

        let mut search = Search::new(SearchKind::List, pos(8));
        let path = FieldPath::new(
            vec![Symbol::new("author", pos(8)), Symbol::new("name", pos(8))],
            pos(8),
        );
        search.params.push(Predicate {
            path,
            op: crate::model::Operator::Eq,
            pos: pos(8),
        });
        let mut bad = Search::new(SearchKind::List, pos(9));
        bad.params.push(Predicate {
            path: FieldPath::new(
                vec![Symbol::new("authorid", pos(9)), Symbol::new("name", pos(9))],
                pos(9),
            ),
            op: crate::model::Operator::Eq,
            pos: pos(9),
        });
        config.strct_mut(post).searches = vec![search, bad];

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec!["search path component is not a struct: authorid.name"]
        );
        let resolved = &config.strct(post).searches[0].params[0].path;
        assert_eq!(resolved.segments[0].target(), Some(author));
        assert_eq!(resolved.field(), Some(name));
    }

    #[test]
    fn modify_update_needs_fields_or_all() {
        let mut config = Config::new();
        let (user, _, _, _) = user_and_post(&mut config);
        let mut empty = Update::new(UpdateKind::Modify, pos(9));
        empty.constraints.push(crate::model::Condition {
            field: Symbol::new("id", pos(9)),
            op: crate::model::Operator::Eq,
            pos: pos(9),
        });
        let mut everything = Update::new(UpdateKind::Modify, pos(10));
        everything.all = true;
        let delete = Update::new(UpdateKind::Delete, pos(11));
        config.strct_mut(user).updates = vec![empty, everything, delete];

        let diagnostics = run(&mut config);
        assert_eq!(messages(&diagnostics), vec!["update has no fields to modify"]);
        assert!(config.strct(user).updates[0].constraints[0].field.is_resolved());
    }
}
