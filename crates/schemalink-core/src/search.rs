//! Search cardinality and operator checks.

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{Config, FieldType, Operator, Search, SearchKind, StructId};

/// Mark searches whose predicates can select at most one row.
///
/// That holds when an equality predicate binds a local rowid or unique field,
/// or when equality predicates bind every field of a composite unique
/// constraint. Joined fields never make a search unique.
pub(crate) fn mark_unique_searches(config: &mut Config) {
    for id in config.struct_ids() {
        let flags: Vec<bool> = config
            .strct(id)
            .searches
            .iter()
            .map(|search| is_unique_search(config, id, search))
            .collect();
        for (search, unique) in config.strct_mut(id).searches.iter_mut().zip(flags) {
            search.unique = unique;
        }
    }
}

fn is_unique_search(config: &Config, owner: StructId, search: &Search) -> bool {
    let bound: Vec<_> = search
        .params
        .iter()
        .filter(|param| param.op == Operator::Eq && param.path.is_local())
        .filter_map(|param| param.path.field())
        .collect();

    if bound.iter().any(|field| config.field(*field).is_unique_key()) {
        return true;
    }

    config.strct(owner).uniques.iter().any(|unique| {
        unique.fields.iter().all(|field| {
            field
                .target()
                .is_some_and(|field| bound.contains(&field))
        })
    })
}

/// Validate every search against field types and cardinality.
pub(crate) fn check_searches(config: &Config) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    for (_, strct) in config.structs() {
        for search in &strct.searches {
            check_search(config, search, &mut diagnostics);
            check_grouping(config, search, &mut diagnostics);
        }
    }

    tracing::debug!(
        event = "searches_checked",
        errors = diagnostics.error_count(),
        warnings = diagnostics.warning_count()
    );
    diagnostics
}

fn check_search(config: &Config, search: &Search, diagnostics: &mut Diagnostics) {
    if search.kind == SearchKind::Search && search.params.is_empty() {
        if search.dropped_params == 0 {
            diagnostics.push_error(
                Channel::Search,
                &search.pos,
                "unique result search without parameters",
            );
        }
        return;
    }

    match search.kind {
        SearchKind::List | SearchKind::Iterate if search.unique => {
            diagnostics.push_warning(
                Channel::Search,
                &search.pos,
                "multiple-result search on a unique field",
            );
        }
        SearchKind::Search if !search.unique && search.limit != Some(1) => {
            diagnostics.push_warning(
                Channel::Search,
                &search.pos,
                "single-result search on a non-unique field without a limit of one",
            );
        }
        _ => {}
    }

    for param in &search.params {
        let Some(field) = param.path.field().map(|id| config.field(id)) else {
            continue;
        };

        if param.op.is_unary() && !field.flags.nullable {
            diagnostics.push_warning(
                Channel::Search,
                &param.pos,
                "null operator on field that's never null",
            );
        }

        let password = matches!(field.ty, FieldType::Password);
        if password && !param.op.is_unary() && !param.op.is_equality() {
            diagnostics.push_error(
                Channel::Search,
                &param.pos,
                "passwords only accept unary or equality operators",
            );
        }

        if param.op == Operator::Like && !field.ty.is_textual() {
            diagnostics.push_error(
                Channel::Search,
                &param.pos,
                "LIKE operator on non-textual field",
            );
        }

        if search.distinct.is_some() && password && !param.op.is_unary() {
            diagnostics.push_error(
                Channel::Search,
                &param.pos,
                "password queries not allowed when searching on distinct subsets",
            );
        }
    }
}

/// A group needs an aggregate over another column of the same struct.
fn check_grouping(config: &Config, search: &Search, diagnostics: &mut Diagnostics) {
    match (&search.group, &search.aggregate) {
        (None, None) => {}
        (Some(group), None) => {
            diagnostics.push_error(Channel::Search, &group.pos, "group without a constraint");
        }
        (None, Some(aggregate)) => {
            diagnostics.push_error(Channel::Search, &aggregate.pos, "constraint without a group");
        }
        (Some(group), Some(aggregate)) => {
            let (Some(group_field), Some(aggr_field)) = (group.field(), aggregate.path.field())
            else {
                return;
            };
            if config.field(group_field).flags.nullable {
                diagnostics.push_error(Channel::Search, &group.pos, "group cannot be null");
            }
            if group_field == aggr_field {
                diagnostics.push_error(
                    Channel::Search,
                    &group.pos,
                    "same column for group and constraint",
                );
            } else if config.field(group_field).parent != config.field(aggr_field).parent {
                diagnostics.push_error(
                    Channel::Search,
                    &group.pos,
                    "structure for group and constraint must be the same",
                );
            }
        }
    }
}
