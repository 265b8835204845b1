use crate::model::{Config, FieldType, SearchKind, StructId};

/// Set the computed struct flags.
///
/// `order` must list embedded structs before their embedders so the
/// null-reference flag can be read from targets that are already final.
pub(crate) fn compute_flags(config: &mut Config, order: &[StructId]) {
    for &id in order {
        let strct = config.strct(id);
        let has_queue = strct
            .searches
            .iter()
            .any(|search| search.kind == SearchKind::List);
        let has_iterator = strct
            .searches
            .iter()
            .any(|search| search.kind == SearchKind::Iterate);
        let has_blob = config
            .fields_of(id)
            .any(|(_, field)| matches!(field.ty, FieldType::Blob));
        let has_nullrefs = config.fields_of(id).any(|(_, field)| {
            let (true, Some(reference)) = (field.ty.is_struct(), field.reference) else {
                return false;
            };
            let target = config.field(reference.target).parent;
            config.field(reference.source).flags.nullable
                || config.strct(target).flags.has_nullrefs
        });

        let flags = &mut config.strct_mut(id).flags;
        flags.has_queue = has_queue;
        flags.has_iterator = has_iterator;
        flags.has_blob = has_blob;
        flags.has_nullrefs = has_nullrefs;
    }

    tracing::debug!(
        event = "flags_computed",
        nullrefs = order
            .iter()
            .filter(|id| config.strct(**id).flags.has_nullrefs)
            .count()
    );
}
