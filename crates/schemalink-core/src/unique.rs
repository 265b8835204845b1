use std::collections::BTreeSet;

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{Config, FieldId, Unique};

/// Report composite unique constraints that repeat an earlier field set.
///
/// Sets are compared unordered and must have the same length. Each duplicate pair yields one error at the
/// earlier declaration naming the later one.
pub(crate) fn check_unique_sets(config: &Config) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    for (_, strct) in config.structs() {
        let sets: Vec<(&Unique, Option<BTreeSet<FieldId>>)> = strct
            .uniques
            .iter()
            .map(|unique| (unique, field_set(unique)))
            .collect();

        for (index, (unique, set)) in sets.iter().enumerate() {
            let Some(set) = set else {
                continue;
            };
            for (later, later_set) in &sets[index + 1..] {
                let same_len = later.fields.len() == unique.fields.len();
                if same_len && later_set.as_ref() == Some(set) {
                    diagnostics.push_error(
                        Channel::Unique,
                        &unique.pos,
                        format!("duplicate unique statements: {}", later.pos),
                    );
                }
            }
        }
    }

    tracing::debug!(event = "unique_checked", errors = diagnostics.error_count());
    diagnostics
}

/// The resolved field set, or `None` while any member is unresolved.
fn field_set(unique: &Unique) -> Option<BTreeSet<FieldId>> {
    unique.fields.iter().map(|field| field.target()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Pos;
    use crate::model::{FieldType, StructId, Symbol};

    fn unique(config: &Config, strct: StructId, names: &[&str], line: usize) -> Unique {
        let pos = Pos::new("unique.json", line, 1);
        let fields = names
            .iter()
            .map(|name| {
                let mut symbol = Symbol::new(*name, pos.clone());
                if let Some(id) = config.find_field(strct, name) {
                    symbol.bind(id);
                }
                symbol
            })
            .collect();
        Unique { fields, pos }
    }

    /// Each set is a line number and space-separated field names.
    fn config_with(sets: &[(usize, &str)]) -> Config {
        let mut config = Config::new();
        let pos = Pos::file("unique.json");
        let strct = config.add_struct("person", pos.clone());
        for name in ["first", "last", "born"] {
            config.add_field(strct, name, pos.clone(), FieldType::Text);
        }
        let uniques = sets
            .iter()
            .map(|(line, names)| {
                let names: Vec<&str> = names.split_whitespace().collect();
                unique(&config, strct, &names, *line)
            })
            .collect();
        config.strct_mut(strct).uniques = uniques;
        config
    }

    #[test]
    fn reordered_duplicate_is_reported_once_at_the_first() {
        let config = config_with(&[(3, "first last"), (7, "last first")]);

        let diagnostics = check_unique_sets(&config);
        let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec!["unique.json:3:1: error: duplicate unique statements: unique.json:7:1"]
        );
    }

    #[test]
    fn distinct_sets_pass() {
        let config = config_with(&[(3, "first last"), (4, "first last born"), (5, "first born")]);
        assert!(check_unique_sets(&config).is_empty());
    }

    #[test]
    fn three_copies_yield_one_error_per_pair() {
        let config = config_with(&[(3, "first last"), (4, "last first"), (5, "first last")]);
        assert_eq!(check_unique_sets(&config).error_count(), 3);
    }

    #[test]
    fn repeated_members_do_not_collapse_the_set() {
        let config = config_with(&[(3, "first first"), (4, "first")]);
        assert!(check_unique_sets(&config).is_empty());
    }

    #[test]
    fn unresolved_sets_are_skipped() {
        let config = config_with(&[(3, "first ghost"), (4, "first ghost")]);
        assert!(check_unique_sets(&config).is_empty());
    }
}
