//! SQL join aliases.
//!
//! Every dotted chain of struct fields reachable from a struct gets a short
//! alias so the same struct can be joined more than once in one query. The
//! alias counter runs across the whole config.

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{Alias, Config, FieldPath, Struct, StructId};

/// Largest number of aliases one config can hold (`_a` through `_zzz`).
pub const MAX_ALIASES: usize = 26 * 26 * 26;

/// Short alias for the `offset`-th join, or `None` past [`MAX_ALIASES`].
pub fn alias_name(offset: usize) -> Option<String> {
    let letter = |value: usize| char::from(b'a' + (value % 26) as u8);
    match offset {
        0..26 => Some(format!("_{}", letter(offset))),
        26..676 => Some(format!("_{}{}", letter(offset / 26), letter(offset))),
        676..MAX_ALIASES => Some(format!(
            "_{}{}{}",
            letter(offset / 676),
            letter(offset / 26),
            letter(offset)
        )),
        _ => None,
    }
}

/// Build alias lists and bind search paths to them.
///
/// Must only run on a config without embedding cycles.
pub(crate) fn assign_aliases(config: &mut Config) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    let mut offset = 0;

    for id in config.struct_ids() {
        let mut aliases = Vec::new();
        if !collect(config, id, None, &mut offset, &mut aliases, &mut diagnostics) {
            break;
        }
        config.strct_mut(id).aliases = aliases;
    }

    for id in config.struct_ids() {
        let mut searches = std::mem::take(&mut config.strct_mut(id).searches);
        let strct = config.strct(id);
        for search in &mut searches {
            for param in &mut search.params {
                bind(strct, &mut param.path);
            }
            for term in &mut search.order {
                bind(strct, &mut term.path);
            }
            if let Some(aggregate) = &mut search.aggregate {
                bind(strct, &mut aggregate.path);
            }
            if let Some(group) = &mut search.group {
                bind(strct, group);
            }
        }
        config.strct_mut(id).searches = searches;
    }

    tracing::debug!(event = "aliases_assigned", aliases = offset);
    diagnostics
}

fn collect(
    config: &Config,
    current: StructId,
    prior: Option<&str>,
    offset: &mut usize,
    aliases: &mut Vec<Alias>,
    diagnostics: &mut Diagnostics,
) -> bool {
    for (field_id, target) in config.embeds(current) {
        let field = config.field(field_id);
        let Some(alias) = alias_name(*offset) else {
            diagnostics.push_error(Channel::Aliases, &field.pos, "too many aliases");
            return false;
        };
        *offset += 1;

        let path = match prior {
            Some(prior) => format!("{prior}.{}", field.name),
            None => field.name.clone(),
        };
        aliases.push(Alias {
            path: path.clone(),
            alias,
        });

        if !collect(config, target, Some(&path), offset, aliases, diagnostics) {
            return false;
        }
    }
    true
}

fn bind(strct: &Struct, path: &mut FieldPath) {
    path.alias = path.join_path().and_then(|join| strct.alias(&join));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Pos;
    use crate::model::{
        Action, FieldId, FieldType, Operator, Predicate, Reference, Search, SearchKind, Symbol,
    };

    #[test]
    fn alias_names_follow_the_counter() {
        assert_eq!(alias_name(0).as_deref(), Some("_a"));
        assert_eq!(alias_name(25).as_deref(), Some("_z"));
        assert_eq!(alias_name(26).as_deref(), Some("_ba"));
        assert_eq!(alias_name(675).as_deref(), Some("_zz"));
        assert_eq!(alias_name(676).as_deref(), Some("_baa"));
        assert_eq!(alias_name(MAX_ALIASES - 1).as_deref(), Some("_zzz"));
        assert_eq!(alias_name(MAX_ALIASES), None);
    }

    fn embed(config: &mut Config, owner: StructId, name: &str, target: FieldId) -> FieldId {
        let pos = Pos::file("alias.json");
        let source = config.add_field(owner, format!("{name}id"), pos.clone(), FieldType::Int);
        let reference = Reference {
            source,
            target,
            on_update: Action::None,
            on_delete: Action::None,
        };
        config.field_mut(source).reference = Some(reference);
        let field = config.add_field(
            owner,
            name,
            pos.clone(),
            FieldType::Struct(Symbol::new(format!("{name}id"), pos)),
        );
        config.field_mut(field).reference = Some(reference);
        field
    }

    #[test]
    fn nested_joins_get_dotted_paths_and_bound_searches() {
        let mut config = Config::new();
        let pos = Pos::file("alias.json");
        let company = config.add_struct("company", pos.clone());
        let company_id = config.add_field(company, "id", pos.clone(), FieldType::Int);
        let company_name = config.add_field(company, "name", pos.clone(), FieldType::Text);
        let user = config.add_struct("user", pos.clone());
        let user_id = config.add_field(user, "id", pos.clone(), FieldType::Int);
        let employer = embed(&mut config, user, "employer", company_id);
        let post = config.add_struct("post", pos.clone());
        let author = embed(&mut config, post, "author", user_id);

        let mut path = FieldPath::new(
            vec![
                Symbol::new("AUTHOR", pos.clone()),
                Symbol::new("employer", pos.clone()),
                Symbol::new("name", pos.clone()),
            ],
            pos.clone(),
        );
        for (segment, id) in path.segments.iter_mut().zip([author, employer, company_name]) {
            segment.bind(id);
        }
        let mut search = Search::new(SearchKind::List, pos.clone());
        search.params.push(Predicate {
            path,
            op: Operator::Eq,
            pos,
        });
        config.strct_mut(post).searches.push(search);

        let diagnostics = assign_aliases(&mut config);
        assert!(diagnostics.is_empty());

        let aliases = |id| {
            config
                .strct(id)
                .aliases
                .iter()
                .map(|alias| (alias.path.clone(), alias.alias.clone()))
                .collect::<Vec<_>>()
        };
        assert!(aliases(company).is_empty());
        assert_eq!(aliases(user), vec![("employer".to_string(), "_a".to_string())]);
        assert_eq!(
            aliases(post),
            vec![
                ("author".to_string(), "_b".to_string()),
                ("author.employer".to_string(), "_c".to_string()),
            ]
        );
        assert_eq!(config.strct(post).searches[0].params[0].path.alias, Some(1));
    }
}
