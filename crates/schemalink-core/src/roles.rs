//! Role forest construction and role-map checks.

use crate::diagnostics::{Channel, Diagnostics};
use crate::model::{Config, RoleId, RoleMap, ROLE_ALL, ROLE_DEFAULT, ROLE_NONE};
use crate::symbols::Namespace;

pub(crate) fn link_roles(config: &mut Config, names: &Namespace) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();

    bind_parents(config, names, &mut diagnostics);
    break_parent_cycles(config, &mut diagnostics);
    rebuild_children(config);
    bind_rolemaps(config, names, &mut diagnostics);
    check_rolemaps(config, &mut diagnostics);
    check_reachability(config, &mut diagnostics);

    tracing::debug!(
        event = "roles_complete",
        roles = config.roles.len(),
        errors = diagnostics.error_count(),
        warnings = diagnostics.warning_count()
    );
    diagnostics
}

/// Attach every declared role to its parent, falling back to `all`.
fn bind_parents(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    for role in &mut config.roles {
        if role.kind.is_reserved() {
            continue;
        }
        role.parent = Some(ROLE_ALL);

        let Some(symbol) = &mut role.parent_name else {
            continue;
        };
        match names.role(&symbol.name) {
            None => diagnostics.push_error(
                Channel::Roles,
                &symbol.pos,
                format!("unknown parent role: {}", symbol.name),
            ),
            Some(parent) if parent == ROLE_NONE || parent == ROLE_DEFAULT => {
                diagnostics.push_error(
                    Channel::Roles,
                    &symbol.pos,
                    format!("roles cannot be nested under {}: {}", symbol.name, role.name),
                );
            }
            Some(parent) => {
                symbol.bind(parent);
                role.parent = Some(parent);
            }
        }
    }
}

/// Report each parent cycle once, at its first declared member, and cut it
/// there so the forest stays rooted at `all`.
fn break_parent_cycles(config: &mut Config, diagnostics: &mut Diagnostics) {
    let count = config.roles.len();
    for index in 0..count {
        let id = RoleId(index);
        let mut next = config.roles[index].parent;
        let mut cyclic = false;
        for _ in 0..count {
            match next {
                Some(current) if current == id => {
                    cyclic = true;
                    break;
                }
                Some(current) => next = config.roles[current.0].parent,
                None => break,
            }
        }
        if cyclic {
            let role = &mut config.roles[index];
            diagnostics.push_error(
                Channel::Roles,
                &role.pos,
                format!("role parent cycle: {}", role.name),
            );
            role.parent = Some(ROLE_ALL);
        }
    }
}

fn rebuild_children(config: &mut Config) {
    for role in &mut config.roles {
        role.children.clear();
    }
    for index in 0..config.roles.len() {
        if let Some(parent) = config.roles[index].parent {
            config.roles[parent.0].children.push(RoleId(index));
        }
    }
}

fn bind_rolemaps(config: &mut Config, names: &Namespace, diagnostics: &mut Diagnostics) {
    for strct in &mut config.structs {
        let maps = strct
            .searches
            .iter_mut()
            .filter_map(|search| search.roles.as_mut())
            .chain(strct.updates.iter_mut().filter_map(|update| update.roles.as_mut()))
            .chain(strct.insert.iter_mut().filter_map(|insert| insert.roles.as_mut()));

        for map in maps {
            for symbol in &mut map.roles {
                match names.role(&symbol.name) {
                    None => diagnostics.push_error(
                        Channel::Roles,
                        &symbol.pos,
                        format!("unknown role: {}", symbol.name),
                    ),
                    Some(ROLE_NONE) => diagnostics.push_error(
                        Channel::Roles,
                        &symbol.pos,
                        "the none role cannot be granted",
                    ),
                    Some(id) => symbol.bind(id),
                }
            }
        }
    }
}

fn check_rolemaps(config: &Config, diagnostics: &mut Diagnostics) {
    for (_, strct) in config.structs() {
        for operation in strct.operations() {
            if let Some(map) = operation.roles() {
                check_rolemap(config, map, diagnostics);
            }
        }
    }
}

/// One error per repeated entry and one per ancestor/descendant pair.
fn check_rolemap(config: &Config, map: &RoleMap, diagnostics: &mut Diagnostics) {
    let entries: Vec<_> = map
        .roles
        .iter()
        .filter_map(|symbol| symbol.target().map(|id| (id, symbol)))
        .collect();

    for (index, (id, symbol)) in entries.iter().enumerate() {
        if entries[..index].iter().any(|(other, _)| other == id) {
            diagnostics.push_error(
                Channel::Roles,
                &symbol.pos,
                format!("duplicate operation role: {}", symbol.name),
            );
        }
    }

    let mut distinct: Vec<(RoleId, &_)> = Vec::new();
    for (id, symbol) in &entries {
        if !distinct.iter().any(|(seen, _)| seen == id) {
            distinct.push((*id, *symbol));
        }
    }

    for (ancestor, symbol) in &distinct {
        for (descendant, _) in &distinct {
            if config.is_ancestor(*ancestor, *descendant) {
                diagnostics.push_error(
                    Channel::Roles,
                    &symbol.pos,
                    format!(
                        "overlapping role: {}, {}",
                        config.role(*descendant).name,
                        config.role(*ancestor).name
                    ),
                );
            }
        }
    }
}

/// Under active access control an operation without a role map can never run.
fn check_reachability(config: &Config, diagnostics: &mut Diagnostics) {
    if !config.has_declared_roles() {
        return;
    }
    for (_, strct) in config.structs() {
        for operation in strct.operations() {
            if operation.roles().is_none() {
                diagnostics.push_warning(
                    Channel::Roles,
                    operation.pos(),
                    format!("no roles defined for {}", operation.label()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Pos;
    use crate::model::{Insert, Search, SearchKind, Symbol};

    fn pos(line: usize) -> Pos {
        Pos::new("roles.json", line, 1)
    }

    fn parent(name: &str, line: usize) -> Option<Symbol<RoleId>> {
        Some(Symbol::new(name, pos(line)))
    }

    fn rolemap(names: &[&str], line: usize) -> Option<RoleMap> {
        let roles = names
            .iter()
            .map(|name| Symbol::new(*name, pos(line)))
            .collect();
        Some(RoleMap::new(pos(line), roles))
    }

    fn run(config: &mut Config) -> Diagnostics {
        let mut diagnostics = Diagnostics::default();
        let names = Namespace::build(config, &mut diagnostics);
        diagnostics.merge(link_roles(config, &names));
        diagnostics
    }

    fn messages(diagnostics: &Diagnostics) -> Vec<String> {
        diagnostics.iter().map(|diag| diag.message.clone()).collect()
    }

    fn with_search(config: &mut Config, roles: Option<RoleMap>) {
        let strct = config.add_struct("item", pos(50));
        let mut search = Search::new(SearchKind::List, pos(51));
        search.roles = roles;
        config.strct_mut(strct).searches.push(search);
    }

    #[test]
    fn builds_the_forest_under_all() {
        let mut config = Config::new();
        let user = config.add_role("user", pos(1), None, None);
        let admin = config.add_role("admin", pos(2), parent("user", 2), None);
        with_search(&mut config, rolemap(&["admin"], 3));

        let diagnostics = run(&mut config);
        assert!(diagnostics.is_empty(), "{:?}", messages(&diagnostics));
        assert_eq!(config.role(admin).parent, Some(user));
        assert_eq!(config.role(user).parent, Some(ROLE_ALL));
        assert_eq!(
            config.role(ROLE_ALL).children,
            vec![ROLE_NONE, ROLE_DEFAULT, user]
        );
        assert_eq!(config.role(user).children, vec![admin]);
        assert!(config.is_ancestor(ROLE_ALL, admin));
        assert_eq!(config.declared_roles().count(), 2);
    }

    #[test]
    fn parent_and_child_in_one_map_overlap_once() {
        let mut config = Config::new();
        config.add_role("user", pos(1), None, None);
        config.add_role("admin", pos(2), parent("user", 2), None);
        with_search(&mut config, rolemap(&["admin", "user"], 3));

        let diagnostics = run(&mut config);
        assert_eq!(messages(&diagnostics), vec!["overlapping role: admin, user"]);
    }

    #[test]
    fn duplicates_are_reported_per_repeat() {
        let mut config = Config::new();
        config.add_role("user", pos(1), None, None);
        with_search(&mut config, rolemap(&["user", "user", "USER"], 3));

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec![
                "duplicate operation role: user",
                "duplicate operation role: USER"
            ]
        );
    }

    #[test]
    fn all_overlaps_with_everything_beneath_it() {
        let mut config = Config::new();
        config.add_role("user", pos(1), None, None);
        with_search(&mut config, rolemap(&["all", "default", "user"], 3));

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec!["overlapping role: default, all", "overlapping role: user, all"]
        );
    }

    #[test]
    fn rejects_unknown_none_and_reserved_parents() {
        let mut config = Config::new();
        config.add_role("guest", pos(1), parent("default", 1), None);
        config.add_role("orphan", pos(2), parent("ghost", 2), None);
        with_search(&mut config, rolemap(&["none", "nobody"], 3));

        let diagnostics = run(&mut config);
        assert_eq!(
            messages(&diagnostics),
            vec![
                "roles cannot be nested under default: guest",
                "unknown parent role: ghost",
                "the none role cannot be granted",
                "unknown role: nobody",
            ]
        );
        let guest = config.find_role("guest").expect("guest");
        assert_eq!(config.role(guest).parent, Some(ROLE_ALL));
    }

    #[test]
    fn parent_cycles_are_cut_at_the_first_member() {
        let mut config = Config::new();
        let a = config.add_role("a", pos(1), parent("b", 1), None);
        let b = config.add_role("b", pos(2), parent("a", 2), None);

        let diagnostics = run(&mut config);
        assert_eq!(messages(&diagnostics), vec!["role parent cycle: a"]);
        assert_eq!(config.role(a).parent, Some(ROLE_ALL));
        assert_eq!(config.role(b).parent, Some(a));
    }

    #[test]
    fn unguarded_operations_warn_only_under_access_control() {
        let mut config = Config::new();
        let strct = config.add_struct("item", pos(1));
        config.strct_mut(strct).insert = Some(Insert {
            pos: pos(2),
            roles: None,
        });
        assert!(run(&mut config.clone()).is_empty());

        config.add_role("user", pos(3), None, None);
        let diagnostics = run(&mut config);
        assert!(diagnostics.is_ok());
        assert_eq!(
            messages(&diagnostics),
            vec!["no roles defined for insert function"]
        );
    }
}
