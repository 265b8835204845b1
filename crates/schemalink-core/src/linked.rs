use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::model::{Config, RoleId, RoleMap, Struct, StructId, ROLE_ALL, ROLE_NONE};
use crate::topology::Topology;

/// A successfully linked config, read-only for generators.
///
/// Every symbol is bound, the embedding graph is acyclic and struct heights,
/// aliases and flags are final.
#[derive(Debug, Clone, Serialize)]
pub struct LinkedConfig {
    config: Config,
    topology: Topology,
    diagnostics: Diagnostics,
}

impl LinkedConfig {
    pub(crate) fn new(config: Config, topology: Topology, diagnostics: Diagnostics) -> Self {
        Self {
            config,
            topology,
            diagnostics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Warnings recorded while linking.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Structs in emission order: every struct after the structs it embeds.
    pub fn ordered(&self) -> impl Iterator<Item = (StructId, &Struct)> {
        self.topology
            .order
            .iter()
            .map(|id| (*id, self.config.strct(*id)))
    }

    pub fn find_struct(&self, name: &str) -> Option<&Struct> {
        self.config.find_struct(name).map(|id| self.config.strct(id))
    }

    /// Whether `role` may run an operation guarded by `map`.
    ///
    /// Granting a role grants every role beneath it. `none` never runs
    /// anything.
    pub fn permits(&self, map: &RoleMap, role: RoleId) -> bool {
        if role == ROLE_NONE {
            return false;
        }
        map.resolved()
            .any(|granted| granted == role || self.config.is_ancestor(granted, role))
    }

    /// Whether a session in `from` may switch to `to`.
    ///
    /// Transitions only narrow: to an ancestor other than `all`, or into
    /// `none`, which is never left.
    pub fn can_transition(&self, from: RoleId, to: RoleId) -> bool {
        if from == to {
            return true;
        }
        if from == ROLE_NONE || to == ROLE_ALL {
            return false;
        }
        to == ROLE_NONE || self.config.is_ancestor(to, from)
    }

    pub fn into_config(self) -> Config {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Pos;
    use crate::linker::link;
    use crate::model::{
        Config, FieldType, Insert, RoleId, RoleMap, Symbol, ROLE_ALL, ROLE_DEFAULT, ROLE_NONE,
    };

    fn roles_config() -> Config {
        let mut config = Config::new();
        let pos = Pos::file("roles.json");
        let item = config.add_struct("item", pos.clone());
        let id = config.add_field(item, "id", pos.clone(), FieldType::Int);
        config.field_mut(id).flags.rowid = true;
        config.add_role("user", pos.clone(), None, None);
        config.add_role(
            "admin",
            pos.clone(),
            Some(Symbol::new("user", pos.clone())),
            None,
        );
        config.add_role("guest", pos.clone(), None, None);
        config.strct_mut(item).insert = Some(Insert {
            roles: Some(RoleMap::new(pos.clone(), vec![Symbol::new("user", pos.clone())])),
            pos,
        });
        config
    }

    fn role(config: &Config, name: &str) -> RoleId {
        config.find_role(name).expect("declared role")
    }

    #[test]
    fn granting_a_role_grants_its_descendants() {
        let linked = link(roles_config()).expect("links");
        let config = linked.config();
        let item = linked.find_struct("item").expect("item");
        let map = item
            .insert
            .as_ref()
            .and_then(|insert| insert.roles.as_ref())
            .expect("insert roles");

        assert!(linked.permits(map, role(config, "user")));
        assert!(linked.permits(map, role(config, "admin")));
        assert!(!linked.permits(map, role(config, "guest")));
        assert!(!linked.permits(map, ROLE_DEFAULT));
        assert!(!linked.permits(map, ROLE_NONE));
    }

    #[test]
    fn transitions_only_narrow() {
        let linked = link(roles_config()).expect("links");
        let config = linked.config();
        let (user, admin, guest) = (
            role(config, "user"),
            role(config, "admin"),
            role(config, "guest"),
        );

        assert!(linked.can_transition(admin, user));
        assert!(!linked.can_transition(user, admin));
        assert!(!linked.can_transition(admin, guest));
        assert!(!linked.can_transition(user, ROLE_ALL));
        assert!(linked.can_transition(guest, guest));
        assert!(linked.can_transition(ROLE_DEFAULT, ROLE_NONE));
        assert!(!linked.can_transition(ROLE_NONE, ROLE_DEFAULT));
    }
}
