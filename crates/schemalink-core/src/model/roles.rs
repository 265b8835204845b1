use serde::Serialize;

use super::{RoleId, Symbol};
use crate::diagnostics::Pos;

/// Place of a role in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleKind {
    /// `all`: implicit root, never entered.
    Root,
    /// `none`: no operations permitted and never left.
    Sink,
    /// `default`: the role a session starts in.
    Default,
    Named,
}

impl RoleKind {
    pub fn is_reserved(self) -> bool {
        !matches!(self, RoleKind::Named)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    pub name: String,
    pub kind: RoleKind,
    pub pos: Pos,
    pub doc: Option<String>,
    /// Declared parent name; `None` places the role directly under `all`.
    pub parent_name: Option<Symbol<RoleId>>,
    pub parent: Option<RoleId>,
    pub children: Vec<RoleId>,
}

impl Role {
    pub(crate) fn reserved(name: &str, kind: RoleKind, pos: Pos, parent: Option<RoleId>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            pos,
            doc: None,
            parent_name: None,
            parent,
            children: Vec::new(),
        }
    }

    pub(crate) fn declared(
        name: String,
        pos: Pos,
        parent_name: Option<Symbol<RoleId>>,
        doc: Option<String>,
    ) -> Self {
        Self {
            name,
            kind: RoleKind::Named,
            pos,
            doc,
            parent_name,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Roles allowed to invoke one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleMap {
    pub pos: Pos,
    pub roles: Vec<Symbol<RoleId>>,
}

impl RoleMap {
    pub fn new(pos: Pos, roles: Vec<Symbol<RoleId>>) -> Self {
        Self { pos, roles }
    }

    pub fn resolved(&self) -> impl Iterator<Item = RoleId> + '_ {
        self.roles.iter().filter_map(Symbol::target)
    }
}
