use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::roles::RoleMap;
use super::{FieldId, StructId, Symbol};
use crate::diagnostics::Pos;

/// SQL operator applied to a search or constraint field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Neq,
    Like,
    And,
    Or,
    Streq,
    Strneq,
    Isnull,
    Notnull,
}

impl Operator {
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::Isnull | Operator::Notnull)
    }

    /// Equality-class operators; the only binary ones valid on passwords.
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Neq | Operator::Streq | Operator::Strneq
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ge => "ge",
            Operator::Gt => "gt",
            Operator::Le => "le",
            Operator::Lt => "lt",
            Operator::Neq => "neq",
            Operator::Like => "like",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Streq => "streq",
            Operator::Strneq => "strneq",
            Operator::Isnull => "isnull",
            Operator::Notnull => "notnull",
        }
    }
}

/// Result shape of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    /// Exactly one row or nothing.
    Search,
    List,
    Count,
    Iterate,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Search => "search",
            SearchKind::List => "list",
            SearchKind::Count => "count",
            SearchKind::Iterate => "iterate",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Max,
    Min,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    #[default]
    Set,
    Inc,
    Dec,
    Concat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Modify,
    Delete,
}

/// Dotted chain of fields such as `author.company.name`.
///
/// Every segment but the last walks through a struct field; the last
/// segment is the field operated on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldPath {
    pub segments: Vec<Symbol<FieldId>>,
    pub pos: Pos,
    /// Join alias index in the owning struct, for multi-segment paths.
    pub alias: Option<usize>,
}

impl FieldPath {
    pub fn new(segments: Vec<Symbol<FieldId>>, pos: Pos) -> Self {
        Self {
            segments,
            pos,
            alias: None,
        }
    }

    /// The operated field, once resolved.
    pub fn field(&self) -> Option<FieldId> {
        self.segments.last().and_then(Symbol::target)
    }

    pub fn is_local(&self) -> bool {
        self.segments.len() == 1
    }

    pub fn dotted(&self) -> String {
        join_names(&self.segments)
    }

    /// The struct-walking part of the path, if any.
    pub fn join_path(&self) -> Option<String> {
        let (_, joins) = self.segments.split_last()?;
        if joins.is_empty() {
            None
        } else {
            Some(join_names(joins))
        }
    }
}

fn join_names(segments: &[Symbol<FieldId>]) -> String {
    segments
        .iter()
        .map(|segment| segment.name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    pub path: FieldPath,
    pub op: Operator,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTerm {
    pub path: FieldPath,
    pub direction: OrderDirection,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub op: AggregateOp,
    pub path: FieldPath,
    pub pos: Pos,
}

/// Distinct-subset projection: rows of the struct reached by `path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distinct {
    pub path: Vec<Symbol<FieldId>>,
    pub pos: Pos,
    pub target: Option<StructId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Search {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub kind: SearchKind,
    pub pos: Pos,
    pub params: Vec<Predicate>,
    pub order: Vec<OrderTerm>,
    pub aggregate: Option<Aggregate>,
    pub group: Option<FieldPath>,
    pub distinct: Option<Distinct>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub roles: Option<RoleMap>,
    /// Set by the linker when the predicates can match at most one row.
    pub unique: bool,
    /// Predicates the front end could not parse and already reported.
    #[serde(skip)]
    pub(crate) dropped_params: usize,
}

impl Search {
    pub fn new(kind: SearchKind, pos: Pos) -> Self {
        Self {
            name: None,
            doc: None,
            kind,
            pos,
            params: Vec::new(),
            order: Vec::new(),
            aggregate: None,
            group: None,
            distinct: None,
            limit: None,
            offset: None,
            roles: None,
            unique: false,
            dropped_params: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Modifier {
    pub field: Symbol<FieldId>,
    pub kind: ModifierKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: Symbol<FieldId>,
    pub op: Operator,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Update {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub kind: UpdateKind,
    pub pos: Pos,
    pub modifies: Vec<Modifier>,
    /// Modify every native field.
    pub all: bool,
    pub constraints: Vec<Condition>,
    pub roles: Option<RoleMap>,
}

impl Update {
    pub fn new(kind: UpdateKind, pos: Pos) -> Self {
        Self {
            name: None,
            doc: None,
            kind,
            pos,
            modifies: Vec::new(),
            all: false,
            constraints: Vec::new(),
            roles: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insert {
    pub pos: Pos,
    pub roles: Option<RoleMap>,
}

/// Composite uniqueness constraint over local fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unique {
    pub fields: Vec<Symbol<FieldId>>,
    pub pos: Pos,
}

/// Join path reachable from a struct and its SQL alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alias {
    pub path: String,
    pub alias: String,
}

/// One role-guarded operation of a struct.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Search(&'a Search),
    Update(&'a Update),
    Insert(&'a Insert),
}

impl<'a> Operation<'a> {
    pub fn roles(&self) -> Option<&'a RoleMap> {
        match self {
            Operation::Search(search) => search.roles.as_ref(),
            Operation::Update(update) => update.roles.as_ref(),
            Operation::Insert(insert) => insert.roles.as_ref(),
        }
    }

    pub fn pos(&self) -> &'a Pos {
        match self {
            Operation::Search(search) => &search.pos,
            Operation::Update(update) => &update.pos,
            Operation::Insert(insert) => &insert.pos,
        }
    }

    /// Short description used in diagnostics, e.g. `list function`.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Search(search) => match search.kind {
                SearchKind::Search => "search function",
                SearchKind::List => "list function",
                SearchKind::Count => "count function",
                SearchKind::Iterate => "iterate function",
            },
            Operation::Update(update) => match update.kind {
                UpdateKind::Modify => "update function",
                UpdateKind::Delete => "delete function",
            },
            Operation::Insert(_) => "insert function",
        }
    }
}

impl super::Struct {
    /// Every search, update, delete and insert of the struct.
    pub fn operations(&self) -> impl Iterator<Item = Operation<'_>> {
        self.searches
            .iter()
            .map(Operation::Search)
            .chain(self.updates.iter().map(Operation::Update))
            .chain(self.insert.iter().map(Operation::Insert))
    }
}
