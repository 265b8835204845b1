//! JSON front end.
//!
//! A [`SourceDocument`] is one input file. Documents are checked against the
//! JSON Schema generated from these types, then lowered into an unlinked
//! [`Config`] whose cross references are still plain names. Any number of
//! documents can be added to one [`SourceSet`]; they share a namespace.

use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use schemars::JsonSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::{Channel, Diagnostics, Pos};
use crate::error::{Error, Result};
use crate::model::{
    Action, Aggregate, AggregateOp, BitIndex, Bitfield, Condition, Config, Distinct, Enum,
    EnumItem, FieldFlags, FieldId, FieldPath, FieldType, ForeignKey, Insert, Literal, Modifier,
    ModifierKind, Operator, OrderDirection, OrderTerm, Predicate, RoleId, RoleMap, Search,
    SearchKind, StructId, Symbol, Unique, Update, UpdateKind, Validation, ValidationOp,
};

/// One input document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceDocument {
    #[serde(default)]
    pub structs: Vec<StructDecl>,
    #[serde(default)]
    pub enums: Vec<EnumDecl>,
    #[serde(default)]
    pub bitfields: Vec<BitfieldDecl>,
    #[serde(default)]
    pub roles: Vec<RoleDecl>,
}

/// Line/column of a declaration in the original text, when known.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StructDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
    #[serde(default)]
    pub searches: Vec<SearchDecl>,
    #[serde(default)]
    pub updates: Vec<UpdateDecl>,
    #[serde(default)]
    pub deletes: Vec<DeleteDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<InsertDecl>,
    #[serde(default)]
    pub uniques: Vec<UniqueDecl>,
}

/// Field type keyword; `enum`, `bitfield` and `struct` take an `of` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    Int,
    Bit,
    Blob,
    Date,
    Epoch,
    Real,
    Text,
    Email,
    Password,
    Enum,
    Bitfield,
    Struct,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeName,
    /// Enumeration or bitfield name, or the local foreign-key field of a struct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<ReferenceDecl>,
    #[serde(default)]
    pub rowid: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub null: bool,
    #[serde(default)]
    pub noexport: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    #[serde(default)]
    pub validate: Vec<ValidationDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Foreign key written as `"target": "struct.field"`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReferenceDecl {
    pub target: String,
    #[serde(default)]
    pub on_update: Action,
    #[serde(default)]
    pub on_delete: Action,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ValidationDecl {
    pub op: ValidationOp,
    pub value: Literal,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SearchDecl {
    pub kind: SearchKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<PredicateDecl>,
    #[serde(default)]
    pub order: Vec<OrderDecl>,
    /// Dotted struct path; the empty string projects the searched struct.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PredicateDecl {
    pub field: String,
    #[serde(default)]
    pub op: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OrderDecl {
    pub field: String,
    #[serde(default)]
    pub direction: OrderDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AggregateDecl {
    pub op: AggregateOp,
    pub field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: Vec<ModifierDecl>,
    /// Modify every native field.
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub constraints: Vec<PredicateDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub constraints: Vec<PredicateDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ModifierDecl {
    pub field: String,
    #[serde(default)]
    pub modifier: ModifierKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InsertDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UniqueDecl {
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EnumDecl {
    pub name: String,
    pub items: Vec<EnumItemDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EnumItemDecl {
    pub name: String,
    /// Omitted values are numbered automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BitfieldDecl {
    pub name: String,
    pub items: Vec<BitIndexDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BitIndexDecl {
    pub name: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// A role, optionally with nested sub-roles.
///
/// `parent` attaches a top-level role beneath a role declared elsewhere,
/// possibly in another document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RoleDecl {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub roles: Vec<RoleDecl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

/// Emit the JSON Schema for source documents.
pub fn source_json_schema() -> RootSchema {
    schema_for!(SourceDocument)
}

/// Validate a source document against the source JSON Schema.
pub fn validate_source_json(name: &str, json: &Value) -> Result<Diagnostics> {
    let schema = serde_json::to_value(source_json_schema())?;
    let compiled = JSONSchema::compile(&schema).map_err(|err| Error::Schema(err.to_string()))?;

    let mut diagnostics = Diagnostics::default();
    let pos = Pos::file(name);

    if let Err(errors) = compiled.validate(json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            diagnostics.push_error(Channel::Source, &pos, format!("{path}: {error}"));
        }
    }

    Ok(diagnostics)
}

/// Validate one JSON document and deserialize it.
///
/// Returns `None` alongside the schema diagnostics when the document does not
/// conform.
pub fn load_source(name: &str, json: &Value) -> Result<(Option<SourceDocument>, Diagnostics)> {
    let mut diagnostics = validate_source_json(name, json)?;
    if !diagnostics.is_ok() {
        tracing::debug!(
            event = "source_rejected",
            source = name,
            errors = diagnostics.error_count()
        );
        return Ok((None, diagnostics));
    }

    match serde_json::from_value::<SourceDocument>(json.clone()) {
        Ok(document) => Ok((Some(document), diagnostics)),
        Err(err) => {
            diagnostics.push_error(Channel::Source, &Pos::file(name), err.to_string());
            Ok((None, diagnostics))
        }
    }
}

impl Config {
    /// Merge named documents into one unlinked config.
    pub fn from_sources<'a, I>(sources: I) -> (Config, Diagnostics)
    where
        I: IntoIterator<Item = (&'a str, &'a SourceDocument)>,
    {
        let mut set = SourceSet::new();
        for (name, document) in sources {
            set.add_document(name, document);
        }
        set.finish()
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

/// Accumulates documents into one unlinked [`Config`].
#[derive(Debug, Default)]
pub struct SourceSet {
    config: Config,
    diagnostics: Diagnostics,
    documents: usize,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents added so far.
    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    /// Read, validate and add a JSON file named by its path.
    pub fn add_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let json: Value = serde_json::from_str(&contents)?;
        self.add_json(&path.display().to_string(), &json)
    }

    /// Validate a JSON value against the source schema and add it.
    ///
    /// Schema violations are recorded as diagnostics and the document is
    /// skipped; only a broken schema itself is an `Err`.
    pub fn add_json(&mut self, name: &str, json: &Value) -> Result<()> {
        let (document, diagnostics) = load_source(name, json)?;
        self.diagnostics.merge(diagnostics);
        if let Some(document) = document {
            self.add_document(name, &document);
        }
        Ok(())
    }

    /// Lower an already-parsed document into the shared namespace.
    pub fn add_document(&mut self, name: &str, document: &SourceDocument) {
        let mut lowering = Lowering {
            file: name,
            config: &mut self.config,
            diagnostics: &mut self.diagnostics,
        };
        lowering.document(document);
        self.documents += 1;
        tracing::debug!(
            event = "source_added",
            source = name,
            structs = document.structs.len(),
            enums = document.enums.len(),
            roles = document.roles.len()
        );
    }

    /// The unlinked config plus any front-end diagnostics.
    pub fn finish(self) -> (Config, Diagnostics) {
        (self.config, self.diagnostics)
    }
}

struct Lowering<'a> {
    file: &'a str,
    config: &'a mut Config,
    diagnostics: &'a mut Diagnostics,
}

impl Lowering<'_> {
    fn pos(&self, at: Option<Location>) -> Pos {
        match at {
            Some(at) => Pos::new(self.file, at.line, at.column),
            None => Pos::file(self.file),
        }
    }

    fn error(&mut self, pos: &Pos, message: impl Into<String>) {
        self.diagnostics.push_error(Channel::Source, pos, message);
    }

    fn document(&mut self, document: &SourceDocument) {
        for decl in &document.enums {
            self.enumeration(decl);
        }
        for decl in &document.bitfields {
            self.bitfield(decl);
        }
        for decl in &document.roles {
            self.role(decl, None);
        }
        for decl in &document.structs {
            self.strct(decl);
        }
    }

    fn enumeration(&mut self, decl: &EnumDecl) {
        let items = decl
            .items
            .iter()
            .map(|item| EnumItem {
                name: item.name.clone(),
                pos: self.pos(item.at),
                doc: item.doc.clone(),
                declared: item.value,
                value: item.value.unwrap_or_default(),
            })
            .collect();
        self.config.add_enum(Enum {
            name: decl.name.clone(),
            pos: self.pos(decl.at),
            doc: decl.doc.clone(),
            items,
        });
    }

    fn bitfield(&mut self, decl: &BitfieldDecl) {
        let items = decl
            .items
            .iter()
            .map(|item| BitIndex {
                name: item.name.clone(),
                pos: self.pos(item.at),
                doc: item.doc.clone(),
                value: item.value,
            })
            .collect();
        self.config.add_bitfield(Bitfield {
            name: decl.name.clone(),
            pos: self.pos(decl.at),
            doc: decl.doc.clone(),
            items,
        });
    }

    fn role(&mut self, decl: &RoleDecl, nested_in: Option<&str>) {
        let pos = self.pos(decl.at);
        let parent = match (nested_in, &decl.parent) {
            (Some(_), Some(_)) => {
                self.error(&pos, "nested role cannot name a parent");
                nested_in.map(|name| Symbol::new(name, pos.clone()))
            }
            (Some(name), None) => Some(Symbol::new(name, pos.clone())),
            (None, Some(name)) => Some(Symbol::new(name.as_str(), pos.clone())),
            (None, None) => None,
        };
        self.config
            .add_role(decl.name.as_str(), pos, parent, decl.doc.clone());
        for child in &decl.roles {
            self.role(child, Some(&decl.name));
        }
    }

    fn strct(&mut self, decl: &StructDecl) {
        let id = self.config.add_struct(decl.name.as_str(), self.pos(decl.at));
        self.config.strct_mut(id).doc = decl.doc.clone();

        for field in &decl.fields {
            self.field(id, field);
        }
        for search in &decl.searches {
            let search = self.search(search);
            self.config.strct_mut(id).searches.push(search);
        }
        for update in &decl.updates {
            let update = self.update(update);
            self.config.strct_mut(id).updates.push(update);
        }
        for delete in &decl.deletes {
            let delete = self.delete(delete);
            self.config.strct_mut(id).updates.push(delete);
        }
        if let Some(insert) = &decl.insert {
            let pos = self.pos(insert.at);
            let roles = self.rolemap(insert.roles.as_deref(), &pos);
            self.config.strct_mut(id).insert = Some(Insert { pos, roles });
        }
        for unique in &decl.uniques {
            let pos = self.pos(unique.at);
            let fields = unique
                .fields
                .iter()
                .map(|name| Symbol::new(name.as_str(), pos.clone()))
                .collect();
            self.config
                .strct_mut(id)
                .uniques
                .push(Unique { fields, pos });
        }
    }

    fn field(&mut self, parent: StructId, decl: &FieldDecl) {
        let pos = self.pos(decl.at);
        let Some(ty) = self.field_type(decl, &pos) else {
            return;
        };

        let foreign = match &decl.references {
            Some(_) if ty.is_struct() => {
                self.error(&pos, "struct fields cannot carry a foreign key");
                None
            }
            Some(reference) => self.foreign_key(reference, &pos),
            None => None,
        };

        let validations = decl
            .validate
            .iter()
            .map(|rule| Validation {
                op: rule.op,
                value: rule.value.clone(),
                pos: pos.clone(),
            })
            .collect();

        let id = self
            .config
            .add_field(parent, decl.name.as_str(), pos, ty);
        let field = self.config.field_mut(id);
        field.doc = decl.doc.clone();
        field.flags = FieldFlags {
            rowid: decl.rowid,
            unique: decl.unique,
            nullable: decl.null,
            noexport: decl.noexport,
        };
        field.default = decl.default.clone();
        field.validations = validations;
        field.malformed_foreign = foreign.is_none() && decl.references.is_some();
        field.foreign = foreign;
    }

    fn field_type(&mut self, decl: &FieldDecl, pos: &Pos) -> Option<FieldType> {
        let argument = |name: &Option<String>| {
            name.as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(|value| value.to_string())
        };

        let ty = match decl.ty {
            TypeName::Int => FieldType::Int,
            TypeName::Bit => FieldType::Bit,
            TypeName::Blob => FieldType::Blob,
            TypeName::Date => FieldType::Date,
            TypeName::Epoch => FieldType::Epoch,
            TypeName::Real => FieldType::Real,
            TypeName::Text => FieldType::Text,
            TypeName::Email => FieldType::Email,
            TypeName::Password => FieldType::Password,
            TypeName::Enum | TypeName::Bitfield | TypeName::Struct => {
                let Some(name) = argument(&decl.of) else {
                    self.error(
                        pos,
                        format!("{} field requires an `of` argument", type_keyword(decl.ty)),
                    );
                    return None;
                };
                let symbol_pos = pos.clone();
                match decl.ty {
                    TypeName::Enum => FieldType::Enum(Symbol::new(name, symbol_pos)),
                    TypeName::Bitfield => FieldType::Bitfield(Symbol::new(name, symbol_pos)),
                    _ => FieldType::Struct(Symbol::new(name, symbol_pos)),
                }
            }
        };

        if decl.of.is_some() && !matches!(ty, FieldType::Enum(_) | FieldType::Bitfield(_) | FieldType::Struct(_)) {
            self.error(
                pos,
                format!("{} field does not take an `of` argument", type_keyword(decl.ty)),
            );
        }

        Some(ty)
    }

    fn foreign_key(&mut self, decl: &ReferenceDecl, pos: &Pos) -> Option<ForeignKey> {
        let parts = decl
            .target
            .split_once('.')
            .filter(|(strct, field)| {
                !strct.trim().is_empty() && !field.trim().is_empty() && !field.contains('.')
            });
        let Some((strct, field)) = parts else {
            self.error(
                pos,
                format!("malformed reference target: {}", decl.target),
            );
            return None;
        };

        Some(ForeignKey {
            target_struct: Symbol::new(strct.trim(), pos.clone()),
            target_field: Symbol::new(field.trim(), pos.clone()),
            on_update: decl.on_update,
            on_delete: decl.on_delete,
            pos: pos.clone(),
        })
    }

    fn path(&mut self, dotted: &str, pos: &Pos) -> Option<FieldPath> {
        let segments = self.segments(dotted, pos, false)?;
        Some(FieldPath::new(segments, pos.clone()))
    }

    fn segments(
        &mut self,
        dotted: &str,
        pos: &Pos,
        allow_empty: bool,
    ) -> Option<Vec<Symbol<FieldId>>> {
        if allow_empty && dotted.trim().is_empty() {
            return Some(Vec::new());
        }
        let parts: Vec<&str> = dotted.split('.').map(str::trim).collect();
        if parts.iter().any(|part| part.is_empty()) {
            self.error(pos, format!("malformed field path: {dotted}"));
            return None;
        }
        Some(
            parts
                .into_iter()
                .map(|part| Symbol::new(part, pos.clone()))
                .collect(),
        )
    }

    fn rolemap(&mut self, roles: Option<&[String]>, pos: &Pos) -> Option<RoleMap> {
        let roles = roles?;
        let symbols = roles
            .iter()
            .map(|name| Symbol::<RoleId>::new(name.as_str(), pos.clone()))
            .collect();
        Some(RoleMap::new(pos.clone(), symbols))
    }

    fn search(&mut self, decl: &SearchDecl) -> Search {
        let pos = self.pos(decl.at);
        let mut search = Search::new(decl.kind, pos.clone());
        search.name = decl.name.clone();
        search.doc = decl.doc.clone();
        search.limit = decl.limit;
        search.offset = decl.offset;

        for param in &decl.params {
            let param_pos = param.at.map_or_else(|| pos.clone(), |at| self.pos(Some(at)));
            match self.path(&param.field, &param_pos) {
                Some(path) => search.params.push(Predicate {
                    path,
                    op: param.op,
                    pos: param_pos,
                }),
                None => search.dropped_params += 1,
            }
        }

        for term in &decl.order {
            let term_pos = term.at.map_or_else(|| pos.clone(), |at| self.pos(Some(at)));
            if let Some(path) = self.path(&term.field, &term_pos) {
                search.order.push(OrderTerm {
                    path,
                    direction: term.direction,
                    pos: term_pos,
                });
            }
        }

        if let Some(aggregate) = &decl.aggregate {
            let aggr_pos = aggregate
                .at
                .map_or_else(|| pos.clone(), |at| self.pos(Some(at)));
            search.aggregate = self.path(&aggregate.field, &aggr_pos).map(|path| Aggregate {
                op: aggregate.op,
                path,
                pos: aggr_pos,
            });
        }

        if let Some(group) = &decl.group {
            search.group = self.path(group, &pos);
        }

        if let Some(distinct) = &decl.distinct {
            search.distinct = self.segments(distinct, &pos, true).map(|path| Distinct {
                path,
                pos: pos.clone(),
                target: None,
            });
        }

        search.roles = self.rolemap(decl.roles.as_deref(), &pos);
        search
    }

    fn conditions(&mut self, decls: &[PredicateDecl], pos: &Pos) -> Vec<Condition> {
        decls
            .iter()
            .map(|decl| {
                let cond_pos = decl.at.map_or_else(|| pos.clone(), |at| self.pos(Some(at)));
                Condition {
                    field: Symbol::new(decl.field.trim(), cond_pos.clone()),
                    op: decl.op,
                    pos: cond_pos,
                }
            })
            .collect()
    }

    fn update(&mut self, decl: &UpdateDecl) -> Update {
        let pos = self.pos(decl.at);
        let mut update = Update::new(UpdateKind::Modify, pos.clone());
        update.name = decl.name.clone();
        update.doc = decl.doc.clone();
        update.all = decl.all;
        update.modifies = decl
            .fields
            .iter()
            .map(|modifier| {
                let mod_pos = modifier
                    .at
                    .map_or_else(|| pos.clone(), |at| self.pos(Some(at)));
                Modifier {
                    field: Symbol::new(modifier.field.trim(), mod_pos.clone()),
                    kind: modifier.modifier,
                    pos: mod_pos,
                }
            })
            .collect();
        update.constraints = self.conditions(&decl.constraints, &pos);
        update.roles = self.rolemap(decl.roles.as_deref(), &pos);
        update
    }

    fn delete(&mut self, decl: &DeleteDecl) -> Update {
        let pos = self.pos(decl.at);
        let mut delete = Update::new(UpdateKind::Delete, pos.clone());
        delete.name = decl.name.clone();
        delete.doc = decl.doc.clone();
        delete.constraints = self.conditions(&decl.constraints, &pos);
        delete.roles = self.rolemap(decl.roles.as_deref(), &pos);
        delete
    }
}

fn type_keyword(ty: TypeName) -> &'static str {
    match ty {
        TypeName::Int => "int",
        TypeName::Bit => "bit",
        TypeName::Blob => "blob",
        TypeName::Date => "date",
        TypeName::Epoch => "epoch",
        TypeName::Real => "real",
        TypeName::Text => "text",
        TypeName::Email => "email",
        TypeName::Password => "password",
        TypeName::Enum => "enum",
        TypeName::Bitfield => "bitfield",
        TypeName::Struct => "struct",
    }
}
