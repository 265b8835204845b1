//! Schema linker for data-model configurations.
//!
//! Sources are loaded into an unlinked [`Config`], then [`link`] binds every
//! name, checks the model and derives what code generators need: emission
//! order, join aliases and per-struct flags. Problems are reported as
//! positioned [`Diagnostic`]s.

pub mod aliases;
pub mod diagnostics;
pub mod diff;
pub mod error;
pub mod linked;
pub mod linker;
pub mod model;
pub mod source;
pub mod topology;

mod flags;
mod resolve;
mod roles;
mod search;
mod symbols;
mod unique;

pub use aliases::{alias_name, MAX_ALIASES};
pub use diagnostics::{Channel, Diagnostic, Diagnostics, Pos, Severity};
pub use diff::diff_configs;
pub use error::{Error, Result};
pub use linked::LinkedConfig;
pub use linker::{link, link_sources, link_with, LinkFailure};
pub use model::{
    Config, EnumId, Field, FieldId, FieldType, RoleId, RoleMap, Search, SearchKind, Struct,
    StructId,
};
pub use source::{
    load_source, source_json_schema, validate_source_json, SourceDocument, SourceSet,
};
pub use topology::{compute_topology, Topology, TopologySummary};
