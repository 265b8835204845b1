use schemalink_core::{
    diff_configs, link_sources, load_source, Channel, Error, SourceSet,
};
use serde_json::json;
use std::path::Path;

#[test]
fn schema_violations_become_diagnostics() {
    let (document, diagnostics) = load_source(
        "bad.json",
        &json!({
            "structs": [{
                "name": "user",
                "fields": [{ "name": "id", "type": "integer" }],
                "colour": "red"
            }]
        }),
    )
    .expect("schema compiles");

    assert!(document.is_none());
    assert!(!diagnostics.is_ok());
    assert!(diagnostics
        .iter()
        .all(|diagnostic| diagnostic.channel == Channel::Source));
    assert!(diagnostics
        .iter()
        .any(|diagnostic| diagnostic.message.starts_with("/structs/0")));
}

#[test]
fn rejected_documents_fail_the_link() {
    let mut sources = SourceSet::new();
    sources
        .add_json("bad.json", &json!({ "structs": "user" }))
        .expect("schema compiles");
    assert!(sources.is_empty());

    let failure = link_sources(sources).expect_err("nothing to link");
    assert!(failure.diagnostics.errors_in(Channel::Source) >= 1);
    assert_eq!(failure.diagnostics.errors_in(Channel::Resolve), 1);
}

#[test]
fn missing_files_are_io_errors() {
    let mut sources = SourceSet::new();
    let err = sources
        .add_file(Path::new("does/not/exist.json"))
        .expect_err("missing file");
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn references_resolve_across_documents() {
    let mut sources = SourceSet::new();
    sources
        .add_json(
            "users.json",
            &json!({
                "structs": [{
                    "name": "user",
                    "fields": [{ "name": "id", "type": "int", "rowid": true }]
                }]
            }),
        )
        .expect("schema compiles");
    sources
        .add_json(
            "posts.json",
            &json!({
                "structs": [{
                    "name": "post",
                    "fields": [
                        { "name": "id", "type": "int", "rowid": true },
                        { "name": "userid", "type": "int", "references": { "target": "User.Id" } },
                        { "name": "user", "type": "struct", "of": "userid" }
                    ]
                }]
            }),
        )
        .expect("schema compiles");
    assert_eq!(sources.len(), 2);

    let linked = link_sources(sources).expect("links");
    let post = linked.find_struct("post").expect("post");
    assert_eq!(post.pos.file, "posts.json");
    assert_eq!(post.height, 1);
    assert!(!post.flags.has_nullrefs);
}

#[test]
fn cross_version_diff_flags_dropped_columns() {
    let version = |extra: bool| {
        let mut fields = vec![json!({ "name": "id", "type": "int", "rowid": true })];
        if extra {
            fields.push(json!({ "name": "legacy", "type": "text" }));
        }
        let mut sources = SourceSet::new();
        sources
            .add_json(
                if extra { "v1.json" } else { "v2.json" },
                &json!({ "structs": [{ "name": "item", "fields": fields }] }),
            )
            .expect("schema compiles");
        link_sources(sources).expect("links")
    };

    let diagnostics = diff_configs(&version(true), &version(false));
    let rendered: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
    assert_eq!(rendered, vec!["v1.json: error: column was dropped"]);
    assert_eq!(diagnostics.errors_in(Channel::Diff), 1);
}
