//! Export resolution: re-exports, star exports and namespace objects

use super::*;
use core_types::Value;
use interpreter::{operations, Realm};
use module_system::{ModuleGraph, ModuleSource, StaticModuleMap, DEFAULT_EXPORT};

/// a.js exports `shared`, `onlyA` and a default; b.js exports `shared` and `onlyB`
fn star_host() -> StaticModuleMap {
    StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(empty("a"))
                .with_export(local("shared"))
                .with_export(local("onlyA"))
                .with_export(ExportEntry::Default),
        )
        .with(
            "b.js",
            ModuleSource::new(empty("b"))
                .with_export(local("shared"))
                .with_export(local("onlyB")),
        )
        .with(
            "c.js",
            ModuleSource::new(empty("c"))
                .with_export(ExportEntry::AllFrom {
                    specifier: "./a.js".to_string(),
                })
                .with_export(ExportEntry::AllFrom {
                    specifier: "./b.js".to_string(),
                }),
        )
}

#[test]
fn test_star_export_names_are_a_union() {
    let host = star_host();
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    let c = graph.load(&mut realm, &host, "c.js").unwrap();

    let names = graph.get_exported_names(&mut realm, &host, c).unwrap();
    assert_eq!(names, vec!["shared", "onlyA", "onlyB"]);
    assert!(!names.iter().any(|n| n == DEFAULT_EXPORT));
}

#[test]
fn test_star_export_cycle_terminates() {
    let host = StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(empty("a"))
                .with_export(local("x"))
                .with_export(ExportEntry::AllFrom {
                    specifier: "./b.js".to_string(),
                }),
        )
        .with(
            "b.js",
            ModuleSource::new(empty("b"))
                .with_export(local("y"))
                .with_export(ExportEntry::AllFrom {
                    specifier: "./a.js".to_string(),
                }),
        );
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    let a = graph.load(&mut realm, &host, "a.js").unwrap();
    assert_eq!(
        graph.get_exported_names(&mut realm, &host, a).unwrap(),
        vec!["x", "y"]
    );
    graph.link(&mut realm, &host, a).unwrap();
}

#[test]
fn test_import_through_star_export() {
    let mut host = star_host();
    let mut a_body = store("shared", 1);
    a_body.extend(store("onlyA", 2));
    a_body.extend(store("default", 3));
    a_body.extend([Opcode::PushUndefined, Opcode::Return]);
    host.insert(
        "a.js",
        ModuleSource::new(body("a", a_body))
            .with_export(local("shared"))
            .with_export(local("onlyA"))
            .with_export(ExportEntry::Default),
    );
    host.insert(
        "main.js",
        ModuleSource::new(body(
            "main",
            vec![
                Opcode::LoadModuleVar("onlyA".to_string()),
                Opcode::LoadModuleVar("shared".to_string()),
                Opcode::Add,
                Opcode::Return,
            ],
        ))
        .with_import(named("./c.js", "onlyA", "onlyA"))
        .with_import(named("./c.js", "shared", "shared")),
    );

    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    // `shared` resolves to a.js, which comes first
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(3)
    );
}

#[test]
fn test_named_re_export() {
    let host = StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(body(
                "a",
                [store("x", 5), vec![Opcode::PushUndefined, Opcode::Return]].concat(),
            ))
            .with_export(local("x")),
        )
        .with(
            "b.js",
            ModuleSource::new(empty("b")).with_export(ExportEntry::NamedFrom {
                specifier: "./a.js".to_string(),
                imported: "x".to_string(),
                exported: "renamed".to_string(),
            }),
        )
        .with(
            "main.js",
            ModuleSource::new(body(
                "main",
                vec![Opcode::LoadModuleVar("r".to_string()), Opcode::Return],
            ))
            .with_import(named("./b.js", "renamed", "r")),
        );
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(5)
    );
}

#[test]
fn test_default_import() {
    let host = StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(body(
                "a",
                [store("default", 9), vec![Opcode::PushUndefined, Opcode::Return]].concat(),
            ))
            .with_export(ExportEntry::Default),
        )
        .with(
            "main.js",
            ModuleSource::new(body(
                "main",
                vec![Opcode::LoadModuleVar("a".to_string()), Opcode::Return],
            ))
            .with_import(ImportEntry::Default {
                specifier: "./a.js".to_string(),
                local: "a".to_string(),
            }),
        );
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(9)
    );
}

#[test]
fn test_namespace_import() {
    let host = StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(body(
                "a",
                [store("y", 2), store("x", 5), vec![Opcode::PushUndefined, Opcode::Return]]
                    .concat(),
            ))
            .with_export(local("y"))
            .with_export(local("x")),
        )
        .with(
            "main.js",
            ModuleSource::new(body(
                "main",
                vec![
                    Opcode::LoadModuleVar("ns".to_string()),
                    Opcode::LoadNamedProperty("x".to_string()),
                    Opcode::Return,
                ],
            ))
            .with_import(ImportEntry::Namespace {
                specifier: "./a.js".to_string(),
                local: "ns".to_string(),
            }),
        );
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(5)
    );

    let a = graph.lookup("a.js").unwrap();
    let ns = graph.namespace_object(&mut realm, &host, a).unwrap();
    assert_eq!(graph.namespace_object(&mut realm, &host, a).unwrap(), ns);
    assert_eq!(operations::type_of(&realm, &ns), "object");
    assert_eq!(operations::get_value(&mut realm, &ns, "y").unwrap(), Value::Smi(2));
    assert_eq!(
        operations::get_value(&mut realm, &ns, "missing").unwrap(),
        Value::Undefined
    );
}

#[test]
fn test_star_as_export() {
    let host = StaticModuleMap::new()
        .with(
            "a.js",
            ModuleSource::new(body(
                "a",
                [store("x", 7), vec![Opcode::PushUndefined, Opcode::Return]].concat(),
            ))
            .with_export(local("x")),
        )
        .with(
            "b.js",
            ModuleSource::new(empty("b")).with_export(ExportEntry::AllAsFrom {
                specifier: "./a.js".to_string(),
                exported: "inner".to_string(),
            }),
        )
        .with(
            "main.js",
            ModuleSource::new(body(
                "main",
                vec![
                    Opcode::LoadModuleVar("inner".to_string()),
                    Opcode::LoadNamedProperty("x".to_string()),
                    Opcode::Return,
                ],
            ))
            .with_import(named("./b.js", "inner", "inner")),
        );
    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(7)
    );
}
