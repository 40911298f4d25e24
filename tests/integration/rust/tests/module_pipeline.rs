//! Module Pipeline Integration Tests
//!
//! Tests module graphs whose bodies call into each other: functions defined
//! in one module run against that module's bindings, generators cross module
//! boundaries, and exceptions surface as module errors.

use bytecode_system::{Constant, FunctionInfo, FunctionKind, LocalKind, Opcode};
use core_types::Value;
use interpreter::Realm;
use module_system::{ExportEntry, ImportEntry, ModuleError, ModuleGraph, ModuleSource, StaticModuleMap};

#[ctor::ctor]
fn __init_test_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .is_test(true)
        .try_init();
}

fn import(specifier: &str, name: &str) -> ImportEntry {
    ImportEntry::Named {
        specifier: specifier.to_string(),
        imported: name.to_string(),
        local: name.to_string(),
    }
}

fn export(name: &str) -> ExportEntry {
    ExportEntry::Local {
        local: name.to_string(),
        exported: name.to_string(),
    }
}

/// Emit `name()` and leave the result on the stack
fn call_import(info: &mut FunctionInfo, name: &str) {
    info.emit(Opcode::LoadModuleVar(name.to_string()));
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Call(0));
}

/// lib/counter.js:
///   export let count = 0;
///   export function inc() { count = count + 1 }
fn counter_module() -> ModuleSource {
    let mut inc = FunctionInfo::callable("inc", FunctionKind::Normal, 0);
    inc.emit(Opcode::LoadModuleVar("count".to_string()));
    inc.emit(Opcode::PushConstant(Constant::Integer(1)));
    inc.emit(Opcode::Add);
    inc.emit(Opcode::StoreModuleVar("count".to_string()));
    inc.emit(Opcode::PushUndefined);
    inc.emit(Opcode::Return);

    let mut body = FunctionInfo::new("counter");
    body.add_nested_function(inc);
    body.emit(Opcode::CreateClosure(0));
    body.emit(Opcode::StoreModuleVar("inc".to_string()));
    body.emit(Opcode::PushConstant(Constant::Integer(0)));
    body.emit(Opcode::StoreModuleVar("count".to_string()));
    body.emit(Opcode::PushUndefined);
    body.emit(Opcode::Return);

    ModuleSource::new(body)
        .with_export(export("count"))
        .with_export(export("inc"))
}

/// Test: imports observe writes made by the exporting module
#[test]
fn test_live_binding_through_exported_function() {
    // app/main.js:
    //   import { count, inc } from '../lib/counter.js';
    //   inc(); inc(); count
    let mut main = FunctionInfo::new("main");
    call_import(&mut main, "inc");
    main.emit(Opcode::Pop);
    call_import(&mut main, "inc");
    main.emit(Opcode::Pop);
    main.emit(Opcode::LoadModuleVar("count".to_string()));
    main.emit(Opcode::Return);

    let host = StaticModuleMap::new()
        .with("lib/counter.js", counter_module())
        .with(
            "app/main.js",
            ModuleSource::new(main)
                .with_import(import("../lib/counter.js", "count"))
                .with_import(import("../lib/counter.js", "inc")),
        );

    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "app/main.js").unwrap(),
        Value::Smi(2)
    );

    let counter = graph.lookup("lib/counter.js").unwrap();
    let env = graph.module(counter).unwrap().environment().unwrap();
    assert_eq!(
        realm.envs.get_binding_value(env, "count").unwrap(),
        Value::Smi(2)
    );
}

/// Test: a generator defined in one module is driven from another
#[test]
fn test_generator_across_modules() {
    // gen.js: export function* pair() { yield 1; yield 2 }
    let mut pair = FunctionInfo::callable("pair", FunctionKind::Generator, 0);
    pair.emit(Opcode::GetGeneratorPhase); // 0
    pair.emit(Opcode::JumpTable([(0, 2), (1, 5), (2, 10)].into_iter().collect())); // 1
    pair.emit(Opcode::PushConstant(Constant::Integer(1))); // 2
    pair.emit(Opcode::SetGeneratorPhase(1)); // 3
    pair.emit(Opcode::Yield); // 4
    pair.emit(Opcode::GeneratorSentValue); // 5
    pair.emit(Opcode::Pop); // 6
    pair.emit(Opcode::PushConstant(Constant::Integer(2))); // 7
    pair.emit(Opcode::SetGeneratorPhase(2)); // 8
    pair.emit(Opcode::Yield); // 9
    pair.emit(Opcode::GeneratorSentValue); // 10
    pair.emit(Opcode::Pop); // 11
    pair.emit(Opcode::PushUndefined); // 12
    pair.emit(Opcode::Return); // 13

    let mut gen = FunctionInfo::new("gen");
    gen.add_nested_function(pair);
    gen.emit(Opcode::CreateGeneratorClosure(0));
    gen.emit(Opcode::StoreModuleVar("pair".to_string()));
    gen.emit(Opcode::PushUndefined);
    gen.emit(Opcode::Return);

    // main.js: import { pair } from './gen.js';
    //          const g = pair(); g.next().value + g.next().value
    let mut main = FunctionInfo::new("main");
    let g = main.add_local(LocalKind::Value);
    call_import(&mut main, "pair");
    main.emit(Opcode::StoreValue(g));
    for _ in 0..2 {
        main.emit(Opcode::LoadValue(g));
        main.emit(Opcode::LoadNamedProperty("next".to_string()));
        main.emit(Opcode::LoadValue(g));
        main.emit(Opcode::Call(0));
        main.emit(Opcode::LoadNamedProperty("value".to_string()));
    }
    main.emit(Opcode::Add);
    main.emit(Opcode::Return);

    let host = StaticModuleMap::new()
        .with("gen.js", ModuleSource::new(gen).with_export(export("pair")))
        .with(
            "main.js",
            ModuleSource::new(main).with_import(import("./gen.js", "pair")),
        );

    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(3)
    );
}

/// Test: an exception thrown by an imported function fails the importer
#[test]
fn test_exception_from_imported_function() {
    // lib.js: const x = 1; export function reset() { x = 0 }
    let mut reset = FunctionInfo::callable("reset", FunctionKind::Normal, 0);
    reset.emit(Opcode::ThrowConstantReassignmentError("x".to_string()));

    let mut lib = FunctionInfo::new("lib");
    lib.add_nested_function(reset);
    lib.emit(Opcode::CreateClosure(0));
    lib.emit(Opcode::StoreModuleVar("reset".to_string()));
    lib.emit(Opcode::PushUndefined);
    lib.emit(Opcode::Return);

    let mut main = FunctionInfo::new("main");
    call_import(&mut main, "reset");
    main.emit(Opcode::Return);

    let host = StaticModuleMap::new()
        .with("lib.js", ModuleSource::new(lib).with_export(export("reset")))
        .with(
            "main.js",
            ModuleSource::new(main).with_import(import("./lib.js", "reset")),
        );

    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    match graph.execute(&mut realm, &host, "main.js") {
        Err(ModuleError::Uncaught {
            key, description, ..
        }) => {
            assert_eq!(key, "main.js");
            assert_eq!(
                description,
                "TypeError: Assignment to constant variable 'x'"
            );
        }
        other => panic!("expected an uncaught TypeError, got {:?}", other),
    }

    // The exporting module itself completed normally
    let lib = graph.lookup("lib.js").unwrap();
    assert_eq!(
        graph.module(lib).unwrap().evaluation_result(),
        Some(&Ok(Value::Undefined))
    );
}

/// Test: a module graph handed over as JSON executes unchanged
#[test]
fn test_graph_from_json_sources() {
    let counter = counter_module().to_json().unwrap();

    let mut main = FunctionInfo::new("main");
    call_import(&mut main, "inc");
    main.emit(Opcode::Pop);
    main.emit(Opcode::LoadModuleVar("count".to_string()));
    main.emit(Opcode::Return);
    let main = ModuleSource::new(main)
        .with_import(import("./counter.js", "count"))
        .with_import(import("./counter.js", "inc"))
        .to_json()
        .unwrap();

    let host = StaticModuleMap::new()
        .with("counter.js", ModuleSource::from_json(&counter).unwrap())
        .with("main.js", ModuleSource::from_json(&main).unwrap());

    let mut realm = Realm::new();
    let mut graph = ModuleGraph::new();
    assert_eq!(
        graph.execute(&mut realm, &host, "main.js").unwrap(),
        Value::Smi(1)
    );
}
