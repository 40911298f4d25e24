//! Tests for module variable access through the interpreter

use super::*;
use bytecode_system::{Constant, Opcode};
use interpreter::{EnvId, ExportTarget, InternalError};

fn run_module(realm: &mut Realm, env: EnvId, info: FunctionInfo) -> ExecutionResult {
    Interpreter::new(Rc::new(info), Vec::new(), env).interpret(realm)
}

/// lib exports `count`; main imports it as `n`
fn linked_pair(realm: &mut Realm) -> (EnvId, EnvId) {
    let global = realm.global_env();
    let lib = realm.envs.allocate_module_id();
    let main = realm.envs.allocate_module_id();
    let lib_env = realm.envs.new_module(global, lib).unwrap();
    let main_env = realm.envs.new_module(global, main).unwrap();
    realm
        .envs
        .create_mutable_binding(lib_env, "count", false)
        .unwrap();
    realm
        .envs
        .set_export(lib_env, "count", ExportTarget::Local("count".to_string()))
        .unwrap();
    realm
        .envs
        .set_indirect_binding(main_env, "n", lib, "count")
        .unwrap();
    (lib_env, main_env)
}

#[test]
fn test_import_observes_export_writes() {
    let mut realm = Realm::new();
    let (lib_env, main_env) = linked_pair(&mut realm);

    let mut init = FunctionInfo::new("lib");
    init.emit(Opcode::PushConstant(Constant::Integer(1)));
    init.emit(Opcode::StoreModuleVar("count".to_string()));
    init.emit(Opcode::PushUndefined);
    init.emit(Opcode::Return);
    assert!(run_module(&mut realm, lib_env, init).is_success());

    let mut read = FunctionInfo::new("main");
    read.emit(Opcode::LoadModuleVar("n".to_string()));
    read.emit(Opcode::Return);
    assert_eq!(
        run_module(&mut realm, main_env, read),
        ExecutionResult::Success(Value::Smi(1))
    );
}

#[test]
fn test_import_before_export_initialized() {
    let mut realm = Realm::new();
    let (_, main_env) = linked_pair(&mut realm);

    let mut read = FunctionInfo::new("main");
    read.emit(Opcode::LoadModuleVar("n".to_string()));
    read.emit(Opcode::Return);
    let result = run_module(&mut realm, main_env, read);
    assert_eq!(
        thrown(&mut realm, &result),
        "ReferenceError: Cannot access 'count' before initialization"
    );
}

#[test]
fn test_module_var_from_nested_scope() {
    let mut realm = Realm::new();
    let (lib_env, _) = linked_pair(&mut realm);
    realm
        .envs
        .initialize_binding(lib_env, "count", Value::Smi(4))
        .unwrap();

    let mut read = FunctionInfo::new("block");
    read.emit(Opcode::PushDeclarativeEnvRecord(2));
    read.emit(Opcode::LoadModuleVar("count".to_string()));
    read.emit(Opcode::Return);
    assert_eq!(
        run_module(&mut realm, lib_env, read),
        ExecutionResult::Success(Value::Smi(4))
    );
}

#[test]
fn test_module_var_outside_module() {
    let mut info = FunctionInfo::new("script");
    info.emit(Opcode::LoadModuleVar("x".to_string()));
    info.emit(Opcode::Return);
    assert_eq!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::NoModuleEnvironment)
    );
}
