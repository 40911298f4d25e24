//! Tests for opcode dispatch and handler ranges

use super::*;
use bytecode_system::{Constant, FunctionKind, HandlerRange, LocalKind, Opcode};
use interpreter::{InternalError, RealmConfig};

fn pad(info: &mut FunctionInfo, until: usize) {
    while info.opcode_count() < until {
        info.emit(Opcode::PushNull);
    }
}

#[test]
fn test_return_constant() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::Integer(1)));
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(1)));
}

#[test]
fn test_handler_keeps_operand_stack() {
    let mut info = FunctionInfo::new("main");
    pad(&mut info, 4);
    info.emit(Opcode::PushConstant(Constant::from("oops"))); // 4
    info.emit(Opcode::Throw); // 5
    pad(&mut info, 10);
    info.emit(Opcode::Return); // 10
    info.add_handler(HandlerRange::new(3, 7, 10));

    // Four pads stay below the caught value
    let (result, _) = run(info);
    assert_eq!(result, ExecutionResult::InternalError(InternalError::StackHeight(5)));
}

#[test]
fn test_handler_value_on_top() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::Integer(7))); // 0
    info.emit(Opcode::Throw); // 1
    info.emit(Opcode::PushConstant(Constant::Integer(0))); // 2
    info.emit(Opcode::Return); // 3
    info.emit(Opcode::Return); // 4
    info.add_handler(HandlerRange::new(0, 3, 4));
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(7)));
}

#[test]
fn test_innermost_handler_wins() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::from("x"))); // 0
    info.emit(Opcode::Throw); // 1
    pad(&mut info, 15);
    info.emit(Opcode::Pop); // 15
    info.emit(Opcode::PushConstant(Constant::from("inner"))); // 16
    info.emit(Opcode::Return); // 17
    info.emit(Opcode::Pop); // 18
    info.emit(Opcode::PushConstant(Constant::from("outer"))); // 19
    info.emit(Opcode::Return); // 20
    info.add_handler(HandlerRange::new(0, 10, 18));
    info.add_handler(HandlerRange::new(1, 5, 15));
    assert_eq!(
        run(info).0,
        ExecutionResult::Success(Value::string("inner"))
    );
}

#[test]
fn test_uncaught_throw() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::Integer(99)));
    info.emit(Opcode::Throw);
    assert_eq!(run(info).0, ExecutionResult::RuntimeError(Value::Smi(99)));
}

#[test]
fn test_throw_from_callee_caught_by_caller() {
    let mut thrower = FunctionInfo::callable("thrower", FunctionKind::Normal, 0);
    thrower.emit(Opcode::PushConstant(Constant::from("bad")));
    thrower.emit(Opcode::Throw);

    let mut info = FunctionInfo::new("main");
    info.add_nested_function(thrower);
    info.emit(Opcode::CreateClosure(0)); // 0
    info.emit(Opcode::PushUndefined); // 1
    info.emit(Opcode::Call(0)); // 2
    info.emit(Opcode::Return); // 3
    info.emit(Opcode::Return); // 4
    info.add_handler(HandlerRange::new(2, 2, 4));
    assert_eq!(run(info).0, ExecutionResult::Success(Value::string("bad")));
}

#[test]
fn test_stack_height_internal_error() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::Return);
    assert_eq!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::StackHeight(0))
    );
}

#[test]
fn test_internal_error_ignores_handlers() {
    let mut info = FunctionInfo::new("main");
    let n = info.add_local(LocalKind::Int);
    info.emit(Opcode::LoadValue(n)); // 0
    info.emit(Opcode::Return); // 1
    info.emit(Opcode::Return); // 2
    info.add_handler(HandlerRange::new(0, 1, 2));
    assert!(matches!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::LocalKind { .. })
    ));
}

#[test]
fn test_pop_from_empty_stack() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::Pop);
    assert_eq!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::StackUnderflow)
    );
}

#[test]
fn test_boolean_jumps() {
    let mut info = FunctionInfo::new("main");
    let flag = info.add_local(LocalKind::Boolean);
    info.emit(Opcode::PushTrue); // 0
    info.emit(Opcode::StoreBoolean(flag)); // 1
    info.emit(Opcode::LoadBoolean(flag)); // 2
    info.emit(Opcode::JumpIfTrue(6)); // 3
    info.emit(Opcode::PushConstant(Constant::from("no"))); // 4
    info.emit(Opcode::Return); // 5
    info.emit(Opcode::PushConstant(Constant::from("yes"))); // 6
    info.emit(Opcode::Return); // 7
    assert_eq!(run(info).0, ExecutionResult::Success(Value::string("yes")));
}

#[test]
fn test_truthiness_jumps() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::from(""))); // 0
    info.emit(Opcode::JumpIfToBooleanFalse(4)); // 1
    info.emit(Opcode::PushConstant(Constant::Integer(1))); // 2
    info.emit(Opcode::Return); // 3
    info.emit(Opcode::PushNull); // 4
    info.emit(Opcode::JumpIfNotNullish(8)); // 5
    info.emit(Opcode::PushConstant(Constant::Integer(2))); // 6
    info.emit(Opcode::Return); // 7
    info.emit(Opcode::PushConstant(Constant::Integer(3))); // 8
    info.emit(Opcode::Return); // 9
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(2)));
}

#[test]
fn test_missing_jump_table_entry() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushInt(5));
    info.emit(Opcode::JumpTable([(0, 0)].into_iter().collect()));
    assert_eq!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::MissingJumpTarget(5))
    );
}

#[test]
fn test_template_literal() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::from("a")));
    info.emit(Opcode::PushConstant(Constant::Integer(1)));
    info.emit(Opcode::PushNull);
    info.emit(Opcode::PushConstant(Constant::from("b")));
    info.emit(Opcode::CreateTemplateLiteral(4));
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::string("a1nullb")));
}

#[test]
fn test_store_array_advances_index() {
    let mut info = FunctionInfo::new("main");
    let array = info.add_local(LocalKind::Value);
    let index = info.add_local(LocalKind::Int);
    info.emit(Opcode::CreateArray);
    info.emit(Opcode::StoreValue(array));
    info.emit(Opcode::PushConstant(Constant::from("a")));
    info.emit(Opcode::StoreArray { array, index });
    info.emit(Opcode::PushConstant(Constant::from("b")));
    info.emit(Opcode::StoreArray { array, index });
    info.emit(Opcode::PushConstant(Constant::from("e")));
    info.emit(Opcode::StoreArrayIndexed { array, index: 4 });
    info.emit(Opcode::LoadValue(array));
    info.emit(Opcode::LoadNamedProperty("length".to_string()));
    info.emit(Opcode::LoadInt(index));
    info.emit(Opcode::Pop);
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(5)));
}

#[test]
fn test_array_element_past_limit_is_catchable() {
    let mut info = FunctionInfo::new("main");
    let array = info.add_local(LocalKind::Value);
    info.emit(Opcode::CreateArray); // 0
    info.emit(Opcode::StoreValue(array)); // 1
    info.emit(Opcode::PushConstant(Constant::from("x"))); // 2
    info.emit(Opcode::StoreArrayIndexed { array, index: 4_000_000_000 }); // 3
    info.emit(Opcode::PushUndefined); // 4
    info.emit(Opcode::Return); // 5
    info.emit(Opcode::LoadNamedProperty("message".to_string())); // 6
    info.emit(Opcode::Return); // 7
    info.add_handler(HandlerRange::new(2, 4, 6));

    let mut realm = Realm::with_config(RealmConfig {
        max_array_length: 1024,
        ..RealmConfig::default()
    });
    assert_eq!(
        run_in(&mut realm, info),
        ExecutionResult::Success(Value::string("Invalid array length"))
    );
}

#[test]
fn test_declare_globals_then_read_before_init() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::DeclareGlobals {
        vars: vec!["v".to_string()],
        lexicals: vec!["x".to_string()],
        functions: vec![],
    });
    info.emit(Opcode::LoadGlobal("x".to_string()));
    info.emit(Opcode::Return);
    let (result, mut realm) = run(info);
    assert_eq!(
        thrown(&mut realm, &result),
        "ReferenceError: Cannot access 'x' before initialization"
    );
}

#[test]
fn test_declare_globals_conflict_is_syntax_error() {
    let declare = || {
        let mut info = FunctionInfo::new("script");
        info.emit(Opcode::DeclareGlobals {
            vars: vec![],
            lexicals: vec!["x".to_string()],
            functions: vec![],
        });
        info.emit(Opcode::PushUndefined);
        info.emit(Opcode::Return);
        info
    };
    let mut realm = Realm::new();
    assert!(run_in(&mut realm, declare()).is_success());
    let result = run_in(&mut realm, declare());
    assert!(thrown(&mut realm, &result).starts_with("SyntaxError"));
}

#[test]
fn test_global_store_and_load() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::Integer(3)));
    info.emit(Opcode::StoreGlobal("answer".to_string()));
    info.emit(Opcode::LoadGlobal("answer".to_string()));
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(3)));
}

#[test]
fn test_strict_store_to_undeclared_global() {
    let mut info = FunctionInfo::new("main").strict();
    info.emit(Opcode::PushConstant(Constant::Integer(3)));
    info.emit(Opcode::StoreGlobal("missing".to_string()));
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Return);
    let (result, mut realm) = run(info);
    assert_eq!(
        thrown(&mut realm, &result),
        "ReferenceError: missing is not defined"
    );
}

#[test]
fn test_load_undefined_global() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::LoadGlobal("nope".to_string()));
    info.emit(Opcode::Return);
    let (result, mut realm) = run(info);
    assert_eq!(thrown(&mut realm, &result), "ReferenceError: nope is not defined");
}

#[test]
fn test_constant_reassignment_error() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::ThrowConstantReassignmentError("k".to_string()));
    let (result, mut realm) = run(info);
    assert_eq!(
        thrown(&mut realm, &result),
        "TypeError: Assignment to constant variable 'k'"
    );
}

#[test]
fn test_closures_share_environment() {
    // inc() { slot0 = slot0 + 1; return slot0 }
    let mut inc = FunctionInfo::callable("inc", FunctionKind::Normal, 0);
    inc.emit(Opcode::LoadCurrentEnvSlot(0));
    inc.emit(Opcode::Inc);
    inc.emit(Opcode::Dup);
    inc.emit(Opcode::StoreCurrentEnvSlot(0));
    inc.emit(Opcode::Return);

    // get() { return slot0 } read through its own scope one level down
    let mut get = FunctionInfo::callable("get", FunctionKind::Normal, 0);
    get.emit(Opcode::PushDeclarativeEnvRecord(1));
    get.emit(Opcode::LoadEnvSlot { slot: 0, distance: 1 });
    get.emit(Opcode::Return);

    let mut info = FunctionInfo::new("main");
    let inc_local = info.add_local(LocalKind::Value);
    let get_local = info.add_local(LocalKind::Value);
    info.add_nested_function(inc);
    info.add_nested_function(get);
    info.emit(Opcode::PushDeclarativeEnvRecord(1));
    info.emit(Opcode::PushConstant(Constant::Integer(0)));
    info.emit(Opcode::StoreCurrentEnvSlot(0));
    info.emit(Opcode::CreateClosure(0));
    info.emit(Opcode::StoreValue(inc_local));
    info.emit(Opcode::CreateClosure(1));
    info.emit(Opcode::StoreValue(get_local));
    for _ in 0..2 {
        info.emit(Opcode::LoadValue(inc_local));
        info.emit(Opcode::PushUndefined);
        info.emit(Opcode::Call(0));
        info.emit(Opcode::Pop);
    }
    info.emit(Opcode::LoadValue(get_local));
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Call(0));
    info.emit(Opcode::Return);

    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(2)));
}

#[test]
fn test_uninitialized_slot_is_reference_error() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushDeclarativeEnvRecord(1));
    info.emit(Opcode::LoadCurrentEnvSlot(0));
    info.emit(Opcode::Return);
    let (result, mut realm) = run(info);
    assert!(thrown(&mut realm, &result).starts_with("ReferenceError"));
}

#[test]
fn test_pop_env_record_past_global() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PopEnvRecord);
    assert_eq!(
        run(info).0,
        ExecutionResult::InternalError(InternalError::EnvironmentChainEnded)
    );
}

#[test]
fn test_construct_binds_this() {
    // function Point(x) { this.x = x }
    let mut point = FunctionInfo::callable("Point", FunctionKind::Normal, 1);
    point.emit(Opcode::LoadValue(bytecode_system::RECEIVER_LOCAL));
    point.emit(Opcode::LoadValue(bytecode_system::LocalId(2)));
    point.emit(Opcode::StoreNamedProperty("x".to_string()));
    point.emit(Opcode::PushUndefined);
    point.emit(Opcode::Return);

    let mut info = FunctionInfo::new("main");
    info.add_nested_function(point);
    info.emit(Opcode::CreateClosure(0));
    info.emit(Opcode::Dup);
    info.emit(Opcode::PushConstant(Constant::Integer(5)));
    info.emit(Opcode::Construct(1));
    info.emit(Opcode::LoadNamedProperty("x".to_string()));
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Smi(5)));
}

#[test]
fn test_call_non_callable() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushConstant(Constant::Integer(1)));
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Call(0));
    info.emit(Opcode::Return);
    let (result, mut realm) = run(info);
    assert!(thrown(&mut realm, &result).starts_with("TypeError"));
}

#[test]
fn test_call_depth_limit() {
    // function f() { return f() }
    let mut f = FunctionInfo::callable("f", FunctionKind::Normal, 0);
    f.emit(Opcode::LoadGlobal("f".to_string()));
    f.emit(Opcode::PushUndefined);
    f.emit(Opcode::Call(0));
    f.emit(Opcode::Return);

    let mut info = FunctionInfo::new("main");
    info.add_nested_function(f);
    info.emit(Opcode::CreateClosure(0));
    info.emit(Opcode::StoreGlobal("f".to_string()));
    info.emit(Opcode::LoadGlobal("f".to_string()));
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Call(0));
    info.emit(Opcode::Return);

    let mut realm = Realm::with_config(RealmConfig {
        max_call_depth: 16,
        ..RealmConfig::default()
    });
    let result = run_in(&mut realm, info);
    assert_eq!(
        thrown(&mut realm, &result),
        "RangeError: Maximum call stack size exceeded"
    );
    assert_eq!(realm.call_depth(), 0);
}

#[test]
fn test_bytecode_error_records_frame() {
    let mut info = FunctionInfo::new("main");
    info.emit(Opcode::PushUndefined); // 0
    info.emit(Opcode::Pop); // 1
    info.emit(Opcode::ThrowLexicalAccessError("x".to_string())); // 2

    let (result, mut realm) = run(info);
    let value = match result {
        ExecutionResult::RuntimeError(value) => value,
        other => panic!("expected a runtime error, got {:?}", other),
    };
    let stack = operations::get_value(&mut realm, &value, "stack").unwrap();
    assert_eq!(
        stack,
        Value::string(
            "ReferenceError: Cannot access 'x' before initialization\n    at main (opcode 2)"
        )
    );
}

#[test]
fn test_delete_property() {
    let mut info = FunctionInfo::new("main");
    let object = info.add_local(LocalKind::Value);
    info.emit(Opcode::CreateObject);
    info.emit(Opcode::StoreValue(object));
    info.emit(Opcode::LoadValue(object));
    info.emit(Opcode::PushConstant(Constant::Integer(1)));
    info.emit(Opcode::StoreNamedProperty("p".to_string()));
    info.emit(Opcode::LoadValue(object));
    info.emit(Opcode::PushConstant(Constant::from("p")));
    info.emit(Opcode::DeletePropertySloppy);
    info.emit(Opcode::Pop);
    info.emit(Opcode::PushConstant(Constant::from("p")));
    info.emit(Opcode::LoadValue(object));
    info.emit(Opcode::TestIn);
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::Boolean(false)));
}

#[test]
fn test_type_of_function() {
    let mut info = FunctionInfo::new("main");
    info.add_nested_function(FunctionInfo::callable("f", FunctionKind::Normal, 0));
    info.emit(Opcode::CreateClosure(0));
    info.emit(Opcode::TypeOf);
    info.emit(Opcode::Return);
    assert_eq!(run(info).0, ExecutionResult::Success(Value::string("function")));
}
