//! Tests for FunctionInfo assembly

use bytecode_system::{
    Constant, FunctionInfo, FunctionKind, HandlerRange, LocalKind, Opcode, NEW_TARGET_LOCAL,
    RECEIVER_LOCAL,
};

#[test]
fn test_new_function_is_empty() {
    let info = FunctionInfo::new("script");
    assert_eq!(info.name, "script");
    assert_eq!(info.arg_count, 0);
    assert!(info.locals.is_empty());
    assert!(info.opcodes.is_empty());
    assert!(!info.is_strict);
    assert_eq!(info.kind, FunctionKind::Normal);
}

#[test]
fn test_emit_returns_index() {
    let mut info = FunctionInfo::new("f");
    assert_eq!(info.emit(Opcode::PushNull), 0);
    assert_eq!(info.emit(Opcode::Return), 1);
    assert_eq!(info.opcode_count(), 2);
}

#[test]
fn test_callable_layout() {
    let info = FunctionInfo::callable("f", FunctionKind::Normal, 1).strict();
    assert!(info.is_strict);
    assert_eq!(info.local_kind(RECEIVER_LOCAL), Some(LocalKind::Value));
    assert_eq!(info.local_kind(NEW_TARGET_LOCAL), Some(LocalKind::Value));
    assert_eq!(info.arg_count, 3);
}

#[test]
fn test_add_local_ids_are_sequential() {
    let mut info = FunctionInfo::new("f");
    let a = info.add_local(LocalKind::Int);
    let b = info.add_local(LocalKind::Value);
    assert_eq!(a.0, 0);
    assert_eq!(b.0, 1);
    assert_eq!(info.local_kind(a), Some(LocalKind::Int));
}

#[test]
fn test_forward_jump_patching() {
    let mut info = FunctionInfo::new("f");
    info.emit(Opcode::PushTrue);
    let branch = info.emit(Opcode::JumpIfFalse(0));
    info.emit(Opcode::PushConstant(Constant::Integer(1)));
    let skip = info.emit(Opcode::Jump(0));
    let else_start = info.opcode_count();
    info.emit(Opcode::PushConstant(Constant::Integer(2)));
    let end = info.opcode_count();
    info.emit(Opcode::Return);

    assert!(info.patch_jump(branch, else_start));
    assert!(info.patch_jump(skip, end));
    assert_eq!(info.opcodes[1], Opcode::JumpIfFalse(4));
    assert_eq!(info.opcodes[3], Opcode::Jump(5));
}

#[test]
fn test_find_handler_prefers_innermost() {
    let mut info = FunctionInfo::new("f");
    info.add_handler(HandlerRange::new(0, 20, 30));
    info.add_handler(HandlerRange::new(3, 7, 10));
    assert_eq!(info.find_handler(5), Some(&HandlerRange::new(3, 7, 10)));
    assert_eq!(info.find_handler(0), Some(&HandlerRange::new(0, 20, 30)));
    assert_eq!(info.find_handler(21), None);
}

#[test]
fn test_nested_function_indices() {
    let mut info = FunctionInfo::new("outer");
    let first = info.add_nested_function(FunctionInfo::new("a"));
    let second = info.add_nested_function(FunctionInfo::new("b"));
    assert_eq!((first, second), (0, 1));
    assert_eq!(info.nested_functions[1].name, "b");
}
