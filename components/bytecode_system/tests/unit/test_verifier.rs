//! Tests for the bytecode verifier

use bytecode_system::{
    verify, FunctionInfo, FunctionKind, HandlerRange, LocalId, LocalKind, Opcode, VerifyError,
};
use std::collections::BTreeMap;

fn padded(name: &str, count: usize) -> FunctionInfo {
    let mut info = FunctionInfo::new(name);
    for _ in 0..count {
        info.emit(Opcode::PushNull);
    }
    info
}

#[test]
fn test_jump_table_target_checked() {
    let mut info = padded("f", 2);
    let table: BTreeMap<i32, usize> = [(0, 1), (1, 9)].into_iter().collect();
    info.emit(Opcode::JumpTable(table));
    assert!(matches!(
        verify(&info),
        Err(VerifyError::JumpOutOfRange { target: 9, .. })
    ));
}

#[test]
fn test_missing_local() {
    let mut info = FunctionInfo::new("f");
    info.emit(Opcode::LoadValue(LocalId(0)));
    assert!(matches!(
        verify(&info),
        Err(VerifyError::LocalOutOfRange { len: 0, .. })
    ));
}

#[test]
fn test_store_array_index_must_be_int() {
    let mut info = FunctionInfo::new("f");
    let array = info.add_local(LocalKind::Value);
    let index = info.add_local(LocalKind::Value);
    info.emit(Opcode::StoreArray { array, index });
    assert!(matches!(
        verify(&info),
        Err(VerifyError::LocalKindMismatch {
            expected: LocalKind::Int,
            ..
        })
    ));
}

#[test]
fn test_handler_past_end() {
    let mut info = padded("f", 3);
    info.add_handler(HandlerRange::new(0, 1, 3));
    assert!(matches!(
        verify(&info),
        Err(VerifyError::InvalidHandler { handler: 3, .. })
    ));
}

#[test]
fn test_partial_overlap_rejected() {
    let mut info = padded("f", 10);
    info.add_handler(HandlerRange::new(0, 4, 9));
    info.add_handler(HandlerRange::new(3, 6, 9));
    assert!(matches!(
        verify(&info),
        Err(VerifyError::HandlerOverlap { .. })
    ));
}

#[test]
fn test_builder_order_passes() {
    let mut info = padded("f", 12);
    info.add_handler(HandlerRange::new(0, 10, 11));
    info.add_handler(HandlerRange::new(3, 7, 10));
    assert_eq!(verify(&info), Ok(()));
}

#[test]
fn test_argument_slots_must_hold_values() {
    let mut info = FunctionInfo::new("f");
    info.add_local(LocalKind::Int);
    info.arg_count = 1;
    assert!(matches!(
        verify(&info),
        Err(VerifyError::ArgumentKind { .. })
    ));

    info.arg_count = 2;
    assert!(matches!(
        verify(&info),
        Err(VerifyError::ArgumentCount { arg_count: 2, .. })
    ));
}

#[test]
fn test_generator_layout_verifies() {
    let mut info = FunctionInfo::callable("gen", FunctionKind::Generator, 2);
    info.emit(Opcode::PushUndefined);
    info.emit(Opcode::Return);
    assert_eq!(verify(&info), Ok(()));
}
