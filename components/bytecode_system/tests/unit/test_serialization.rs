//! Tests for the JSON interchange format

use bytecode_system::{Constant, FunctionInfo, FunctionKind, HandlerRange, Opcode};
use std::collections::BTreeMap;

#[test]
fn test_json_preserves_nested_generator() {
    let mut generator = FunctionInfo::callable("gen", FunctionKind::Generator, 0);
    generator.emit(Opcode::GetGeneratorPhase);
    let table: BTreeMap<i32, usize> = [(0, 2)].into_iter().collect();
    generator.emit(Opcode::JumpTable(table));
    generator.emit(Opcode::PushUndefined);
    generator.emit(Opcode::Return);

    let mut script = FunctionInfo::new("script");
    let nested = script.add_nested_function(generator);
    script.emit(Opcode::CreateGeneratorClosure(nested));
    script.emit(Opcode::PushConstant(Constant::Number(1.5)));
    script.emit(Opcode::Return);
    script.add_handler(HandlerRange::new(0, 1, 2));

    let json = script.to_json().unwrap();
    let restored = FunctionInfo::from_json(&json).unwrap();
    assert_eq!(restored, script);
    assert!(restored.nested_functions[0].is_generator());
}

#[test]
fn test_json_rejects_unknown_opcode() {
    let json = r#"{"name":"f","arg_count":0,"is_strict":false,"kind":"Normal",
        "locals":[],"opcodes":["Teleport"],"handlers":[],"nested_functions":[]}"#;
    assert!(FunctionInfo::from_json(json).is_err());
}
