//! Unit tests for JsError, ErrorKind and StackFrame

use core_types::{ErrorKind, JsError, StackFrame};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_every_kind_has_distinct_name() {
        let mut names: Vec<&str> = ErrorKind::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ErrorKind::ALL.len());
    }

    #[test]
    fn test_kind_display_matches_constructor_name() {
        assert_eq!(ErrorKind::URIError.to_string(), "URIError");
        assert_eq!(ErrorKind::EvalError.to_string(), "EvalError");
    }
}

#[cfg(test)]
mod js_error_tests {
    use super::*;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(JsError::type_error("a").kind, ErrorKind::TypeError);
        assert_eq!(JsError::reference_error("a").kind, ErrorKind::ReferenceError);
        assert_eq!(JsError::syntax_error("a").kind, ErrorKind::SyntaxError);
        assert_eq!(JsError::range_error("a").kind, ErrorKind::RangeError);
    }

    #[test]
    fn test_error_display_uses_kind_and_message() {
        let error = JsError::syntax_error("Unexpected token");
        assert_eq!(format!("{}", error), "SyntaxError: Unexpected token");
    }

    #[test]
    fn test_error_is_std_error() {
        fn assert_error<E: std::error::Error>(_: &E) {}
        assert_error(&JsError::type_error("x"));
    }

    #[test]
    fn test_stack_frames_accumulate_in_order() {
        let error = JsError::type_error("boom")
            .with_frame(StackFrame::new("inner", 4))
            .with_frame(StackFrame::new("outer", 9));
        assert_eq!(error.stack[0].function_name, "inner");
        assert_eq!(error.stack[1].opcode_index, 9);
    }
}
