use std::collections::HashMap;

use crate::{codegen::types::Type, ir::Value};

#[derive(Debug, Clone, PartialEq)]
pub struct TypedValue {
    pub value: Value,
    pub _type: Type,
}

impl TypedValue {
    pub fn new(value: Value, _type: Type) -> TypedValue {
        TypedValue { value, _type }
    }

    /// Stand-in result of a call to a void function.
    pub fn void() -> TypedValue {
        TypedValue {
            value: Value::Const(crate::ir::Constant::Undef(crate::ir::IrType::Void)),
            _type: Type::Void,
        }
    }
}

/// Name bindings of the function being lowered. Each block and loop pushes
/// a frame; lookups walk from the innermost frame outwards.
#[derive(Debug, Clone)]
pub struct Scope {
    frames: Vec<HashMap<String, TypedValue>>,
}

impl Default for Scope {
    fn default() -> Scope {
        Scope::new()
    }
}

impl Scope {
    pub fn new() -> Scope {
        Scope {
            frames: vec![HashMap::new()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn bind(&mut self, name: &str, value: TypedValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_owned(), value);
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&TypedValue> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_frames_shadow_and_unwind() {
        let mut scope = Scope::new();
        scope.bind("x", TypedValue::new(Value::Param(0), Type::Float));

        scope.push();
        scope.bind("x", TypedValue::new(Value::int(1), Type::Integer));
        scope.bind("y", TypedValue::new(Value::int(2), Type::Integer));
        assert_eq!(scope.lookup("x").unwrap()._type, Type::Integer);

        scope.pop();
        assert_eq!(scope.lookup("x").unwrap()._type, Type::Float);
        assert!(scope.lookup("y").is_none());
    }

    #[test]
    fn outermost_frame_survives_pop() {
        let mut scope = Scope::new();
        scope.pop();
        assert_eq!(scope.depth(), 1);
    }
}
