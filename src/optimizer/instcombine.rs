use crate::ir::{
    BinaryOp, Body, Constant, FloatPredicate, InstrKind, IntPredicate, Value, ValueId,
};

pub fn instruction_combining(body: &mut Body) {
    while let Some((id, replacement)) = find_simplification(body) {
        body.replace_all_uses(id, &replacement);
        remove_definition(body, id);
    }
    dead_code_elimination(body);
}

fn find_simplification(body: &Body) -> Option<(ValueId, Value)> {
    body.blocks.iter().find_map(|block| {
        block.instructions.iter().find_map(|instr| {
            let id = instr.result?;
            simplify(&instr.kind, id).map(|value| (id, value))
        })
    })
}

pub(crate) fn remove_definition(body: &mut Body, id: ValueId) {
    for block in body.blocks.iter_mut() {
        block.instructions.retain(|instr| instr.result != Some(id));
    }
}

/// Drops instructions without side effects whose results are never used.
pub fn dead_code_elimination(body: &mut Body) {
    loop {
        let uses = body.use_counts();
        let mut removed = false;

        for block in body.blocks.iter_mut() {
            let before = block.instructions.len();
            block.instructions.retain(|instr| match instr.result {
                Some(id) if instr.kind.is_pure() => uses.get(&id).copied().unwrap_or(0) > 0,
                _ => true,
            });
            removed |= block.instructions.len() != before;
        }

        if !removed {
            break;
        }
    }
}

fn simplify(kind: &InstrKind, id: ValueId) -> Option<Value> {
    match kind {
        InstrKind::Binary { op, lhs, rhs } => fold_binary(*op, lhs, rhs),
        InstrKind::ICmp { pred, lhs, rhs } => fold_icmp(*pred, lhs, rhs),
        InstrKind::FCmp { pred, lhs, rhs } => {
            let (Value::Const(Constant::Float(a)), Value::Const(Constant::Float(b))) = (lhs, rhs)
            else {
                return None;
            };
            let result = match pred {
                FloatPredicate::Oeq => a == b,
                FloatPredicate::One => a != b && !a.is_nan() && !b.is_nan(),
                FloatPredicate::Olt => a < b,
                FloatPredicate::Ogt => a > b,
            };
            Some(Value::bool(result))
        }
        InstrKind::Phi { incoming } => {
            // A merge of one constant (or itself) on every edge is that constant.
            let mut values = incoming
                .iter()
                .map(|(v, _)| v)
                .filter(|v| **v != Value::Reg(id));
            let first = values.next()?;
            let uniform = values.all(|v| v == first);
            match first {
                Value::Const(_) | Value::Param(_) | Value::Global(_) if uniform => {
                    Some(first.clone())
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn fold_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Option<Value> {
    match (lhs.as_const(), rhs.as_const()) {
        (Some(Constant::Int(a)), Some(Constant::Int(b))) => {
            let result = match op {
                BinaryOp::Add => a.wrapping_add(*b),
                BinaryOp::Sub => a.wrapping_sub(*b),
                BinaryOp::Mul => a.wrapping_mul(*b),
                // Division by zero and overflow are left for run time.
                BinaryOp::SDiv => a.checked_div(*b)?,
                _ => return None,
            };
            Some(Value::int(result))
        }
        (Some(Constant::Float(a)), Some(Constant::Float(b))) => {
            let result = match op {
                BinaryOp::FAdd => a + b,
                BinaryOp::FSub => a - b,
                BinaryOp::FMul => a * b,
                BinaryOp::FDiv => a / b,
                _ => return None,
            };
            Some(Value::float(result))
        }
        (_, Some(Constant::Int(0))) if matches!(op, BinaryOp::Add | BinaryOp::Sub) => {
            Some(lhs.clone())
        }
        (Some(Constant::Int(0)), _) if op == BinaryOp::Add => Some(rhs.clone()),
        (_, Some(Constant::Int(1))) if matches!(op, BinaryOp::Mul | BinaryOp::SDiv) => {
            Some(lhs.clone())
        }
        (Some(Constant::Int(1)), _) if op == BinaryOp::Mul => Some(rhs.clone()),
        _ => None,
    }
}

fn fold_icmp(pred: IntPredicate, lhs: &Value, rhs: &Value) -> Option<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Const(Constant::Int(a)), Value::Const(Constant::Int(b))) => a.cmp(b),
        (Value::Const(Constant::Bool(a)), Value::Const(Constant::Bool(b))) => a.cmp(b),
        // Interned strings share one global per distinct literal.
        (Value::Global(a), Value::Global(b)) if matches!(pred, IntPredicate::Eq | IntPredicate::Ne) => {
            a.cmp(b)
        }
        _ => return None,
    };
    let result = match pred {
        IntPredicate::Eq => ordering.is_eq(),
        IntPredicate::Ne => ordering.is_ne(),
        IntPredicate::Slt => ordering.is_lt(),
        IntPredicate::Sgt => ordering.is_gt(),
    };
    Some(Value::bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder::Builder, Function, IrType, Param};

    fn builder() -> Builder {
        Builder::new(&Function::declaration(
            "f",
            vec![Param {
                name: "x".into(),
                ty: IrType::I64,
            }],
            IrType::I64,
        ))
    }

    #[test]
    fn folds_constant_arithmetic() {
        let mut b = builder();
        let two = b.build_binary(BinaryOp::Add, Value::int(1), Value::int(1));
        let six = b.build_binary(BinaryOp::Mul, two, Value::int(3));
        b.build_ret(Some(six));

        let mut body = b.finish().body.unwrap();
        instruction_combining(&mut body);
        assert_eq!(body.instruction_count(), 0);
        assert_eq!(
            body.blocks[0].terminator,
            Some(crate::ir::Terminator::Ret(Some(Value::int(6))))
        );
    }

    #[test]
    fn keeps_integer_division_by_zero() {
        let mut b = builder();
        let q = b.build_binary(BinaryOp::SDiv, Value::int(1), Value::int(0));
        b.build_ret(Some(q));

        let mut body = b.finish().body.unwrap();
        instruction_combining(&mut body);
        assert_eq!(body.instruction_count(), 1);
    }

    #[test]
    fn removes_unused_pure_instructions_but_keeps_calls() {
        let mut b = builder();
        b.build_binary(BinaryOp::Add, Value::Param(0), Value::int(7));
        b.build_call("g", vec![], IrType::I64);
        b.build_ret(Some(Value::Param(0)));

        let mut body = b.finish().body.unwrap();
        instruction_combining(&mut body);
        assert_eq!(body.instruction_count(), 1);
        assert!(matches!(
            body.blocks[0].instructions[0].kind,
            InstrKind::Call { .. }
        ));
    }

    #[test]
    fn adding_zero_is_identity() {
        let mut b = builder();
        let v = b.build_binary(BinaryOp::Add, Value::Param(0), Value::int(0));
        b.build_ret(Some(v));

        let mut body = b.finish().body.unwrap();
        instruction_combining(&mut body);
        assert_eq!(
            body.blocks[0].terminator,
            Some(crate::ir::Terminator::Ret(Some(Value::Param(0))))
        );
    }

    #[test]
    fn folds_float_comparison() {
        assert_eq!(
            simplify(
                &InstrKind::FCmp {
                    pred: FloatPredicate::Oeq,
                    lhs: Value::float(0.0),
                    rhs: Value::float(0.0),
                },
                ValueId(0)
            ),
            Some(Value::bool(true))
        );
    }
}
