use crate::{
    codegen::{
        scope::TypedValue,
        types::{Signature, Type},
        Codegen,
    },
    error::{Error, Result},
    ir::{BinaryOp as IrOp, Constant, FloatPredicate, IntPredicate, IrType, Runtime, Value},
    lexer::Number,
    parser::ast::{BinaryExpression, BinaryOp, CallExpression, Expression, UnaryExpression},
};

pub const DIVISION_BY_ZERO: &str = "division by zero";

impl Codegen {
    pub(crate) fn lower_expression(&mut self, expr: &Expression) -> Result<TypedValue> {
        match expr {
            Expression::String(s) => {
                let value = self.module.intern_string(&s.replace("\\n", "\n"));
                Ok(TypedValue::new(value, Type::String))
            }
            Expression::Number(Number::Int(n)) => Ok(TypedValue::new(Value::int(*n), Type::Integer)),
            Expression::Number(Number::Float(n)) => {
                Ok(TypedValue::new(Value::float(*n), Type::Float))
            }
            Expression::Bool(b) => Ok(TypedValue::new(Value::bool(*b), Type::Boolean)),
            Expression::Variable(name) => self
                .scope
                .lookup(name)
                .cloned()
                .ok_or_else(|| Error::undefined(name)),
            Expression::Binary(binary) => self.lower_binary(binary),
            Expression::Unary(unary) => self.lower_unary(unary),
            Expression::Call(call) => self.lower_call(call),
            Expression::Sequence(elements) => self.lower_sequence(elements),
        }
    }

    pub(crate) fn lower_condition(&mut self, expr: &Expression) -> Result<Value> {
        let cond = self.lower_expression(expr)?;
        if cond._type != Type::Boolean {
            return Err(Error::type_mismatch(format!(
                "condition must be bool, found {}",
                cond._type
            )));
        }
        Ok(cond.value)
    }

    fn signature(&self, name: &str) -> Option<Signature> {
        self.module.get_function(name).and_then(Signature::of)
    }

    fn emit_call(&mut self, callee: &str, signature: &Signature, args: Vec<Value>) -> TypedValue {
        let ret = signature.ret.to_ir();
        match self.builder().build_call(callee, args, ret) {
            Some(value) => TypedValue::new(value, signature.ret.clone()),
            None => TypedValue::void(),
        }
    }

    fn lower_call(&mut self, call: &CallExpression) -> Result<TypedValue> {
        let Some(signature) = self.signature(&call.callee) else {
            return Err(Error::undefined(&call.callee));
        };
        if signature.params.len() != call.args.len() {
            return Err(Error::ArityMismatch {
                callee: call.callee.clone(),
                expected: signature.params.len(),
                found: call.args.len(),
            });
        }

        let mut args = Vec::with_capacity(call.args.len());
        for (idx, (arg, expected)) in call.args.iter().zip(&signature.params).enumerate() {
            let arg = self.lower_expression(arg)?;
            if arg._type != *expected {
                return Err(Error::type_mismatch(format!(
                    "argument {} of '{}' expects {}, found {}",
                    idx + 1,
                    call.callee,
                    expected,
                    arg._type
                )));
            }
            args.push(arg.value);
        }

        Ok(self.emit_call(&call.callee, &signature, args))
    }

    fn lower_binary(&mut self, binary: &BinaryExpression) -> Result<TypedValue> {
        let lhs = self.lower_expression(&binary.lhs)?;
        let rhs = self.lower_expression(&binary.rhs)?;

        let name = format!("binary_{}", binary.op);
        let overload = self.signature(&name);
        if let Some(signature) = &overload {
            if signature.params == [lhs._type.clone(), rhs._type.clone()] {
                return Ok(self.emit_call(&name, signature, vec![lhs.value, rhs.value]));
            }
        }

        match self.lower_builtin_binary(binary.op, &lhs, &rhs) {
            Err(Error::TypeMismatch { .. }) if overload.is_some() => Err(Error::MissingOverload {
                name,
                operands: format!("({}, {})", lhs._type, rhs._type),
            }),
            result => result,
        }
    }

    fn lower_builtin_binary(
        &mut self,
        op: BinaryOp,
        lhs: &TypedValue,
        rhs: &TypedValue,
    ) -> Result<TypedValue> {
        if lhs._type != rhs._type {
            return Err(Error::type_mismatch(format!(
                "operator '{}' applied to {} and {}",
                op, lhs._type, rhs._type
            )));
        }

        let (l, r) = (lhs.value.clone(), rhs.value.clone());
        let result = match (&lhs._type, op) {
            (Type::Integer, BinaryOp::Add) => self.arith(IrOp::Add, l, r, Type::Integer),
            (Type::Integer, BinaryOp::Sub) => self.arith(IrOp::Sub, l, r, Type::Integer),
            (Type::Integer, BinaryOp::Mul) => self.arith(IrOp::Mul, l, r, Type::Integer),
            (Type::Integer, BinaryOp::Div) => self.arith(IrOp::SDiv, l, r, Type::Integer),
            (Type::Integer, BinaryOp::Less) => self.icmp(IntPredicate::Slt, l, r),
            (Type::Integer, BinaryOp::Greater) => self.icmp(IntPredicate::Sgt, l, r),
            (Type::Float, BinaryOp::Add) => self.arith(IrOp::FAdd, l, r, Type::Float),
            (Type::Float, BinaryOp::Sub) => self.arith(IrOp::FSub, l, r, Type::Float),
            (Type::Float, BinaryOp::Mul) => self.arith(IrOp::FMul, l, r, Type::Float),
            (Type::Float, BinaryOp::Div) => self.lower_float_division(l, r),
            (Type::Float, BinaryOp::Less) => self.fcmp(FloatPredicate::Olt, l, r),
            (Type::Float, BinaryOp::Greater) => self.fcmp(FloatPredicate::Ogt, l, r),
            (Type::Float, BinaryOp::Equal) => self.fcmp(FloatPredicate::Oeq, l, r),
            (Type::Float, BinaryOp::NotEqual) => self.fcmp(FloatPredicate::One, l, r),
            (Type::Integer | Type::String | Type::Boolean, BinaryOp::Equal) => {
                self.icmp(IntPredicate::Eq, l, r)
            }
            (Type::Integer | Type::String | Type::Boolean, BinaryOp::NotEqual) => {
                self.icmp(IntPredicate::Ne, l, r)
            }
            (Type::String, BinaryOp::Add) => {
                return Err(Error::type_mismatch("string concatenation is not supported"))
            }
            (ty, op) => {
                return Err(Error::type_mismatch(format!(
                    "operator '{}' is not defined for {}",
                    op, ty
                )))
            }
        };

        Ok(result)
    }

    fn arith(&mut self, op: IrOp, lhs: Value, rhs: Value, ty: Type) -> TypedValue {
        TypedValue::new(self.builder().build_binary(op, lhs, rhs), ty)
    }

    fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> TypedValue {
        TypedValue::new(self.builder().build_icmp(pred, lhs, rhs), Type::Boolean)
    }

    fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> TypedValue {
        TypedValue::new(self.builder().build_fcmp(pred, lhs, rhs), Type::Boolean)
    }

    /// Float division, guarded unless disabled:
    ///
    /// ```text
    ///   %z = fcmp oeq double %rhs, 0.0
    ///   br i1 %z, label %div.zero, label %div.ok
    /// div.zero:  call puts("division by zero"); call abort(); br %div.merge
    /// div.ok:    %q = fdiv double %lhs, %rhs; br %div.merge
    /// div.merge: phi double [ undef, %div.zero ], [ %q, %div.ok ]
    /// ```
    fn lower_float_division(&mut self, lhs: Value, rhs: Value) -> TypedValue {
        if !self.config.div_guard {
            return self.arith(IrOp::FDiv, lhs, rhs, Type::Float);
        }

        let message = self.module.intern_string(DIVISION_BY_ZERO);
        self.module.declare_runtime(Runtime::Puts);
        self.module.declare_runtime(Runtime::Abort);

        let builder = self.builder();
        let is_zero = builder.build_fcmp(FloatPredicate::Oeq, rhs.clone(), Value::float(0.0));
        let zero_block = builder.append_block("div.zero");
        let ok_block = builder.append_block("div.ok");
        let merge_block = builder.append_block("div.merge");
        builder.build_cond_br(is_zero, zero_block, ok_block);

        builder.position_at_end(zero_block);
        builder.build_call(Runtime::Puts.name(), vec![message], Runtime::Puts.ret());
        builder.build_call(Runtime::Abort.name(), vec![], Runtime::Abort.ret());
        builder.build_br(merge_block);

        builder.position_at_end(ok_block);
        let quotient = builder.build_binary(IrOp::FDiv, lhs, rhs);
        builder.build_br(merge_block);

        builder.position_at_end(merge_block);
        let result = builder.build_phi(
            IrType::Double,
            vec![
                (Value::Const(Constant::Undef(IrType::Double)), zero_block),
                (quotient, ok_block),
            ],
        );

        TypedValue::new(result, Type::Float)
    }

    fn lower_unary(&mut self, unary: &UnaryExpression) -> Result<TypedValue> {
        let operand = self.lower_expression(&unary.expr)?;
        let name = format!("unary_{}", unary.op);

        match self.signature(&name) {
            Some(signature) if signature.params == [operand._type.clone()] => {
                Ok(self.emit_call(&name, &signature, vec![operand.value]))
            }
            _ => Err(Error::MissingOverload {
                name,
                operands: format!("({})", operand._type),
            }),
        }
    }

    /// Builds a sequence literal in a fresh stack array.
    fn lower_sequence(&mut self, elements: &[Expression]) -> Result<TypedValue> {
        let mut values = Vec::with_capacity(elements.len());
        let mut elem_type: Option<Type> = None;

        for element in elements {
            let element = self.lower_expression(element)?;
            if !element._type.is_scalar() {
                return Err(Error::type_mismatch(format!(
                    "sequence elements must be scalar, found {}",
                    element._type
                )));
            }
            match &elem_type {
                Some(ty) if *ty != element._type => {
                    return Err(Error::type_mismatch(format!(
                        "sequence mixes {} and {}",
                        ty, element._type
                    )))
                }
                Some(_) => {}
                None => elem_type = Some(element._type.clone()),
            }
            values.push(element.value);
        }

        let Some(elem_type) = elem_type else {
            return Err(Error::type_mismatch("empty sequence literal has no element type"));
        };

        let elem_ir = elem_type.to_ir();
        let len = values.len();
        let builder = self.builder();
        let array = builder.build_alloca(IrType::Array(elem_ir.clone().into(), len));
        for (idx, value) in values.into_iter().enumerate() {
            let slot = builder.build_element_ptr(elem_ir.clone(), array.clone(), Value::int(idx as i64));
            builder.build_store(value, slot);
        }

        Ok(TypedValue::new(array, Type::Sequence(elem_type.into(), len)))
    }
}
