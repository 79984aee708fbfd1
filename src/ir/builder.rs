use crate::ir::{
    BasicBlock, BinaryOp, BlockId, Body, Constant, FloatPredicate, Function, InstrKind, Instruction,
    IntPredicate, IrType, Terminator, Value,
};

/// Appends instructions to a function body under construction. The body is
/// owned by the builder until [`Builder::finish`] hands the function back.
pub struct Builder {
    function: Function,
    current: BlockId,
}

impl Builder {
    pub fn new(declaration: &Function) -> Builder {
        let mut body = Body::default();
        let entry = body.add_block("entry");
        Builder {
            function: Function {
                body: Some(body),
                ..declaration.clone()
            },
            current: entry,
        }
    }

    pub fn finish(self) -> Function {
        self.function
    }

    fn body(&self) -> &Body {
        self.function
            .body
            .as_ref()
            .expect("builder always owns a body")
    }

    fn body_mut(&mut self) -> &mut Body {
        self.function
            .body
            .as_mut()
            .expect("builder always owns a body")
    }

    fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        self.body_mut()
            .block_mut(id)
            .expect("insertion block was removed")
    }

    pub fn append_block(&mut self, name: &str) -> BlockId {
        self.body_mut().add_block(name)
    }

    /// Moves a block to the end of the layout, so blocks print in the order
    /// their code is emitted.
    pub fn move_to_end(&mut self, id: BlockId) {
        if let Some(block) = self.body_mut().remove_block(id) {
            self.body_mut().blocks.push(block);
        }
    }

    pub fn remove_block(&mut self, id: BlockId) {
        self.body_mut().remove_block(id);
    }

    pub fn position_at_end(&mut self, id: BlockId) {
        self.current = id;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    pub fn is_terminated(&self) -> bool {
        self.body()
            .block(self.current)
            .is_some_and(|block| block.terminator.is_some())
    }

    fn push(&mut self, ty: IrType, kind: InstrKind) -> Option<Value> {
        let result = match ty {
            IrType::Void => None,
            ref ty => Some(self.body_mut().new_value(ty.clone())),
        };
        let current = self.current;
        self.block_mut(current).instructions.push(Instruction {
            result,
            ty,
            kind,
        });
        result.map(Value::Reg)
    }

    fn push_value(&mut self, ty: IrType, kind: InstrKind) -> Value {
        self.push(ty, kind)
            .unwrap_or(Value::Const(Constant::Undef(IrType::Void)))
    }

    pub fn build_binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Value {
        let ty = if op.is_float() {
            IrType::Double
        } else {
            IrType::I64
        };
        self.push_value(ty, InstrKind::Binary { op, lhs, rhs })
    }

    pub fn build_icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        self.push_value(IrType::I1, InstrKind::ICmp { pred, lhs, rhs })
    }

    pub fn build_fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        self.push_value(IrType::I1, InstrKind::FCmp { pred, lhs, rhs })
    }

    /// Returns `None` for calls to void functions.
    pub fn build_call(&mut self, callee: &str, args: Vec<Value>, ret: IrType) -> Option<Value> {
        self.push(
            ret,
            InstrKind::Call {
                callee: callee.to_owned(),
                args,
            },
        )
    }

    pub fn build_phi(&mut self, ty: IrType, incoming: Vec<(Value, BlockId)>) -> Value {
        let current = self.current;
        let id = self.body_mut().new_value(ty.clone());
        let block = self.block_mut(current);
        let at = block.phis().count();
        block.instructions.insert(
            at,
            Instruction {
                result: Some(id),
                ty,
                kind: InstrKind::Phi { incoming },
            },
        );
        Value::Reg(id)
    }

    pub fn add_incoming(&mut self, phi: &Value, value: Value, from: BlockId) {
        let Some(id) = phi.as_reg() else {
            return;
        };
        for block in self.body_mut().blocks.iter_mut() {
            for instr in block.instructions.iter_mut() {
                if instr.result == Some(id) {
                    if let InstrKind::Phi { incoming } = &mut instr.kind {
                        incoming.push((value, from));
                    }
                    return;
                }
            }
        }
    }

    /// Stack slots always live at the top of the entry block.
    pub fn build_alloca(&mut self, allocated: IrType) -> Value {
        let body = self.body_mut();
        let id = body.new_value(IrType::Ptr(allocated.clone().into()));
        let entry = &mut body.blocks[0];
        let at = entry
            .instructions
            .iter()
            .take_while(|instr| matches!(instr.kind, InstrKind::Alloca { .. }))
            .count();
        entry.instructions.insert(
            at,
            Instruction {
                result: Some(id),
                ty: IrType::Ptr(allocated.clone().into()),
                kind: InstrKind::Alloca { allocated },
            },
        );
        Value::Reg(id)
    }

    pub fn build_load(&mut self, ty: IrType, ptr: Value) -> Value {
        self.push_value(ty, InstrKind::Load { ptr })
    }

    pub fn build_store(&mut self, value: Value, ptr: Value) {
        self.push(IrType::Void, InstrKind::Store { value, ptr });
    }

    /// Address of element `index` of the array `base` points to.
    pub fn build_element_ptr(&mut self, elem: IrType, base: Value, index: Value) -> Value {
        self.push_value(IrType::Ptr(elem.into()), InstrKind::ElementPtr { base, index })
    }

    fn terminate(&mut self, term: Terminator) {
        let current = self.current;
        let block = self.block_mut(current);
        if block.terminator.is_none() {
            block.terminator = Some(term);
        }
    }

    pub fn build_br(&mut self, target: BlockId) {
        self.terminate(Terminator::Br(target));
    }

    pub fn build_cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.terminate(Terminator::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn build_ret(&mut self, value: Option<Value>) {
        self.terminate(Terminator::Ret(value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Param;

    fn declaration() -> Function {
        Function::declaration(
            "f",
            vec![Param {
                name: "x".into(),
                ty: IrType::I64,
            }],
            IrType::I64,
        )
    }

    #[test]
    fn instructions_land_in_current_block() {
        let mut builder = Builder::new(&declaration());
        let sum = builder.build_binary(BinaryOp::Add, Value::Param(0), Value::int(1));
        builder.build_ret(Some(sum.clone()));

        let function = builder.finish();
        let body = function.body.unwrap();
        assert_eq!(body.blocks.len(), 1);
        assert_eq!(body.blocks[0].instructions.len(), 1);
        assert_eq!(body.blocks[0].terminator, Some(Terminator::Ret(Some(sum))));
    }

    #[test]
    fn first_terminator_wins() {
        let mut builder = Builder::new(&declaration());
        builder.build_ret(Some(Value::int(1)));
        builder.build_ret(Some(Value::int(2)));
        let body = builder.finish().body.unwrap();
        assert_eq!(
            body.blocks[0].terminator,
            Some(Terminator::Ret(Some(Value::int(1))))
        );
    }

    #[test]
    fn allocas_are_hoisted_to_entry() {
        let mut builder = Builder::new(&declaration());
        let next = builder.append_block("next");
        builder.build_br(next);
        builder.position_at_end(next);
        builder.build_call("g", vec![], IrType::Void);
        builder.build_alloca(IrType::Double);

        let body = builder.finish().body.unwrap();
        assert!(matches!(
            body.blocks[0].instructions[0].kind,
            InstrKind::Alloca { .. }
        ));
        assert_eq!(body.blocks[1].instructions.len(), 1);
    }

    #[test]
    fn phis_stay_at_block_top() {
        let mut builder = Builder::new(&declaration());
        builder.build_binary(BinaryOp::Add, Value::int(1), Value::int(2));
        let entry = builder.current_block();
        let phi = builder.build_phi(IrType::I64, vec![(Value::int(0), entry)]);
        builder.add_incoming(&phi, Value::int(5), entry);

        let body = builder.finish().body.unwrap();
        match &body.blocks[0].instructions[0].kind {
            InstrKind::Phi { incoming } => assert_eq!(incoming.len(), 2),
            other => panic!("expected phi, found {:?}", other),
        }
    }
}
