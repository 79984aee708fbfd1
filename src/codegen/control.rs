use crate::{
    codegen::{scope::TypedValue, types::Type, Codegen, Flow},
    error::{Error, Result},
    ir::{BinaryOp, IntPredicate, IrType, Value},
    parser::ast::{Block, IfStatement, LoopKind, LoopStatement},
};

impl Codegen {
    /// Lowers a branch body into `block`, jumping to `exit` if control
    /// falls off its end. Returns whether it did.
    fn lower_branch(&mut self, block: &Block, exit: crate::ir::BlockId) -> Result<bool> {
        match self.lower_block(block)? {
            Flow::Continues => {
                self.builder().build_br(exit);
                Ok(true)
            }
            Flow::Terminated => Ok(false),
        }
    }

    pub(crate) fn lower_if(&mut self, stmt: &IfStatement) -> Result<Flow> {
        let cond = self.lower_condition(&stmt.condition)?;

        let builder = self.builder();
        let then_block = builder.append_block("if.then");
        let else_block = builder.append_block("if.else");
        let exit_block = builder.append_block("if.end");
        let mut test_block = match stmt.else_ifs.is_empty() {
            true => else_block,
            false => builder.append_block("if.elif"),
        };
        builder.build_cond_br(cond, then_block, test_block);

        builder.position_at_end(then_block);
        let mut reaches_exit = self.lower_branch(&stmt.then_block, exit_block)?;

        for (idx, clause) in stmt.else_ifs.iter().enumerate() {
            self.builder().move_to_end(test_block);
            self.builder().position_at_end(test_block);
            let cond = self.lower_condition(&clause.condition)?;

            let builder = self.builder();
            let body_block = builder.append_block("if.elif.then");
            let next_test = match idx + 1 == stmt.else_ifs.len() {
                true => else_block,
                false => builder.append_block("if.elif"),
            };
            builder.build_cond_br(cond, body_block, next_test);

            builder.position_at_end(body_block);
            reaches_exit |= self.lower_branch(&clause.block, exit_block)?;
            test_block = next_test;
        }

        self.builder().move_to_end(else_block);
        self.builder().position_at_end(else_block);
        reaches_exit |= match &stmt.else_block {
            Some(block) => self.lower_branch(block, exit_block)?,
            None => {
                self.builder().build_br(exit_block);
                true
            }
        };

        let builder = self.builder();
        if reaches_exit {
            builder.move_to_end(exit_block);
            builder.position_at_end(exit_block);
            Ok(Flow::Continues)
        } else {
            builder.remove_block(exit_block);
            Ok(Flow::Terminated)
        }
    }

    pub(crate) fn lower_loop(&mut self, stmt: &LoopStatement) -> Result<Flow> {
        match &stmt.kind {
            LoopKind::While => self.lower_while(stmt),
            LoopKind::ForIn { index, element } => self.lower_for_in(stmt, index.as_deref(), element),
        }
    }

    /// `for cond { }`: the header carries an iteration counter and re-tests
    /// the condition on every pass.
    fn lower_while(&mut self, stmt: &LoopStatement) -> Result<Flow> {
        let builder = self.builder();
        let preheader = builder.current_block();
        let header = builder.append_block("loop.header");
        let body = builder.append_block("loop.body");
        let exit = builder.append_block("loop.end");
        builder.build_br(header);

        builder.position_at_end(header);
        let counter = builder.build_phi(IrType::I64, vec![(Value::int(0), preheader)]);
        let cond = self.lower_condition(&stmt.condition)?;
        self.builder().build_cond_br(cond, body, exit);

        self.builder().position_at_end(body);
        if self.lower_block(&stmt.body)? == Flow::Continues {
            let builder = self.builder();
            let latch = builder.current_block();
            let next = builder.build_binary(BinaryOp::Add, counter.clone(), Value::int(1));
            builder.add_incoming(&counter, next, latch);
            builder.build_br(header);
        }

        let builder = self.builder();
        builder.move_to_end(exit);
        builder.position_at_end(exit);
        Ok(Flow::Continues)
    }

    /// `for [i,] x in seq { }`: the element lives in a stack slot filled
    /// with element 0 before entry and refreshed by the step block; `i` is
    /// the header's merge node.
    fn lower_for_in(
        &mut self,
        stmt: &LoopStatement,
        index: Option<&str>,
        element: &str,
    ) -> Result<Flow> {
        let sequence = self.lower_expression(&stmt.condition)?;
        let Type::Sequence(elem_type, len) = sequence._type.clone() else {
            return Err(Error::type_mismatch(format!(
                "for-in expects a sequence, found {}",
                sequence._type
            )));
        };
        if len == 0 {
            return Ok(Flow::Continues);
        }

        let elem_ir = elem_type.to_ir();
        let builder = self.builder();
        let slot = builder.build_alloca(elem_ir.clone());
        let first = builder.build_element_ptr(elem_ir.clone(), sequence.value.clone(), Value::int(0));
        let first = builder.build_load(elem_ir.clone(), first);
        builder.build_store(first, slot.clone());

        let preheader = builder.current_block();
        let header = builder.append_block("for.header");
        let step = builder.append_block("for.step");
        let exit = builder.append_block("for.end");
        builder.build_br(header);

        builder.position_at_end(header);
        let counter = builder.build_phi(IrType::I64, vec![(Value::int(0), preheader)]);
        let current = builder.build_load(elem_ir.clone(), slot.clone());

        self.scope.push();
        if let Some(index) = index {
            self.scope
                .bind(index, TypedValue::new(counter.clone(), Type::Integer));
        }
        self.scope
            .bind(element, TypedValue::new(current, *elem_type));
        let flow = self.lower_block(&stmt.body);
        self.scope.pop();

        let builder = self.builder();
        if flow? == Flow::Terminated {
            builder.remove_block(step);
            builder.remove_block(exit);
            return Ok(Flow::Terminated);
        }

        let next = builder.build_binary(BinaryOp::Add, counter.clone(), Value::int(1));
        let more = builder.build_icmp(IntPredicate::Slt, next.clone(), Value::int(len as i64));
        builder.build_cond_br(more, step, exit);

        builder.move_to_end(step);
        builder.position_at_end(step);
        let ptr = builder.build_element_ptr(elem_ir.clone(), sequence.value, next.clone());
        let value = builder.build_load(elem_ir, ptr);
        builder.build_store(value, slot);
        builder.add_incoming(&counter, next, step);
        builder.build_br(header);

        builder.move_to_end(exit);
        builder.position_at_end(exit);
        Ok(Flow::Continues)
    }
}
