use std::collections::{BTreeSet, HashMap};

use anyhow::{bail, Result};

use crate::{
    cfg::Cfg,
    ir::{BlockId, Function, InstrKind, Instruction, IrType, Module, Terminator, Value, ValueId},
};

pub fn verify_module(module: &Module) -> Result<(), (String, anyhow::Error)> {
    for function in &module.functions {
        verify_function(function, module).map_err(|e| (function.name.clone(), e))?;
    }
    Ok(())
}

/// Checks that a function body is well formed: every block ends in exactly
/// one terminator, merge nodes agree with the predecessor edges, operand
/// types line up and every use is dominated by its definition.
pub fn verify_function(function: &Function, module: &Module) -> Result<()> {
    let Some(body) = &function.body else {
        return Ok(());
    };
    let Some(entry) = body.entry() else {
        bail!("function has no entry block");
    };

    let cfg = Cfg::new(body);
    if !cfg.get_preds(entry).is_empty() {
        bail!("entry block has predecessors");
    }

    let mut definitions: HashMap<ValueId, (BlockId, usize)> = HashMap::new();
    for block in &body.blocks {
        for (idx, instr) in block.instructions.iter().enumerate() {
            if let Some(id) = instr.result {
                if definitions.insert(id, (block.id, idx)).is_some() {
                    bail!("value %{} is defined more than once", id.0);
                }
            }
        }
    }

    for block in &body.blocks {
        let Some(term) = &block.terminator else {
            bail!("block '{}' does not end in a terminator", block.label());
        };
        for succ in term.successors() {
            if body.block(succ).is_none() {
                bail!("block '{}' branches to a missing block", block.label());
            }
        }

        let mut past_phis = false;
        for instr in &block.instructions {
            match &instr.kind {
                InstrKind::Phi { incoming } => {
                    if past_phis {
                        bail!("phi node not grouped at top of block '{}'", block.label());
                    }
                    let sources: BTreeSet<BlockId> = incoming.iter().map(|(_, b)| *b).collect();
                    let preds: BTreeSet<BlockId> = cfg.get_preds(block.id).iter().copied().collect();
                    if sources != preds || sources.len() != incoming.len() {
                        bail!(
                            "phi node in block '{}' does not have one entry per predecessor",
                            block.label()
                        );
                    }
                }
                _ => past_phis = true,
            }
            check_instruction(function, module, instr)?;
        }

        check_terminator(function, term)?;
    }

    let doms = cfg.dominators();
    let dominates = |def: ValueId, at: BlockId, before: Option<usize>| -> Result<()> {
        let Some(&(def_block, def_idx)) = definitions.get(&def) else {
            bail!("use of undefined value %{}", def.0);
        };
        let Some(at_doms) = doms.get(&at) else {
            return Ok(());
        };
        let ok = if def_block == at {
            before.map_or(true, |idx| def_idx < idx)
        } else {
            at_doms.contains(&def_block)
        };
        if !ok {
            bail!("instruction does not dominate all uses: %{}", def.0);
        }
        Ok(())
    };

    for block in &body.blocks {
        for (idx, instr) in block.instructions.iter().enumerate() {
            match &instr.kind {
                InstrKind::Phi { incoming } => {
                    for (value, from) in incoming {
                        if let Value::Reg(id) = value {
                            if doms.contains_key(&block.id) {
                                dominates(*id, *from, None)?;
                            }
                        }
                    }
                }
                kind => {
                    for operand in kind.operands() {
                        if let Value::Reg(id) = operand {
                            dominates(*id, block.id, Some(idx))?;
                        }
                    }
                }
            }
        }
        if let Some(term) = &block.terminator {
            for operand in term.operands() {
                if let Value::Reg(id) = operand {
                    dominates(*id, block.id, None)?;
                }
            }
        }
    }

    Ok(())
}

fn check_operand(function: &Function, module: &Module, value: &Value) -> Result<IrType> {
    match value {
        Value::Param(idx) if *idx >= function.params.len() => {
            bail!("reference to missing parameter {}", idx)
        }
        Value::Global(idx) if *idx >= module.strings.len() => {
            bail!("reference to missing global {}", idx)
        }
        _ => Ok(function.type_of(value)),
    }
}

fn check_instruction(function: &Function, module: &Module, instr: &Instruction) -> Result<()> {
    let types = instr
        .kind
        .operands()
        .into_iter()
        .map(|v| check_operand(function, module, v))
        .collect::<Result<Vec<_>>>()?;

    match &instr.kind {
        InstrKind::Binary { op, .. } => {
            let expected = if op.is_float() {
                IrType::Double
            } else {
                IrType::I64
            };
            if types.iter().any(|t| *t != expected) || instr.ty != expected {
                bail!("binary operator {:?} applied to {} and {}", op, types[0], types[1]);
            }
        }
        InstrKind::ICmp { .. } => {
            let comparable = types[0].is_integer() || types[0].pointee().is_some();
            if types[0] != types[1] || !comparable {
                bail!("integer comparison of {} and {}", types[0], types[1]);
            }
        }
        InstrKind::FCmp { .. } => {
            if types.iter().any(|t| *t != IrType::Double) {
                bail!("float comparison of {} and {}", types[0], types[1]);
            }
        }
        InstrKind::Call { callee, .. } => {
            let Some((params, ret)) = module.callee_signature(callee) else {
                bail!("call to undeclared function '{}'", callee);
            };
            if params != types {
                bail!("call to '{}' does not match its signature", callee);
            }
            if ret != instr.ty {
                bail!("call to '{}' has the wrong result type", callee);
            }
        }
        InstrKind::Phi { .. } => {
            if types.iter().any(|t| *t != instr.ty) {
                bail!("phi node of type {} has an incoming value of another type", instr.ty);
            }
        }
        InstrKind::Alloca { allocated } => {
            if instr.ty != IrType::Ptr(allocated.clone().into()) {
                bail!("stack slot has the wrong pointer type");
            }
        }
        InstrKind::Load { .. } => {
            if types[0].pointee() != Some(&instr.ty) {
                bail!("load of {} through {}", instr.ty, types[0]);
            }
        }
        InstrKind::Store { .. } => {
            if types[1].pointee() != Some(&types[0]) {
                bail!("store of {} through {}", types[0], types[1]);
            }
        }
        InstrKind::ElementPtr { .. } => {
            let elem = match types[0].pointee() {
                Some(IrType::Array(elem, _)) => elem.as_ref(),
                _ => bail!("element address of non-array {}", types[0]),
            };
            if types[1] != IrType::I64 || instr.ty.pointee() != Some(elem) {
                bail!("element address has the wrong type");
            }
        }
    }

    Ok(())
}

fn check_terminator(function: &Function, term: &Terminator) -> Result<()> {
    match term {
        Terminator::CondBr { cond, .. } => {
            if function.type_of(cond) != IrType::I1 {
                bail!("branch condition is not i1");
            }
        }
        Terminator::Ret(None) => {
            if function.ret != IrType::Void {
                bail!("missing return value in function returning {}", function.ret);
            }
        }
        Terminator::Ret(Some(value)) => {
            let ty = function.type_of(value);
            if function.ret == IrType::Void || ty != function.ret {
                bail!("return of {} in function returning {}", ty, function.ret);
            }
        }
        Terminator::Br(_) => {}
    }
    Ok(())
}
