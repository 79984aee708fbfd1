use crate::{
    cfg::Cfg,
    ir::{BlockId, Body, Constant, InstrKind, Terminator, Value},
    optimizer::instcombine::remove_definition,
};

pub fn simplify_cfg(body: &mut Body) {
    loop {
        let changed = fold_constant_branches(body)
            | eliminate_unreachable_blocks(body)
            | remove_trivial_phis(body)
            | merge_straight_line_blocks(body);
        if !changed {
            break;
        }
    }
}

fn drop_incoming(body: &mut Body, block: BlockId, from: BlockId) {
    if let Some(block) = body.block_mut(block) {
        for instr in block.instructions.iter_mut() {
            if let InstrKind::Phi { incoming } = &mut instr.kind {
                incoming.retain(|(_, source)| *source != from);
            }
        }
    }
}

fn rename_incoming(body: &mut Body, block: BlockId, from: BlockId, to: BlockId) {
    if let Some(block) = body.block_mut(block) {
        for instr in block.instructions.iter_mut() {
            if let InstrKind::Phi { incoming } = &mut instr.kind {
                for (_, source) in incoming.iter_mut() {
                    if *source == from {
                        *source = to;
                    }
                }
            }
        }
    }
}

/// `br i1 true, %a, %b` becomes `br %a`.
pub fn fold_constant_branches(body: &mut Body) -> bool {
    let mut folded = vec![];

    for block in body.blocks.iter_mut() {
        let Some(Terminator::CondBr {
            cond: Value::Const(Constant::Bool(taken)),
            then_block,
            else_block,
        }) = block.terminator
        else {
            continue;
        };

        let (target, dropped) = if taken {
            (then_block, else_block)
        } else {
            (else_block, then_block)
        };
        block.terminator = Some(Terminator::Br(target));
        if target != dropped {
            folded.push((block.id, dropped));
        }
    }

    for (from, dropped) in &folded {
        drop_incoming(body, *dropped, *from);
    }

    !folded.is_empty()
}

pub fn eliminate_unreachable_blocks(body: &mut Body) -> bool {
    let cfg = Cfg::new(body);
    let reachable = cfg.reachable();
    let dead: Vec<BlockId> = cfg
        .order
        .iter()
        .copied()
        .filter(|id| !reachable.contains(id))
        .collect();

    for id in &dead {
        for succ in cfg.get_succs(*id) {
            drop_incoming(body, *succ, *id);
        }
    }
    for id in &dead {
        body.remove_block(*id);
    }

    !dead.is_empty()
}

/// A merge node with a single incoming edge is just that value.
pub fn remove_trivial_phis(body: &mut Body) -> bool {
    let mut changed = false;

    loop {
        let trivial = body.blocks.iter().find_map(|block| {
            block.phis().find_map(|instr| match &instr.kind {
                InstrKind::Phi { incoming } if incoming.len() == 1 => {
                    Some((instr.result?, incoming[0].0.clone()))
                }
                _ => None,
            })
        });

        let Some((id, value)) = trivial else {
            return changed;
        };
        body.replace_all_uses(id, &value);
        remove_definition(body, id);
        changed = true;
    }
}

/// Folds a block into its only predecessor when that predecessor has no
/// other successor.
pub fn merge_straight_line_blocks(body: &mut Body) -> bool {
    let cfg = Cfg::new(body);

    let candidate = body.blocks.iter().find_map(|block| {
        let Some(Terminator::Br(succ)) = block.terminator else {
            return None;
        };
        let single_pred = cfg.get_preds(succ) == [block.id];
        let mergeable = succ != block.id
            && Some(succ) != body.entry()
            && single_pred
            && body
                .block(succ)
                .is_some_and(|s| s.phis().next().is_none());
        mergeable.then_some((block.id, succ))
    });

    let Some((pred, succ)) = candidate else {
        return false;
    };
    let Some(removed) = body.remove_block(succ) else {
        return false;
    };

    for next in removed.successors() {
        rename_incoming(body, next, succ, pred);
    }
    if let Some(block) = body.block_mut(pred) {
        block.instructions.extend(removed.instructions);
        block.terminator = removed.terminator;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{builder::Builder, Function, IrType};

    fn builder() -> Builder {
        Builder::new(&Function::declaration("f", vec![], IrType::I64))
    }

    #[test]
    fn constant_branch_collapses_diamond() {
        let mut b = builder();
        let then = b.append_block("then");
        let other = b.append_block("else");
        let join = b.append_block("join");
        b.build_cond_br(Value::bool(true), then, other);

        b.position_at_end(then);
        b.build_br(join);
        b.position_at_end(other);
        b.build_br(join);

        b.position_at_end(join);
        let phi = b.build_phi(IrType::I64, vec![(Value::int(1), then), (Value::int(2), other)]);
        b.build_ret(Some(phi));

        let mut body = b.finish().body.unwrap();
        simplify_cfg(&mut body);

        assert_eq!(body.blocks.len(), 1);
        assert_eq!(
            body.blocks[0].terminator,
            Some(Terminator::Ret(Some(Value::int(1))))
        );
    }

    #[test]
    fn unreachable_blocks_are_removed() {
        let mut b = builder();
        b.build_ret(Some(Value::int(0)));
        let orphan = b.append_block("orphan");
        b.position_at_end(orphan);
        b.build_ret(Some(Value::int(1)));

        let mut body = b.finish().body.unwrap();
        assert!(eliminate_unreachable_blocks(&mut body));
        assert_eq!(body.blocks.len(), 1);
    }

    #[test]
    fn loops_are_left_alone() {
        let mut b = builder();
        let entry = b.current_block();
        let header = b.append_block("header");
        let exit = b.append_block("exit");
        b.build_br(header);

        b.position_at_end(header);
        let phi = b.build_phi(IrType::I64, vec![(Value::int(0), entry)]);
        let next = b.build_binary(crate::ir::BinaryOp::Add, phi.clone(), Value::int(1));
        b.add_incoming(&phi, next.clone(), header);
        let more = b.build_icmp(crate::ir::IntPredicate::Slt, next, Value::int(3));
        b.build_cond_br(more, header, exit);

        b.position_at_end(exit);
        b.build_ret(Some(phi));

        let mut body = b.finish().body.unwrap();
        simplify_cfg(&mut body);
        assert_eq!(body.blocks.len(), 3);
    }
}
