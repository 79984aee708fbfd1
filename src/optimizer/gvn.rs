use crate::{
    cfg::Cfg,
    ir::{BlockId, Body, InstrKind, Value, ValueId},
    optimizer::instcombine::remove_definition,
};

/// Replaces an instruction with an identical earlier one whose block
/// dominates it. Only side-effect free computations take part; loads and
/// merge nodes are never numbered.
pub fn value_numbering(body: &mut Body) {
    while let Some((duplicate, original)) = find_redundancy(body) {
        body.replace_all_uses(duplicate, &Value::Reg(original));
        remove_definition(body, duplicate);
    }
}

fn numberable(kind: &InstrKind) -> bool {
    matches!(
        kind,
        InstrKind::Binary { .. }
            | InstrKind::ICmp { .. }
            | InstrKind::FCmp { .. }
            | InstrKind::ElementPtr { .. }
    )
}

fn find_redundancy(body: &Body) -> Option<(ValueId, ValueId)> {
    let cfg = Cfg::new(body);
    let doms = cfg.dominators();
    let mut available: Vec<(BlockId, &InstrKind, ValueId)> = vec![];

    for id in cfg.reverse_postorder() {
        let (Some(block), Some(block_doms)) = (body.block(id), doms.get(&id)) else {
            continue;
        };

        for instr in &block.instructions {
            let Some(result) = instr.result else {
                continue;
            };
            if !numberable(&instr.kind) {
                continue;
            }

            let earlier = available
                .iter()
                .find(|(def_block, kind, _)| *kind == &instr.kind && block_doms.contains(def_block));
            if let Some((_, _, original)) = earlier {
                return Some((result, *original));
            }

            available.push((id, &instr.kind, result));
        }
    }

    None
}
