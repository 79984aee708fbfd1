use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Write,
};

use crate::ir::{BlockId, Body, Function};

/// Predecessor and successor edges of a function body, recomputed from the
/// block terminators whenever a pass needs them.
#[derive(Clone, Debug)]
pub struct Cfg {
    pub entry: BlockId,
    pub order: Vec<BlockId>,
    pub succs: HashMap<BlockId, Vec<BlockId>>,
    pub preds: HashMap<BlockId, Vec<BlockId>>,
}

impl Cfg {
    pub fn new(body: &Body) -> Cfg {
        let mut succs: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let mut preds: HashMap<BlockId, Vec<BlockId>> = HashMap::new();
        let order: Vec<BlockId> = body.blocks.iter().map(|block| block.id).collect();

        for block in &body.blocks {
            preds.entry(block.id).or_default();
            let targets = succs.entry(block.id).or_default();
            for succ in block.successors() {
                if !targets.contains(&succ) {
                    targets.push(succ);
                    preds.entry(succ).or_default().push(block.id);
                }
            }
        }

        Cfg {
            entry: order.first().copied().unwrap_or(BlockId(0)),
            order,
            succs,
            preds,
        }
    }

    pub fn get_succs(&self, id: BlockId) -> &[BlockId] {
        self.succs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_preds(&self, id: BlockId) -> &[BlockId] {
        self.preds.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reachable(&self) -> HashSet<BlockId> {
        let mut reachable = HashSet::new();
        let mut stack = vec![self.entry];

        while let Some(id) = stack.pop() {
            if reachable.insert(id) {
                stack.extend(self.get_succs(id).iter().copied());
            }
        }

        reachable
    }

    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        fn dfs(cfg: &Cfg, explored: &mut HashSet<BlockId>, order: &mut Vec<BlockId>, id: BlockId) {
            if !explored.insert(id) {
                return;
            }
            for succ in cfg.get_succs(id) {
                dfs(cfg, explored, order, *succ);
            }
            order.push(id);
        }

        let mut explored = HashSet::new();
        let mut order = vec![];
        dfs(self, &mut explored, &mut order, self.entry);
        order.reverse();
        order
    }

    /// Dominator sets of every reachable block.
    pub fn dominators(&self) -> HashMap<BlockId, BTreeSet<BlockId>> {
        let reachable = self.reachable();
        let blocks: Vec<BlockId> = self
            .order
            .iter()
            .copied()
            .filter(|id| reachable.contains(id))
            .collect();
        let all: BTreeSet<BlockId> = blocks.iter().copied().collect();

        let mut doms: HashMap<BlockId, BTreeSet<BlockId>> = blocks
            .iter()
            .map(|&id| {
                if id == self.entry {
                    (id, BTreeSet::from([id]))
                } else {
                    (id, all.clone())
                }
            })
            .collect();

        let mut changed = true;
        while changed {
            changed = false;
            for &id in &blocks {
                if id == self.entry {
                    continue;
                }

                let mut new: Option<BTreeSet<BlockId>> = None;
                for pred in self.get_preds(id) {
                    let Some(pred_doms) = doms.get(pred) else {
                        continue;
                    };
                    new = Some(match new {
                        None => pred_doms.clone(),
                        Some(acc) => acc.intersection(pred_doms).copied().collect(),
                    });
                }

                let mut new = new.unwrap_or_default();
                new.insert(id);
                if doms.get(&id) != Some(&new) {
                    doms.insert(id, new);
                    changed = true;
                }
            }
        }

        doms
    }

    pub fn to_graphviz(&self, function: &Function) -> String {
        let mut out = String::new();
        let Some(body) = &function.body else {
            return out;
        };

        let _ = writeln!(out, "digraph \"{}\" {{", function.name);
        let _ = writeln!(out, "  node[shape=\"box\"];");
        for block in &body.blocks {
            let _ = writeln!(
                out,
                "  \"{}\"[label=\"{} ({} instructions)\"];",
                block.label(),
                block.label(),
                block.instructions.len()
            );
        }
        for block in &body.blocks {
            for succ in self.get_succs(block.id) {
                if let Some(target) = body.block(*succ) {
                    let _ = writeln!(out, "  \"{}\" -> \"{}\";", block.label(), target.label());
                }
            }
        }
        let _ = writeln!(out, "}}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Terminator, Value};

    // entry -> (a | b) -> join, plus an orphan block
    fn diamond() -> Body {
        let mut body = Body::default();
        let entry = body.add_block("entry");
        let a = body.add_block("a");
        let b = body.add_block("b");
        let join = body.add_block("join");
        let orphan = body.add_block("orphan");

        body.block_mut(entry).unwrap().terminator = Some(Terminator::CondBr {
            cond: Value::bool(true),
            then_block: a,
            else_block: b,
        });
        body.block_mut(a).unwrap().terminator = Some(Terminator::Br(join));
        body.block_mut(b).unwrap().terminator = Some(Terminator::Br(join));
        body.block_mut(join).unwrap().terminator = Some(Terminator::Ret(None));
        body.block_mut(orphan).unwrap().terminator = Some(Terminator::Br(join));
        body
    }

    #[test]
    fn edges_follow_terminators() {
        let cfg = Cfg::new(&diamond());
        assert_eq!(cfg.get_succs(BlockId(0)), &[BlockId(1), BlockId(2)]);
        assert_eq!(cfg.get_preds(BlockId(3)).len(), 3);
    }

    #[test]
    fn orphans_are_unreachable() {
        let cfg = Cfg::new(&diamond());
        let reachable = cfg.reachable();
        assert_eq!(reachable.len(), 4);
        assert!(!reachable.contains(&BlockId(4)));
    }

    #[test]
    fn reverse_postorder_starts_at_entry_and_ends_at_join() {
        let order = Cfg::new(&diamond()).reverse_postorder();
        assert_eq!(order.len(), 4);
        assert_eq!(order[0], BlockId(0));
        assert_eq!(order[3], BlockId(3));
    }

    #[test]
    fn join_is_dominated_only_by_entry() {
        let doms = Cfg::new(&diamond()).dominators();
        assert_eq!(doms[&BlockId(3)], BTreeSet::from([BlockId(0), BlockId(3)]));
        assert_eq!(doms[&BlockId(1)], BTreeSet::from([BlockId(0), BlockId(1)]));
        assert!(!doms.contains_key(&BlockId(4)));
    }
}
