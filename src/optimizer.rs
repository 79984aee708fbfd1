pub mod gvn;
pub mod instcombine;
pub mod simplify_cfg;

use crate::ir::Function;

use self::{gvn::value_numbering, instcombine::instruction_combining, simplify_cfg::simplify_cfg};

const MAX_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Optimization {
    InstCombine,
    Gvn,
    SimplifyCfg,
}

pub const STANDARD_PIPELINE: &[Optimization] = &[
    Optimization::InstCombine,
    Optimization::Gvn,
    Optimization::SimplifyCfg,
];

pub trait Optimize {
    fn optimize(&mut self, enabled_optimizations: &[Optimization]);
}

impl Optimize for Function {
    /// Runs the enabled passes in order until the body stops changing.
    fn optimize(&mut self, enabled_optimizations: &[Optimization]) {
        let Some(body) = self.body.as_mut() else {
            return;
        };

        for _ in 0..MAX_ROUNDS {
            let before = body.clone();

            for optimization in enabled_optimizations {
                match optimization {
                    Optimization::InstCombine => instruction_combining(body),
                    Optimization::Gvn => value_numbering(body),
                    Optimization::SimplifyCfg => simplify_cfg(body),
                }
            }

            if *body == before {
                break;
            }
        }
    }
}
