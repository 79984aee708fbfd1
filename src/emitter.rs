pub mod util;

use std::io::Write;

use anyhow::Result;

use crate::{
    emitter::util::{escape, float_literal, quote},
    ir::{
        BasicBlock, BinaryOp, Constant, FloatPredicate, Function, InstrKind, Instruction,
        IntPredicate, IrType, Module, Terminator, Value,
    },
};

pub trait Emit {
    fn emit(&self, f: &mut dyn Write) -> Result<()>;
}

pub fn to_text(module: &Module) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = module.emit(&mut out);
    String::from_utf8_lossy(&out).into_owned()
}

impl Emit for Module {
    fn emit(&self, f: &mut dyn Write) -> Result<()> {
        writeln!(f, "; ModuleID = '{}'", self.name)?;

        if !self.strings.is_empty() {
            writeln!(f)?;
        }
        for (idx, s) in self.strings.iter().enumerate() {
            writeln!(
                f,
                "@.str.{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"",
                idx,
                s.len() + 1,
                escape(s)
            )?;
        }

        for routine in &self.runtime {
            if self.get_function(routine.name()).is_some() {
                continue;
            }
            let params: Vec<String> = routine.params().iter().map(|t| t.to_string()).collect();
            writeln!(f)?;
            writeln!(
                f,
                "declare {} @{}({})",
                routine.ret(),
                routine.name(),
                params.join(", ")
            )?;
        }

        for function in &self.functions {
            writeln!(f)?;
            function.emit(f)?;
        }

        Ok(())
    }
}

impl Emit for Function {
    fn emit(&self, f: &mut dyn Write) -> Result<()> {
        let Some(body) = &self.body else {
            let params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
            writeln!(f, "declare {} @{}({})", self.ret, quote(&self.name), params.join(", "))?;
            return Ok(());
        };

        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} %{}", p.ty, quote(&p.name)))
            .collect();
        writeln!(f, "define {} @{}({}) {{", self.ret, quote(&self.name), params.join(", "))?;

        for (idx, block) in body.blocks.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            emit_block(self, block, f)?;
        }

        writeln!(f, "}}")?;
        Ok(())
    }
}

fn emit_block(function: &Function, block: &BasicBlock, f: &mut dyn Write) -> Result<()> {
    writeln!(f, "{}:", quote(&block.label()))?;
    for instr in &block.instructions {
        write!(f, "  ")?;
        emit_instruction(function, instr, f)?;
        writeln!(f)?;
    }
    if let Some(term) = &block.terminator {
        write!(f, "  ")?;
        emit_terminator(function, term, f)?;
        writeln!(f)?;
    }
    Ok(())
}

fn label_of(function: &Function, id: crate::ir::BlockId) -> String {
    let label = function
        .body
        .as_ref()
        .and_then(|body| body.block(id))
        .map(BasicBlock::label)
        .unwrap_or_else(|| format!("missing.{}", id.0));
    format!("%{}", quote(&label))
}

fn value(function: &Function, v: &Value) -> String {
    match v {
        Value::Const(Constant::Int(n)) => n.to_string(),
        Value::Const(Constant::Float(n)) => float_literal(*n),
        Value::Const(Constant::Bool(b)) => b.to_string(),
        Value::Const(Constant::Undef(_)) => "undef".to_owned(),
        Value::Reg(id) => format!("%{}", id.0),
        Value::Param(idx) => match function.params.get(*idx) {
            Some(p) => format!("%{}", quote(&p.name)),
            None => format!("%arg{}", idx),
        },
        Value::Global(idx) => format!("@.str.{}", idx),
    }
}

fn typed(function: &Function, v: &Value) -> String {
    format!("{} {}", function.type_of(v), value(function, v))
}

fn emit_instruction(function: &Function, instr: &Instruction, f: &mut dyn Write) -> Result<()> {
    if let Some(id) = instr.result {
        write!(f, "%{} = ", id.0)?;
    }

    match &instr.kind {
        InstrKind::Binary { op, lhs, rhs } => {
            let op = match op {
                BinaryOp::Add => "add",
                BinaryOp::Sub => "sub",
                BinaryOp::Mul => "mul",
                BinaryOp::SDiv => "sdiv",
                BinaryOp::FAdd => "fadd",
                BinaryOp::FSub => "fsub",
                BinaryOp::FMul => "fmul",
                BinaryOp::FDiv => "fdiv",
            };
            write!(f, "{} {}, {}", op, typed(function, lhs), value(function, rhs))?;
        }
        InstrKind::ICmp { pred, lhs, rhs } => {
            let pred = match pred {
                IntPredicate::Eq => "eq",
                IntPredicate::Ne => "ne",
                IntPredicate::Slt => "slt",
                IntPredicate::Sgt => "sgt",
            };
            write!(f, "icmp {} {}, {}", pred, typed(function, lhs), value(function, rhs))?;
        }
        InstrKind::FCmp { pred, lhs, rhs } => {
            let pred = match pred {
                FloatPredicate::Oeq => "oeq",
                FloatPredicate::One => "one",
                FloatPredicate::Olt => "olt",
                FloatPredicate::Ogt => "ogt",
            };
            write!(f, "fcmp {} {}, {}", pred, typed(function, lhs), value(function, rhs))?;
        }
        InstrKind::Call { callee, args } => {
            let args: Vec<String> = args.iter().map(|a| typed(function, a)).collect();
            write!(f, "call {} @{}({})", instr.ty, quote(callee), args.join(", "))?;
        }
        InstrKind::Phi { incoming } => {
            let edges: Vec<String> = incoming
                .iter()
                .map(|(v, from)| format!("[ {}, {} ]", value(function, v), label_of(function, *from)))
                .collect();
            write!(f, "phi {} {}", instr.ty, edges.join(", "))?;
        }
        InstrKind::Alloca { allocated } => {
            write!(f, "alloca {}", allocated)?;
        }
        InstrKind::Load { ptr } => {
            write!(f, "load {}, {}", instr.ty, typed(function, ptr))?;
        }
        InstrKind::Store { value: v, ptr } => {
            write!(f, "store {}, {}", typed(function, v), typed(function, ptr))?;
        }
        InstrKind::ElementPtr { base, index } => {
            let array = function
                .type_of(base)
                .pointee()
                .cloned()
                .unwrap_or(IrType::Void);
            write!(
                f,
                "getelementptr {}, {}, i64 0, {}",
                array,
                typed(function, base),
                typed(function, index)
            )?;
        }
    }

    Ok(())
}

fn emit_terminator(function: &Function, term: &Terminator, f: &mut dyn Write) -> Result<()> {
    match term {
        Terminator::Br(target) => write!(f, "br label {}", label_of(function, *target))?,
        Terminator::CondBr {
            cond,
            then_block,
            else_block,
        } => write!(
            f,
            "br {}, label {}, label {}",
            typed(function, cond),
            label_of(function, *then_block),
            label_of(function, *else_block)
        )?,
        Terminator::Ret(None) => write!(f, "ret void")?,
        Terminator::Ret(Some(v)) => write!(f, "ret {}", typed(function, v))?,
    }
    Ok(())
}
