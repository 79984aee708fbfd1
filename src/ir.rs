pub mod builder;
pub mod verify;

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    hash::{Hash, Hasher},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    I1,
    I8,
    I64,
    Double,
    Ptr(Box<IrType>),
    Array(Box<IrType>, usize),
}

impl IrType {
    pub fn string() -> IrType {
        IrType::Ptr(IrType::I8.into())
    }

    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Ptr(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, IrType::I1 | IrType::I8 | IrType::I64)
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::I1 => write!(f, "i1"),
            IrType::I8 => write!(f, "i8"),
            IrType::I64 => write!(f, "i64"),
            IrType::Double => write!(f, "double"),
            IrType::Ptr(inner) => write!(f, "{}*", inner),
            IrType::Array(elem, len) => write!(f, "[{} x {}]", len, elem),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub usize);

#[derive(Debug, Clone)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Bool(bool),
    Undef(IrType),
}

impl Constant {
    pub fn ty(&self) -> IrType {
        match self {
            Constant::Int(_) => IrType::I64,
            Constant::Float(_) => IrType::Double,
            Constant::Bool(_) => IrType::I1,
            Constant::Undef(t) => t.clone(),
        }
    }
}

// Floats compare by bit pattern so constants can key value-numbering tables.
impl PartialEq for Constant {
    fn eq(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::Undef(a), Constant::Undef(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Constant::Int(n) => n.hash(state),
            Constant::Float(n) => n.to_bits().hash(state),
            Constant::Bool(b) => b.hash(state),
            Constant::Undef(t) => t.hash(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Const(Constant),
    Reg(ValueId),
    Param(usize),
    Global(usize),
}

impl Value {
    pub fn int(n: i64) -> Value {
        Value::Const(Constant::Int(n))
    }

    pub fn float(n: f64) -> Value {
        Value::Const(Constant::Float(n))
    }

    pub fn bool(b: bool) -> Value {
        Value::Const(Constant::Bool(b))
    }

    pub fn as_reg(&self) -> Option<ValueId> {
        match self {
            Value::Reg(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_global(&self) -> Option<usize> {
        match self {
            Value::Global(idx) => Some(*idx),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<&Constant> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
}

impl BinaryOp {
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            BinaryOp::FAdd | BinaryOp::FSub | BinaryOp::FMul | BinaryOp::FDiv
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sgt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ogt,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstrKind {
    Binary {
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    Call {
        callee: String,
        args: Vec<Value>,
    },
    Phi {
        incoming: Vec<(Value, BlockId)>,
    },
    Alloca {
        allocated: IrType,
    },
    Load {
        ptr: Value,
    },
    Store {
        value: Value,
        ptr: Value,
    },
    ElementPtr {
        base: Value,
        index: Value,
    },
}

impl InstrKind {
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            InstrKind::Binary { lhs, rhs, .. }
            | InstrKind::ICmp { lhs, rhs, .. }
            | InstrKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstrKind::Call { args, .. } => args.iter().collect(),
            InstrKind::Phi { incoming } => incoming.iter().map(|(v, _)| v).collect(),
            InstrKind::Alloca { .. } => vec![],
            InstrKind::Load { ptr } => vec![ptr],
            InstrKind::Store { value, ptr } => vec![value, ptr],
            InstrKind::ElementPtr { base, index } => vec![base, index],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            InstrKind::Binary { lhs, rhs, .. }
            | InstrKind::ICmp { lhs, rhs, .. }
            | InstrKind::FCmp { lhs, rhs, .. } => vec![lhs, rhs],
            InstrKind::Call { args, .. } => args.iter_mut().collect(),
            InstrKind::Phi { incoming } => incoming.iter_mut().map(|(v, _)| v).collect(),
            InstrKind::Alloca { .. } => vec![],
            InstrKind::Load { ptr } => vec![ptr],
            InstrKind::Store { value, ptr } => vec![value, ptr],
            InstrKind::ElementPtr { base, index } => vec![base, index],
        }
    }

    /// Instructions without side effects, safe to drop when unused.
    pub fn is_pure(&self) -> bool {
        !matches!(
            self,
            InstrKind::Call { .. } | InstrKind::Store { .. } | InstrKind::Alloca { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<ValueId>,
    pub ty: IrType,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br(BlockId),
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret(Option<Value>),
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Br(target) => vec![*target],
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Ret(_) => vec![],
        }
    }

    pub fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Terminator::CondBr { cond, .. } => vec![cond],
            Terminator::Ret(Some(value)) => vec![value],
            _ => vec![],
        }
    }

    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Terminator::CondBr { cond, .. } => vec![cond],
            Terminator::Ret(Some(value)) => vec![value],
            _ => vec![],
        }
    }

    pub fn retarget(&mut self, from: BlockId, to: BlockId) {
        match self {
            Terminator::Br(target) if *target == from => *target = to,
            Terminator::CondBr {
                then_block,
                else_block,
                ..
            } => {
                if *then_block == from {
                    *then_block = to;
                }
                if *else_block == from {
                    *else_block = to;
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub instructions: Vec<Instruction>,
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn label(&self) -> String {
        match self.id.0 {
            0 => self.name.clone(),
            n => format!("{}.{}", self.name, n),
        }
    }

    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator
            .as_ref()
            .map(Terminator::successors)
            .unwrap_or_default()
    }

    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions
            .iter()
            .take_while(|instr| matches!(instr.kind, InstrKind::Phi { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Body {
    pub blocks: Vec<BasicBlock>,
    pub value_types: Vec<IrType>,
    next_block: usize,
}

impl Body {
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().map(|block| block.id)
    }

    pub fn add_block(&mut self, name: &str) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.push(BasicBlock {
            id,
            name: name.to_owned(),
            instructions: vec![],
            terminator: None,
        });
        id
    }

    pub fn remove_block(&mut self, id: BlockId) -> Option<BasicBlock> {
        let idx = self.blocks.iter().position(|block| block.id == id)?;
        Some(self.blocks.remove(idx))
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|block| block.id == id)
    }

    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.iter_mut().find(|block| block.id == id)
    }

    pub fn new_value(&mut self, ty: IrType) -> ValueId {
        self.value_types.push(ty);
        ValueId(self.value_types.len() - 1)
    }

    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|block| block.instructions.len()).sum()
    }

    /// Block and index of the instruction defining `value`.
    pub fn definition(&self, value: ValueId) -> Option<(BlockId, usize)> {
        self.blocks.iter().find_map(|block| {
            block
                .instructions
                .iter()
                .position(|instr| instr.result == Some(value))
                .map(|idx| (block.id, idx))
        })
    }

    pub fn instruction(&self, value: ValueId) -> Option<&Instruction> {
        let (block, idx) = self.definition(value)?;
        self.block(block)?.instructions.get(idx)
    }

    pub fn replace_all_uses(&mut self, from: ValueId, to: &Value) {
        for block in self.blocks.iter_mut() {
            for instr in block.instructions.iter_mut() {
                for operand in instr.kind.operands_mut() {
                    if *operand == Value::Reg(from) {
                        *operand = to.clone();
                    }
                }
            }
            if let Some(term) = block.terminator.as_mut() {
                for operand in term.operands_mut() {
                    if *operand == Value::Reg(from) {
                        *operand = to.clone();
                    }
                }
            }
        }
    }

    pub fn use_counts(&self) -> HashMap<ValueId, usize> {
        let mut counts = HashMap::new();
        for block in &self.blocks {
            let operands = block
                .instructions
                .iter()
                .flat_map(|instr| instr.kind.operands())
                .chain(block.terminator.iter().flat_map(Terminator::operands));
            for operand in operands {
                if let Value::Reg(id) = operand {
                    *counts.entry(*id).or_insert(0) += 1;
                }
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: IrType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: IrType,
    pub body: Option<Body>,
}

impl Function {
    pub fn declaration(name: &str, params: Vec<Param>, ret: IrType) -> Function {
        Function {
            name: name.to_owned(),
            params,
            ret,
            body: None,
        }
    }

    pub fn param_types(&self) -> Vec<IrType> {
        self.params.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn same_signature(&self, other: &Function) -> bool {
        self.ret == other.ret && self.param_types() == other.param_types()
    }

    pub fn type_of(&self, value: &Value) -> IrType {
        match value {
            Value::Const(c) => c.ty(),
            Value::Reg(id) => self
                .body
                .as_ref()
                .and_then(|body| body.value_types.get(id.0))
                .cloned()
                .unwrap_or(IrType::Void),
            Value::Param(idx) => self
                .params
                .get(*idx)
                .map(|p| p.ty.clone())
                .unwrap_or(IrType::Void),
            Value::Global(_) => IrType::string(),
        }
    }
}

/// Support routines the generated code may call without the source
/// declaring them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Runtime {
    Puts,
    Abort,
}

impl Runtime {
    pub const ALL: [Runtime; 2] = [Runtime::Puts, Runtime::Abort];

    pub fn lookup(name: &str) -> Option<Runtime> {
        Runtime::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Whether a user function could stand in for this routine.
    pub fn accepts(&self, function: &Function) -> bool {
        function.ret == self.ret() && function.param_types() == self.params()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Runtime::Puts => "puts",
            Runtime::Abort => "abort",
        }
    }

    pub fn params(&self) -> Vec<IrType> {
        match self {
            Runtime::Puts => vec![IrType::string()],
            Runtime::Abort => vec![],
        }
    }

    pub fn ret(&self) -> IrType {
        match self {
            Runtime::Puts => IrType::I64,
            Runtime::Abort => IrType::Void,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub strings: Vec<String>,
    pub runtime: BTreeSet<Runtime>,
}

impl Module {
    pub fn new(name: &str) -> Module {
        Module {
            name: name.to_owned(),
            functions: vec![],
            strings: vec![],
            runtime: BTreeSet::new(),
        }
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Replaces the declaration of the same name, or appends.
    pub fn define(&mut self, function: Function) {
        match self.functions.iter_mut().find(|f| f.name == function.name) {
            Some(existing) => *existing = function,
            None => self.functions.push(function),
        }
    }

    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let idx = self.functions.iter().position(|f| f.name == name)?;
        Some(self.functions.remove(idx))
    }

    pub fn intern_string(&mut self, text: &str) -> Value {
        let idx = match self.strings.iter().position(|s| s == text) {
            Some(idx) => idx,
            None => {
                self.strings.push(text.to_owned());
                self.strings.len() - 1
            }
        };
        Value::Global(idx)
    }

    pub fn declare_runtime(&mut self, routine: Runtime) {
        self.runtime.insert(routine);
    }

    /// Drops runtime declarations nothing calls and strings nothing
    /// references, renumbering the strings that stay.
    pub fn discard_unused(&mut self) {
        let mut callees = BTreeSet::new();
        let mut referenced = BTreeSet::new();
        for body in self.functions.iter().filter_map(|f| f.body.as_ref()) {
            for block in &body.blocks {
                for instr in &block.instructions {
                    if let InstrKind::Call { callee, .. } = &instr.kind {
                        callees.insert(callee.as_str());
                    }
                    referenced.extend(instr.kind.operands().into_iter().filter_map(Value::as_global));
                }
                if let Some(term) = &block.terminator {
                    referenced.extend(term.operands().into_iter().filter_map(Value::as_global));
                }
            }
        }

        self.runtime.retain(|routine| callees.contains(routine.name()));

        let renumbered: HashMap<usize, usize> = referenced
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, new))
            .collect();
        let strings = std::mem::take(&mut self.strings);
        self.strings = strings
            .into_iter()
            .enumerate()
            .filter(|(idx, _)| renumbered.contains_key(idx))
            .map(|(_, s)| s)
            .collect();

        for body in self.functions.iter_mut().filter_map(|f| f.body.as_mut()) {
            for block in body.blocks.iter_mut() {
                let terminator = block.terminator.iter_mut().flat_map(Terminator::operands_mut);
                let operands = block
                    .instructions
                    .iter_mut()
                    .flat_map(|instr| instr.kind.operands_mut())
                    .chain(terminator);
                for operand in operands {
                    if let Value::Global(idx) = operand {
                        *idx = renumbered[&*idx];
                    }
                }
            }
        }
    }

    /// Parameter and return types of anything callable by name.
    pub fn callee_signature(&self, name: &str) -> Option<(Vec<IrType>, IrType)> {
        if let Some(function) = self.get_function(name) {
            return Some((function.param_types(), function.ret.clone()));
        }
        self.runtime
            .iter()
            .find(|r| r.name() == name)
            .map(|r| (r.params(), r.ret()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_strings_are_shared() {
        let mut module = Module::new("m");
        let a = module.intern_string("hello");
        let b = module.intern_string("world");
        let c = module.intern_string("hello");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(module.strings.len(), 2);
    }

    #[test]
    fn define_replaces_declaration() {
        let mut module = Module::new("m");
        module.add_function(Function::declaration("f", vec![], IrType::I64));
        let mut defined = Function::declaration("f", vec![], IrType::I64);
        defined.body = Some(Body::default());
        module.define(defined);
        assert_eq!(module.functions.len(), 1);
        assert!(module.functions[0].body.is_some());
    }

    #[test]
    fn float_constants_compare_by_bits() {
        assert_eq!(Constant::Float(0.5), Constant::Float(0.5));
        assert_ne!(Constant::Float(0.0), Constant::Float(-0.0));
    }

    #[test]
    fn runtime_routines_accept_matching_declarations() {
        let puts = Function::declaration(
            "puts",
            vec![Param {
                name: "s".into(),
                ty: IrType::string(),
            }],
            IrType::I64,
        );
        assert_eq!(Runtime::lookup("puts"), Some(Runtime::Puts));
        assert!(Runtime::Puts.accepts(&puts));
        assert!(!Runtime::Abort.accepts(&Function::declaration("abort", vec![], IrType::I64)));
        assert_eq!(Runtime::lookup("exit"), None);
    }

    #[test]
    fn unused_strings_and_routines_are_discarded() {
        let mut module = Module::new("m");
        module.declare_runtime(Runtime::Puts);
        module.declare_runtime(Runtime::Abort);
        module.intern_string("dropped");
        let kept = module.intern_string("kept");

        let mut body = Body::default();
        let entry = body.add_block("entry");
        let block = body.block_mut(entry).unwrap();
        block.instructions.push(Instruction {
            result: None,
            ty: IrType::Void,
            kind: InstrKind::Call {
                callee: "abort".into(),
                args: vec![],
            },
        });
        block.terminator = Some(Terminator::Ret(Some(kept)));
        let mut function = Function::declaration("f", vec![], IrType::string());
        function.body = Some(body);
        module.add_function(function);

        module.discard_unused();

        assert_eq!(module.strings, vec!["kept".to_owned()]);
        assert_eq!(module.runtime, BTreeSet::from([Runtime::Abort]));
        let body = module.functions[0].body.as_ref().unwrap();
        assert_eq!(
            body.blocks[0].terminator,
            Some(Terminator::Ret(Some(Value::Global(0))))
        );
    }

    #[test]
    fn runtime_routines_resolve_as_callees() {
        let mut module = Module::new("m");
        assert!(module.callee_signature("abort").is_none());
        module.declare_runtime(Runtime::Abort);
        assert_eq!(
            module.callee_signature("abort"),
            Some((vec![], IrType::Void))
        );
    }
}
