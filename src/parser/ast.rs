use crate::lexer::Number;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Function(FunctionDeclaration),
    Extern(Prototype),
    Statement(Statement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: TypeName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub _type: TypeName,
}

/// A type exactly as written in a signature: `float`, `int[4]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeName {
    pub name: String,
    pub len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDeclaration {
    pub proto: Prototype,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Expression(Expression),
    Return(Option<Expression>),
    If(IfStatement),
    Loop(LoopStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Block,
    pub else_ifs: Vec<ElseIf>,
    pub else_block: Option<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElseIf {
    pub condition: Expression,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStatement {
    /// The loop condition for `for cond { }`, the iterated sequence for
    /// `for x in seq { }`.
    pub condition: Expression,
    pub body: Block,
    pub kind: LoopKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    While,
    ForIn {
        index: Option<String>,
        element: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    String(String),
    Number(Number),
    Bool(bool),
    Variable(String),
    Binary(BinaryExpression),
    Unary(UnaryExpression),
    Call(CallExpression),
    Sequence(Vec<Expression>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpression {
    pub op: BinaryOp,
    pub lhs: Box<Expression>,
    pub rhs: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpression {
    pub op: char,
    pub expr: Box<Expression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpression {
    pub callee: String,
    pub args: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    Greater,
    Equal,
    NotEqual,
    Custom(char),
}

impl BinaryOp {
    pub fn from_char(ch: char) -> Option<BinaryOp> {
        let op = match ch {
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '*' => BinaryOp::Mul,
            '/' => BinaryOp::Div,
            '<' => BinaryOp::Less,
            '>' => BinaryOp::Greater,
            '%' | '&' | '|' | '^' => BinaryOp::Custom(ch),
            _ => return None,
        };
        Some(op)
    }

    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Custom('|') => 1,
            BinaryOp::Custom('^') => 2,
            BinaryOp::Custom('&') => 3,
            BinaryOp::Equal | BinaryOp::NotEqual => 5,
            BinaryOp::Less | BinaryOp::Greater => 10,
            BinaryOp::Add | BinaryOp::Sub => 20,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Custom(_) => 40,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => write!(f, "+"),
            BinaryOp::Sub => write!(f, "-"),
            BinaryOp::Mul => write!(f, "*"),
            BinaryOp::Div => write!(f, "/"),
            BinaryOp::Less => write!(f, "<"),
            BinaryOp::Greater => write!(f, ">"),
            BinaryOp::Equal => write!(f, "=="),
            BinaryOp::NotEqual => write!(f, "!="),
            BinaryOp::Custom(ch) => write!(f, "{}", ch),
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len {
            Some(len) => write!(f, "{}[{}]", self.name, len),
            None => write!(f, "{}", self.name),
        }
    }
}

impl TypeName {
    pub fn void() -> TypeName {
        TypeName {
            name: "void".to_owned(),
            len: None,
        }
    }
}
