pub mod ast;

use crate::{
    error::{Error, Result},
    lexer::{Lexer, Number, Position, Token},
};
use ast::{
    BinaryExpression, BinaryOp, Block, CallExpression, ElseIf, Expression, FunctionDeclaration,
    IfStatement, Item, LoopKind, LoopStatement, Param, Prototype, Statement, TypeName,
    UnaryExpression,
};

const UNARY_OPERATORS: &[char] = &['-', '+', '!', '~', '*', '&', '%', '^', '|'];
const OPERATOR_NAMES: &[char] = &['+', '-', '*', '/', '<', '>', '!', '~', '%', '&', '|', '^'];

/// Pulls tokens from a [`Lexer`] and hands out one top-level item at a time.
pub struct Parser {
    lexer: Lexer,
    current: Token,
    pos: Position,
    primed: bool,
}

impl Parser {
    pub fn new(lexer: Lexer) -> Parser {
        Parser {
            lexer,
            current: Token::Eof,
            pos: Position::default(),
            primed: false,
        }
    }

    fn advance(&mut self) -> Result<Token> {
        let next = self.lexer.advance()?.clone();
        self.pos = self.lexer.position();
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn check(&self, token: &Token) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(token)
    }

    fn check_char(&self, ch: char) -> bool {
        self.current == Token::Unknown(ch)
    }

    fn is_next(&mut self, token: &Token) -> Result<bool> {
        if self.check(token) {
            self.advance()?;
            return Ok(true);
        }
        Ok(false)
    }

    fn consume(&mut self, token: &Token) -> Result<Token> {
        if self.check(token) {
            return self.advance();
        }
        Err(self.unexpected(&token.to_string()))
    }

    fn consume_char(&mut self, ch: char) -> Result<()> {
        if self.check_char(ch) {
            self.advance()?;
            return Ok(());
        }
        Err(self.unexpected(&format!("'{}'", ch)))
    }

    fn consume_identifier(&mut self) -> Result<String> {
        match self.advance()? {
            Token::Identifier(name) => Ok(name),
            other => {
                self.current = other;
                Err(self.unexpected("identifier"))
            }
        }
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::syntax(format!("expected {}, found {}", expected, self.current), self.pos)
    }

    /// Returns the next top-level item, or `None` once the input is exhausted.
    pub fn next_item(&mut self) -> Result<Option<Item>> {
        if !self.primed {
            self.primed = true;
            self.advance()?;
        }

        let item = match self.current {
            Token::Eof => return Ok(None),
            Token::Fun => {
                self.advance()?;
                let proto = self.parse_prototype()?;
                let body = self.parse_block()?;
                Item::Function(FunctionDeclaration { proto, body })
            }
            Token::At => {
                self.advance()?;
                self.is_next(&Token::Fun)?;
                Item::Extern(self.parse_prototype()?)
            }
            _ => Item::Statement(self.parse_statement()?),
        };

        Ok(Some(item))
    }

    pub fn parse(&mut self) -> Result<Vec<Item>> {
        let mut items = vec![];
        while let Some(item) = self.next_item()? {
            items.push(item);
        }
        Ok(items)
    }

    fn parse_prototype(&mut self) -> Result<Prototype> {
        let mut name = self.consume_identifier()?;

        if (name == "binary" || name == "unary") && !self.check(&Token::LParen) {
            let op = self.parse_operator_name()?;
            name = format!("{}_{}", name, op);
        }

        self.consume(&Token::LParen)?;
        let mut params = vec![];
        if !self.check(&Token::RParen) {
            loop {
                let name = self.consume_identifier()?;
                let _type = self.parse_type_name()?;
                params.push(Param { name, _type });
                if self.check_char(',') {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.consume(&Token::RParen)?;

        let return_type = match self.current {
            Token::Identifier(_) => self.parse_type_name()?,
            _ => TypeName::void(),
        };

        Ok(Prototype {
            name,
            params,
            return_type,
        })
    }

    fn parse_operator_name(&mut self) -> Result<String> {
        match self.advance()? {
            Token::Equal => Ok("==".to_owned()),
            Token::Unknown('!') if self.check(&Token::Assign) => {
                self.advance()?;
                Ok("!=".to_owned())
            }
            Token::Unknown(ch) if OPERATOR_NAMES.contains(&ch) => Ok(ch.to_string()),
            other => {
                self.current = other;
                Err(self.unexpected("operator"))
            }
        }
    }

    fn parse_type_name(&mut self) -> Result<TypeName> {
        let name = self.consume_identifier()?;

        let len = if self.check_char('[') {
            self.advance()?;
            let len = match self.advance()? {
                Token::Number(Number::Int(n)) if n >= 0 => n as usize,
                other => {
                    self.current = other;
                    return Err(self.unexpected("sequence length"));
                }
            };
            self.consume_char(']')?;
            Some(len)
        } else {
            None
        };

        Ok(TypeName { name, len })
    }

    fn parse_block(&mut self) -> Result<Block> {
        self.consume(&Token::LBrace)?;
        let mut stmts = vec![];
        while !self.check(&Token::RBrace) {
            if self.check(&Token::Eof) {
                return Err(self.unexpected("'}'"));
            }
            stmts.push(self.parse_statement()?);
        }
        self.consume(&Token::RBrace)?;
        Ok(Block { stmts })
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if self.is_next(&Token::Return)? {
            self.parse_return_statement()
        } else if self.is_next(&Token::If)? {
            self.parse_if_statement()
        } else if self.is_next(&Token::For)? {
            self.parse_loop_statement()
        } else {
            Ok(Statement::Expression(self.parse_expression()?))
        }
    }

    fn parse_return_statement(&mut self) -> Result<Statement> {
        if self.check(&Token::RBrace) || self.check(&Token::Eof) {
            return Ok(Statement::Return(None));
        }
        Ok(Statement::Return(Some(self.parse_expression()?)))
    }

    fn parse_if_statement(&mut self) -> Result<Statement> {
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let mut else_ifs = vec![];
        let mut else_block = None;

        while self.is_next(&Token::Else)? {
            if self.is_next(&Token::If)? {
                let condition = self.parse_expression()?;
                let block = self.parse_block()?;
                else_ifs.push(ElseIf { condition, block });
            } else {
                else_block = Some(self.parse_block()?);
                break;
            }
        }

        Ok(Statement::If(IfStatement {
            condition,
            then_block,
            else_ifs,
            else_block,
        }))
    }

    fn parse_loop_statement(&mut self) -> Result<Statement> {
        let head = self.parse_expression()?;

        let kind = match head {
            Expression::Variable(ref first) if self.check_char(',') || self.check(&Token::In) => {
                let (index, element) = if self.check_char(',') {
                    self.advance()?;
                    (Some(first.clone()), self.consume_identifier()?)
                } else {
                    (None, first.clone())
                };
                self.consume(&Token::In)?;
                LoopKind::ForIn { index, element }
            }
            _ => LoopKind::While,
        };

        let condition = match kind {
            LoopKind::While => head,
            LoopKind::ForIn { .. } => self.parse_expression()?,
        };
        let body = self.parse_block()?;

        Ok(Statement::Loop(LoopStatement {
            condition,
            body,
            kind,
        }))
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        let lhs = self.parse_unary()?;
        self.parse_binary_rhs(0, lhs)
    }

    fn peek_binary_op(&self) -> Option<BinaryOp> {
        match self.current {
            Token::Equal => Some(BinaryOp::Equal),
            Token::Unknown('!') => Some(BinaryOp::NotEqual),
            Token::Unknown(ch) => BinaryOp::from_char(ch),
            _ => None,
        }
    }

    fn consume_binary_op(&mut self, op: BinaryOp) -> Result<()> {
        self.advance()?;
        if op == BinaryOp::NotEqual {
            self.consume(&Token::Assign)?;
        }
        Ok(())
    }

    fn parse_binary_rhs(&mut self, min_prec: u8, mut lhs: Expression) -> Result<Expression> {
        loop {
            let Some(op) = self.peek_binary_op() else {
                return Ok(lhs);
            };
            let prec = op.precedence();
            if prec < min_prec {
                return Ok(lhs);
            }
            self.consume_binary_op(op)?;

            let mut rhs = self.parse_unary()?;
            if let Some(next) = self.peek_binary_op() {
                if next.precedence() > prec {
                    rhs = self.parse_binary_rhs(prec + 1, rhs)?;
                }
            }

            lhs = Expression::Binary(BinaryExpression {
                op,
                lhs: lhs.into(),
                rhs: rhs.into(),
            });
        }
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        match self.current {
            Token::Unknown(ch) if UNARY_OPERATORS.contains(&ch) => {
                self.advance()?;
                let expr = self.parse_unary()?;
                Ok(Expression::Unary(UnaryExpression {
                    op: ch,
                    expr: expr.into(),
                }))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        match self.advance()? {
            Token::Number(n) => Ok(Expression::Number(n)),
            Token::Str(s) => Ok(Expression::String(s)),
            Token::True => Ok(Expression::Bool(true)),
            Token::False => Ok(Expression::Bool(false)),
            Token::Identifier(name) => {
                if self.is_next(&Token::LParen)? {
                    let args = self.parse_arguments(&Token::RParen)?;
                    Ok(Expression::Call(CallExpression { callee: name, args }))
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.consume(&Token::RParen)?;
                Ok(expr)
            }
            Token::Unknown('[') => {
                let elements = self.parse_arguments(&Token::Unknown(']'))?;
                Ok(Expression::Sequence(elements))
            }
            other => {
                self.current = other;
                Err(self.unexpected("expression"))
            }
        }
    }

    fn parse_arguments(&mut self, close: &Token) -> Result<Vec<Expression>> {
        let mut args = vec![];
        if self.current != *close {
            loop {
                args.push(self.parse_expression()?);
                if self.check_char(',') {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        if self.current != *close {
            return Err(self.unexpected(&close.to_string()));
        }
        self.advance()?;
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Vec<Item> {
        Parser::new(Lexer::new(src)).parse().unwrap()
    }

    fn var(name: &str) -> Box<Expression> {
        Expression::Variable(name.to_owned()).into()
    }

    #[test]
    fn function_with_typed_params() {
        let items = parse("fun add(a float, b float) float { return a + b }");
        let Item::Function(func) = &items[0] else {
            panic!("expected a function, got {:?}", items[0]);
        };
        assert_eq!(func.proto.name, "add");
        assert_eq!(func.proto.params.len(), 2);
        assert_eq!(func.proto.params[1]._type.name, "float");
        assert_eq!(func.proto.return_type.name, "float");
        assert_eq!(
            func.body.stmts,
            vec![Statement::Return(Some(Expression::Binary(BinaryExpression {
                op: BinaryOp::Add,
                lhs: var("a"),
                rhs: var("b"),
            })))]
        );
    }

    #[test]
    fn extern_and_operator_names() {
        let items = parse("@ puts(s string) int fun binary + (a float, b float) float { return a } fun unary - (a int) int { return a }");
        assert!(matches!(&items[0], Item::Extern(p) if p.name == "puts"));
        assert!(matches!(&items[1], Item::Function(f) if f.proto.name == "binary_+"));
        assert!(matches!(&items[2], Item::Function(f) if f.proto.name == "unary_-"));
    }

    #[test]
    fn missing_return_type_is_void() {
        let items = parse("fun main() { }");
        let Item::Function(func) = &items[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.proto.return_type, TypeName::void());
    }

    #[test]
    fn precedence_and_not_equal() {
        let items = parse("a + b * c != d");
        let Item::Statement(Statement::Expression(Expression::Binary(top))) = &items[0] else {
            panic!("expected a binary expression");
        };
        assert_eq!(top.op, BinaryOp::NotEqual);
        let Expression::Binary(sum) = top.lhs.as_ref() else {
            panic!("expected a sum");
        };
        assert_eq!(sum.op, BinaryOp::Add);
        assert!(matches!(sum.rhs.as_ref(), Expression::Binary(m) if m.op == BinaryOp::Mul));
    }

    #[test]
    fn if_else_chain() {
        let items = parse("if a { 1 } else if b { 2 } else if c { 3 } else { 4 }");
        let Item::Statement(Statement::If(stmt)) = &items[0] else {
            panic!("expected an if statement");
        };
        assert_eq!(stmt.else_ifs.len(), 2);
        assert!(stmt.else_block.is_some());
    }

    #[test]
    fn loops() {
        let items = parse("for i, x in xs { x } for x in [1, 2] { x } for a < b { a }");
        let kinds: Vec<_> = items
            .iter()
            .map(|item| match item {
                Item::Statement(Statement::Loop(l)) => l.kind.clone(),
                other => panic!("expected a loop, got {:?}", other),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                LoopKind::ForIn {
                    index: Some("i".into()),
                    element: "x".into()
                },
                LoopKind::ForIn {
                    index: None,
                    element: "x".into()
                },
                LoopKind::While,
            ]
        );
    }

    #[test]
    fn sequence_parameter_type() {
        let items = parse("fun sum(xs float[4]) float { return 0.0 }");
        let Item::Function(func) = &items[0] else {
            panic!("expected a function");
        };
        assert_eq!(func.proto.params[0]._type.len, Some(4));
    }

    #[test]
    fn unclosed_block_is_a_syntax_error() {
        let result = Parser::new(Lexer::new("fun f() int { return 1")).parse();
        assert!(matches!(result, Err(Error::Syntax { .. })));
    }
}
