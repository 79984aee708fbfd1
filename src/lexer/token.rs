use std::{collections::HashMap, fmt};

lazy_static::lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, Token> = HashMap::from([
        ("fun", Token::Fun),
        ("return", Token::Return),
        ("if", Token::If),
        ("else", Token::Else),
        ("for", Token::For),
        ("in", Token::In),
        ("true", Token::True),
        ("false", Token::False),
    ]);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Identifier(String),
    Number(Number),
    Str(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    At,
    Assign,
    Equal,
    Fun,
    Return,
    If,
    Else,
    For,
    In,
    True,
    False,
    Unknown(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Eof,
    Identifier,
    Number,
    Str,
    Punctuation,
    Keyword,
    Unknown,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn is_integer(&self) -> bool {
        matches!(self, Number::Int(_))
    }
}

impl Token {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Eof => TokenKind::Eof,
            Token::Identifier(_) => TokenKind::Identifier,
            Token::Number(_) => TokenKind::Number,
            Token::Str(_) => TokenKind::Str,
            Token::LParen
            | Token::RParen
            | Token::LBrace
            | Token::RBrace
            | Token::At
            | Token::Assign
            | Token::Equal => TokenKind::Punctuation,
            Token::Fun
            | Token::Return
            | Token::If
            | Token::Else
            | Token::For
            | Token::In
            | Token::True
            | Token::False => TokenKind::Keyword,
            Token::Unknown(_) => TokenKind::Unknown,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of input"),
            Token::Identifier(s) => write!(f, "identifier '{}'", s),
            Token::Number(Number::Int(n)) => write!(f, "number {}", n),
            Token::Number(Number::Float(n)) => write!(f, "number {:?}", n),
            Token::Str(s) => write!(f, "string \"{}\"", s),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::At => write!(f, "'@'"),
            Token::Assign => write!(f, "'='"),
            Token::Equal => write!(f, "'=='"),
            Token::Unknown(ch) => write!(f, "'{}'", ch.escape_default()),
            keyword => {
                let name = KEYWORDS
                    .iter()
                    .find(|(_, tok)| *tok == keyword)
                    .map(|(name, _)| *name)
                    .unwrap_or("keyword");
                write!(f, "'{}'", name)
            }
        }
    }
}

pub fn lookup(identifier: &str) -> Token {
    KEYWORDS
        .get(identifier)
        .cloned()
        .unwrap_or_else(|| Token::Identifier(identifier.to_owned()))
}
