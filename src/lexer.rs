pub mod token;
pub mod util;

pub use token::{lookup, Number, Position, Token, TokenKind};

use crate::error::{Error, Result};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Character-level scanner. The lexer holds exactly one pending character and
/// classifies it into the current token on every call to [`Lexer::advance`].
pub struct Lexer {
    src: Vec<u8>,
    offset: usize,
    forward: usize,
    ch: Option<char>,
    line: usize,
    col: usize,
    started: bool,
    token: Token,
    pos: Position,
    pub ignore_space: bool,
    pub ignore_newline: bool,
    pub strict: bool,
}

impl Lexer {
    pub fn new(src: impl Into<Vec<u8>>) -> Lexer {
        Lexer {
            src: src.into(),
            offset: 0,
            forward: 0,
            ch: None,
            line: 1,
            col: 0,
            started: false,
            token: Token::Eof,
            pos: Position::default(),
            ignore_space: true,
            ignore_newline: true,
            strict: false,
        }
    }

    pub fn strict(mut self, strict: bool) -> Lexer {
        self.strict = strict;
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn kind(&self) -> TokenKind {
        self.token.kind()
    }

    pub fn position(&self) -> Position {
        self.pos
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.token {
            Token::Identifier(s) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<Number> {
        match &self.token {
            Token::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn string(&self) -> Option<&str> {
        match &self.token {
            Token::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Scans the next token and makes it current.
    /// Drains the lexer, honouring its strictness.
    pub fn tokens(mut self) -> Result<Vec<Token>> {
        let mut tokens = vec![];
        loop {
            match self.advance()? {
                Token::Eof => break,
                token => tokens.push(token.clone()),
            }
        }
        Ok(tokens)
    }

    pub fn advance(&mut self) -> Result<&Token> {
        if !self.started {
            self.start()?;
        }
        self.token = self.scan()?;
        Ok(&self.token)
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        self.bump()?;
        if self.ch == Some(BYTE_ORDER_MARK) {
            self.col = 0;
            self.bump()?;
        }
        Ok(())
    }

    fn here(&self) -> Position {
        Position {
            line: self.line,
            col: self.col,
        }
    }

    fn bump(&mut self) -> Result<()> {
        if self.ch == Some('\n') {
            self.line += 1;
            self.col = 0;
        }

        if self.forward >= self.src.len() {
            self.offset = self.src.len();
            self.ch = None;
            return Ok(());
        }

        self.offset = self.forward;
        self.col += 1;

        let (ch, width) = util::decode_char(&self.src[self.forward..])
            .map_err(|e| Error::lexical(e.to_string(), self.here()))?;

        if ch == '\0' {
            return Err(Error::lexical("null character", self.here()));
        }
        if ch == BYTE_ORDER_MARK && self.offset > 0 {
            return Err(Error::lexical(
                "0xFEFF is only allowed as a first character",
                self.here(),
            ));
        }

        self.ch = Some(ch);
        self.forward += width;
        Ok(())
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.forward).copied()
    }

    fn scan(&mut self) -> Result<Token> {
        loop {
            self.skip_layout()?;
            self.pos = self.here();

            let Some(ch) = self.ch else {
                return Ok(Token::Eof);
            };

            if ch == '/' {
                match self.peek_byte() {
                    Some(b'/') => {
                        self.skip_line_comment()?;
                        continue;
                    }
                    Some(b'*') => {
                        if !self.skip_block_comment()? {
                            return Ok(Token::Eof);
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            return if ch.is_alphabetic() {
                self.scan_identifier()
            } else if ch.is_ascii_digit()
                || (ch == '.' && self.peek_byte().is_some_and(|b| b.is_ascii_digit()))
            {
                self.scan_number()
            } else if ch == '"' {
                self.scan_string()
            } else {
                self.scan_punctuation(ch)
            };
        }
    }

    fn skip_layout(&mut self) -> Result<()> {
        while let Some(ch) = self.ch {
            let skip = match ch {
                ' ' | '\t' => self.ignore_space,
                '\n' | '\r' => self.ignore_newline,
                _ => false,
            };
            if !skip {
                break;
            }
            self.bump()?;
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) -> Result<()> {
        while let Some(ch) = self.ch {
            if ch == '\n' || ch == '\r' {
                break;
            }
            self.bump()?;
        }
        Ok(())
    }

    // Returns false when the input ends inside the comment.
    fn skip_block_comment(&mut self) -> Result<bool> {
        let start = self.here();
        self.bump()?;
        self.bump()?;

        loop {
            match self.ch {
                None if self.strict => {
                    return Err(Error::lexical("unterminated block comment", start));
                }
                None => return Ok(false),
                Some('*') if self.peek_byte() == Some(b'/') => {
                    self.bump()?;
                    self.bump()?;
                    return Ok(true);
                }
                Some(_) => self.bump()?,
            }
        }
    }

    fn scan_identifier(&mut self) -> Result<Token> {
        let mut identifier = String::new();

        while let Some(ch) = self.ch {
            if !(ch.is_alphabetic() || ch == '_') {
                break;
            }
            identifier.push(ch);
            self.bump()?;
        }

        Ok(lookup(&identifier))
    }

    fn scan_number(&mut self) -> Result<Token> {
        let mut text = String::new();
        let mut is_float = false;

        while let Some(ch) = self.ch {
            if ch == '.' {
                if is_float {
                    return Err(Error::lexical(
                        format!("invalid use of '.' in numeric literal '{}.'", text),
                        self.here(),
                    ));
                }
                is_float = true;
            } else if !ch.is_ascii_digit() {
                break;
            }
            text.push(ch);
            self.bump()?;
        }

        util::parse_number(&text, is_float)
            .map(Token::Number)
            .map_err(|e| Error::lexical(e.to_string(), self.pos))
    }

    fn scan_string(&mut self) -> Result<Token> {
        self.bump()?;

        let mut value = String::new();
        loop {
            match self.ch {
                None if self.strict => {
                    return Err(Error::lexical("unterminated string literal", self.pos));
                }
                None => return Ok(Token::Eof),
                Some('"') => break,
                Some(ch) => {
                    value.push(ch);
                    self.bump()?;
                }
            }
        }

        self.bump()?;
        Ok(Token::Str(value))
    }

    fn scan_punctuation(&mut self, ch: char) -> Result<Token> {
        self.bump()?;

        let token = match ch {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '@' => Token::At,
            '=' if self.ch == Some('=') => {
                self.bump()?;
                Token::Equal
            }
            '=' => Token::Assign,
            other => Token::Unknown(other),
        };

        Ok(token)
    }
}

/// Scans a whole source text, returning every token before end-of-input.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).tokens()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_one(src: &str) -> Result<Token> {
        let mut lexer = Lexer::new(src);
        lexer.advance().cloned()
    }

    #[test]
    fn identifiers_and_keywords() {
        assert_eq!(
            tokenize("fun foo_bar return iffy in").unwrap(),
            vec![
                Token::Fun,
                Token::Identifier("foo_bar".into()),
                Token::Return,
                Token::Identifier("iffy".into()),
                Token::In,
            ]
        );
    }

    #[test]
    fn unicode_identifiers() {
        assert_eq!(
            lex_one("größe").unwrap(),
            Token::Identifier("größe".into())
        );
    }

    #[test]
    fn numbers_record_integer_flag() {
        assert_eq!(lex_one("42").unwrap(), Token::Number(Number::Int(42)));
        assert_eq!(lex_one("3.5").unwrap(), Token::Number(Number::Float(3.5)));
        assert_eq!(lex_one(".5").unwrap(), Token::Number(Number::Float(0.5)));
    }

    #[test]
    fn second_decimal_point_is_fatal() {
        assert!(matches!(lex_one("3.14.1"), Err(Error::Lexical { .. })));
    }

    #[test]
    fn integer_overflow_is_fatal() {
        assert!(matches!(
            lex_one("99999999999999999999"),
            Err(Error::Lexical { .. })
        ));
    }

    #[test]
    fn comments_produce_no_tokens() {
        let plain = tokenize("42").unwrap();
        assert_eq!(tokenize("// x\n42").unwrap(), plain);
        assert_eq!(tokenize("/* x */42").unwrap(), plain);
        assert_eq!(tokenize("/* a * b / c */ 42 // trailing").unwrap(), plain);
    }

    #[test]
    fn slash_alone_is_unknown() {
        assert_eq!(
            tokenize("a / b").unwrap(),
            vec![
                Token::Identifier("a".into()),
                Token::Unknown('/'),
                Token::Identifier("b".into()),
            ]
        );
    }

    #[test]
    fn equal_and_assign() {
        assert_eq!(
            tokenize("= == @").unwrap(),
            vec![Token::Assign, Token::Equal, Token::At]
        );
    }

    #[test]
    fn strings_are_verbatim() {
        assert_eq!(
            lex_one(r#""a\nb""#).unwrap(),
            Token::Str(r"a\nb".into())
        );
    }

    #[test]
    fn unterminated_string_is_lenient_by_default() {
        assert_eq!(lex_one("\"abc").unwrap(), Token::Eof);

        let mut strict = Lexer::new("\"abc").strict(true);
        assert!(matches!(strict.advance(), Err(Error::Lexical { .. })));
    }

    #[test]
    fn unterminated_comment_is_lenient_by_default() {
        assert_eq!(lex_one("/* abc").unwrap(), Token::Eof);

        let mut strict = Lexer::new("/* abc").strict(true);
        assert!(matches!(strict.advance(), Err(Error::Lexical { .. })));
    }

    #[test]
    fn draining_respects_strictness() {
        let tokens = Lexer::new("say \"hi").tokens().unwrap();
        assert_eq!(tokens, vec![Token::Identifier("say".into())]);

        let strict = Lexer::new("say \"hi").strict(true).tokens();
        assert!(matches!(strict, Err(Error::Lexical { .. })));
    }

    #[test]
    fn null_character_is_fatal() {
        assert!(matches!(tokenize("a\0b"), Err(Error::Lexical { .. })));
    }

    #[test]
    fn ill_formed_utf8_is_fatal() {
        let mut lexer = Lexer::new(vec![b'a', b' ', 0xff]);
        assert_eq!(lexer.advance().unwrap(), &Token::Identifier("a".into()));
        assert!(matches!(lexer.advance(), Err(Error::Lexical { .. })));
    }

    #[test]
    fn byte_order_mark_only_first() {
        assert_eq!(
            tokenize("\u{feff}fun").unwrap(),
            vec![Token::Fun]
        );
        assert!(matches!(
            tokenize("fun \u{feff}"),
            Err(Error::Lexical { .. })
        ));
    }

    #[test]
    fn layout_toggles_are_independent() {
        let mut lexer = Lexer::new("a \nb");
        lexer.ignore_newline = false;
        let mut tokens = vec![];
        while *lexer.advance().unwrap() != Token::Eof {
            tokens.push(lexer.token().clone());
        }
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("a".into()),
                Token::Unknown('\n'),
                Token::Identifier("b".into()),
            ]
        );

        let mut lexer = Lexer::new("a b");
        lexer.ignore_space = false;
        lexer.advance().unwrap();
        assert_eq!(lexer.advance().unwrap(), &Token::Unknown(' '));
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let mut lexer = Lexer::new("fun\n  foo");
        lexer.advance().unwrap();
        assert_eq!(lexer.position(), Position { line: 1, col: 1 });
        lexer.advance().unwrap();
        assert_eq!(lexer.position(), Position { line: 2, col: 3 });
        assert_eq!(lexer.kind(), TokenKind::Identifier);
        assert_eq!(lexer.identifier(), Some("foo"));
    }
}
