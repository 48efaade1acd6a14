use std::fmt::{self, Display, Formatter};
use std::iter::Peekable;
use std::str::CharIndices;

use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Pos {
    pub line: usize,
    pub offset_in_line: usize,
}

impl Display for Pos {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.offset_in_line)
    }
}

#[derive(Clone, Error, Debug, PartialEq, Eq)]
#[error("scan error: {kind:?} {pos}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub pos: Pos,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanErrorKind {
    UnexpectedCharacter,
    UnterminatedString,
}

impl ScanErrorKind {
    /// The diagnostic text in the exact form tooling scrapes.
    pub fn message(&self) -> &'static str {
        match self {
            ScanErrorKind::UnexpectedCharacter => "Unexpected character.",
            ScanErrorKind::UnterminatedString => "Unterminated string.",
        }
    }
}

/// A token in the input stream.
///
/// `lexeme` is the raw source slice the token was scanned from (empty for
/// `Eof`). `pos` always points at the first character of the lexeme; for
/// `Eof` it describes a location potentially off the end of the input.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Token<'src> {
    pub data: TokenType<'src>,
    pub lexeme: &'src str,
    pub pos: Pos,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum TokenType<'src> {
    Symbol(Symbol),
    Keyword(Keyword),
    Identifier(&'src str),
    String(&'src str),
    Number(f64),
    Eof,
}

impl PartialEq<Symbol> for TokenType<'_> {
    fn eq(&self, other: &Symbol) -> bool {
        matches!(self, TokenType::Symbol(symbol) if symbol == other)
    }
}

impl PartialEq<Keyword> for TokenType<'_> {
    fn eq(&self, other: &Keyword) -> bool {
        matches!(self, TokenType::Keyword(keyword) if keyword == other)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Symbol {
    // Single-character tokens.
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Minus,
    Plus,
    Semicolon,
    Slash,
    Star,

    // One or two character tokens.
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Keyword {
    And,
    Class,
    Else,
    False,
    Fun,
    For,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
}

impl Display for Keyword {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

const KEYWORDS: [(&str, Keyword); 16] = [
    ("and", Keyword::And),
    ("class", Keyword::Class),
    ("else", Keyword::Else),
    ("false", Keyword::False),
    ("fun", Keyword::Fun),
    ("for", Keyword::For),
    ("if", Keyword::If),
    ("nil", Keyword::Nil),
    ("or", Keyword::Or),
    ("print", Keyword::Print),
    ("return", Keyword::Return),
    ("super", Keyword::Super),
    ("this", Keyword::This),
    ("true", Keyword::True),
    ("var", Keyword::Var),
    ("while", Keyword::While),
];

/// Streaming scanner over the raw source text.
///
/// Tokens are produced on demand; scan faults travel inline as `Err` items so
/// the consumer decides where to report them. After the input is exhausted
/// every further call yields `Eof`, so the stream is always `Eof`-terminated
/// and a consumer can never run off the end.
pub struct Scanner<'src> {
    code: &'src str,
    code_iter: Peekable<CharIndices<'src>>,
    pending: Option<Result<Token<'src>, ScanError>>,

    line: usize,
    offset_in_line: usize,
}

impl<'src> Scanner<'src> {
    pub fn new(code: &'src str) -> Scanner<'src> {
        Scanner {
            code,
            code_iter: code.char_indices().peekable(),
            pending: None,
            line: 1,
            offset_in_line: 0,
        }
    }

    pub fn next(&mut self) -> Result<Token<'src>, ScanError> {
        match self.pending.take() {
            Some(result) => result,
            None => self.scan_token(),
        }
    }

    pub fn peek(&mut self) -> Result<&Token<'src>, ScanError> {
        if self.pending.is_none() {
            let next = self.scan_token();
            self.pending = Some(next);
        }
        match self.pending.as_ref() {
            Some(Ok(token)) => Ok(token),
            Some(Err(error)) => Err(error.clone()),
            None => unreachable!("pending was just filled"),
        }
    }

    /// Consume and return the next token if its data passes `predicate`.
    /// A pending scan error never matches.
    pub fn next_if<F>(&mut self, predicate: F) -> Option<Token<'src>>
    where
        F: FnOnce(&TokenType<'src>) -> bool,
    {
        let matched = match self.peek() {
            Ok(token) => predicate(&token.data),
            Err(_) => false,
        };
        if matched {
            self.next().ok()
        } else {
            None
        }
    }

    /// Consume the next token if `map` produces `Some` for it, returning the
    /// mapped value.
    pub fn next_if_some<T, F>(&mut self, map: F) -> Option<T>
    where
        F: FnOnce(&Token<'src>) -> Option<T>,
    {
        let mapped = match self.peek() {
            Ok(token) => map(token),
            Err(_) => None,
        }?;
        _ = self.next();
        Some(mapped)
    }

    pub fn is_at_eof(&mut self) -> bool {
        matches!(self.peek(), Ok(token) if token.data == TokenType::Eof)
    }

    fn current_pos(&self) -> Pos {
        Pos {
            line: self.line,
            offset_in_line: self.offset_in_line,
        }
    }

    // Byte offset of the next unconsumed character, or the end of the input
    fn rest_offset(&mut self) -> usize {
        match self.code_iter.peek() {
            Some((offset, _)) => *offset,
            None => self.code.len(),
        }
    }

    fn next_char_is(&mut self, expected: char) -> bool {
        matches!(self.code_iter.peek(), Some((_, ch)) if *ch == expected)
    }

    fn consume_next_char_if_eq(&mut self, next_ch: char) -> bool {
        self.code_iter.next_if(|(_, ch)| *ch == next_ch).is_some()
    }

    fn consume_next_char_if_match<F>(&mut self, predicate: F) -> bool
    where
        F: Fn(char) -> bool,
    {
        self.code_iter.next_if(|(_, ch)| predicate(*ch)).is_some()
    }

    fn lexeme_from(&mut self, start: usize) -> &'src str {
        let end = self.rest_offset();
        &self.code[start..end]
    }

    fn scan_token(&mut self) -> Result<Token<'src>, ScanError> {
        loop {
            let pos = self.current_pos();
            let Some((start, ch)) = self.code_iter.next() else {
                return Ok(Token {
                    data: TokenType::Eof,
                    lexeme: "",
                    pos,
                });
            };
            match ch {
                ' ' | '\r' | '\t' => {
                    self.offset_in_line += 1;
                    continue;
                }
                '\n' => {
                    self.line += 1;
                    self.offset_in_line = 0;
                    continue;
                }
                // A comment runs to the end of the line; the newline itself is
                // left for the next pass so it still bumps the line counter
                '/' if self.next_char_is('/') => {
                    while self.consume_next_char_if_match(|ch| ch != '\n') {}
                    continue;
                }
                '"' => return self.finish_string(start, pos),
                '0'..='9' => return Ok(self.finish_number(start, pos)),
                ch if ch.is_ascii_alphabetic() || ch == '_' => {
                    return Ok(self.finish_identifier(start, pos))
                }
                _ => {}
            }
            let symbol = match ch {
                '(' => Symbol::LeftParen,
                ')' => Symbol::RightParen,
                '{' => Symbol::LeftBrace,
                '}' => Symbol::RightBrace,
                ',' => Symbol::Comma,
                '.' => Symbol::Dot,
                '-' => Symbol::Minus,
                '+' => Symbol::Plus,
                ';' => Symbol::Semicolon,
                '*' => Symbol::Star,
                '/' => Symbol::Slash,
                '!' => {
                    if self.consume_next_char_if_eq('=') {
                        Symbol::BangEqual
                    } else {
                        Symbol::Bang
                    }
                }
                '=' => {
                    if self.consume_next_char_if_eq('=') {
                        Symbol::EqualEqual
                    } else {
                        Symbol::Equal
                    }
                }
                '<' => {
                    if self.consume_next_char_if_eq('=') {
                        Symbol::LessEqual
                    } else {
                        Symbol::Less
                    }
                }
                '>' => {
                    if self.consume_next_char_if_eq('=') {
                        Symbol::GreaterEqual
                    } else {
                        Symbol::Greater
                    }
                }
                _ => {
                    self.offset_in_line += 1;
                    return Err(ScanError {
                        kind: ScanErrorKind::UnexpectedCharacter,
                        pos,
                    });
                }
            };
            let lexeme = self.lexeme_from(start);
            self.offset_in_line += lexeme.len();
            return Ok(Token {
                data: TokenType::Symbol(symbol),
                lexeme,
                pos,
            });
        }
    }

    fn finish_number(&mut self, start: usize, pos: Pos) -> Token<'src> {
        while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {}
        // A fractional part only counts when a digit follows the dot; a bare
        // trailing '.' is left for the next token
        if self.fraction_follows() {
            _ = self.code_iter.next();
            while self.consume_next_char_if_match(|ch| ch.is_ascii_digit()) {}
        }
        let lexeme = self.lexeme_from(start);
        self.offset_in_line += lexeme.len();
        // Digits with at most one interior dot always parse
        let number = lexeme.parse::<f64>().unwrap();
        Token {
            data: TokenType::Number(number),
            lexeme,
            pos,
        }
    }

    fn fraction_follows(&mut self) -> bool {
        let rest = &self.code[self.rest_offset()..];
        let mut chars = rest.chars();
        chars.next() == Some('.') && chars.next().is_some_and(|ch| ch.is_ascii_digit())
    }

    fn finish_identifier(&mut self, start: usize, pos: Pos) -> Token<'src> {
        while self.consume_next_char_if_match(|ch| ch.is_ascii_alphanumeric() || ch == '_') {}
        let lexeme = self.lexeme_from(start);
        self.offset_in_line += lexeme.len();
        let data = match KEYWORDS.iter().find(|(literal, _)| *literal == lexeme) {
            Some((_, keyword)) => TokenType::Keyword(*keyword),
            None => TokenType::Identifier(lexeme),
        };
        Token { data, lexeme, pos }
    }

    fn finish_string(&mut self, start: usize, pos: Pos) -> Result<Token<'src>, ScanError> {
        self.offset_in_line += 1;
        loop {
            match self.code_iter.next() {
                Some((_, '"')) => {
                    self.offset_in_line += 1;
                    break;
                }
                Some((_, '\n')) => {
                    self.line += 1;
                    self.offset_in_line = 0;
                }
                Some(_) => {
                    self.offset_in_line += 1;
                }
                // Report where scanning stopped, not where the string began
                None => {
                    return Err(ScanError {
                        kind: ScanErrorKind::UnterminatedString,
                        pos: self.current_pos(),
                    })
                }
            }
        }
        let lexeme = self.lexeme_from(start);
        let string = &lexeme[1..lexeme.len() - 1];
        Ok(Token {
            data: TokenType::String(string),
            lexeme,
            pos,
        })
    }
}
