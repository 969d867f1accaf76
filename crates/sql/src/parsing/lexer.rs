//! SQL lexer
//!
//! Splits a raw statement into tokens, skipping whitespace and comments.
//! String literals use single quotes with `''` as the escape; numbers may
//! carry a sign and a fraction. Keywords are matched case-insensitively,
//! identifiers are preserved as written.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::error::{Error, Result};

/// A lexer token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// An identifier such as a table or column name
    Ident(String),
    /// A numeric literal
    Number(String),
    /// A single-quoted string literal, with quoting removed
    String(String),
    /// A reserved keyword
    Keyword(Keyword),
    Period,
    Equal,
    Comma,
    OpenParen,
    CloseParen,
    Semicolon,
    Asterisk,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "{}", ident),
            Token::Number(number) => write!(f, "{}", number),
            Token::String(string) => write!(f, "'{}'", string.replace('\'', "''")),
            Token::Keyword(keyword) => write!(f, "{}", keyword.as_str()),
            Token::Period => write!(f, "."),
            Token::Equal => write!(f, "="),
            Token::Comma => write!(f, ","),
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::Semicolon => write!(f, ";"),
            Token::Asterisk => write!(f, "*"),
        }
    }
}

impl From<Keyword> for Token {
    fn from(keyword: Keyword) -> Self {
        Token::Keyword(keyword)
    }
}

/// Reserved keywords of the dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Create,
    Delete,
    Drop,
    From,
    Insert,
    Into,
    Not,
    Null,
    Select,
    Set,
    Table,
    Update,
    Values,
    Where,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident.to_uppercase().as_str() {
            "CREATE" => Keyword::Create,
            "DELETE" => Keyword::Delete,
            "DROP" => Keyword::Drop,
            "FROM" => Keyword::From,
            "INSERT" => Keyword::Insert,
            "INTO" => Keyword::Into,
            "NOT" => Keyword::Not,
            "NULL" => Keyword::Null,
            "SELECT" => Keyword::Select,
            "SET" => Keyword::Set,
            "TABLE" => Keyword::Table,
            "UPDATE" => Keyword::Update,
            "VALUES" => Keyword::Values,
            "WHERE" => Keyword::Where,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Create => "CREATE",
            Keyword::Delete => "DELETE",
            Keyword::Drop => "DROP",
            Keyword::From => "FROM",
            Keyword::Insert => "INSERT",
            Keyword::Into => "INTO",
            Keyword::Not => "NOT",
            Keyword::Null => "NULL",
            Keyword::Select => "SELECT",
            Keyword::Set => "SET",
            Keyword::Table => "TABLE",
            Keyword::Update => "UPDATE",
            Keyword::Values => "VALUES",
            Keyword::Where => "WHERE",
        }
    }
}

/// Iterator over the tokens of an input string
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Result<Token>> {
        match self.scan() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => self
                .chars
                .peek()
                .map(|c| Err(Error::Parse(format!("unexpected character {}", c)))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Lexer<'a> {
        Lexer {
            chars: input.chars().peekable(),
        }
    }

    /// Consumes the next character if it satisfies the predicate
    fn next_if(&mut self, predicate: impl Fn(char) -> bool) -> Option<char> {
        self.chars.next_if(|&c| predicate(c))
    }

    /// Consumes characters while the predicate holds, collecting them
    fn collect_while(&mut self, into: &mut String, predicate: impl Fn(char) -> bool) {
        while let Some(c) = self.next_if(&predicate) {
            into.push(c);
        }
    }

    /// Scans the next token, skipping leading whitespace and comments
    fn scan(&mut self) -> Result<Option<Token>> {
        self.skip_ignored()?;
        match self.chars.peek() {
            Some('\'') => self.scan_string().map(Some),
            Some(c) if c.is_ascii_digit() => Ok(Some(self.scan_number(String::new()))),
            Some(c) if c.is_alphabetic() || *c == '_' => Ok(Some(self.scan_ident())),
            Some(_) => self.scan_symbol(),
            None => Ok(None),
        }
    }

    /// Skips whitespace, line comments, and block comments
    fn skip_ignored(&mut self) -> Result<()> {
        loop {
            self.collect_while(&mut String::new(), |c| c.is_whitespace());
            match self.chars.peek() {
                Some('-') => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    if clone.peek() != Some(&'-') {
                        return Ok(());
                    }
                    self.collect_while(&mut String::new(), |c| c != '\n');
                }
                Some('/') => {
                    let mut clone = self.chars.clone();
                    clone.next();
                    if clone.peek() != Some(&'*') {
                        return Ok(());
                    }
                    self.chars.next();
                    self.chars.next();
                    let mut star = false;
                    loop {
                        match self.chars.next() {
                            Some('/') if star => break,
                            Some(c) => star = c == '*',
                            None => return Err(Error::Parse("unterminated comment".into())),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn scan_ident(&mut self) -> Token {
        let mut ident = String::new();
        self.collect_while(&mut ident, |c| c.is_alphanumeric() || c == '_');
        match Keyword::from_ident(&ident) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(ident),
        }
    }

    fn scan_number(&mut self, mut number: String) -> Token {
        self.collect_while(&mut number, |c| c.is_ascii_digit());
        if self.chars.peek() == Some(&'.') {
            let mut clone = self.chars.clone();
            clone.next();
            if clone.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.chars.next();
                number.push('.');
                self.collect_while(&mut number, |c| c.is_ascii_digit());
            }
        }
        Token::Number(number)
    }

    fn scan_string(&mut self) -> Result<Token> {
        self.chars.next();
        let mut string = String::new();
        loop {
            match self.chars.next() {
                Some('\'') => {
                    if self.next_if(|c| c == '\'').is_some() {
                        string.push('\'');
                    } else {
                        return Ok(Token::String(string));
                    }
                }
                Some(c) => string.push(c),
                None => return Err(Error::Parse("unterminated string literal".into())),
            }
        }
    }

    fn scan_symbol(&mut self) -> Result<Option<Token>> {
        let token = match self.chars.peek() {
            Some('.') => Token::Period,
            Some('=') => Token::Equal,
            Some(',') => Token::Comma,
            Some('(') => Token::OpenParen,
            Some(')') => Token::CloseParen,
            Some(';') => Token::Semicolon,
            Some('*') => Token::Asterisk,
            Some('-') => {
                self.chars.next();
                return match self.chars.peek() {
                    Some(c) if c.is_ascii_digit() => Ok(Some(self.scan_number("-".into()))),
                    _ => Err(Error::Parse("unexpected character -".into())),
                };
            }
            _ => return Ok(None),
        };
        self.chars.next();
        Ok(Some(token))
    }
}
