//! Recursive-descent parser for the restricted dialect

use std::collections::BTreeMap;
use std::iter::Peekable;

use super::ast::{Condition, Literal, Statement};
use super::lexer::{Keyword, Lexer, Token};
use crate::error::{Error, Result};

/// The parser takes tokens from the lexer and builds a [`Statement`].
///
/// It only ensures the syntax is well-formed; whether a table or column
/// exists, and whether the condition column is the primary key, is the
/// query processor's job.
pub struct Parser<'a> {
    lexer: Peekable<Lexer<'a>>,
    raw: &'a str,
}

impl Parser<'_> {
    /// Parses the input string into a statement. The entire string must
    /// be parsed as a single statement, ending with an optional
    /// semicolon.
    pub fn parse(statement: &str) -> Result<Statement> {
        let mut parser = Parser {
            lexer: Lexer::new(statement).peekable(),
            raw: statement,
        };
        let statement = parser.parse_statement()?;
        parser.skip(Token::Semicolon);
        if let Some(token) = parser.lexer.next().transpose()? {
            return Err(Error::Parse(format!("unexpected token {}", token)));
        }
        Ok(statement)
    }

    /// Fetches the next lexer token, or errors if none is found.
    fn next(&mut self) -> Result<Token> {
        self.lexer
            .next()
            .transpose()?
            .ok_or_else(|| Error::Parse("unexpected end of input".into()))
    }

    /// Returns the next identifier, or errors if not found.
    fn next_ident(&mut self) -> Result<String> {
        match self.next()? {
            Token::Ident(ident) => Ok(ident),
            token => Err(Error::Parse(format!("expected identifier, got {}", token))),
        }
    }

    /// Returns the next lexer token if it satisfies the predicate.
    fn next_if(&mut self, predicate: impl Fn(&Token) -> bool) -> Option<Token> {
        self.peek().ok()?.filter(|t| predicate(t))?;
        self.next().ok()
    }

    /// Consumes the next lexer token if it is the given token, returning true.
    fn next_is(&mut self, token: Token) -> bool {
        self.next_if(|t| t == &token).is_some()
    }

    /// Consumes the next lexer token if it's the expected token, or errors.
    fn expect(&mut self, expect: Token) -> Result<()> {
        let token = self.next()?;
        if token != expect {
            return Err(Error::Parse(format!(
                "expected token {}, found {}",
                expect, token
            )));
        }
        Ok(())
    }

    /// Consumes the next lexer token if it is the given token. Equivalent to
    /// next_is(), but expresses intent better.
    fn skip(&mut self, token: Token) {
        self.next_is(token);
    }

    /// Peeks the next lexer token if any, but transposes it for convenience.
    fn peek(&mut self) -> Result<Option<&Token>> {
        self.lexer
            .peek()
            .map(|r| r.as_ref().map_err(|err| err.clone()))
            .transpose()
    }

    /// Parses a statement.
    fn parse_statement(&mut self) -> Result<Statement> {
        let Some(token) = self.peek()? else {
            return Err(Error::Parse("unexpected end of input".into()));
        };
        match token {
            Token::Keyword(Keyword::Create) => self.parse_create_table(),
            Token::Keyword(Keyword::Drop) => self.parse_drop_table(),
            Token::Keyword(Keyword::Delete) => self.parse_delete(),
            Token::Keyword(Keyword::Insert) => self.parse_insert(),
            Token::Keyword(Keyword::Select) => self.parse_select(),
            Token::Keyword(Keyword::Update) => self.parse_update(),
            _ => self.parse_other(),
        }
    }

    /// Parses a CREATE TABLE statement. The column definitions are kept
    /// as a token-normalized body; the engine interprets them.
    fn parse_create_table(&mut self) -> Result<Statement> {
        self.expect(Keyword::Create.into())?;
        self.expect(Keyword::Table.into())?;
        let table = self.next_ident()?;
        self.expect(Token::OpenParen)?;
        let mut depth = 1;
        let mut tokens = Vec::new();
        loop {
            let token = self.next()?;
            match token {
                Token::OpenParen => depth += 1,
                Token::CloseParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            tokens.push(token);
        }
        if tokens.is_empty() {
            return Err(Error::Parse("empty column definition list".into()));
        }
        Ok(Statement::CreateTable {
            table,
            body: render_body(&tokens),
        })
    }

    /// Parses a DROP TABLE statement.
    fn parse_drop_table(&mut self) -> Result<Statement> {
        self.expect(Keyword::Drop.into())?;
        self.expect(Keyword::Table.into())?;
        let table = self.next_ident()?;
        Ok(Statement::DropTable { table })
    }

    /// Parses an INSERT statement. An explicit column list is required:
    /// the canonical column ordering and the predicted-key splice are
    /// defined over it.
    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect(Keyword::Insert.into())?;
        self.expect(Keyword::Into.into())?;
        let table = self.next_ident()?;
        self.expect(Token::OpenParen)?;
        let mut names = Vec::new();
        loop {
            names.push(self.next_ident()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        self.expect(Token::CloseParen)?;
        self.expect(Keyword::Values.into())?;
        self.expect(Token::OpenParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        self.expect(Token::CloseParen)?;
        if names.len() != values.len() {
            return Err(Error::Parse(format!(
                "column count {} does not match value count {}",
                names.len(),
                values.len()
            )));
        }
        let mut columns = BTreeMap::new();
        for (name, value) in names.into_iter().zip(values) {
            if columns.insert(name.clone(), value).is_some() {
                return Err(Error::Parse(format!("duplicate column {}", name)));
            }
        }
        Ok(Statement::Insert { table, columns })
    }

    /// Parses an UPDATE statement.
    fn parse_update(&mut self) -> Result<Statement> {
        self.expect(Keyword::Update.into())?;
        let table = self.next_ident()?;
        self.expect(Keyword::Set.into())?;
        let mut set = BTreeMap::new();
        loop {
            let column = self.next_ident()?;
            self.expect(Token::Equal)?;
            let value = self.parse_literal()?;
            if set.insert(column.clone(), value).is_some() {
                return Err(Error::Parse(format!("duplicate column {}", column)));
            }
            if !self.next_is(Token::Comma) {
                break;
            }
        }
        let condition = self.parse_where()?;
        Ok(Statement::Update {
            table,
            set,
            condition,
        })
    }

    /// Parses a DELETE statement.
    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect(Keyword::Delete.into())?;
        self.expect(Keyword::From.into())?;
        let table = self.next_ident()?;
        let condition = self.parse_where()?;
        Ok(Statement::Delete { table, condition })
    }

    /// Parses a SELECT statement. Reads are not canonicalized; the raw
    /// text is kept and handed to the engine untouched.
    fn parse_select(&mut self) -> Result<Statement> {
        let raw = self.consume_raw()?;
        Ok(Statement::Select { raw })
    }

    /// Classifies any lexable statement the dialect does not recognize.
    /// The raw text is kept, like SELECT; only lexer failures error.
    fn parse_other(&mut self) -> Result<Statement> {
        let raw = self.consume_raw()?;
        Ok(Statement::Other { raw })
    }

    /// Drains the remaining tokens, surfacing lexer errors, and returns
    /// the trimmed raw statement text
    fn consume_raw(&mut self) -> Result<String> {
        while self.lexer.next().transpose()?.is_some() {}
        Ok(self.raw.trim().trim_end_matches(';').trim_end().to_string())
    }

    /// Parses the single-column WHERE restriction: `column = literal`.
    fn parse_where(&mut self) -> Result<Condition> {
        self.expect(Keyword::Where.into())?;
        let column = self.next_ident()?;
        self.expect(Token::Equal)?;
        let value = self.parse_literal()?;
        Ok(Condition { column, value })
    }

    /// Parses a literal value.
    fn parse_literal(&mut self) -> Result<Literal> {
        match self.next()? {
            Token::String(s) => Ok(Literal::String(s)),
            Token::Number(n) => Ok(Literal::Number(n)),
            Token::Keyword(Keyword::Null) => Ok(Literal::Null),
            token => Err(Error::Parse(format!("expected literal, got {}", token))),
        }
    }
}

/// Re-renders captured tokens with fixed spacing, normalizing whatever
/// whitespace the input used.
fn render_body(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let no_space_before = matches!(token, Token::Comma | Token::CloseParen | Token::Period);
        let no_space_after = out.ends_with('(') || out.ends_with('.');
        if !out.is_empty() && !no_space_before && !no_space_after {
            out.push(' ');
        }
        out.push_str(&token.to_string());
    }
    out
}
