//! SQL Parser for storesql
//!
//! A hand-written recursive descent parser over an immutable token array.
//! Every production takes the cursor it starts at and reports the cursor
//! just past what it consumed:
//!
//! - `Ok(Some(Parsed { node, next }))`: the production matched
//! - `Ok(None)`: the production does not apply here; try an alternative
//! - `Err(_)`: the production started matching and then became invalid
//!
//! Supported statements:
//! - CREATE [TEMP] TABLE (columns, constraints, table options, AS SELECT)
//! - SELECT (parsed only)

use std::cell::Cell;

use log::debug;

use crate::error::{Result, SqlError};
use crate::lexer::{tokenize, StatementType, Token};

pub mod ast;
pub use self::ast::*;

mod expressions;
mod clauses;
mod table;
mod select;
mod ddl;
mod utils;

//=============================================================================
// Configuration
//=============================================================================

/// Quoting rules for double-quoted text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `"x"` is an identifier
    #[default]
    Sqlite,
    /// `"x"` is a string literal
    MySql,
}

/// Default nesting limit; deep enough for real schemas and shallow enough
/// to stay inside a 2 MB thread stack in debug builds
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Parser options, passed explicitly to every parse
#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub dialect: Dialect,
    /// Maximum nesting of expressions, sub-selects and table references
    pub max_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Sqlite,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ParserConfig {
    /// MySQL quoting rules
    pub fn mysql() -> Self {
        Self {
            dialect: Dialect::MySql,
            ..Self::default()
        }
    }
}

//=============================================================================
// Parser
//=============================================================================

/// A matched production and the cursor just past it
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub node: T,
    pub next: usize,
}

impl<T> Parsed<T> {
    pub fn new(node: T, next: usize) -> Self {
        Self { node, next }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Parsed<U> {
        Parsed { node: f(self.node), next: self.next }
    }
}

/// Two-tier result of every production
pub type ParseResult<T> = Result<Option<Parsed<T>>>;

/// SQL Parser
pub struct Parser<'t> {
    pub(super) tokens: &'t [Token],
    pub(super) config: ParserConfig,
    depth: Cell<usize>,
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token], config: ParserConfig) -> Self {
        Self {
            tokens,
            config,
            depth: Cell::new(0),
        }
    }

    /// Parse a SQL string holding exactly one statement
    pub fn parse(sql: &str) -> Result<Statement> {
        let tokens = tokenize(sql)?;
        let parser = Parser::new(&tokens, ParserConfig::default());
        let stmt = parser.parse_statement(0)?;

        let mut next = stmt.next;
        // Optional semicolon at the end
        if parser.punct(next, ";") {
            next += 1;
        }
        if !parser.is_end(next) {
            return Err(parser.syntax_error(next));
        }
        Ok(stmt.node)
    }

    /// Parse a SQL string holding any number of `;`-separated statements
    pub fn parse_all(sql: &str, config: &ParserConfig) -> Result<Vec<Statement>> {
        let tokens = tokenize(sql)?;
        Parser::new(&tokens, config.clone()).parse_statements()
    }

    /// Parse every statement in the token array
    pub fn parse_statements(&self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();
        let mut at = 0;
        loop {
            while self.punct(at, ";") {
                at += 1;
            }
            if self.is_end(at) {
                break;
            }
            let stmt = self.parse_statement(at)?;
            at = stmt.next;
            statements.push(stmt.node);
            if self.punct(at, ";") {
                at += 1;
            } else if !self.is_end(at) {
                return Err(self.syntax_error(at));
            }
        }
        Ok(statements)
    }

    /// Parse one statement starting at `at`
    pub fn parse_statement(&self, at: usize) -> Result<Parsed<Statement>> {
        let kind = match StatementType::detect(&self.tokens[at.min(self.tokens.len())..]) {
            Some(kind) => kind,
            None => return Err(self.syntax_error(self.unclassified_word(at))),
        };
        debug!("parsing {} statement at token {}", kind, at);

        let parsed = match kind {
            StatementType::CreateTable => self
                .parse_create_table(at)?
                .map(|p| p.map(Statement::CreateTable)),
            StatementType::Select => self.parse_select(at)?.map(|p| p.map(Statement::Select)),
            other => {
                return Err(SqlError::Unsupported(format!(
                    "{} statements are not supported",
                    other
                )))
            }
        };
        parsed.ok_or_else(|| self.syntax_error(at))
    }

    /// First word of an unclassified statement that names no statement kind
    fn unclassified_word(&self, at: usize) -> usize {
        if !self.keyword(at, "CREATE") {
            return at;
        }
        if self.keyword(at + 1, "TEMP") || self.keyword(at + 1, "TEMPORARY") {
            at + 2
        } else {
            at + 1
        }
    }
}
