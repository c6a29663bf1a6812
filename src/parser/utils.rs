use crate::error::{Result, SqlError};
use crate::lexer::Token;
use super::{Dialect, Parsed, Parser};

/// Keywords that never act as a bare identifier, alias or type name
const RESERVED: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "AUTOINCREMENT", "AUTO_INCREMENT", "BETWEEN", "BY", "CASE",
    "CAST", "CHECK", "COLLATE", "CONSTRAINT", "CREATE", "CROSS", "CURRENT_DATE",
    "CURRENT_TIME", "CURRENT_TIMESTAMP", "DEFAULT", "DEFERRABLE", "DESC", "DISTINCT", "ELSE",
    "END", "ESCAPE", "EXCEPT", "EXISTS", "FALSE", "FILTER", "FOREIGN", "FROM", "FULL",
    "GENERATED", "GLOB", "GROUP", "HAVING", "IN", "INDEXED", "INNER", "INTERSECT", "IS",
    "ISNULL", "JOIN", "LEFT", "LIKE", "LIMIT", "MATCH", "NATURAL", "NOT", "NOTNULL", "NULL",
    "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER", "PRIMARY", "RAISE", "REFERENCES",
    "REGEXP", "RIGHT", "SELECT", "STORED", "THEN", "TRUE", "UNION", "UNIQUE", "USING",
    "VIRTUAL", "WHEN", "WHERE", "WINDOW", "WITH",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| k.eq_ignore_ascii_case(word))
}

fn is_bare_word(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Text between the first and last character of a quoted token
pub(super) fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Releases one level of nesting when dropped
pub(super) struct DepthGuard<'p> {
    depth: &'p std::cell::Cell<usize>,
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

impl<'t> Parser<'t> {
    pub(super) fn token(&self, at: usize) -> Option<&'t Token> {
        self.tokens.get(at)
    }

    pub(super) fn value(&self, at: usize) -> Option<&'t str> {
        self.tokens.get(at).map(|t| t.value.as_str())
    }

    pub(super) fn is_end(&self, at: usize) -> bool {
        at >= self.tokens.len()
    }

    /// Case-insensitive keyword test
    pub(super) fn keyword(&self, at: usize, keyword: &str) -> bool {
        self.token(at).map_or(false, |t| t.is_keyword(keyword))
    }

    /// True if the keywords appear in sequence starting at `at`
    pub(super) fn keywords(&self, at: usize, keywords: &[&str]) -> bool {
        keywords.iter().enumerate().all(|(i, k)| self.keyword(at + i, k))
    }

    /// Exact punctuation test
    pub(super) fn punct(&self, at: usize, punct: &str) -> bool {
        self.value(at) == Some(punct)
    }

    /// `near "<token>": syntax error`, or `incomplete input` past the end
    pub(super) fn syntax_error(&self, at: usize) -> SqlError {
        match self.token(at) {
            Some(t) => SqlError::near(&t.value),
            None => SqlError::incomplete_input(),
        }
    }

    pub(super) fn expect_keyword(&self, at: usize, keyword: &str) -> Result<usize> {
        if self.keyword(at, keyword) {
            Ok(at + 1)
        } else {
            Err(self.syntax_error(at))
        }
    }

    pub(super) fn expect_punct(&self, at: usize, punct: &str) -> Result<usize> {
        if self.punct(at, punct) {
            Ok(at + 1)
        } else {
            Err(self.syntax_error(at))
        }
    }

    /// A non-reserved bare word or a quoted identifier, unquoted
    pub(super) fn identifier(&self, at: usize) -> Option<String> {
        let value = self.value(at)?;
        if value.starts_with('`') && value.len() >= 2 {
            return Some(strip_quotes(value).to_string());
        }
        if value.starts_with('"') && value.len() >= 2 && self.config.dialect == Dialect::Sqlite {
            return Some(strip_quotes(value).to_string());
        }
        if is_bare_word(value) && !is_reserved(value) {
            return Some(value.to_string());
        }
        None
    }

    pub(super) fn expect_identifier(&self, at: usize) -> Result<Parsed<String>> {
        match self.identifier(at) {
            Some(name) => Ok(Parsed::new(name, at + 1)),
            None => Err(self.syntax_error(at)),
        }
    }

    /// `[AS] alias`; a bare alias must be a non-reserved identifier
    pub(super) fn parse_alias(&self, at: usize) -> Result<(Option<String>, usize)> {
        if self.keyword(at, "AS") {
            let alias = self.expect_identifier(at + 1)?;
            return Ok((Some(alias.node), alias.next));
        }
        match self.identifier(at) {
            Some(alias) => Ok((Some(alias), at + 1)),
            None => Ok((None, at)),
        }
    }

    /// `( name [, name]* )`: non-empty, exactly one comma between names
    pub(super) fn parse_name_list(&self, at: usize) -> Result<Parsed<Vec<String>>> {
        let mut i = self.expect_punct(at, "(")?;
        let mut names = Vec::new();
        loop {
            let name = self.expect_identifier(i)?;
            names.push(name.node);
            i = name.next;
            if self.punct(i, ",") {
                i += 1;
            } else {
                let next = self.expect_punct(i, ")")?;
                return Ok(Parsed::new(names, next));
            }
        }
    }

    /// Source text of `tokens[from..to]`, with a single space wherever the
    /// input had whitespace between two tokens
    pub(super) fn raw_text(&self, from: usize, to: usize) -> String {
        let mut text = String::new();
        let end = to.min(self.tokens.len());
        for i in from..end {
            let token = &self.tokens[i];
            if i > from && token.start_offset > self.tokens[i - 1].end_offset() {
                text.push(' ');
            }
            text.push_str(&token.value);
        }
        text
    }

    /// Enter one nesting level, failing past `max_depth`
    pub(super) fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get() + 1;
        if depth > self.config.max_depth {
            return Err(SqlError::Syntax(format!(
                "Expression tree is too large (maximum depth {})",
                self.config.max_depth
            )));
        }
        self.depth.set(depth);
        Ok(DepthGuard { depth: &self.depth })
    }
}
