use std::fmt;

use crate::error::{Result, SqlError};

//=============================================================================
// Tokens
//=============================================================================

/// A token: the exact source slice plus its byte offset in the input.
///
/// Keywords, identifiers, literals and punctuation are all plain text here;
/// the parser classifies them by looking at `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub start_offset: usize,
}

impl Token {
    pub fn new(value: impl Into<String>, start_offset: usize) -> Self {
        Self { value: value.into(), start_offset }
    }

    /// Byte offset one past the last character of the token
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.value.len()
    }

    /// Case-insensitive keyword comparison
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.value.eq_ignore_ascii_case(keyword)
    }
}

/// Two-character operators, matched before single punctuation
const MULTI_CHAR_OPERATORS: [&str; 8] = ["<<", ">>", "=>", "<=", ">=", "<>", "!=", "=="];

const PUNCTUATION: &[char] = &[
    '(', ')', ',', '<', '>', ';', '~', '=', '*', '+', '-', '/', '|', '&', '.',
];

//=============================================================================
// Lexer (Tokenizer)
//=============================================================================

/// Lexer state
pub struct Lexer<'a> {
    source: &'a str,
    input: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            input: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.pos + n).map(|&(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    /// Byte offset of the character at `pos` (input length at the end)
    fn offset(&self, pos: usize) -> usize {
        self.input.get(pos).map(|&(o, _)| o).unwrap_or(self.source.len())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn slice_from(&self, start_pos: usize) -> Token {
        let start = self.offset(start_pos);
        let end = self.offset(self.pos);
        Token::new(&self.source[start..end], start)
    }

    fn unrecognized(&self, start_pos: usize, end_pos: usize) -> SqlError {
        let start = self.offset(start_pos);
        let end = self.offset(end_pos);
        SqlError::Lex {
            fragment: self.source[start..end].to_string(),
            position: start,
        }
    }

    fn read_identifier(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `\d+(\.\d+)?`; a dot not followed by a digit is left for the next token
    fn read_number(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && matches!(self.peek_ahead(1), Some(c) if c.is_ascii_digit()) {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
    }

    /// Reads a quoted run starting at the current opening quote. The
    /// delimiter cannot be escaped; an unterminated quote is reported with
    /// the rest of the input as fragment.
    fn read_quoted(&mut self, start_pos: usize) -> Result<()> {
        let quote = self.advance();
        while let Some(c) = self.advance() {
            if Some(c) == quote {
                return Ok(());
            }
        }
        Err(self.unrecognized(start_pos, self.input.len()))
    }

    /// `?`, `?NNN`, `:name`, `@name`, `$name`
    fn read_bind_parameter(&mut self, start_pos: usize) -> Result<()> {
        let prefix = self.advance();
        if prefix == Some('?') {
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
            return Ok(());
        }
        let name_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        if self.pos == name_start {
            return Err(self.unrecognized(start_pos, self.pos));
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        let start_pos = self.pos;
        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        // Multi-character operators
        if let Some(next) = self.peek_ahead(1) {
            let pair: String = [c, next].iter().collect();
            if MULTI_CHAR_OPERATORS.contains(&pair.as_str()) {
                self.advance();
                self.advance();
                return Ok(Some(self.slice_from(start_pos)));
            }
        }

        if PUNCTUATION.contains(&c) {
            self.advance();
            return Ok(Some(self.slice_from(start_pos)));
        }

        // Blob literal X'...' stays a single token
        if (c == 'x' || c == 'X') && self.peek_ahead(1) == Some('\'') {
            self.advance();
            self.read_quoted(start_pos)?;
            return Ok(Some(self.slice_from(start_pos)));
        }

        if matches!(c, '?' | ':' | '@' | '$') {
            self.read_bind_parameter(start_pos)?;
            return Ok(Some(self.slice_from(start_pos)));
        }

        if c.is_ascii_alphabetic() || c == '_' {
            self.read_identifier();
            return Ok(Some(self.slice_from(start_pos)));
        }

        if matches!(c, '\'' | '"' | '`') {
            self.read_quoted(start_pos)?;
            return Ok(Some(self.slice_from(start_pos)));
        }

        if c.is_ascii_digit() {
            self.read_number();
            return Ok(Some(self.slice_from(start_pos)));
        }

        Err(self.unrecognized(start_pos, start_pos + 1))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Tokenize a SQL string
pub fn tokenize(sql: &str) -> Result<Vec<Token>> {
    Lexer::new(sql).tokenize()
}

//=============================================================================
// Statement kind detection
//=============================================================================

/// Kind of statement, recognized from its leading keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    CreateIndex,
    CreateView,
    CreateTrigger,
    DropTable,
    DropIndex,
    DropView,
    AlterTable,
    BeginTransaction,
    Commit,
    Rollback,
    Vacuum,
    Reindex,
    Analyze,
    Pragma,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Select => "SELECT",
            StatementType::Insert => "INSERT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::CreateTable => "CREATE TABLE",
            StatementType::CreateIndex => "CREATE INDEX",
            StatementType::CreateView => "CREATE VIEW",
            StatementType::CreateTrigger => "CREATE TRIGGER",
            StatementType::DropTable => "DROP TABLE",
            StatementType::DropIndex => "DROP INDEX",
            StatementType::DropView => "DROP VIEW",
            StatementType::AlterTable => "ALTER TABLE",
            StatementType::BeginTransaction => "BEGIN TRANSACTION",
            StatementType::Commit => "COMMIT",
            StatementType::Rollback => "ROLLBACK",
            StatementType::Vacuum => "VACUUM",
            StatementType::Reindex => "REINDEX",
            StatementType::Analyze => "ANALYZE",
            StatementType::Pragma => "PRAGMA",
        }
    }

    /// Detect the kind of the statement starting at `tokens[0]`
    pub fn detect(tokens: &[Token]) -> Option<StatementType> {
        let kw = |i: usize, keyword: &str| tokens.get(i).map_or(false, |t| t.is_keyword(keyword));
        let first = tokens.first()?;
        let value = first.value.to_ascii_uppercase();
        let kind = match value.as_str() {
            "SELECT" => StatementType::Select,
            "INSERT" | "REPLACE" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "CREATE" => {
                let mut i = 1;
                if kw(i, "TEMP") || kw(i, "TEMPORARY") {
                    i += 1;
                }
                if kw(i, "UNIQUE") && kw(i + 1, "INDEX") {
                    i += 1;
                }
                if kw(i, "TABLE") {
                    StatementType::CreateTable
                } else if kw(i, "INDEX") {
                    StatementType::CreateIndex
                } else if kw(i, "VIEW") {
                    StatementType::CreateView
                } else if kw(i, "TRIGGER") {
                    StatementType::CreateTrigger
                } else {
                    return None;
                }
            }
            "DROP" => {
                if kw(1, "TABLE") {
                    StatementType::DropTable
                } else if kw(1, "INDEX") {
                    StatementType::DropIndex
                } else if kw(1, "VIEW") {
                    StatementType::DropView
                } else {
                    return None;
                }
            }
            "ALTER" if kw(1, "TABLE") => StatementType::AlterTable,
            "BEGIN" => StatementType::BeginTransaction,
            "COMMIT" | "END" => StatementType::Commit,
            "ROLLBACK" => StatementType::Rollback,
            "VACUUM" => StatementType::Vacuum,
            "REINDEX" => StatementType::Reindex,
            "ANALYZE" => StatementType::Analyze,
            "PRAGMA" => StatementType::Pragma,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(sql: &str) -> Vec<String> {
        tokenize(sql).unwrap().into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn test_lexer_basic() {
        assert_eq!(
            values("SELECT * FROM users WHERE id = 1;"),
            vec!["SELECT", "*", "FROM", "users", "WHERE", "id", "=", "1", ";"]
        );
    }

    #[test]
    fn test_lexer_offsets_reproduce_input() {
        let sql = "CREATE TABLE t (id INTEGER PRIMARY KEY,\n  name TEXT)";
        let tokens = tokenize(sql).unwrap();
        for t in &tokens {
            assert_eq!(&sql[t.start_offset..t.end_offset()], t.value);
        }
        for pair in tokens.windows(2) {
            let gap = &sql[pair[0].end_offset()..pair[1].start_offset];
            assert!(gap.chars().all(char::is_whitespace));
        }
    }

    #[test]
    fn test_lexer_operators() {
        assert_eq!(
            values("<< >> => <= >= <> != == < > ~ | &"),
            vec!["<<", ">>", "=>", "<=", ">=", "<>", "!=", "==", "<", ">", "~", "|", "&"]
        );
    }

    #[test]
    fn test_lexer_strings_keep_quotes() {
        assert_eq!(
            values(r#"'hello' "column name" `tbl`"#),
            vec!["'hello'", "\"column name\"", "`tbl`"]
        );
    }

    #[test]
    fn test_lexer_numbers() {
        assert_eq!(values("1 2.5 3."), vec!["1", "2.5", "3", "."]);
    }

    #[test]
    fn test_lexer_blob_and_bind_parameters() {
        assert_eq!(
            values("X'1a2b' x'' ? ?12 :name @p $v"),
            vec!["X'1a2b'", "x''", "?", "?12", ":name", "@p", "$v"]
        );
    }

    #[test]
    fn test_lexer_unrecognized_character() {
        let err = tokenize("SELECT * FROM users;#").unwrap_err();
        assert_eq!(err, SqlError::Lex { fragment: "#".into(), position: 20 });
        assert_eq!(err.to_string(), "SQLITE_ERROR: result code 1: unrecognized token: \"#\"");
    }

    #[test]
    fn test_lexer_identifiers_are_ascii() {
        let err = tokenize("café").unwrap_err();
        assert_eq!(err, SqlError::Lex { fragment: "é".into(), position: 3 });

        let err = tokenize("SELECT :é").unwrap_err();
        assert!(matches!(err, SqlError::Lex { .. }));

        assert!(tokenize("SELECT ΣΣ").is_err());
        assert_eq!(values("caf_9 _x"), vec!["caf_9", "_x"]);
    }

    #[test]
    fn test_lexer_unterminated_string() {
        let err = tokenize("SELECT 'abc").unwrap_err();
        assert_eq!(err.detail(), "unrecognized token: \"'abc\"");
    }

    #[test]
    fn test_lexer_lone_bang() {
        assert!(tokenize("a ! b").is_err());
    }

    #[test]
    fn test_statement_type_detection() {
        let detect = |sql: &str| StatementType::detect(&tokenize(sql).unwrap());
        assert_eq!(detect("CREATE TABLE t (a)"), Some(StatementType::CreateTable));
        assert_eq!(detect("create temp table t (a)"), Some(StatementType::CreateTable));
        assert_eq!(detect("CREATE TEMPORARY TABLE t (a)"), Some(StatementType::CreateTable));
        assert_eq!(detect("CREATE UNIQUE INDEX i ON t (a)"), Some(StatementType::CreateIndex));
        assert_eq!(detect("SELECT 1"), Some(StatementType::Select));
        assert_eq!(detect("DROP TABLE t"), Some(StatementType::DropTable));
        assert_eq!(detect("PRAGMA foo"), Some(StatementType::Pragma));
        assert_eq!(detect("CREATE UNIQUE TABLE t (a)"), None);
        assert_eq!(detect("CREATE TEMP UNIQUE INDEX i ON t (a)"), Some(StatementType::CreateIndex));
        assert_eq!(detect("FROBNICATE"), None);
        assert_eq!(detect(""), None);
    }
}
