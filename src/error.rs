//! Error types for storesql
//!
//! A single error enum covers tokenizing, parsing, schema compilation and the
//! storage engine. Every error maps onto a SQLite-style result code, and the
//! display form is `<CODE_NAME>: result code <N>: <detail>`.

use std::fmt;
use std::io;

/// Unified error type for storesql operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlError {
    /// Text the tokenizer could not match
    Lex { fragment: String, position: usize },
    /// SQL syntax error
    Syntax(String),
    /// Construct that parses but is not supported
    Unsupported(String),
    /// Schema-level error (table already exists, ...)
    Schema(String),
    /// Database could not be opened, or the connection is not open
    Open(String),
    /// Storage engine failure (version mismatch, missing store, I/O)
    Storage(String),
    /// Upgrade transaction failed to commit
    Commit(String),
}

/// Stable error classification, independent of the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Lex,
    Syntax,
    Unsupported,
    Schema,
    Open,
    Storage,
    Commit,
}

/// A named numeric result code, e.g. `SQLITE_ERROR` / 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultCode {
    pub name: &'static str,
    pub code: u16,
}

/// Result codes (subset used by this crate)
pub mod result_codes {
    use super::ResultCode;

    pub const SQLITE_ERROR: ResultCode = ResultCode { name: "SQLITE_ERROR", code: 1 };
    pub const SQLITE_ABORT: ResultCode = ResultCode { name: "SQLITE_ABORT", code: 4 };
    pub const SQLITE_IOERR: ResultCode = ResultCode { name: "SQLITE_IOERR", code: 10 };
    pub const SQLITE_CANTOPEN: ResultCode = ResultCode { name: "SQLITE_CANTOPEN", code: 14 };
}

impl SqlError {
    /// `near "<token>": syntax error`
    pub fn near(token: &str) -> Self {
        SqlError::Syntax(format!("near \"{}\": syntax error", token))
    }

    /// The token stream ended where more input was required
    pub fn incomplete_input() -> Self {
        SqlError::Syntax("incomplete input".to_string())
    }

    /// A keyword appeared where a join operator needed something else
    pub fn unknown_token(token: &str) -> Self {
        SqlError::Syntax(format!("Unknown token: {}", token))
    }

    /// A literal that looked like a token but is malformed (e.g. `X'1a2'`)
    pub fn unrecognized_token(literal: &str) -> Self {
        SqlError::Syntax(format!("unrecognized token: \"{}\"", literal))
    }

    pub fn not_implemented(what: &str) -> Self {
        SqlError::Unsupported(format!("not implemented: {}", what))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlError::Lex { .. } => ErrorKind::Lex,
            SqlError::Syntax(_) => ErrorKind::Syntax,
            SqlError::Unsupported(_) => ErrorKind::Unsupported,
            SqlError::Schema(_) => ErrorKind::Schema,
            SqlError::Open(_) => ErrorKind::Open,
            SqlError::Storage(_) => ErrorKind::Storage,
            SqlError::Commit(_) => ErrorKind::Commit,
        }
    }

    pub fn result_code(&self) -> ResultCode {
        match self.kind() {
            ErrorKind::Lex | ErrorKind::Syntax | ErrorKind::Unsupported | ErrorKind::Schema => {
                result_codes::SQLITE_ERROR
            }
            ErrorKind::Commit => result_codes::SQLITE_ABORT,
            ErrorKind::Storage => result_codes::SQLITE_IOERR,
            ErrorKind::Open => result_codes::SQLITE_CANTOPEN,
        }
    }

    /// The message without the result-code prefix
    pub fn detail(&self) -> String {
        match self {
            SqlError::Lex { fragment, .. } => format!("unrecognized token: \"{}\"", fragment),
            SqlError::Syntax(msg)
            | SqlError::Unsupported(msg)
            | SqlError::Schema(msg)
            | SqlError::Open(msg)
            | SqlError::Storage(msg)
            | SqlError::Commit(msg) => msg.clone(),
        }
    }

    /// Prefix the detail with statement context, keeping the kind
    pub fn with_context(self, context: &str) -> Self {
        let wrap = |msg: String| format!("{}: {}", context, msg);
        match self {
            SqlError::Lex { .. } => self,
            SqlError::Syntax(msg) => SqlError::Syntax(wrap(msg)),
            SqlError::Unsupported(msg) => SqlError::Unsupported(wrap(msg)),
            SqlError::Schema(msg) => SqlError::Schema(wrap(msg)),
            SqlError::Open(msg) => SqlError::Open(wrap(msg)),
            SqlError::Storage(msg) => SqlError::Storage(wrap(msg)),
            SqlError::Commit(msg) => SqlError::Commit(wrap(msg)),
        }
    }
}

impl fmt::Display for SqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.result_code();
        write!(f, "{}: result code {}: {}", code.name, code.code, self.detail())
    }
}

impl std::error::Error for SqlError {}

impl From<io::Error> for SqlError {
    fn from(e: io::Error) -> Self {
        SqlError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SqlError {
    fn from(e: serde_json::Error) -> Self {
        SqlError::Storage(e.to_string())
    }
}

/// Result type alias for storesql operations
pub type Result<T> = std::result::Result<T, SqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_error_display() {
        let err = SqlError::Lex { fragment: "#".into(), position: 22 };
        assert_eq!(err.to_string(), "SQLITE_ERROR: result code 1: unrecognized token: \"#\"");
        assert_eq!(err.kind(), ErrorKind::Lex);
    }

    #[test]
    fn test_syntax_error_detail() {
        let err = SqlError::near("*");
        assert_eq!(err.detail(), "near \"*\": syntax error");
        assert_eq!(err.result_code(), result_codes::SQLITE_ERROR);
    }

    #[test]
    fn test_commit_error_code() {
        let err = SqlError::Commit("disk full".into());
        assert_eq!(err.to_string(), "SQLITE_ABORT: result code 4: disk full");
    }

    #[test]
    fn test_with_context_keeps_kind() {
        let err = SqlError::Storage("index 'a' already exists".into()).with_context("CREATE TABLE t");
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.detail(), "CREATE TABLE t: index 'a' already exists");
    }

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: SqlError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().starts_with("SQLITE_IOERR: result code 10:"));
    }
}
