//! AST node types.
//!
//! Every node is an owned tree, immutable once built. Sum types are closed
//! enums so consumers match exhaustively.

/// Top-level SQL statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// CREATE TABLE statement
    CreateTable(CreateTableStmt),
    /// SELECT statement (parsed, not executed)
    Select(SelectStmt),
}

//=============================================================================
// Expressions
//=============================================================================

/// Literal value kinds. The time variants carry the wall-clock value
/// computed when the literal was parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    True,
    False,
    Null,
    Integer(i64),
    Real(f64),
    /// Hex digits of an `X'...'` literal
    Blob(String),
    CurrentTime(String),
    CurrentDate(String),
    CurrentTimestamp(String),
}

/// A column reference: `column`, `table.column` or `schema.table.column`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub column: String,
    pub table: Option<String>,
    pub schema: Option<String>,
}

impl ColumnRef {
    pub fn bare(column: impl Into<String>) -> Self {
        Self { column: column.into(), table: None, schema: None }
    }

    pub fn is_qualified(&self) -> bool {
        self.table.is_some() || self.schema.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
    Plus,
    BitwiseNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOperator {
    And,
    Or,
    ShiftLeft,
    ShiftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Right-hand side of a pattern match, tagged with the operator
#[derive(Debug, Clone, PartialEq)]
pub enum SubExp {
    Like(Box<Exp>),
    Glob(Box<Exp>),
    Match(Box<Exp>),
    Regexp(Box<Exp>),
}

/// Spelling of a null test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullForm {
    /// `x ISNULL`
    IsNull,
    /// `x NOTNULL`
    NotNull,
    /// `x NOT NULL`
    NotNullSpaced,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    pub exp: Box<Exp>,
}

/// `OVER name` or `OVER ( ... )`. Ordering terms and the frame spec are
/// kept as raw text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverClause {
    pub window_name: Option<String>,
    pub partition_by: Vec<Exp>,
    pub order_by: Vec<String>,
    pub frame: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// Raw source text of each top-level argument
    pub arguments: Vec<String>,
    pub filter: Option<FilterClause>,
    pub over: Option<OverClause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InTarget {
    List(Vec<Exp>),
    Select(Box<SelectStmt>),
    Table { schema: Option<String>, name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RaiseFunction {
    Ignore,
    Rollback(String),
    Abort(String),
    Fail(String),
}

/// SQL expression
#[derive(Debug, Clone, PartialEq)]
pub enum Exp {
    Literal(DataType),
    /// Raw text: `?`, `?1`, `:name`, `@name`, `$name`
    BindParameter(String),
    Column(ColumnRef),
    Unary {
        operator: UnaryOperator,
        operand: Box<Exp>,
    },
    Binary {
        left: Box<Exp>,
        operator: BitwiseOperator,
        right: Box<Exp>,
    },
    Comparison {
        left: Box<Exp>,
        operator: ComparisonOperator,
        right: Box<Exp>,
    },
    Logical {
        left: Box<Exp>,
        operator: LogicalOperator,
        right: Box<Exp>,
    },
    FunctionCall(FunctionCall),
    ExpressionList(Vec<Exp>),
    Subquery(Box<SelectStmt>),
    Cast {
        operand: Box<Exp>,
        target_type: String,
    },
    Collate {
        operand: Box<Exp>,
        collation: String,
    },
    PatternMatching {
        left: Box<Exp>,
        operand: SubExp,
        negated: bool,
        escape: Option<Box<Exp>>,
    },
    Null {
        operand: Box<Exp>,
        form: NullForm,
    },
    Is {
        left: Box<Exp>,
        right: Box<Exp>,
        negated: bool,
        distinct_from: bool,
    },
    Between {
        operand: Box<Exp>,
        negated: bool,
        low: Box<Exp>,
        high: Box<Exp>,
    },
    In {
        operand: Box<Exp>,
        negated: bool,
        target: InTarget,
    },
    Exists {
        negated: bool,
        select: Box<SelectStmt>,
    },
    Case {
        base: Option<Box<Exp>>,
        branches: Vec<(Exp, Exp)>,
        otherwise: Option<Box<Exp>>,
    },
    Raise(RaiseFunction),
}

//=============================================================================
// Joins, table references, result columns
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOperator {
    /// `,`
    Comma,
    /// `[NATURAL] JOIN`
    Empty { natural: bool },
    /// `[NATURAL] INNER JOIN`
    Inner { natural: bool },
    /// `CROSS JOIN`
    Cross,
    Left { natural: bool, outer: bool },
    Right { natural: bool, outer: bool },
    Full { natural: bool, outer: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    Empty,
    On(Exp),
    Using(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexHint {
    IndexedBy(String),
    NotIndexed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableOrSubquery {
    TableName {
        schema: Option<String>,
        table: String,
        alias: Option<String>,
        index_hint: Option<IndexHint>,
    },
    TableFunction {
        schema: Option<String>,
        name: String,
        args: Vec<Exp>,
        alias: Option<String>,
    },
    SelectQuery {
        select: Box<SelectStmt>,
        alias: Option<String>,
    },
    JoinClauseQuery(Box<JoinClause>),
    Group(Vec<TableOrSubquery>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub operator: JoinOperator,
    pub table: TableOrSubquery,
    pub constraint: JoinConstraint,
}

/// `table-or-subquery (join-operator table-or-subquery join-constraint)*`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub first: TableOrSubquery,
    pub joins: Vec<Join>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResultColumn {
    Exp { exp: Exp, alias: Option<String> },
    /// `*` or `table.*`
    Star { table: Option<String> },
}

//=============================================================================
// SELECT
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderingTerm {
    pub exp: Exp,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Limit {
    pub count: Exp,
    pub offset: Option<Exp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStmt {
    pub distinct: bool,
    pub columns: Vec<ResultColumn>,
    pub from: Option<JoinClause>,
    pub where_clause: Option<Exp>,
    pub group_by: Vec<Exp>,
    pub having: Option<Exp>,
    pub order_by: Vec<OrderingTerm>,
    pub limit: Option<Limit>,
}

//=============================================================================
// CREATE TABLE
//=============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictClause {
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAction {
    SetNull,
    SetDefault,
    Cascade,
    Restrict,
    NoAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initially {
    Deferred,
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForeignKeyAction {
    OnDelete(ReferenceAction),
    OnUpdate(ReferenceAction),
    Match(String),
    Deferrable { not: bool, initially: Option<Initially> },
}

/// `REFERENCES table [(col, ...)] action*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyClause {
    pub foreign_table: String,
    pub columns: Vec<String>,
    pub actions: Vec<ForeignKeyAction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratedStorage {
    Stored,
    Virtual,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnConstraintKind {
    PrimaryKey {
        order: Option<SortOrder>,
        conflict: Option<ConflictClause>,
        autoincrement: bool,
    },
    NotNull { conflict: Option<ConflictClause> },
    /// Explicit `NULL`
    Null,
    Unique { conflict: Option<ConflictClause> },
    Check(Exp),
    Default(Exp),
    Collate(String),
    ForeignKey(ForeignKeyClause),
    Generated {
        exp: Exp,
        always: bool,
        storage: Option<GeneratedStorage>,
    },
    /// Standalone `AUTO_INCREMENT` / `AUTOINCREMENT`
    AutoIncrement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConstraint {
    /// `CONSTRAINT name` prefix
    pub name: Option<String>,
    pub kind: ColumnConstraintKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub type_name: Option<String>,
    pub constraints: Vec<ColumnConstraint>,
}

impl ColumnDef {
    /// The column's PRIMARY KEY constraint, if any
    pub fn primary_key(&self) -> Option<&ColumnConstraintKind> {
        self.constraints
            .iter()
            .map(|c| &c.kind)
            .find(|k| matches!(k, ColumnConstraintKind::PrimaryKey { .. }))
    }

    /// True if the column asks for an auto-incrementing key, either on its
    /// PRIMARY KEY constraint or as a standalone constraint
    pub fn is_auto_increment(&self) -> bool {
        self.constraints.iter().any(|c| {
            matches!(
                c.kind,
                ColumnConstraintKind::AutoIncrement
                    | ColumnConstraintKind::PrimaryKey { autoincrement: true, .. }
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableConstraintKind {
    PrimaryKey { columns: Vec<String>, conflict: Option<ConflictClause> },
    Unique { columns: Vec<String>, conflict: Option<ConflictClause> },
    Check(Exp),
    ForeignKey { columns: Vec<String>, clause: ForeignKeyClause },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableConstraint {
    pub name: Option<String>,
    pub kind: TableConstraintKind,
}

/// Table name: plain identifier or `schema.name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityName {
    Identifier(String),
    Member { schema: String, name: String },
}

/// One entry of the parenthesized CREATE TABLE body
#[derive(Debug, Clone, PartialEq)]
pub enum TableElement {
    Column(ColumnDef),
    Constraint(TableConstraint),
    /// `LIKE other_table`
    Like(EntityName),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableOption {
    WithoutRowid,
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateTableBody {
    Columns {
        columns: Vec<TableElement>,
        options: Vec<TableOption>,
    },
    AsSelect(Box<SelectStmt>),
}

/// CREATE TABLE statement
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStmt {
    pub temporary: bool,
    pub if_not_exists: bool,
    pub name: EntityName,
    pub body: CreateTableBody,
}

impl CreateTableStmt {
    /// Column definitions in declaration order
    pub fn column_defs(&self) -> Vec<&ColumnDef> {
        match &self.body {
            CreateTableBody::Columns { columns, .. } => columns
                .iter()
                .filter_map(|e| match e {
                    TableElement::Column(def) => Some(def),
                    _ => None,
                })
                .collect(),
            CreateTableBody::AsSelect(_) => Vec::new(),
        }
    }
}
