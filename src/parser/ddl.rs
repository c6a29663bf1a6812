use crate::error::Result;
use super::ast::*;
use super::{ParseResult, Parsed, Parser};

impl<'t> Parser<'t> {
    //=========================================================================
    // CREATE TABLE
    //=========================================================================

    /// CREATE [TEMP|TEMPORARY] TABLE [IF NOT EXISTS] [schema.]name
    ///   ( element [, element]* ) [table-option [, table-option]*]
    /// | AS select
    pub(super) fn parse_create_table(&self, at: usize) -> ParseResult<CreateTableStmt> {
        if !self.keyword(at, "CREATE") {
            return Ok(None);
        }
        let mut i = at + 1;
        let temporary = self.keyword(i, "TEMP") || self.keyword(i, "TEMPORARY");
        if temporary {
            i += 1;
        }
        if !self.keyword(i, "TABLE") {
            return Ok(None);
        }
        i += 1;

        let if_not_exists = self.keywords(i, &["IF", "NOT", "EXISTS"]);
        if if_not_exists {
            i += 3;
        }

        let name = self
            .parse_entity_name(i)?
            .ok_or_else(|| self.syntax_error(i))?;
        i = name.next;

        if self.keyword(i, "AS") {
            let select = self
                .parse_select(i + 1)?
                .ok_or_else(|| self.syntax_error(i + 1))?;
            return Ok(Some(Parsed::new(
                CreateTableStmt {
                    temporary,
                    if_not_exists,
                    name: name.node,
                    body: CreateTableBody::AsSelect(Box::new(select.node)),
                },
                select.next,
            )));
        }

        i = self.expect_punct(i, "(")?;
        let mut columns = Vec::new();
        loop {
            let element = self.parse_table_element(i)?;
            columns.push(element.node);
            i = element.next;
            if self.punct(i, ",") {
                i += 1;
            } else {
                i = self.expect_punct(i, ")")?;
                break;
            }
        }

        let mut options = Vec::new();
        loop {
            if self.keywords(i, &["WITHOUT", "ROWID"]) {
                options.push(TableOption::WithoutRowid);
                i += 2;
            } else if self.keyword(i, "STRICT") {
                options.push(TableOption::Strict);
                i += 1;
            } else {
                break;
            }
            if !self.punct(i, ",") {
                break;
            }
            i += 1;
        }

        Ok(Some(Parsed::new(
            CreateTableStmt {
                temporary,
                if_not_exists,
                name: name.node,
                body: CreateTableBody::Columns { columns, options },
            },
            i,
        )))
    }

    /// `name` or `schema.name`
    fn parse_entity_name(&self, at: usize) -> ParseResult<EntityName> {
        let first = match self.identifier(at) {
            Some(name) => name,
            None => return Ok(None),
        };
        if self.punct(at + 1, ".") {
            let name = self.expect_identifier(at + 2)?;
            return Ok(Some(Parsed::new(
                EntityName::Member { schema: first, name: name.node },
                name.next,
            )));
        }
        Ok(Some(Parsed::new(EntityName::Identifier(first), at + 1)))
    }

    fn parse_table_element(&self, at: usize) -> Result<Parsed<TableElement>> {
        if let Some(constraint) = self.parse_table_constraint(at)? {
            return Ok(constraint.map(TableElement::Constraint));
        }
        if self.keyword(at, "LIKE") {
            let name = self
                .parse_entity_name(at + 1)?
                .ok_or_else(|| self.syntax_error(at + 1))?;
            return Ok(name.map(TableElement::Like));
        }
        match self.parse_column_def(at)? {
            Some(def) => Ok(def.map(TableElement::Column)),
            None => Err(self.syntax_error(at)),
        }
    }

    //=========================================================================
    // Column definitions
    //=========================================================================

    /// `name [type-name] column-constraint*`
    pub fn parse_column_def(&self, at: usize) -> ParseResult<ColumnDef> {
        let name = match self.identifier(at) {
            Some(name) => name,
            None => return Ok(None),
        };
        let mut i = at + 1;

        let type_name = match self.parse_type_name(i)? {
            Some(t) => {
                i = t.next;
                Some(t.node)
            }
            None => None,
        };

        let mut constraints = Vec::new();
        while let Some(constraint) = self.parse_column_constraint(i)? {
            constraints.push(constraint.node);
            i = constraint.next;
        }

        Ok(Some(Parsed::new(ColumnDef { name, type_name, constraints }, i)))
    }

    /// One or more words plus an optional `( n [, m] )`, e.g. `VARCHAR(100)`
    /// or `UNSIGNED BIG INT`
    pub(super) fn parse_type_name(&self, at: usize) -> ParseResult<String> {
        let mut words = Vec::new();
        let mut i = at;
        while let Some(word) = self.identifier(i) {
            words.push(word);
            i += 1;
        }
        if words.is_empty() {
            return Ok(None);
        }
        let mut name = words.join(" ");

        if self.punct(i, "(") {
            let first = self
                .parse_signed_number(i + 1)
                .ok_or_else(|| self.syntax_error(i + 1))?;
            let mut sizes = vec![first.node];
            i = first.next;
            if self.punct(i, ",") {
                let second = self
                    .parse_signed_number(i + 1)
                    .ok_or_else(|| self.syntax_error(i + 1))?;
                sizes.push(second.node);
                i = second.next;
            }
            i = self.expect_punct(i, ")")?;
            name = format!("{}({})", name, sizes.join(","));
        }

        Ok(Some(Parsed::new(name, i)))
    }

    /// `[+|-] number`
    fn parse_signed_number(&self, at: usize) -> Option<Parsed<String>> {
        let (sign, i) = match self.value(at)? {
            s @ ("+" | "-") => (s, at + 1),
            _ => ("", at),
        };
        let number = self.value(i)?;
        if number.starts_with(|c: char| c.is_ascii_digit()) {
            Some(Parsed::new(format!("{}{}", sign, number), i + 1))
        } else {
            None
        }
    }

    /// `[CONSTRAINT name] constraint-body`
    fn parse_column_constraint(&self, at: usize) -> ParseResult<ColumnConstraint> {
        let (name, i) = if self.keyword(at, "CONSTRAINT") {
            let name = self.expect_identifier(at + 1)?;
            (Some(name.node), name.next)
        } else {
            (None, at)
        };

        let keyword = self.value(i).map(|v| v.to_ascii_uppercase());
        let (kind, next) = match keyword.as_deref() {
            Some("PRIMARY") => {
                let mut j = self.expect_keyword(i + 1, "KEY")?;
                let order = if self.keyword(j, "ASC") {
                    j += 1;
                    Some(SortOrder::Asc)
                } else if self.keyword(j, "DESC") {
                    j += 1;
                    Some(SortOrder::Desc)
                } else {
                    None
                };
                let (conflict, mut j) = self.parse_conflict_clause(j)?;
                let autoincrement = self.keyword(j, "AUTOINCREMENT") || self.keyword(j, "AUTO_INCREMENT");
                if autoincrement {
                    j += 1;
                }
                (ColumnConstraintKind::PrimaryKey { order, conflict, autoincrement }, j)
            }
            Some("NOT") => {
                let j = self.expect_keyword(i + 1, "NULL")?;
                let (conflict, j) = self.parse_conflict_clause(j)?;
                (ColumnConstraintKind::NotNull { conflict }, j)
            }
            Some("NULL") => (ColumnConstraintKind::Null, i + 1),
            Some("UNIQUE") => {
                let (conflict, j) = self.parse_conflict_clause(i + 1)?;
                (ColumnConstraintKind::Unique { conflict }, j)
            }
            Some("CHECK") => {
                let open = self.expect_punct(i + 1, "(")?;
                let exp = self.expect_exp(open)?;
                let close = self.expect_punct(exp.next, ")")?;
                (ColumnConstraintKind::Check(exp.node), close)
            }
            Some("DEFAULT") => {
                let value = self.parse_default_value(i + 1)?;
                (ColumnConstraintKind::Default(value.node), value.next)
            }
            Some("COLLATE") => {
                let collation = self.expect_identifier(i + 1)?;
                (ColumnConstraintKind::Collate(collation.node), collation.next)
            }
            Some("REFERENCES") => {
                let clause = self
                    .parse_foreign_key_clause(i)?
                    .ok_or_else(|| self.syntax_error(i))?;
                (ColumnConstraintKind::ForeignKey(clause.node), clause.next)
            }
            Some("GENERATED") => {
                let j = self.expect_keyword(i + 1, "ALWAYS")?;
                let j = self.expect_keyword(j, "AS")?;
                self.parse_generated(j, true)?
            }
            Some("AS") => self.parse_generated(i + 1, false)?,
            Some("AUTOINCREMENT") | Some("AUTO_INCREMENT") => {
                (ColumnConstraintKind::AutoIncrement, i + 1)
            }
            _ if name.is_some() => return Err(self.syntax_error(i)),
            _ => return Ok(None),
        };

        Ok(Some(Parsed::new(ColumnConstraint { name, kind }, next)))
    }

    /// `( exp ) [STORED|VIRTUAL]`, starting after `AS`
    fn parse_generated(&self, at: usize, always: bool) -> Result<(ColumnConstraintKind, usize)> {
        let open = self.expect_punct(at, "(")?;
        let exp = self.expect_exp(open)?;
        let mut next = self.expect_punct(exp.next, ")")?;
        let storage = if self.keyword(next, "STORED") {
            next += 1;
            Some(GeneratedStorage::Stored)
        } else if self.keyword(next, "VIRTUAL") {
            next += 1;
            Some(GeneratedStorage::Virtual)
        } else {
            None
        };
        Ok((ColumnConstraintKind::Generated { exp: exp.node, always, storage }, next))
    }

    /// `( exp )`, a signed number, or a literal value
    fn parse_default_value(&self, at: usize) -> Result<Parsed<Exp>> {
        if self.punct(at, "(") {
            let exp = self.expect_exp(at + 1)?;
            let next = self.expect_punct(exp.next, ")")?;
            return Ok(Parsed::new(exp.node, next));
        }
        let sign = match self.value(at) {
            Some("-") => Some(UnaryOperator::Minus),
            Some("+") => Some(UnaryOperator::Plus),
            _ => None,
        };
        let literal_at = if sign.is_some() { at + 1 } else { at };
        let literal = self
            .parse_literal(literal_at)?
            .ok_or_else(|| self.syntax_error(literal_at))?;
        Ok(match sign {
            Some(operator) => literal.map(|operand| Exp::Unary { operator, operand: Box::new(operand) }),
            None => literal,
        })
    }

    /// `ON CONFLICT ROLLBACK|ABORT|FAIL|IGNORE|REPLACE`
    fn parse_conflict_clause(&self, at: usize) -> Result<(Option<ConflictClause>, usize)> {
        if !self.keywords(at, &["ON", "CONFLICT"]) {
            return Ok((None, at));
        }
        let resolution = match self.value(at + 2).map(|v| v.to_ascii_uppercase()).as_deref() {
            Some("ROLLBACK") => ConflictClause::Rollback,
            Some("ABORT") => ConflictClause::Abort,
            Some("FAIL") => ConflictClause::Fail,
            Some("IGNORE") => ConflictClause::Ignore,
            Some("REPLACE") => ConflictClause::Replace,
            _ => return Err(self.syntax_error(at + 2)),
        };
        Ok((Some(resolution), at + 3))
    }

    //=========================================================================
    // Foreign keys and table constraints
    //=========================================================================

    /// `REFERENCES table [( column, ... )] action*`
    pub fn parse_foreign_key_clause(&self, at: usize) -> ParseResult<ForeignKeyClause> {
        if !self.keyword(at, "REFERENCES") {
            return Ok(None);
        }
        let table = self.expect_identifier(at + 1)?;
        let mut i = table.next;
        let columns = if self.punct(i, "(") {
            let list = self.parse_name_list(i)?;
            i = list.next;
            list.node
        } else {
            Vec::new()
        };

        let mut actions = Vec::new();
        loop {
            if self.keyword(i, "ON") && (self.keyword(i + 1, "DELETE") || self.keyword(i + 1, "UPDATE")) {
                let on_delete = self.keyword(i + 1, "DELETE");
                let (action, next) = self.parse_reference_action(i + 2)?;
                actions.push(if on_delete {
                    ForeignKeyAction::OnDelete(action)
                } else {
                    ForeignKeyAction::OnUpdate(action)
                });
                i = next;
            } else if self.keyword(i, "MATCH") {
                let name = self.expect_identifier(i + 1)?;
                actions.push(ForeignKeyAction::Match(name.node));
                i = name.next;
            } else if self.keyword(i, "DEFERRABLE") || self.keywords(i, &["NOT", "DEFERRABLE"]) {
                let not = self.keyword(i, "NOT");
                i += if not { 2 } else { 1 };
                let initially = if self.keyword(i, "INITIALLY") {
                    let initially = if self.keyword(i + 1, "DEFERRED") {
                        Initially::Deferred
                    } else if self.keyword(i + 1, "IMMEDIATE") {
                        Initially::Immediate
                    } else {
                        return Err(self.syntax_error(i + 1));
                    };
                    i += 2;
                    Some(initially)
                } else {
                    None
                };
                actions.push(ForeignKeyAction::Deferrable { not, initially });
            } else {
                break;
            }
        }

        Ok(Some(Parsed::new(
            ForeignKeyClause { foreign_table: table.node, columns, actions },
            i,
        )))
    }

    fn parse_reference_action(&self, at: usize) -> Result<(ReferenceAction, usize)> {
        if self.keywords(at, &["SET", "NULL"]) {
            Ok((ReferenceAction::SetNull, at + 2))
        } else if self.keywords(at, &["SET", "DEFAULT"]) {
            Ok((ReferenceAction::SetDefault, at + 2))
        } else if self.keyword(at, "CASCADE") {
            Ok((ReferenceAction::Cascade, at + 1))
        } else if self.keyword(at, "RESTRICT") {
            Ok((ReferenceAction::Restrict, at + 1))
        } else if self.keywords(at, &["NO", "ACTION"]) {
            Ok((ReferenceAction::NoAction, at + 2))
        } else {
            Err(self.syntax_error(at))
        }
    }

    /// `[CONSTRAINT name]` followed by `PRIMARY KEY (...)`, `UNIQUE (...)`,
    /// `CHECK (exp)` or `FOREIGN KEY (...) foreign-key-clause`
    pub fn parse_table_constraint(&self, at: usize) -> ParseResult<TableConstraint> {
        let (name, i) = if self.keyword(at, "CONSTRAINT") {
            let name = self.expect_identifier(at + 1)?;
            (Some(name.node), name.next)
        } else {
            (None, at)
        };

        let (kind, next) = if self.keyword(i, "PRIMARY") {
            let j = self.expect_keyword(i + 1, "KEY")?;
            let columns = self.parse_indexed_columns(j)?;
            let (conflict, next) = self.parse_conflict_clause(columns.next)?;
            (TableConstraintKind::PrimaryKey { columns: columns.node, conflict }, next)
        } else if self.keyword(i, "UNIQUE") {
            let columns = self.parse_indexed_columns(i + 1)?;
            let (conflict, next) = self.parse_conflict_clause(columns.next)?;
            (TableConstraintKind::Unique { columns: columns.node, conflict }, next)
        } else if self.keyword(i, "CHECK") {
            let open = self.expect_punct(i + 1, "(")?;
            let exp = self.expect_exp(open)?;
            let next = self.expect_punct(exp.next, ")")?;
            (TableConstraintKind::Check(exp.node), next)
        } else if self.keyword(i, "FOREIGN") {
            let j = self.expect_keyword(i + 1, "KEY")?;
            let columns = self.parse_name_list(j)?;
            let clause = self
                .parse_foreign_key_clause(columns.next)?
                .ok_or_else(|| self.syntax_error(columns.next))?;
            (TableConstraintKind::ForeignKey { columns: columns.node, clause: clause.node }, clause.next)
        } else if name.is_some() {
            return Err(self.syntax_error(i));
        } else {
            return Ok(None);
        };

        Ok(Some(Parsed::new(TableConstraint { name, kind }, next)))
    }

    /// `( column [COLLATE name] [ASC|DESC], ... )`; only the names are kept
    fn parse_indexed_columns(&self, at: usize) -> Result<Parsed<Vec<String>>> {
        let mut i = self.expect_punct(at, "(")?;
        let mut columns = Vec::new();
        loop {
            let column = self.expect_identifier(i)?;
            columns.push(column.node);
            i = column.next;
            if self.keyword(i, "COLLATE") {
                i = self.expect_identifier(i + 1)?.next;
            }
            if self.keyword(i, "ASC") || self.keyword(i, "DESC") {
                i += 1;
            }
            if self.punct(i, ",") {
                i += 1;
            } else {
                let next = self.expect_punct(i, ")")?;
                return Ok(Parsed::new(columns, next));
            }
        }
    }
}
