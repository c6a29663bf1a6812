use crate::error::Result;
use super::ast::*;
use super::{ParseResult, Parsed, Parser};

impl<'t> Parser<'t> {
    /// A table reference in FROM or a join:
    /// - `[schema.]name ( exp, ... ) [[AS] alias]` (table-valued function)
    /// - `[schema.]table [[AS] alias] [INDEXED BY index | NOT INDEXED]`
    /// - `( select ) [[AS] alias]`
    /// - `( join-clause )`, or a group when it only uses comma joins
    pub fn parse_table_or_subquery(&self, at: usize) -> ParseResult<TableOrSubquery> {
        let _guard = self.enter()?;
        if self.punct(at, "(") {
            return self.parse_parenthesized_source(at).map(Some);
        }

        let first = match self.identifier(at) {
            Some(name) => name,
            None => return Ok(None),
        };
        let (schema, name, i) = if self.punct(at + 1, ".") {
            let name = self.expect_identifier(at + 2)?;
            (Some(first), name.node, name.next)
        } else {
            (None, first, at + 1)
        };

        if self.punct(i, "(") {
            return self.parse_table_function(schema, name, i).map(Some);
        }

        let (alias, mut next) = self.parse_alias(i)?;
        let index_hint = if self.keywords(next, &["INDEXED", "BY"]) {
            let index = self.expect_identifier(next + 2)?;
            next = index.next;
            Some(IndexHint::IndexedBy(index.node))
        } else if self.keywords(next, &["NOT", "INDEXED"]) {
            next += 2;
            Some(IndexHint::NotIndexed)
        } else {
            None
        };

        Ok(Some(Parsed::new(
            TableOrSubquery::TableName { schema, table: name, alias, index_hint },
            next,
        )))
    }

    fn parse_table_function(
        &self,
        schema: Option<String>,
        name: String,
        open: usize,
    ) -> Result<Parsed<TableOrSubquery>> {
        let mut args = Vec::new();
        let mut i = open + 1;
        if self.punct(i, ")") {
            i += 1;
        } else {
            loop {
                let arg = self.expect_exp(i)?;
                args.push(arg.node);
                if self.punct(arg.next, ",") {
                    i = arg.next + 1;
                } else {
                    i = self.expect_punct(arg.next, ")")?;
                    break;
                }
            }
        }
        let (alias, next) = self.parse_alias(i)?;
        Ok(Parsed::new(TableOrSubquery::TableFunction { schema, name, args, alias }, next))
    }

    fn parse_parenthesized_source(&self, open: usize) -> Result<Parsed<TableOrSubquery>> {
        let inner = open + 1;
        if self.keyword(inner, "SELECT") {
            let select = self
                .parse_select(inner)?
                .ok_or_else(|| self.syntax_error(inner))?;
            let close = self.expect_punct(select.next, ")")?;
            let (alias, next) = self.parse_alias(close)?;
            return Ok(Parsed::new(
                TableOrSubquery::SelectQuery { select: Box::new(select.node), alias },
                next,
            ));
        }

        let clause = self
            .parse_join_clause(inner)?
            .ok_or_else(|| self.syntax_error(inner))?;
        let next = self.expect_punct(clause.next, ")")?;
        let clause = clause.node;

        let only_commas = clause.joins.iter().all(|j| {
            j.operator == JoinOperator::Comma && j.constraint == JoinConstraint::Empty
        });
        let source = if only_commas {
            let mut group = vec![clause.first];
            group.extend(clause.joins.into_iter().map(|j| j.table));
            TableOrSubquery::Group(group)
        } else {
            TableOrSubquery::JoinClauseQuery(Box::new(clause))
        };
        Ok(Parsed::new(source, next))
    }
}
