use crate::error::{Result, SqlError};
use super::ast::*;
use super::{ParseResult, Parsed, Parser};

impl<'t> Parser<'t> {
    /// A result column: `table.*`, `exp [[AS] alias]` or `*`
    pub fn parse_result_column(&self, at: usize) -> ParseResult<ResultColumn> {
        if let Some(exp) = self.parse_exp(at)? {
            if let Exp::Column(column) = &exp.node {
                if self.punct(exp.next, ".") && self.punct(exp.next + 1, "*") {
                    if column.is_qualified() {
                        return Err(SqlError::near("*"));
                    }
                    return Ok(Some(Parsed::new(
                        ResultColumn::Star { table: Some(column.column.clone()) },
                        exp.next + 2,
                    )));
                }
            }
            let (alias, next) = self.parse_alias(exp.next)?;
            return Ok(Some(Parsed::new(ResultColumn::Exp { exp: exp.node, alias }, next)));
        }
        if self.punct(at, "*") {
            return Ok(Some(Parsed::new(ResultColumn::Star { table: None }, at + 1)));
        }
        Ok(None)
    }

    /// SELECT [DISTINCT|ALL] columns [FROM ...] [WHERE ...] [GROUP BY ... [HAVING ...]]
    /// [ORDER BY ...] [LIMIT n [OFFSET m]]
    pub fn parse_select(&self, at: usize) -> ParseResult<SelectStmt> {
        if !self.keyword(at, "SELECT") {
            return Ok(None);
        }
        let _guard = self.enter()?;

        let mut i = at + 1;
        let distinct = self.keyword(i, "DISTINCT");
        if distinct || self.keyword(i, "ALL") {
            i += 1;
        }

        let mut columns = Vec::new();
        loop {
            let column = self
                .parse_result_column(i)?
                .ok_or_else(|| self.syntax_error(i))?;
            columns.push(column.node);
            i = column.next;
            if !self.punct(i, ",") {
                break;
            }
            i += 1;
        }

        let from = if self.keyword(i, "FROM") {
            let clause = self
                .parse_join_clause(i + 1)?
                .ok_or_else(|| self.syntax_error(i + 1))?;
            i = clause.next;
            Some(clause.node)
        } else {
            None
        };

        let where_clause = if self.keyword(i, "WHERE") {
            let exp = self.expect_exp(i + 1)?;
            i = exp.next;
            Some(exp.node)
        } else {
            None
        };

        let mut group_by = Vec::new();
        let mut having = None;
        if self.keyword(i, "GROUP") {
            let list = self.parse_exp_list(self.expect_keyword(i + 1, "BY")?)?;
            group_by = list.node;
            i = list.next;
            if self.keyword(i, "HAVING") {
                let exp = self.expect_exp(i + 1)?;
                i = exp.next;
                having = Some(exp.node);
            }
        }

        let mut order_by = Vec::new();
        if self.keyword(i, "ORDER") {
            i = self.expect_keyword(i + 1, "BY")?;
            loop {
                let exp = self.expect_exp(i)?;
                i = exp.next;
                let order = if self.keyword(i, "ASC") {
                    i += 1;
                    Some(SortOrder::Asc)
                } else if self.keyword(i, "DESC") {
                    i += 1;
                    Some(SortOrder::Desc)
                } else {
                    None
                };
                order_by.push(OrderingTerm { exp: exp.node, order });
                if !self.punct(i, ",") {
                    break;
                }
                i += 1;
            }
        }

        let limit = if self.keyword(i, "LIMIT") {
            let count = self.expect_exp(i + 1)?;
            i = count.next;
            if self.keyword(i, "OFFSET") {
                let offset = self.expect_exp(i + 1)?;
                i = offset.next;
                Some(Limit { count: count.node, offset: Some(offset.node) })
            } else if self.punct(i, ",") {
                // LIMIT offset, count
                let second = self.expect_exp(i + 1)?;
                i = second.next;
                Some(Limit { count: second.node, offset: Some(count.node) })
            } else {
                Some(Limit { count: count.node, offset: None })
            }
        } else {
            None
        };

        Ok(Some(Parsed::new(
            SelectStmt {
                distinct,
                columns,
                from,
                where_clause,
                group_by,
                having,
                order_by,
                limit,
            },
            i,
        )))
    }

    /// `exp [, exp]*`
    fn parse_exp_list(&self, at: usize) -> Result<Parsed<Vec<Exp>>> {
        let mut items = Vec::new();
        let mut i = at;
        loop {
            let exp = self.expect_exp(i)?;
            items.push(exp.node);
            i = exp.next;
            if !self.punct(i, ",") {
                return Ok(Parsed::new(items, i));
            }
            i += 1;
        }
    }
}
