use crate::error::{Result, SqlError};
use super::ast::*;
use super::{ParseResult, Parsed, Parser};

impl<'t> Parser<'t> {
    /// Join operators:
    /// - `,`
    /// - `CROSS JOIN`
    /// - `[NATURAL] JOIN`
    /// - `[NATURAL] INNER JOIN`
    /// - `[NATURAL] LEFT|RIGHT|FULL [OUTER] JOIN`
    ///
    /// A token that cannot start a join operator is no match. Once a join
    /// keyword has been seen, anything but the expected continuation is an
    /// `Unknown token` error.
    pub fn parse_join_operator(&self, at: usize) -> ParseResult<JoinOperator> {
        let token = match self.token(at) {
            Some(t) => t,
            None => return Ok(None),
        };
        if token.value == "," {
            return Ok(Some(Parsed::new(JoinOperator::Comma, at + 1)));
        }
        if token.is_keyword("CROSS") {
            let next = self.require_join(at + 1)?;
            return Ok(Some(Parsed::new(JoinOperator::Cross, next)));
        }

        let natural = token.is_keyword("NATURAL");
        let i = if natural { at + 1 } else { at };
        let keyword = match self.value(i) {
            Some(v) => v.to_ascii_uppercase(),
            None if natural => return Err(SqlError::incomplete_input()),
            None => return Ok(None),
        };

        let (operator, next) = match keyword.as_str() {
            "JOIN" => (JoinOperator::Empty { natural }, i + 1),
            "INNER" => {
                if self.keyword(i + 1, "OUTER") {
                    return Err(SqlError::Syntax("OUTER not supported in Inner Query".to_string()));
                }
                (JoinOperator::Inner { natural }, self.require_join(i + 1)?)
            }
            "LEFT" | "RIGHT" | "FULL" => {
                let outer = self.keyword(i + 1, "OUTER");
                let join_at = if outer { i + 2 } else { i + 1 };
                let next = self.require_join(join_at)?;
                let operator = match keyword.as_str() {
                    "LEFT" => JoinOperator::Left { natural, outer },
                    "RIGHT" => JoinOperator::Right { natural, outer },
                    _ => JoinOperator::Full { natural, outer },
                };
                (operator, next)
            }
            _ if natural => return Err(SqlError::unknown_token(&self.tokens[i].value)),
            _ => return Ok(None),
        };
        Ok(Some(Parsed::new(operator, next)))
    }

    fn require_join(&self, at: usize) -> Result<usize> {
        match self.token(at) {
            Some(t) if t.is_keyword("JOIN") => Ok(at + 1),
            Some(t) => Err(SqlError::unknown_token(&t.value)),
            None => Err(SqlError::incomplete_input()),
        }
    }

    /// `ON exp` or `USING ( column [, column]* )`
    pub fn parse_join_constraint(&self, at: usize) -> ParseResult<JoinConstraint> {
        if self.keyword(at, "ON") {
            let exp = self.expect_exp(at + 1)?;
            return Ok(Some(exp.map(JoinConstraint::On)));
        }
        if self.keyword(at, "USING") {
            let columns = self.parse_name_list(at + 1)?;
            return Ok(Some(columns.map(JoinConstraint::Using)));
        }
        Ok(None)
    }

    /// `table-or-subquery (join-operator table-or-subquery [join-constraint])*`
    pub fn parse_join_clause(&self, at: usize) -> ParseResult<JoinClause> {
        let first = match self.parse_table_or_subquery(at)? {
            Some(first) => first,
            None => return Ok(None),
        };

        let mut next = first.next;
        let mut joins = Vec::new();
        while let Some(operator) = self.parse_join_operator(next)? {
            let table = self
                .parse_table_or_subquery(operator.next)?
                .ok_or_else(|| self.syntax_error(operator.next))?;
            let (constraint, after) = match self.parse_join_constraint(table.next)? {
                Some(c) => (c.node, c.next),
                None => (JoinConstraint::Empty, table.next),
            };
            joins.push(Join {
                operator: operator.node,
                table: table.node,
                constraint,
            });
            next = after;
        }

        Ok(Some(Parsed::new(JoinClause { first: first.node, joins }, next)))
    }
}
