use chrono::Utc;

use crate::error::{Result, SqlError};
use super::ast::*;
use super::utils::strip_quotes;
use super::{Dialect, ParseResult, Parsed, Parser};

/// Keywords that may open a window frame inside OVER ( ... )
const FRAME_KEYWORDS: [&str; 3] = ["RANGE", "ROWS", "GROUPS"];

impl<'t> Parser<'t> {
    //=========================================================================
    // Entry point
    //=========================================================================

    /// Parse an expression: a primary operand followed by at most one
    /// suffix. Binary suffixes recurse into `parse_exp` for their right
    /// side, so operators associate to the right without precedence.
    pub fn parse_exp(&self, at: usize) -> ParseResult<Exp> {
        let _guard = self.enter()?;
        match self.parse_operand(at)? {
            Some(operand) => self.parse_suffix(operand).map(Some),
            None => Ok(None),
        }
    }

    /// Like `parse_exp`, but a missing expression is a syntax error
    pub(super) fn expect_exp(&self, at: usize) -> Result<Parsed<Exp>> {
        self.parse_exp(at)?.ok_or_else(|| self.syntax_error(at))
    }

    /// Primary operand, tried in a fixed order
    pub(super) fn parse_operand(&self, at: usize) -> ParseResult<Exp> {
        if self.is_end(at) {
            return Ok(None);
        }
        if let Some(p) = self.parse_literal(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_bind_parameter(at) {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_cast(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_exists(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_case(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_raise(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_function_call(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_expression_list(at)? {
            return Ok(Some(p));
        }
        if let Some(p) = self.parse_column_ref(at) {
            return Ok(Some(p.map(Exp::Column)));
        }
        self.parse_unary(at)
    }

    fn parse_suffix(&self, operand: Parsed<Exp>) -> Result<Parsed<Exp>> {
        let Parsed { node: left, next } = operand;
        let suffixes: [fn(&Self, &Exp, usize) -> ParseResult<Exp>; 9] = [
            Self::parse_bitwise,
            Self::parse_collate,
            Self::parse_pattern,
            Self::parse_null_test,
            Self::parse_is,
            Self::parse_between,
            Self::parse_in,
            Self::parse_comparison,
            Self::parse_logical,
        ];
        for suffix in suffixes {
            if let Some(p) = suffix(self, &left, next)? {
                return Ok(p);
            }
        }
        Ok(Parsed::new(left, next))
    }

    //=========================================================================
    // Primary operands
    //=========================================================================

    pub(super) fn parse_literal(&self, at: usize) -> ParseResult<Exp> {
        let value = match self.value(at) {
            Some(v) => v,
            None => return Ok(None),
        };
        let literal = match value.to_ascii_uppercase().as_str() {
            "NULL" => DataType::Null,
            "TRUE" => DataType::True,
            "FALSE" => DataType::False,
            "CURRENT_TIME" => DataType::CurrentTime(Utc::now().format("%H:%M:%S").to_string()),
            "CURRENT_DATE" => DataType::CurrentDate(Utc::now().format("%Y-%m-%d").to_string()),
            "CURRENT_TIMESTAMP" => {
                DataType::CurrentTimestamp(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
            }
            _ => match literal_from_text(value, self.config.dialect)? {
                Some(literal) => literal,
                None => return Ok(None),
            },
        };
        Ok(Some(Parsed::new(Exp::Literal(literal), at + 1)))
    }

    fn parse_bind_parameter(&self, at: usize) -> Option<Parsed<Exp>> {
        let value = self.value(at)?;
        if value.starts_with(|c: char| matches!(c, '?' | ':' | '@' | '$')) {
            Some(Parsed::new(Exp::BindParameter(value.to_string()), at + 1))
        } else {
            None
        }
    }

    /// `CAST ( exp AS type-name )`
    fn parse_cast(&self, at: usize) -> ParseResult<Exp> {
        if !self.keyword(at, "CAST") {
            return Ok(None);
        }
        let i = self.expect_punct(at + 1, "(")?;
        let operand = self.expect_exp(i)?;
        let i = self.expect_keyword(operand.next, "AS")?;
        let target = self
            .parse_type_name(i)?
            .ok_or_else(|| self.syntax_error(i))?;
        let next = self.expect_punct(target.next, ")")?;
        Ok(Some(Parsed::new(
            Exp::Cast {
                operand: Box::new(operand.node),
                target_type: target.node,
            },
            next,
        )))
    }

    /// `[NOT] EXISTS ( select )`
    fn parse_exists(&self, at: usize) -> ParseResult<Exp> {
        let (negated, i) = if self.keywords(at, &["NOT", "EXISTS"]) {
            (true, at + 2)
        } else if self.keyword(at, "EXISTS") {
            (false, at + 1)
        } else {
            return Ok(None);
        };
        let i = self.expect_punct(i, "(")?;
        let select = self
            .parse_select(i)?
            .ok_or_else(|| self.syntax_error(i))?;
        let next = self.expect_punct(select.next, ")")?;
        Ok(Some(Parsed::new(
            Exp::Exists { negated, select: Box::new(select.node) },
            next,
        )))
    }

    /// `CASE [base] WHEN exp THEN exp ... [ELSE exp] END`
    fn parse_case(&self, at: usize) -> ParseResult<Exp> {
        if !self.keyword(at, "CASE") {
            return Ok(None);
        }
        let mut i = at + 1;
        let base = if self.keyword(i, "WHEN") {
            None
        } else {
            let base = self.expect_exp(i)?;
            i = base.next;
            Some(Box::new(base.node))
        };

        let mut branches = Vec::new();
        while self.keyword(i, "WHEN") {
            let condition = self.expect_exp(i + 1)?;
            let then = self.expect_keyword(condition.next, "THEN")?;
            let result = self.expect_exp(then)?;
            branches.push((condition.node, result.node));
            i = result.next;
        }
        if branches.is_empty() {
            return Err(self.syntax_error(i));
        }

        let otherwise = if self.keyword(i, "ELSE") {
            let exp = self.expect_exp(i + 1)?;
            i = exp.next;
            Some(Box::new(exp.node))
        } else {
            None
        };
        let next = self.expect_keyword(i, "END")?;
        Ok(Some(Parsed::new(Exp::Case { base, branches, otherwise }, next)))
    }

    /// `RAISE ( IGNORE )` or `RAISE ( ROLLBACK|ABORT|FAIL , 'message' )`
    fn parse_raise(&self, at: usize) -> ParseResult<Exp> {
        if !self.keyword(at, "RAISE") {
            return Ok(None);
        }
        let i = self.expect_punct(at + 1, "(")?;
        if self.keyword(i, "IGNORE") {
            let next = self.expect_punct(i + 1, ")")?;
            return Ok(Some(Parsed::new(Exp::Raise(RaiseFunction::Ignore), next)));
        }
        let action = self.value(i).map(|v| v.to_ascii_uppercase());
        if !matches!(action.as_deref(), Some("ROLLBACK") | Some("ABORT") | Some("FAIL")) {
            return Err(self.syntax_error(i));
        }
        let comma = self.expect_punct(i + 1, ",")?;
        let message = match self.value(comma) {
            Some(v) if v.starts_with('\'') => strip_quotes(v).to_string(),
            _ => return Err(self.syntax_error(comma)),
        };
        let raise = match action.as_deref() {
            Some("ROLLBACK") => RaiseFunction::Rollback(message),
            Some("ABORT") => RaiseFunction::Abort(message),
            _ => RaiseFunction::Fail(message),
        };
        let next = self.expect_punct(comma + 1, ")")?;
        Ok(Some(Parsed::new(Exp::Raise(raise), next)))
    }

    /// `name ( args ) [FILTER ( WHERE exp )] [OVER ...]`
    fn parse_function_call(&self, at: usize) -> ParseResult<Exp> {
        let name = match self.identifier(at) {
            Some(name) if self.punct(at + 1, "(") => name,
            _ => return Ok(None),
        };

        let mut i = at + 2;
        let mut arguments = Vec::new();
        if self.punct(i, ")") {
            i += 1;
        } else {
            loop {
                let start = i;
                let mut depth = 0usize;
                loop {
                    match self.value(i) {
                        None => return Err(SqlError::incomplete_input()),
                        Some("(") => depth += 1,
                        Some(")") if depth == 0 => break,
                        Some(")") => depth -= 1,
                        Some(",") if depth == 0 => break,
                        Some(_) => {}
                    }
                    i += 1;
                }
                if i == start {
                    return Err(self.syntax_error(i));
                }
                arguments.push(self.raw_text(start, i));
                let separator = self.punct(i, ",");
                i += 1;
                if !separator {
                    break;
                }
            }
        }

        let filter = if self.keyword(i, "FILTER") {
            let open = self.expect_punct(i + 1, "(")?;
            let where_at = self.expect_keyword(open, "WHERE")?;
            let exp = self.expect_exp(where_at)?;
            i = self.expect_punct(exp.next, ")")?;
            Some(FilterClause { exp: Box::new(exp.node) })
        } else {
            None
        };

        let over = if self.keyword(i, "OVER") {
            let over = self.parse_over(i + 1)?;
            i = over.next;
            Some(over.node)
        } else {
            None
        };

        Ok(Some(Parsed::new(
            Exp::FunctionCall(FunctionCall { name, arguments, filter, over }),
            i,
        )))
    }

    /// `window-name` or `( [base] [PARTITION BY exp,...] [ORDER BY term,...] [frame] )`
    fn parse_over(&self, at: usize) -> Result<Parsed<OverClause>> {
        if let Some(name) = self.identifier(at) {
            return Ok(Parsed::new(
                OverClause { window_name: Some(name), ..OverClause::default() },
                at + 1,
            ));
        }
        let mut i = self.expect_punct(at, "(")?;
        let mut over = OverClause::default();

        if let Some(name) = self.identifier(i) {
            let is_clause = self.keyword(i, "PARTITION")
                || FRAME_KEYWORDS.iter().any(|k| self.keyword(i, k));
            if !is_clause {
                over.window_name = Some(name);
                i += 1;
            }
        }

        if self.keywords(i, &["PARTITION", "BY"]) {
            i += 2;
            loop {
                let exp = self.expect_exp(i)?;
                over.partition_by.push(exp.node);
                i = exp.next;
                if !self.punct(i, ",") {
                    break;
                }
                i += 1;
            }
        }

        if self.keywords(i, &["ORDER", "BY"]) {
            i += 2;
            loop {
                let start = i;
                let mut depth = 0usize;
                loop {
                    match self.value(i) {
                        None => return Err(SqlError::incomplete_input()),
                        Some("(") => depth += 1,
                        Some(")") if depth == 0 => break,
                        Some(")") => depth -= 1,
                        Some(",") if depth == 0 => break,
                        Some(_) if depth == 0 && FRAME_KEYWORDS.iter().any(|k| self.keyword(i, k)) => break,
                        Some(_) => {}
                    }
                    i += 1;
                }
                if i == start {
                    return Err(self.syntax_error(i));
                }
                over.order_by.push(self.raw_text(start, i));
                if !self.punct(i, ",") {
                    break;
                }
                i += 1;
            }
        }

        if FRAME_KEYWORDS.iter().any(|k| self.keyword(i, k)) {
            let start = i;
            let mut depth = 0usize;
            loop {
                match self.value(i) {
                    None => return Err(SqlError::incomplete_input()),
                    Some("(") => depth += 1,
                    Some(")") if depth == 0 => break,
                    Some(")") => depth -= 1,
                    Some(_) => {}
                }
                i += 1;
            }
            over.frame = Some(self.raw_text(start, i));
        }

        let next = self.expect_punct(i, ")")?;
        Ok(Parsed::new(over, next))
    }

    /// `( select )` or `( exp [, exp]* )`
    fn parse_expression_list(&self, at: usize) -> ParseResult<Exp> {
        if !self.punct(at, "(") {
            return Ok(None);
        }
        if self.keyword(at + 1, "SELECT") {
            let select = self
                .parse_select(at + 1)?
                .ok_or_else(|| self.syntax_error(at + 1))?;
            let next = self.expect_punct(select.next, ")")?;
            return Ok(Some(Parsed::new(Exp::Subquery(Box::new(select.node)), next)));
        }

        let mut items = Vec::new();
        let mut i = at + 1;
        loop {
            let exp = self.expect_exp(i)?;
            items.push(exp.node);
            if self.punct(exp.next, ",") {
                i = exp.next + 1;
            } else {
                let next = self.expect_punct(exp.next, ")")?;
                return Ok(Some(Parsed::new(Exp::ExpressionList(items), next)));
            }
        }
    }

    /// One to three dot-separated identifiers. A trailing `.` that is not
    /// followed by an identifier is left unconsumed.
    pub(super) fn parse_column_ref(&self, at: usize) -> Option<Parsed<ColumnRef>> {
        let mut parts = vec![self.identifier(at)?];
        let mut i = at + 1;
        while parts.len() < 3 && self.punct(i, ".") {
            match self.identifier(i + 1) {
                Some(part) => {
                    parts.push(part);
                    i += 2;
                }
                None => break,
            }
        }
        let column = match parts.len() {
            1 => ColumnRef { column: parts.remove(0), table: None, schema: None },
            2 => {
                let column = parts.remove(1);
                ColumnRef { column, table: Some(parts.remove(0)), schema: None }
            }
            _ => {
                let column = parts.remove(2);
                let table = parts.remove(1);
                ColumnRef { column, table: Some(table), schema: Some(parts.remove(0)) }
            }
        };
        Some(Parsed::new(column, i))
    }

    /// `NOT`, `-`, `+` or `~` applied to a full expression
    fn parse_unary(&self, at: usize) -> ParseResult<Exp> {
        let operator = match self.value(at) {
            Some("-") => UnaryOperator::Minus,
            Some("+") => UnaryOperator::Plus,
            Some("~") => UnaryOperator::BitwiseNot,
            Some(_) if self.keyword(at, "NOT") => UnaryOperator::Not,
            _ => return Ok(None),
        };
        let operand = self.expect_exp(at + 1)?;
        Ok(Some(Parsed::new(
            Exp::Unary { operator, operand: Box::new(operand.node) },
            operand.next,
        )))
    }

    //=========================================================================
    // Suffixes
    //=========================================================================

    fn parse_bitwise(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let operator = match self.value(at) {
            Some("&") => BitwiseOperator::And,
            Some("|") => BitwiseOperator::Or,
            Some("<<") => BitwiseOperator::ShiftLeft,
            Some(">>") => BitwiseOperator::ShiftRight,
            _ => return Ok(None),
        };
        let right = self.expect_exp(at + 1)?;
        Ok(Some(Parsed::new(
            Exp::Binary {
                left: Box::new(left.clone()),
                operator,
                right: Box::new(right.node),
            },
            right.next,
        )))
    }

    fn parse_collate(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        if !self.keyword(at, "COLLATE") {
            return Ok(None);
        }
        let collation = self.expect_identifier(at + 1)?;
        Ok(Some(Parsed::new(
            Exp::Collate {
                operand: Box::new(left.clone()),
                collation: collation.node,
            },
            collation.next,
        )))
    }

    /// `[NOT] LIKE|GLOB|MATCH|REGEXP exp [ESCAPE exp]`; ESCAPE only after LIKE
    fn parse_pattern(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let negated = self.keyword(at, "NOT");
        let i = if negated { at + 1 } else { at };
        let op = match self.value(i) {
            Some(v) => v.to_ascii_uppercase(),
            None => return Ok(None),
        };
        if !matches!(op.as_str(), "LIKE" | "GLOB" | "MATCH" | "REGEXP") {
            return Ok(None);
        }

        let pattern = self.expect_exp(i + 1)?;
        let mut next = pattern.next;
        let pattern = Box::new(pattern.node);
        let operand = match op.as_str() {
            "LIKE" => SubExp::Like(pattern),
            "GLOB" => SubExp::Glob(pattern),
            "MATCH" => SubExp::Match(pattern),
            _ => SubExp::Regexp(pattern),
        };

        let escape = if matches!(operand, SubExp::Like(_)) && self.keyword(next, "ESCAPE") {
            let escape = self.expect_exp(next + 1)?;
            next = escape.next;
            Some(Box::new(escape.node))
        } else {
            None
        };

        Ok(Some(Parsed::new(
            Exp::PatternMatching {
                left: Box::new(left.clone()),
                operand,
                negated,
                escape,
            },
            next,
        )))
    }

    fn parse_null_test(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let (form, next) = if self.keyword(at, "ISNULL") {
            (NullForm::IsNull, at + 1)
        } else if self.keyword(at, "NOTNULL") {
            (NullForm::NotNull, at + 1)
        } else if self.keywords(at, &["NOT", "NULL"]) {
            (NullForm::NotNullSpaced, at + 2)
        } else {
            return Ok(None);
        };
        Ok(Some(Parsed::new(
            Exp::Null { operand: Box::new(left.clone()), form },
            next,
        )))
    }

    /// `IS [NOT] [DISTINCT FROM] exp`
    fn parse_is(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        if !self.keyword(at, "IS") {
            return Ok(None);
        }
        let mut i = at + 1;
        let negated = self.keyword(i, "NOT");
        if negated {
            i += 1;
        }
        let distinct_from = self.keyword(i, "DISTINCT");
        if distinct_from {
            i = self.expect_keyword(i + 1, "FROM")?;
        }
        let right = self.expect_exp(i)?;
        Ok(Some(Parsed::new(
            Exp::Is {
                left: Box::new(left.clone()),
                right: Box::new(right.node),
                negated,
                distinct_from,
            },
            right.next,
        )))
    }

    /// `[NOT] BETWEEN operand AND exp`
    fn parse_between(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let negated = self.keyword(at, "NOT");
        let i = if negated { at + 1 } else { at };
        if !self.keyword(i, "BETWEEN") {
            return Ok(None);
        }
        let low = self
            .parse_operand(i + 1)?
            .ok_or_else(|| self.syntax_error(i + 1))?;
        let and = self.expect_keyword(low.next, "AND")?;
        let high = self.expect_exp(and)?;
        Ok(Some(Parsed::new(
            Exp::Between {
                operand: Box::new(left.clone()),
                negated,
                low: Box::new(low.node),
                high: Box::new(high.node),
            },
            high.next,
        )))
    }

    /// `[NOT] IN ( [select | exp, ...] )` or `[NOT] IN [schema.]table`
    fn parse_in(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let negated = self.keyword(at, "NOT");
        let i = if negated { at + 1 } else { at };
        if !self.keyword(i, "IN") {
            return Ok(None);
        }
        let i = i + 1;

        let (target, next) = if self.punct(i, "(") {
            if self.punct(i + 1, ")") {
                (InTarget::List(Vec::new()), i + 2)
            } else if self.keyword(i + 1, "SELECT") {
                let select = self
                    .parse_select(i + 1)?
                    .ok_or_else(|| self.syntax_error(i + 1))?;
                let next = self.expect_punct(select.next, ")")?;
                (InTarget::Select(Box::new(select.node)), next)
            } else {
                let mut items = Vec::new();
                let mut j = i + 1;
                loop {
                    let exp = self.expect_exp(j)?;
                    items.push(exp.node);
                    if self.punct(exp.next, ",") {
                        j = exp.next + 1;
                    } else {
                        break (InTarget::List(items), self.expect_punct(exp.next, ")")?);
                    }
                }
            }
        } else {
            let first = self.expect_identifier(i)?;
            if self.punct(first.next, ".") {
                let name = self.expect_identifier(first.next + 1)?;
                (InTarget::Table { schema: Some(first.node), name: name.node }, name.next)
            } else {
                (InTarget::Table { schema: None, name: first.node }, first.next)
            }
        };

        Ok(Some(Parsed::new(
            Exp::In { operand: Box::new(left.clone()), negated, target },
            next,
        )))
    }

    fn parse_comparison(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let operator = match self.value(at) {
            Some("=") | Some("==") => ComparisonOperator::Eq,
            Some("!=") | Some("<>") => ComparisonOperator::NotEq,
            Some("<") => ComparisonOperator::Lt,
            Some("<=") => ComparisonOperator::LtEq,
            Some(">") => ComparisonOperator::Gt,
            Some(">=") => ComparisonOperator::GtEq,
            _ => return Ok(None),
        };
        let right = self.expect_exp(at + 1)?;
        Ok(Some(Parsed::new(
            Exp::Comparison {
                left: Box::new(left.clone()),
                operator,
                right: Box::new(right.node),
            },
            right.next,
        )))
    }

    fn parse_logical(&self, left: &Exp, at: usize) -> ParseResult<Exp> {
        let operator = if self.keyword(at, "AND") {
            LogicalOperator::And
        } else if self.keyword(at, "OR") {
            LogicalOperator::Or
        } else {
            return Ok(None);
        };
        let right = self.expect_exp(at + 1)?;
        Ok(Some(Parsed::new(
            Exp::Logical {
                left: Box::new(left.clone()),
                operator,
                right: Box::new(right.node),
            },
            right.next,
        )))
    }
}

/// Numbers, quoted strings and blobs; `None` if the text is not a literal
fn literal_from_text(value: &str, dialect: Dialect) -> Result<Option<DataType>> {
    if is_blob_literal(value) {
        let hex = &value[2..value.len() - 1];
        let valid = !hex.is_empty() && hex.len() % 2 == 0 && hex.chars().all(|c| c.is_ascii_hexdigit());
        if !valid {
            return Err(SqlError::unrecognized_token(value));
        }
        return Ok(Some(DataType::Blob(hex.to_string())));
    }
    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        return Ok(Some(match value.parse::<i64>() {
            Ok(n) => DataType::Integer(n),
            Err(_) => DataType::Real(value.parse::<f64>().unwrap_or(f64::INFINITY)),
        }));
    }
    if value.starts_with(|c: char| c.is_ascii_digit()) && value.contains('.') {
        if let Ok(n) = value.parse::<f64>() {
            return Ok(Some(DataType::Real(n)));
        }
    }
    if value.starts_with('\'') || (value.starts_with('"') && dialect == Dialect::MySql) {
        return Ok(Some(DataType::String(strip_quotes(value).to_string())));
    }
    Ok(None)
}

fn is_blob_literal(value: &str) -> bool {
    value.len() >= 3 && (value.starts_with("x'") || value.starts_with("X'")) && value.ends_with('\'')
}
