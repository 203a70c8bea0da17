//! Filter compiler: `expr := term ((AND|OR) term)*`, `term := '(' expr ')' | column op value`.
//! AND binds tighter than OR. Every value is coerced to the column's type and bound later.
//! Parsing and rendering recurse per group and per boolean operator, so both are bounded.

use crate::catalog::{Column, Entity};
use crate::error::QueryError;
use crate::query::tokens::{BooleanOperator, Condition, FilterOperator, FilterToken, FilterValue};
use crate::sql::BindValue;

#[derive(Clone, Debug, PartialEq)]
enum Lexeme {
    Open,
    Close,
    Comma,
    Quoted(String),
    Word(String),
}

impl Lexeme {
    fn text(&self) -> String {
        match self {
            Lexeme::Open => "(".into(),
            Lexeme::Close => ")".into(),
            Lexeme::Comma => ",".into(),
            Lexeme::Quoted(s) => format!("'{}'", s.replace('\'', "''")),
            Lexeme::Word(w) => w.clone(),
        }
    }
}

/// Deepest parenthesis nesting accepted.
pub const MAX_FILTER_DEPTH: usize = 64;
/// Most conditions one filter may combine.
pub const MAX_FILTER_CONDITIONS: usize = 256;

/// Compile a raw filter against the target entity.
pub fn compile_filter(raw: &str, entity: &Entity) -> Result<FilterToken, QueryError> {
    if raw.trim().is_empty() {
        return Err(QueryError::EmptyFilter);
    }
    let lexemes = lex(raw)?;
    check_shape(&lexemes)?;
    let mut parser = Parser {
        lexemes,
        pos: 0,
        entity,
    };
    let token = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(QueryError::MalformedFilter(format!(
            "expected AND or OR before '{}'",
            extra.text()
        )));
    }
    Ok(token)
}

fn lex(raw: &str) -> Result<Vec<Lexeme>, QueryError> {
    let mut out = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                out.push(Lexeme::Open);
            }
            ')' => {
                chars.next();
                out.push(Lexeme::Close);
            }
            ',' => {
                chars.next();
                out.push(Lexeme::Comma);
            }
            '\'' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == '\'' {
                        if chars.peek() == Some(&'\'') {
                            chars.next();
                            s.push('\'');
                        } else {
                            closed = true;
                            break;
                        }
                    } else {
                        s.push(c);
                    }
                }
                if !closed {
                    return Err(QueryError::MalformedFilter(format!("unterminated string '{}", s)));
                }
                out.push(Lexeme::Quoted(s));
            }
            _ => {
                let mut w = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | ',' | '\'') {
                        break;
                    }
                    w.push(c);
                    chars.next();
                }
                out.push(Lexeme::Word(w));
            }
        }
    }
    Ok(out)
}

fn check_shape(lexemes: &[Lexeme]) -> Result<(), QueryError> {
    let mut depth = 0usize;
    let mut combinators = 0usize;
    for (i, l) in lexemes.iter().enumerate() {
        match l {
            Lexeme::Open => {
                depth += 1;
                if depth > MAX_FILTER_DEPTH {
                    return Err(QueryError::MalformedFilter(format!(
                        "parentheses nested deeper than {} levels",
                        MAX_FILTER_DEPTH
                    )));
                }
            }
            Lexeme::Word(w) if BooleanOperator::parse(w).is_some() => {
                combinators += 1;
                if combinators >= MAX_FILTER_CONDITIONS {
                    return Err(QueryError::MalformedFilter(format!(
                        "more than {} conditions",
                        MAX_FILTER_CONDITIONS
                    )));
                }
            }
            Lexeme::Close => {
                if depth == 0 {
                    return Err(QueryError::UnbalancedParenthesis(format!(
                        "unexpected ')' after '{}'",
                        fragment(lexemes, i.saturating_sub(3), i)
                    )));
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if depth > 0 {
        return Err(QueryError::UnbalancedParenthesis(format!("{} '(' never closed", depth)));
    }
    Ok(())
}

fn fragment(lexemes: &[Lexeme], from: usize, to: usize) -> String {
    lexemes[from..to.min(lexemes.len())]
        .iter()
        .map(Lexeme::text)
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_numeric(word: &str) -> bool {
    let digits = word.strip_prefix(['-', '+']).unwrap_or(word);
    digits.starts_with(|c: char| c.is_ascii_digit())
}

struct Parser<'a> {
    lexemes: Vec<Lexeme>,
    pos: usize,
    entity: &'a Entity,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Lexeme> {
        self.lexemes.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Lexeme> {
        self.lexemes.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Lexeme> {
        let l = self.lexemes.get(self.pos).cloned();
        if l.is_some() {
            self.pos += 1;
        }
        l
    }

    fn peek_boolean(&self, wanted: BooleanOperator) -> bool {
        matches!(self.peek(), Some(Lexeme::Word(w)) if BooleanOperator::parse(w) == Some(wanted))
    }

    fn parse_or(&mut self) -> Result<FilterToken, QueryError> {
        let mut left = self.parse_and()?;
        while self.peek_boolean(BooleanOperator::Or) {
            let keyword = self.next().map(|l| l.text()).unwrap_or_default();
            self.expect_term_after(&keyword)?;
            let right = self.parse_and()?;
            left = FilterToken::Composite {
                left: Box::new(left),
                operator: BooleanOperator::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<FilterToken, QueryError> {
        let mut left = self.parse_term()?;
        while self.peek_boolean(BooleanOperator::And) {
            let keyword = self.next().map(|l| l.text()).unwrap_or_default();
            self.expect_term_after(&keyword)?;
            let right = self.parse_term()?;
            left = FilterToken::Composite {
                left: Box::new(left),
                operator: BooleanOperator::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn expect_term_after(&self, keyword: &str) -> Result<(), QueryError> {
        match self.peek() {
            None | Some(Lexeme::Close) => Err(QueryError::DanglingOperator(keyword.to_string())),
            Some(Lexeme::Word(w)) if BooleanOperator::parse(w).is_some() => {
                Err(QueryError::DanglingOperator(keyword.to_string()))
            }
            _ => Ok(()),
        }
    }

    fn parse_term(&mut self) -> Result<FilterToken, QueryError> {
        match self.peek().cloned() {
            Some(Lexeme::Open) => {
                self.next();
                if matches!(self.peek(), Some(Lexeme::Close)) {
                    return Err(QueryError::MalformedFilter("empty parentheses".into()));
                }
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Lexeme::Close) => Ok(FilterToken::Group(Box::new(inner))),
                    Some(other) => Err(QueryError::MalformedFilter(format!(
                        "expected ')' or boolean operator before '{}'",
                        other.text()
                    ))),
                    None => Err(QueryError::UnbalancedParenthesis("'(' never closed".into())),
                }
            }
            Some(Lexeme::Word(w)) => {
                if BooleanOperator::parse(&w).is_some() {
                    return Err(QueryError::DanglingOperator(w));
                }
                self.parse_condition(&w)
            }
            Some(Lexeme::Quoted(_)) => Err(QueryError::ReversedCondition(fragment(
                &self.lexemes,
                self.pos,
                self.pos + 3,
            ))),
            Some(other) => Err(QueryError::MalformedFilter(format!("unexpected '{}'", other.text()))),
            None => Err(QueryError::MalformedFilter("expected a condition".into())),
        }
    }

    fn parse_condition(&mut self, word: &str) -> Result<FilterToken, QueryError> {
        let entity = self.entity;
        let column = match entity.column(word) {
            Some(c) => c,
            None => {
                if looks_numeric(word) || self.operand_is_column(2) {
                    return Err(QueryError::ReversedCondition(fragment(
                        &self.lexemes,
                        self.pos,
                        self.pos + 3,
                    )));
                }
                return Err(QueryError::UnknownColumn {
                    entity: entity.name.clone(),
                    column: word.to_string(),
                });
            }
        };
        self.next();

        let operator = match self.next() {
            Some(Lexeme::Word(op)) => FilterOperator::parse(&op).ok_or(QueryError::InvalidOperator(op))?,
            Some(other) => return Err(QueryError::InvalidOperator(other.text())),
            None => {
                return Err(QueryError::MalformedFilter(format!(
                    "condition on '{}' is missing an operator",
                    column.name
                )))
            }
        };

        let value = if operator == FilterOperator::In {
            FilterValue::List(self.parse_list(column)?)
        } else {
            FilterValue::Single(self.parse_value(column, operator)?)
        };

        Ok(FilterToken::Condition(Condition {
            alias: entity.alias(),
            column: column.name.clone(),
            data_type: column.data_type,
            operator,
            value,
        }))
    }

    fn operand_is_column(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Some(Lexeme::Word(w)) if self.entity.column(w).is_some())
    }

    fn parse_value(&mut self, column: &Column, operator: FilterOperator) -> Result<BindValue, QueryError> {
        let missing = || QueryError::MalformedFilter(format!("condition on '{}' is missing a value", column.name));
        match self.peek().cloned() {
            Some(Lexeme::Quoted(s)) => {
                self.next();
                coerce(column, operator, &s)
            }
            Some(Lexeme::Word(w)) if BooleanOperator::parse(&w).is_none() => {
                self.next();
                if w.eq_ignore_ascii_case("null") {
                    return match operator {
                        FilterOperator::Eq | FilterOperator::Ne => Ok(BindValue::Null),
                        _ => Err(QueryError::InvalidLiteral {
                            column: column.name.clone(),
                            value: w,
                            expected: "a non-null value",
                        }),
                    };
                }
                coerce(column, operator, &w)
            }
            _ => Err(missing()),
        }
    }

    fn parse_list(&mut self, column: &Column) -> Result<Vec<BindValue>, QueryError> {
        match self.next() {
            Some(Lexeme::Open) => {}
            _ => {
                return Err(QueryError::MalformedFilter(format!(
                    "'in' on '{}' expects a parenthesized list",
                    column.name
                )))
            }
        }
        let mut values = Vec::new();
        loop {
            let raw = match self.next() {
                Some(Lexeme::Quoted(s)) | Some(Lexeme::Word(s)) => s,
                Some(Lexeme::Close) if values.is_empty() => {
                    return Err(QueryError::MalformedFilter(format!("empty 'in' list on '{}'", column.name)))
                }
                Some(other) => {
                    return Err(QueryError::MalformedFilter(format!(
                        "unexpected '{}' in 'in' list on '{}'",
                        other.text(),
                        column.name
                    )))
                }
                None => return Err(QueryError::UnbalancedParenthesis("'(' never closed".into())),
            };
            values.push(coerce(column, FilterOperator::In, &raw)?);
            match self.next() {
                Some(Lexeme::Comma) => continue,
                Some(Lexeme::Close) => break,
                Some(other) => {
                    return Err(QueryError::MalformedFilter(format!(
                        "expected ',' or ')' in 'in' list, found '{}'",
                        other.text()
                    )))
                }
                None => return Err(QueryError::UnbalancedParenthesis("'(' never closed".into())),
            }
        }
        Ok(values)
    }
}

/// Pattern operators always compare text; everything else follows the column type.
fn coerce(column: &Column, operator: FilterOperator, raw: &str) -> Result<BindValue, QueryError> {
    match operator {
        FilterOperator::Contains | FilterOperator::StartsWith => Ok(BindValue::String(raw.to_string())),
        _ => BindValue::from_text(raw, column),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use chrono::{TimeZone, Utc};

    fn customers() -> Entity {
        Entity::new(
            "sales",
            "customers",
            vec![
                Column::new("ID", DataType::Integer).primary_key(),
                Column::new("Name", DataType::Text),
                Column::new("Age", DataType::Integer),
                Column::new("Joined", DataType::DateTime),
                Column::new("Active", DataType::Boolean),
            ],
        )
    }

    fn cond(token: &FilterToken) -> &Condition {
        match token {
            FilterToken::Condition(c) => c,
            other => panic!("expected condition, got {:?}", other),
        }
    }

    #[test]
    fn simple_equality() {
        let t = compile_filter("ID eq 42", &customers()).unwrap();
        let c = cond(&t);
        assert_eq!(c.column, "ID");
        assert_eq!(c.alias, "t_customers");
        assert_eq!(c.operator, FilterOperator::Eq);
        assert_eq!(c.value, FilterValue::Single(BindValue::I64(42)));
    }

    #[test]
    fn keywords_and_columns_are_case_insensitive() {
        let t = compile_filter("name CT 'bill' and id EQ 1", &customers()).unwrap();
        let conds = t.conditions();
        assert_eq!(conds[0].column, "Name");
        assert_eq!(conds[0].operator, FilterOperator::Contains);
        assert_eq!(conds[1].column, "ID");
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let t = compile_filter("ID eq 1 OR ID eq 2 AND Age gt 3", &customers()).unwrap();
        match t {
            FilterToken::Composite { operator, right, .. } => {
                assert_eq!(operator, BooleanOperator::Or);
                assert!(matches!(*right, FilterToken::Composite { operator: BooleanOperator::And, .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parentheses_produce_groups() {
        let t = compile_filter("(ID eq 1 OR ID eq 2) AND Age gt 3", &customers()).unwrap();
        match t {
            FilterToken::Composite { left, operator, .. } => {
                assert_eq!(operator, BooleanOperator::And);
                assert!(matches!(*left, FilterToken::Group(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn in_list_is_coerced_per_item() {
        let t = compile_filter("ID in (1, 2,3)", &customers()).unwrap();
        assert_eq!(
            cond(&t).value,
            FilterValue::List(vec![BindValue::I64(1), BindValue::I64(2), BindValue::I64(3)])
        );
    }

    #[test]
    fn quoted_strings_keep_spaces_and_escaped_quotes() {
        let t = compile_filter("Name eq 'O''Brien and sons'", &customers()).unwrap();
        assert_eq!(
            cond(&t).value,
            FilterValue::Single(BindValue::String("O'Brien and sons".into()))
        );
    }

    #[test]
    fn datetime_literals_are_bound_in_utc() {
        let t = compile_filter("Joined ge '2024-05-01T12:00:00+02:00'", &customers()).unwrap();
        assert_eq!(
            cond(&t).value,
            FilterValue::Single(BindValue::Timestamp(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()))
        );
    }

    #[test]
    fn null_only_with_equality() {
        let t = compile_filter("Name eq null", &customers()).unwrap();
        assert_eq!(cond(&t).value, FilterValue::Single(BindValue::Null));
        assert!(matches!(
            compile_filter("Age gt null", &customers()),
            Err(QueryError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(compile_filter("", &customers()), Err(QueryError::EmptyFilter));
        assert_eq!(compile_filter("   \t", &customers()), Err(QueryError::EmptyFilter));
    }

    #[test]
    fn unbalanced_parentheses_are_rejected() {
        assert!(matches!(
            compile_filter("((( ID eq 42", &customers()),
            Err(QueryError::UnbalancedParenthesis(_))
        ));
        assert!(matches!(
            compile_filter("ID eq 42)", &customers()),
            Err(QueryError::UnbalancedParenthesis(_))
        ));
    }

    #[test]
    fn deep_nesting_is_rejected_without_recursing() {
        let deep = format!("{}ID eq 1{}", "(".repeat(2000), ")".repeat(2000));
        assert!(matches!(
            compile_filter(&deep, &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
        let limit = format!(
            "{}ID eq 1{}",
            "(".repeat(MAX_FILTER_DEPTH),
            ")".repeat(MAX_FILTER_DEPTH)
        );
        assert!(compile_filter(&limit, &customers()).is_ok());
    }

    #[test]
    fn long_condition_chains_are_capped() {
        let chain = |n: usize| vec!["ID eq 1"; n].join(" AND ");
        assert!(compile_filter(&chain(MAX_FILTER_CONDITIONS), &customers()).is_ok());
        assert!(matches!(
            compile_filter(&chain(MAX_FILTER_CONDITIONS + 1), &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
        assert!(matches!(
            compile_filter(&chain(5000), &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
    }

    #[test]
    fn dangling_operators_are_rejected() {
        assert_eq!(
            compile_filter("ID eq 42 AND", &customers()),
            Err(QueryError::DanglingOperator("AND".into()))
        );
        assert_eq!(
            compile_filter("(ID eq 42 or) AND Age eq 1", &customers()),
            Err(QueryError::DanglingOperator("or".into()))
        );
        assert_eq!(
            compile_filter("AND ID eq 1", &customers()),
            Err(QueryError::DanglingOperator("AND".into()))
        );
    }

    #[test]
    fn reversed_operands_are_rejected() {
        assert!(matches!(
            compile_filter("42 eq ID", &customers()),
            Err(QueryError::ReversedCondition(_))
        ));
        assert!(matches!(
            compile_filter("'Bill' eq Name", &customers()),
            Err(QueryError::ReversedCondition(_))
        ));
        assert!(matches!(
            compile_filter("Bill eq Name", &customers()),
            Err(QueryError::ReversedCondition(_))
        ));
    }

    #[test]
    fn unknown_column_is_named() {
        assert_eq!(
            compile_filter("Email eq 'x'", &customers()),
            Err(QueryError::UnknownColumn {
                entity: "customers".into(),
                column: "Email".into()
            })
        );
    }

    #[test]
    fn bad_operator_and_missing_value() {
        assert_eq!(
            compile_filter("ID like 4", &customers()),
            Err(QueryError::InvalidOperator("like".into()))
        );
        assert!(matches!(
            compile_filter("ID eq", &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
        assert!(matches!(
            compile_filter("ID eq 1 Age eq 2", &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
    }

    #[test]
    fn literals_must_match_column_type() {
        assert!(matches!(
            compile_filter("Age eq 'old'", &customers()),
            Err(QueryError::InvalidLiteral { .. })
        ));
        assert!(matches!(
            compile_filter("Active eq maybe", &customers()),
            Err(QueryError::InvalidLiteral { .. })
        ));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        assert!(matches!(
            compile_filter("Name eq 'Bill", &customers()),
            Err(QueryError::MalformedFilter(_))
        ));
    }
}
