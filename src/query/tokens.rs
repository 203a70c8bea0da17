//! Validated tokens produced by the compilers. Created per request, discarded after rendering.

use crate::catalog::DataType;
use crate::sql::BindValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Contains,
    StartsWith,
}

impl FilterOperator {
    pub fn parse(word: &str) -> Option<Self> {
        Some(match word.to_ascii_lowercase().as_str() {
            "eq" => FilterOperator::Eq,
            "ne" => FilterOperator::Ne,
            "gt" => FilterOperator::Gt,
            "ge" => FilterOperator::Ge,
            "lt" => FilterOperator::Lt,
            "le" => FilterOperator::Le,
            "in" => FilterOperator::In,
            "ct" => FilterOperator::Contains,
            "sw" => FilterOperator::StartsWith,
            _ => return None,
        })
    }

    /// Infix SQL operator for the comparison operators.
    pub fn infix(self) -> Option<&'static str> {
        match self {
            FilterOperator::Eq => Some("="),
            FilterOperator::Ne => Some("<>"),
            FilterOperator::Gt => Some(">"),
            FilterOperator::Ge => Some(">="),
            FilterOperator::Lt => Some("<"),
            FilterOperator::Le => Some("<="),
            FilterOperator::In | FilterOperator::Contains | FilterOperator::StartsWith => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    pub fn parse(word: &str) -> Option<Self> {
        if word.eq_ignore_ascii_case("and") {
            Some(BooleanOperator::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(BooleanOperator::Or)
        } else {
            None
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Single(BindValue),
    List(Vec<BindValue>),
}

/// Leaf condition against a column of the target entity. `column` is the catalog spelling.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub alias: String,
    pub column: String,
    pub data_type: DataType,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterToken {
    Condition(Condition),
    Composite {
        left: Box<FilterToken>,
        operator: BooleanOperator,
        right: Box<FilterToken>,
    },
    /// Explicitly parenthesized subtree.
    Group(Box<FilterToken>),
}

impl FilterToken {
    /// Leaf conditions in source order.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            FilterToken::Condition(c) => out.push(c),
            FilterToken::Composite { left, right, .. } => {
                left.collect_conditions(out);
                right.collect_conditions(out);
            }
            FilterToken::Group(inner) => inner.collect_conditions(out),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortToken {
    pub alias: String,
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldsToken {
    /// All columns of the requesting entity.
    Wildcard { alias: String },
    Column {
        alias: String,
        column: String,
        /// Output name for columns of included entities (`entity.column`).
        label: Option<String>,
        data_type: DataType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PagingToken {
    pub limit: i64,
    pub offset: i64,
}

/// One join edge. The parent of the first hop is the requesting entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncludeToken {
    pub child_schema: String,
    pub child_table: String,
    pub child_column: String,
    pub parent_table: String,
    pub parent_column: String,
}

impl IncludeToken {
    pub fn child_alias(&self) -> String {
        crate::catalog::table_alias(&self.child_table)
    }

    pub fn parent_alias(&self) -> String {
        crate::catalog::table_alias(&self.parent_table)
    }
}
