//! SQL dialects. Each engine implements the primitives; token rendering is shared.

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use crate::catalog::DataType;
use crate::query::{
    Condition, FieldsToken, FilterOperator, FilterToken, FilterValue, IncludeToken, PagingToken, SortDirection,
    SortToken,
};
use crate::sql::params::{BindValue, ParamSet};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseFamily {
    Postgres,
    MySql,
    Sqlite,
    SqlServer,
}

impl DatabaseFamily {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => DatabaseFamily::Postgres,
            "mysql" | "mariadb" => DatabaseFamily::MySql,
            "sqlite" => DatabaseFamily::Sqlite,
            "sqlserver" | "mssql" => DatabaseFamily::SqlServer,
            _ => return None,
        })
    }
}

/// How a mutation hands back the affected row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowReturn {
    /// Clause appended to the statement (`RETURNING ...`).
    Suffix(String),
    /// Clause placed before `VALUES` / `WHERE` (`OUTPUT INSERTED....`).
    Output(String),
    /// The engine cannot return rows; run a follow-up SELECT.
    SelectBack,
}

pub fn dialect_for(family: DatabaseFamily) -> &'static dyn Dialect {
    match family {
        DatabaseFamily::Postgres => &PostgresDialect,
        DatabaseFamily::MySql => &MySqlDialect,
        DatabaseFamily::Sqlite => &SqliteDialect,
        DatabaseFamily::SqlServer => &SqlServerDialect,
    }
}

pub trait Dialect: Send + Sync {
    fn family(&self) -> DatabaseFamily;

    fn quote_ident(&self, ident: &str) -> String;

    /// Placeholder for the parameter at `index` (1-based) named `name`.
    fn placeholder(&self, index: usize, name: &str, data_type: Option<DataType>) -> String;

    /// Case-insensitive LIKE of `column` against an already escaped pattern placeholder.
    fn pattern_match(&self, column: &str, placeholder: &str, data_type: DataType) -> String;

    /// Escape LIKE metacharacters in a user literal.
    fn escape_like(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            if matches!(c, '\\' | '%' | '_') {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    /// Paging clause. `ordered` tells whether an ORDER BY precedes it.
    fn paging_clause(&self, paging: &PagingToken, _ordered: bool) -> String {
        format!("LIMIT {} OFFSET {}", paging.limit, paging.offset)
    }

    /// Row-return strategy for INSERT/UPDATE over the given columns.
    fn row_return(&self, columns: &[(&str, DataType)]) -> RowReturn;

    /// Expression the driver can decode, for column types it cannot read natively.
    fn read_back(&self, _expr: &str, _data_type: DataType) -> Option<String> {
        None
    }

    /// One select-list entry that keeps `output` as the result column name.
    fn select_column(&self, expr: String, output: &str, data_type: DataType) -> String {
        match self.read_back(&expr, data_type) {
            Some(decodable) => format!("{} AS {}", decodable, self.quote_ident(output)),
            None => expr,
        }
    }

    /// Expression yielding the key generated by the last INSERT, for select-back.
    fn last_insert_id(&self) -> Option<&'static str> {
        None
    }

    fn qualified_table(&self, schema: &str, table: &str) -> String {
        if schema.is_empty() {
            self.quote_ident(table)
        } else {
            format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
        }
    }

    fn column_ref(&self, alias: &str, column: &str) -> String {
        format!("{}.{}", self.quote_ident(alias), self.quote_ident(column))
    }

    /// Bind `value` and return its placeholder.
    fn bind(&self, params: &mut ParamSet, hint: &str, value: BindValue, data_type: Option<DataType>) -> String {
        let (index, name) = params.push(hint, value);
        self.placeholder(index, &name, data_type)
    }

    fn render_filter(&self, token: &FilterToken, params: &mut ParamSet) -> String {
        match token {
            FilterToken::Condition(c) => self.render_condition(c, params),
            FilterToken::Composite { left, operator, right } => format!(
                "{} {} {}",
                self.render_filter(left, params),
                operator.as_sql(),
                self.render_filter(right, params)
            ),
            FilterToken::Group(inner) => format!("({})", self.render_filter(inner, params)),
        }
    }

    fn render_condition(&self, c: &Condition, params: &mut ParamSet) -> String {
        let column = self.column_ref(&c.alias, &c.column);
        match (&c.operator, &c.value) {
            (FilterOperator::Eq, FilterValue::Single(BindValue::Null)) => format!("{} IS NULL", column),
            (FilterOperator::Ne, FilterValue::Single(BindValue::Null)) => format!("{} IS NOT NULL", column),
            (FilterOperator::In, FilterValue::List(values)) => {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| self.bind(params, &c.column, v.clone(), Some(c.data_type)))
                    .collect();
                format!("{} IN ({})", column, placeholders.join(", "))
            }
            (FilterOperator::Contains | FilterOperator::StartsWith, FilterValue::Single(v)) => {
                let raw = match v {
                    BindValue::String(s) => s.clone(),
                    other => other.to_json().to_string(),
                };
                let escaped = self.escape_like(&raw);
                let pattern = if c.operator == FilterOperator::Contains {
                    format!("%{}%", escaped)
                } else {
                    format!("{}%", escaped)
                };
                let ph = self.bind(params, &c.column, BindValue::String(pattern), Some(DataType::Text));
                self.pattern_match(&column, &ph, c.data_type)
            }
            (op, FilterValue::Single(v)) => {
                let ph = self.bind(params, &c.column, v.clone(), Some(c.data_type));
                format!("{} {} {}", column, op.infix().unwrap_or("="), ph)
            }
            (op, FilterValue::List(values)) => {
                // Only `in` produces lists; anything else compares against the first element.
                let v = values.first().cloned().unwrap_or(BindValue::Null);
                let ph = self.bind(params, &c.column, v, Some(c.data_type));
                format!("{} {} {}", column, op.infix().unwrap_or("="), ph)
            }
        }
    }

    /// SELECT list. Wildcards expand to the entity's alias.
    fn render_fields(&self, tokens: &[FieldsToken]) -> String {
        tokens
            .iter()
            .map(|t| match t {
                FieldsToken::Wildcard { alias } => format!("{}.*", self.quote_ident(alias)),
                FieldsToken::Column {
                    alias,
                    column,
                    label,
                    data_type,
                } => {
                    let expr = self.column_ref(alias, column);
                    match (self.read_back(&expr, *data_type), label) {
                        (Some(decodable), _) => format!(
                            "{} AS {}",
                            decodable,
                            self.quote_ident(label.as_deref().unwrap_or(column))
                        ),
                        (None, Some(label)) => format!("{} AS {}", expr, self.quote_ident(label)),
                        (None, None) => expr,
                    }
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// ORDER BY body without the keyword; empty when there is nothing to sort by.
    fn render_sort(&self, tokens: &[SortToken]) -> String {
        tokens
            .iter()
            .map(|t| {
                let dir = match t.direction {
                    SortDirection::Ascending => "ASC",
                    SortDirection::Descending => "DESC",
                };
                format!("{} {}", self.column_ref(&t.alias, &t.column), dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_includes(&self, tokens: &[IncludeToken]) -> String {
        tokens
            .iter()
            .map(|t| {
                format!(
                    " LEFT OUTER JOIN {} AS {} ON {} = {}",
                    self.qualified_table(&t.child_schema, &t.child_table),
                    self.quote_ident(&t.child_alias()),
                    self.column_ref(&t.parent_alias(), &t.parent_column),
                    self.column_ref(&t.child_alias(), &t.child_column)
                )
            })
            .collect()
    }

    fn render_paging(&self, paging: &PagingToken, ordered: bool) -> String {
        self.paging_clause(paging, ordered)
    }
}
