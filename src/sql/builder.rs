//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE per verb from compiled tokens.
//! Identifiers come from the catalog only; every value is a bound parameter.

use crate::catalog::{Column, DataType, Entity};
use crate::error::{CompileError, QueryError, SchemaError};
use crate::patch::ColumnSet;
use crate::query::{CompiledQuery, FieldsToken, SortDirection, SortToken};
use crate::sql::dialect::{Dialect, RowReturn};
use crate::sql::params::{BindValue, ParamSet};
use serde_json::{Map, Value};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: ParamSet,
    /// Follow-up SELECT for engines without RETURNING/OUTPUT.
    pub select_back: Option<Box<QueryBuf>>,
}

impl QueryBuf {
    fn new(sql: String, params: ParamSet) -> Self {
        QueryBuf {
            sql,
            params,
            select_back: None,
        }
    }
}

/// Page query plus its companion count over the same joins, filter and parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ListStatements {
    pub select: QueryBuf,
    pub count: QueryBuf,
}

pub struct StatementBuilder<'a> {
    dialect: &'a dyn Dialect,
    entity: &'a Entity,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(dialect: &'a dyn Dialect, entity: &'a Entity) -> Self {
        StatementBuilder { dialect, entity }
    }

    fn table(&self) -> String {
        self.dialect.qualified_table(&self.entity.schema, &self.entity.name)
    }

    fn primary_key(&self) -> Result<&'a Column, SchemaError> {
        self.entity
            .primary_key()
            .ok_or_else(|| SchemaError::MissingPrimaryKey(self.entity.name.clone()))
    }

    fn from_clause(&self, query: &CompiledQuery) -> String {
        format!(
            "{} AS {}{}",
            self.table(),
            self.dialect.quote_ident(&self.entity.alias()),
            self.dialect.render_includes(&query.includes)
        )
    }

    /// Sort keys with the primary key appended as a tiebreak so paging is stable.
    fn ordering(&self, sort: &[SortToken]) -> Vec<SortToken> {
        let mut keys = sort.to_vec();
        if let Some(pk) = self.entity.primary_key() {
            let alias = self.entity.alias();
            let last_is_pk = keys
                .last()
                .map(|k| k.alias == alias && k.column == pk.name)
                .unwrap_or(false);
            if !last_is_pk {
                keys.push(SortToken {
                    alias,
                    column: pk.name.clone(),
                    direction: SortDirection::Ascending,
                });
            }
        }
        keys
    }

    /// Projection. A wildcard is spelled out when some column must be read back through a cast.
    fn fields(&self, query: &CompiledQuery) -> String {
        let casts = self
            .entity
            .columns
            .iter()
            .any(|c| self.dialect.read_back("", c.data_type).is_some());
        if !casts {
            return self.dialect.render_fields(&query.fields);
        }
        let expanded: Vec<FieldsToken> = query
            .fields
            .iter()
            .flat_map(|t| match t {
                FieldsToken::Wildcard { alias } => self
                    .entity
                    .columns
                    .iter()
                    .map(|c| FieldsToken::Column {
                        alias: alias.clone(),
                        column: c.name.clone(),
                        label: None,
                        data_type: c.data_type,
                    })
                    .collect::<Vec<_>>(),
                other => vec![other.clone()],
            })
            .collect();
        self.dialect.render_fields(&expanded)
    }

    /// GET on a collection.
    pub fn select_list(&self, query: &CompiledQuery) -> ListStatements {
        let mut params = ParamSet::new();
        let from = self.from_clause(query);
        let where_clause = query
            .filter
            .as_ref()
            .map(|f| format!(" WHERE {}", self.dialect.render_filter(f, &mut params)))
            .unwrap_or_default();
        let keys = self.ordering(&query.sort);
        let order = self.dialect.render_sort(&keys);
        let order_clause = if order.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", order)
        };
        let paging = self.dialect.render_paging(&query.paging, !order.is_empty());
        let select = format!(
            "SELECT {} FROM {}{}{} {}",
            self.fields(query),
            from,
            where_clause,
            order_clause,
            paging
        );
        let count = format!("SELECT COUNT(*) FROM {}{}", from, where_clause);
        ListStatements {
            select: QueryBuf::new(select, params.clone()),
            count: QueryBuf::new(count, params),
        }
    }

    /// GET on one resource: the primary-key predicate replaces the user filter; no paging.
    pub fn select_one(&self, query: &CompiledQuery, id: &str) -> Result<QueryBuf, CompileError> {
        let pk = self.primary_key()?;
        let mut params = ParamSet::new();
        let ph = self.dialect.bind(&mut params, &pk.name, BindValue::from_text(id, pk)?, Some(pk.data_type));
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.fields(query),
            self.from_clause(query),
            self.dialect.column_ref(&self.entity.alias(), &pk.name),
            ph
        );
        Ok(QueryBuf::new(sql, params))
    }

    fn returned_columns(&self) -> Vec<(&str, DataType)> {
        self.entity
            .columns
            .iter()
            .map(|c| (c.name.as_str(), c.data_type))
            .collect()
    }

    fn row_by_key(&self, ph_value: Option<BindValue>) -> Result<QueryBuf, CompileError> {
        let pk = self.primary_key()?;
        let mut params = ParamSet::new();
        let rhs = match ph_value {
            Some(v) => self.dialect.bind(&mut params, &pk.name, v, Some(pk.data_type)),
            None => self.dialect.last_insert_id().unwrap_or("NULL").to_string(),
        };
        let cols = self
            .returned_columns()
            .into_iter()
            .map(|(c, data_type)| self.dialect.select_column(self.dialect.quote_ident(c), c, data_type))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {}",
            cols,
            self.table(),
            self.dialect.quote_ident(&pk.name),
            rhs
        );
        Ok(QueryBuf::new(sql, params))
    }

    fn writable_column(&self, name: &str) -> Result<Option<&'a Column>, QueryError> {
        let column = self.entity.column(name).ok_or_else(|| QueryError::UnknownColumn {
            entity: self.entity.name.clone(),
            column: name.to_string(),
        })?;
        Ok(if column.is_generated() { None } else { Some(column) })
    }

    /// POST: every submitted column except auto-number and computed ones.
    pub fn insert(&self, body: &Map<String, Value>) -> Result<QueryBuf, CompileError> {
        let mut params = ParamSet::new();
        let mut cols = Vec::new();
        let mut placeholders = Vec::new();
        let mut supplied_key = None;
        for (name, value) in body {
            let Some(column) = self.writable_column(name)? else { continue };
            let bound = BindValue::from_json(value, column)?;
            if column.is_primary_key() {
                supplied_key = Some(bound.clone());
            }
            placeholders.push(self.dialect.bind(&mut params, &column.name, bound, Some(column.data_type)));
            cols.push(self.dialect.quote_ident(&column.name));
        }
        let values = if cols.is_empty() {
            match self.dialect.family() {
                crate::sql::DatabaseFamily::MySql => "() VALUES ()".to_string(),
                _ => "DEFAULT VALUES".to_string(),
            }
        } else {
            format!("({}) VALUES ({})", cols.join(", "), placeholders.join(", "))
        };
        let table = self.table();
        let mut q = QueryBuf::new(String::new(), params);
        match self.dialect.row_return(&self.returned_columns()) {
            RowReturn::Suffix(suffix) => q.sql = format!("INSERT INTO {} {} {}", table, values, suffix),
            RowReturn::Output(output) => {
                q.sql = if cols.is_empty() {
                    format!("INSERT INTO {} {} DEFAULT VALUES", table, output)
                } else {
                    format!(
                        "INSERT INTO {} ({}) {} VALUES ({})",
                        table,
                        cols.join(", "),
                        output,
                        placeholders.join(", ")
                    )
                }
            }
            RowReturn::SelectBack => {
                q.sql = format!("INSERT INTO {} {}", table, values);
                if self.entity.primary_key().is_some() {
                    q.select_back = Some(Box::new(self.row_by_key(supplied_key)?));
                }
            }
        }
        Ok(q)
    }

    /// PUT: every submitted column except the primary key and generated columns.
    pub fn update(&self, id: &str, body: &Map<String, Value>) -> Result<QueryBuf, CompileError> {
        let sets: Vec<ColumnSet> = body
            .iter()
            .map(|(k, v)| ColumnSet {
                column: k.clone(),
                value: v.clone(),
            })
            .collect();
        self.update_columns(id, &sets)
    }

    /// PATCH: column assignments produced by one sub-patch.
    pub fn patch(&self, id: &str, sets: &[ColumnSet]) -> Result<QueryBuf, CompileError> {
        self.update_columns(id, sets)
    }

    fn update_columns(&self, id: &str, sets: &[ColumnSet]) -> Result<QueryBuf, CompileError> {
        let pk = self.primary_key()?;
        let key = BindValue::from_text(id, pk)?;
        let mut params = ParamSet::new();
        let mut assignments = Vec::new();
        for set in sets {
            let Some(column) = self.writable_column(&set.column)? else { continue };
            if column.is_primary_key() {
                continue;
            }
            let bound = BindValue::from_json(&set.value, column)?;
            let ph = self.dialect.bind(&mut params, &column.name, bound, Some(column.data_type));
            assignments.push(format!("{} = {}", self.dialect.quote_ident(&column.name), ph));
        }
        if assignments.is_empty() {
            // Nothing writable was submitted; return the current row.
            return self.row_by_key(Some(key));
        }
        let key_ph = self.dialect.bind(&mut params, &pk.name, key.clone(), Some(pk.data_type));
        let table = self.table();
        let set_clause = assignments.join(", ");
        let predicate = format!("{} = {}", self.dialect.quote_ident(&pk.name), key_ph);
        let mut q = QueryBuf::new(String::new(), params);
        match self.dialect.row_return(&self.returned_columns()) {
            RowReturn::Suffix(suffix) => {
                q.sql = format!("UPDATE {} SET {} WHERE {} {}", table, set_clause, predicate, suffix)
            }
            RowReturn::Output(output) => {
                q.sql = format!("UPDATE {} SET {} {} WHERE {}", table, set_clause, output, predicate)
            }
            RowReturn::SelectBack => {
                q.sql = format!("UPDATE {} SET {} WHERE {}", table, set_clause, predicate);
                q.select_back = Some(Box::new(self.row_by_key(Some(key))?));
            }
        }
        Ok(q)
    }

    /// DELETE: primary-key predicate only.
    pub fn delete(&self, id: &str) -> Result<QueryBuf, CompileError> {
        let pk = self.primary_key()?;
        let mut params = ParamSet::new();
        let ph = self.dialect.bind(&mut params, &pk.name, BindValue::from_text(id, pk)?, Some(pk.data_type));
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table(),
            self.dialect.quote_ident(&pk.name),
            ph
        );
        Ok(QueryBuf::new(sql, params))
    }
}
