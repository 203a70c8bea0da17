use super::{DatabaseFamily, Dialect, RowReturn};
use crate::catalog::DataType;

/// PostgreSQL: `"x"` identifiers, `$n::type` placeholders, ILIKE, RETURNING.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresDialect;

/// Cast applied to placeholders so the server never has to guess a parameter type.
pub fn pg_cast(data_type: DataType) -> Option<&'static str> {
    Some(match data_type {
        DataType::Integer => "bigint",
        DataType::Decimal => "numeric",
        DataType::Float => "double precision",
        DataType::Text => "text",
        DataType::Boolean => "boolean",
        DataType::DateTime => "timestamptz",
        DataType::Date => "date",
        DataType::Time => "time",
        DataType::Uuid => "uuid",
        DataType::Json => "jsonb",
        DataType::Other => return None,
    })
}

impl Dialect for PostgresDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::Postgres
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn placeholder(&self, index: usize, _name: &str, data_type: Option<DataType>) -> String {
        match data_type.and_then(pg_cast) {
            Some(cast) => format!("${}::{}", index, cast),
            None => format!("${}", index),
        }
    }

    fn pattern_match(&self, column: &str, placeholder: &str, data_type: DataType) -> String {
        if data_type == DataType::Text {
            format!("{} ILIKE {}", column, placeholder)
        } else {
            format!("{}::text ILIKE {}", column, placeholder)
        }
    }

    fn row_return(&self, columns: &[(&str, DataType)]) -> RowReturn {
        let list = columns
            .iter()
            .map(|(c, data_type)| self.select_column(self.quote_ident(c), c, *data_type))
            .collect::<Vec<_>>()
            .join(", ");
        RowReturn::Suffix(format!("RETURNING {}", list))
    }

    /// sqlx has no NUMERIC decoder without a decimal crate; text keeps every digit.
    fn read_back(&self, expr: &str, data_type: DataType) -> Option<String> {
        match data_type {
            DataType::Decimal => Some(format!("{}::text", expr)),
            _ => None,
        }
    }
}
