use super::{DatabaseFamily, Dialect, RowReturn};
use crate::catalog::DataType;

/// MySQL / MariaDB: backtick identifiers, positional `?`, no RETURNING.
#[derive(Clone, Copy, Debug, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::MySql
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("`{}`", ident.replace('`', "``"))
    }

    fn placeholder(&self, _index: usize, _name: &str, _data_type: Option<DataType>) -> String {
        "?".to_string()
    }

    fn pattern_match(&self, column: &str, placeholder: &str, _data_type: DataType) -> String {
        format!("LOWER({}) LIKE LOWER({})", column, placeholder)
    }

    fn row_return(&self, _columns: &[(&str, DataType)]) -> RowReturn {
        RowReturn::SelectBack
    }

    fn last_insert_id(&self) -> Option<&'static str> {
        Some("LAST_INSERT_ID()")
    }
}
