use super::{DatabaseFamily, Dialect, RowReturn};
use crate::catalog::DataType;

/// SQLite: `"x"` identifiers, `:name` placeholders, LIKE with explicit escape, RETURNING.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::Sqlite
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    /// Single database file; schema names from the catalog are not attached databases.
    fn qualified_table(&self, _schema: &str, table: &str) -> String {
        self.quote_ident(table)
    }

    fn placeholder(&self, _index: usize, name: &str, _data_type: Option<DataType>) -> String {
        format!(":{}", name)
    }

    fn pattern_match(&self, column: &str, placeholder: &str, _data_type: DataType) -> String {
        format!("{} LIKE {} ESCAPE '\\'", column, placeholder)
    }

    fn row_return(&self, columns: &[(&str, DataType)]) -> RowReturn {
        let list = columns.iter().map(|(c, _)| self.quote_ident(c)).collect::<Vec<_>>().join(", ");
        RowReturn::Suffix(format!("RETURNING {}", list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_placeholders() {
        assert_eq!(SqliteDialect.placeholder(1, "Age_2", None), ":Age_2");
    }

    #[test]
    fn like_declares_escape_character() {
        assert_eq!(
            SqliteDialect.pattern_match(r#""t"."Name""#, ":Name", DataType::Text),
            r#""t"."Name" LIKE :Name ESCAPE '\'"#
        );
    }

    #[test]
    fn tables_are_not_schema_qualified() {
        assert_eq!(SqliteDialect.qualified_table("sales", "orders"), r#""orders""#);
    }
}
