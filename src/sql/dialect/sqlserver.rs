use super::{DatabaseFamily, Dialect, RowReturn};
use crate::catalog::DataType;
use crate::query::PagingToken;

/// SQL Server: `[x]` identifiers, `@name` placeholders, OFFSET/FETCH, OUTPUT INSERTED.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn family(&self) -> DatabaseFamily {
        DatabaseFamily::SqlServer
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn placeholder(&self, _index: usize, name: &str, _data_type: Option<DataType>) -> String {
        format!("@{}", name)
    }

    fn pattern_match(&self, column: &str, placeholder: &str, _data_type: DataType) -> String {
        format!("LOWER({}) LIKE LOWER({})", column, placeholder)
    }

    /// LIKE metacharacters are escaped by wrapping them in brackets.
    fn escape_like(&self, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for c in raw.chars() {
            match c {
                '[' => out.push_str("[[]"),
                '%' => out.push_str("[%]"),
                '_' => out.push_str("[_]"),
                c => out.push(c),
            }
        }
        out
    }

    /// OFFSET/FETCH requires an ORDER BY; a constant one is supplied when none exists.
    fn paging_clause(&self, paging: &PagingToken, ordered: bool) -> String {
        let fetch = format!(
            "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
            paging.offset, paging.limit
        );
        if ordered {
            fetch
        } else {
            format!("ORDER BY (SELECT NULL) {}", fetch)
        }
    }

    fn row_return(&self, columns: &[(&str, DataType)]) -> RowReturn {
        let list = columns
            .iter()
            .map(|(c, _)| format!("INSERTED.{}", self.quote_ident(c)))
            .collect::<Vec<_>>()
            .join(", ");
        RowReturn::Output(format!("OUTPUT {}", list))
    }
}
