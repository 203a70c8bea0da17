//! Shared fixture: customers <- orders <- orderdetails in schema `sales`, plus a view.

#![allow(dead_code)]

use dbrest::catalog::{catalog_from_json, SchemaCatalog};

pub const CATALOG: &str = r#"{
    "schemas": [{
        "name": "sales",
        "entities": [
            {"name": "customers", "columns": [
                {"name": "ID", "type": "integer", "primary_key": true, "auto_number": true},
                {"name": "Name", "type": "text"},
                {"name": "Age", "type": "integer"},
                {"name": "CreatedAt", "type": "timestamptz"}
            ]},
            {"name": "orders", "columns": [
                {"name": "OrderID", "type": "integer", "primary_key": true, "auto_number": true},
                {"name": "CustomerID", "type": "integer", "foreign_key": true, "references": "customers"},
                {"name": "Total", "type": "decimal"}
            ]},
            {"name": "orderdetails", "columns": [
                {"name": "DetailID", "type": "integer", "primary_key": true},
                {"name": "OrderID", "type": "integer", "foreign_key": true, "references": "orders"},
                {"name": "Sku", "type": "text"}
            ]}
        ],
        "views": [
            {"name": "customer_totals", "columns": [
                {"name": "ID", "type": "integer"},
                {"name": "Total", "type": "decimal"}
            ]}
        ]
    }]
}"#;

pub fn catalog() -> SchemaCatalog {
    catalog_from_json(CATALOG).expect("fixture catalog is valid")
}

/// Same catalog without the orderdetails -> orders foreign key.
pub fn catalog_without_detail_fk() -> SchemaCatalog {
    let text = CATALOG.replace(
        r#"{"name": "OrderID", "type": "integer", "foreign_key": true, "references": "orders"}"#,
        r#"{"name": "OrderID", "type": "integer"}"#,
    );
    catalog_from_json(&text).expect("fixture catalog is valid")
}
