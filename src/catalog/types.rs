//! Schema catalog: schemas, entities (tables and views) and columns with key flags.
//! Deserializes from the catalog JSON document; views are normalized on load.

use serde::{Deserialize, Serialize};

/// Logical column type. Drives literal coercion in filters and placeholder casts in SQL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Decimal,
    Float,
    Text,
    Boolean,
    #[serde(alias = "timestamp", alias = "timestamptz")]
    DateTime,
    Date,
    Time,
    Uuid,
    Json,
    #[serde(other)]
    Other,
}

impl DataType {
    /// Human readable name used in literal errors.
    pub fn describe(self) -> &'static str {
        match self {
            DataType::Integer => "an integer",
            DataType::Decimal | DataType::Float => "a number",
            DataType::Text => "text",
            DataType::Boolean => "true or false",
            DataType::DateTime => "an ISO-8601 date/time",
            DataType::Date => "a date (YYYY-MM-DD)",
            DataType::Time => "a time (HH:MM:SS)",
            DataType::Uuid => "a uuid",
            DataType::Json => "json",
            DataType::Other => "a value",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFlags {
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub foreign_key: bool,
    #[serde(default)]
    pub auto_number: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    #[serde(flatten)]
    pub flags: ColumnFlags,
    /// Referenced table for foreign keys, either `table` or `schema.table`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
}

impl Column {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Column {
            name: name.to_string(),
            data_type,
            flags: ColumnFlags::default(),
            references: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.flags.primary_key = true;
        self.flags.unique = true;
        self.flags.indexed = true;
        self
    }

    pub fn auto_number(mut self) -> Self {
        self.flags.auto_number = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.flags.computed = true;
        self
    }

    pub fn references(mut self, table: &str) -> Self {
        self.flags.foreign_key = true;
        self.references = Some(table.to_string());
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags.primary_key
    }

    /// Columns the database fills in; never written from a request body.
    pub fn is_generated(&self) -> bool {
        self.flags.auto_number || self.flags.computed
    }

    /// True when this column is a foreign key pointing at `entity`.
    pub fn references_entity(&self, entity: &Entity) -> bool {
        if !self.flags.foreign_key {
            return false;
        }
        let Some(target) = self.references.as_deref() else {
            return false;
        };
        match target.split_once('.') {
            Some((schema, table)) => {
                schema.eq_ignore_ascii_case(&entity.schema) && table.eq_ignore_ascii_case(&entity.name)
            }
            None => target.eq_ignore_ascii_case(&entity.name),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// Owning schema; filled from the enclosing schema on load.
    #[serde(default)]
    pub schema: String,
    #[serde(default)]
    pub read_only: bool,
    pub columns: Vec<Column>,
}

impl Entity {
    pub fn new(schema: &str, name: &str, columns: Vec<Column>) -> Self {
        Entity {
            name: name.to_string(),
            schema: schema.to_string(),
            read_only: false,
            columns,
        }
    }

    /// Case-insensitive column lookup.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary_key())
    }

    /// Deterministic table alias shared by the fields, sort, filter and include compilers.
    pub fn alias(&self) -> String {
        table_alias(&self.name)
    }

    fn normalize_as_view(&mut self) {
        self.read_only = true;
        for c in &mut self.columns {
            c.flags.computed = true;
        }
    }
}

pub fn table_alias(entity_name: &str) -> String {
    format!("t_{}", entity_name)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub views: Vec<Entity>,
}

impl Schema {
    /// Tables first, then views.
    pub fn all_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().chain(self.views.iter())
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.all_entities().find(|e| e.name.eq_ignore_ascii_case(name))
    }
}

/// Immutable snapshot of the database structure, shared read-only across requests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub schemas: Vec<Schema>,
}

impl SchemaCatalog {
    /// Build a catalog, filling owning-schema names and normalizing views. Call `validate` afterwards.
    pub fn new(schemas: Vec<Schema>) -> Self {
        let mut catalog = SchemaCatalog { schemas };
        catalog.normalize();
        catalog
    }

    pub(crate) fn normalize(&mut self) {
        for schema in &mut self.schemas {
            for entity in &mut schema.entities {
                entity.schema = schema.name.clone();
            }
            for view in &mut schema.views {
                view.schema = schema.name.clone();
                view.normalize_as_view();
            }
        }
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Entity by domain (schema) and name, both case-insensitive.
    pub fn entity(&self, schema: &str, name: &str) -> Option<&Entity> {
        self.schema(schema).and_then(|s| s.entity(name))
    }

    /// Resolve a related entity name: same schema first, then any schema.
    pub fn related_entity(&self, from_schema: &str, name: &str) -> Option<&Entity> {
        if let Some((schema, table)) = name.split_once('.') {
            return self.entity(schema, table);
        }
        self.entity(from_schema, name).or_else(|| {
            self.schemas
                .iter()
                .flat_map(|s| s.all_entities())
                .find(|e| e.name.eq_ignore_ascii_case(name))
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.schemas.iter().flat_map(|s| s.all_entities())
    }
}
