//! Catalog validation: unique entity names, single primary key, foreign keys resolve.

use crate::catalog::SchemaCatalog;
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(catalog: &SchemaCatalog) -> Result<(), ConfigError> {
    for schema in &catalog.schemas {
        let mut names = HashSet::new();
        for entity in schema.all_entities() {
            if !names.insert(entity.name.to_lowercase()) {
                return Err(ConfigError::DuplicateEntity {
                    schema: schema.name.clone(),
                    entity: entity.name.clone(),
                });
            }
            if entity.columns.iter().filter(|c| c.is_primary_key()).count() > 1 {
                return Err(ConfigError::MultiplePrimaryKeys(entity.name.clone()));
            }
        }
    }

    for entity in catalog.entities() {
        for column in &entity.columns {
            if !column.flags.foreign_key {
                continue;
            }
            let target = column.references.as_deref().ok_or_else(|| ConfigError::MissingReference {
                kind: "foreign key target",
                id: format!("{}.{}", entity.name, column.name),
            })?;
            if catalog.related_entity(&entity.schema, target).is_none() {
                return Err(ConfigError::MissingReference {
                    kind: "table",
                    id: target.to_string(),
                });
            }
        }
    }

    Ok(())
}
