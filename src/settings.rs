//! Process settings from environment variables.

use crate::error::ConfigError;
use crate::event_log::AuditTable;
use crate::query::PagingLimits;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    /// Writer connection (`DATABASE_URL`).
    pub database_url: String,
    /// Reader connection (`DATABASE_READ_URL`), defaults to the writer.
    pub database_read_url: String,
    pub catalog_path: PathBuf,
    /// Optional; without grants only role headers confer permissions.
    pub grants_path: Option<PathBuf>,
    pub bind_addr: String,
    pub limits: PagingLimits,
    pub audit: AuditTable,
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    /// `DBREST_TRUST_ROLE_HEADERS`; when false only grants confer access.
    pub trust_role_headers: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; used by `from_env` and tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let database_url = get("DATABASE_URL").ok_or(ConfigError::InvalidSetting {
            key: "DATABASE_URL",
            message: "must be set".into(),
        })?;
        let database_read_url = get("DATABASE_READ_URL").unwrap_or_else(|| database_url.clone());
        let catalog_path = PathBuf::from(get("DBREST_CATALOG_PATH").unwrap_or_else(|| "catalog.json".into()));
        let grants_path = get("DBREST_GRANTS_PATH").map(PathBuf::from);
        let bind_addr = get("DBREST_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());

        let defaults = PagingLimits::default();
        let limits = PagingLimits {
            min_record_limit: parse_or("DBREST_MIN_RECORD_LIMIT", get("DBREST_MIN_RECORD_LIMIT"), defaults.min_record_limit)?,
            max_record_limit: parse_or("DBREST_MAX_RECORD_LIMIT", get("DBREST_MAX_RECORD_LIMIT"), defaults.max_record_limit)?,
        };
        if limits.min_record_limit < 1 || limits.min_record_limit > limits.max_record_limit {
            return Err(ConfigError::InvalidSetting {
                key: "DBREST_MIN_RECORD_LIMIT",
                message: format!(
                    "must be between 1 and the max record limit ({})",
                    limits.max_record_limit
                ),
            });
        }

        let audit_defaults = AuditTable::default();
        let audit = AuditTable {
            schema: get("DBREST_AUDIT_SCHEMA").unwrap_or(audit_defaults.schema),
            table: get("DBREST_AUDIT_TABLE").unwrap_or(audit_defaults.table),
        };
        let timeout_secs: u64 = parse_or("DBREST_REQUEST_TIMEOUT_SECS", get("DBREST_REQUEST_TIMEOUT_SECS"), 30)?;
        let max_body_bytes = parse_or("DBREST_MAX_BODY_BYTES", get("DBREST_MAX_BODY_BYTES"), 2 * 1024 * 1024)?;
        let trust_role_headers = match get("DBREST_TRUST_ROLE_HEADERS") {
            None => true,
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidSetting {
                        key: "DBREST_TRUST_ROLE_HEADERS",
                        message: format!("'{}' is not a boolean", v),
                    })
                }
            },
        };

        Ok(Settings {
            database_url,
            database_read_url,
            catalog_path,
            grants_path,
            bind_addr,
            limits,
            audit,
            request_timeout: Duration::from_secs(timeout_secs),
            max_body_bytes,
            trust_role_headers,
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidSetting {
            key,
            message: format!("'{}' is not a valid number", v),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_in() {
        let s = Settings::from_lookup(lookup(&[("DATABASE_URL", "postgres://w")])).unwrap();
        assert_eq!(s.database_read_url, "postgres://w");
        assert_eq!(s.limits, PagingLimits::default());
        assert_eq!(s.audit, AuditTable::default());
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert!(s.grants_path.is_none());
        assert!(s.trust_role_headers);
    }

    #[test]
    fn overrides_are_read() {
        let s = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://w"),
            ("DATABASE_READ_URL", "postgres://r"),
            ("DBREST_MAX_RECORD_LIMIT", "1000"),
            ("DBREST_AUDIT_TABLE", "events"),
        ]))
        .unwrap();
        assert_eq!(s.database_read_url, "postgres://r");
        assert_eq!(s.limits.max_record_limit, 1000);
        assert_eq!(s.audit.table, "events");

        let s = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://w"),
            ("DBREST_TRUST_ROLE_HEADERS", "false"),
        ]))
        .unwrap();
        assert!(!s.trust_role_headers);
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DATABASE_URL", "x"), ("DBREST_TRUST_ROLE_HEADERS", "maybe")])),
            Err(ConfigError::InvalidSetting { key: "DBREST_TRUST_ROLE_HEADERS", .. })
        ));
    }

    #[test]
    fn missing_url_and_bad_numbers_fail() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[])),
            Err(ConfigError::InvalidSetting { key: "DATABASE_URL", .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DATABASE_URL", "x"), ("DBREST_MAX_BODY_BYTES", "lots")])),
            Err(ConfigError::InvalidSetting { key: "DBREST_MAX_BODY_BYTES", .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DATABASE_URL", "x"), ("DBREST_MIN_RECORD_LIMIT", "9000")])),
            Err(ConfigError::InvalidSetting { key: "DBREST_MIN_RECORD_LIMIT", .. })
        ));
    }
}
