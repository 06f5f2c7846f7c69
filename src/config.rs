//! Runtime settings read from the environment (and `.env`, via `dotenvy`,
//! loaded by the binary before this runs).

use std::time::Duration;

use crate::error::{InvalidSettingSnafu, Result};
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, CountSource, ExportCountSource, GatewayCountSource};
use crate::table::TableLoader;

pub const DEFAULT_QUERIES_DIR: &str = "queries";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_USERS_FILE: &str = "users.json";
pub const DEFAULT_GEOGRAPHY_FILE: &str = "data_recintos.xlsx";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gateway_url: Option<String>,
    pub gateway_token: Option<String>,
    pub export_dir: Option<String>,
    pub queries_dir: String,
    pub query_timeout: Duration,
    pub users_file: String,
    pub geography_file: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            gateway_url: None,
            gateway_token: None,
            export_dir: None,
            queries_dir: DEFAULT_QUERIES_DIR.to_string(),
            query_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            users_file: DEFAULT_USERS_FILE.to_string(),
            geography_file: DEFAULT_GEOGRAPHY_FILE.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Settings::default();

        let query_timeout = match get("QUERY_TIMEOUT_SECS") {
            None => defaults.query_timeout,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return InvalidSettingSnafu {
                        key: "QUERY_TIMEOUT_SECS",
                        value: raw,
                    }
                    .fail();
                }
            },
        };

        Ok(Settings {
            gateway_url: get("SQL_GATEWAY_URL"),
            gateway_token: get("SQL_GATEWAY_TOKEN"),
            export_dir: get("COUNTS_EXPORT_DIR"),
            queries_dir: get("QUERIES_DIR").unwrap_or(defaults.queries_dir),
            query_timeout,
            users_file: get("USERS_FILE").unwrap_or(defaults.users_file),
            geography_file: get("GEOGRAPHY_FILE").unwrap_or(defaults.geography_file),
        })
    }

    /// The configured live count source. The gateway wins when both a gateway
    /// and an export directory are set.
    pub fn count_source(&self) -> Result<Option<Box<dyn CountSource>>> {
        if let Some(url) = &self.gateway_url {
            let client = BasicClient::new(self.query_timeout).map_err(|e| {
                InvalidSettingSnafu {
                    key: "SQL_GATEWAY_URL",
                    value: e.to_string(),
                }
                .build()
            })?;
            let source: Box<dyn CountSource> = match &self.gateway_token {
                Some(token) => Box::new(GatewayCountSource::new(
                    ApiKey::bearer(client, token)?,
                    url.clone(),
                )),
                None => Box::new(GatewayCountSource::new(client, url.clone())),
            };
            return Ok(Some(source));
        }

        Ok(self
            .export_dir
            .as_ref()
            .map(|dir| Box::new(ExportCountSource::new(dir)) as Box<dyn CountSource>))
    }

    /// Table loader for `geography`, or the configured geography file.
    pub fn table_loader(&self, geography: Option<&str>) -> Result<TableLoader> {
        Ok(TableLoader {
            geography_path: geography.unwrap_or(&self.geography_file).to_string(),
            queries_dir: self.queries_dir.clone(),
            timeout: self.query_timeout,
            source: self.count_source()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.query_timeout, Duration::from_secs(30));
        assert!(s.count_source().unwrap().is_none());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let s = settings(&[("SQL_GATEWAY_URL", "  "), ("QUERIES_DIR", "")]).unwrap();
        assert_eq!(s.gateway_url, None);
        assert_eq!(s.queries_dir, "queries");
    }

    #[test]
    fn test_invalid_timeout() {
        assert!(settings(&[("QUERY_TIMEOUT_SECS", "soon")]).is_err());
        assert!(settings(&[("QUERY_TIMEOUT_SECS", "0")]).is_err());
        let s = settings(&[("QUERY_TIMEOUT_SECS", "5")]).unwrap();
        assert_eq!(s.query_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_gateway_preferred_over_export() {
        let s = settings(&[
            ("SQL_GATEWAY_URL", "http://localhost:8080/query"),
            ("SQL_GATEWAY_TOKEN", "t0ken"),
            ("COUNTS_EXPORT_DIR", "exports"),
        ])
        .unwrap();
        let source = s.count_source().unwrap().unwrap();
        assert!(source.describe().starts_with("gateway"));
        assert!(source.requires_sql());
    }

    #[test]
    fn test_export_source() {
        let s = settings(&[("COUNTS_EXPORT_DIR", "exports")]).unwrap();
        let loader = s.table_loader(Some("recintos.csv")).unwrap();
        assert_eq!(loader.geography_path, "recintos.csv");
        let source = loader.source.unwrap();
        assert_eq!(source.describe(), "export exports");
        assert!(!source.requires_sql());
    }
}
