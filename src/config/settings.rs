//! Process-wide settings from environment variables.
//!
//! Every tenant database shares host, port and credentials with the shared
//! (auth) database; only the database name differs per tenant.

use crate::error::ConfigError;
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-ID";

/// Where the tenant signal is read from on inbound requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TenantSource {
    /// A request header, `X-Tenant-ID` unless overridden.
    Header(String),
    /// First label of the `Host` header (`topsteel.erp.example.com`).
    Subdomain,
}

#[derive(Clone)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Shared database holding the tenant registry and users.
    pub shared_database: String,
    pub pool_max: u32,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    /// Prefix for provisioned tenant database names (`erp_topsteel_` + code).
    pub tenant_db_prefix: String,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("shared_database", &self.shared_database)
            .field("pool_max", &self.pool_max)
            .field("connect_timeout", &self.connect_timeout)
            .field("query_timeout", &self.query_timeout)
            .field("tenant_db_prefix", &self.tenant_db_prefix)
            .finish()
    }
}

impl DatabaseSettings {
    /// Connection options for the named database, all other parameters shared.
    pub fn connect_options(&self, database: &str) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(database)
    }

    pub fn shared_connect_options(&self) -> PgConnectOptions {
        self.connect_options(&self.shared_database)
    }

    /// Physical database name for a newly provisioned tenant code.
    pub fn tenant_database_name(&self, code: &str) -> String {
        format!("{}{}", self.tenant_db_prefix, code.to_lowercase())
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            host: "localhost".into(),
            port: 5432,
            username: "postgres".into(),
            password: String::new(),
            shared_database: "erp_topsteel_auth".into(),
            pool_max: 10,
            connect_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(30),
            tenant_db_prefix: "erp_topsteel_".into(),
        }
    }
}

#[derive(Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub tenant_source: TenantSource,
    pub bind_addr: String,
    /// When set, admin routes require it in `X-Admin-Token`.
    pub admin_token: Option<String>,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("database", &self.database)
            .field("tenant_source", &self.tenant_source)
            .field("bind_addr", &self.bind_addr)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database: DatabaseSettings::default(),
            tenant_source: TenantSource::Header(DEFAULT_TENANT_HEADER.into()),
            bind_addr: "0.0.0.0:3002".into(),
            admin_token: None,
        }
    }
}

impl Settings {
    /// Read settings from the process environment. Call `dotenvy::dotenv()` first to honour `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let db = defaults.database;
        let var = |key: &str, fallback: String| lookup(key).filter(|v| !v.is_empty()).unwrap_or(fallback);

        let database = DatabaseSettings {
            host: var("DB_HOST", db.host),
            port: parse_var(&lookup, "DB_PORT", db.port)?,
            username: var("DB_USERNAME", db.username),
            password: lookup("DB_PASSWORD").unwrap_or(db.password),
            shared_database: var("DB_AUTH_NAME", db.shared_database),
            pool_max: parse_var(&lookup, "DB_POOL_MAX", db.pool_max)?,
            connect_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                db.connect_timeout.as_secs(),
            )?),
            query_timeout: Duration::from_secs(parse_var(
                &lookup,
                "DB_QUERY_TIMEOUT_SECS",
                db.query_timeout.as_secs(),
            )?),
            tenant_db_prefix: var("TENANT_DB_PREFIX", db.tenant_db_prefix),
        };
        if database.pool_max == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_POOL_MAX",
                reason: "must be at least 1".into(),
            });
        }

        let header = var("TENANT_HEADER", DEFAULT_TENANT_HEADER.into());
        let tenant_source = match lookup("TENANT_SOURCE").as_deref().map(str::trim) {
            None | Some("") => TenantSource::Header(header),
            Some(s) if s.eq_ignore_ascii_case("header") => TenantSource::Header(header),
            Some(s) if s.eq_ignore_ascii_case("subdomain") => TenantSource::Subdomain,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "TENANT_SOURCE",
                    reason: format!("{} (expected header or subdomain)", other),
                })
            }
        };

        Ok(Settings {
            database,
            tenant_source,
            bind_addr: var("BIND_ADDR", defaults.bind_addr),
            admin_token: lookup("ADMIN_TOKEN").map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        })
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{}: {}", raw, e),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.database.host, "localhost");
        assert_eq!(settings.database.port, 5432);
        assert_eq!(settings.database.shared_database, "erp_topsteel_auth");
        assert_eq!(settings.tenant_source, TenantSource::Header("X-Tenant-ID".into()));
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "6543"),
            ("DB_POOL_MAX", "4"),
            ("TENANT_SOURCE", "subdomain"),
        ]))
        .unwrap();
        assert_eq!(settings.database.host, "db.internal");
        assert_eq!(settings.database.port, 6543);
        assert_eq!(settings.database.pool_max, 4);
        assert_eq!(settings.tenant_source, TenantSource::Subdomain);
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let err = Settings::from_lookup(lookup_from(&[("DB_PORT", "not-a-port")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DB_PORT", .. }));
        let err = Settings::from_lookup(lookup_from(&[("TENANT_SOURCE", "cookie")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "TENANT_SOURCE", .. }));
        let err = Settings::from_lookup(lookup_from(&[("DB_POOL_MAX", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DB_POOL_MAX", .. }));
    }

    #[test]
    fn tenant_database_name_uses_prefix_and_lowercase_code() {
        let db = DatabaseSettings::default();
        assert_eq!(db.tenant_database_name("TOPSTEEL"), "erp_topsteel_topsteel");
    }

    #[test]
    fn debug_output_hides_password() {
        let db = DatabaseSettings {
            password: "hunter2".into(),
            ..DatabaseSettings::default()
        };
        assert!(!format!("{:?}", db).contains("hunter2"));
    }

    #[test]
    fn admin_token_is_optional_and_hidden() {
        assert_eq!(Settings::from_lookup(lookup_from(&[("ADMIN_TOKEN", "  ")])).unwrap().admin_token, None);
        let settings = Settings::from_lookup(lookup_from(&[("ADMIN_TOKEN", "s3cret")])).unwrap();
        assert_eq!(settings.admin_token.as_deref(), Some("s3cret"));
        assert!(!format!("{:?}", settings).contains("s3cret"));
    }
}
