//! Handles settings for the application. Configuration is read from
//! `settings.toml` in the working directory, then overridden by
//! `AYOQSH__SECTION__KEY` environment variables.
//!
//! See `settings.toml` for the configuration.
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
    pub timezone: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
    pub session_ttl_hours: i64,
    pub check_validity_days: i64,
    /// Minutes between two sweeps of overdue checks.
    pub expire_interval_minutes: u64,
}

#[derive(Debug, Deserialize)]
pub struct Telegram {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
    pub telegram: Option<Telegram>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::build(
            Config::builder()
                .add_source(File::with_name("settings").required(false))
                .add_source(
                    Environment::with_prefix("AYOQSH")
                        .separator("__")
                        .try_parsing(true),
                ),
        )
    }

    fn build(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .set_default("app.level", "info")?
            .set_default("app.timezone", "Asia/Tashkent")?
            .set_default("server.port", 3000)?
            .set_default("server.database.sqlite", "ayoqsh.db")?
            .set_default("server.session_ttl_hours", 24)?
            .set_default("server.check_validity_days", 30)?
            .set_default("server.expire_interval_minutes", 60)?
            .build()?
            .try_deserialize()
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.app
            .timezone
            .parse()
            .map_err(|err| ConfigError::Message(format!("invalid app.timezone: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, ConfigError> {
        Settings::build(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_fill_missing_keys() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.server.port, 3000);
        assert_eq!(
            settings.server.database,
            Database::Sqlite("ayoqsh.db".to_string())
        );
        assert_eq!(settings.server.check_validity_days, 30);
        assert!(settings.telegram.is_none());
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Asia::Tashkent);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = from_toml(
            r#"
            [app]
            level = "debug"
            timezone = "Europe/Rome"

            [server]
            bind = "0.0.0.0"
            port = 8080
            session_ttl_hours = 12

            [telegram]
            token = "123:abc"
            "#,
        )
        .unwrap();
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.server.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.session_ttl_hours, 12);
        assert_eq!(settings.telegram.as_ref().map(|t| t.token.as_str()), Some("123:abc"));
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Rome);
    }

    #[test]
    fn unknown_timezone_is_an_error() {
        let settings = from_toml("[app]\ntimezone = \"Mars/Olympus\"").unwrap();
        assert!(settings.timezone().is_err());
    }
}
