use super::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub admin: Option<AdminBootstrapConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub public_url: Option<String>,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            public_url: None,
            cors_origins: Vec::new(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub conn_string: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn sqlite_file(path: impl Into<String>) -> Self {
        Self {
            filename: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DbType::Postgres
        } else {
            DbType::Sqlite
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref conn) = self.conn_string {
            conn.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.max_connections,
            DbType::Sqlite => Some(1),
        }
    }

    pub fn min_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.min_connections,
            DbType::Sqlite => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_image_bytes: default_max_image_bytes(),
            max_video_bytes: default_max_video_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhatsAppConfig {
    #[serde(default = "default_whatsapp_phone")]
    pub phone: String,
    #[serde(default = "default_currency")]
    pub currency: String,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            phone: default_whatsapp_phone(),
            currency: default_currency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_session_max_age")]
    pub max_age_secs: i64,
    #[serde(default = "default_cookie_secure")]
    pub secure: bool,
    #[serde(default = "default_same_site")]
    pub same_site: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            max_age_secs: default_session_max_age(),
            secure: default_cookie_secure(),
            same_site: default_same_site(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminBootstrapConfig {
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(alias = "console", default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Shortest password accepted for an admin account.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Upper bound for `session.max_age_secs` (one year).
pub const MAX_SESSION_AGE_SECS: i64 = 60 * 60 * 24 * 365;

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Self::from_yaml_with_env(content, |key| std::env::var(key).ok())
    }

    /// Parses `content`, applies overrides resolved through `lookup` and
    /// validates the result.
    pub fn from_yaml_with_env<F>(content: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = serde_yaml::from_str(content)?;
        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "storage.root cannot be empty".to_string(),
            ));
        }

        let phone = &self.whatsapp.phone;
        if !(8..=15).contains(&phone.len()) || !phone.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidConfig(
                "whatsapp.phone must be 8 to 15 digits in international format".to_string(),
            ));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "session.cookie_name cannot be empty".to_string(),
            ));
        }

        if !(1..=MAX_SESSION_AGE_SECS).contains(&self.session.max_age_secs) {
            return Err(ConfigError::InvalidConfig(format!(
                "session.max_age_secs must be between 1 and {MAX_SESSION_AGE_SECS}"
            )));
        }

        if !matches!(
            self.session.same_site.to_ascii_lowercase().as_str(),
            "strict" | "lax" | "none"
        ) {
            return Err(ConfigError::InvalidConfig(format!(
                "session.same_site must be strict, lax or none, got {}",
                self.session.same_site
            )));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidConfig(format!(
                "logging.format must be pretty or json, got {}",
                self.logging.format
            )));
        }

        if let Some(admin) = &self.admin {
            if admin.username.trim().is_empty() || admin.password.expose_secret().is_empty() {
                return Err(ConfigError::InvalidConfig(
                    "admin.username and admin.password cannot be empty".to_string(),
                ));
            }
            if admin.password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
                return Err(ConfigError::InvalidConfig(format!(
                    "admin.password must be at least {MIN_PASSWORD_LEN} characters"
                )));
            }
        }

        Ok(())
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Some(value) = lookup("TOUR_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(value);
        }
        if let Some(value) = lookup("TOUR_WHATSAPP_PHONE") {
            self.whatsapp.phone = value;
        }
        if let Some(value) = lookup("TOUR_ADMIN_PASSWORD") {
            if let Some(admin) = self.admin.as_mut() {
                admin.password = SecretString::from(value);
            }
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_video_bytes() -> u64 {
    200 * 1024 * 1024
}

fn default_whatsapp_phone() -> String {
    "966500000000".to_string()
}

fn default_currency() -> String {
    "SAR".to_string()
}

fn default_cookie_name() -> String {
    "admin_session".to_string()
}

fn default_session_max_age() -> i64 {
    60 * 60 * 24 * 7
}

fn default_cookie_secure() -> bool {
    true
}

fn default_same_site() -> String {
    "none".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(yaml: &str) -> Result<Config, ConfigError> {
        Config::from_yaml_with_env(yaml, no_env)
    }

    const MINIMAL: &str = r#"
database:
  filename: tours.db
"#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = parse(MINIMAL).expect("minimal config");

        assert_eq!(config.server.port, 8787);
        assert_eq!(config.session.cookie_name, "admin_session");
        assert_eq!(config.session.max_age_secs, 604_800);
        assert_eq!(config.whatsapp.currency, "SAR");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.admin.is_none());
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse(include_str!("../../config.example.yaml"))
            .expect("example config");

        assert_eq!(config.server.cors_origins, vec!["https://tours.example.com"]);
        assert_eq!(config.session.same_site, "none");
        assert_eq!(config.storage.max_video_bytes, 209_715_200);
    }

    #[test]
    fn sqlite_file_resolves_plain_path() {
        let config = DatabaseConfig::sqlite_file("tours.db");

        assert_eq!(config.db_type(), DbType::Sqlite);
        assert_eq!(config.connection_string(), "sqlite://tours.db");
        assert_eq!(config.sqlite_path().as_deref(), Some("tours.db"));
        assert_eq!(config.max_connections(), Some(1));
    }

    #[test]
    fn postgres_url_selects_postgres_backend() {
        let config = DatabaseConfig {
            url: Some("postgres://tours@localhost/tours".to_string()),
            max_connections: Some(8),
            ..DatabaseConfig::default()
        };

        assert_eq!(config.db_type(), DbType::Postgres);
        assert_eq!(config.max_connections(), Some(8));
        assert!(config.sqlite_path().is_none());
    }

    #[test]
    fn rejects_zero_port() {
        let yaml = format!("{MINIMAL}server:\n  port: 0\n");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("server.port"));
    }

    #[test]
    fn rejects_non_numeric_whatsapp_phone() {
        let yaml = format!("{MINIMAL}whatsapp:\n  phone: \"+966 50\"\n");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("whatsapp.phone"));
    }

    #[test]
    fn rejects_unknown_log_format() {
        let yaml = format!("{MINIMAL}logging:\n  format: xml\n");
        assert!(parse(&yaml).is_err());
    }

    #[test]
    fn parses_admin_bootstrap() {
        let yaml = format!(
            "{MINIMAL}admin:\n  username: owner\n  password: s3cret-pass\n  email: owner@example.com\n"
        );
        let config = parse(&yaml).expect("config with admin");
        let admin = config.admin.expect("admin section");

        assert_eq!(admin.username, "owner");
        assert_eq!(admin.email.as_deref(), Some("owner@example.com"));
    }

    #[test]
    fn rejects_short_admin_password() {
        let yaml = format!("{MINIMAL}admin:\n  username: owner\n  password: s3cret\n");
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("admin.password"));
    }

    #[test]
    fn rejects_session_age_beyond_a_year() {
        let yaml = format!("{MINIMAL}session:\n  max_age_secs: {}\n", MAX_SESSION_AGE_SECS + 1);
        let err = parse(&yaml).unwrap_err();
        assert!(err.to_string().contains("session.max_age_secs"));

        let yaml = format!("{MINIMAL}session:\n  max_age_secs: {MAX_SESSION_AGE_SECS}\n");
        assert!(parse(&yaml).is_ok());
    }

    #[test]
    fn environment_overrides_replace_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "postgres://tours@db/tours"),
            ("TOUR_STORAGE_ROOT", "/srv/media"),
            ("TOUR_WHATSAPP_PHONE", "971500000001"),
            ("TOUR_ADMIN_PASSWORD", "from-the-env"),
        ]);
        let yaml = format!("{MINIMAL}admin:\n  username: owner\n  password: from-the-file\n");

        let config = Config::from_yaml_with_env(&yaml, |key| env.get(key).map(|v| v.to_string()))
            .expect("config with overrides");

        assert_eq!(config.database.db_type(), DbType::Postgres);
        assert_eq!(config.storage.root, PathBuf::from("/srv/media"));
        assert_eq!(config.whatsapp.phone, "971500000001");
        let admin = config.admin.expect("admin section");
        assert_eq!(admin.password.expose_secret(), "from-the-env");
    }

    #[test]
    fn overridden_values_are_validated() {
        let err = Config::from_yaml_with_env(MINIMAL, |key| {
            (key == "TOUR_WHATSAPP_PHONE").then(|| "not-a-phone".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("whatsapp.phone"));
    }
}
