pub use self::parser::{
    AdminBootstrapConfig, Config, DatabaseConfig, DbType, LoggingConfig, MAX_SESSION_AGE_SECS,
    MIN_PASSWORD_LEN, ServerConfig, SessionConfig, StorageConfig, WhatsAppConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
