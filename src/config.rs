//! Configuration for the engine.
//!
//! CLI arguments and environment variable handling using clap, so an
//! embedding service can flatten these into its own argument set.

use clap::Parser;

/// Engine configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "upline")]
#[command(about = "Tiered referral commission and leveling engine")]
pub struct EngineConfig {
    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "upline")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Bounded internal retries for conflicts and transient store failures
    #[arg(long, env = "RETRY_ATTEMPTS", default_value = "3")]
    pub retry_attempts: u32,
}

impl EngineConfig {
    /// Parse from the process environment, honoring a `.env` file if present.
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.retry_attempts == 0 {
            return Err("RETRY_ATTEMPTS must be at least 1".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: "mongodb://localhost:27017".to_string(),
            mongodb_db: "upline".to_string(),
            log_level: "info".to_string(),
            retry_attempts: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_retries_rejected() {
        let config = EngineConfig {
            retry_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
