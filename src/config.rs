use crate::sqlite::filter::FilterPolicy;

use anyhow::{anyhow, Context, Result};

///
/// Server configuration
/// # Fields
/// * `host` - the address to bind to, env `HOST`, default `0.0.0.0`
/// * `port` - the port to bind to, env `PORT`, default `8080`
/// * `db_file` - the database file, env `DB_FILE`, default `m2band.db`
/// * `strict_filters` - apply [FilterPolicy::Strict] to caller expressions,
///   env `STRICT_FILTERS`, default off
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_file: String,
    pub strict_filters: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            db_file: "m2band.db".to_string(),
            strict_filters: false,
        }
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow!(
            "{} must be one of 1/true/yes or 0/false/no, got '{}'",
            name,
            other
        )),
    }
}

impl ServerConfig {
    ///
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    ///
    /// Build the configuration from any key-value source, unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port
                .trim()
                .parse()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?;
        }
        if let Some(db_file) = lookup("DB_FILE") {
            config.db_file = db_file;
        }
        if let Some(flag) = lookup("STRICT_FILTERS") {
            config.strict_filters = parse_flag("STRICT_FILTERS", &flag)?;
        }
        Ok(config)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        if self.strict_filters {
            FilterPolicy::Strict
        } else {
            FilterPolicy::Trusted
        }
    }
}
