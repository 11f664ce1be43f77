use serde::{Deserialize, Serialize};
use tokio::fs;

fn default_port() -> u16 {
    3306
}

/// Connection descriptor for the database being backed up. Sourced from
/// externally managed configuration and never persisted by this crate.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the completed `.sql` dump files.
    pub basedir: String,
    /// Salt for download capability tokens.
    pub token_salt: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub backup: StoreConfig,
}

impl Config {
    pub async fn new(path: &str) -> Result<Config, Box<dyn std::error::Error>> {
        let config_str = fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }
}
