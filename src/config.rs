use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub event_bus_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://mercachat.db?mode=rwc".to_string());

        let event_bus_capacity = env::var("EVENT_BUS_CAPACITY")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidEventBusCapacity)?;

        Ok(Config {
            database_url,
            event_bus_capacity,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("EVENT_BUS_CAPACITY is not a valid number")]
    InvalidEventBusCapacity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_is_unset() {
        env::remove_var("DATABASE_URL");
        env::remove_var("EVENT_BUS_CAPACITY");
        let config = Config::from_env().expect("defaults should parse");
        assert!(config.database_url.starts_with("sqlite://"));
        assert_eq!(config.event_bus_capacity, 1000);
    }
}
