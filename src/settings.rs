//! Handles settings for the server. Configuration is read from an optional
//! `settings.toml` and from `TRIPSPLIT__`-prefixed environment variables,
//! e.g. `TRIPSPLIT__MONGODB__URI`. `MONGODB_URI` is still honoured.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::balance::AggregationPolicy;

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct MongoDb {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub mongodb: MongoDb,
    pub app: App,
    #[serde(default)]
    pub settlement: AggregationPolicy,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::with_file("settings")
    }

    pub fn with_file(name: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.bind", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("mongodb.database", "TripSplit")?
            .set_default("app.level", "info")?
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix("TRIPSPLIT").separator("__"))
            .set_override_option("mongodb.uri", std::env::var("MONGODB_URI").ok())?
            .build()?;

        settings.try_deserialize()
    }
}
