use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_WEATHER_FEED_URL: &str =
    "https://www.ilmateenistus.ee/ilma_andmed/xml/observations.php";
pub const DEFAULT_IMPORT_CRON: &str = "0 15 * * * *";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub weather_feed_url: String,
    pub import_cron: String,
    pub weather_http_timeout_secs: u64,
    pub seed_default_fees: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        Ok(Config {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            weather_feed_url: env::var("WEATHER_FEED_URL").unwrap_or(defaults.weather_feed_url),
            import_cron: env::var("WEATHER_IMPORT_CRON").unwrap_or(defaults.import_cron),
            weather_http_timeout_secs: match env::var("WEATHER_HTTP_TIMEOUT_SECS") {
                Ok(value) => value.trim().parse().map_err(|_| {
                    anyhow::anyhow!("WEATHER_HTTP_TIMEOUT_SECS must be a whole number of seconds")
                })?,
                Err(_) => defaults.weather_http_timeout_secs,
            },
            seed_default_fees: match env::var("SEED_DEFAULT_FEES") {
                Ok(value) => parse_flag(&value)
                    .ok_or_else(|| anyhow::anyhow!("SEED_DEFAULT_FEES must be true or false"))?,
                Err(_) => defaults.seed_default_fees,
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./delivery_fee.db?mode=rwc".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            weather_feed_url: DEFAULT_WEATHER_FEED_URL.to_string(),
            import_cron: DEFAULT_IMPORT_CRON.to_string(),
            weather_http_timeout_secs: 30,
            seed_default_fees: true,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
