//! Deployment configuration.
//!
//! Everything is sourced from environment variables (a `.env` file is
//! loaded in `main` via dotenvy). The defaults match a stock single-pilot
//! deployment so the gateway comes up without any configuration.

use std::env;

/// Identity and credentials for the single pilot this instance serves.
#[derive(Debug, Clone)]
pub struct Config {
    /// Airline code reported in login replies.
    pub airline_icao: String,
    pub first_name: String,
    pub last_name: String,
    pub rank_level: String,
    pub rank_string: String,
    /// Login id the client presents as the `userid` query parameter.
    pub userid: String,
    /// Login password the client presents as a form field, never in the
    /// query string.
    pub password: String,
    /// Gates the `verifysession` action used by the client's chat feature.
    pub enable_chat: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            airline_icao: "AAA".to_string(),
            first_name: "Airline".to_string(),
            last_name: "Pilot".to_string(),
            rank_level: "captain".to_string(),
            rank_string: "Captain".to_string(),
            userid: "userid".to_string(),
            password: "password".to_string(),
            enable_chat: false,
        }
    }
}

impl Config {
    /// Build a config from the environment, falling back to the stock
    /// identity for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            airline_icao: env_or("AIRLINE_ICAO", defaults.airline_icao),
            first_name: env_or("FIRST_NAME", defaults.first_name),
            last_name: env_or("LAST_NAME", defaults.last_name),
            rank_level: env_or("RANK_LEVEL", defaults.rank_level),
            rank_string: env_or("RANK_STRING", defaults.rank_string),
            userid: env_or("USERID", defaults.userid),
            password: env_or("PASSWORD", defaults.password),
            enable_chat: env::var("ENABLE_CHAT")
                .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.enable_chat),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}
