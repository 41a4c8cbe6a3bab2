//! Configuration management for Web Annotator

use serde::Deserialize;
use std::env;

use crate::anchoring::painter::HIGHLIGHT_BACKGROUND_ALPHA;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub highlight: HighlightSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HighlightSettings {
    /// Background alpha applied to palette colors
    pub alpha: f32,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite:./annotations.db".to_string(),
            },
            highlight: HighlightSettings {
                alpha: HIGHLIGHT_BACKGROUND_ALPHA,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("SERVER_PORT", 3000)?,
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:./annotations.db".to_string()),
            },
            highlight: HighlightSettings {
                alpha: parse_alpha(env::var("HIGHLIGHT_ALPHA").ok())?,
            },
        })
    }

    /// `host:port` the listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_alpha(raw: Option<String>) -> Result<f32, ConfigError> {
    let Some(value) = raw else {
        return Ok(HIGHLIGHT_BACKGROUND_ALPHA);
    };
    match value.trim().parse::<f32>() {
        Ok(alpha) if (0.0..=1.0).contains(&alpha) => Ok(alpha),
        _ => Err(ConfigError::InvalidValue {
            name: "HIGHLIGHT_ALPHA",
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.highlight.alpha, 0.5);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_alpha_must_be_a_fraction() {
        assert_eq!(parse_alpha(None).unwrap(), 0.5);
        assert_eq!(parse_alpha(Some(" 0.25 ".to_string())).unwrap(), 0.25);
        assert!(parse_alpha(Some("1.5".to_string())).is_err());
        assert!(parse_alpha(Some("dim".to_string())).is_err());
    }
}
