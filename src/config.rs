use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// Thresholds given to the stock created alongside a new product.
    pub stock_default_minimal: i32,
    pub stock_default_max: i32,
    pub push_channel_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let stock_default_minimal = parse_or(&lookup, "STOCK_DEFAULT_MINIMAL", 1i32)?;
        let stock_default_max = parse_or(&lookup, "STOCK_DEFAULT_MAX", 25i32)?;
        let push_channel_capacity = parse_or(&lookup, "PUSH_CHANNEL_CAPACITY", 64usize)?;

        if stock_default_minimal < 0 || stock_default_max < stock_default_minimal {
            return Err(ConfigError::Invalid {
                name: "STOCK_DEFAULT_MAX",
                value: format!("{stock_default_minimal}..{stock_default_max}"),
            });
        }

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            stock_default_minimal,
            stock_default_max,
            push_channel_capacity: push_channel_capacity.max(1),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_values_are_absent() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.stock_default_minimal, 1);
        assert_eq!(config.stock_default_max, 25);
        assert_eq!(config.push_channel_capacity, 64);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn unparsable_port_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("JWT_SECRET", "secret"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn inverted_default_thresholds_are_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/stock"),
            ("JWT_SECRET", "secret"),
            ("STOCK_DEFAULT_MINIMAL", "30"),
            ("STOCK_DEFAULT_MAX", "10"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
