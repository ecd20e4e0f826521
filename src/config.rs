use crate::domain::Decimal;
use crate::engine::ScoreWeights;
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub db_max_connections: u32,
    pub upstream_api_url: String,
    pub sync_page_size: i64,
    pub recalc_batch_size: i64,
    pub recalc_concurrency: usize,
    pub score_weights: ScoreWeights,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_or<T: FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    expected: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.trim())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), format!("must be {}", expected)))
}

fn positive_or<T>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let value: T = parse_or(env_map, key, default, "a positive integer")?;
    if value <= T::default() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive integer".to_string(),
        ));
    }
    Ok(value)
}

fn weight(env_map: &HashMap<String, String>, key: &str, default: &str) -> Result<Decimal, ConfigError> {
    let value: Decimal = parse_or(env_map, key, default, "a decimal")?;
    if value.is_negative() {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_or::<u16>(&env_map, "PORT", "8080", "a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let upstream_api_url = env_map
            .get("UPSTREAM_API_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("UPSTREAM_API_URL".to_string()))?;

        let db_max_connections = positive_or::<u32>(&env_map, "DB_MAX_CONNECTIONS", "5")?;
        let sync_page_size = positive_or::<i64>(&env_map, "SYNC_PAGE_SIZE", "1000")?;
        let recalc_batch_size = positive_or::<i64>(&env_map, "RECALC_BATCH_SIZE", "500")?;
        let recalc_concurrency = positive_or::<usize>(&env_map, "RECALC_CONCURRENCY", "4")?;

        let score_weights = ScoreWeights {
            recency_horizon_days: positive_or::<i64>(&env_map, "SCORE_RECENCY_HORIZON_DAYS", "30")?,
            timeliness_recency: weight(&env_map, "TIMELINESS_RECENCY_WEIGHT", "0.6")?,
            timeliness_punctuality: weight(&env_map, "TIMELINESS_PUNCTUALITY_WEIGHT", "0.4")?,
            health_timeliness: weight(&env_map, "HEALTH_TIMELINESS_WEIGHT", "0.4")?,
            health_collection: weight(&env_map, "HEALTH_COLLECTION_WEIGHT", "0.4")?,
            health_punctuality: weight(&env_map, "HEALTH_PUNCTUALITY_WEIGHT", "0.2")?,
        };
        score_weights
            .validate()
            .map_err(|reason| ConfigError::InvalidValue("score weights".to_string(), reason))?;

        Ok(Config {
            port,
            database_path,
            db_max_connections,
            upstream_api_url,
            sync_page_size,
            recalc_batch_size,
            recalc_concurrency,
            score_weights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map.insert(
            "UPSTREAM_API_URL".to_string(),
            "http://upstream.local/api".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.sync_page_size, 1000);
        assert_eq!(config.recalc_batch_size, 500);
        assert_eq!(config.recalc_concurrency, 4);
        assert_eq!(config.score_weights, ScoreWeights::default());
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_missing_upstream_api_url() {
        let mut env_map = setup_required_env();
        env_map.remove("UPSTREAM_API_URL");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "UPSTREAM_API_URL"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("RECALC_CONCURRENCY".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RECALC_CONCURRENCY"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("HEALTH_COLLECTION_WEIGHT".to_string(), "-0.4".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "HEALTH_COLLECTION_WEIGHT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_all_zero_timeliness_weights_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("TIMELINESS_RECENCY_WEIGHT".to_string(), "0".to_string());
        env_map.insert("TIMELINESS_PUNCTUALITY_WEIGHT".to_string(), "0".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::InvalidValue(_, _))
        ));
    }

    #[test]
    fn test_custom_weights() {
        let mut env_map = setup_required_env();
        env_map.insert("SCORE_RECENCY_HORIZON_DAYS".to_string(), "14".to_string());
        env_map.insert("HEALTH_PUNCTUALITY_WEIGHT".to_string(), "0.5".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.score_weights.recency_horizon_days, 14);
        assert_eq!(
            config.score_weights.health_punctuality,
            Decimal::from_str("0.5").unwrap()
        );
    }
}
