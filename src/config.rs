// src/config.rs

use std::env;
use std::str::FromStr;

use dotenvy::dotenv;

/// Which persistence backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// What happens to templates when a pool they reference is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolDeletePolicy {
    /// Refuse the delete with a conflict while any template references the pool.
    Block,
    /// Remove the pool's selection from every referencing template.
    Cascade,
}

impl FromStr for PoolDeletePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(PoolDeletePolicy::Block),
            "cascade" => Ok(PoolDeletePolicy::Cascade),
            other => Err(format!("unknown pool delete policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub pool_delete_policy: PoolDeletePolicy,
    /// Shuffle answer order per participant at launch.
    pub shuffle_answers: bool,
    pub access_code_length: usize,
    /// Per-IP rate limit on the participant routes. `None` disables it.
    pub rate_limit_per_second: Option<u64>,
    pub rate_limit_burst: u32,
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt_secret: String::new(),
            jwt_expiration: 86_400,
            rust_log: "info".to_string(),
            port: 3000,
            pool_delete_policy: PoolDeletePolicy::Block,
            shuffle_answers: true,
            access_code_length: 8,
            rate_limit_per_second: None,
            rate_limit_burst: 10,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://127.0.0.1:5173".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = Config::default();

        let store_backend = env::var("STORE_BACKEND")
            .map(|v| v.parse().expect("STORE_BACKEND must be 'memory' or 'postgres'"))
            .unwrap_or(defaults.store_backend);

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            panic!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .map(|v| v.parse().expect("JWT_EXPIRATION must be a number of seconds"))
            .unwrap_or(defaults.jwt_expiration);

        let rust_log = env::var("RUST_LOG").unwrap_or(defaults.rust_log);

        let port = env::var("PORT")
            .map(|v| v.parse().expect("PORT must be a valid port number"))
            .unwrap_or(defaults.port);

        let pool_delete_policy = env::var("POOL_DELETE_POLICY")
            .map(|v| v.parse().expect("POOL_DELETE_POLICY must be 'block' or 'cascade'"))
            .unwrap_or(defaults.pool_delete_policy);

        let shuffle_answers = env::var("SHUFFLE_ANSWERS")
            .map(|v| v.parse().expect("SHUFFLE_ANSWERS must be 'true' or 'false'"))
            .unwrap_or(defaults.shuffle_answers);

        let access_code_length = env::var("ACCESS_CODE_LENGTH")
            .map(|v| v.parse().expect("ACCESS_CODE_LENGTH must be a number"))
            .unwrap_or(defaults.access_code_length);
        if !(6..=12).contains(&access_code_length) {
            panic!("ACCESS_CODE_LENGTH must be between 6 and 12");
        }

        let rate_limit_per_second = env::var("RATE_LIMIT_PER_SECOND")
            .ok()
            .map(|v| v.parse().expect("RATE_LIMIT_PER_SECOND must be a number"));

        let rate_limit_burst = env::var("RATE_LIMIT_BURST")
            .map(|v| v.parse().expect("RATE_LIMIT_BURST must be a number"))
            .unwrap_or(defaults.rate_limit_burst);

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);

        Self {
            store_backend,
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            pool_delete_policy,
            shuffle_answers,
            access_code_length,
            rate_limit_per_second,
            rate_limit_burst,
            cors_origins,
        }
    }
}
