use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use friends_common::graph::RequestRateLimit;
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub static CONF: Lazy<Config> = Lazy::new(|| match Config::from_env() {
    Ok(c) => c,
    #[cfg(test)]
    Err(_) => Config::testing(),
    #[cfg(not(test))]
    Err(e) => panic!("Failed to load config: {e}"),
});

const DB_USERNAME_VAR: &str = "FRIENDS_DB_USERNAME";
const DB_PASSWORD_VAR: &str = "FRIENDS_DB_PASSWORD";
const DB_HOSTNAME_VAR: &str = "FRIENDS_DB_HOSTNAME";
const DB_PORT_VAR: &str = "FRIENDS_DB_PORT";
const DB_NAME_VAR: &str = "FRIENDS_DB_NAME";
const DB_MAX_CONNECTIONS_VAR: &str = "FRIENDS_DB_MAX_CONNECTIONS";
const DB_IDLE_TIMEOUT_SECS_VAR: &str = "FRIENDS_DB_IDLE_TIMEOUT_SECS";

const HASHING_KEY_VAR: &str = "FRIENDS_HASHING_KEY_B64";
const TOKEN_SIGNING_KEY_VAR: &str = "FRIENDS_TOKEN_SIGNING_KEY_B64";

const HASH_LENGTH_VAR: &str = "FRIENDS_HASH_LENGTH";
const HASH_ITERATIONS_VAR: &str = "FRIENDS_HASH_ITERATIONS";
const HASH_MEM_COST_KIB_VAR: &str = "FRIENDS_HASH_MEM_COST_KIB";
const HASH_THREADS_VAR: &str = "FRIENDS_HASH_THREADS";
const HASH_SALT_LENGTH_VAR: &str = "FRIENDS_HASH_SALT_LENGTH";

const ACCESS_TOKEN_LIFETIME_DAYS_VAR: &str = "FRIENDS_ACCESS_TOKEN_LIFETIME_DAYS";

const FRIEND_REQUEST_LIMIT_VAR: &str = "FRIENDS_FRIEND_REQUEST_LIMIT";
const FRIEND_REQUEST_WINDOW_SECS_VAR: &str = "FRIENDS_FRIEND_REQUEST_WINDOW_SECS";

const ACTIX_WORKER_COUNT_VAR: &str = "FRIENDS_ACTIX_WORKER_COUNT";
const LOG_LEVEL_VAR: &str = "FRIENDS_LOG_LEVEL";
const HEALTH_ENDPOINT_KEY_VAR: &str = "FRIENDS_HEALTH_ENDPOINT_KEY";

const HASHING_KEY_SIZE: usize = 32;
const TOKEN_SIGNING_KEY_SIZE: usize = 64;

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ConfigDb {
    pub database_uri: String,
    #[zeroize(skip)]
    pub max_connections: u32,
    #[zeroize(skip)]
    pub idle_timeout: Duration,
}

#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ConfigKeys {
    pub hashing_key: [u8; HASHING_KEY_SIZE],
    pub token_signing_key: [u8; TOKEN_SIGNING_KEY_SIZE],
}

pub struct ConfigHashing {
    pub hash_length: u32,
    pub hash_iterations: u32,
    pub hash_mem_cost_kib: u32,
    pub hash_threads: u32,
    pub salt_length: u32,
}

pub struct ConfigLifetimes {
    pub access_token_lifetime: Duration,
}

pub struct ConfigWorkers {
    pub actix_workers: usize,
}

pub struct Config {
    pub db: ConfigDb,
    pub keys: ConfigKeys,
    pub hashing: ConfigHashing,
    pub lifetimes: ConfigLifetimes,
    pub friend_requests: RequestRateLimit,
    pub workers: ConfigWorkers,
    pub log_level: String,
    pub health_endpoint_key: Zeroizing<String>,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let hashing_key = decode_key::<HASHING_KEY_SIZE>(HASHING_KEY_VAR)?;
        let token_signing_key = decode_key::<TOKEN_SIGNING_KEY_SIZE>(TOKEN_SIGNING_KEY_VAR)?;

        let db_password = Zeroizing::new(env_var::<String>(DB_PASSWORD_VAR)?);
        let database_uri = format!(
            "postgres://{}:{}@{}:{}/{}",
            env_var::<String>(DB_USERNAME_VAR)?,
            db_password.as_str(),
            env_var::<String>(DB_HOSTNAME_VAR)?,
            env_var::<u16>(DB_PORT_VAR)?,
            env_var::<String>(DB_NAME_VAR)?,
        );

        let friend_requests = friend_request_limit(
            env_var_or(FRIEND_REQUEST_LIMIT_VAR, 3)?,
            env_var_or(FRIEND_REQUEST_WINDOW_SECS_VAR, 60)?,
        )?;

        Ok(Config {
            db: ConfigDb {
                database_uri,
                max_connections: env_var_or(DB_MAX_CONNECTIONS_VAR, 48)?,
                idle_timeout: Duration::from_secs(env_var_or(DB_IDLE_TIMEOUT_SECS_VAR, 30)?),
            },
            keys: ConfigKeys {
                hashing_key,
                token_signing_key,
            },
            hashing: ConfigHashing {
                hash_length: env_var_or(HASH_LENGTH_VAR, 32)?,
                hash_iterations: env_var_or(HASH_ITERATIONS_VAR, 2)?,
                hash_mem_cost_kib: env_var_or(HASH_MEM_COST_KIB_VAR, 65536)?,
                hash_threads: env_var_or(HASH_THREADS_VAR, 1)?,
                salt_length: env_var_or(HASH_SALT_LENGTH_VAR, 16)?,
            },
            lifetimes: ConfigLifetimes {
                access_token_lifetime: Duration::from_secs(
                    env_var_or(ACCESS_TOKEN_LIFETIME_DAYS_VAR, 7)? * 86400,
                ),
            },
            friend_requests,
            workers: ConfigWorkers {
                actix_workers: env_var_or(ACTIX_WORKER_COUNT_VAR, num_cpus::get())?,
            },
            log_level: env_var_or(LOG_LEVEL_VAR, String::from("info"))?,
            health_endpoint_key: Zeroizing::new(env_var(HEALTH_ENDPOINT_KEY_VAR)?),
        })
    }

    /// Used by tests when the environment does not provide a configuration. DB settings are
    /// still read from the environment so that ignored DB tests can run against a real server.
    #[cfg(test)]
    pub fn testing() -> Config {
        let var_or = |key, default: &str| std::env::var(key).unwrap_or(String::from(default));

        let database_uri = format!(
            "postgres://{}:{}@{}:{}/{}",
            var_or(DB_USERNAME_VAR, "postgres"),
            var_or(DB_PASSWORD_VAR, "postgres"),
            var_or(DB_HOSTNAME_VAR, "localhost"),
            var_or(DB_PORT_VAR, "5432"),
            var_or(DB_NAME_VAR, "friends_test"),
        );

        Config {
            db: ConfigDb {
                database_uri,
                max_connections: 8,
                idle_timeout: Duration::from_secs(30),
            },
            keys: ConfigKeys {
                hashing_key: [7; HASHING_KEY_SIZE],
                token_signing_key: [11; TOKEN_SIGNING_KEY_SIZE],
            },
            hashing: ConfigHashing {
                hash_length: 32,
                hash_iterations: 1,
                hash_mem_cost_kib: 128,
                hash_threads: 1,
                salt_length: 16,
            },
            lifetimes: ConfigLifetimes {
                access_token_lifetime: Duration::from_secs(7 * 86400),
            },
            friend_requests: RequestRateLimit::default(),
            workers: ConfigWorkers { actix_workers: 1 },
            log_level: String::from("debug"),
            health_endpoint_key: Zeroizing::new(String::from("test-health-key")),
        }
    }
}

/// A zero limit would block every send and a zero window would never count one.
fn friend_request_limit(
    max_requests: u32,
    window_secs: u64,
) -> Result<RequestRateLimit, ConfigError> {
    if max_requests == 0 {
        return Err(ConfigError::InvalidVar(FRIEND_REQUEST_LIMIT_VAR));
    }

    if window_secs == 0 {
        return Err(ConfigError::InvalidVar(FRIEND_REQUEST_WINDOW_SECS_VAR));
    }

    Ok(RequestRateLimit {
        max_requests,
        window: Duration::from_secs(window_secs),
    })
}

fn decode_key<const N: usize>(key: &'static str) -> Result<[u8; N], ConfigError> {
    let decoded = Zeroizing::new(
        b64.decode(Zeroizing::new(env_var::<String>(key)?).as_bytes())
            .map_err(|_| ConfigError::InvalidVar(key))?,
    );

    decoded
        .get(..N)
        .and_then(|k| <[u8; N]>::try_from(k).ok())
        .ok_or(ConfigError::InvalidVar(key))
}

fn env_var<T: FromStr>(key: &'static str) -> Result<T, ConfigError> {
    let var = Zeroizing::new(std::env::var(key).map_err(|_| ConfigError::MissingVar(key))?);
    var.parse().map_err(|_| ConfigError::InvalidVar(key))
}

/// Falls back to `default` only when the variable is unset. A value that is set but does not
/// parse is an error.
fn env_var_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env_var(key) {
        Err(ConfigError::MissingVar(_)) => Ok(default),
        r => r,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingVar(&'static str),
    InvalidVar(&'static str),
}

impl std::error::Error for ConfigError {}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVar(key) => write!(f, "Missing environment variable '{key}'"),
            Self::InvalidVar(key) => write!(f, "Environment variable '{key}' is invalid"),
        }
    }
}
