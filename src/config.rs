use std::env;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    /// Key-value store backend; in-memory when unset.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub admin_username: String,
    pub admin_password: String,

    /// How long an attendance attempt survives without being torn down.
    pub attempt_ttl_secs: u64,
    /// Overrides the bundled employee seed.
    pub employee_seed_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            access_token_ttl: parse_or("ACCESS_TOKEN_TTL", 900)?, // default 15 min

            rate_login_per_min: parse_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            admin_username: env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string()),

            attempt_ttl_secs: parse_or("ATTEMPT_TTL_SECS", 600)?,
            employee_seed_path: env::var("EMPLOYEE_SEED_PATH").ok(),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: None,
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            rate_login_per_min: 1000,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            attempt_ttl_secs: 60,
            employee_seed_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_uses_default_when_unset() {
        let v: u32 = parse_or("HRM_GEOFENCE_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(v, 42);
    }

    #[test]
    fn parse_or_rejects_garbage() {
        // SAFETY: the key is unique to this test.
        unsafe { env::set_var("HRM_GEOFENCE_TEST_BAD_NUMBER", "ten") };
        let err = parse_or::<u32>("HRM_GEOFENCE_TEST_BAD_NUMBER", 1).unwrap_err();
        assert!(err.to_string().contains("HRM_GEOFENCE_TEST_BAD_NUMBER"));
    }
}
