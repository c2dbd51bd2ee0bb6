//! Everything a request handler needs, built once at start-up and handed to
//! actix as `Data<AppContext>`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::db::init_db;
use crate::geofence::attempt::AttemptRegistry;
use crate::geofence::sequencer::SequenceTiming;
use crate::model::employee::Employee;
use crate::store::employees::EmployeeRepo;
use crate::store::{KvStore, MemoryStore, MySqlStore};
use crate::utils::username_filter::UsernameFilter;

const BUNDLED_SEED: &str = include_str!("../data/employees_data.json");

pub struct AppContext {
    pub store: Arc<dyn KvStore>,
    pub employees: EmployeeRepo,
    pub usernames: UsernameFilter,
    pub attempts: AttemptRegistry,
}

impl AppContext {
    pub fn new(store: Arc<dyn KvStore>, attempt_ttl: Duration, timing: SequenceTiming) -> Self {
        Self {
            employees: EmployeeRepo::new(store.clone()),
            store,
            usernames: UsernameFilter::new(),
            attempts: AttemptRegistry::new(attempt_ttl, timing),
        }
    }

    /// Opens the configured store, seeds employees on first run and warms the username filter.
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        let store: Arc<dyn KvStore> = match &config.database_url {
            Some(url) => {
                let pool = init_db(url).await.context("Failed to connect to database")?;
                let store = MySqlStore::new(pool);
                store.ensure_schema().await.context("Failed to prepare kv_store table")?;
                info!("Using MySQL key-value store");
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set, using in-memory key-value store");
                Arc::new(MemoryStore::new())
            }
        };

        let ctx = Self::new(
            store,
            Duration::from_secs(config.attempt_ttl_secs),
            SequenceTiming::default(),
        );

        let seed = load_seed(config.employee_seed_path.as_deref())?;
        if ctx.employees.seed_if_absent(&seed).await? {
            info!(count = seed.len(), "Seeded employee records");
        }

        ctx.usernames.warmup(&ctx.employees, 100).await?;

        Ok(ctx)
    }
}

fn load_seed(path: Option<&str>) -> Result<Vec<Employee>> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read employee seed {path}"))?,
        None => BUNDLED_SEED.to_string(),
    };
    serde_json::from_str(&raw).context("Employee seed is not a valid employee list")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_seed_parses() {
        let seed = load_seed(None).unwrap();
        assert!(!seed.is_empty());
        assert!(seed.iter().all(|e| e.password.is_none()));
        let mut ids: Vec<_> = seed.iter().map(|e| e.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), seed.len());
    }

    #[actix_web::test]
    async fn bootstrap_without_database_seeds_memory_store() {
        let ctx = AppContext::bootstrap(&Config::for_tests()).await.unwrap();
        let all = ctx.employees.all().await.unwrap();
        assert_eq!(all.len(), load_seed(None).unwrap().len());

        let username = all
            .iter()
            .find_map(|e| e.username.clone())
            .unwrap();
        assert!(ctx.usernames.might_exist(&username));
    }
}
