use anyhow::Result;
use autoscale_cuckoo_filter::CuckooFilter;
use std::sync::{PoisonError, RwLock};

use crate::model::employee::normalize_username as normalize;
use crate::store::employees::EmployeeRepo;

/// Expected capacity and false-positive rate.
/// Tune these based on real employee counts.
const FILTER_CAPACITY: usize = 100_000;
const FALSE_POSITIVE_RATE: f64 = 0.001;

/// Fast negative answer for "does any employee log in with this username?".
pub struct UsernameFilter {
    filter: RwLock<CuckooFilter<String>>,
}

impl Default for UsernameFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl UsernameFilter {
    pub fn new() -> Self {
        Self {
            filter: RwLock::new(CuckooFilter::new(FILTER_CAPACITY, FALSE_POSITIVE_RATE)),
        }
    }

    /// Check if a username might exist (false positives possible)
    pub fn might_exist(&self, username: &str) -> bool {
        let username = normalize(username);
        self.filter
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&username)
    }

    pub fn insert(&self, username: &str) {
        let username = normalize(username);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(&username);
    }

    pub fn remove(&self, username: &str) {
        let username = normalize(username);
        self.filter
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&username);
    }

    /// Loads every employee username, `batch_size` per write lock.
    pub async fn warmup(&self, employees: &EmployeeRepo, batch_size: usize) -> Result<()> {
        let usernames: Vec<String> = employees
            .all()
            .await?
            .into_iter()
            .filter_map(|e| e.username)
            .map(|u| normalize(&u))
            .collect();

        for batch in usernames.chunks(batch_size.max(1)) {
            self.insert_batch(batch);
        }

        log::info!("Username filter warmup complete: {} employees", usernames.len());
        Ok(())
    }

    /// Insert a batch of normalized usernames
    fn insert_batch(&self, usernames: &[String]) {
        let mut filter = self.filter.write().unwrap_or_else(PoisonError::into_inner);

        for username in usernames {
            filter.add(username);
        }
    }
}
