use std::sync::Arc;

use futures::lock::Mutex;

use crate::model::employee::{Employee, normalize_username};

use super::{KvStore, StoreError, get_json, set_json};

pub const EMPLOYEE_KEY: &str = "employees_data";

pub const DEFAULT_PAGE_SIZE: u32 = 6;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Employee records, all kept in one JSON array.
///
/// Every mutation is a read-modify-write of the whole array, serialised by
/// `write_lock` so two admins saving at once do not drop each other's edits.
/// Username uniqueness is checked inside that same critical section.
pub struct EmployeeRepo {
    store: Arc<dyn KvStore>,
    write_lock: Mutex<()>,
}

#[derive(Debug, PartialEq)]
pub struct EmployeePage {
    pub data: Vec<Employee>,
    pub page: u32,
    pub per_page: u32,
    pub total: usize,
    pub has_more: bool,
}

impl EmployeeRepo {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn all(&self) -> Result<Vec<Employee>, StoreError> {
        Ok(get_json(self.store.as_ref(), EMPLOYEE_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Writes `seed` only when nothing is stored yet. Returns whether it did.
    pub async fn seed_if_absent(&self, seed: &[Employee]) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        if self.store.get(EMPLOYEE_KEY).await?.is_some() {
            return Ok(false);
        }
        set_json(self.store.as_ref(), EMPLOYEE_KEY, seed).await?;
        Ok(true)
    }

    /// 1-based page over the stored order. `has_more` is true when the page came back full.
    pub async fn page(&self, page: u32, per_page: u32) -> Result<EmployeePage, StoreError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        let all = self.all().await?;
        let total = all.len();

        let start = ((page - 1) as usize).saturating_mul(per_page as usize);
        let data: Vec<Employee> = all
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();
        let has_more = data.len() == per_page as usize;

        Ok(EmployeePage {
            data,
            page,
            per_page,
            total,
            has_more,
        })
    }

    pub async fn find(&self, id: u64) -> Result<Option<Employee>, StoreError> {
        Ok(self.all().await?.into_iter().find(|e| e.id == id))
    }

    /// Usernames compare after [`normalize_username`].
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Employee>, StoreError> {
        let wanted = normalize_username(username);
        Ok(self
            .all()
            .await?
            .into_iter()
            .find(|e| e.has_username(&wanted)))
    }

    /// Replaces the record with the same id, or appends it. Returns the record it replaced.
    ///
    /// Fails with [`StoreError::UsernameTaken`] when another record already uses the username.
    pub async fn upsert(&self, employee: Employee) -> Result<Option<Employee>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.all().await?;
        ensure_username_free(&all, &employee)?;

        let previous = match all.iter_mut().find(|e| e.id == employee.id) {
            Some(slot) => Some(std::mem::replace(slot, employee)),
            None => {
                all.push(employee);
                None
            }
        };

        set_json(self.store.as_ref(), EMPLOYEE_KEY, &all).await?;
        Ok(previous)
    }

    /// Appends a new record under the next free id, with the same username rule as `upsert`.
    pub async fn insert_with<F>(&self, build: F) -> Result<Employee, StoreError>
    where
        F: FnOnce(u64) -> Employee,
    {
        let _guard = self.write_lock.lock().await;
        let mut all = self.all().await?;

        let id = all.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let employee = build(id);
        ensure_username_free(&all, &employee)?;
        all.push(employee.clone());

        set_json(self.store.as_ref(), EMPLOYEE_KEY, &all).await?;
        Ok(employee)
    }

    pub async fn delete(&self, id: u64) -> Result<Option<Employee>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.all().await?;

        let Some(pos) = all.iter().position(|e| e.id == id) else {
            return Ok(None);
        };
        let removed = all.remove(pos);

        set_json(self.store.as_ref(), EMPLOYEE_KEY, &all).await?;
        Ok(Some(removed))
    }
}

fn ensure_username_free(all: &[Employee], candidate: &Employee) -> Result<(), StoreError> {
    let Some(username) = candidate.username.as_deref() else {
        return Ok(());
    };
    let wanted = normalize_username(username);
    if all
        .iter()
        .any(|other| other.id != candidate.id && other.has_username(&wanted))
    {
        return Err(StoreError::UsernameTaken(username.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveTime;

    fn employee(id: u64, username: Option<&str>) -> Employee {
        Employee {
            id,
            name: format!("Employee {id}"),
            email: format!("e{id}@company.com"),
            role: "Engineer".into(),
            arrival_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            username: username.map(str::to_string),
            password: None,
        }
    }

    fn repo() -> EmployeeRepo {
        EmployeeRepo::new(Arc::new(MemoryStore::new()))
    }

    #[actix_web::test]
    async fn seeds_only_once() {
        let repo = repo();
        assert!(repo.seed_if_absent(&[employee(1, None)]).await.unwrap());
        assert!(!repo.seed_if_absent(&[employee(2, None)]).await.unwrap());

        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, 1);
    }

    #[actix_web::test]
    async fn pages_follow_infinite_scroll_contract() {
        let repo = repo();
        let seed: Vec<_> = (1..=14).map(|id| employee(id, None)).collect();
        repo.seed_if_absent(&seed).await.unwrap();

        let first = repo.page(1, DEFAULT_PAGE_SIZE).await.unwrap();
        assert_eq!(first.data.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
        assert!(first.has_more);
        assert_eq!(first.total, 14);

        let third = repo.page(3, DEFAULT_PAGE_SIZE).await.unwrap();
        assert_eq!(third.data.iter().map(|e| e.id).collect::<Vec<_>>(), vec![13, 14]);
        assert!(!third.has_more);

        let beyond = repo.page(9, DEFAULT_PAGE_SIZE).await.unwrap();
        assert!(beyond.data.is_empty());

        let clamped = repo.page(0, 0).await.unwrap();
        assert_eq!((clamped.page, clamped.per_page), (1, 1));
    }

    #[actix_web::test]
    async fn upsert_replaces_or_appends() {
        let repo = repo();
        repo.seed_if_absent(&[employee(1, Some("ayesha"))]).await.unwrap();

        let mut changed = employee(1, Some("ayesha"));
        changed.role = "Lead".into();
        let previous = repo.upsert(changed).await.unwrap();
        assert_eq!(previous.map(|e| e.role), Some("Engineer".to_string()));

        assert_eq!(repo.upsert(employee(5, None)).await.unwrap(), None);

        let all = repo.all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].role, "Lead");
        assert_eq!(all[1].id, 5);
    }

    #[actix_web::test]
    async fn insert_takes_next_id_and_delete_removes() {
        let repo = repo();
        repo.seed_if_absent(&[employee(3, None), employee(9, None)]).await.unwrap();

        let added = repo.insert_with(|id| employee(id, Some("new"))).await.unwrap();
        assert_eq!(added.id, 10);
        assert_eq!(repo.find_by_username("new").await.unwrap().map(|e| e.id), Some(10));

        assert_eq!(repo.delete(3).await.unwrap().map(|e| e.id), Some(3));
        assert_eq!(repo.delete(3).await.unwrap(), None);
        assert_eq!(repo.find(3).await.unwrap(), None);
    }

    #[actix_web::test]
    async fn username_conflicts_are_rejected_under_the_lock() {
        let repo = repo();
        repo.seed_if_absent(&[employee(1, Some("Ayesha"))]).await.unwrap();

        let err = repo.upsert(employee(2, Some(" ayesha "))).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(_)));

        // renaming yourself to your own username is fine
        assert!(repo.upsert(employee(1, Some("AYESHA"))).await.unwrap().is_some());

        let err = repo.insert_with(|id| employee(id, Some("ayesha"))).await.unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken(_)));
        assert_eq!(repo.all().await.unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn concurrent_inserts_keep_usernames_unique() {
        let repo = Arc::new(repo());
        let spawn_insert = |repo: Arc<EmployeeRepo>| {
            actix_web::rt::spawn(async move {
                repo.insert_with(|id| employee(id, Some("dup"))).await
            })
        };

        let (a, b) = futures::join!(spawn_insert(repo.clone()), spawn_insert(repo.clone()));
        let results = [a.unwrap(), b.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(StoreError::UsernameTaken(_))))
        );
        let owners = repo
            .all()
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.has_username("dup"))
            .count();
        assert_eq!(owners, 1);
    }

    #[actix_web::test]
    async fn non_ascii_usernames_match_like_the_filter() {
        let filter = crate::utils::username_filter::UsernameFilter::new();
        filter.insert("ÉMILIE");
        assert!(filter.might_exist("émilie"));

        let repo = repo();
        repo.seed_if_absent(&[employee(1, Some("ÉMILIE"))]).await.unwrap();
        let found = repo.find_by_username("émilie").await.unwrap();
        assert_eq!(found.map(|e| e.id), Some(1));
    }
}
