use crate::geofence::distance::Coordinate;

use super::{KvStore, StoreError, get_json, set_json};

pub const OFFICE_KEY: &str = "office_coords";

/// Reads the configured office point, straight from the store every time.
pub async fn load(store: &dyn KvStore) -> Result<Option<Coordinate>, StoreError> {
    get_json(store, OFFICE_KEY).await
}

/// Overwrites the office point; there is only ever one.
pub async fn save(store: &dyn KvStore, office: &Coordinate) -> Result<(), StoreError> {
    set_json(store, OFFICE_KEY, office).await
}

pub async fn clear(store: &dyn KvStore) -> Result<(), StoreError> {
    store.remove(OFFICE_KEY).await
}
