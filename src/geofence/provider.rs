//! Device collaborators: the OS permission prompt and the location service.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::Display;
use utoipa::ToSchema;

use super::distance::Coordinate;

/// Outcome of querying or requesting the precise-location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    /// Not granted yet, asking again is allowed.
    Denied,
    /// Permanently refused, only the system settings screen can change it.
    Blocked,
}

#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn check(&self) -> PermissionStatus;

    /// Shows the OS prompt.
    async fn request(&self) -> PermissionStatus;

    /// Deep-links to the system settings screen.
    fn open_settings(&self);
}

/// Options for a single position reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRequest {
    pub high_accuracy: bool,
    pub timeout: Duration,
    /// Oldest cached fix the provider may hand back.
    pub maximum_age: Duration,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_millis(10_000),
            maximum_age: Duration::from_millis(1_000),
        }
    }
}

/// A reading from the location service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    pub age: Duration,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Returns the reason as text when no position is available.
    async fn current_position(&self, request: &LocationRequest) -> Result<PositionFix, String>;
}
