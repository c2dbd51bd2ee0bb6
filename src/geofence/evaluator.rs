use actix_web::rt::time::timeout;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::store::{KvStore, StoreError, office};

use super::distance::Coordinate;
use super::error::AttendanceError;
use super::gate::within_threshold;
use super::provider::{LocationProvider, LocationRequest, PermissionProvider, PermissionStatus};

/// Result of one geofence evaluation: where the device is and whether the gate is open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Evaluation {
    pub office: Coordinate,
    pub position: Coordinate,
    #[schema(example = 43.4)]
    pub distance_m: f64,
    pub within_threshold: bool,
}

impl Evaluation {
    pub fn new(office: Coordinate, position: Coordinate) -> Self {
        let distance_m = office.distance_to(&position);
        Self {
            office,
            position,
            distance_m,
            within_threshold: within_threshold(distance_m),
        }
    }
}

/// Runs the whole check: office point, permission, position, distance.
///
/// The office point is read first and the device is not touched at all when it
/// is missing. An out-of-range device is a successful evaluation with
/// `within_threshold == false`.
#[instrument(name = "geofence_evaluate", skip_all)]
pub async fn evaluate(
    store: &dyn KvStore,
    permissions: &dyn PermissionProvider,
    locator: &dyn LocationProvider,
) -> Result<Evaluation, AttendanceError> {
    let office = load_office(store).await?;
    let position = acquire_position(permissions, locator, &LocationRequest::default()).await?;

    let evaluation = Evaluation::new(office, position);
    info!(
        distance_m = evaluation.distance_m,
        within_threshold = evaluation.within_threshold,
        "Geofence evaluated"
    );
    Ok(evaluation)
}

pub async fn load_office(store: &dyn KvStore) -> Result<Coordinate, AttendanceError> {
    match office::load(store).await {
        Ok(Some(office)) if office.is_valid() => Ok(office),
        Ok(Some(office)) => {
            warn!(?office, "Stored office location is out of range");
            Err(AttendanceError::ConfigurationInvalid)
        }
        Ok(None) => Err(AttendanceError::ConfigurationMissing),
        Err(StoreError::Malformed { source, .. }) => {
            warn!(error = %source, "Stored office location is not readable");
            Err(AttendanceError::ConfigurationInvalid)
        }
        Err(e) => Err(e.into()),
    }
}

/// Check, prompt once if the answer was a plain denial, never retry on our own.
pub async fn ensure_permission(permissions: &dyn PermissionProvider) -> Result<(), AttendanceError> {
    let mut status = permissions.check().await;
    if status == PermissionStatus::Denied {
        debug!("Location permission not granted yet, prompting");
        status = permissions.request().await;
    }

    match status {
        PermissionStatus::Granted => Ok(()),
        PermissionStatus::Blocked => {
            permissions.open_settings();
            Err(AttendanceError::PermissionBlocked)
        }
        PermissionStatus::Denied => Err(AttendanceError::PermissionDenied),
    }
}

/// Permission first, then a single reading bounded by `request.timeout`.
pub async fn acquire_position(
    permissions: &dyn PermissionProvider,
    locator: &dyn LocationProvider,
    request: &LocationRequest,
) -> Result<Coordinate, AttendanceError> {
    ensure_permission(permissions).await?;

    let fix = match timeout(request.timeout, locator.current_position(request)).await {
        Ok(Ok(fix)) => fix,
        Ok(Err(reason)) => return Err(AttendanceError::LocationUnavailable(reason)),
        Err(_) => {
            return Err(AttendanceError::LocationUnavailable(format!(
                "no position within {} ms",
                request.timeout.as_millis()
            )));
        }
    };

    if fix.age > request.maximum_age {
        return Err(AttendanceError::LocationUnavailable(format!(
            "cached position is {} ms old",
            fix.age.as_millis()
        )));
    }
    if !fix.coordinate.is_valid() {
        return Err(AttendanceError::LocationUnavailable(
            "position out of range".to_string(),
        ));
    }

    Ok(fix.coordinate)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::geofence::provider::PositionFix;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Answers `check` and `request` from fixed values and counts calls.
    pub struct ScriptedPermissions {
        pub on_check: PermissionStatus,
        pub on_request: PermissionStatus,
        pub requests: AtomicUsize,
        pub settings_opened: AtomicBool,
    }

    impl ScriptedPermissions {
        pub fn new(on_check: PermissionStatus, on_request: PermissionStatus) -> Self {
            Self {
                on_check,
                on_request,
                requests: AtomicUsize::new(0),
                settings_opened: AtomicBool::new(false),
            }
        }

        pub fn granted() -> Self {
            Self::new(PermissionStatus::Granted, PermissionStatus::Granted)
        }
    }

    #[async_trait]
    impl PermissionProvider for ScriptedPermissions {
        async fn check(&self) -> PermissionStatus {
            self.on_check
        }

        async fn request(&self) -> PermissionStatus {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.on_request
        }

        fn open_settings(&self) {
            self.settings_opened.store(true, Ordering::SeqCst);
        }
    }

    pub struct FixedLocation {
        pub result: Mutex<Result<PositionFix, String>>,
        pub delay: Duration,
        pub calls: AtomicUsize,
    }

    impl FixedLocation {
        pub fn at(latitude: f64, longitude: f64) -> Self {
            Self::returning(Ok(PositionFix {
                coordinate: Coordinate::new(latitude, longitude),
                age: Duration::ZERO,
            }))
        }

        pub fn returning(result: Result<PositionFix, String>) -> Self {
            Self {
                result: Mutex::new(result),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LocationProvider for FixedLocation {
        async fn current_position(&self, _request: &LocationRequest) -> Result<PositionFix, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                actix_web::rt::time::sleep(self.delay).await;
            }
            self.result.lock().unwrap().clone()
        }
    }

    async fn store_with_office(latitude: f64, longitude: f64) -> MemoryStore {
        let store = MemoryStore::new();
        office::save(&store, &Coordinate::new(latitude, longitude))
            .await
            .unwrap();
        store
    }

    #[actix_web::test]
    async fn device_near_office_is_within_threshold() {
        let store = store_with_office(12.9716, 77.5946).await;
        let locator = FixedLocation::at(12.9716, 77.5950);

        let eval = evaluate(&store, &ScriptedPermissions::granted(), &locator)
            .await
            .unwrap();

        assert!((eval.distance_m - 43.4).abs() < 1.0, "got {}", eval.distance_m);
        assert!(eval.within_threshold);
        assert_eq!(eval.position, Coordinate::new(12.9716, 77.5950));
    }

    #[actix_web::test]
    async fn far_device_is_an_evaluation_not_an_error() {
        let store = store_with_office(0.0, 0.0).await;
        let locator = FixedLocation::at(0.0, 1.0);

        let eval = evaluate(&store, &ScriptedPermissions::granted(), &locator)
            .await
            .unwrap();
        assert!(!eval.within_threshold);
    }

    #[actix_web::test]
    async fn missing_office_stops_before_touching_the_device() {
        let store = MemoryStore::new();
        let permissions = ScriptedPermissions::granted();
        let locator = FixedLocation::at(12.9716, 77.5950);

        let err = evaluate(&store, &permissions, &locator).await.unwrap_err();

        assert!(matches!(err, AttendanceError::ConfigurationMissing));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(permissions.requests.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn unreadable_office_is_invalid_configuration() {
        let store = MemoryStore::new();
        store.set(office::OFFICE_KEY, "{oops".into()).await.unwrap();
        let locator = FixedLocation::at(0.0, 0.0);

        let err = evaluate(&store, &ScriptedPermissions::granted(), &locator)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::ConfigurationInvalid));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn denied_then_granted_on_prompt_proceeds() {
        let store = store_with_office(12.9716, 77.5946).await;
        let permissions =
            ScriptedPermissions::new(PermissionStatus::Denied, PermissionStatus::Granted);
        let locator = FixedLocation::at(12.9716, 77.5950);

        let eval = evaluate(&store, &permissions, &locator).await.unwrap();

        assert!(eval.within_threshold);
        assert_eq!(permissions.requests.load(Ordering::SeqCst), 1);
        assert_eq!(locator.calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn denied_twice_reports_permission_denied() {
        let store = store_with_office(12.9716, 77.5946).await;
        let permissions =
            ScriptedPermissions::new(PermissionStatus::Denied, PermissionStatus::Denied);
        let locator = FixedLocation::at(12.9716, 77.5950);

        let err = evaluate(&store, &permissions, &locator).await.unwrap_err();
        assert!(matches!(err, AttendanceError::PermissionDenied));
        assert!(!permissions.settings_opened.load(Ordering::SeqCst));
        assert_eq!(locator.calls.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn blocked_permission_sends_user_to_settings() {
        let store = store_with_office(12.9716, 77.5946).await;
        let permissions =
            ScriptedPermissions::new(PermissionStatus::Blocked, PermissionStatus::Granted);
        let locator = FixedLocation::at(12.9716, 77.5950);

        let err = evaluate(&store, &permissions, &locator).await.unwrap_err();
        assert!(matches!(err, AttendanceError::PermissionBlocked));
        assert!(permissions.settings_opened.load(Ordering::SeqCst));
        assert_eq!(permissions.requests.load(Ordering::SeqCst), 0);
    }

    #[actix_web::test]
    async fn provider_error_is_location_unavailable() {
        let store = store_with_office(12.9716, 77.5946).await;
        let locator = FixedLocation::returning(Err("location services off".into()));

        let err = evaluate(&store, &ScriptedPermissions::granted(), &locator)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::LocationUnavailable(ref r) if r == "location services off"));
    }

    #[actix_web::test]
    async fn stale_fix_is_rejected() {
        let store = store_with_office(12.9716, 77.5946).await;
        let locator = FixedLocation::returning(Ok(PositionFix {
            coordinate: Coordinate::new(12.9716, 77.5950),
            age: Duration::from_millis(5_000),
        }));

        let err = evaluate(&store, &ScriptedPermissions::granted(), &locator)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::LocationUnavailable(_)));
    }

    #[actix_web::test]
    async fn slow_provider_times_out() {
        let locator = FixedLocation {
            delay: Duration::from_millis(200),
            ..FixedLocation::at(0.0, 0.0)
        };
        let request = LocationRequest {
            timeout: Duration::from_millis(20),
            ..LocationRequest::default()
        };

        let err = acquire_position(&ScriptedPermissions::granted(), &locator, &request)
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::LocationUnavailable(ref r) if r.contains("20 ms")));
    }
}
