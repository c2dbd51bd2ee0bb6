use std::time::Duration;

use crate::auth::auth::AuthUser;
use crate::context::AppContext;
use crate::geofence::attempt::{AttemptHandle, AttemptSnapshot};
use crate::geofence::distance::Coordinate;
use crate::geofence::error::AttendanceError;
use crate::geofence::evaluator::evaluate;
use crate::geofence::gate::CHECK_IN_RADIUS_M;
use crate::geofence::provider::{
    LocationProvider, LocationRequest, PermissionProvider, PermissionStatus, PositionFix,
};
use crate::geofence::sequencer::AttendanceStage;
use actix_web::{HttpResponse, Responder, ResponseError, http::StatusCode, web};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

/// What the device reported about location permission and position.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[schema(example = json!({
    "permission": "granted",
    "position": { "latitude": 12.9716, "longitude": 77.5950, "age_ms": 300 }
}))]
pub struct DeviceReport {
    /// Result of checking the precise-location permission.
    pub permission: PermissionStatus,
    /// Result of the OS prompt, when the app showed one.
    #[serde(default)]
    pub permission_after_prompt: Option<PermissionStatus>,
    #[serde(default)]
    pub position: Option<ReportedPosition>,
    /// Why the device could not produce a position.
    #[serde(default)]
    #[schema(example = "timeout")]
    pub location_error: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct ReportedPosition {
    #[schema(example = 12.9716)]
    pub latitude: f64,
    #[schema(example = 77.5950)]
    pub longitude: f64,
    /// Age of the fix in milliseconds, 0 when fresh.
    #[serde(default)]
    #[schema(example = 300)]
    pub age_ms: u64,
}

#[async_trait]
impl PermissionProvider for DeviceReport {
    async fn check(&self) -> PermissionStatus {
        self.permission
    }

    async fn request(&self) -> PermissionStatus {
        self.permission_after_prompt.unwrap_or(self.permission)
    }

    fn open_settings(&self) {
        info!("Location permission blocked, directing user to system settings");
    }
}

#[async_trait]
impl LocationProvider for DeviceReport {
    async fn current_position(&self, _request: &LocationRequest) -> Result<PositionFix, String> {
        match (&self.position, &self.location_error) {
            (_, Some(reason)) => Err(reason.clone()),
            (Some(p), None) => Ok(PositionFix {
                coordinate: Coordinate::new(p.latitude, p.longitude),
                age: Duration::from_millis(p.age_ms),
            }),
            (None, None) => Err("no position reported".to_string()),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AttemptResponse {
    #[serde(flatten)]
    pub attempt: AttemptSnapshot,
    #[schema(example = "Within office: 43.4m")]
    pub message: String,
}

impl From<&AttemptHandle> for AttemptResponse {
    fn from(attempt: &AttemptHandle) -> Self {
        let attempt = attempt.snapshot();
        let message = status_message(&attempt);
        Self { attempt, message }
    }
}

fn status_message(attempt: &AttemptSnapshot) -> String {
    let distance = attempt.evaluation.distance_m;
    match attempt.stage {
        AttendanceStage::Idle if attempt.evaluation.within_threshold => {
            format!("Within office: {:.1}m", distance)
        }
        AttendanceStage::Idle => format!(
            "Too far from office: {:.1}m. You must be within {}m of office to check in.",
            distance, CHECK_IN_RADIUS_M
        ),
        AttendanceStage::Verifying => "Biometric Verification...".to_string(),
        AttendanceStage::Locating => "Checking location...".to_string(),
        AttendanceStage::Done => "Attendance Marked".to_string(),
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::ConfigurationMissing | AttendanceError::ConfigurationInvalid => {
                StatusCode::CONFLICT
            }
            AttendanceError::PermissionDenied | AttendanceError::PermissionBlocked => {
                StatusCode::FORBIDDEN
            }
            AttendanceError::LocationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::OutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AttendanceError::Store(e) = self {
            error!(error = %e, "Attendance storage failure");
            return HttpResponse::InternalServerError().json(json!({
                "error": self.kind(),
                "message": "Internal Server Error"
            }));
        }

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.to_string(),
            "open_settings": self.opens_settings(),
        }))
    }
}

async fn owned_attempt(
    ctx: &AppContext,
    auth: &AuthUser,
    id: Uuid,
) -> actix_web::Result<AttemptHandle> {
    match ctx.attempts.get(id).await {
        Some(attempt) if attempt.actor() == auth.actor() => Ok(attempt),
        _ => Err(actix_web::error::ErrorNotFound("Attendance attempt not found")),
    }
}

/// Evaluate the geofence and open a check-in attempt
#[utoipa::path(
    post,
    path = "/api/attendance/attempts",
    request_body = DeviceReport,
    responses(
        (status = 201, description = "Attempt opened, check `within_threshold`", body = AttemptResponse),
        (status = 403, description = "Location permission denied or blocked", body = Object, example = json!({
            "error": "permission_blocked",
            "message": "Location permission blocked. Please enable it in system settings.",
            "open_settings": true
        })),
        (status = 409, description = "Office location not configured", body = Object, example = json!({
            "error": "configuration_missing",
            "message": "Office location not set. Please contact admin.",
            "open_settings": false
        })),
        (status = 503, description = "Device could not provide a position"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn start_attempt(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    device: web::Json<DeviceReport>,
) -> Result<HttpResponse, AttendanceError> {
    let device = device.into_inner();
    let evaluation = evaluate(ctx.store.as_ref(), &device, &device).await?;

    let attempt = ctx.attempts.open(&auth.actor(), evaluation).await;
    info!(
        attempt = %attempt.id(),
        actor = %auth.actor(),
        distance_m = evaluation.distance_m,
        within_threshold = evaluation.within_threshold,
        "Attendance attempt opened"
    );

    Ok(HttpResponse::Created().json(AttemptResponse::from(&attempt)))
}

/// Current stage of an attempt
#[utoipa::path(
    get,
    path = "/api/attendance/attempts/{attempt_id}",
    params(
        ("attempt_id", Path, description = "Attempt ID")
    ),
    responses(
        (status = 200, description = "Attempt state", body = AttemptResponse),
        (status = 404, description = "Unknown, expired or foreign attempt")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_attempt(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    let attempt = owned_attempt(&ctx, &auth, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AttemptResponse::from(&attempt)))
}

/// Press check-in: starts verification when inside the geofence
#[utoipa::path(
    post,
    path = "/api/attendance/attempts/{attempt_id}/check-in",
    params(
        ("attempt_id", Path, description = "Attempt ID")
    ),
    responses(
        (status = 202, description = "Verification running", body = AttemptResponse),
        (status = 422, description = "Device is outside the geofence", body = Object, example = json!({
            "error": "out_of_range",
            "message": "You must be within 200m of office to check in. Current distance: 250.0m",
            "open_settings": false
        })),
        (status = 404, description = "Unknown, expired or foreign attempt")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    let attempt = owned_attempt(&ctx, &auth, path.into_inner()).await?;
    attempt.trigger(ctx.attempts.timing())?;

    Ok(HttpResponse::Accepted().json(AttemptResponse::from(&attempt)))
}

/// Leave the attendance view: drops the attempt and anything still pending for it
#[utoipa::path(
    delete,
    path = "/api/attendance/attempts/{attempt_id}",
    params(
        ("attempt_id", Path, description = "Attempt ID")
    ),
    responses(
        (status = 204, description = "Attempt discarded"),
        (status = 404, description = "Unknown, expired or foreign attempt")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn discard_attempt(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<Uuid>,
) -> actix_web::Result<impl Responder> {
    let attempt = owned_attempt(&ctx, &auth, path.into_inner()).await?;
    ctx.attempts.discard(attempt.id()).await;

    info!(attempt = %attempt.id(), stage = %attempt.stage(), "Attendance attempt discarded");
    Ok(HttpResponse::NoContent().finish())
}
