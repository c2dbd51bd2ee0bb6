use crate::api::attendance::DeviceReport;
use crate::auth::auth::AuthUser;
use crate::context::AppContext;
use crate::geofence::distance::{Coordinate, DegreeInput};
use crate::geofence::evaluator::acquire_position;
use crate::geofence::provider::LocationRequest;
use crate::store::office;
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};
use utoipa::ToSchema;

/// Office point as typed by the admin; numbers or numeric strings.
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": "12.9716", "longitude": "77.5946" }))]
pub struct OfficeLocationInput {
    #[schema(value_type = Option<String>, example = "12.9716")]
    pub latitude: Option<DegreeInput>,
    #[schema(value_type = Option<String>, example = "77.5946")]
    pub longitude: Option<DegreeInput>,
}

impl OfficeLocationInput {
    fn to_coordinate(&self) -> Option<Coordinate> {
        let latitude = self.latitude.as_ref()?.parse()?;
        let longitude = self.longitude.as_ref()?.parse()?;
        Some(Coordinate::new(latitude, longitude)).filter(Coordinate::is_valid)
    }
}

async fn save_office(ctx: &AppContext, coordinate: Coordinate) -> actix_web::Result<HttpResponse> {
    office::save(ctx.store.as_ref(), &coordinate)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to save office location");
            ErrorInternalServerError("Internal Server Error")
        })?;

    info!(
        latitude = coordinate.latitude,
        longitude = coordinate.longitude,
        "Office location saved"
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": "Office location saved!",
        "office": coordinate
    })))
}

/// Get the configured office location
#[utoipa::path(
    get,
    path = "/api/office-location",
    responses(
        (status = 200, description = "Configured office point", body = Coordinate),
        (status = 404, description = "Office location not set", body = Object, example = json!({
            "message": "Office location not set"
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn get_office(
    _auth: AuthUser,
    ctx: web::Data<AppContext>,
) -> actix_web::Result<impl Responder> {
    let current = office::load(ctx.store.as_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to read office location");
        ErrorInternalServerError("Internal Server Error")
    })?;

    match current {
        Some(coordinate) => Ok(HttpResponse::Ok().json(coordinate)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Office location not set"
        }))),
    }
}

/// Set the office location from entered coordinates
#[utoipa::path(
    put,
    path = "/api/office-location",
    request_body = OfficeLocationInput,
    responses(
        (status = 200, description = "Office location saved", body = Object, example = json!({
            "message": "Office location saved!",
            "office": { "latitude": 12.9716, "longitude": 77.5946 }
        })),
        (status = 400, description = "Invalid coordinates", body = Object, example = json!({
            "message": "Please enter valid coordinates"
        })),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn set_office(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    payload: web::Json<OfficeLocationInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let Some(coordinate) = payload.to_coordinate() else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Please enter valid coordinates"
        })));
    };

    save_office(&ctx, coordinate).await
}

/// Set the office location to where the admin's device is now
#[utoipa::path(
    post,
    path = "/api/office-location/current",
    request_body = DeviceReport,
    responses(
        (status = 200, description = "Office location saved from device position"),
        (status = 403, description = "Admin only, or location permission denied"),
        (status = 503, description = "Device could not provide a position")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn set_office_from_device(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    device: web::Json<DeviceReport>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let device = device.into_inner();
    let coordinate = acquire_position(&device, &device, &LocationRequest::default()).await?;

    save_office(&ctx, coordinate).await
}

/// Forget the office location; check-ins stay unavailable until it is set again
#[utoipa::path(
    delete,
    path = "/api/office-location",
    responses(
        (status = 204, description = "Office location cleared"),
        (status = 403, description = "Admin only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Office"
)]
pub async fn clear_office(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    office::clear(ctx.store.as_ref()).await.map_err(|e| {
        error!(error = %e, "Failed to clear office location");
        ErrorInternalServerError("Internal Server Error")
    })?;

    info!("Office location cleared");
    Ok(HttpResponse::NoContent().finish())
}
