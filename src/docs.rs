use crate::api::attendance::{AttemptResponse, DeviceReport, ReportedPosition};
use crate::api::employee::{EmployeeInput, EmployeeListResponse};
use crate::api::office::OfficeLocationInput;
use crate::geofence::attempt::AttemptSnapshot;
use crate::geofence::distance::Coordinate;
use crate::geofence::evaluator::Evaluation;
use crate::geofence::provider::PermissionStatus;
use crate::geofence::sequencer::AttendanceStage;
use crate::model::employee::EmployeeResponse;
use crate::model::role::Role;
use crate::models::{LoginReqDto, LoginResponse};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Geofence API",
        version = "1.0.0",
        description = r#"
## HR app with geofenced attendance

### 🔹 Key Features
- **Employee Management**
  - Create, update, list, and view employee profiles
- **Office Location**
  - Admins pin the office by typing coordinates or from their device
- **Attendance**
  - Check-in is only possible within 200 m of the office
  - A check-in runs biometric verification, then a location re-check, then marks attendance

### 🔐 Security
Every `/api` endpoint needs a **JWT Bearer** token from `/auth/login`.
Employee management and office changes are **Admin** only.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::logout,

        crate::api::employee::me,
        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,
        crate::api::employee::replace_employee,
        crate::api::employee::update_employee,
        crate::api::employee::delete_employee,

        crate::api::office::get_office,
        crate::api::office::set_office,
        crate::api::office::set_office_from_device,
        crate::api::office::clear_office,

        crate::api::attendance::start_attempt,
        crate::api::attendance::get_attempt,
        crate::api::attendance::check_in,
        crate::api::attendance::discard_attempt
    ),
    components(
        schemas(
            LoginReqDto,
            LoginResponse,
            Role,
            EmployeeInput,
            EmployeeResponse,
            EmployeeListResponse,
            Coordinate,
            OfficeLocationInput,
            DeviceReport,
            ReportedPosition,
            PermissionStatus,
            Evaluation,
            AttendanceStage,
            AttemptSnapshot,
            AttemptResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Sign in and out"),
        (name = "Employee", description = "Employee management APIs"),
        (name = "Office", description = "Office location APIs"),
        (name = "Attendance", description = "Geofenced check-in APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth/login",
            "/api/me",
            "/api/employee/{employee_id}",
            "/api/office-location/current",
            "/api/attendance/attempts/{attempt_id}/check-in",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{path} missing");
        }
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
