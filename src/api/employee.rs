use crate::{
    auth::{auth::AuthUser, password::hash_password},
    context::AppContext,
    model::employee::{
        Employee, EmployeeResponse, is_valid_email, normalize_username, parse_arrival_time,
    },
    store::{
        StoreError,
        employees::{DEFAULT_PAGE_SIZE, EmployeePage},
    },
    utils::json_merge::merge_update,
};
use actix_web::{HttpResponse, Responder, error::ErrorInternalServerError, web};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info};
use utoipa::{IntoParams, ToSchema};

/// Fields an admin edits. `password` is write-only and stored hashed.
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
pub struct EmployeeInput {
    #[schema(example = "Ayesha Rahman")]
    pub name: Option<String>,
    #[schema(example = "ayesha.rahman@company.com", format = "email")]
    pub email: Option<String>,
    #[schema(example = "Software Engineer")]
    pub role: Option<String>,
    #[schema(example = "09:00")]
    pub arrival_time: Option<String>,
    #[schema(example = "ayesha")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "secret")]
    pub password: Option<String>,
}

const PATCHABLE_FIELDS: &[&str] = &["name", "email", "role", "arrival_time", "username", "password"];

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmployeeQuery {
    /// Page number, starting at 1
    pub page: Option<u32>,
    /// Items per page
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<EmployeeResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 6)]
    pub per_page: u32,
    #[schema(example = 8)]
    pub total: usize,
    /// The page came back full, so there may be another one.
    #[schema(example = true)]
    pub has_more: bool,
}

impl From<EmployeePage> for EmployeeListResponse {
    fn from(page: EmployeePage) -> Self {
        Self {
            data: page.data.iter().map(EmployeeResponse::from).collect(),
            page: page.page,
            per_page: page.per_page,
            total: page.total,
            has_more: page.has_more,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Checks the form and builds the stored record. Without a new password the
/// previous hash is kept.
fn validate(
    input: &EmployeeInput,
    id: u64,
    previous_hash: Option<String>,
) -> Result<Employee, &'static str> {
    let (Some(name), Some(email), Some(role), Some(arrival)) = (
        non_blank(&input.name),
        non_blank(&input.email),
        non_blank(&input.role),
        non_blank(&input.arrival_time),
    ) else {
        return Err("All fields are required");
    };

    if !is_valid_email(email) {
        return Err("Invalid email format");
    }

    let Some(arrival_time) = parse_arrival_time(arrival) else {
        return Err("Arrival time must be HH:mm");
    };

    let password = match non_blank(&input.password) {
        Some(plain) => Some(hash_password(plain).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            "Password could not be stored"
        })?),
        None => previous_hash,
    };

    Ok(Employee {
        id,
        name: name.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        arrival_time,
        username: non_blank(&input.username).map(str::to_string),
        password,
    })
}

fn store_error(e: StoreError) -> actix_web::Error {
    error!(error = %e, "Employee store failure");
    ErrorInternalServerError("Internal Server Error")
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": message }))
}

fn username_conflict() -> HttpResponse {
    HttpResponse::Conflict().json(json!({
        "message": "Username already taken"
    }))
}

/// Keeps the username filter in step with a saved record.
/// The filter counts duplicates, so an unchanged username is left alone.
fn track_username(ctx: &AppContext, previous: Option<&Employee>, saved: &Employee) {
    let old = previous.and_then(|p| p.username.as_deref());
    let new = saved.username.as_deref();
    if let (Some(old), Some(new)) = (old, new) {
        if normalize_username(old) == normalize_username(new) {
            return;
        }
    }
    if let Some(old) = old {
        ctx.usernames.remove(old);
    }
    if let Some(new) = new {
        ctx.usernames.insert(new);
    }
}

async fn save(ctx: &AppContext, employee: Employee) -> actix_web::Result<HttpResponse> {
    let previous = match ctx.employees.upsert(employee.clone()).await {
        Ok(previous) => previous,
        Err(StoreError::UsernameTaken(_)) => return Ok(username_conflict()),
        Err(e) => return Err(store_error(e)),
    };
    track_username(ctx, previous.as_ref(), &employee);

    info!(employee_id = employee.id, replaced = previous.is_some(), "Employee saved");
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(&employee)))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employee",
    request_body = EmployeeInput,
    responses(
        (status = 201, description = "Employee created", body = EmployeeResponse),
        (status = 400, description = "Validation failed", body = Object, example = json!({
            "message": "Arrival time must be HH:mm"
        })),
        (status = 409, description = "Username already taken"),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn create_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    payload: web::Json<EmployeeInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    // validate with a placeholder id, the real one is assigned under the store lock
    let draft = match validate(&payload, 0, None) {
        Ok(employee) => employee,
        Err(message) => return Ok(bad_request(message)),
    };
    let created = match ctx.employees.insert_with(|id| Employee { id, ..draft }).await {
        Ok(created) => created,
        Err(StoreError::UsernameTaken(_)) => return Ok(username_conflict()),
        Err(e) => return Err(store_error(e)),
    };
    track_username(&ctx, None, &created);

    info!(employee_id = created.id, "Employee created");
    Ok(HttpResponse::Created().json(EmployeeResponse::from(&created)))
}

#[utoipa::path(
    get,
    path = "/api/employee",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_employees(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PAGE_SIZE);
    debug!(page, per_page, "Fetching employees");

    let page = ctx
        .employees
        .page(page, per_page)
        .await
        .map_err(store_error)?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse::from(page)))
}

/// Replace Employee, or add it under the given id
#[utoipa::path(
    put,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body = EmployeeInput,
    responses(
        (status = 200, description = "Employee saved", body = EmployeeResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Username already taken"),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn replace_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
    payload: web::Json<EmployeeInput>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let previous_hash = ctx
        .employees
        .find(employee_id)
        .await
        .map_err(store_error)?
        .and_then(|e| e.password);

    match validate(&payload, employee_id, previous_hash) {
        Ok(employee) => save(&ctx, employee).await,
        Err(message) => Ok(bad_request(message)),
    }
}

/// Update some fields of an Employee
#[utoipa::path(
    patch,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    request_body(content = EmployeeInput, description = "Any non-empty subset of the fields"),
    responses(
        (status = 200, description = "Employee updated", body = EmployeeResponse),
        (status = 400, description = "Unknown field or validation failed"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    let Some(current) = ctx
        .employees
        .find(employee_id)
        .await
        .map_err(store_error)?
    else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        })));
    };

    let mut merged = serde_json::to_value(EmployeeInput {
        name: Some(current.name.clone()),
        email: Some(current.email.clone()),
        role: Some(current.role.clone()),
        arrival_time: Some(EmployeeResponse::from(&current).arrival_time),
        username: current.username.clone(),
        password: None,
    })
    .map_err(ErrorInternalServerError)?;
    merge_update(&mut merged, &body, PATCHABLE_FIELDS)?;

    let input: EmployeeInput = serde_json::from_value(merged)
        .map_err(|_| actix_web::error::ErrorBadRequest("Fields must be strings"))?;

    match validate(&input, employee_id, current.password) {
        Ok(employee) => save(&ctx, employee).await,
        Err(message) => Ok(bad_request(message)),
    }
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn delete_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    match ctx.employees.delete(employee_id).await.map_err(store_error)? {
        Some(removed) => {
            if let Some(username) = removed.username.as_deref() {
                ctx.usernames.remove(username);
            }
            info!(employee_id, "Employee deleted");
            Ok(HttpResponse::Ok().json(json!({
                "message": "Successfully deleted"
            })))
        }
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employee/{employee_id}",
    params(
        ("employee_id", Path, description = "Employee ID")
    ),
    responses(
        (status = 200, description = "Employee found", body = EmployeeResponse),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        })),
        (status = 403, description = "Admin only")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_employee(
    auth: AuthUser,
    ctx: web::Data<AppContext>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;
    let employee_id = path.into_inner();

    match ctx.employees.find(employee_id).await.map_err(store_error)? {
        Some(emp) => Ok(HttpResponse::Ok().json(EmployeeResponse::from(&emp))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}

/// The signed-in employee's own record
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Own employee record", body = EmployeeResponse),
        (status = 403, description = "Not an employee session"),
        (status = 404, description = "Employee record no longer exists")
    ),
    tag = "Employee",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me(auth: AuthUser, ctx: web::Data<AppContext>) -> actix_web::Result<impl Responder> {
    let employee_id = auth
        .employee_id
        .filter(|_| auth.is_employee())
        .ok_or_else(|| actix_web::error::ErrorForbidden("No employee profile"))?;

    match ctx.employees.find(employee_id).await.map_err(store_error)? {
        Some(emp) => Ok(HttpResponse::Ok().json(EmployeeResponse::from(&emp))),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}
