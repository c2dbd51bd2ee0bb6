use crate::{
    auth::{auth::AuthUser, jwt::generate_access_token, password::verify_password},
    config::Config,
    context::AppContext,
    model::{employee::EmployeeResponse, role::Role},
    models::{LoginReqDto, LoginResponse},
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{debug, error, info, instrument};

fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({ "message": "Invalid credentials" }))
}

/// Sign in as admin or employee
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(ctx, config, user),
    fields(username = %user.username, role = %user.role)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    ctx: web::Data<AppContext>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    // 1️⃣ Basic validation
    let username = user.username.trim();
    if username.is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().json(json!({
            "message": "Please enter username and password"
        }));
    }

    // 2️⃣ Resolve the identity for the chosen role
    let employee = match user.role {
        Role::Admin => {
            if username != config.admin_username || user.password != config.admin_password {
                info!("Invalid credentials: admin mismatch");
                return unauthorized();
            }
            None
        }
        Role::Employee => {
            // cuckoo filter: a negative is definite
            if !ctx.usernames.might_exist(username) {
                info!("Employee not found (filter negative)");
                return HttpResponse::NotFound().json(json!({ "message": "Employee not found" }));
            }

            debug!("Looking up employee record");
            let found = match ctx.employees.find_by_username(username).await {
                Ok(Some(emp)) => emp,
                Ok(None) => {
                    info!("Employee not found");
                    return HttpResponse::NotFound()
                        .json(json!({ "message": "Employee not found" }));
                }
                Err(e) => {
                    error!(error = %e, "Store error while fetching employee");
                    return HttpResponse::InternalServerError().finish();
                }
            };

            if let Some(hash) = found.password.as_deref() {
                if let Err(e) = verify_password(&user.password, hash) {
                    info!(error = %e, "Invalid credentials: password mismatch");
                    return unauthorized();
                }
            }
            Some(found)
        }
    };

    // 3️⃣ Generate access token
    let subject = employee
        .as_ref()
        .and_then(|e| e.username.clone())
        .unwrap_or_else(|| username.to_string());
    let access_token = match generate_access_token(
        subject,
        user.role,
        employee.as_ref().map(|e| e.id),
        &config.jwt_secret,
        config.access_token_ttl,
    ) {
        Ok(token) => token,
        Err(e) => {
            error!(error = %e, "Failed to sign access token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    info!("Login successful");

    HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: config.access_token_ttl,
        role: user.role,
        employee: employee.as_ref().map(EmployeeResponse::from),
    })
}

/// Sign out and tear down every pending attendance attempt of the caller
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 204, description = "Signed out, also when no valid token was sent")
    ),
    tag = "Auth",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout(auth: Option<AuthUser>, ctx: web::Data<AppContext>) -> impl Responder {
    // logout is idempotent: no token, still 204
    if let Some(auth) = auth {
        let discarded = ctx.attempts.discard_actor(&auth.actor()).await;
        info!(actor = %auth.actor(), discarded, "Signed out");
    }

    HttpResponse::NoContent().finish()
}
