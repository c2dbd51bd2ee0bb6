use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use crate::models::Claims;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorForbidden,
    error::ErrorUnauthorized, http::header::HeaderMap, web::Data,
};
use futures::future::{Ready, ready};

/// The signed-in actor, taken from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,

    /// Present only if this user is linked to an employee record
    pub employee_id: Option<u64>,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.sub,
            role: claims.role,
            employee_id: claims.employee_id,
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, &'static str> {
    let value = headers
        .get("Authorization")
        .ok_or("Missing Authorization header")?
        .to_str()
        .map_err(|_| "Invalid Authorization header encoding")?;

    value
        .strip_prefix("Bearer ")
        .ok_or("Authorization header must start with Bearer")
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Already decoded by the auth middleware on protected scopes.
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match bearer_token(req.headers()) {
            Ok(t) => t,
            Err(reason) => return ready(Err(ErrorUnauthorized(reason))),
        };

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(actix_web::error::ErrorInternalServerError(
                "Config missing",
            )));
        };

        ready(
            verify_token(token, &config.jwt_secret)
                .map(AuthUser::from)
                .map_err(|_| ErrorUnauthorized("Invalid token")),
        )
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ErrorForbidden("Admin only"))
        }
    }

    /// Returns true if the user is an employee
    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }

    /// Label under which this user's attendance attempts are kept.
    ///
    /// Employees are keyed by record id, so an employee whose username matches
    /// the admin's never shares attempts with the admin.
    pub fn actor(&self) -> String {
        match (self.role, self.employee_id) {
            (Role::Employee, Some(id)) => format!("employee:{id}"),
            (role, _) => format!("{role}:{}", self.username),
        }
    }
}
