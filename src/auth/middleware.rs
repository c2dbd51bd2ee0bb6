use crate::auth::auth::{AuthUser, bearer_token};
use crate::auth::jwt::verify_token;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use serde_json::json;
use tracing::debug;

/// Rejects requests without a valid access token; otherwise stores the
/// [`AuthUser`] in the request extensions for the extractor to pick up.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let verified = bearer_token(req.headers())
        .map_err(|reason| json!({ "error": reason }))
        .and_then(|token| {
            verify_token(token, &config.jwt_secret)
                .map_err(|e| json!({ "error": "Invalid or expired token", "details": e }))
        });

    match verified {
        Ok(claims) => {
            let user = AuthUser::from(claims);
            debug!(actor = %user.actor(), path = %req.path(), "Authenticated request");
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(body) => {
            let resp = HttpResponse::Unauthorized().json(body);
            Ok(req.into_response(resp.map_into_boxed_body()))
        }
    }
}
