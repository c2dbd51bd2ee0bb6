use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::employee::EmployeeResponse;
use crate::model::role::Role;

#[derive(Deserialize, ToSchema)]
pub struct LoginReqDto {
    #[schema(example = "ayesha")]
    pub username: String,
    #[schema(example = "secret")]
    pub password: String,
    pub role: Role,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: &'static str,
    #[schema(example = 900)]
    pub expires_in: usize,
    pub role: Role,
    /// The signed-in employee, absent for admins.
    #[schema(nullable = true)]
    pub employee: Option<EmployeeResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
    pub jti: String,
    /// Present only if this session belongs to an employee record
    pub employee_id: Option<u64>,
}
