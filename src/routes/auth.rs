use crate::errors::ApiError;
use crate::handlers::roles::OperationDecl;
use crate::handlers::token::TokenCodec;
use crate::middleware::role_guard::RoleGuard;
use crate::models::all_models::{LoginRequest, LoginResponse, Role};
use actix_web::{web, HttpResponse};
use log::{info, warn};
use std::str::FromStr;

pub const LOGIN: &str = "login";

pub const AUTH_OPERATIONS: &[OperationDecl] = &[(LOGIN, None)];

//Login
//Login Input: LoginRequest
//Login Output: LoginResponse
pub async fn login(
    codec: web::Data<TokenCodec>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let role = match Role::from_str(&payload.role) {
        Ok(role) => role,
        Err(_) => {
            warn!("Login attempted with unknown role {:?}", payload.role);
            return Err(ApiError::NotFound("Role not found".into()));
        }
    };

    let auth_token = codec
        .issue(role, &role.to_string())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("Issued {} token valid for {}h", role, codec.ttl().num_hours());

    Ok(HttpResponse::Ok().json(LoginResponse {
        auth_token,
        user: role,
        role,
    }))
}

//Config Auth Routes
// POST /auth/login
pub fn config_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth").route(
            "/login",
            web::post().to(login).wrap(RoleGuard::new(LOGIN)),
        ),
    );
}
