//! Authentication middleware

use axum::{
    extract::{State, Request},
    middleware::Next,
    response::Response,
    http::header::AUTHORIZATION,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use uuid::Uuid;

use crate::{AppState, AppError};
use crate::handlers::auth::Claims;

/// Acting teacher, extracted from JWT
#[derive(Debug, Clone)]
pub struct TeacherContext {
    pub teacher_id: Uuid,
}

/// Middleware: Require teacher JWT authentication
pub async fn require_teacher_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
        &Validation::default()
    ).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::TokenInvalid
    })?;

    let teacher_ctx = TeacherContext {
        teacher_id: Uuid::parse_str(&token_data.claims.sub).map_err(|_| AppError::TokenInvalid)?,
    };

    req.extensions_mut().insert(teacher_ctx);

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<&str, AppError> {
    let auth_header = req.headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TeacherContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<TeacherContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
