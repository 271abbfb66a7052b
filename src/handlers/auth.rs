//! Authentication handlers

use axum::{extract::State, http::StatusCode, Json};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use jsonwebtoken::{encode, Header, EncodingKey};
use serde::{Deserialize, Serialize};
use chrono::{Utc, Duration};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, AppError, AppResult};
use crate::handlers::{ApiResponse, AppJson};
use crate::models::{normalize_email, LoginRequest, LoginResponse, RegisterRequest, Teacher, TeacherInfo};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,      // Teacher ID
    pub exp: usize,       // Expiration timestamp
    pub iat: usize,       // Issued at
}

/// Register a teacher account
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<TeacherInfo>>)> {
    let req = req.normalized();
    req.validate()?;
    let email = req.email.as_str();

    if Teacher::find_by_email(&state.pool, email).await?.is_some() {
        return Err(AppError::AlreadyExists("Email already registered".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .to_string();

    let teacher = Teacher::create(&state.pool, email, req.name.as_deref(), &password_hash)
        .await
        .map_err(|e| match &e {
            // Lost a race with a concurrent registration
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::AlreadyExists("Email already registered".to_string())
            }
            _ => AppError::from(e),
        })?;

    tracing::info!("New teacher registered: {}", teacher.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED, "Teacher registered successfully.", teacher.to_info())),
    ))
}

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    let teacher = Teacher::find_by_email(&state.pool, &normalize_email(&req.email))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&teacher.password_hash)
        .map_err(|_| AppError::InternalError("Invalid password hash".to_string()))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::InvalidCredentials)?;

    let token = generate_jwt(teacher.id, &state.config.jwt_secret, state.config.jwt_expiration_hours)?;

    Ok(Json(ApiResponse::ok(
        "Login successful.",
        LoginResponse {
            token,
            teacher: teacher.to_info(),
        },
    )))
}

/// Generate JWT token
pub fn generate_jwt(teacher_id: Uuid, secret: &str, expiration_hours: u64) -> AppResult<String> {
    let now = Utc::now();
    let exp = i64::try_from(expiration_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|hours| now.checked_add_signed(hours))
        .ok_or_else(|| AppError::InternalError(format!("JWT expiration of {} hours is out of range", expiration_hours)))?;

    let claims = Claims {
        sub: teacher_id.to_string(),
        exp: exp.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes())
    ).map_err(|e| AppError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn test_jwt_round_trip() {
        let teacher_id = Uuid::new_v4();
        let token = generate_jwt(teacher_id, "secret", 1).unwrap();

        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        ).unwrap();

        assert_eq!(data.claims.sub, teacher_id.to_string());
        assert!(data.claims.exp > data.claims.iat);
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let token = generate_jwt(Uuid::new_v4(), "secret", 1).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"other"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_jwt_expiration_out_of_range() {
        let err = generate_jwt(Uuid::new_v4(), "secret", u64::MAX).unwrap_err();
        assert!(matches!(err, AppError::InternalError(_)));
    }
}
