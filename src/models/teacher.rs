//! Teacher model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Teacher {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub teacher: TeacherInfo,
}

#[derive(Debug, Serialize)]
pub struct TeacherInfo {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
}

impl Teacher {
    pub async fn create(
        pool: &PgPool,
        email: &str,
        name: Option<&str>,
        password_hash: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Teacher>(
            r#"
            INSERT INTO teachers (email, password_hash, name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#
        )
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Teacher>("SELECT * FROM teachers WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    pub fn to_info(&self) -> TeacherInfo {
        TeacherInfo {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
        }
    }
}

impl RegisterRequest {
    /// Email in stored form; run before validation so register and login agree
    pub fn normalized(self) -> Self {
        Self {
            email: normalize_email(&self.email),
            ..self
        }
    }
}

/// Emails are matched case-insensitively
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
