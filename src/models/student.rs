//! Student model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

use crate::models::Prediction;
use crate::predictor::FeatureSet;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub teacher_id: Uuid,
    pub name: String,
    pub attendance: Option<f64>,
    pub study_hours: Option<f64>,
    pub previous_marks: Option<f64>,
    pub assignment_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Student with prediction history, newest first
#[derive(Debug, Serialize)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub attendance: Option<f64>,
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub study_hours: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub previous_marks: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub assignment_score: Option<f64>,
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    #[validate(length(min = 1, max = 255, message = "must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub attendance: Option<f64>,
    #[validate(range(min = 0.0, max = 24.0, message = "must be between 0 and 24"))]
    pub study_hours: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub previous_marks: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "must be between 0 and 100"))]
    pub assignment_score: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct StudentFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl StudentFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

impl Student {
    /// All four model inputs, or None if any is missing
    pub fn features(&self) -> Option<FeatureSet> {
        Some(FeatureSet {
            attendance: self.attendance?,
            study_hours: self.study_hours?,
            previous_marks: self.previous_marks?,
            assignment_score: self.assignment_score?,
        })
    }

    pub async fn create(
        pool: &PgPool,
        teacher_id: Uuid,
        data: &CreateStudent,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (teacher_id, name, attendance, study_hours, previous_marks, assignment_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(teacher_id)
        .bind(data.name.trim())
        .bind(data.attendance)
        .bind(data.study_hours)
        .bind(data.previous_marks)
        .bind(data.assignment_score)
        .fetch_one(pool)
        .await
    }

    /// Lookup scoped to the owning teacher
    pub async fn find_for_teacher(
        pool: &PgPool,
        id: Uuid,
        teacher_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1 AND teacher_id = $2")
            .bind(id)
            .bind(teacher_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_teacher(
        pool: &PgPool,
        teacher_id: Uuid,
        filter: &StudentFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT * FROM students
            WHERE teacher_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        )
        .bind(teacher_id)
        .bind(filter.limit())
        .bind(filter.offset())
        .fetch_all(pool)
        .await
    }

    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        teacher_id: Uuid,
        data: &UpdateStudent,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET name = COALESCE($3, name),
                attendance = COALESCE($4, attendance),
                study_hours = COALESCE($5, study_hours),
                previous_marks = COALESCE($6, previous_marks),
                assignment_score = COALESCE($7, assignment_score),
                updated_at = NOW()
            WHERE id = $1 AND teacher_id = $2
            RETURNING *
            "#
        )
        .bind(id)
        .bind(teacher_id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(data.attendance)
        .bind(data.study_hours)
        .bind(data.previous_marks)
        .bind(data.assignment_score)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid, teacher_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1 AND teacher_id = $2")
            .bind(id)
            .bind(teacher_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            teacher_id: Uuid::new_v4(),
            name: "Asha".to_string(),
            attendance: Some(92.0),
            study_hours: Some(3.5),
            previous_marks: Some(68.0),
            assignment_score: Some(74.0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_features_complete() {
        let features = student().features().unwrap();
        assert_eq!(features.attendance, 92.0);
        assert_eq!(features.study_hours, 3.5);
        assert_eq!(features.previous_marks, 68.0);
        assert_eq!(features.assignment_score, 74.0);
    }

    #[test]
    fn test_features_incomplete() {
        let mut s = student();
        s.assignment_score = None;
        assert!(s.features().is_none());

        let mut s = student();
        s.attendance = None;
        assert!(s.features().is_none());
    }

    #[test]
    fn test_feature_ranges() {
        let data = CreateStudent {
            name: "Asha".to_string(),
            attendance: Some(101.0),
            study_hours: Some(30.0),
            previous_marks: None,
            assignment_score: Some(50.0),
        };
        let errors = data.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("attendance"));
        assert!(fields.contains_key("study_hours"));
        assert!(!fields.contains_key("assignment_score"));

        let partial = UpdateStudent { study_hours: Some(2.0), ..Default::default() };
        assert!(partial.validate().is_ok());
    }

    #[test]
    fn test_filter_bounds() {
        assert_eq!(StudentFilter::default().limit(), DEFAULT_LIST_LIMIT);
        assert_eq!(StudentFilter { limit: Some(10_000), offset: None }.limit(), MAX_LIST_LIMIT);
        assert_eq!(StudentFilter { limit: Some(0), offset: Some(-5) }.limit(), 1);
        assert_eq!(StudentFilter { limit: None, offset: Some(-5) }.offset(), 0);
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_value(student()).unwrap();
        assert!(json.get("studyHours").is_some());
        assert!(json.get("previousMarks").is_some());
        assert!(json.get("assignmentScore").is_some());
        assert!(json.get("teacherId").is_some());
    }

    #[test]
    fn test_detail_flattens_student_with_predictions() {
        let s = student();
        let snapshot = Prediction {
            id: Uuid::new_v4(),
            student_id: s.id,
            predicted_result: crate::predictor::PredictionLabel::Pass,
            attendance: 92.0,
            study_hours: 3.5,
            previous_marks: 68.0,
            assignment_score: 74.0,
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(StudentDetail { student: s, predictions: vec![snapshot] }).unwrap();
        assert_eq!(json["name"], "Asha");
        assert_eq!(json["studyHours"], 3.5);
        assert!(json.get("student").is_none());
        assert_eq!(json["predictions"][0]["predictedResult"], "Pass");
        assert!(json["predictions"][0].get("createdAt").is_some());
    }
}
