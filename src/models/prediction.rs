//! Prediction snapshot model

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::predictor::{FeatureSet, PredictionLabel};

/// Stored prediction with the inputs it was made from
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    pub id: Uuid,
    pub student_id: Uuid,
    #[sqlx(try_from = "String")]
    pub predicted_result: PredictionLabel,
    pub attendance: f64,
    pub study_hours: f64,
    pub previous_marks: f64,
    pub assignment_score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponseData {
    pub student_name: String,
    pub prediction: PredictionLabel,
}

/// One chart point per prediction
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: String,
    pub created_at: DateTime<Utc>,
    pub pass: u8,
    pub fail: u8,
    pub attendance: f64,
    pub study_hours: f64,
    pub previous_marks: f64,
    pub assignment_score: f64,
}

/// Chart-ready history, oldest first
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionTrend {
    pub student_id: Uuid,
    pub points: Vec<TrendPoint>,
    pub pass_count: usize,
    pub fail_count: usize,
    pub latest: Option<PredictionLabel>,
}

impl PredictionTrend {
    /// Build from snapshots in any order
    pub fn from_history(student_id: Uuid, history: &[Prediction]) -> Self {
        let mut ordered: Vec<&Prediction> = history.iter().collect();
        ordered.sort_by_key(|p| p.created_at);

        let points: Vec<TrendPoint> = ordered
            .iter()
            .map(|p| TrendPoint {
                date: p.created_at.format("%Y-%m-%d").to_string(),
                created_at: p.created_at,
                pass: p.predicted_result.is_pass() as u8,
                fail: (!p.predicted_result.is_pass()) as u8,
                attendance: p.attendance,
                study_hours: p.study_hours,
                previous_marks: p.previous_marks,
                assignment_score: p.assignment_score,
            })
            .collect();

        let pass_count = points.iter().filter(|p| p.pass == 1).count();

        Self {
            student_id,
            pass_count,
            fail_count: points.len() - pass_count,
            latest: ordered.last().map(|p| p.predicted_result),
            points,
        }
    }
}

impl Prediction {
    pub async fn create(
        pool: &PgPool,
        student_id: Uuid,
        label: PredictionLabel,
        features: &FeatureSet,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            INSERT INTO predictions (student_id, predicted_result, attendance, study_hours, previous_marks, assignment_score)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#
        )
        .bind(student_id)
        .bind(label.as_str())
        .bind(features.attendance)
        .bind(features.study_hours)
        .bind(features.previous_marks)
        .bind(features.assignment_score)
        .fetch_one(pool)
        .await
    }

    /// Newest first
    pub async fn list_by_student(pool: &PgPool, student_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Prediction>(
            r#"
            SELECT * FROM predictions
            WHERE student_id = $1
            ORDER BY created_at DESC
            "#
        )
        .bind(student_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(day: u32, label: PredictionLabel, attendance: f64) -> Prediction {
        Prediction {
            id: Uuid::new_v4(),
            student_id: Uuid::nil(),
            predicted_result: label,
            attendance,
            study_hours: 2.0,
            previous_marks: 60.0,
            assignment_score: 70.0,
            created_at: Utc.with_ymd_and_hms(2025, 3, day, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_trend_is_chronological() {
        // Stored order is newest first
        let history = vec![
            snapshot(12, PredictionLabel::Pass, 90.0),
            snapshot(5, PredictionLabel::Fail, 70.0),
            snapshot(8, PredictionLabel::Pass, 80.0),
        ];

        let trend = PredictionTrend::from_history(Uuid::nil(), &history);

        let dates: Vec<&str> = trend.points.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2025-03-05", "2025-03-08", "2025-03-12"]);
        assert_eq!(trend.points[0].fail, 1);
        assert_eq!(trend.points[0].pass, 0);
        assert_eq!(trend.points[2].attendance, 90.0);
        assert_eq!(trend.pass_count, 2);
        assert_eq!(trend.fail_count, 1);
        assert_eq!(trend.latest, Some(PredictionLabel::Pass));
    }

    #[test]
    fn test_trend_empty() {
        let trend = PredictionTrend::from_history(Uuid::nil(), &[]);
        assert!(trend.points.is_empty());
        assert_eq!(trend.pass_count, 0);
        assert_eq!(trend.fail_count, 0);
        assert_eq!(trend.latest, None);
    }

    #[test]
    fn test_label_serializes_as_word() {
        let json = serde_json::to_value(snapshot(1, PredictionLabel::Fail, 50.0)).unwrap();
        assert_eq!(json["predictedResult"], "Fail");
        assert!(json.get("studyHours").is_some());
    }
}
