//! Pass/fail prediction handler

use axum::{extract::State, Json};
use uuid::Uuid;

use crate::{AppState, AppResult, AppError};
use crate::handlers::{ApiResponse, AppPath};
use crate::models::{Prediction, PredictResponseData, Student};
use crate::middleware::auth::TeacherContext;
use crate::predictor::{FeatureSet, PredictionLabel, Predictor};

pub const INCOMPLETE_DATA_MESSAGE: &str =
    "Student data is incomplete for prediction. Missing required fields.";

/// Run the model for one student and store the snapshot
pub async fn predict_student_result(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(student_id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<PredictResponseData>>> {
    let student = Student::find_for_teacher(&state.pool, student_id, teacher.teacher_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    let (features, label) = classify_student(&student, &state.predictor).await?;

    let snapshot = Prediction::create(&state.pool, student.id, label, &features).await?;

    tracing::info!(
        student_id = %student.id,
        prediction_id = %snapshot.id,
        "Prediction stored: {}", label
    );

    Ok(Json(ApiResponse::ok(
        "Prediction done successfully.",
        PredictResponseData {
            student_name: student.name,
            prediction: label,
        },
    )))
}

/// Completeness check, then one model run. The interpreter is not touched
/// for incomplete records.
pub async fn classify_student(
    student: &Student,
    predictor: &Predictor,
) -> AppResult<(FeatureSet, PredictionLabel)> {
    let features = student
        .features()
        .ok_or_else(|| AppError::ValidationError(INCOMPLETE_DATA_MESSAGE.to_string()))?;

    let label = predictor.predict(&features).await?;
    Ok((features, label))
}
