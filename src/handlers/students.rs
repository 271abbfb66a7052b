//! Student handlers

use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, AppResult, AppError};
use crate::handlers::{ApiResponse, AppJson, AppPath, AppQuery};
use crate::models::{CreateStudent, Prediction, PredictionTrend, Student, StudentDetail, StudentFilter, UpdateStudent};
use crate::middleware::auth::TeacherContext;

fn student_not_found() -> AppError {
    AppError::NotFound("Student not found".to_string())
}

fn reject_blank_name(name: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::ValidationError("Invalid input: name must not be blank".to_string()));
    }
    Ok(())
}

/// Create a student owned by the acting teacher
pub async fn create(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppJson(req): AppJson<CreateStudent>,
) -> AppResult<(StatusCode, Json<ApiResponse<Student>>)> {
    req.validate()?;
    reject_blank_name(&req.name)?;

    let student = Student::create(&state.pool, teacher.teacher_id, &req).await?;
    tracing::info!("Student {} created by teacher {}", student.id, teacher.teacher_id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(StatusCode::CREATED, "Student created successfully.", student)),
    ))
}

/// List the acting teacher's students
pub async fn list(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppQuery(filter): AppQuery<StudentFilter>,
) -> AppResult<Json<ApiResponse<Vec<Student>>>> {
    let students = Student::list_by_teacher(&state.pool, teacher.teacher_id, &filter).await?;
    Ok(Json(ApiResponse::ok("Students fetched successfully.", students)))
}

/// Student with prediction history
pub async fn get(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<StudentDetail>>> {
    let student = Student::find_for_teacher(&state.pool, id, teacher.teacher_id)
        .await?
        .ok_or_else(student_not_found)?;

    let predictions = Prediction::list_by_student(&state.pool, student.id).await?;

    Ok(Json(ApiResponse::ok(
        "Student fetched successfully.",
        StudentDetail { student, predictions },
    )))
}

/// Partial update
pub async fn update(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateStudent>,
) -> AppResult<Json<ApiResponse<Student>>> {
    req.validate()?;
    if let Some(name) = &req.name {
        reject_blank_name(name)?;
    }

    let student = Student::update(&state.pool, id, teacher.teacher_id, &req)
        .await?
        .ok_or_else(student_not_found)?;

    Ok(Json(ApiResponse::ok("Student updated successfully.", student)))
}

/// Delete a student and its prediction history
pub async fn delete(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let deleted = Student::delete(&state.pool, id, teacher.teacher_id).await?;

    if !deleted {
        return Err(student_not_found());
    }

    tracing::info!("Student {} deleted by teacher {}", id, teacher.teacher_id);
    Ok(Json(ApiResponse::ok("Student deleted successfully.", serde_json::json!({ "deleted": true }))))
}

/// Prediction snapshots, newest first
pub async fn predictions(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<Prediction>>>> {
    let student = Student::find_for_teacher(&state.pool, id, teacher.teacher_id)
        .await?
        .ok_or_else(student_not_found)?;

    let history = Prediction::list_by_student(&state.pool, student.id).await?;
    Ok(Json(ApiResponse::ok("Prediction history fetched successfully.", history)))
}

/// Chart series for the prediction history
pub async fn prediction_trend(
    State(state): State<AppState>,
    teacher: TeacherContext,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ApiResponse<PredictionTrend>>> {
    let student = Student::find_for_teacher(&state.pool, id, teacher.teacher_id)
        .await?
        .ok_or_else(student_not_found)?;

    let history = Prediction::list_by_student(&state.pool, student.id).await?;
    let trend = PredictionTrend::from_history(student.id, &history);

    Ok(Json(ApiResponse::ok("Prediction trend fetched successfully.", trend)))
}
