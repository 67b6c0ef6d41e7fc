//! Request handlers, one per endpoint

use super::error::ApiResult;
use super::AppState;
use crate::core::DatabaseRow;
use crate::records::{
    parse_leading_int, NewCourse, NewMark, NewStudent, PageRequest, RecordError, StudentDetail,
    StudentPage,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub const CONNECTED_MESSAGE: &str = "Connected to PostgreSQL database successfully!";
pub const CONNECTION_FAILED_MESSAGE: &str = "Error connecting to PostgreSQL database";

/// Raw listing parameters; parsing is left to [`PageRequest::from_raw`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub search: Option<String>,
}

impl ListParams {
    /// Keep the first value of each known key; repeats and unknown keys are ignored
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                "search" => &mut params.search,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }
}

/// Read a student id from the path
fn parse_id(raw: &str) -> Result<i64, RecordError> {
    parse_leading_int(raw)
        .ok_or_else(|| RecordError::bad_input(format!("Invalid student id: {}", raw)))
}

/// GET /test
pub async fn test_connection(State(state): State<AppState>) -> Response {
    match state.repo.ping().await {
        Ok(()) => (StatusCode::OK, CONNECTED_MESSAGE).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Error connecting to database");
            (StatusCode::INTERNAL_SERVER_ERROR, CONNECTION_FAILED_MESSAGE).into_response()
        }
    }
}

/// GET /students
pub async fn list_students(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResult<Json<StudentPage>> {
    let params = ListParams::from_pairs(pairs);
    let request = PageRequest::from_raw(
        params.page.as_deref(),
        params.limit.as_deref(),
        params.search.as_deref(),
    );
    Ok(Json(state.repo.list_students(&request).await?))
}

/// GET /students/:id
pub async fn get_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StudentDetail>> {
    let id = parse_id(&id)?;
    Ok(Json(state.repo.get_student(id).await?))
}

/// POST /students
pub async fn create_student(
    State(state): State<AppState>,
    Json(student): Json<NewStudent>,
) -> ApiResult<(StatusCode, Json<DatabaseRow>)> {
    let row = state.repo.create_student(&student).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /courses
pub async fn create_course(
    State(state): State<AppState>,
    Json(course): Json<NewCourse>,
) -> ApiResult<(StatusCode, Json<DatabaseRow>)> {
    let row = state.repo.create_course(&course).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// POST /marks
pub async fn create_mark(
    State(state): State<AppState>,
    Json(mark): Json<NewMark>,
) -> ApiResult<(StatusCode, Json<DatabaseRow>)> {
    let row = state.repo.create_mark(&mark).await?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// PUT /students/:id
pub async fn update_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(student): Json<NewStudent>,
) -> ApiResult<Json<DatabaseRow>> {
    let id = parse_id(&id)?;
    Ok(Json(state.repo.update_student(id, &student).await?))
}

/// DELETE /students/:id
pub async fn delete_student(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = parse_id(&id)?;
    state.repo.delete_student(id).await?;
    Ok(Json(json!({ "message": "Student deleted successfully" })))
}
