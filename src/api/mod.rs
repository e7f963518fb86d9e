use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use tracing::warn;

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

#[derive(Deserialize)]
struct SessionQueryParams {
    #[serde(default)]
    include_inactive: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", axum::routing::delete(delete_user))
        .route("/partners", get(list_partners).post(create_partner))
        .route("/partners/instructors", get(list_instructor_candidates))
        .route("/partners/{id}", get(get_partner).delete(delete_partner))
        .route("/courses", get(list_courses).post(create_course))
        .route(
            "/courses/{id}",
            get(get_course).patch(update_course).delete(delete_course),
        )
        .route("/courses/{id}/copy", post(copy_course))
        .route("/sessions", get(list_sessions).post(create_session))
        .route("/sessions/onchange", post(session_onchange))
        .route(
            "/sessions/{id}",
            get(get_session).patch(update_session).delete(delete_session),
        )
        .with_state(state)
}

fn deleted(ok: bool) -> Result<StatusCode, AppError> {
    if ok {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    let users = repository::fetch_users(&state.db).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<NewUserRequest>
) -> Result<Json<User>, AppError> {
    let user = repository::insert_user(&state.db, req).await?;
    Ok(Json(user))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<StatusCode, AppError> {
    deleted(repository::delete_user(&state.db, &id).await?)
}

async fn list_partners(State(state): State<AppState>) -> Result<Json<Vec<Partner>>, AppError> {
    let partners = repository::fetch_partners(&state.db).await?;
    Ok(Json(partners))
}

async fn list_instructor_candidates(
    State(state): State<AppState>
) -> Result<Json<Vec<Partner>>, AppError> {
    let partners = repository::fetch_instructor_candidates(&state.db).await?;
    Ok(Json(partners))
}

async fn get_partner(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Partner>, AppError> {
    let partner = repository::find_partner_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(partner))
}

async fn create_partner(
    State(state): State<AppState>,
    Json(req): Json<NewPartnerRequest>
) -> Result<Json<Partner>, AppError> {
    let partner = repository::insert_partner(&state.db, req).await?;
    Ok(Json(partner))
}

async fn delete_partner(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<StatusCode, AppError> {
    deleted(repository::delete_partner(&state.db, &id).await?)
}

async fn list_courses(State(state): State<AppState>) -> Result<Json<Vec<Course>>, AppError> {
    let courses = repository::fetch_courses(&state.db).await?;
    Ok(Json(courses))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<CourseDetail>, AppError> {
    let course = repository::find_course_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>
) -> Result<Json<Course>, AppError> {
    let course = repository::insert_course(&state.db, req).await?;
    Ok(Json(course))
}

async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCourseRequest>
) -> Result<Json<Course>, AppError> {
    let course = repository::update_course(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<StatusCode, AppError> {
    deleted(repository::delete_course(&state.db, &id).await?)
}

async fn copy_course(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Course>, AppError> {
    let course = repository::copy_course(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<SessionQueryParams>
) -> Result<Json<Vec<Session>>, AppError> {
    let sessions = repository::fetch_sessions(&state.db, params.include_inactive).await?;
    Ok(Json(sessions))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Session>, AppError> {
    let session = repository::find_session_by_id(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(session))
}

async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<NewSessionRequest>
) -> Result<Json<Session>, AppError> {
    let session = repository::insert_session(&state.db, req).await?;
    Ok(Json(session))
}

async fn update_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateSessionRequest>
) -> Result<Json<Session>, AppError> {
    let session = repository::update_session(&state.db, &id, req)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(session))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<StatusCode, AppError> {
    deleted(repository::delete_session(&state.db, &id).await?)
}

/// Recomputes a draft without touching the database. Seat problems come
/// back as a warning, never as an error.
async fn session_onchange(Json(req): Json<OnchangeRequest>) -> Json<OnchangeResponse> {
    let resp = req.evaluate();
    if let Some(warning) = &resp.warning {
        warn!("session onchange warning: {}", warning.title);
    }
    Json(resp)
}
