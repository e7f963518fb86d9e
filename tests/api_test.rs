use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use openacademy::api::router;
use openacademy::db::connect_in_memory;
use openacademy::state::AppState;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Router {
    let db = connect_in_memory()
        .await
        .expect("Failed to create database");
    router(AppState { db })
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Request failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body is not JSON")
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_course_constraints_surface_as_conflict() {
    let app = app().await;

    let (status, _) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "The course name must be unique.");

    let (status, _) = send(
        &app,
        Method::POST,
        "/courses",
        Some(json!({"name": "Same", "description": "Same"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_copy_course() {
    let app = app().await;

    let (_, course) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    let uri = format!("/courses/{}/copy", course["id"].as_str().unwrap());

    let (status, first) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["name"], "Copy of Intro");

    let (_, second) = send(&app, Method::POST, &uri, None).await;
    assert_eq!(second["name"], "Copy of Intro (1)");

    let (status, _) = send(&app, Method::POST, "/courses/missing/copy", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = app().await;

    let (_, course) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    let (_, lecturer) = send(
        &app,
        Method::POST,
        "/partners",
        Some(json!({"name": "Lecturer", "is_instructor": true})),
    )
    .await;
    let (_, student) = send(&app, Method::POST, "/partners", Some(json!({"name": "Student"}))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({
            "name": "Morning",
            "course_id": course["id"],
            "start_date": "2024-01-01",
            "duration": 5,
            "seats": 10,
            "instructor_id": lecturer["id"],
            "attendee_ids": [lecturer["id"], student["id"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "the instructor of a session may not also be an attendee.");

    let (status, session) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({
            "name": "Morning",
            "course_id": course["id"],
            "start_date": "2024-01-01",
            "duration": 5,
            "seats": 10,
            "instructor_id": lecturer["id"],
            "attendee_ids": [student["id"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["attendees_count"], 1);
    assert_eq!(session["taken_seats"], 10.0);
    assert_eq!(session["end_date"], "2024-01-05T23:59:59");

    let uri = format!("/sessions/{}", session["id"].as_str().unwrap());
    let (status, updated) = send(
        &app,
        Method::PATCH,
        &uri,
        Some(json!({"end_date": "2024-01-03", "instructor_id": null})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["duration"], 3.0);
    assert_eq!(updated["instructor_id"], Value::Null);

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/courses/{}", course["id"].as_str().unwrap()),
        None,
    )
    .await;
    assert_eq!(detail["session_ids"], json!([session["id"]]));

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_onchange_warns_without_failing() {
    let app = app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions/onchange",
        Some(json!({"seats": -1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["warning"]["title"], "Incorrect 'seats' value");

    let (status, body) = send(
        &app,
        Method::POST,
        "/sessions/onchange",
        Some(json!({"seats": 1, "attendee_ids": ["a", "b"], "start_date": "2024-01-01", "end_date": "2024-01-05"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["warning"]["title"], "Too many attendees");
    assert_eq!(body["duration"], 5.0);
    assert_eq!(body["taken_seats"], 200.0);
}

#[tokio::test]
async fn test_overbooked_session_still_saves() {
    let app = app().await;

    let (_, course) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    let (_, a) = send(&app, Method::POST, "/partners", Some(json!({"name": "A"}))).await;
    let (_, b) = send(&app, Method::POST, "/partners", Some(json!({"name": "B"}))).await;

    let (status, session) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({
            "name": "Crowded",
            "course_id": course["id"],
            "seats": 1,
            "attendee_ids": [a["id"], b["id"]],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["taken_seats"], 200.0);
}

#[tokio::test]
async fn test_instructor_candidates_route() {
    let app = app().await;

    send(
        &app,
        Method::POST,
        "/partners",
        Some(json!({"name": "Prof", "categories": ["Professor"]})),
    )
    .await;
    send(&app, Method::POST, "/partners", Some(json!({"name": "Student"}))).await;

    let (status, body) = send(&app, Method::GET, "/partners/instructors", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Prof"]);
}

#[tokio::test]
async fn test_course_with_sessions_is_not_deleted() {
    let app = app().await;

    let (_, course) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    let (_, session) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({"name": "Morning", "course_id": course["id"]})),
    )
    .await;
    let course_uri = format!("/courses/{}", course["id"].as_str().unwrap());
    let session_uri = format!("/sessions/{}", session["id"].as_str().unwrap());

    let (status, body) = send(&app, Method::DELETE, &course_uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "The referenced record does not exist or is still in use.");

    let (status, _) = send(&app, Method::GET, &course_uri, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::DELETE, &session_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &course_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_session_created_with_null_start_date_stays_undated() {
    let app = app().await;

    let (_, course) = send(&app, Method::POST, "/courses", Some(json!({"name": "Intro"}))).await;
    let (status, session) = send(
        &app,
        Method::POST,
        "/sessions",
        Some(json!({"name": "Undated", "course_id": course["id"], "start_date": null, "duration": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["start_date"], Value::Null);
    assert_eq!(session["end_date"], Value::Null);
}
