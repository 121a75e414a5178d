//! Router behavior that never reaches the database.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

use clinic_service::service_routers;

use crate::integration::common::{get, offline_app, offline_state, post, send, ADMIN, PATIENT, THERAPIST};

#[tokio::test]
async fn health_returns_200() {
    let (status, body) = get(offline_app(), "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn version_lists_services() {
    let (status, body) = get(offline_app(), "/version", None).await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["services"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn missing_authorization_is_409() {
    let (status, body) = get(offline_app(), "/getUsers", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Authorization header required");
}

#[tokio::test]
async fn unknown_login_is_409() {
    let (status, body) = get(offline_app(), "/getUsers", Some("admin@example.com:wrong")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Login is not valid");
}

#[tokio::test]
async fn header_without_colon_is_not_a_valid_login() {
    let (status, body) = get(offline_app(), "/getUsers", Some("admin@example.com")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Login is not valid");
}

#[tokio::test]
async fn password_whitespace_is_part_of_the_password() {
    let (status, body) = get(offline_app(), "/getClinicById", Some("spaced@example.com: padded pw ")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "id required");

    let (_, body) = get(offline_app(), "/getClinicById", Some("spaced@example.com:padded pw")).await;
    assert_eq!(body, "Login is not valid");
}

#[tokio::test]
async fn role_outside_whitelist_is_409() {
    let (status, body) = get(offline_app(), "/getClinics", Some(THERAPIST)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Login does not have the required roles");

    let (status, body) = get(offline_app(), "/getPatientById?id=1", Some(PATIENT)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Login does not have the required roles");
}

#[tokio::test]
async fn errors_are_plain_text() {
    let request = Request::get("/getUsers").body(Body::empty()).unwrap();
    let response = tower::ServiceExt::oneshot(offline_app(), request).await.unwrap();
    let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn authorization_is_checked_before_parameters() {
    let (status, body) = get(offline_app(), "/getExercisesByNameContains", Some(PATIENT)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Value required");

    let (_, body) = get(offline_app(), "/getExercisesByNameContains", None).await;
    assert_eq!(body, "Authorization header required");
}

#[tokio::test]
async fn single_value_filter_without_value_is_409() {
    let (status, body) = get(
        offline_app(),
        "/getPatientsByStaffMemberAndNameContains?staffmemberid=1",
        Some(ADMIN),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Value required");
}

#[tokio::test]
async fn between_filter_needs_two_values() {
    let (status, body) = get(offline_app(), "/getExercisesBySetsBetween?value1=2", Some(THERAPIST)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Two values required");
}

#[tokio::test]
async fn scoped_routes_need_their_scope_parameter() {
    let (status, body) = get(offline_app(), "/getVideosByPatient", Some(PATIENT)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "patientid required");
}

#[tokio::test]
async fn read_by_id_needs_id() {
    let (status, body) = get(offline_app(), "/getClinicById", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "id required");
}

#[tokio::test]
async fn update_needs_id_in_body() {
    let (status, body) = post(offline_app(), "/updateClinic", Some(ADMIN), json!({"name": "North"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "id required");
}

#[tokio::test]
async fn body_must_be_an_object() {
    let (status, body) = post(offline_app(), "/createClinic", Some(ADMIN), json!([1, 2])).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Request body must be a JSON object");
}

#[tokio::test]
async fn login_route_needs_no_authorization_but_needs_both_fields() {
    let (status, body) = post(
        offline_app(),
        "/getUserByEmailAddressAndPassword",
        None,
        json!({"emailaddress": "a@b.c"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "password required");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, body) = get(offline_app(), "/getEverything", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Cannot GET /getEverything");
}

#[tokio::test]
async fn wrong_method_is_404() {
    let (status, body) = post(offline_app(), "/getUsers", Some(ADMIN), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Cannot POST /getUsers");

    let (status, _) = get(offline_app(), "/createUser", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn each_service_serves_only_its_own_routes() {
    let routers = service_routers(offline_state(), None);
    assert_eq!(routers.len(), 10);
    let patients = routers.into_iter().find(|r| r.name == "Patients").unwrap();
    assert_eq!(patients.port, 3004);

    let request = Request::get("/getUsers").header("authorization", ADMIN).body(Body::empty()).unwrap();
    let (status, _) = send(patients.router.clone(), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = get(patients.router, "/getPatientById", Some(ADMIN)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "id required");
}

#[tokio::test]
async fn single_port_serves_everything() {
    let routers = service_routers(offline_state(), Some(8080));
    assert_eq!(routers.len(), 1);
    assert_eq!(routers[0].port, 8080);
}
