//! End-to-end tests against a real PostgreSQL. Run with
//! `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::http::StatusCode;
use serde_json::{json, Value};
use sqlx::PgPool;

use clinic_service::{LogMailer, MailError, MailMessage, Mailer};

use clinic_service::config::parse_model;
use clinic_service::{apply_schema, resolve, ResolvedModel};

use crate::integration::common::{database_app, database_pool, get, model_app, post};

/// Unique marker so tests sharing one database do not see each other's rows.
fn tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Scope key no other test uses.
fn scope_id() -> i32 {
    (uuid::Uuid::new_v4().as_u128() % 1_000_000_000) as i32
}

async fn insert_user(pool: &PgPool, name: &str, email: &str, password: &str, roles: &[&str]) -> i64 {
    let roles: Vec<String> = roles.iter().map(|r| r.to_string()).collect();
    let (id,): (i32,) = sqlx::query_as(
        r#"INSERT INTO "user" (name, emailaddress, password, roles) VALUES ($1, $2, $3, $4) RETURNING id"#,
    )
    .bind(name)
    .bind(email)
    .bind(password)
    .bind(&roles)
    .fetch_one(pool)
    .await
    .unwrap();
    i64::from(id)
}

/// An Administrator account; returns its `Authorization` header value.
async fn admin(pool: &PgPool) -> String {
    let email = format!("admin-{}@example.com", tag());
    insert_user(pool, "Admin", &email, "pw", &["Administrator"]).await;
    format!("{}:pw", email)
}

fn rows(body: &str) -> Vec<Value> {
    serde_json::from_str::<Value>(body).unwrap().as_array().unwrap().clone()
}

struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _message: &MailMessage) -> Result<(), MailError> {
        Err(MailError::Transport("smtp down".into()))
    }
}

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

#[tokio::test]
#[ignore]
async fn contains_is_a_case_insensitive_substring_match() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let app = database_app(pool, Arc::new(LogMailer));
    let t = tag();

    for name in [format!("North {} Physio", t), format!("south-{}", t)] {
        let (status, _) = post(app.clone(), "/createClinic", Some(&auth), json!({ "name": name })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let uri = format!("/getClinicsByNameContains?value={}", t.to_uppercase());
    let (status, body) = get(app.clone(), &uri, Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows(&body).len(), 2);

    // LIKE wildcards in the value are literal
    let uri = format!("/getClinicsByNameContains?value=North%20%25{}", t);
    let (_, body) = get(app, &uri, Some(&auth)).await;
    assert!(rows(&body).is_empty());
}

#[tokio::test]
#[ignore]
async fn scoped_filters_and_initial_lists() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let app = database_app(pool, Arc::new(LogMailer));
    let patient = scope_id();

    for day in 1..=12 {
        let title = if day % 4 == 0 { Value::Null } else { json!(format!("Session {}", day)) };
        let body = json!({
            "patientid": patient,
            "title": title,
            "datetimecreated": format!("2024-03-{:02}T10:00:00", day),
            "url": "https://videos.example.com/x"
        });
        let (status, _) = post(app.clone(), "/createVideo", Some(&auth), body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = get(app.clone(), &format!("/getVideosByPatient?patientid={}", patient), Some(&auth)).await;
    let all = rows(&body);
    assert_eq!(all.len(), 12);
    let ids: Vec<i64> = all.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let (_, body) = get(app.clone(), &format!("/getInitialVideosByPatient?patientid={}", patient), Some(&auth)).await;
    assert_eq!(rows(&body).len(), 10);

    let uri = format!("/getVideosByPatientAndTitleEmpty?patientid={}", patient);
    let (_, body) = get(app.clone(), &uri, Some(&auth)).await;
    assert_eq!(rows(&body).len(), 3);

    let uri = format!("/getVideosByPatientAndTitleNotEmpty?patientid={}", patient);
    let (_, body) = get(app.clone(), &uri, Some(&auth)).await;
    assert_eq!(rows(&body).len(), 9);

    let uri = format!(
        "/getVideosByPatientAndDateTimeCreatedBetween?patientid={}&value1=2024-03-02T10:00:00&value2=2024-03-04T10:00:00",
        patient
    );
    let (_, body) = get(app.clone(), &uri, Some(&auth)).await;
    assert_eq!(rows(&body).len(), 3, "between is inclusive");

    let uri = format!(
        "/getVideosByPatientAndDateTimeCreatedBefore?patientid={}&value=2024-03-03",
        patient
    );
    let (_, body) = get(app.clone(), &uri, Some(&auth)).await;
    let before = rows(&body);
    assert_eq!(before.len(), 2);
    assert_eq!(before[0]["datetimecreated"], "2024-03-01T10:00:00.000");

    let uri = format!(
        "/getVideosByPatientAndDateTimeCreatedAfter?patientid={}&value=2024-03-10",
        patient
    );
    let (_, body) = get(app, &uri, Some(&auth)).await;
    let after = rows(&body);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0]["datetimecreated"], "2024-03-10T10:00:00.000");
}

/// Shops and gadgets in tables of their own, with column types the clinic model never uses.
async fn gadget_model(pool: &PgPool) -> ResolvedModel {
    let t = tag();
    let json = format!(
        r#"{{
          "entities": [
            {{
              "name": "Shop",
              "table": "shop_{t}",
              "columns": [
                {{ "name": "id", "type": "serial" }},
                {{ "name": "fee", "type": "numeric(6,2)" }}
              ],
              "roles": {{ "read": ["Administrator"], "write": ["Administrator"] }}
            }},
            {{
              "name": "Gadget",
              "table": "gadget_{t}",
              "columns": [
                {{ "name": "id", "type": "serial" }},
                {{ "name": "shopid", "type": "integer" }},
                {{ "name": "stock", "type": "integer" }},
                {{ "name": "tags", "type": "integer[]" }},
                {{ "name": "opens", "type": "time" }}
              ],
              "joins": [
                {{
                  "table": "shop_{t}",
                  "alias": "shop",
                  "local_column": "shopid",
                  "columns": [{{ "column": "fee", "alias": "shopfee", "type": "numeric(6,2)" }}]
                }}
              ],
              "scopes": [{{ "name": "Shop", "column": "shopid" }}],
              "filters": [{{ "name": "Stock", "column": "stock" }}],
              "roles": {{ "read": ["Administrator"], "write": ["Administrator"] }}
            }}
          ]
        }}"#
    );
    let model = resolve(&parse_model(&json).unwrap()).unwrap();
    apply_schema(pool, &model).await.unwrap();
    model
}

#[tokio::test]
#[ignore]
async fn unusual_column_types_come_back_as_json() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let model = gadget_model(&pool).await;
    let app = model_app(pool, model, Arc::new(LogMailer));

    let (_, shop) = post(app.clone(), "/createShop", Some(&auth), json!({"fee": 2.5})).await;
    let shop: Value = serde_json::from_str(&shop).unwrap();
    assert_eq!(shop["fee"], 2.5);

    let body = json!({"shopid": shop["id"], "stock": 4, "tags": [1, 2], "opens": "09:30:00"});
    let (status, created) = post(app.clone(), "/createGadget", Some(&auth), body).await;
    assert_eq!(status, StatusCode::OK);
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["tags"], json!([1, 2]));
    assert_eq!(created["opens"], "09:30:00");

    let uri = format!("/getGadgetsByShop?shopid={}", shop["id"]);
    let (_, body) = get(app, &uri, Some(&auth)).await;
    let listed = rows(&body);
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["tags"], json!([1, 2]));
    assert_eq!(listed[0]["opens"], "09:30:00");
    assert_eq!(listed[0]["shopfee"], 2.5);
}

#[tokio::test]
#[ignore]
async fn integer_comparisons() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let model = gadget_model(&pool).await;
    let app = model_app(pool, model, Arc::new(LogMailer));

    let (_, shop) = post(app.clone(), "/createShop", Some(&auth), json!({"fee": 1})).await;
    let shop: Value = serde_json::from_str(&shop).unwrap();
    for stock in [1, 5, 9] {
        let body = json!({"shopid": shop["id"], "stock": stock});
        let (status, _) = post(app.clone(), "/createGadget", Some(&auth), body).await;
        assert_eq!(status, StatusCode::OK);
    }

    let stocks = |body: String| -> Vec<i64> { rows(&body).iter().map(|r| r["stock"].as_i64().unwrap()).collect() };
    let filter = |op: &str, query: &str| format!("/getGadgetsByShopAndStock{}?shopid={}&{}", op, shop["id"], query);

    let (_, body) = get(app.clone(), &filter("Equals", "value=5"), Some(&auth)).await;
    assert_eq!(stocks(body), vec![5]);
    let (_, body) = get(app.clone(), &filter("GreaterThan", "value=5"), Some(&auth)).await;
    assert_eq!(stocks(body), vec![9]);
    let (_, body) = get(app.clone(), &filter("LessThan", "value=5"), Some(&auth)).await;
    assert_eq!(stocks(body), vec![1]);
    let (_, body) = get(app, &filter("Between", "value1=1&value2=5"), Some(&auth)).await;
    assert_eq!(stocks(body), vec![1, 5]);
}

#[tokio::test]
#[ignore]
async fn missing_rows() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let app = database_app(pool, Arc::new(LogMailer));

    let (status, body) = get(app.clone(), "/getVideoById?id=2000000000", Some(&auth)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Video not found");

    let (status, body) = get(app.clone(), "/deleteVideo?id=2000000000", Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, body) = post(app, "/updateVideo", Some(&auth), json!({"id": 2000000000, "title": "x"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "Video not found");
}

#[tokio::test]
#[ignore]
async fn update_changes_only_given_columns() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let app = database_app(pool, Arc::new(LogMailer));

    let body = json!({"name": "Squat", "description": "Bodyweight", "sets": 3, "reps": 10, "hold": 0});
    let (_, created) = post(app.clone(), "/createExercise", Some(&auth), body).await;
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["sets"], 3);

    let id = created["id"].clone();
    let (status, updated) = post(app.clone(), "/updateExercise", Some(&auth), json!({"id": id, "reps": 12})).await;
    assert_eq!(status, StatusCode::OK);
    let updated: Value = serde_json::from_str(&updated).unwrap();
    assert_eq!(updated["reps"], 12);
    assert_eq!(updated["description"], "Bodyweight");

    let (status, _) = get(app.clone(), &format!("/deleteExercise?id={}", id), Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = get(app, &format!("/getExerciseById?id={}", id), Some(&auth)).await;
    assert_eq!(body, "Exercise not found");
}

#[tokio::test]
#[ignore]
async fn passwords_never_leave_the_service() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let email = format!("pat-{}@example.com", tag());
    let id = insert_user(&pool, "Pat", &email, "secret", &["Patient"]).await;
    let app = database_app(pool, Arc::new(LogMailer));

    let (status, body) = get(app.clone(), &format!("/getUserById?id={}", id), Some(&auth)).await;
    assert_eq!(status, StatusCode::OK);
    let user: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(user["emailaddress"], email);
    assert_eq!(user["roles"], json!(["Patient"]));
    assert!(user.get("password").is_none());

    let (status, body) = post(
        app.clone(),
        "/getUserByEmailAddressAndPassword",
        None,
        json!({"emailaddress": email, "password": "secret"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let user: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(user["id"], id);

    let (status, body) = post(
        app,
        "/getUserByEmailAddressAndPassword",
        None,
        json!({"emailaddress": email, "password": "wrong"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "User not found");
}

async fn patients_of(pool: &PgPool, user_id: i64) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patient WHERE userid = $1")
        .bind(user_id as i32)
        .fetch_one(pool)
        .await
        .unwrap();
    n
}

#[tokio::test]
#[ignore]
async fn patient_creation_sends_welcome_mail() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let email = format!("new-{}@example.com", tag());
    let user_id = insert_user(&pool, "Nina", &email, "first-pw", &["Patient"]).await;
    let mailer = Arc::new(RecordingMailer::default());
    let app = database_app(pool.clone(), mailer.clone());

    let body = json!({"userid": user_id, "staffmemberid": 1, "dateofbirth": "1990-07-15"});
    let (status, created) = post(app, "/createPatient", Some(&auth), body).await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    let created: Value = serde_json::from_str(&created).unwrap();
    assert_eq!(created["dateofbirth"], "1990-07-15");

    let sent = mailer.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, email);
    assert!(sent[0].html.contains("first-pw"));
    assert_eq!(patients_of(&pool, user_id).await, 1);
}

#[tokio::test]
#[ignore]
async fn patient_creation_rolls_back_when_mail_fails() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let email = format!("fail-{}@example.com", tag());
    let user_id = insert_user(&pool, "Finn", &email, "pw", &["Patient"]).await;
    let app = database_app(pool.clone(), Arc::new(FailingMailer));

    let body = json!({"userid": user_id, "staffmemberid": 1, "dateofbirth": "1990-07-15"});
    let (status, body) = post(app, "/createPatient", Some(&auth), body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "mail transport: smtp down");
    assert_eq!(patients_of(&pool, user_id).await, 0);
}

#[tokio::test]
#[ignore]
async fn patient_for_missing_user_is_rolled_back() {
    let pool = database_pool().await;
    let auth = admin(&pool).await;
    let app = database_app(pool.clone(), Arc::new(LogMailer));
    let missing = i64::from(scope_id()) + 1_000_000_000;

    let body = json!({"userid": missing, "staffmemberid": 1});
    let (status, body) = post(app, "/createPatient", Some(&auth), body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, "User not found");
    assert_eq!(patients_of(&pool, missing).await, 0);
}
