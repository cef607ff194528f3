// tests/session_tests.rs

mod common;

use std::collections::HashSet;

use common::{TestApp, spawn_app};
use serde_json::{Value, json};

/// Launches a session and returns its JSON.
async fn launch(app: &TestApp, token: &str, body: Value) -> Value {
    let res = app.post(token, "/api/sessions", body).await;
    assert_eq!(res.status().as_u16(), 201);
    res.json().await.unwrap()
}

async fn redeem(app: &TestApp, code: &str, identifier: Option<&str>) -> reqwest::Response {
    app.client
        .post(app.url("/api/take/redeem"))
        .json(&json!({"access_code": code, "identifier": identifier}))
        .send()
        .await
        .unwrap()
}

async fn submit(app: &TestApp, code: &str, answers: Value) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/api/take/{}/submit", code)))
        .json(&json!({"answers": answers}))
        .send()
        .await
        .unwrap()
}

fn first_code(session: &Value) -> String {
    session["access_codes"][0].as_str().unwrap().to_string()
}

fn drawn_question_ids(instance: &Value) -> Vec<String> {
    instance["sections"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|s| s["questions"].as_array().unwrap().iter())
        .map(|q| q["id"].as_str().unwrap().to_string())
        .collect()
}

/// Looks up the bank question and returns its (correct, wrong) answer ids.
async fn answer_ids(app: &TestApp, token: &str, question_id: &str) -> (String, String) {
    let q: Value = app
        .get(token, &format!("/api/questions/{}", question_id))
        .await
        .json()
        .await
        .unwrap();
    let answers = q["answers"].as_array().unwrap();
    let pick = |correct: bool| {
        answers
            .iter()
            .find(|a| a["is_correct"] == correct)
            .map(|a| a["id"].as_str().unwrap().to_string())
            .unwrap()
    };
    (pick(true), pick(false))
}

#[tokio::test]
async fn full_flow_one_right_one_wrong() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 2, 5).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 30}),
    )
    .await;
    assert_eq!(session["status"], "active");
    assert_eq!(session["participant_count"], 1);
    let code = first_code(&session);

    let res = redeem(&app, &code, Some("alice@example.com")).await;
    assert_eq!(res.status().as_u16(), 200);
    let instance: Value = res.json().await.unwrap();
    assert_eq!(instance["status"], "in_progress");
    assert_eq!(instance["time_limit_minutes"], 30);

    // Correctness flags never reach the participant.
    let raw = instance.to_string();
    assert!(!raw.contains("is_correct"));

    let ids = drawn_question_ids(&instance);
    assert_eq!(ids.len(), 2);
    let (right, _) = answer_ids(&app, &token, &ids[0]).await;
    let (_, wrong) = answer_ids(&app, &token, &ids[1]).await;

    let res = submit(
        &app,
        &code,
        json!([
            {"question_id": ids[0], "selected_answer_id": right},
            {"question_id": ids[1], "selected_answer_id": wrong}
        ]),
    )
    .await;
    assert_eq!(res.status().as_u16(), 200);
    let result: Value = res.json().await.unwrap();
    assert_eq!(result["status"], "completed");
    assert_eq!(result["total_score"], 5);
    assert_eq!(result["max_score"], 10);

    // Scores are final.
    let again = submit(&app, &code, json!([])).await;
    assert_eq!(again.status().as_u16(), 409);

    let report: Value = app
        .get(&token, &format!("/api/sessions/{}/results", session["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(report["status"], "completed");
    assert_eq!(report["completed_count"], 1);
    assert_eq!(report["participants"][0]["identifier"], "alice@example.com");
    assert_eq!(report["participants"][0]["percentage"], 50.0);
    assert_eq!(report["average_percentage"], 50.0);

    let review: Value = app
        .get(
            &token,
            &format!("/api/sessions/{}/participants/{}", session["id"].as_str().unwrap(), code),
        )
        .await
        .json()
        .await
        .unwrap();
    let items = review["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["is_correct"], true);
    assert_eq!(items[1]["is_correct"], false);
    assert_eq!(review["unanswered_count"], 0);
}

#[tokio::test]
async fn submitting_nothing_scores_zero() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 3, 2, 4).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 10}),
    )
    .await;
    let code = first_code(&session);
    redeem(&app, &code, Some("bob")).await;

    let result: Value = submit(&app, &code, json!([])).await.json().await.unwrap();
    assert_eq!(result["status"], "completed");
    assert_eq!(result["total_score"], 0);
    assert_eq!(result["max_score"], 8);

    let review: Value = app
        .get(
            &token,
            &format!("/api/sessions/{}/participants/{}", session["id"].as_str().unwrap(), code),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(review["unanswered_count"], 2);
    assert!(review["items"].as_array().unwrap().iter().all(|i| i["answered"] == false));
}

#[tokio::test]
async fn code_is_single_use_but_resumable() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 5, 3, 1).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 10}),
    )
    .await;
    let code = first_code(&session);

    // Not redeemed yet.
    let early = submit(&app, &code, json!([])).await;
    assert_eq!(early.status().as_u16(), 409);

    // Codes are case-insensitive.
    let first: Value = redeem(&app, &code.to_lowercase(), Some("carol"))
        .await
        .json()
        .await
        .unwrap();
    let ids = drawn_question_ids(&first);
    assert_eq!(ids.len(), 3);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 3);

    let second = redeem(&app, &code, Some("mallory")).await;
    assert_eq!(second.status().as_u16(), 409);

    let resumed: Value = app
        .client
        .get(app.url(&format!("/api/take/{}", code)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(drawn_question_ids(&resumed), ids);
    assert_eq!(resumed["identifier"], "carol");

    let session: Value = app
        .get(&token, &format!("/api/sessions/{}", session["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(session["status"], "in_progress");
}

#[tokio::test]
async fn unknown_and_malformed_codes() {
    let app = spawn_app().await;

    let res = redeem(&app, "ZZZZZZZZ", Some("dave")).await;
    assert_eq!(res.status().as_u16(), 404);

    let res = redeem(&app, "not a code!", Some("dave")).await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn named_participants_get_their_own_codes() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 6, 3, 2).await;

    let session = launch(
        &app,
        &token,
        json!({
            "template_id": template_id,
            "name": "Midterm",
            "participants": ["ann@example.com", "ben@example.com"],
            "time_limit_minutes": 45
        }),
    )
    .await;
    let codes: Vec<String> = session["access_codes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c.as_str().unwrap().to_string())
        .collect();
    assert_eq!(codes.len(), 2);
    assert_ne!(codes[0], codes[1]);
    assert_eq!(session["name"], "Midterm");

    // Pre-assigned identifiers need no input.
    let instance: Value = redeem(&app, &codes[0], None).await.json().await.unwrap();
    assert!(instance["identifier"].as_str().unwrap().ends_with("@example.com"));
}

#[tokio::test]
async fn anonymous_code_needs_identifier() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 1, 1).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 5}),
    )
    .await;

    let res = redeem(&app, &first_code(&session), None).await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn foreign_answer_is_rejected() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 1, 1).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 5}),
    )
    .await;
    let code = first_code(&session);
    redeem(&app, &code, Some("erin")).await;

    let res = submit(
        &app,
        &code,
        json!([{"question_id": uuid::Uuid::new_v4(), "selected_answer_id": uuid::Uuid::new_v4()}]),
    )
    .await;
    assert_eq!(res.status().as_u16(), 400);

    // The failed attempt does not consume the code.
    let ok = submit(&app, &code, json!([])).await;
    assert_eq!(ok.status().as_u16(), 200);
}

#[tokio::test]
async fn launch_fails_when_pool_shrank() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (pool_id, template_id) = app.seed_template(&token, 3, 3, 1).await;

    let pool: Value = app
        .get(&token, &format!("/api/pools/{}", pool_id))
        .await
        .json()
        .await
        .unwrap();
    let keep = &pool["question_ids"].as_array().unwrap()[..1];

    let res = app
        .client
        .put(app.url(&format!("/api/pools/{}", pool_id)))
        .bearer_auth(&token)
        .json(&json!({"question_ids": keep}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = app
        .post(
            &token,
            "/api/sessions",
            json!({"template_id": template_id, "participant_count": 2, "time_limit_minutes": 5}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);

    let sessions: Vec<Value> = app.get(&token, "/api/sessions").await.json().await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn launched_instance_ignores_later_edits() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 1, 1, 1).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 5}),
    )
    .await;
    let code = first_code(&session);
    let instance: Value = redeem(&app, &code, Some("fay")).await.json().await.unwrap();
    let question_id = drawn_question_ids(&instance)[0].clone();
    let (right, _) = answer_ids(&app, &token, &question_id).await;

    let res = app
        .client
        .put(app.url(&format!("/api/questions/{}", question_id)))
        .bearer_auth(&token)
        .json(&json!({
            "text": "Rewritten",
            "answers": [{"text": "New", "is_correct": true}, {"text": "Other", "is_correct": false}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    // The old answer id still scores against the snapshot.
    let result: Value = submit(
        &app,
        &code,
        json!([{"question_id": question_id, "selected_answer_id": right}]),
    )
    .await
    .json()
    .await
    .unwrap();
    assert_eq!(result["total_score"], 1);
}

#[tokio::test]
async fn cancelled_session_rejects_redemption() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 1, 1).await;

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 2, "time_limit_minutes": 5}),
    )
    .await;
    let cancel_path = format!("/api/sessions/{}/cancel", session["id"].as_str().unwrap());

    let res = app.post(&token, &cancel_path, json!({})).await;
    assert_eq!(res.status().as_u16(), 200);
    let cancelled: Value = res.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");

    let res = redeem(&app, &first_code(&session), Some("gus")).await;
    assert_eq!(res.status().as_u16(), 409);

    let res = app.post(&token, &cancel_path, json!({})).await;
    assert_eq!(res.status().as_u16(), 409);
}

#[tokio::test]
async fn codes_expire_after_deadline() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 1, 1).await;

    let past = chrono::Utc::now() - chrono::Duration::minutes(1);
    let res = app
        .post(
            &token,
            "/api/sessions",
            json!({
                "template_id": template_id,
                "participant_count": 1,
                "time_limit_minutes": 5,
                "available_until": past
            }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);

    let soon = chrono::Utc::now() + chrono::Duration::seconds(1);
    let session = launch(
        &app,
        &token,
        json!({
            "template_id": template_id,
            "participant_count": 1,
            "time_limit_minutes": 5,
            "available_until": soon
        }),
    )
    .await;
    let code = first_code(&session);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;

    let res = redeem(&app, &code, Some("hal")).await;
    assert_eq!(res.status().as_u16(), 409);

    let state: Value = app
        .client
        .get(app.url(&format!("/api/take/{}", code)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["status"], "expired");

    let session: Value = app
        .get(&token, &format!("/api/sessions/{}", session["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(session["status"], "expired");
}

#[tokio::test]
async fn sessions_are_private_to_their_examiner() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let other = app.examiner_token().await;
    let (_, template_id) = app.seed_template(&token, 2, 1, 1).await;

    // Another examiner cannot launch from this template.
    let res = app
        .post(
            &other,
            "/api/sessions",
            json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 5}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 404);

    let session = launch(
        &app,
        &token,
        json!({"template_id": template_id, "participant_count": 1, "time_limit_minutes": 5}),
    )
    .await;
    let res = app
        .get(&other, &format!("/api/sessions/{}/results", session["id"].as_str().unwrap()))
        .await;
    assert_eq!(res.status().as_u16(), 404);
}
