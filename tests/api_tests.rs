// tests/api_tests.rs

mod common;

use common::spawn_app;
use examforge::config::PoolDeletePolicy;
use serde_json::{Value, json};

#[tokio::test]
async fn health_check_404() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(app.url("/random_path_that_does_not_exist"))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_login_and_me() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let me: Value = app.get(&token, "/api/auth/me").await.json().await.unwrap();
    assert!(me["username"].as_str().unwrap().starts_with("ex_"));
    assert_eq!(me["question_count"], 0);
    assert!(me.get("password").is_none());
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = spawn_app().await;
    let body = json!({"username": "same_name", "password": "password123"});

    let first = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = spawn_app().await;
    app.client
        .post(app.url("/api/auth/register"))
        .json(&json!({"username": "carol", "password": "password123"}))
        .send()
        .await
        .unwrap();

    let res = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"username": "carol", "password": "not-the-password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
}

#[tokio::test]
async fn examiner_routes_require_token() {
    let app = spawn_app().await;

    let res = app.client.get(app.url("/api/questions")).send().await.unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = app.get("garbage", "/api/sessions").await;
    assert_eq!(res.status().as_u16(), 401);
}

#[tokio::test]
async fn question_requires_exactly_one_correct_answer() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let two_correct = app
        .post(
            &token,
            "/api/questions",
            json!({
                "text": "Pick one",
                "answers": [
                    {"text": "A", "is_correct": true},
                    {"text": "B", "is_correct": true}
                ]
            }),
        )
        .await;
    assert_eq!(two_correct.status().as_u16(), 400);

    let single_answer = app
        .post(
            &token,
            "/api/questions",
            json!({"text": "Pick one", "answers": [{"text": "A", "is_correct": true}]}),
        )
        .await;
    assert_eq!(single_answer.status().as_u16(), 400);

    let body: Value = two_correct.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn question_text_is_sanitized() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let q = app
        .create_question(&token, "What is <b>2+2</b>?<script>alert(1)</script>", &[])
        .await;
    let text = q["text"].as_str().unwrap();
    assert!(text.contains("<b>2+2</b>"));
    assert!(!text.contains("script"));
}

#[tokio::test]
async fn question_filters_and_isolation() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;
    let other = app.examiner_token().await;

    app.create_question(&token, "Capital of France", &["Geography"]).await;
    app.create_question(&token, "Boiling point of water", &["physics"]).await;
    let untagged = app.create_question(&token, "Capital of Peru", &[]).await;

    let by_tag: Vec<Value> = app
        .get(&token, "/api/questions?tag=geography")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_tag.len(), 1);

    let by_text: Vec<Value> = app
        .get(&token, "/api/questions?q=capital")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(by_text.len(), 2);

    let only_untagged: Vec<Value> = app
        .get(&token, "/api/questions?untagged=true")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(only_untagged.len(), 1);
    assert_eq!(only_untagged[0]["id"], untagged["id"]);

    // Another examiner sees neither the list nor the question.
    let theirs: Vec<Value> = app.get(&other, "/api/questions").await.json().await.unwrap();
    assert!(theirs.is_empty());
    let path = format!("/api/questions/{}", untagged["id"].as_str().unwrap());
    assert_eq!(app.get(&other, &path).await.status().as_u16(), 404);
}

#[tokio::test]
async fn deleting_question_removes_it_from_pools() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let a = app.create_question(&token, "A", &[]).await;
    let b = app.create_question(&token, "B", &[]).await;
    let ids = vec![
        a["id"].as_str().unwrap().to_string(),
        b["id"].as_str().unwrap().to_string(),
    ];
    let pool = app.create_pool(&token, "Mixed", &ids).await;
    assert_eq!(pool["question_count"], 2);

    let res = app
        .client
        .delete(app.url(&format!("/api/questions/{}", ids[0])))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);

    let pool: Value = app
        .get(&token, &format!("/api/pools/{}", pool["id"].as_str().unwrap()))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(pool["question_count"], 1);
    assert_eq!(pool["question_ids"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pool_rejects_unknown_question() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let res = app
        .post(
            &token,
            "/api/pools",
            json!({"name": "Ghosts", "question_ids": [uuid::Uuid::new_v4()]}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn template_cannot_overdraw_pool() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let q = app.create_question(&token, "Only one", &[]).await;
    let pool = app
        .create_pool(&token, "Tiny", &[q["id"].as_str().unwrap().to_string()])
        .await;

    let res = app
        .post(
            &token,
            "/api/templates",
            json!({
                "name": "Too greedy",
                "pool_selections": [{"pool_id": pool["id"], "questions_to_draw": 2, "points": 1}]
            }),
        )
        .await;
    assert_eq!(res.status().as_u16(), 400);
}

#[tokio::test]
async fn template_reports_totals() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let (_, template_id) = app.seed_template(&token, 4, 3, 5).await;

    let template: Value = app
        .get(&token, &format!("/api/templates/{}", template_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(template["total_questions"], 3);
    assert_eq!(template["total_points"], 15);
}

#[tokio::test]
async fn pool_delete_blocked_while_referenced() {
    let app = spawn_app().await;
    let token = app.examiner_token().await;

    let (pool_id, _) = app.seed_template(&token, 2, 1, 1).await;

    let res = app
        .client
        .delete(app.url(&format!("/api/pools/{}", pool_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 409);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Seed template"));
}

#[tokio::test]
async fn pool_delete_cascades_into_templates() {
    let app = common::spawn_app_with(PoolDeletePolicy::Cascade).await;
    let token = app.examiner_token().await;

    // `only_seed` draws from the seed pool alone, `mixed` also from a second pool.
    let (pool_id, only_seed) = app.seed_template(&token, 2, 1, 1).await;
    let extra = app.create_question(&token, "Extra", &[]).await;
    let other_pool = app
        .create_pool(&token, "Other pool", &[extra["id"].as_str().unwrap().to_string()])
        .await;
    let mixed = app
        .create_template(
            &token,
            "Mixed template",
            json!([
                {"pool_id": pool_id, "questions_to_draw": 1, "points": 1},
                {"pool_id": other_pool["id"], "questions_to_draw": 1, "points": 2}
            ]),
        )
        .await;
    let mixed_id = mixed["id"].as_str().unwrap();

    let res = app
        .client
        .delete(app.url(&format!("/api/pools/{}", pool_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 204);

    // A template left without selections is removed with the pool.
    let res = app.get(&token, &format!("/api/templates/{}", only_seed)).await;
    assert_eq!(res.status().as_u16(), 404);

    let templates: Vec<Value> = app.get(&token, "/api/templates").await.json().await.unwrap();
    assert_eq!(templates.len(), 1);

    let mixed: Value = app
        .get(&token, &format!("/api/templates/{}", mixed_id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(mixed["pool_selections"].as_array().unwrap().len(), 1);
    assert_eq!(mixed["total_points"], 2);

    // What is left still launches.
    let res = app
        .post(
            &token,
            "/api/sessions",
            json!({"template_id": mixed_id, "participant_count": 1, "time_limit_minutes": 5}),
        )
        .await;
    assert_eq!(res.status().as_u16(), 201);
}
