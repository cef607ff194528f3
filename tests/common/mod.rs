// tests/common/mod.rs
#![allow(dead_code)]

use std::sync::Arc;

use examforge::{
    config::{Config, PoolDeletePolicy},
    routes,
    state::AppState,
    store::MemoryStore,
};
use serde_json::{Value, json};

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port backed by a fresh in-memory store.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(PoolDeletePolicy::Block).await
}

pub async fn spawn_app_with(pool_delete_policy: PoolDeletePolicy) -> TestApp {
    let config = Config {
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        pool_delete_policy,
        ..Config::default()
    };

    let state = AppState {
        store: Arc::new(MemoryStore::new()),
        config,
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Registers a fresh examiner and returns a bearer token.
    pub async fn examiner_token(&self) -> String {
        let username = format!("ex_{}", &uuid::Uuid::new_v4().to_string()[..8]);
        let password = "password123";

        let res = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 201);

        let body: Value = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({"username": username, "password": password}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        body["token"].as_str().unwrap().to_string()
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Creates a question with one correct answer and returns its JSON.
    pub async fn create_question(&self, token: &str, text: &str, tags: &[&str]) -> Value {
        let res = self
            .post(
                token,
                "/api/questions",
                json!({
                    "text": text,
                    "tags": tags,
                    "answers": [
                        {"text": "Right", "is_correct": true},
                        {"text": "Wrong", "is_correct": false},
                        {"text": "Also wrong", "is_correct": false}
                    ]
                }),
            )
            .await;
        assert_eq!(res.status().as_u16(), 201);
        res.json().await.unwrap()
    }

    pub async fn create_pool(&self, token: &str, name: &str, question_ids: &[String]) -> Value {
        let res = self
            .post(
                token,
                "/api/pools",
                json!({"name": name, "question_ids": question_ids}),
            )
            .await;
        assert_eq!(res.status().as_u16(), 201);
        res.json().await.unwrap()
    }

    pub async fn create_template(&self, token: &str, name: &str, selections: Value) -> Value {
        let res = self
            .post(
                token,
                "/api/templates",
                json!({"name": name, "pool_selections": selections}),
            )
            .await;
        assert_eq!(res.status().as_u16(), 201);
        res.json().await.unwrap()
    }

    /// Bank of `count` questions in one pool, plus a template drawing `draw` at `points` each.
    /// Returns (pool_id, template_id).
    pub async fn seed_template(&self, token: &str, count: usize, draw: u32, points: u32) -> (String, String) {
        let mut ids = Vec::new();
        for i in 0..count {
            let q = self
                .create_question(token, &format!("Question {}", i), &["seed"])
                .await;
            ids.push(q["id"].as_str().unwrap().to_string());
        }

        let pool = self.create_pool(token, "Seed pool", &ids).await;
        let pool_id = pool["id"].as_str().unwrap().to_string();

        let template = self
            .create_template(
                token,
                "Seed template",
                json!([{"pool_id": pool_id, "questions_to_draw": draw, "points": points}]),
            )
            .await;

        (pool_id, template["id"].as_str().unwrap().to_string())
    }
}
