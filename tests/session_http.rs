//! Integration tests for the survey REST API.
//!
//! Each test spins up an Axum server on a random port and drives a session
//! over HTTP with `reqwest`, exercising the real JSON contract.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;

use wellness_chat::config::SurveyConfig;
use wellness_chat::error::GenerationError;
use wellness_chat::survey::{
    GenerationRequest, ResponseGenerator, SessionManager, SurveyRouteState, survey_routes,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Stub generator replaying scripted replies (no real API calls).
#[derive(Default)]
struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedGenerator {
    fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        }
    }
}

#[async_trait]
impl ResponseGenerator for ScriptedGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(GenerationError::Unavailable)
    }
}

/// Start an Axum server on a random port, return its base URL.
async fn start_server(generator: ScriptedGenerator, config: SurveyConfig) -> String {
    let manager = Arc::new(SessionManager::new(Arc::new(generator), config));
    let app = survey_routes(SurveyRouteState { manager });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{port}")
}

/// POST `body` and return (status, json).
async fn post(client: &reqwest::Client, url: &str, body: Value) -> (u16, Value) {
    let response = client.post(url).json(&body).send().await.unwrap();
    let status = response.status().as_u16();
    let json = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, json)
}

async fn start_session(client: &reqwest::Client, base: &str) -> String {
    let (status, json) = post(
        client,
        &format!("{base}/api/sessions"),
        json!({"user_name": "Rahul"}),
    )
    .await;
    assert_eq!(status, 201);
    json["session_id"].as_str().unwrap().to_string()
}

fn texts(reaction: &Value) -> Vec<String> {
    reaction["turns"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["text"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn rahul_session_over_http() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(
            ScriptedGenerator::with_replies(&[
                "I'm sorry to hear that, Rahul. What's been weighing on you most?",
                "Workload can be exhausting. Have you raised it with your manager?",
            ]),
            SurveyConfig::default(),
        )
        .await;
        let client = reqwest::Client::new();
        let id = start_session(&client, &base).await;
        let session = format!("{base}/api/sessions/{id}");

        let (status, reaction) = post(&client, &format!("{session}/answer"), json!({"answer": "full"})).await;
        assert_eq!(status, 200);
        assert_eq!(reaction["phase"], "question_1");
        assert_eq!(reaction["expects"], "scale");

        let (_, reaction) = post(&client, &format!("{session}/answer"), json!({"answer": "2"})).await;
        assert_eq!(reaction["flags"]["awaitingFollowUp"], true);
        assert_eq!(reaction["expects"], "free_text");

        let (_, reaction) = post(
            &client,
            &format!("{session}/message"),
            json!({"text": "it's mostly workload"}),
        )
        .await;
        assert_eq!(texts(&reaction)[0], "Workload can be exhausting.");
        assert_eq!(reaction["flags"]["awaitingConfirmation"], true);

        let (_, reaction) = post(&client, &format!("{session}/message"), json!({"text": "next"})).await;
        assert_eq!(reaction["phase"], "question_2");
        assert_eq!(reaction["expects"], "yes_no");

        let snapshot: Value = client.get(&session).send().await.unwrap().json().await.unwrap();
        assert_eq!(snapshot["assessment"]["answers"]["work_satisfaction"], "2");
        assert_eq!(snapshot["consent"], "full");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn primary_answer_while_awaiting_free_text_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(
            ScriptedGenerator::with_replies(&["Nice. What do you enjoy most?"]),
            SurveyConfig::default(),
        )
        .await;
        let client = reqwest::Client::new();
        let id = start_session(&client, &base).await;
        let session = format!("{base}/api/sessions/{id}");

        post(&client, &format!("{session}/answer"), json!({"answer": "full"})).await;
        post(&client, &format!("{session}/answer"), json!({"answer": "4"})).await;

        let (status, json) = post(&client, &format!("{session}/answer"), json!({"answer": "1"})).await;
        assert_eq!(status, 200);
        assert!(texts(&json).is_empty());
        assert_eq!(json["phase"], "question_1");
        assert_eq!(json["expects"], "free_text");
        assert_eq!(json["flags"]["awaitingFollowUp"], true);
        assert!(json["rejection"].as_str().unwrap().contains("free text is expected"));

        // The ignored answer left the recorded one alone.
        let snapshot: Value = client.get(&session).send().await.unwrap().json().await.unwrap();
        assert_eq!(snapshot["assessment"]["answers"]["work_satisfaction"], "4");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn additional_feedback_round_over_http() {
    timeout(TEST_TIMEOUT, async {
        let config = SurveyConfig {
            collect_additional_feedback: true,
            ..Default::default()
        };
        // No scripted replies: every reply is the offline fallback.
        let base = start_server(ScriptedGenerator::default(), config).await;
        let client = reqwest::Client::new();
        let id = start_session(&client, &base).await;
        let session = format!("{base}/api/sessions/{id}");

        post(&client, &format!("{session}/answer"), json!({"answer": "anonymous"})).await;
        // question_1 fallback asks for more.
        post(&client, &format!("{session}/answer"), json!({"answer": "4"})).await;
        post(&client, &format!("{session}/message"), json!({"text": "fine"})).await;
        post(&client, &format!("{session}/message"), json!({"text": "next"})).await;
        for answer in ["no", "4", "yes"] {
            post(&client, &format!("{session}/answer"), json!({"answer": answer})).await;
            post(&client, &format!("{session}/message"), json!({"text": "next"})).await;
        }

        let (_, reaction) = post(&client, &format!("{session}/answer"), json!({"answer": "5"})).await;
        assert_eq!(reaction["phase"], "additional_feedback");

        let (status, reaction) = post(
            &client,
            &format!("{session}/feedback"),
            json!({"feedback": "More team offsites please"}),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(reaction["phase"], "complete");
        assert_eq!(reaction["expects"], "none");

        let snapshot: Value = client.get(&session).send().await.unwrap().json().await.unwrap();
        assert_eq!(snapshot["additional_feedback"], "More team offsites please");
        assert_eq!(snapshot["consent"], "anonymous");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn deleted_session_is_gone() {
    timeout(TEST_TIMEOUT, async {
        let base = start_server(ScriptedGenerator::default(), SurveyConfig::default()).await;
        let client = reqwest::Client::new();
        let id = start_session(&client, &base).await;
        let session = format!("{base}/api/sessions/{id}");

        let response = client.delete(&session).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 204);

        let response = client.get(&session).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let (status, _) = post(&client, &format!("{session}/message"), json!({"text": "hi"})).await;
        assert_eq!(status, 404);
    })
    .await
    .expect("test timed out");
}
