use axum::{extract::State, routing::post, Form, Json, Router};
use once_cell::sync::Lazy;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct CheckinView {
    messages: Vec<Value>,
    input: InputState,
    current_question: Option<u64>,
    completed: bool,
    submission: Value,
}

#[derive(Debug, Deserialize)]
struct InputState {
    enabled: bool,
}

type Submissions = Arc<Mutex<Vec<HashMap<String, String>>>>;

/// Stand-in for the PHP check-in endpoint, shared by every test.
struct FakeBackend {
    base_url: String,
    submissions: Submissions,
}

const SLOW_SUBMIT_CONFIG: &str = "106";
const HUNG_LOAD_CONFIG: &str = "107";

static BACKEND: Lazy<FakeBackend> = Lazy::new(FakeBackend::start);

impl FakeBackend {
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind backend port");
        listener.set_nonblocking(true).unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let submissions: Submissions = Arc::default();

        let shared = Arc::clone(&submissions);
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                let app = Router::new()
                    .route("/api/checkin.php", post(backend))
                    .with_state(shared);
                axum::serve(listener, app).await.unwrap();
            });
        });

        Self {
            base_url,
            submissions,
        }
    }

    fn submissions_for(&self, config_id: u64) -> Vec<HashMap<String, String>> {
        let config_id = config_id.to_string();
        self.submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|form| form.get("config_id") == Some(&config_id))
            .cloned()
            .collect()
    }
}

async fn backend(
    State(submissions): State<Submissions>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    let config_id = form.get("config_id").cloned().unwrap_or_default();
    match form.get("action").map(String::as_str) {
        Some("submit_checkin") => {
            if config_id == SLOW_SUBMIT_CONFIG {
                sleep(Duration::from_secs(1)).await;
            }
            submissions.lock().unwrap().push(form);
            Json(json!({ "success": true, "points_awarded": 15, "new_total_points": 115 }))
        }
        Some("load_progress") => {
            if config_id == HUNG_LOAD_CONFIG {
                sleep(Duration::from_secs(30)).await;
            }
            Json(json!({ "success": true, "responses": [] }))
        }
        _ => Json(json!({ "success": false, "message": "unknown action" })),
    }
}

struct TestServer {
    base_url: String,
    child: Child,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn pick_free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

fn unique_path(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let mut path = std::env::temp_dir();
    path.push(format!("checkin_app_{name}_{}_{}.json", std::process::id(), nanos));
    path
}

async fn wait_until_ready(base_url: &str) {
    let client = Client::new();
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Ok(resp) = client.get(format!("{base_url}/")).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        if Instant::now() > deadline {
            panic!("server did not become ready");
        }
        sleep(Duration::from_millis(100)).await;
    }
}

struct Setup {
    data_path: PathBuf,
    checkin_path: PathBuf,
    debounce_ms: u64,
    request_timeout_ms: u64,
}

impl Setup {
    fn new(checkin: Value) -> Self {
        let checkin_path = unique_path("config");
        std::fs::write(&checkin_path, serde_json::to_vec(&checkin).unwrap()).unwrap();
        Self {
            data_path: unique_path("storage"),
            checkin_path,
            debounce_ms: 100,
            request_timeout_ms: 5_000,
        }
    }

    async fn spawn(&self) -> TestServer {
        let port = pick_free_port();
        let child = Command::new(env!("CARGO_BIN_EXE_checkin_app"))
            .env("PORT", port.to_string())
            .env("APP_DATA_PATH", &self.data_path)
            .env("CHECKIN_CONFIG_PATH", &self.checkin_path)
            .env("CHECKIN_BACKEND_URL", &BACKEND.base_url)
            .env("CHECKIN_SAVE_DEBOUNCE_MS", self.debounce_ms.to_string())
            .env("CHECKIN_REQUEST_TIMEOUT_MS", self.request_timeout_ms.to_string())
            .env("RUST_LOG", "info")
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("failed to spawn server");

        let base_url = format!("http://127.0.0.1:{port}");
        wait_until_ready(&base_url).await;
        TestServer { base_url, child }
    }
}

impl Drop for Setup {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.data_path);
        let _ = std::fs::remove_file(&self.checkin_path);
    }
}

fn yes_no_checkin(id: u64) -> Value {
    json!({
        "id": id,
        "title": "Check-in semanal",
        "questions": [
            { "id": 1, "question_text": "Treinou esta semana?",
              "question_type": "scale", "options": ["Sim", "Não"] },
            { "id": 2, "question_text": "Conte como foi", "question_type": "text",
              "conditional_logic": { "depends_on_question_id": 1, "show_if_value": "Sim" } }
        ]
    })
}

async fn open(client: &Client, server: &TestServer) -> CheckinView {
    client
        .post(format!("{}/api/checkin/open", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

async fn answer(client: &Client, server: &TestServer, body: Value) -> reqwest::Response {
    client
        .post(format!("{}/api/checkin/answer", server.base_url))
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn current(client: &Client, server: &TestServer) -> CheckinView {
    client
        .get(format!("{}/api/checkin", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Polls until the backend's reply to the submission has been recorded.
async fn wait_for_submission(client: &Client, server: &TestServer) -> CheckinView {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let view = current(client, server).await;
        if view.submission["state"] != "in_flight" {
            return view;
        }
        if Instant::now() > deadline {
            panic!("submission never settled");
        }
        sleep(Duration::from_millis(50)).await;
    }
}

fn bot_messages<'a>(view: &'a CheckinView, text: &str) -> Vec<&'a Value> {
    view.messages
        .iter()
        .filter(|entry| entry["kind"] == "message" && entry["sender"] == "bot" && entry["text"] == text)
        .collect()
}

#[tokio::test]
async fn http_answering_no_skips_followup_and_submits_once() {
    let setup = Setup::new(yes_no_checkin(101));
    let server = setup.spawn().await;
    let client = Client::new();

    let view = open(&client, &server).await;
    assert_eq!(view.current_question, Some(1));
    assert!(!view.input.enabled);

    let response = answer(&client, &server, json!({ "question_id": 1, "value": "Não" })).await;
    assert!(response.status().is_success());
    let view: CheckinView = response.json().await.unwrap();
    assert!(view.completed);
    assert!(bot_messages(&view, "Conte como foi").is_empty());

    let view = wait_for_submission(&client, &server).await;
    assert_eq!(view.submission["state"], "accepted");
    assert_eq!(view.submission["points_awarded"], 15);
    assert_eq!(view.submission["new_total_points"], 115);

    // Reopening an accepted check-in does not submit again.
    let reopened = open(&client, &server).await;
    assert!(reopened.completed);

    let submissions = BACKEND.submissions_for(101);
    assert_eq!(submissions.len(), 1);
    let responses: Value = serde_json::from_str(&submissions[0]["responses"]).unwrap();
    assert_eq!(
        responses,
        json!({ "1": { "response_text": null, "response_value": "Não" } })
    );
}

#[tokio::test]
async fn http_answering_yes_asks_followup() {
    let setup = Setup::new(yes_no_checkin(102));
    let server = setup.spawn().await;
    let client = Client::new();

    open(&client, &server).await;
    let view: CheckinView = answer(&client, &server, json!({ "question_id": 1, "value": "Sim" }))
        .await
        .json()
        .await
        .unwrap();

    assert!(!view.completed);
    assert_eq!(view.current_question, Some(2));
    assert!(view.input.enabled);
    assert_eq!(bot_messages(&view, "Conte como foi").len(), 1);
    assert!(BACKEND.submissions_for(102).is_empty());
}

#[tokio::test]
async fn http_close_and_reopen_replays_transcript() {
    let setup = Setup::new(yes_no_checkin(103));
    let server = setup.spawn().await;
    let client = Client::new();

    open(&client, &server).await;
    answer(&client, &server, json!({ "question_id": 1, "value": "Sim" })).await;

    let closed = client
        .post(format!("{}/api/checkin/close", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(closed.status(), StatusCode::NO_CONTENT);

    let view = open(&client, &server).await;
    assert_eq!(view.current_question, Some(2));
    assert_eq!(bot_messages(&view, "Treinou esta semana?").len(), 1);
    assert_eq!(view.messages[1]["kind"], "options");
    assert_eq!(view.messages[1]["enabled"], false);
    assert_eq!(view.messages[2]["sender"], "user");
    assert_eq!(view.messages[2]["text"], "Sim");
    assert_eq!(bot_messages(&view, "Conte como foi").len(), 1);
}

#[tokio::test]
async fn http_rejects_invalid_answers() {
    let setup = Setup::new(yes_no_checkin(104));
    let server = setup.spawn().await;
    let client = Client::new();

    let before_open = answer(&client, &server, json!({ "question_id": 1, "value": "Sim" })).await;
    assert_eq!(before_open.status(), StatusCode::NOT_FOUND);

    open(&client, &server).await;
    let both = answer(
        &client,
        &server,
        json!({ "question_id": 1, "value": "Sim", "text": "Sim" }),
    )
    .await;
    assert_eq!(both.status(), StatusCode::BAD_REQUEST);

    let unknown = answer(&client, &server, json!({ "question_id": 1, "value": "Talvez" })).await;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let wrong_question = answer(&client, &server, json!({ "question_id": 2, "text": "oi" })).await;
    assert_eq!(wrong_question.status(), StatusCode::BAD_REQUEST);

    let view = current(&client, &server).await;
    assert_eq!(view.current_question, Some(1));
}

#[tokio::test]
async fn http_submission_outlives_an_impatient_client() {
    let setup = Setup::new(yes_no_checkin(106));
    let server = setup.spawn().await;
    let client = Client::new();
    let impatient = Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();

    open(&client, &server).await;
    // Either the reply comes back in flight or the client gives up; the
    // submission must go through regardless.
    if let Ok(response) = impatient
        .post(format!("{}/api/checkin/answer", server.base_url))
        .json(&json!({ "question_id": 1, "value": "Não" }))
        .send()
        .await
    {
        let view: CheckinView = response.json().await.unwrap();
        assert_eq!(view.submission["state"], "in_flight");
    }

    let view = wait_for_submission(&client, &server).await;
    assert_eq!(view.submission["state"], "accepted");
    assert_eq!(BACKEND.submissions_for(106).len(), 1);
}

#[tokio::test]
async fn http_hung_backend_does_not_block_the_checkin() {
    let mut setup = Setup::new(yes_no_checkin(107));
    setup.request_timeout_ms = 1_000;
    let server = setup.spawn().await;
    let client = Client::new();

    let opening = {
        let client = client.clone();
        let url = format!("{}/api/checkin/open", server.base_url);
        tokio::spawn(async move { client.post(url).send().await })
    };
    sleep(Duration::from_millis(100)).await;

    // Reads are not held up by the backend call.
    let started = Instant::now();
    let status = client
        .get(format!("{}/api/checkin", server.base_url))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(started.elapsed() < Duration::from_millis(500));

    let view: CheckinView = opening.await.unwrap().unwrap().json().await.unwrap();
    assert_eq!(view.current_question, Some(1));
}

#[cfg(unix)]
#[tokio::test]
async fn http_shutdown_keeps_unsaved_progress() {
    let mut setup = Setup::new(yes_no_checkin(105));
    // Long enough that only the shutdown path can write the answer.
    setup.debounce_ms = 60_000;
    let client = Client::new();

    {
        let mut server = setup.spawn().await;
        open(&client, &server).await;
        answer(&client, &server, json!({ "question_id": 1, "value": "Sim" })).await;

        unsafe {
            libc::kill(server.child.id() as i32, libc::SIGINT);
        }
        let deadline = Instant::now() + Duration::from_secs(3);
        while server.child.try_wait().unwrap().is_none() {
            if Instant::now() > deadline {
                panic!("server did not shut down");
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    let stored: HashMap<String, String> =
        serde_json::from_slice(&std::fs::read(&setup.data_path).unwrap()).unwrap();
    assert!(stored.keys().any(|key| key.starts_with("checkin_progress_105_")));

    let server = setup.spawn().await;
    let view = open(&client, &server).await;
    assert_eq!(view.current_question, Some(2));
}
