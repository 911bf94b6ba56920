use axum::http::StatusCode;
use chrono::{DateTime, Duration, TimeZone, Utc};
use eventify_cd_core::config::Config;
use eventify_cd_core::guard::ManualClock;
use eventify_cd_core::pipeline::{CommandOutput, CommandRunner, CommandSpec};
use eventify_cd_server::{build_router, AppState};
use http_body_util::BodyExt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tempfile::TempDir;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SETUP_PY: &str =
    "setup(\n    version='0.4.2',\n    download_url='https://x/eventify-0.4.2.tar.gz',\n)\n";

/// Stands in for git, the build tool and twine.
#[derive(Default)]
struct FakeTools {
    calls: Mutex<Vec<CommandSpec>>,
    fail_on: Option<&'static str>,
    build_delay: Option<std::time::Duration>,
    published_at: Mutex<Vec<Instant>>,
}

impl FakeTools {
    fn count(&self, verb: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| verb_of(c) == verb)
            .count()
    }
}

fn verb_of(command: &CommandSpec) -> &str {
    if command.program == "git" {
        command.args[0].as_str()
    } else {
        command.program.as_str()
    }
}

impl CommandRunner for FakeTools {
    fn run(&self, command: &CommandSpec) -> eventify_cd_core::Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let verb = verb_of(command);
        if self.fail_on == Some(verb) {
            return Ok(CommandOutput {
                code: 1,
                ..CommandOutput::default()
            });
        }
        match verb {
            "clone" => {
                let target = command.cwd.join(command.args.last().unwrap());
                std::fs::create_dir_all(&target).unwrap();
                std::fs::write(target.join("setup.py"), SETUP_PY).unwrap();
            }
            "python" => {
                if let Some(delay) = self.build_delay {
                    std::thread::sleep(delay);
                }
                let dist = command.cwd.join("dist");
                std::fs::create_dir_all(&dist).unwrap();
                std::fs::write(dist.join("eventify-0.4.3.tar.gz"), b"").unwrap();
            }
            "twine" => self.published_at.lock().unwrap().push(Instant::now()),
            _ => {}
        }
        Ok(CommandOutput::default())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn config_in(dir: &TempDir) -> Config {
    let creds = dir.path().join("pypi.json");
    std::fs::write(&creds, r#"{"username": "ci", "password": "s3cret"}"#).unwrap();
    let mut cfg = Config::default();
    cfg.repository.workspace = dir.path().join("work");
    cfg.credentials_file = creds;
    cfg
}

fn app_with(config: Config, tools: Arc<FakeTools>, clock: Arc<ManualClock>) -> axum::Router {
    build_router(AppState::with_parts(config, tools, clock).unwrap())
}

/// Send a request via `oneshot` and return (status, parsed JSON body).
async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: &str,
) -> (StatusCode, serde_json::Value) {
    let req = axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn trigger(app: axum::Router) -> (StatusCode, serde_json::Value) {
    send(app, "POST", "/", "{}").await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cooldown_scenario_0_300_601() {
    let dir = TempDir::new().unwrap();
    let tools = Arc::new(FakeTools::default());
    let clock = Arc::new(ManualClock::new(at(0)));
    let app = app_with(config_in(&dir), tools.clone(), clock.clone());

    let (status, json) = trigger(app.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "success": "Running deployment job" }));
    let (_, state) = send(app.clone(), "GET", "/status", "").await;
    assert_eq!(state["last_accepted"], serde_json::json!(at(0)));

    clock.set(at(300));
    let (status, json) = trigger(app.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({ "error": "Ran recently" }));
    let (_, state) = send(app.clone(), "GET", "/status", "").await;
    assert_eq!(state["last_accepted"], serde_json::json!(at(0)));

    clock.set(at(601));
    let (status, json) = trigger(app.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], "Running deployment job");
    let (_, state) = send(app, "GET", "/status", "").await;
    assert_eq!(state["last_accepted"], serde_json::json!(at(601)));

    assert_eq!(tools.count("clone"), 2);
    assert_eq!(tools.count("twine"), 2);
}

#[tokio::test]
async fn trigger_at_exactly_cooldown_is_accepted() {
    let dir = TempDir::new().unwrap();
    let tools = Arc::new(FakeTools::default());
    let clock = Arc::new(ManualClock::new(at(0)));
    let app = app_with(config_in(&dir), tools.clone(), clock.clone());

    trigger(app.clone()).await;
    clock.advance(Duration::seconds(599));
    assert_eq!(trigger(app.clone()).await.1["error"], "Ran recently");
    clock.advance(Duration::seconds(1));
    assert_eq!(trigger(app).await.1["success"], "Running deployment job");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_trigger_waits_for_running_deployment() {
    let dir = TempDir::new().unwrap();
    let tools = Arc::new(FakeTools {
        build_delay: Some(std::time::Duration::from_millis(400)),
        ..FakeTools::default()
    });
    let clock = Arc::new(ManualClock::new(at(0)));
    let app = app_with(config_in(&dir), tools.clone(), clock);

    let first = tokio::spawn(trigger(app.clone()));
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let second = tokio::spawn(async move {
        let res = trigger(app).await;
        (res, Instant::now())
    });

    let (status, json) = first.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], "Running deployment job");

    let ((status, json), answered_at) = second.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], "Ran recently");

    let published = tools.published_at.lock().unwrap().clone();
    assert_eq!(published.len(), 1, "the pipeline must run exactly once");
    assert!(
        answered_at >= published[0],
        "second trigger answered before the first run finished"
    );
    assert_eq!(tools.count("clone"), 1);
}

#[tokio::test]
async fn failing_step_aborts_and_reports_error() {
    let dir = TempDir::new().unwrap();
    let tools = Arc::new(FakeTools {
        fail_on: Some("push"),
        ..FakeTools::default()
    });
    let clock = Arc::new(ManualClock::new(at(0)));
    let app = app_with(config_in(&dir), tools.clone(), clock.clone());

    let (status, json) = trigger(app.clone()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json["error"].as_str().unwrap().contains("push"));
    assert_eq!(tools.count("twine"), 0);

    let (_, state) = send(app.clone(), "GET", "/status", "").await;
    assert_eq!(state["last_run"]["outcome"], "failed");
    assert!(state["last_run"]["error"].as_str().unwrap().contains("push"));

    // The failed run still started the cooldown.
    clock.set(at(10));
    assert_eq!(trigger(app).await.1["error"], "Ran recently");
}

#[tokio::test]
async fn missing_credentials_is_a_server_error() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.credentials_file = dir.path().join("nope.json");
    let tools = Arc::new(FakeTools::default());
    let app = app_with(config, tools.clone(), Arc::new(ManualClock::new(at(0))));

    let (status, json) = trigger(app).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("nope.json"));
    assert!(tools.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn status_reports_successful_run() {
    let dir = TempDir::new().unwrap();
    let app = app_with(
        config_in(&dir),
        Arc::new(FakeTools::default()),
        Arc::new(ManualClock::new(at(0))),
    );

    let (status, state) = send(app.clone(), "GET", "/status", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["cooldown_secs"], 600);
    assert!(state["last_accepted"].is_null());
    assert!(state["last_run"].is_null());

    trigger(app.clone()).await;
    let (_, state) = send(app, "GET", "/status", "").await;
    assert_eq!(state["last_run"]["outcome"], "succeeded");
    assert_eq!(state["last_run"]["new_version"]["patch"], 3);
}

#[tokio::test]
async fn trigger_ignores_request_body() {
    let dir = TempDir::new().unwrap();
    let app = app_with(
        config_in(&dir),
        Arc::new(FakeTools::default()),
        Arc::new(ManualClock::new(at(0))),
    );
    let (status, json) = send(app, "POST", "/", "not json at all").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], "Running deployment job");
}

#[tokio::test]
async fn get_on_trigger_route_is_not_allowed() {
    let dir = TempDir::new().unwrap();
    let app = app_with(
        config_in(&dir),
        Arc::new(FakeTools::default()),
        Arc::new(ManualClock::new(at(0))),
    );
    let (status, _) = send(app, "GET", "/", "").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn year_long_cooldown_rejects_later_trigger() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    // Largest accepted value; the window end is still representable.
    config.cooldown_secs = eventify_cd_core::guard::MAX_COOLDOWN_SECS;
    let tools = Arc::new(FakeTools::default());
    let clock = Arc::new(ManualClock::new(at(0)));
    let app = app_with(config, tools.clone(), clock.clone());

    assert_eq!(trigger(app.clone()).await.1["success"], "Running deployment job");
    clock.set(at(1_000_000));
    let (status, json) = trigger(app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["error"], "Ran recently");
    assert_eq!(tools.count("clone"), 1);
}

#[test]
fn oversized_cooldown_fails_state_construction() {
    let dir = TempDir::new().unwrap();
    let mut config = config_in(&dir);
    config.cooldown_secs = 10_000_000_000_000;
    let built = AppState::with_parts(
        config,
        Arc::new(FakeTools::default()),
        Arc::new(ManualClock::new(at(0))),
    );
    assert!(built.is_err());
}
