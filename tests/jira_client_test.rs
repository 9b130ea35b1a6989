//! JiraClient against a local server emulating the Jira REST API v3
//!
//! Each issue key selects a canned behavior, so one server covers the whole
//! status-code contract.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jira_automation::config::TrackerCredentials;
use jira_automation::retry::{RetryDecision, RetryableError};
use jira_automation::snapshot::{IssueType, Priority, Status};
use jira_automation::tracker::adf::plain_text;
use jira_automation::tracker::{CommentId, FieldPatch, JiraClient, RichTextEncoder, TransitionId};
use jira_automation::{TrackerClient, TrackerError};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

const EXPECTED_AUTH: &str = "Basic Ym90QGV4YW1wbGUuY29tOnNlY3JldA==";

/// What the fake server saw
#[derive(Debug, Default)]
struct Recorded {
    authorization: Vec<String>,
    fields_query: Option<String>,
    updates: Vec<Value>,
    transitions: Vec<Value>,
    comments: Vec<Value>,
}

type Shared = Arc<Mutex<Recorded>>;

fn record_auth(state: &Shared, headers: &HeaderMap) {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.lock().unwrap().authorization.push(value);
}

/// Canned failures shared by every endpoint
fn canned(key: &str) -> Option<Response> {
    match key {
        "KAN-404" => Some(
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "errorMessages": ["Issue does not exist"] })),
            )
                .into_response(),
        ),
        "KAN-401" => Some((StatusCode::UNAUTHORIZED, "Unauthorized").into_response()),
        "KAN-403" => Some((StatusCode::FORBIDDEN, "Forbidden").into_response()),
        "KAN-500" => Some((StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()),
        "KAN-429" => Some(
            (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", "2")],
                "slow down",
            )
                .into_response(),
        ),
        "KAN-430" => Some((StatusCode::TOO_MANY_REQUESTS, "slow down").into_response()),
        _ => None,
    }
}

async fn get_issue(
    State(state): State<Shared>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record_auth(&state, &headers);
    state.lock().unwrap().fields_query = params.get("fields").cloned();

    if let Some(response) = canned(&key) {
        return response;
    }
    match key.as_str() {
        "KAN-SLOW" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            StatusCode::OK.into_response()
        }
        "KAN-BAD" => (StatusCode::OK, "<html>not json</html>").into_response(),
        _ => Json(json!({
            "key": key,
            "fields": {
                "summary": "Login page times out",
                "status": { "name": "  To Do " },
                "issuetype": { "name": "BUG" },
                "priority": { "name": "Highest" },
                "labels": ["frontend", ""],
                "assignee": null,
                "reporter": { "accountId": "u1", "displayName": "Alice" }
            }
        }))
        .into_response(),
    }
}

async fn update_issue(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);
    state.lock().unwrap().updates.push(body);

    if let Some(response) = canned(&key) {
        return response;
    }
    match key.as_str() {
        "KAN-200" => (StatusCode::OK, "{}").into_response(),
        _ => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn list_transitions(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    record_auth(&state, &headers);
    if let Some(response) = canned(&key) {
        return response;
    }
    Json(json!({
        "transitions": [
            { "id": "21", "name": "Done", "to": { "name": "Done" } },
            { "id": "11", "name": "Start Progress", "to": { "name": "In Progress" } }
        ]
    }))
    .into_response()
}

async fn apply_transition(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);
    state.lock().unwrap().transitions.push(body);
    if let Some(response) = canned(&key) {
        return response;
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn add_comment(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record_auth(&state, &headers);
    state.lock().unwrap().comments.push(body);
    if let Some(response) = canned(&key) {
        return response;
    }
    match key.as_str() {
        "KAN-NOID" => (StatusCode::CREATED, Json(json!({}))).into_response(),
        _ => (StatusCode::CREATED, Json(json!({ "id": "10042" }))).into_response(),
    }
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/rest/api/3/issue/{key}", get(get_issue).put(update_issue))
        .route(
            "/rest/api/3/issue/{key}/transitions",
            get(list_transitions).post(apply_transition),
        )
        .route("/rest/api/3/issue/{key}/comment", post(add_comment))
        .with_state(state)
}

/// Start the fake server and a client pointed at it
async fn start(timeout: Duration) -> (JiraClient, Shared) {
    let state = Shared::default();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = JiraClient::new(
        TrackerCredentials {
            base_url: format!("http://{}", addr),
            email: "bot@example.com".to_string(),
            api_token: "secret".to_string(),
        },
        timeout,
    )
    .unwrap();
    (client, state)
}

async fn client() -> (JiraClient, Shared) {
    start(Duration::from_secs(5)).await
}

#[tokio::test]
async fn test_fetch_issue_normalizes_fields() {
    let (client, state) = client().await;

    let issue = client.fetch_issue("KAN-1").await.unwrap();

    assert_eq!(issue.key(), "KAN-1");
    assert_eq!(issue.summary(), "Login page times out");
    assert_eq!(issue.status(), &Status::Other("To Do".to_string()));
    assert_eq!(issue.issue_type(), &IssueType::Bug);
    assert_eq!(issue.priority(), Some(&Priority::Highest));
    assert!(issue.assignee().is_none());
    assert_eq!(issue.reporter().map(|r| r.account_id.as_str()), Some("u1"));
    assert_eq!(issue.labels().len(), 1);
    assert!(issue.has_label("frontend"));

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.fields_query.as_deref(),
        Some("summary,status,issuetype,assignee,reporter,labels,priority")
    );
}

#[tokio::test]
async fn test_basic_auth_header() {
    let (client, state) = client().await;

    client.fetch_issue("KAN-1").await.unwrap();
    client.list_transitions("KAN-1").await.unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.authorization.len(), 2);
    assert!(recorded.authorization.iter().all(|a| a == EXPECTED_AUTH));
}

#[tokio::test]
async fn test_status_code_mapping() {
    let (client, _) = client().await;

    assert_eq!(
        client.fetch_issue("KAN-404").await.unwrap_err(),
        TrackerError::NotFound("KAN-404".to_string())
    );
    assert!(matches!(
        client.fetch_issue("KAN-401").await.unwrap_err(),
        TrackerError::Auth(_)
    ));
    assert!(matches!(
        client.add_comment("KAN-403", "hi").await.unwrap_err(),
        TrackerError::Auth(_)
    ));
    assert!(matches!(
        client.fetch_issue("KAN-500").await.unwrap_err(),
        TrackerError::Transport { status: Some(500), ref detail } if detail == "boom"
    ));
    assert!(matches!(
        client.list_transitions("KAN-429").await.unwrap_err(),
        TrackerError::RateLimited { .. }
    ));
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let (client, _) = client().await;

    let err = client.fetch_issue("KAN-429").await.unwrap_err();
    assert_eq!(err, TrackerError::rate_limited(Some(Duration::from_secs(2)), "slow down"));
    assert_eq!(err.retry_decision(), RetryDecision::RetryAfter(Duration::from_secs(2)));

    let err = client.fetch_issue("KAN-430").await.unwrap_err();
    assert_eq!(err, TrackerError::rate_limited(None, "slow down"));
    assert_eq!(err.retry_decision(), RetryDecision::RetryAfter(Duration::from_secs(60)));
}

#[tokio::test]
async fn test_update_requires_no_content() {
    let (client, state) = client().await;

    client
        .update_fields("KAN-1", &FieldPatch::assignee("u1"))
        .await
        .unwrap();
    let err = client
        .update_fields("KAN-200", &FieldPatch::assignee("u1"))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::Transport { status: Some(200), .. }));

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.updates[0],
        json!({ "fields": { "assignee": { "accountId": "u1" } } })
    );
}

#[tokio::test]
async fn test_labels_patch_body() {
    let (client, state) = client().await;
    let labels: BTreeSet<String> = ["frontend", "bug"].iter().map(|s| s.to_string()).collect();

    client
        .update_fields("KAN-1", &FieldPatch::labels(labels))
        .await
        .unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(
        recorded.updates[0],
        json!({ "fields": { "labels": ["bug", "frontend"] } })
    );
}

#[tokio::test]
async fn test_transitions_round_trip() {
    let (client, state) = client().await;

    let transitions = client.list_transitions("KAN-1").await.unwrap();
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[1].id, TransitionId::new("11"));
    assert_eq!(transitions[1].target_status, "In Progress");

    client
        .apply_transition("KAN-1", &transitions[1].id)
        .await
        .unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.transitions[0], json!({ "transition": { "id": "11" } }));
}

#[tokio::test]
async fn test_comment_is_sent_as_adf() {
    let (client, state) = client().await;

    let id = client.add_comment("KAN-1", "Status changed").await.unwrap();
    assert_eq!(id, Some(CommentId::new("10042")));

    let recorded = state.lock().unwrap();
    let body = &recorded.comments[0]["body"];
    assert_eq!(body["type"], "doc");
    assert_eq!(body["version"], 1);
    assert_eq!(body["content"][0]["type"], "paragraph");
    assert_eq!(plain_text(body), "Status changed");
}

#[tokio::test]
async fn test_created_comment_without_id_is_success() {
    let (client, state) = client().await;

    let id = client.add_comment("KAN-NOID", "Status changed").await.unwrap();
    assert_eq!(id, None);
    assert_eq!(state.lock().unwrap().comments.len(), 1);
}

struct Shouting;

impl RichTextEncoder for Shouting {
    fn encode(&self, text: &str) -> Value {
        json!({ "plain": text.to_uppercase() })
    }
}

#[tokio::test]
async fn test_custom_encoder() {
    let (client, state) = client().await;
    let client = client.with_encoder(Shouting);

    client.add_comment("KAN-1", "hello").await.unwrap();

    let recorded = state.lock().unwrap();
    assert_eq!(recorded.comments[0], json!({ "body": { "plain": "HELLO" } }));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let (client, _) = client().await;

    let err = client.fetch_issue("KAN-BAD").await.unwrap_err();
    assert!(matches!(err, TrackerError::Decode(_)));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let (client, _) = start(Duration::from_millis(200)).await;

    let err = client.fetch_issue("KAN-SLOW").await.unwrap_err();
    assert!(matches!(err, TrackerError::Transport { status: None, .. }));
}
