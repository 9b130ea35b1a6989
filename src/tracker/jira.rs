//! Jira Cloud backend
//!
//! Implements [`TrackerClient`] on top of the Jira REST API v3 with basic
//! authentication (account email + API token).

use super::adf::{AdfEncoder, RichTextEncoder};
use super::{
    CommentId, FieldPatch, FieldValue, TrackerClient, TrackerError, Transition, TransitionId,
};
use crate::config::TrackerCredentials;
use crate::snapshot::{Identity, IssueSnapshot, IssueType, Priority, Status};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Fields requested when fetching an issue
const ISSUE_FIELDS: &str = "summary,status,issuetype,assignee,reporter,labels,priority";

/// Jira REST client
pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
    encoder: Box<dyn RichTextEncoder>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraFields {
    #[serde(default)]
    summary: Option<String>,
    status: JiraNamed,
    #[serde(rename = "issuetype")]
    issue_type: JiraNamed,
    #[serde(default)]
    priority: Option<JiraNamed>,
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    assignee: Option<JiraUser>,
    #[serde(default)]
    reporter: Option<JiraUser>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraNamed {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraUser {
    #[serde(rename = "accountId", default)]
    account_id: Option<String>,
    #[serde(rename = "displayName", default)]
    display_name: Option<String>,
}

impl JiraUser {
    /// A user without an account id cannot be assigned, so it is treated as absent
    fn into_identity(self) -> Option<Identity> {
        let account_id = self.account_id.filter(|id| !id.is_empty())?;
        let display_name = self.display_name.unwrap_or_else(|| account_id.clone());
        Some(Identity::new(account_id, display_name))
    }
}

impl JiraIssue {
    fn into_snapshot(self) -> IssueSnapshot {
        let fields = self.fields;
        IssueSnapshot::new(
            self.key,
            Status::from_name(&fields.status.name),
            IssueType::from_name(&fields.issue_type.name),
        )
        .with_summary(fields.summary.unwrap_or_default())
        .with_assignee(fields.assignee.and_then(JiraUser::into_identity))
        .with_reporter(fields.reporter.and_then(JiraUser::into_identity))
        .with_labels(fields.labels)
        .with_priority(
            fields
                .priority
                .filter(|p| !p.name.trim().is_empty())
                .map(|p| Priority::from_name(&p.name)),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: JiraNamed,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraTransitionsResponse {
    #[serde(default)]
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Clone, Deserialize)]
struct JiraCreatedComment {
    id: String,
}

#[derive(Debug, Clone, Serialize)]
struct JiraTransitionRequest<'a> {
    transition: JiraTransitionRef<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct JiraTransitionRef<'a> {
    id: &'a str,
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::transport(None, format!("request timed out: {}", err))
        } else if err.is_decode() {
            TrackerError::Decode(err.to_string())
        } else {
            TrackerError::transport(err.status().map(|s| s.as_u16()), err.to_string())
        }
    }
}

/// Serialize a patch into the body of `PUT /issue/{key}`
fn patch_body(patch: &FieldPatch) -> Value {
    let mut fields = Map::new();
    for (name, value) in patch.iter() {
        let value = match value {
            FieldValue::Account(id) => json!({ "accountId": id }),
            FieldValue::Labels(labels) => json!(labels),
        };
        fields.insert(name.clone(), value);
    }
    json!({ "fields": fields })
}

impl JiraClient {
    /// Create a client for the given site
    pub fn new(credentials: TrackerCredentials, timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/api/3", credentials.base_url.trim_end_matches('/')),
            email: credentials.email,
            api_token: credentials.api_token,
            encoder: Box::new(AdfEncoder),
        })
    }

    /// Replace the comment encoder
    pub fn with_encoder(mut self, encoder: impl RichTextEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn issue_url(&self, key: &str) -> String {
        format!("{}/issue/{}", self.base_url, urlencoding::encode(key))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .basic_auth(&self.email, Some(&self.api_token))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Accept exactly `expected`; map everything else onto the error taxonomy
    async fn expect_status(
        response: Response,
        expected: StatusCode,
        key: &str,
    ) -> Result<Response, TrackerError> {
        let status = response.status();
        if status == expected {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(TrackerError::rate_limited(retry_after, body)),
            StatusCode::NOT_FOUND => Err(TrackerError::NotFound(key.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TrackerError::Auth(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            ))),
            _ => Err(TrackerError::transport(Some(status.as_u16()), body)),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TrackerError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TrackerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TrackerClient for JiraClient {
    async fn fetch_issue(&self, key: &str) -> Result<IssueSnapshot, TrackerError> {
        debug!(key = %key, "Fetching Jira issue");

        let request = self
            .client
            .get(self.issue_url(key))
            .query(&[("fields", ISSUE_FIELDS)]);
        let response = self.authorized(request).send().await?;
        let response = Self::expect_status(response, StatusCode::OK, key).await?;

        let issue: JiraIssue = Self::decode(response).await?;
        Ok(issue.into_snapshot())
    }

    async fn update_fields(&self, key: &str, patch: &FieldPatch) -> Result<(), TrackerError> {
        info!(key = %key, fields = patch.len(), "Updating Jira issue fields");

        let request = self.client.put(self.issue_url(key)).json(&patch_body(patch));
        let response = self.authorized(request).send().await?;
        Self::expect_status(response, StatusCode::NO_CONTENT, key).await?;
        Ok(())
    }

    async fn list_transitions(&self, key: &str) -> Result<Vec<Transition>, TrackerError> {
        debug!(key = %key, "Listing Jira transitions");

        let url = format!("{}/transitions", self.issue_url(key));
        let response = self.authorized(self.client.get(url)).send().await?;
        let response = Self::expect_status(response, StatusCode::OK, key).await?;

        let result: JiraTransitionsResponse = Self::decode(response).await?;
        Ok(result
            .transitions
            .into_iter()
            .map(|t| Transition::new(t.id, t.name, t.to.name))
            .collect())
    }

    async fn apply_transition(
        &self,
        key: &str,
        transition: &TransitionId,
    ) -> Result<(), TrackerError> {
        info!(key = %key, transition_id = %transition, "Transitioning Jira issue");

        let body = JiraTransitionRequest {
            transition: JiraTransitionRef {
                id: transition.as_str(),
            },
        };
        let url = format!("{}/transitions", self.issue_url(key));
        let response = self.authorized(self.client.post(url).json(&body)).send().await?;
        Self::expect_status(response, StatusCode::NO_CONTENT, key).await?;
        Ok(())
    }

    async fn add_comment(&self, key: &str, text: &str) -> Result<Option<CommentId>, TrackerError> {
        info!(key = %key, "Adding comment to Jira issue");

        let body = json!({ "body": self.encoder.encode(text) });
        let url = format!("{}/comment", self.issue_url(key));
        let response = self.authorized(self.client.post(url).json(&body)).send().await?;
        let response = Self::expect_status(response, StatusCode::CREATED, key).await?;

        // 201 means the comment exists; an unreadable body only loses its id
        let bytes = response.bytes().await.unwrap_or_default();
        match serde_json::from_slice::<JiraCreatedComment>(&bytes) {
            Ok(created) => Ok(Some(CommentId::new(created.id))),
            Err(e) => {
                warn!(key = %key, error = %e, "Comment created but its id could not be read");
                Ok(None)
            }
        }
    }
}
