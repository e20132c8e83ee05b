//! Portal REST transport.
//!
//! ```text
//! GET  /{role-segment}/{page}-grievances      list queue
//! GET  /{role-segment}/grievance/{issue_id}   detail
//! POST /{role-segment}/{action}-grievance     acknowledge/resolve/reject/return/redirect
//! POST /grievances                            student submission
//! GET  /grievances/track/{issue_id}           student tracking
//! ```
//!
//! Every response is the `{ success, data, total?, message }` envelope.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use grievance_core::lifecycle::ActionKind;
use grievance_core::submission::SubmissionBody;
use grievance_core::wire::{ActionBody, ApiEnvelope, GrievanceDto};
use grievance_core::{GrievanceError, GrievanceResult, ListSource, Role};

use crate::config::DeskConfig;

/// What the server hands back for a new submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(rename = "issuse_id")]
    pub issue_id: String,
    #[serde(default)]
    pub rollno: String,
}

/// Network boundary of the desk. Implementations perform no local
/// validation; callers gate and pre-check first.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GrievanceApi: Send + Sync {
    async fn list(&self, source: ListSource) -> GrievanceResult<Vec<GrievanceDto>>;

    async fn detail(&self, role: Role, issue_id: &str) -> GrievanceResult<GrievanceDto>;

    async fn submit_action(
        &self,
        role: Role,
        action: ActionKind,
        body: &ActionBody,
    ) -> GrievanceResult<()>;

    async fn submit(&self, body: &SubmissionBody) -> GrievanceResult<SubmissionReceipt>;

    async fn track(&self, issue_id: &str) -> GrievanceResult<GrievanceDto>;
}

pub fn detail_path(role: Role, issue_id: &str) -> String {
    format!("{}/grievance/{}", role.api_segment(), issue_id)
}

pub fn action_path(role: Role, action: ActionKind) -> String {
    format!("{}/{}-grievance", role.api_segment(), action)
}

/// Map a non-success HTTP status to the error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> GrievanceError {
    let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GrievanceError::auth(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            GrievanceError::transient(format!("{status}: {message}"))
        }
        s if s.is_server_error() => GrievanceError::transient(format!("{status}: {message}")),
        s => GrievanceError::server_rejected(Some(s.as_u16()), message),
    }
}

fn transport_error(err: reqwest::Error) -> GrievanceError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        GrievanceError::transient(err.to_string())
    } else {
        GrievanceError::server_rejected(err.status().map(|s| s.as_u16()), err.to_string())
    }
}

/// Decode an envelope body and unwrap its data.
pub fn decode_envelope<T: DeserializeOwned>(body: &str) -> GrievanceResult<T> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body).map_err(|e| {
        GrievanceError::server_rejected(None, format!("malformed response: {e}"))
    })?;
    envelope.into_data()
}

/// Action endpoints may omit `data`; only `success` matters.
fn decode_ack(body: &str) -> GrievanceResult<()> {
    let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(body).map_err(|e| {
        GrievanceError::server_rejected(None, format!("malformed response: {e}"))
    })?;
    if envelope.success {
        Ok(())
    } else {
        Err(GrievanceError::server_rejected(None, envelope.message))
    }
}

/// reqwest-backed [`GrievanceApi`].
pub struct HttpGrievanceApi {
    config: DeskConfig,
    client: reqwest::Client,
}

impl HttpGrievanceApi {
    pub fn new(config: DeskConfig) -> GrievanceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                GrievanceError::validation(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { config, client })
    }

    fn token(&self) -> GrievanceResult<&str> {
        self.config
            .token
            .as_deref()
            .ok_or_else(|| GrievanceError::auth("no bearer token configured (GRIEVANCE_TOKEN)"))
    }

    /// Send with bearer auth and return the body of a 2xx response.
    async fn send(&self, request: reqwest::RequestBuilder) -> GrievanceResult<String> {
        let token = self.token()?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            let err = status_error(status, &body);
            warn!(%status, code = %err.reason_code(), "Request failed");
            return Err(err);
        }
        Ok(body)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> GrievanceResult<T> {
        let url = self.config.url(path);
        debug!(%url, "GET");
        let body = self.send(self.client.get(&url)).await?;
        decode_envelope(&body)
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, payload: &B) -> GrievanceResult<String> {
        let url = self.config.url(path);
        debug!(%url, "POST");
        self.send(self.client.post(&url).json(payload)).await
    }
}

#[async_trait]
impl GrievanceApi for HttpGrievanceApi {
    async fn list(&self, source: ListSource) -> GrievanceResult<Vec<GrievanceDto>> {
        self.get(&source.path()).await
    }

    async fn detail(&self, role: Role, issue_id: &str) -> GrievanceResult<GrievanceDto> {
        self.get(&detail_path(role, issue_id)).await
    }

    async fn submit_action(
        &self,
        role: Role,
        action: ActionKind,
        body: &ActionBody,
    ) -> GrievanceResult<()> {
        let response = self.post(&action_path(role, action), body).await?;
        decode_ack(&response)
    }

    async fn submit(&self, body: &SubmissionBody) -> GrievanceResult<SubmissionReceipt> {
        let response = self.post("grievances", body).await?;
        decode_envelope(&response)
    }

    async fn track(&self, issue_id: &str) -> GrievanceResult<GrievanceDto> {
        self.get(&format!("grievances/track/{}", issue_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grievance_core::{Department, ReasonCode};
    use std::time::Duration;

    #[test]
    fn test_paths() {
        assert_eq!(
            action_path(Role::Campus(Department::NonAcademic), ActionKind::Redirect),
            "campus-non-academic/redirect-grievance"
        );
        assert_eq!(
            detail_path(Role::SuperAdmin, "ISSUE-1"),
            "super-admin/grievance/ISSUE-1"
        );
    }

    #[test]
    fn test_status_mapping() {
        let auth = status_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(auth.reason_code(), ReasonCode::NotAuthenticated);
        assert!(auth.requires_reauthentication());

        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "").reason_code(),
            ReasonCode::NotAuthenticated
        );

        let unavailable = status_error(StatusCode::SERVICE_UNAVAILABLE, "");
        assert!(unavailable.is_retryable());

        let conflict = status_error(
            StatusCode::CONFLICT,
            r#"{"success": false, "message": "Grievance already resolved"}"#,
        );
        assert_eq!(
            conflict,
            GrievanceError::server_rejected(Some(409), "Grievance already resolved")
        );
        assert!(!conflict.is_retryable());
    }

    #[test]
    fn test_decode_envelope_variants() {
        let receipt: SubmissionReceipt = decode_envelope(
            r#"{"success": true, "message": "ok",
                "data": {"issuse_id": "ISSUE-1-abc123", "rollno": "41522001"}}"#,
        )
        .unwrap();
        assert_eq!(receipt.issue_id, "ISSUE-1-abc123");

        let err = decode_envelope::<SubmissionReceipt>("<html>gateway</html>").unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::ServerRejected);

        assert!(decode_ack(r#"{"success": true, "message": "Resolved"}"#).is_ok());
        let err = decode_ack(r#"{"success": false, "message": "Not your grievance"}"#).unwrap_err();
        assert_eq!(err.to_string(), "Server rejected request: Not your grievance");
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_network() {
        let api = HttpGrievanceApi::new(DeskConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            token: None,
            timeout: Duration::from_secs(1),
            engine_config: None,
        })
        .unwrap();

        let err = api.track("ISSUE-1").await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::NotAuthenticated);
    }
}
