use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{
    AccessToken, AttendanceApi, AttendanceCount, DEFAULT_SCAN_MESSAGE, LectureMode, ManualMark,
    ScanReceipt, Section, StudentQrToken, UserSummary, routes,
};
use crate::error::ApiError;
use crate::types::{PendingSubmission, ScanKind, SectionId, UserId};

/// Request timeout used when the caller does not configure one.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// API client with bearer authentication support
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token_store: Arc<RwLock<Option<String>>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field(
                "has_token",
                &self
                    .token_store
                    .try_read()
                    .map(|t| t.is_some())
                    .unwrap_or(false),
            )
            .finish()
    }
}

/// Add a scheme when missing and trim trailing slashes, so that
/// `localhost:8000/` and `http://localhost:8000` resolve the same way.
pub fn normalize_base_url(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::InvalidRequest("server URL is empty".into()));
    }
    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://")
    {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    // Accept an explicit `/api` suffix as well; routes add it themselves.
    let without_api = with_scheme
        .strip_suffix("/api")
        .map(str::to_string)
        .unwrap_or(with_scheme);

    Url::parse(&without_api)
        .map_err(|e| ApiError::InvalidRequest(format!("invalid server URL: {e}")))?;
    Ok(without_api)
}

impl ApiClient {
    /// Create a client for the given server with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let normalized = normalize_base_url(base_url)?;
        if normalized != base_url {
            debug!(
                "[ApiClient] Normalized base URL from '{}' to '{}'",
                base_url, normalized
            );
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        info!("[ApiClient] Creating API client with base URL: {}", normalized);

        Ok(Self {
            client,
            base_url: normalized,
            token_store: Arc::new(RwLock::new(None)),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an API URL from a route path
    pub fn build_url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("{}/api/{}", self.base_url, path)
    }

    /// Set the bearer credential attached to every request
    pub async fn set_token(&self, token: Option<String>) {
        *self.token_store.write().await = token;
    }

    pub async fn get_token(&self) -> Option<String> {
        self.token_store.read().await.clone()
    }

    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        if let Some(token) = self.token_store.read().await.as_ref() {
            builder.bearer_auth(token)
        } else {
            builder
        }
    }

    /// Send a request and return the body of a success response.
    ///
    /// Anything without a response maps to [`ApiError::Transport`]; a
    /// non-success status maps to [`ApiError::Status`] with the server's
    /// detail text.
    async fn execute(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let request = self.authorize(request).await;
        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        let detail = extract_detail(status, &body);
        if status == StatusCode::UNAUTHORIZED {
            warn!("[ApiClient] Credential rejected by server");
        }
        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn scan_lecture(
        &self,
        submission: &PendingSubmission,
    ) -> Result<ScanReceipt, ApiError> {
        let (Some(student_id), Some(section_id)) =
            (submission.student_id, submission.section_id)
        else {
            return Err(ApiError::InvalidRequest(
                "lecture scan needs a student and a section".into(),
            ));
        };

        let mut query = vec![
            ("secret", submission.token.clone()),
            ("student_id", student_id.to_string()),
            ("section_id", section_id.to_string()),
        ];
        if let Some(beacon) = &submission.beacon_id {
            query.push(("beacon_id", beacon.to_string()));
        }

        let url = self.build_url(routes::SCAN_LECTURE);
        debug!("[ApiClient] POST {}", url);
        let body = self.execute(self.client.post(&url).query(&query)).await?;
        Ok(receipt_from_body(&body))
    }

    async fn scan_student(
        &self,
        submission: &PendingSubmission,
    ) -> Result<ScanReceipt, ApiError> {
        let Some(section_id) = submission.section_id else {
            return Err(ApiError::InvalidRequest(
                "student-token scan needs a section".into(),
            ));
        };

        let query = [
            ("token", submission.token.clone()),
            ("section_id", section_id.to_string()),
        ];

        let url = self.build_url(routes::SCAN_STUDENT);
        debug!("[ApiClient] POST {}", url);
        let body = self.execute(self.client.post(&url).query(&query)).await?;
        Ok(receipt_from_body(&body))
    }

    /// Fetch the rotating token a student shows for teacher verification.
    pub async fn student_qr_token(&self, user_id: UserId) -> Result<StudentQrToken, ApiError> {
        let url = self.build_url(&routes::student_qr_token(user_id.0));
        self.execute_json(self.client.get(&url)).await
    }

    /// Turn on lecture mode for a teacher, returning the lecture secret.
    pub async fn enable_lecture_mode(&self, teacher_id: UserId) -> Result<LectureMode, ApiError> {
        let url = self.build_url(&routes::enable_lecture_mode(teacher_id.0));
        self.execute_json(self.client.post(&url)).await
    }

    pub async fn disable_lecture_mode(&self, teacher_id: UserId) -> Result<LectureMode, ApiError> {
        let url = self.build_url(&routes::disable_lecture_mode(teacher_id.0));
        self.execute_json(self.client.post(&url)).await
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>, ApiError> {
        let url = self.build_url(routes::SECTIONS);
        self.execute_json(self.client.get(&url)).await
    }

    /// Exchange a username and password for a session token.
    ///
    /// The token is returned, not stored; call [`ApiClient::set_token`] to
    /// use it for later requests.
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, ApiError> {
        let url = self.build_url(routes::LOGIN);
        debug!("[ApiClient] POST {} for '{}'", url, username);
        let form = [("username", username), ("password", password)];
        let token: AccessToken = self.execute_json(self.client.post(&url).form(&form)).await?;
        info!("[ApiClient] Signed in as '{}'", username);
        Ok(token)
    }

    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ApiError> {
        let url = self.build_url(routes::USERS);
        self.execute_json(self.client.get(&url)).await
    }

    /// Attendance records of the signed-in user, optionally within a section.
    pub async fn attendance_count(&self, section: Option<SectionId>) -> Result<u64, ApiError> {
        let url = self.build_url(routes::ATTENDANCE_COUNT);
        let mut request = self.client.get(&url);
        if let Some(section) = section {
            request = request.query(&[("section_id", section.0)]);
        }
        let count: AttendanceCount = self.execute_json(request).await?;
        Ok(count.count)
    }
}

#[async_trait]
impl AttendanceApi for ApiClient {
    async fn submit_scan(
        &self,
        submission: &PendingSubmission,
    ) -> Result<ScanReceipt, ApiError> {
        match submission.kind {
            ScanKind::Lecture => self.scan_lecture(submission).await,
            ScanKind::StudentToken => self.scan_student(submission).await,
        }
    }

    async fn mark_present(&self, mark: &ManualMark) -> Result<(), ApiError> {
        let url = self.build_url(routes::MANUAL_MARK);
        debug!("[ApiClient] POST {}", url);
        self.execute(self.client.post(&url).json(mark)).await?;
        Ok(())
    }
}

/// Pull the human-readable message out of a success body.
fn receipt_from_body(body: &str) -> ScanReceipt {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SCAN_MESSAGE.to_string());
    ScanReceipt { message }
}

/// Error text from a FastAPI-style `{"detail": ...}` body, a `message`
/// field, the raw body, or finally the status reason.
fn extract_detail(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(text)) if !text.trim().is_empty() => {
                    return text.clone();
                }
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
