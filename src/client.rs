use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::header::HeaderValue;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::errors::{IngestError, Result};
use crate::models::{
    AuthResponse, Camera, CameraPage, CreateJobResponse, Credentials, FaceMatches, Footage,
    JobState, NewCamera, PlateRecords, QueryWindow, ResourceId,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Header carrying the session token on every authenticated call.
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Multipart field the platform expects the video under.
const UPLOAD_FIELD: &str = "file";

/// Builder for constructing a [`Client`] with custom configuration.
///
/// # Example
///
/// ```no_run
/// use lpr_ingest::ClientBuilder;
/// use std::time::Duration;
///
/// # fn example() -> lpr_ingest::Result<()> {
/// let client = ClientBuilder::new()
///     .base_url("https://vms.example.com/api")
///     .timeout(Duration::from_secs(600))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<String>,
    timeout: Duration,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the platform's API root. Required.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the HTTP request timeout (defaults to 60 seconds).
    ///
    /// Uploads go out in a single request, so large assets need a generous value.
    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    /// Build the [`Client`].
    ///
    /// Returns [`IngestError::Config`] if no base URL was set.
    pub fn build(self) -> Result<Client> {
        let base_url = self
            .base_url
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| IngestError::Config("API base URL is required".into()))?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(IngestError::Http)?;

        Ok(Client { base_url, http })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of a successful login. Every authenticated call takes one.
///
/// Issued once per run by [`Client::authenticate`] and never refreshed.
#[derive(Clone)]
pub struct Session {
    token: String,
}

impl Session {
    /// Wrap a token obtained elsewhere.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

/// HTTP client for the analytics platform.
///
/// Holds no credentials of its own; pass a [`Session`] to each call.
#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    /// Shorthand for `ClientBuilder::new().base_url(url).build()`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        ClientBuilder::new().base_url(base_url).build()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /auth` - exchange credentials for a session token.
    ///
    /// A 2xx response without a token is treated the same as a rejection.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session> {
        let req = self.http.post(self.url("/auth")).json(credentials);
        let response = self.send(req).await?;
        let auth: Option<AuthResponse> = decode(response).await?;

        match auth.and_then(|a| a.token).filter(|t| !t.is_empty()) {
            Some(token) => {
                debug!(username = %credentials.username, "authenticated");
                Ok(Session { token })
            }
            None => Err(IngestError::Authentication {
                message: "auth response carried no token".into(),
            }),
        }
    }

    /// `GET /cameras`
    pub async fn list_cameras(&self, session: &Session) -> Result<Vec<Camera>> {
        let req = self.authed(Method::GET, "/cameras", session)?;
        let page: CameraPage = require(self.send(req).await?, "camera list").await?;
        Ok(page.content)
    }

    /// `POST /cameras/pseudo` - returns `None` when the platform answers
    /// with an empty body.
    pub async fn create_pseudo_camera(
        &self,
        session: &Session,
        name: &str,
        description: &str,
    ) -> Result<Option<Camera>> {
        let req = self
            .authed(Method::POST, "/cameras/pseudo", session)?
            .json(&NewCamera { name, description });
        decode(self.send(req).await?).await
    }

    /// `DELETE /cameras/{id}`
    pub async fn delete_camera(&self, session: &Session, camera_id: &ResourceId) -> Result<()> {
        let req = self.authed(Method::DELETE, &format!("/cameras/{camera_id}"), session)?;
        self.send(req).await?;
        Ok(())
    }

    /// `POST /jobs` - upload one asset as a multipart body named `file_name`,
    /// with job parameters in the query string.
    ///
    /// The whole file is read into memory and sent in a single request.
    pub async fn create_upload_job(
        &self,
        session: &Session,
        asset: &Path,
        file_name: &str,
        params: &[(&'static str, String)],
    ) -> Result<CreateJobResponse> {
        let bytes = tokio::fs::read(asset).await.map_err(IngestError::Io)?;
        debug!(asset = %asset.display(), size = bytes.len(), "uploading asset");

        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part(UPLOAD_FIELD, part);
        let req = self
            .authed(Method::POST, "/jobs", session)?
            .query(params)
            .multipart(form);

        require(self.send(req).await?, "job creation response").await
    }

    /// `GET /jobs/{id}`
    pub async fn get_job(&self, session: &Session, job_id: u64) -> Result<JobState> {
        let req = self.authed(Method::GET, &format!("/jobs/{job_id}"), session)?;
        require(self.send(req).await?, "job status").await
    }

    /// `GET /footages/{id}`
    pub async fn get_footage(&self, session: &Session, footage_id: &ResourceId) -> Result<Footage> {
        let req = self.authed(Method::GET, &format!("/footages/{footage_id}"), session)?;
        require(self.send(req).await?, "footage").await
    }

    /// `GET /lpr/plates` - plate detections for one footage within `window`.
    pub async fn get_plates(
        &self,
        session: &Session,
        footage_id: &ResourceId,
        window: &QueryWindow,
    ) -> Result<PlateRecords> {
        let req = self.authed(Method::GET, "/lpr/plates", session)?.query(&[
            ("start", window.start.as_str()),
            ("end", window.end.as_str()),
            ("footageIds", footage_id.as_str()),
        ]);
        require(self.send(req).await?, "plate records").await
    }

    /// `GET /face/matches` - face-recognition matches for one footage within
    /// `window`, restricted to the comma-separated `categories`.
    pub async fn get_face_matches(
        &self,
        session: &Session,
        footage_id: &ResourceId,
        categories: &str,
        window: &QueryWindow,
    ) -> Result<FaceMatches> {
        let req = self.authed(Method::GET, "/face/matches", session)?.query(&[
            ("start", window.start.as_str()),
            ("end", window.end.as_str()),
            ("footageIds", footage_id.as_str()),
            ("categories", categories),
        ]);
        require(self.send(req).await?, "face matches").await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, method: Method, path: &str, session: &Session) -> Result<RequestBuilder> {
        let token =
            HeaderValue::from_str(&session.token).map_err(|_| IngestError::Authentication {
                message: "session token contains invalid header characters".into(),
            })?;
        Ok(self
            .http
            .request(method, self.url(path))
            .header(AUTH_HEADER, token))
    }

    /// Send a request once and map non-2xx responses to typed errors.
    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let response = req.send().await.map_err(IngestError::Http)?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let status_code = status.as_u16();
        let response_text = response.text().await.unwrap_or_default();

        let parsed_body: Option<serde_json::Value> = serde_json::from_str(&response_text).ok();

        if status.is_client_error() {
            warn!(status_code, body = %response_text, "platform rejected request");
        }

        let message = parsed_body
            .as_ref()
            .and_then(|b| b.get("message").or_else(|| b.get("error")))
            .and_then(|e| e.as_str())
            .unwrap_or(&response_text)
            .to_string();

        Err(match status_code {
            401 => IngestError::Authentication { message },
            403 => IngestError::PermissionDenied { message },
            404 => IngestError::NotFound { message },
            _ => IngestError::Api {
                status_code,
                message,
                body: parsed_body,
            },
        })
    }
}

/// Decode a JSON body, treating an empty body or `null` as `None`.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let text = response.text().await.map_err(IngestError::Http)?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Like [`decode`], but an absent payload is an error.
async fn require<T: DeserializeOwned>(response: Response, what: &'static str) -> Result<T> {
    decode(response)
        .await?
        .ok_or(IngestError::MissingPayload(what))
}
