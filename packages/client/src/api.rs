use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::MoveDirection;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::io::ReaderStream;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backend::AuthEvent;
use crate::coordinator::{MediaApi, VideoUpload};
use crate::error::{ClientError, ErrorBody};
use crate::types::{
    AdminStats, Chapter, Course, CourseDetail, Dashboard, ListQuery, LoginResponse, MeResponse,
    Page, PlaybackLink, Profile, SignUpForm, Subject,
};

const API_PREFIX: &str = "/api/v1";

/// Thin typed wrapper over the Lectern HTTP API.
///
/// Holds the bearer token for the current session. A request rejected with
/// `TOKEN_INVALID` while a token was attached drops the token and broadcasts
/// [`AuthEvent::TokenExpired`].
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
    events: broadcast::Sender<AuthEvent>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let (events, _) = broadcast::channel(16);
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: RwLock::new(None),
            events,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn events(&self) -> &broadcast::Sender<AuthEvent> {
        &self.events
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}{API_PREFIX}{path}", self.base_url));
        match self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
        {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(&self, response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ErrorBody>().await.ok();
        let token_rejected = status == StatusCode::UNAUTHORIZED
            && body.as_ref().is_some_and(|b| b.code == "TOKEN_INVALID");
        if token_rejected && self.has_token() {
            debug!("Server rejected the session token");
            self.set_token(None);
            // No receivers is fine.
            let _ = self.events.send(AuthEvent::TokenExpired);
        }
        Err(ClientError::from_response(status, body))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.check(builder.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.check(builder.send().await?).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(Method::GET, path)).await
    }

    async fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &ListQuery,
    ) -> Result<Page<T>, ClientError> {
        self.send(self.request(Method::GET, path).query(query)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.send(self.request(Method::POST, path).json(body)).await
    }

    // Auth

    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ClientError> {
        self.post(
            "/auth/login",
            &json!({ "username": username, "password": password }),
        )
        .await
    }

    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&self, form: &SignUpForm) -> Result<Profile, ClientError> {
        self.post("/auth/register", form).await
    }

    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.send_empty(self.request(Method::POST, "/auth/logout"))
            .await
    }

    pub async fn me(&self) -> Result<MeResponse, ClientError> {
        self.get("/auth/me").await
    }

    // Catalog

    pub async fn dashboard(&self) -> Result<Dashboard, ClientError> {
        self.get("/dashboard").await
    }

    pub async fn subjects(&self, query: &ListQuery) -> Result<Page<Subject>, ClientError> {
        self.list("/subjects", query).await
    }

    pub async fn courses(&self, query: &ListQuery) -> Result<Page<Course>, ClientError> {
        self.list("/courses", query).await
    }

    pub async fn course(&self, id: i32) -> Result<CourseDetail, ClientError> {
        self.get(&format!("/courses/{id}")).await
    }

    pub async fn chapters(&self, query: &ListQuery) -> Result<Page<Chapter>, ClientError> {
        self.list("/chapters", query).await
    }

    pub async fn chapter(&self, id: i32) -> Result<Chapter, ClientError> {
        self.get(&format!("/chapters/{id}")).await
    }

    #[instrument(skip(self))]
    pub async fn move_chapter(
        &self,
        id: i32,
        direction: MoveDirection,
    ) -> Result<Vec<Chapter>, ClientError> {
        self.post(
            &format!("/chapters/{id}/move"),
            &json!({ "direction": direction }),
        )
        .await
    }

    // Admin

    pub async fn admin_stats(&self) -> Result<AdminStats, ClientError> {
        self.get("/admin/stats").await
    }

    pub async fn users(&self, query: &ListQuery) -> Result<Page<Profile>, ClientError> {
        self.list("/admin/users", query).await
    }

    pub async fn user(&self, user_id: Uuid) -> Result<Profile, ClientError> {
        self.get(&format!("/admin/users/{user_id}")).await
    }

    #[instrument(skip(self))]
    pub async fn set_access_expiry(
        &self,
        user_id: Uuid,
        expiry: DateTime<Utc>,
    ) -> Result<Profile, ClientError> {
        self.send(
            self.request(Method::PATCH, &format!("/admin/users/{user_id}"))
                .json(&json!({ "access_expiry_date": expiry })),
        )
        .await
    }
}

#[async_trait]
impl MediaApi for ApiClient {
    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, length = upload.length))]
    async fn upload_video(
        &self,
        chapter_id: i32,
        upload: VideoUpload,
    ) -> Result<Chapter, ClientError> {
        let body = Body::wrap_stream(ReaderStream::new(upload.reader));
        let part = Part::stream_with_length(body, upload.length)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        let form = Form::new().part("file", part);
        self.send(
            self.request(Method::PUT, &format!("/chapters/{chapter_id}/video"))
                .multipart(form),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn request_playback(&self, chapter_id: i32) -> Result<PlaybackLink, ClientError> {
        self.send(self.request(Method::POST, &format!("/chapters/{chapter_id}/playback")))
            .await
    }
}
