use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::UserRole;
use common::storage::{FilesystemVideoStore, MediaSigner};
use reqwest::Client;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::Value;
use tempfile::TempDir;

use server::config::{
    AccessConfig, AppConfig, AuthConfig, BootstrapConfig, CorsConfig, DatabaseConfig,
    ServerConfig, StorageConfig,
};
use server::entity::profile;
use server::state::AppState;

pub const PASSWORD: &str = "securepass";

pub mod routes {
    pub const REGISTER: &str = "/api/v1/auth/register";
    pub const LOGIN: &str = "/api/v1/auth/login";
    pub const LOGOUT: &str = "/api/v1/auth/logout";
    pub const ME: &str = "/api/v1/auth/me";
    pub const DASHBOARD: &str = "/api/v1/dashboard";
    pub const SUBJECTS: &str = "/api/v1/subjects";
    pub const COURSES: &str = "/api/v1/courses";
    pub const CHAPTERS: &str = "/api/v1/chapters";
    pub const USERS: &str = "/api/v1/admin/users";
    pub const STATS: &str = "/api/v1/admin/stats";

    pub fn subject(id: i32) -> String {
        format!("/api/v1/subjects/{id}")
    }

    pub fn course(id: i32) -> String {
        format!("/api/v1/courses/{id}")
    }

    pub fn chapter(id: i32) -> String {
        format!("/api/v1/chapters/{id}")
    }

    pub fn chapter_move(id: i32) -> String {
        format!("/api/v1/chapters/{id}/move")
    }

    pub fn chapter_video(id: i32) -> String {
        format!("/api/v1/chapters/{id}/video")
    }

    pub fn chapter_playback(id: i32) -> String {
        format!("/api/v1/chapters/{id}/playback")
    }

    pub fn user(id: &str) -> String {
        format!("/api/v1/admin/users/{id}")
    }

    pub fn user_password(id: &str) -> String {
        format!("/api/v1/admin/users/{id}/password")
    }
}

/// A running test server backed by a throwaway SQLite file and video directory.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    dir: TempDir,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());

        let mut opts = ConnectOptions::new(&db_url);
        opts.max_connections(5).min_connections(1).sqlx_logging(false);
        let db = Database::connect(opts)
            .await
            .expect("Failed to connect to test database");
        server::database::sync_schema(&db)
            .await
            .expect("Failed to sync schema");
        server::seed::ensure_indexes(&db)
            .await
            .expect("Failed to create indexes");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        let jwt_secret = "test-secret-for-integration-tests".to_string();
        let storage = StorageConfig {
            root: dir.path().join("videos"),
            max_video_size: 1024 * 1024,
            public_base_url: format!("http://{addr}"),
            ..Default::default()
        };
        let media_signer = MediaSigner::new(format!("{jwt_secret}:media"));
        let videos = FilesystemVideoStore::new(
            storage.root.clone(),
            storage.max_video_size,
            storage.public_base_url.clone(),
            media_signer.clone(),
        )
        .await
        .expect("Failed to create video store");

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig {
                    allow_origins: vec![],
                    max_age: 3600,
                },
            },
            database: DatabaseConfig { url: db_url },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_hours: 1,
            },
            storage,
            access: AccessConfig::default(),
            bootstrap: BootstrapConfig::default(),
        };

        let state = AppState {
            db: db.clone(),
            config: app_config,
            videos: Arc::new(videos),
            media_signer,
        };

        let app = server::build_router(state);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Where the filesystem store keeps the object at `path`.
    pub fn stored_video(&self, path: &str) -> PathBuf {
        self.dir.path().join("videos").join(path)
    }

    pub async fn post_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn post_without_token(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn get_without_token(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn patch_with_token(&self, path: &str, body: &Value, token: &str) -> TestResponse {
        let res = self
            .client
            .patch(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await
            .expect("Failed to send PATCH request");

        TestResponse::from_response(res).await
    }

    pub async fn delete_with_token(&self, path: &str, token: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    pub async fn upload_with_token(
        &self,
        path: &str,
        file_name: &str,
        mime: &str,
        file_bytes: Vec<u8>,
        token: &str,
    ) -> TestResponse {
        let part = reqwest::multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str(mime)
            .expect("Failed to set MIME type");
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = self
            .client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send multipart upload request");

        TestResponse::from_response(res).await
    }

    /// Register an account through the API. Self-registered accounts start expired.
    pub async fn register(&self, username: &str) -> TestResponse {
        let res = self
            .post_without_token(
                routes::REGISTER,
                &serde_json::json!({
                    "username": username,
                    "password": PASSWORD,
                    "phone_number": "13800000000",
                }),
            )
            .await;
        assert_eq!(res.status, 201, "Registration failed: {}", res.text);
        res
    }

    pub async fn login(&self, username: &str) -> String {
        let res = self
            .post_without_token(
                routes::LOGIN,
                &serde_json::json!({"username": username, "password": PASSWORD}),
            )
            .await;
        assert_eq!(res.status, 200, "Login failed: {}", res.text);

        res.body["token"]
            .as_str()
            .expect("Login response should contain a token")
            .to_string()
    }

    /// Overwrite role and access expiry directly in the database.
    pub async fn set_account(&self, username: &str, role: UserRole, expiry: DateTime<Utc>) {
        let existing = profile::Entity::find()
            .filter(profile::Column::Username.eq(username))
            .one(&self.db)
            .await
            .expect("DB query failed")
            .expect("User not found after registration");

        let mut active: profile::ActiveModel = existing.into();
        active.role = Set(role);
        active.access_expiry_date = Set(expiry);
        active.update(&self.db).await.expect("Failed to update user");
    }

    /// A regular user with `days` of access left, signed in.
    pub async fn create_user(&self, username: &str, days: i64) -> String {
        self.register(username).await;
        self.set_account(username, UserRole::User, Utc::now() + Duration::days(days))
            .await;
        self.login(username).await
    }

    /// A self-registered user whose access has never been extended, signed in.
    pub async fn create_expired_user(&self, username: &str) -> String {
        self.register(username).await;
        self.login(username).await
    }

    /// An administrator with an open access window, signed in.
    pub async fn create_admin(&self, username: &str) -> String {
        self.register(username).await;
        self.set_account(username, UserRole::Admin, Utc::now() + Duration::days(365))
            .await;
        self.login(username).await
    }

    /// Create a subject via the API and return its `id`.
    pub async fn create_subject(&self, token: &str, name: &str) -> i32 {
        let res = self
            .post_with_token(
                routes::SUBJECTS,
                &serde_json::json!({"name": name, "description": "Subject description"}),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_subject failed: {}", res.text);
        res.id()
    }

    /// Create a course via the API and return its `id`.
    pub async fn create_course(&self, token: &str, subject_id: i32, title: &str) -> i32 {
        let res = self
            .post_with_token(
                routes::COURSES,
                &serde_json::json!({
                    "subject_id": subject_id,
                    "title": title,
                    "description": "Course description",
                    "keywords": "limits derivatives",
                }),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_course failed: {}", res.text);
        res.id()
    }

    /// Append a chapter via the API and return its `id`.
    pub async fn create_chapter(&self, token: &str, course_id: i32, title: &str) -> i32 {
        let res = self
            .post_with_token(
                routes::CHAPTERS,
                &serde_json::json!({"course_id": course_id, "title": title}),
                token,
            )
            .await;
        assert_eq!(res.status, 201, "create_chapter failed: {}", res.text);
        res.id()
    }

    /// Subject "Math" with course "Calculus I"; returns `(subject_id, course_id)`.
    pub async fn seed_catalog(&self, token: &str) -> (i32, i32) {
        let subject_id = self.create_subject(token, "Math").await;
        let course_id = self.create_course(token, subject_id, "Calculus I").await;
        (subject_id, course_id)
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }

    pub fn id(&self) -> i32 {
        self.body["id"]
            .as_i64()
            .expect("response body should contain 'id'") as i32
    }
}
