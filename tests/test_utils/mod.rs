//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use axum::{Router, body::Body};
use tempfile::TempDir;
use tokio_rusqlite::Connection;

use agenda::api::AppState;
use agenda::api::app;
use agenda::core::AppConfig;
use agenda::core::db::{async_db, initialize_db};
use agenda::google::oauth::{CALENDAR_SERVICE, save_refresh_token};
use agenda::sync::SyncEngineState;

pub const TOKEN_OK: &str =
    r#"{"access_token": "access-xyz", "expires_in": 3599, "token_type": "Bearer"}"#;

/// Application router backed by a database in a temporary directory.
/// The directory is removed when this is dropped.
pub struct TestApp {
    pub router: Router,
    pub db: Connection,
    pub config: AppConfig,
    _dir: TempDir,
}

pub fn test_config(storage_path: &str, google_url: &str) -> AppConfig {
    AppConfig {
        storage_path: storage_path.to_string(),
        db_path: format!("{}/db", storage_path),
        google_client_id: String::from("test_client_id"),
        google_client_secret: String::from("test_client_secret"),
        google_api_url: google_url.to_string(),
        google_token_url: format!("{}/token", google_url),
        google_auth_url: format!("{}/auth", google_url),
        public_hostname: String::from("crm.example.it"),
        calendar_id: String::from("primary"),
        timezone: chrono_tz::Europe::Rome,
        appointment_minutes: 60,
        http_timeout_secs: 5,
    }
}

/// Creates a test application talking to Google at `google_url`
/// (usually a `mockito` server). When `refresh_token` is set the
/// calendar credential is stored before the engine is initialized.
pub async fn test_app(google_url: &str, refresh_token: Option<&str>) -> TestApp {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let storage_path = dir.path().to_str().unwrap().to_string();
    let config = test_config(&storage_path, google_url);
    std::fs::create_dir_all(&config.db_path).expect("Failed to create db directory");

    let db = async_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn).expect("Failed to migrate db");
        Ok(())
    })
    .await
    .unwrap();

    if let Some(refresh_token) = refresh_token {
        save_refresh_token(&db, CALENDAR_SERVICE, refresh_token)
            .await
            .unwrap();
    }

    let calendar = SyncEngineState::initialize(&db, &config).await.unwrap();
    let app_state = AppState::new(db.clone(), config.clone(), calendar);
    TestApp {
        router: app(Arc::new(RwLock::new(app_state))),
        db,
        config,
        _dir: dir,
    }
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_to_json(body: Body) -> serde_json::Value {
    serde_json::from_str(&body_to_string(body).await).unwrap()
}
