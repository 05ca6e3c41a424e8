#![allow(dead_code)]

/// Shared helpers for driving the full router in-process
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use campus_report::{
    config::{
        AuthConfig, BootstrapConfig, LoggingConfig, PortalConfig, ServiceConfig, StorageConfig,
    },
    context::AppContext,
    db,
    server::build_router,
};
use serde_json::Value;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@ktu.edu.gh";
pub const ADMIN_PASSWORD: &str = "admin123";

pub struct TestPortal {
    pub ctx: AppContext,
    pub router: Router,
}

impl TestPortal {
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Log in over HTTP and return the session cookie pair
    pub async fn login(&self, email: &str, password: &str) -> String {
        let body = format!(
            "email={}&password={}",
            urlencoding::encode(email),
            urlencoding::encode(password)
        );
        let response = self.send(post_form("/login", &body, None)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        session_cookie(&response).expect("login should set a session cookie")
    }
}

fn test_config() -> PortalConfig {
    PortalConfig {
        service: ServiceConfig {
            hostname: "127.0.0.1".to_string(),
            port: 0,
        },
        storage: StorageConfig {
            data_directory: "./data".into(),
            database: "./data/unused.sqlite".into(),
        },
        authentication: AuthConfig {
            session_secret: "test-secret-".repeat(6),
            session_ttl_hours: 24,
            secure_cookies: false,
            institutional_domain: "ktu.edu.gh".to_string(),
        },
        bootstrap: BootstrapConfig {
            admin_email: ADMIN_EMAIL.to_string(),
            admin_password: None,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            json: false,
        },
    }
}

/// Fresh portal over an in-memory database with a super-admin account
pub async fn portal() -> TestPortal {
    let pool = db::memory_pool().await.unwrap();
    db::ensure_schema(&pool).await.unwrap();

    let ctx = AppContext::with_pool(test_config(), pool);
    ctx.account_manager
        .ensure_super_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap();

    let router = build_router(ctx.clone());
    TestPortal { ctx, router }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// `name=value` of a cookie set by the response
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    set_cookie(response, "portal_session")
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

pub fn alice_registration() -> String {
    [
        "full_name=Alice+Mensah",
        "email=alice%40ktu.edu.gh",
        "index_number=CS2024001",
        "level=200",
        "gender=Female",
        "password=secret1",
        "confirm_password=secret1",
    ]
    .join("&")
}
