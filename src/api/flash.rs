/// One-shot flash messages carried across a redirect
///
/// Form posts answer with `303 See Other` plus an unsigned, display-only
/// `flash` cookie. The next `GET /login` (or any page that calls
/// [`take_flash`]) reads and clears it.
use crate::error::{PortalError, GENERIC_FAILURE};
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Serialize;

pub const FLASH_COOKIE: &str = "flash";

/// Flash severity, matching the notification palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Info,
    Danger,
}

impl FlashKind {
    fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Info => "info",
            FlashKind::Danger => "danger",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FlashKind::Success),
            "info" => Some(FlashKind::Info),
            "danger" => Some(FlashKind::Danger),
            _ => None,
        }
    }
}

/// Message read back from the flash cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

/// `303` redirect carrying a flash message
#[derive(Debug, Clone)]
pub struct FlashRedirect {
    to: String,
    flash: Flash,
}

impl FlashRedirect {
    pub fn new(kind: FlashKind, to: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            flash: Flash {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn success(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, to, message)
    }

    pub fn info(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashKind::Info, to, message)
    }

    pub fn danger(to: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FlashKind::Danger, to, message)
    }
}

fn flash_cookie(flash: &Flash) -> Cookie<'static> {
    let value = urlencoding::encode(&format!("{}:{}", flash.kind.as_str(), flash.message)).into_owned();
    Cookie::build((FLASH_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::SEE_OTHER.into_response();
        let headers = response.headers_mut();

        match HeaderValue::from_str(&self.to) {
            Ok(location) => {
                headers.insert(header::LOCATION, location);
            }
            Err(_) => {
                headers.insert(header::LOCATION, HeaderValue::from_static("/"));
            }
        }
        if let Ok(cookie) = HeaderValue::from_str(&flash_cookie(&self.flash).to_string()) {
            headers.append(header::SET_COOKIE, cookie);
        }

        response
    }
}

/// Read the pending flash message, returning the jar with the cookie removed
pub fn take_flash(headers: &HeaderMap) -> (CookieJar, Option<Flash>) {
    let jar = CookieJar::from_headers(headers);

    let flash = jar.get(FLASH_COOKIE).and_then(|cookie| {
        let decoded = urlencoding::decode(cookie.value()).ok()?;
        let (kind, message) = decoded.split_once(':')?;
        Some(Flash {
            kind: FlashKind::parse(kind)?,
            message: message.to_string(),
        })
    });

    let jar = if flash.is_some() {
        jar.remove(Cookie::build(FLASH_COOKIE).path("/"))
    } else {
        jar
    };

    (jar, flash)
}

/// Error from a form handler.
///
/// Persistence failures redirect back to the form with the generic failure
/// message; every other error renders as usual.
#[derive(Debug)]
pub struct FormError {
    error: PortalError,
    back: Option<String>,
}

impl From<PortalError> for FormError {
    fn from(error: PortalError) -> Self {
        Self { error, back: None }
    }
}

impl IntoResponse for FormError {
    fn into_response(self) -> Response {
        match self.back {
            Some(back) if self.error.is_persistence() => {
                tracing::error!(error = %self.error, "form submission failed");
                FlashRedirect::danger(back, GENERIC_FAILURE).into_response()
            }
            _ => self.error.into_response(),
        }
    }
}

/// Attach the page a failed form should return to
pub trait FormResultExt<T> {
    fn back_to(self, to: impl Into<String>) -> Result<T, FormError>;
}

impl<T> FormResultExt<T> for Result<T, PortalError> {
    fn back_to(self, to: impl Into<String>) -> Result<T, FormError> {
        self.map_err(|error| FormError {
            error,
            back: Some(to.into()),
        })
    }
}
