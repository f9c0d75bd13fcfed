//! Session middleware for axum
//!
//! Attaches a [`Principal`] to every request. Requests without a known
//! session token are passed on as anonymous; handlers and the ingest
//! pipeline decide what an anonymous caller may do.

use std::sync::Arc;

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use scorm_core::{Principal, SessionResolver, StaticSessions};

/// Cookie carrying the session token set by the launching platform
pub const SESSION_COOKIE: &str = "scorm_session";

/// Authentication layer state
#[derive(Clone)]
pub struct AuthLayer {
    sessions: Arc<dyn SessionResolver>,
}

impl AuthLayer {
    pub fn new(sessions: Arc<dyn SessionResolver>) -> Self {
        Self { sessions }
    }

    /// A layer that knows no sessions; every request is anonymous
    pub fn disabled() -> Self {
        Self {
            sessions: Arc::new(StaticSessions::default()),
        }
    }
}

/// Extract the session token from a bearer header or the session cookie
fn extract_token(request: &Request) -> Option<String> {
    if let Some(value) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token.trim().to_string());
    }

    let cookies = request.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(&format!("{SESSION_COOKIE}=")))
        .map(str::to_string)
}

/// Authentication middleware function
pub async fn auth_middleware(
    axum::Extension(auth_layer): axum::Extension<AuthLayer>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = match extract_token(&request) {
        Some(token) => match auth_layer.sessions.resolve(&token).await {
            Some(user) => Principal::User { user },
            None => {
                tracing::debug!("Unknown session token");
                Principal::Anonymous
            }
        },
        None => Principal::Anonymous,
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}
