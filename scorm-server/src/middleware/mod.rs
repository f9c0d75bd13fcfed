//! Request middleware

mod auth;

pub use auth::{AuthLayer, SESSION_COOKIE, auth_middleware};
