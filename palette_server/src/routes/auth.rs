use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use http::{HeaderMap, StatusCode};
use palette_core::{AuthError, IdentityProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{AppState, bearer_token};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    action: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    is_logged_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SessionResponse {
    fn done(is_logged_in: bool, token: Option<String>) -> Self {
        Self {
            success: Some(true),
            is_logged_in,
            token,
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            success: Some(false),
            is_logged_in: false,
            token: None,
            error: Some(error.to_string()),
        }
    }
}

/// `POST /api/auth` with `{action: login|signup|logout|check}`.
///
/// Login state is derived from the request's bearer token every time; the
/// server keeps no "logged in" flag of its own.
pub async fn session(
    State(ctx): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SessionRequest>,
) -> Response {
    match req.action.as_str() {
        "login" | "signup" => {
            let (Some(email), Some(password)) = (req.email.as_deref(), req.password.as_deref())
            else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(SessionResponse::failed("email and password are required")),
                )
                    .into_response();
            };

            let mut accounts = ctx.accounts.lock();
            if req.action == "signup" {
                if let Err(e) = accounts.sign_up(email, password) {
                    return auth_failure(e);
                }
            }
            match accounts.login(email, password) {
                Ok((identity, token)) => {
                    tracing::info!(identity = %identity.id, "signed in");
                    Json(SessionResponse::done(true, Some(token))).into_response()
                }
                Err(e) => auth_failure(e),
            }
        }
        "logout" => {
            if let Some(token) = bearer_token(&headers) {
                ctx.accounts.lock().revoke(&token);
            }
            Json(SessionResponse::done(false, None)).into_response()
        }
        "check" => Json(SessionResponse {
            success: None,
            is_logged_in: ctx.caller(&headers).is_some(),
            token: None,
            error: None,
        })
        .into_response(),
        other => {
            tracing::debug!(action = other, "unknown session action");
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "success": false })),
            )
                .into_response()
        }
    }
}

fn auth_failure(e: AuthError) -> Response {
    let status = match &e {
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::EmailTaken(_) => StatusCode::CONFLICT,
        AuthError::InvalidEmail(_) | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::Storage(err) => {
            tracing::error!(error = %format!("{err:#}"), "account storage failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(SessionResponse::failed(e))).into_response()
}
