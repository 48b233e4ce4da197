use axum::Json;
use axum::response::{IntoResponse, Response};
use headers::authorization::Bearer;
use headers::{Authorization, HeaderMapExt};
use http::{HeaderMap, StatusCode};
use palette_core::{Accounts, Identity, PaletteStore, Rejection, StoreError, TextGenerator};
use parking_lot::Mutex;
use std::sync::Arc;

pub mod routes;

/// Everything the handlers share. Locks are never held across an `.await`.
pub struct AppState {
    pub store: Mutex<Box<dyn PaletteStore + Send>>,
    pub accounts: Mutex<Accounts>,
    /// `None` when no rating key is configured; ratings then fall back.
    pub rater: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    pub fn new(
        store: impl PaletteStore + Send + 'static,
        accounts: Accounts,
        rater: Option<Arc<dyn TextGenerator>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(Box::new(store)),
            accounts: Mutex::new(accounts),
            rater,
        })
    }

    /// Who is making this request, according to its bearer token.
    pub fn caller(&self, headers: &HeaderMap) -> Option<Identity> {
        let token = bearer_token(headers)?;
        self.accounts.lock().identity_for_token(&token)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(b)| b.token().to_owned())
}

pub fn router(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .nest("/api", routes::router())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Store(StoreError),
    Rejected(Rejection),
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<Rejection> for ApiError {
    fn from(r: Rejection) -> Self {
        ApiError::Rejected(r)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::Store(e) => {
                let status = match &e {
                    StoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    StoreError::NotOwner(_) => StatusCode::FORBIDDEN,
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    StoreError::Persist(err) => {
                        tracing::error!(error = %format!("{err:#}"), "store failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.to_string())
            }
            ApiError::Rejected(r) => (StatusCode::UNPROCESSABLE_ENTITY, r.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}
