use std::sync::Arc;

use crate::AppState;

pub mod auth;
pub mod palettes;

pub fn router() -> axum::Router<Arc<AppState>> {
    use axum::routing::{get, post, put};
    axum::Router::new()
        .route("/auth", post(auth::session))
        .route("/palettes", get(palettes::list).post(palettes::create))
        .route(
            "/palettes/:id",
            put(palettes::update).delete(palettes::delete),
        )
        .route("/palettes/:id/rate", post(palettes::rate))
}
