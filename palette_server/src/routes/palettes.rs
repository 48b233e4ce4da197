use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use http::{HeaderMap, StatusCode};
use palette_core::rating::{self, Rating};
use palette_core::{
    Color, Draft, Palette, PaletteId, PalettePatch, Rejection, SLOTS, StoreError, SubmitRule,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(flatten)]
    palette: Palette,
    can_edit: bool,
}

/// `GET /api/palettes`: the whole feed, newest first.
pub async fn list(
    State(ctx): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = ctx.caller(&headers);
    let palettes = ctx.store.lock().list()?;
    let items: Vec<FeedItem> = palettes
        .into_iter()
        .map(|p| FeedItem {
            can_edit: viewer.as_ref().is_some_and(|v| p.is_owned_by(&v.id)),
            palette: p,
        })
        .collect();
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPalette {
    name: String,
    colors: [Color; SLOTS],
    selected_states: [bool; SLOTS],
}

#[derive(Debug, Serialize)]
pub struct Created {
    id: PaletteId,
}

/// Stored palettes obey the editor's full rule: every slot picked, a name.
fn check_complete(p: &Palette) -> Result<(), Rejection> {
    Draft {
        colors: p.colors,
        selected_states: p.selected_states,
        name: p.name.clone(),
        ..Draft::default()
    }
    .check(SubmitRule::AllSlotsSet)
}

/// `POST /api/palettes`.
pub async fn create(
    State(ctx): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<NewPalette>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = ctx.caller(&headers).ok_or(StoreError::Unauthenticated)?;

    let mut palette = Palette::new(body.name.trim(), body.colors);
    palette.selected_states = body.selected_states;
    check_complete(&palette)?;

    let id = ctx.store.lock().create(Some(&caller), palette)?;
    Ok((StatusCode::CREATED, Json(Created { id })))
}

fn parse_id(raw: &str) -> Result<PaletteId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("'{raw}' is not a palette id")))
}

/// `PUT /api/palettes/:id` with a partial palette.
pub async fn update(
    State(ctx): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(mut patch): Json<PalettePatch>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    if patch.is_empty() {
        return Err(ApiError::BadRequest("nothing to update".into()));
    }
    if let Some(name) = patch.name.as_mut() {
        *name = name.trim().to_string();
    }
    let caller = ctx.caller(&headers).ok_or(StoreError::Unauthenticated)?;

    let mut store = ctx.store.lock();
    let mut merged = store.get(id)?;
    if !merged.is_owned_by(&caller.id) {
        return Err(StoreError::NotOwner(id).into());
    }
    patch.apply_to(&mut merged);
    check_complete(&merged)?;

    store.update(Some(&caller), id, patch)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/palettes/:id`.
pub async fn delete(
    State(ctx): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let caller = ctx.caller(&headers);
    ctx.store.lock().delete(caller.as_ref(), id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct Rated {
    rating: Rating,
}

/// `POST /api/palettes/:id/rate`. Rating problems never surface; they score the minimum.
pub async fn rate(
    State(ctx): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let colors = ctx.store.lock().get(id)?.colors;

    let rating = match &ctx.rater {
        Some(model) => rating::rate(model.as_ref(), &colors).await,
        None => {
            tracing::warn!("no rating model configured");
            Rating::FALLBACK
        }
    };
    Ok(Json(Rated { rating }))
}

#[cfg(test)]
mod tests {
    use crate::AppState;
    use crate::routes::testing::{call, signup, state};
    use async_trait::async_trait;
    use http::StatusCode;
    use palette_core::{Accounts, MemoryStore, TextGenerator};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn sunset() -> Value {
        json!({
            "name": "Sunset",
            "colors": ["#AA0000", "#00AA00", "#0000AA", "#FFFF00", "#00FFFF"],
            "selectedStates": [true, true, true, true, true],
        })
    }

    async fn create(st: &Arc<AppState>, token: &str) -> String {
        let (status, body) = call(st, "POST", "/api/palettes", Some(token), Some(sunset())).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn create_then_list() {
        let st = state();
        let token = signup(&st, "a@x.io").await;
        let id = create(&st, &token).await;

        let (status, body) = call(&st, "GET", "/api/palettes", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], id.as_str());
        assert_eq!(body[0]["name"], "Sunset");
        assert_eq!(body[0]["colors"][0], "#AA0000");
        assert_eq!(body[0]["canEdit"], true);

        let (_, anon) = call(&st, "GET", "/api/palettes", None, None).await;
        assert_eq!(anon[0]["canEdit"], false);
    }

    #[tokio::test]
    async fn signed_out_create_is_unauthorized() {
        let st = state();
        let (status, _) = call(&st, "POST", "/api/palettes", None, Some(sunset())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn incomplete_palette_is_unprocessable() {
        let st = state();
        let token = signup(&st, "a@x.io").await;
        let mut body = sunset();
        body["selectedStates"][4] = json!(false);
        let (status, _) = call(&st, "POST", "/api/palettes", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn only_owner_may_update() {
        let st = state();
        let a = signup(&st, "a@x.io").await;
        let b = signup(&st, "b@x.io").await;
        let id = create(&st, &a).await;
        let uri = format!("/api/palettes/{id}");

        let (status, _) = call(&st, "PUT", &uri, Some(&b), Some(json!({"name": "Mine now"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = call(&st, "PUT", &uri, Some(&a), Some(json!({"name": " Dusk "}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, body) = call(&st, "GET", "/api/palettes", None, None).await;
        assert_eq!(body[0]["name"], "Dusk");
    }

    #[tokio::test]
    async fn update_cannot_unset_slots() {
        let st = state();
        let a = signup(&st, "a@x.io").await;
        let id = create(&st, &a).await;
        let uri = format!("/api/palettes/{id}");

        let cleared = json!({"selectedStates": [false, false, false, false, false]});
        let (status, _) = call(&st, "PUT", &uri, Some(&a), Some(cleared)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (_, body) = call(&st, "GET", "/api/palettes", None, None).await;
        assert_eq!(body[0]["selectedStates"], json!([true, true, true, true, true]));
    }

    #[tokio::test]
    async fn signed_out_incomplete_create_is_unauthorized() {
        let st = state();
        let mut body = sunset();
        body["selectedStates"][0] = json!(false);
        let (status, _) = call(&st, "POST", "/api/palettes", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_then_missing() {
        let st = state();
        let a = signup(&st, "a@x.io").await;
        let id = create(&st, &a).await;
        let uri = format!("/api/palettes/{id}");

        let (status, _) = call(&st, "DELETE", &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&st, "DELETE", &uri, Some(&a), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&st, "DELETE", &uri, Some(&a), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_id_is_bad_request() {
        let st = state();
        let a = signup(&st, "a@x.io").await;
        let (status, _) = call(&st, "DELETE", "/api/palettes/not-a-uuid", Some(&a), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rating_without_model_falls_back() {
        let st = state();
        let a = signup(&st, "a@x.io").await;
        let id = create(&st, &a).await;
        let (status, body) = call(&st, "POST", &format!("/api/palettes/{id}/rate"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"rating": 1}));
    }

    struct AlwaysThree;

    #[async_trait]
    impl TextGenerator for AlwaysThree {
        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("3".into())
        }
    }

    #[tokio::test]
    async fn rating_uses_configured_model() {
        let st = AppState::new(
            MemoryStore::new(),
            Accounts::in_memory(),
            Some(Arc::new(AlwaysThree)),
        );
        let a = signup(&st, "a@x.io").await;
        let id = create(&st, &a).await;
        let (_, body) = call(&st, "POST", &format!("/api/palettes/{id}/rate"), None, None).await;
        assert_eq!(body, json!({"rating": 3}));
    }
}
