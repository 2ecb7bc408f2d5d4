//! Gist HTTP handlers.

use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use snipstash_core::models::{account::Account, gist::CreateGistRequest};

/// Create a gist from one or more snippets.
///
/// # Returns
/// `201` with `{ "gist": { "id": ... } }`.
///
/// # Errors
/// `400` for an empty snippet list, `404` for an unknown owner account.
pub async fn create_gist(
    State(state): State<AppState>,
    Json(request): Json<CreateGistRequest>,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    store_snippets(&state, None, request).await
}

/// Append snippets to an existing (or not yet existing) gist id.
pub async fn append_to_gist(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<CreateGistRequest>,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    store_snippets(&state, Some(id), request).await
}

async fn store_snippets(
    state: &AppState,
    gist_id: Option<String>,
    request: CreateGistRequest,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    let owner = match request.account.as_deref().map(str::trim) {
        Some(owner) if !owner.is_empty() => {
            Account::find_by_id(state.store.clone(), owner).await?;
            Some(owner)
        }
        _ => None,
    };

    let gist_id = state
        .gists
        .add_snippets(gist_id.as_deref(), &request.snippets, owner)
        .await?;
    tracing::debug!(
        "Stored {} snippet(s) in gist {}",
        request.snippets.len(),
        gist_id
    );
    Ok((StatusCode::CREATED, Json(json!({ "gist": { "id": gist_id } }))))
}

/// Fetch every snippet of a gist.
///
/// # Returns
/// `{ "gist": { "id": ... }, "snippets": { <snippet id>: { fields } } }`.
///
/// Snippets that cannot be read are left out, so an existing gist may
/// answer with an empty map.
///
/// # Errors
/// `404` when the gist does not exist.
pub async fn get_gist(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    if !state.gists.exists(&id).await? {
        return Err(AppError::NotFound("Gist".to_string()).into());
    }
    let snippets = state.gists.get_snippets(&id).await?;
    Ok(Json(json!({ "gist": { "id": id }, "snippets": snippets })))
}
