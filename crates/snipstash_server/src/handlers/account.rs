//! Account HTTP handlers.

use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use snipstash_core::models::account::{Account, CreateAccountRequest};

/// Register an account.
///
/// # Returns
/// `201` with `{ "account": { "id", "name" } }`.
///
/// # Errors
/// `405` when the name is taken, `400` for a blank name.
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Value>), HttpError> {
    let mut account = Account::register(
        state.store.clone(),
        &request.name,
        &request.password,
        state.config.password_cost,
    )
    .await?;
    let id = account.id().await?;
    let name = account.name().await?;
    tracing::info!("Registered account {}", id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "account": { "id": id, "name": name } })),
    ))
}

/// Account details with created and bookmarked gist ids.
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    let mut account = Account::find_by_id(state.store.clone(), &id).await?;
    let name = account.name().await?;
    let mut gists = account.created_gists().await?;
    let mut marked = account.marked_gists().await?;
    gists.sort_unstable();
    marked.sort_unstable();
    Ok(Json(json!({
        "account": { "id": id, "name": name },
        "gists": gists,
        "marked": marked,
    })))
}

/// Rotate an account id.
pub async fn reset_account_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, HttpError> {
    let mut account = Account::find_by_id(state.store.clone(), &id).await?;
    let new_id = account.reset_id().await?;
    let name = account.name().await?;
    Ok(Json(json!({ "account": { "id": new_id, "name": name } })))
}

/// Bookmark a gist for an account.
///
/// # Errors
/// `404` when either the account or the gist does not exist.
pub async fn mark_gist(
    State(state): State<AppState>,
    Path((id, gist_id)): Path<(String, String)>,
) -> Result<Json<Value>, HttpError> {
    let mut account = Account::find_by_id(state.store.clone(), &id).await?;
    if !account.mark_gist(&state.gists, &gist_id).await? {
        return Err(AppError::NotFound("Gist".to_string()).into());
    }
    Ok(Json(json!({
        "account": { "id": id },
        "gist": { "id": gist_id },
    })))
}
