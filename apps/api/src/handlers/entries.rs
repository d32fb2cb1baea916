use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use otpdesk_domain::{CredentialEntryId, Principal};
use uuid::Uuid;

use crate::dto::{EntryResponse, SaveEntryRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_entries_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<EntryResponse>>> {
    let entries = state
        .credential_service
        .list_visible(&principal)
        .await?
        .into_iter()
        .map(EntryResponse::from)
        .collect();

    Ok(Json(entries))
}

pub async fn create_entry_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<SaveEntryRequest>,
) -> ApiResult<(StatusCode, Json<EntryResponse>)> {
    let entry = state
        .credential_service
        .create(&principal, payload.into_input(None)?)
        .await?;

    Ok((StatusCode::CREATED, Json(EntryResponse::from(entry))))
}

pub async fn update_entry_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(entry_id): Path<Uuid>,
    Json(payload): Json<SaveEntryRequest>,
) -> ApiResult<Json<EntryResponse>> {
    let id = CredentialEntryId::from_uuid(entry_id);
    let current = state.credential_service.get(&principal, id).await?;
    let input = payload.into_input(Some(current.channel()))?;

    let entry = state
        .credential_service
        .update(&principal, id, input)
        .await?;

    Ok(Json(EntryResponse::from(entry)))
}

pub async fn delete_entry_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .credential_service
        .delete(&principal, CredentialEntryId::from_uuid(entry_id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
