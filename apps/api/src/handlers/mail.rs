use axum::Json;
use axum::extract::{Extension, Path, State};
use otpdesk_application::MailCheckRequest;
use otpdesk_domain::{CredentialEntryId, Principal};
use uuid::Uuid;

use crate::dto::{CheckMailRequest, CheckMailResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn check_mail_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CheckMailRequest>,
) -> ApiResult<Json<CheckMailResponse>> {
    let (provider_name, settings) = payload.into_parts()?;

    let outcome = state
        .mail_code_service
        .check_explicit(
            &principal,
            MailCheckRequest {
                provider_name,
                settings,
            },
        )
        .await?;

    Ok(Json(CheckMailResponse::from(outcome)))
}

pub async fn check_entry_mail_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(entry_id): Path<Uuid>,
) -> ApiResult<Json<CheckMailResponse>> {
    let outcome = state
        .mail_code_service
        .check_entry(&principal, CredentialEntryId::from_uuid(entry_id))
        .await?;

    Ok(Json(CheckMailResponse::from(outcome)))
}
