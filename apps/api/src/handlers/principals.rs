use axum::Json;
use axum::extract::{Extension, Path, State};
use otpdesk_core::PrincipalId;
use otpdesk_domain::Principal;

use crate::dto::{PrincipalResponse, UpdatePrincipalTagsRequest};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn me_handler(Extension(principal): Extension<Principal>) -> Json<PrincipalResponse> {
    Json(PrincipalResponse::from(principal))
}

pub async fn list_principals_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<PrincipalResponse>>> {
    let principals = state
        .principal_service
        .list(&principal)
        .await?
        .into_iter()
        .map(PrincipalResponse::from)
        .collect();

    Ok(Json(principals))
}

pub async fn update_principal_tags_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(principal_id): Path<String>,
    Json(payload): Json<UpdatePrincipalTagsRequest>,
) -> ApiResult<Json<PrincipalResponse>> {
    let updated = state
        .principal_service
        .update_tags(&principal, &PrincipalId::new(principal_id)?, payload.tags)
        .await?;

    Ok(Json(PrincipalResponse::from(updated)))
}
