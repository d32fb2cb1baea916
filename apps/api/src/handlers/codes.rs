use axum::Json;
use axum::extract::{Extension, Query, State};
use chrono::Utc;
use otpdesk_core::AppError;
use otpdesk_domain::Principal;

use crate::dto::{CodeQuery, CodeResponse, DashboardCodeResponse};
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn code_for_secret_handler(
    State(state): State<AppState>,
    Query(query): Query<CodeQuery>,
) -> ApiResult<Json<CodeResponse>> {
    let secret = query
        .secret
        .ok_or_else(|| AppError::InvalidSecret("secret query parameter is required".to_owned()))?;
    let generated = state
        .code_service
        .code_for_raw(secret.as_str(), Utc::now())?;

    Ok(Json(CodeResponse::from(generated)))
}

pub async fn dashboard_codes_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<Json<Vec<DashboardCodeResponse>>> {
    let codes = state
        .code_service
        .dashboard_codes(&principal, Utc::now())
        .await?
        .into_iter()
        .map(DashboardCodeResponse::from)
        .collect();

    Ok(Json(codes))
}
