use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::Response;
use otpdesk_core::{AppError, AppResult, PrincipalId};
use subtle::ConstantTimeEq;

use crate::error::ApiResult;
use crate::state::AppState;

pub const PRINCIPAL_ID_HEADER: &str = "x-principal-id";
pub const PRINCIPAL_EMAIL_HEADER: &str = "x-principal-email";

/// Resolves the principal asserted by the identity gateway.
///
/// The gateway proves itself with the shared bearer secret; the principal
/// headers are trusted only behind it.
pub async fn require_gateway_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let headers = request.headers();
    verify_gateway_secret(headers, state.gateway_shared_secret.as_str())?;

    let principal_id = headers
        .get(PRINCIPAL_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("principal header is missing".to_owned()))
        .and_then(PrincipalId::new)?;
    let email = headers
        .get(PRINCIPAL_EMAIL_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let principal = state
        .principal_service
        .authenticate_or_enroll(&principal_id, email.as_deref())
        .await?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

pub async fn require_same_origin_for_mutations(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    if is_state_changing_method(request.method()) {
        verify_same_origin(request.headers(), state.frontend_url.as_str())?;
    }

    Ok(next.run(request).await)
}

fn verify_gateway_secret(headers: &HeaderMap, expected: &str) -> AppResult<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("gateway credentials are missing".to_owned()))?;

    if !bool::from(presented.trim().as_bytes().ct_eq(expected.as_bytes())) {
        return Err(AppError::Unauthorized(
            "gateway credentials are invalid".to_owned(),
        ));
    }

    Ok(())
}

fn verify_same_origin(headers: &HeaderMap, allowed_origin: &str) -> AppResult<()> {
    if let Some(fetch_site) = headers.get("sec-fetch-site")
        && fetch_site == HeaderValue::from_static("cross-site")
    {
        return Err(AppError::Unauthorized("cross-site request blocked".to_owned()));
    }

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let referer = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let origin_is_allowed = origin == allowed_origin;
    let referer_is_allowed = referer.starts_with(allowed_origin);

    if !origin_is_allowed && !referer_is_allowed {
        return Err(AppError::Unauthorized("origin validation failed".to_owned()));
    }

    Ok(())
}

fn is_state_changing_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}
