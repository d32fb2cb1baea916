use axum::Json;

use crate::dto::{ValidateSecretRequest, ValidateSecretResponse};

pub async fn validate_secret_handler(
    Json(payload): Json<ValidateSecretRequest>,
) -> Json<ValidateSecretResponse> {
    Json(ValidateSecretResponse::for_input(payload.secret.as_str()))
}
