use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use otpdesk_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route("/api/code", get(handlers::codes::code_for_secret_handler))
        .route("/api/check-mail", post(handlers::mail::check_mail_handler))
        .route(
            "/api/secrets/validate",
            post(handlers::secrets::validate_secret_handler),
        )
        .route(
            "/api/entries",
            get(handlers::entries::list_entries_handler)
                .post(handlers::entries::create_entry_handler),
        )
        .route(
            "/api/entries/codes",
            get(handlers::codes::dashboard_codes_handler),
        )
        .route(
            "/api/entries/{entry_id}",
            put(handlers::entries::update_entry_handler)
                .delete(handlers::entries::delete_entry_handler),
        )
        .route(
            "/api/entries/{entry_id}/check-mail",
            post(handlers::mail::check_entry_mail_handler),
        )
        .route(
            "/api/principals",
            get(handlers::principals::list_principals_handler),
        )
        .route(
            "/api/principals/{principal_id}/tags",
            put(handlers::principals::update_principal_tags_handler),
        )
        .route("/api/me", get(handlers::principals::me_handler))
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_gateway_principal,
        ));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_same_origin_for_mutations,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
