use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::{auth::AuthenticatedUser, state::AppState};

pub mod attachments;
pub mod audit_logs;
pub mod auth;
pub mod contracts;
pub mod fields;
pub mod health;
pub mod settings;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let contracts_routes = Router::new()
        .route(
            "/",
            get(contracts::list_contracts).post(contracts::create_contract),
        )
        .route("/stats", get(contracts::contract_stats))
        .route("/expiring", get(contracts::expiring_contracts))
        .route("/unprocessed", get(contracts::unprocessed_contracts))
        .route("/export", get(contracts::export_contracts))
        .route("/import", post(contracts::import_contracts))
        .route(
            "/:id",
            get(contracts::get_contract)
                .put(contracts::update_contract)
                .delete(contracts::delete_contract),
        )
        .route("/:id/process", put(contracts::process_contract))
        .route(
            "/:id/attachments",
            get(attachments::list_attachments).post(attachments::upload_attachment),
        );

    let attachments_routes = Router::new()
        .route("/:id", delete(attachments::delete_attachment))
        .route("/:id/download", get(attachments::download_attachment));

    let fields_routes = Router::new()
        .route("/", get(fields::list_fields).post(fields::create_field))
        .route(
            "/:id",
            patch(fields::update_field).delete(fields::delete_field),
        );

    let audit_routes = Router::new().route("/", get(audit_logs::list_audit_logs));

    let settings_routes = Router::new()
        .route("/", get(settings::get_settings))
        .route(
            "/smtp",
            get(settings::get_smtp_settings).put(settings::update_smtp_settings),
        )
        .route(
            "/reminders",
            get(settings::get_reminder_settings).put(settings::update_reminder_settings),
        );

    let users_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route("/me", patch(users::update_profile))
        .route("/me/password", post(users::change_password))
        .route(
            "/:id",
            patch(users::update_user).delete(users::delete_user),
        );

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/contracts", contracts_routes)
        .nest("/api/attachments", attachments_routes)
        .nest("/api/fields", fields_routes)
        .nest("/api/audit-logs", audit_routes)
        .nest("/api/settings", settings_routes)
        .nest("/api/users", users_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    Router::new()
        .merge(protected_routes)
        .nest("/api/auth", auth_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024 * 50))
}
