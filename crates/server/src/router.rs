use super::{audit, handlers, state::AppState};
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use handlers::{
    activity, auth_handlers, files, general, modules, pages, public, sections, settings,
    suggestions, templates, users, versions,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match frontend_url.map(HeaderValue::from_str) {
        Some(Ok(origin)) => base
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        Some(Err(e)) => {
            warn!(error = %e, "Invalid frontend_url, allowing any origin");
            base.allow_origin(Any)
        }
        None => base.allow_origin(Any),
    }
}

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    let max_upload = app_state.config.max_upload_bytes;
    let cors = cors_layer(app_state.config.frontend_url.as_deref());

    Router::new()
        .route("/", get(general::root))
        .route("/api/health", get(general::health_check))
        // Auth
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/register", post(auth_handlers::register))
        .route("/api/auth/me", get(auth_handlers::me))
        // Sections
        .route("/api/sections", get(sections::list).post(sections::create))
        .route("/api/sections/tree", get(sections::tree))
        .route("/api/sections/reorder", patch(sections::reorder))
        .route("/api/sections/slug/{slug}", get(sections::get_by_slug))
        .route(
            "/api/sections/{id}",
            get(sections::get)
                .patch(sections::update)
                .delete(sections::delete),
        )
        // Pages
        .route("/api/pages", get(pages::list).post(pages::create))
        .route("/api/pages/admin/trashed", get(pages::list_trashed))
        .route("/api/pages/slug/{slug}", get(pages::get_by_slug))
        .route(
            "/api/pages/{id}",
            get(pages::get).patch(pages::update).delete(pages::trash),
        )
        .route("/api/pages/{id}/publish", patch(pages::publish))
        .route("/api/pages/{id}/archive", patch(pages::archive))
        .route("/api/pages/{id}/submit-review", patch(pages::submit_review))
        .route("/api/pages/{id}/approve", patch(pages::approve))
        .route("/api/pages/{id}/reject", patch(pages::reject))
        .route("/api/pages/{id}/restore", patch(pages::restore))
        .route(
            "/api/pages/{id}/permanent",
            axum::routing::delete(pages::permanent_delete),
        )
        .route("/api/pages/{id}/duplicate", post(pages::duplicate))
        // Versions
        .route("/api/pages/{id}/snapshot", post(versions::snapshot))
        .route("/api/pages/{id}/versions", get(versions::list))
        .route("/api/pages/{id}/versions/{version_id}", get(versions::get))
        .route(
            "/api/pages/{id}/versions/{version_id}/restore",
            post(versions::restore),
        )
        // Modules
        .route("/api/modules", get(modules::list).post(modules::create))
        .route("/api/modules/reorder/{page_id}", patch(modules::reorder))
        .route(
            "/api/modules/{id}",
            get(modules::get)
                .patch(modules::update)
                .delete(modules::delete),
        )
        // Users
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/{id}", get(users::get).patch(users::update))
        .route(
            "/api/users/{id}/roles",
            patch(users::assign_role).put(users::replace_roles),
        )
        .route(
            "/api/users/{id}/roles/{role}",
            axum::routing::delete(users::remove_role),
        )
        .route("/api/users/{id}/activate", patch(users::activate))
        .route("/api/users/{id}/deactivate", patch(users::deactivate))
        // Settings
        .route("/api/settings", get(settings::list))
        .route("/api/settings/{key}", get(settings::get).patch(settings::upsert))
        // Suggestions
        .route(
            "/api/suggestions",
            get(suggestions::list).post(suggestions::create),
        )
        .route(
            "/api/suggestions/{id}",
            get(suggestions::get)
                .patch(suggestions::update)
                .delete(suggestions::delete),
        )
        // Templates
        .route("/api/templates", get(templates::list).post(templates::create))
        .route(
            "/api/templates/{id}",
            get(templates::get)
                .patch(templates::update)
                .delete(templates::delete),
        )
        // Activity
        .route("/api/activity", get(activity::list))
        .route("/api/activity/audit", get(activity::list_audit))
        // Files
        .route(
            "/api/files/upload",
            post(files::upload).layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/api/files/static/{filename}", get(files::serve_static))
        .route("/api/files/{module_id}", get(files::serve_module_file))
        // Public reader API
        .route("/api/public/pages", get(public::published))
        .route("/api/public/pages/recent", get(public::recent))
        .route("/api/public/pages/{slug}", get(public::page))
        .route("/api/public/sections/{slug}", get(public::section))
        .route("/api/public/search", get(public::search))
        // Runs after routing so the audit entry can use the route template.
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            audit::record_audit,
        ))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

