use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::admin::AdminSite;
use crate::bootstrap::{self, App};
use crate::config::Config;
use crate::db::Store;
use crate::identity::IdentityModel;
use crate::services::{
    AuthService, Mailer, PostService, SeaOrmAuthService, SeaOrmPostService, mailer,
};

mod admin;
pub mod auth;
mod error;
mod posts;
mod system;
mod types;

pub use auth::CurrentAccount;
pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub identity: Arc<IdentityModel>,

    pub admin: Arc<AdminSite>,

    pub auth: Arc<dyn AuthService>,

    pub posts: Arc<dyn PostService>,

    pub start_time: std::time::Instant,
}

#[must_use]
pub fn create_app_state(app: App) -> Arc<AppState> {
    let auth = Arc::new(SeaOrmAuthService::new(
        app.store.clone(),
        Arc::clone(&app.identity),
        app.config.security.clone(),
        app.config.email.clone(),
        Arc::clone(&app.mailer),
    ));
    let posts = Arc::new(SeaOrmPostService::new(app.store.clone()));

    Arc::new(AppState {
        config: app.config,
        store: app.store,
        identity: app.identity,
        admin: app.admin,
        auth,
        posts,
        start_time: std::time::Instant::now(),
    })
}

/// Runs the ordered startup and builds the state, mailing through the
/// configured backend.
pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let mailer = mailer::from_config(&config.email);
    create_app_state_with_mailer(config, mailer).await
}

pub async fn create_app_state_with_mailer(
    config: Config,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<Arc<AppState>> {
    let app = bootstrap::bootstrap(config, mailer).await?;
    Ok(create_app_state(app))
}

pub fn router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            server.session_idle_minutes,
        )));

    let cors_layer = if server.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_allowed_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_router = Router::new()
        .merge(create_protected_router(Arc::clone(&state)))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/password-reset", post(auth::request_password_reset))
        .route(
            "/auth/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .route("/system/health", get(system::health));

    Router::new()
        .nest("/api", api_router)
        .merge(create_admin_router(Arc::clone(&state)))
        .layer(session_layer)
        .with_state(state)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/password", put(auth::change_password))
        .route("/posts", get(posts::list_posts).post(posts::create_post))
        .route_layer(middleware::from_fn_with_state(state, auth::require_login))
}

fn create_admin_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin", get(admin::index))
        .route("/admin/{app}/{model}", get(admin::changelist).post(admin::add))
        .route(
            "/admin/{app}/{model}/{id}",
            get(admin::detail).put(admin::change),
        )
        .route_layer(middleware::from_fn(admin::require_privileged))
        .route_layer(middleware::from_fn_with_state(state, auth::require_login))
}
