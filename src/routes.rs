use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use std::any::Any;
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::TokenKeys;
use crate::config::AppConfig;
use crate::database::Stores;
use crate::error::ApiError;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{require_admin, require_auth};
use crate::services::{
    AdminService, AuthService, CredentialStore, NotificationDispatcher, Notifier, OtpLedger, TokenLedger,
};

/// Everything a handler can reach. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub auth: AuthService,
    pub admin: AdminService,
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores, notifier: Arc<dyn Notifier>) -> Self {
        let keys = Arc::new(TokenKeys::from_config(&config.security));
        let tokens = TokenLedger::new(
            keys,
            stores.tokens.clone(),
            stores.users.clone(),
            chrono::Duration::days(config.security.ledger_ttl_days),
        );
        let otps = OtpLedger::new(stores.otps.clone(), config.otp.clone());
        let dispatcher = NotificationDispatcher::from_config(notifier, &config.email);

        let auth = AuthService::new(
            CredentialStore::new(stores.users.clone()),
            tokens,
            otps.clone(),
            dispatcher,
        );
        let admin = AdminService::new(stores.users.clone(), otps);

        Self {
            config: Arc::new(config),
            stores,
            auth,
            admin,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(public::root::root))
        .route("/health", get(public::root::health))
        .nest(
            "/api/auth",
            auth_public_routes()
                .merge(auth_protected_routes(&state))
                .merge(instructor_routes(&state)),
        )
        .nest("/api/admin", admin_routes(&state))
        .merge(learner_routes(&state))
        .fallback(not_found)
        .with_state(state)
        // Global middleware
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/signup", post(auth::signup_post))
        .route("/signup/student", post(auth::signup_post))
        .route("/login", post(auth::login_post))
        .route("/admin/login", post(auth::login_post))
        .route("/forgot-password", post(auth::forgot_password_post))
        .route("/verify-otp-login", post(auth::verify_otp_login_post))
        .route("/refresh-token", post(auth::refresh_post))
}

fn auth_protected_routes(state: &AppState) -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/set-password", post(auth::set_password_post))
        .route("/reset-password", post(auth::reset_password_post))
        .route("/reset-password-forgot", post(auth::reset_password_forgot_post))
        .route("/logout", post(auth::logout_post))
        .route("/me", get(auth::me_get))
        .route("/complete-profile", put(auth::complete_profile_put))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn instructor_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/create-instructor", post(elevated::admin::create_instructor_post))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    use elevated::admin;

    Router::new()
        .route("/users", get(admin::user_list))
        .route(
            "/users/:id",
            get(admin::user_get).delete(admin::user_delete).patch(admin::user_update),
        )
        .route("/users/:id/status", patch(admin::user_status))
        .route("/users/:id/deactivate", patch(admin::user_deactivate))
        .route("/users/:id/activate", patch(admin::user_activate))
        .route("/dashboard/stats", get(admin::stats_get))
        .route("/otps", get(admin::otps_get))
        // Layers run bottom-up: authenticate, then check the capability
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn learner_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/enrollments/me", get(protected::enrollments::my_enrollments_get))
        .route("/api/payments/key", get(protected::payments::key_get))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

/// Credentialed CORS for the configured origins; any origin in development when none are set
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    let error = ApiError::internal_server_error("An error occurred while processing your request");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(error.to_json())).into_response()
}
