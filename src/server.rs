//!
//! turnstile HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP surface: HTML page routes, the JSON API
//! under `/api`, and static assets.
//!
//! Responsibilities:
//! - Shared application state (credential store, authenticator, session manager, loaders).
//! - Per-request session resolution into a `RequestContext` (token first, then body credentials).
//! - Guarding the members/checkout routes with the access guard.
//! - Startup logging and binding the listener.

use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::{FromRequest, Request, State};
use axum::http::{header, Method};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::identity::{
    guard, token_from_headers, AuthProvider, CredentialStore, DefaultUnauthorized, EmbeddedCredentials,
    IdentitySource, LocalAuthProvider, Loaders, RequestContext, SessionManager, UnauthorizedHandler,
};

pub mod api;
pub mod extract;
pub mod pages;

/// Largest request body the session layer buffers when looking for embedded credentials.
pub const MAX_CREDENTIALS_BODY: usize = 64 * 1024;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub sessions: Arc<SessionManager>,
    pub loaders: Loaders,
    pub unauthorized: Arc<dyn UnauthorizedHandler>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let store = Arc::new(if config.seed_users { CredentialStore::seeded() } else { CredentialStore::new() });
        let auth: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::new(store.clone(), config.min_secret_len));
        let sessions = Arc::new(
            SessionManager::new(config.secret_key.as_bytes(), config.session_ttl)
                .context("While creating the session manager")?
                .with_secure_cookie(config.secure_cookie),
        );
        let loaders = Loaders::new(sessions.clone(), auth.clone(), config.verify_embedded_secret);
        Ok(Self {
            store,
            auth,
            sessions,
            loaders,
            unauthorized: Arc::new(DefaultUnauthorized),
            config: Arc::new(config),
        })
    }

    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.unauthorized = handler;
        self
    }
}

/// Assemble every route over the given state.
pub fn build_router(state: AppState) -> Router {
    let deny = state.unauthorized.clone();
    let static_dir = state.config.static_dir.clone();
    Router::new()
        .route("/", get(pages::home))
        .route("/index.html", get(pages::home))
        .route("/login", get(pages::login_form).post(pages::login_submit))
        .route("/register", get(pages::register_form).post(pages::register_submit))
        .route("/members", guard(get(pages::members), deny.clone()))
        .route("/checkout", guard(get(pages::checkout_form).post(pages::checkout_submit), deny.clone()))
        .route("/logout", get(pages::logout))
        .route("/api/login", post(api::login))
        .route("/api/members", guard(get(api::members), deny.clone()))
        .route("/api/checkout", guard(get(api::checkout_status).post(api::checkout_book), deny))
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(middleware::from_fn_with_state(state.clone(), resolve_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn is_form_body(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

/// Buffer a form body once, pull `email`/`password` out of it, and hand back an equivalent request.
/// Other body types are passed through untouched; JSON bodies never carry an identity.
async fn take_embedded_credentials(req: Request) -> Result<(Request, Option<EmbeddedCredentials>), AppError> {
    if !is_form_body(&req) {
        return Ok((req, None));
    }
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_CREDENTIALS_BODY)
        .await
        .map_err(|e| AppError::malformed(format!("unreadable request body: {}", e)))?;
    let probe = axum::http::Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(bytes.clone()))
        .map_err(|e| AppError::internal(e.to_string()))?;
    let creds = Form::<EmbeddedCredentials>::from_request(probe, &()).await.ok().map(|Form(c)| c);
    Ok((Request::from_parts(parts, Body::from(bytes)), creds))
}

/// Resolve the caller's identity and attach a `RequestContext` to the request.
/// A valid session token wins; credentials embedded in a form body are only consulted without one.
pub async fn resolve_session(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut ctx = RequestContext::anonymous(req.uri().path());
    if let Some(token) = token_from_headers(req.headers()) {
        match state.loaders.token.load(&token) {
            Ok(identity) => {
                ctx.identity = Some(identity);
                ctx.source = IdentitySource::Token;
            }
            Err(e) => {
                debug!(target: "auth", route = %ctx.route, "session token rejected: {}", e);
                ctx.session_error = Some(e);
            }
        }
    }

    let mut req = req;
    if ctx.identity.is_none() && req.method() != Method::GET && req.method() != Method::HEAD {
        match take_embedded_credentials(req).await {
            Ok((rebuilt, creds)) => {
                req = rebuilt;
                if let Some(identity) = creds.and_then(|c| state.loaders.credentials.load(&c)) {
                    ctx.identity = Some(identity);
                    ctx.source = IdentitySource::EmbeddedCredentials;
                }
            }
            Err(e) => return e.into_response(),
        }
    }

    if let Some(user) = ctx.user_id() {
        debug!(target: "auth", route = %ctx.route, user, source = ?ctx.source, "identity resolved");
    }
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn log_startup(config: &ServerConfig) {
    info!(
        target: "startup",
        "turnstile starting: bind={}, static_dir={:?}, session_ttl_secs={}, min_secret_len={}, seed_users={}, secure_cookie={}",
        config.bind_addr(),
        config.static_dir,
        config.session_ttl.as_secs(),
        config.min_secret_len,
        config.seed_users,
        config.secure_cookie
    );
    if config.uses_demo_key() {
        warn!(target: "startup", "using the built-in demo signing key; set TURNSTILE_SECRET_KEY for anything beyond local use");
    }
    if !config.verify_embedded_secret {
        warn!(target: "startup", "form/body credentials are accepted on a known identifier alone (TURNSTILE_VERIFY_EMBEDDED_SECRET=false)");
    }
    if !config.static_dir.exists() {
        warn!(target: "startup", "static folder {:?} does not exist; /static and /favicon.ico will 404", config.static_dir);
    }
}

/// Start the HTTP server with the given configuration and serve until the listener fails.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    log_startup(&config);
    let state = AppState::from_config(config)?;
    info!(target: "startup", users = state.store.len(), "credential store ready");
    let addr = state.config.bind_addr();
    let app = build_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}
