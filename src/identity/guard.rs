use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Json;
use serde_json::json;
use tracing::{debug, info};

use super::request_context::RequestContext;
use crate::render;

/// Produces the response for a guarded route hit without an identity.
pub trait UnauthorizedHandler: Send + Sync {
    fn respond(&self, ctx: &RequestContext) -> Response;
}

/// 403 everywhere; JSON under `/api/`, the rendered "Access Denied" page otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUnauthorized;

impl UnauthorizedHandler for DefaultUnauthorized {
    fn respond(&self, ctx: &RequestContext) -> Response {
        if ctx.route.starts_with("/api/") {
            (StatusCode::FORBIDDEN, Json(json!({ "err": true, "msg": "unauthorized" }))).into_response()
        } else {
            (StatusCode::FORBIDDEN, Html(render::unauthorized_page())).into_response()
        }
    }
}

pub async fn require_identity(
    State(unauthorized): State<Arc<dyn UnauthorizedHandler>>,
    mut req: Request,
    next: Next,
) -> Response {
    let mut ctx = req
        .extensions_mut()
        .remove::<RequestContext>()
        .unwrap_or_else(|| RequestContext::anonymous(req.uri().path()));
    ctx.requires_auth = true;
    if ctx.is_authenticated() {
        debug!(target: "auth", route = %ctx.route, user = ?ctx.user_id(), source = ?ctx.source, "guarded route admitted");
        req.extensions_mut().insert(ctx);
        return next.run(req).await;
    }
    info!(
        target: "auth",
        route = %ctx.route,
        session_error = ?ctx.session_error,
        "access denied: no identity on guarded route"
    );
    unauthorized.respond(&ctx)
}

/// Wrap a method router so every handler in it requires an identity.
pub fn guard<S>(router: MethodRouter<S>, unauthorized: Arc<dyn UnauthorizedHandler>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(unauthorized, require_identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn app(calls: Arc<AtomicUsize>, identity: Option<Identity>) -> Router {
        let handler = move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                "secret content"
            }
        };
        Router::new()
            .route("/members", guard(get(handler.clone()), Arc::new(DefaultUnauthorized)))
            .route("/api/members", guard(get(handler), Arc::new(DefaultUnauthorized)))
            .layer(middleware::from_fn(move |mut req: Request, next: Next| {
                let identity = identity.clone();
                async move {
                    let mut ctx = RequestContext::anonymous(req.uri().path());
                    ctx.identity = identity;
                    req.extensions_mut().insert(ctx);
                    next.run(req).await
                }
            }))
    }

    async fn body_string(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_request_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resp = app(calls.clone(), None)
            .oneshot(axum::http::Request::builder().uri("/members").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_string(resp).await;
        assert!(body.contains("Access Denied"));
        assert!(!body.contains("secret content"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn api_routes_get_json_denial() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resp = app(calls.clone(), None)
            .oneshot(axum::http::Request::builder().uri("/api/members").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let v: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(v["err"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn identity_passes_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resp = app(calls.clone(), Some(Identity::new("admin")))
            .oneshot(axum::http::Request::builder().uri("/members").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_string(resp).await, "secret content");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn custom_unauthorized_handler_is_used() {
        struct Teapot;
        impl UnauthorizedHandler for Teapot {
            fn respond(&self, _ctx: &RequestContext) -> Response { StatusCode::IM_A_TEAPOT.into_response() }
        }
        let app = Router::new().route("/x", guard(get(|| async { "hidden" }), Arc::new(Teapot)));
        let resp = app.oneshot(axum::http::Request::builder().uri("/x").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::IM_A_TEAPOT);
    }
}
