//! Request extractors that reject with `AppError` instead of axum's default rejections,
//! so malformed bodies surface as `malformed_request` and missing identities as `unauthenticated`.

use axum::body::Bytes;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::request::Parts;
use axum::{Form, Json};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::AppError;
use crate::identity::{Identity, RequestContext};

/// The identity resolved for this request. Rejects when there is none, carrying the
/// reason a presented token was refused if there was one.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(ctx) = parts.extensions.get::<RequestContext>() else {
            return Err(AppError::Unauthenticated);
        };
        if let Some(identity) = &ctx.identity {
            return Ok(CurrentUser(identity.clone()));
        }
        if !ctx.requires_auth {
            warn!(target: "auth", route = %ctx.route, "handler needs an identity but the route is not guarded");
        }
        Err(ctx.session_error.map(AppError::from).unwrap_or(AppError::Unauthenticated))
    }
}

/// The identity resolved for this request, if any. Never rejects.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<Identity>);

impl MaybeUser {
    pub fn id(&self) -> Option<&str> { self.0.as_ref().map(|i| i.id.as_str()) }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<RequestContext>().and_then(|ctx| ctx.identity.clone())))
    }
}

/// JSON body decoded regardless of the declared content type.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::malformed(e.body_text()))?;
        let Json(value) = Json::<T>::from_bytes(&bytes).map_err(|e| AppError::malformed(e.body_text()))?;
        Ok(JsonBody(value))
    }
}

/// URL-form-encoded body.
#[derive(Debug, Clone)]
pub struct FormBody<T>(pub T);

impl<T, S> FromRequest<S> for FormBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(value) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::malformed(e.body_text()))?;
        Ok(FormBody(value))
    }
}
