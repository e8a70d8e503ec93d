//! JSON API under `/api`. Responses share one shape; absent fields are omitted.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use super::extract::{CurrentUser, JsonBody};
use super::pages::{CheckoutPayload, CredentialsPayload};
use super::AppState;
use crate::error::AppResult;
use crate::render::{self, Escaped};

/// Static balance reported to members.
pub const BALANCE: u64 = 90265;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ApiResponse {
    pub err: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<Escaped>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl ApiResponse {
    fn member(user: &str) -> Self {
        Self { user: Some(user.to_string()), balance: Some(BALANCE), ..Default::default() }
    }
}

pub async fn login(State(state): State<AppState>, JsonBody(body): JsonBody<CredentialsPayload>) -> AppResult<Response> {
    match state.auth.authenticate(&body.email, &body.password) {
        Ok(identity) => {
            let session = state.sessions.issue(&identity)?;
            let cookie = state.sessions.set_cookie(&session)?;
            info!(target: "auth", user = %identity.id, "login (api) succeeded");
            let resp = ApiResponse {
                msg: Some("valid credentials".into()),
                user: Some(identity.id),
                next: Some("/members".into()),
                ..Default::default()
            };
            Ok(([(header::SET_COOKIE, cookie)], Json(resp)).into_response())
        }
        Err(e) => {
            warn!(target: "auth", user = %body.email, "login (api) failed: {}", e);
            let resp = ApiResponse { err: true, msg: Some("invalid credentials".into()), ..Default::default() };
            Ok((StatusCode::UNAUTHORIZED, Json(resp)).into_response())
        }
    }
}

pub async fn members(CurrentUser(identity): CurrentUser) -> Json<ApiResponse> {
    Json(ApiResponse::member(&identity.id))
}

pub async fn checkout_status(CurrentUser(identity): CurrentUser) -> Json<ApiResponse> {
    Json(ApiResponse::member(&identity.id))
}

pub async fn checkout_book(
    CurrentUser(identity): CurrentUser,
    JsonBody(body): JsonBody<CheckoutPayload>,
) -> Json<ApiResponse> {
    info!(target: "checkout", user = %identity.id, "booked via api");
    Json(ApiResponse {
        msg: Some("booked".into()),
        route: Some(render::checkout_route(&body.from, &body.to)),
        ..ApiResponse::member(&identity.id)
    })
}
