//! HTML page routes: home, login/register forms, the guarded members and checkout pages, logout.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::extract::{CurrentUser, FormBody, MaybeUser};
use super::AppState;
use crate::error::{AppError, AppResult, RegistrationError};
use crate::identity::token_from_headers;
use crate::render::{self, CredentialsForm};

/// `email`/`password` fields shared by the login and register forms and the login API.
#[derive(Debug, Deserialize)]
pub struct CredentialsPayload {
    pub email: String,
    pub password: String,
}

const MISSING_FIELDS: &str = "Email and password are required";

#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub from: String,
    pub to: String,
}

pub async fn home(user: MaybeUser) -> Html<String> {
    Html(render::home_page(user.id()))
}

pub async fn login_form(user: MaybeUser) -> Html<String> {
    Html(render::credentials_page(CredentialsForm::Login, user.id(), None, None))
}

/// Status and page for a credentials form that did not decode.
fn incomplete_form(form: CredentialsForm, user: Option<&str>, err: &AppError) -> Response {
    debug!(target: "auth", "credentials form rejected: {}", err);
    let page = render::credentials_page(form, user, Some(MISSING_FIELDS), None);
    (StatusCode::BAD_REQUEST, Html(page)).into_response()
}

pub async fn login_submit(
    State(state): State<AppState>,
    form: Result<FormBody<CredentialsPayload>, AppError>,
) -> AppResult<Response> {
    let FormBody(form) = match form {
        Ok(form) => form,
        Err(e) => return Ok(incomplete_form(CredentialsForm::Login, None, &e)),
    };
    match state.auth.authenticate(&form.email, &form.password) {
        Ok(identity) => {
            let session = state.sessions.issue(&identity)?;
            let cookie = state.sessions.set_cookie(&session)?;
            info!(target: "auth", user = %identity.id, "login (form) succeeded");
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/members")).into_response())
        }
        Err(e) => {
            warn!(target: "auth", user = %form.email, "login (form) failed: {}", e);
            let page = render::credentials_page(CredentialsForm::Login, None, Some("Bad Login"), None);
            Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response())
        }
    }
}

pub async fn register_form(user: MaybeUser) -> Html<String> {
    Html(render::credentials_page(CredentialsForm::Register, user.id(), None, None))
}

pub async fn register_submit(
    State(state): State<AppState>,
    user: MaybeUser,
    form: Result<FormBody<CredentialsPayload>, AppError>,
) -> Response {
    let FormBody(form) = match form {
        Ok(form) => form,
        Err(e) => return incomplete_form(CredentialsForm::Register, user.id(), &e),
    };
    let err = match state.auth.register(&form.email, &form.password) {
        Ok(()) => {
            let page = render::credentials_page(CredentialsForm::Register, user.id(), None, Some(form.email.as_str()));
            return Html(page).into_response();
        }
        Err(RegistrationError::AlreadyExists) => "User already exists",
        Err(RegistrationError::WeakSecret { .. }) => "Password is too weak",
    };
    info!(target: "auth", user = %form.email, "registration rejected: {}", err);
    let page = render::credentials_page(CredentialsForm::Register, user.id(), Some(err), None);
    (StatusCode::BAD_REQUEST, Html(page)).into_response()
}

pub async fn members(CurrentUser(identity): CurrentUser) -> Html<String> {
    Html(render::members_page("members", Some(identity.id.as_str()), None))
}

pub async fn checkout_form(CurrentUser(identity): CurrentUser) -> Html<String> {
    Html(render::checkout_page(Some(identity.id.as_str()), None))
}

pub async fn checkout_submit(
    CurrentUser(identity): CurrentUser,
    FormBody(form): FormBody<CheckoutPayload>,
) -> Html<String> {
    let route = render::checkout_route(&form.from, &form.to);
    info!(target: "checkout", user = %identity.id, "booked via form");
    Html(render::checkout_page(Some(identity.id.as_str()), Some(&route)))
}

/// Revoke the presented session (if any), clear the cookie and go home.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = token_from_headers(&headers) {
        if state.sessions.revoke(&token) {
            info!(target: "auth", "session revoked by logout");
        }
    }
    ([(header::SET_COOKIE, state.sessions.clear_cookie())], Redirect::to("/")).into_response()
}
