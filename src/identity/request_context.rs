use super::Identity;
use crate::error::SessionError;

/// How the request's identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdentitySource {
    #[default]
    Anonymous,
    Token,
    EmbeddedCredentials,
}

/// Per-request state built by the session resolution layer and read by the access guard
/// and handlers. Holds at most one identity.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub source: IdentitySource,
    pub route: String,
    /// Set by the access guard on routes that need an identity.
    pub requires_auth: bool,
    /// Why a presented token was not accepted, when one was presented.
    pub session_error: Option<SessionError>,
}

impl RequestContext {
    pub fn anonymous(route: impl Into<String>) -> Self {
        Self { route: route.into(), ..Default::default() }
    }

    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }

    pub fn user_id(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.id.as_str()) }
}
