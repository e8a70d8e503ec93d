//! The two identity loader hooks consulted for every request, registered explicitly at startup:
//! a token loader (session cookie / bearer token) and a fallback that reads credentials
//! embedded in a URL-form-encoded request body.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::principal::Identity;
use super::provider::AuthProvider;
use super::session::SessionManager;
use crate::error::SessionError;

pub trait TokenToIdentity: Send + Sync {
    fn load(&self, token: &str) -> Result<Identity, SessionError>;
}

pub trait CredentialsToIdentity: Send + Sync {
    fn load(&self, creds: &EmbeddedCredentials) -> Option<Identity>;
}

/// Login-style fields found in a URL-form-encoded request body.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct EmbeddedCredentials {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

pub struct TokenLoader {
    pub sessions: Arc<SessionManager>,
    pub users: Arc<dyn AuthProvider>,
}

impl TokenToIdentity for TokenLoader {
    fn load(&self, token: &str) -> Result<Identity, SessionError> {
        self.sessions.resolve(token, self.users.as_ref())
    }
}

/// Resolves body credentials. With `verify_secret` off only the identifier has to exist
/// and the password field is ignored.
pub struct EmbeddedCredentialsLoader {
    pub users: Arc<dyn AuthProvider>,
    pub verify_secret: bool,
}

impl CredentialsToIdentity for EmbeddedCredentialsLoader {
    fn load(&self, creds: &EmbeddedCredentials) -> Option<Identity> {
        let id = creds.email.as_deref().filter(|s| !s.is_empty())?;
        if self.verify_secret {
            let secret = creds.password.as_deref().unwrap_or_default();
            return self.users.authenticate(id, secret).ok();
        }
        if self.users.exists(id) {
            debug!(target: "auth", user = id, "identity loaded from request body without secret check");
            Some(Identity::new(id))
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct Loaders {
    pub token: Arc<dyn TokenToIdentity>,
    pub credentials: Arc<dyn CredentialsToIdentity>,
}

impl Loaders {
    pub fn new(sessions: Arc<SessionManager>, users: Arc<dyn AuthProvider>, verify_embedded_secret: bool) -> Self {
        Self {
            token: Arc::new(TokenLoader { sessions, users: users.clone() }),
            credentials: Arc::new(EmbeddedCredentialsLoader { users, verify_secret: verify_embedded_secret }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalAuthProvider;
    use std::time::Duration;

    fn creds(email: Option<&str>, password: Option<&str>) -> EmbeddedCredentials {
        EmbeddedCredentials { email: email.map(String::from), password: password.map(String::from) }
    }

    fn loaders(verify: bool) -> (Arc<SessionManager>, Loaders) {
        let sm = Arc::new(SessionManager::new(b"k", Duration::from_secs(60)).unwrap());
        let users: Arc<dyn AuthProvider> = Arc::new(LocalAuthProvider::default());
        (sm.clone(), Loaders::new(sm, users, verify))
    }

    #[test]
    fn permissive_loader_checks_existence_only() {
        let (_, l) = loaders(false);
        assert_eq!(l.credentials.load(&creds(Some("admin"), None)), Some(Identity::new("admin")));
        assert_eq!(l.credentials.load(&creds(Some("admin"), Some("wrong"))), Some(Identity::new("admin")));
        assert_eq!(l.credentials.load(&creds(Some("nobody"), Some("password"))), None);
        assert_eq!(l.credentials.load(&creds(None, Some("password"))), None);
        assert_eq!(l.credentials.load(&creds(Some(""), None)), None);
    }

    #[test]
    fn strict_loader_requires_secret() {
        let (_, l) = loaders(true);
        assert_eq!(l.credentials.load(&creds(Some("admin"), Some("password"))), Some(Identity::new("admin")));
        assert_eq!(l.credentials.load(&creds(Some("admin"), Some("wrong"))), None);
        assert_eq!(l.credentials.load(&creds(Some("admin"), None)), None);
    }

    #[test]
    fn token_loader_delegates_to_session_manager() {
        let (sm, l) = loaders(false);
        let s = sm.issue(&Identity::new("apiuser")).unwrap();
        assert_eq!(l.token.load(&s.token), Ok(Identity::new("apiuser")));
        sm.revoke(&s.token);
        assert_eq!(l.token.load(&s.token), Err(SessionError::Revoked));
    }
}
