//! Central identity and session management for the login/checkout service.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod store;
mod provider;
mod session;
mod loaders;
mod request_context;
mod guard;

pub use principal::Identity;
pub use store::{CredentialRecord, CredentialStore, SEED_USERS};
pub use provider::{AuthProvider, LocalAuthProvider};
pub use session::{token_from_headers, Session, SessionClaims, SessionManager, SessionToken, MAX_SESSION_TTL, SESSION_COOKIE};
pub use loaders::{CredentialsToIdentity, EmbeddedCredentials, EmbeddedCredentialsLoader, Loaders, TokenLoader, TokenToIdentity};
pub use request_context::{IdentitySource, RequestContext};
pub use guard::{guard, require_identity, DefaultUnauthorized, UnauthorizedHandler};
