use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info};

use super::principal::Identity;
use super::store::CredentialStore;
use crate::config::DEFAULT_MIN_SECRET_LEN;
use crate::error::{InvalidCredentials, RegistrationError};

pub trait AuthProvider: Send + Sync {
    /// Validate an identifier/secret pair. Never mutates state.
    fn authenticate(&self, identifier: &str, secret: &str) -> Result<Identity, InvalidCredentials>;

    /// Add a new user. Does not authenticate the caller.
    fn register(&self, identifier: &str, secret: &str) -> Result<(), RegistrationError>;

    /// Existence check only; the secret is not consulted.
    fn exists(&self, identifier: &str) -> bool;
}

/// Authenticator over the in-process credential store.
pub struct LocalAuthProvider {
    pub store: Arc<CredentialStore>,
    pub min_secret_len: usize,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<CredentialStore>, min_secret_len: usize) -> Self { Self { store, min_secret_len } }
}

impl AuthProvider for LocalAuthProvider {
    fn authenticate(&self, identifier: &str, secret: &str) -> Result<Identity, InvalidCredentials> {
        let Some(record) = self.store.lookup(identifier) else {
            debug!(target: "auth", user = identifier, "authenticate: unknown user");
            return Err(InvalidCredentials);
        };
        if !bool::from(record.secret.as_bytes().ct_eq(secret.as_bytes())) {
            debug!(target: "auth", user = identifier, "authenticate: secret mismatch");
            return Err(InvalidCredentials);
        }
        Ok(Identity::new(record.identifier))
    }

    fn register(&self, identifier: &str, secret: &str) -> Result<(), RegistrationError> {
        let min_len = self.min_secret_len;
        self.store.insert_checked(identifier, secret, || {
            if secret.chars().count() < min_len {
                return Err(RegistrationError::WeakSecret { min_len });
            }
            Ok(())
        })?;
        info!(target: "auth", user = identifier, "registered new user");
        Ok(())
    }

    fn exists(&self, identifier: &str) -> bool {
        self.store.contains(identifier)
    }
}

impl Default for LocalAuthProvider {
    fn default() -> Self { Self::new(Arc::new(CredentialStore::seeded()), DEFAULT_MIN_SECRET_LEN) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> LocalAuthProvider { LocalAuthProvider::default() }

    #[test]
    fn unknown_identifier_is_rejected_for_any_secret() {
        let p = provider();
        for secret in ["", "password", "anything at all", "x"] {
            assert_eq!(p.authenticate("ghost", secret), Err(InvalidCredentials));
        }
    }

    #[test]
    fn registered_pair_authenticates_and_suffix_fails() {
        let p = provider();
        let pairs = [("newuser", "abcde"), ("carol", "hunter22"), ("Dave", "ünïcødé")];
        for (id, secret) in pairs {
            p.register(id, secret).unwrap();
            assert_eq!(p.authenticate(id, secret), Ok(Identity::new(id)));
            assert_eq!(p.authenticate(id, &format!("{}x", secret)), Err(InvalidCredentials));
        }
    }

    #[test]
    fn seed_users_authenticate() {
        let p = provider();
        assert_eq!(p.authenticate("admin", "password").unwrap().id, "admin");
        assert_eq!(p.authenticate("admin", "wrong"), Err(InvalidCredentials));
        assert_eq!(p.authenticate("ADMIN", "password"), Err(InvalidCredentials));
    }

    #[test]
    fn second_registration_always_rejected() {
        let p = provider();
        p.register("erin", "first-secret").unwrap();
        assert_eq!(p.register("erin", "second-secret"), Err(RegistrationError::AlreadyExists));
        assert_eq!(p.register("erin", "no"), Err(RegistrationError::AlreadyExists));
        assert!(p.authenticate("erin", "first-secret").is_ok());
        assert!(p.authenticate("erin", "second-secret").is_err());
    }

    #[test]
    fn weak_secret_iff_shorter_than_five() {
        let p = provider();
        for (i, secret) in ["", "a", "ab", "abc", "abcd"].iter().enumerate() {
            let id = format!("weak{}", i);
            assert_eq!(p.register(&id, secret), Err(RegistrationError::WeakSecret { min_len: 5 }));
            assert!(!p.exists(&id));
        }
        for (i, secret) in ["abcde", "abcdef", "a much longer secret"].iter().enumerate() {
            assert!(p.register(&format!("ok{}", i), secret).is_ok());
        }
    }

    #[test]
    fn existing_user_with_weak_secret_reports_duplicate() {
        let p = provider();
        assert_eq!(p.register("admin", "pw"), Err(RegistrationError::AlreadyExists));
        assert_eq!(p.register("admin", "password2"), Err(RegistrationError::AlreadyExists));
    }

    #[test]
    fn minimum_is_configurable() {
        let p = LocalAuthProvider::new(Arc::new(CredentialStore::new()), 8);
        assert_eq!(p.register("frank", "1234567"), Err(RegistrationError::WeakSecret { min_len: 8 }));
        assert!(p.register("frank", "12345678").is_ok());
    }
}
