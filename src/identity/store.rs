use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

use crate::error::AlreadyExists;

/// Users present at startup unless seeding is disabled: (identifier, secret).
pub const SEED_USERS: &[(&str, &str)] = &[
    ("admin", "password"),
    ("user", "password"),
    ("apiuser", "password"),
];

#[derive(Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub identifier: String,
    pub secret: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// In-memory identifier -> secret mapping. Identifiers are case-sensitive and unique.
/// Records are only ever inserted; there is no update or delete path.
#[derive(Default)]
pub struct CredentialStore {
    users: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    pub fn new() -> Self { Self::default() }

    /// Store pre-populated with [`SEED_USERS`].
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut users = store.users.lock();
            for (id, secret) in SEED_USERS {
                users.insert((*id).to_string(), (*secret).to_string());
            }
        }
        store
    }

    pub fn lookup(&self, identifier: &str) -> Option<CredentialRecord> {
        let users = self.users.lock();
        users.get(identifier).map(|secret| CredentialRecord {
            identifier: identifier.to_string(),
            secret: secret.clone(),
        })
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.users.lock().contains_key(identifier)
    }

    pub fn insert(&self, identifier: &str, secret: &str) -> Result<(), AlreadyExists> {
        self.insert_checked(identifier, secret, || Ok::<(), AlreadyExists>(()))
    }

    /// Check-then-insert as one critical section. The duplicate check runs first; `check`
    /// runs only for new identifiers and can veto the insert.
    pub fn insert_checked<E, F>(&self, identifier: &str, secret: &str, check: F) -> Result<(), E>
    where
        E: From<AlreadyExists>,
        F: FnOnce() -> Result<(), E>,
    {
        let mut users = self.users.lock();
        if users.contains_key(identifier) {
            return Err(AlreadyExists.into());
        }
        check()?;
        users.insert(identifier.to_string(), secret.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize { self.users.lock().len() }

    pub fn is_empty(&self) -> bool { self.users.lock().is_empty() }
}
