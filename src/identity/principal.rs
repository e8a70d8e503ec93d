use serde::{Deserialize, Serialize};

/// The authenticated principal attached to a request. Rebuilt on every request, never stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: String,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self { Self { id: id.into() } }
}
