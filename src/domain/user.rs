use serde::Serialize;
use uuid::Uuid;

/// The signed-in operator, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<String>,
}

impl User {
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self { id, email: None, display_name: None, role: None }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
