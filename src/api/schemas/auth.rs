use crate::domain::session::Session;
use crate::domain::user::User;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub authenticated: bool,
    pub user: Option<User>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

impl SessionStatus {
    #[must_use]
    pub fn from_session(session: Option<&Session>) -> Self {
        Self {
            authenticated: session.is_some(),
            user: session.map(|s| s.user.clone()),
            expires_at: session.map(|s| s.expires_at),
        }
    }
}
