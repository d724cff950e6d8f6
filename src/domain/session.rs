use crate::domain::user::User;
use time::OffsetDateTime;

/// A provider-issued session. The application only ever holds a cached copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: User,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl Session {
    /// A session whose expiry is not strictly in the future counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at <= now
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }
}

/// Credentials carried by an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    #[must_use]
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        Self { access_token: non_empty(access_token), refresh_token: non_empty(refresh_token) }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// Outcome of reconciling a request's credentials with the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Authenticated(Box<Session>),
    Unauthenticated,
}

impl AuthState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        match self {
            Self::Authenticated(session) => Some(session),
            Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.session().map(|s| &s.user)
    }

    /// True when the provider handed back tokens other than the ones the request carried.
    #[must_use]
    pub fn rotated_from(&self, tokens: &SessionTokens) -> bool {
        self.session().is_some_and(|s| {
            tokens.access_token.as_deref() != Some(s.access_token.as_str())
                || (s.refresh_token.is_some() && tokens.refresh_token != s.refresh_token)
        })
    }
}
