use crate::config::RouteConfig;

/// What the guard decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Allowed,
    Redirected { to: String },
}

/// Path rules deciding which requests need a session.
///
/// Evaluation is a pure function of the path and whether the caller is
/// authenticated; nothing is remembered between requests.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    dashboard_path: String,
    protected_prefixes: Vec<String>,
    excluded_prefixes: Vec<String>,
}

/// `path` sits under `prefix` when it is the prefix itself or continues with
/// a new segment. A prefix ending in `/` matches by plain string prefix.
fn under_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix) || path == prefix.trim_end_matches('/');
    }
    path.strip_prefix(prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

/// Resolves a request path the way the static file server does: percent
/// escapes decoded, empty and `.` segments dropped. Paths that climb with `..`
/// or do not decode to UTF-8 yield `None`.
#[must_use]
pub fn canonical_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment => segments.push(segment),
        }
    }

    let mut path = format!("/{}", segments.join("/"));
    if !segments.is_empty() && decoded.ends_with('/') {
        path.push('/');
    }
    Some(path)
}

fn normalize(prefixes: &[String]) -> Vec<String> {
    prefixes.iter().map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
}

impl RouteGuard {
    #[must_use]
    pub fn new(config: &RouteConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            dashboard_path: config.dashboard_path.clone(),
            protected_prefixes: normalize(&config.protected_prefixes),
            excluded_prefixes: normalize(&config.excluded_prefixes),
        }
    }

    /// Static assets, image optimization, the favicon, internal auth routes
    /// and framework-reserved paths bypass the guard entirely.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_prefixes.iter().any(|prefix| under_prefix(path, prefix))
    }

    #[must_use]
    pub fn is_protected(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|prefix| under_prefix(path, prefix))
    }

    #[must_use]
    pub fn is_login(&self, path: &str) -> bool {
        path == self.login_path || path.strip_suffix('/') == Some(self.login_path.as_str())
    }

    #[must_use]
    pub fn evaluate(&self, path: &str, authenticated: bool) -> RouteDecision {
        if self.is_protected(path) && !authenticated {
            return RouteDecision::Redirected { to: self.login_path.clone() };
        }
        if self.is_login(path) && authenticated {
            return RouteDecision::Redirected { to: self.dashboard_path.clone() };
        }
        RouteDecision::Allowed
    }
}
