//! Request context contract consumed by guards and the correlation layer.

use std::collections::HashMap;

/// The slice of a request the core is allowed to see.
///
/// The core never interprets attributes itself; they exist for building
/// correlation keys and as opaque input to guards.
pub trait InspectionContext: Send + Sync {
    /// Derive a correlation key component for a grouping dimension
    /// (e.g. `"ip"` returns the caller's IP address).
    fn correlation_key(&self, group: &str) -> String;

    /// Opaque attribute accessor for guard input.
    fn attribute(&self, key: &str) -> Option<&str>;
}

/// A plain HTTP-shaped request context.
///
/// Middleware layers can implement [`InspectionContext`] directly on their own
/// request types; this struct covers the common case and the test suite.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub ip: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub path: String,
    pub method: String,
    extra: HashMap<String, String>,
}

impl RequestContext {
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_path(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = method.into();
        self.path = path.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

impl InspectionContext for RequestContext {
    fn correlation_key(&self, group: &str) -> String {
        match group {
            "ip" => self.ip.clone(),
            "user" => self
                .user_id
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
            "session" => self.session_id.clone().unwrap_or_default(),
            "path" => self.path.clone(),
            other => self
                .extra
                .get(other)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string()),
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "ip" => Some(self.ip.as_str()),
            "user" => self.user_id.as_deref(),
            "session" => self.session_id.as_deref(),
            "path" => Some(self.path.as_str()),
            "method" => Some(self.method.as_str()),
            other => self.extra.get(other).map(String::as_str),
        }
    }
}
