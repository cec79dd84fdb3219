//! MongoDB connection configuration.

use serde::Deserialize;

/// MongoDB-specific configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongodbConfig {
    /// Administrative connection URI.
    pub uri: String,
    /// Application name reported to the server.
    pub app_name: String,
    /// Ping attempts before the connection is considered failed.
    pub connect_retries: usize,
}

impl Default for MongodbConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            app_name: "mongo-provision".to_string(),
            connect_retries: 30,
        }
    }
}

impl MongodbConfig {
    /// Connection URI with any password masked, safe for logs.
    pub fn redacted_uri(&self) -> String {
        let Some(scheme_end) = self.uri.find("://") else {
            return self.uri.clone();
        };
        let rest = &self.uri[scheme_end + 3..];
        let authority = &rest[..rest.find('/').unwrap_or(rest.len())];
        let Some(at) = authority.rfind('@') else {
            return self.uri.clone();
        };

        let userinfo = &rest[..at];
        match userinfo.split_once(':') {
            Some((user, _)) => format!(
                "{}{}:***{}",
                &self.uri[..scheme_end + 3],
                user,
                &rest[at..]
            ),
            None => self.uri.clone(),
        }
    }
}
