//! Remote backend configuration and backend selection

use std::fmt;

use tracing::warn;

/// Environment variables holding the remote endpoint, in lookup order
pub const URL_VARS: [&str; 2] = ["SUPABASE_URL", "VITE_SUPABASE_URL"];
/// Environment variables holding the remote access key, in lookup order
pub const KEY_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"];

/// Connection parameters for the hosted store
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    /// Project endpoint, e.g. `https://xyz.supabase.co` (no trailing slash)
    pub url: String,
    /// Anonymous access key
    pub anon_key: String,
}

impl RemoteConfig {
    /// Build a config when both values are present and non-empty.
    ///
    /// This is the whole "is the remote backend configured" check.
    pub fn from_values(url: Option<String>, anon_key: Option<String>) -> Option<Self> {
        let url = url.map(|u| u.trim().trim_end_matches('/').to_string());
        let anon_key = anon_key.map(|k| k.trim().to_string());
        match (url, anon_key) {
            (Some(url), Some(anon_key)) if !url.is_empty() && !anon_key.is_empty() => {
                Some(Self { url, anon_key })
            }
            _ => None,
        }
    }

    /// Read the config from the environment.
    ///
    /// Returns `None` (and logs a warning) when either value is missing.
    pub fn from_env() -> Option<Self> {
        let lookup = |names: &[&str]| names.iter().find_map(|n| std::env::var(n).ok());
        let config = Self::from_values(lookup(&URL_VARS), lookup(&KEY_VARS));
        if config.is_none() {
            warn!("Remote credentials not found, wishlist will work in offline mode");
        }
        config
    }

    pub fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.url, table)
    }

    pub fn storage_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.url, bucket, path)
    }

    pub fn public_object_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.url, bucket, path)
    }

    /// Websocket endpoint of the realtime service
    pub fn realtime_url(&self) -> String {
        let ws = if let Some(rest) = self.url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.url.clone()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws, self.anon_key
        )
    }
}

// Keep the key out of logs.
impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("anon_key", &"<redacted>")
            .finish()
    }
}

/// Which backend a session routes every operation to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    Remote,
    LocalOnly,
}

impl BackendMode {
    pub fn from_config(config: Option<&RemoteConfig>) -> Self {
        if config.is_some() {
            BackendMode::Remote
        } else {
            BackendMode::LocalOnly
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Remote => write!(f, "remote"),
            BackendMode::LocalOnly => write!(f, "offline (local only)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_values_required() {
        assert!(RemoteConfig::from_values(None, Some("key".into())).is_none());
        assert!(RemoteConfig::from_values(Some("https://x.supabase.co".into()), None).is_none());
        assert!(RemoteConfig::from_values(Some("".into()), Some("key".into())).is_none());
        assert!(RemoteConfig::from_values(Some("https://x".into()), Some("  ".into())).is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config =
            RemoteConfig::from_values(Some("https://x.supabase.co/".into()), Some("key".into()))
                .unwrap();
        assert_eq!(config.url, "https://x.supabase.co");
        assert_eq!(
            config.rest_url("wishlist_items"),
            "https://x.supabase.co/rest/v1/wishlist_items"
        );
    }

    #[test]
    fn test_urls() {
        let config =
            RemoteConfig::from_values(Some("https://x.supabase.co".into()), Some("k".into()))
                .unwrap();
        assert_eq!(
            config.public_object_url("wishlist", "wishlist-images/kevin-1.png"),
            "https://x.supabase.co/storage/v1/object/public/wishlist/wishlist-images/kevin-1.png"
        );
        assert_eq!(
            config.realtime_url(),
            "wss://x.supabase.co/realtime/v1/websocket?apikey=k&vsn=1.0.0"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let config =
            RemoteConfig::from_values(Some("https://x".into()), Some("secret".into())).unwrap();
        assert!(!format!("{:?}", config).contains("secret"));
    }

    #[test]
    fn test_mode_from_config() {
        assert_eq!(BackendMode::from_config(None), BackendMode::LocalOnly);
        let config = RemoteConfig::from_values(Some("https://x".into()), Some("k".into()));
        assert_eq!(BackendMode::from_config(config.as_ref()), BackendMode::Remote);
    }
}
