// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Server configuration loaded from environment variables.

use std::str::FromStr;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory for cache storage.
    pub cache_dir: String,
    /// Maximum request body size in MB.
    pub max_body_size_mb: usize,
    /// Request timeout in seconds. Covers the model download and patch.
    pub request_timeout_secs: u64,
    /// Autodesk Platform Services API root.
    pub aps_base_url: String,
    /// Upload the patched model back as a new version.
    pub upload_to_cloud: bool,
    /// File name for uploaded versions and downloads.
    pub upload_file_name: String,
    /// Allowed CORS origins (comma-separated, or "*" for all).
    pub cors_origins: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
            lookup(name)
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(default)
        }

        Self {
            port: parsed(&lookup, "PORT", 8001),
            cache_dir: lookup("CACHE_DIR").unwrap_or_else(|| {
                // Docker images create /app/cache; local runs use ./.cache
                if std::path::Path::new("/.dockerenv").exists() {
                    "/app/cache".into()
                } else {
                    std::env::current_dir()
                        .ok()
                        .and_then(|dir| dir.join(".cache").to_str().map(|s| s.to_string()))
                        .unwrap_or_else(|| "./.cache".into())
                }
            }),
            max_body_size_mb: parsed(&lookup, "MAX_BODY_SIZE_MB", 50),
            request_timeout_secs: parsed(&lookup, "REQUEST_TIMEOUT_SECS", 300),
            aps_base_url: lookup("APS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://developer.api.autodesk.com".into()),
            upload_to_cloud: lookup("UPLOAD_TO_CLOUD")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            upload_file_name: lookup("UPLOAD_FILE_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "recolored.ifc".into()),
            cors_origins: lookup("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Whether CORS should accept any origin.
    pub fn cors_permissive(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("CACHE_DIR", "/tmp/cache")]);
        assert_eq!(config.port, 8001);
        assert_eq!(config.max_body_size_mb, 50);
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.aps_base_url, "https://developer.api.autodesk.com");
        assert!(!config.upload_to_cloud);
        assert_eq!(config.upload_file_name, "recolored.ifc");
        assert!(config.cors_permissive());
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("PORT", "9000"),
            ("CACHE_DIR", "/data"),
            ("APS_BASE_URL", "http://localhost:4010/"),
            ("UPLOAD_TO_CLOUD", "True"),
            ("CORS_ORIGINS", "http://localhost:3000, https://viewer.example.com"),
        ]);
        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_dir, "/data");
        assert_eq!(config.aps_base_url, "http://localhost:4010");
        assert!(config.upload_to_cloud);
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:3000", "https://viewer.example.com"]
        );
        assert!(!config.cors_permissive());
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let config = config(&[("PORT", "eighty"), ("MAX_BODY_SIZE_MB", "-1")]);
        assert_eq!(config.port, 8001);
        assert_eq!(config.max_body_size_mb, 50);
    }
}
