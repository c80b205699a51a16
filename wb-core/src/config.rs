//! Process settings.
//!
//! Settings are read from the environment once at startup and passed around as
//! an immutable value (usually behind an `Arc`).

use crate::error::{Result, WbError};
use std::path::PathBuf;

/// Default image repository for server and admin images.
pub const DEFAULT_IMAGE_REPOSITORY: &str = "timroberton/comb";

/// Default container runtime binary.
pub const DEFAULT_DOCKER_BIN: &str = "docker";

/// Environment variables that must be set and non-empty.
pub const REQUIRED_VARS: &[&str] = &[
    "CLERK_PUBLISHABLE_KEY",
    "CLERK_SECRET_KEY",
    "DOMAIN",
    "SERVERS_FILE_PATH",
    "MOUNT_PATH",
    "SITES_AVAILABLE_PATH",
    "SITES_ENABLED_PATH",
    "POSTGRES_PASSWORD",
    "ANTHROPIC_API_URL",
    "ANTHROPIC_API_KEY",
    "PG_PASSWORD",
];

/// Immutable settings shared by every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub clerk_publishable_key: String,
    pub clerk_secret_key: String,
    /// Parent domain; tenants are served at `<id>.<domain>`
    pub domain: String,
    /// Registry file
    pub servers_file_path: PathBuf,
    /// Parent of every tenant instance directory
    pub mount_path: PathBuf,
    pub sites_available_path: PathBuf,
    pub sites_enabled_path: PathBuf,
    /// Password for the per-tenant database container
    pub postgres_password: String,
    pub anthropic_api_url: String,
    pub anthropic_api_key: String,
    /// Password the application uses to reach its database
    pub pg_password: String,
    pub image_repository: String,
    pub docker_bin: String,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`, which returns the value of a variable.
    ///
    /// Every missing required variable is reported in a single error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> =
            REQUIRED_VARS.iter().copied().filter(|key| get(key).is_none()).collect();
        if !missing.is_empty() {
            return Err(WbError::Config {
                reason: format!("Missing required environment variables: {}", missing.join(", ")),
            });
        }

        let required = |key: &str| get(key).unwrap_or_default();

        Ok(Self {
            clerk_publishable_key: required("CLERK_PUBLISHABLE_KEY"),
            clerk_secret_key: required("CLERK_SECRET_KEY"),
            domain: required("DOMAIN"),
            servers_file_path: PathBuf::from(required("SERVERS_FILE_PATH")),
            mount_path: PathBuf::from(required("MOUNT_PATH")),
            sites_available_path: PathBuf::from(required("SITES_AVAILABLE_PATH")),
            sites_enabled_path: PathBuf::from(required("SITES_ENABLED_PATH")),
            postgres_password: required("POSTGRES_PASSWORD"),
            anthropic_api_url: required("ANTHROPIC_API_URL"),
            anthropic_api_key: required("ANTHROPIC_API_KEY"),
            pg_password: required("PG_PASSWORD"),
            image_repository: get("WB_IMAGE_REPOSITORY")
                .unwrap_or_else(|| DEFAULT_IMAGE_REPOSITORY.to_string()),
            docker_bin: get("WB_DOCKER_BIN").unwrap_or_else(|| DEFAULT_DOCKER_BIN.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<String, String> {
        REQUIRED_VARS.iter().map(|k| (k.to_string(), format!("{}-value", k.to_lowercase()))).collect()
    }

    #[test]
    fn test_from_lookup_complete() {
        let mut env = full_env();
        env.insert("DOMAIN".into(), "example.org".into());
        let settings = Settings::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(settings.domain, "example.org");
        assert_eq!(settings.image_repository, DEFAULT_IMAGE_REPOSITORY);
        assert_eq!(settings.docker_bin, "docker");
    }

    #[test]
    fn test_missing_vars_reported_together() {
        let mut env = full_env();
        env.remove("DOMAIN");
        env.insert("PG_PASSWORD".into(), "  ".into());

        let err = Settings::from_lookup(|k| env.get(k).cloned()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("DOMAIN"));
        assert!(message.contains("PG_PASSWORD"));
        assert!(!message.contains("MOUNT_PATH"));
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = full_env();
        env.insert("WB_IMAGE_REPOSITORY".into(), "registry.local/wb".into());
        env.insert("WB_DOCKER_BIN".into(), "podman".into());
        let settings = Settings::from_lookup(|k| env.get(k).cloned()).unwrap();

        assert_eq!(settings.image_repository, "registry.local/wb");
        assert_eq!(settings.docker_bin, "podman");
    }
}
