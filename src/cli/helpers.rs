//! Shared helper functions for CLI commands

use miette::{IntoDiagnostic, Result};

use crate::cli::GlobalOpts;
use crate::core::api::{FleetApi, HttpApi, LocalApi};
use crate::core::auth::{AuthProvider, LocalAuth, TokenAuth};
use crate::core::store::open_store;
use crate::core::Config;
use crate::onboarding::committer::ImportCommitter;

/// Load configuration and apply command-line overrides
pub fn load_config(global: &GlobalOpts) -> Config {
    let mut config = Config::load();
    if let Some(ref dir) = global.data_dir {
        config.data_dir = Some(dir.clone());
    }
    config
}

/// Authentication for the configured backend
pub fn auth_provider(config: &Config) -> Box<dyn AuthProvider> {
    match config.api_url() {
        Some(_) => Box::new(TokenAuth::new(config.operator(), config.api_token.clone())),
        None => Box::new(LocalAuth::new(config.operator())),
    }
}

/// Open the configured backend: the fleet server when `api_url` is set,
/// the local store otherwise
pub fn open_api(config: &Config) -> Result<Box<dyn FleetApi>> {
    if let Some(url) = config.api_url() {
        tracing::debug!(url, "using fleet server");
        let api = HttpApi::new(url, auth_provider(config)).into_diagnostic()?;
        return Ok(Box::new(api));
    }

    let store = open_store(config.store(), &config.data_dir()).into_diagnostic()?;
    let committer = ImportCommitter::new(config.import_actor(), config.import_defaults());
    let api = LocalApi::new(store, committer);
    Ok(if config.demo_data() {
        Box::new(api.with_demo_data())
    } else {
        Box::new(api)
    })
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Überlandstraße", 8), "Überl...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_auth_provider_follows_backend() {
        let local = Config {
            operator: Some("Dana".to_string()),
            ..Default::default()
        };
        assert!(auth_provider(&local).current_user().is_ok());

        let remote = Config {
            operator: Some("Dana".to_string()),
            api_url: Some("http://localhost:3001/api".to_string()),
            ..Default::default()
        };
        assert!(auth_provider(&remote).current_user().is_err());
    }
}
