use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::client::AssessOptions;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    #[serde(default = "default_files_dir")]
    pub files_dir: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_info_url")]
    pub info_url: String,
    /// Hard ceiling on one assessment's total polling time, in seconds.
    #[serde(default = "default_max_poll_secs")]
    pub max_poll_secs: u64,
    /// Delay before the second poll; doubles per transient poll after that.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_interval_cap_secs")]
    pub poll_interval_cap_secs: u64,
    /// Force a fresh scan instead of accepting the service's cached result.
    #[serde(default)]
    pub start_new: bool,
}

fn default_server_port() -> u16 { 8080 }
fn default_files_dir() -> String { "files".into() }
fn default_api_base_url() -> String { "https://api.ssllabs.com/api/v3".into() }
fn default_info_url() -> String { "https://api.ssllabs.com/api/v2/info".into() }
fn default_max_poll_secs() -> u64 { 300 }
fn default_poll_interval_secs() -> u64 { 10 }
fn default_poll_interval_cap_secs() -> u64 { 60 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: default_server_port(),
            files_dir: default_files_dir(),
            api_base_url: default_api_base_url(),
            info_url: default_info_url(),
            max_poll_secs: default_max_poll_secs(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_interval_cap_secs: default_poll_interval_cap_secs(),
            start_new: false,
        }
    }
}

impl AppConfig {
    pub fn assess_options(&self) -> AssessOptions {
        AssessOptions {
            max_poll: Duration::from_secs(self.max_poll_secs),
            initial_interval: Duration::from_secs(self.poll_interval_secs),
            max_interval: Duration::from_secs(self.poll_interval_cap_secs),
            start_new: self.start_new,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.files_dir, "files");
        assert_eq!(config.max_poll_secs, 300);
        assert_eq!(config.poll_interval_secs, 10);
        assert!(!config.start_new);
    }

    #[test]
    fn partial_config_overrides_only_named_fields() {
        let config: AppConfig =
            serde_json::from_str(r#"{"server_port": 9090, "start_new": true}"#).unwrap();
        assert_eq!(config.server_port, 9090);
        assert!(config.start_new);
        assert_eq!(config.api_base_url, "https://api.ssllabs.com/api/v3");
    }

    #[test]
    fn assess_options_mirror_poll_settings() {
        let config: AppConfig =
            serde_json::from_str(r#"{"max_poll_secs": 60, "poll_interval_secs": 5}"#).unwrap();
        let opts = config.assess_options();
        assert_eq!(opts.max_poll, Duration::from_secs(60));
        assert_eq!(opts.initial_interval, Duration::from_secs(5));
        assert_eq!(opts.max_interval, Duration::from_secs(60));
    }
}
