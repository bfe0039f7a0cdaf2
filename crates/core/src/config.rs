use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

/// Path the downstream agent connects on; the relay serves its WebSocket
/// upgrade here and error messages reference it.
pub const WS_EXTENSION_PATH: &str = "/ws-extension";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8888
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// How long a submitted request may wait for a matching reply envelope.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StabilizeConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive identical non-empty samples required before the rendered
    /// text is considered final.
    #[serde(default = "default_stable_samples")]
    pub stable_samples: u32,
    #[serde(default = "default_stabilize_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_stable_samples() -> u32 {
    3
}

fn default_stabilize_timeout_ms() -> u64 {
    120_000
}

impl Default for StabilizeConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stable_samples: default_stable_samples(),
            timeout_ms: default_stabilize_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromeConfig {
    /// Chrome remote-debugging port used for CDP target discovery.
    #[serde(default = "default_debug_port")]
    pub debug_port: u16,
    /// Substring matched against open tab URLs to pick the web UI tab.
    #[serde(default = "default_page_url_match")]
    pub page_url_match: String,
    #[serde(default = "default_input_selector")]
    pub input_selector: String,
    #[serde(default = "default_send_button_selector")]
    pub send_button_selector: String,
    #[serde(default = "default_response_selector")]
    pub response_selector: String,
}

fn default_debug_port() -> u16 {
    9222
}

fn default_page_url_match() -> String {
    "gemini.google.com".to_string()
}

fn default_input_selector() -> String {
    "textarea".to_string()
}

fn default_send_button_selector() -> String {
    "button[aria-label*='Send' i], button[type='submit']".to_string()
}

fn default_response_selector() -> String {
    "model-response, [data-message-author-role='assistant'], .model-response-text".to_string()
}

impl Default for ChromeConfig {
    fn default() -> Self {
        Self {
            debug_port: default_debug_port(),
            page_url_match: default_page_url_match(),
            input_selector: default_input_selector(),
            send_button_selector: default_send_button_selector(),
            response_selector: default_response_selector(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// WebSocket URL of the relay the agent dials.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Fixed reconnect backoff. Constant on purpose: the agent is
    /// long-running and retries forever.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default)]
    pub stabilize: StabilizeConfig,
    #[serde(default)]
    pub chrome: ChromeConfig,
}

fn default_bridge_url() -> String {
    format!("ws://localhost:{}{}", default_gateway_port(), WS_EXTENSION_PATH)
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            stabilize: StabilizeConfig::default(),
            chrome: ChromeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.gateway.port, 8888);
        assert_eq!(cfg.relay.request_timeout_ms, 120_000);
        assert_eq!(cfg.agent.reconnect_delay_ms, 2000);
        assert_eq!(cfg.agent.stabilize.poll_interval_ms, 1000);
        assert_eq!(cfg.agent.stabilize.stable_samples, 3);
        assert_eq!(cfg.agent.stabilize.timeout_ms, 120_000);
        assert_eq!(cfg.agent.bridge_url, "ws://localhost:8888/ws-extension");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let raw = r#"{ "gateway": { "port": 9001 } }"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.gateway.port, 9001);
        assert_eq!(cfg.gateway.host, "127.0.0.1");
        assert_eq!(cfg.relay.request_timeout_ms, 120_000);
    }

    #[test]
    fn serializes_camel_case() {
        let raw = serde_json::to_value(Config::default()).unwrap();
        assert!(raw["relay"]["requestTimeoutMs"].is_u64());
        assert!(raw["agent"]["reconnectDelayMs"].is_u64());
        assert!(raw["agent"]["stabilize"]["pollIntervalMs"].is_u64());
    }
}
