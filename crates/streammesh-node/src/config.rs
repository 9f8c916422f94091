use crate::error::NodeError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use streammesh_types::{ServiceKey, TopicKey};

/// A single configured service: its key, and the topics it exposes. No
/// actual service implementation is wired up here (the sample services
/// themselves are out of scope) — each topic gets a stub [`crate::demo_source::StaticTopicSource`]
/// that only ever emits its configured initial value as a snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

impl ServiceConfig {
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(self.name.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    pub name: String,
    #[serde(default = "default_initial_value")]
    pub initial_value: String,
}

impl TopicConfig {
    pub fn key(&self) -> TopicKey {
        TopicKey::new(self.name.clone())
    }
}

fn default_initial_value() -> String {
    String::new()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
}

fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:7777".parse().expect("valid default address")
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            services: Vec::new(),
        }
    }
}

/// Loads a `NodeConfig` from `path`, dispatching on extension (`.json` or
/// `.yaml`/`.yml`; anything else is tried as YAML, which is a superset of
/// JSON). `None` yields the default config (bind to localhost, no services).
pub fn load_config(path: Option<&Path>) -> Result<NodeConfig, NodeError> {
    let Some(path) = path else {
        return Ok(NodeConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| NodeError::Config(anyhow::Error::new(e).context(format!("reading {}", path.display()))))?;
    let is_json = path.extension().and_then(|ext| ext.to_str()) == Some("json");
    if is_json {
        serde_json::from_str(&raw).map_err(|e| NodeError::Config(e.into()))
    } else {
        serde_yaml::from_str(&raw).map_err(|e| NodeError::Config(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_localhost_with_no_services() {
        let config = load_config(None).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:7777".parse().unwrap());
        assert!(config.services.is_empty());
    }
}
