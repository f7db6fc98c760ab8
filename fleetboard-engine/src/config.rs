use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BoardConfig {
    #[serde(default)]
    pub backend: BackendConf,
    #[serde(default)]
    pub mqtt: MqttConf,
    #[serde(default)]
    pub http: HttpConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConf {
    /// Base URL of the probe backend serving /api/machines.
    pub base_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    /// Topic the backend broadcasts full-status deliveries on.
    #[serde(default = "default_topic")]
    pub topic: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HttpConf {
    pub port: u16,
}

fn default_topic() -> String {
    "network-status".to_string()
}

impl Default for BackendConf {
    fn default() -> Self {
        Self { base_url: "http://localhost:5000".into() }
    }
}

impl Default for MqttConf {
    fn default() -> Self {
        Self { host: "localhost".into(), port: 1883, topic: default_topic() }
    }
}

impl Default for HttpConf {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            backend: BackendConf::default(),
            mqtt: MqttConf::default(),
            http: HttpConf::default(),
        }
    }
}

pub async fn load_config() -> BoardConfig {
    let path = std::env::var("FLEETBOARD_CONFIG").unwrap_or_else(|_| "board.yaml".into());
    if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        if txt.trim().is_empty() {
            return BoardConfig::default();
        }
        serde_yaml::from_str(&txt).unwrap_or_else(|e| {
            log::warn!("[config] invalid {path}: {e}");
            BoardConfig::default()
        })
    } else {
        log::info!("[config] no {path}, using defaults");
        BoardConfig::default()
    }
}
