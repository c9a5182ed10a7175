use crate::capture::CaptureConfig;
use crate::channel::DEFAULT_HOST;
use crate::session::{SessionConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// File-level configuration (TOML). Every field has a default, so the
/// file itself is optional. The API key is deliberately not part of this:
/// it comes from the environment at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveSettings,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "witness-live".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    /// Live API host
    pub host: String,
    /// Model identifier
    pub model: String,
    /// Sample rate of model speech (Hz)
    pub output_sample_rate: u32,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            output_sample_rate: 24000,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Derive a per-session configuration with a fresh session id.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            session_id: format!("assist-{}", uuid::Uuid::new_v4()),
            model: self.live.model.clone(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            output_sample_rate: self.live.output_sample_rate,
            capture: self.capture.clone(),
        }
    }
}
