use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::expression::EXPRESSION_THRESHOLD;

pub const ENV_HOST: &str = "MOODROOM_HOST";
pub const ENV_SERVER_URL: &str = "MOODROOM_SERVER_URL";
pub const ENV_LIVEKIT_URL: &str = "MOODROOM_LIVEKIT_URL";
pub const ENV_PUBLIC_ROOT: &str = "MOODROOM_PUBLIC_ROOT";
pub const ENV_LOCALE: &str = "MOODROOM_LOCALE";

// MARK: - Locale

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    #[serde(alias = "en")]
    English,
    #[serde(alias = "ko")]
    Korean,
}

impl std::str::FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "ko" | "korean" => Ok(Self::Korean),
            other => Err(ConfigError::Invalid {
                reason: format!("unknown locale '{other}'"),
            }),
        }
    }
}

// MARK: - StaleLabelPolicy

/// What happens to a participant's last label once they leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaleLabelPolicy {
    /// Keep the last known label until the process exits.
    #[default]
    Retain,
    /// Drop the label when the participant has no tracks left, and on leave.
    PruneOnDeparture,
}

// MARK: - DetectionConfig

/// Sampling loop and detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    #[serde(alias = "intervalMs")]
    pub interval_ms: u64,
    #[serde(alias = "inputSize")]
    pub input_size: u32,
    #[serde(alias = "scoreThreshold")]
    pub score_threshold: f32,
    #[serde(alias = "expressionThreshold")]
    pub expression_threshold: f32,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            input_size: 512,
            score_threshold: 0.5,
            expression_threshold: EXPRESSION_THRESHOLD,
        }
    }
}

impl DetectionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

// MARK: - Endpoints

/// Resolved application-server and media-transport URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Base URL of the token server, always ending with `/`.
    pub server_url: String,
    pub livekit_url: String,
}

impl Endpoints {
    /// Local development ports for `localhost`, secure ports on the host otherwise.
    pub fn for_host(host: &str) -> Self {
        if host == "localhost" {
            Self {
                server_url: "http://localhost:6080/".into(),
                livekit_url: "ws://localhost:7880/".into(),
            }
        } else {
            Self {
                server_url: format!("https://{host}:6443/"),
                livekit_url: format!("wss://{host}:7443/"),
            }
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}token", self.server_url)
    }
}

// MARK: - ClientConfig

/// Client configuration, built once at startup and shared by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    #[serde(alias = "serverUrl", skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
    #[serde(alias = "livekitUrl", skip_serializing_if = "Option::is_none")]
    pub livekit_url: Option<String>,
    #[serde(alias = "publicRoot")]
    pub public_root: PathBuf,
    pub locale: Locale,
    #[serde(alias = "staleLabels")]
    pub stale_labels: StaleLabelPolicy,
    pub detection: DetectionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            server_url: None,
            livekit_url: None,
            public_root: PathBuf::from("public"),
            locale: Locale::default(),
            stale_labels: StaleLabelPolicy::default(),
            detection: DetectionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse { reason: e.to_string() })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Overlay values from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(host) = lookup(ENV_HOST).filter(|h| !h.is_empty()) {
            self.host = host;
        }
        if let Some(url) = lookup(ENV_SERVER_URL) {
            self.server_url = Some(url);
        }
        if let Some(url) = lookup(ENV_LIVEKIT_URL) {
            self.livekit_url = Some(url);
        }
        if let Some(root) = lookup(ENV_PUBLIC_ROOT) {
            self.public_root = PathBuf::from(root);
        }
        if let Some(locale) = lookup(ENV_LOCALE) {
            self.locale = locale.parse()?;
        }
        Ok(self)
    }

    pub fn endpoints(&self) -> Endpoints {
        let derived = Endpoints::for_host(&self.host);
        Endpoints {
            server_url: self
                .server_url
                .as_deref()
                .map(with_trailing_slash)
                .unwrap_or(derived.server_url),
            livekit_url: self.livekit_url.clone().unwrap_or(derived.livekit_url),
        }
    }

    /// Directory holding the detector, landmark and expression model artifacts.
    pub fn model_dir(&self) -> PathBuf {
        self.public_root.join("models")
    }
}

fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    }
}
