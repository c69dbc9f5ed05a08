use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the completion API credential.
pub const API_KEY_VARIABLE: &str = "OPENAI_API_KEY";

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HTTPConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub reply: ReplyConfig,
}
impl AppConfig {
    /// Loads the config file (an explicit path must exist, the default path is optional),
    /// then reads the completion credential from the environment exactly once.
    pub fn load(config_filepath: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_filepath {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.is_file() {
                    Self::from_file(&path)?
                } else {
                    AppConfig::default()
                }
            }
        };

        config.completion.api_key = std::env::var(API_KEY_VARIABLE)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(config)
    }

    fn from_file(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {config_path:?}"))?;

        Self::from_toml(&config_content)
            .with_context(|| format!("Failed to parse TOML config file: {config_path:?}"))
    }

    fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HTTPConfig {
    #[serde(default = "default_http_address")]
    pub address: SocketAddr,

    /// Shown in the root route descriptor.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    #[serde(default)]
    pub tls: Option<TLSConfig>,
}
impl Default for HTTPConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            service_name: default_service_name(),
            tls: None,
        }
    }
}

#[cfg_attr(
    not(any(feature = "tls-rustls", feature = "tls-native")),
    allow(dead_code)
)]
#[derive(Debug, Clone, Deserialize)]
pub struct TLSConfig {
    #[serde(deserialize_with = "deserialize_existing_file")]
    pub certificate_path: PathBuf,

    #[serde(deserialize_with = "deserialize_existing_file")]
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_completion_timeout")]
    pub timeout: u64,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Never read from the config file, only from the environment.
    #[serde(skip)]
    pub api_key: Option<String>,
}
impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_completion_endpoint(),
            model: default_completion_model(),
            timeout: default_completion_timeout(),
            system_prompt: default_system_prompt(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyConfig {
    /// Sent to the completion API when the inbound message is blank.
    #[serde(default = "default_prompt")]
    pub default_prompt: String,

    /// Replaces the completion text whenever the completion call fails.
    #[serde(default = "default_fallback")]
    pub fallback: String,

    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
}
impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            default_prompt: default_prompt(),
            fallback: default_fallback(),
            disclaimer: default_disclaimer(),
        }
    }
}

fn default_http_address() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 3000)
}
fn default_service_name() -> String {
    "HGA Bot".to_string()
}
fn default_completion_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_completion_timeout() -> u64 {
    10
}
fn default_system_prompt() -> String {
    "Você é um assistente informativo do Hosken & Geraldino. Responda de forma breve e clara, sem aconselhamento jurídico individual.".to_string()
}
fn default_prompt() -> String {
    "Olá! Faça uma pergunta objetiva.".to_string()
}
fn default_fallback() -> String {
    "Estou com instabilidade de IA no momento; nossa equipe retornará em breve.".to_string()
}
fn default_disclaimer() -> String {
    "[Aviso] Resposta informativa. Não substitui consulta com advogado(a). Contato: (21) 2018-4200 • WhatsApp: +1 415 523 8886".to_string()
}

fn deserialize_existing_file<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let path = PathBuf::deserialize(deserializer)?;
    if !path.exists() {
        return Err(serde::de::Error::custom(format!(
            "File does not exist: {}",
            path.display()
        )));
    }
    if !path.is_file() {
        return Err(serde::de::Error::custom(format!(
            "Path is not a file: {}",
            path.display()
        )));
    }
    Ok(path)
}
