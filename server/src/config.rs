use std::{collections::HashMap, env, time::Duration};

use config::{Config, ConfigError, File};
use serde::Deserialize;
use sponsor_core::gas::{DEFAULT_SAFETY_MULTIPLIER_PERCENT, GasFees};
use sponsor_eip7702_core::draft::SimulationPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub gas: GasConfig,
    /// Absent means every simulation reports the service as unavailable
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
    /// Keyed by decimal chain id
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".into(),
            log_format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound for every outbound call: RPC, simulation and gas API
    pub request_timeout_secs: u64,
    pub simulation_policy: SimulationPolicy,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            simulation_policy: SimulationPolicy::default(),
        }
    }
}

impl ExecutionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    pub safety_multiplier_percent: u64,
    pub gas_station_urls: HashMap<String, String>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            safety_multiplier_percent: DEFAULT_SAFETY_MULTIPLIER_PERCENT as u64,
            gas_station_urls: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    pub account: String,
    pub project: String,
    /// Name of the environment variable holding the access key
    pub access_key_env: String,
    #[serde(default)]
    pub dashboard_base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub rpc_url: String,
    /// Name of the environment variable holding the relayer's private key
    pub relayer_key_env: String,
    pub delegate_address: String,
    #[serde(default)]
    pub gas_defaults: Option<GasDefaultsConfig>,
}

/// Static fee caps in wei
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GasDefaultsConfig {
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

impl From<GasDefaultsConfig> for GasFees {
    fn from(value: GasDefaultsConfig) -> Self {
        GasFees::new(
            value.max_fee_per_gas.into(),
            value.max_priority_fee_per_gas.into(),
        )
    }
}

pub fn get_config() -> Result<SponsorConfig, ConfigError> {
    let base_path = env::current_dir()
        .map_err(|e| ConfigError::Message(format!("Failed to determine the current directory: {e}")))?;
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment
    let environment: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(ConfigError::Message)?;

    let environment_filename = format!("server_{}.yaml", environment.as_str());

    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("server_base.yaml")))
        .add_source(File::from(configuration_directory.join(environment_filename)).required(false))
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    config.try_deserialize::<SponsorConfig>()
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local`, `development`, or `production`."
            )),
        }
    }
}
