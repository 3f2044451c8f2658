mod provisioning;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use provisioning::{ProvisioningConfig, ProvisioningInterface};

use crate::amnezia::DEFAULT_COMPRESSION_LEVEL;
use crate::cli::{CliArgs, EnvConfig};
use crate::domain::parse_cidr;
use crate::error::AppError;
use crate::provisioning::validate_provisioning_interfaces;

pub const WIREGUARD_MODE_DISABLED: &str = "disabled";
pub const WIREGUARD_MODE_WIREGUARD: &str = "wireguard";
pub const WIREGUARD_MODE_AMNEZIAWG: &str = "amneziawg";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub core: CoreConfig,

    #[serde(default)]
    pub advanced: AdvancedConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub provisioning: ProvisioningConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// disabled, wireguard or amneziawg
    pub wireguard_mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub log_level: String,
    pub start_listen_port: u16,
    pub start_cidr_v4: String,
    pub start_cidr_v6: String,
    pub use_ip_v6: bool,
    /// keep empty to disable config export to files
    pub config_storage_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: u64,
    pub acquire_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// zlib level 0-9 used for vpn:// links
    pub compression_level: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            wireguard_mode: WIREGUARD_MODE_DISABLED.to_string(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            start_listen_port: 51820,
            start_cidr_v4: "10.11.12.0/24".to_string(),
            start_cidr_v6: "fdfd:d3ad:c0de:1234::0/64".to_string(),
            use_ip_v6: true,
            config_storage_path: String::new(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://awgman.db".to_string(),
            max_connections: 10,
            connect_timeout: 30,
            acquire_timeout: 30,
            idle_timeout: 600,
            max_lifetime: 3600,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl AppConfig {
    /// Normalizes and checks the loaded values. Suspicious but valid settings
    /// are logged as warnings.
    pub fn sanitize(&mut self) -> Result<(), AppError> {
        let mode = self.core.wireguard_mode.trim().to_lowercase();
        self.core.wireguard_mode = match mode.as_str() {
            "" => WIREGUARD_MODE_DISABLED.to_string(),
            WIREGUARD_MODE_DISABLED | WIREGUARD_MODE_WIREGUARD | WIREGUARD_MODE_AMNEZIAWG => mode,
            _ => {
                return Err(AppError::Config(format!(
                    "invalid core.wireguard_mode {:?}",
                    self.core.wireguard_mode
                )))
            }
        };

        parse_cidr(&self.advanced.start_cidr_v4)
            .map_err(|e| AppError::Config(format!("advanced.start_cidr_v4: {}", e)))?;
        parse_cidr(&self.advanced.start_cidr_v6)
            .map_err(|e| AppError::Config(format!("advanced.start_cidr_v6: {}", e)))?;

        if self.link.compression_level > 9 {
            return Err(AppError::Config("link.compression_level must be between 0 and 9".to_string()));
        }

        let warnings = validate_provisioning_interfaces(&self.provisioning.interfaces)?;
        for warning in warnings {
            tracing::warn!(field = %warning.field, "provisioning: {}", warning.message);
        }

        if self.core.wireguard_mode != WIREGUARD_MODE_AMNEZIAWG {
            if let Some(iface) = self
                .provisioning
                .interfaces
                .iter()
                .find(|iface| iface.advanced_security.is_some())
            {
                return Err(AppError::Config(format!(
                    "provisioning.interfaces[{}].advanced_security is only supported with core.wireguard_mode {:?}",
                    iface.identifier.trim(),
                    WIREGUARD_MODE_AMNEZIAWG
                )));
            }
        }

        Ok(())
    }

    pub fn log_startup_values(&self) {
        tracing::info!("Configuration loaded, log level: {}", self.advanced.log_level);
        tracing::debug!(
            wireguard_mode = %self.core.wireguard_mode,
            start_listen_port = self.advanced.start_listen_port,
            start_cidr_v4 = %self.advanced.start_cidr_v4,
            start_cidr_v6 = %self.advanced.start_cidr_v6,
            use_ip_v6 = self.advanced.use_ip_v6,
            config_storage_path = %self.advanced.config_storage_path,
            provisioned_interfaces = self.provisioning.interfaces.len(),
            "Config settings"
        );
    }
}

pub struct ConfigManager {
    config: Arc<ArcSwap<AppConfig>>,
}

impl ConfigManager {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn get(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// Load configuration from multiple sources with precedence:
    /// CLI args > Environment variables > Config file > Defaults
    pub fn load_merged_config(cli_args: &CliArgs, env_config: &EnvConfig) -> Result<AppConfig, AppError> {
        let mut config = AppConfig::default();

        if std::path::Path::new(&cli_args.config).exists() {
            let content = std::fs::read_to_string(&cli_args.config)
                .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

            config = parse_config(&content)?;
        } else {
            tracing::warn!("Config file {} not found, using default values", cli_args.config);
        }

        // Override with environment variables
        if let Some(mode) = &env_config.wireguard_mode {
            config.core.wireguard_mode = mode.clone();
        }
        if let Some(db_url) = &env_config.database_url {
            config.database.url = db_url.clone();
        }
        if let Some(max_connections) = env_config.max_db_connections {
            config.database.max_connections = max_connections;
        }
        if let Some(log_level) = &env_config.log_level {
            config.advanced.log_level = log_level.clone();
        }
        if let Some(port) = env_config.start_listen_port {
            config.advanced.start_listen_port = port;
        }
        if let Some(cidr) = &env_config.start_cidr_v4 {
            config.advanced.start_cidr_v4 = cidr.clone();
        }
        if let Some(cidr) = &env_config.start_cidr_v6 {
            config.advanced.start_cidr_v6 = cidr.clone();
        }
        if let Some(use_ip_v6) = env_config.use_ip_v6 {
            config.advanced.use_ip_v6 = use_ip_v6;
        }
        if let Some(path) = &env_config.config_storage_path {
            config.advanced.config_storage_path = path.clone();
        }
        if let Some(level) = env_config.compression_level {
            config.link.compression_level = level;
        }

        // Override with CLI arguments (highest priority)
        if let Some(db_url) = &cli_args.database_url {
            config.database.url = db_url.clone();
        }
        if let Some(max_connections) = cli_args.max_db_connections {
            config.database.max_connections = max_connections;
        }
        if let Some(path) = &cli_args.config_storage_path {
            config.advanced.config_storage_path = path.clone();
        }
        if let Some(port) = cli_args.start_listen_port {
            config.advanced.start_listen_port = port;
        }
        config.advanced.log_level = cli_args.effective_log_level(&config.advanced.log_level);

        config.sanitize()?;
        Ok(config)
    }
}

/// Parses the TOML configuration file contents.
pub fn parse_config(content: &str) -> Result<AppConfig, AppError> {
    toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))
}
