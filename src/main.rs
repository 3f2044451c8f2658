use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use awgman::amnezia::build_vpn_link;
use awgman::cli::{self, Command};
use awgman::config::{AppConfig, ConfigManager};
use awgman::config_file::{peer_config_display_name, qr_config_text};
use awgman::database::{self, WireguardDatabase};
use awgman::domain::{PeerIdentifier, RequestContext};
use awgman::event_bus::LocalEventBus;
use awgman::provisioning::InterfaceBootstrapper;
use awgman::repository::WireguardRepository;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli_args = cli::CliArgs::parse_args();

    // Load environment variables with AWGMAN_ prefix
    let env_config = cli::load_env_config().unwrap_or_else(|_| cli::EnvConfig::default());

    let log_level = cli_args.effective_log_level(env_config.log_level.as_deref().unwrap_or("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("awgman={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting awgman v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("CLI args: {:?}", cli_args);
    tracing::debug!("Environment config: {:?}", env_config);

    // Load merged configuration
    let config = ConfigManager::load_merged_config(&cli_args, &env_config)?;
    config.log_startup_values();

    let command = cli_args.command();
    if command == Command::Validate {
        println!(
            "configuration ok: mode {}, {} provisioned interfaces",
            config.core.wireguard_mode,
            config.provisioning.interfaces.len()
        );
        return Ok(());
    }

    tracing::info!("Database URL: {}", config.database.url);
    let db = database::create_connection(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    tracing::info!("Database connection established");

    database::migrate_database(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to migrate database: {}", e))?;

    let repo: Arc<dyn WireguardRepository> = Arc::new(WireguardDatabase::new(db));

    match command {
        Command::Bootstrap => bootstrap(config, repo).await,
        Command::Link {
            peer,
            config_file,
            description,
        } => {
            let text = tokio::fs::read_to_string(&config_file)
                .await
                .with_context(|| format!("Failed to read {}", config_file.display()))?;
            let link = peer_link(&config, repo.as_ref(), &PeerIdentifier::from(peer), &text, description).await?;
            println!("{link}");
            Ok(())
        }
        Command::Validate => Ok(()),
    }
}

async fn bootstrap(config: AppConfig, repo: Arc<dyn WireguardRepository>) -> Result<()> {
    let provisioning = config.provisioning.clone();
    if let Some(path) = unwired_storage_path(&config) {
        tracing::warn!(
            "config_storage_path {} is set but no config renderer is wired in, no .conf files will be written",
            path
        );
    }
    let cfg = Arc::new(ConfigManager::new(config));
    let bus = Arc::new(LocalEventBus::new());

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT, cancelling");
            ctrl_c.cancel();
        }
    });

    let ctx = RequestContext::system().with_cancellation(cancel);
    let bootstrapper = InterfaceBootstrapper::new(cfg, repo, bus);
    if bootstrapper.bootstrap(&ctx, &provisioning).await? {
        tracing::info!("Provisioned {} interfaces", provisioning.interfaces.len());
    } else {
        tracing::info!("No interfaces provisioned");
    }
    Ok(())
}

/// Storage path that provisioning would persist configs to. The binary only
/// publishes events, so nothing is written there.
fn unwired_storage_path(config: &AppConfig) -> Option<&str> {
    let path = config.advanced.config_storage_path.trim();
    if path.is_empty() || config.provisioning.interfaces.is_empty() {
        return None;
    }
    Some(path)
}

async fn peer_link(
    config: &AppConfig,
    repo: &dyn WireguardRepository,
    id: &PeerIdentifier,
    config_text: &str,
    description: Option<String>,
) -> Result<String> {
    let ctx = RequestContext::system();
    let peer = repo.get_peer(&ctx, id).await?;
    let iface = repo.get_interface(&ctx, &peer.interface_identifier).await?;

    let display_name = peer_config_display_name(Some(&iface), &peer);
    let description = description.unwrap_or_else(|| display_name.clone());
    let config_text = qr_config_text(config_text, Some(&display_name));

    Ok(build_vpn_link(
        Some(&peer),
        &iface,
        &description,
        &config_text,
        config.link.compression_level,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use awgman::config::ProvisioningInterface;

    #[test]
    fn test_unwired_storage_path() {
        let mut config = AppConfig::default();
        assert_eq!(unwired_storage_path(&config), None);

        config.advanced.config_storage_path = "/etc/wireguard".to_string();
        assert_eq!(unwired_storage_path(&config), None);

        config.provisioning.interfaces.push(ProvisioningInterface::new("wg0"));
        assert_eq!(unwired_storage_path(&config), Some("/etc/wireguard"));

        config.advanced.config_storage_path = "  ".to_string();
        assert_eq!(unwired_storage_path(&config), None);
    }
}
