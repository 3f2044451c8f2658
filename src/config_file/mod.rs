use std::sync::Arc;

use async_trait::async_trait;

use crate::amnezia::build_vpn_link;
use crate::config::ConfigManager;
use crate::domain::{ConfigStyle, Interface, InterfaceIdentifier, Peer, PeerIdentifier, RequestContext};
use crate::error::{AppError, Result};
use crate::event_bus::{Event, EventBus, EventHandler, Topic};
use crate::repository::WireguardRepository;

const NAME_HEADER_PREFIX: &str = "# Name = ";

/// Renders wg-quick style configuration documents.
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render_interface_config(&self, iface: &Interface, peers: &[Peer]) -> Result<String>;

    async fn render_peer_config(&self, peer: &Peer, style: ConfigStyle) -> Result<String>;
}

/// Sink for persisted interface configuration files. Paths are relative to
/// the configuration storage directory.
#[async_trait]
pub trait FileSystemRepo: Send + Sync {
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;
}

/// Turns a text payload into a QR code image.
pub trait QrEncoder: Send + Sync {
    fn encode(&self, payload: &str) -> Result<Vec<u8>>;
}

/// Serves rendered interface and peer configurations and keeps the files in
/// the storage directory in sync with interface lifecycle events.
pub struct ConfigFileManager {
    cfg: Arc<ConfigManager>,
    wg: Arc<dyn WireguardRepository>,
    renderer: Arc<dyn TemplateRenderer>,
    fs: Arc<dyn FileSystemRepo>,
    qr: Arc<dyn QrEncoder>,
}

impl ConfigFileManager {
    /// Creates the manager. With a configured storage path the directory is
    /// created and the manager subscribes to interface events.
    pub async fn new(
        cfg: Arc<ConfigManager>,
        bus: Arc<dyn EventBus>,
        wg: Arc<dyn WireguardRepository>,
        renderer: Arc<dyn TemplateRenderer>,
        fs: Arc<dyn FileSystemRepo>,
        qr: Arc<dyn QrEncoder>,
    ) -> Result<Arc<Self>> {
        let storage_path = cfg.get().advanced.config_storage_path.trim().to_string();

        let manager = Arc::new(Self {
            cfg,
            wg,
            renderer,
            fs,
            qr,
        });

        if !storage_path.is_empty() {
            tokio::fs::create_dir_all(&storage_path).await.map_err(|e| {
                AppError::Io(e).context(format!("failed to create configuration storage path {storage_path}"))
            })?;

            for topic in [
                Topic::InterfaceCreated,
                Topic::InterfaceUpdated,
                Topic::InterfaceDeleted,
                Topic::PeerInterfaceUpdated,
            ] {
                bus.subscribe(topic, manager.clone()).await;
            }
            tracing::info!("Persisting interface configurations to {}", storage_path);
        }

        Ok(manager)
    }

    /// Rendered configuration of an interface and all its peers. Admin only.
    pub async fn get_interface_config(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<String> {
        ctx.validate_admin_access()?;

        ctx.check_cancelled()?;
        let (iface, peers) = self
            .wg
            .get_interface_and_peers(ctx, id)
            .await
            .map_err(|e| e.context(format!("failed to fetch interface {id}")))?;

        ctx.check_cancelled()?;
        self.renderer.render_interface_config(&iface, &peers).await
    }

    /// Rendered configuration of a peer, prefixed with a `# Name = ...` line.
    pub async fn get_peer_config(
        &self,
        ctx: &RequestContext,
        id: &PeerIdentifier,
        style: ConfigStyle,
    ) -> Result<String> {
        let peer = self.load_peer(ctx, id).await?;

        ctx.check_cancelled()?;
        let config = self.renderer.render_peer_config(&peer, style).await?;

        let display_name = self.lookup_display_name(ctx, &peer).await?;
        if display_name.is_empty() {
            return Ok(config);
        }
        Ok(format!("{NAME_HEADER_PREFIX}{display_name}\n{config}"))
    }

    /// Text encoded in the peer's QR code: a `vpn://` link for interfaces
    /// with obfuscation parameters, the stripped plain configuration
    /// otherwise.
    pub async fn get_peer_qr_payload(
        &self,
        ctx: &RequestContext,
        id: &PeerIdentifier,
        style: ConfigStyle,
    ) -> Result<String> {
        let peer = self.load_peer(ctx, id).await?;
        let iface = self.load_interface(ctx, &peer.interface_identifier).await?;

        if iface.has_advanced_security() {
            return self.build_link(ctx, &peer, &iface).await;
        }

        ctx.check_cancelled()?;
        let config = self
            .renderer
            .render_peer_config(&peer, style)
            .await
            .map_err(|e| e.context(format!("failed to get peer config for {id}")))?;
        Ok(qr_config_text(&config, None))
    }

    pub async fn get_peer_config_qr_code(
        &self,
        ctx: &RequestContext,
        id: &PeerIdentifier,
        style: ConfigStyle,
    ) -> Result<Vec<u8>> {
        let payload = self.get_peer_qr_payload(ctx, id, style).await?;
        self.qr
            .encode(&payload)
            .map_err(|e| e.context(format!("failed to encode qr code for {id}")))
    }

    /// The `vpn://` import link of a peer whose interface carries
    /// obfuscation parameters.
    pub async fn get_peer_vpn_link(&self, ctx: &RequestContext, id: &PeerIdentifier) -> Result<String> {
        let peer = self.load_peer(ctx, id).await?;
        let iface = self.load_interface(ctx, &peer.interface_identifier).await?;
        self.build_link(ctx, &peer, &iface).await
    }

    /// Writes `<identifier>.conf` for the interface.
    pub async fn persist_interface_config(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<()> {
        ctx.check_cancelled()?;
        let (iface, peers) = self
            .wg
            .get_interface_and_peers(ctx, id)
            .await
            .map_err(|e| e.context(format!("failed to fetch interface {id}")))?;

        ctx.check_cancelled()?;
        let config = self
            .renderer
            .render_interface_config(&iface, &peers)
            .await
            .map_err(|e| e.context("failed to get interface config"))?;

        ctx.check_cancelled()?;
        self.fs
            .write_file(&iface.config_file_name(), config.as_bytes())
            .await
            .map_err(|e| e.context("failed to write interface config"))
    }

    pub async fn unpersist_interface_config(&self, ctx: &RequestContext, file_name: &str) -> Result<()> {
        ctx.check_cancelled()?;
        self.fs
            .delete_file(file_name)
            .await
            .map_err(|e| e.context("failed to remove interface config"))
    }

    async fn load_peer(&self, ctx: &RequestContext, id: &PeerIdentifier) -> Result<Peer> {
        ctx.check_cancelled()?;
        let peer = self
            .wg
            .get_peer(ctx, id)
            .await
            .map_err(|e| e.context(format!("failed to fetch peer {id}")))?;

        ctx.validate_user_access(&peer.user_identifier)?;
        Ok(peer)
    }

    async fn load_interface(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<Interface> {
        ctx.check_cancelled()?;
        self.wg
            .get_interface(ctx, id)
            .await
            .map_err(|e| e.context(format!("failed to fetch interface {id}")))
    }

    /// Display name of the peer, a missing interface falls back to the
    /// identifier the peer references.
    async fn lookup_display_name(&self, ctx: &RequestContext, peer: &Peer) -> Result<String> {
        ctx.check_cancelled()?;
        let iface = match self.wg.get_interface(ctx, &peer.interface_identifier).await {
            Ok(iface) => Some(iface),
            Err(e) => {
                tracing::debug!(peer = %peer.identifier, "interface lookup for display name failed: {}", e);
                None
            }
        };
        Ok(peer_config_display_name(iface.as_ref(), peer))
    }

    async fn build_link(&self, ctx: &RequestContext, peer: &Peer, iface: &Interface) -> Result<String> {
        let display_name = peer_config_display_name(Some(iface), peer);

        // wg-quick style keeps Address, DNS and MTU in the embedded text
        ctx.check_cancelled()?;
        let config = self
            .renderer
            .render_peer_config(peer, ConfigStyle::WgQuick)
            .await
            .map_err(|e| e.context(format!("failed to get peer config for {}", peer.identifier)))?;
        let config_text = qr_config_text(&config, Some(&display_name));

        let compression_level = self.cfg.get().link.compression_level;
        build_vpn_link(Some(peer), iface, &display_name, &config_text, compression_level)
            .map_err(|e| e.context(format!("failed to build amnezia vpn link for {}", peer.identifier)))
    }

    async fn handle_interface_saved(&self, iface: &Interface) {
        if !iface.save_config {
            return;
        }
        tracing::debug!(interface = %iface.identifier, "handling interface save event");

        if let Err(e) = self
            .persist_interface_config(&RequestContext::system(), &iface.identifier)
            .await
        {
            tracing::error!(interface = %iface.identifier, "failed to automatically persist interface config: {}", e);
        }
    }

    async fn handle_interface_deleted(&self, iface: &Interface) {
        if !iface.save_config {
            return;
        }
        tracing::debug!(interface = %iface.identifier, "handling interface delete event");

        if let Err(e) = self
            .unpersist_interface_config(&RequestContext::system(), &iface.config_file_name())
            .await
        {
            tracing::error!(interface = %iface.identifier, "failed to remove persisted interface config: {}", e);
        }
    }

    async fn handle_peer_interface_updated(&self, id: &InterfaceIdentifier) {
        let ctx = RequestContext::system();
        let iface = match self.wg.get_interface(&ctx, id).await {
            Ok(iface) => iface,
            Err(e) => {
                tracing::error!(interface = %id, "failed to load interface: {}", e);
                return;
            }
        };
        if !iface.save_config {
            return;
        }
        tracing::debug!(interface = %id, "handling peer interface updated event");

        if let Err(e) = self.persist_interface_config(&ctx, &iface.identifier).await {
            tracing::error!(interface = %id, "failed to automatically persist interface config: {}", e);
        }
    }
}

#[async_trait]
impl EventHandler for ConfigFileManager {
    async fn handle(&self, event: &Event) {
        match event {
            Event::InterfaceCreated(iface) | Event::InterfaceUpdated(iface) => self.handle_interface_saved(iface).await,
            Event::InterfaceDeleted(iface) => self.handle_interface_deleted(iface).await,
            Event::PeerInterfaceUpdated(id) => self.handle_peer_interface_updated(id).await,
        }
    }
}

/// `"<interface> - <peer>"`, each side falling back to its identifier.
pub fn peer_config_display_name(iface: Option<&Interface>, peer: &Peer) -> String {
    let iface_name = iface
        .and_then(|iface| {
            [iface.display_name.trim(), iface.identifier.as_str().trim()]
                .into_iter()
                .find(|name| !name.is_empty())
        })
        .unwrap_or_else(|| peer.interface_identifier.as_str().trim());

    let peer_name = match peer.display_name.trim() {
        "" => peer.identifier.as_str().trim(),
        name => name,
    };

    match (iface_name.is_empty(), peer_name.is_empty()) {
        (true, _) => peer_name.to_string(),
        (_, true) => iface_name.to_string(),
        _ => format!("{iface_name} - {peer_name}"),
    }
}

/// Drops comment lines and surrounding whitespace from a rendered
/// configuration. A non-empty `name` is written back as the first line.
pub fn qr_config_text(config: &str, name: Option<&str>) -> String {
    let mut text = String::with_capacity(config.len());
    if let Some(name) = name.filter(|name| !name.is_empty()) {
        text.push_str(NAME_HEADER_PREFIX);
        text.push_str(name);
        text.push('\n');
    }

    for line in config.lines().map(str::trim) {
        if line.starts_with('#') {
            continue;
        }
        text.push_str(line);
        text.push('\n');
    }
    text
}
