//! In-memory collaborators for unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::{AppConfig, ConfigManager};
use crate::config_file::{FileSystemRepo, QrEncoder, TemplateRenderer};
use crate::domain::{
    ConfigStyle, Interface, InterfaceIdentifier, Peer, PeerIdentifier, RequestContext, UserIdentifier, UserInfo,
};
use crate::error::{AppError, Result};
use crate::event_bus::{Event, EventBus, EventHandler, Topic};
use crate::repository::WireguardRepository;

pub fn admin_ctx() -> RequestContext {
    RequestContext::new(UserInfo {
        id: UserIdentifier::from("admin"),
        is_admin: true,
    })
}

pub fn user_ctx(id: &str) -> RequestContext {
    RequestContext::new(UserInfo {
        id: UserIdentifier::from(id),
        is_admin: false,
    })
}

pub fn config_manager(config: AppConfig) -> Arc<ConfigManager> {
    Arc::new(ConfigManager::new(config))
}

#[derive(Default)]
pub struct MemoryRepository {
    pub interfaces: Mutex<BTreeMap<InterfaceIdentifier, Interface>>,
    pub peers: Mutex<BTreeMap<PeerIdentifier, Peer>>,
    /// `save_interface` fails for this identifier
    pub fail_save_for: Mutex<Option<InterfaceIdentifier>>,
    pub saved: Mutex<Vec<InterfaceIdentifier>>,
}

impl MemoryRepository {
    pub fn with_interface(self, iface: Interface) -> Self {
        self.interfaces.lock().unwrap().insert(iface.identifier.clone(), iface);
        self
    }

    pub fn with_peer(self, peer: Peer) -> Self {
        self.peers.lock().unwrap().insert(peer.identifier.clone(), peer);
        self
    }

    pub fn saved(&self) -> Vec<InterfaceIdentifier> {
        self.saved.lock().unwrap().clone()
    }

    pub fn interface(&self, id: &str) -> Option<Interface> {
        self.interfaces.lock().unwrap().get(&InterfaceIdentifier::from(id)).cloned()
    }
}

#[async_trait]
impl WireguardRepository for MemoryRepository {
    async fn get_interface_and_peers(
        &self,
        ctx: &RequestContext,
        id: &InterfaceIdentifier,
    ) -> Result<(Interface, Vec<Peer>)> {
        let iface = self.get_interface(ctx, id).await?;
        let peers = self
            .peers
            .lock()
            .unwrap()
            .values()
            .filter(|p| &p.interface_identifier == id)
            .cloned()
            .collect();
        Ok((iface, peers))
    }

    async fn get_interface(&self, _ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<Interface> {
        self.interfaces
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("interface {id}")))
    }

    async fn get_peer(&self, _ctx: &RequestContext, id: &PeerIdentifier) -> Result<Peer> {
        self.peers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("peer {id}")))
    }

    async fn list_interfaces(&self, _ctx: &RequestContext) -> Result<Vec<Interface>> {
        Ok(self.interfaces.lock().unwrap().values().cloned().collect())
    }

    async fn save_interface(&self, _ctx: &RequestContext, iface: &Interface) -> Result<()> {
        if self.fail_save_for.lock().unwrap().as_ref() == Some(&iface.identifier) {
            return Err(AppError::Io(std::io::Error::other("disk full")));
        }
        self.saved.lock().unwrap().push(iface.identifier.clone());
        self.interfaces
            .lock()
            .unwrap()
            .insert(iface.identifier.clone(), iface.clone());
        Ok(())
    }

    async fn save_peer(&self, _ctx: &RequestContext, peer: &Peer) -> Result<()> {
        self.peers.lock().unwrap().insert(peer.identifier.clone(), peer.clone());
        Ok(())
    }

    async fn delete_interface(&self, _ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<()> {
        self.interfaces.lock().unwrap().remove(id);
        self.peers.lock().unwrap().retain(|_, p| &p.interface_identifier != id);
        Ok(())
    }
}

/// Records published events and subscriptions without dispatching.
#[derive(Default)]
pub struct RecordingBus {
    pub published: Mutex<Vec<Event>>,
    pub subscriptions: Mutex<Vec<Topic>>,
}

impl RecordingBus {
    pub fn created(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                Event::InterfaceCreated(iface) => Some(iface.identifier.to_string()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventBus for RecordingBus {
    async fn subscribe(&self, topic: Topic, _handler: Arc<dyn EventHandler>) {
        self.subscriptions.lock().unwrap().push(topic);
    }

    async fn publish(&self, event: Event) {
        self.published.lock().unwrap().push(event);
    }
}

/// Renders a small wg-quick like document with a leading comment.
#[derive(Default)]
pub struct StubRenderer;

#[async_trait]
impl TemplateRenderer for StubRenderer {
    async fn render_interface_config(&self, iface: &Interface, peers: &[Peer]) -> Result<String> {
        Ok(format!(
            "# interface {}\n[Interface]\nPrivateKey = {}\nListenPort = {}\n# peers: {}\n",
            iface.identifier,
            iface.key_pair.private_key,
            iface.listen_port,
            peers.len()
        ))
    }

    async fn render_peer_config(&self, peer: &Peer, style: ConfigStyle) -> Result<String> {
        Ok(format!(
            "# peer {} ({:?})\n[Interface]\n  PrivateKey = {}\n\n[Peer]\nPublicKey = {}\n  Endpoint = {}\n",
            peer.identifier,
            style,
            peer.interface.key_pair.private_key,
            peer.endpoint_public_key.get_value(),
            peer.endpoint.get_value()
        ))
    }
}

#[derive(Default)]
pub struct MemoryFileSystem {
    pub files: Mutex<BTreeMap<String, String>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_writes: Mutex<bool>,
}

impl MemoryFileSystem {
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl FileSystemRepo for MemoryFileSystem {
    async fn write_file(&self, path: &str, contents: &[u8]) -> Result<()> {
        if *self.fail_writes.lock().unwrap() {
            return Err(AppError::Io(std::io::Error::other("read-only file system")));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), String::from_utf8_lossy(contents).into_owned());
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// Returns the payload prefixed with `QR:` and records the last payload.
#[derive(Default)]
pub struct StubQrEncoder {
    pub last_payload: Mutex<Option<String>>,
}

impl QrEncoder for StubQrEncoder {
    fn encode(&self, payload: &str) -> Result<Vec<u8>> {
        *self.last_payload.lock().unwrap() = Some(payload.to_string());
        Ok(format!("QR:{payload}").into_bytes())
    }
}
