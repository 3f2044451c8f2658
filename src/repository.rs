use async_trait::async_trait;

use crate::domain::{Interface, InterfaceIdentifier, Peer, PeerIdentifier, RequestContext};
use crate::error::Result;

/// Storage of interfaces and their peers.
///
/// Implementations serialize conflicting writes to the same identifier;
/// callers do not lock.
#[async_trait]
pub trait WireguardRepository: Send + Sync {
    /// Returns the interface and all peers associated with it.
    async fn get_interface_and_peers(
        &self,
        ctx: &RequestContext,
        id: &InterfaceIdentifier,
    ) -> Result<(Interface, Vec<Peer>)>;

    async fn get_interface(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<Interface>;

    async fn get_peer(&self, ctx: &RequestContext, id: &PeerIdentifier) -> Result<Peer>;

    async fn list_interfaces(&self, ctx: &RequestContext) -> Result<Vec<Interface>>;

    /// Inserts or replaces the interface.
    async fn save_interface(&self, ctx: &RequestContext, iface: &Interface) -> Result<()>;

    /// Inserts or replaces the peer, its interface must exist.
    async fn save_peer(&self, ctx: &RequestContext, peer: &Peer) -> Result<()>;

    /// Deletes the interface together with its peers.
    async fn delete_interface(&self, ctx: &RequestContext, id: &InterfaceIdentifier) -> Result<()>;
}
